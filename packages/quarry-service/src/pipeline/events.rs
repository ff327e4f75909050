use std::sync::Arc;

use quarry_config::EventSink;
use quarry_domain::DomainEvent;

use crate::{
	BoxFuture, QueuePublisher, Result,
	event_store::{EventMessage, EventStore},
	pipeline::{Command, CommandContext, CommandOutput, Interceptor, Next},
};

/// Collects the events raised by loggable commands and delivers them to the configured sink.
///
/// Only inline delivery can fail the command.
pub struct EventCapture {
	sink: EventSink,
	store: Arc<EventStore>,
	queue: Arc<dyn QueuePublisher>,
}
impl EventCapture {
	pub fn new(sink: EventSink, store: Arc<EventStore>, queue: Arc<dyn QueuePublisher>) -> Self {
		Self { sink, store, queue }
	}

	async fn deliver(&self, event: &DomainEvent) -> Result<()> {
		match self.sink {
			EventSink::Drop => {
				tracing::debug!(name = event.name(), "Domain event dropped.");
			},
			EventSink::Forward => {
				let published = match EventMessage::from_event(event) {
					Ok(message) => self.queue.publish(&message).await,
					Err(err) => Err(err),
				};

				if let Err(err) = published {
					tracing::warn!(
						error = %err,
						name = event.name(),
						tenant_key = %event.tenant_key,
						"Failed to forward domain event."
					);
				}
			},
			EventSink::Inline => {
				self.store.append(event).await?;
			},
		}

		Ok(())
	}
}
impl Interceptor for EventCapture {
	fn handle<'a>(
		&'a self,
		ctx: &'a mut CommandContext,
		command: &'a Command,
		next: Next<'a>,
	) -> BoxFuture<'a, Result<CommandOutput>> {
		Box::pin(async move {
			if !command.payload.is_loggable() {
				return next.run(ctx, command).await;
			}

			ctx.start_recording();

			let result = next.run(&mut *ctx, command).await;
			let events = ctx.take_recorded();
			let output = result?;

			for event in &events {
				self.deliver(event).await?;
			}

			Ok(output)
		})
	}
}

use std::sync::Arc;

use quarry_domain::TenantReference;

use crate::{
	BoxFuture, InteractionStore, Result,
	pipeline::{Command, CommandContext, CommandOutput, CommandPayload, Interceptor, Next},
};

/// Promotes a user's recently touched items in their queries.
///
/// Applies only to user-bound queries whose token enables the configured plugin.
pub struct Personalization {
	enabled: bool,
	plugin: String,
	limit: usize,
	interactions: Arc<dyn InteractionStore>,
}
impl Personalization {
	pub fn new(
		cfg: &quarry_config::Personalization,
		interactions: Arc<dyn InteractionStore>,
	) -> Self {
		Self {
			enabled: cfg.enabled,
			plugin: cfg.plugin.clone(),
			limit: cfg.recent_interactions as usize,
			interactions,
		}
	}

	fn target<'c>(&self, command: &'c Command) -> Option<(&'c TenantReference, &'c str)> {
		if !self.enabled {
			return None;
		}

		let CommandPayload::Query(query) = &command.payload else {
			return None;
		};

		if !command.token.as_ref().is_some_and(|token| token.has_plugin(&self.plugin)) {
			return None;
		}

		Some((command.tenant.as_ref()?, query.user_id()?))
	}
}
impl Interceptor for Personalization {
	fn handle<'a>(
		&'a self,
		ctx: &'a mut CommandContext,
		command: &'a Command,
		next: Next<'a>,
	) -> BoxFuture<'a, Result<CommandOutput>> {
		Box::pin(async move {
			let Some((tenant, user_id)) = self.target(command) else {
				return next.run(ctx, command).await;
			};
			let recent = self.interactions.recent(tenant, user_id, self.limit).await?;

			for uuid in recent {
				if !ctx.promoted.contains(&uuid) {
					ctx.promoted.push(uuid);
				}
			}

			tracing::debug!(user_id, promoted = ctx.promoted.len(), "Query personalized.");

			let mut output = next.run(&mut *ctx, command).await?;

			if let CommandOutput::Search(result) = &mut output {
				result.mark_promoted(&ctx.promoted);
			}

			Ok(output)
		})
	}
}

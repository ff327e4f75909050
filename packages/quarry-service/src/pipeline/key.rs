use crate::{
	BoxFuture, Result,
	pipeline::{Command, CommandContext, CommandOutput, Interceptor, Next},
};

/// Rejects commands that do not address a tenant.
pub struct KeyCheck;
impl Interceptor for KeyCheck {
	fn handle<'a>(
		&'a self,
		ctx: &'a mut CommandContext,
		command: &'a Command,
		next: Next<'a>,
	) -> BoxFuture<'a, Result<CommandOutput>> {
		Box::pin(async move {
			command.require_tenant()?;

			next.run(ctx, command).await
		})
	}
}

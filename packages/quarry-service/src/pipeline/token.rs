use quarry_domain::TokenAccess;

use crate::{
	BoxFuture, Result,
	pipeline::{Command, CommandContext, CommandOutput, CommandPayload, Interceptor, Next},
};

/// Validates the command's token, if it carries one, against the addressed tenant.
pub struct TokenCheck;
impl Interceptor for TokenCheck {
	fn handle<'a>(
		&'a self,
		ctx: &'a mut CommandContext,
		command: &'a Command,
		next: Next<'a>,
	) -> BoxFuture<'a, Result<CommandOutput>> {
		Box::pin(async move {
			if let Some(token) = &command.token {
				let tenant = command.require_tenant()?;
				let requested_hits = match &command.payload {
					CommandPayload::Query(query) => Some(query.size),
					_ => None,
				};
				let access = TokenAccess {
					tenant,
					endpoint: command.payload.endpoint(),
					referrer: command.referrer.as_deref(),
					requested_hits,
				};

				if let Err(rejection) = token.check(&access, ctx.now) {
					tracing::info!(
						token = %token.uuid,
						app_id = %tenant.app_id,
						index_id = %tenant.index_id,
						reason = %rejection,
						"Token rejected."
					);

					return Err(rejection.into());
				}
			}

			next.run(ctx, command).await
		})
	}
}

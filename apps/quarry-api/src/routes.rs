use axum::{
	Json, Router,
	extract::{Path, Query as QueryParams, State},
	http::{
		HeaderMap, StatusCode,
		header::{AUTHORIZATION, REFERER},
	},
	response::{IntoResponse, Response},
	routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use quarry_domain::{Item, ItemUuid, Query, SearchResult, TenantReference, Token};
use quarry_service::{Command, CommandOutput, CommandPayload, Error, EventMessage, EventQuery};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IndexItemsBody {
	pub items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteItemsBody {
	pub uuids: Vec<ItemUuid>,
}

#[derive(Debug, Deserialize)]
pub struct InteractionBody {
	pub user: String,
	pub item: ItemUuid,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
	pub events: Vec<EventMessage>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let status = match &err {
			Error::InvalidKey { .. } | Error::InvalidFormat { .. } => StatusCode::BAD_REQUEST,
			Error::InvalidToken { .. } => StatusCode::UNAUTHORIZED,
			Error::ResourceNotAvailable { .. } => StatusCode::NOT_FOUND,
			Error::ResourceExists { .. } => StatusCode::CONFLICT,
			Error::Backend { .. } | Error::Queue { .. } => StatusCode::BAD_GATEWAY,
			Error::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		};

		Self::new(status, err.code(), err.to_string())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/{app_id}/{index_id}/query", post(query))
		.route("/v1/{app_id}/{index_id}/items", post(index_items))
		.route("/v1/{app_id}/{index_id}/items/delete", post(delete_items))
		.route("/v1/{app_id}/{index_id}/configure", post(configure_index))
		.route("/v1/{app_id}/{index_id}/reset", post(reset_index))
		.route("/v1/{app_id}/{index_id}/interactions", post(add_interaction))
		.route("/v1/{app_id}/{index_id}/tokens", post(add_token))
		.route("/v1/{app_id}/{index_id}/tokens/{token_uuid}", delete(delete_token))
		.route("/v1/{app_id}/{index_id}/events", get(query_events))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn query(
	State(state): State<AppState>,
	Path((app_id, index_id)): Path<(String, String)>,
	headers: HeaderMap,
	Json(query): Json<Query>,
) -> Result<Json<SearchResult>, ApiError> {
	let command =
		command(&state, &headers, app_id, index_id, CommandPayload::Query(query)).await?;

	match state.service.execute(command).await? {
		CommandOutput::Search(result) => Ok(Json(*result)),
		_ => Err(unexpected_output()),
	}
}

async fn index_items(
	State(state): State<AppState>,
	Path((app_id, index_id)): Path<(String, String)>,
	headers: HeaderMap,
	Json(body): Json<IndexItemsBody>,
) -> Result<StatusCode, ApiError> {
	let payload = CommandPayload::IndexItems(body.items);

	execute(&state, &headers, app_id, index_id, payload).await
}

async fn delete_items(
	State(state): State<AppState>,
	Path((app_id, index_id)): Path<(String, String)>,
	headers: HeaderMap,
	Json(body): Json<DeleteItemsBody>,
) -> Result<StatusCode, ApiError> {
	let payload = CommandPayload::DeleteItems(body.uuids);

	execute(&state, &headers, app_id, index_id, payload).await
}

async fn configure_index(
	State(state): State<AppState>,
	Path((app_id, index_id)): Path<(String, String)>,
	headers: HeaderMap,
	Json(settings): Json<Value>,
) -> Result<StatusCode, ApiError> {
	execute(&state, &headers, app_id, index_id, CommandPayload::ConfigureIndex(settings)).await
}

async fn reset_index(
	State(state): State<AppState>,
	Path((app_id, index_id)): Path<(String, String)>,
	headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
	execute(&state, &headers, app_id, index_id, CommandPayload::ResetIndex).await
}

async fn add_interaction(
	State(state): State<AppState>,
	Path((app_id, index_id)): Path<(String, String)>,
	headers: HeaderMap,
	Json(body): Json<InteractionBody>,
) -> Result<StatusCode, ApiError> {
	let payload = CommandPayload::AddInteraction { user_id: body.user, item: body.item };

	execute(&state, &headers, app_id, index_id, payload).await
}

async fn add_token(
	State(state): State<AppState>,
	Path((app_id, index_id)): Path<(String, String)>,
	headers: HeaderMap,
	Json(token): Json<Token>,
) -> Result<StatusCode, ApiError> {
	execute(&state, &headers, app_id, index_id, CommandPayload::AddToken(token)).await
}

async fn delete_token(
	State(state): State<AppState>,
	Path((app_id, index_id, token_uuid)): Path<(String, String, Uuid)>,
	headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
	execute(&state, &headers, app_id, index_id, CommandPayload::DeleteToken(token_uuid)).await
}

async fn query_events(
	State(state): State<AppState>,
	Path((app_id, index_id)): Path<(String, String)>,
	headers: HeaderMap,
	QueryParams(range): QueryParams<EventQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
	let command =
		command(&state, &headers, app_id, index_id, CommandPayload::QueryEvents(range)).await?;
	let CommandOutput::Events(events) = state.service.execute(command).await? else {
		return Err(unexpected_output());
	};
	let events = events.iter().map(EventMessage::from_event).collect::<Result<Vec<_>, _>>()?;

	Ok(Json(EventsResponse { events }))
}

async fn execute(
	state: &AppState,
	headers: &HeaderMap,
	app_id: String,
	index_id: String,
	payload: CommandPayload,
) -> Result<StatusCode, ApiError> {
	let command = command(state, headers, app_id, index_id, payload).await?;

	state.service.execute(command).await?;

	Ok(StatusCode::NO_CONTENT)
}

/// Who a request acts as.
enum Credential {
	/// The configured admin key, which acts without a token.
	Admin,
	Token(Uuid),
}

/// Builds the command, resolving the bearer credential and carrying the `Referer` header.
async fn command(
	state: &AppState,
	headers: &HeaderMap,
	app_id: String,
	index_id: String,
	payload: CommandPayload,
) -> Result<Command, ApiError> {
	let mut command = Command::new(TenantReference::new(app_id, index_id), payload);

	if let Credential::Token(token_uuid) = credential(state, headers)? {
		command = command.with_token(state.service.resolve_token(token_uuid).await?);
	}
	if let Some(referrer) = headers.get(REFERER).and_then(|value| value.to_str().ok()) {
		command = command.with_referrer(referrer);
	}

	Ok(command)
}

fn credential(state: &AppState, headers: &HeaderMap) -> Result<Credential, ApiError> {
	let invalid = || {
		ApiError::from(Error::InvalidToken {
			message: "Authorization must be 'Bearer <token uuid>'.".to_string(),
		})
	};
	let bearer = headers
		.get(AUTHORIZATION)
		.and_then(|raw| raw.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
		.map(str::trim)
		.filter(|bearer| !bearer.is_empty())
		.ok_or_else(invalid)?;

	if state.service.cfg.service.admin_key.as_deref() == Some(bearer) {
		return Ok(Credential::Admin);
	}

	Uuid::parse_str(bearer).map(Credential::Token).map_err(|_| invalid())
}

fn unexpected_output() -> ApiError {
	ApiError::new(
		StatusCode::INTERNAL_SERVER_ERROR,
		"UNEXPECTED_OUTPUT",
		"Command produced an unexpected output.",
	)
}

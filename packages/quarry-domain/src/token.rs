use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::TenantReference;

/// Matches every index in [`Token::indices`].
pub const ANY_INDEX: &str = "*";
/// Endpoints a token reaches only when [`Token::endpoints`] names them explicitly.
pub const GRANTED_ENDPOINTS: [&str; 2] = ["add_token", "delete_token"];

/// Per-application access token.
///
/// Empty allow-lists allow everything except [`GRANTED_ENDPOINTS`]. Zero `seconds_valid`, `ttl`, and `max_hits_per_query`
/// mean "no limit".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
	pub uuid: Uuid,
	pub app_id: String,
	#[serde(default)]
	pub indices: Vec<String>,
	#[serde(default)]
	pub referrers: Vec<String>,
	#[serde(default)]
	pub endpoints: Vec<String>,
	#[serde(default)]
	pub plugins: Vec<String>,
	#[serde(default)]
	pub seconds_valid: u64,
	#[serde(default)]
	pub max_hits_per_query: u32,
	#[serde(default)]
	pub ttl: u64,
	#[serde(with = "crate::time_serde", default = "OffsetDateTime::now_utc")]
	pub created_at: OffsetDateTime,
}

/// What a command asks a token to allow.
#[derive(Debug, Clone, Copy)]
pub struct TokenAccess<'a> {
	pub tenant: &'a TenantReference,
	pub endpoint: &'a str,
	pub referrer: Option<&'a str>,
	/// Hits requested by a query, `None` for other commands.
	pub requested_hits: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
	#[error("token belongs to another application")]
	WrongApplication,
	#[error("index '{index}' is not allowed")]
	IndexNotAllowed { index: String },
	#[error("endpoint '{endpoint}' is not allowed")]
	EndpointNotAllowed { endpoint: String },
	#[error("referrer is not allowed")]
	ReferrerNotAllowed,
	#[error("token expired")]
	Expired,
	#[error("query asks for {requested} hits but the token allows {limit}")]
	HitLimitExceeded { limit: u32, requested: u32 },
}

impl Token {
	pub fn new(uuid: Uuid, app_id: impl Into<String>) -> Self {
		Self {
			uuid,
			app_id: app_id.into(),
			indices: Vec::new(),
			referrers: Vec::new(),
			endpoints: Vec::new(),
			plugins: Vec::new(),
			seconds_valid: 0,
			max_hits_per_query: 0,
			ttl: 0,
			created_at: OffsetDateTime::now_utc(),
		}
	}

	pub fn has_plugin(&self, plugin: &str) -> bool {
		self.plugins.iter().any(|enabled| enabled == plugin)
	}

	/// Earliest of `created_at + seconds_valid` and `created_at + ttl`, ignoring zero windows.
	///
	/// A window reaching past the representable date range never expires.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		let seconds = [self.seconds_valid, self.ttl].into_iter().filter(|seconds| *seconds > 0).min()?;
		let window = Duration::seconds(i64::try_from(seconds).ok()?);

		self.created_at.checked_add(window)
	}

	pub fn allows_endpoint(&self, endpoint: &str) -> bool {
		if self.endpoints.is_empty() {
			return !GRANTED_ENDPOINTS.contains(&endpoint);
		}

		self.endpoints.iter().any(|allowed| allowed == endpoint)
	}

	pub fn check(&self, access: &TokenAccess<'_>, now: OffsetDateTime) -> Result<(), TokenRejection> {
		if self.app_id != access.tenant.app_id {
			return Err(TokenRejection::WrongApplication);
		}
		if !self.indices.is_empty()
			&& !self
				.indices
				.iter()
				.any(|index| index == ANY_INDEX || index == &access.tenant.index_id)
		{
			return Err(TokenRejection::IndexNotAllowed { index: access.tenant.index_id.clone() });
		}
		if !self.allows_endpoint(access.endpoint) {
			return Err(TokenRejection::EndpointNotAllowed {
				endpoint: access.endpoint.to_string(),
			});
		}
		if !self.referrers.is_empty() {
			let host = access.referrer.map(referrer_host).unwrap_or_default();

			if !self.referrers.iter().any(|allowed| host_matches(allowed, host)) {
				return Err(TokenRejection::ReferrerNotAllowed);
			}
		}
		if self.expires_at().map(|expires_at| expires_at <= now).unwrap_or(false) {
			return Err(TokenRejection::Expired);
		}

		if let Some(requested) = access.requested_hits
			&& self.max_hits_per_query > 0
			&& self.max_hits_per_query < requested
		{
			return Err(TokenRejection::HitLimitExceeded {
				limit: self.max_hits_per_query,
				requested,
			});
		}

		Ok(())
	}
}

/// Host part of a referrer, which may be a full URL or a bare host.
fn referrer_host(referrer: &str) -> &str {
	let without_scheme =
		referrer.split_once("://").map(|(_, rest)| rest).unwrap_or(referrer).trim();
	let end = without_scheme.find(['/', ':', '?', '#']).unwrap_or(without_scheme.len());

	&without_scheme[..end]
}

/// `allowed` is an exact host or a `*.` wildcard that matches any subdomain.
fn host_matches(allowed: &str, host: &str) -> bool {
	if host.is_empty() {
		return false;
	}

	match allowed.strip_prefix("*.") {
		Some(suffix) => {
			let host = host.to_ascii_lowercase();
			let suffix = suffix.to_ascii_lowercase();

			host.len() > suffix.len() + 1
				&& host.ends_with(&suffix)
				&& host[..host.len() - suffix.len()].ends_with('.')
		},
		None => allowed.eq_ignore_ascii_case(host),
	}
}

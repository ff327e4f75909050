mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Backend, Config, EventSink, Events, Highlight, Personalization, Postgres, Queue, Search,
	SearchableField, Service, Storage, Suggest,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.backend.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "backend.api_base must be non-empty.".to_string(),
		});
	}
	if !is_valid_namespace_part(&cfg.backend.index_prefix) {
		return Err(Error::Validation {
			message:
				"backend.index_prefix must be non-empty lowercase ASCII letters, digits, '-' or '_'."
					.to_string(),
		});
	}
	if cfg.backend.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "backend.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.queue.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "queue.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.queue.topic.trim().is_empty() {
		return Err(Error::Validation { message: "queue.topic must be non-empty.".to_string() });
	}

	for (label, headers) in
		[("backend", &cfg.backend.default_headers), ("queue", &cfg.queue.default_headers)]
	{
		if headers.values().any(|value| !value.is_string()) {
			return Err(Error::Validation {
				message: format!("{label}.default_headers values must be strings."),
			});
		}
	}

	if cfg.search.searchable_fields.is_empty() {
		return Err(Error::Validation {
			message: "search.searchable_fields must be non-empty.".to_string(),
		});
	}

	for field in &cfg.search.searchable_fields {
		if field.field.trim().is_empty() {
			return Err(Error::Validation {
				message: "search.searchable_fields.field must be non-empty.".to_string(),
			});
		}
		if !field.boost.is_finite() || field.boost <= 0.0 {
			return Err(Error::Validation {
				message: "search.searchable_fields.boost must be a finite number greater than zero."
					.to_string(),
			});
		}
	}

	if !cfg.search.phrase_boost.is_finite() || cfg.search.phrase_boost < 0.0 {
		return Err(Error::Validation {
			message: "search.phrase_boost must be a finite number, zero or greater.".to_string(),
		});
	}
	if cfg.search.bucket_limit == 0 {
		return Err(Error::Validation {
			message: "search.bucket_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.highlight.fragment_size == 0 || cfg.search.highlight.fragments == 0 {
		return Err(Error::Validation {
			message: "search.highlight.fragment_size and fragments must be greater than zero."
				.to_string(),
		});
	}
	if cfg.search.suggest.field.trim().is_empty() {
		return Err(Error::Validation {
			message: "search.suggest.field must be non-empty.".to_string(),
		});
	}
	if cfg.personalization.enabled {
		if cfg.personalization.plugin.trim().is_empty() {
			return Err(Error::Validation {
				message: "personalization.plugin must be non-empty when enabled.".to_string(),
			});
		}
		if cfg.personalization.recent_interactions == 0 {
			return Err(Error::Validation {
				message: "personalization.recent_interactions must be greater than zero."
					.to_string(),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.admin_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.service.admin_key = None;
	}
	if cfg.backend.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.backend.api_key = None;
	}
	if cfg.queue.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.queue.api_key = None;
	}

	cfg.backend.api_base = cfg.backend.api_base.trim_end_matches('/').to_string();
	cfg.queue.api_base = cfg.queue.api_base.trim_end_matches('/').to_string();
}

fn is_valid_namespace_part(value: &str) -> bool {
	!value.is_empty()
		&& value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

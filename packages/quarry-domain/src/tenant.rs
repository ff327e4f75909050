use serde::{Deserialize, Serialize};

/// Separator between application and index ids in event-log partition keys.
pub const EVENT_KEY_SEPARATOR: &str = "~~";

/// Addresses one index of one application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantReference {
	pub app_id: String,
	pub index_id: String,
}
impl TenantReference {
	pub fn new(app_id: impl Into<String>, index_id: impl Into<String>) -> Self {
		Self { app_id: app_id.into(), index_id: index_id.into() }
	}

	/// Both ids are non-empty and drawn from `[a-z0-9-]`.
	///
	/// Within that alphabet [`Self::namespace`] and [`Self::event_key`] are injective, so an
	/// incomplete reference addresses nothing.
	pub fn is_complete(&self) -> bool {
		is_valid_id(&self.app_id) && is_valid_id(&self.index_id)
	}

	/// Backend namespace (index name) holding this tenant's documents.
	pub fn namespace(&self, prefix: &str) -> String {
		format!("{prefix}_{}_{}", self.app_id, self.index_id)
	}

	/// Partition key of this tenant's hash chain in the event log.
	pub fn event_key(&self) -> String {
		format!("{}{EVENT_KEY_SEPARATOR}{}", self.app_id, self.index_id)
	}
}

fn is_valid_id(id: &str) -> bool {
	!id.is_empty() && id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn namespace_is_prefixed() {
		let tenant = TenantReference::new("shop-eu", "products-en");

		assert_eq!(tenant.namespace("quarry"), "quarry_shop-eu_products-en");
		assert_eq!(tenant.event_key(), "shop-eu~~products-en");
	}

	#[test]
	fn blank_ids_are_incomplete() {
		assert!(!TenantReference::new("", "products").is_complete());
		assert!(!TenantReference::new("shop", "  ").is_complete());
		assert!(TenantReference::new("shop", "products").is_complete());
	}

	#[test]
	fn ids_that_would_collide_are_incomplete() {
		for tenant in [
			TenantReference::new("Shop", "products"),
			TenantReference::new("shop.eu", "products"),
			TenantReference::new("shop_eu", "products"),
			TenantReference::new("shop", " products"),
			TenantReference::new("a~~b", "c"),
			TenantReference::new("a", "b~~c"),
		] {
			assert!(!tenant.is_complete(), "{tenant:?} should be rejected");
		}

		assert!(TenantReference::new("shop-eu", "products").is_complete());
	}
}

//! Backend-neutral value objects shared by the gateway crates.

pub mod aggregation;
pub mod event;
pub mod filter;
pub mod item;
pub mod query;
pub mod result;
pub mod tenant;
pub mod time_serde;
pub mod token;

mod error;

pub use aggregation::Aggregation;
pub use error::{Error, Result};
pub use event::{DomainEvent, EventPayload};
pub use filter::{Filter, FilterKind, GeoShape, Policy, RangeBounds};
pub use item::{Coordinate, Item, ItemUuid};
pub use query::{Query, QueryFlags, SortOrder, SortSpec, User};
pub use result::{Counter, ResultAggregation, SearchResult};
pub use tenant::TenantReference;
pub use token::{Token, TokenAccess, TokenRejection};

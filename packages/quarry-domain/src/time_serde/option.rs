use serde::{Deserialize as _, Deserializer, Serializer, de::Error as _};
use time::OffsetDateTime;

pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	match value {
		Some(value) => super::serialize(value, serializer),
		None => serializer.serialize_none(),
	}
}

/// Absent, `null`, and blank strings all read as `None`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<String>::deserialize(deserializer)? {
		Some(raw) if !raw.trim().is_empty() => super::parse(&raw).map(Some).map_err(D::Error::custom),
		_ => Ok(None),
	}
}

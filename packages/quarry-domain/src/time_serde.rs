//! RFC 3339 timestamps on the wire, always carried in UTC.

pub mod option;

use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::Error as _};
use time::{OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339};

pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let formatted = value.to_offset(UtcOffset::UTC).format(&Rfc3339).map_err(S::Error::custom)?;

	serializer.serialize_str(&formatted)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
	D: Deserializer<'de>,
{
	parse(&String::deserialize(deserializer)?).map_err(D::Error::custom)
}

pub(crate) fn parse(raw: &str) -> Result<OffsetDateTime, String> {
	OffsetDateTime::parse(raw.trim(), &Rfc3339)
		.map(|value| value.to_offset(UtcOffset::UTC))
		.map_err(|err| format!("'{raw}' is not an RFC 3339 timestamp: {err}"))
}

#[cfg(test)]
mod tests {
	use serde::{Deserialize, Serialize};

	use super::*;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Stamp {
		#[serde(with = "crate::time_serde")]
		at: OffsetDateTime,
		#[serde(with = "crate::time_serde::option", default)]
		until: Option<OffsetDateTime>,
	}

	#[test]
	fn offsets_normalize_to_utc() {
		let stamp: Stamp =
			serde_json::from_value(serde_json::json!({ "at": "2026-03-01T12:00:00+02:00" }))
				.expect("Failed to decode stamp.");

		assert_eq!(stamp.at, time::macros::datetime!(2026-03-01 10:00 UTC));
		assert_eq!(stamp.until, None);
		assert_eq!(
			serde_json::to_value(&stamp).expect("Failed to encode stamp."),
			serde_json::json!({ "at": "2026-03-01T10:00:00Z", "until": null })
		);
	}

	#[test]
	fn rejects_other_formats() {
		let err = serde_json::from_value::<Stamp>(serde_json::json!({ "at": "01/03/2026" }))
			.expect_err("Expected a format error.");

		assert!(err.to_string().contains("RFC 3339"));
	}
}

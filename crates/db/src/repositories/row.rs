//! Decode helpers shared by the SQL repositories. Timestamps are stored
//! as RFC 3339 text and money as decimal strings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::RepositoryError;

pub(crate) fn parse_timestamp(field: &str, raw: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|_| RepositoryError::Decode(format!("invalid timestamp in `{field}`: `{raw}`")))
}

pub(crate) fn parse_optional_timestamp(
    field: &str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.map(|value| parse_timestamp(field, value)).transpose()
}

pub(crate) fn parse_decimal(field: &str, raw: String) -> Result<Decimal, RepositoryError> {
    raw.parse::<Decimal>()
        .map_err(|_| RepositoryError::Decode(format!("invalid decimal in `{field}`: `{raw}`")))
}

pub(crate) fn parse_u32(field: &str, raw: i64) -> Result<u32, RepositoryError> {
    u32::try_from(raw)
        .map_err(|_| RepositoryError::Decode(format!("negative count in `{field}`: `{raw}`")))
}

//! Timestamp parsing for CMS payloads and pt-BR display formatting.

use time::{
    OffsetDateTime, format_description::FormatItem, format_description::well_known::Rfc3339,
    macros::format_description,
};

use super::error::DomainError;

/// Timestamps the CMS emits with a colon-less offset, e.g. `2021-03-25T19:25:28+0000`.
const CMS_TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
);

const MONTHS_PT_BR: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

pub fn parse_cms_timestamp(raw: &str) -> Result<OffsetDateTime, DomainError> {
    let trimmed = raw.trim();
    OffsetDateTime::parse(trimmed, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(trimmed, CMS_TIMESTAMP_FORMAT))
        .map_err(|err| DomainError::validation(format!("invalid timestamp `{raw}`: {err}")))
}

/// `25 mar 2021`
pub fn format_day(value: OffsetDateTime) -> String {
    let month = MONTHS_PT_BR[usize::from(u8::from(value.month())) - 1];
    format!("{:02} {} {}", value.day(), month, value.year())
}

/// `25 mar 2021, às 19:25`
pub fn format_edited(value: OffsetDateTime) -> String {
    format!(
        "{}, às {:02}:{:02}",
        format_day(value),
        value.hour(),
        value.minute()
    )
}

pub fn iso_datetime(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_default()
}

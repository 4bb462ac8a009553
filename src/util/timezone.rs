use chrono::{DateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use time::{OffsetDateTime, UtcOffset};

/// Shift `time` to the wall-clock offset `tz` observes at that instant.
pub fn localized(time: OffsetDateTime, tz: Tz) -> OffsetDateTime {
    let offset_seconds = DateTime::<Utc>::from_timestamp(time.unix_timestamp(), 0)
        .map(|utc| {
            tz.offset_from_utc_datetime(&utc.naive_utc())
                .fix()
                .local_minus_utc()
        })
        .unwrap_or(0);

    match UtcOffset::from_whole_seconds(offset_seconds) {
        Ok(offset) => time.to_offset(offset),
        Err(_) => time,
    }
}

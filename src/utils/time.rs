use time::OffsetDateTime;
use time::macros::format_description;

/// Milliseconds since the Unix epoch, saturating at zero for clocks set before 1970.
pub fn now_millis() -> u64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    (nanos / 1_000_000).max(0) as u64
}

/// Format an epoch-millisecond timestamp as `HH:MM` in UTC.
///
/// Out-of-range timestamps render as `--:--`.
pub fn format_clock(timestamp_ms: u64) -> String {
    let nanos = i128::from(timestamp_ms) * 1_000_000;
    let Ok(datetime) = OffsetDateTime::from_unix_timestamp_nanos(nanos) else {
        return "--:--".to_string();
    };
    datetime
        .format(format_description!("[hour]:[minute]"))
        .unwrap_or_else(|_| "--:--".to_string())
}

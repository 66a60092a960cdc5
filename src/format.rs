//! Display formatting for playback times and episode dates.

use chrono::{DateTime, NaiveDate};

/// Formats a position in seconds as `M:SS`.
///
/// Minutes are not wrapped into hours, so a 75 minute episode reads `75:03`.
/// Unknown values (NaN, infinite, negative) render as `0:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }

    let total = seconds.floor() as u64;
    let minutes = total / 60;
    let remaining = total % 60;
    format!("{minutes}:{remaining:02}")
}

/// Formats an ISO date (`2024-03-05`) or RFC 3339 timestamp as `Mar 5, 2024`.
///
/// Strings that parse as neither are returned unchanged.
pub fn format_date(date: &str) -> String {
    let trimmed = date.trim();

    let parsed = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.date_naive())
        });

    match parsed {
        Some(day) => day.format("%b %-d, %Y").to_string(),
        None => {
            tracing::debug!("Unrecognized episode date: {}", date);
            date.to_string()
        }
    }
}

/// Formats a playback rate multiplier the way the speed button shows it (`1.25x`, `2x`).
pub fn format_rate(rate: f32) -> String {
    format!("{rate}x")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(9.99), "0:09");
        assert_eq!(format_time(61.0), "1:01");
        assert_eq!(format_time(4503.2), "75:03");
    }

    #[test]
    fn test_format_time_unknown_values() {
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(f64::INFINITY), "0:00");
        assert_eq!(format_time(-3.0), "0:00");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2024-03-05"), "Mar 5, 2024");
        assert_eq!(format_date("2023-12-31T22:10:00Z"), "Dec 31, 2023");
        assert_eq!(format_date("last tuesday"), "last tuesday");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(1.0), "1x");
        assert_eq!(format_rate(1.25), "1.25x");
        assert_eq!(format_rate(0.75), "0.75x");
    }
}

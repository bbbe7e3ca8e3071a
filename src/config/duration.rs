//! Duration strings used in config files and environment overrides.
//!
//! Two spellings are accepted:
//! - clock form `HH:MM:SS` (e.g. `00:01:00`)
//! - unit form `<n>ms`, `<n>s`, `<n>m`, `<n>h`; a bare integer means seconds

use std::time::Duration;

/// Parse a duration string.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    if s.contains(':') {
        return parse_clock(s);
    }

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{}'", input))?;

    let too_long = || format!("duration '{}' is too long", input);
    let duration = match unit.trim() {
        "" | "s" => Duration::from_secs(value),
        "ms" => Duration::from_millis(value),
        "m" => Duration::from_secs(value.checked_mul(60).ok_or_else(too_long)?),
        "h" => Duration::from_secs(value.checked_mul(3600).ok_or_else(too_long)?),
        other => return Err(format!("unknown duration unit '{}' in '{}'", other, input)),
    };
    Ok(duration)
}

fn parse_clock(s: &str) -> Result<Duration, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return Err(format!("expected HH:MM:SS, got '{}'", s));
    }

    let mut fields = [0u64; 3];
    for (slot, part) in fields.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("invalid clock field '{}' in '{}'", part, s))?;
    }
    let [hours, minutes, seconds] = fields;
    if minutes >= 60 || seconds >= 60 {
        return Err(format!("minutes and seconds must be below 60 in '{}'", s));
    }

    hours
        .checked_mul(3600)
        .and_then(|secs| secs.checked_add(minutes * 60 + seconds))
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too long", s))
}

/// Render a duration in unit form, picking the largest exact unit.
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    if millis % 1000 != 0 {
        return format!("{}ms", millis);
    }
    let secs = d.as_secs();
    if secs != 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs != 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Serde adapter for `#[serde(with = "...")]` on `Duration` fields.
pub mod serde_str {
    use std::time::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_form() {
        assert_eq!(parse_duration("00:01:00").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("01:00:30").unwrap(), Duration::from_secs(3630));
        assert!(parse_duration("00:61:00").is_err());
        assert!(parse_duration("01:00").is_err());
    }

    #[test]
    fn test_unit_form() {
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert!(parse_duration("10 parsecs").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_oversized_values_are_errors() {
        assert!(parse_duration("5124095576030432:00:00").is_err());
        assert!(parse_duration("9999999999999999999:00:00").is_err());
        assert!(parse_duration("18446744073709551615h").is_err());
        assert!(parse_duration("18446744073709551615m").is_err());
        assert_eq!(
            parse_duration("5124095576030431:00:00").unwrap(),
            Duration::from_secs(5_124_095_576_030_431 * 3600)
        );
    }

    #[test]
    fn test_format_picks_largest_unit() {
        assert_eq!(format_duration(Duration::from_secs(60)), "1m");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(format_duration(Duration::from_secs(61)), "61s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
    }
}

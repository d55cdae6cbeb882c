// Interval parsing - Human-readable durations such as "30s", "15m", "24h", "7d"

use crate::error::MonitorError;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Parse an interval string into a `Duration`.
///
/// A bare number is taken as seconds. Units: `s`, `m`, `h`, `d`.
pub fn parse_interval(interval_str: &str) -> Result<Duration, MonitorError> {
    let interval_str = interval_str.trim();

    if let Ok(seconds) = interval_str.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let interval_str = interval_str.to_lowercase();
    let Some(unit) = interval_str.chars().last() else {
        return Err(MonitorError::config("empty interval"));
    };

    let value = interval_str[..interval_str.len() - unit.len_utf8()]
        .trim()
        .parse::<u64>()
        .map_err(|e| MonitorError::config(format!("invalid interval '{}': {}", interval_str, e)))?;

    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        _ => {
            return Err(MonitorError::config(format!(
                "invalid interval unit '{}' (use s, m, h, or d)",
                unit
            )));
        }
    };

    value
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| MonitorError::config(format!("interval '{}' is too large", interval_str)))
}

/// Render a duration with the largest unit that divides it
pub fn format_interval(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs > 0 && secs % 86400 == 0 {
        format!("{}d", secs / 86400)
    } else if secs > 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs > 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Serde helper: accept either a duration string or a bare number of seconds
pub fn deserialize_interval<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(s) => Ok(Duration::from_secs(s)),
        Raw::Text(s) => parse_interval(&s).map_err(serde::de::Error::custom),
    }
}

/// Serde helper: write a duration in its short string form
pub fn serialize_interval<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_interval(*duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_interval("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_interval("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_interval("24h").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_interval("7d").unwrap(), Duration::from_secs(604800));
        assert_eq!(parse_interval("2H").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn test_parse_interval_errors() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("h").is_err());
        assert!(parse_interval("10w").is_err());
        assert!(parse_interval("-5m").is_err());
        assert!(matches!(
            parse_interval("soon"),
            Err(MonitorError::Config { .. })
        ));
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(Duration::from_secs(86400)), "1d");
        assert_eq!(format_interval(Duration::from_secs(7200)), "2h");
        assert_eq!(format_interval(Duration::from_secs(90)), "90s");
        assert_eq!(format_interval(Duration::from_secs(0)), "0s");
    }
}

/// Time unit used when reading durations from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
}

impl std::str::FromStr for TimeUnit {
    type Err = String;

    /// Parse TimeUnit from its full lowercase name: "milliseconds", "seconds", "minutes", "hours".
    /// For shorthand notations like "16ms" or "2s", use `parse_duration` instead.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "milliseconds" => Ok(TimeUnit::Milliseconds),
            "seconds" => Ok(TimeUnit::Seconds),
            "minutes" => Ok(TimeUnit::Minutes),
            "hours" => Ok(TimeUnit::Hours),
            _ => Err(format!("Invalid time unit: {}", s)),
        }
    }
}

impl TimeUnit {
    pub fn to_seconds(&self, value: f64) -> f64 {
        match self {
            TimeUnit::Milliseconds => value / 1000.0,
            TimeUnit::Seconds => value,
            TimeUnit::Minutes => value * 60.0,
            TimeUnit::Hours => value * 3600.0,
        }
    }

    /// Parse a duration string like "16ms", "2s", "1.5m"
    /// Returns (value, TimeUnit) if successful
    ///
    /// Strict rules:
    /// - Only lowercase suffixes are accepted: "ms", "s", "m", "h"
    /// - Format must be: <number><suffix> (e.g., "5s", "100ms", "0.5s")
    /// - No spaces allowed between number and suffix
    pub fn parse_duration(s: &str) -> Option<(f64, TimeUnit)> {
        let s = s.trim();

        let split_pos = s
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
            .map(|(i, _)| i)?;

        if split_pos == 0 {
            return None;
        }

        let (num_str, unit_str) = s.split_at(split_pos);
        let value = num_str.parse::<f64>().ok()?;

        let time_unit = match unit_str {
            "ms" => TimeUnit::Milliseconds,
            "s" => TimeUnit::Seconds,
            "m" => TimeUnit::Minutes,
            "h" => TimeUnit::Hours,
            _ => return None,
        };

        Some((value, time_unit))
    }

    /// Parse either a shorthand duration ("250ms") or a bare number of seconds ("0.25").
    pub fn parse_seconds(s: &str) -> Option<f64> {
        if let Some((value, unit)) = Self::parse_duration(s) {
            return Some(unit.to_seconds(value));
        }
        s.trim().parse::<f64>().ok()
    }
}

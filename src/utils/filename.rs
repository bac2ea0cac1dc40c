//! Default output filename generation

use chrono::{DateTime, TimeZone};
use std::fmt::Display;

/// Extension used for generated output names
pub const DEFAULT_EXTENSION: &str = "mov";

/// Build the default output filename for a recording started at `now`.
///
/// Pure function of the timestamp, e.g. `camsnap-2026-10-16-142530.mov`.
pub fn default_filename<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("camsnap-{}.{}", now.format("%Y-%m-%d-%H%M%S"), DEFAULT_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_default_filename_is_timestamped() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 14, 25, 30).unwrap();
        assert_eq!(default_filename(&now), "camsnap-2026-10-16-142530.mov");
    }

    #[test]
    fn test_default_filename_is_deterministic() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(default_filename(&now), default_filename(&now));
    }
}

//! Wall-clock abstraction
//!
//! The bridge stamps republished measurements with a wall-clock time that
//! ultimately comes from an external time source (NTP on the device). The
//! [`Clock`] trait keeps that dependency injectable so dispatch logic can be
//! tested with a fixed clock.

use chrono::Local;

/// Timestamp format used in enriched payloads
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of human-readable timestamps
pub trait Clock: Send + Sync {
    /// Current local time formatted as `YYYY-MM-DD HH:MM:SS`
    fn timestamp(&self) -> String;
}

/// Clock backed by the system's local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn timestamp(&self) -> String {
        Local::now().format(TIMESTAMP_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_format() {
        let ts = SystemClock.timestamp();
        // YYYY-MM-DD HH:MM:SS is always 19 characters
        assert_eq!(ts.len(), 19);
        assert_eq!(ts.as_bytes()[4], b'-');
        assert_eq!(ts.as_bytes()[10], b' ');
        assert_eq!(ts.as_bytes()[13], b':');
    }
}

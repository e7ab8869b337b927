//! Timeout validation and conversion to poll slices

use crate::error::{Result, SmartIoError};
use nix::poll::PollTimeout;
use std::time::Duration;

/// Validate a timeout given in (possibly fractional) seconds
///
/// NaN is not a number of seconds and is a type mismatch; negative or
/// unrepresentable values are invalid arguments. A zero timeout is valid and
/// means "poll once".
pub fn timeout_from_secs(secs: f64) -> Result<Duration> {
    if secs.is_nan() {
        return Err(SmartIoError::type_mismatch("timeout is not a number"));
    }
    if secs < 0.0 {
        return Err(SmartIoError::invalid_argument(format!(
            "timeout must not be negative (got {})",
            secs
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|_| SmartIoError::invalid_argument(format!("timeout {} is out of range", secs)))
}

/// Parse a timeout from text
///
/// Accepts plain seconds ("0.5"), humantime durations ("250ms", "2s") and
/// "none"/"forever" for an unbounded wait.
pub fn parse_timeout(input: &str) -> Result<Option<Duration>> {
    let input = input.trim();

    if input.eq_ignore_ascii_case("none") || input.eq_ignore_ascii_case("forever") {
        return Ok(None);
    }

    if let Ok(secs) = input.parse::<f64>() {
        return timeout_from_secs(secs).map(Some);
    }

    humantime::parse_duration(input)
        .map(Some)
        .map_err(|e| SmartIoError::type_mismatch(format!("timeout '{}' is not numeric: {}", input, e)))
}

/// Convert the time left before a deadline into a single poll timeout
///
/// Milliseconds are rounded up so a wait never ends early because of
/// truncation; long waits are split into slices of at most `u16::MAX` ms.
pub(crate) fn poll_slice(remaining: Duration) -> PollTimeout {
    let millis = remaining.as_nanos().div_ceil(1_000_000);
    PollTimeout::from(millis.min(u16::MAX as u128) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_from_secs() {
        assert_eq!(timeout_from_secs(0.0).unwrap(), Duration::ZERO);
        assert_eq!(timeout_from_secs(0.25).unwrap(), Duration::from_millis(250));
        assert!(matches!(
            timeout_from_secs(-5.0),
            Err(SmartIoError::InvalidArgument(_))
        ));
        assert!(matches!(
            timeout_from_secs(f64::NAN),
            Err(SmartIoError::TypeMismatch(_))
        ));
        assert!(matches!(
            timeout_from_secs(f64::INFINITY),
            Err(SmartIoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("none").unwrap(), None);
        assert_eq!(parse_timeout("Forever").unwrap(), None);
        assert_eq!(parse_timeout("1.5").unwrap(), Some(Duration::from_millis(1500)));
        assert_eq!(parse_timeout("250ms").unwrap(), Some(Duration::from_millis(250)));
        assert_eq!(parse_timeout(" 0 ").unwrap(), Some(Duration::ZERO));

        assert!(matches!(parse_timeout("-5"), Err(SmartIoError::InvalidArgument(_))));
        assert!(matches!(parse_timeout("soon"), Err(SmartIoError::TypeMismatch(_))));
    }

    #[test]
    fn test_poll_slice_rounds_up() {
        assert_eq!(poll_slice(Duration::ZERO), PollTimeout::ZERO);
        assert_eq!(poll_slice(Duration::from_micros(300)), PollTimeout::from(1u16));
        assert_eq!(poll_slice(Duration::from_millis(20)), PollTimeout::from(20u16));
        assert_eq!(poll_slice(Duration::from_secs(3600)), PollTimeout::from(u16::MAX));
    }
}

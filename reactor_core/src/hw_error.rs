//! Maps `Box<dyn Error>` from trait boundaries to typed `ReactorError`.
//!
//! The traits in `reactor_traits` use `Box<dyn Error + Send + Sync>` so any
//! backend can plug in; this module converts those to our typed error enum, with
//! an optional feature-gated path for `reactor_hardware::HwError` downcasting.

use crate::error::ReactorError;

/// Map an actuator error to a typed `ReactorError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_executor_error(e: &(dyn std::error::Error + 'static)) -> ReactorError {
    #[cfg(feature = "hardware-errors")]
    {
        use reactor_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout | HwError::TransferTimeout { .. } => ReactorError::Timeout,
                HwError::Cancelled => ReactorError::Cancelled,
                HwError::InvalidRequest(msg) => ReactorError::InvalidInput(msg.clone()),
                other => ReactorError::Executor(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        ReactorError::Timeout
    } else {
        ReactorError::Executor(s)
    }
}

/// Convenience for `map_err` on trait calls.
pub(crate) fn to_report(e: reactor_traits::BoxError) -> eyre::Report {
    eyre::Report::new(map_executor_error(&*e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hardware_errors_map_to_typed_variants() {
        use reactor_hardware::HwError;
        use reactor_traits::Pump;

        let timeout = HwError::TransferTimeout {
            pump: Pump::Media,
            ms: 10,
        };
        assert_eq!(map_executor_error(&timeout), ReactorError::Timeout);
        assert_eq!(map_executor_error(&HwError::Cancelled), ReactorError::Cancelled);
        assert!(matches!(
            map_executor_error(&HwError::Pump(Pump::Waste, "jammed".into())),
            ReactorError::Executor(m) if m.contains("jammed")
        ));
    }

    #[test]
    fn foreign_errors_fall_back_to_message() {
        let e = std::io::Error::other("device timeout");
        assert_eq!(map_executor_error(&e), ReactorError::Timeout);
        let e = std::io::Error::other("bus fault");
        assert_eq!(
            map_executor_error(&e),
            ReactorError::Executor("bus fault".into())
        );
    }
}

// =============================================================================
// Core error types
// =============================================================================
//
// Only genuinely caller-facing failures get a typed variant. Insufficient
// indicator data is NOT an error: indicator functions return empty series or
// `None` and callers fall back to neutral behaviour, so that failure mode
// never crosses a module boundary as an `Err`.

use thiserror::Error;

/// Errors surfaced by the portfolio coordination core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A configuration parameter is out of range or inconsistent.
    /// Fatal at construction time; the portfolio never starts.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// `add_strategy` was called with an id that is already registered.
    /// Non-fatal: the existing registration is left untouched.
    #[error("strategy already registered: {0}")]
    StrategyAlreadyRegistered(String),

    /// An operation referenced a strategy id that is not registered.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    /// The executor capability failed while placing or closing orders.
    /// Contained: de-risk actions log and continue past these.
    #[error("executor error: {0}")]
    Executor(#[from] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_detail() {
        let e = CoreError::InvalidConfig("total_capital must be positive".into());
        assert!(e.to_string().contains("total_capital"));

        let e = CoreError::UnknownStrategy("momentum-a".into());
        assert_eq!(e.to_string(), "unknown strategy: momentum-a");
    }

    #[test]
    fn executor_error_wraps_anyhow() {
        let inner = anyhow::anyhow!("connection reset");
        let e: CoreError = inner.into();
        assert!(matches!(e, CoreError::Executor(_)));
        assert!(e.to_string().contains("connection reset"));
    }
}

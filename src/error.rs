use thiserror::Error;

/// Result alias for coordinator-facing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the coordination layer.
///
/// Provider failures and hook vetoes both land in [`Error::Operation`]: from
/// the caller's perspective the operation did not complete, and `cause`
/// carries the most specific diagnostic available.
#[derive(Debug, Error)]
pub enum Error {
    /// A lifecycle operation failed in the provider or was vetoed by a hook.
    #[error("failed to {operation} service '{service}': {cause}")]
    Operation {
        operation: &'static str,
        service: String,
        cause: String,
    },

    /// Invalid input to the API itself. Programmer error, never retried.
    #[error("invalid input: {0}")]
    Configuration(String),

    /// No provider could be resolved for the requested init flavor.
    #[error("no service provider for init system '{0}'")]
    ProviderResolution(String),

    /// A delayed action failed during the drain pass. Entries sorted after
    /// the failing one were not executed; `applied` lists the services whose
    /// actions already ran.
    #[error("delayed {action} failed for service '{service}' after {} completed action(s): {cause}", .applied.len())]
    Drain {
        service: String,
        action: &'static str,
        applied: Vec<String>,
        cause: String,
    },
}

impl Error {
    pub(crate) fn operation(
        operation: &'static str,
        service: &str,
        cause: impl Into<String>,
    ) -> Self {
        Error::Operation {
            operation,
            service: service.to_string(),
            cause: cause.into(),
        }
    }
}

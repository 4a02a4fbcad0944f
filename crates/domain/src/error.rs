/// Shared error type used across every crate in the workspace.
///
/// Variants mirror the eight error kinds of the propagation policy:
/// configuration/validation failures are fatal at load time, provider
/// failures split into `Transient` (retriable) and `Permanent` (surfaced),
/// timeouts are treated as transient, and the remaining four cover
/// consensus, session, dependency-graph, and cancellation failures.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuration: {0}")]
    Configuration(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("provider {provider} (transient): {message}")]
    ProviderTransient { provider: String, message: String },

    #[error("provider {provider}: {message}")]
    ProviderPermanent { provider: String, message: String },

    #[error("timeout after {elapsed_ms}ms: {operation}")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("consensus failure: {0}")]
    ConsensusFailure(String),

    #[error("session: {0}")]
    Session(String),

    #[error("dependency graph: {0}")]
    Dependency(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether a retry loop should treat this as recoverable. Timeouts and
    /// transient provider errors qualify; everything else does not.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::ProviderTransient { .. })
    }

    /// Build a provider error from an HTTP status code, classifying 5xx and
    /// 429 as transient (retriable) and everything else as permanent.
    pub fn provider_from_status(
        provider: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        let provider = provider.into();
        let message = message.into();
        if status == 429 || (500..600).contains(&status) {
            Error::ProviderTransient { provider, message }
        } else {
            Error::ProviderPermanent { provider, message }
        }
    }

    /// The diagnostic error kind, used for the short code surfaced alongside
    /// every user-visible failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration_error",
            Error::Validation(_) => "validation_error",
            Error::ProviderTransient { .. } => "provider_error_transient",
            Error::ProviderPermanent { .. } => "provider_error_permanent",
            Error::Timeout { .. } => "timeout_error",
            Error::ConsensusFailure(_) => "consensus_failure",
            Error::Session(_) => "session_error",
            Error::Dependency(_) => "dependency_error",
            Error::Cancelled(_) => "cancellation_error",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Other(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_transient_are_retriable() {
        assert!(Error::Timeout { operation: "x".into(), elapsed_ms: 10 }.is_retriable());
        assert!(Error::ProviderTransient { provider: "p".into(), message: "5xx".into() }.is_retriable());
    }

    #[test]
    fn permanent_errors_are_not_retriable() {
        assert!(!Error::ProviderPermanent { provider: "p".into(), message: "401".into() }.is_retriable());
        assert!(!Error::Validation("bad schema".into()).is_retriable());
        assert!(!Error::ConsensusFailure("tie".into()).is_retriable());
    }

    #[test]
    fn kind_codes_are_stable() {
        assert_eq!(Error::Session("not found".into()).kind(), "session_error");
        assert_eq!(Error::Dependency("cycle".into()).kind(), "dependency_error");
    }
}

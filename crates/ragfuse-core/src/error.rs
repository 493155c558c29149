use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoSuccessfulResponses,
    InvalidHybridWeights,
    InvalidConfig,
    ConfigParseError,
    RequestParseError,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NoSuccessfulResponses => "E2001",
            Self::InvalidHybridWeights => "E2002",
            Self::InvalidConfig => "E1001",
            Self::ConfigParseError => "E1002",
            Self::RequestParseError => "E1003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NoSuccessfulResponses => "No successful technique responses",
            Self::InvalidHybridWeights => "Hybrid weights are out of range",
            Self::InvalidConfig => "Invalid aggregation configuration",
            Self::ConfigParseError => "Config file parse error",
            Self::RequestParseError => "Request document parse error",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NoSuccessfulResponses => {
                Some("Supply at least one technique response with status `completed`.")
            }
            Self::InvalidHybridWeights => {
                Some("Choose semantic and lexical weights in [0, 1] that add up to exactly 1.0.")
            }
            Self::InvalidConfig => {
                Some("Keep thresholds in [0, 1], max_results above 0, and weights non-negative.")
            }
            Self::ConfigParseError => Some("Fix syntax in .ragfuse/config.toml and retry."),
            Self::RequestParseError => {
                Some("Check the request JSON against the AggregateRequest shape.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the aggregation engine.
///
/// Only [`AggregateError::NoSuccessfulResponses`] can come out of a
/// well-configured aggregation call; the other variants reject bad inputs
/// before any scoring happens.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregateError {
    /// Every supplied response had a status other than `completed`.
    #[error("no successful technique responses ({total} supplied)")]
    NoSuccessfulResponses { total: usize },

    /// Pair scoring weights must each lie in `[0, 1]` and sum to 1.0.
    #[error(
        "hybrid weights must lie in [0, 1] and sum to 1.0 (semantic {semantic} + lexical {lexical})"
    )]
    InvalidHybridWeights { semantic: f64, lexical: f64 },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AggregateError {
    /// The stable error code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NoSuccessfulResponses { .. } => ErrorCode::NoSuccessfulResponses,
            Self::InvalidHybridWeights { .. } => ErrorCode::InvalidHybridWeights,
            Self::InvalidConfig(_) => ErrorCode::InvalidConfig,
        }
    }
}

use crate::provider::ServiceCode;
use thiserror::Error;

/// Result alias for core operations.
pub type ShadowResult<T> = Result<T, ShadowError>;

/// Exit code used when no `-errorcode` override is in effect.
pub const DEFAULT_ERROR_CODE_START: i32 = 1;

#[derive(Error, Debug)]
pub enum ShadowError {
    #[error("[SR1000] invalid argument: {0}")]
    InvalidArgument(String),

    #[error("[SR1100] `{input}` is not a usable volume or file share path: {reason}")]
    InvalidVolume { input: String, reason: String },

    #[error("[SR1200] configuration error: {0}")]
    InvalidConfig(String),

    #[error("[SR1201] toml config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("[SR1202] yaml config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("[SR2000] {operation} failed with {code}: {message}")]
    ServiceFault {
        operation: String,
        code: ServiceCode,
        message: String,
    },

    #[error("[SR2100] {operation} is not allowed: {state}")]
    InvalidState { operation: String, state: String },

    #[error("[SR3000] {operation} failed (os error {code}): {message}")]
    ResourceFault {
        operation: String,
        code: u32,
        message: String,
    },

    #[error("[SR3100] mount {drive} of {target} is not accessible: {reason}")]
    MountVerificationFailed {
        drive: String,
        target: String,
        reason: String,
    },

    #[error("[SR3001] io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("[SR4000] memory allocation error: {0}")]
    AllocationFailure(String),
}

impl From<std::collections::TryReserveError> for ShadowError {
    fn from(err: std::collections::TryReserveError) -> Self {
        ShadowError::AllocationFailure(err.to_string())
    }
}

impl ShadowError {
    pub fn code(&self) -> &'static str {
        match self {
            ShadowError::InvalidArgument(_) => "SR1000",
            ShadowError::InvalidVolume { .. } => "SR1100",
            ShadowError::InvalidConfig(_) => "SR1200",
            ShadowError::Toml(_) => "SR1201",
            ShadowError::Yaml(_) => "SR1202",
            ShadowError::ServiceFault { .. } => "SR2000",
            ShadowError::InvalidState { .. } => "SR2100",
            ShadowError::ResourceFault { .. } => "SR3000",
            ShadowError::Io(_) => "SR3001",
            ShadowError::MountVerificationFailed { .. } => "SR3100",
            ShadowError::AllocationFailure(_) => "SR4000",
        }
    }

    /// Map the fault onto the exit code band starting at `base`.
    ///
    /// Argument, volume and configuration problems report `base`, runtime
    /// faults `base + 1` and allocation failures `base + 2`.
    pub fn exit_code(&self, base: i32) -> i32 {
        match self {
            ShadowError::InvalidArgument(_)
            | ShadowError::InvalidVolume { .. }
            | ShadowError::InvalidConfig(_)
            | ShadowError::Toml(_)
            | ShadowError::Yaml(_) => base,
            ShadowError::ServiceFault { .. }
            | ShadowError::InvalidState { .. }
            | ShadowError::ResourceFault { .. }
            | ShadowError::MountVerificationFailed { .. }
            | ShadowError::Io(_) => base.wrapping_add(1),
            ShadowError::AllocationFailure(_) => base.wrapping_add(2),
        }
    }

    pub(crate) fn invalid_state(operation: &str, state: impl std::fmt::Display) -> Self {
        ShadowError::InvalidState {
            operation: operation.to_string(),
            state: state.to_string(),
        }
    }
}

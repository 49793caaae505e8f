/// Why a write (or a synchronous read) was refused.
///
/// Only synchronous failures end up here. Failures of background work are
/// reported through the attribute's state encoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("unknown command {0:?}")]
    InvalidCommand(String),
    #[error("operation already in progress")]
    AlreadyInProgress,
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("invalid value length")]
    InvalidLength,
    #[error("backend call failed")]
    BackendFailed,
    #[error("operation not supported")]
    NotSupported,
}

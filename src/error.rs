use thiserror::Error;

/// Failures surfaced by the engine. Per-window and per-subscriber faults are
/// absorbed and logged where they happen; only these reach callers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("engine is not initialized")]
    NotInitialized,

    #[error("engine is already initialized")]
    AlreadyInitialized,

    #[error("invalid (null) window identifier")]
    InvalidWindow,

    #[error("failed to install desktop state hook: {0}")]
    HookInstall(String),

    #[error("os call failed: {0}")]
    Os(String),
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;
use trellis_core::HistoryError;

/// Failures of a navigation attempt.
///
/// A vetoed navigation is not an error; it simply resolves `false`.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("beforeRouteChange hook failed: {0}")]
    BeforeHook(anyhow::Error),
    #[error("afterRouteChange hook failed: {0}")]
    AfterHook(anyhow::Error),
    #[error(transparent)]
    History(#[from] HistoryError),
    /// The default router was used before `global::install`.
    #[error("router has not been installed; call global::install with options first")]
    NotInitialized,
}

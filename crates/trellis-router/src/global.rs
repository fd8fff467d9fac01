//! Process-wide default router for callers that cannot thread a handle through.

use std::sync::{Arc, OnceLock};

use trellis_core::History;

use crate::{error::RouterError, options::RouterOptions, router::Router};

static ROUTER: OnceLock<Arc<Router>> = OnceLock::new();

/// Install the default router. Only the first call builds one; later calls
/// return it unchanged and ignore their arguments.
pub fn install(options: RouterOptions, history: Arc<dyn History>) -> Arc<Router> {
    Arc::clone(ROUTER.get_or_init(|| Arc::new(Router::new(options, history))))
}

/// The installed default router.
pub fn instance() -> Result<Arc<Router>, RouterError> {
    ROUTER.get().cloned().ok_or(RouterError::NotInitialized)
}

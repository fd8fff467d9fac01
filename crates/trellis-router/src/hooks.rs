use std::{fmt, future::Future, sync::Arc};

use futures::future::{BoxFuture, FutureExt};

use crate::error::RouterError;

/// `(to, from)` guard; `Ok(false)` vetoes the navigation.
pub type BeforeRouteChange =
    Arc<dyn Fn(String, String) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync>;

/// `(to, from)` callback run after subscribers saw the new state.
pub type AfterRouteChange =
    Arc<dyn Fn(String, String) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

pub type OnError = Arc<dyn Fn(&RouterError) + Send + Sync>;

/// Optional navigation hooks. Merging keeps any hook the update leaves unset.
#[derive(Clone, Default)]
pub struct RouterEventHandlers {
    pub before_route_change: Option<BeforeRouteChange>,
    pub after_route_change: Option<AfterRouteChange>,
    pub on_error: Option<OnError>,
}

impl RouterEventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before_route_change<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(String, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.before_route_change = Some(Arc::new(move |to: String, from: String| {
            hook(to, from).boxed()
        }));
        self
    }

    pub fn after_route_change<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(String, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.after_route_change = Some(Arc::new(move |to: String, from: String| {
            hook(to, from).boxed()
        }));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RouterError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Shallow merge: hooks set in `update` replace ours, the rest stay.
    pub fn merge(&mut self, update: RouterEventHandlers) {
        if update.before_route_change.is_some() {
            self.before_route_change = update.before_route_change;
        }
        if update.after_route_change.is_some() {
            self.after_route_change = update.after_route_change;
        }
        if update.on_error.is_some() {
            self.on_error = update.on_error;
        }
    }
}

impl fmt::Debug for RouterEventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterEventHandlers")
            .field("before_route_change", &self.before_route_change.is_some())
            .field("after_route_change", &self.after_route_change.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

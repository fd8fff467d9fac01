use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};
use trellis_core::{History, HistoryError, PopEvents, SubscriberSet, Subscription};

use crate::{
    error::RouterError,
    hooks::RouterEventHandlers,
    options::{RouterMode, RouterOptions},
    params::{parse_query, RouteParams, RouterState},
    pattern::RouteTable,
};

pub type Subscriber = dyn Fn(&RouterState) + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavigationKind {
    Push,
    Replace,
    Pop,
}

/// Navigation state machine over a host [`History`].
///
/// Every transition runs the same sequence: before-hook (may veto), state
/// commit, subscriber notification, after-hook. `push`/`replace` write the
/// history entry only after that sequence succeeded, so subscribers see the
/// new state even if the write itself then fails.
///
/// Concurrent navigations are not serialized. Two `push` calls in flight
/// interleave at their hook awaits and the state left behind is whichever
/// committed last.
pub struct Router {
    table: RouteTable,
    base_url: String,
    mode: RouterMode,
    history: Arc<dyn History>,
    state: RwLock<RouterState>,
    subscribers: SubscriberSet<Subscriber>,
    handlers: Mutex<RouterEventHandlers>,
}

impl Router {
    /// Build a router whose initial state comes from the current location.
    pub fn new(options: RouterOptions, history: Arc<dyn History>) -> Self {
        let router = Self {
            table: RouteTable::compile(&options.routes),
            base_url: options.base_url,
            mode: options.mode,
            history,
            state: RwLock::new(RouterState::default()),
            subscribers: SubscriberSet::new(),
            handlers: Mutex::new(RouterEventHandlers::default()),
        };
        let initial = router.resolve(&router.current_path());
        *router.state.write() = initial;
        router
    }

    pub fn mode(&self) -> RouterMode {
        self.mode
    }

    pub fn routes(&self) -> &RouteTable {
        &self.table
    }

    /// Copy of the current state.
    pub fn get_state(&self) -> RouterState {
        self.state.read().clone()
    }

    /// Run `subscriber` on every committed transition until unsubscribed.
    pub fn subscribe<F>(&self, subscriber: F) -> Subscription
    where
        F: Fn(&RouterState) + Send + Sync + 'static,
    {
        self.subscribers.insert(Arc::new(subscriber))
    }

    /// Merge hooks into the current set; hooks left unset in `handlers` stay.
    pub fn set_event_handler(&self, handlers: RouterEventHandlers) {
        self.handlers.lock().merge(handlers);
    }

    /// Navigate to `path`, adding a history entry. Resolves `false` when
    /// vetoed or when any step failed.
    pub async fn push(&self, path: &str, state: Option<Value>) -> bool {
        if !self.handle_route_change(NavigationKind::Push, path).await {
            return false;
        }
        let written = match self.mode {
            RouterMode::Hash => self.history.assign_hash(path),
            RouterMode::History => self
                .history
                .push_state(state.as_ref(), &format!("{}{}", self.base_url, path)),
        };
        self.finish_write(written)
    }

    /// Navigate to `path`, overwriting the current history entry.
    pub async fn replace(&self, path: &str, state: Option<Value>) -> bool {
        if !self.handle_route_change(NavigationKind::Replace, path).await {
            return false;
        }
        let written = match self.mode {
            RouterMode::Hash => {
                let location = self.history.location();
                self.history
                    .replace_location(&format!("{}#{}", location.pathname, path))
            }
            RouterMode::History => self
                .history
                .replace_state(state.as_ref(), &format!("{}{}", self.base_url, path)),
        };
        self.finish_write(written)
    }

    /// Step back in history. State changes once the host reports the pop.
    pub fn back(&self) {
        self.history.back();
    }

    /// Step forward in history. State changes once the host reports the pop.
    pub fn forward(&self) {
        self.history.forward();
    }

    /// Run a transition to whatever the host location now is.
    pub async fn handle_pop_state(&self) -> bool {
        let path = self.current_path();
        self.handle_route_change(NavigationKind::Pop, &path).await
    }

    /// Feed host pop events into [`Router::handle_pop_state`].
    ///
    /// The task ends when the event stream closes or the router is dropped.
    pub fn listen(self: &Arc<Self>, mut events: PopEvents) -> JoinHandle<()> {
        let router = Arc::downgrade(self);
        tokio::spawn(async move {
            while events.recv().await.is_some() {
                let Some(router) = router.upgrade() else {
                    break;
                };
                router.handle_pop_state().await;
            }
        })
    }

    #[instrument(skip(self))]
    async fn handle_route_change(&self, kind: NavigationKind, to: &str) -> bool {
        let from = self.state.read().current_path.clone();
        match self.transition(to, &from).await {
            Ok(committed) => committed,
            Err(err) => {
                self.report(&err);
                false
            }
        }
    }

    async fn transition(&self, to: &str, from: &str) -> Result<bool, RouterError> {
        let before = self.handlers.lock().before_route_change.clone();
        if let Some(before) = before {
            let proceed = before(to.to_string(), from.to_string())
                .await
                .map_err(RouterError::BeforeHook)?;
            if !proceed {
                debug!(to, from, "navigation vetoed");
                return Ok(false);
            }
        }

        let next = self.resolve(to);
        *self.state.write() = next.clone();
        self.notify(&next);

        let after = self.handlers.lock().after_route_change.clone();
        if let Some(after) = after {
            after(to.to_string(), from.to_string())
                .await
                .map_err(RouterError::AfterHook)?;
        }
        Ok(true)
    }

    fn finish_write(&self, written: Result<(), HistoryError>) -> bool {
        match written {
            Ok(()) => true,
            Err(err) => {
                self.report(&RouterError::from(err));
                false
            }
        }
    }

    fn report(&self, err: &RouterError) {
        let on_error = self.handlers.lock().on_error.clone();
        if let Some(on_error) = on_error {
            on_error(err);
        }
        error!(error = %err, "route change error");
    }

    fn notify(&self, state: &RouterState) {
        for subscriber in self.subscribers.snapshot() {
            subscriber(state);
        }
    }

    fn resolve(&self, path: &str) -> RouterState {
        let (route_id, params) = match self.table.find(path) {
            Some(found) => (Some(found.id.to_string()), found.params),
            None => (None, RouteParams::new()),
        };
        RouterState {
            current_path: path.to_string(),
            params,
            query: parse_query(&self.history.location().search),
            route_id,
        }
    }

    fn current_path(&self) -> String {
        let location = self.history.location();
        let path = match self.mode {
            RouterMode::Hash => location
                .hash
                .strip_prefix('#')
                .unwrap_or(&location.hash)
                .to_string(),
            RouterMode::History if self.base_url.is_empty() => location.pathname,
            RouterMode::History => location.pathname.replacen(&self.base_url, "", 1),
        };
        if path.is_empty() {
            "/".to_string()
        } else {
            path
        }
    }
}

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use url::Url;

const BASE_URL: &str = "http://localhost/";

/// Errors surfaced by history writes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// The host refused the history mutation.
    #[error("history write rejected: {reason}")]
    Rejected { reason: String },
}

impl HistoryError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        HistoryError::Rejected {
            reason: reason.into(),
        }
    }
}

/// Snapshot of the host location, split the way browsers expose it.
///
/// `search` keeps its leading `?` and `hash` its leading `#`; both are empty
/// when the component is absent or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub pathname: String,
    pub search: String,
    pub hash: String,
}

impl Location {
    /// Resolve `url` (absolute path, optionally with query and fragment).
    pub fn parse(url: &str) -> Result<Self, HistoryError> {
        let base = Url::parse(BASE_URL).map_err(|e| HistoryError::rejected(e.to_string()))?;
        let resolved = base
            .join(url)
            .map_err(|e| HistoryError::rejected(format!("invalid url {url:?}: {e}")))?;

        Ok(Self {
            pathname: resolved.path().to_string(),
            search: prefixed('?', resolved.query()),
            hash: prefixed('#', resolved.fragment()),
        })
    }

    /// Path, query and fragment joined back together.
    pub fn href(&self) -> String {
        format!("{}{}{}", self.pathname, self.search, self.hash)
    }
}

fn prefixed(prefix: char, component: Option<&str>) -> String {
    match component {
        Some(value) if !value.is_empty() => format!("{prefix}{value}"),
        _ => String::new(),
    }
}

/// Navigation primitives of the host environment.
///
/// Writes are synchronous, like the platform APIs they stand for. `back` and
/// `forward` only move the cursor; the host reports the resulting traversal
/// through its own pop-event stream.
pub trait History: Send + Sync {
    fn location(&self) -> Location;

    /// Append an entry (history mode push).
    fn push_state(&self, state: Option<&Value>, url: &str) -> Result<(), HistoryError>;

    /// Overwrite the current entry (history mode replace).
    fn replace_state(&self, state: Option<&Value>, url: &str) -> Result<(), HistoryError>;

    /// Set the fragment, appending an entry when it changes (hash mode push).
    fn assign_hash(&self, hash: &str) -> Result<(), HistoryError>;

    /// Navigate to `url` without adding an entry (hash mode replace).
    fn replace_location(&self, url: &str) -> Result<(), HistoryError>;

    fn back(&self);

    fn forward(&self);
}

/// Traversal notification emitted by `back`/`forward`.
#[derive(Debug, Clone, PartialEq)]
pub struct PopEvent {
    /// State payload of the entry that became current.
    pub state: Option<Value>,
}

pub type PopEvents = UnboundedReceiver<PopEvent>;

#[derive(Debug, Clone)]
struct Entry {
    location: Location,
    state: Option<Value>,
}

#[derive(Debug)]
struct Stack {
    entries: Vec<Entry>,
    index: usize,
}

impl Stack {
    fn current(&self) -> &Entry {
        &self.entries[self.index]
    }

    fn push(&mut self, entry: Entry) {
        self.entries.truncate(self.index + 1);
        self.entries.push(entry);
        self.index = self.entries.len() - 1;
    }

    fn replace(&mut self, entry: Entry) {
        self.entries[self.index] = entry;
    }
}

/// In-memory history stack for tests and headless hosts.
///
/// Clones share the stack. Pop events are delivered on a channel that can be
/// taken once through [`MemoryHistory::pop_events`].
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    stack: Arc<Mutex<Stack>>,
    pop_tx: UnboundedSender<PopEvent>,
    pop_rx: Arc<Mutex<Option<PopEvents>>>,
}

impl MemoryHistory {
    pub fn new(initial_url: &str) -> Result<Self, HistoryError> {
        let location = Location::parse(initial_url)?;
        let (pop_tx, pop_rx) = mpsc::unbounded_channel();
        Ok(Self {
            stack: Arc::new(Mutex::new(Stack {
                entries: vec![Entry {
                    location,
                    state: None,
                }],
                index: 0,
            })),
            pop_tx,
            pop_rx: Arc::new(Mutex::new(Some(pop_rx))),
        })
    }

    /// Receiver of traversal events; `None` once taken.
    pub fn pop_events(&self) -> Option<PopEvents> {
        self.pop_rx.lock().take()
    }

    /// Number of entries on the stack.
    pub fn len(&self) -> usize {
        self.stack.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// State payload of the current entry.
    pub fn current_state(&self) -> Option<Value> {
        self.stack.lock().current().state.clone()
    }

    fn traverse(&self, forward: bool) {
        let event = {
            let mut stack = self.stack.lock();
            if forward {
                if stack.index + 1 >= stack.entries.len() {
                    return;
                }
                stack.index += 1;
            } else {
                if stack.index == 0 {
                    return;
                }
                stack.index -= 1;
            }
            PopEvent {
                state: stack.current().state.clone(),
            }
        };
        // Nobody listening is fine; the cursor still moved.
        let _ = self.pop_tx.send(event);
    }
}

impl History for MemoryHistory {
    fn location(&self) -> Location {
        self.stack.lock().current().location.clone()
    }

    fn push_state(&self, state: Option<&Value>, url: &str) -> Result<(), HistoryError> {
        let location = Location::parse(url)?;
        self.stack.lock().push(Entry {
            location,
            state: state.cloned(),
        });
        Ok(())
    }

    fn replace_state(&self, state: Option<&Value>, url: &str) -> Result<(), HistoryError> {
        let location = Location::parse(url)?;
        self.stack.lock().replace(Entry {
            location,
            state: state.cloned(),
        });
        Ok(())
    }

    fn assign_hash(&self, hash: &str) -> Result<(), HistoryError> {
        let mut stack = self.stack.lock();
        let current = stack.current().location.clone();
        let next = Location::parse(&format!(
            "{}{}#{}",
            current.pathname,
            current.search,
            hash.trim_start_matches('#')
        ))?;
        if next == current {
            return Ok(());
        }
        stack.push(Entry {
            location: next,
            state: None,
        });
        Ok(())
    }

    fn replace_location(&self, url: &str) -> Result<(), HistoryError> {
        let location = Location::parse(url)?;
        self.stack.lock().replace(Entry {
            location,
            state: None,
        });
        Ok(())
    }

    fn back(&self) {
        self.traverse(false);
    }

    fn forward(&self) {
        self.traverse(true);
    }
}

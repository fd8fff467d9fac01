//! Host-facing contracts for trellis: persistent key/value drivers, navigation
//! history, and the subscriber bookkeeping shared by the router and storage.
//! In-memory implementations live next to each contract for tests and headless use.

pub mod history;
pub mod storage;
pub mod subscribers;

pub use history::{History, HistoryError, Location, MemoryHistory, PopEvent, PopEvents};
pub use storage::{DriverError, MemoryDriver, StorageDriver};
pub use subscribers::{SubscriberSet, Subscription};

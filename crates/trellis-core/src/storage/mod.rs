mod driver;

pub use driver::{DriverError, MemoryDriver, StorageDriver};

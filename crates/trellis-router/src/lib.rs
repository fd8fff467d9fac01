//! Client-side router: matches the host location against a declared route
//! table, extracts path and query parameters, runs navigation hooks, and
//! notifies subscribers of every committed transition.

pub mod error;
pub mod global;
pub mod hooks;
pub mod options;
pub mod params;
pub mod pattern;
pub mod router;

pub use error::RouterError;
pub use hooks::RouterEventHandlers;
pub use options::{RouteConfig, RouterMode, RouterOptions};
pub use params::{ParamValue, RouteParams, RouterState};
pub use pattern::{RouteMatch, RouteTable};
pub use router::Router;

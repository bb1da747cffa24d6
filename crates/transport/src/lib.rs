//! gallery-transport: talking to the outside world
//!
//! Handles the external bucket sync tool and HTTP existence checks against
//! the public bucket.

pub mod http;
pub mod sync;

pub use http::HttpOracle;
pub use sync::{AwsCliSync, SyncOutcome, SyncStatus, SyncTool};

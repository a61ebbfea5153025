pub mod bootstrap;
pub mod journal;
pub mod sync_coordinator;

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Injectable clock so services can be tested against a fixed time.
pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

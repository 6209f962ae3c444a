// tidewatch-common: query model and notification formatting shared by the
// scanner daemon and the one-shot CLI.

pub mod notify;
pub mod query;
pub mod types;

pub use notify::{format_batches, NotificationBatch};
pub use query::Query;
pub use types::ScanResult;

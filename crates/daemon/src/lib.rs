// tidewatch-daemon library: scan engine, known-id store, chat delivery and
// the fixed-interval runtime used by `tidewatchd`.

pub mod config;
pub mod notify;
pub mod runtime;
pub mod scan;
pub mod security;
pub mod startup;
pub mod store;

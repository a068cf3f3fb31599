//! CLI command implementations

pub mod changes;
pub mod history;
pub mod recover;
pub mod sync;
pub mod test_connection;

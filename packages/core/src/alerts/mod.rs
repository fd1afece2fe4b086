//! Food alert domain types and the feed abstraction.

pub mod provider;
pub mod types;

pub use provider::AlertsSource;
pub use types::{parse_modified, Alert};

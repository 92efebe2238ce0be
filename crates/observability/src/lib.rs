//! `archivum-observability`: process-wide logging setup.

/// Subscriber setup and output format selection.
pub mod tracing;

pub use self::tracing::{LogFormat, init_with};

/// Install the subscriber, format taken from `ARCHIVUM_LOG_FORMAT`.
///
/// Repeated calls are no-ops, so tests may call it freely.
pub fn init() {
    self::tracing::init();
}

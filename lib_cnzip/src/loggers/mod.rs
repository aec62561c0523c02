/// Console logging setup on top of `tracing-subscriber`.
pub mod logging;

pub use logging::{LoggerError, init_logging};

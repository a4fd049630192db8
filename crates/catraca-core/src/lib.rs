pub mod clock;
pub mod constants;
pub mod error;
pub mod types;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

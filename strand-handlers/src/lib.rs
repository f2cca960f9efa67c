//! Ready-made handlers for strand pipelines.
//!
//! The core never bounds or retries a handler itself; these wrappers put those concerns
//! into the chain as ordinary handlers.

pub mod delay;
pub mod external;
pub mod service;
pub mod timeout;
pub mod trace;

pub use delay::{Delay, Proceed};
pub use external::Adapt;
pub use service::ServiceHandler;
pub use timeout::{Elapsed, HandlerTimeout, Timeout};
pub use trace::Trace;

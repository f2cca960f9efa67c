//! Method-dispatched handler chains with explicit continuations.
//!
//! A [`Pipeline`] records handlers per [`Method`] plus two cross-cutting stacks, compiles
//! them into one chain per method and runs the chain selected by each request. Handlers
//! decide through their [`Next`] continuation whether the chain goes on, aborts into the
//! error handler, or ends.

mod error;
pub use error::{AnyError, AnyResult, Error, HandlerPanic, Result};

pub mod chain;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod handler;
pub mod method;
pub mod registry;

pub use chain::{CompiledRoute, CompiledRoutes};
pub use context::InvocationContext;
pub use dispatch::{Completion, Options, Pipeline};
pub use engine::{ChainState, Execution};
pub use handler::{handler_fn, BoxHandler, ErrorHandler, Handler, HandlerExt, HandlerFn, IntoHandlers, Next};
pub use method::{Method, MethodSource};
pub use registry::StackKey;

//! Handler stacks recorded at configuration time.

use std::fmt;

use crate::{
    handler::{BoxHandler, IntoHandlers},
    Error, Method, Result,
};

/// Which stack a registration call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackKey {
    /// Runs on every chain, matched or not.
    All,
    /// Runs on chains whose method has its own handlers.
    Use,
    Method(Method),
}

impl fmt::Display for StackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackKey::All => f.write_str("all"),
            StackKey::Use => f.write_str("use"),
            StackKey::Method(m) => f.write_str(m.as_str()),
        }
    }
}

/// Append-only, insertion-ordered list of handlers.
pub struct HandlerStack<Req, Res> {
    handlers: Vec<BoxHandler<Req, Res>>,
}

impl<Req, Res> HandlerStack<Req, Res> {
    #[inline]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[BoxHandler<Req, Res>] {
        &self.handlers
    }

    fn extend(&mut self, handlers: Vec<BoxHandler<Req, Res>>) {
        self.handlers.extend(handlers);
    }
}

impl<Req, Res> Default for HandlerStack<Req, Res> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

/// Every stack a pipeline knows about: one per method plus the two cross-cutting ones.
pub struct RouteTable<Req, Res> {
    all: HandlerStack<Req, Res>,
    uses: HandlerStack<Req, Res>,
    methods: [HandlerStack<Req, Res>; Method::COUNT],
}

impl<Req, Res> Default for RouteTable<Req, Res> {
    fn default() -> Self {
        Self {
            all: HandlerStack::default(),
            uses: HandlerStack::default(),
            methods: std::array::from_fn(|_| HandlerStack::default()),
        }
    }
}

impl<Req, Res> RouteTable<Req, Res> {
    /// Append `handlers` to the stack named by `key`.
    ///
    /// Nothing is recorded when `handlers` is empty.
    pub fn push(&mut self, key: StackKey, handlers: impl IntoHandlers<Req, Res>) -> Result<()> {
        let handlers = handlers.into_handlers();
        if handlers.is_empty() {
            return Err(Error::EmptyRegistration(key));
        }
        tracing::debug!(stack = %key, count = handlers.len(), "handlers registered");
        self.stack_mut(key).extend(handlers);
        Ok(())
    }

    pub fn stack(&self, key: StackKey) -> &HandlerStack<Req, Res> {
        match key {
            StackKey::All => &self.all,
            StackKey::Use => &self.uses,
            StackKey::Method(m) => &self.methods[m.index()],
        }
    }

    fn stack_mut(&mut self, key: StackKey) -> &mut HandlerStack<Req, Res> {
        match key {
            StackKey::All => &mut self.all,
            StackKey::Use => &mut self.uses,
            StackKey::Method(m) => &mut self.methods[m.index()],
        }
    }

    /// Whether `method` has handlers of its own.
    #[inline]
    pub fn is_matched(&self, method: Method) -> bool {
        !self.methods[method.index()].is_empty()
    }
}

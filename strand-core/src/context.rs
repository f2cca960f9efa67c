//! Per-invocation state threaded through a chain.
//!
//! Each call into a pipeline gets its own [`InvocationContext`]. Handlers receive a clone of
//! it, so two overlapping invocations on the same pipeline never observe each other's
//! request or response.

use std::{
    cell::{Ref, RefCell, RefMut},
    fmt,
    rc::Rc,
};

use crate::Method;

struct Exchange<Req, Res> {
    method: Method,
    request: RefCell<Req>,
    response: RefCell<Res>,
}

/// The request/response pair bound to one chain execution.
///
/// Cloning is cheap and every clone refers to the same pair. Do not hold a
/// [`Ref`]/[`RefMut`] across an await point if another task may borrow the same side.
pub struct InvocationContext<Req, Res> {
    inner: Rc<Exchange<Req, Res>>,
}

impl<Req, Res> InvocationContext<Req, Res> {
    pub fn new(method: Method, request: Req, response: Res) -> Self {
        Self {
            inner: Rc::new(Exchange {
                method,
                request: RefCell::new(request),
                response: RefCell::new(response),
            }),
        }
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.inner.method
    }

    #[inline]
    pub fn request(&self) -> Ref<'_, Req> {
        self.inner.request.borrow()
    }

    #[inline]
    pub fn request_mut(&self) -> RefMut<'_, Req> {
        self.inner.request.borrow_mut()
    }

    #[inline]
    pub fn response(&self) -> Ref<'_, Res> {
        self.inner.response.borrow()
    }

    #[inline]
    pub fn response_mut(&self) -> RefMut<'_, Res> {
        self.inner.response.borrow_mut()
    }

    /// Take the request and response back.
    ///
    /// Fails and returns the context unchanged while other clones are alive, e.g. when a
    /// handler moved one into a task that has not finished yet.
    pub fn into_parts(self) -> Result<(Req, Res), Self> {
        match Rc::try_unwrap(self.inner) {
            Ok(exchange) => Ok((
                exchange.request.into_inner(),
                exchange.response.into_inner(),
            )),
            Err(inner) => Err(Self { inner }),
        }
    }
}

impl<Req, Res> Clone for InvocationContext<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Req, Res> fmt::Debug for InvocationContext<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("method", &self.inner.method)
            .finish_non_exhaustive()
    }
}

//! Handlers and the values that flow through them.
//!
//! A [`Handler`] receives the [`InvocationContext`] of the current call and a [`Next`]
//! continuation. It can:
//!
//! - do its work and call [`Next::proceed`] to run the following handler,
//! - call [`Next::fail`] (or return `Err`, or panic) to abort into the error handler,
//! - drop `Next` without calling it, which ends the chain after this handler.
//!
//! Closures become handlers through [`handler_fn`].

use std::{future::Future, rc::Rc};

use futures::future::LocalBoxFuture;

use crate::{AnyError, AnyResult, InvocationContext};

mod next;

pub use next::Next;
pub(crate) use next::{signal_channel, Signal, SignalReceiver};

pub trait Handler<Req, Res> {
    fn call(&self, cx: InvocationContext<Req, Res>, next: Next) -> LocalBoxFuture<'_, AnyResult<()>>;
}

pub type BoxHandler<Req, Res> = Rc<dyn Handler<Req, Res>>;

/// Called once with the error that stopped a chain.
pub type ErrorHandler<Req, Res> = Rc<dyn Fn(AnyError, &InvocationContext<Req, Res>)>;

impl<Req, Res, H> Handler<Req, Res> for Rc<H>
where
    H: Handler<Req, Res> + ?Sized,
{
    #[inline]
    fn call(&self, cx: InvocationContext<Req, Res>, next: Next) -> LocalBoxFuture<'_, AnyResult<()>> {
        (**self).call(cx, next)
    }
}

/// Handler built from a closure returning a future.
#[derive(Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

pub fn handler_fn<Req, Res, F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(InvocationContext<Req, Res>, Next) -> Fut,
    Fut: Future<Output = AnyResult<()>> + 'static,
{
    HandlerFn { f }
}

impl<Req, Res, F, Fut> Handler<Req, Res> for HandlerFn<F>
where
    F: Fn(InvocationContext<Req, Res>, Next) -> Fut,
    Fut: Future<Output = AnyResult<()>> + 'static,
{
    #[inline]
    fn call(&self, cx: InvocationContext<Req, Res>, next: Next) -> LocalBoxFuture<'_, AnyResult<()>> {
        Box::pin((self.f)(cx, next))
    }
}

pub trait HandlerExt<Req, Res>: Handler<Req, Res> {
    fn boxed(self) -> BoxHandler<Req, Res>
    where
        Self: Sized + 'static,
    {
        Rc::new(self)
    }
}

impl<Req, Res, H: Handler<Req, Res>> HandlerExt<Req, Res> for H {}

/// One or more handlers passed to a registration call.
///
/// Implemented for a single [`HandlerFn`] or [`BoxHandler`], tuples of up to eight
/// handlers, and `Vec<BoxHandler>`. The unit tuple and an empty `Vec` carry no handler
/// and are rejected at registration.
pub trait IntoHandlers<Req, Res> {
    fn into_handlers(self) -> Vec<BoxHandler<Req, Res>>;
}

impl<Req, Res> IntoHandlers<Req, Res> for Vec<BoxHandler<Req, Res>> {
    #[inline]
    fn into_handlers(self) -> Vec<BoxHandler<Req, Res>> {
        self
    }
}

impl<Req, Res> IntoHandlers<Req, Res> for BoxHandler<Req, Res> {
    #[inline]
    fn into_handlers(self) -> Vec<BoxHandler<Req, Res>> {
        vec![self]
    }
}

impl<Req, Res, F> IntoHandlers<Req, Res> for HandlerFn<F>
where
    HandlerFn<F>: Handler<Req, Res> + 'static,
{
    #[inline]
    fn into_handlers(self) -> Vec<BoxHandler<Req, Res>> {
        vec![Rc::new(self)]
    }
}

impl<Req, Res> IntoHandlers<Req, Res> for () {
    #[inline]
    fn into_handlers(self) -> Vec<BoxHandler<Req, Res>> {
        Vec::new()
    }
}

macro_rules! impl_into_handlers_for_tuple {
    ($($ty: ident),+) => {
        impl<Req, Res, $($ty),+> IntoHandlers<Req, Res> for ($($ty,)+)
        where
            $($ty: Handler<Req, Res> + 'static,)+
        {
            #[allow(non_snake_case)]
            fn into_handlers(self) -> Vec<BoxHandler<Req, Res>> {
                let ($($ty,)+) = self;
                vec![$(Rc::new($ty) as BoxHandler<Req, Res>),+]
            }
        }
    };
}

impl_into_handlers_for_tuple!(H1);
impl_into_handlers_for_tuple!(H1, H2);
impl_into_handlers_for_tuple!(H1, H2, H3);
impl_into_handlers_for_tuple!(H1, H2, H3, H4);
impl_into_handlers_for_tuple!(H1, H2, H3, H4, H5);
impl_into_handlers_for_tuple!(H1, H2, H3, H4, H5, H6);
impl_into_handlers_for_tuple!(H1, H2, H3, H4, H5, H6, H7);
impl_into_handlers_for_tuple!(H1, H2, H3, H4, H5, H6, H7, H8);

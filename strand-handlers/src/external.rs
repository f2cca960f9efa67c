use futures::future::LocalBoxFuture;
use strand_core::{AnyResult, Handler, InvocationContext, Next};

/// Adapts a third-party handler factory.
///
/// The factory is called with the stored options on every invocation and the handler it
/// returns runs with the current context and continuation.
#[derive(Debug, Clone)]
pub struct Adapt<F, O> {
    factory: F,
    options: O,
}

impl<F, O> Adapt<F, O> {
    pub fn new(factory: F, options: O) -> Self {
        Self { factory, options }
    }
}

impl<Req, Res, F, O, H> Handler<Req, Res> for Adapt<F, O>
where
    F: Fn(&O) -> H,
    H: Handler<Req, Res> + 'static,
    Req: 'static,
    Res: 'static,
{
    fn call(&self, cx: InvocationContext<Req, Res>, next: Next) -> LocalBoxFuture<'_, AnyResult<()>> {
        let inner = (self.factory)(&self.options);
        Box::pin(async move { inner.call(cx, next).await })
    }
}

use futures::future::LocalBoxFuture;
use service_async::{
    layer::{layer_fn, FactoryLayer},
    MakeService, Service,
};
use strand_core::{AnyError, AnyResult, Handler, InvocationContext, Next};

/// Runs a [`Service`] over the invocation context as a chain step.
///
/// `Ok` continues the chain and `Err` fails it.
#[derive(Debug, Clone)]
pub struct ServiceHandler<S> {
    svc: S,
}

impl<S> ServiceHandler<S> {
    #[inline]
    pub const fn new(svc: S) -> Self {
        Self { svc }
    }

    #[inline]
    pub fn into_inner(self) -> S {
        self.svc
    }

    pub fn layer<C>() -> impl FactoryLayer<C, S, Factory = Self> {
        layer_fn(|_c: &C, svc| ServiceHandler { svc })
    }
}

impl<Req, Res, S> Handler<Req, Res> for ServiceHandler<S>
where
    S: Service<InvocationContext<Req, Res>>,
    S::Error: Into<AnyError>,
    Req: 'static,
    Res: 'static,
{
    fn call(&self, cx: InvocationContext<Req, Res>, next: Next) -> LocalBoxFuture<'_, AnyResult<()>> {
        Box::pin(async move {
            let result = self.svc.call(cx).await;
            next.resume(result.map(|_| ()).map_err(Into::into));
            Ok(())
        })
    }
}

impl<F: MakeService> MakeService for ServiceHandler<F> {
    type Service = ServiceHandler<F::Service>;
    type Error = F::Error;

    fn make_via_ref(&self, old: Option<&Self::Service>) -> Result<Self::Service, Self::Error> {
        Ok(ServiceHandler {
            svc: self.svc.make_via_ref(old.map(|o| &o.svc))?,
        })
    }
}

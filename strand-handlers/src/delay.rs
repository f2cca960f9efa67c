use std::time::Duration;

use futures::future::LocalBoxFuture;
use service_async::{
    layer::{layer_fn, FactoryLayer},
    Param,
};
use strand_core::{AnyResult, Handler, InvocationContext, Next};

/// Handler that only continues the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct Proceed;

impl<Req, Res> Handler<Req, Res> for Proceed {
    fn call(&self, _cx: InvocationContext<Req, Res>, next: Next) -> LocalBoxFuture<'_, AnyResult<()>> {
        next.proceed();
        Box::pin(futures::future::ready(Ok(())))
    }
}

/// Waits before running the inner handler.
#[derive(Debug, Clone)]
pub struct Delay<H> {
    delay: Duration,
    inner: H,
}

impl Delay<Proceed> {
    /// A pause in the chain.
    pub fn pause(delay: Duration) -> Self {
        Self {
            delay,
            inner: Proceed,
        }
    }
}

impl<H> Delay<H> {
    pub fn new(delay: Duration, inner: H) -> Self {
        Self { delay, inner }
    }

    pub fn layer<C>() -> impl FactoryLayer<C, H, Factory = Self>
    where
        C: Param<Duration>,
    {
        layer_fn(|c: &C, inner| Delay {
            delay: c.param(),
            inner,
        })
    }
}

impl<Req, Res, H> Handler<Req, Res> for Delay<H>
where
    H: Handler<Req, Res>,
    Req: 'static,
    Res: 'static,
{
    fn call(&self, cx: InvocationContext<Req, Res>, next: Next) -> LocalBoxFuture<'_, AnyResult<()>> {
        Box::pin(async move {
            monoio::time::sleep(self.delay).await;
            self.inner.call(cx, next).await
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use strand_core::{handler_fn, ChainState, HandlerExt, Method, Pipeline};

    use super::*;

    type Cx = InvocationContext<Method, Vec<&'static str>>;

    #[monoio::test(timer_enabled = true)]
    async fn test_pause_then_continue() {
        let mut pipeline = Pipeline::<Method, Vec<&'static str>>::default();
        pipeline
            .all(Delay::pause(Duration::from_millis(10)).boxed())
            .unwrap();
        pipeline
            .head(handler_fn(|cx: Cx, _next: Next| async move {
                cx.response_mut().push("head");
                Ok(())
            }))
            .unwrap();

        let begin = Instant::now();
        let completion = pipeline.handle(Method::Head, Vec::new()).await.unwrap();
        assert!(begin.elapsed() >= Duration::from_millis(10));
        assert_eq!(completion.state(), ChainState::Halted(1));
        assert_eq!(&*completion.context().response(), &["head"]);
    }

    struct Pacing;

    impl Param<Duration> for Pacing {
        fn param(&self) -> Duration {
            Duration::from_millis(5)
        }
    }

    #[monoio::test(timer_enabled = true)]
    async fn test_layer_reads_delay_from_config() {
        let paced = service_async::stack::FactoryStack::new(Pacing)
            .replace(Proceed)
            .push(Delay::layer())
            .into_inner();
        assert_eq!(paced.delay, Duration::from_millis(5));

        let mut pipeline = Pipeline::<Method, Vec<&'static str>>::default();
        pipeline.put(paced.boxed()).unwrap();
        let begin = Instant::now();
        let completion = pipeline.handle(Method::Put, Vec::new()).await.unwrap();
        assert!(begin.elapsed() >= Duration::from_millis(5));
        assert_eq!(completion.state(), ChainState::Completed);
    }

    #[monoio::test]
    async fn test_proceed_only_continues() {
        let mut pipeline = Pipeline::<Method, Vec<&'static str>>::default();
        pipeline.get((Proceed, Proceed)).unwrap();
        let completion = pipeline.handle(Method::Get, Vec::new()).await.unwrap();
        assert_eq!(completion.state(), ChainState::Completed);
    }
}

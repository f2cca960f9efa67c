use std::time::Duration;

use futures::future::LocalBoxFuture;
use service_async::{
    layer::{layer_fn, FactoryLayer},
    Param,
};
use strand_core::{AnyResult, Handler, InvocationContext, Next};

#[derive(Debug, Clone, Copy)]
pub struct HandlerTimeout(pub Duration);

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("handler did not settle within {0:?}")]
pub struct Elapsed(pub Duration);

/// Fails the chain with [`Elapsed`] when the inner handler does not settle in time.
///
/// Only the inner handler's future is bounded. A continuation it moved elsewhere is
/// still awaited by the engine.
#[derive(Debug, Clone)]
pub struct Timeout<H> {
    timeout: Duration,
    inner: H,
}

impl<H> Timeout<H> {
    pub fn new(timeout: Duration, inner: H) -> Self {
        Self { timeout, inner }
    }

    pub fn layer<C>() -> impl FactoryLayer<C, H, Factory = Self>
    where
        C: Param<HandlerTimeout>,
    {
        layer_fn(|c: &C, inner| Timeout {
            timeout: c.param().0,
            inner,
        })
    }
}

impl<Req, Res, H> Handler<Req, Res> for Timeout<H>
where
    H: Handler<Req, Res>,
    Req: 'static,
    Res: 'static,
{
    fn call(&self, cx: InvocationContext<Req, Res>, next: Next) -> LocalBoxFuture<'_, AnyResult<()>> {
        Box::pin(async move {
            let position = next.position();
            match monoio::time::timeout(self.timeout, self.inner.call(cx, next)).await {
                Ok(settled) => settled,
                Err(_) => {
                    tracing::debug!(position, timeout = ?self.timeout, "handler timed out");
                    Err(Elapsed(self.timeout).into())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use service_async::stack::FactoryStack;
    use strand_core::{handler_fn, ChainState, HandlerExt, Method, Options, Pipeline};

    use super::*;

    type Cx = InvocationContext<Method, Vec<&'static str>>;

    struct Config;

    impl Param<HandlerTimeout> for Config {
        fn param(&self) -> HandlerTimeout {
            HandlerTimeout(Duration::from_millis(5))
        }
    }

    fn sleeper(millis: u64) -> impl Handler<Method, Vec<&'static str>> + Clone {
        handler_fn(move |cx: Cx, next: Next| async move {
            monoio::time::sleep(Duration::from_millis(millis)).await;
            cx.response_mut().push("slept");
            next.proceed();
            Ok(())
        })
    }

    #[monoio::test(timer_enabled = true)]
    async fn test_slow_handler_fails_the_chain() {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        let mut pipeline = Pipeline::new(Options::default().on_error(move |err, _cx: &Cx| {
            sink.borrow_mut().push(err.downcast_ref::<Elapsed>().copied());
        }));
        let bounded = FactoryStack::new(Config)
            .replace(sleeper(50))
            .push(Timeout::layer())
            .into_inner();
        pipeline.get(bounded.boxed()).unwrap();

        let completion = pipeline.handle(Method::Get, Vec::new()).await.unwrap();
        assert_eq!(completion.state(), ChainState::ErrorDispatched(0));
        assert!(completion.context().response().is_empty());
        assert_eq!(
            &*errors.borrow(),
            &[Some(Elapsed(Duration::from_millis(5)))]
        );
    }

    #[monoio::test(timer_enabled = true)]
    async fn test_fast_handler_passes_through() {
        let mut pipeline = Pipeline::<Method, Vec<&'static str>>::default();
        pipeline
            .post(Timeout::new(Duration::from_millis(200), sleeper(1)).boxed())
            .unwrap();
        let completion = pipeline.handle(Method::Post, Vec::new()).await.unwrap();
        assert_eq!(completion.state(), ChainState::Completed);
        assert_eq!(&*completion.context().response(), &["slept"]);
    }
}

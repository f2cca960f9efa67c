use std::borrow::Cow;

use futures::future::LocalBoxFuture;
use strand_core::{AnyResult, Handler, InvocationContext, Next};

/// Emits an `info` event naming the chain position, then continues.
#[derive(Debug, Clone)]
pub struct Trace {
    name: Cow<'static, str>,
}

impl Trace {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }
}

impl<Req, Res> Handler<Req, Res> for Trace {
    fn call(&self, cx: InvocationContext<Req, Res>, next: Next) -> LocalBoxFuture<'_, AnyResult<()>> {
        tracing::info!(
            step = %self.name,
            method = %cx.method(),
            position = next.position(),
            "passing through"
        );
        next.proceed();
        Box::pin(futures::future::ready(Ok(())))
    }
}

#[cfg(test)]
mod tests {
    use strand_core::{ChainState, Method, Pipeline};

    use super::*;

    #[monoio::test]
    async fn test_trace_continues() {
        let mut pipeline = Pipeline::<Method, ()>::default();
        pipeline.all((Trace::new("edge"),)).unwrap();
        pipeline.options((Trace::new("a"), Trace::new(String::from("b")))).unwrap();

        let completion = pipeline.handle(Method::Options, ()).await.unwrap();
        assert_eq!(completion.state(), ChainState::Completed);
        let completion = pipeline.handle(Method::Get, ()).await.unwrap();
        assert_eq!(completion.state(), ChainState::Completed);
        assert!(!completion.matched());
    }
}

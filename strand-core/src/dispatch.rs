//! Invocation shell: the host-facing [`Pipeline`].
//!
//! # Usage
//!
//! ```rust
//! use strand_core::{handler_fn, InvocationContext, Method, Next, Pipeline};
//!
//! type Cx = InvocationContext<Method, Vec<&'static str>>;
//!
//! # fn main() -> Result<(), strand_core::Error> {
//! let mut pipeline = Pipeline::<Method, Vec<&'static str>>::default();
//! pipeline
//!     .middleware(handler_fn(|cx: Cx, next: Next| async move {
//!         cx.response_mut().push("auth");
//!         next.proceed();
//!         Ok(())
//!     }))?
//!     .get(handler_fn(|cx: Cx, _next: Next| async move {
//!         cx.response_mut().push("get");
//!         Ok(())
//!     }))?;
//!
//! let routes = pipeline.build();
//! assert!(routes.route(Method::Get).matched());
//! assert!(!routes.route(Method::Post).matched());
//! # Ok(())
//! # }
//! ```
//!
//! # Error handling
//!
//! Handler failures are routed to the callback set with [`Options::on_error`]. Without
//! one the failing chain simply stops: no later handler runs and nothing but a log line
//! records the error. Check [`Completion::is_error`] if the host needs to know.

use std::{convert::Infallible, fmt, rc::Rc};

use futures::future::LocalBoxFuture;
use service_async::{MakeService, Service};

use crate::{
    chain::CompiledRoutes,
    engine::ChainState,
    handler::{ErrorHandler, IntoHandlers},
    registry::{RouteTable, StackKey},
    AnyError, InvocationContext, Method, MethodSource, Result,
};

/// Construction options for a [`Pipeline`].
pub struct Options<Req, Res> {
    on_error: Option<ErrorHandler<Req, Res>>,
}

impl<Req, Res> Default for Options<Req, Res> {
    fn default() -> Self {
        Self { on_error: None }
    }
}

impl<Req, Res> Options<Req, Res> {
    /// Set the handler that receives every error raised inside a chain.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(AnyError, &InvocationContext<Req, Res>) + 'static,
    {
        self.on_error = Some(Rc::new(f));
        self
    }
}

/// Terminal result of one invocation.
pub struct Completion<Req, Res> {
    state: ChainState,
    matched: bool,
    cx: InvocationContext<Req, Res>,
}

impl<Req, Res> Completion<Req, Res> {
    #[inline]
    pub fn state(&self) -> ChainState {
        self.state
    }

    /// Whether the chain ended by dispatching an error.
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self.state, ChainState::ErrorDispatched(_))
    }

    /// Whether the request's method had handlers of its own.
    #[inline]
    pub fn matched(&self) -> bool {
        self.matched
    }

    #[inline]
    pub fn context(&self) -> &InvocationContext<Req, Res> {
        &self.cx
    }

    /// Hand the request and response back to the host.
    pub fn into_parts(self) -> std::result::Result<(Req, Res), InvocationContext<Req, Res>> {
        self.cx.into_parts()
    }
}

impl<Req, Res> fmt::Debug for Completion<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("method", &self.cx.method())
            .field("state", &self.state)
            .field("matched", &self.matched)
            .finish()
    }
}

impl<Req, Res> CompiledRoutes<Req, Res>
where
    Req: MethodSource + 'static,
    Res: 'static,
{
    /// Run the chain selected by the request's method and wait for its terminal state.
    pub async fn dispatch(&self, req: Req, res: Res) -> Result<Completion<Req, Res>> {
        let method = MethodSource::method(&req)?;
        let route = self.route(method);
        let cx = InvocationContext::new(method, req, res);
        tracing::debug!(%method, matched = route.matched(), len = route.len(), "dispatching request");
        let (state, cx) = route.execution(cx, self.on_error.clone()).run().await;
        Ok(Completion {
            state,
            matched: route.matched(),
            cx,
        })
    }
}

impl<Req, Res> Service<(Req, Res)> for CompiledRoutes<Req, Res>
where
    Req: MethodSource + 'static,
    Res: 'static,
{
    type Response = Completion<Req, Res>;
    type Error = crate::Error;

    async fn call(&self, (req, res): (Req, Res)) -> Result<Self::Response> {
        self.dispatch(req, res).await
    }
}

macro_rules! method_registrations {
    ($($name: ident => $method: ident),+ $(,)?) => {
        $(
            #[doc = concat!("Append handlers to the `", stringify!($name), "` method stack.")]
            #[inline]
            pub fn $name(&mut self, handlers: impl IntoHandlers<Req, Res>) -> Result<&mut Self> {
                self.route(Method::$method, handlers)
            }
        )+
    };
}

/// Handler registration plus options. Registration needs `&mut self`, dispatch only
/// `&self`, so every registration is finished before a request can run.
pub struct Pipeline<Req, Res> {
    table: RouteTable<Req, Res>,
    options: Options<Req, Res>,
}

impl<Req, Res> Default for Pipeline<Req, Res> {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl<Req, Res> Pipeline<Req, Res> {
    pub fn new(options: Options<Req, Res>) -> Self {
        Self {
            table: RouteTable::default(),
            options,
        }
    }

    method_registrations! {
        head => Head,
        get => Get,
        post => Post,
        put => Put,
        delete => Delete,
        patch => Patch,
        options => Options,
        connect => Connect,
        trace => Trace,
    }

    pub fn route(&mut self, method: Method, handlers: impl IntoHandlers<Req, Res>) -> Result<&mut Self> {
        self.table.push(StackKey::Method(method), handlers)?;
        Ok(self)
    }

    /// Append handlers that run first on every chain, whether or not the method matched.
    pub fn all(&mut self, handlers: impl IntoHandlers<Req, Res>) -> Result<&mut Self> {
        self.table.push(StackKey::All, handlers)?;
        Ok(self)
    }

    /// Append handlers that run after the `all` stack on matched methods only.
    pub fn middleware(&mut self, handlers: impl IntoHandlers<Req, Res>) -> Result<&mut Self> {
        self.table.push(StackKey::Use, handlers)?;
        Ok(self)
    }

    #[inline]
    pub fn table(&self) -> &RouteTable<Req, Res> {
        &self.table
    }

    /// Compile the current registrations. Later registrations need another build.
    pub fn build(&self) -> CompiledRoutes<Req, Res> {
        CompiledRoutes::compile(&self.table, self.options.on_error.clone())
    }
}

impl<Req, Res> Pipeline<Req, Res>
where
    Req: MethodSource + 'static,
    Res: 'static,
{
    /// Build, then run the chain for the request's method to its terminal state.
    pub async fn handle(&self, req: Req, res: Res) -> Result<Completion<Req, Res>> {
        self.build().dispatch(req, res).await
    }

    /// The single entry point a host installs for every incoming request.
    pub fn into_handler(
        self,
    ) -> impl Fn(Req, Res) -> LocalBoxFuture<'static, Result<Completion<Req, Res>>> {
        let pipeline = Rc::new(self);
        move |req, res| {
            let pipeline = pipeline.clone();
            Box::pin(async move { pipeline.handle(req, res).await })
        }
    }
}

impl<Req, Res> MakeService for Pipeline<Req, Res> {
    type Service = CompiledRoutes<Req, Res>;
    type Error = Infallible;

    fn make_via_ref(
        &self,
        _old: Option<&Self::Service>,
    ) -> std::result::Result<Self::Service, Self::Error> {
        Ok(self.build())
    }
}

impl<Req, Res> fmt::Debug for Pipeline<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Pipeline");
        d.field("all", &self.table.stack(StackKey::All).len())
            .field("use", &self.table.stack(StackKey::Use).len());
        for m in Method::ALL {
            d.field(m.as_str(), &self.table.stack(StackKey::Method(m)).len());
        }
        d.field("on_error", &self.options.on_error.is_some()).finish()
    }
}

//! Composition of registered stacks into one executable chain per method.

use std::{fmt, rc::Rc};

use crate::{
    engine::Execution,
    handler::{BoxHandler, ErrorHandler},
    registry::{RouteTable, StackKey},
    InvocationContext, Method,
};

/// The executable chain for one method.
pub struct CompiledRoute<Req, Res> {
    method: Method,
    matched: bool,
    chain: Rc<[BoxHandler<Req, Res>]>,
}

impl<Req, Res> CompiledRoute<Req, Res> {
    /// Concatenate `all ++ (use ++ method)`, the last two only when `method` has its own
    /// handlers.
    pub fn compile(table: &RouteTable<Req, Res>, method: Method) -> Self {
        let matched = table.is_matched(method);
        let mut chain: Vec<BoxHandler<Req, Res>> =
            table.stack(StackKey::All).as_slice().to_vec();
        if matched {
            chain.extend_from_slice(table.stack(StackKey::Use).as_slice());
            chain.extend_from_slice(table.stack(StackKey::Method(method)).as_slice());
        }
        Self {
            method,
            matched,
            chain: chain.into(),
        }
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }

    /// True iff handlers were registered for this method itself.
    #[inline]
    pub fn matched(&self) -> bool {
        self.matched
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    #[inline]
    pub fn handlers(&self) -> &[BoxHandler<Req, Res>] {
        &self.chain
    }

    /// Start an execution of this chain over `cx`.
    pub fn execution(
        &self,
        cx: InvocationContext<Req, Res>,
        on_error: Option<ErrorHandler<Req, Res>>,
    ) -> Execution<Req, Res> {
        Execution::new(self.chain.clone(), cx, on_error)
    }
}

impl<Req, Res> Clone for CompiledRoute<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            method: self.method,
            matched: self.matched,
            chain: self.chain.clone(),
        }
    }
}

impl<Req, Res> fmt::Debug for CompiledRoute<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("method", &self.method)
            .field("matched", &self.matched)
            .field("len", &self.chain.len())
            .finish()
    }
}

/// Result of a build: one [`CompiledRoute`] per method plus the error handler.
pub struct CompiledRoutes<Req, Res> {
    routes: [CompiledRoute<Req, Res>; Method::COUNT],
    pub(crate) on_error: Option<ErrorHandler<Req, Res>>,
}

impl<Req, Res> CompiledRoutes<Req, Res> {
    pub fn compile(table: &RouteTable<Req, Res>, on_error: Option<ErrorHandler<Req, Res>>) -> Self {
        Self {
            routes: Method::ALL.map(|m| CompiledRoute::compile(table, m)),
            on_error,
        }
    }

    #[inline]
    pub fn route(&self, method: Method) -> &CompiledRoute<Req, Res> {
        &self.routes[method.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRoute<Req, Res>> {
        self.routes.iter()
    }
}

impl<Req, Res> Clone for CompiledRoutes<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            routes: self.routes.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<Req, Res> fmt::Debug for CompiledRoutes<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoutes")
            .field("routes", &self.routes)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, HandlerExt, Next};

    fn handler() -> BoxHandler<(), ()> {
        handler_fn(|_cx: InvocationContext<(), ()>, next: Next| async move {
            next.proceed();
            Ok(())
        })
        .boxed()
    }

    fn same(a: &[BoxHandler<(), ()>], b: &[&BoxHandler<(), ()>]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Rc::ptr_eq(x, y))
    }

    #[test]
    fn test_concatenation_order() {
        let (l, u, g) = (handler(), handler(), handler());
        let mut table = RouteTable::default();
        table.push(StackKey::Method(Method::Get), g.clone()).unwrap();
        table.push(StackKey::Use, u.clone()).unwrap();
        table.push(StackKey::All, l.clone()).unwrap();

        let routes = CompiledRoutes::compile(&table, None);
        let get = routes.route(Method::Get);
        assert!(get.matched());
        assert!(same(get.handlers(), &[&l, &u, &g]));

        // unmatched methods only run the `all` stack
        for m in Method::ALL.into_iter().filter(|m| *m != Method::Get) {
            let route = routes.route(m);
            assert!(!route.matched());
            assert!(same(route.handlers(), &[&l]));
        }
    }

    #[test]
    fn test_matched_ignores_cross_cutting_stacks() {
        let mut table = RouteTable::<(), ()>::default();
        table.push(StackKey::All, handler()).unwrap();
        table.push(StackKey::Use, handler()).unwrap();
        let routes = CompiledRoutes::compile(&table, None);
        assert!(routes.iter().all(|r| !r.matched()));
        assert!(routes.iter().all(|r| r.len() == 1));
    }

    #[test]
    fn test_rebuild_is_identical() {
        let mut table = RouteTable::<(), ()>::default();
        table.push(StackKey::All, handler()).unwrap();
        table
            .push(StackKey::Method(Method::Delete), vec![handler(), handler()])
            .unwrap();
        let first = CompiledRoutes::compile(&table, None);
        let second = CompiledRoutes::compile(&table, None);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.method(), b.method());
            assert_eq!(a.matched(), b.matched());
            let b: Vec<_> = b.handlers().iter().collect();
            assert!(same(a.handlers(), &b));
        }
    }
}

//! Turns scenario steps into handlers.

use std::time::Duration;

use anyhow::{anyhow, Context};
use http::{header::HeaderName, HeaderValue, StatusCode};
use service_async::{stack::FactoryStack, Param};
use strand_core::{handler_fn, BoxHandler, HandlerExt, InvocationContext, Method, Next, Options, Pipeline};
use strand_handlers::{Delay, HandlerTimeout, Timeout, Trace};

use crate::config::{ErrorResponse, Scenario, StepConfig};

pub type Request = http::Request<String>;
pub type Response = http::Response<String>;
type Cx = InvocationContext<Request, Response>;

struct StepTimeout(Duration);

impl Param<HandlerTimeout> for StepTimeout {
    fn param(&self) -> HandlerTimeout {
        HandlerTimeout(self.0)
    }
}

pub fn build_step(step: &StepConfig) -> anyhow::Result<BoxHandler<Request, Response>> {
    let handler: BoxHandler<Request, Response> = match step {
        StepConfig::Log { name } => Trace::new(name.clone()).boxed(),
        StepConfig::SetHeader { name, value } => {
            let name = HeaderName::try_from(name.as_str())
                .with_context(|| format!("invalid header name {name:?}"))?;
            let value = HeaderValue::try_from(value.as_str())
                .with_context(|| format!("invalid header value {value:?}"))?;
            handler_fn(move |cx: Cx, next: Next| {
                cx.response_mut()
                    .headers_mut()
                    .insert(name.clone(), value.clone());
                next.proceed();
                async { Ok(()) }
            })
            .boxed()
        }
        StepConfig::Respond { status, body } => {
            let status = StatusCode::from_u16(*status)?;
            let body = body.clone();
            handler_fn(move |cx: Cx, _next: Next| {
                let mut response = cx.response_mut();
                *response.status_mut() = status;
                *response.body_mut() = body.clone();
                async { Ok(()) }
            })
            .boxed()
        }
        StepConfig::Fail { message } => {
            let message = message.clone();
            handler_fn(move |_cx: Cx, next: Next| {
                next.fail(anyhow!(message.clone()));
                async { Ok(()) }
            })
            .boxed()
        }
        StepConfig::Panic { message } => {
            let message = message.clone();
            handler_fn(move |_cx: Cx, _next: Next| {
                let message = message.clone();
                async move { panic!("{message}") }
            })
            .boxed()
        }
        StepConfig::Delay { millis } => Delay::pause(Duration::from_millis(*millis)).boxed(),
        StepConfig::Halt => handler_fn(|_cx: Cx, _next: Next| async { Ok(()) }).boxed(),
        StepConfig::Timeout { millis, step } => {
            FactoryStack::new(StepTimeout(Duration::from_millis(*millis)))
                .replace(build_step(step)?)
                .push(Timeout::layer())
                .into_inner()
                .boxed()
        }
    };
    Ok(handler)
}

fn build_steps(steps: &[StepConfig]) -> anyhow::Result<Vec<BoxHandler<Request, Response>>> {
    steps.iter().map(build_step).collect()
}

fn error_options(error_response: Option<&ErrorResponse>) -> anyhow::Result<Options<Request, Response>> {
    let Some(error_response) = error_response else {
        return Ok(Options::default());
    };
    let status = StatusCode::from_u16(error_response.status)?;
    let body = error_response.body.clone();
    Ok(Options::default().on_error(move |err, cx: &Cx| {
        tracing::error!(method = %cx.method(), error = %err, "chain failed");
        let mut response = cx.response_mut();
        *response.status_mut() = status;
        *response.body_mut() = match body.is_empty() {
            true => err.to_string(),
            false => format!("{body}: {err}"),
        };
    }))
}

impl Scenario {
    pub fn pipeline(&self) -> anyhow::Result<Pipeline<Request, Response>> {
        let mut pipeline = Pipeline::new(error_options(self.error_response.as_ref())?);
        if !self.all.is_empty() {
            pipeline.all(build_steps(&self.all)?)?;
        }
        if !self.uses.is_empty() {
            pipeline.middleware(build_steps(&self.uses)?)?;
        }
        for (method, steps) in self.routes.iter() {
            let method: Method = method.parse()?;
            pipeline
                .route(method, build_steps(steps)?)
                .with_context(|| format!("route {method} has no steps"))?;
        }
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use strand_core::ChainState;

    use super::*;
    use crate::config::parse_from_slice;

    fn scenario(content: &str) -> Scenario {
        parse_from_slice(content.as_bytes()).unwrap()
    }

    fn request(method: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri("/")
            .body(String::new())
            .unwrap()
    }

    #[monoio::test(timer_enabled = true)]
    async fn test_scenario_pipeline_runs_steps_in_order() {
        let pipeline = scenario(
            r#"
            [[all]]
            kind = "log"
            name = "access"

            [[use]]
            kind = "set_header"
            name = "x-powered-by"
            value = "strand"

            [routes]
            GET = [
                { kind = "timeout", millis = 200, step = { kind = "delay", millis = 1 } },
                { kind = "respond", status = 201, body = "created" },
                { kind = "fail", message = "never reached" },
            ]
            "#,
        )
        .pipeline()
        .unwrap();

        let completion = pipeline.handle(request("GET"), Response::default()).await.unwrap();
        assert_eq!(completion.state(), ChainState::Halted(3));
        let (_, response) = completion.into_parts().unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.body(), "created");
        assert_eq!(response.headers()["x-powered-by"], "strand");

        // unmatched: only the `all` stack runs, so no header
        let completion = pipeline.handle(request("POST"), Response::default()).await.unwrap();
        assert_eq!(completion.state(), ChainState::Completed);
        let (_, response) = completion.into_parts().unwrap();
        assert!(response.headers().get("x-powered-by").is_none());
    }

    #[monoio::test(timer_enabled = true)]
    async fn test_scenario_errors_reach_error_response() {
        let pipeline = scenario(
            r#"
            [error_response]
            status = 503
            body = "unavailable"

            [routes]
            PUT = [{ kind = "fail", message = "maintenance" }]
            PATCH = [{ kind = "panic", message = "bad state" }]
            DELETE = [{ kind = "timeout", millis = 5, step = { kind = "delay", millis = 100 } }]
            "#,
        )
        .pipeline()
        .unwrap();

        let completion = pipeline.handle(request("PUT"), Response::default()).await.unwrap();
        assert!(completion.is_error());
        let (_, response) = completion.into_parts().unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body(), "unavailable: maintenance");

        let completion = pipeline.handle(request("PATCH"), Response::default()).await.unwrap();
        let (_, response) = completion.into_parts().unwrap();
        assert_eq!(response.body(), "unavailable: handler panicked: bad state");

        let completion = pipeline.handle(request("DELETE"), Response::default()).await.unwrap();
        assert_eq!(completion.state(), ChainState::ErrorDispatched(0));
    }

    #[test]
    fn test_invalid_scenarios_rejected() {
        let bad_method = scenario(
            r#"
            [routes]
            get = [{ kind = "halt" }]
            "#,
        );
        assert!(bad_method.pipeline().is_err());

        let empty_route = scenario(
            r#"
            [routes]
            GET = []
            "#,
        );
        let err = empty_route.pipeline().unwrap_err();
        assert_eq!(
            err.root_cause().to_string(),
            "at least one handler is required when registering on `GET`"
        );

        let bad_header = scenario(
            r#"
            [[use]]
            kind = "set_header"
            name = "bad header"
            value = "x"
            "#,
        );
        assert!(bad_header.pipeline().is_err());
    }
}

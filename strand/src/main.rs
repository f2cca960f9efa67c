use std::{collections::BTreeMap, path::PathBuf};

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use strand_core::{Completion, Pipeline};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

use crate::{
    config::{RequestConfig, Scenario},
    steps::{Request, Response},
};

mod config;
mod steps;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path of the scenario file
    #[clap(short, long, value_parser)]
    config: PathBuf,
    /// Use this method for every request in the scenario
    #[clap(short, long)]
    method: Option<String>,
}

/// One line of output per dispatched request.
#[derive(Debug, Serialize)]
struct Report {
    method: String,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Report {
    fn new(method: String, path: String, outcome: strand_core::Result<Completion<Request, Response>>) -> Self {
        let mut report = Report {
            method,
            path,
            state: None,
            status: None,
            headers: BTreeMap::new(),
            body: None,
            error: None,
        };
        let completion = match outcome {
            Ok(completion) => completion,
            Err(e) => {
                report.error = Some(e.to_string());
                return report;
            }
        };
        report.state = Some(format!("{:?}", completion.state()));
        match completion.into_parts() {
            Ok((_, response)) => {
                report.status = Some(response.status().as_u16());
                report.headers = response
                    .headers()
                    .iter()
                    .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
                    .collect();
                report.body = Some(response.into_body());
            }
            Err(_) => {
                report.error = Some("response still held by a handler task".to_string());
            }
        }
        report
    }
}

fn build_request(config: &RequestConfig, method: Option<&str>) -> Result<Request> {
    let request = http::Request::builder()
        .method(method.unwrap_or(config.method.as_str()))
        .uri(config.path.as_str())
        .body(config.body.clone())?;
    Ok(request)
}

async fn dispatch(pipeline: &Pipeline<Request, Response>, request: Request) -> Report {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let outcome = pipeline.handle(request, Response::default()).await;
    Report::new(method, path, outcome)
}

#[monoio::main(timer_enabled = true)]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();
    let scenario = Scenario::load(&args.config)?;
    let pipeline = scenario.pipeline()?;
    tracing::info!(?pipeline, "pipeline built");

    let requests = scenario
        .requests
        .iter()
        .map(|r| build_request(r, args.method.as_deref()))
        .collect::<Result<Vec<_>>>()?;
    tracing::info!(
        count = requests.len(),
        concurrent = scenario.concurrent,
        "dispatching requests"
    );

    let reports = match scenario.concurrent {
        true => {
            futures::future::join_all(requests.into_iter().map(|r| dispatch(&pipeline, r))).await
        }
        false => {
            let mut reports = Vec::with_capacity(requests.len());
            for request in requests {
                reports.push(dispatch(&pipeline, request).await);
            }
            reports
        }
    };
    for report in reports.iter() {
        println!("{}", serde_json::to_string(report)?);
    }
    Ok(())
}

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use datagen_api::config::ServerConfig;
use datagen_api::router::build_app_router;
use datagen_api::state::AppState;
use datagen_core::job::{Job, JobStatus};
use datagen_core::result::AnalysisResult;
use datagen_core::types::JobId;
use datagen_events::NotificationHub;
use datagen_pipeline::{
    AnalysisEngine, AnalysisRequest, JobRegistry, ProgressReporter, SimulatedEngine,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

pub const BOUNDARY: &str = "datagen-test-boundary";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 1,
        subscriber_buffer: 16,
        heartbeat_interval_secs: 30,
        analysis_step_delay_ms: 0,
        max_upload_bytes: 1024 * 1024,
    }
}

/// Engine that keeps its job running until it is cancelled.
pub struct HoldEngine;

#[async_trait]
impl AnalysisEngine for HoldEngine {
    async fn run(
        &self,
        _request: AnalysisRequest,
        reporter: ProgressReporter,
    ) -> anyhow::Result<AnalysisResult> {
        reporter.cancelled().await;
        anyhow::bail!("stopped")
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(empty_request(Method::GET, uri)).await
    }

    pub async fn post(&self, uri: &str) -> Response<Body> {
        self.send(empty_request(Method::POST, uri)).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.send(empty_request(Method::DELETE, uri)).await
    }

    pub async fn patch_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        let request = Request::builder()
            .method(Method::PATCH)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Submit a job with one CSV file and return its id.
    pub async fn submit(&self, instructions: &str) -> JobId {
        let response = self
            .send(multipart_request(
                Some(instructions),
                &[("data.csv", "a,b\n1,2\n")],
                None,
            ))
            .await;
        let json = body_json(response).await;
        json["data"]["job_id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn wait_for_status(&self, job_id: JobId, status: JobStatus) -> Job {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let job = self.state.registry.get(job_id).await.unwrap();
                if job.status() == status {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("job never reached {status}"))
    }
}

/// Build the full application router around `engine`, using the same
/// [`build_app_router`] as production.
pub fn build_test_app(engine: Arc<dyn AnalysisEngine>) -> TestApp {
    let registry = JobRegistry::new(Arc::new(NotificationHub::new()), engine);
    let state = AppState::new(test_config(), registry);
    TestApp {
        router: build_app_router(state.clone()),
        state,
    }
}

/// App whose jobs run the simulated engine with no delay between steps.
pub fn simulated_app() -> TestApp {
    build_test_app(Arc::new(SimulatedEngine::new(Duration::ZERO)))
}

/// App whose jobs stay `running` until cancelled.
pub fn held_app() -> TestApp {
    build_test_app(Arc::new(HoldEngine))
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Build a `POST /api/v1/analysis` multipart request.
///
/// `files` are `(file name, contents)` pairs sent as repeated `files` parts.
pub fn multipart_request(
    instructions: Option<&str>,
    files: &[(&str, &str)],
    additional_params: Option<&str>,
) -> Request<Body> {
    let mut body = String::new();
    if let Some(text) = instructions {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"instructions\"\r\n\r\n{text}\r\n"
        ));
    }
    for (name, contents) in files {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
             Content-Type: text/csv\r\n\r\n{contents}\r\n"
        ));
    }
    if let Some(params) = additional_params {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"additional_params\"\r\n\r\n{params}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/analysis")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

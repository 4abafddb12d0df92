// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{routing::get, routing::post, routing::put, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        ExecutionStatusKind, ExecutionStatusResponse, ProcessIntentRequest, ProcessIntentResponse,
        PushSecretRequest, SubmitJobRequest,
    },
    pipeline::{ErrorKind, ExecutionOutcome, ExecutionProof, FailureRecord, PipelineStep},
    state::AppState,
};

pub mod health;
pub mod intents;
pub mod jobs;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/process-intent", post(intents::process_intent))
        .route("/status/{execution_id}", get(intents::execution_status))
        .route("/secrets/{requester}/{index}", put(jobs::push_secret))
        .route("/jobs", post(jobs::submit_job))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        intents::process_intent,
        intents::execution_status,
        jobs::push_secret,
        jobs::submit_job,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            ProcessIntentRequest,
            ProcessIntentResponse,
            PushSecretRequest,
            SubmitJobRequest,
            ExecutionStatusKind,
            ExecutionStatusResponse,
            ExecutionOutcome,
            ExecutionProof,
            FailureRecord,
            PipelineStep,
            ErrorKind,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Executions", description = "Anonymous transfer submission and status"),
        (name = "Jobs", description = "Requester secrets and secret-backed jobs"),
        (name = "Health", description = "Liveness and readiness checks")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::pipeline::tests::{fast_config, MockChain, MockLedger, DEST, VAULT};
    use crate::pipeline::Pipeline;

    fn app() -> Router {
        router(AppState::new(Some(Arc::new(Pipeline::new(
            Arc::new(MockChain::default()),
            Arc::new(MockLedger::crediting_after(0)),
            fast_config(),
        )))))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn process_intent_returns_accepted_with_id() {
        let response = app()
            .oneshot(post_json(
                "/process-intent",
                json!({"hlDestination": DEST, "amount": "5", "vaultAddress": VAULT}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert!(body["executionId"].as_str().is_some());
        assert_eq!(body["status"], "pending");
    }

    #[tokio::test]
    async fn invalid_destination_is_bad_request() {
        let response = app()
            .oneshot(post_json(
                "/process-intent",
                json!({"destination": "0x1234", "amount": 5, "vaultAddress": VAULT}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("destination"));
    }

    #[tokio::test]
    async fn secret_route_stores_once() {
        let app = app();
        let put_secret = || {
            Request::builder()
                .method("PUT")
                .uri("/secrets/0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC/1")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"value": "opaque"}).to_string()))
                .unwrap()
        };

        let first = app.clone().oneshot(put_secret()).await.unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = app.oneshot(put_secret()).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_status_is_not_found() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/status/does-not-exist")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn liveness_route_is_mounted() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health/live")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn openapi_document_lists_execution_routes() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api-doc/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let doc = body_json(response).await;
        assert!(doc["paths"].get("/process-intent").is_some());
        assert!(doc["paths"].get("/status/{execution_id}").is_some());
        assert!(doc["paths"].get("/secrets/{requester}/{index}").is_some());
        assert!(doc["paths"].get("/jobs").is_some());
    }
}

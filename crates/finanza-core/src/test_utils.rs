//! Test utilities for finanza-core
//!
//! A mock AI server speaking the Gemini, Ollama and OpenAI-compatible wire
//! formats, for integration tests and development without a real model.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::models::{AIInsight, InsightType};

/// What the mock server answers to generation requests
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A well-formed insight array
    Insights(Vec<AIInsight>),
    /// Model text that is not JSON
    Garbage(String),
    /// HTTP error status
    Status(u16),
}

impl Default for MockReply {
    fn default() -> Self {
        MockReply::Insights(sample_insights())
    }
}

/// Three insights, one of each type
pub fn sample_insights() -> Vec<AIInsight> {
    vec![
        AIInsight {
            title: "Housing dominates".to_string(),
            message: "Rent takes most of your monthly spending.".to_string(),
            kind: InsightType::Warning,
        },
        AIInsight {
            title: "Cook at home".to_string(),
            message: "Groceries cost less than eating out.".to_string(),
            kind: InsightType::Tip,
        },
        AIInsight {
            title: "Invest the surplus".to_string(),
            message: "Your balance is positive; consider an emergency fund.".to_string(),
            kind: InsightType::Opportunity,
        },
    ]
}

impl MockReply {
    fn model_text(&self) -> Option<String> {
        match self {
            MockReply::Insights(insights) => serde_json::to_string(insights).ok(),
            MockReply::Garbage(text) => Some(text.clone()),
            MockReply::Status(_) => None,
        }
    }

    fn error_response(&self) -> Option<Response> {
        match self {
            MockReply::Status(code) => Some(
                (
                    StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                    "mock failure",
                )
                    .into_response(),
            ),
            _ => None,
        }
    }
}

/// Mock AI server for testing and development
pub struct MockAIServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockAIServer {
    /// Start the mock server on an available port with the default reply
    pub async fn start() -> Self {
        Self::start_with(MockReply::default()).await
    }

    /// Start the mock server with a specific reply
    pub async fn start_with(reply: MockReply) -> Self {
        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_ollama_generate))
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat_completions))
            .route(
                "/v1beta/models/:model",
                get(handle_gemini_model).post(handle_gemini_generate),
            )
            .with_state(Arc::new(reply));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockAIServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_tags() -> Json<Value> {
    Json(json!({ "models": [{ "name": "llama3.2:latest" }] }))
}

async fn handle_models() -> Json<Value> {
    Json(json!({ "data": [{ "id": "mock-model" }] }))
}

async fn handle_ollama_generate(
    State(reply): State<Arc<MockReply>>,
    Json(request): Json<Value>,
) -> Response {
    if let Some(err) = reply.error_response() {
        return err;
    }
    Json(json!({
        "model": request["model"],
        "response": reply.model_text().unwrap_or_default(),
        "done": true
    }))
    .into_response()
}

async fn handle_chat_completions(State(reply): State<Arc<MockReply>>) -> Response {
    if let Some(err) = reply.error_response() {
        return err;
    }
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": reply.model_text().unwrap_or_default() } }]
    }))
    .into_response()
}

async fn handle_gemini_model(Path(model): Path<String>) -> Json<Value> {
    Json(json!({ "name": format!("models/{}", model) }))
}

/// Path segment is `<model>:generateContent`
async fn handle_gemini_generate(State(reply): State<Arc<MockReply>>) -> Response {
    if let Some(err) = reply.error_response() {
        return err;
    }
    Json(json!({
        "candidates": [{ "content": { "parts": [{ "text": reply.model_text().unwrap_or_default() }] } }]
    }))
    .into_response()
}

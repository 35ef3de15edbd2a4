//! Test utilities for roam-core
//!
//! A mock OpenAI-compatible server that answers the two prompts the
//! package analyzer sends, for development and integration tests.

use axum::{
    extract::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::sync::oneshot;

/// Mock OpenAI-compatible server for testing and development
pub struct MockOpenAIServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOpenAIServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await;
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

impl Drop for MockOpenAIServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Serialize)]
struct ChatChoice {
    index: u32,
    message: ChatMessage,
}

async fn handle_models() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "object": "list",
        "data": [{"id": "mock-model", "object": "model"}]
    }))
}

async fn handle_chat(Json(request): Json<ChatRequest>) -> Json<ChatResponse> {
    let user = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .unwrap_or_default();

    // These patterns match the prompt files in prompts/*.md
    let content = if user.contains("Rate the quality of this eSIM package") {
        quality_mock(user)
    } else if user.contains("These alternatives are available") {
        descriptions_mock(user)
    } else {
        "I can only help with eSIM packages.".to_string()
    };

    Json(ChatResponse {
        model: request.model,
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content,
            },
        }],
    })
}

/// Unlimited plans score 90, everything else 60, wrapped in prose like a real model
fn quality_mock(prompt: &str) -> String {
    let score = if prompt.contains("Data: Unlimited") { 90 } else { 60 };
    format!(
        "Here is my rating:\n{{\"quality_score\": {}, \"reasoning\": \"mock rating\"}}",
        score
    )
}

/// Echo every `- id N: note` line back as a rewritten description
fn descriptions_mock(prompt: &str) -> String {
    let descriptions: Vec<serde_json::Value> = prompt
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("- id ")?;
            let (id, note) = rest.split_once(':')?;
            let id: i64 = id.trim().parse().ok()?;
            Some(serde_json::json!({
                "id": id,
                "description": format!("Rewritten: {}", note.trim()),
            }))
        })
        .collect();

    serde_json::json!({ "descriptions": descriptions }).to_string()
}

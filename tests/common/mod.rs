#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use kitchen_cloud::{
    create_app,
    handlers::{AppState, RequestLimits},
    models::{Collection, Document},
    repositories::InMemoryDocumentRepository,
    services::TokenService,
    Metrics,
};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const TEST_SECRET: &str = "kitchen-integration-secret";

pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub tokens: Arc<TokenService>,
}

pub fn doc(value: Value) -> Document {
    value.as_object().cloned().expect("document must be a JSON object")
}

fn seed_food() -> Vec<Document> {
    vec![
        doc(json!({"name": "Margherita", "price": 9})),
        doc(json!({"name": "Pad Thai", "price": 11})),
        doc(json!({"name": "Falafel Wrap", "price": 7})),
    ]
}

impl TestEnvironment {
    pub async fn new() -> Self {
        Self::with_services(Vec::new()).await
    }

    /// Start the real router on an ephemeral port, backed by in-memory collections
    pub async fn with_services(services: Vec<Document>) -> Self {
        let metrics = Arc::new(Metrics::new().expect("Failed to create metrics"));
        let tokens = Arc::new(TokenService::new(TEST_SECRET, 3600));

        let state = AppState::new(
            Arc::new(InMemoryDocumentRepository::with_documents(
                Collection::Services,
                services,
            )),
            Arc::new(InMemoryDocumentRepository::new(Collection::Reviews)),
            Arc::new(InMemoryDocumentRepository::with_documents(
                Collection::FoodList,
                seed_food(),
            )),
            tokens.clone(),
            metrics,
        );
        let app = create_app(
            state,
            RequestLimits {
                max_request_size: 1024 * 1024,
            },
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local address");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to serve app");
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            client: Client::new(),
            base_url,
            tokens,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Token for `email`, minted directly rather than through `/jwt`
    pub fn token_for(&self, email: &str) -> String {
        self.tokens
            .issue(doc(json!({ "email": email })))
            .expect("Failed to issue token")
    }

    pub async fn add_review(&self, review: Value) -> String {
        let response = self
            .client
            .post(self.url("/review"))
            .json(&review)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status().as_u16(), 200);

        let body: Value = response.json().await.expect("Failed to parse response");
        body["insertedId"]
            .as_str()
            .expect("insertedId must be a string")
            .to_string()
    }

    pub async fn list_reviews(&self, email: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url("/reviews"))
            .query(&[("email", email)])
            .header("authorization", format!("Bearer {}", token))
            .send()
            .await
            .expect("Failed to send request")
    }
}

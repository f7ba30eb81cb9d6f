use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use semdoc_rag::{
    EmbeddingProvider, GenerationProvider, InMemoryVectorIndex, ProviderFailure, ProviderResult,
    RagConfig, RetryPolicy, SemdocPipeline,
    mock::{KeywordEmbedder, MockGenerator},
};
use semdoc_server::{AppState, app_router};
use serde_json::{Value, json};

const VOCABULARY: [&str; 7] = ["paris", "berlin", "lyon", "france", "germany", "capital", "city"];

async fn spawn_pipeline(
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    request_timeout: Duration,
) -> (String, tokio::task::JoinHandle<()>) {
    let config = RagConfig::builder()
        .top_k(1)
        .similarity_threshold(0.5)
        .retry(RetryPolicy::none())
        .build()
        .expect("valid config");
    let pipeline = SemdocPipeline::builder()
        .config(config)
        .embedding_provider(embedder)
        .generation_provider(generator)
        .vector_index(Arc::new(InMemoryVectorIndex::new()))
        .build()
        .expect("pipeline");
    let app = app_router(AppState { pipeline }, request_timeout);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{}", addr), handle)
}

async fn spawn_with(
    embedder: KeywordEmbedder,
    generator: MockGenerator,
) -> (String, tokio::task::JoinHandle<()>) {
    spawn_pipeline(Arc::new(embedder), Arc::new(generator), Duration::from_secs(10)).await
}

async fn spawn_server() -> (String, tokio::task::JoinHandle<()>) {
    spawn_with(KeywordEmbedder::new(VOCABULARY), MockGenerator::default()).await
}

async fn create(client: &reqwest::Client, base: &str, body: Value) -> Value {
    let response = client
        .post(format!("{}/documents", base))
        .json(&body)
        .send()
        .await
        .expect("create response");
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    response.json().await.expect("document json")
}

#[tokio::test]
async fn document_lifecycle() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let created = create(
        &client,
        &base,
        json!({"content": "Paris is the capital of France", "metadata": {"lang": "fr", "year": 2024}}),
    )
    .await;
    let id = created.get("id").and_then(Value::as_str).expect("id field").to_string();
    assert!(created.get("embedding").is_none());
    assert_eq!(created["metadata"]["lang"], "fr");
    assert_eq!(created["metadata"]["year"], 2024.0);

    let fetched: Value = client
        .get(format!("{}/documents/{}", base, id))
        .send()
        .await
        .expect("get response")
        .json()
        .await
        .expect("get json");
    assert_eq!(fetched, created);

    let updated = client
        .put(format!("{}/documents/{}", base, id))
        .json(&json!({"content": "Lyon is a city in France"}))
        .send()
        .await
        .expect("update response");
    assert_eq!(updated.status(), reqwest::StatusCode::OK);
    let updated: Value = updated.json().await.expect("update json");
    assert_eq!(updated["content"], "Lyon is a city in France");
    assert_eq!(updated["created_at"], created["created_at"]);
    assert_eq!(updated["metadata"], created["metadata"]);

    let deleted = client
        .delete(format!("{}/documents/{}", base, id))
        .send()
        .await
        .expect("delete response");
    assert_eq!(deleted.status(), reqwest::StatusCode::NO_CONTENT);

    let missing = client
        .get(format!("{}/documents/{}", base, id))
        .send()
        .await
        .expect("get response");
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = missing.json().await.expect("error json");
    assert_eq!(body["error"], "not_found");

    let again = client
        .delete(format!("{}/documents/{}", base, id))
        .send()
        .await
        .expect("delete response");
    assert_eq!(again.status(), reqwest::StatusCode::NOT_FOUND);

    handle.abort();
}

#[tokio::test]
async fn search_answers_with_sources() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let paris = create(&client, &base, json!({"content": "Paris is the capital of France"})).await;
    create(&client, &base, json!({"content": "Berlin is the capital of Germany"})).await;

    let response = client
        .post(format!("{}/search", base))
        .json(&json!({"question": "What is the capital of France?"}))
        .send()
        .await
        .expect("search response");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let outcome: Value = response.json().await.expect("search json");

    assert_eq!(outcome["answer"]["sources"], json!([paris["id"]]));
    assert_eq!(outcome["matches"].as_array().map(Vec::len), Some(1));
    assert_eq!(outcome["matches"][0]["document_id"], paris["id"]);

    let filtered: Value = client
        .post(format!("{}/search", base))
        .json(&json!({
            "question": "What is the capital of France?",
            "filter": {"lang": "de"},
        }))
        .send()
        .await
        .expect("search response")
        .json()
        .await
        .expect("search json");
    assert_eq!(filtered["answer"]["sources"], json!([]));
    assert_eq!(filtered["matches"], json!([]));

    handle.abort();
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    for body in [
        json!({"content": "   "}),
        json!({"content": "Paris", "metadata": {"nested": {"a": 1}}}),
        json!({"content": "Paris", "metadata": {"tags": ["a", "b"]}}),
    ] {
        let response = client
            .post(format!("{}/documents", base))
            .json(&body)
            .send()
            .await
            .expect("create response");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST, "body: {body}");
        let error: Value = response.json().await.expect("error json");
        assert_eq!(error["error"], "invalid_input");
    }

    let doc = create(&client, &base, json!({"content": "Paris"})).await;
    let empty_update = client
        .put(format!("{}/documents/{}", base, doc["id"].as_str().expect("id")))
        .json(&json!({}))
        .send()
        .await
        .expect("update response");
    assert_eq!(empty_update.status(), reqwest::StatusCode::BAD_REQUEST);

    for query in [json!({"question": ""}), json!({"question": "Paris", "top_k": 0})] {
        let response = client
            .post(format!("{}/search", base))
            .json(&query)
            .send()
            .await
            .expect("search response");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST, "query: {query}");
    }

    let bad_page = client
        .get(format!("{}/documents?limit=0", base))
        .send()
        .await
        .expect("list response");
    assert_eq!(bad_page.status(), reqwest::StatusCode::BAD_REQUEST);

    handle.abort();
}

#[tokio::test]
async fn undecodable_bodies_are_invalid_input() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let requests = [
        ("/documents", "{not json".to_string()),
        ("/documents", json!({}).to_string()),
        ("/documents", json!({"content": 5}).to_string()),
        ("/search", json!({}).to_string()),
        ("/search", json!({"question": "x", "top_k": -1}).to_string()),
        ("/search", json!({"question": "x", "threshold": "high"}).to_string()),
    ];
    for (path, body) in requests {
        let response = client
            .post(format!("{}{}", base, path))
            .header("content-type", "application/json")
            .body(body.clone())
            .send()
            .await
            .expect("post response");
        assert_eq!(
            response.status(),
            reqwest::StatusCode::BAD_REQUEST,
            "{path} with {body}"
        );
        let error: Value = response.json().await.expect("error json");
        assert_eq!(error["error"], "invalid_input", "{path} with {body}");
        assert!(error["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    let missing_content_type = client
        .post(format!("{}/documents", base))
        .body(json!({"content": "Paris"}).to_string())
        .send()
        .await
        .expect("post response");
    assert_eq!(missing_content_type.status(), reqwest::StatusCode::BAD_REQUEST);

    let bad_limit = client
        .get(format!("{}/documents?limit=many", base))
        .send()
        .await
        .expect("list response");
    assert_eq!(bad_limit.status(), reqwest::StatusCode::BAD_REQUEST);
    let error: Value = bad_limit.json().await.expect("error json");
    assert_eq!(error["error"], "invalid_input");

    handle.abort();
}

#[tokio::test]
async fn list_pages_with_cursor() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    for content in ["Paris", "Berlin", "Lyon"] {
        create(&client, &base, json!({"content": content})).await;
    }

    let first: Value = client
        .get(format!("{}/documents?limit=2", base))
        .send()
        .await
        .expect("list response")
        .json()
        .await
        .expect("list json");
    assert_eq!(first["items"].as_array().map(Vec::len), Some(2));
    let cursor = first["next_cursor"].as_str().expect("next_cursor").to_string();

    let second: Value = client
        .get(format!("{}/documents?limit=2&cursor={}", base, cursor))
        .send()
        .await
        .expect("list response")
        .json()
        .await
        .expect("list json");
    assert_eq!(second["items"].as_array().map(Vec::len), Some(1));
    assert!(second.get("next_cursor").is_none());
    assert!(second["items"][0].get("embedding").is_none());

    handle.abort();
}

#[tokio::test]
async fn provider_failures_map_to_gateway_statuses() {
    let (base, handle) = spawn_with(
        KeywordEmbedder::new(VOCABULARY)
            .with_failures([ProviderFailure::transient("connection reset")]),
        MockGenerator::default().with_failures([ProviderFailure::rejected("content policy")]),
    )
    .await;
    let client = reqwest::Client::new();

    let unavailable = client
        .post(format!("{}/documents", base))
        .json(&json!({"content": "Paris is the capital of France"}))
        .send()
        .await
        .expect("create response");
    assert_eq!(unavailable.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = unavailable.json().await.expect("error json");
    assert_eq!(body["error"], "provider_unavailable");

    create(&client, &base, json!({"content": "Paris is the capital of France"})).await;
    let rejected = client
        .post(format!("{}/search", base))
        .json(&json!({"question": "What is the capital of France?"}))
        .send()
        .await
        .expect("search response");
    assert_eq!(rejected.status(), reqwest::StatusCode::BAD_GATEWAY);
    let body: Value = rejected.json().await.expect("error json");
    assert_eq!(body["error"], "provider_rejected");

    handle.abort();
}

#[tokio::test]
async fn health_reports_backend() {
    let (base, handle) = spawn_server().await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .expect("health response")
        .json()
        .await
        .expect("health json");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["vector_backend"], "memory");

    handle.abort();
}

/// Never answers within any reasonable deadline.
struct StalledGenerator;

#[async_trait]
impl GenerationProvider for StalledGenerator {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn generate(&self, _prompt: &str) -> ProviderResult<String> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok("too late".to_string())
    }
}

#[tokio::test]
async fn request_deadline_returns_service_unavailable() {
    let (base, handle) = spawn_pipeline(
        Arc::new(KeywordEmbedder::new(VOCABULARY)),
        Arc::new(StalledGenerator),
        Duration::from_millis(200),
    )
    .await;
    let client = reqwest::Client::new();

    create(&client, &base, json!({"content": "Paris is the capital of France"})).await;
    let response = client
        .post(format!("{}/search", base))
        .json(&json!({"question": "What is the capital of France?"}))
        .send()
        .await
        .expect("search response");
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    handle.abort();
}

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{Method, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use semdoc_rag::{
    Document, InMemoryVectorIndex, Metadata, MetadataFilter, Page, PageRequest, Query,
    SearchOutcome, SemdocPipeline, UpdateDocument, VectorIndexProvider, metadata_from_json,
    openai::{OpenAIClient, OpenAIConfig},
    qdrant::QdrantVectorIndex,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    config::{ServerArgs, VectorBackend},
    error::{ApiError, JsonBody, QueryString},
};

const DEFAULT_LIST_LIMIT: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: SemdocPipeline,
}

type ApiResult<T> = Result<T, ApiError>;

/// A document as returned over HTTP. The embedding stays server-side.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DocumentView {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentView {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            content: doc.content,
            metadata: doc.metadata,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub question: String,
    #[serde(default)]
    pub filter: Option<Map<String, Value>>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f32>,
}

pub fn app_router(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/documents", post(create_document).get(list_documents))
        .route(
            "/documents/{id}",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route("/search", post(search))
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::SERVICE_UNAVAILABLE,
            request_timeout,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Build the pipeline from `args` and serve until interrupted.
pub async fn run_server(args: ServerArgs) -> anyhow::Result<()> {
    let config = args.rag_config().context("invalid pipeline configuration")?;

    let openai = Arc::new(
        OpenAIClient::new(
            OpenAIConfig::new(&args.openai_api_key)
                .with_base_url(&args.openai_base_url)
                .with_embedding_model(&args.embedding_model)
                .with_chat_model(&args.chat_model)
                .with_dimensions(args.embedding_dimensions)
                .with_request_timeout(args.request_timeout()),
        )
        .context("failed to create OpenAI client")?,
    );

    let index: Arc<dyn VectorIndexProvider> = match args.vector_backend {
        VectorBackend::Memory => Arc::new(InMemoryVectorIndex::new()),
        VectorBackend::Qdrant => Arc::new(
            QdrantVectorIndex::connect(
                &args.qdrant_url,
                &args.qdrant_collection,
                args.embedding_dimensions,
            )
            .await
            .with_context(|| format!("failed to connect to qdrant at {}", args.qdrant_url))?,
        ),
    };

    let pipeline = SemdocPipeline::builder()
        .config(config)
        .embedding_provider(openai.clone())
        .generation_provider(openai)
        .vector_index(index)
        .build()
        .context("failed to assemble pipeline")?;

    let app = app_router(AppState { pipeline }, args.request_timeout());
    let addr: SocketAddr = args
        .bind_address()
        .parse()
        .with_context(|| "invalid host/port for semdoc server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(backend = ?args.vector_backend, "semdoc listening on http://{}", addr);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "semdoc",
        "vector_backend": state.pipeline.vector_index().backend_name(),
    }))
}

async fn create_document(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateDocumentRequest>,
) -> ApiResult<(StatusCode, Json<DocumentView>)> {
    let metadata = metadata_from_json(request.metadata)?;
    let doc = state.pipeline.documents().create(request.content, metadata).await?;
    Ok((StatusCode::CREATED, Json(doc.into())))
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DocumentView>> {
    let doc = state.pipeline.documents().get(&id).await?;
    Ok(Json(doc.into()))
}

async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdateDocumentRequest>,
) -> ApiResult<Json<DocumentView>> {
    let changes = UpdateDocument {
        content: request.content,
        metadata: request.metadata.map(metadata_from_json).transpose()?,
    };
    let doc = state.pipeline.documents().update(&id, changes).await?;
    Ok(Json(doc.into()))
}

async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.pipeline.documents().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_documents(
    State(state): State<AppState>,
    QueryString(params): QueryString<ListParams>,
) -> ApiResult<Json<Page<DocumentView>>> {
    let limit = params
        .limit
        .unwrap_or_else(|| DEFAULT_LIST_LIMIT.min(state.pipeline.config().max_page_size));
    let page = PageRequest { cursor: params.cursor, limit };
    let docs = state.pipeline.documents().list(&page).await?;
    Ok(Json(docs.map(DocumentView::from)))
}

async fn search(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SearchRequest>,
) -> ApiResult<Json<SearchOutcome>> {
    let mut query = Query::new(request.question);
    if let Some(filter) = request.filter {
        query = query.with_filter(MetadataFilter(metadata_from_json(filter)?));
    }
    query.top_k = request.top_k;
    query.threshold = request.threshold;

    let outcome = state.pipeline.search(&query).await?;
    Ok(Json(outcome))
}

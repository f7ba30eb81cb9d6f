//! Command-line and environment configuration.
//!
//! Every flag can also be set through the environment variable named next to
//! it, so the service can be configured from the environment alone.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use semdoc_rag::{RagConfig, Result};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Where document vectors are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VectorBackend {
    /// Process-local index, lost on restart.
    Memory,
    /// A Qdrant collection over gRPC.
    Qdrant,
}

/// semdoc: store documents, search them by meaning, get cited answers.
#[derive(Debug, Clone, Parser)]
#[command(name = "semdoc", version, about)]
pub struct ServerArgs {
    /// Address to bind.
    #[arg(long, env = "SEMDOC_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "SEMDOC_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Default number of matches retrieved per question.
    #[arg(long, env = "SEMDOC_TOP_K", default_value_t = 5)]
    pub top_k: usize,

    /// Default minimum similarity score for a match.
    #[arg(long, env = "SEMDOC_THRESHOLD", default_value_t = 0.0)]
    pub threshold: f32,

    /// Characters of document content allowed in one prompt.
    #[arg(long, env = "SEMDOC_CONTEXT_BUDGET", default_value_t = 4000)]
    pub context_budget: usize,

    /// Per-request deadline, in seconds.
    #[arg(long, env = "SEMDOC_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    #[arg(long, env = "SEMDOC_OPENAI_BASE_URL", default_value = semdoc_rag::openai::OPENAI_API_BASE)]
    pub openai_base_url: String,

    #[arg(long, env = "SEMDOC_EMBEDDING_MODEL", default_value = semdoc_rag::openai::DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    /// Must match the embedding model's output width.
    #[arg(long, env = "SEMDOC_EMBEDDING_DIMENSIONS", default_value_t = 1536)]
    pub embedding_dimensions: usize,

    #[arg(long, env = "SEMDOC_CHAT_MODEL", default_value = semdoc_rag::openai::DEFAULT_CHAT_MODEL)]
    pub chat_model: String,

    #[arg(long, env = "SEMDOC_VECTOR_BACKEND", value_enum, default_value_t = VectorBackend::Memory)]
    pub vector_backend: VectorBackend,

    #[arg(long, env = "SEMDOC_QDRANT_URL", default_value = "http://localhost:6334")]
    pub qdrant_url: String,

    #[arg(long, env = "SEMDOC_QDRANT_COLLECTION", default_value = "documents")]
    pub qdrant_collection: String,

    #[arg(long, env = "SEMDOC_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl ServerArgs {
    /// Build the validated pipeline configuration from these arguments.
    pub fn rag_config(&self) -> Result<RagConfig> {
        RagConfig::builder()
            .top_k(self.top_k)
            .similarity_threshold(self.threshold)
            .context_budget(self.context_budget)
            .build()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_with_defaults() {
        let args = ServerArgs::try_parse_from([
            "semdoc",
            "--openai-api-key",
            "sk-test",
            "--top-k",
            "3",
            "--vector-backend",
            "qdrant",
        ])
        .unwrap();

        assert_eq!(args.top_k, 3);
        assert_eq!(args.vector_backend, VectorBackend::Qdrant);
        assert_eq!(args.log_format, LogFormat::Text);
        assert_eq!(args.bind_address(), "127.0.0.1:8080");
        assert_eq!(args.request_timeout(), Duration::from_secs(30));

        let config = args.rag_config().unwrap();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.context_budget, 4000);
    }

    #[test]
    fn invalid_pipeline_settings_are_config_errors() {
        let args = ServerArgs::try_parse_from(["semdoc", "--openai-api-key", "k", "--top-k", "0"])
            .unwrap();
        assert!(matches!(args.rag_config(), Err(semdoc_rag::RagError::Config(_))));
    }
}

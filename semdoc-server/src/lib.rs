//! # semdoc-server
//!
//! HTTP front end for [`semdoc_rag`]: document CRUD under `/documents` and
//! question answering under `/search`.
//!
//! | Route | Method | Result |
//! |-------|--------|--------|
//! | `/documents` | `POST` | `201` with the stored document |
//! | `/documents` | `GET` | one page of documents, `?cursor=&limit=` |
//! | `/documents/{id}` | `GET`, `PUT` | the document |
//! | `/documents/{id}` | `DELETE` | `204` |
//! | `/search` | `POST` | `{answer, matches}` |
//! | `/health` | `GET` | liveness |

pub mod config;
pub mod error;
pub mod server;
pub mod telemetry;

pub use config::{LogFormat, ServerArgs, VectorBackend};
pub use error::ApiError;
pub use server::{AppState, DocumentView, app_router, run_server};

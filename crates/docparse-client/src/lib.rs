//! Document Parsing Client Library
//!
//! Uploads a document (local file, in-memory bytes, or URL) to a remote
//! parsing service, polls the job until it finishes, and returns the
//! extracted content.
//!
//! # Example
//!
//! ```rust,no_run
//! use docparse_client::{ClientConfig, ParseClient, ParseOptions, ResultType};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = ParseOptions::builder()
//!         .result_type(ResultType::Markdown)
//!         .ignore_errors(false)
//!         .build()?;
//!     let config = ClientConfig::resolve(None, None, &Default::default())?;
//!     let client = ParseClient::new(ClientConfig { options, ..config })?;
//!
//!     // Local file
//!     let markdown = client.parse_file("report.pdf").await?;
//!
//!     // In-memory content needs a declared type
//!     let bytes = std::fs::read("slides.pptx")?;
//!     let slides = client.parse_bytes(bytes, Some("pptx")).await?;
//!
//!     // The service fetches URLs itself
//!     let remote = client.parse_url("https://example.com/paper.pdf").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Errors
//!
//! With `ignore_errors` on (the default), `parse*` calls log failures and
//! return `Ok(None)`. Turn it off to receive the specific [`ParseError`].
//!
//! # Lower-level steps
//!
//! ```rust,ignore
//! let job = client.submit(&ContentSource::path("report.pdf")).await?;
//! client.wait_for_completion(&job).await?;
//! let json = client.fetch_result_as(&job, ResultType::Json).await?;
//! ```
//!
//! # Testing
//!
//! The `testing` module serves an axum router on a local port and hands
//! back a client pointed at it:
//!
//! ```rust,ignore
//! use docparse_client::testing::TestServer;
//!
//! let server = TestServer::start(mock_service_router()).await?;
//! let content = server.client.parse_input("/tmp/doc.pdf", None).await?;
//! ```

mod client;
pub mod config;
mod error;
mod extract;
pub mod file_types;
pub mod poll;
pub mod sanitize;
mod source;
pub mod testing;

pub use client::ParseClient;
pub use config::{ApiKey, ClientConfig, ParseOptions, ParseOptionsBuilder, ResultType};
pub use error::{ErrorKind, ParseError, Result, MISSING_ERROR_CODE, MISSING_ERROR_MESSAGE};
pub use extract::{extract_content, Content};
pub use poll::{JobId, JobPhase, JobStatus, JobStatusResponse, JobTracker};
pub use source::ContentSource;

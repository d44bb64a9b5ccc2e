//! Test utilities for docparse-client
//!
//! [`TestServer`] serves a fake parsing service on an ephemeral localhost
//! port and hands back a [`ParseClient`] already pointed at it.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::{ClientConfig, ParseOptions};
use crate::{ParseClient, Result};

/// API key the test client sends
pub const TEST_API_KEY: &str = "llx-test-key";

/// Local parsing service, stopped when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: ParseClient,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Serve `router` with a default-option client
    ///
    /// # Example
    ///
    /// ```ignore
    /// use docparse_client::testing::TestServer;
    ///
    /// let router = axum::Router::new()
    ///     .route("/upload", axum::routing::post(upload))
    ///     .route("/job/{id}", axum::routing::get(status));
    /// let server = TestServer::start(router).await?;
    /// let content = server.client.parse_file("report.pdf").await?;
    /// ```
    pub async fn start(router: axum::Router) -> Result<Self> {
        Self::start_with_options(router, ParseOptions::default()).await
    }

    /// Serve `router` with a client using `options`
    pub async fn start_with_options(router: axum::Router, options: ParseOptions) -> Result<Self> {
        // Bound before spawning, so early requests wait in the backlog
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let shutdown = async {
                stopped.await.ok();
            };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::warn!(error = %e, "Test server exited");
            }
        });

        let config = ClientConfig::builder(TEST_API_KEY)
            .base_url(format!("http://{}", addr))
            .options(options)
            .request_timeout_ms(5_000)
            .connect_timeout_ms(2_000)
            .build();

        Ok(Self {
            addr,
            client: ParseClient::new(config)?,
            stop: Some(stop),
            task: Some(task),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> &ParseClient {
        &self.client
    }

    /// Stop accepting requests and wait for in-flight ones to finish
    pub async fn shutdown(mut self) {
        self.signal_stop();
        if let Some(task) = self.task.take() {
            task.await.ok();
        }
    }

    fn signal_stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.send(()).ok();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.signal_stop();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

//! Parse service HTTP client implementation

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::instrument;
use url::Url;

use crate::config::{ClientConfig, ParseOptions, ResultType};
use crate::error::{ParseError, Result};
use crate::extract::{extract_content, Content};
use crate::file_types;
use crate::poll::{JobId, JobStatusResponse, JobTracker, PollStep, UploadResponse};
use crate::sanitize::{sanitize_bytes, sanitize_for_log};
use crate::source::ContentSource;

/// Emit a progress line when the `verbose` option is on
macro_rules! progress {
    ($client:expr, $level:ident, $($arg:tt)+) => {
        if $client.config.options.verbose {
            tracing::$level!($($arg)+);
        }
    };
}

/// Escape characters that would split a job id across URL components.
fn encode_path_segment(id: &str) -> String {
    id.replace('%', "%25")
        .replace('/', "%2F")
        .replace('?', "%3F")
        .replace('#', "%23")
}

/// Client for the document-parsing service
///
/// Cloning is cheap; clones share the connection pool and the resolved
/// configuration, so independent `parse` calls can run on separate tasks.
///
/// Waiting for a job suspends the calling task for the whole poll loop.
#[derive(Debug, Clone)]
pub struct ParseClient {
    client: Client,
    base_url: Url,
    config: Arc<ClientConfig>,
}

impl ParseClient {
    /// Create a client from a resolved configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose()))
            .map_err(|e| ParseError::Configuration(format!("Invalid API key: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeouts.request_ms))
            .connect_timeout(Duration::from_millis(config.timeouts.connect_ms))
            .default_headers(headers)
            .build()?;

        let base_url = normalize_base_url(&config.base_url)?;

        Ok(Self {
            client,
            base_url,
            config: Arc::new(config),
        })
    }

    /// Create a client from `LLAMA_CLOUD_API_KEY` / `LLAMA_CLOUD_BASE_URL`
    /// with default options
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::resolve(None, None, &Default::default())?)
    }

    /// Create a client for the default endpoint with default options
    pub fn with_api_key(api_key: &str) -> Result<Self> {
        Self::new(ClientConfig::builder(api_key).build())
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the resolved configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn options(&self) -> &ParseOptions {
        &self.config.options
    }

    // =========================================================================
    // End-to-end parsing
    // =========================================================================

    /// Upload, wait, and fetch the configured result type
    ///
    /// With `ignore_errors` on (the default) any failure is logged and
    /// `Ok(None)` is returned; otherwise the failure propagates unchanged.
    /// `Ok(None)` is also returned when the job finished without content.
    pub async fn parse(&self, source: ContentSource) -> Result<Option<Content>> {
        match self.run(&source).await {
            Ok(content) => Ok(content),
            Err(e) => self.handle_error(e, &source.describe()),
        }
    }

    /// Parse a string input: a path, a URL, or (with `file_type`) the
    /// content itself
    pub async fn parse_input(
        &self,
        input: &str,
        file_type: Option<&str>,
    ) -> Result<Option<Content>> {
        match ContentSource::resolve(input, file_type) {
            Ok(source) => self.parse(source).await,
            Err(e) => self.handle_error(e, &describe_raw_input(input, file_type)),
        }
    }

    /// Parse a local file
    pub async fn parse_file(&self, path: impl AsRef<Path>) -> Result<Option<Content>> {
        self.parse(ContentSource::path(path.as_ref())).await
    }

    /// Parse in-memory content of the given type
    pub async fn parse_bytes(
        &self,
        data: impl Into<Vec<u8>>,
        file_type: Option<&str>,
    ) -> Result<Option<Content>> {
        self.parse(ContentSource::bytes(data, file_type)).await
    }

    /// Have the service fetch and parse a remote document
    pub async fn parse_url(&self, url: &str) -> Result<Option<Content>> {
        match ContentSource::url(url) {
            Ok(source) => self.parse(source).await,
            Err(e) => self.handle_error(e, &format!("url: {}", url)),
        }
    }

    async fn run(&self, source: &ContentSource) -> Result<Option<Content>> {
        let job_id = self.submit(source).await?;
        self.wait_for_completion(&job_id).await?;
        let content = self.fetch_result(&job_id).await?;
        progress!(self, info, job_id = %job_id, "Successfully retrieved result");
        Ok(content)
    }

    fn handle_error(&self, error: ParseError, descriptor: &str) -> Result<Option<Content>> {
        if self.config.options.ignore_errors {
            progress!(
                self,
                error,
                kind = ?error.kind(),
                "Error while parsing file ({}): {}",
                sanitize_for_log(descriptor),
                sanitize_for_log(&error.to_string())
            );
            Ok(None)
        } else {
            Err(error)
        }
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Upload a content source and return the job id
    #[instrument(skip(self, source), fields(source = %source))]
    pub async fn submit(&self, source: &ContentSource) -> Result<JobId> {
        let (job_id, what) = match source {
            ContentSource::Path(path) => (self.create_job_from_path(path).await?, "file"),
            ContentSource::Bytes { data, file_type } => (
                self.create_job_from_bytes(data, file_type.as_deref())
                    .await?,
                "binary data",
            ),
            ContentSource::Url(url) => (self.create_job_from_url(url).await?, "URL"),
        };

        progress!(self, info, job_id = %job_id, "Started parsing {} under job_id {}", what, job_id);
        Ok(job_id)
    }

    async fn create_job_from_path(&self, path: &Path) -> Result<JobId> {
        file_types::validate_path(path)?;

        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let part = Part::bytes(data)
            .file_name(file_name)
            .mime_str(file_types::content_type_for(path))?;

        self.upload_file_part(part).await
    }

    async fn create_job_from_bytes(&self, data: &[u8], file_type: Option<&str>) -> Result<JobId> {
        let file_type = file_type.ok_or(ParseError::MissingFileType)?;
        let extension = file_types::validate_extension(file_type)?;

        // Staged on disk for the duration of the upload; removed when
        // `staged` drops, on every exit path.
        let suffix = extension.clone();
        let data = data.to_vec();
        let (staged, data) = tokio::task::spawn_blocking(move || -> std::io::Result<_> {
            let mut staged = tempfile::Builder::new()
                .prefix("upload")
                .suffix(&suffix)
                .tempfile()?;
            staged.write_all(&data)?;
            staged.flush()?;
            Ok((staged, data))
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        let file_name = staged
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("upload{}", extension));

        progress!(
            self,
            debug,
            "Staged {} bytes of binary data as {}",
            data.len(),
            file_name
        );

        let part = Part::bytes(data)
            .file_name(file_name)
            .mime_str(file_types::content_type_for(staged.path()))?;

        let job = self.upload_file_part(part).await;
        drop(staged);
        job
    }

    async fn create_job_from_url(&self, input_url: &Url) -> Result<JobId> {
        progress!(self, debug, "Creating job from URL: {}", input_url);

        let url = self.build_url("upload")?;
        let mut fields = self.config.options.form_fields();
        fields.push(("input_url".to_string(), input_url.to_string()));

        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .timeout(Duration::from_millis(self.config.timeouts.url_upload_ms))
            .form(&fields)
            .send()
            .await?;

        let upload: UploadResponse = self.handle_response(response).await?;
        progress!(self, debug, "Response: job {}", upload.id);
        Ok(upload.id)
    }

    async fn upload_file_part(&self, part: Part) -> Result<JobId> {
        let url = self.build_url("upload")?;

        let form = self
            .config
            .options
            .form_fields()
            .into_iter()
            .fold(Form::new(), |form, (key, value)| form.text(key, value))
            .part("file", part);

        let response = self.client.post(url).multipart(form).send().await?;
        let upload: UploadResponse = self.handle_response(response).await?;
        Ok(upload.id)
    }

    // =========================================================================
    // Polling
    // =========================================================================

    /// Get the current status of a job
    #[instrument(skip(self))]
    pub async fn get_job_status(&self, job_id: &JobId) -> Result<JobStatusResponse> {
        let url = self.build_url(&format!("job/{}", encode_path_segment(job_id.as_str())))?;
        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    /// Poll until the job succeeds, fails, or exceeds `max_timeout`
    ///
    /// Sleeps `check_interval` before every status query. The timeout is
    /// checked after each query and before its status is interpreted.
    #[instrument(skip(self))]
    pub async fn wait_for_completion(&self, job_id: &JobId) -> Result<JobStatusResponse> {
        let options = &self.config.options;
        let mut tracker =
            JobTracker::start(job_id.clone(), options.check_interval(), options.max_timeout());

        loop {
            tokio::time::sleep(tracker.check_interval()).await;
            let response = self.get_job_status(job_id).await?;

            progress!(
                self,
                debug,
                job_id = %job_id,
                elapsed_ms = tracker.elapsed().as_millis() as u64,
                "Status: {}",
                sanitize_for_log(&response.status)
            );

            match tracker.observe(&response)? {
                PollStep::Done => return Ok(response),
                PollStep::Continue => continue,
            }
        }
    }

    // =========================================================================
    // Results
    // =========================================================================

    /// Fetch the result in the configured result type
    pub async fn fetch_result(&self, job_id: &JobId) -> Result<Option<Content>> {
        self.fetch_result_as(job_id, self.config.options.result_type)
            .await
    }

    /// Fetch the result in a specific representation
    #[instrument(skip(self))]
    pub async fn fetch_result_as(
        &self,
        job_id: &JobId,
        result_type: ResultType,
    ) -> Result<Option<Content>> {
        let url = self.build_url(&format!(
            "job/{}/result/{}",
            encode_path_segment(job_id.as_str()),
            result_type
        ))?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let body = sanitize_bytes(&bytes);

        if !status.is_success() {
            return Err(ParseError::server_error(
                status.as_u16(),
                sanitize_for_log(&body),
            ));
        }

        progress!(self, info, "Result type: {}", result_type);
        progress!(self, info, "Raw response body: {}", sanitize_for_log(&body));

        let content = extract_content(&body, result_type);
        if content.is_none() {
            progress!(self, warn, job_id = %job_id, "Warning: No content found in response");
        }
        Ok(content)
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    fn build_url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(Into::into)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| ParseError::Decode(e.to_string()))
        } else {
            let message = match response.bytes().await {
                Ok(body) if !body.is_empty() => sanitize_for_log(&sanitize_bytes(&body)),
                _ => format!("HTTP {}", status),
            };
            Err(ParseError::server_error(status.as_u16(), message))
        }
    }
}

/// Make sure relative joins land under the base path, not beside it
fn normalize_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    if url.cannot_be_a_base() {
        return Err(ParseError::Configuration(format!(
            "base URL '{}' cannot hold paths",
            base_url
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn describe_raw_input(input: &str, file_type: Option<&str>) -> String {
    if file_type.is_none() && input.starts_with('/') {
        format!("file path: {}", input)
    } else {
        "binary data".to_string()
    }
}

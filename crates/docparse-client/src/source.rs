//! Content sources: where the bytes to parse come from

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{ParseError, Result};

/// The content handed to the parsing service
///
/// Exactly one representation is active. String inputs of unknown shape
/// are classified once with [`ContentSource::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// A file on the local filesystem
    Path(PathBuf),
    /// In-memory content with an optional declared type (`"pdf"`, `".docx"`,
    /// `"application/pdf"`)
    Bytes {
        data: Vec<u8>,
        file_type: Option<String>,
    },
    /// A document the service should fetch itself
    Url(Url),
}

impl ContentSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn bytes(data: impl Into<Vec<u8>>, file_type: Option<&str>) -> Self {
        Self::Bytes {
            data: data.into(),
            file_type: file_type.map(String::from),
        }
    }

    pub fn url(url: &str) -> Result<Self> {
        Ok(Self::Url(Url::parse(url)?))
    }

    /// Classify a caller-supplied string
    ///
    /// 1. A declared type means the string itself is the content.
    /// 2. An existing regular file is uploaded from disk.
    /// 3. An absolute URL with a host is fetched by the service.
    /// 4. Anything else is ambiguous.
    pub fn resolve(input: &str, declared_type: Option<&str>) -> Result<Self> {
        if let Some(file_type) = declared_type {
            return Ok(Self::bytes(input.as_bytes(), Some(file_type)));
        }

        let path = Path::new(input);
        if path.exists() {
            if !path.is_file() {
                return Err(ParseError::UnsupportedInputType(format!(
                    "'{}' exists but is not a regular file",
                    input
                )));
            }
            return Ok(Self::Path(path.to_path_buf()));
        }

        if let Some(url) = parse_absolute_url(input) {
            return Ok(Self::Url(url));
        }

        Err(ParseError::AmbiguousInput(input.to_string()))
    }

    /// Short description used in log lines
    pub fn describe(&self) -> String {
        match self {
            Self::Path(path) => format!("file path: {}", path.display()),
            Self::Bytes { .. } => "binary data".to_string(),
            Self::Url(url) => format!("url: {}", url),
        }
    }
}

impl fmt::Display for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn parse_absolute_url(input: &str) -> Option<Url> {
    let url = Url::parse(input).ok()?;
    if url.cannot_be_a_base() || url.host_str().map_or(true, str::is_empty) {
        return None;
    }
    Some(url)
}

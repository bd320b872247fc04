//! HttpTransport - the network seam of the HTTP requester
//!
//! `ReqwestTransport` is the production implementation. Tests wrap or
//! replace it to script transport failures.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use tracing::{debug, instrument};
use url::Url;

use crate::config::HttpSettings;
use crate::error::{FlowError, Result};
use crate::util::constants::{CONNECT_TIMEOUT, REDIRECT_LIMIT};

/// One multipart part
#[derive(Debug, Clone)]
pub enum FormPart {
    Text { name: String, value: String },
    /// Buffered file content, re-sent on every attempt
    File { name: String, data: Bytes },
}

/// Body of an outbound request, rebuilt for each attempt
#[derive(Debug, Clone)]
pub enum OutboundBody {
    Empty,
    Bytes {
        data: Bytes,
        content_type: &'static str,
    },
    /// Streamed from a remote file, fetched per attempt.
    /// Not size-capped; the byte ceiling applies to form-data files only.
    Remote { file_url: String },
    Multipart { parts: Vec<FormPart> },
}

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: OutboundBody,
    pub timeout: Duration,
}

/// Completed exchange, whatever the status
#[derive(Debug, Clone, PartialEq)]
pub struct InboundResponse {
    pub status: u16,
    /// Last value wins per header name
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform one attempt. Connection-level failures are `Transport`
    /// errors; an error status is still `Ok`.
    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse>;

    /// Download a remote file, failing once more than `max_bytes` were read
    async fn fetch_file(&self, url: &str, max_bytes: u64) -> Result<Bytes>;
}

/// reqwest-backed transport with a shared connection pool
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    file_fetch_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(REDIRECT_LIMIT))
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| FlowError::ConfigError {
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            file_fetch_timeout: settings.file_fetch_timeout(),
        })
    }

    async fn get_file(&self, url: &str) -> Result<reqwest::Response> {
        let download_error = |reason: String| FlowError::FileDownload {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .timeout(self.file_fetch_timeout)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(download_error(format!("status code {}", response.status().as_u16())));
        }
        Ok(response)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(request.timeout);

        builder = match request.body {
            OutboundBody::Empty => builder,
            OutboundBody::Bytes { data, content_type } => {
                builder.header(CONTENT_TYPE, content_type).body(data)
            }
            OutboundBody::Remote { file_url } => {
                // streamed as-is, no ceiling
                let file = self.get_file(&file_url).await?;
                builder
                    .header(CONTENT_TYPE, super::request::CONTENT_TYPE_BINARY)
                    .body(reqwest::Body::wrap_stream(file.bytes_stream()))
            }
            OutboundBody::Multipart { parts } => {
                let form = parts.into_iter().fold(Form::new(), |form, part| match part {
                    FormPart::Text { name, value } => form.text(name, value),
                    FormPart::File { name, data } => {
                        let file_name = name.clone();
                        form.part(name, Part::stream(data).file_name(file_name))
                    }
                });
                builder.multipart(form)
            }
        };

        let response = builder.send().await.map_err(|e| FlowError::Transport {
            reason: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let body = response.text().await.map_err(|e| FlowError::Transport {
            reason: format!("Failed to read response: {}", e),
        })?;

        debug!(status, "response received");
        Ok(InboundResponse {
            status,
            headers,
            body,
        })
    }

    async fn fetch_file(&self, url: &str, max_bytes: u64) -> Result<Bytes> {
        let response = self.get_file(url).await?;
        let mut stream = response.bytes_stream();
        let mut buffer = BytesMut::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FlowError::FileDownload {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            buffer.extend_from_slice(&chunk);
            if buffer.len() as u64 > max_bytes {
                return Err(FlowError::BodyTooLarge {
                    total: buffer.len() as u64,
                    limit: max_bytes,
                });
            }
        }

        Ok(buffer.freeze())
    }
}

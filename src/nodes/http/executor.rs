//! HttpRequester - the HTTP requester node executor

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

use crate::config::HttpSettings;
use crate::error::{FlowError, Result};
use crate::event::EventKind;
use crate::nodes::NodeExecutor;
use crate::runtime::ExecutionContext;

use super::config::{BodyConfig, HttpConfig};
use super::request::{
    build_headers, build_url, render_body, Request, RenderedBody, CONTENT_TYPE_FORM_URLENCODED,
    CONTENT_TYPE_JSON, CONTENT_TYPE_PLAIN_TEXT,
};
use super::transport::{FormPart, HttpTransport, InboundResponse, OutboundBody, OutboundRequest};

/// Output keys
pub const OUTPUT_HEADERS: &str = "headers";
pub const OUTPUT_BODY: &str = "body";
pub const OUTPUT_STATUS_CODE: &str = "statusCode";

/// Executes one HTTP requester node
pub struct HttpRequester {
    node: Arc<str>,
    config: HttpConfig,
    transport: Arc<dyn HttpTransport>,
    settings: HttpSettings,
}

impl HttpRequester {
    pub fn new(
        node: impl Into<Arc<str>>,
        config: HttpConfig,
        transport: Arc<dyn HttpTransport>,
        settings: HttpSettings,
    ) -> Self {
        Self {
            node: node.into(),
            config,
            transport,
            settings,
        }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Describe the request `input` would produce, without sending it
    pub fn preview(&self, input: Map<String, Value>, redact: bool) -> Result<Map<String, Value>> {
        super::preview::preview(&self.config, input, redact)
    }

    /// Attempts to make; 0 still makes one
    fn attempts(&self) -> u64 {
        self.config
            .retry_times
            .unwrap_or(self.settings.default_retry_times)
            .max(1)
    }

    fn timeout(&self) -> Duration {
        self.config
            .timeout
            .unwrap_or_else(|| self.settings.default_timeout())
    }

    /// Turn the rendered body into an outbound one, downloading form-data
    /// files up front under the cumulative size ceiling
    async fn prepare_body(&self, rendered: RenderedBody) -> Result<OutboundBody> {
        Ok(match rendered {
            RenderedBody::Empty => OutboundBody::Empty,
            RenderedBody::Json(text) => OutboundBody::Bytes {
                data: Bytes::from(text),
                content_type: CONTENT_TYPE_JSON,
            },
            RenderedBody::RawText(text) => OutboundBody::Bytes {
                data: Bytes::from(text),
                content_type: CONTENT_TYPE_PLAIN_TEXT,
            },
            RenderedBody::FormUrlEncoded(fields) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter())
                    .finish();
                OutboundBody::Bytes {
                    data: Bytes::from(encoded),
                    content_type: CONTENT_TYPE_FORM_URLENCODED,
                }
            }
            RenderedBody::Binary { file_url } => {
                let file_url = file_url.ok_or_else(|| FlowError::InvalidInput {
                    reason: "file url is required".to_string(),
                })?;
                OutboundBody::Remote { file_url }
            }
            RenderedBody::FormData(fields) => {
                let BodyConfig::FormData { file_fields } = &self.config.body else {
                    return Err(FlowError::SchemaContract {
                        reason: "form data rendered for a non form-data body".to_string(),
                    });
                };
                let limit = self.settings.max_form_data_bytes;
                let mut total = 0u64;
                let mut parts = Vec::with_capacity(fields.len());

                for (name, value) in fields {
                    if !file_fields.contains(&name) {
                        parts.push(FormPart::Text { name, value });
                        continue;
                    }

                    let data = self
                        .transport
                        .fetch_file(&value, limit.saturating_sub(total))
                        .await
                        .map_err(|e| match e {
                            FlowError::BodyTooLarge { total: read, .. } => FlowError::BodyTooLarge {
                                total: total + read,
                                limit,
                            },
                            other => other,
                        })?;
                    total += data.len() as u64;
                    debug!(field = %name, bytes = data.len(), total, "form-data file fetched");
                    parts.push(FormPart::File { name, data });
                }

                OutboundBody::Multipart { parts }
            }
        })
    }

    fn emit(&self, ctx: &ExecutionContext, kind: EventKind) {
        ctx.event_log().emit(kind);
    }
}

#[async_trait]
impl NodeExecutor for HttpRequester {
    #[instrument(skip(self, ctx, input), fields(node = %self.node, method = %self.config.method))]
    async fn invoke(
        &self,
        ctx: &ExecutionContext,
        input: Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        let request = Request::from_input(input)?;

        let url = build_url(&self.config, &request)?;
        self.emit(
            ctx,
            EventKind::TemplateResolved {
                node: Arc::clone(&self.node),
                template: self.config.url_template.clone(),
                result: url.to_string(),
            },
        );

        let headers = build_headers(&self.config, &request)?;
        let body = self
            .prepare_body(render_body(&self.config.body, &request))
            .await?;

        let outbound = OutboundRequest {
            method: self.config.method.clone(),
            url,
            headers,
            body,
            timeout: self.timeout(),
        };

        let (url, response) = self.send_with_retry(ctx, outbound).await?;
        into_output(url, response)
    }
}

/// Shape a completed exchange into the node output.
/// Status >= 400 is an application failure carrying the full exchange.
fn into_output(url: String, response: InboundResponse) -> Result<Map<String, Value>> {
    let headers = serde_json::to_string(&response.headers)?;

    if response.status >= 400 {
        return Err(FlowError::HttpStatus {
            url,
            status: response.status,
            headers,
            body: response.body,
        });
    }

    let mut output = Map::new();
    output.insert(OUTPUT_HEADERS.to_string(), Value::String(headers));
    output.insert(OUTPUT_BODY.to_string(), Value::String(response.body));
    output.insert(OUTPUT_STATUS_CODE.to_string(), json!(i64::from(response.status)));
    Ok(output)
}

impl HttpRequester {
    /// Plain retry loop: transport errors retry, everything else returns
    async fn send_with_retry(
        &self,
        ctx: &ExecutionContext,
        outbound: OutboundRequest,
    ) -> Result<(String, InboundResponse)> {
        let attempts = self.attempts();
        let url = outbound.url.to_string();
        let mut last_error = None;

        for attempt in 1..=attempts {
            if let Err(e) = ctx.checkpoint().await {
                self.emit(
                    ctx,
                    EventKind::CancelObserved {
                        node: Arc::clone(&self.node),
                        execution_id: ctx.execution_id(),
                    },
                );
                return Err(e);
            }

            match ctx.run_cancellable(self.transport.send(outbound.clone())).await {
                Ok(response) => return Ok((url, response)),
                Err(e) if e.is_retryable() => {
                    warn!(attempt, attempts, error = %e, "HTTP attempt failed");
                    self.emit(
                        ctx,
                        EventKind::HttpAttemptFailed {
                            node: Arc::clone(&self.node),
                            attempt,
                            error: e.to_string(),
                        },
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| FlowError::Transport {
            reason: "no attempt was made".to_string(),
        }))
    }
}

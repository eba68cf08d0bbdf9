//! Structured fault log
//!
//! Every response that answers an unhandled fault (an internal [`Error`] or a
//! handler panic) is appended as one JSON line to
//! `<dir>/error-YYYY-MM-DD-HH-mm-ss.txt`, the file being named when the log is
//! created. The client only ever sees the generic 500 body.
//!
//! [`Error`]: crate::error::Error

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::config::FaultLogConfig;
use crate::error::{ErrorResponse, Result};

/// Form and JSON fields whose values never reach the fault log
const REDACTED_FIELDS: &[&str] = &["password", "client_secret", "code", "state", "token"];

/// Cause of an internal-error response, attached as a response extension
///
/// Produced by `Error::into_response` and the panic handler; consumed by
/// [`capture_faults`].
#[derive(Debug, Clone)]
pub struct FaultDetail(pub String);

/// Local timestamp in the format used by fault records and 500 bodies
pub fn fault_timestamp() -> String {
    Local::now().format("%Y/%m/%d-%H:%M:%S").to_string()
}

/// One fault log line
#[derive(Debug, Clone, Serialize)]
pub struct FaultRecord {
    /// Local time of the fault
    pub timestamp: String,
    /// What failed
    pub message: String,
    /// Request path, if the fault happened inside a request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Request method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Raw query string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Request body with credential fields redacted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl FaultRecord {
    /// A fault outside any request
    pub fn process(message: impl Into<String>) -> Self {
        Self {
            timestamp: fault_timestamp(),
            message: message.into(),
            path: None,
            method: None,
            query: None,
            body: None,
        }
    }
}

/// Append-only fault log
pub struct FaultLog {
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl FaultLog {
    /// Create a fault log from configuration
    ///
    /// The directory is created on the first write, not here.
    pub fn from_config(config: &FaultLogConfig) -> Self {
        if config.enabled {
            Self::in_dir(&config.dir)
        } else {
            Self::disabled()
        }
    }

    /// Fault log writing into `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let name = format!("error-{}.txt", Local::now().format("%Y-%m-%d-%H-%M-%S"));
        Self {
            path: Some(dir.as_ref().join(name)),
            write_lock: Mutex::new(()),
        }
    }

    /// Fault log that only emits tracing events
    pub fn disabled() -> Self {
        Self {
            path: None,
            write_lock: Mutex::new(()),
        }
    }

    /// File receiving fault records, if enabled
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append a record
    pub async fn record(&self, record: &FaultRecord) -> Result<()> {
        tracing::error!(
            fault = %record.message,
            path = record.path.as_deref().unwrap_or("-"),
            method = record.method.as_deref().unwrap_or("-"),
            "Fault recorded"
        );

        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Middleware that writes a fault record for every response carrying [`FaultDetail`]
///
/// Buffers the request body so it can be logged; the body limit layer outside
/// this middleware bounds the buffer.
pub async fn capture_faults(
    State(fault_log): State<Arc<FaultLog>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Request body could not be read");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let method = parts.method.clone();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(redact_form);
    let logged_body = describe_body(&parts.headers, &method, &bytes);

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;

    if let Some(FaultDetail(message)) = response.extensions().get::<FaultDetail>() {
        let record = FaultRecord {
            timestamp: fault_timestamp(),
            message: message.clone(),
            path: Some(path),
            method: Some(method.to_string()),
            query,
            body: logged_body,
        };
        if let Err(e) = fault_log.record(&record).await {
            tracing::warn!(error = %e, "Failed to write fault log");
        }
    }

    response
}

/// `CatchPanicLayer` handler: generic 500 plus the panic message as [`FaultDetail`]
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    let mut response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::internal()),
    )
        .into_response();
    response
        .extensions_mut()
        .insert(FaultDetail(format!("panic: {}", message)));
    response
}

fn describe_body(headers: &HeaderMap, method: &Method, bytes: &Bytes) -> Option<String> {
    if bytes.is_empty() || *method == Method::GET {
        return None;
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let Ok(text) = std::str::from_utf8(bytes) else {
        return Some(format!("<{} bytes binary>", bytes.len()));
    };

    if content_type.starts_with("application/x-www-form-urlencoded") {
        Some(redact_form(text))
    } else if content_type.starts_with("application/json") {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(mut value) => {
                redact_json(&mut value);
                Some(value.to_string())
            }
            Err(_) => Some(text.to_string()),
        }
    } else {
        Some(text.to_string())
    }
}

fn redact_form(text: &str) -> String {
    text.split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_redacted(key) => format!("{}=[REDACTED]", key),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn redact_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                if is_redacted(key) {
                    *value = serde_json::Value::String("[REDACTED]".to_string());
                } else {
                    redact_json(value);
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(redact_json),
        _ => {}
    }
}

fn is_redacted(key: &str) -> bool {
    REDACTED_FIELDS
        .iter()
        .any(|field| key.eq_ignore_ascii_case(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::post, Router};
    use tower::ServiceExt;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_redact_form() {
        assert_eq!(
            redact_form("username=admin&password=hunter2"),
            "username=admin&password=[REDACTED]"
        );
        assert_eq!(redact_form("code=abc&x=1"), "code=[REDACTED]&x=1");
    }

    #[test]
    fn test_redact_json_nested() {
        let mut value = serde_json::json!({"user": {"password": "x"}, "items": [{"token": "t"}]});
        redact_json(&mut value);
        assert_eq!(value["user"]["password"], "[REDACTED]");
        assert_eq!(value["items"][0]["token"], "[REDACTED]");
    }

    #[test]
    fn test_panic_response_is_generic() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = response.extensions().get::<FaultDetail>().unwrap();
        assert_eq!(detail.0, "panic: boom");
    }

    #[tokio::test]
    async fn test_record_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = FaultLog::in_dir(dir.path().join("logs"));

        log.record(&FaultRecord::process("first")).await.unwrap();
        log.record(&FaultRecord::process("second")).await.unwrap();

        let path = log.path().unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("error-"));
        let lines = read_lines(path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["message"], "second");
        assert!(lines[0].get("path").is_none());
    }

    #[tokio::test]
    async fn test_disabled_log_writes_nothing() {
        let log = FaultLog::disabled();
        log.record(&FaultRecord::process("ignored")).await.unwrap();
        assert!(log.path().is_none());
    }

    #[tokio::test]
    async fn test_middleware_logs_internal_errors_only() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(FaultLog::in_dir(dir.path()));

        let app = Router::new()
            .route(
                "/broken",
                post(|| async { crate::error::Error::Internal("disk on fire".into()) }),
            )
            .route(
                "/denied",
                post(|| async { crate::error::Error::Unauthorized("nope".into()) }),
            )
            .layer(middleware::from_fn_with_state(log.clone(), capture_faults));

        let response = app
            .clone()
            .oneshot(
                Request::post("/denied?x=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!log.path().unwrap().exists());

        let response = app
            .oneshot(
                Request::post("/broken?code=secret")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("username=admin&password=hunter2"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal Server Error");
        assert!(json["timestamp"].is_string());

        let lines = read_lines(log.path().unwrap());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["path"], "/broken");
        assert_eq!(lines[0]["method"], "POST");
        assert_eq!(lines[0]["query"], "code=[REDACTED]");
        assert_eq!(lines[0]["body"], "username=admin&password=[REDACTED]");
        assert!(lines[0]["message"]
            .as_str()
            .unwrap()
            .contains("disk on fire"));
    }
}

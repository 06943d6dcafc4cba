//! `http_request(url, method, request_body, headers)`
//!
//! Transport errors, 429 and 5xx answers (except 501) are retried with
//! exponential backoff. Set `HTTP_REQ_RETRY_MODE=false` to send exactly once.
//! When no answer arrives at all the function still returns a value, a
//! synthetic 500 with a JSON error body, alongside an error diagnostic.

use crate::retry::{self, LogCallback, RetryConfig, Retryable};
use declarative::{ApplyContext, Diagnostics, Function, FunctionError, Outcome};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use ureq::http::{HeaderName, HeaderValue, Method, Request, Uri};

/// Body returned when the request never produced a response
pub const FALLBACK_BODY: &str = r#"{"error": "failed to retrieve response body"}"#;

/// Status returned when the request never produced a response
pub const FALLBACK_STATUS: u16 = 500;

#[derive(Debug, Clone, Default)]
pub struct HttpRequestArgs {
    pub url: String,
    pub method: String,
    pub request_body: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpResponse {
    pub response_body: String,
    pub status_code: u16,
    /// RFC 3339 time the response was produced
    pub timestamp: String,
}

/// Why one attempt did not produce a final answer
#[derive(Debug)]
enum AttemptError {
    /// No response at all
    Transport(String),
    /// A response worth retrying
    Status { status: u16, body: String },
    /// Response arrived but its body could not be read
    Body { status: u16, message: String },
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "{message}"),
            Self::Status { status, .. } => write!(f, "server answered {status}"),
            Self::Body { message, .. } => write!(f, "failed to read response body: {message}"),
        }
    }
}

impl Retryable for AttemptError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { .. })
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || ((500..600).contains(&status) && status != 501)
}

/// Validated request parts, reusable across attempts
struct Prepared {
    method: Method,
    uri: Uri,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Vec<u8>,
}

impl Prepared {
    fn from_args(args: &HttpRequestArgs) -> Result<Self, FunctionError> {
        let uri: Uri = args.url.parse().map_err(|e| {
            log::error!("Failed to create HTTP request for {}: {e}", args.url);
            FunctionError::argument(1, "Failed to create HTTP request")
        })?;

        let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
            .map_err(|_| FunctionError::argument(2, format!("Invalid HTTP method '{}'", args.method)))?;

        let mut headers = Vec::with_capacity(args.headers.len());
        for (name, value) in &args.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| FunctionError::argument(4, format!("Invalid header name '{name}'")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| FunctionError::argument(4, format!("Invalid value for header '{name}'")))?;
            headers.push((name, value));
        }

        Ok(Self {
            method,
            uri,
            headers,
            body: args.request_body.as_bytes().to_vec(),
        })
    }

    fn request(&self) -> ureq::http::request::Builder {
        let mut builder = Request::builder()
            .method(self.method.clone())
            .uri(self.uri.clone());
        for (name, value) in &self.headers {
            builder = builder.header(name.clone(), value.clone());
        }
        builder
    }
}

pub struct HttpRequest {
    agent: ureq::Agent,
    retry: RetryConfig,
}

impl HttpRequest {
    /// Client with the given timeout and retry mode from the environment
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            retry: RetryConfig::from_env(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn attempt(&self, prepared: &Prepared) -> Result<(u16, String), AttemptError> {
        let transport = |e: ureq::Error| AttemptError::Transport(e.to_string());
        let build = |e: ureq::http::Error| AttemptError::Transport(e.to_string());

        let mut response = if prepared.body.is_empty() {
            let request = prepared.request().body(()).map_err(build)?;
            self.agent.run(request).map_err(transport)?
        } else {
            let request = prepared.request().body(prepared.body.clone()).map_err(build)?;
            self.agent.run(request).map_err(transport)?
        };

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| AttemptError::Body {
                status,
                message: e.to_string(),
            })?;

        if is_retryable_status(status) {
            return Err(AttemptError::Status { status, body });
        }
        Ok((status, body))
    }
}

impl Function for HttpRequest {
    type Args = HttpRequestArgs;
    type Output = HttpResponse;

    fn name(&self) -> &'static str {
        "http_request"
    }

    fn summary(&self) -> &'static str {
        "Makes an HTTP request and returns the response body and status code"
    }

    fn call(&self, ctx: &ApplyContext, args: HttpRequestArgs) -> Result<Outcome<HttpResponse>, FunctionError> {
        let prepared = Prepared::from_args(&args)?;
        ctx.cancel
            .check()
            .map_err(|e| FunctionError::general(e.to_string()))?;

        log::debug!("{} {}", prepared.method, prepared.uri);
        let result = retry::with_retry(&self.retry, Some(&LogCallback), || self.attempt(&prepared));

        let mut diagnostics = Diagnostics::new();
        let (status_code, response_body) = match result {
            Ok(answer) => answer,
            // Retries used up on a transient status: hand back what the server said
            Err(AttemptError::Status { status, body }) => (status, body),
            Err(AttemptError::Body { status, message }) => {
                log::error!("Failed to read response body: {message}");
                diagnostics.error(
                    "Failed to read HTTP response body",
                    format!("argument 3: {message}"),
                );
                (status, String::new())
            }
            Err(AttemptError::Transport(message)) => {
                log::error!("HTTP request failed: {message}");
                diagnostics.error(
                    "Failed to execute HTTP request",
                    format!("argument 2: {message}"),
                );
                (FALLBACK_STATUS, FALLBACK_BODY.to_string())
            }
        };

        let response = HttpResponse {
            response_body,
            status_code,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        Ok(Outcome::with_diagnostics(response, diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::Completion;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread;

    /// Serve one canned response per connection, recording each request
    fn serve(responses: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let request = read_request(&mut stream);
                seen.lock().unwrap().push(request);
                stream.write_all(response.as_bytes()).unwrap();
                stream.flush().unwrap();
            }
        });

        (format!("http://{addr}"), requests)
    }

    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }

    fn response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(5),
        }
    }

    fn client() -> HttpRequest {
        HttpRequest::new(Duration::from_secs(5)).with_retry(fast_retry())
    }

    fn get(url: String) -> HttpRequestArgs {
        HttpRequestArgs {
            url,
            method: "GET".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_get_returns_body_and_status() {
        let (base, requests) = serve(vec![response("200 OK", "hello")]);

        let outcome = client()
            .call(&ApplyContext::default(), get(format!("{base}/greet")))
            .unwrap();

        assert_eq!(outcome.value.status_code, 200);
        assert_eq!(outcome.value.response_body, "hello");
        assert_eq!(outcome.completion(), Completion::Done);
        assert!(chrono::DateTime::parse_from_rfc3339(&outcome.value.timestamp).is_ok());
        assert!(requests.lock().unwrap()[0].starts_with("GET /greet"));
    }

    #[test]
    fn test_post_sends_headers_and_body() {
        let (base, requests) = serve(vec![response("201 Created", "{}")]);
        let args = HttpRequestArgs {
            url: format!("{base}/items"),
            method: "post".to_string(),
            request_body: r#"{"name":"x"}"#.to_string(),
            headers: BTreeMap::from([("X-Token".to_string(), "abc".to_string())]),
        };

        let outcome = client().call(&ApplyContext::default(), args).unwrap();
        assert_eq!(outcome.value.status_code, 201);

        let request = requests.lock().unwrap()[0].clone();
        assert!(request.starts_with("POST /items"));
        assert!(request.to_lowercase().contains("x-token: abc"));
        assert!(request.ends_with(r#"{"name":"x"}"#));
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let (base, requests) = serve(vec![response("404 Not Found", "missing")]);

        let outcome = client()
            .call(&ApplyContext::default(), get(format!("{base}/x")))
            .unwrap();

        assert_eq!(outcome.value.status_code, 404);
        assert_eq!(outcome.value.response_body, "missing");
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_server_errors_are_retried() {
        let (base, requests) = serve(vec![
            response("503 Service Unavailable", "busy"),
            response("200 OK", "ready"),
        ]);

        let outcome = client()
            .call(&ApplyContext::default(), get(format!("{base}/x")))
            .unwrap();

        assert_eq!(outcome.value.status_code, 200);
        assert_eq!(outcome.value.response_body, "ready");
        assert_eq!(requests.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_without_retry_returns_first_answer() {
        let (base, requests) = serve(vec![response("503 Service Unavailable", "busy")]);

        let outcome = HttpRequest::new(Duration::from_secs(5))
            .with_retry(RetryConfig::no_retry())
            .call(&ApplyContext::default(), get(format!("{base}/x")))
            .unwrap();

        assert_eq!(outcome.value.status_code, 503);
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_transport_failure_yields_fallback() {
        // Bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();

        let outcome = client()
            .call(&ApplyContext::default(), get(format!("http://127.0.0.1:{port}/")))
            .unwrap();

        assert_eq!(outcome.value.status_code, FALLBACK_STATUS);
        assert_eq!(outcome.value.response_body, FALLBACK_BODY);
        assert_eq!(outcome.completion(), Completion::Aborted);
        let diagnostic = outcome.diagnostics.iter().next().unwrap();
        assert!(diagnostic.detail.starts_with("argument 2"));
    }

    #[test]
    fn test_invalid_arguments() {
        let err = client()
            .call(&ApplyContext::default(), get("not a url".to_string()))
            .unwrap_err();
        assert_eq!(err.argument, Some(1));

        let mut args = get("http://127.0.0.1:1/".to_string());
        args.method = "GE T".to_string();
        let err = client().call(&ApplyContext::default(), args).unwrap_err();
        assert_eq!(err.argument, Some(2));

        let mut args = get("http://127.0.0.1:1/".to_string());
        args.headers.insert("bad header".to_string(), "v".to_string());
        let err = client().call(&ApplyContext::default(), args).unwrap_err();
        assert_eq!(err.argument, Some(4));
    }
}

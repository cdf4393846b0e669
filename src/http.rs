use crate::classify::AcceptPolicy;
use crate::config::HttpConfig;
use crate::error::{CallError, ClientError};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, Request, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Longest body excerpt copied into an HTTP error message
const ERROR_BODY_EXCERPT: usize = 200;

/// HTTP client type with HTTPS support
pub type HttpClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// An outbound request, validated at construction
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CallRequest {
    pub fn new(method: Method, url: &str) -> Result<Self, ClientError> {
        let uri: Uri = url.parse().map_err(|e| ClientError::InvalidRequest {
            url: url.to_string(),
            reason: format!("{}", e),
        })?;
        if uri.host().is_none() {
            return Err(ClientError::InvalidRequest {
                url: url.to_string(),
                reason: "missing host".to_string(),
            });
        }
        Ok(Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        })
    }

    pub fn get(url: &str) -> Result<Self, ClientError> {
        Self::new(Method::GET, url)
    }

    /// POST with a JSON body and `content-type: application/json`
    pub fn post_json<T: Serialize + ?Sized>(url: &str, payload: &T) -> Result<Self, ClientError> {
        let body = serde_json::to_vec(payload).map_err(|e| ClientError::InvalidRequest {
            url: url.to_string(),
            reason: format!("payload is not serializable: {}", e),
        })?;
        let mut request = Self::new(Method::POST, url)?;
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        request.body = Bytes::from(body);
        Ok(request)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ClientError> {
        let invalid = |reason: String| ClientError::InvalidRequest {
            url: self.uri.to_string(),
            reason,
        };
        let name = HeaderName::try_from(name)
            .map_err(|e| invalid(format!("header name {:?}: {}", name, e)))?;
        let value = HeaderValue::try_from(value)
            .map_err(|e| invalid(format!("header value for {}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    fn to_hyper(&self) -> Request<Full<Bytes>> {
        let mut req = Request::new(Full::new(self.body.clone()));
        *req.method_mut() = self.method.clone();
        *req.uri_mut() = self.uri.clone();
        *req.headers_mut() = self.headers.clone();
        req
    }
}

/// Fully-read response handed back to the caller
#[derive(Debug, Clone)]
pub struct CallResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CallResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Performs one HTTP exchange and normalizes failures into [`CallError`].
///
/// Responses whose status the [`AcceptPolicy`] accepts (2xx plus, by
/// default, 409 and 422) are returned as `Ok`. Any other status becomes
/// [`CallError::Http`]; transport failures become [`CallError::Network`].
#[derive(Clone, Debug)]
pub struct HttpCallAdapter {
    client: HttpClient,
    accept: AcceptPolicy,
}

impl HttpCallAdapter {
    /// Create an adapter with HTTPS support and keepalive settings from `config`.
    ///
    /// Native root certificates are preferred; the bundled webpki roots are
    /// used when the platform store is empty or unreadable.
    pub fn new(config: &HttpConfig) -> Self {
        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);
        http_connector.set_keepalive(Some(config.pool_idle_timeout()));
        http_connector.set_connect_timeout(Some(config.connect_timeout()));

        let roots = match HttpsConnectorBuilder::new().with_native_roots() {
            Ok(builder) => builder,
            Err(e) => {
                warn!("Native root certificates unavailable ({}), using bundled roots", e);
                HttpsConnectorBuilder::new().with_webpki_roots()
            }
        };
        let https_connector = roots
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout())
            .build(https_connector);

        Self {
            client,
            accept: AcceptPolicy::statuses(config.accepted_statuses.iter().copied()),
        }
    }

    /// Replace the pass-through policy
    pub fn with_accept_policy(mut self, accept: AcceptPolicy) -> Self {
        self.accept = accept;
        self
    }

    pub fn accept_policy(&self) -> &AcceptPolicy {
        &self.accept
    }

    /// Send `request` once.
    pub async fn call(&self, request: &CallRequest) -> Result<CallResponse, CallError> {
        let method = &request.method;
        let uri = &request.uri;
        debug!("Sending {} request to {}", method, uri);

        let resp = self.client.request(request.to_hyper()).await.map_err(|e| {
            let message = format!("{} {}: {}", method, uri, error_chain(&e));
            debug!("HTTP request failed: {}", message);
            CallError::network(message)
        })?;

        let status = resp.status();
        let (parts, body) = resp.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| {
                CallError::network(format!(
                    "failed to read response body from {}: {}",
                    uri,
                    error_chain(&e)
                ))
            })?
            .to_bytes();

        debug!(
            "Received {} from {} ({} bytes)",
            status,
            uri,
            body.len()
        );

        if self.accept.accepts(status.as_u16()) {
            if !status.is_success() {
                debug!("Passing through status {} from {}", status, uri);
            }
            return Ok(CallResponse {
                status: status.as_u16(),
                headers: parts.headers,
                body,
            });
        }

        Err(CallError::http(status.as_u16(), error_message(status, &body)))
    }
}

fn error_message(status: hyper::StatusCode, body: &Bytes) -> String {
    let reason = status.canonical_reason().unwrap_or("Unknown status");
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return reason.to_string();
    }
    let excerpt: String = text.chars().take(ERROR_BODY_EXCERPT).collect();
    format!("{}: {}", reason, excerpt)
}

/// Join an error with its sources; hyper's top-level messages are terse
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

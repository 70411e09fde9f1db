//! A [`Facilitator`] implementation that talks to a _remote_ x402 facilitator over HTTP.
//!
//! [`FacilitatorClient`] handles the `/verify`, `/settle`, and `/supported`
//! endpoints. The two payment endpoints report failures differently:
//!
//! - `POST /verify` never fails for remote reasons. A non-200 status or an
//!   unreachable facilitator becomes a [`VerifyResponse`] with
//!   `is_valid == false` and an error message.
//! - `POST /settle` returns [`FacilitatorClientError`] for any non-200 status,
//!   carrying the status code and reason.
//!
//! ## Example
//!
//! ```rust
//! use x402_client::client::FacilitatorClient;
//!
//! let facilitator = FacilitatorClient::try_from("https://x402.org/facilitator").unwrap();
//! assert_eq!(facilitator.verify_url().as_str(), "https://x402.org/facilitator/verify");
//! ```

use http::{HeaderMap, StatusCode};
use reqwest::Client;
use serde::Deserialize;
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;
use x402_types::facilitator::Facilitator;
use x402_types::proto::{
    PaymentPayload, RequestBuildError, SettleRequest, SettleResponse, SupportedResponse,
    VerifyRequest, VerifyResponse,
};
use x402_types::sanitize::JsonSafe;

#[cfg(feature = "telemetry")]
use tracing::{Instrument, Span, instrument};

/// Facilitator used when none is configured.
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

/// TTL cache for [`SupportedResponse`].
#[derive(Clone, Debug)]
struct SupportedCacheState {
    response: SupportedResponse,
    expires_at: std::time::Instant,
}

/// An encapsulated TTL cache for the `/supported` endpoint response.
///
/// Each clone has an independent cache state.
#[derive(Debug)]
pub struct SupportedCache {
    ttl: Duration,
    state: RwLock<Option<SupportedCacheState>>,
}

impl SupportedCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(None),
        }
    }

    /// Returns the cached response if it has not expired.
    pub async fn get(&self) -> Option<SupportedResponse> {
        let guard = self.state.read().await;
        let cache = guard.as_ref()?;
        if std::time::Instant::now() < cache.expires_at {
            Some(cache.response.clone())
        } else {
            None
        }
    }

    pub async fn set(&self, response: SupportedResponse) {
        let mut guard = self.state.write().await;
        *guard = Some(SupportedCacheState {
            response,
            expires_at: std::time::Instant::now() + self.ttl,
        });
    }

    pub async fn clear(&self) {
        let mut guard = self.state.write().await;
        *guard = None;
    }
}

impl Clone for SupportedCache {
    fn clone(&self) -> Self {
        Self::new(self.ttl)
    }
}

/// A client for communicating with a remote x402 facilitator.
#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    /// Base URL of the facilitator, always ending in `/`
    base_url: Url,
    verify_url: Url,
    settle_url: Url,
    supported_url: Url,
    client: Client,
    /// Custom headers sent with each request, e.g. authorization
    headers: HeaderMap,
    timeout: Option<Duration>,
    supported_cache: SupportedCache,
}

impl Facilitator for FacilitatorClient {
    type Error = FacilitatorClientError;

    async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyResponse, FacilitatorClientError> {
        let response = FacilitatorClient::verify(self, request);
        #[cfg(feature = "telemetry")]
        let response = with_span(
            response,
            tracing::info_span!("x402.facilitator_client.verify", timeout = ?self.timeout),
        );
        Ok(response.await)
    }

    async fn settle(
        &self,
        request: &SettleRequest,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        let response = FacilitatorClient::settle(self, request);
        #[cfg(feature = "telemetry")]
        let response = with_span(
            response,
            tracing::info_span!("x402.facilitator_client.settle", timeout = ?self.timeout),
        );
        response.await
    }

    async fn supported(&self) -> Result<SupportedResponse, Self::Error> {
        FacilitatorClient::supported(self).await
    }
}

/// Errors that can occur while interacting with a remote facilitator.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// The payload or requirements could not be turned into a request body.
    #[error("Failed to build request: {0}")]
    Request(#[from] RequestBuildError),
}

/// Body a facilitator sends with a rejected verification.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl FacilitatorClient {
    /// Default TTL for caching the supported endpoint response (10 minutes).
    pub const DEFAULT_SUPPORTED_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    pub fn settle_url(&self) -> &Url {
        &self.settle_url
    }

    pub fn supported_url(&self) -> &Url {
        &self.supported_url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn timeout(&self) -> &Option<Duration> {
        &self.timeout
    }

    pub fn supported_cache(&self) -> &SupportedCache {
        &self.supported_cache
    }

    /// Constructs a new [`FacilitatorClient`] from a base URL.
    ///
    /// Endpoint URLs are resolved relative to the base, so the base should end in `/`.
    /// [`FacilitatorClient::try_from`] takes care of that for string input.
    pub fn try_new(base_url: Url) -> Result<Self, FacilitatorClientError> {
        let endpoint = |path: &str, context: &'static str| {
            base_url
                .join(path)
                .map_err(|e| FacilitatorClientError::UrlParse { context, source: e })
        };
        let verify_url = endpoint("./verify", "Failed to construct ./verify URL")?;
        let settle_url = endpoint("./settle", "Failed to construct ./settle URL")?;
        let supported_url = endpoint("./supported", "Failed to construct ./supported URL")?;
        Ok(Self {
            client: Client::new(),
            base_url,
            verify_url,
            settle_url,
            supported_url,
            headers: HeaderMap::new(),
            timeout: None,
            supported_cache: SupportedCache::new(Self::DEFAULT_SUPPORTED_CACHE_TTL),
        })
    }

    /// Attaches custom headers to all future requests.
    pub fn with_headers(&self, headers: HeaderMap) -> Self {
        let mut this = self.clone();
        this.headers = headers;
        this
    }

    /// Sets a timeout for all future requests.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut this = self.clone();
        this.timeout = Some(timeout);
        this
    }

    /// Sets the TTL for caching the supported endpoint response.
    ///
    /// Default is 10 minutes. Use [`Self::without_supported_cache()`] to disable caching.
    pub fn with_supported_cache_ttl(&self, ttl: Duration) -> Self {
        let mut this = self.clone();
        this.supported_cache = SupportedCache::new(ttl);
        this
    }

    pub fn without_supported_cache(&self) -> Self {
        self.with_supported_cache_ttl(Duration::ZERO)
    }

    /// Encodes `payload`, sanitizes `requirements` and verifies them.
    ///
    /// Fails only if the request body cannot be built.
    pub async fn verify_payment<R>(
        &self,
        payload: &PaymentPayload,
        requirements: &R,
    ) -> Result<VerifyResponse, FacilitatorClientError>
    where
        R: JsonSafe + ?Sized,
    {
        let request = VerifyRequest::new(payload, requirements)?;
        Ok(self.verify(&request).await)
    }

    /// Encodes `payload`, sanitizes `requirements` and settles them.
    pub async fn settle_payment<R>(
        &self,
        payload: &PaymentPayload,
        requirements: &R,
    ) -> Result<SettleResponse, FacilitatorClientError>
    where
        R: JsonSafe + ?Sized,
    {
        let request = SettleRequest::new(payload, requirements)?;
        self.settle(&request).await
    }

    /// Sends a `POST /verify` request to the facilitator.
    ///
    /// Every remote failure is folded into an invalid [`VerifyResponse`].
    pub async fn verify(&self, request: &VerifyRequest) -> VerifyResponse {
        let context = "POST /verify";
        let result = match self.send_post(&self.verify_url, context, request).await {
            Ok(http_response) if http_response.status() == StatusCode::OK => http_response
                .json::<VerifyResponse>()
                .await
                .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e }),
            Ok(http_response) => {
                let status = http_response.status();
                let body = http_response.text().await.unwrap_or_default();
                Ok(VerifyResponse::invalid(rejection_message(status, &body)))
            }
            Err(e) => Err(e),
        };
        record_result_on_span(&result);
        result.unwrap_or_else(|e| VerifyResponse::invalid(e.to_string()))
    }

    /// Sends a `POST /settle` request to the facilitator.
    pub async fn settle(
        &self,
        request: &SettleRequest,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        let context = "POST /settle";
        let http_response = self.send_post(&self.settle_url, context, request).await?;
        let result = expect_ok_json(http_response, context).await;
        record_result_on_span(&result);
        result
    }

    /// Sends a `GET /supported` request to the facilitator, bypassing the cache.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.facilitator_client.supported", skip_all, err)
    )]
    async fn supported_inner(&self) -> Result<SupportedResponse, FacilitatorClientError> {
        let context = "GET /supported";
        let mut req = self.client.get(self.supported_url.clone());
        for (key, value) in self.headers.iter() {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let http_response = req
            .send()
            .await
            .map_err(|e| FacilitatorClientError::Http { context, source: e })?;
        let result = expect_ok_json(http_response, context).await;
        record_result_on_span(&result);
        result
    }

    /// Sends a `GET /supported` request to the facilitator.
    /// Results are cached with a configurable TTL (default: 10 minutes).
    pub async fn supported(&self) -> Result<SupportedResponse, FacilitatorClientError> {
        if let Some(response) = self.supported_cache.get().await {
            return Ok(response);
        }

        #[cfg(feature = "telemetry")]
        tracing::info!("x402.facilitator_client.supported_cache_miss");

        let response = self.supported_inner().await?;
        self.supported_cache.set(response.clone()).await;

        Ok(response)
    }

    /// Sends `payload` as JSON with the configured headers and timeout.
    async fn send_post<T>(
        &self,
        url: &Url,
        context: &'static str,
        payload: &T,
    ) -> Result<reqwest::Response, FacilitatorClientError>
    where
        T: serde::Serialize + ?Sized,
    {
        let mut req = self.client.post(url.clone()).json(payload);
        for (key, value) in self.headers.iter() {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        req.send()
            .await
            .map_err(|e| FacilitatorClientError::Http { context, source: e })
    }
}

/// Parses a 200 response as JSON; any other status becomes [`FacilitatorClientError::HttpStatus`].
async fn expect_ok_json<R>(
    http_response: reqwest::Response,
    context: &'static str,
) -> Result<R, FacilitatorClientError>
where
    R: serde::de::DeserializeOwned,
{
    if http_response.status() == StatusCode::OK {
        http_response
            .json::<R>()
            .await
            .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e })
    } else {
        let status = http_response.status();
        let body = http_response
            .text()
            .await
            .map_err(|e| FacilitatorClientError::ResponseBodyRead { context, source: e })?;
        Err(FacilitatorClientError::HttpStatus {
            context,
            status,
            body,
        })
    }
}

/// The facilitator's `error` field if the body carries one, otherwise a message naming the status.
fn rejection_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error }) => error,
        Err(_) => format!("Facilitator rejected verification with HTTP status {status}"),
    }
}

/// Converts a string URL into a `FacilitatorClient`, parsing the URL and calling `try_new`.
impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Normalize: strip trailing slashes and add a single trailing slash
        let mut normalized = value.trim_end_matches('/').to_string();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| FacilitatorClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        FacilitatorClient::try_new(url)
    }
}

impl TryFrom<String> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FacilitatorClient::try_from(value.as_str())
    }
}

/// Records the outcome of a request on the current tracing span.
#[cfg(feature = "telemetry")]
fn record_result_on_span<R, E: Display>(result: &Result<R, E>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::ERROR, error = %err, "Request to facilitator failed");
        }
    }
}

/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
fn record_result_on_span<R, E: Display>(_result: &Result<R, E>) {}

#[cfg(feature = "telemetry")]
fn with_span<F: Future>(fut: F, span: Span) -> impl Future<Output = F::Output> {
    fut.instrument(span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;
    use std::collections::HashMap;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use x402_types::codec;
    use x402_types::proto::SupportedPaymentKind;
    use x402_types::util::Base64Bytes;

    fn test_payload() -> PaymentPayload {
        let json = json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "base-sepolia",
            "payload": {
                "type": "authorizationEip3009",
                "signature": "0x5a",
                "authorization": {
                    "value": "115792089237316195423570985008687907853269984665640564039457584007913129639935",
                    "validAfter": "1700000000",
                    "validBefore": "1700000600",
                    "nonce": "0xdead",
                    "version": "2"
                }
            }
        });
        codec::decode(&Base64Bytes::encode(json.to_string()).to_string()).unwrap()
    }

    fn test_request() -> VerifyRequest {
        VerifyRequest::new(&test_payload(), &json!({"scheme": "exact"})).unwrap()
    }

    fn create_test_supported_response() -> SupportedResponse {
        SupportedResponse {
            kinds: vec![SupportedPaymentKind {
                x402_version: 1,
                scheme: "exact".to_string(),
                network: "base-sepolia".to_string(),
                extra: None,
            }],
            extensions: vec![],
            signers: HashMap::new(),
        }
    }

    fn client_for(server: &MockServer) -> FacilitatorClient {
        FacilitatorClient::try_from(server.uri()).unwrap()
    }

    #[test]
    fn test_try_from_normalizes_trailing_slash() {
        let client = FacilitatorClient::try_from(DEFAULT_FACILITATOR_URL).unwrap();
        assert_eq!(
            client.settle_url().as_str(),
            "https://x402.org/facilitator/settle"
        );
        let client = FacilitatorClient::try_from("https://x402.org/facilitator//").unwrap();
        assert_eq!(
            client.supported_url().as_str(),
            "https://x402.org/facilitator/supported"
        );
        assert!(FacilitatorClient::try_from("not a url").is_err());
    }

    #[tokio::test]
    async fn test_verify_sends_encoded_payload_and_headers() {
        let mock_server = MockServer::start().await;
        let request = test_request();
        Mock::given(method("POST"))
            .and(path("/verify"))
            .and(header("content-type", "application/json"))
            .and(header("authorization", "Bearer token"))
            .and(body_partial_json(json!({
                "payload": request.payload,
                "paymentRequirements": {"scheme": "exact"}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"isValid": true, "payer": "0xabc"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer token"));
        let client = client_for(&mock_server).with_headers(headers);
        let response = client.verify(&request).await;
        assert!(response.is_valid);
        assert_eq!(response.extra["payer"], json!("0xabc"));
    }

    #[tokio::test]
    async fn test_verify_rejection_uses_error_field() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(
                ResponseTemplate::new(402).set_body_json(json!({"error": "insufficient funds"})),
            )
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let response = client.verify(&test_request()).await;
        assert_eq!(response, VerifyResponse::invalid("insufficient funds"));
    }

    #[tokio::test]
    async fn test_verify_rejection_without_json_names_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let response = client.verify(&test_request()).await;
        assert!(!response.is_valid);
        assert!(response.error_message.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_verify_unreachable_facilitator_is_invalid() {
        // Nothing listens on port 1.
        let client = FacilitatorClient::try_from("http://127.0.0.1:1/").unwrap();
        let response = client.verify(&test_request()).await;
        assert!(!response.is_valid);
        assert!(response.error_message.unwrap().contains("POST /verify"));
    }

    #[tokio::test]
    async fn test_settle_unreachable_facilitator_is_transport_error() {
        let client = FacilitatorClient::try_from("http://127.0.0.1:1/").unwrap();
        let err = client.settle(&test_request()).await.unwrap_err();
        assert!(matches!(err, FacilitatorClientError::Http { context: "POST /settle", .. }));
    }

    #[tokio::test]
    async fn test_verify_payment_builds_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .and(body_partial_json(json!({"paymentRequirements": {"asset": "USDC"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"isValid": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let requirements = json!({"asset": "USDC", "outputSchema": null});
        let response = client
            .verify_payment(&test_payload(), &requirements)
            .await
            .unwrap();
        assert!(response.is_valid);

        let err = client
            .verify_payment(&test_payload(), &json!("USDC"))
            .await
            .unwrap_err();
        assert!(matches!(err, FacilitatorClientError::Request(_)));
    }

    #[tokio::test]
    async fn test_settle_returns_opaque_result() {
        let mock_server = MockServer::start().await;
        let settlement = json!({"success": true, "transaction": "0xfeed", "network": "base-sepolia"});
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&settlement))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let response = client.settle(&test_request()).await.unwrap();
        assert_eq!(response, SettleResponse(settlement));
    }

    #[tokio::test]
    async fn test_settle_failure_carries_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.settle(&test_request()).await.unwrap_err();
        assert!(matches!(
            err,
            FacilitatorClientError::HttpStatus { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
        let message = err.to_string();
        assert!(message.contains("500"), "{message}");
        assert!(message.contains("Internal Server Error"), "{message}");
    }

    #[tokio::test]
    async fn test_facilitator_trait_dispatch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "expired"})))
            .mount(&mock_server)
            .await;

        let client = std::sync::Arc::new(client_for(&mock_server));
        let response = Facilitator::verify(&client, &test_request()).await.unwrap();
        assert_eq!(response.error_message.as_deref(), Some("expired"));
    }

    #[tokio::test]
    async fn test_supported_cache_caches_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/supported"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(create_test_supported_response()),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let first = client.supported().await.unwrap();
        let second = client.supported().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.kinds.len(), 1);
    }

    #[tokio::test]
    async fn test_supported_cache_expires() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/supported"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(create_test_supported_response()),
            )
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server)
            .with_supported_cache_ttl(Duration::from_millis(1));
        client.supported().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.supported().await.unwrap();
    }

    #[tokio::test]
    async fn test_supported_cache_disabled_and_cleared() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/supported"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(create_test_supported_response()),
            )
            .expect(3)
            .mount(&mock_server)
            .await;

        let uncached = client_for(&mock_server).without_supported_cache();
        uncached.supported().await.unwrap();
        uncached.supported().await.unwrap();

        let cached = client_for(&mock_server);
        cached.supported().await.unwrap();
        cached.supported_cache().clear().await;
        assert!(cached.supported_cache().get().await.is_none());
    }

    #[tokio::test]
    async fn test_supported_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/supported"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.supported().await.unwrap_err();
        assert!(matches!(err, FacilitatorClientError::HttpStatus { .. }));
    }
}

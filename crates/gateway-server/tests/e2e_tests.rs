//! End-to-end tests for the chat gateway.
//!
//! These drive the full router: CORS, request IDs, authentication, the quota
//! gate, translation, the upstream call and the event stream. Identity and
//! usage are held in memory; the upstream is either scripted or a wiremock
//! server speaking the Gemini streaming protocol.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use futures::stream;
use gateway_accounts::{InMemoryQuotaLedger, StaticIdentityResolver};
use gateway_core::{
    ChatRequest, GatewayError, LLMProvider, PreparedRequest, Profile, QuotaLedger, SegmentStream,
};
use gateway_providers::{GoogleConfig, GoogleProvider};
use gateway_server::routes::create_router;
use gateway_server::{AppState, Orchestrator};
use gateway_telemetry::Metrics;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const CHAT_PATH: &str = "/functions/v1/gemini-chat";
const TOKEN: &str = "session-token";
const USER: &str = "user-1";

type Script = Result<Vec<Result<String, GatewayError>>, GatewayError>;

/// Provider that replays a scripted upstream response
struct ScriptedProvider {
    script: Mutex<Option<Script>>,
    opened: AtomicUsize,
}

impl ScriptedProvider {
    fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            opened: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn translate(&self, request: &ChatRequest) -> Result<PreparedRequest, GatewayError> {
        Ok(PreparedRequest {
            model: request.model.clone().unwrap_or_else(|| "scripted-model".into()),
            body: json!({}),
        })
    }

    async fn open_stream(&self, _: PreparedRequest) -> Result<SegmentStream, GatewayError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap().take().unwrap_or(Ok(vec![]));
        script.map(|segments| Box::pin(stream::iter(segments)) as SegmentStream)
    }
}

struct TestGateway {
    state: AppState,
    ledger: Arc<InMemoryQuotaLedger>,
}

fn gateway(profile: Profile, provider: Arc<dyn LLMProvider>) -> TestGateway {
    let ledger = Arc::new(InMemoryQuotaLedger::new().with_profile(USER, profile));
    let orchestrator = Orchestrator::new(
        Arc::new(StaticIdentityResolver::new([(TOKEN, USER)])),
        Arc::clone(&ledger) as Arc<dyn QuotaLedger>,
        provider,
        Metrics::new().unwrap(),
    );

    TestGateway {
        state: AppState::new(orchestrator),
        ledger,
    }
}

fn chat_request(token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(CHAT_PATH)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn hello() -> Value {
    json!({"messages": [{"role": "user", "content": "Hello"}]})
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// Payloads of the `data:` lines of an event stream
fn sse_payloads(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter(|frame| !frame.trim().is_empty())
        .map(|frame| {
            frame
                .strip_prefix("data: ")
                .unwrap_or_else(|| panic!("unexpected frame: {frame:?}"))
                .to_string()
        })
        .collect()
}

#[cfg(test)]
mod admission_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_authorization_is_401() {
        let provider = Arc::new(ScriptedProvider::new(Ok(vec![])));
        let gw = gateway(Profile::new(0, 10), provider.clone());

        let response = create_router(gw.state)
            .oneshot(chat_request(None, &hello()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert!(json["error"].is_string());
        assert_eq!(provider.opened.load(Ordering::SeqCst), 0);
        assert_eq!(gw.ledger.profile(USER), Some(Profile::new(0, 10)));
    }

    #[tokio::test]
    async fn test_unknown_token_is_401() {
        let provider = Arc::new(ScriptedProvider::new(Ok(vec![])));
        let gw = gateway(Profile::new(0, 10), provider.clone());

        let response = create_router(gw.state)
            .oneshot(chat_request(Some("forged"), &hello()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Unauthorized");
        assert_eq!(provider.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_quota_is_403() {
        let provider = Arc::new(ScriptedProvider::new(Ok(vec![Ok("never".into())])));
        let gw = gateway(Profile::new(100, 100), provider.clone());

        let response = create_router(gw.state)
            .oneshot(chat_request(Some(TOKEN), &hello()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("limit"));
        assert_eq!(provider.opened.load(Ordering::SeqCst), 0);
        assert_eq!(gw.ledger.profile(USER), Some(Profile::new(100, 100)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_500() {
        let provider = Arc::new(ScriptedProvider::new(Ok(vec![])));
        let gw = gateway(Profile::new(0, 10), provider.clone());

        let response = create_router(gw.state)
            .oneshot(chat_request(
                Some(TOKEN),
                &json!({"messages": [{"role": "user", "content": [{"type": "audio"}]}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(response).await["error"].is_string());
        assert_eq!(provider.opened.load(Ordering::SeqCst), 0);
        assert_eq!(gw.ledger.profile(USER), Some(Profile::new(0, 10)));
    }

    #[tokio::test]
    async fn test_upstream_rejection_is_502_without_charge() {
        let provider = Arc::new(ScriptedProvider::new(Err(GatewayError::upstream(
            "Gemini API error: Resource has been exhausted",
            Some(429),
        ))));
        let gw = gateway(Profile::new(5, 10), provider);

        let response = create_router(gw.state)
            .oneshot(chat_request(Some(TOKEN), &hello()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            body_json(response).await["error"],
            "Gemini API error: Resource has been exhausted"
        );
        assert_eq!(gw.ledger.profile(USER), Some(Profile::new(5, 10)));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let provider = Arc::new(ScriptedProvider::new(Ok(vec![])));
        let gw = gateway(Profile::new(0, 10), provider.clone());
        let state = gw.state.with_body_limit(1024);

        let big = json!({"messages": [{"role": "user", "content": "x".repeat(4096)}]});
        let response = create_router(state)
            .oneshot(chat_request(Some(TOKEN), &big))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(provider.opened.load(Ordering::SeqCst), 0);
    }
}

#[cfg(test)]
mod streaming_tests {
    use super::*;

    #[tokio::test]
    async fn test_last_unit_of_quota_streams_and_charges() {
        let provider = Arc::new(ScriptedProvider::new(Ok(vec![
            Ok("Hel".into()),
            Ok("lo!".into()),
        ])));
        let gw = gateway(Profile::new(99, 100), provider);

        let response = create_router(gw.state)
            .oneshot(chat_request(Some(TOKEN), &hello()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let body = body_text(response).await;
        assert_eq!(
            body,
            concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"lo!\"}}]}\n\n",
                "data: [DONE]\n\n",
            )
        );
        assert_eq!(gw.ledger.profile(USER), Some(Profile::new(100, 100)));
    }

    #[tokio::test]
    async fn test_mid_stream_failure_ends_with_error_event() {
        let provider = Arc::new(ScriptedProvider::new(Ok(vec![
            Ok("partial".into()),
            Err(GatewayError::stream("Stream read timed out")),
        ])));
        let gw = gateway(Profile::new(1, 10), provider);

        let response = create_router(gw.state)
            .oneshot(chat_request(Some(TOKEN), &hello()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let payloads = sse_payloads(&body_text(response).await);
        assert_eq!(payloads.len(), 2);

        let first: Value = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(first["choices"][0]["delta"]["content"], "partial");
        let last: Value = serde_json::from_str(&payloads[1]).unwrap();
        assert_eq!(last, json!({"error": "Stream read timed out"}));

        assert!(!payloads.contains(&"[DONE]".to_string()));
        assert_eq!(gw.ledger.profile(USER), Some(Profile::new(2, 10)));
    }

    #[tokio::test]
    async fn test_alias_route_streams() {
        let provider = Arc::new(ScriptedProvider::new(Ok(vec![Ok("hi".into())])));
        let gw = gateway(Profile::new(0, 10), provider);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/v1/chat/stream")
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::from(hello().to_string()))
            .unwrap();
        let response = create_router(gw.state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let payloads = sse_payloads(&body_text(response).await);
        assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));
    }
}

#[cfg(test)]
mod surface_tests {
    use super::*;

    #[tokio::test]
    async fn test_cors_preflight_allows_supabase_headers() {
        let gw = gateway(Profile::new(0, 10), Arc::new(ScriptedProvider::new(Ok(vec![]))));

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri(CHAT_PATH)
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization, apikey")
            .body(Body::empty())
            .unwrap();
        let response = create_router(gw.state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let allowed = response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS]
            .to_str()
            .unwrap()
            .to_lowercase();
        assert!(allowed.contains("authorization"));
        assert!(allowed.contains("apikey"));
        assert!(allowed.contains("x-client-info"));
    }

    #[tokio::test]
    async fn test_error_responses_carry_request_id() {
        let gw = gateway(Profile::new(0, 10), Arc::new(ScriptedProvider::new(Ok(vec![]))));

        let mut request = chat_request(None, &hello());
        request
            .headers_mut()
            .insert("x-request-id", "req-123".parse().unwrap());
        let response = create_router(gw.state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["x-request-id"], "req-123");
    }

    #[tokio::test]
    async fn test_metrics_count_outcomes() {
        let gw = gateway(Profile::new(0, 10), Arc::new(ScriptedProvider::new(Ok(vec![]))));
        let app = create_router(gw.state);

        let response = app
            .clone()
            .oneshot(chat_request(None, &hello()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let text = body_text(response).await;
        assert!(text.contains("gateway_requests_total"));
        assert!(text.contains("auth_failure"));
    }

    #[tokio::test]
    async fn test_health() {
        let gw = gateway(Profile::new(0, 10), Arc::new(ScriptedProvider::new(Ok(vec![]))));

        let response = create_router(gw.state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
    }
}

#[cfg(test)]
mod gemini_upstream_tests {
    use super::*;
    use wiremock::matchers::{header as header_match, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn google_gateway(server: &MockServer, profile: Profile) -> TestGateway {
        let provider = GoogleProvider::new(
            GoogleConfig::new("upstream-key").with_base_url(server.uri()),
        )
        .unwrap();
        gateway(profile, Arc::new(provider))
    }

    #[tokio::test]
    async fn test_gemini_stream_is_relayed() {
        let server = MockServer::start().await;
        let upstream_body = r#"[{"candidates": [{"content": {"parts": [{"text": "Bonjour"}], "role": "model"}}]}
,
{"candidates": [{"content": {"parts": [{"text": " le monde"}], "role": "model"}, "finishReason": "STOP"}]}
]"#;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:streamGenerateContent"))
            .and(header_match("x-goog-api-key", "upstream-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string(upstream_body),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gw = google_gateway(&server, Profile::new(0, 5)).await;
        let body = json!({
            "model": "gemini-1.5-flash",
            "messages": [
                {"role": "user", "content": "Say hello in French"},
            ]
        });

        let response = create_router(gw.state)
            .oneshot(chat_request(Some(TOKEN), &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let payloads = sse_payloads(&body_text(response).await);
        let texts: Vec<String> = payloads
            .iter()
            .filter(|p| p.as_str() != "[DONE]")
            .map(|p| {
                let v: Value = serde_json::from_str(p).unwrap();
                v["choices"][0]["delta"]["content"].as_str().unwrap().to_string()
            })
            .collect();

        assert_eq!(texts.concat(), "Bonjour le monde");
        assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));
        assert_eq!(gw.ledger.profile(USER), Some(Profile::new(1, 5)));
    }

    #[tokio::test]
    async fn test_gemini_rejection_is_502() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
            })))
            .mount(&server)
            .await;

        let gw = google_gateway(&server, Profile::new(0, 5)).await;

        let response = create_router(gw.state)
            .oneshot(chat_request(Some(TOKEN), &hello()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let error = body_json(response).await["error"].as_str().unwrap().to_string();
        assert!(error.contains("API key not valid"));
        assert!(!error.contains("upstream-key"));
        assert_eq!(gw.ledger.profile(USER), Some(Profile::new(0, 5)));
    }

    #[tokio::test]
    async fn test_gemini_error_mid_stream() {
        let server = MockServer::start().await;
        let upstream_body = r#"[{"candidates": [{"content": {"parts": [{"text": "Once"}]}}]},
{"error": {"code": 500, "message": "Internal error encountered."}}]"#;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(upstream_body))
            .mount(&server)
            .await;

        let gw = google_gateway(&server, Profile::new(0, 5)).await;

        let response = create_router(gw.state)
            .oneshot(chat_request(Some(TOKEN), &hello()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let payloads = sse_payloads(&body_text(response).await);
        assert_eq!(payloads.len(), 2);
        let last: Value = serde_json::from_str(&payloads[1]).unwrap();
        assert!(last["error"]
            .as_str()
            .unwrap()
            .contains("Internal error encountered."));
        assert_eq!(gw.ledger.profile(USER), Some(Profile::new(1, 5)));
    }
}

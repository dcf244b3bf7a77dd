//! HTTP router for the visit triage service.
//!
//! Layers (outermost → innermost): CORS → request tracing → handler.

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::config::DEFAULT_CORS_ORIGIN;
use crate::core_state::CoreState;

/// Build the service router. `cors_origin` is the single front-end origin
/// allowed to call the API with credentials.
pub fn api_router(core: Arc<CoreState>, cors_origin: &str) -> Router {
    let ctx = ApiContext::new(core);

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/index", post(endpoints::index::index))
        .route("/chat", post(endpoints::chat::chat))
        .route("/analyze", post(endpoints::analyze::analyze))
        .route("/save-chat", post(endpoints::sessions::save_chat))
        .route("/chat/visit/:visitId", get(endpoints::sessions::by_visit))
        .route("/chat/:chatId", get(endpoints::sessions::by_id))
        .route("/follow-up/:visitId", post(endpoints::follow_up::follow_up))
        .route("/alerts/dashboard", get(endpoints::alerts::dashboard))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin))
}

fn cors_layer(origin: &str) -> CorsLayer {
    let origin = HeaderValue::from_str(origin).unwrap_or_else(|_| {
        tracing::warn!(origin, "Invalid CORS origin, using default");
        HeaderValue::from_static(DEFAULT_CORS_ORIGIN)
    });

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::db;
    use crate::pipeline::testing::{mock_collaborators, MockLlmClient};

    const ORIGIN: &str = "http://localhost:5173";

    struct TestApp {
        core: Arc<CoreState>,
        _dir: tempfile::TempDir,
    }

    impl TestApp {
        fn new(llm_responses: &[&str]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let core = Arc::new(CoreState::new(
                dir.path().join("triage.db"),
                mock_collaborators(Arc::new(MockLlmClient::new(llm_responses))),
                Duration::from_secs(30),
            ));
            // Migrate once up front.
            core.open_db().unwrap();
            Self { core, _dir: dir }
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let app = api_router(self.core.clone(), ORIGIN);
            let response = app.oneshot(request).await.unwrap();
            let status = response.status();
            let body = response.into_body().collect().await.unwrap().to_bytes();
            let json = if body.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&body).unwrap()
            };
            (status, json)
        }

        async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            self.send(request).await
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            self.send(request).await
        }
    }

    fn conversation() -> Value {
        json!([
            {"role": "user", "content": "Patient has chest pain and difficulty breathing."},
            {"role": "model", "content": "How long has this been going on?"}
        ])
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = TestApp::new(&[]);
        let (status, body) = app.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = TestApp::new(&[]);
        let (status, _) = app.get("/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_preflight_allows_front_end() {
        let app = TestApp::new(&[]);
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .header("Origin", ORIGIN)
            .header("Access-Control-Request-Method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = api_router(app.core.clone(), ORIGIN).oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            ORIGIN
        );
    }

    #[tokio::test]
    async fn index_reports_chunks_stored() {
        let app = TestApp::new(&[]);
        let (status, body) = app
            .post(
                "/index",
                json!({"visitId": "v1", "transcript": "Patient has fever. She also has a cough."}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chunksStored"], 2);
        assert_eq!(body["message"], "Indexing successful");
    }

    #[tokio::test]
    async fn index_requires_fields() {
        let app = TestApp::new(&[]);
        let (status, body) = app.post("/index", json!({"visitId": "v1"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let app = TestApp::new(&[]);
        let request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_returns_translated_content() {
        let app = TestApp::new(&["Does the pain spread to the arm?"]);
        let (status, body) = app
            .post(
                "/chat",
                json!({"visitId": "v1", "messages": conversation(), "targetLanguage": "hi-IN"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content"], "[hi-IN] Does the pain spread to the arm?");
    }

    #[tokio::test]
    async fn chat_requires_target_language() {
        let app = TestApp::new(&[]);
        let (status, body) = app
            .post("/chat", json!({"visitId": "v1", "messages": conversation()}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Missing targetLanguage");
    }

    #[tokio::test]
    async fn chat_generation_failure_is_hidden_500() {
        let app = TestApp::new(&[]);
        let (status, body) = app
            .post(
                "/chat",
                json!({"visitId": "v1", "messages": conversation(), "targetLanguage": "en-US"}),
            )
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn analyze_high_severity_creates_alert_and_dashboard_entry() {
        let app = TestApp::new(&[
            r#"{"main_complaint": "Chest pain", "all_symptoms": [], "duration_mentioned": "", "medications_mentioned": [], "potential_conditions_mentioned": []}"#,
            "Chest pain with Difficulty Breathing.",
            r#"{"alert": true, "severity": "high", "label": "Difficulty Breathing", "reason": "Possible cardiac event", "recommendedAction": "Refer to hospital immediately"}"#,
        ]);

        let (status, body) = app
            .post(
                "/analyze",
                json!({"visitId": "v1", "messages": conversation(), "targetLanguage": "en-US"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["analysis"], "Chest pain with Difficulty Breathing.");
        assert_eq!(body["structuredData"]["main_complaint"], "Chest pain");
        assert_eq!(body["alert"]["alert"], true);
        assert_eq!(body["alert"]["severity"], "high");

        let (status, body) = app.get("/alerts/dashboard").await;
        assert_eq!(status, StatusCode::OK);
        let groups = body["dashboardData"].as_array().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["visitId"], "v1");
        assert_eq!(groups[0]["totalAlerts"], 1);
        assert_eq!(groups[0]["highestSeverity"], "high");
    }

    #[tokio::test]
    async fn analyze_requires_two_messages() {
        let app = TestApp::new(&[]);
        let (status, body) = app
            .post(
                "/analyze",
                json!({"visitId": "v1", "messages": [{"role": "user", "content": "hi"}], "targetLanguage": "en-US"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Insufficient chat history");
    }

    #[tokio::test]
    async fn save_chat_upserts_one_row_per_visit() {
        let app = TestApp::new(&[]);
        let (status, first) = app
            .post("/save-chat", json!({"visitId": "v1", "messages": conversation()}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["version"], 1);

        let (status, second) = app
            .post(
                "/save-chat",
                json!({"visitId": "v1", "messages": [{"role": "user", "content": "updated"}], "analysis": "Mild"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["chatId"], first["chatId"]);
        assert_eq!(second["version"], 2);

        let (status, view) = app.get("/chat/visit/v1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["messages"].as_array().unwrap().len(), 1);
        assert_eq!(view["analysis"], "Mild");
        assert_eq!(view["alert"], Value::Null);

        let chat_id = second["chatId"].as_str().unwrap();
        let (status, session) = app.get(&format!("/chat/{chat_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["visitId"], "v1");
        assert_eq!(session["version"], 2);
    }

    #[tokio::test]
    async fn save_chat_with_stale_version_conflicts() {
        let app = TestApp::new(&[]);
        app.post("/save-chat", json!({"visitId": "v1", "messages": conversation()}))
            .await;
        app.post("/save-chat", json!({"visitId": "v1", "messages": conversation()}))
            .await;

        let (status, body) = app
            .post(
                "/save-chat",
                json!({"visitId": "v1", "messages": [{"role": "user", "content": "late"}], "expectedVersion": 1}),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "VERSION_CONFLICT");

        let conn = app.core.open_db().unwrap();
        let stored = db::get_session_by_visit(&conn, "v1").unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.messages.len(), 2);
    }

    #[tokio::test]
    async fn save_chat_requires_messages() {
        let app = TestApp::new(&[]);
        let (status, _) = app.post("/save-chat", json!({"visitId": "v1"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn save_chat_rejects_empty_history() {
        let app = TestApp::new(&[]);
        app.post("/save-chat", json!({"visitId": "v1", "messages": conversation()}))
            .await;

        let (status, body) = app
            .post("/save-chat", json!({"visitId": "v1", "messages": []}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Missing visitId or messages");

        let conn = app.core.open_db().unwrap();
        let stored = db::get_session_by_visit(&conn, "v1").unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.messages.len(), 2);
    }

    #[tokio::test]
    async fn unknown_visit_has_empty_view() {
        let app = TestApp::new(&[]);
        let (status, view) = app.get("/chat/visit/never-saved").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["messages"], json!([]));
        assert_eq!(view["analysis"], Value::Null);
        assert_eq!(view["structuredData"], Value::Null);
    }

    #[tokio::test]
    async fn malformed_identifiers_are_400() {
        let app = TestApp::new(&[]);
        let (status, _) = app.get("/chat/visit/bad.id").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = app.get("/chat/not-a-uuid").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Invalid Chat ID format");
    }

    #[tokio::test]
    async fn unknown_chat_id_is_404() {
        let app = TestApp::new(&[]);
        let (status, _) = app.get(&format!("/chat/{}", uuid::Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn follow_up_unknown_visit_is_404() {
        let app = TestApp::new(&["unused"]);
        let (status, body) = app.post("/follow-up/ghost", Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "No previous visit found for this patient.");
    }

    #[tokio::test]
    async fn follow_up_appends_question() {
        let app = TestApp::new(&["Is the breathing easier today?"]);
        app.post(
            "/save-chat",
            json!({"visitId": "v1", "messages": conversation(), "analysis": "Chest pain, referred."}),
        )
        .await;

        let (status, body) = app.post("/follow-up/v1", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["followUpQuestion"], "Is the breathing easier today?");

        let (_, view) = app.get("/chat/visit/v1").await;
        let messages = view["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2]["role"], "assistant");
    }
}

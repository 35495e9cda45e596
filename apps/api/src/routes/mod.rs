pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/sessions", post(handlers::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_delete_session),
        )
        .route("/api/v1/sessions/:id/intake", post(handlers::handle_intake))
        .route(
            "/api/v1/sessions/:id/intake/upload",
            post(handlers::handle_upload_intake),
        )
        .route("/api/v1/sessions/:id/summary", post(handlers::handle_summary))
        .route(
            "/api/v1/sessions/:id/tailoring",
            post(handlers::handle_tailoring),
        )
        .route(
            "/api/v1/sessions/:id/questions",
            post(handlers::handle_next_question),
        )
        .route("/api/v1/sessions/:id/answer", post(handlers::handle_answer))
        .route(
            "/api/v1/sessions/:id/feedback",
            post(handlers::handle_feedback),
        )
        .route(
            "/api/v1/sessions/:id/questions/:index/model-answer",
            post(handlers::handle_model_answer),
        )
        .route("/api/v1/sessions/:id/finish", post(handlers::handle_finish))
        .route("/api/v1/sessions/:id/reset", post(handlers::handle_reset))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::interview::store::SessionStore;
    use crate::llm_client::testing::ScriptedModel;
    use crate::llm_client::LlmError;

    const FEEDBACK: &str = "Good structure.\n\nNo numbers.\n\nAdd impact.\n\nModel answer.\n\nNext?";

    fn test_app(model: Arc<ScriptedModel>) -> Router {
        build_router(AppState {
            sessions: SessionStore::new(),
            llm: model,
            config: Config {
                google_api_key: "test-key".to_string(),
                port: 0,
                rust_log: "info".to_string(),
                max_upload_bytes: 1024 * 1024,
                session_idle_secs: 3600,
            },
        })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_session(app: &Router) -> String {
        let (status, body) = send(app, "POST", "/api/v1/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["stage"], "intake");
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(Arc::new(ScriptedModel::default()));
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_full_round_over_http() {
        let model = Arc::new(ScriptedModel::new([
            "Acme wants backend depth.",
            "Tell me about a service you scaled.",
            FEEDBACK,
            "In my last role...",
        ]));
        let app = test_app(model.clone());
        let id = create_session(&app).await;
        let base = format!("/api/v1/sessions/{id}");

        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/intake"),
            Some(json!({
                "job_description": "Build backend services",
                "company_info": "Acme Inc, fintech startup"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage"], "summarize");

        let (status, body) = send(&app, "POST", &format!("{base}/summary"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "Acme wants backend depth.");
        assert_eq!(body["session"]["stage"], "generate_question");

        let (status, body) = send(&app, "POST", &format!("{base}/questions"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["question"]["text"], "Tell me about a service you scaled.");
        assert_eq!(body["question"]["answer"], Value::Null);

        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/answer"),
            Some(json!({"answer": "I led a project..."})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["star"]["action"], true);
        assert_eq!(body["session"]["stage"], "generate_feedback");

        let (status, body) = send(&app, "POST", &format!("{base}/feedback"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["complete"], true);
        assert_eq!(body["feedback"]["additions"], "Add impact.");

        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/questions/0/model-answer"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_answer"], "In my last role...");

        let (status, body) = send(&app, "POST", &format!("{base}/finish"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage"], "advance");

        let (status, body) = send(&app, "GET", &base, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["questions"].as_array().unwrap().len(), 1);
        assert_eq!(model.calls(), 4);
    }

    #[tokio::test]
    async fn test_empty_job_description_is_validation_error() {
        let app = test_app(Arc::new(ScriptedModel::default()));
        let id = create_session(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/intake"),
            Some(json!({"cv_text": "cv", "company_info": "Acme"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (_, body) = send(&app, "GET", &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(body["stage"], "intake");
    }

    #[tokio::test]
    async fn test_out_of_order_step_is_conflict() {
        let app = test_app(Arc::new(ScriptedModel::default()));
        let id = create_session(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/answer"),
            Some(json!({"answer": "early"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_STAGE");
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let app = test_app(Arc::new(ScriptedModel::default()));
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/sessions/00000000-0000-0000-0000-000000000000/summary",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_model_failure_is_bad_gateway_and_retryable() {
        let model = Arc::new(ScriptedModel::default());
        model.push_error(LlmError::Api {
            status: 429,
            message: "quota".to_string(),
        });
        model.push_reply("Briefing after retry.");
        let app = test_app(model);
        let id = create_session(&app).await;
        let base = format!("/api/v1/sessions/{id}");

        send(
            &app,
            "POST",
            &format!("{base}/intake"),
            Some(json!({"job_description": "jd", "company_info": "co"})),
        )
        .await;

        let (status, body) = send(&app, "POST", &format!("{base}/summary"), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "LLM_ERROR");
        let (_, snapshot) = send(&app, "GET", &base, None).await;
        assert_eq!(snapshot["stage"], "summarize");

        let (status, body) = send(&app, "POST", &format!("{base}/summary"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "Briefing after retry.");
    }

    #[tokio::test]
    async fn test_tailoring_with_body() {
        let model = Arc::new(ScriptedModel::new(["briefing", "guidance"]));
        let app = test_app(model);
        let id = create_session(&app).await;
        let base = format!("/api/v1/sessions/{id}");

        send(
            &app,
            "POST",
            &format!("{base}/intake"),
            Some(json!({"cv_text": "Rust, 5 years", "job_description": "jd", "company_info": "co"})),
        )
        .await;
        let (_, body) = send(&app, "POST", &format!("{base}/summary"), None).await;
        assert_eq!(body["session"]["stage"], "tailor_to_cv");

        let (status, body) = send(&app, "POST", &format!("{base}/tailoring"), Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tailoring"], "guidance");
        assert_eq!(body["session"]["stage"], "generate_question");
    }

    #[tokio::test]
    async fn test_tailoring_without_body_uses_intake_cv() {
        let model = Arc::new(ScriptedModel::new(["briefing", "guidance"]));
        let app = test_app(model.clone());
        let id = create_session(&app).await;
        let base = format!("/api/v1/sessions/{id}");

        send(
            &app,
            "POST",
            &format!("{base}/intake"),
            Some(json!({"cv_text": "Rust, 5 years", "job_description": "jd", "company_info": "co"})),
        )
        .await;
        send(&app, "POST", &format!("{base}/summary"), None).await;

        let (status, body) = send(&app, "POST", &format!("{base}/tailoring"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tailoring"], "guidance");
        assert!(model.last_prompt().contains("Rust, 5 years"));
    }

    async fn send_raw(app: &Router, uri: &str, content_type: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_bad_json_bodies_get_error_envelope() {
        let app = test_app(Arc::new(ScriptedModel::default()));
        let id = create_session(&app).await;
        let base = format!("/api/v1/sessions/{id}");

        let (status, body) =
            send_raw(&app, &format!("{base}/intake"), "application/json", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) =
            send_raw(&app, &format!("{base}/intake"), "text/plain", r#"{"job_description":"jd"}"#)
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) =
            send_raw(&app, &format!("{base}/answer"), "application/json", r#"{"answer": 5}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) =
            send_raw(&app, &format!("{base}/tailoring"), "application/json", "[1,").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (_, snapshot) = send(&app, "GET", &base, None).await;
        assert_eq!(snapshot["stage"], "intake");
    }

    fn multipart_body(boundary: &str, file_name: &str, file: &str) -> String {
        format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"cv\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {file}\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"job_description\"\r\n\r\n\
             Build backend services\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"company_info\"\r\n\r\n\
             Acme Inc\r\n\
             --{boundary}--\r\n"
        )
    }

    async fn upload(app: &Router, id: &str, file_name: &str, file: &str) -> (StatusCode, Value) {
        let boundary = "coach-boundary";
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/v1/sessions/{id}/intake/upload"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(multipart_body(boundary, file_name, file)))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_upload_text_cv() {
        let app = test_app(Arc::new(ScriptedModel::default()));
        let id = create_session(&app).await;

        let (status, body) = upload(&app, &id, "cv.txt", "Jane Doe, Rust engineer").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage"], "summarize");
        assert_eq!(body["cv_text"], "Jane Doe, Rust engineer");
        assert_eq!(body["job_description"], "Build backend services");
    }

    #[tokio::test]
    async fn test_upload_unsupported_format() {
        let app = test_app(Arc::new(ScriptedModel::default()));
        let id = create_session(&app).await;

        let (status, body) = upload(&app, &id, "cv.odt", "binary").await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["error"]["code"], "UNSUPPORTED_FORMAT");
    }

    #[tokio::test]
    async fn test_upload_after_intake_is_conflict() {
        let app = test_app(Arc::new(ScriptedModel::default()));
        let id = create_session(&app).await;
        let (status, _) = upload(&app, &id, "cv.txt", "First CV").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = upload(&app, &id, "cv.odt", "never inspected").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_STAGE");

        let (_, snapshot) = send(&app, "GET", &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(snapshot["cv_text"], "First CV");
    }

    #[tokio::test]
    async fn test_delete_session() {
        let app = test_app(Arc::new(ScriptedModel::default()));
        let id = create_session(&app).await;

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::extraction::handlers::handle_extract_context;
use crate::facts::handlers as facts;
use crate::reconcile::handlers as sessions;
use crate::state::AppState;
use crate::templates::handlers as templates;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/extract-context", post(handle_extract_context))
        // Templates
        .route("/api/v1/templates", get(templates::handle_list_templates))
        .route(
            "/api/v1/templates/import",
            post(templates::handle_import_template),
        )
        .route("/api/v1/templates/:name", get(templates::handle_get_template))
        // Proposals and facts
        .route(
            "/api/v1/proposals",
            get(facts::handle_list_proposals).post(facts::handle_create_proposal),
        )
        .route(
            "/api/v1/proposals/:id",
            get(facts::handle_get_proposal).delete(facts::handle_delete_proposal),
        )
        .route("/api/v1/proposals/:id/facts", post(facts::handle_add_facts))
        // Sessions
        .route("/api/v1/sessions", post(sessions::handle_create_session))
        .route("/api/v1/sessions/:id", get(sessions::handle_get_session))
        .route(
            "/api/v1/sessions/:id/documents",
            post(sessions::handle_add_documents),
        )
        .route("/api/v1/sessions/:id/prefill", post(sessions::handle_prefill))
        .route("/api/v1/sessions/:id/review", post(sessions::handle_review))
        .route("/api/v1/sessions/:id/render", post(sessions::handle_render))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::db::test_pool;
    use crate::extraction::gateway::{ExtractionError, FactExtractor};
    use crate::models::proposal::FactMap;
    use crate::reconcile::session::SessionStore;
    use crate::templates::store::TemplateStore;

    const BOUNDARY: &str = "proposal-test-boundary";

    struct StubExtractor;

    #[async_trait]
    impl FactExtractor for StubExtractor {
        async fn extract_facts(&self, text: &str) -> Result<FactMap, ExtractionError> {
            if text.contains("garbage") {
                return Err(ExtractionError::NotAnObject);
            }
            Ok([("client_company".to_string(), "Acme Corp".to_string())].into())
        }

        async fn best_guess_facts(
            &self,
            _text: &str,
            _known: &FactMap,
            _wanted: &BTreeSet<String>,
        ) -> Result<FactMap, ExtractionError> {
            Ok(FactMap::new())
        }
    }

    async fn test_app() -> (TempDir, Router) {
        let dir = TempDir::new().unwrap();
        let tpl_dir = dir.path().join("templates");
        std::fs::create_dir_all(&tpl_dir).unwrap();
        std::fs::write(
            tpl_dir.join("simple.md"),
            "Proposal for {{ client_company }} in {{ client_city }}, dated {{ proposal_date }}.",
        )
        .unwrap();

        let state = AppState {
            db: test_pool().await,
            extractor: Arc::new(StubExtractor),
            templates: TemplateStore::new(tpl_dir, dir.path().join("out")),
            sessions: SessionStore::default(),
        };
        (dir, build_router(state))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn upload_request(uri: &str, file_name: &str, content: &str, name: Option<&str>) -> Request<Body> {
        multipart_request(uri, "files", file_name, content, name)
    }

    fn multipart_request(
        uri: &str,
        field: &str,
        file_name: &str,
        content: &str,
        name: Option<&str>,
    ) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: text/plain\r\n\r\n{content}\r\n"
        );
        if let Some(name) = name {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, app) = test_app().await;
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "proposal-api");
    }

    #[tokio::test]
    async fn test_extract_context() {
        let (_dir, app) = test_app().await;

        let (status, body) = send(
            &app,
            json_request("POST", "/extract-context", json!({"text": "Client: Acme Corp"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"data": {"client_company": "Acme Corp"}}));

        let (status, body) =
            send(&app, json_request("POST", "/extract-context", json!({"text": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = send(
            &app,
            json_request("POST", "/extract-context", json!({"text": "garbage"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "EXTRACTION_ERROR");
        assert!(!body["error"]["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_proposal_crud() {
        let (_dir, app) = test_app().await;

        let (status, created) = send(
            &app,
            json_request("POST", "/api/v1/proposals", json!({"name": "acme"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            json_request("POST", "/api/v1/proposals", json!({"name": "acme"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "DUPLICATE_NAME");

        let (status, _) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/v1/proposals/{id}/facts"),
                json!({"facts": {"client_city": "Austin", "marketing_sign_cost": 250, "notes": null}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let req = Request::get(format!("/api/v1/proposals/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "acme");
        assert_eq!(
            body["effective_facts"],
            json!({"client_city": "Austin", "marketing_sign_cost": "250"})
        );

        let req = Request::get("/api/v1/proposals?name=acme")
            .body(Body::empty())
            .unwrap();
        let (_, body) = send(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id"], id);

        let req = Request::delete(format!("/api/v1/proposals/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let req = Request::get(format!("/api/v1/proposals/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_template_detail_lists_required_keys() {
        let (_dir, app) = test_app().await;

        let req = Request::get("/api/v1/templates").body(Body::empty()).unwrap();
        let (_, body) = send(&app, req).await;
        assert_eq!(body, json!({"templates": ["simple"]}));

        let req = Request::get("/api/v1/templates/simple")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["required_keys"],
            json!(["client_city", "client_company", "proposal_date"])
        );

        let req = Request::get("/api/v1/templates/nope").body(Body::empty()).unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_walkthrough() {
        let (_dir, app) = test_app().await;

        let (status, session) = send(
            &app,
            upload_request(
                "/api/v1/sessions",
                "notes.txt",
                "Client: Acme Corp, Budget: $10000",
                Some("acme"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(session["state"], "EXTRACTED");
        assert_eq!(session["proposal_name"], "acme");
        let id = session["id"].as_str().unwrap().to_string();

        let req = Request::post(format!("/api/v1/sessions/{id}/render"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

        let (status, session) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/v1/sessions/{id}/prefill"),
                json!({"template": "simple"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["state"], "PREFILLED");
        assert_eq!(session["missing"], json!(["client_city"]));
        assert_eq!(session["fields"]["client_company"]["source"], "stored");
        assert_eq!(session["fields"]["proposal_date"]["source"], "default");

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/v1/sessions/{id}/review"),
                json!({"values": {}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("client_city"));

        let (status, session) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/v1/sessions/{id}/review"),
                json!({"values": {"client_city": "Austin", "proposal_date": "2024-06-03"}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["state"], "REVIEWED");

        let req = Request::post(format!("/api/v1/sessions/{id}/render"))
            .body(Body::empty())
            .unwrap();
        let (status, rendered) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            rendered["content"],
            "Proposal for Acme Corp in Austin, dated June 3, 2024."
        );
        assert_eq!(rendered["file_name"], "acme_proposal.md");

        let req = Request::get(format!("/api/v1/sessions/{id}"))
            .body(Body::empty())
            .unwrap();
        let (_, session) = send(&app, req).await;
        assert_eq!(session["state"], "RENDERED");
    }

    #[tokio::test]
    async fn test_session_upload_rejects_unreadable_files() {
        let (_dir, app) = test_app().await;
        let (status, body) = send(
            &app,
            upload_request("/api/v1/sessions", "sheet.xlsx", "ignored", None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_template_import_rejects_non_pdf_files() {
        let (_dir, app) = test_app().await;
        let (status, body) = send(
            &app,
            multipart_request(
                "/api/v1/templates/import",
                "file",
                "notes.txt",
                "Hello {{ client_company }}",
                Some("notes"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        let message = body["error"]["message"].as_str().unwrap();
        assert!(message.starts_with("Unsupported file type: notes.txt"));

        let req = Request::get("/api/v1/templates").body(Body::empty()).unwrap();
        let (_, listing) = send(&app, req).await;
        assert_eq!(listing["templates"], json!(["simple"]));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (_dir, app) = test_app().await;
        let req = Request::get(format!("/api/v1/sessions/{}", uuid::Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

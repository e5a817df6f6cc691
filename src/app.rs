use std::net::SocketAddr;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::state::AppState;
use crate::{auth, catalog, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(catalog::router())
                .route("/health", get(health)),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error" })),
            )
        }
    }
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        auth::{lifecycle, repo_types::Status},
        mail::{testing::RecordingMailer, LogMailer},
    };

    const ADMIN_EMAIL: &str = "admin@portal.com";

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    /// Sends `body` verbatim with the given content type.
    async fn call_raw(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        content_type: &str,
        body: &'static str,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let res = app
            .clone()
            .oneshot(req.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
        call(
            app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    async fn admin_token(app: &Router) -> String {
        let (status, body) = login(app, ADMIN_EMAIL, "admin").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn signup(app: &Router, email: &str) -> (StatusCode, Value) {
        call(
            app,
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({ "name": "Alice", "email": email, "password": "pw1" })),
        )
        .await
    }

    /// Signs up, verifies and approves `email`; returns its id and a session token.
    async fn active_user(app: &Router, mailer: &RecordingMailer, email: &str) -> (String, String) {
        signup(app, email).await;
        let token = mailer.verification_token(email).unwrap();
        call(app, Method::GET, &format!("/api/auth/verify?token={token}"), None, None).await;

        let admin = admin_token(app).await;
        let (_, body) = call(app, Method::GET, "/api/users", Some(&admin), None).await;
        let id = body["users"]
            .as_array()
            .unwrap()
            .iter()
            .find(|u| u["email"] == email)
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();
        call(
            app,
            Method::PATCH,
            &format!("/api/users/{id}/status"),
            Some(&admin),
            Some(json!({ "status": "approved" })),
        )
        .await;

        let (_, body) = login(app, email, "pw1").await;
        (id, body["token"].as_str().unwrap().to_string())
    }

    async fn harness() -> (Router, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::fake_with(AppConfig::for_tests(), mailer.clone()).await;
        (build_app(state), mailer)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (app, _) = harness().await;
        let (status, body) = call(&app, Method::GET, "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn account_goes_from_signup_to_session() {
        let (app, mailer) = harness().await;

        let (status, body) = signup(&app, "alice@example.com").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, body) = login(&app, "alice@example.com", "pw1").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["success"], false);

        let token = mailer.verification_token("alice@example.com").unwrap();
        let uri = format!("/api/auth/verify?token={token}");
        let (status, _) = call(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // verified but still pending
        let (status, _) = login(&app, "alice@example.com", "pw1").await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = admin_token(&app).await;
        let (_, body) = call(&app, Method::GET, "/api/users", Some(&admin), None).await;
        let alice = body["users"]
            .as_array()
            .unwrap()
            .iter()
            .find(|u| u["email"] == "alice@example.com")
            .unwrap()
            .clone();
        assert_eq!(alice["isVerified"], true);
        assert_eq!(alice["status"], "pending");
        assert!(alice.get("passwordHash").is_none());

        let id = alice["id"].as_str().unwrap();
        let (status, _) = call(
            &app,
            Method::PATCH,
            &format!("/api/users/{id}/status"),
            Some(&admin),
            Some(json!({ "status": "approved" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = login(&app, "Alice@Example.com", "pw1").await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = call(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "alice@example.com");
        assert_eq!(body["user"]["role"], "user");

        let (status, _) = call(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn deactivation_ends_existing_sessions() {
        let (app, mailer) = harness().await;
        let (id, token) = active_user(&app, &mailer, "bob@example.com").await;

        let admin = admin_token(&app).await;
        call(
            &app,
            Method::PATCH,
            &format!("/api/users/{id}/status"),
            Some(&admin),
            Some(json!({ "status": "rejected" })),
        )
        .await;

        let (status, _) = call(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn root_admin_cannot_be_removed() {
        let (app, mailer) = harness().await;
        let (id, user_token) = active_user(&app, &mailer, "bob@example.com").await;
        let admin = admin_token(&app).await;

        let (status, _) =
            call(&app, Method::DELETE, "/api/users/admin-001", Some(&user_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            call(&app, Method::DELETE, "/api/users/admin-001", Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Cannot delete root admin");

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/users/admin-001/password",
            Some(&admin),
            Some(json!({ "newPassword": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, Method::DELETE, "/api/users/nope", Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            call(&app, Method::DELETE, &format!("/api/users/{id}"), Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::GET, "/api/auth/me", Some(&user_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signup_survives_mail_outage() {
        let state =
            AppState::fake_with(AppConfig::for_tests(), Arc::new(RecordingMailer::failing())).await;
        let app = build_app(state);
        let (status, _) = signup(&app, "carol@example.com").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = signup(&app, "CAROL@example.com").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn verify_without_token_is_bad_request() {
        let (app, _) = harness().await;
        let (status, body) = call(&app, Method::GET, "/api/auth/verify", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Missing token");
    }

    #[tokio::test]
    async fn forgotten_password_is_mailed_and_usable() {
        let (app, mailer) = harness().await;
        active_user(&app, &mailer, "dana@example.com").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/forgot",
            None,
            Some(json!({ "email": "dana@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("tempPassword").is_none());

        let temp = mailer.temporary_password("dana@example.com").unwrap();
        let (status, _) = login(&app, "dana@example.com", "pw1").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = login(&app, "dana@example.com", &temp).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/auth/change-password",
            None,
            Some(json!({
                "email": "dana@example.com",
                "currentPassword": temp,
                "newPassword": "pw2",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = login(&app, "dana@example.com", "pw2").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn requests_without_a_session_are_rejected() {
        let (app, _) = harness().await;
        for (method, uri) in [
            (Method::GET, "/api/auth/me"),
            (Method::POST, "/api/auth/logout"),
            (Method::GET, "/api/users"),
            (Method::DELETE, "/api/apps/x"),
        ] {
            let (status, _) = call(&app, method, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        }
        let (status, _) = call(&app, Method::GET, "/api/auth/me", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn catalog_is_public_to_read_and_admin_only_to_write() {
        let (app, mailer) = harness().await;

        let (status, body) = call(&app, Method::GET, "/api/apps", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["apps"].as_array().unwrap().len(), 3);

        let (status, body) = call(&app, Method::GET, "/api/categories", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["categories"].as_array().unwrap().iter().any(|c| c == "Work"));

        let new_app = json!({
            "name": "Grafana",
            "url": "https://grafana.example.com",
            "category": "Monitoring",
        });
        let (_, user_token) = active_user(&app, &mailer, "erin@example.com").await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/apps",
            Some(&user_token),
            Some(new_app.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = admin_token(&app).await;
        let (status, body) =
            call(&app, Method::POST, "/api/apps", Some(&admin), Some(new_app)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["app"]["description"], "A useful web application.");
        let id = body["app"]["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/categories",
            Some(&admin),
            Some(json!({ "name": "Monitoring" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(
            &app,
            Method::DELETE,
            "/api/categories/Monitoring",
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&app, Method::GET, "/api/apps", None, None).await;
        let kept = body["apps"]
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["id"] == id.as_str())
            .unwrap()
            .clone();
        assert_eq!(kept["category"], "Monitoring");

        let (status, _) =
            call(&app, Method::DELETE, &format!("/api/apps/{id}"), Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) =
            call(&app, Method::DELETE, &format!("/api/apps/{id}"), Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unreadable_bodies_are_reported_as_validation_errors() {
        let (app, _) = harness().await;
        for (content_type, body) in [
            ("application/json", "{not json"),
            ("text/plain", r#"{"email":"a@x.com","password":"pw"}"#),
            ("application/json", r#"{"email":5,"password":"pw"}"#),
        ] {
            let (status, value) =
                call_raw(&app, Method::POST, "/api/auth/login", None, content_type, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{content_type} {body}");
            assert_eq!(value["success"], false, "{body}");
            assert!(value["message"].is_string());
        }

        let admin = admin_token(&app).await;
        let (status, value) = call_raw(
            &app,
            Method::POST,
            "/api/apps",
            Some(&admin),
            "application/json",
            r#"{"name": ["x"]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["success"], false);
    }

    #[tokio::test]
    async fn forgot_without_mail_transport_keeps_the_old_password() {
        let state = AppState::fake_with(AppConfig::for_tests(), Arc::new(LogMailer)).await;
        let store = state.store.clone();
        let app = build_app(state);

        let dana = lifecycle::signup(store.as_ref(), "Dana", "dana@example.com", "pw1")
            .await
            .unwrap();
        lifecycle::verify_email(store.as_ref(), dana.verification_token.as_deref().unwrap())
            .await
            .unwrap();
        store.set_status(&dana.id, Status::Approved).await.unwrap();

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/forgot",
            None,
            Some(json!({ "email": "dana@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);

        let (status, _) = login(&app, "dana@example.com", "pw1").await;
        assert_eq!(status, StatusCode::OK);
    }
}

use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::error::{not_found, panic_response};
use crate::resources::{self, ApiVersion};
use crate::{auth, state::AppState};

pub fn build_app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(|| async { "Root Path" }).fallback(not_found))
        .merge(auth::router(state.clone()));

    for version in ApiVersion::ALL {
        router = router.nest(version.prefix(), resources::router(version, state.clone()));
    }

    router
        .fallback(not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "3000".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use base64ct::{Base64, Encoding};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_app() -> Router {
        build_app(AppState::for_tests().await)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            req = req.header(header::AUTHORIZATION, auth);
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    fn basic(username: &str, password: &str) -> String {
        format!(
            "Basic {}",
            Base64::encode_string(format!("{username}:{password}").as_bytes())
        )
    }

    async fn signup(app: &Router, username: &str, role: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/signup",
            None,
            Some(json!({"username": username, "password": "password", "role": role})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "signup failed: {body}");
        body["user"]["token"].as_str().unwrap().to_string()
    }

    async fn signin(app: &Router, username: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/signin",
            Some(basic(username, "password").as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "signin failed: {body}");
        format!("Bearer {}", body["user"]["token"].as_str().unwrap())
    }

    #[tokio::test]
    async fn root_responds() {
        let app = test_app().await;
        let (status, body) = send(&app, Method::GET, "/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Root Path");
    }

    #[tokio::test]
    async fn bad_path_is_page_not_found() {
        let app = test_app().await;
        for uri in ["/someBadPath", "/api/v1/shoes", "/api/v1/food/1/extra"] {
            let (status, body) = send(&app, Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["message"], "PAGE NOT FOUND.", "{uri}");
        }
    }

    #[tokio::test]
    async fn wrong_method_on_known_path_is_json_page_not_found() {
        let app = test_app().await;
        for (method, uri) in [
            (Method::GET, "/signup"),
            (Method::GET, "/signin"),
            (Method::DELETE, "/"),
            (Method::PATCH, "/api/v1/food/1"),
            (Method::DELETE, "/api/v1/food"),
            (Method::PUT, "/api/v1/clothes"),
        ] {
            let (status, body) = send(&app, method.clone(), uri, None, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
            assert_eq!(body["error"], "not_found", "{method} {uri}");
            assert_eq!(body["message"], "PAGE NOT FOUND.", "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn wrong_method_on_v2_still_checks_the_token_first() {
        let app = test_app().await;
        let (status, body) = send(&app, Method::PATCH, "/api/v2/food/1", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");

        signup(&app, "josh", "admin").await;
        let bearer = signin(&app, "josh").await;
        let (status, body) = send(
            &app,
            Method::PATCH,
            "/api/v2/food/1",
            Some(bearer.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "PAGE NOT FOUND.");
    }

    #[tokio::test]
    async fn undecodable_path_segment_is_json_bad_request() {
        let app = test_app().await;
        for uri in ["/api/v1/food/%FF", "/api/v1/%C3%28"] {
            let (status, body) = send(&app, Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["error"], "validation_error", "{uri}");
            assert!(body["message"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn signup_returns_token_and_signin_works() {
        let app = test_app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/signup",
            None,
            Some(json!({"username": "josh", "password": "password", "role": "admin"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "josh");
        assert!(!body["user"]["token"].as_str().unwrap().is_empty());
        assert!(body["user"].get("password_hash").is_none());

        let (status, body) = send(
            &app,
            Method::POST,
            "/signin",
            Some(basic("josh", "password").as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "josh");
        assert!(!body["user"]["token"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_signup_fails() {
        let app = test_app().await;
        signup(&app, "josh", "admin").await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/signup",
            None,
            Some(json!({"username": "josh", "password": "other"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");
    }

    #[tokio::test]
    async fn signup_validates_input() {
        let app = test_app().await;
        for body in [
            json!({"username": "jo:sh", "password": "password"}),
            json!({"username": "josh", "password": ""}),
            json!({"username": "josh", "password": "password", "role": "root"}),
            json!({"password": "password"}),
        ] {
            let (status, res) = send(&app, Method::POST, "/signup", None, Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{res}");
            assert_eq!(res["error"], "validation_error");
        }
    }

    #[tokio::test]
    async fn signin_rejects_bad_credentials() {
        let app = test_app().await;
        signup(&app, "josh", "admin").await;

        for auth in [
            Some(basic("josh", "wrong")),
            Some(basic("nobody", "password")),
            Some("Bearer something".to_string()),
            None,
        ] {
            let (status, body) = send(&app, Method::POST, "/signin", auth.as_deref(), None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{auth:?}");
            assert_eq!(body["error"], "unauthorized");
        }
    }

    #[tokio::test]
    async fn v1_crud_without_credentials() {
        let app = test_app().await;

        let (status, created) = send(
            &app,
            Method::POST,
            "/api/v1/food",
            None,
            Some(json!({"name": "Banana", "calories": 1000, "type": "fruit"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = created["id"].as_i64().unwrap();
        assert!(id > 0);
        assert_eq!(created["name"], "Banana");

        let (status, fetched) =
            send(&app, Method::GET, &format!("/api/v1/food/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        let (status, list) = send(&app, Method::GET, "/api/v1/food", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list, json!([created]));

        let (status, updated) = send(
            &app,
            Method::PUT,
            &format!("/api/v1/food/{id}"),
            None,
            Some(json!({"calories": 105})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["calories"], 105);
        assert_eq!(updated["name"], "Banana");

        let (status, body) =
            send(&app, Method::DELETE, &format!("/api/v1/food/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);

        let (status, body) =
            send(&app, Method::GET, &format!("/api/v1/food/{id}"), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn v1_ignores_credentials() {
        let app = test_app().await;
        let (status, _) = send(
            &app,
            Method::GET,
            "/api/v1/clothes",
            Some("Bearer not-a-real-token"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_resource_input_is_bad_request() {
        let app = test_app().await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/clothes",
            None,
            Some(json!({"name": "Shirt", "color": 3, "size": "M"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::GET, "/api/v1/clothes/abc", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/clothes")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn v2_requires_bearer_token() {
        let app = test_app().await;
        let (status, body) = send(&app, Method::GET, "/api/v2/food", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");

        let (status, _) = send(
            &app,
            Method::GET,
            "/api/v2/food",
            Some(basic("josh", "password").as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn v2_crud_with_admin_token() {
        let app = test_app().await;
        signup(&app, "josh", "admin").await;
        let bearer = signin(&app, "josh").await;

        let (status, created) = send(
            &app,
            Method::POST,
            "/api/v2/food",
            Some(bearer.as_str()),
            Some(json!({"name": "Broccoli", "calories": 0, "type": "vegetable"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = created["id"].as_i64().unwrap();

        let (status, list) = send(&app, Method::GET, "/api/v2/food", Some(bearer.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[0]["name"], "Broccoli");

        let (status, updated) = send(
            &app,
            Method::PUT,
            &format!("/api/v2/food/{id}"),
            Some(bearer.as_str()),
            Some(json!({"name": "Schmrockley", "calories": 1, "type": "vegetable"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Schmrockley");

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/v2/food/{id}"),
            Some(bearer.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/v2/food/{id}"),
            Some(bearer.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn v2_user_role_is_read_only() {
        let app = test_app().await;
        let token = signup(&app, "reader", "user").await;
        let bearer = format!("Bearer {token}");

        let (status, _) = send(&app, Method::GET, "/api/v2/clothes", Some(bearer.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v2/clothes",
            Some(bearer.as_str()),
            Some(json!({"name": "Shirt", "color": "blue", "size": "M"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
    }

    #[tokio::test]
    async fn new_signin_invalidates_old_token() {
        let app = test_app().await;
        signup(&app, "josh", "admin").await;
        let first = signin(&app, "josh").await;
        let second = signin(&app, "josh").await;

        let (status, _) = send(&app, Method::GET, "/api/v2/food", Some(first.as_str()), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, Method::GET, "/api/v2/food", Some(second.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}

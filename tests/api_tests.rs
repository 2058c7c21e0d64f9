use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use marquee::api::AppState;
use marquee::config::{Config, MAX_TOKEN_TTL_HOURS};
use marquee::db::Store;
use marquee::models::permission::MOVIES_WRITE;
use marquee::models::{Secret, Token, User};
use marquee::services::{
    ActivationNotifier, AuthError, AuthService, Registration, SeaOrmAuthService,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::{TempDir, tempdir};
use tower::ServiceExt;

/// Keeps every activation plaintext so tests can play the user's inbox.
#[derive(Default)]
struct CapturingNotifier {
    tokens: Mutex<Vec<(i64, String)>>,
}

impl CapturingNotifier {
    fn last_for(&self, user_id: i64) -> Option<String> {
        self.tokens
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| *id == user_id)
            .map(|(_, token)| token.clone())
    }
}

#[async_trait::async_trait]
impl ActivationNotifier for CapturingNotifier {
    async fn activation_issued(&self, user: &User, token: &Token) -> anyhow::Result<()> {
        self.tokens
            .lock()
            .unwrap()
            .push((user.id, token.plaintext.expose().to_string()));
        Ok(())
    }
}

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    inbox: Arc<CapturingNotifier>,
    _db_dir: TempDir,
}

async fn spawn_app() -> TestApp {
    let db_dir = tempdir().expect("failed to create temp dir");
    let db_path = db_dir.path().join("marquee.db");

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;

    let store = Store::from_config(&config)
        .await
        .expect("failed to open store");
    let inbox = Arc::new(CapturingNotifier::default());

    let state = marquee::api::create_app_state(config, store, inbox.clone(), None)
        .expect("failed to build app state");
    let router = marquee::api::router(state.clone());

    TestApp {
        router,
        state,
        inbox,
        _db_dir: db_dir,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, _, json) = self
            .send_with_headers(method, uri, token, &[], body)
            .await;
        (status, json)
    }

    async fn send_with_headers(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, headers, json)
    }

    /// Registers, activates and logs in. Returns the user id and a bearer token.
    async fn active_user(&self, email: &str) -> (i64, String) {
        let (status, body) = self
            .send(
                "POST",
                "/v1/users",
                None,
                Some(json!({"name": "Alice", "email": email, "password": "pa55word1234"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let user_id = body["data"]["user"]["id"].as_i64().unwrap();

        let activation = self.inbox.last_for(user_id).unwrap();
        let (status, _) = self
            .send(
                "PUT",
                "/v1/users/activated",
                None,
                Some(json!({"token": activation})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        (user_id, self.login(email, "pa55word1234").await)
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/v1/tokens/authentication",
                None,
                Some(json!({"email": email, "password": password})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["authentication_token"]["token"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

fn new_movie() -> Value {
    json!({
        "title": "Moana",
        "year": 2016,
        "runtime": "107 mins",
        "genres": ["animation", "adventure"]
    })
}

#[tokio::test]
async fn test_healthcheck() {
    let app = spawn_app().await;

    let (status, body) = app.send("GET", "/v1/healthcheck", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "available");
    assert_eq!(body["data"]["database"], "ok");
}

#[tokio::test]
async fn test_out_of_range_token_ttl_is_refused_at_startup() {
    let app = spawn_app().await;

    for hours in [i64::MAX, MAX_TOKEN_TTL_HOURS + 1, 0] {
        let mut config = Config::default();
        config.security.authentication_token_ttl_hours = hours;

        let result = marquee::api::create_app_state(
            config,
            app.state.store.clone(),
            app.inbox.clone(),
            None,
        );
        assert!(result.is_err(), "{hours}h should be refused");
    }
}

#[tokio::test]
async fn test_registration_hides_credentials_and_sends_activation_token() {
    let app = spawn_app().await;

    let (status, body) = app
        .send(
            "POST",
            "/v1/users",
            None,
            Some(json!({"name": "Alice", "email": "Alice@Example.com", "password": "pa55word1234"})),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    let user = &body["data"]["user"];
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["activated"], false);
    assert!(user.get("password").is_none());
    assert!(user.get("password_hash").is_none());

    let token = app.inbox.last_for(user["id"].as_i64().unwrap()).unwrap();
    assert_eq!(token.len(), 26);
    assert!(!body.to_string().contains(&token));

    let permissions = app
        .state
        .auth
        .permissions_for(user["id"].as_i64().unwrap())
        .await
        .unwrap();
    assert!(permissions.include("movies:read"));
    assert!(!permissions.include(MOVIES_WRITE));
}

#[tokio::test]
async fn test_registration_validation_and_duplicates() {
    let app = spawn_app().await;

    let (status, body) = app
        .send(
            "POST",
            "/v1/users",
            None,
            Some(json!({"name": "", "email": "nope", "password": "short"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"]["name"], "must be provided");
    assert_eq!(body["fields"]["email"], "must be a valid email address");
    assert_eq!(body["fields"]["password"], "must be at least 8 bytes long");

    let payload = json!({"name": "Alice", "email": "alice@example.com", "password": "pa55word1234"});
    let (status, _) = app.send("POST", "/v1/users", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.send("POST", "/v1/users", None, Some(payload)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["fields"]["email"],
        "a user with this email address already exists"
    );
}

#[tokio::test]
async fn test_activation_token_is_single_use() {
    let app = spawn_app().await;

    let (_, body) = app
        .send(
            "POST",
            "/v1/users",
            None,
            Some(json!({"name": "Alice", "email": "alice@example.com", "password": "pa55word1234"})),
        )
        .await;
    let user_id = body["data"]["user"]["id"].as_i64().unwrap();
    let token = app.inbox.last_for(user_id).unwrap();

    let (status, body) = app
        .send("PUT", "/v1/users/activated", None, Some(json!({"token": token})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["activated"], true);

    let (status, body) = app
        .send("PUT", "/v1/users/activated", None, Some(json!({"token": token})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"]["token"], "invalid or expired activation token");

    let (status, body) = app
        .send("PUT", "/v1/users/activated", None, Some(json!({"token": "short"})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"]["token"], "must be 26 bytes long");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = spawn_app().await;
    app.active_user("alice@example.com").await;

    let (wrong_password, wrong_password_body) = app
        .send(
            "POST",
            "/v1/tokens/authentication",
            None,
            Some(json!({"email": "alice@example.com", "password": "not-the-password"})),
        )
        .await;
    let (unknown_email, unknown_email_body) = app
        .send(
            "POST",
            "/v1/tokens/authentication",
            None,
            Some(json!({"email": "nobody@example.com", "password": "pa55word1234"})),
        )
        .await;

    assert_eq!(wrong_password, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password_body, unknown_email_body);
    assert_eq!(
        wrong_password_body["error"],
        "invalid authentication credentials"
    );
}

#[tokio::test]
async fn test_unknown_email_login_costs_a_password_check() {
    let app = spawn_app().await;

    let mut security = app.state.config.security.clone();
    security.argon2_memory_cost_kib = 19_456;
    security.argon2_time_cost = 2;
    let auth = SeaOrmAuthService::new(app.state.store.clone(), &security, app.inbox.clone())
        .expect("failed to build auth service");

    auth.register(Registration {
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        password: Secret::new("pa55word1234"),
    })
    .await
    .unwrap();

    let wrong = Secret::new("not-the-password");
    let _ = auth
        .create_authentication_token("nobody@example.com", &wrong)
        .await;

    let mut known = Duration::MAX;
    let mut unknown = Duration::MAX;
    for _ in 0..3 {
        let start = Instant::now();
        let err = auth
            .create_authentication_token("alice@example.com", &wrong)
            .await
            .unwrap_err();
        known = known.min(start.elapsed());
        assert!(matches!(err, AuthError::InvalidCredentials));

        let start = Instant::now();
        let err = auth
            .create_authentication_token("nobody@example.com", &wrong)
            .await
            .unwrap_err();
        unknown = unknown.min(start.elapsed());
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    assert!(
        unknown * 3 >= known,
        "unknown email took {unknown:?}, known email {known:?}"
    );
}

#[tokio::test]
async fn test_bearer_token_rejections() {
    let app = spawn_app().await;

    let (status, body) = app.send("GET", "/v1/movies/1", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["error"],
        "you must be authenticated to access this resource"
    );

    for token in ["too-short", "AAAAAAAAAAAAAAAAAAAAAAAAAA"] {
        let (status, headers, body) = app
            .send_with_headers("GET", "/v1/movies/1", Some(token), &[], None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(body["error"], "invalid or missing authentication token");
    }

    let (status, headers, _) = app
        .send_with_headers(
            "GET",
            "/v1/movies/1",
            None,
            &[("authorization", "Token abc")],
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer");
}

#[tokio::test]
async fn test_inactive_account_is_forbidden() {
    let app = spawn_app().await;

    app.send(
        "POST",
        "/v1/users",
        None,
        Some(json!({"name": "Alice", "email": "alice@example.com", "password": "pa55word1234"})),
    )
    .await;
    let token = app.login("alice@example.com", "pa55word1234").await;

    let (status, body) = app.send("GET", "/v1/movies/1", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"],
        "your user account must be activated to access this resource"
    );
}

#[tokio::test]
async fn test_writes_require_movies_write() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("alice@example.com").await;

    let (status, _) = app.send("GET", "/v1/movies/1", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send("POST", "/v1/movies", Some(&token), Some(new_movie()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"],
        "your user account doesn't have the necessary permissions to access this resource"
    );
}

#[tokio::test]
async fn test_movie_lifecycle() {
    let app = spawn_app().await;
    let (user_id, token) = app.active_user("alice@example.com").await;
    app.state
        .store
        .permissions()
        .add_for_user(user_id, &[MOVIES_WRITE.to_string()])
        .await
        .unwrap();

    let (status, headers, body) = app
        .send_with_headers("POST", "/v1/movies", Some(&token), &[], Some(new_movie()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let movie = &body["data"]["movie"];
    let id = movie["id"].as_i64().unwrap();
    assert_eq!(movie["version"], 1);
    assert_eq!(movie["runtime"], "107 mins");
    assert_eq!(headers[header::LOCATION], format!("/v1/movies/{id}"));

    let uri = format!("/v1/movies/{id}");

    let (status, body) = app.send("GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["movie"]["title"], "Moana");

    let (status, _, body) = app
        .send_with_headers(
            "PATCH",
            &uri,
            Some(&token),
            &[("x-expected-version", "1")],
            Some(json!({"title": "Moana (Sing-Along)"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["movie"]["version"], 2);
    assert_eq!(body["data"]["movie"]["year"], 2016);
    assert_eq!(body["data"]["movie"]["title"], "Moana (Sing-Along)");

    let (status, _, body) = app
        .send_with_headers(
            "PATCH",
            &uri,
            Some(&token),
            &[("x-expected-version", "1")],
            Some(json!({"title": "Lost update"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["error"],
        "unable to update the record due to an edit conflict, please try again"
    );

    let (status, body) = app
        .send("PATCH", &uri, Some(&token), Some(json!({"year": 1500, "genres": []})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"]["year"], "must be greater than 1888");
    assert_eq!(body["fields"]["genres"], "must contain at least 1 genre");

    let (status, _) = app.send("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send("GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_movie_input_rejections() {
    let app = spawn_app().await;
    let (user_id, token) = app.active_user("alice@example.com").await;
    app.state
        .store
        .permissions()
        .add_for_user(user_id, &[MOVIES_WRITE.to_string()])
        .await
        .unwrap();

    let mut bad_runtime = new_movie();
    bad_runtime["runtime"] = json!(107);
    let (status, body) = app
        .send("POST", "/v1/movies", Some(&token), Some(bad_runtime))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid runtime format"));

    let (status, body) = app
        .send(
            "POST",
            "/v1/movies",
            Some(&token),
            Some(json!({"genres": ["drama", "drama"]})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"]["title"], "must be provided");
    assert_eq!(body["fields"]["year"], "must be provided");
    assert_eq!(body["fields"]["runtime"], "must be provided");
    assert_eq!(body["fields"]["genres"], "must not contain duplicate values");

    for uri in ["/v1/movies/0", "/v1/movies/-4", "/v1/movies/abc"] {
        let (status, _) = app.send("GET", uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = spawn_app().await;

    let (_, headers, _) = app
        .send_with_headers("GET", "/v1/healthcheck", None, &[], None)
        .await;

    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["referrer-policy"], "no-referrer");
    assert_eq!(headers["cache-control"], "no-store");
}

#[tokio::test]
async fn test_metrics_route_is_absent_without_exporter() {
    let app = spawn_app().await;

    let (status, headers, _) = app
        .send_with_headers("GET", "/metrics", None, &[], None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers["x-content-type-options"], "nosniff");
}

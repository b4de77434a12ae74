//! Router tests driving full requests through `oneshot`.

use std::{net::SocketAddr, sync::Arc, time::Duration as StdDuration};

use axum::{
    body::{Body, BodyDataStream},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Duration;
use futures::StreamExt;
use tempfile::TempDir;
use tower::ServiceExt;
use tripjournal::{
    config::AppConfig,
    db::{init_pool, run_migrations},
    error::SIGN_IN_REDIRECT,
    routes::create_router,
    services::{
        mailer::MemoryMailer,
        snapshots::{RefPath, SnapshotHub},
        storage::StorageService,
    },
    state::AppState,
};
use url::Url;

struct TestApp {
    router: Router,
    state: AppState,
    mailer: MemoryMailer,
    _root: TempDir,
}

async fn test_app() -> TestApp {
    let root = TempDir::new().expect("temp dir");
    let data_root = root.path().join("data");
    let config = AppConfig {
        database_url: format!(
            "sqlite://{}",
            root.path().join("http.sqlite").to_string_lossy()
        ),
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        data_root: data_root.clone(),
        cookie_secret: "http-test-cookie-secret".into(),
        public_base_url: Url::parse("http://trips.test/").expect("url"),
        session_ttl: Duration::hours(1),
        reset_token_ttl: Duration::minutes(30),
    };

    let db = init_pool(&config.database_url).await.expect("pool");
    run_migrations(&db).await.expect("migrations");
    let storage = StorageService::new(data_root, SnapshotHub::new());
    storage.ensure_structure().await.expect("storage");

    let mailer = MemoryMailer::new();
    let state = AppState::new(config, db, storage, Arc::new(mailer.clone()));
    TestApp {
        router: create_router(state.clone()),
        state,
        mailer,
        _root: root,
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router
        .clone()
        .oneshot(request)
        .await
        .expect("router response")
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request")
}

fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("location header")
}

fn session_cookie(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("trip_session="))
        .and_then(|value| value.split(';').next())
        .expect("session cookie")
        .to_string()
}

fn assert_sign_in_redirect(response: &Response) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response), SIGN_IN_REDIRECT);
}

async fn next_frame(stream: &mut BodyDataStream) -> String {
    let bytes = tokio::time::timeout(StdDuration::from_secs(5), stream.next())
        .await
        .expect("frame in time")
        .expect("stream still open")
        .expect("frame");
    String::from_utf8(bytes.to_vec()).expect("utf-8 frame")
}

async fn user_uuid(app: &TestApp, email: &str) -> String {
    sqlx::query_scalar::<_, String>("SELECT uuid FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(&app.state.db)
        .await
        .expect("user uuid")
}

async fn register(app: &TestApp, email: &str) -> String {
    let body = format!(
        "email={}&display_name=Asha&password=wander123&password_confirm=wander123",
        email.replace('@', "%40")
    );
    let response = send(app, post_form("/register", &body, None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/me");
    session_cookie(&response)
}

#[tokio::test]
async fn landing_page_renders() {
    let app = test_app().await;
    let response = send(&app, get("/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Welcome to Trip Journal"));
}

#[tokio::test]
async fn private_pages_require_a_session() {
    let app = test_app().await;
    for uri in [
        "/me",
        "/me/trips",
        "/me/trips/live",
        "/me/summaries",
        "/me/summaries/live",
        "/me/settings",
    ] {
        let response = send(&app, get(uri, None)).await;
        assert_sign_in_redirect(&response);
    }

    let login = send(&app, get(SIGN_IN_REDIRECT, None)).await;
    assert_eq!(login.status(), StatusCode::OK);
    assert!(body_text(login).await.contains("Please sign in to continue."));
}

#[tokio::test]
async fn bogus_session_cookie_is_ignored() {
    let app = test_app().await;
    let response = send(&app, get("/me", Some("trip_session=forged"))).await;
    assert_sign_in_redirect(&response);
}

#[tokio::test]
async fn register_then_add_and_search_trips() {
    let app = test_app().await;
    let cookie = register(&app, "asha@example.org").await;

    let dashboard = send(&app, get("/me", Some(&cookie))).await;
    assert_eq!(dashboard.status(), StatusCode::OK);
    assert!(body_text(dashboard).await.contains("Hello, Asha!"));

    for form in [
        "title=Trip+to+Goa&description=Beach&date=2025-06-20&location=Goa",
        "title=Mountains&description=Hiking&date=2025-01-01&location=Manali",
    ] {
        let response = send(&app, post_form("/me/trips/new", form, Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/me/trips?notice=trip-added");
    }

    let listed = send(&app, get("/me/trips?q=goa&sort=descending", Some(&cookie))).await;
    assert_eq!(listed.status(), StatusCode::OK);
    let html = body_text(listed).await;
    assert!(html.contains("Trip to Goa"));
    assert!(!html.contains("Mountains"));

    let year = send(&app, get("/me/years/2025", Some(&cookie))).await;
    assert_eq!(year.status(), StatusCode::OK);
    let html = body_text(year).await;
    assert!(html.contains("Number of Trips: 2"));
}

#[tokio::test]
async fn invalid_trip_is_rerendered_with_message() {
    let app = test_app().await;
    let cookie = register(&app, "asha@example.org").await;

    let response = send(
        &app,
        post_form(
            "/me/trips/new",
            "title=Goa&description=Beach&date=20-06-2025&location=",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("YYYY-MM-DD"));
}

#[tokio::test]
async fn unknown_trip_is_not_found() {
    let app = test_app().await;
    let cookie = register(&app, "asha@example.org").await;
    let response = send(&app, get("/me/trips/does-not-exist/edit", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn summaries_round_trip_through_forms() {
    let app = test_app().await;
    let cookie = register(&app, "asha@example.org").await;

    let saved = send(
        &app,
        post_form("/me/summaries/2025/edit", "text=Sunny+year", Some(&cookie)),
    )
    .await;
    assert_eq!(saved.status(), StatusCode::SEE_OTHER);

    let listed = send(&app, get("/me/summaries", Some(&cookie))).await;
    let html = body_text(listed).await;
    assert!(html.contains("Year: 2025"));
    assert!(html.contains("Sunny year"));

    let empty = send(
        &app,
        post_form("/me/summaries/2025/edit", "text=+++", Some(&cookie)),
    )
    .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let bad_year = send(&app, get("/me/summaries/25/edit", Some(&cookie))).await;
    assert_eq!(bad_year.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_password_rerenders_login() {
    let app = test_app().await;
    register(&app, "asha@example.org").await;

    let response = send(
        &app,
        post_form("/login", "email=asha%40example.org&password=nope-nope", None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("Login failed"));
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = test_app().await;
    let cookie = register(&app, "asha@example.org").await;

    let response = send(&app, post_form("/logout", "", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let after = send(&app, get("/me", Some(&cookie))).await;
    assert_sign_in_redirect(&after);
}

#[tokio::test]
async fn settings_sends_reset_link_and_deletes_account() {
    let app = test_app().await;
    let cookie = register(&app, "asha@example.org").await;

    let reset = send(
        &app,
        post_form("/me/settings/password-reset", "", Some(&cookie)),
    )
    .await;
    assert_eq!(reset.status(), StatusCode::SEE_OTHER);
    let link = app
        .mailer
        .last_link_for("asha@example.org")
        .expect("reset link");
    let path = link.trim_start_matches("http://trips.test");
    let form = send(&app, get(path, None)).await;
    assert_eq!(form.status(), StatusCode::OK);

    let unconfirmed = send(&app, post_form("/me/settings/delete", "", Some(&cookie))).await;
    assert_eq!(unconfirmed.status(), StatusCode::BAD_REQUEST);

    let deleted = send(
        &app,
        post_form("/me/settings/delete", "confirm=yes", Some(&cookie)),
    )
    .await;
    assert_eq!(deleted.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&deleted), "/?notice=account-deleted");

    let after = send(&app, get("/me", Some(&cookie))).await;
    assert_sign_in_redirect(&after);
}

#[tokio::test]
async fn live_trip_list_streams_selection_until_disconnect() {
    let app = test_app().await;
    let cookie = register(&app, "asha@example.org").await;
    let path = RefPath::trips(user_uuid(&app, "asha@example.org").await);

    for form in [
        "title=Trip+to+Goa&description=Beach&date=2025-06-20&location=Goa",
        "title=Mountains&description=Hiking&date=2025-01-01&location=Manali",
    ] {
        send(&app, post_form("/me/trips/new", form, Some(&cookie))).await;
    }

    let response = send(
        &app,
        get("/me/trips/live?q=goa&sort=descending", Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("text/event-stream")
    );
    let mut stream = response.into_body().into_data_stream();

    let first = next_frame(&mut stream).await;
    assert!(first.starts_with("event: trips\n"), "{first}");
    assert!(first.contains("Trip to Goa"), "{first}");
    assert!(!first.contains("Mountains"), "{first}");
    assert_eq!(app.state.storage.hub().listener_count(&path), 1);

    send(
        &app,
        post_form(
            "/me/trips/new",
            "title=Goa+again&description=Monsoon&date=2025-08-01&location=Goa",
            Some(&cookie),
        ),
    )
    .await;
    let second = next_frame(&mut stream).await;
    let newer = second.find("Goa again").expect("new trip streamed");
    let older = second.find("Trip to Goa").expect("old trip streamed");
    assert!(newer < older, "descending order expected: {second}");
    assert!(!second.contains("Mountains"), "{second}");

    drop(stream);
    assert_eq!(app.state.storage.hub().listener_count(&path), 0);
}

#[tokio::test]
async fn live_summaries_follow_saves_until_disconnect() {
    let app = test_app().await;
    let cookie = register(&app, "asha@example.org").await;
    let path = RefPath::summaries(user_uuid(&app, "asha@example.org").await);

    let response = send(&app, get("/me/summaries/live", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut stream = response.into_body().into_data_stream();

    let first = next_frame(&mut stream).await;
    assert!(first.starts_with("event: summaries\n"), "{first}");
    assert!(first.contains("data: []"), "{first}");
    assert_eq!(app.state.storage.hub().listener_count(&path), 1);

    send(
        &app,
        post_form("/me/summaries/2025/edit", "text=Sunny+year", Some(&cookie)),
    )
    .await;
    let second = next_frame(&mut stream).await;
    assert!(second.contains(r#""year":"2025""#), "{second}");
    assert!(second.contains("Sunny year"), "{second}");

    drop(stream);
    assert_eq!(app.state.storage.hub().listener_count(&path), 0);
}

#[tokio::test]
async fn deleting_the_account_ends_open_live_streams() {
    let app = test_app().await;
    let cookie = register(&app, "asha@example.org").await;

    let response = send(&app, get("/me/trips/live", Some(&cookie))).await;
    let mut stream = response.into_body().into_data_stream();
    next_frame(&mut stream).await;

    send(
        &app,
        post_form("/me/settings/delete", "confirm=yes", Some(&cookie)),
    )
    .await;
    let ended = tokio::time::timeout(StdDuration::from_secs(5), stream.next())
        .await
        .expect("stream ends in time");
    assert!(ended.is_none());
}

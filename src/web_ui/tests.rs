use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use serde_json::{json, Value};
use warp::http::StatusCode;
use crate::auth::AuthService;
use crate::bot_status::BotStatus;
use crate::config::{AdminCredential, Config, Environment};
use crate::discord::fake::FakePlatform;
use crate::discord::gateway::ChannelKind;
use crate::discord::AnnouncementDispatcher;
use crate::logging::LogLevel;
use crate::storage::models::NewAnnouncement;
use crate::storage::StorageClient;
use super::throttle::RequestThrottle;
use super::{routes, ApiState, WebUIConfig};

const PASSWORD: &str = "correct horse";

struct Harness {
    _dir: tempfile::TempDir,
    state: ApiState,
    platform: Arc<FakePlatform>,
    throttle: RequestThrottle,
    token: String,
}

impl Harness {
    async fn new(platform: FakePlatform) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            discord_token: None,
            host: "127.0.0.1".to_string(),
            port: 0,
            admin_credential: AdminCredential::Plain(PASSWORD.to_string()),
            jwt_secret: Some("test-secret".to_string()),
            environment: Environment::Development,
            guild_id: None,
            cors_origin: None,
            static_dir: dir.path().join("public"),
            data_file: dir.path().join("botData.json"),
            log_level: LogLevel::INFO,
            keep_alive_host: None,
        };
        let storage = Arc::new(StorageClient::open(&config.data_file).await.unwrap());
        let platform = Arc::new(platform);
        let auth = Arc::new(AuthService::from_config(&config).unwrap());
        let dispatcher = Arc::new(AnnouncementDispatcher::new(platform.clone(), storage.clone()));

        let state = ApiState {
            config: Arc::new(config),
            storage,
            platform: platform.clone(),
            dispatcher,
            auth,
            bot_status: BotStatus::new(),
        };
        let token = state.auth.login(PASSWORD).unwrap();
        Harness {
            _dir: dir,
            state,
            platform,
            throttle: RequestThrottle::new(1000, Duration::from_secs(60)),
            token,
        }
    }

    fn web_config(&self) -> WebUIConfig {
        WebUIConfig {
            static_dir: self.state.config.static_dir.clone(),
            ..WebUIConfig::default()
        }
    }

    async fn call(&self, request: warp::test::RequestBuilder) -> (StatusCode, Value) {
        let filter = routes(self.state.clone(), &self.web_config(), self.throttle.clone());
        let response = request.reply(&filter).await;
        let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
        (response.status(), body)
    }

    fn authed(&self, method: &str, path: &str) -> warp::test::RequestBuilder {
        warp::test::request()
            .method(method)
            .path(path)
            .header("authorization", format!("Bearer {}", self.token))
    }
}

fn online_with_channels() -> FakePlatform {
    FakePlatform::online()
        .with_channel("100", "announcements", ChannelKind::Text, true)
        .with_channel("200", "voice-lounge", ChannelKind::Other, true)
}

#[tokio::test]
async fn health_is_public() {
    let harness = Harness::new(FakePlatform::default()).await;
    let (status, body) = harness.call(warp::test::request().path("/api/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["bot_online"], false);
    assert_eq!(body["bot_user"], "Connecting");
    assert_eq!(body["announcements_sent"], 0);
    assert_eq!(body["environment"], "development");
}

#[tokio::test]
async fn root_reports_version() {
    let harness = Harness::new(FakePlatform::online()).await;
    let (status, body) = harness.call(warp::test::request().path("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
    assert_eq!(body["bot"], "Announcer#0001");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn login_outcomes() {
    let harness = Harness::new(FakePlatform::default()).await;

    let (status, _) = harness
        .call(warp::test::request().method("POST").path("/api/login").json(&json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = harness
        .call(
            warp::test::request()
                .method("POST")
                .path("/api/login")
                .json(&json!({ "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, body) = harness
        .call(
            warp::test::request()
                .method("POST")
                .path("/api/login")
                .json(&json!({ "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let token = body["token"].as_str().unwrap();
    assert_eq!(token.split('.').count(), 3);
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let harness = Harness::new(FakePlatform::default()).await;

    let (status, body) = harness.call(warp::test::request().path("/api/templates")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Access token required");

    let (status, _) = harness
        .call(
            warp::test::request()
                .path("/api/templates")
                .header("authorization", "Bearer not.a.token"),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = harness.call(harness.authed("GET", "/api/verify")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"]["admin"], true);
}

#[tokio::test]
async fn template_lifecycle() {
    let harness = Harness::new(FakePlatform::default()).await;

    let (status, body) = harness
        .call(harness.authed("POST", "/api/template").json(&json!({ "name": "Welcome", "content": "Hi all" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["template"]["category"], "General");
    let id = body["template"]["id"].as_i64().unwrap();

    let (status, _) = harness
        .call(harness.authed("POST", "/api/template").json(&json!({ "name": "welcome", "content": "again" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = harness
        .call(harness.authed("POST", "/api/template").json(&json!({ "name": "  ", "content": "x" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name and content are required");

    let (status, body) = harness
        .call(
            harness
                .authed("PUT", &format!("/api/template/{}", id))
                .json(&json!({ "name": "Welcome", "content": "Hello everyone", "category": "Events" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["template"]["content"], "Hello everyone");
    assert!(body["template"]["updatedAt"].is_string());

    let (status, body) = harness.call(harness.authed("GET", "/api/templates")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, _) = harness.call(harness.authed("DELETE", &format!("/api/template/{}", id))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = harness.call(harness.authed("DELETE", &format!("/api/template/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = harness
        .call(harness.authed("PUT", "/api/template/12345").json(&json!({ "name": "a", "content": "b" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn announcements_are_paginated() {
    let harness = Harness::new(FakePlatform::default()).await;
    for n in 1..=50 {
        harness
            .state
            .storage
            .record_announcement(NewAnnouncement {
                channel_id: "100".into(),
                channel_name: "announcements".into(),
                guild_name: "Test Guild".into(),
                content: format!("announcement {}", n),
                author_id: None,
                author_tag: "Web Panel".into(),
            })
            .await;
    }

    let (status, body) = harness.call(harness.authed("GET", "/api/announcements?page=2&limit=20")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["announcements"].as_array().map(Vec::len), Some(20));
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["pagination"]["total"], 50);
    assert_eq!(body["pagination"]["totalPages"], 3);

    let (_, body) = harness.call(harness.authed("GET", "/api/announcements?page=abc")).await;
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 20);
}

#[tokio::test]
async fn announcement_validation_and_dispatch() {
    let harness = Harness::new(online_with_channels()).await;

    let (status, _) = harness
        .call(harness.authed("POST", "/api/announcement").json(&json!({ "channelId": "100" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let long = "a".repeat(2001);
    let (status, _) = harness
        .call(harness.authed("POST", "/api/announcement").json(&json!({ "channelId": "100", "content": long })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = harness
        .call(harness.authed("POST", "/api/announcement").json(&json!({ "channelId": "999", "content": "hi" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = harness
        .call(harness.authed("POST", "/api/announcement").json(&json!({ "channelId": "200", "content": "hi" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let exact = "b".repeat(2000);
    let (status, body) = harness
        .call(harness.authed("POST", "/api/announcement").json(&json!({ "channelId": "100", "content": exact })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(harness.platform.sent_count(), 1);
    assert_eq!(harness.state.storage.stats().await.total_announcements, 1);
}

#[tokio::test]
async fn offline_bot_returns_service_unavailable() {
    let harness = Harness::new(online_with_channels()).await;
    harness.platform.ready.store(false, Ordering::SeqCst);

    let (status, _) = harness
        .call(harness.authed("POST", "/api/announcement").json(&json!({ "channelId": "100", "content": "hi" })))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = harness.call(harness.authed("POST", "/api/refresh-channels")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = harness.call(harness.authed("GET", "/api/roles")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn refresh_populates_the_channel_list() {
    let harness = Harness::new(online_with_channels()).await;

    let (status, body) = harness.call(harness.authed("POST", "/api/refresh-channels")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channels"], 1);

    let (_, body) = harness.call(harness.authed("GET", "/api/channels")).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["channelsGrouped"]["Test Guild"][0]["name"], "announcements");
}

#[tokio::test]
async fn guild_management_routes() {
    let harness = Harness::new(FakePlatform::online()).await;

    let (_, body) = harness.call(harness.authed("GET", "/api/roles")).await;
    assert_eq!(body["roles"][0]["name"], "Moderator");

    let (_, body) = harness.call(harness.authed("GET", "/api/categories")).await;
    assert_eq!(body["categories"][0]["name"], "Info");

    let (status, _) = harness
        .call(harness.authed("POST", "/api/create-channel").json(&json!({ "type": "voice" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = harness
        .call(
            harness
                .authed("POST", "/api/create-channel")
                .json(&json!({ "name": "events", "categoryId": "20", "type": "voice" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channelId"], "901");
    let created = harness.platform.created.lock();
    assert!(created[0].voice);
    assert_eq!(created[0].category_id.as_deref(), Some("20"));
}

#[tokio::test]
async fn stats_include_counts() {
    let harness = Harness::new(FakePlatform::online()).await;
    let (status, body) = harness.call(harness.authed("GET", "/api/stats")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalAnnouncements"], 0);
    assert_eq!(body["templates"], 0);
    assert_eq!(body["botOnline"], true);
}

#[tokio::test]
async fn throttle_applies_to_every_route() {
    let mut harness = Harness::new(FakePlatform::default()).await;
    harness.throttle = RequestThrottle::new(2, Duration::from_secs(60));

    for _ in 0..2 {
        let (status, _) = harness.call(warp::test::request().path("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = harness.call(warp::test::request().path("/api/health")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["retry_after_seconds"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn unknown_routes_are_json_404() {
    let harness = Harness::new(FakePlatform::default()).await;
    let (status, body) = harness.call(warp::test::request().path("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

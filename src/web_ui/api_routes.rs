use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use chrono::Utc;
use log::{info, warn};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use warp::{Filter, Rejection, Reply};
use crate::auth::{AuthService, Claims};
use crate::bot_status::BotStatus;
use crate::config::Config;
use crate::discord::channel_sync::sync_channels;
use crate::discord::gateway::NewChannel;
use crate::discord::{AnnouncementDispatcher, Author, ChatPlatform};
use crate::storage::{Channel, StorageClient, TemplateDraft, DEFAULT_PAGE_SIZE};
use crate::web_ui::errors::ApiError;

pub const MAX_ANNOUNCEMENT_CHARS: usize = 2000;
const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Everything a request handler may touch.
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub storage: Arc<StorageClient>,
    pub platform: Arc<dyn ChatPlatform>,
    pub dispatcher: Arc<AnnouncementDispatcher>,
    pub auth: Arc<AuthService>,
    pub bot_status: Arc<RwLock<BotStatus>>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnouncementRequest {
    channel_id: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateChannelRequest {
    name: Option<String>,
    category_id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

pub fn api_routes(
    state: ApiState,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    public_routes(state.clone())
        .or(channel_routes(state.clone()))
        .or(announcement_routes(state.clone()))
        .or(template_routes(state.clone()))
        .or(guild_routes(state))
}

pub fn with_state(
    state: ApiState,
) -> impl Filter<Extract = (ApiState,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Extracts the verified session claims or rejects with 401/403.
pub fn with_auth(
    auth: Arc<AuthService>,
) -> impl Filter<Extract = (Claims,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let auth = auth.clone();
        async move {
            let token = header
                .as_deref()
                .and_then(bearer_token)
                .ok_or_else(|| ApiError::Unauthorized("Access token required".to_string()).reject())?;
            auth.verify(token).map_err(|e| ApiError::from(e).reject())
        }
    })
}

fn authorized(state: ApiState) -> impl Filter<Extract = (ApiState,), Error = warp::Rejection> + Clone {
    with_auth(state.auth.clone()).map(move |_claims: Claims| state.clone())
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn public_routes(
    state: ApiState,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let root = warp::path::end()
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_root);

    let health = warp::path!("api" / "health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_health);

    let login = warp::path!("api" / "login")
        .and(warp::post())
        .and(json_body::<LoginRequest>())
        .and(with_state(state.clone()))
        .and_then(handle_login);

    let verify = warp::path!("api" / "verify")
        .and(warp::get())
        .and(with_auth(state.auth.clone()))
        .and_then(handle_verify);

    let stats = warp::path!("api" / "stats")
        .and(warp::get())
        .and(authorized(state))
        .and_then(handle_stats);

    root.or(health).or(login).or(verify).or(stats)
}

fn channel_routes(
    state: ApiState,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let list = warp::path!("api" / "channels")
        .and(warp::get())
        .and(authorized(state.clone()))
        .and_then(handle_get_channels);

    let refresh = warp::path!("api" / "refresh-channels")
        .and(warp::post())
        .and(authorized(state))
        .and_then(handle_refresh_channels);

    list.or(refresh)
}

fn announcement_routes(
    state: ApiState,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let list = warp::path!("api" / "announcements")
        .and(warp::get())
        .and(authorized(state.clone()))
        .and(warp::query::<HashMap<String, String>>())
        .and_then(handle_get_announcements);

    let send = warp::path!("api" / "announcement")
        .and(warp::post())
        .and(authorized(state))
        .and(json_body::<AnnouncementRequest>())
        .and_then(handle_send_announcement);

    list.or(send)
}

fn template_routes(
    state: ApiState,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let list = warp::path!("api" / "templates")
        .and(warp::get())
        .and(authorized(state.clone()))
        .and_then(handle_get_templates);

    let create = warp::path!("api" / "template")
        .and(warp::post())
        .and(authorized(state.clone()))
        .and(json_body::<TemplateDraft>())
        .and_then(handle_create_template);

    let update = warp::path!("api" / "template" / i64)
        .and(warp::put())
        .and(authorized(state.clone()))
        .and(json_body::<TemplateDraft>())
        .and_then(handle_update_template);

    let delete = warp::path!("api" / "template" / i64)
        .and(warp::delete())
        .and(authorized(state))
        .and_then(handle_delete_template);

    list.or(create).or(update).or(delete)
}

fn guild_routes(
    state: ApiState,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let roles = warp::path!("api" / "roles")
        .and(warp::get())
        .and(authorized(state.clone()))
        .and_then(handle_get_roles);

    let categories = warp::path!("api" / "categories")
        .and(warp::get())
        .and(authorized(state.clone()))
        .and_then(handle_get_categories);

    let create_channel = warp::path!("api" / "create-channel")
        .and(warp::post())
        .and(authorized(state))
        .and(json_body::<CreateChannelRequest>())
        .and_then(handle_create_channel);

    roles.or(categories).or(create_channel)
}

async fn handle_root(state: ApiState) -> Result<impl Reply, Rejection> {
    let uptime = state.bot_status.read().uptime_secs();
    Ok(warp::reply::json(&json!({
        "status": "online",
        "bot": state.platform.bot_tag().unwrap_or_else(|| "connecting...".to_string()),
        "botOnline": state.platform.is_ready(),
        "uptime": uptime,
        "guilds": state.platform.guild_count(),
        "channels": state.storage.channel_count().await,
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

async fn handle_health(state: ApiState) -> Result<impl Reply, Rejection> {
    let uptime = state.bot_status.read().uptime_secs();
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "bot_online": state.platform.is_ready(),
        "bot_user": state.platform.bot_tag().unwrap_or_else(|| "Connecting".to_string()),
        "guilds": state.platform.guild_count(),
        "channels": state.storage.channel_count().await,
        "announcements_sent": state.storage.stats().await.total_announcements,
        "uptime": uptime,
        "environment": state.config.environment.to_string(),
    })))
}

async fn handle_login(request: LoginRequest, state: ApiState) -> Result<impl Reply, Rejection> {
    let password = request
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Password is required".to_string()).reject())?;

    match state.auth.login(&password) {
        Ok(token) => {
            info!("🔑 Login successful");
            Ok(warp::reply::json(&json!({
                "success": true,
                "token": token,
                "message": "Login successful!",
            })))
        }
        Err(e) => {
            warn!("🔒 Failed login attempt");
            Err(ApiError::from(e).reject())
        }
    }
}

async fn handle_verify(claims: Claims) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&json!({
        "authenticated": true,
        "user": claims,
    })))
}

async fn handle_stats(state: ApiState) -> Result<impl Reply, Rejection> {
    let (uptime, connected_since) = {
        let status = state.bot_status.read();
        (status.uptime_secs(), status.connected_since())
    };
    let stats = state.storage.stats().await;
    Ok(warp::reply::json(&json!({
        "totalAnnouncements": stats.total_announcements,
        "lastActivity": stats.last_activity,
        "botOnline": state.platform.is_ready(),
        "connectedSince": connected_since,
        "guilds": state.platform.guild_count(),
        "channels": state.storage.channel_count().await,
        "templates": state.storage.template_count().await,
        "botUser": state.platform.bot_tag().unwrap_or_else(|| "Offline".to_string()),
        "uptime": uptime,
    })))
}

async fn handle_get_channels(state: ApiState) -> Result<impl Reply, Rejection> {
    let channels = state.storage.channels().await;
    let mut grouped: BTreeMap<String, Vec<Channel>> = BTreeMap::new();
    for channel in &channels {
        grouped.entry(channel.guild.clone()).or_default().push(channel.clone());
    }

    Ok(warp::reply::json(&json!({
        "total": channels.len(),
        "channels": channels,
        "channelsGrouped": grouped,
        "lastUpdate": Utc::now(),
    })))
}

async fn handle_refresh_channels(state: ApiState) -> Result<impl Reply, Rejection> {
    if !state.platform.is_ready() {
        return Err(ApiError::Unavailable("Discord bot is not connected".to_string()).reject());
    }
    let count = sync_channels(state.platform.as_ref(), &state.storage).await;
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Channels refreshed successfully!",
        "channels": count,
    })))
}

async fn handle_get_announcements(
    state: ApiState,
    query: HashMap<String, String>,
) -> Result<impl Reply, Rejection> {
    let page = positive_param(&query, "page").unwrap_or(1);
    let limit = positive_param(&query, "limit").unwrap_or(DEFAULT_PAGE_SIZE);
    Ok(warp::reply::json(&state.storage.announcements_page(page, limit).await))
}

fn positive_param(query: &HashMap<String, String>, key: &str) -> Option<usize> {
    query
        .get(key)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
}

async fn handle_send_announcement(
    state: ApiState,
    request: AnnouncementRequest,
) -> Result<impl Reply, Rejection> {
    let channel_id = request.channel_id.filter(|c| !c.trim().is_empty());
    let content = request.content.filter(|c| !c.trim().is_empty());
    let (Some(channel_id), Some(content)) = (channel_id, content) else {
        return Err(ApiError::BadRequest("Channel and content are required".to_string()).reject());
    };

    if content.chars().count() > MAX_ANNOUNCEMENT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Message too long (maximum {} characters)",
            MAX_ANNOUNCEMENT_CHARS
        ))
        .reject());
    }

    if !state.platform.is_ready() {
        return Err(ApiError::Unavailable("Discord bot is not connected".to_string()).reject());
    }

    let announcement = state
        .dispatcher
        .send_announcement(&channel_id, &content, &Author::web_panel())
        .await
        .map_err(|e| ApiError::from(e).reject())?;

    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Announcement sent successfully!",
        "announcement": announcement,
    })))
}

async fn handle_get_templates(state: ApiState) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&state.storage.templates().await))
}

async fn handle_create_template(state: ApiState, draft: TemplateDraft) -> Result<impl Reply, Rejection> {
    let valid = draft
        .validate()
        .ok_or_else(|| ApiError::BadRequest("Name and content are required".to_string()).reject())?;

    let template = state
        .storage
        .create_template(valid)
        .await
        .map_err(|e| ApiError::from(e).reject())?;

    info!("Template '{}' created", template.name);
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Template saved successfully!",
        "template": template,
    })))
}

async fn handle_update_template(
    id: i64,
    state: ApiState,
    draft: TemplateDraft,
) -> Result<impl Reply, Rejection> {
    let valid = draft
        .validate()
        .ok_or_else(|| ApiError::BadRequest("Name and content are required".to_string()).reject())?;

    let template = state
        .storage
        .update_template(id, valid)
        .await
        .map_err(|e| ApiError::from(e).reject())?;

    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Template updated successfully!",
        "template": template,
    })))
}

async fn handle_delete_template(id: i64, state: ApiState) -> Result<impl Reply, Rejection> {
    let removed = state
        .storage
        .delete_template(id)
        .await
        .map_err(|e| ApiError::from(e).reject())?;

    info!("Template '{}' deleted", removed.name);
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Template removed successfully!",
    })))
}

async fn handle_get_roles(state: ApiState) -> Result<impl Reply, Rejection> {
    let roles = state.platform.roles().map_err(|e| ApiError::from(e).reject())?;
    Ok(warp::reply::json(&json!({ "success": true, "roles": roles })))
}

async fn handle_get_categories(state: ApiState) -> Result<impl Reply, Rejection> {
    let categories = state.platform.categories().map_err(|e| ApiError::from(e).reject())?;
    Ok(warp::reply::json(&json!({ "success": true, "categories": categories })))
}

async fn handle_create_channel(
    state: ApiState,
    request: CreateChannelRequest,
) -> Result<impl Reply, Rejection> {
    let name = request
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Channel name is required".to_string()).reject())?;

    let channel_id = state
        .platform
        .create_channel(NewChannel {
            name,
            category_id: request.category_id.filter(|c| !c.is_empty()),
            voice: request.kind.as_deref() == Some("voice"),
        })
        .await
        .map_err(|e| ApiError::from(e).reject())?;

    info!("Channel {} created from the panel", channel_id);
    Ok(warp::reply::json(&json!({ "success": true, "channelId": channel_id })))
}

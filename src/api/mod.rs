//! REST API 服务
//!
//! 远程控制入口：任务下发、单动作执行、设备与 UI 查询，
//! 以及确认/接管/取消的控制通道。安全措施与默认值：
//! 仅回环绑定、可选 x-api-key 鉴权、按客户端限流、动作白名单。

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::agent::{AgentSession, PhoneAgent};
use crate::config::ApiConfig;
use crate::device::command::CommandRunner;
use crate::device::state::check_device_state;
use crate::device::ui_tree::get_ui_tree;
use crate::directive::types::{CallKind, Directive, RawDirective};
use crate::directive::{sanitize, validate};
use crate::error::AppError;
use crate::executor::ActionExecutor;

const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// 滑动窗口限流器（按客户端地址）
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    store: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            store: Mutex::new(HashMap::new()),
        }
    }

    /// 记录一次请求，超限返回 false
    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut store = self.store.lock().await;
        // 顺带丢弃所有已过期的客户端记录，表不随历史客户端无限增长
        store.retain(|_, entries| {
            entries.retain(|t| now.duration_since(*t) < self.window);
            !entries.is_empty()
        });
        let entries = store.entry(key.to_string()).or_default();
        if entries.len() >= self.limit {
            return false;
        }
        entries.push(now);
        true
    }
}

/// API 共享状态
pub struct ApiState {
    pub agent: Arc<PhoneAgent>,
    pub executor: Arc<dyn ActionExecutor>,
    pub runner: Arc<dyn CommandRunner>,
    pub config: ApiConfig,
    pub rate_limiter: RateLimiter,
}

/// 统一的错误响应
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        Self {
            status: StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    version: &'static str,
    device_connected: bool,
    device_ready: bool,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct TaskRequest {
    task: String,
}

#[derive(Debug, Serialize)]
struct TaskAccepted {
    accepted: bool,
    session_id: uuid::Uuid,
}

#[derive(Debug, Deserialize)]
struct ConfirmRequest {
    approved: bool,
}

/// 单动作执行请求：与模型指令相同的字段结构
#[derive(Debug, Deserialize)]
struct ActionExecuteRequest {
    action: String,
    #[serde(flatten)]
    fields: serde_json::Map<String, Value>,
}

pub fn build_router(state: Arc<ApiState>) -> Router {
    let cors = build_cors(&state.config);

    Router::new()
        .route("/", get(get_status))
        .route("/device", get(get_device))
        .route("/ui/tree", get(get_ui_elements))
        .route("/task", get(get_task).post(post_task))
        .route("/task/confirm", post(post_confirm))
        .route("/task/takeover/complete", post(post_takeover_complete))
        .route("/task/cancel", post(post_cancel))
        .route("/action", post(post_action))
        .route("/actions/allowed", get(get_allowed_actions))
        .layer(cors)
        .with_state(state)
}

fn build_cors(config: &ApiConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderName::from_static("x-api-key"),
        ])
}

/// 启动 API 服务器
pub async fn serve(state: Arc<ApiState>) -> Result<(), AppError> {
    state.config.validate_host()?;
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🌐 API 服务启动: http://{}", addr);

    let app = build_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(AppError::IoError)
}

/// 校验 x-api-key（未配置密钥时放行）
fn check_auth(state: &ApiState, headers: &HeaderMap) -> Result<(), ApiError> {
    if let Some(expected) = &state.config.api_key {
        let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            warn!("🔒 API 密钥校验失败");
            return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid API key"));
        }
    }
    Ok(())
}

async fn check_rate(state: &ApiState, addr: &SocketAddr) -> Result<(), ApiError> {
    if !state.rate_limiter.check(&addr.ip().to_string()).await {
        return Err(ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            format!("Rate limit exceeded ({}/min)", state.config.rate_limit),
        ));
    }
    Ok(())
}

/// GET / — 服务与设备概况（无需鉴权）
async fn get_status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    let device = check_device_state(state.runner.as_ref()).await;
    Json(StatusResponse {
        status: "ok",
        version: API_VERSION,
        device_connected: device.is_connected,
        device_ready: device.is_ready(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /device — 详细设备状态
async fn get_device(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    check_auth(&state, &headers)?;
    let device = check_device_state(state.runner.as_ref()).await;
    Ok(Json(serde_json::json!({
        "connected": device.is_connected,
        "ready": device.is_ready(),
        "screen": device.screen_state,
        "lock": device.lock_state,
        "battery": device.battery_level,
        "current_app": device.current_app,
        "issues": device.get_issues(),
    })))
}

/// GET /ui/tree — 当前可点击元素
async fn get_ui_elements(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    check_auth(&state, &headers)?;
    let tree = get_ui_tree(state.runner.as_ref()).await?;

    let elements: Vec<Value> = tree
        .get_clickable_elements()
        .into_iter()
        .take(50)
        .map(|el| {
            serde_json::json!({
                "text": el.display_text(),
                "resource_id": el.resource_id,
                "class_name": el.class_name,
                "bounds": el.bounds,
                "center": el.center(),
                "clickable": el.clickable,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "total_elements": elements.len(),
        "elements": elements,
    })))
}

/// GET /task — 当前会话快照
async fn get_task(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<AgentSession>, ApiError> {
    check_auth(&state, &headers)?;
    Ok(Json(state.agent.session().await))
}

/// POST /task — 启动任务（后台执行，轮询 GET /task 获取进度）
async fn post_task(
    State(state): State<Arc<ApiState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<TaskRequest>,
) -> Result<Json<TaskAccepted>, ApiError> {
    check_auth(&state, &headers)?;
    check_rate(&state, &addr).await?;

    if request.task.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "task 不能为空"));
    }

    // 同步启动：忙碌与设备问题在接受前直接返回给调用方
    state.agent.start(&request.task).await.map_err(|e| match e {
        AppError::Unknown(_) => ApiError::new(StatusCode::CONFLICT, e.to_string()),
        other => ApiError::from(other),
    })?;
    let session_id = state.agent.session().await.id;

    let agent = state.agent.clone();
    tokio::spawn(async move {
        if let Err(e) = agent.drive().await {
            error!("❌ 任务失败: {}", e);
        }
    });

    Ok(Json(TaskAccepted {
        accepted: true,
        session_id,
    }))
}

/// POST /task/confirm — 回应敏感操作确认
async fn post_confirm(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<Value>, ApiError> {
    check_auth(&state, &headers)?;
    state.agent.confirm(request.approved).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /task/takeover/complete — 人工操作完成
async fn post_takeover_complete(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    check_auth(&state, &headers)?;
    state.agent.complete_takeover().await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /task/cancel — 请求取消（步骤间生效）
async fn post_cancel(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    check_auth(&state, &headers)?;
    state.agent.cancel();
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /action — 直接执行单个动作（经白名单与完整校验）
async fn post_action(
    State(state): State<Arc<ApiState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<ActionExecuteRequest>,
) -> Result<Json<Value>, ApiError> {
    check_auth(&state, &headers)?;
    check_rate(&state, &addr).await?;

    let directive = to_directive(&request)?;

    if let Some(action) = directive.action() {
        if !state.config.allowed_actions.contains(&action) {
            return Err(ApiError::new(
                StatusCode::FORBIDDEN,
                format!("Action '{}' not allowed", action),
            ));
        }
    }

    let result = state.executor.execute(&directive).await?;
    Ok(Json(serde_json::json!({
        "success": result.success,
        "result": result.message,
        "duration_ms": result.duration_ms,
    })))
}

/// GET /actions/allowed — 动作白名单
async fn get_allowed_actions(State(state): State<Arc<ApiState>>) -> Json<Value> {
    let actions: Vec<&str> = state
        .config
        .allowed_actions
        .iter()
        .map(|a| a.as_str())
        .collect();
    Json(serde_json::json!({ "actions": actions }))
}

/// 请求体 → 走与模型输出相同的 sanitize/validate 管线
fn to_directive(request: &ActionExecuteRequest) -> Result<Directive, ApiError> {
    let mut raw = RawDirective::new(CallKind::Do);
    raw.args
        .insert("action".to_string(), Value::String(request.action.clone()));
    for (key, value) in &request.fields {
        raw.args.insert(key.clone(), value.clone());
    }

    let fixed = sanitize(&raw);
    let result = validate(&fixed);
    if !result.is_valid {
        return Err(AppError::ValidationError(result.summary()).into());
    }
    Ok(Directive::from_raw(&fixed)?)
}

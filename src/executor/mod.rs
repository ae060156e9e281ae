//! 动作执行器
//!
//! 把校验过的结构化指令翻译成 ADB input 命令下发到设备。
//! 坐标按 0-999 网格换算到设备实际分辨率，分辨率信息首次使用时
//! 探测并缓存。同一执行器上的下发串行化，避免手势互相踩踏。

pub mod retry;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::apps;
use crate::device::command::CommandRunner;
use crate::directive::types::{ActionKind, Coordinate, Directive};
use crate::directive::validate::parse_duration_secs;
use crate::error::AppError;

/// 单次动作的执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    pub duration_ms: u64,
    /// 该动作要求暂停自动化、交给人工处理
    pub needs_takeover: bool,
}

impl ActionResult {
    pub fn success(message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: true,
            message: message.into(),
            duration_ms,
            needs_takeover: false,
        }
    }

    pub fn takeover(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            duration_ms: 0,
            needs_takeover: true,
        }
    }
}

/// 动作执行接口
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, directive: &Directive) -> Result<ActionResult, AppError>;
}

/// 基于 ADB input 的默认执行器
pub struct AdbExecutor {
    runner: Arc<dyn CommandRunner>,
    /// 缓存的 (宽, 高)，首次使用时探测
    resolution: RwLock<Option<(i32, i32)>>,
    /// 同一设备上的手势串行下发
    dispatch_lock: Mutex<()>,
}

/// 坐标网格的分辨率换算基数
const GRID_SCALE: i32 = 1000;

impl AdbExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            resolution: RwLock::new(None),
            dispatch_lock: Mutex::new(()),
        }
    }

    /// 取屏幕分辨率，优先用缓存
    async fn screen_resolution(&self) -> Result<(i32, i32), AppError> {
        if let Some(res) = *self.resolution.read().await {
            return Ok(res);
        }
        let output = self.runner.shell("wm size").await?;
        let res = parse_wm_size(&output).ok_or_else(|| {
            AppError::DeviceUnavailable(format!("无法解析屏幕分辨率: {}", output.trim()))
        })?;
        info!("📐 屏幕分辨率: {}x{}", res.0, res.1);
        *self.resolution.write().await = Some(res);
        Ok(res)
    }

    /// 0-999 网格坐标换算为像素
    async fn to_pixels(&self, c: Coordinate) -> Result<(i32, i32), AppError> {
        let (width, height) = self.screen_resolution().await?;
        Ok((c.x * width / GRID_SCALE, c.y * height / GRID_SCALE))
    }

    async fn tap(&self, c: Coordinate) -> Result<(), AppError> {
        let (x, y) = self.to_pixels(c).await?;
        debug!("👆 tap ({},{}) -> 像素 ({},{})", c.x, c.y, x, y);
        self.runner.shell(&format!("input tap {} {}", x, y)).await?;
        Ok(())
    }

    async fn dispatch(&self, directive: &Directive) -> Result<String, AppError> {
        let Directive::Execute {
            action,
            element,
            start,
            end,
            text,
            app,
            message,
            duration,
            instruction,
        } = directive
        else {
            return Err(AppError::ValidationError(
                "finish 指令不应进入执行器".to_string(),
            ));
        };

        match action {
            ActionKind::Launch => {
                let name = app.as_deref().unwrap_or_default();
                let package = apps::get_package_name(name).ok_or_else(|| {
                    AppError::ActionDispatchFailure(format!("未知应用: {}", name))
                })?;
                self.runner
                    .shell(&format!(
                        "monkey -p {} -c android.intent.category.LAUNCHER 1",
                        package
                    ))
                    .await?;
                Ok(format!("启动应用 {} ({})", name, package))
            }
            ActionKind::Tap => {
                let c = require(element, "element")?;
                self.tap(c).await?;
                Ok(format!("点击 ({},{})", c.x, c.y))
            }
            ActionKind::DoubleTap => {
                let c = require(element, "element")?;
                self.tap(c).await?;
                tokio::time::sleep(Duration::from_millis(100)).await;
                self.tap(c).await?;
                Ok(format!("双击 ({},{})", c.x, c.y))
            }
            ActionKind::LongPress => {
                let c = require(element, "element")?;
                let (x, y) = self.to_pixels(c).await?;
                self.runner
                    .shell(&format!("input swipe {} {} {} {} 1000", x, y, x, y))
                    .await?;
                Ok(format!("长按 ({},{})", c.x, c.y))
            }
            ActionKind::Swipe => {
                let s = require(start, "start")?;
                let e = require(end, "end")?;
                let (x1, y1) = self.to_pixels(s).await?;
                let (x2, y2) = self.to_pixels(e).await?;
                self.runner
                    .shell(&format!("input swipe {} {} {} {} 300", x1, y1, x2, y2))
                    .await?;
                Ok(format!("滑动 ({},{})->({},{})", s.x, s.y, e.x, e.y))
            }
            ActionKind::Back => {
                self.runner.shell("input keyevent KEYCODE_BACK").await?;
                Ok("返回".to_string())
            }
            ActionKind::Home => {
                self.runner.shell("input keyevent KEYCODE_HOME").await?;
                Ok("回到桌面".to_string())
            }
            ActionKind::Type | ActionKind::TypeName => {
                let t = text.as_deref().unwrap_or_default();
                self.runner
                    .shell(&format!("input text {}", escape_input_text(t)))
                    .await?;
                Ok(format!("输入文本 \"{}\"", t))
            }
            ActionKind::Wait => {
                let raw = duration.as_deref().unwrap_or("1");
                let secs = parse_duration_secs(raw).unwrap_or(1.0).max(0.0);
                tokio::time::sleep(Duration::from_secs_f64(secs)).await;
                Ok(format!("等待 {}s", secs))
            }
            // 以下动作不下发设备命令，只记录语义
            ActionKind::TakeOver => {
                let hint = message.as_deref().unwrap_or("需要人工接管");
                Ok(hint.to_string())
            }
            ActionKind::Note => {
                let content = message.as_deref().unwrap_or_default();
                info!("📝 记录: {}", content);
                Ok(format!("记录: {}", content))
            }
            ActionKind::CallApi => {
                let inst = instruction.as_deref().unwrap_or_default();
                info!("🔗 API 调用请求（未下发）: {}", inst);
                Ok(format!("API 请求已记录: {}", inst))
            }
            ActionKind::Interact => {
                info!("💬 交互请求（等待用户输入）");
                Ok("需要用户交互".to_string())
            }
        }
    }
}

fn require(value: &Option<Coordinate>, field: &str) -> Result<Coordinate, AppError> {
    (*value).ok_or_else(|| AppError::ValidationError(format!("缺少坐标字段 {}", field)))
}

#[async_trait]
impl ActionExecutor for AdbExecutor {
    async fn execute(&self, directive: &Directive) -> Result<ActionResult, AppError> {
        let _guard = self.dispatch_lock.lock().await;
        let started = Instant::now();

        if directive.action() == Some(ActionKind::TakeOver) {
            let message = self.dispatch(directive).await?;
            return Ok(ActionResult::takeover(message));
        }

        let message = self.dispatch(directive).await?;
        let elapsed = started.elapsed().as_millis() as u64;
        info!("✅ {} ({}ms)", message, elapsed);
        Ok(ActionResult::success(message, elapsed))
    }
}

/// 解析 `wm size` 输出，Override 优先于 Physical
fn parse_wm_size(output: &str) -> Option<(i32, i32)> {
    let mut physical = None;
    let mut override_size = None;

    for line in output.lines() {
        if let Some(rest) = line.split("Override size:").nth(1) {
            override_size = parse_dimensions(rest);
        } else if let Some(rest) = line.split("Physical size:").nth(1) {
            physical = parse_dimensions(rest);
        }
    }

    if override_size.is_some() && override_size != physical {
        warn!("⚠️  设备使用 Override 分辨率: {:?}", override_size);
    }
    override_size.or(physical)
}

fn parse_dimensions(s: &str) -> Option<(i32, i32)> {
    let (w, h) = s.trim().split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// `input text` 的转义：空格换成 %s，去掉会破坏远端 shell 的引号
fn escape_input_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' ' => out.push_str("%s"),
            '"' | '\'' | '`' => {}
            '\\' | '(' | ')' | '<' | '>' | '|' | ';' | '&' | '*' | '~' | '$' | '#' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::command::testing::ScriptedRunner;
    use crate::directive::parse_and_validate;

    fn executor(runner: ScriptedRunner) -> AdbExecutor {
        AdbExecutor::new(Arc::new(runner.on("wm size", "Physical size: 1080x1920\n")))
    }

    #[test]
    fn test_parse_wm_size_physical() {
        assert_eq!(
            parse_wm_size("Physical size: 1080x1920\n"),
            Some((1080, 1920))
        );
    }

    #[test]
    fn test_parse_wm_size_override_preferred() {
        let out = "Physical size: 1440x3200\nOverride size: 1080x2400\n";
        assert_eq!(parse_wm_size(out), Some((1080, 2400)));
    }

    #[test]
    fn test_parse_wm_size_garbage() {
        assert_eq!(parse_wm_size("error: no devices found"), None);
    }

    #[test]
    fn test_escape_input_text() {
        assert_eq!(escape_input_text("hello world"), "hello%sworld");
        assert_eq!(escape_input_text("a&b"), "a\\&b");
        assert_eq!(escape_input_text("it's"), "its");
    }

    #[tokio::test]
    async fn test_tap_denormalizes_coordinates() {
        let runner = Arc::new(ScriptedRunner::new().on("wm size", "Physical size: 1080x1920\n"));
        let exec = AdbExecutor::new(runner.clone());
        let d = parse_and_validate(r#"do(action="Tap", element=[500, 500])"#).unwrap();
        let result = exec.execute(&d).await.unwrap();
        assert!(result.success);

        // 500/1000 * 1080 = 540, 500/1000 * 1920 = 960
        let calls = runner.calls.lock().unwrap();
        assert!(calls.iter().any(|c| c == "input tap 540 960"));
    }

    #[tokio::test]
    async fn test_swipe_dispatch() {
        let runner = ScriptedRunner::new().on("wm size", "Physical size: 1000x2000\n");
        let exec = AdbExecutor::new(Arc::new(runner));
        let d =
            parse_and_validate(r#"do(action="Swipe", start=[500, 800], end=[500, 200])"#).unwrap();
        let result = exec.execute(&d).await.unwrap();
        assert!(result.success);
        assert!(result.message.contains("(500,800)->(500,200)"));
    }

    #[tokio::test]
    async fn test_launch_unknown_app_fails() {
        let exec = executor(ScriptedRunner::new());
        let d = parse_and_validate(r#"do(action="Launch", app="NotAnApp")"#).unwrap();
        let err = exec.execute(&d).await.unwrap_err();
        assert!(matches!(err, AppError::ActionDispatchFailure(_)));
    }

    #[tokio::test]
    async fn test_take_over_requests_pause() {
        let exec = executor(ScriptedRunner::new());
        let d = parse_and_validate(r#"do(action="Take_over", message="enter PIN")"#).unwrap();
        let result = exec.execute(&d).await.unwrap();
        assert!(result.needs_takeover);
        assert_eq!(result.message, "enter PIN");
    }

    #[tokio::test]
    async fn test_note_is_recorded_not_dispatched() {
        let runner = ScriptedRunner::new().on("wm size", "Physical size: 1080x1920\n");
        let exec = AdbExecutor::new(Arc::new(runner));
        let d = parse_and_validate(r#"do(action="Note", message="saw a popup")"#).unwrap();
        let result = exec.execute(&d).await.unwrap();
        assert!(result.success);
        assert!(!result.needs_takeover);
        assert!(result.message.contains("saw a popup"));
    }

    #[tokio::test]
    async fn test_resolution_failure_surfaces() {
        let runner = ScriptedRunner::new().fail_on("wm size", "device offline");
        let exec = AdbExecutor::new(Arc::new(runner));
        let d = parse_and_validate(r#"do(action="Tap", element=[10, 10])"#).unwrap();
        assert!(exec.execute(&d).await.is_err());
    }
}

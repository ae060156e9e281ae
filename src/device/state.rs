//! 设备就绪状态探测
//!
//! 连接检查失败时短路，其余诊断各自独立：单项失败只降级为
//! Unknown，不影响其他诊断项。

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::device::command::CommandRunner;

/// 屏幕亮灭状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenState {
    On,
    Off,
    Unknown,
}

/// 锁屏状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    Unlocked,
    Locked,
    Unknown,
}

/// 一次完整探测的结果快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceState {
    pub is_connected: bool,
    pub screen_state: ScreenState,
    pub lock_state: LockState,
    pub battery_level: Option<i32>,
    pub current_app: Option<String>,
}

impl DeviceState {
    /// 断连时的占位快照
    pub fn disconnected() -> Self {
        Self {
            is_connected: false,
            screen_state: ScreenState::Unknown,
            lock_state: LockState::Unknown,
            battery_level: None,
            current_app: None,
        }
    }

    /// 是否可以直接开始自动化
    pub fn is_ready(&self) -> bool {
        self.is_connected
            && self.screen_state == ScreenState::On
            && self.lock_state == LockState::Unlocked
    }

    /// 阻碍自动化的问题列表（固定顺序）
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !self.is_connected {
            issues.push("Device not connected".to_string());
        }
        if self.screen_state == ScreenState::Off {
            issues.push("Screen is off".to_string());
        }
        if self.lock_state == LockState::Locked {
            issues.push("Device is locked".to_string());
        }
        if let Some(level) = self.battery_level {
            if level < 10 {
                issues.push(format!("Low battery: {}%", level));
            }
        }
        issues
    }
}

/// 探测设备完整状态
///
/// 先做连接检查，失败直接返回断连快照；之后的每项诊断互相独立。
pub async fn check_device_state(runner: &dyn CommandRunner) -> DeviceState {
    if !check_connection(runner).await {
        return DeviceState::disconnected();
    }

    let state = DeviceState {
        is_connected: true,
        screen_state: get_screen_state(runner).await,
        lock_state: get_lock_state(runner).await,
        battery_level: get_battery_level(runner).await,
        current_app: get_current_app(runner).await,
    };

    info!(
        "📱 设备状态: screen={:?}, lock={:?}, battery={:?}",
        state.screen_state, state.lock_state, state.battery_level
    );

    state
}

async fn check_connection(runner: &dyn CommandRunner) -> bool {
    match runner.adb(&["get-state"]).await {
        Ok(out) => out.trim().contains("device"),
        Err(e) => {
            debug!("连接检查失败: {}", e);
            false
        }
    }
}

/// 先查 power 服务，拿不到再查 display 服务
async fn get_screen_state(runner: &dyn CommandRunner) -> ScreenState {
    if let Ok(out) = runner.shell("dumpsys power").await {
        let lower = out.to_lowercase();
        if lower.contains("mscreenon=true") || lower.contains("display power: state=on") {
            return ScreenState::On;
        }
        if lower.contains("mscreenon=false") || lower.contains("display power: state=off") {
            return ScreenState::Off;
        }
    }

    if let Ok(out) = runner.shell("dumpsys display").await {
        for line in out.lines().filter(|l| l.contains("mScreenState")) {
            if line.contains("ON") {
                return ScreenState::On;
            }
            if line.contains("OFF") {
                return ScreenState::Off;
            }
        }
    }

    ScreenState::Unknown
}

/// 先看 mDreamingLockscreen，再退到 mShowingLockscreen
async fn get_lock_state(runner: &dyn CommandRunner) -> LockState {
    if let Ok(out) = runner.shell("dumpsys window").await {
        if out.contains("mDreamingLockscreen=true") {
            return LockState::Locked;
        }
        if out.contains("mDreamingLockscreen=false") {
            return LockState::Unlocked;
        }
        if out.contains("mShowingLockscreen=true") {
            return LockState::Locked;
        }
        if out.contains("mShowingLockscreen=false") {
            return LockState::Unlocked;
        }
    }
    LockState::Unknown
}

async fn get_battery_level(runner: &dyn CommandRunner) -> Option<i32> {
    let out = runner.shell("dumpsys battery").await.ok()?;
    for line in out.lines() {
        let lower = line.to_lowercase();
        if lower.trim_start().starts_with("level:") {
            return lower.rsplit(':').next()?.trim().parse().ok();
        }
    }
    None
}

/// 从 mCurrentFocus 行提取前台应用包名
async fn get_current_app(runner: &dyn CommandRunner) -> Option<String> {
    let out = runner.shell("dumpsys window").await.ok()?;
    let line = out.lines().find(|l| l.contains("mCurrentFocus"))?;
    let slash = line.find('/')?;
    let before = &line[..slash];
    let package = before
        .rsplit(|c: char| c.is_whitespace() || c == '{')
        .next()?;
    if package.is_empty() {
        None
    } else {
        Some(package.to_string())
    }
}

/// 点亮屏幕
pub async fn wake_screen(runner: &dyn CommandRunner) -> bool {
    match runner.shell("input keyevent KEYCODE_WAKEUP").await {
        Ok(_) => {
            info!("✅ 已发送亮屏指令");
            true
        }
        Err(e) => {
            tracing::error!("❌ 亮屏失败: {}", e);
            false
        }
    }
}

/// 上滑解锁（只对无密码滑动锁有效，PIN/图案锁需要人工接管）
pub async fn unlock_screen(runner: &dyn CommandRunner) -> bool {
    match runner.shell("input swipe 500 1800 500 500 300").await {
        Ok(_) => {
            info!("✅ 已发送解锁滑动");
            true
        }
        Err(e) => {
            tracing::error!("❌ 解锁失败: {}", e);
            false
        }
    }
}

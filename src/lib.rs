//! AI 驱动的 Android 手机自动化框架
//!
//! 管线：模型输出 → 安全解析 → 修正与校验 → ADB 执行。
//! 坐标统一使用 0-999 归一化网格；敏感操作与人工接管通过
//! 会话状态机门控。

pub mod agent;
pub mod api;
pub mod config;
pub mod device;
pub mod directive;
pub mod error;
pub mod executor;
pub mod llm;

pub use agent::{AgentSession, PhoneAgent, SessionStatus};
pub use config::{AgentConfig, ApiConfig, FullConfig, Language};
pub use device::{DeviceState, LockState, ScreenState};
pub use directive::{ActionKind, Coordinate, Directive};
pub use error::{AppError, Result};

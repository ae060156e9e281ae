//! 配置模块
//!
//! 会话创建时一次性读入，生命周期内不可变。

pub mod apps;
pub mod i18n;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::directive::types::{ActionKind, ALL_ACTIONS};
use crate::error::AppError;
use crate::llm::types::ModelConfig;

/// 界面/提示语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ru,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ru => "ru",
        }
    }
}

/// Agent 行为配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// 每个任务的最大步数
    pub max_steps: usize,

    /// ADB 设备 ID（None 表示默认设备）
    pub device_id: Option<String>,

    /// 提示与输出语言
    pub lang: Language,

    /// 执行前检查设备状态
    pub check_device_state: bool,

    /// 观测中附带 UI 树
    pub use_ui_tree: bool,

    /// 解析/校验/模型/设备失败的重试次数（单一旋钮）
    pub retry_count: u32,

    /// 步骤之间的延迟（秒）
    pub step_delay: f64,

    /// 需要人工确认的敏感操作名（规范名，如 "Launch"）
    pub confirm_actions: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            device_id: None,
            lang: Language::En,
            check_device_state: true,
            use_ui_tree: false,
            retry_count: 3,
            step_delay: 0.5,
            confirm_actions: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// 指令是否命中敏感操作列表
    pub fn is_sensitive(&self, action: ActionKind) -> bool {
        self.confirm_actions.iter().any(|n| n == action.as_str())
    }
}

/// REST API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// 绑定地址（默认仅本机回环）
    pub host: String,
    pub port: u16,

    /// API 密钥（None 时关闭鉴权）
    pub api_key: Option<String>,

    /// 每客户端每分钟最大请求数
    pub rate_limit: usize,

    /// 允许通过 /action 下发的操作白名单
    pub allowed_actions: Vec<ActionKind>,

    /// 允许的 CORS 来源
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_key: None,
            rate_limit: 60,
            allowed_actions: ALL_ACTIONS.to_vec(),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl ApiConfig {
    /// 只接受回环或通配地址，避免误暴露到外网
    pub fn validate_host(&self) -> Result<(), AppError> {
        match self.host.as_str() {
            "127.0.0.1" | "localhost" => Ok(()),
            "0.0.0.0" => {
                tracing::warn!("⚠️  绑定到 0.0.0.0 会把 API 暴露到网络，请确认已配置鉴权");
                Ok(())
            }
            other => Err(AppError::ConfigError(format!(
                "host 必须是 127.0.0.1、localhost 或 0.0.0.0，当前为 {}",
                other
            ))),
        }
    }
}

/// 完整配置：agent + 模型 + API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FullConfig {
    pub agent: AgentConfig,
    pub model: ModelConfig,
    pub api: ApiConfig,
}

impl FullConfig {
    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let content = fs::read_to_string(path)?;
        let config: FullConfig =
            toml::from_str(&content).map_err(|e| AppError::ConfigError(e.to_string()))?;
        config.api.validate_host()?;
        Ok(config)
    }

    /// 从文件加载，并用环境变量覆盖模型凭据
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let mut config = Self::from_file(path)?;
        config.model.apply_env();
        Ok(config)
    }

    /// 保存到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), AppError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::ConfigError(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_config_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_steps, 100);
        assert_eq!(config.retry_count, 3);
        assert!(config.check_device_state);
        assert!(config.confirm_actions.is_empty());
    }

    #[test]
    fn test_sensitive_action_lookup() {
        let config = AgentConfig {
            confirm_actions: vec!["Launch".to_string(), "Call_API".to_string()],
            ..Default::default()
        };
        assert!(config.is_sensitive(ActionKind::Launch));
        assert!(config.is_sensitive(ActionKind::CallApi));
        assert!(!config.is_sensitive(ActionKind::Tap));
    }

    #[test]
    fn test_api_config_host_validation() {
        assert!(ApiConfig::default().validate_host().is_ok());
        let bad = ApiConfig {
            host: "192.168.1.100".to_string(),
            ..Default::default()
        };
        assert!(bad.validate_host().is_err());
    }

    #[test]
    fn test_full_config_toml_roundtrip() {
        let config = FullConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let back: FullConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.agent.max_steps, config.agent.max_steps);
        assert_eq!(back.api.rate_limit, config.api.rate_limit);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: FullConfig = toml::from_str("[agent]\nmax_steps = 10\n").unwrap();
        assert_eq!(config.agent.max_steps, 10);
        assert_eq!(config.agent.retry_count, 3);
        assert_eq!(config.api.port, 8080);
    }
}

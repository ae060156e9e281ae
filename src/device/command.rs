//! ADB 命令执行层
//!
//! 把对设备的所有访问收敛到 `CommandRunner` trait 后面，
//! 方便在测试里用脚本化的假设备替换真实 ADB。

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AppError;

/// 单条诊断命令的超时
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// 设备命令执行接口
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// 在设备上执行 shell 命令，返回 stdout 文本
    async fn shell(&self, command: &str) -> Result<String, AppError>;

    /// 执行 adb 子命令（非 shell），如 `get-state`
    async fn adb(&self, args: &[&str]) -> Result<String, AppError>;

    /// 通过 exec-out 执行命令并取回原始字节（用于截图）
    async fn exec_out(&self, command: &str) -> Result<Vec<u8>, AppError>;
}

/// 基于 adb 可执行文件的默认实现
pub struct AdbRunner {
    device_id: Option<String>,
    timeout: Duration,
}

impl AdbRunner {
    pub fn new(device_id: Option<String>) -> Self {
        Self {
            device_id,
            timeout: COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(device_id: Option<String>, timeout: Duration) -> Self {
        Self { device_id, timeout }
    }

    /// 组装完整参数表（带 -s 设备选择）
    fn build_args<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(id) = &self.device_id {
            full.push("-s");
            full.push(id.as_str());
        }
        full.extend_from_slice(args);
        full
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, AppError> {
        let full = self.build_args(args);
        debug!("🔧 adb {}", full.join(" "));

        let output = tokio::time::timeout(self.timeout, Command::new("adb").args(&full).output())
            .await
            .map_err(|_| {
                warn!("⚠️  adb 命令超时: {}", full.join(" "));
                AppError::DeviceUnavailable(format!("adb 命令超时: {}", full.join(" ")))
            })?
            .map_err(|e| AppError::DeviceUnavailable(format!("无法启动 adb: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::ActionDispatchFailure(format!(
                "adb 命令失败 ({}): {}",
                full.join(" "),
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }

    async fn run_text(&self, args: &[&str]) -> Result<String, AppError> {
        let stdout = self.run(args).await?;
        Ok(String::from_utf8_lossy(&stdout).to_string())
    }
}

#[async_trait]
impl CommandRunner for AdbRunner {
    async fn shell(&self, command: &str) -> Result<String, AppError> {
        let mut args = vec!["shell"];
        args.extend(command.split_whitespace());
        self.run_text(&args).await
    }

    async fn adb(&self, args: &[&str]) -> Result<String, AppError> {
        self.run_text(args).await
    }

    async fn exec_out(&self, command: &str) -> Result<Vec<u8>, AppError> {
        let mut args = vec!["exec-out"];
        args.extend(command.split_whitespace());
        self.run(&args).await
    }
}

#[cfg(test)]
pub mod testing {
    //! 测试用的脚本化命令执行器

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// 按命令前缀返回预置输出；未命中时返回空串
    pub struct ScriptedRunner {
        responses: HashMap<String, Result<String, String>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self {
                responses: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn on(mut self, command: &str, output: &str) -> Self {
            self.responses
                .insert(command.to_string(), Ok(output.to_string()));
            self
        }

        pub fn fail_on(mut self, command: &str, error: &str) -> Self {
            self.responses
                .insert(command.to_string(), Err(error.to_string()));
            self
        }

        fn lookup(&self, key: &str) -> Result<String, AppError> {
            self.calls.lock().unwrap().push(key.to_string());
            match self.responses.iter().find(|(k, _)| key.starts_with(*k)) {
                Some((_, Ok(out))) => Ok(out.clone()),
                Some((_, Err(e))) => Err(AppError::DeviceUnavailable(e.clone())),
                None => Ok(String::new()),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn shell(&self, command: &str) -> Result<String, AppError> {
            self.lookup(command)
        }

        async fn adb(&self, args: &[&str]) -> Result<String, AppError> {
            self.lookup(&args.join(" "))
        }

        async fn exec_out(&self, command: &str) -> Result<Vec<u8>, AppError> {
            self.lookup(command).map(|s| s.into_bytes())
        }
    }
}

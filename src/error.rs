use thiserror::Error;

/// 应用程序统一错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 模型输出无法解析为指令
    #[error("指令解析失败: {0}")]
    ParseError(String),

    /// 指令结构合法但不符合约束
    #[error("指令校验失败: {0}")]
    ValidationError(String),

    /// 设备不可达（探测或下发阶段）
    #[error("设备不可用: {0}")]
    DeviceUnavailable(String),

    /// 设备已连接但动作执行失败
    #[error("动作执行失败: {0}")]
    ActionDispatchFailure(String),

    /// 用户拒绝了敏感操作
    #[error("用户拒绝确认: {0}")]
    ConfirmationDenied(String),

    /// 超过最大步数限制
    #[error("超过最大步数: {0}")]
    MaxStepsExceeded(usize),

    /// 模型调用失败
    #[error("模型调用失败: {0}")]
    ModelError(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON 错误
    #[error("JSON 错误: {0}")]
    JsonError(#[from] serde_json::Error),

    /// 未知错误
    #[error("未知错误: {0}")]
    Unknown(String),
}

/// AppError 的 Result 类型别名
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// 将错误转换为 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::ParseError(_) => 400,
            AppError::ValidationError(_) => 400,
            AppError::DeviceUnavailable(_) => 503,
            AppError::ActionDispatchFailure(_) => 500,
            AppError::ConfirmationDenied(_) => 403,
            AppError::MaxStepsExceeded(_) => 409,
            AppError::ModelError(_) => 502,
            AppError::ConfigError(_) => 500,
            AppError::IoError(_) => 500,
            AppError::JsonError(_) => 400,
            AppError::Unknown(_) => 500,
        }
    }
}

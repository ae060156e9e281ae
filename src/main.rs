use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use phone_agent::api::{serve, ApiState, RateLimiter};
use phone_agent::device::command::{AdbRunner, CommandRunner};
use phone_agent::executor::{ActionExecutor, AdbExecutor};
use phone_agent::llm::OpenAIClient;
use phone_agent::{AppError, FullConfig, PhoneAgent};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    // 初始化日志系统：控制台 + 按天滚动的文件
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("phone_agent=debug,axum=info"));

    let file_appender = tracing_appender::rolling::daily("logs", "phone-agent.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    info!("启动 Phone Agent API 服务器...");

    if let Err(e) = run().await {
        error!("❌ 启动失败: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = load_config()?;

    let runner: Arc<dyn CommandRunner> = Arc::new(AdbRunner::new(config.agent.device_id.clone()));
    let executor: Arc<dyn ActionExecutor> = Arc::new(AdbExecutor::new(runner.clone()));
    let model = Arc::new(OpenAIClient::new(config.model.clone())?);
    let agent = Arc::new(PhoneAgent::new(
        config.agent.clone(),
        model,
        executor.clone(),
        runner.clone(),
    ));

    let rate_limiter = RateLimiter::new(
        config.api.rate_limit,
        std::time::Duration::from_secs(60),
    );
    let state = Arc::new(ApiState {
        agent,
        executor,
        runner,
        config: config.api,
        rate_limiter,
    });

    serve(state).await?;
    Ok(())
}

/// 读取配置文件，不存在时写出默认配置再使用
fn load_config() -> Result<FullConfig, AppError> {
    if std::path::Path::new(CONFIG_PATH).exists() {
        info!("📄 加载配置: {}", CONFIG_PATH);
        FullConfig::from_file_with_env(CONFIG_PATH)
    } else {
        info!("📄 未找到 {}，写出默认配置", CONFIG_PATH);
        let mut config = FullConfig::default();
        config.save_to_file(CONFIG_PATH)?;
        config.model.apply_env();
        Ok(config)
    }
}

//! 任务执行主循环
//!
//! 每一步：截图观测 → 模型决策 → 解析校验 → 下发执行。
//! 解析/校验失败把错误文案回传给模型重试；模型与设备故障按
//! 指数退避重试；敏感操作与人工接管通过 oneshot 通道门控，
//! 取消只在步骤间生效，不打断进行中的手势。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::agent::session::{AgentSession, SessionStatus, StepRecord};
use crate::config::i18n::get_message;
use crate::config::AgentConfig;
use crate::device::command::CommandRunner;
use crate::device::state::{check_device_state, wake_screen, unlock_screen, ScreenState, LockState};
use crate::device::ui_tree::get_ui_tree;
use crate::directive::{parse_and_validate, Directive};
use crate::error::AppError;
use crate::executor::retry::RetryConfig;
use crate::executor::{ActionExecutor, ActionResult};
use crate::llm::prompts::get_system_prompt;
use crate::llm::types::ChatMessage;
use crate::llm::ModelClient;

/// 手机自动化 Agent
///
/// 所有状态都是内部可变的，可放进 `Arc` 跨任务共享：
/// 执行循环在一个任务里跑，确认/接管/取消从其他任务调用。
pub struct PhoneAgent {
    config: AgentConfig,
    model: Arc<dyn ModelClient>,
    executor: Arc<dyn ActionExecutor>,
    runner: Arc<dyn CommandRunner>,
    session: Arc<RwLock<AgentSession>>,
    messages: Mutex<Vec<ChatMessage>>,
    confirmation_tx: Mutex<Option<oneshot::Sender<bool>>>,
    takeover_tx: Mutex<Option<oneshot::Sender<()>>>,
    cancelled: AtomicBool,
    retry: RetryConfig,
}

impl PhoneAgent {
    pub fn new(
        config: AgentConfig,
        model: Arc<dyn ModelClient>,
        executor: Arc<dyn ActionExecutor>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let retry = RetryConfig::new(config.retry_count.max(1), Default::default());
        Self {
            config,
            model,
            executor,
            runner,
            session: Arc::new(RwLock::new(AgentSession::new())),
            messages: Mutex::new(Vec::new()),
            confirmation_tx: Mutex::new(None),
            takeover_tx: Mutex::new(None),
            cancelled: AtomicBool::new(false),
            retry,
        }
    }

    /// 当前会话快照
    pub async fn session(&self) -> AgentSession {
        self.session.read().await.clone()
    }

    pub async fn status(&self) -> SessionStatus {
        self.session.read().await.status
    }

    /// 请求取消，当前步骤完成后生效
    pub fn cancel(&self) {
        info!("🛑 收到取消请求");
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// 回应敏感操作确认
    pub async fn confirm(&self, approved: bool) -> Result<(), AppError> {
        match self.confirmation_tx.lock().await.take() {
            Some(tx) => {
                let _ = tx.send(approved);
                Ok(())
            }
            None => Err(AppError::ValidationError(
                "当前没有等待确认的操作".to_string(),
            )),
        }
    }

    /// 人工操作完成，恢复自动化
    pub async fn complete_takeover(&self) -> Result<(), AppError> {
        match self.takeover_tx.lock().await.take() {
            Some(tx) => {
                let _ = tx.send(());
                Ok(())
            }
            None => Err(AppError::ValidationError(
                "当前没有等待接管的操作".to_string(),
            )),
        }
    }

    async fn set_status(&self, status: SessionStatus) {
        self.session.write().await.status = status;
    }

    /// 开始新任务：重置会话、探测设备、构造初始对话
    pub async fn start(&self, task: &str) -> Result<(), AppError> {
        {
            let mut session = self.session.write().await;
            if session.status == SessionStatus::Running || session.status.is_waiting() {
                return Err(AppError::Unknown("已有任务在执行中".to_string()));
            }
            session.start(task);
        }
        self.cancelled.store(false, Ordering::SeqCst);

        info!(
            "🚀 {}: {}",
            get_message("starting_task", self.config.lang),
            task
        );

        if self.config.check_device_state {
            if let Err(e) = self.ensure_device_ready().await {
                self.fail(&e).await;
                return Err(e);
            }
        }

        let mut messages = self.messages.lock().await;
        messages.clear();
        messages.push(ChatMessage::system(get_system_prompt(self.config.lang)));
        messages.push(ChatMessage::user(task));
        Ok(())
    }

    /// 回到初始状态，丢弃历史；配置保留，可复用执行新任务
    pub async fn reset(&self) -> Result<(), AppError> {
        let mut session = self.session.write().await;
        if session.status == SessionStatus::Running || session.status.is_waiting() {
            return Err(AppError::Unknown("任务执行中不能重置".to_string()));
        }
        *session = AgentSession::new();
        self.messages.lock().await.clear();
        self.cancelled.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// 执行一个完整任务，返回终态会话快照
    ///
    /// 同一 Agent 上的任务串行：已有任务在跑时直接报错。
    pub async fn run(&self, task: &str) -> Result<AgentSession, AppError> {
        self.start(task).await?;
        self.drive().await
    }

    /// 驱动已启动的会话直到终态（`start` 成功后调用）
    pub async fn drive(&self) -> Result<AgentSession, AppError> {
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                info!("🛑 任务已取消");
                let mut session = self.session.write().await;
                session.finish(SessionStatus::Cancelled, Some("任务已取消".to_string()));
                return Ok(session.clone());
            }

            if self.session.read().await.step_count() >= self.config.max_steps {
                warn!("⚠️  达到最大步数 {}", self.config.max_steps);
                let e = AppError::MaxStepsExceeded(self.config.max_steps);
                self.session
                    .write()
                    .await
                    .finish(SessionStatus::MaxStepsExceeded, Some(e.to_string()));
                return Err(e);
            }

            // 终态转移由 step 自己完成
            match self.step().await {
                Ok(StepOutcome::Finished(_)) => {
                    return Ok(self.session.read().await.clone());
                }
                Ok(StepOutcome::Continue) => {}
                Err(e) => return Err(e),
            }

            if self.config.step_delay > 0.0 {
                tokio::time::sleep(Duration::from_secs_f64(self.config.step_delay)).await;
            }
        }
    }

    async fn fail(&self, error: &AppError) {
        self.session
            .write()
            .await
            .finish(SessionStatus::Failed, Some(error.to_string()));
    }

    /// 探测设备，必要时尝试亮屏/解锁后复测
    async fn ensure_device_ready(&self) -> Result<(), AppError> {
        let mut state = check_device_state(self.runner.as_ref()).await;
        if state.is_ready() {
            return Ok(());
        }
        if !state.is_connected {
            return Err(AppError::DeviceUnavailable(state.get_issues().join("; ")));
        }

        if state.screen_state == ScreenState::Off {
            wake_screen(self.runner.as_ref()).await;
        }
        if state.lock_state == LockState::Locked {
            unlock_screen(self.runner.as_ref()).await;
        }
        state = check_device_state(self.runner.as_ref()).await;

        if state.is_ready() {
            Ok(())
        } else {
            Err(AppError::DeviceUnavailable(state.get_issues().join("; ")))
        }
    }

    /// 执行单个状态机转移（一步），可供外部单步驱动
    ///
    /// Finish 与步骤失败都在此落终态：单步调用方观察到的会话
    /// 状态即状态机的真实状态，不依赖外层循环补账。
    pub async fn step(&self) -> Result<StepOutcome, AppError> {
        if self.session.read().await.status != SessionStatus::Running {
            return Err(AppError::Unknown("会话未在运行".to_string()));
        }

        match self.step_inner().await {
            Ok(StepOutcome::Finished(message)) => {
                info!(
                    "🏁 {}: {}",
                    get_message("task_completed", self.config.lang),
                    message.as_deref().unwrap_or("")
                );
                self.session
                    .write()
                    .await
                    .finish(SessionStatus::Finished, message.clone());
                Ok(StepOutcome::Finished(message))
            }
            Ok(StepOutcome::Continue) => Ok(StepOutcome::Continue),
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    async fn step_inner(&self) -> Result<StepOutcome, AppError> {
        let step_no = self.session.read().await.step_count() + 1;
        debug!("▶️  第 {} 步", step_no);

        if self.config.use_ui_tree {
            self.attach_ui_observation().await;
        }

        let screenshot = self.capture_screenshot().await;
        let (raw_output, directive) = self.decide(screenshot.as_deref()).await?;

        // 敏感操作门控；拒绝只终止本步，不终止会话
        if let Some(action) = directive.action() {
            if self.config.is_sensitive(action) {
                if let Err(e) = self.await_confirmation(&directive).await {
                    warn!("🚫 操作被拒绝: {}", e);
                    self.record(step_no, &raw_output, &directive, &e.to_string(), false)
                        .await;
                    let mut messages = self.messages.lock().await;
                    messages.push(ChatMessage::assistant(raw_output));
                    messages.push(ChatMessage::user(
                        "The user declined this action. Choose a different approach or finish the task.",
                    ));
                    return Ok(StepOutcome::Continue);
                }
            }
        }

        if let Directive::Finish { message } = &directive {
            self.record(step_no, &raw_output, &directive, "任务结束", true)
                .await;
            return Ok(StepOutcome::Finished(message.clone()));
        }

        let result = self.execute_with_retry(&directive).await?;

        if result.needs_takeover {
            self.await_takeover(&result).await;
        }

        self.record(step_no, &raw_output, &directive, &result.message, result.success)
            .await;

        let mut messages = self.messages.lock().await;
        messages.push(ChatMessage::assistant(raw_output));
        messages.push(ChatMessage::user(format!("Action result: {}", result.message)));

        Ok(StepOutcome::Continue)
    }

    /// 查询模型并解析，解析/校验失败时把错误文案回传重试
    async fn decide(&self, screenshot: Option<&str>) -> Result<(String, Directive), AppError> {
        let mut last_error = None;

        for attempt in 0..self.retry.max_attempts {
            let history = self.messages.lock().await.clone();
            let raw_output = self.query_model(history, screenshot).await?;
            debug!("🤖 模型输出: {}", raw_output.trim());

            match parse_and_validate(&raw_output) {
                Ok(directive) => {
                    info!("📋 指令: {}", directive.describe());
                    return Ok((raw_output, directive));
                }
                Err(e) => {
                    warn!(
                        "⚠️  指令不合法（第 {}/{} 次）: {}",
                        attempt + 1,
                        self.retry.max_attempts,
                        e
                    );
                    let feedback = format!(
                        "Invalid action: {}. Respond with exactly one valid do(...) or finish(...) call.",
                        e
                    );
                    let mut messages = self.messages.lock().await;
                    messages.push(ChatMessage::assistant(raw_output));
                    messages.push(ChatMessage::user(feedback));
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::Unknown("重试次数耗尽".to_string())))
    }

    /// 模型调用，网络类错误按退避策略重试
    async fn query_model(
        &self,
        messages: Vec<ChatMessage>,
        screenshot: Option<&str>,
    ) -> Result<String, AppError> {
        let mut attempt = 0;
        loop {
            match self.model.query(messages.clone(), screenshot).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt + 1 < self.retry.max_attempts && self.retry.is_retryable(&e) => {
                    let delay = self.retry.strategy.next_delay(attempt);
                    warn!("⚠️  模型调用失败，{}ms 后重试: {}", delay.as_millis(), e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute_with_retry(&self, directive: &Directive) -> Result<ActionResult, AppError> {
        let mut attempt = 0;
        loop {
            match self.executor.execute(directive).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt + 1 < self.retry.max_attempts && self.retry.is_retryable(&e) => {
                    let delay = self.retry.strategy.next_delay(attempt);
                    warn!("⚠️  执行失败，{}ms 后重试: {}", delay.as_millis(), e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 敏感操作门控：挂起直到外部确认
    async fn await_confirmation(&self, directive: &Directive) -> Result<(), AppError> {
        let (tx, rx) = oneshot::channel();
        *self.confirmation_tx.lock().await = Some(tx);
        self.set_status(SessionStatus::AwaitingConfirmation).await;
        info!(
            "⏸️  {}: {}",
            get_message("confirmation_required", self.config.lang),
            directive.describe()
        );

        // 发送端被丢弃按拒绝处理
        let approved = rx.await.unwrap_or(false);
        self.set_status(SessionStatus::Running).await;

        if approved {
            info!("✅ 操作已确认");
            Ok(())
        } else {
            Err(AppError::ConfirmationDenied(directive.describe()))
        }
    }

    /// 人工接管门控：挂起直到外部宣告完成
    async fn await_takeover(&self, result: &ActionResult) {
        let (tx, rx) = oneshot::channel();
        *self.takeover_tx.lock().await = Some(tx);
        self.set_status(SessionStatus::AwaitingTakeover).await;
        info!(
            "🖐️  {}: {}",
            get_message("manual_operation_required", self.config.lang),
            result.message
        );

        let _ = rx.await;
        self.set_status(SessionStatus::Running).await;
        info!("▶️  人工操作完成，继续自动化");

        let mut messages = self.messages.lock().await;
        messages.push(ChatMessage::user(
            "The user has completed the manual operation. Continue the task.",
        ));
    }

    /// 截图并 base64 编码；失败不阻塞步骤，只是没有视觉观测
    async fn capture_screenshot(&self) -> Option<String> {
        match self.runner.exec_out("screencap -p").await {
            Ok(bytes) if !bytes.is_empty() => Some(BASE64.encode(bytes)),
            Ok(_) => None,
            Err(e) => {
                warn!("⚠️  截图失败: {}", e);
                None
            }
        }
    }

    /// 把 UI 树摘要追加到最后一条用户消息
    async fn attach_ui_observation(&self) {
        let tree = match get_ui_tree(self.runner.as_ref()).await {
            Ok(tree) => tree,
            Err(e) => {
                warn!("⚠️  UI 树获取失败: {}", e);
                return;
            }
        };

        let mut lines = Vec::new();
        for element in tree.get_clickable_elements().into_iter().take(30) {
            let label = element.display_text();
            if label.is_empty() {
                continue;
            }
            let c = element.center_normalized(tree.screen_width, tree.screen_height);
            lines.push(format!("- {} @ [{},{}]", label, c.x, c.y));
        }
        if lines.is_empty() {
            return;
        }

        let mut messages = self.messages.lock().await;
        if let Some(last) = messages.last_mut() {
            let combined = format!("{}\n\nClickable elements:\n{}", last.text(), lines.join("\n"));
            *last = ChatMessage {
                role: last.role,
                content: crate::llm::types::MessageContent::Text(combined),
            };
        }
    }

    async fn record(
        &self,
        step: usize,
        model_output: &str,
        directive: &Directive,
        result: &str,
        success: bool,
    ) {
        self.session.write().await.record_step(StepRecord {
            step,
            model_output: model_output.to_string(),
            directive: directive.describe(),
            result: result.to_string(),
            success,
            timestamp: chrono::Utc::now(),
        });
    }
}

/// 单步转移的结果
pub enum StepOutcome {
    Continue,
    Finished(Option<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::command::testing::ScriptedRunner;
    use crate::executor::AdbExecutor;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    struct ScriptedModel {
        responses: std::sync::Mutex<VecDeque<String>>,
    }

    impl ScriptedModel {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: std::sync::Mutex::new(
                    responses.iter().map(|s| s.to_string()).collect(),
                ),
            })
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn query(
            &self,
            _messages: Vec<ChatMessage>,
            _screenshot: Option<&str>,
        ) -> Result<String, AppError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AppError::ModelError("脚本耗尽".to_string()))
        }
    }

    fn test_config() -> AgentConfig {
        AgentConfig {
            check_device_state: false,
            step_delay: 0.0,
            ..Default::default()
        }
    }

    fn build_agent(config: AgentConfig, model: Arc<ScriptedModel>) -> Arc<PhoneAgent> {
        let runner: Arc<dyn CommandRunner> = Arc::new(
            ScriptedRunner::new().on("wm size", "Physical size: 1080x1920\n"),
        );
        let executor = Arc::new(AdbExecutor::new(runner.clone()));
        Arc::new(PhoneAgent::new(config, model, executor, runner))
    }

    async fn wait_for_status(agent: &PhoneAgent, status: SessionStatus) {
        for _ in 0..200 {
            if agent.status().await == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("状态未到达 {:?}，当前 {:?}", status, agent.status().await);
    }

    #[tokio::test]
    async fn test_run_until_finish() {
        let model = ScriptedModel::new(&[
            r#"do(action="Home")"#,
            r#"finish(message="done")"#,
        ]);
        let agent = build_agent(test_config(), model);

        let session = agent.run("go home").await.unwrap();
        assert_eq!(session.status, SessionStatus::Finished);
        assert_eq!(session.final_message.as_deref(), Some("done"));
        assert_eq!(session.step_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_output_retried_with_feedback() {
        let model = ScriptedModel::new(&[
            "I think I should tap something",
            r#"do(action="Teleport")"#,
            r#"finish(message="ok")"#,
        ]);
        let agent = build_agent(test_config(), model);

        let session = agent.run("task").await.unwrap();
        assert_eq!(session.status, SessionStatus::Finished);

        // 反馈消息进入了对话历史
        let messages = agent.messages.lock().await;
        assert!(messages
            .iter()
            .any(|m| m.text().starts_with("Invalid action:")));
    }

    #[tokio::test]
    async fn test_retry_exhaustion_fails_session() {
        let model = ScriptedModel::new(&["garbage", "more garbage", "still garbage"]);
        let agent = build_agent(test_config(), model);

        let err = agent.run("task").await.unwrap_err();
        assert!(matches!(err, AppError::ParseError(_)));
        assert_eq!(agent.status().await, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn test_max_steps_exceeded() {
        let model = ScriptedModel::new(&[
            r#"do(action="Home")"#,
            r#"do(action="Home")"#,
            r#"do(action="Home")"#,
        ]);
        let config = AgentConfig {
            max_steps: 2,
            ..test_config()
        };
        let agent = build_agent(config, model);

        let err = agent.run("task").await.unwrap_err();
        assert!(matches!(err, AppError::MaxStepsExceeded(2)));
        assert_eq!(agent.status().await, SessionStatus::MaxStepsExceeded);
    }

    #[tokio::test]
    async fn test_confirmation_approved() {
        let model = ScriptedModel::new(&[
            r#"do(action="Launch", app="Settings")"#,
            r#"finish(message="opened")"#,
        ]);
        let config = AgentConfig {
            confirm_actions: vec!["Launch".to_string()],
            ..test_config()
        };
        let agent = build_agent(config, model);

        let handle = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.run("open settings").await })
        };

        wait_for_status(&agent, SessionStatus::AwaitingConfirmation).await;
        agent.confirm(true).await.unwrap();

        let session = handle.await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Finished);
    }

    #[tokio::test]
    async fn test_confirmation_denied_fails_step_not_session() {
        let model = ScriptedModel::new(&[
            r#"do(action="Launch", app="Settings")"#,
            r#"finish(message="gave up")"#,
        ]);
        let config = AgentConfig {
            confirm_actions: vec!["Launch".to_string()],
            ..test_config()
        };
        let agent = build_agent(config, model);

        let handle = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.run("open settings").await })
        };

        wait_for_status(&agent, SessionStatus::AwaitingConfirmation).await;
        agent.confirm(false).await.unwrap();

        // 拒绝后会话继续，模型下一步选择 finish
        let session = handle.await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Finished);
        assert!(!session.steps[0].success);
        assert!(session.steps[0].result.contains("拒绝"));
    }

    #[tokio::test]
    async fn test_manual_stepping_and_reset() {
        let model = ScriptedModel::new(&[
            r#"do(action="Home")"#,
            r#"finish(message="done")"#,
        ]);
        let agent = build_agent(test_config(), model);

        // 未开始任务时 step 报错
        assert!(agent.step().await.is_err());

        agent.start("go home").await.unwrap();
        assert!(matches!(agent.step().await.unwrap(), StepOutcome::Continue));
        assert_eq!(agent.status().await, SessionStatus::Running);
        assert!(matches!(
            agent.step().await.unwrap(),
            StepOutcome::Finished(Some(m)) if m == "done"
        ));

        // Finish 的终态转移由 step 自己完成
        let session = agent.session().await;
        assert_eq!(session.status, SessionStatus::Finished);
        assert_eq!(session.final_message.as_deref(), Some("done"));
        assert_eq!(session.step_count(), 2);

        // 终态后不能再单步
        assert!(agent.step().await.is_err());

        agent.reset().await.unwrap();
        let session = agent.session().await;
        assert_eq!(session.status, SessionStatus::Idle);
        assert_eq!(session.step_count(), 0);
    }

    #[tokio::test]
    async fn test_manual_step_failure_finalizes_session() {
        let model = ScriptedModel::new(&["nope", "still nope", "nope again"]);
        let agent = build_agent(test_config(), model);

        agent.start("task").await.unwrap();
        assert!(agent.step().await.is_err());
        // 失败的终态同样由 step 落账
        assert_eq!(agent.status().await, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn test_confirm_without_pending_is_error() {
        let model = ScriptedModel::new(&[]);
        let agent = build_agent(test_config(), model);
        assert!(agent.confirm(true).await.is_err());
    }

    #[tokio::test]
    async fn test_takeover_pauses_and_resumes() {
        let model = ScriptedModel::new(&[
            r#"do(action="Take_over", message="enter PIN")"#,
            r#"finish(message="done after takeover")"#,
        ]);
        let agent = build_agent(test_config(), model);

        let handle = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.run("login").await })
        };

        wait_for_status(&agent, SessionStatus::AwaitingTakeover).await;
        agent.complete_takeover().await.unwrap();

        let session = handle.await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Finished);
    }

    #[tokio::test]
    async fn test_cancel_between_steps() {
        let model = ScriptedModel::new(&[
            r#"do(action="Wait", duration="1s")"#,
            r#"do(action="Home")"#,
        ]);
        let agent = build_agent(test_config(), model);

        let handle = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.run("task").await })
        };

        // 第一步（Wait 1s）进行中请求取消
        tokio::time::sleep(Duration::from_millis(50)).await;
        agent.cancel();

        let session = handle.await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Cancelled);
        // 取消在步骤间生效，第一步已完整执行
        assert_eq!(session.step_count(), 1);
    }

    #[tokio::test]
    async fn test_second_run_while_running_is_rejected() {
        let model = ScriptedModel::new(&[r#"do(action="Wait", duration="1s")"#]);
        let agent = build_agent(test_config(), model);

        let handle = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.run("first").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = agent.run("second").await.unwrap_err();
        assert!(matches!(err, AppError::Unknown(_)));

        agent.cancel();
        let _ = handle.await.unwrap();
    }
}

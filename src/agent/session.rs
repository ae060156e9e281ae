//! 任务会话状态
//!
//! 会话是一次任务执行的完整记录：状态机、步骤历史与最终结果。
//! 对外只暴露克隆出的快照，内部可变性由持有方的锁保证。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 会话状态机
///
/// Running 可进入两个等待态（确认/接管），等待态只能回到
/// Running 或落入终态；Finished、Failed、MaxStepsExceeded、
/// Cancelled 为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    AwaitingConfirmation,
    AwaitingTakeover,
    Finished,
    Failed,
    MaxStepsExceeded,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Finished
                | SessionStatus::Failed
                | SessionStatus::MaxStepsExceeded
                | SessionStatus::Cancelled
        )
    }

    pub fn is_waiting(&self) -> bool {
        matches!(
            self,
            SessionStatus::AwaitingConfirmation | SessionStatus::AwaitingTakeover
        )
    }
}

/// 单个步骤的执行记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    /// 模型的原始输出（含思考文本）
    pub model_output: String,
    /// 执行的指令摘要
    pub directive: String,
    /// 执行结果信息
    pub result: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// 一次任务的完整会话
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSession {
    pub id: Uuid,
    pub task: String,
    pub status: SessionStatus,
    pub steps: Vec<StepRecord>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// finish 指令带回的结果，或失败原因
    pub final_message: Option<String>,
}

impl AgentSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            task: String::new(),
            status: SessionStatus::Idle,
            steps: Vec::new(),
            started_at: None,
            finished_at: None,
            final_message: None,
        }
    }

    /// 开始新任务，分配新会话 ID 并清空历史
    pub fn start(&mut self, task: &str) {
        self.id = Uuid::new_v4();
        self.task = task.to_string();
        self.status = SessionStatus::Running;
        self.steps.clear();
        self.started_at = Some(Utc::now());
        self.finished_at = None;
        self.final_message = None;
    }

    pub fn record_step(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    /// 落入终态并记录结果
    pub fn finish(&mut self, status: SessionStatus, message: Option<String>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.final_message = message;
        self.finished_at = Some(Utc::now());
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

impl Default for AgentSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut session = AgentSession::new();
        assert_eq!(session.status, SessionStatus::Idle);

        session.start("open settings");
        let first_id = session.id;
        assert_eq!(session.status, SessionStatus::Running);
        assert!(session.started_at.is_some());

        session.finish(SessionStatus::Finished, Some("done".to_string()));
        assert!(session.status.is_terminal());
        assert!(session.finished_at.is_some());

        // 重新开始会换 ID 并清空历史
        session.start("another task");
        assert_ne!(session.id, first_id);
        assert!(session.steps.is_empty());
        assert!(session.final_message.is_none());
    }

    #[test]
    fn test_status_predicates() {
        assert!(SessionStatus::Finished.is_terminal());
        assert!(SessionStatus::Cancelled.is_terminal());
        assert!(!SessionStatus::Running.is_terminal());
        assert!(SessionStatus::AwaitingConfirmation.is_waiting());
        assert!(!SessionStatus::Finished.is_waiting());
    }

    #[test]
    fn test_step_records() {
        let mut session = AgentSession::new();
        session.start("task");
        session.record_step(StepRecord {
            step: 1,
            model_output: "do(action=\"Home\")".to_string(),
            directive: "Home".to_string(),
            result: "回到桌面".to_string(),
            success: true,
            timestamp: Utc::now(),
        });
        assert_eq!(session.step_count(), 1);
    }
}

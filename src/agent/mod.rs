//! Agent 核心：任务会话与执行主循环

pub mod agent;
pub mod session;

pub use agent::{PhoneAgent, StepOutcome};
pub use session::{AgentSession, SessionStatus, StepRecord};

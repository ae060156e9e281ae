//! 模型接入层：OpenAI 兼容客户端、消息类型与系统提示词

pub mod client;
pub mod prompts;
pub mod types;

pub use client::{ModelClient, OpenAIClient};
pub use types::{ChatMessage, ChatRequest, ChatResponse, MessageRole, ModelConfig};

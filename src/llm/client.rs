//! OpenAI 兼容模型客户端

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

use crate::error::AppError;
use crate::llm::types::{
    ChatMessage, ChatRequest, ChatResponse, MessageContent, MessageRole, ModelConfig,
};

/// 模型查询接口
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// 发送对话历史，返回模型的文本输出
    ///
    /// 若提供截图，会挂在最后一条用户消息上。
    async fn query(
        &self,
        messages: Vec<ChatMessage>,
        screenshot: Option<&str>,
    ) -> Result<String, AppError>;
}

/// 基于 reqwest 的默认实现
pub struct OpenAIClient {
    client: Client,
    config: ModelConfig,
}

impl OpenAIClient {
    pub fn new(config: ModelConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| AppError::ModelError(format!("创建 HTTP 客户端失败: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn send_request(&self, request: ChatRequest) -> Result<ChatResponse, AppError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        debug!("📤 发送模型请求: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ModelError(format!("发送请求失败: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::ModelError(format!("读取响应失败: {}", e)))?;

        if !status.is_success() {
            error!("❌ 模型请求失败: {} - {}", status, body);
            return Err(AppError::ModelError(format!(
                "请求失败: {} - {}",
                status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| AppError::ModelError(format!("解析响应失败: {}", e)))
    }
}

/// 把截图挂到最后一条用户消息上
fn attach_screenshot(messages: &mut [ChatMessage], screenshot: &str) {
    if let Some(msg) = messages
        .iter_mut()
        .rev()
        .find(|m| m.role == MessageRole::User)
    {
        if let MessageContent::Text(text) = &msg.content {
            *msg = ChatMessage::user_with_screenshot(text.clone(), screenshot);
        }
    }
}

#[async_trait]
impl ModelClient for OpenAIClient {
    async fn query(
        &self,
        mut messages: Vec<ChatMessage>,
        screenshot: Option<&str>,
    ) -> Result<String, AppError> {
        debug!("🤖 查询模型，消息数: {}", messages.len());

        if let Some(shot) = screenshot {
            attach_screenshot(&mut messages, shot);
        }

        let request = ChatRequest {
            model: self.config.model_name.clone(),
            messages,
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            stream: Some(false),
        };

        let response = self.send_request(request).await?;
        response
            .content()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::ModelError("响应中没有候选内容".to_string()))
    }
}

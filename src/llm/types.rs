use serde::{Deserialize, Serialize};

/// LLM 请求消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// 带截图的用户消息（文本 + base64 图片）
    pub fn user_with_screenshot(text: impl Into<String>, screenshot_base64: &str) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Multimodal(vec![
                ContentBlock {
                    block_type: "text".to_string(),
                    text: Some(text.into()),
                    image_url: None,
                },
                ContentBlock {
                    block_type: "image_url".to_string(),
                    text: None,
                    image_url: Some(ImageUrl::from_base64(screenshot_base64)),
                },
            ]),
        }
    }

    /// 消息的纯文本部分
    pub fn text(&self) -> &str {
        match &self.content {
            MessageContent::Text(t) => t,
            MessageContent::Multimodal(blocks) => blocks
                .iter()
                .find_map(|b| b.text.as_deref())
                .unwrap_or(""),
        }
    }
}

/// 消息角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// 消息内容（支持文本和图片）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Multimodal(Vec<ContentBlock>),
}

/// 内容块
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<ImageUrl>,
}

/// 图片 URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ImageUrl {
    /// 从 base64 创建图片 URL
    pub fn from_base64(base64_data: &str) -> Self {
        Self {
            url: format!("data:image/png;base64,{}", base64_data),
        }
    }
}

/// LLM 请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// LLM 响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: Option<String>,
    pub model: Option<String>,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// 第一个候选的文本内容
    pub fn content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// 候选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: usize,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

/// 响应中的消息（纯文本）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: String,
    pub content: String,
}

/// token 用量
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// 模型连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// OpenAI 兼容 API 的基地址
    pub base_url: String,
    pub model_name: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 请求超时（秒）
    pub timeout: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".to_string(),
            model_name: "autoglm-phone-9b".to_string(),
            api_key: "EMPTY".to_string(),
            temperature: 0.1,
            max_tokens: 1024,
            timeout: 60,
        }
    }
}

impl ModelConfig {
    /// 环境变量覆盖凭据与地址，避免把密钥写进配置文件
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("PHONE_AGENT_API_KEY") {
            self.api_key = key;
        }
        if let Ok(url) = std::env::var("PHONE_AGENT_BASE_URL") {
            self.base_url = url;
        }
        if let Ok(model) = std::env::var("PHONE_AGENT_MODEL") {
            self.model_name = model;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000/v1");
        assert_eq!(config.model_name, "autoglm-phone-9b");
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.timeout, 60);
    }

    #[test]
    fn test_multimodal_message_serialization() {
        let msg = ChatMessage::user_with_screenshot("current screen", "aGVsbG8=");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("image_url"));
        assert!(json.contains("data:image/png;base64,aGVsbG8="));
        assert_eq!(msg.text(), "current screen");
    }

    #[test]
    fn test_response_content_extraction() {
        let json = r#"{
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "do(action=\"Home\")"},
                "finish_reason": "stop"
            }]
        }"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.content(), Some("do(action=\"Home\")"));
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// 归一化屏幕坐标（0-999 网格，与设备分辨率无关）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

/// 坐标网格的最大值
pub const GRID_MAX: i32 = 999;

impl Coordinate {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// 将两个分量都截断到 [0, 999]
    pub fn clamped(&self) -> Self {
        Self {
            x: self.x.clamp(0, GRID_MAX),
            y: self.y.clamp(0, GRID_MAX),
        }
    }

    /// 两个分量是否都在合法范围内
    pub fn in_range(&self) -> bool {
        (0..=GRID_MAX).contains(&self.x) && (0..=GRID_MAX).contains(&self.y)
    }

    /// 从 JSON 数组（如 `[100, 200]`）提取坐标
    pub fn from_value(value: &Value) -> Option<Self> {
        let arr = value.as_array()?;
        if arr.len() != 2 {
            return None;
        }
        let x = arr[0].as_f64()? as i32;
        let y = arr[1].as_f64()? as i32;
        Some(Self { x, y })
    }

    pub fn to_list(&self) -> [i32; 2] {
        [self.x, self.y]
    }
}

/// 操作类型，协议名与模型输出保持一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "Launch")]
    Launch,
    #[serde(rename = "Tap")]
    Tap,
    #[serde(rename = "Type")]
    Type,
    #[serde(rename = "Type_Name")]
    TypeName,
    #[serde(rename = "Swipe")]
    Swipe,
    #[serde(rename = "Back")]
    Back,
    #[serde(rename = "Home")]
    Home,
    #[serde(rename = "Double Tap")]
    DoubleTap,
    #[serde(rename = "Long Press")]
    LongPress,
    #[serde(rename = "Wait")]
    Wait,
    #[serde(rename = "Take_over")]
    TakeOver,
    #[serde(rename = "Note")]
    Note,
    #[serde(rename = "Call_API")]
    CallApi,
    #[serde(rename = "Interact")]
    Interact,
}

/// 全部合法操作
pub const ALL_ACTIONS: [ActionKind; 14] = [
    ActionKind::Launch,
    ActionKind::Tap,
    ActionKind::Type,
    ActionKind::TypeName,
    ActionKind::Swipe,
    ActionKind::Back,
    ActionKind::Home,
    ActionKind::DoubleTap,
    ActionKind::LongPress,
    ActionKind::Wait,
    ActionKind::TakeOver,
    ActionKind::Note,
    ActionKind::CallApi,
    ActionKind::Interact,
];

impl ActionKind {
    /// 协议中的规范名称
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Launch => "Launch",
            ActionKind::Tap => "Tap",
            ActionKind::Type => "Type",
            ActionKind::TypeName => "Type_Name",
            ActionKind::Swipe => "Swipe",
            ActionKind::Back => "Back",
            ActionKind::Home => "Home",
            ActionKind::DoubleTap => "Double Tap",
            ActionKind::LongPress => "Long Press",
            ActionKind::Wait => "Wait",
            ActionKind::TakeOver => "Take_over",
            ActionKind::Note => "Note",
            ActionKind::CallApi => "Call_API",
            ActionKind::Interact => "Interact",
        }
    }

    /// 按规范名称严格匹配
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_ACTIONS.iter().copied().find(|a| a.as_str() == name)
    }

    /// 大小写不敏感的别名匹配（用于 sanitize）
    /// 同时吸收常见的变体写法，如 `DoubleTap`、`long_press`
    pub fn from_alias(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "launch" => Some(ActionKind::Launch),
            "tap" => Some(ActionKind::Tap),
            "type" => Some(ActionKind::Type),
            "typename" => Some(ActionKind::TypeName),
            "swipe" => Some(ActionKind::Swipe),
            "back" => Some(ActionKind::Back),
            "home" => Some(ActionKind::Home),
            "doubletap" => Some(ActionKind::DoubleTap),
            "longpress" => Some(ActionKind::LongPress),
            "wait" => Some(ActionKind::Wait),
            "takeover" => Some(ActionKind::TakeOver),
            "note" => Some(ActionKind::Note),
            "callapi" => Some(ActionKind::CallApi),
            "interact" => Some(ActionKind::Interact),
            _ => None,
        }
    }

    /// 每种操作必须携带的字段
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            ActionKind::Launch => &["app"],
            ActionKind::Tap | ActionKind::DoubleTap | ActionKind::LongPress => &["element"],
            ActionKind::Type | ActionKind::TypeName => &["text"],
            ActionKind::Swipe => &["start", "end"],
            ActionKind::Wait => &["duration"],
            _ => &[],
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 调用形式：`do(...)` 或 `finish(...)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Do,
    Finish,
}

/// 解析器产出的原始指令候选（校验前）
///
/// 字段按解析顺序原样保留，未知键保留但下游忽略。
#[derive(Debug, Clone, PartialEq)]
pub struct RawDirective {
    pub call: CallKind,
    pub args: serde_json::Map<String, Value>,
}

impl RawDirective {
    pub fn new(call: CallKind) -> Self {
        Self {
            call,
            args: serde_json::Map::new(),
        }
    }

    /// 读取字符串字段
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(|v| v.as_str())
    }

    /// 读取坐标字段（不截断、不校验范围）
    pub fn get_coords(&self, key: &str) -> Option<Coordinate> {
        self.args.get(key).and_then(Coordinate::from_value)
    }

    /// `action` 字段的原始文本
    pub fn action_name(&self) -> Option<&str> {
        self.get_str("action")
    }
}

/// 经过校验的结构化指令，执行器只接受该形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_metadata", rename_all = "lowercase")]
pub enum Directive {
    #[serde(rename = "do")]
    Execute {
        action: ActionKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        element: Option<Coordinate>,
        #[serde(skip_serializing_if = "Option::is_none")]
        start: Option<Coordinate>,
        #[serde(skip_serializing_if = "Option::is_none")]
        end: Option<Coordinate>,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        app: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        instruction: Option<String>,
    },
    #[serde(rename = "finish")]
    Finish {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl Directive {
    /// 从校验通过的原始候选构造结构化指令
    ///
    /// 调用方必须先经过 sanitize + validate；此处只做字段搬运，
    /// 遇到无法识别的 action 仍返回错误而不是 panic。
    pub fn from_raw(raw: &RawDirective) -> Result<Self, AppError> {
        match raw.call {
            CallKind::Finish => Ok(Directive::Finish {
                message: raw.get_str("message").map(|s| s.to_string()),
            }),
            CallKind::Do => {
                let name = raw
                    .action_name()
                    .ok_or_else(|| AppError::ValidationError("缺少 action 字段".to_string()))?;
                let action = ActionKind::from_name(name).ok_or_else(|| {
                    AppError::ValidationError(format!("未知操作: {}", name))
                })?;
                // duration 可能是数字字面量，统一转成字符串保存
                let duration = raw.args.get("duration").map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
                Ok(Directive::Execute {
                    action,
                    element: raw.get_coords("element"),
                    start: raw.get_coords("start"),
                    end: raw.get_coords("end"),
                    text: raw.get_str("text").map(|s| s.to_string()),
                    app: raw.get_str("app").map(|s| s.to_string()),
                    message: raw.get_str("message").map(|s| s.to_string()),
                    duration,
                    instruction: raw.get_str("instruction").map(|s| s.to_string()),
                })
            }
        }
    }

    /// 指令的操作类型（Finish 返回 None）
    pub fn action(&self) -> Option<ActionKind> {
        match self {
            Directive::Execute { action, .. } => Some(*action),
            Directive::Finish { .. } => None,
        }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Directive::Finish { .. })
    }

    /// 简短描述，用于日志与历史记录
    pub fn describe(&self) -> String {
        match self {
            Directive::Finish { message } => match message {
                Some(m) => format!("finish: {}", m),
                None => "finish".to_string(),
            },
            Directive::Execute {
                action,
                element,
                start,
                end,
                text,
                app,
                duration,
                ..
            } => {
                let mut out = action.as_str().to_string();
                if let Some(c) = element {
                    out.push_str(&format!(" @({},{})", c.x, c.y));
                }
                if let (Some(s), Some(e)) = (start, end) {
                    out.push_str(&format!(" ({},{})->({},{})", s.x, s.y, e.x, e.y));
                }
                if let Some(t) = text {
                    out.push_str(&format!(" \"{}\"", t));
                }
                if let Some(a) = app {
                    out.push_str(&format!(" app={}", a));
                }
                if let Some(d) = duration {
                    out.push_str(&format!(" {}s", d));
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coordinate_clamp() {
        assert_eq!(Coordinate::new(1500, -50).clamped(), Coordinate::new(999, 0));
        assert_eq!(Coordinate::new(100, 200).clamped(), Coordinate::new(100, 200));
    }

    #[test]
    fn test_coordinate_from_value() {
        assert_eq!(
            Coordinate::from_value(&json!([100, 200])),
            Some(Coordinate::new(100, 200))
        );
        assert_eq!(Coordinate::from_value(&json!([100])), None);
        assert_eq!(Coordinate::from_value(&json!("oops")), None);
    }

    #[test]
    fn test_action_kind_names() {
        assert_eq!(ActionKind::from_name("Tap"), Some(ActionKind::Tap));
        assert_eq!(ActionKind::from_name("Double Tap"), Some(ActionKind::DoubleTap));
        assert_eq!(ActionKind::from_name("tap"), None);
        assert_eq!(ActionKind::from_alias("TAP"), Some(ActionKind::Tap));
        assert_eq!(ActionKind::from_alias("double_tap"), Some(ActionKind::DoubleTap));
        assert_eq!(ActionKind::from_alias("Take_over"), Some(ActionKind::TakeOver));
        assert_eq!(ActionKind::from_alias("nope"), None);
    }

    #[test]
    fn test_required_fields() {
        assert_eq!(ActionKind::Swipe.required_fields(), &["start", "end"]);
        assert_eq!(ActionKind::Back.required_fields(), &[] as &[&str]);
    }

    #[test]
    fn test_directive_from_raw_tap() {
        let mut raw = RawDirective::new(CallKind::Do);
        raw.args.insert("action".into(), json!("Tap"));
        raw.args.insert("element".into(), json!([100, 200]));

        let d = Directive::from_raw(&raw).unwrap();
        match d {
            Directive::Execute { action, element, .. } => {
                assert_eq!(action, ActionKind::Tap);
                assert_eq!(element, Some(Coordinate::new(100, 200)));
            }
            _ => panic!("expected execute directive"),
        }
    }

    #[test]
    fn test_directive_serde_roundtrip() {
        let d = Directive::Execute {
            action: ActionKind::Swipe,
            element: None,
            start: Some(Coordinate::new(0, 500)),
            end: Some(Coordinate::new(0, 100)),
            text: None,
            app: None,
            message: None,
            duration: None,
            instruction: None,
        };
        let s = serde_json::to_string(&d).unwrap();
        assert!(s.contains("\"_metadata\":\"do\""));
        let back: Directive = serde_json::from_str(&s).unwrap();
        assert_eq!(back, d);
    }
}

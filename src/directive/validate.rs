//! 指令校验与修正
//!
//! `sanitize` 在前做尽力而为的自动修正，`validate` 在后做纯函数式检查。
//! 两者相互独立；调用方应 sanitize → validate，有 error 即拒绝
//! （warning 不阻塞执行）。
//!
//! 错误文案保持英文，会原样回传给模型作为重试反馈。

use serde_json::Value;
use tracing::{debug, warn};

use crate::directive::types::{ActionKind, CallKind, RawDirective, GRID_MAX};

/// 校验结果，构造后不再变化
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// 汇总为一段反馈文本（用于模型重试提示）
    pub fn summary(&self) -> String {
        self.errors.join("; ")
    }
}

/// 校验一条原始指令候选
///
/// 纯函数：不修改输入，相同输入恒得相同结果。
pub fn validate(raw: &RawDirective) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // finish 只需要 message，缺失仅作告警
    if raw.call == CallKind::Finish {
        if !raw.args.contains_key("message") {
            warnings.push("finish action without message".to_string());
        }
        return ValidationResult {
            is_valid: true,
            errors,
            warnings,
        };
    }

    let action_name = match raw.action_name() {
        Some(name) => name.to_string(),
        None => {
            errors.push("Missing 'action' field".to_string());
            return ValidationResult {
                is_valid: false,
                errors,
                warnings,
            };
        }
    };

    let action = match ActionKind::from_name(&action_name) {
        Some(a) => a,
        None => {
            errors.push(format!("Unknown action: {}", action_name));
            return ValidationResult {
                is_valid: false,
                errors,
                warnings,
            };
        }
    };

    for field in action.required_fields() {
        if !raw.args.contains_key(*field) {
            errors.push(format!(
                "Missing required field '{}' for action '{}'",
                field, action_name
            ));
        }
    }

    for field in ["element", "start", "end"] {
        if let Some(value) = raw.args.get(field) {
            check_coordinates(value, field, &mut errors);
        }
    }

    if action == ActionKind::Wait {
        if let Some(value) = raw.args.get("duration") {
            check_duration(value, &mut errors, &mut warnings);
        }
    }

    let is_valid = errors.is_empty();
    if !is_valid {
        warn!("指令校验失败: {:?}", errors);
    } else if !warnings.is_empty() {
        debug!("指令校验告警: {:?}", warnings);
    }

    ValidationResult {
        is_valid,
        errors,
        warnings,
    }
}

/// 坐标字段必须是两元素数字数组，分量在 [0, 999]
fn check_coordinates(value: &Value, field: &str, errors: &mut Vec<String>) {
    let arr = match value.as_array() {
        Some(a) => a,
        None => {
            errors.push(format!("{} must be a list, got {}", field, type_name(value)));
            return;
        }
    };

    if arr.len() != 2 {
        errors.push(format!("{} must have 2 values, got {}", field, arr.len()));
        return;
    }

    for (i, item) in arr.iter().enumerate() {
        match item.as_f64() {
            None => {
                errors.push(format!(
                    "{}[{}] must be a number, got {}",
                    field,
                    i,
                    type_name(item)
                ));
            }
            Some(v) if v < 0.0 || v > GRID_MAX as f64 => {
                errors.push(format!(
                    "{}[{}]={} out of range (0-{})",
                    field,
                    i,
                    trim_float(v),
                    GRID_MAX
                ));
            }
            Some(_) => {}
        }
    }
}

/// Wait 的 duration：去掉 "seconds"/"s" 后缀再按浮点解析
fn check_duration(value: &Value, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match parse_duration_secs(&text) {
        Some(secs) if secs < 0.0 => {
            errors.push("Wait duration cannot be negative".to_string());
        }
        Some(secs) if secs > 60.0 => {
            warnings.push(format!("Long wait duration: {}s", trim_float(secs)));
        }
        Some(_) => {}
        None => {
            errors.push(format!("Invalid duration format: {}", text));
        }
    }
}

/// 解析 "5"、"5s"、"5 seconds" 等形式为秒数
pub fn parse_duration_secs(text: &str) -> Option<f64> {
    text.replace("seconds", "")
        .replace('s', "")
        .trim()
        .parse::<f64>()
        .ok()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// 整数值不带小数点输出
fn trim_float(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// 尽力修正常见问题，绝不失败
///
/// 1. 坐标分量截断到 [0, 999]；
/// 2. 操作名按别名表归一化（`tap`/`TAP` → `Tap`）。
/// 幂等：sanitize(sanitize(x)) == sanitize(x)。
pub fn sanitize(raw: &RawDirective) -> RawDirective {
    let mut out = raw.clone();

    for field in ["element", "start", "end"] {
        if let Some(Value::Array(items)) = out.args.get(field) {
            if items.iter().all(|v| v.as_f64().is_some()) {
                let clamped: Vec<Value> = items
                    .iter()
                    .map(|v| {
                        let n = v.as_f64().unwrap_or(0.0) as i64;
                        Value::from(n.clamp(0, GRID_MAX as i64))
                    })
                    .collect();
                out.args.insert(field.to_string(), Value::Array(clamped));
            }
        }
    }

    if let Some(name) = out.action_name().map(|s| s.to_string()) {
        if ActionKind::from_name(&name).is_none() {
            if let Some(kind) = ActionKind::from_alias(&name) {
                debug!("修正操作名: {} -> {}", name, kind.as_str());
                out.args
                    .insert("action".to_string(), Value::String(kind.as_str().to_string()));
            }
        }
    }

    out
}

//! 安全指令解析器
//!
//! 将模型输出的 `do(...)` / `finish(...)` 文本解析为结构化候选，
//! 只做受限文法上的结构匹配，绝不把输入当作代码求值。
//! 合法调用之后的多余内容（例如拼接的代码片段）一律忽略。

use serde_json::Value;
use tracing::{debug, warn};

use crate::directive::types::{CallKind, RawDirective};
use crate::error::AppError;

/// 从模型响应中解析指令候选
///
/// 支持两种调用形式（finish 优先），两种引号风格。
/// 解析是确定性的、无副作用的；失败返回 `ParseError`。
pub fn parse_directive(text: &str) -> Result<RawDirective, AppError> {
    debug!("🔍 解析模型响应，长度 {} 字符", text.len());

    if let Some(span) = find_call_span(text, "finish") {
        debug!("✅ 匹配到 finish(...) 调用");
        return parse_args(CallKind::Finish, span);
    }

    if let Some(span) = find_call_span(text, "do") {
        debug!("✅ 匹配到 do(...) 调用");
        return parse_args(CallKind::Do, span);
    }

    warn!("❌ 未找到 do(...) 或 finish(...) 调用");
    Err(AppError::ParseError(format!(
        "未找到可识别的指令调用: {}",
        snippet(text)
    )))
}

/// 截取用于报错的文本片段
fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > 80 {
        let head: String = trimmed.chars().take(80).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}

/// 定位 `name(` 调用并返回括号内的参数文本
///
/// 用引号感知的括号计数找到配对的右括号，之后的内容全部丢弃。
fn find_call_span<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find(name) {
        let start = search_from + rel;
        // 调用名必须是独立 token，避免把 "finished(" 之类误判为调用
        let prev_ok = text[..start]
            .chars()
            .next_back()
            .map(|c| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(true);
        let after = &text[start + name.len()..];
        let after_trim = after.trim_start();
        if prev_ok && after_trim.starts_with('(') {
            let open = start + name.len() + (after.len() - after_trim.len());
            if let Some(close) = matching_paren(text, open) {
                return Some(&text[open + 1..close]);
            }
        }
        search_from = start + name.len();
    }
    None
}

/// 从 `open`（指向 `(`）开始找配对的 `)`，引号内的括号不计数
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for (i, c) in text[open..].char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' | '[' => depth += 1,
                ')' | ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(open + i);
                    }
                }
                _ => {}
            },
        }
    }
    None
}

/// 解析括号内的参数列表
fn parse_args(call: CallKind, args_str: &str) -> Result<RawDirective, AppError> {
    let mut raw = RawDirective::new(call);

    for piece in split_top_level(args_str) {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        match split_pair(piece) {
            Some((key, value_str)) => {
                let value = parse_value(value_str);
                debug!("  📌 参数: {} = {}", key, value);
                raw.args.insert(key.to_string(), value);
            }
            None => {
                // finish("...") 形式：唯一的裸引号串当作 message
                if call == CallKind::Finish && is_quoted(piece) {
                    raw.args
                        .insert("message".to_string(), parse_value(piece));
                } else {
                    debug!("  ⚠️  忽略无法识别的参数片段: {}", piece);
                }
            }
        }
    }

    if call == CallKind::Do && raw.action_name().is_none() {
        return Err(AppError::ParseError(format!(
            "do(...) 缺少 action 参数: {}",
            snippet(args_str)
        )));
    }

    Ok(raw)
}

/// 按顶层逗号切分参数，引号与括号内的逗号不切
fn split_top_level(s: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' | '(' | '{' => depth += 1,
                ']' | ')' | '}' => depth -= 1,
                ',' if depth == 0 => {
                    pieces.push(&s[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    pieces.push(&s[start..]);
    pieces
}

/// 切出 key 与 value（等号必须在引号外）
fn split_pair(piece: &str) -> Option<(&str, &str)> {
    let mut quote: Option<char> = None;
    for (i, c) in piece.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '=' => {
                    let key = piece[..i].trim();
                    let value = piece[i + 1..].trim();
                    if key.is_empty()
                        || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                    {
                        return None;
                    }
                    return Some((key, value));
                }
                _ => {}
            },
        }
    }
    None
}

fn is_quoted(s: &str) -> bool {
    (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
}

/// 解析单个值：引号串、两元素数字列表或裸 token
///
/// 引号串只做去引号，不处理转义序列；列表只接受数字元素。
fn parse_value(s: &str) -> Value {
    let s = s.trim();

    if is_quoted(s) {
        return Value::String(s[1..s.len() - 1].to_string());
    }

    if s.starts_with('[') && s.ends_with(']') {
        let inner = &s[1..s.len() - 1];
        let items: Vec<Value> = inner
            .split(',')
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(parse_scalar)
            .collect();
        return Value::Array(items);
    }

    parse_scalar(s)
}

/// 裸 token：整数、小数、布尔，否则按字符串保留
fn parse_scalar(s: &str) -> Value {
    if let Ok(i) = s.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match s {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        _ => Value::String(s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tap_action() {
        let raw = parse_directive(r#"do(action="Tap", element=[100, 200])"#).unwrap();
        assert_eq!(raw.call, CallKind::Do);
        assert_eq!(raw.action_name(), Some("Tap"));
        assert_eq!(raw.args.get("element"), Some(&json!([100, 200])));
    }

    #[test]
    fn test_parse_swipe_action() {
        let raw = parse_directive(r#"do(action="Swipe", start=[0, 500], end=[0, 100])"#).unwrap();
        assert_eq!(raw.args.get("start"), Some(&json!([0, 500])));
        assert_eq!(raw.args.get("end"), Some(&json!([0, 100])));
    }

    #[test]
    fn test_parse_type_action() {
        let raw = parse_directive(r#"do(action="Type", text="Hello World")"#).unwrap();
        assert_eq!(raw.get_str("text"), Some("Hello World"));
    }

    #[test]
    fn test_parse_launch_action() {
        let raw = parse_directive(r#"do(action="Launch", app="Chrome")"#).unwrap();
        assert_eq!(raw.get_str("app"), Some("Chrome"));
    }

    #[test]
    fn test_parse_finish_action() {
        let raw = parse_directive(r#"finish(message="Task completed successfully")"#).unwrap();
        assert_eq!(raw.call, CallKind::Finish);
        assert_eq!(raw.get_str("message"), Some("Task completed successfully"));
    }

    #[test]
    fn test_parse_finish_positional_message() {
        let raw = parse_directive(r#"finish("All done")"#).unwrap();
        assert_eq!(raw.get_str("message"), Some("All done"));
    }

    #[test]
    fn test_parse_back_without_fields() {
        let raw = parse_directive(r#"do(action="Back")"#).unwrap();
        assert_eq!(raw.action_name(), Some("Back"));
    }

    #[test]
    fn test_parse_single_quotes() {
        let raw = parse_directive("do(action='Tap', element=[50, 50])").unwrap();
        assert_eq!(raw.action_name(), Some("Tap"));
        assert_eq!(raw.args.get("element"), Some(&json!([50, 50])));
    }

    #[test]
    fn test_trailing_payload_is_ignored() {
        // 合法调用后拼接的代码不会被解释，也不会进入参数表
        let raw = parse_directive(
            r#"do(action="Tap", element=[10, 20]) or __import__("os").system("echo hacked")"#,
        )
        .unwrap();
        assert_eq!(raw.action_name(), Some("Tap"));
        assert_eq!(raw.args.get("element"), Some(&json!([10, 20])));
        assert!(!raw.args.keys().any(|k| k.contains("import")));
    }

    #[test]
    fn test_reasoning_prefix_is_skipped() {
        let text = "先打开设置页面。\ndo(action=\"Launch\", app=\"Settings\")";
        let raw = parse_directive(text).unwrap();
        assert_eq!(raw.get_str("app"), Some("Settings"));
    }

    #[test]
    fn test_quoted_parens_and_commas() {
        let raw =
            parse_directive(r#"finish(message="Done (all 3, no errors)")"#).unwrap();
        assert_eq!(raw.get_str("message"), Some("Done (all 3, no errors)"));
    }

    #[test]
    fn test_finished_is_not_finish() {
        // "finished(" 不是合法调用名
        let err = parse_directive("the task finished(probably)").unwrap_err();
        assert!(matches!(err, AppError::ParseError(_)));
    }

    #[test]
    fn test_invalid_format_fails() {
        assert!(parse_directive("invalid format").is_err());
        assert!(parse_directive("").is_err());
    }

    #[test]
    fn test_do_without_action_fails() {
        assert!(parse_directive("do(element=[1, 2])").is_err());
    }

    #[test]
    fn test_unknown_keys_are_preserved() {
        let raw = parse_directive(r#"do(action="Tap", element=[1, 2], foo="bar")"#).unwrap();
        assert_eq!(raw.get_str("foo"), Some("bar"));
    }

    #[test]
    fn test_bare_number_duration() {
        let raw = parse_directive(r#"do(action="Wait", duration=5)"#).unwrap();
        assert_eq!(raw.args.get("duration"), Some(&json!(5)));
    }
}

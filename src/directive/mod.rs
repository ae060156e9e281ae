//! 指令管线：解析 → 修正 → 校验 → 结构化
//!
//! 模型输出的自由文本经 `parser` 得到原始候选，`validate::sanitize`
//! 做尽力修正，`validate::validate` 做纯函数检查，最后由
//! `types::Directive::from_raw` 得到执行器可用的结构化指令。

pub mod parser;
pub mod types;
pub mod validate;

pub use parser::parse_directive;
pub use types::{ActionKind, CallKind, Coordinate, Directive, RawDirective, ALL_ACTIONS, GRID_MAX};
pub use validate::{sanitize, validate, ValidationResult};

use crate::error::AppError;

/// 完整管线：文本 → 结构化指令
///
/// 校验不通过时返回 `ValidationError`，错误文案可直接回传给模型。
pub fn parse_and_validate(text: &str) -> Result<Directive, AppError> {
    let raw = parse_directive(text)?;
    let fixed = sanitize(&raw);
    let result = validate(&fixed);
    if !result.is_valid {
        return Err(AppError::ValidationError(result.summary()));
    }
    Directive::from_raw(&fixed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_valid_tap() {
        let d = parse_and_validate(r#"do(action="Tap", element=[100, 200])"#).unwrap();
        assert_eq!(d.action(), Some(ActionKind::Tap));
    }

    #[test]
    fn test_pipeline_sanitizes_before_validation() {
        // 越界坐标先被截断，因此不再报错
        let d = parse_and_validate(r#"do(action="tap", element=[1500, -3])"#).unwrap();
        match d {
            Directive::Execute { element, .. } => {
                assert_eq!(element, Some(Coordinate::new(999, 0)));
            }
            _ => panic!("expected execute directive"),
        }
    }

    #[test]
    fn test_pipeline_rejects_unknown_action() {
        let err = parse_and_validate(r#"do(action="Teleport")"#).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_pipeline_finish() {
        let d = parse_and_validate(r#"finish(message="done")"#).unwrap();
        assert!(d.is_finish());
    }
}

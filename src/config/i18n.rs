//! 界面提示文案（英/俄）

use crate::config::Language;

/// 按键与语言取一条提示文案，未命中返回空串
pub fn get_message(key: &str, lang: Language) -> &'static str {
    let table = match lang {
        Language::En => MESSAGES_EN,
        Language::Ru => MESSAGES_RU,
    };
    table
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .unwrap_or("")
}

const MESSAGES_EN: &[(&str, &str)] = &[
    ("thinking", "Thinking"),
    ("action", "Action"),
    ("task_completed", "Task Completed"),
    ("done", "Done"),
    ("starting_task", "Starting task"),
    ("final_result", "Final Result"),
    ("task_result", "Task Result"),
    ("confirmation_required", "Confirmation Required"),
    ("continue_prompt", "Continue? (y/n)"),
    ("manual_operation_required", "Manual Operation Required"),
    ("manual_operation_hint", "Please complete the operation manually..."),
    ("press_enter_when_done", "Press Enter when done"),
    ("connection_failed", "Connection Failed"),
    ("connection_successful", "Connection Successful"),
    ("step", "Step"),
    ("task", "Task"),
    ("result", "Result"),
];

const MESSAGES_RU: &[(&str, &str)] = &[
    ("thinking", "Размышление"),
    ("action", "Действие"),
    ("task_completed", "Задача выполнена"),
    ("done", "Готово"),
    ("starting_task", "Начинаю выполнение задачи"),
    ("final_result", "Итоговый результат"),
    ("task_result", "Результат задачи"),
    ("confirmation_required", "Требуется подтверждение"),
    ("continue_prompt", "Продолжить? (y/n)"),
    ("manual_operation_required", "Требуется ручное управление"),
    ("manual_operation_hint", "Пожалуйста, выполните операцию вручную..."),
    ("press_enter_when_done", "Нажмите Enter после завершения"),
    ("connection_failed", "Ошибка подключения"),
    ("connection_successful", "Подключение успешно"),
    ("step", "Шаг"),
    ("task", "Задача"),
    ("result", "Результат"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_en_lookup() {
        assert_eq!(get_message("done", Language::En), "Done");
    }

    #[test]
    fn test_ru_lookup() {
        assert_eq!(get_message("done", Language::Ru), "Готово");
    }

    #[test]
    fn test_tables_cover_same_keys() {
        for (key, _) in MESSAGES_EN {
            assert!(
                MESSAGES_RU.iter().any(|(k, _)| k == key),
                "missing ru key: {}",
                key
            );
        }
    }
}

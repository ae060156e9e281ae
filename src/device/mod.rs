//! 设备层：ADB 命令执行、状态探测与 UI 层级解析

pub mod command;
pub mod state;
pub mod ui_tree;

pub use command::{AdbRunner, CommandRunner};
pub use state::{DeviceState, LockState, ScreenState};
pub use ui_tree::{ElementQuery, UiElement, UiTree};

//! uiautomator UI 层级解析
//!
//! 把 `uiautomator dump` 的 XML 解析成元素树，支持按文本、
//! resource-id、类名等条件查找，为坐标操作提供精确定位。

use std::sync::OnceLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::device::command::CommandRunner;
use crate::directive::types::{Coordinate, GRID_MAX};
use crate::error::AppError;

const UI_DUMP_PATH: &str = "/sdcard/ui_dump.xml";

/// 视图层级中的一个元素
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiElement {
    pub resource_id: String,
    pub class_name: String,
    pub text: String,
    pub content_desc: String,
    /// (left, top, right, bottom) 像素边界
    pub bounds: (i32, i32, i32, i32),
    pub clickable: bool,
    pub scrollable: bool,
    pub focusable: bool,
    pub enabled: bool,
    pub selected: bool,
    pub checked: bool,
    pub children: Vec<UiElement>,
}

impl UiElement {
    /// 元素中心的像素坐标
    pub fn center(&self) -> (i32, i32) {
        let (left, top, right, bottom) = self.bounds;
        ((left + right) / 2, (top + bottom) / 2)
    }

    /// 元素中心换算到 0-999 网格
    pub fn center_normalized(&self, screen_width: i32, screen_height: i32) -> Coordinate {
        let (x, y) = self.center();
        Coordinate::new(
            (x * GRID_MAX / screen_width.max(1)).min(GRID_MAX),
            (y * GRID_MAX / screen_height.max(1)).min(GRID_MAX),
        )
    }

    /// 可展示文本：text → content-desc → resource-id 尾段
    pub fn display_text(&self) -> &str {
        if !self.text.is_empty() {
            return &self.text;
        }
        if !self.content_desc.is_empty() {
            return &self.content_desc;
        }
        self.resource_id.rsplit('/').next().unwrap_or("")
    }

    fn matches(&self, query: &ElementQuery) -> bool {
        if let Some(text) = &query.text {
            if !self.text.to_lowercase().contains(&text.to_lowercase()) {
                return false;
            }
        }
        if let Some(id) = &query.resource_id {
            if !self.resource_id.contains(id.as_str()) {
                return false;
            }
        }
        if let Some(class) = &query.class_name {
            if !self.class_name.contains(class.as_str()) {
                return false;
            }
        }
        if let Some(desc) = &query.content_desc {
            if !self
                .content_desc
                .to_lowercase()
                .contains(&desc.to_lowercase())
            {
                return false;
            }
        }
        if let Some(clickable) = query.clickable {
            if self.clickable != clickable {
                return false;
            }
        }
        true
    }
}

/// 元素查找条件（None 表示不限制）
#[derive(Debug, Clone, Default)]
pub struct ElementQuery {
    pub text: Option<String>,
    pub resource_id: Option<String>,
    pub class_name: Option<String>,
    pub content_desc: Option<String>,
    pub clickable: Option<bool>,
}

impl ElementQuery {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn class_name(class_name: &str) -> Self {
        Self {
            class_name: Some(class_name.to_string()),
            ..Default::default()
        }
    }

    pub fn clickable(mut self, clickable: bool) -> Self {
        self.clickable = Some(clickable);
        self
    }
}

/// 解析后的完整层级树
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiTree {
    pub root: Option<UiElement>,
    pub screen_width: i32,
    pub screen_height: i32,
}

impl UiTree {
    pub fn new() -> Self {
        Self {
            root: None,
            screen_width: 1080,
            screen_height: 1920,
        }
    }

    /// 深度优先查找所有匹配条件的元素
    pub fn find_all(&self, query: &ElementQuery) -> Vec<&UiElement> {
        let mut results = Vec::new();
        if let Some(root) = &self.root {
            Self::search(root, query, &mut results);
        }
        results
    }

    fn search<'a>(element: &'a UiElement, query: &ElementQuery, out: &mut Vec<&'a UiElement>) {
        if element.matches(query) {
            out.push(element);
        }
        for child in &element.children {
            Self::search(child, query, out);
        }
    }

    /// 第一个匹配条件的元素
    pub fn find_one(&self, query: &ElementQuery) -> Option<&UiElement> {
        self.find_all(query).into_iter().next()
    }

    /// 按文本查找（text 或 content-desc 命中均算）
    pub fn find_by_text(&self, text: &str, exact: bool) -> Vec<&UiElement> {
        let mut results = Vec::new();
        let needle = text.to_lowercase();
        if let Some(root) = &self.root {
            Self::search_text(root, text, &needle, exact, &mut results);
        }
        results
    }

    fn search_text<'a>(
        element: &'a UiElement,
        text: &str,
        needle: &str,
        exact: bool,
        out: &mut Vec<&'a UiElement>,
    ) {
        let hit = if exact {
            element.text == text || element.content_desc == text
        } else {
            element.text.to_lowercase().contains(needle)
                || element.content_desc.to_lowercase().contains(needle)
        };
        if hit {
            out.push(element);
        }
        for child in &element.children {
            Self::search_text(child, text, needle, exact, out);
        }
    }

    pub fn get_clickable_elements(&self) -> Vec<&UiElement> {
        self.find_all(&ElementQuery::default().clickable(true))
    }

    pub fn get_input_fields(&self) -> Vec<&UiElement> {
        self.find_all(&ElementQuery::class_name("EditText"))
    }

    /// 按文本定位元素并返回其中心的 0-999 网格坐标
    pub fn find_element_coordinates(&self, text: &str) -> Option<Coordinate> {
        self.find_by_text(text, false)
            .first()
            .map(|el| el.center_normalized(self.screen_width, self.screen_height))
    }
}

/// 从设备导出 UI 层级 XML
pub async fn dump_ui_hierarchy(runner: &dyn CommandRunner) -> Result<String, AppError> {
    let dump = runner
        .shell(&format!("uiautomator dump {}", UI_DUMP_PATH))
        .await?;
    if !dump.contains("UI hierchary dumped") && !dump.to_lowercase().contains("dumped to") {
        warn!("⚠️  UI dump 可能失败: {}", dump.trim());
    }
    runner.shell(&format!("cat {}", UI_DUMP_PATH)).await
}

/// 导出并解析，一步到位
pub async fn get_ui_tree(runner: &dyn CommandRunner) -> Result<UiTree, AppError> {
    let xml = dump_ui_hierarchy(runner).await?;
    parse_ui_tree(&xml)
}

/// 解析 uiautomator XML 为元素树
pub fn parse_ui_tree(xml_content: &str) -> Result<UiTree, AppError> {
    let mut reader = Reader::from_str(xml_content);
    reader.config_mut().trim_text(true);

    let mut tree = UiTree::new();
    // 当前未闭合的祖先链
    let mut stack: Vec<UiElement> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.name().as_ref() == b"node" || e.name().as_ref() == b"hierarchy" {
                    stack.push(parse_node(&e));
                }
            }
            Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"node" {
                    let element = parse_node(&e);
                    attach(&mut stack, &mut tree, element);
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"node" || e.name().as_ref() == b"hierarchy" {
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut tree, element);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(AppError::ParseError(format!("UI XML 解析失败: {}", e)));
            }
        }
    }

    Ok(tree)
}

fn attach(stack: &mut [UiElement], tree: &mut UiTree, element: UiElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            // 根节点（hierarchy 本身无 bounds 时取首个子节点）边界即屏幕尺寸
            let (_, _, right, bottom) = match element.bounds {
                (0, 0, 0, 0) => element.children.first().map(|c| c.bounds).unwrap_or_default(),
                bounds => bounds,
            };
            if right > 0 && bottom > 0 {
                tree.screen_width = right;
                tree.screen_height = bottom;
            }
            tree.root = Some(element);
        }
    }
}

fn parse_node(e: &BytesStart<'_>) -> UiElement {
    let mut element = UiElement {
        enabled: true,
        ..Default::default()
    };

    for attr in e.attributes().flatten() {
        let value = match attr.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => continue,
        };
        match attr.key.as_ref() {
            b"resource-id" => element.resource_id = value,
            b"class" => element.class_name = value,
            b"text" => element.text = value,
            b"content-desc" => element.content_desc = value,
            b"bounds" => element.bounds = parse_bounds(&value),
            b"clickable" => element.clickable = value == "true",
            b"scrollable" => element.scrollable = value == "true",
            b"focusable" => element.focusable = value == "true",
            b"enabled" => element.enabled = value == "true",
            b"selected" => element.selected = value == "true",
            b"checked" => element.checked = value == "true",
            _ => {}
        }
    }

    element
}

/// 解析 `[left,top][right,bottom]` 形式的边界
fn parse_bounds(s: &str) -> (i32, i32, i32, i32) {
    static BOUNDS_RE: OnceLock<Regex> = OnceLock::new();
    let re = BOUNDS_RE
        .get_or_init(|| Regex::new(r"\[(\d+),(\d+)\]\[(\d+),(\d+)\]").unwrap());

    match re.captures(s) {
        Some(caps) => {
            let n = |i: usize| caps[i].parse::<i32>().unwrap_or(0);
            (n(1), n(2), n(3), n(4))
        }
        None => (0, 0, 0, 0),
    }
}

//! 文档头扫描模块
//!
//! 从原始文档中提取每个拆分片段都要复用的头部材料：XML声明、DOCTYPE、
//! `<html>` 开始标签、`<head>` 块和 `<body>` 开始标签。缺失的部分使用固定的默认值。

use once_cell::sync::Lazy;
use regex::Regex;

/// 默认XML声明
pub const DEFAULT_XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;
/// 默认DOCTYPE
pub const DEFAULT_DOCTYPE: &str = "<!DOCTYPE html>";
/// 默认根元素开始标签，声明XHTML与EPUB结构命名空间
pub const DEFAULT_HTML_OPEN: &str =
    r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">"#;
/// 默认head块
pub const DEFAULT_HEAD: &str =
    r#"<head><title></title><link rel="stylesheet" type="text/css" href="css/style.css"/></head>"#;
/// 默认body开始标签
pub const DEFAULT_BODY_OPEN: &str = r#"<body style="background: white;">"#;

static XML_DECLARATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\?xml[^>]*>").unwrap());
static DOCTYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<!DOCTYPE[^>]*>").unwrap());
static HTML_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<html[^>]*>").unwrap());
static HEAD_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<head.*?</head>").unwrap());
static BODY_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<body[^>]*>").unwrap());
static BODY_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</body>").unwrap());

static IE_CONDITIONAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<!--\[if IE\]>.*?<!\[endif\]-->").unwrap());
static HTTP_EQUIV_META: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<meta[^>]*http-equiv[^>]*>").unwrap());
static STRAY_HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</?html[^>]*>").unwrap());
static STRAY_BODY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</?body[^>]*>").unwrap());

/// 移除 `<!--[if IE]> ... <![endif]-->` 条件注释块
pub fn strip_conditional_comments(text: &str) -> String {
    IE_CONDITIONAL.replace_all(text, "").into_owned()
}

/// 移除带 `http-equiv` 属性的 `<meta>` 标签
pub fn strip_http_equiv_meta(text: &str) -> String {
    HTTP_EQUIV_META.replace_all(text, "").into_owned()
}

/// 移除片段中残留的 `<html>`/`<body>` 开始或结束标签
pub fn strip_structural_tags(text: &str) -> String {
    let without_html = STRAY_HTML_TAG.replace_all(text, "");
    STRAY_BODY_TAG.replace_all(&without_html, "").into_owned()
}

/// 正文结束的位置，即最后一个 `</body>` 的起始偏移；没有body结束标签时为文档长度
pub fn body_end(content: &str) -> usize {
    BODY_CLOSE
        .find_iter(content)
        .last()
        .map_or(content.len(), |m| m.start())
}

/// 从原始文档中扫描得到的头部材料
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHeader {
    /// XML声明
    pub xml_declaration: String,
    /// DOCTYPE声明
    pub doctype: String,
    /// 根元素开始标签
    pub html_open: String,
    /// 完整的head块
    pub head: String,
    /// body开始标签
    pub body_open: String,
    /// 最后一个 `</body>` 之后的内容。
    ///
    /// 只做记录，不会写入任何片段：拆分后的文档会丢失这部分内容。
    pub trailing: String,
}

impl Default for DocumentHeader {
    fn default() -> Self {
        Self {
            xml_declaration: DEFAULT_XML_DECLARATION.to_string(),
            doctype: DEFAULT_DOCTYPE.to_string(),
            html_open: DEFAULT_HTML_OPEN.to_string(),
            head: DEFAULT_HEAD.to_string(),
            body_open: DEFAULT_BODY_OPEN.to_string(),
            trailing: String::new(),
        }
    }
}

impl DocumentHeader {
    /// 扫描文档头
    ///
    /// 头部区域是第一个 `<body>` 开始标签之前的文本（没有body时为整个文档），
    /// 先移除 `http-equiv` meta标签和IE条件注释，再依次查找各个部分。
    pub fn scan(content: &str) -> Self {
        let body_open = BODY_OPEN.find(content);
        let prologue = match body_open {
            Some(m) => &content[..m.start()],
            None => content,
        };
        let prologue = strip_http_equiv_meta(prologue);
        let prologue = strip_conditional_comments(&prologue);

        let defaults = Self::default();
        let first = |re: &Regex, default: String| {
            re.find(&prologue)
                .map(|m| m.as_str().to_string())
                .unwrap_or(default)
        };

        let trailing = BODY_CLOSE
            .find_iter(content)
            .last()
            .map(|m| content[m.end()..].to_string())
            .unwrap_or_default();

        Self {
            xml_declaration: first(&XML_DECLARATION, defaults.xml_declaration),
            doctype: first(&DOCTYPE, defaults.doctype),
            html_open: first(&HTML_OPEN, defaults.html_open),
            head: first(&HEAD_BLOCK, defaults.head),
            body_open: body_open
                .map(|m| m.as_str().to_string())
                .unwrap_or(defaults.body_open),
            trailing,
        }
    }

    /// 把片段正文包装为完整的XHTML文档，每个部分各占一行
    pub fn wrap(&self, body: &str) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}\n{}\n</body>\n</html>",
            self.xml_declaration, self.doctype, self.html_open, self.head, self.body_open, body
        )
    }
}

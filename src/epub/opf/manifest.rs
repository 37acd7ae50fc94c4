//! 清单模块
//!
//! 提供EPUB包中文件清单的结构定义。

use std::borrow::Cow;

use quick_xml::escape::escape;

/// XHTML内容文档的媒体类型
pub const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";

/// 清单项信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    /// 项目ID
    pub id: String,
    /// 文件路径(相对于OPF文件)
    pub href: String,
    /// 媒体类型
    pub media_type: String,
    /// 属性(如nav、cover-image等)
    pub properties: Option<String>,
    /// 解析时的原始标记，新建的清单项为None
    pub(crate) raw: Option<String>,
    /// 本项之前的原始空白与注释
    pub(crate) lead: String,
}

impl ManifestItem {
    /// 创建新的清单项
    pub fn new(id: String, href: String, media_type: String) -> Self {
        Self {
            id,
            href,
            media_type,
            properties: None,
            raw: None,
            lead: String::new(),
        }
    }

    /// 创建XHTML内容文档的清单项
    pub fn xhtml(id: String, href: String) -> Self {
        Self::new(id, href, XHTML_MEDIA_TYPE.to_string())
    }

    /// 检查是否包含指定属性
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|properties| properties.split_whitespace().any(|p| p == property))
    }

    /// 检查是否为XHTML文件
    pub fn is_xhtml(&self) -> bool {
        self.media_type == XHTML_MEDIA_TYPE
    }

    /// 序列化为 `<item .../>`，解析得到的清单项原样输出
    pub(crate) fn to_xml(&self, prefix: Option<&str>) -> Cow<'_, str> {
        if let Some(raw) = &self.raw {
            return Cow::Borrowed(raw);
        }

        let tag = match prefix {
            Some(prefix) => format!("{}:item", prefix),
            None => "item".to_string(),
        };
        let mut xml = format!(
            r#"<{} id="{}" href="{}" media-type="{}""#,
            tag,
            escape(self.id.as_str()),
            escape(self.href.as_str()),
            escape(self.media_type.as_str())
        );
        if let Some(properties) = &self.properties {
            xml.push_str(&format!(r#" properties="{}""#, escape(properties.as_str())));
        }
        xml.push_str("/>");
        Cow::Owned(xml)
    }
}

/// `<manifest>` 区段
///
/// 保存开始/结束标签和最后一项之后的原始文本，未改动的部分可以原样写回。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// 清单项，按文档顺序排列
    pub items: Vec<ManifestItem>,
    pub(crate) prefix: Option<String>,
    pub(crate) open: String,
    pub(crate) close: String,
    pub(crate) tail: String,
    /// 原文为 `<manifest/>` 时的原始标记
    pub(crate) collapsed: Option<String>,
}

impl Manifest {
    pub(crate) fn new(open: String, close: String, prefix: Option<String>) -> Self {
        Self {
            items: Vec::new(),
            prefix,
            open,
            close,
            tail: String::new(),
            collapsed: None,
        }
    }

    /// 是否已有指定href的清单项
    pub fn contains_href(&self, href: &str) -> bool {
        self.items.iter().any(|item| item.href == href)
    }

    /// 根据ID获取清单项
    pub fn get(&self, id: &str) -> Option<&ManifestItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// 在最后一项之后追加清单项，沿用最后一项的缩进
    pub fn push(&mut self, mut item: ManifestItem) {
        if self.items.is_empty() && !self.tail.contains('\n') {
            self.tail.insert(0, '\n');
        }
        item.lead = super::item_indent(self.items.last().map(|last| last.lead.as_str()));
        self.items.push(item);
    }

    /// 删除满足条件的清单项，返回删除的数量
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&ManifestItem) -> bool,
    {
        let before = self.items.len();
        self.items.retain(|item| !predicate(item));
        before - self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_serialization() {
        let item = ManifestItem::xhtml("page_pg001".to_string(), "Text/page_pg001.xhtml".to_string());
        assert!(item.is_xhtml());
        assert_eq!(
            item.to_xml(None),
            r#"<item id="page_pg001" href="Text/page_pg001.xhtml" media-type="application/xhtml+xml"/>"#
        );
        assert_eq!(
            item.to_xml(Some("opf")),
            r#"<opf:item id="page_pg001" href="Text/page_pg001.xhtml" media-type="application/xhtml+xml"/>"#
        );
    }

    #[test]
    fn test_href_is_escaped() {
        let item = ManifestItem::xhtml("a".to_string(), "Text/a&b.xhtml".to_string());
        assert!(item.to_xml(None).contains(r#"href="Text/a&amp;b.xhtml""#));
    }

    #[test]
    fn test_push_copies_indentation() {
        let mut manifest = Manifest::new("<manifest>".to_string(), "</manifest>".to_string(), None);
        let mut first = ManifestItem::xhtml("a".to_string(), "a.xhtml".to_string());
        first.lead = "\n\t\t".to_string();
        first.raw = Some(r#"<item id="a" href="a.xhtml" media-type="application/xhtml+xml"/>"#.to_string());
        manifest.items.push(first);
        manifest.tail = "\n\t".to_string();

        manifest.push(ManifestItem::xhtml("b".to_string(), "b.xhtml".to_string()));
        assert_eq!(manifest.items[1].lead, "\n\t\t");
        assert!(manifest.contains_href("b.xhtml"));
        assert_eq!(manifest.get("a").map(|item| item.href.as_str()), Some("a.xhtml"));

        assert_eq!(manifest.remove_where(|item| item.href.ends_with("a.xhtml")), 1);
        assert_eq!(manifest.items.len(), 1);
    }

    #[test]
    fn test_has_property() {
        let mut item = ManifestItem::xhtml("nav".to_string(), "nav.xhtml".to_string());
        assert!(!item.has_property("nav"));
        item.properties = Some("scripted nav".to_string());
        assert!(item.has_property("nav"));
        assert!(!item.has_property("na"));
    }
}

//! 脊柱模块
//!
//! 提供EPUB包中阅读顺序（脊柱）的结构定义。

use std::borrow::Cow;

use quick_xml::escape::escape;

/// 脊柱项信息(阅读顺序)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    /// 引用的清单项ID
    pub idref: String,
    /// 是否线性阅读
    pub linear: bool,
    pub(crate) raw: Option<String>,
    pub(crate) lead: String,
}

impl SpineItem {
    /// 创建新的脊柱项
    pub fn new(idref: String) -> Self {
        Self {
            idref,
            linear: true,
            raw: None,
            lead: String::new(),
        }
    }

    /// 检查是否为线性阅读
    pub fn is_linear(&self) -> bool {
        self.linear
    }

    pub(crate) fn to_xml(&self, prefix: Option<&str>) -> Cow<'_, str> {
        if let Some(raw) = &self.raw {
            return Cow::Borrowed(raw);
        }

        let tag = match prefix {
            Some(prefix) => format!("{}:itemref", prefix),
            None => "itemref".to_string(),
        };
        let linear = if self.linear { "" } else { r#" linear="no""# };
        Cow::Owned(format!(
            r#"<{} idref="{}"{}/>"#,
            tag,
            escape(self.idref.as_str()),
            linear
        ))
    }
}

/// `<spine>` 区段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spine {
    /// 阅读顺序
    pub items: Vec<SpineItem>,
    /// 目录引用(toc属性)
    pub toc: Option<String>,
    pub(crate) prefix: Option<String>,
    pub(crate) open: String,
    pub(crate) close: String,
    pub(crate) tail: String,
    pub(crate) collapsed: Option<String>,
}

impl Spine {
    pub(crate) fn new(open: String, close: String, prefix: Option<String>) -> Self {
        Self {
            items: Vec::new(),
            toc: None,
            prefix,
            open,
            close,
            tail: String::new(),
            collapsed: None,
        }
    }

    /// 删除满足条件的脊柱项，返回删除的数量
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&SpineItem) -> bool,
    {
        let before = self.items.len();
        self.items.retain(|item| !predicate(item));
        before - self.items.len()
    }

    /// 用给定的ID序列整体替换阅读顺序，沿用原第一项的缩进
    pub fn replace<I>(&mut self, idrefs: I)
    where
        I: IntoIterator<Item = String>,
    {
        let lead = super::item_indent(self.items.first().map(|first| first.lead.as_str()));
        if self.items.is_empty() && !self.tail.contains('\n') {
            self.tail.insert(0, '\n');
        }
        self.items = idrefs
            .into_iter()
            .map(|idref| SpineItem {
                lead: lead.clone(),
                ..SpineItem::new(idref)
            })
            .collect();
    }

    /// 所有脊柱项的ID
    pub fn idrefs(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.idref.as_str()).collect()
    }
}

//! 标记拆分模块
//!
//! 在单个文档的原始标记中定位分页边界，并把文档切分为有序的片段文本。
//! 边界是任何属性中包含拆分标记（大小写不敏感、按单词边界匹配）的 `<div>` 开始标签，
//! 切分点位于标签之前，因此标签本身属于后一个片段。

use crate::epub::error::{EpubError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// 匹配任意一个只含空白的行
static BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*$").unwrap());

/// 文档未被拆分的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 文档中完全没有出现拆分标记
    MarkerNotFound,
    /// 去掉空白片段后只剩下不超过一个片段
    InsufficientFragments(usize),
}

/// 单个文档的拆分结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitOutcome<'a> {
    /// 至少两个非空片段，按原文顺序排列
    Fragments(Vec<&'a str>),
    /// 文档保持原样
    Skipped(SkipReason),
}

/// 拆分标记
///
/// 标记按字面文本处理：其中的正则元字符在编译前全部转义。
#[derive(Debug, Clone)]
pub struct Marker {
    text: String,
    presence: Regex,
    boundary: Regex,
}

impl Marker {
    /// 根据调用方提供的字面文本创建拆分标记
    ///
    /// # 参数
    /// * `text` - 标记文本，例如 `class="stl_ stl_02"`
    ///
    /// # 返回值
    /// * `Result<Marker>` - 空标记会返回 `InvalidMarker`
    pub fn new(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(EpubError::InvalidMarker("拆分标记不能为空".to_string()));
        }

        let escaped = regex::escape(text);
        let presence = Regex::new(&format!("(?i){}", escaped))?;
        let boundary = Regex::new(&format!(r"(?i)<div[^>]*\b{}[^>]*>", escaped))?;

        Ok(Self {
            text: text.to_string(),
            presence,
            boundary,
        })
    }

    /// 原始标记文本
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 文档中是否出现过标记（大小写不敏感）
    pub fn is_present(&self, content: &str) -> bool {
        self.presence.is_match(content)
    }

    /// 所有边界的字节偏移，即每个匹配的 `<div` 的起始位置
    pub fn boundaries(&self, content: &str) -> Vec<usize> {
        self.boundary.find_iter(content).map(|m| m.start()).collect()
    }
}

/// 按标记把文档切分为片段
///
/// 处理步骤：
/// 1. 文档中没有标记时直接跳过，不做任何切分
/// 2. 在每个边界之前切开（位于偏移0的边界不会产生空的前导片段）
/// 3. 第一个边界之前的前导部分如果为空白，或者包含空白行，则丢弃
/// 4. 丢弃其余所有空白片段
/// 5. 剩余片段不超过一个时视为未拆分
///
/// 返回的片段是 `content` 的切片，未做修剪。
pub fn split_fragments<'a>(content: &'a str, marker: &Marker) -> SplitOutcome<'a> {
    if !marker.is_present(content) {
        return SplitOutcome::Skipped(SkipReason::MarkerNotFound);
    }

    let boundaries = marker.boundaries(content);
    let mut parts = Vec::with_capacity(boundaries.len() + 1);
    let mut last = 0;
    for &start in &boundaries {
        if start > last {
            parts.push(&content[last..start]);
            last = start;
        }
    }
    parts.push(&content[last..]);

    let has_prologue = boundaries.first().is_some_and(|&first| first > 0);
    if has_prologue && parts.len() > 1 && is_disposable_prologue(parts[0]) {
        parts.remove(0);
    }

    parts.retain(|part| !part.trim().is_empty());

    if parts.len() <= 1 {
        return SplitOutcome::Skipped(SkipReason::InsufficientFragments(parts.len()));
    }

    SplitOutcome::Fragments(parts)
}

/// 前导部分通常是 `<?xml ...?>` 到 `<body>` 之间的文档头，以换行结尾，
/// 这种情况下它总会包含一个空白行。
fn is_disposable_prologue(prologue: &str) -> bool {
    prologue.trim().is_empty() || BLANK_LINE.is_match(prologue)
}

//! 文档拆分模块
//!
//! 在工作目录中查找HTML/XHTML文档，逐个按标记拆分并重建为独立的片段文档。
//! 拆分结果以 [`SplitResult`] 的形式返回，供OPF同步阶段使用。

mod header;
mod reconstruct;
mod splitter;

use std::path::Path;

use log::{debug, info};
use walkdir::WalkDir;

use crate::epub::archive::relative_entry_name;
use crate::epub::error::Result;

pub use header::{
    DEFAULT_BODY_OPEN, DEFAULT_DOCTYPE, DEFAULT_HEAD, DEFAULT_HTML_OPEN, DEFAULT_XML_DECLARATION,
    DocumentHeader,
};
pub use reconstruct::{Fragment, SourceDocument, build_fragments, write_fragments};
pub use splitter::{Marker, SkipReason, SplitOutcome, split_fragments};

/// 一个被拆分的原始文档及其产生的片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRecord {
    /// 原始文档相对于工作目录的路径
    pub source: String,
    /// 新片段相对于工作目录的路径，按片段序号排列
    pub fragments: Vec<String>,
    /// 原始文档是否已被删除
    pub source_removed: bool,
}

impl SplitRecord {
    /// 原始文档的文件名（含扩展名）
    pub fn source_file_name(&self) -> &str {
        self.source
            .rsplit_once('/')
            .map_or(self.source.as_str(), |(_, name)| name)
    }

    /// 原始文档去掉扩展名后的文件名
    pub fn source_stem(&self) -> &str {
        let name = self.source_file_name();
        match name.rfind('.') {
            Some(i) if i > 0 => &name[..i],
            _ => name,
        }
    }
}

/// 所有文档的拆分结果，按发现顺序排列
///
/// 只有产生了至少两个片段的文档才会出现在这里。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitResult {
    records: Vec<SplitRecord>,
}

impl SplitResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: SplitRecord) {
        self.records.push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 被拆分的文档数量
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SplitRecord> {
        self.records.iter()
    }

    /// 根据原始路径查找拆分记录
    pub fn get(&self, source: &str) -> Option<&SplitRecord> {
        self.records.iter().find(|record| record.source == source)
    }

    /// 所有新片段的路径，按文档发现顺序拼接
    pub fn all_fragments(&self) -> Vec<String> {
        self.records
            .iter()
            .flat_map(|record| record.fragments.iter().cloned())
            .collect()
    }

    /// 新片段总数
    pub fn total_fragments(&self) -> usize {
        self.records.iter().map(|record| record.fragments.len()).sum()
    }
}

impl<'a> IntoIterator for &'a SplitResult {
    type Item = &'a SplitRecord;
    type IntoIter = std::slice::Iter<'a, SplitRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// 单个文档的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Split(SplitRecord),
    Skipped(SkipReason),
}

/// 查找工作目录中所有 `.xhtml` / `.html` 文件
///
/// # 返回值
/// * `Result<Vec<String>>` - 相对于工作目录、以 `/` 分隔的路径，按文件名排序
pub fn discover_documents(root: &Path) -> Result<Vec<String>> {
    let mut documents = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let is_markup = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "xhtml" || ext == "html");
        if !is_markup {
            continue;
        }

        if let Some(rel_path) = relative_entry_name(root, entry.path()) {
            documents.push(rel_path);
        }
    }

    Ok(documents)
}

/// 拆分单个文档
///
/// 文档没有标记或片段不足两个时保持原样；否则写出所有片段并删除原文档。
/// 只有最后一个 `</body>` 之前的内容参与拆分，之后的内容不会出现在任何片段中。
pub fn split_document(root: &Path, rel_path: &str, marker: &Marker) -> Result<DocumentOutcome> {
    let source = SourceDocument::read(root, rel_path)?;

    let body = &source.content[..header::body_end(&source.content)];
    let parts = match split_fragments(body, marker) {
        SplitOutcome::Fragments(parts) => parts,
        SplitOutcome::Skipped(reason) => return Ok(DocumentOutcome::Skipped(reason)),
    };

    let fragments = build_fragments(&parts);
    if fragments.len() <= 1 {
        return Ok(DocumentOutcome::Skipped(SkipReason::InsufficientFragments(
            fragments.len(),
        )));
    }

    info!("✂️ 正在把 {} 拆分为 {} 个片段...", rel_path, fragments.len());
    let header = DocumentHeader::scan(&source.content);
    let written = write_fragments(root, &source, &header, &fragments)?;

    Ok(DocumentOutcome::Split(SplitRecord {
        source: source.rel_path,
        fragments: written,
        source_removed: true,
    }))
}

/// 依次拆分所有文档
///
/// 单个文档被跳过不会影响其他文档；IO错误会直接返回。
pub fn split_all(root: &Path, documents: &[String], marker: &Marker) -> Result<SplitResult> {
    let mut result = SplitResult::new();

    for rel_path in documents {
        match split_document(root, rel_path, marker)? {
            DocumentOutcome::Split(record) => result.push(record),
            DocumentOutcome::Skipped(SkipReason::MarkerNotFound) => {
                debug!("跳过 {}: 没有找到标记", rel_path);
            }
            DocumentOutcome::Skipped(SkipReason::InsufficientFragments(count)) => {
                debug!("跳过 {}: 只有 {} 个片段", rel_path, count);
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MARKER: &str = r#"class="stl_ stl_02""#;

    fn paged_document(title: &str, pages: usize) -> String {
        let mut body = String::new();
        for i in 1..=pages {
            body.push_str(&format!(
                "<div class=\"stl_ stl_02\">\n<p>{} {}</p>\n</div>\n",
                title, i
            ));
        }
        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!DOCTYPE html>\n<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head><title>{}</title></head>\n<body>\n{}</body>\n</html>\n",
            title, body
        )
    }

    fn workspace() -> TempDir {
        let temp = TempDir::new().unwrap();
        let text = temp.path().join("OEBPS/Text");
        fs::create_dir_all(&text).unwrap();
        fs::write(text.join("page.xhtml"), paged_document("page", 3)).unwrap();
        fs::write(text.join("single.xhtml"), paged_document("single", 1)).unwrap();
        fs::write(text.join("plain.html"), "<html><body><p>plain</p></body></html>").unwrap();
        fs::write(temp.path().join("OEBPS/style.css"), "p {}").unwrap();
        temp
    }

    #[test]
    fn test_discover_documents() {
        let temp = workspace();
        let documents = discover_documents(temp.path()).unwrap();
        assert_eq!(
            documents,
            vec!["OEBPS/Text/page.xhtml", "OEBPS/Text/plain.html", "OEBPS/Text/single.xhtml"]
        );
    }

    #[test]
    fn test_split_all_only_records_split_documents() {
        let temp = workspace();
        let marker = Marker::new(MARKER).unwrap();
        let documents = discover_documents(temp.path()).unwrap();

        let result = split_all(temp.path(), &documents, &marker).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.total_fragments(), 3);

        let record = result.get("OEBPS/Text/page.xhtml").unwrap();
        assert!(record.source_removed);
        assert_eq!(record.source_file_name(), "page.xhtml");
        assert_eq!(record.source_stem(), "page");
        assert_eq!(
            record.fragments,
            vec![
                "OEBPS/Text/page_pg001.xhtml",
                "OEBPS/Text/page_pg002.xhtml",
                "OEBPS/Text/page_pg003.xhtml",
            ]
        );

        let text = temp.path().join("OEBPS/Text");
        assert!(!text.join("page.xhtml").exists());
        assert!(text.join("single.xhtml").exists());
        assert!(text.join("plain.html").exists());
    }

    #[test]
    fn test_fragment_documents_carry_original_header() {
        let temp = workspace();
        let marker = Marker::new(MARKER).unwrap();
        split_document(temp.path(), "OEBPS/Text/page.xhtml", &marker).unwrap();

        let first = fs::read_to_string(temp.path().join("OEBPS/Text/page_pg001.xhtml")).unwrap();
        let expected = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!DOCTYPE html>\n<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head><title>page</title></head>\n<body>\n<div class=\"stl_ stl_02\">\n<p>page 1</p>\n</div>\n</body>\n</html>";
        assert_eq!(first, expected);

        let last = fs::read_to_string(temp.path().join("OEBPS/Text/page_pg003.xhtml")).unwrap();
        assert_eq!(last.matches("</body>").count(), 1);
        assert_eq!(last.matches("</html>").count(), 1);
    }

    #[test]
    fn test_second_pass_finds_nothing_to_split() {
        let temp = workspace();
        let marker = Marker::new(MARKER).unwrap();
        let documents = discover_documents(temp.path()).unwrap();
        split_all(temp.path(), &documents, &marker).unwrap();

        let documents = discover_documents(temp.path()).unwrap();
        let again = split_all(temp.path(), &documents, &marker).unwrap();
        assert!(again.is_empty());
    }
}

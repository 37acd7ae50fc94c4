//! OPF同步模块
//!
//! 根据拆分结果更新清单与脊柱：删除被替换的原始文档，插入新片段，
//! 用全部新片段重建阅读顺序，并删除过时的guide区段。

use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::epub::error::{EpubError, Result};
use crate::epub::opf::manifest::ManifestItem;
use crate::epub::opf::parser::PackageDocument;
use crate::epub::split::SplitResult;

/// 一次同步所做的修改
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResyncSummary {
    /// 删除的清单项数量
    pub removed_items: usize,
    /// 删除的脊柱项数量(重建之前)
    pub removed_itemrefs: usize,
    /// 新增的清单项数量
    pub added_items: usize,
    /// 重建后脊柱的长度
    pub spine_len: usize,
    /// 是否删除了guide区段
    pub guide_removed: bool,
}

/// 由文件路径生成清单ID
///
/// 取去掉扩展名的文件名，把字母、数字、`-`、`_` 以外的字符替换为 `_`。
pub fn sanitize_id(path: &str) -> String {
    let name = path.rsplit_once('/').map_or(path, |(_, name)| name);
    let stem = match name.rfind('.') {
        Some(i) if i > 0 => &name[..i],
        _ => name,
    };
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// 计算 `target` 相对于目录 `from_dir` 的路径，两者都相对于工作目录并以 `/` 分隔
pub fn relative_href(from_dir: &str, target: &str) -> String {
    let from: Vec<&str> = from_dir
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    let to: Vec<&str> = target
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts = vec![".."; from.len() - common];
    parts.extend_from_slice(&to[common..]);
    parts.join("/")
}

/// 按拆分结果更新OPF结构
///
/// # 参数
/// * `doc` - 解析后的OPF
/// * `opf_path` - OPF文件相对于工作目录的路径
/// * `split` - 拆分结果
///
/// 新的阅读顺序是所有新片段路径按字典序全局排序的结果，会完全替换原有的脊柱，
/// 不保留各文档原先在书中的相对位置。
pub fn resync_package(
    doc: &mut PackageDocument,
    opf_path: &str,
    split: &SplitResult,
) -> ResyncSummary {
    let mut summary = ResyncSummary::default();

    let href_index = doc.href_index();
    debug!("OPF清单中共有 {} 个href", href_index.len());

    for record in split {
        let file_name = record.source_file_name();
        let stem = record.source_stem();
        if let Some(id) = href_index
            .iter()
            .find(|(href, _)| href.ends_with(file_name))
            .map(|(_, id)| id)
        {
            debug!("移除原始文档的清单项: {}", id);
        }

        summary.removed_items += doc
            .manifest
            .remove_where(|item| item.href.ends_with(file_name));
        summary.removed_itemrefs += doc.spine.remove_where(|item| item.idref.contains(stem));
    }

    let mut pages = split.all_fragments();
    pages.sort();

    let opf_dir = opf_path.rsplit_once('/').map_or("", |(dir, _)| dir);
    for page in &pages {
        let href = relative_href(opf_dir, page);
        if !doc.manifest.contains_href(&href) {
            doc.manifest.push(ManifestItem::xhtml(sanitize_id(page), href));
            summary.added_items += 1;
        }
    }

    doc.spine.replace(pages.iter().map(|page| sanitize_id(page)));
    summary.spine_len = doc.spine.items.len();
    summary.guide_removed = doc.remove_guide();

    summary
}

/// 读取、同步并写回OPF文件
///
/// 任何解析或写入错误都包装为 `ManifestUpdate`；出错时磁盘上的OPF保持不变。
pub fn update_package_file(
    root: &Path,
    opf_path: &str,
    split: &SplitResult,
) -> Result<ResyncSummary> {
    info!("📝 正在更新OPF: {}", opf_path);
    let wrap = |e: EpubError| EpubError::ManifestUpdate(format!("{}: {}", opf_path, e));

    let path = root.join(opf_path);
    let xml = fs::read_to_string(&path).map_err(|e| wrap(e.into()))?;
    let mut doc = PackageDocument::parse_xml(&xml).map_err(wrap)?;

    let summary = resync_package(&mut doc, opf_path, split);
    fs::write(&path, doc.to_xml()).map_err(|e| wrap(e.into()))?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::split::SplitRecord;

    const OPF: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="cover" href="Text/cover.xhtml" media-type="application/xhtml+xml"/>
    <item id="page" href="Text/page.xhtml" media-type="application/xhtml+xml"/>
    <item id="extra" href="Text/extra.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="cover"/>
    <itemref idref="page"/>
    <itemref idref="extra"/>
  </spine>
  <guide>
    <reference type="cover" href="Text/cover.xhtml"/>
  </guide>
</package>"#;

    fn record(source: &str, count: usize) -> SplitRecord {
        let (dir, name) = source.rsplit_once('/').unwrap();
        let stem = name.rsplit_once('.').unwrap().0;
        SplitRecord {
            source: source.to_string(),
            fragments: (1..=count)
                .map(|i| format!("{}/{}_pg{:03}.xhtml", dir, stem, i))
                .collect(),
            source_removed: true,
        }
    }

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("OEBPS/Text/page_pg001.xhtml"), "page_pg001");
        assert_eq!(sanitize_id("Text/hoofd stuk.1.xhtml"), "hoofd_stuk_1");
        assert_eq!(sanitize_id("a-b_c.html"), "a-b_c");
    }

    #[test]
    fn test_relative_href() {
        assert_eq!(relative_href("OEBPS", "OEBPS/Text/a.xhtml"), "Text/a.xhtml");
        assert_eq!(relative_href("", "Text/a.xhtml"), "Text/a.xhtml");
        assert_eq!(relative_href(".", "a.xhtml"), "a.xhtml");
        assert_eq!(relative_href("OEBPS/pkg", "OEBPS/Text/a.xhtml"), "../Text/a.xhtml");
        assert_eq!(relative_href("OPS", "content/a.xhtml"), "../content/a.xhtml");
    }

    #[test]
    fn test_resync_replaces_split_document() {
        let mut doc = PackageDocument::parse_xml(OPF).unwrap();
        let mut split = SplitResult::new();
        split.push(record("OEBPS/Text/page.xhtml", 3));

        let summary = resync_package(&mut doc, "OEBPS/content.opf", &split);
        assert_eq!(summary.removed_items, 1);
        assert_eq!(summary.removed_itemrefs, 1);
        assert_eq!(summary.added_items, 3);
        assert_eq!(summary.spine_len, 3);
        assert!(summary.guide_removed);

        let hrefs: Vec<&str> = doc.manifest.items.iter().map(|i| i.href.as_str()).collect();
        assert_eq!(
            hrefs,
            vec![
                "toc.ncx",
                "Text/cover.xhtml",
                "Text/extra.xhtml",
                "Text/page_pg001.xhtml",
                "Text/page_pg002.xhtml",
                "Text/page_pg003.xhtml",
            ]
        );
        assert_eq!(doc.spine.idrefs(), vec!["page_pg001", "page_pg002", "page_pg003"]);
        assert_eq!(doc.spine.toc.as_deref(), Some("ncx"));
        assert!(doc.guide.is_none());
    }

    #[test]
    fn test_spine_is_sorted_across_documents() {
        let mut doc = PackageDocument::parse_xml(OPF).unwrap();
        let mut split = SplitResult::new();
        split.push(record("OEBPS/Text/page.xhtml", 2));
        split.push(record("OEBPS/Text/extra.xhtml", 2));

        resync_package(&mut doc, "OEBPS/content.opf", &split);
        assert_eq!(
            doc.spine.idrefs(),
            vec!["extra_pg001", "extra_pg002", "page_pg001", "page_pg002"]
        );
        let pages = doc
            .manifest
            .items
            .iter()
            .filter(|item| item.href.contains("_pg"))
            .count();
        assert_eq!(pages, 4);
    }

    #[test]
    fn test_existing_href_is_not_duplicated() {
        let xml = OPF.replace(
            "</manifest>",
            "  <item id=\"keep\" href=\"Text/page_pg002.xhtml\" media-type=\"application/xhtml+xml\"/>\n  </manifest>",
        );
        let mut doc = PackageDocument::parse_xml(&xml).unwrap();
        let mut split = SplitResult::new();
        split.push(record("OEBPS/Text/other.xhtml", 1));
        split.push(record("OEBPS/Text/page.xhtml", 2));

        let summary = resync_package(&mut doc, "OEBPS/content.opf", &split);
        assert_eq!(summary.added_items, 2);
        let matching = doc
            .manifest
            .items
            .iter()
            .filter(|item| item.href == "Text/page_pg002.xhtml")
            .count();
        assert_eq!(matching, 1);
    }

    #[test]
    fn test_update_package_file_leaves_file_on_parse_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let broken = "<package><manifest><item></package>";
        fs::write(temp.path().join("content.opf"), broken).unwrap();

        let mut split = SplitResult::new();
        split.push(record("Text/page.xhtml", 2));

        let result = update_package_file(temp.path(), "content.opf", &split);
        assert!(matches!(result, Err(EpubError::ManifestUpdate(_))));
        assert_eq!(fs::read_to_string(temp.path().join("content.opf")).unwrap(), broken);
    }
}

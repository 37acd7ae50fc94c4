//! OPF写出模块
//!
//! 把 [`PackageDocument`] 序列化回XML文本。

use crate::epub::opf::manifest::Manifest;
use crate::epub::opf::parser::{PackageDocument, Region};
use crate::epub::opf::spine::Spine;

/// 原文没有XML声明时写入的声明
pub const DEFAULT_OPF_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

impl PackageDocument {
    /// 序列化为XML文本
    ///
    /// 清单、脊柱之外的内容以及未改动的清单项、脊柱项都按原文输出，
    /// 未做任何修改的文档输出与输入完全一致（原文缺少XML声明时除外）。
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        if !self.has_declaration {
            out.push_str(DEFAULT_OPF_DECLARATION);
            out.push('\n');
        }

        for region in &self.layout {
            match region {
                Region::Raw(text) => out.push_str(text),
                Region::Manifest => write_manifest(&mut out, &self.manifest),
                Region::Spine => write_spine(&mut out, &self.spine),
                Region::Guide => {
                    if let Some(guide) = &self.guide {
                        out.push_str(&guide.lead);
                        out.push_str(&guide.raw);
                    }
                }
            }
        }

        out
    }
}

fn write_manifest(out: &mut String, manifest: &Manifest) {
    if let (true, Some(collapsed)) = (manifest.items.is_empty(), &manifest.collapsed) {
        out.push_str(collapsed);
        return;
    }

    out.push_str(&manifest.open);
    for item in &manifest.items {
        out.push_str(&item.lead);
        out.push_str(&item.to_xml(manifest.prefix.as_deref()));
    }
    out.push_str(&manifest.tail);
    out.push_str(&manifest.close);
}

fn write_spine(out: &mut String, spine: &Spine) {
    if let (true, Some(collapsed)) = (spine.items.is_empty(), &spine.collapsed) {
        out.push_str(collapsed);
        return;
    }

    out.push_str(&spine.open);
    for item in &spine.items {
        out.push_str(&item.lead);
        out.push_str(&item.to_xml(spine.prefix.as_deref()));
    }
    out.push_str(&spine.tail);
    out.push_str(&spine.close);
}

#[cfg(test)]
mod tests {
    use crate::epub::opf::{ManifestItem, PackageDocument};

    const OPF: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
	<metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
		<dc:identifier id="uid">urn:uuid:1234</dc:identifier>
		<meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>
	</metadata>
	<manifest>
		<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav" />
		<item id='c1' href="Text/c1.xhtml" media-type="application/xhtml+xml"/>
	</manifest>
	<spine>
		<itemref idref="c1" />
	</spine>
	<guide><reference type="cover" href="Text/c1.xhtml"/></guide>
</package>"#;

    #[test]
    fn test_untouched_round_trip_is_byte_identical() {
        let doc = PackageDocument::parse_xml(OPF).unwrap();
        assert_eq!(doc.to_xml(), OPF);
    }

    #[test]
    fn test_missing_declaration_is_added() {
        let xml = "<package><manifest/><spine/></package>";
        let doc = PackageDocument::parse_xml(xml).unwrap();
        assert_eq!(
            doc.to_xml(),
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<package><manifest/><spine/></package>"
        );
    }

    #[test]
    fn test_edits_keep_surrounding_text() {
        let mut doc = PackageDocument::parse_xml(OPF).unwrap();
        doc.manifest.remove_where(|item| item.id == "c1");
        doc.manifest
            .push(ManifestItem::xhtml("c1_pg001".to_string(), "Text/c1_pg001.xhtml".to_string()));
        doc.spine.replace(vec!["c1_pg001".to_string()]);
        assert!(doc.remove_guide());

        let xml = doc.to_xml();
        assert!(xml.contains(
            "\t\t<item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\" />\n\t\t<item id=\"c1_pg001\" href=\"Text/c1_pg001.xhtml\" media-type=\"application/xhtml+xml\"/>\n\t</manifest>"
        ));
        assert!(xml.contains("<spine>\n\t\t<itemref idref=\"c1_pg001\"/>\n\t</spine>\n</package>"));
        assert!(!xml.contains("guide"));
        assert!(xml.contains("<meta property=\"dcterms:modified\">2024-01-01T00:00:00Z</meta>"));
    }

    #[test]
    fn test_collapsed_sections_expand_when_filled() {
        let xml = "<?xml version=\"1.0\"?><package><manifest/><spine toc=\"ncx\"/></package>";
        let mut doc = PackageDocument::parse_xml(xml).unwrap();
        doc.manifest
            .push(ManifestItem::xhtml("a".to_string(), "a.xhtml".to_string()));
        doc.spine.replace(vec!["a".to_string()]);

        assert_eq!(
            doc.to_xml(),
            "<?xml version=\"1.0\"?><package><manifest>\n    <item id=\"a\" href=\"a.xhtml\" media-type=\"application/xhtml+xml\"/>\n</manifest><spine toc=\"ncx\">\n    <itemref idref=\"a\"/>\n</spine></package>"
        );
    }
}

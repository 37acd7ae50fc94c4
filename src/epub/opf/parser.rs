//! OPF解析器模块
//!
//! 把OPF包文件解析为类型化的结构：清单、脊柱和可选的guide区段。
//! 解析时记录每一段原始文本的位置，未被修改的部分在写回时逐字节保留。

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::epub::error::{EpubError, Result};
use crate::epub::opf::{
    manifest::{Manifest, ManifestItem},
    spine::{Spine, SpineItem},
};

/// 旧式 `<guide>` 区段，只保存原始标记
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guide {
    /// 区段前的空白，删除guide时一并删除
    pub(crate) lead: String,
    pub(crate) raw: String,
}

impl Guide {
    /// guide区段的原始标记
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// 文档中的一段区域，按原文顺序排列
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Region {
    Raw(String),
    Manifest,
    Spine,
    Guide,
}

/// OPF文件解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDocument {
    /// 清单(文件列表)
    pub manifest: Manifest,
    /// 脊柱(阅读顺序)
    pub spine: Spine,
    /// 旧式guide区段
    pub guide: Option<Guide>,
    pub(crate) has_declaration: bool,
    pub(crate) layout: Vec<Region>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Outside,
    Manifest,
    Spine,
    Guide,
}

impl PackageDocument {
    /// 解析OPF文件内容
    ///
    /// # 参数
    /// * `xml` - OPF文件的XML内容
    ///
    /// # 返回值
    /// * `Result<PackageDocument>` - 缺少manifest或spine元素时返回 `OpfParseError`
    pub fn parse_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut layout = Vec::new();
        let mut manifest: Option<Manifest> = None;
        let mut spine: Option<Spine> = None;
        let mut guide: Option<Guide> = None;
        let mut has_declaration = false;

        let mut section = Section::Outside;
        // 尚未归入任何区域的原始文本起点
        let mut raw_start = 0;
        // 区段内上一个子项结束的位置
        let mut mark = 0;
        let mut guide_start = 0;
        let mut guide_lead = String::new();
        let mut pending_item: Option<(usize, ManifestItem)> = None;
        let mut pending_ref: Option<(usize, SpineItem)> = None;

        loop {
            let start = reader.buffer_position() as usize;
            let event = reader.read_event()?;
            let end = reader.buffer_position() as usize;

            match section {
                Section::Outside => match event {
                    Event::Decl(_) => has_declaration = true,
                    Event::Start(ref e) | Event::Empty(ref e) => {
                        let collapsed = matches!(event, Event::Empty(_));
                        match e.local_name().as_ref() {
                            b"manifest" => {
                                if manifest.is_some() {
                                    return Err(EpubError::OpfParseError(
                                        "存在多个manifest元素".to_string(),
                                    ));
                                }
                                layout.push(Region::Raw(xml[raw_start..start].to_string()));
                                let (open, close, prefix) = section_tags(e, &xml[start..end], collapsed);
                                let mut section_manifest = Manifest::new(open, close, prefix);
                                if collapsed {
                                    section_manifest.collapsed = Some(xml[start..end].to_string());
                                    layout.push(Region::Manifest);
                                    raw_start = end;
                                } else {
                                    section = Section::Manifest;
                                    mark = end;
                                }
                                manifest = Some(section_manifest);
                            }
                            b"spine" => {
                                if spine.is_some() {
                                    return Err(EpubError::OpfParseError(
                                        "存在多个spine元素".to_string(),
                                    ));
                                }
                                layout.push(Region::Raw(xml[raw_start..start].to_string()));
                                let (open, close, prefix) = section_tags(e, &xml[start..end], collapsed);
                                let mut section_spine = Spine::new(open, close, prefix);
                                section_spine.toc = attribute(e, b"toc")?;
                                if collapsed {
                                    section_spine.collapsed = Some(xml[start..end].to_string());
                                    layout.push(Region::Spine);
                                    raw_start = end;
                                } else {
                                    section = Section::Spine;
                                    mark = end;
                                }
                                spine = Some(section_spine);
                            }
                            b"guide" if guide.is_none() => {
                                let before = &xml[raw_start..start];
                                let kept = before.trim_end();
                                layout.push(Region::Raw(kept.to_string()));
                                guide_lead = before[kept.len()..].to_string();
                                guide_start = start;
                                if collapsed {
                                    guide = Some(Guide {
                                        lead: std::mem::take(&mut guide_lead),
                                        raw: xml[start..end].to_string(),
                                    });
                                    layout.push(Region::Guide);
                                    raw_start = end;
                                } else {
                                    section = Section::Guide;
                                }
                            }
                            _ => {}
                        }
                    }
                    Event::Eof => break,
                    _ => {}
                },
                Section::Manifest => match event {
                    Event::Empty(ref e) if e.local_name().as_ref() == b"item" => {
                        let mut item = parse_manifest_item(e)?;
                        item.raw = Some(xml[start..end].to_string());
                        item.lead = xml[mark..start].to_string();
                        mark = end;
                        if let Some(manifest) = manifest.as_mut() {
                            manifest.items.push(item);
                        }
                    }
                    Event::Start(ref e) if e.local_name().as_ref() == b"item" => {
                        pending_item = Some((start, parse_manifest_item(e)?));
                    }
                    Event::End(ref e) if e.local_name().as_ref() == b"item" => {
                        if let Some((item_start, mut item)) = pending_item.take() {
                            item.raw = Some(xml[item_start..end].to_string());
                            item.lead = xml[mark..item_start].to_string();
                            mark = end;
                            if let Some(manifest) = manifest.as_mut() {
                                manifest.items.push(item);
                            }
                        }
                    }
                    Event::End(ref e) if e.local_name().as_ref() == b"manifest" => {
                        if let Some(manifest) = manifest.as_mut() {
                            manifest.tail = xml[mark..start].to_string();
                        }
                        layout.push(Region::Manifest);
                        section = Section::Outside;
                        raw_start = end;
                    }
                    Event::Eof => {
                        return Err(EpubError::OpfParseError("manifest元素没有闭合".to_string()));
                    }
                    _ => {}
                },
                Section::Spine => match event {
                    Event::Empty(ref e) if e.local_name().as_ref() == b"itemref" => {
                        let mut item = parse_spine_item(e)?;
                        item.raw = Some(xml[start..end].to_string());
                        item.lead = xml[mark..start].to_string();
                        mark = end;
                        if let Some(spine) = spine.as_mut() {
                            spine.items.push(item);
                        }
                    }
                    Event::Start(ref e) if e.local_name().as_ref() == b"itemref" => {
                        pending_ref = Some((start, parse_spine_item(e)?));
                    }
                    Event::End(ref e) if e.local_name().as_ref() == b"itemref" => {
                        if let Some((item_start, mut item)) = pending_ref.take() {
                            item.raw = Some(xml[item_start..end].to_string());
                            item.lead = xml[mark..item_start].to_string();
                            mark = end;
                            if let Some(spine) = spine.as_mut() {
                                spine.items.push(item);
                            }
                        }
                    }
                    Event::End(ref e) if e.local_name().as_ref() == b"spine" => {
                        if let Some(spine) = spine.as_mut() {
                            spine.tail = xml[mark..start].to_string();
                        }
                        layout.push(Region::Spine);
                        section = Section::Outside;
                        raw_start = end;
                    }
                    Event::Eof => {
                        return Err(EpubError::OpfParseError("spine元素没有闭合".to_string()));
                    }
                    _ => {}
                },
                Section::Guide => match event {
                    Event::End(ref e) if e.local_name().as_ref() == b"guide" => {
                        guide = Some(Guide {
                            lead: std::mem::take(&mut guide_lead),
                            raw: xml[guide_start..end].to_string(),
                        });
                        layout.push(Region::Guide);
                        section = Section::Outside;
                        raw_start = end;
                    }
                    Event::Eof => {
                        return Err(EpubError::OpfParseError("guide元素没有闭合".to_string()));
                    }
                    _ => {}
                },
            }
        }

        layout.push(Region::Raw(xml[raw_start..].to_string()));

        let manifest =
            manifest.ok_or_else(|| EpubError::OpfParseError("缺少manifest元素".to_string()))?;
        let spine = spine.ok_or_else(|| EpubError::OpfParseError("缺少spine元素".to_string()))?;

        Ok(Self {
            manifest,
            spine,
            guide,
            has_declaration,
            layout,
        })
    }

    /// 建立 href → id 的索引
    pub fn href_index(&self) -> HashMap<String, String> {
        self.manifest
            .items
            .iter()
            .filter(|item| !item.href.is_empty() && !item.id.is_empty())
            .map(|item| (item.href.clone(), item.id.clone()))
            .collect()
    }

    /// 删除guide区段，返回是否存在过
    pub fn remove_guide(&mut self) -> bool {
        self.guide.take().is_some()
    }

    /// 获取所有章节文件的路径(按阅读顺序)
    pub fn chapter_paths(&self) -> Vec<String> {
        self.spine
            .items
            .iter()
            .filter(|spine_item| spine_item.is_linear())
            .filter_map(|spine_item| self.manifest.get(&spine_item.idref))
            .map(|manifest_item| manifest_item.href.clone())
            .collect()
    }
}

/// 计算区段的开始标签、结束标签和命名空间前缀
///
/// 自闭合的 `<manifest/>` 会被展开为 `<manifest>` 与 `</manifest>`，以便插入新项目。
fn section_tags(e: &BytesStart, raw: &str, collapsed: bool) -> (String, String, Option<String>) {
    let qualified = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let prefix = e
        .name()
        .prefix()
        .map(|prefix| String::from_utf8_lossy(prefix.as_ref()).into_owned());

    let open = if collapsed {
        let body = raw.strip_suffix("/>").unwrap_or(raw).trim_end();
        format!("{}>", body)
    } else {
        raw.to_string()
    };

    (open, format!("</{}>", qualified), prefix)
}

/// 读取指定的属性值
fn attribute(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| EpubError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// 解析清单项
fn parse_manifest_item(e: &BytesStart) -> Result<ManifestItem> {
    let mut item = ManifestItem::new(String::new(), String::new(), String::new());

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| EpubError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
        match attr.key.local_name().as_ref() {
            b"id" => item.id = attr.unescape_value()?.into_owned(),
            b"href" => item.href = attr.unescape_value()?.into_owned(),
            b"media-type" => item.media_type = attr.unescape_value()?.into_owned(),
            b"properties" => item.properties = Some(attr.unescape_value()?.into_owned()),
            _ => {}
        }
    }

    Ok(item)
}

/// 解析脊柱项
fn parse_spine_item(e: &BytesStart) -> Result<SpineItem> {
    let mut item = SpineItem::new(String::new());

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| EpubError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
        match attr.key.local_name().as_ref() {
            b"idref" => item.idref = attr.unescape_value()?.into_owned(),
            b"linear" => item.linear = attr.unescape_value()? != "no",
            _ => {}
        }
    }

    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Gesplitst boek</dc:title>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="page" href="Text/page.xhtml" media-type="application/xhtml+xml"/>
    <!-- afbeeldingen -->
    <item id="img" href="Images/a&amp;b.png" media-type="image/png"></item>
  </manifest>
  <spine toc="ncx">
    <itemref idref="page"/>
    <itemref idref="notes" linear="no"/>
  </spine>
  <guide>
    <reference type="text" title="Start" href="Text/page.xhtml"/>
  </guide>
</package>
"#;

    #[test]
    fn test_parse_sections() {
        let doc = PackageDocument::parse_xml(OPF).unwrap();

        assert!(doc.has_declaration);
        assert_eq!(doc.manifest.items.len(), 3);
        assert_eq!(doc.manifest.items[1].id, "page");
        assert_eq!(doc.manifest.items[1].href, "Text/page.xhtml");
        assert_eq!(doc.manifest.items[2].href, "Images/a&b.png");
        assert!(doc.manifest.items[2].lead.contains("<!-- afbeeldingen -->"));

        assert_eq!(doc.spine.toc.as_deref(), Some("ncx"));
        assert_eq!(doc.spine.idrefs(), vec!["page", "notes"]);
        assert!(!doc.spine.items[1].is_linear());

        let guide = doc.guide.as_ref().unwrap();
        assert!(guide.raw().starts_with("<guide>"));
        assert!(guide.raw().ends_with("</guide>"));
        assert_eq!(guide.lead, "\n  ");
    }

    #[test]
    fn test_href_index() {
        let doc = PackageDocument::parse_xml(OPF).unwrap();
        let index = doc.href_index();
        assert_eq!(index.get("Text/page.xhtml").map(String::as_str), Some("page"));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_chapter_paths_skip_non_linear_and_unknown() {
        let doc = PackageDocument::parse_xml(OPF).unwrap();
        assert_eq!(doc.chapter_paths(), vec!["Text/page.xhtml"]);
    }

    #[test]
    fn test_prefixed_package() {
        let xml = r#"<opf:package xmlns:opf="http://www.idpf.org/2007/opf"><opf:manifest><opf:item id="a" href="a.xhtml" media-type="application/xhtml+xml"/></opf:manifest><opf:spine/></opf:package>"#;
        let doc = PackageDocument::parse_xml(xml).unwrap();
        assert!(!doc.has_declaration);
        assert_eq!(doc.manifest.prefix.as_deref(), Some("opf"));
        assert_eq!(doc.manifest.items.len(), 1);
        assert_eq!(doc.spine.open, "<opf:spine>");
        assert_eq!(doc.spine.close, "</opf:spine>");
        assert!(doc.spine.items.is_empty());
    }

    #[test]
    fn test_missing_spine_is_an_error() {
        let xml = r#"<package><manifest></manifest></package>"#;
        assert!(matches!(
            PackageDocument::parse_xml(xml),
            Err(EpubError::OpfParseError(_))
        ));
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let xml = r#"<package><manifest><item id="a"></manifest><spine/></package>"#;
        assert!(PackageDocument::parse_xml(xml).is_err());
    }
}

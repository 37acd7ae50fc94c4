use std::fs;
use std::path::Path;

use log::debug;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use walkdir::WalkDir;

use crate::epub::archive::relative_entry_name;
use crate::epub::error::{EpubError, Result};

/// container.xml在工作目录中的位置
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// OPF包文件的媒体类型
pub const OPF_MEDIA_TYPE: &str = "application/oebps-package+xml";

/// Container.xml中的rootfile信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootFile {
    pub full_path: String,
    pub media_type: String,
}

/// Container.xml的解析结果
#[derive(Debug, Clone)]
pub struct Container {
    pub rootfiles: Vec<RootFile>,
}

impl Container {
    /// 解析container.xml内容
    ///
    /// # 参数
    /// * `xml_content` - container.xml的文件内容
    ///
    /// # 返回值
    /// * `Result<Container, EpubError>` - 解析后的Container信息
    pub fn parse_xml(xml_content: &str) -> Result<Container> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);

        let mut rootfiles = Vec::new();
        let mut in_rootfiles = false;

        loop {
            match reader.read_event()? {
                Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"rootfiles" => in_rootfiles = true,
                    b"rootfile" if in_rootfiles => {
                        let mut full_path = String::new();
                        let mut media_type = String::new();

                        for attr_result in e.attributes() {
                            let attr = attr_result
                                .map_err(|e| EpubError::XmlError(quick_xml::Error::InvalidAttr(e)))?;
                            match attr.key.local_name().as_ref() {
                                b"full-path" => full_path = attr.unescape_value()?.into_owned(),
                                b"media-type" => media_type = attr.unescape_value()?.into_owned(),
                                _ => {}
                            }
                        }

                        if !full_path.is_empty() {
                            rootfiles.push(RootFile {
                                full_path,
                                media_type,
                            });
                        }
                    }
                    _ => {}
                },
                Event::End(ref e) => {
                    if e.local_name().as_ref() == b"rootfiles" {
                        in_rootfiles = false;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if rootfiles.is_empty() {
            return Err(EpubError::ContainerParseError(
                "没有找到任何rootfile条目".to_string(),
            ));
        }

        Ok(Container { rootfiles })
    }

    /// 获取主要的OPF文件路径
    ///
    /// 优先返回第一个 `application/oebps-package+xml` 类型的rootfile，否则返回第一个rootfile。
    pub fn get_opf_path(&self) -> Option<&str> {
        self.rootfiles
            .iter()
            .find(|rootfile| rootfile.media_type == OPF_MEDIA_TYPE)
            .or_else(|| self.rootfiles.first())
            .map(|rootfile| rootfile.full_path.as_str())
    }
}

/// 在工作目录中定位OPF文件
///
/// 先查看container.xml声明的rootfile，它无法解析或指向不存在的文件时，
/// 退回到按扩展名查找的第一个 `.opf` 文件。
///
/// # 返回值
/// * `Result<Option<String>>` - 相对于工作目录的路径，没有OPF时为None
pub fn locate_package_file(root: &Path) -> Result<Option<String>> {
    let container_path = root.join(CONTAINER_PATH);
    if container_path.is_file() {
        let declared = fs::read_to_string(&container_path)
            .map_err(EpubError::from)
            .and_then(|xml| Container::parse_xml(&xml));
        match declared {
            Ok(container) => {
                if let Some(opf_path) = container.get_opf_path() {
                    let opf_path = opf_path.trim_start_matches('/');
                    if root.join(opf_path).is_file() {
                        return Ok(Some(opf_path.to_string()));
                    }
                    debug!("container.xml指向的OPF不存在: {}", opf_path);
                }
            }
            Err(e) => debug!("无法解析container.xml: {}", e),
        }
    }

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let is_opf = entry.file_type().is_file()
            && entry.path().extension().and_then(|ext| ext.to_str()) == Some("opf");
        if !is_opf {
            continue;
        }
        if let Some(rel_path) = relative_entry_name(root, entry.path()) {
            return Ok(Some(rel_path));
        }
    }

    Ok(None)
}

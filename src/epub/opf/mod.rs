//! OPF（Open Packaging Format）文件处理模块
//!
//! 此模块负责解析EPUB包文件中的清单、脊柱和guide区段，
//! 并在文档拆分后同步更新这些信息。

mod manifest;
mod parser;
mod resync;
mod spine;
mod writer;

pub use manifest::{Manifest, ManifestItem, XHTML_MEDIA_TYPE};
pub use parser::{Guide, PackageDocument};
pub use resync::{ResyncSummary, relative_href, resync_package, sanitize_id, update_package_file};
pub use spine::{Spine, SpineItem};
pub use writer::DEFAULT_OPF_DECLARATION;

/// 新插入项目使用的缩进
const DEFAULT_INDENT: &str = "\n    ";

/// 取参考项目前导文本中最后一个换行之后的缩进
fn item_indent(lead: Option<&str>) -> String {
    lead.and_then(|lead| lead.rfind('\n').map(|i| &lead[i..]))
        .filter(|indent| indent.trim().is_empty())
        .unwrap_or(DEFAULT_INDENT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_indent() {
        assert_eq!(item_indent(Some("\n\t\t")), "\n\t\t");
        assert_eq!(item_indent(Some("\n  <!-- x -->\n    ")), "\n    ");
        assert_eq!(item_indent(Some("<!-- x -->")), DEFAULT_INDENT);
        assert_eq!(item_indent(Some("\n  <!-- x -->")), DEFAULT_INDENT);
        assert_eq!(item_indent(None), DEFAULT_INDENT);
    }
}

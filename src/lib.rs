pub mod epub;

// === 核心API重新导出 ===

/// 完整的拆分流程（主要接口）
pub use epub::{ManifestStatus, SplitOptions, SplitReport, run};

/// 错误处理
pub use epub::{EpubError, Result};

/// 配置
pub use epub::{DEFAULT_CONFIG_PATH, SplitConfig};

// === 底层组件（高级用法） ===

/// 标记拆分与文档重建
pub use epub::{
    DocumentHeader,
    Fragment,
    Marker,
    SkipReason,
    SourceDocument,
    SplitRecord,
    SplitResult,
    split_all,
    split_fragments,
};

/// OPF组件
pub use epub::{
    Guide,
    Manifest,
    ManifestItem,
    PackageDocument,
    ResyncSummary,
    Spine,
    SpineItem,
    resync_package,
    update_package_file,
};

/// 容器组件
pub use epub::{Container, RootFile, locate_package_file};

// === 库信息 ===

/// 库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库的描述
pub const DESCRIPTION: &str = "按标记把EPUB中的长文档拆分为单页文件的工具库";

// === 便捷函数 ===

/// 使用默认的工作目录设置拆分EPUB文件
///
/// # 参数
/// * `input` - 输入的EPUB文件路径
/// * `marker` - 标识每页开始的标记文本
/// * `output` - 输出的EPUB文件路径
///
/// # 示例
///
/// ```no_run
/// let report = epub_splitter::split_epub("book.epub", r#"class="stl_ stl_02""#, "book-split.epub")?;
/// println!("片段数: {}", report.total_fragments());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn split_epub<P, Q>(input: P, marker: &str, output: Q) -> Result<SplitReport>
where
    P: Into<std::path::PathBuf>,
    Q: Into<std::path::PathBuf>,
{
    let mut options = SplitOptions::new(input, marker);
    options.output = Some(output.into());
    run(&options)
}

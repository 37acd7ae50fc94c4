pub mod archive;
pub mod config;
pub mod container;
pub mod error;
pub mod opf;
pub mod pipeline;
pub mod split;

// 重新导出错误处理
pub use error::{EpubError, Result};

// 重新导出配置
pub use config::{DEFAULT_CONFIG_PATH, SplitConfig};

// 重新导出容器相关
pub use container::{Container, RootFile, locate_package_file};

// 重新导出OPF相关
pub use opf::{
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

// 重新导出拆分相关
pub use split::{
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

// 重新导出流程
pub use pipeline::{ManifestStatus, SplitOptions, SplitReport, run};

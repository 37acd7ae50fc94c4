//! 拆分流程模块
//!
//! 串联整个处理过程：解压 → 拆分文档 → 同步OPF → 重新打包（预览模式下跳过）。
//! 单个文档的跳过和OPF阶段的失败都不会中止运行，其他错误直接返回给调用方。

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::epub::archive;
use crate::epub::container::locate_package_file;
use crate::epub::error::{EpubError, Result};
use crate::epub::opf::{ResyncSummary, update_package_file};
use crate::epub::split::{Marker, SplitResult, discover_documents, split_all};

/// 拆分参数
#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// 输入的EPUB文件
    pub input: PathBuf,
    /// 标识每页开始的标记文本（字面文本，未转义）
    pub marker: String,
    /// 输出的EPUB文件，预览模式下可以为None
    pub output: Option<PathBuf>,
    /// 预览模式：只写出拆分后的文件，不重新打包
    pub preview: bool,
    /// 工作目录的父目录
    pub work_dir_parent: PathBuf,
    /// 工作目录的名称前缀
    pub work_dir_prefix: String,
}

impl SplitOptions {
    /// 使用默认的工作目录设置创建参数
    pub fn new<P: Into<PathBuf>>(input: P, marker: &str) -> Self {
        Self {
            input: input.into(),
            marker: marker.to_string(),
            output: None,
            preview: false,
            work_dir_parent: PathBuf::from("."),
            work_dir_prefix: ".split_epub_tmp_".to_string(),
        }
    }

    /// 根据输入文件名生成默认输出路径：`<文件名><后缀>.epub`，与输入位于同一目录
    pub fn default_output(input: &Path, suffix: &str) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        input.with_file_name(format!("{}{}.epub", stem, suffix))
    }
}

/// OPF同步阶段的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestStatus {
    /// OPF已更新
    Updated {
        /// OPF相对于工作目录的路径
        path: String,
        summary: ResyncSummary,
    },
    /// 没有文档被拆分，OPF保持原样
    Unchanged,
    /// 没有找到OPF文件，拆分后的文档与旧的清单并存
    Missing,
    /// 更新失败，磁盘上的OPF保持原样，拆分后的文档仍然保留
    Failed(String),
}

/// 一次运行的结果
#[derive(Debug, Clone)]
pub struct SplitReport {
    /// 工作目录（始终保留在磁盘上）
    pub work_dir: PathBuf,
    /// 扫描的HTML/XHTML文档数量
    pub documents_scanned: usize,
    /// 拆分结果
    pub split: SplitResult,
    /// OPF同步结果
    pub manifest: ManifestStatus,
    /// 生成的EPUB文件，预览模式下为None
    pub output: Option<PathBuf>,
}

impl SplitReport {
    /// 生成的片段总数
    pub fn total_fragments(&self) -> usize {
        self.split.total_fragments()
    }
}

/// 查找目录中的 `.epub` 文件，按文件名排序
pub fn discover_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_epub = path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("epub");
        if is_epub {
            inputs.push(path);
        }
    }
    inputs.sort();
    Ok(inputs)
}

/// 对已解压的工作目录执行拆分和OPF同步
///
/// # 返回值
/// * `Result<(usize, SplitResult, ManifestStatus)>` - (扫描的文档数, 拆分结果, OPF同步结果)
pub fn process_directory(
    root: &Path,
    marker: &Marker,
) -> Result<(usize, SplitResult, ManifestStatus)> {
    info!("🔍 正在扫描HTML/XHTML文件...");
    let documents = discover_documents(root)?;
    if documents.is_empty() {
        return Err(EpubError::NoInput(format!(
            "{} 中没有HTML/XHTML文件",
            root.display()
        )));
    }
    info!("找到 {} 个HTML/XHTML文件", documents.len());

    let split = split_all(root, &documents, marker)?;
    let manifest = sync_manifest(root, &split)?;

    Ok((documents.len(), split, manifest))
}

/// OPF同步阶段：缺失和更新失败都转换为 [`ManifestStatus`]
fn sync_manifest(root: &Path, split: &SplitResult) -> Result<ManifestStatus> {
    if split.is_empty() {
        info!("没有文档被拆分，OPF保持不变");
        return Ok(ManifestStatus::Unchanged);
    }

    let Some(opf_path) = locate_package_file(root)? else {
        warn!("{}；清单和脊柱不会自动更新，建议手动检查", EpubError::ManifestMissing);
        return Ok(ManifestStatus::Missing);
    };

    match update_package_file(root, &opf_path, split) {
        Ok(summary) => {
            info!("OPF已更新，请手动检查OPF和导航文档(nav.xhtml)");
            Ok(ManifestStatus::Updated {
                path: opf_path,
                summary,
            })
        }
        Err(e) => {
            error!("{}", e);
            Ok(ManifestStatus::Failed(e.to_string()))
        }
    }
}

/// 执行完整的拆分流程
///
/// 工作目录在 `work_dir_parent` 下创建，运行结束后不会自动删除。
pub fn run(options: &SplitOptions) -> Result<SplitReport> {
    if !options.input.is_file() {
        return Err(EpubError::NoInput(format!(
            "文件不存在: {}",
            options.input.display()
        )));
    }

    let output = match (&options.output, options.preview) {
        (_, true) => None,
        (Some(output), false) => Some(output.clone()),
        (None, false) => {
            return Err(EpubError::ConfigError(
                "非预览模式必须指定输出文件".to_string(),
            ));
        }
    };

    let marker = Marker::new(&options.marker)?;
    let work_dir = archive::create_work_dir(&options.work_dir_parent, &options.work_dir_prefix)?;

    info!("📦 正在解压EPUB...");
    archive::unpack(&options.input, &work_dir)?;
    info!("EPUB已解压到 {}", work_dir.display());

    let (documents_scanned, split, manifest) = process_directory(&work_dir, &marker)?;

    if let Some(output) = &output {
        archive::pack(&work_dir, output)?;
        info!("EPUB已生成: {}", output.display());
    } else {
        warn!("预览模式：EPUB不会重新打包，新文件位于 {}", work_dir.display());
    }

    Ok(SplitReport {
        work_dir,
        documents_scanned,
        split,
        manifest,
        output,
    })
}

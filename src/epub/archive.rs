//! 归档模块
//!
//! 负责EPUB文件与工作目录之间的转换：解压到工作目录、把工作目录重新打包。

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::epub::error::Result;

/// mimetype条目名称
pub const MIMETYPE_ENTRY: &str = "mimetype";

/// EPUB的mimetype内容
pub const EPUB_MIMETYPE: &str = "application/epub+zip";

/// 把工作目录中的路径转换为以 `/` 分隔的相对路径
pub(crate) fn relative_entry_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let name = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    (!name.is_empty()).then_some(name)
}

/// 在 `parent` 下创建一个保留在磁盘上的工作目录
///
/// 目录不会被自动删除，预览模式和失败的运行都可以在其中检查结果。
pub fn create_work_dir(parent: &Path, prefix: &str) -> Result<PathBuf> {
    let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(parent)?;
    Ok(dir.keep())
}

/// 把EPUB文件解压到工作目录
///
/// mimetype缺失或内容不正确时只记录警告，不会中止处理。
///
/// # 返回值
/// * `Result<usize>` - 解压的条目数量
pub fn unpack(epub_path: &Path, work_dir: &Path) -> Result<usize> {
    let file = File::open(epub_path)?;
    let mut archive = ZipArchive::new(file)?;

    match archive.by_name(MIMETYPE_ENTRY) {
        Ok(mut entry) => {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            if content.trim() != EPUB_MIMETYPE {
                warn!("mimetype内容不是 {}: {}", EPUB_MIMETYPE, content.trim());
            }
        }
        Err(_) => warn!("EPUB中缺少mimetype文件"),
    }

    let count = archive.len();
    archive.extract(work_dir)?;
    debug!("解压了 {} 个条目到 {}", count, work_dir.display());
    Ok(count)
}

/// 把工作目录重新打包为EPUB
///
/// mimetype（如果存在）作为第一个条目不压缩写入，其余文件按路径排序后压缩写入。
///
/// # 返回值
/// * `Result<usize>` - 写入的条目数量
pub fn pack(work_dir: &Path, output: &Path) -> Result<usize> {
    info!("📚 正在重新打包EPUB: {}", output.display());

    let file = File::create(output)?;
    let mut zip = ZipWriter::new(file);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut count = 0;

    let mimetype = work_dir.join(MIMETYPE_ENTRY);
    if mimetype.is_file() {
        zip.start_file(MIMETYPE_ENTRY, stored)?;
        zip.write_all(&fs::read(&mimetype)?)?;
        count += 1;
    }

    for entry in WalkDir::new(work_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = relative_entry_name(work_dir, entry.path()) else {
            continue;
        };
        if name == MIMETYPE_ENTRY {
            continue;
        }

        zip.start_file(name, deflated)?;
        zip.write_all(&fs::read(entry.path())?)?;
        count += 1;
    }

    zip.finish()?;
    Ok(count)
}

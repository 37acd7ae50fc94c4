//! 文档重建模块
//!
//! 把拆分得到的每个片段写成一个独立、结构完整的XHTML文档，
//! 全部写入成功后删除原始文档。

use std::fs;
use std::path::Path;

use log::debug;

use crate::epub::error::Result;
use crate::epub::split::header::{
    DocumentHeader, strip_conditional_comments, strip_structural_tags,
};

/// 工作目录中的一个原始文档
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// 相对于工作目录的路径（使用 `/` 分隔）
    pub rel_path: String,
    /// 原始文本
    pub content: String,
}

impl SourceDocument {
    /// 从工作目录读取文档，非UTF-8字节按替换字符处理
    pub fn read(root: &Path, rel_path: &str) -> Result<Self> {
        let bytes = fs::read(root.join(rel_path))?;
        Ok(Self {
            rel_path: rel_path.to_string(),
            content: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// 文件名（含扩展名）
    pub fn file_name(&self) -> &str {
        self.rel_path
            .rsplit_once('/')
            .map_or(self.rel_path.as_str(), |(_, name)| name)
    }

    /// 去掉扩展名后的文件名
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(i) if i > 0 => &name[..i],
            _ => name,
        }
    }

    /// 所在目录（相对于工作目录，根目录为空字符串）
    pub fn dir(&self) -> &str {
        self.rel_path.rsplit_once('/').map_or("", |(dir, _)| dir)
    }
}

/// 拆分得到的一个片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// 从1开始的序号
    pub seq: usize,
    /// 清理并修剪后的正文标记
    pub body: String,
}

impl Fragment {
    /// 清理原始片段文本：去掉条件注释和残留的html/body标签，再修剪空白
    pub fn new(seq: usize, raw: &str) -> Self {
        let body = strip_conditional_comments(raw);
        let body = strip_structural_tags(&body);
        Self {
            seq,
            body: body.trim().to_string(),
        }
    }

    /// 输出文件名：`<原文件名>_pg<三位序号>.xhtml`
    pub fn file_name(&self, stem: &str) -> String {
        format!("{}_pg{:03}.xhtml", stem, self.seq)
    }
}

/// 把原始片段文本转换为编号连续的片段
///
/// 清理后为空的片段会被丢弃，剩余片段重新从1开始编号。
pub fn build_fragments(parts: &[&str]) -> Vec<Fragment> {
    parts
        .iter()
        .map(|raw| Fragment::new(0, raw))
        .filter(|fragment| !fragment.body.is_empty())
        .enumerate()
        .map(|(i, fragment)| Fragment {
            seq: i + 1,
            ..fragment
        })
        .collect()
}

/// 写出所有片段文件并删除原始文档
///
/// # 参数
/// * `root` - 工作目录
/// * `source` - 原始文档
/// * `header` - 从原始文档扫描得到的头部材料
/// * `fragments` - 片段列表
///
/// # 返回值
/// * `Result<Vec<String>>` - 新文件相对于工作目录的路径，顺序与片段一致
pub fn write_fragments(
    root: &Path,
    source: &SourceDocument,
    header: &DocumentHeader,
    fragments: &[Fragment],
) -> Result<Vec<String>> {
    let dir = source.dir();
    let stem = source.stem();
    let mut written = Vec::with_capacity(fragments.len());

    for fragment in fragments {
        let name = fragment.file_name(stem);
        let rel_path = if dir.is_empty() {
            name
        } else {
            format!("{}/{}", dir, name)
        };

        fs::write(root.join(&rel_path), header.wrap(&fragment.body))?;
        debug!("写入片段: {}", rel_path);
        written.push(rel_path);
    }

    if !header.trailing.trim().is_empty() {
        debug!("{} 中 </body> 之后的内容不会保留到拆分结果中", source.rel_path);
    }

    fs::remove_file(root.join(&source.rel_path))?;
    Ok(written)
}

//! 拆分配置模块
//!
//! 提供拆分参数的配置管理功能，支持从YAML文件加载配置。

use crate::epub::error::{EpubError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "epub-split.yaml";

/// 拆分配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// 标识每页开始的标记文本
    pub marker: String,
    /// 默认输出文件名的后缀
    pub output_suffix: String,
    /// 临时工作目录的名称前缀
    pub work_dir_prefix: String,
    /// 只写出拆分后的文件，不重新打包
    pub preview: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            marker: r#"class="stl_ stl_02""#.to_string(),
            output_suffix: "-split".to_string(),
            work_dir_prefix: ".split_epub_tmp_".to_string(),
            preview: false,
        }
    }
}

impl SplitConfig {
    /// 从指定的配置文件中加载配置
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use epub_splitter::SplitConfig;
    /// let config = SplitConfig::from_file("epub-split.yaml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| EpubError::ConfigError(format!("无法读取配置文件: {}", e)))?;

        serde_yml::from_str(&content)
            .map_err(|e| EpubError::ConfigError(format!("配置文件格式错误: {}", e)))
    }

    /// 配置文件存在时加载，不存在时使用默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// 把默认配置写入指定文件
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let yaml_content = serde_yml::to_string(&Self::default())
            .map_err(|e| EpubError::ConfigError(format!("序列化配置失败: {}", e)))?;

        let content_with_header = format!(
            "# EPUB拆分配置文件\n# marker: 标识每页开始的<div>属性文本（按字面匹配，不区分大小写）\n\n{}",
            yaml_content
        );

        fs::write(path.as_ref(), content_with_header)
            .map_err(|e| EpubError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}

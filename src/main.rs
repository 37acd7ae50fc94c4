use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use epub_splitter::epub::pipeline::discover_inputs;
use epub_splitter::{
    DEFAULT_CONFIG_PATH, EpubError, ManifestStatus, Result, SplitConfig, SplitOptions,
    SplitReport, run,
};
use log::LevelFilter;

/// ✂️ EPUB Splitter - 按标记把EPUB拆分为单页文档
#[derive(Parser)]
#[command(name = "epub-split")]
#[command(about = "按标记把EPUB中的长XHTML文档拆分为单页文件，并更新OPF清单与脊柱")]
#[command(version)]
struct Args {
    /// EPUB文件路径
    #[arg(help = "要拆分的EPUB文件路径（省略时使用当前目录中唯一的.epub文件）")]
    input: Option<PathBuf>,

    /// 拆分标记
    #[arg(short, long, help = "标识每页开始的<div>属性文本，按字面匹配")]
    marker: Option<String>,

    /// 输出文件
    #[arg(short, long, help = "输出的EPUB文件路径（默认为 <输入文件名>-split.epub）")]
    output: Option<PathBuf>,

    /// 预览模式
    #[arg(short, long, help = "只写出拆分后的文件，不重新打包EPUB")]
    preview: bool,

    /// 配置文件
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, help = "YAML配置文件路径")]
    config: PathBuf,

    /// 生成默认配置文件
    #[arg(long, help = "把默认配置写入 --config 指定的文件后退出")]
    init_config: bool,

    /// 详细输出模式
    #[arg(short, long, conflicts_with = "quiet", help = "显示调试信息")]
    verbose: bool,

    /// 安静模式
    #[arg(short, long, help = "只显示警告和错误")]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(&args);

    println!("✂️ EPUB Splitter - EPUB拆分工具");

    match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ 错误: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logger(args: &Args) {
    let level = if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn execute(args: &Args) -> Result<()> {
    if args.init_config {
        SplitConfig::generate_default_config(&args.config)?;
        println!("📝 已生成配置文件: {}", args.config.display());
        return Ok(());
    }

    let config = SplitConfig::load_or_default(&args.config)?;
    let input = resolve_input(args.input.clone())?;
    let preview = args.preview || config.preview;

    let mut options = SplitOptions::new(&input, args.marker.as_deref().unwrap_or(&config.marker));
    options.preview = preview;
    options.work_dir_prefix = config.work_dir_prefix.clone();
    if !preview {
        options.output = Some(
            args.output
                .clone()
                .unwrap_or_else(|| SplitOptions::default_output(&input, &config.output_suffix)),
        );
    }

    println!("\n📋 设置:");
    println!("  📄 EPUB文件: {}", input.display());
    match &options.output {
        Some(output) => println!("  📦 输出: {}", output.display()),
        None => println!("  📦 输出: (预览模式，不打包)"),
    }
    println!("  🔎 标记: {}", options.marker);
    println!("  👀 预览模式: {}", if preview { "启用" } else { "禁用" });

    let report = run(&options)?;
    print_summary(&report);
    Ok(())
}

/// 确定输入文件：命令行未指定时在当前目录中查找
fn resolve_input(input: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(input) = input {
        return Ok(input);
    }

    let mut candidates = discover_inputs(Path::new("."))?;
    match candidates.len() {
        0 => Err(EpubError::NoInput("当前目录中没有找到.epub文件".to_string())),
        1 => Ok(candidates.remove(0)),
        _ => {
            let names: Vec<String> = candidates
                .iter()
                .map(|path| path.display().to_string())
                .collect();
            Err(EpubError::NoInput(format!(
                "当前目录中有多个.epub文件，请指定其中一个: {}",
                names.join(", ")
            )))
        }
    }
}

fn print_summary(report: &SplitReport) {
    println!("\n📊 结果:");
    println!("  扫描文档: {}", report.documents_scanned);
    println!("  拆分文档: {}", report.split.len());
    for record in &report.split {
        println!("    ✂️ {} → {} 个片段", record.source, record.fragments.len());
    }

    match &report.manifest {
        ManifestStatus::Updated { path, summary } => println!(
            "  📝 OPF: {} (删除 {} 项, 新增 {} 项, 脊柱 {} 项)",
            path, summary.removed_items, summary.added_items, summary.spine_len
        ),
        ManifestStatus::Unchanged => println!("  📝 OPF: 未修改"),
        ManifestStatus::Missing => println!("  ⚠️ OPF: 没有找到，清单未更新"),
        ManifestStatus::Failed(message) => println!("  ❌ OPF: 更新失败 ({})", message),
    }

    match &report.output {
        Some(output) => {
            println!("\n✔️ 完成，生成文件: {}", output.display());
            println!("🗂️ 临时目录（可以删除）: {}", report.work_dir.display());
        }
        None => println!("\n👀 预览模式: 新文件位于 {}", report.work_dir.display()),
    }
    println!("✂️ 共生成片段: {}", report.total_fragments());
}

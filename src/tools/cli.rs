//! 命令行接口模块
//!
//! 负责命令行参数解析、配置管理和程序信息展示。
//! 配置在解析阶段统一校验，任何文件被读取之前就会拒绝非法参数。

use super::constants::{defaults, host_core_count};
use crate::core::UpscaleConfig;
use crate::error::{UpscaleError, UpscaleResult};
use crate::processing::BackendKind;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// 应用程序版本信息
const VERSION: &str = env!("CARGO_PKG_VERSION");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// worker子命令名称（由协调进程内部使用）
pub const WORKER_SUBCOMMAND: &str = "worker";

/// 默认输出目录
pub const DEFAULT_OUTPUT_DIR: &str = "upscaled";

/// 批处理模式配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 输入文件或目录（可混合）
    pub inputs: Vec<PathBuf>,

    /// 输出目录
    pub output_dir: PathBuf,

    /// 升频参数（已校验）
    pub upscale: UpscaleConfig,

    /// 分块执行后端
    pub backend: BackendKind,

    /// 文件级并发度（None = 串行）
    pub parallel_files: Option<usize>,

    /// worker进程数（None = 进程内处理）
    pub processes: Option<usize>,

    /// 是否递归扫描子目录
    pub recursive: bool,

    /// 文本报告输出路径
    pub report_path: Option<PathBuf>,

    /// 是否显示详细信息
    pub verbose: bool,
}

/// worker进程配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub backend: BackendKind,
    pub workers: usize,
}

/// 运行模式
#[derive(Debug, Clone)]
pub enum CliMode {
    Batch(AppConfig),
    Worker(WorkerConfig),
}

/// 构建命令定义
pub fn build_command() -> Command {
    Command::new("fat-llama")
        .version(VERSION)
        .about(DESCRIPTION)
        .args_conflicts_with_subcommands(true)
        .subcommand_negates_reqs(true)
        .arg(
            Arg::new("INPUT")
                .help("音频文件或目录 (支持MP3, WAV, OGG, FLAC, M4A, AIFF) / input files or directories")
                .num_args(1..)
                .required(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .short('o')
                .help("输出目录 / output directory")
                .value_name("DIR")
                .default_value(DEFAULT_OUTPUT_DIR)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("iterations")
                .long("iterations")
                .short('i')
                .help("IST迭代次数 [10, 1000] / IST iterations")
                .default_value("800")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .short('t')
                .help("频谱阈值 (0.1, 1.0] / spectral threshold")
                .default_value("0.6")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("bitrate")
                .long("bitrate")
                .short('b')
                .help("目标码率kbps (FLAC 800-1411, WAV 800-6444) / target bitrate")
                .default_value("1411")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .help("目标格式 flac|wav / target format")
                .default_value(defaults::TARGET_FORMAT),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .short('w')
                .help("每声道分块数/线程数（默认CPU核心数） / chunks and threads per channel")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("backend")
                .long("backend")
                .help("分块执行后端 local|distributed|serial / chunk execution backend")
                .default_value("local"),
        )
        .arg(
            Arg::new("parallel-files")
                .long("parallel-files")
                .help("文件级并发度 / number of files processed concurrently")
                .value_name("N")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("processes")
                .long("processes")
                .short('p')
                .help("使用N个worker进程分发文件 / distribute files over N worker processes")
                .value_name("N")
                .conflicts_with("parallel-files")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("recursive")
                .long("recursive")
                .short('r')
                .help("递归扫描子目录 / scan directories recursively")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .help("写出文本报告 / write a text report")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("显示详细处理信息 / verbose output")
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new(WORKER_SUBCOMMAND)
                .hide(true)
                .about("从stdin读取任务记录并处理 / process task records from stdin")
                .arg(
                    Arg::new("workers")
                        .long("workers")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(Arg::new("backend").long("backend").default_value("local")),
        )
}

/// 解析命令行参数
pub fn parse_args() -> UpscaleResult<CliMode> {
    let matches = build_command()
        .try_get_matches()
        .unwrap_or_else(|e| e.exit());
    mode_from_matches(&matches)
}

/// 从给定参数解析（测试与复用）
pub fn parse_from<I, T>(args: I) -> UpscaleResult<CliMode>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = build_command()
        .try_get_matches_from(args)
        .map_err(|e| UpscaleError::ConfigError(e.to_string()))?;
    mode_from_matches(&matches)
}

fn mode_from_matches(matches: &ArgMatches) -> UpscaleResult<CliMode> {
    if let Some(worker) = matches.subcommand_matches(WORKER_SUBCOMMAND) {
        return Ok(CliMode::Worker(WorkerConfig {
            backend: string_arg(worker, "backend").parse()?,
            workers: worker
                .get_one::<usize>("workers")
                .copied()
                .unwrap_or_else(host_core_count)
                .max(1),
        }));
    }

    let upscale = UpscaleConfig::from_parts(
        matches
            .get_one::<u32>("iterations")
            .copied()
            .unwrap_or(defaults::MAX_ITERATIONS),
        matches
            .get_one::<f64>("threshold")
            .copied()
            .unwrap_or(defaults::THRESHOLD),
        matches
            .get_one::<u32>("bitrate")
            .copied()
            .unwrap_or(defaults::TARGET_BITRATE_KBPS),
        string_arg(matches, "format"),
        matches
            .get_one::<usize>("workers")
            .copied()
            .unwrap_or_else(host_core_count),
    )?;

    if matches.get_one::<usize>("processes") == Some(&0) {
        return Err(UpscaleError::ConfigError(
            "worker进程数必须至少为1 / --processes must be >= 1".to_string(),
        ));
    }

    Ok(CliMode::Batch(AppConfig {
        inputs: matches
            .get_many::<PathBuf>("INPUT")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
        output_dir: matches
            .get_one::<PathBuf>("output-dir")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        upscale,
        backend: string_arg(matches, "backend").parse()?,
        parallel_files: matches.get_one::<usize>("parallel-files").copied(),
        processes: matches.get_one::<usize>("processes").copied(),
        recursive: matches.get_flag("recursive"),
        report_path: matches.get_one::<PathBuf>("report").cloned(),
        verbose: matches.get_flag("verbose"),
    }))
}

fn string_arg<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .unwrap_or_default()
}

/// 显示程序启动信息
pub fn show_startup_info(config: &AppConfig) {
    println!("🦙 Fat Llama Upscaler v{VERSION} 启动 / starting");
    println!(
        "   目标 / target: {} @ {} kbps, 迭代 / iterations: {}, 阈值 / threshold: {}",
        config.upscale.target_format,
        config.upscale.target_bitrate_kbps,
        config.upscale.max_iterations,
        config.upscale.threshold
    );
    if config.verbose {
        println!(
            "   后端 / backend: {} ({} workers)",
            config.backend, config.upscale.worker_count
        );
        println!("   输出目录 / output dir: {}", config.output_dir.display());
    }
    println!();
}

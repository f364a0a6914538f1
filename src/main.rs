//! Fat Llama Upscaler - 主程序入口
//!
//! 纯流程控制器，负责协调各个工具模块完成批量升频任务。

use fatllama_upscaler::{
    audio::SUPPORTED_EXTENSIONS,
    error::{ErrorCategory, UpscaleError, UpscaleResult},
    processing::{ExecutionBackend, TracingObserver, create_backend},
    tools::{self, AppConfig, BatchEntry, BatchStatsSnapshot, CliMode, WorkerConfig},
};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 错误退出码定义
mod exit_codes {
    /// 通用/I/O错误
    pub const GENERAL_ERROR: i32 = 1;
    /// 参数/配置错误
    pub const CONFIG_ERROR: i32 = 2;
    /// 输入文件错误
    pub const INPUT_ERROR: i32 = 3;
    /// 算法执行错误
    pub const ALGORITHM_ERROR: i32 = 4;
    /// 编码写出错误
    pub const ENCODE_ERROR: i32 = 5;
    /// 资源/并发错误
    pub const RESOURCE_ERROR: i32 = 6;
}

fn exit_code_for(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::Config => exit_codes::CONFIG_ERROR,
        ErrorCategory::Input => exit_codes::INPUT_ERROR,
        ErrorCategory::Algorithm => exit_codes::ALGORITHM_ERROR,
        ErrorCategory::Encode => exit_codes::ENCODE_ERROR,
        ErrorCategory::Resource => exit_codes::RESOURCE_ERROR,
        ErrorCategory::Io => exit_codes::GENERAL_ERROR,
    }
}

/// 获取错误建议文本
fn get_error_suggestion(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Config => {
            "检查命令行参数是否正确，使用 --help 查看完整用法（mp3 不能作为输出格式） / Check command-line arguments, use --help for full usage (mp3 is not an output format)"
        }
        ErrorCategory::Input => {
            "检查文件路径是否正确，文件是否存在且为支持的格式 / Check that the file exists and is in a supported format"
        }
        ErrorCategory::Algorithm => {
            "音频可能过短，尝试减少 --workers / Audio may be too short, try fewer --workers"
        }
        ErrorCategory::Encode => {
            "检查输出目录是否可写 / Check that the output directory is writable"
        }
        ErrorCategory::Io => "检查磁盘空间与文件权限 / Check disk space and file permissions",
        ErrorCategory::Resource => {
            "资源不可用，请降低并发度（--workers / --parallel-files / --processes）后重试 / Resource unavailable, reduce parallelism and retry"
        }
    }
}

/// 错误处理和建议
fn handle_error(error: UpscaleError) -> ! {
    eprintln!("[ERROR] 错误 / Error: {error}");

    let category = ErrorCategory::from_error(&error);
    eprintln!("[INFO] 建议 / Suggestion: {}", get_error_suggestion(category));

    if matches!(category, ErrorCategory::Input) {
        let uppercase_formats: Vec<String> =
            SUPPORTED_EXTENSIONS.iter().map(|s| s.to_uppercase()).collect();
        eprintln!(
            "   Supported formats / 支持的格式: {}",
            uppercase_formats.join(", ")
        );
    }

    process::exit(exit_code_for(category));
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "fatllama_upscaler=debug"
    } else {
        "fatllama_upscaler=info"
    };
    // stdout 在worker模式下是报告通道，日志一律写到 stderr
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// worker进程模式：从stdin读取任务，向stdout回写报告
fn run_worker(config: &WorkerConfig) -> UpscaleResult<i32> {
    let backend = create_backend(config.backend, config.workers)?;
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let handled = tools::run_worker_loop(
        stdin.lock(),
        stdout.lock(),
        config.workers,
        backend.as_ref(),
        &TracingObserver,
    )?;
    tracing::debug!(handled, "worker退出 / worker exiting");
    Ok(0)
}

/// 进程内处理（串行或文件级并行）
fn process_in_process(
    config: &AppConfig,
    audio_files: &[PathBuf],
    backend: &dyn ExecutionBackend,
) -> (Vec<BatchEntry>, BatchStatsSnapshot) {
    let observer = TracingObserver;
    match config.parallel_files {
        None => tools::process_batch_serial(audio_files, config, backend, &observer),
        Some(degree) => {
            let actual_degree =
                tools::utils::effective_parallel_degree(degree, Some(audio_files.len()));

            if actual_degree == 1 {
                if config.verbose {
                    println!("[INFO] 并发度为1，使用串行模式 / Parallelism=1, using serial mode");
                }
                tools::process_batch_serial(audio_files, config, backend, &observer)
            } else {
                tools::process_batch_parallel(audio_files, config, actual_degree, backend, &observer)
                    .unwrap_or_else(|e| {
                        eprintln!("[WARNING] 并行处理失败 / Parallel processing failed: {e}，回退到串行模式 / fallback to serial");
                        tools::process_batch_serial(audio_files, config, backend, &observer)
                    })
            }
        }
    }
}

/// 批量处理模式
fn run_batch(config: &AppConfig) -> UpscaleResult<i32> {
    tools::show_startup_info(config);

    let audio_files = tools::collect_input_files(&config.inputs, config.recursive)?;
    tools::show_scan_results(config, &audio_files);

    if audio_files.is_empty() {
        return Ok(0);
    }

    let (entries, stats) = match config.processes {
        Some(processes) => {
            let entries = tools::run_farm(&audio_files, config, processes)?;
            let stats = tools::stats_from_entries(&entries);
            (entries, stats)
        }
        None => {
            let backend = create_backend(config.backend, config.upscale.worker_count)?;
            process_in_process(config, &audio_files, backend.as_ref())
        }
    };

    if let Some(path) = &config.report_path {
        let report = tools::create_report(config, &entries, &stats);
        if let Err(e) = tools::write_report(path, &report) {
            eprintln!("[WARNING] 报告写出失败 / Failed to write report: {e}");
        }
    }

    tools::show_batch_completion_info(&entries, &stats, config.report_path.as_deref());

    // 只有全部文件失败时才以非零状态退出
    if let Some(category) = stats.all_failed_category() {
        eprintln!(
            "[FAIL] 所有文件处理失败 / All files failed: {}",
            category.display_name()
        );
        eprintln!("[INFO] 建议 / Suggestion: {}", get_error_suggestion(category));
        return Ok(exit_code_for(category));
    }
    Ok(0)
}

/// 应用程序主逻辑（便于测试和复用）
fn run() -> UpscaleResult<i32> {
    let mode = tools::parse_args()?;

    match &mode {
        CliMode::Batch(config) => init_tracing(config.verbose),
        CliMode::Worker(_) => init_tracing(false),
    }

    match mode {
        CliMode::Batch(config) => run_batch(&config),
        CliMode::Worker(config) => run_worker(&config),
    }
}

fn main() {
    // 提升线程优先级；失败不影响功能
    let _ = fatllama_upscaler::tools::utils::optimize_for_performance();

    // 可选：CPU火焰图分析（需开启 feature: flame-prof 且设置 FL_FLAME=1）
    #[cfg(feature = "flame-prof")]
    let _guard = {
        let enabled = std::env::var("FL_FLAME").map(|v| v == "1").unwrap_or(false);
        if enabled {
            match pprof::ProfilerGuard::new(250) {
                Ok(g) => Some(g),
                Err(e) => {
                    eprintln!(
                        "[WARNING] 启用火焰图采样失败 / Failed to enable flame graph sampling: {e}"
                    );
                    None
                }
            }
        } else {
            None
        }
    };

    let result = run();

    #[cfg(feature = "flame-prof")]
    if let Some(guard) = _guard
        && let Ok(report) = guard.report().build()
    {
        use std::fs::File;
        let mut options = pprof::flamegraph::Options::default();
        let out_path =
            std::env::var("FL_FLAME_FILE").unwrap_or_else(|_| "flamegraph.svg".to_string());
        if let Ok(file) = File::create(&out_path)
            && report.flamegraph_with_options(file, &mut options).is_ok()
        {
            eprintln!("FlameGraph generated successfully / 生成成功: {out_path}");
        }
    }

    match result {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(error) => handle_error(error),
    }
}

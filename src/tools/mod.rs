//! 工具模块集合
//!
//! 包含CLI、文件扫描、批处理、worker进程与格式化等工具模块，支持main.rs的流程控制。

pub mod batch_state;
pub mod cli;
pub mod constants;
pub mod formatter;
pub mod parallel_processor;
pub mod processor;
pub mod scanner;
pub mod utils;
pub mod worker_farm;

// 重新导出主要的公共接口
pub use batch_state::{BatchStatsSnapshot, ParallelBatchStats, SerialBatchStats};
pub use cli::{AppConfig, CliMode, WorkerConfig, parse_args, show_startup_info};
pub use formatter::{build_summary_table, create_report, show_batch_completion_info, write_report};
pub use parallel_processor::process_batch_parallel;
pub use processor::{
    BatchEntry, EntryStatus, process_batch_serial, process_to_path, stats_from_entries,
};
pub use scanner::{collect_input_files, scan_audio_files, show_scan_results};
pub use worker_farm::{FarmMessage, TaskRecord, run_farm, run_worker_loop};

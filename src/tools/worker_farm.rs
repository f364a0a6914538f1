//! worker进程农场
//!
//! 协调进程以 `worker` 子命令启动N个自身副本，通过stdin按行发送JSON任务记录
//! （第 i 个文件发给 `i % N` 号worker），全部任务发出后向每个worker发送
//! `Shutdown`，再从各自的stdout收集每个任务一行的JSON报告。
//!
//! ```text
//! coordinator ──Task(i)──▶ stdin[i % N] ─▶ worker ─▶ stdout ──BatchEntry──▶ reader线程 ─▶ 汇总
//! ```
//!
//! worker端的循环对 `BufRead`/`Write` 泛型，可以在进程内直接复用。

use super::cli::{AppConfig, WORKER_SUBCOMMAND};
use super::processor::{BatchEntry, process_to_path};
use crate::core::UpscaleConfig;
use crate::error::{UpscaleError, UpscaleResult};
use crate::processing::{ExecutionBackend, PipelineObserver};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

/// 单个文件的任务记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub max_iterations: u32,
    pub threshold: f64,
    pub target_bitrate_kbps: u32,
    /// 原样传输的格式名，由worker端校验
    pub target_format: String,
}

impl TaskRecord {
    pub fn new(input_path: &Path, output_path: &Path, config: &UpscaleConfig) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            output_path: output_path.to_path_buf(),
            max_iterations: config.max_iterations,
            threshold: config.threshold,
            target_bitrate_kbps: config.target_bitrate_kbps,
            target_format: config.target_format.to_string(),
        }
    }

    /// 还原为升频配置（分块数由worker自身决定）
    pub fn to_config(&self, worker_count: usize) -> UpscaleResult<UpscaleConfig> {
        UpscaleConfig::from_parts(
            self.max_iterations,
            self.threshold,
            self.target_bitrate_kbps,
            &self.target_format,
            worker_count,
        )
    }
}

/// 协调者 → worker 的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FarmMessage {
    Task { index: usize, record: TaskRecord },
    Shutdown,
}

/// worker主循环：逐行读取消息，每个任务回写一行报告
///
/// 收到 `Shutdown` 或输入结束时返回已处理的任务数。
pub fn run_worker_loop<R: BufRead, W: Write>(
    reader: R,
    mut writer: W,
    worker_count: usize,
    backend: &dyn ExecutionBackend,
    observer: &dyn PipelineObserver,
) -> UpscaleResult<usize> {
    let mut handled = 0usize;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let message: FarmMessage = serde_json::from_str(&line).map_err(|e| {
            UpscaleError::ResourceError(format!("无法解析任务消息 / bad task message: {e}"))
        })?;

        let (index, record) = match message {
            FarmMessage::Shutdown => break,
            FarmMessage::Task { index, record } => (index, record),
        };

        let entry = match record.to_config(worker_count) {
            Ok(config) => process_to_path(
                index,
                &record.input_path,
                &record.output_path,
                &config,
                backend,
                observer,
            ),
            Err(e) => BatchEntry::failed(index, &record.input_path, &record.output_path, &e, 0),
        };

        let json = serde_json::to_string(&entry).map_err(|e| {
            UpscaleError::ResourceError(format!("无法序列化报告 / failed to encode report: {e}"))
        })?;
        writeln!(writer, "{json}")?;
        writer.flush()?;
        handled += 1;
    }

    Ok(handled)
}

/// 一个worker子进程
struct FarmWorker {
    id: usize,
    child: Child,
    stdin: Option<ChildStdin>,
    reader: Option<JoinHandle<Vec<UpscaleResult<BatchEntry>>>>,
}

impl FarmWorker {
    fn spawn(id: usize, exe: &Path, config: &AppConfig) -> UpscaleResult<Self> {
        let mut child = Command::new(exe)
            .arg(WORKER_SUBCOMMAND)
            .arg("--workers")
            .arg(config.upscale.worker_count.to_string())
            .arg("--backend")
            .arg(config.backend.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                UpscaleError::ResourceError(format!("无法启动worker进程 / failed to spawn worker: {e}"))
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().ok_or_else(|| {
            UpscaleError::ResourceError("worker标准输出不可用 / worker stdout unavailable".to_string())
        })?;

        // 先启动读取线程，避免双方管道同时写满
        let reader = std::thread::Builder::new()
            .name(format!("farm-reader-{id}"))
            .spawn(move || {
                BufReader::new(stdout)
                    .lines()
                    .map(|line| {
                        let line = line?;
                        serde_json::from_str::<BatchEntry>(&line).map_err(|e| {
                            UpscaleError::ResourceError(format!(
                                "无法解析worker报告 / bad worker report: {e}"
                            ))
                        })
                    })
                    .collect::<Vec<UpscaleResult<BatchEntry>>>()
            })
            .map_err(|e| UpscaleError::ResourceError(format!("读取线程启动失败: {e}")))?;

        Ok(Self {
            id,
            child,
            stdin,
            reader: Some(reader),
        })
    }

    fn send(&mut self, message: &FarmMessage) -> UpscaleResult<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            UpscaleError::ResourceError(format!("worker {} stdin已关闭", self.id))
        })?;
        let json = serde_json::to_string(message)
            .map_err(|e| UpscaleError::ResourceError(format!("无法序列化任务: {e}")))?;
        writeln!(stdin, "{json}")
            .and_then(|()| stdin.flush())
            .map_err(|e| {
                UpscaleError::ResourceError(format!(
                    "worker {} 通信失败 / worker communication failed: {e}",
                    self.id
                ))
            })
    }

    /// 关闭stdin并等待退出，返回收到的报告
    fn finish(mut self) -> Vec<UpscaleResult<BatchEntry>> {
        drop(self.stdin.take());
        let reports = self
            .reader
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        match self.child.wait() {
            Ok(status) if !status.success() => {
                tracing::warn!(worker = self.id, %status, "worker进程异常退出 / worker exited abnormally");
            }
            Err(e) => tracing::warn!(worker = self.id, "等待worker失败 / failed to wait for worker: {e}"),
            _ => {}
        }
        reports
    }
}

/// 使用N个worker进程处理文件列表
///
/// 通信失败只影响相关任务：未收到报告的任务记为资源错误。
pub fn run_farm(
    audio_files: &[PathBuf],
    config: &AppConfig,
    processes: usize,
) -> UpscaleResult<Vec<BatchEntry>> {
    let exe = std::env::current_exe()?;
    run_farm_with_exe(&exe, audio_files, config, processes)
}

/// 指定worker可执行文件的版本（测试用）
pub fn run_farm_with_exe(
    exe: &Path,
    audio_files: &[PathBuf],
    config: &AppConfig,
    processes: usize,
) -> UpscaleResult<Vec<BatchEntry>> {
    let processes = processes.clamp(1, audio_files.len().max(1));
    println!("🧵 启动 {processes} 个worker进程 / spawning worker processes");

    let mut workers = (0..processes)
        .map(|id| FarmWorker::spawn(id, exe, config))
        .collect::<UpscaleResult<Vec<_>>>()?;

    let outputs = super::utils::plan_output_paths(
        audio_files,
        &config.output_dir,
        config.upscale.target_format.extension(),
    );

    let mut send_failures: Vec<(usize, UpscaleError)> = Vec::new();
    for (index, input) in audio_files.iter().enumerate() {
        let message = FarmMessage::Task {
            index,
            record: TaskRecord::new(input, &outputs[index], &config.upscale),
        };
        if let Err(e) = workers[index % processes].send(&message) {
            send_failures.push((index, e));
        }
    }
    for worker in &mut workers {
        if let Err(e) = worker.send(&FarmMessage::Shutdown) {
            tracing::warn!("{e}");
        }
    }

    let mut slots: Vec<Option<BatchEntry>> = vec![None; audio_files.len()];
    for worker in workers {
        for report in worker.finish() {
            match report {
                Ok(entry) if entry.index < slots.len() => {
                    let index = entry.index;
                    slots[index] = Some(entry);
                }
                Ok(entry) => tracing::warn!(index = entry.index, "忽略未知任务的报告 / ignoring report for unknown task"),
                Err(e) => tracing::warn!("{e}"),
            }
        }
    }

    let entries = slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                let error = send_failures
                    .iter()
                    .find(|(i, _)| *i == index)
                    .map(|(_, e)| UpscaleError::ResourceError(e.to_string()))
                    .unwrap_or_else(|| {
                        UpscaleError::ResourceError(
                            "worker未返回报告 / worker returned no report".to_string(),
                        )
                    });
                BatchEntry::failed(index, &audio_files[index], &outputs[index], &error, 0)
            })
        })
        .collect();

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TargetFormat;
    use crate::error::ErrorCategory;
    use crate::processing::{NullObserver, SerialBackend};
    use std::io::Cursor;

    fn record(input: &Path, output: &Path, format: &str) -> TaskRecord {
        TaskRecord {
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            max_iterations: 10,
            threshold: 0.6,
            target_bitrate_kbps: 1411,
            target_format: format.to_string(),
        }
    }

    fn lines(messages: &[FarmMessage]) -> String {
        messages
            .iter()
            .map(|m| serde_json::to_string(m).unwrap() + "\n")
            .collect()
    }

    #[test]
    fn test_message_wire_format() {
        let json = serde_json::to_string(&FarmMessage::Shutdown).unwrap();
        assert_eq!(json, r#"{"type":"shutdown"}"#);

        let task = FarmMessage::Task {
            index: 2,
            record: record(Path::new("a.mp3"), Path::new("out/a.flac"), "flac"),
        };
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.starts_with(r#"{"type":"task","index":2"#));
        assert_eq!(serde_json::from_str::<FarmMessage>(&json).unwrap(), task);
    }

    #[test]
    fn test_task_record_from_config() {
        let config = UpscaleConfig {
            max_iterations: 100,
            threshold: 0.5,
            target_bitrate_kbps: 1000,
            target_format: TargetFormat::Wav,
            worker_count: 8,
        };
        let rec = TaskRecord::new(Path::new("x.ogg"), Path::new("o/x.wav"), &config);
        assert_eq!(rec.target_format, "wav");
        let back = rec.to_config(8).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_worker_loop_reports_each_task_and_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let input = lines(&[
            FarmMessage::Task {
                index: 0,
                record: record(&dir.path().join("missing.mp3"), &dir.path().join("o.flac"), "flac"),
            },
            FarmMessage::Task {
                index: 1,
                record: record(&dir.path().join("x.wav"), &dir.path().join("x.mp3"), "mp3"),
            },
            FarmMessage::Shutdown,
            FarmMessage::Task {
                index: 2,
                record: record(&dir.path().join("never.wav"), &dir.path().join("n.flac"), "flac"),
            },
        ]);

        let mut out = Vec::new();
        let handled = run_worker_loop(
            Cursor::new(input),
            &mut out,
            2,
            &SerialBackend,
            &NullObserver,
        )
        .unwrap();
        assert_eq!(handled, 2);

        let reports: Vec<BatchEntry> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].index, 0);
        assert_eq!(reports[0].category(), Some(ErrorCategory::Input));
        assert_eq!(reports[1].category(), Some(ErrorCategory::Config));
    }

    #[test]
    fn test_worker_loop_rejects_garbage() {
        let mut out = Vec::new();
        let result = run_worker_loop(
            Cursor::new("not json\n"),
            &mut out,
            1,
            &SerialBackend,
            &NullObserver,
        );
        assert!(matches!(result, Err(UpscaleError::ResourceError(_))));
    }

    #[test]
    fn test_farm_with_missing_executable_is_resource_error() {
        let config = AppConfig {
            inputs: vec![],
            output_dir: PathBuf::from("out"),
            upscale: UpscaleConfig::default(),
            backend: crate::processing::BackendKind::Serial,
            parallel_files: None,
            processes: Some(2),
            recursive: false,
            report_path: None,
            verbose: false,
        };
        let result = run_farm_with_exe(
            Path::new("/nonexistent/fat-llama"),
            &[PathBuf::from("a.wav")],
            &config,
            2,
        );
        assert!(matches!(result, Err(UpscaleError::ResourceError(_))));
    }
}

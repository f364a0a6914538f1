//! 工具层集成测试
//!
//! 测试文件扫描、串行/并行批处理、worker进程农场与报告输出的集成功能。

use fatllama_upscaler::core::{TargetFormat, UpscaleConfig};
use fatllama_upscaler::error::ErrorCategory;
use fatllama_upscaler::processing::{BackendKind, NullObserver, SerialBackend, create_backend};
use fatllama_upscaler::tools::{self, AppConfig, BatchEntry, FarmMessage, TaskRecord};
use std::io::Cursor;
use std::path::{Path, PathBuf};

fn write_fixture(path: &Path, frames: usize) {
    write_fixture_at_rate(path, 8000, frames);
}

fn write_fixture_at_rate(path: &Path, sample_rate: u32, frames: usize) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..frames {
        writer
            .write_sample(((i as f32 * 0.09).sin() * 9000.0) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
}

fn app_config(output_dir: &Path) -> AppConfig {
    AppConfig {
        inputs: vec![],
        output_dir: output_dir.to_path_buf(),
        upscale: UpscaleConfig {
            max_iterations: 10,
            threshold: 0.6,
            target_bitrate_kbps: 1411,
            target_format: TargetFormat::Flac,
            worker_count: 2,
        },
        backend: BackendKind::Serial,
        parallel_files: None,
        processes: None,
        recursive: false,
        report_path: None,
        verbose: false,
    }
}

/// 批处理中单个文件失败不影响其余文件
#[test]
fn test_serial_batch_continues_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.wav");
    write_fixture(&good, 200);
    let files = vec![dir.path().join("missing.wav"), good];
    let config = app_config(&dir.path().join("out"));

    let (entries, stats) =
        tools::process_batch_serial(&files, &config, &SerialBackend, &NullObserver);

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].category(), Some(ErrorCategory::Input));
    assert!(entries[1].is_completed());
    assert!(dir.path().join("out").join("good.flac").exists());
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.all_failed_category(), None);
    println!("  ✓ 失败文件被记录，批处理继续");
}

/// 并行批处理保持输入顺序
#[test]
fn test_parallel_batch_keeps_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut files = Vec::new();
    for i in 0..4 {
        let path = dir.path().join(format!("clip{i}.wav"));
        write_fixture(&path, 120 + i * 10);
        files.push(path);
    }
    files.insert(2, dir.path().join("ghost.wav"));

    let config = app_config(&dir.path().join("out"));
    let backend = create_backend(BackendKind::Local, 2).unwrap();
    let (entries, stats) =
        tools::process_batch_parallel(&files, &config, 3, backend.as_ref(), &NullObserver)
            .unwrap();

    let order: Vec<usize> = entries.iter().map(|e| e.index).collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
    let inputs: Vec<&PathBuf> = entries.iter().map(|e| &e.input).collect();
    assert_eq!(inputs, files.iter().collect::<Vec<_>>());
    assert!(!entries[2].is_completed());
    assert_eq!(stats.processed, 4);
    assert_eq!(stats.failed, 1);
}

/// 所有文件失败时报告统一的错误类别
#[test]
fn test_all_failed_category() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![dir.path().join("a.wav"), dir.path().join("b.flac")];
    let config = app_config(dir.path());

    let (_, stats) = tools::process_batch_serial(&files, &config, &SerialBackend, &NullObserver);
    assert_eq!(stats.all_failed_category(), Some(ErrorCategory::Input));
}

/// worker循环处理真实文件并回写成功报告
#[test]
fn test_worker_loop_processes_real_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("farm").join("in.flac");
    write_fixture(&input, 150);

    let config = app_config(dir.path()).upscale;
    let messages = [
        FarmMessage::Task {
            index: 7,
            record: TaskRecord::new(&input, &output, &config),
        },
        FarmMessage::Shutdown,
    ];
    let stdin: String = messages
        .iter()
        .map(|m| serde_json::to_string(m).unwrap() + "\n")
        .collect();

    let mut stdout = Vec::new();
    let handled =
        tools::run_worker_loop(Cursor::new(stdin), &mut stdout, 2, &SerialBackend, &NullObserver)
            .unwrap();
    assert_eq!(handled, 1);

    let report: BatchEntry =
        serde_json::from_str(String::from_utf8(stdout).unwrap().trim()).unwrap();
    assert_eq!(report.index, 7);
    assert!(report.is_completed());
    assert_eq!(report.upscale_factor, Some(11));
    assert!(output.exists());
}

/// 以真实可执行文件启动worker进程
#[test]
fn test_farm_with_worker_processes() {
    let dir = tempfile::tempdir().unwrap();
    let mut files = Vec::new();
    for i in 0..3 {
        let path = dir.path().join(format!("farm{i}.wav"));
        write_fixture(&path, 100);
        files.push(path);
    }
    files.push(dir.path().join("absent.wav"));

    let config = app_config(&dir.path().join("out"));
    let exe = Path::new(env!("CARGO_BIN_EXE_fat-llama"));
    let entries = tools::worker_farm::run_farm_with_exe(exe, &files, &config, 2).unwrap();

    assert_eq!(entries.len(), 4);
    for (index, entry) in entries.iter().enumerate() {
        assert_eq!(entry.index, index);
    }
    assert!(entries[..3].iter().all(BatchEntry::is_completed));
    assert_eq!(entries[3].category(), Some(ErrorCategory::Input));
    assert!(dir.path().join("out").join("farm1.flac").exists());
}

fn output_rate(path: &Path) -> u32 {
    fatllama_upscaler::audio::AudioDecoder::new()
        .decode(path)
        .unwrap()
        .sample_rate()
}

/// 递归扫描到不同目录下的同名文件时，各自写出到不同的输出文件
#[test]
fn test_same_stem_in_different_dirs_does_not_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let input_root = dir.path().join("in");
    // 8 kHz → 倍数11 → 88 kHz；16 kHz → 倍数6 → 96 kHz
    write_fixture_at_rate(&input_root.join("a").join("tone.wav"), 8000, 150);
    write_fixture_at_rate(&input_root.join("b").join("tone.wav"), 16_000, 150);

    let files = tools::collect_input_files(&[input_root], true).unwrap();
    assert_eq!(files.len(), 2);

    for parallel in [false, true] {
        let out = dir.path().join(if parallel { "out-par" } else { "out-ser" });
        let config = app_config(&out);
        let (entries, stats) = if parallel {
            let backend = create_backend(BackendKind::Local, 2).unwrap();
            tools::process_batch_parallel(&files, &config, 2, backend.as_ref(), &NullObserver)
                .unwrap()
        } else {
            tools::process_batch_serial(&files, &config, &SerialBackend, &NullObserver)
        };

        assert_eq!(stats.processed, 2);
        assert_eq!(entries[0].output, out.join("tone.flac"));
        assert_eq!(entries[1].output, out.join("tone-2.flac"));
        assert_eq!(output_rate(&entries[0].output), 88_000);
        assert_eq!(output_rate(&entries[1].output), 96_000);
    }
    println!("  ✓ 同名输入写出为 tone.flac 与 tone-2.flac");
}

/// worker进程农场同样为同名输入规划不同的输出
#[test]
fn test_farm_plans_distinct_outputs_for_same_stem() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("x").join("take.wav");
    let second = dir.path().join("y").join("take.wav");
    write_fixture_at_rate(&first, 8000, 120);
    write_fixture_at_rate(&second, 16_000, 120);

    let out = dir.path().join("out");
    let config = app_config(&out);
    let exe = Path::new(env!("CARGO_BIN_EXE_fat-llama"));
    let entries =
        tools::worker_farm::run_farm_with_exe(exe, &[first, second], &config, 2).unwrap();

    assert!(entries.iter().all(BatchEntry::is_completed));
    assert_eq!(output_rate(&out.join("take.flac")), 88_000);
    assert_eq!(output_rate(&out.join("take-2.flac")), 96_000);
}

/// 扫描目录：只收集受支持的扩展名，默认不递归
#[test]
fn test_collect_input_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.wav"), b"").unwrap();
    std::fs::write(dir.path().join("a.MP3"), b"").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    std::fs::write(dir.path().join("nested").join("c.flac"), b"").unwrap();

    let flat = tools::collect_input_files(&[dir.path().to_path_buf()], false).unwrap();
    assert_eq!(
        flat,
        vec![dir.path().join("a.MP3"), dir.path().join("b.wav")]
    );

    let deep = tools::collect_input_files(&[dir.path().to_path_buf()], true).unwrap();
    assert_eq!(deep.len(), 3);
}

/// 报告包含每个文件与统计信息
#[test]
fn test_report_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![dir.path().join("lost.wav")];
    let config = app_config(dir.path());
    let (entries, stats) =
        tools::process_batch_serial(&files, &config, &SerialBackend, &NullObserver);

    let report_path = dir.path().join("reports").join("batch.txt");
    let report = tools::create_report(&config, &entries, &stats);
    tools::write_report(&report_path, &report).unwrap();

    let written = std::fs::read_to_string(report_path).unwrap();
    assert!(written.contains("lost.wav"));
    assert!(written.contains("Failed"));
    assert!(written.contains("处理失败 / failed: 1"));
}

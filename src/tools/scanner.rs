//! 文件扫描模块
//!
//! 展开命令行输入：文件原样保留，目录按支持的扩展名扫描（可递归）。

use super::cli::AppConfig;
use super::utils;
use crate::audio::is_supported_extension;
use crate::error::{UpscaleError, UpscaleResult};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 扫描单个目录中的音频文件（按路径排序）
pub fn scan_audio_files(dir_path: &Path, recursive: bool) -> UpscaleResult<Vec<PathBuf>> {
    if !dir_path.is_dir() {
        return Err(UpscaleError::InputError(format!(
            "路径不是目录 / not a directory: {}",
            dir_path.display()
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut audio_files = Vec::new();
    for entry in WalkDir::new(dir_path).max_depth(max_depth) {
        let entry = entry.map_err(|e| {
            UpscaleError::InputError(format!("目录遍历失败 / failed to walk directory: {e}"))
        })?;
        if entry.file_type().is_file() && is_supported_extension(entry.path()) {
            audio_files.push(entry.into_path());
        }
    }

    audio_files.sort();
    Ok(audio_files)
}

/// 展开全部输入
///
/// 直接给出的文件即使不存在也会保留，由任务本身报告输入错误，批处理继续。
/// 结果去重，目录内文件按路径排序，整体保持命令行给出的顺序。
pub fn collect_input_files(inputs: &[PathBuf], recursive: bool) -> UpscaleResult<Vec<PathBuf>> {
    let mut seen = BTreeSet::new();
    let mut files = Vec::new();

    for input in inputs {
        let expanded = if input.is_dir() {
            scan_audio_files(input, recursive)?
        } else {
            vec![input.clone()]
        };
        for file in expanded {
            if seen.insert(file.clone()) {
                files.push(file);
            }
        }
    }

    Ok(files)
}

/// 显示文件扫描结果
pub fn show_scan_results(config: &AppConfig, audio_files: &[PathBuf]) {
    if audio_files.is_empty() {
        println!("⚠️  没有找到支持的音频文件 / no supported audio files found");
        println!("   支持的格式 / supported formats: MP3, WAV, OGG, FLAC, M4A, AIFF");
        return;
    }

    println!("🎵 找到 {} 个音频文件 / files found", audio_files.len());

    if config.verbose {
        for (i, file) in audio_files.iter().enumerate() {
            println!("   {}. {}", i + 1, utils::extract_filename_lossy(file));
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.mp3"));
        touch(&dir.path().join("a.FLAC"));
        touch(&dir.path().join("cover.jpg"));
        touch(&dir.path().join("sub").join("c.wav"));

        let flat = scan_audio_files(dir.path(), false).unwrap();
        let names: Vec<_> = flat.iter().map(|p| utils::extract_filename_lossy(p)).collect();
        assert_eq!(names, vec!["a.FLAC", "b.mp3"]);

        let deep = scan_audio_files(dir.path(), true).unwrap();
        assert_eq!(deep.len(), 3);
    }

    #[test]
    fn test_collect_mixes_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("album").join("1.ogg"));
        touch(&dir.path().join("album").join("2.ogg"));
        let single = dir.path().join("album").join("1.ogg");
        let missing = dir.path().join("missing.wav");

        let files = collect_input_files(
            &[single.clone(), dir.path().join("album"), missing.clone()],
            false,
        )
        .unwrap();
        assert_eq!(
            files,
            vec![single, dir.path().join("album").join("2.ogg"), missing]
        );
    }

    #[test]
    fn test_scan_rejects_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.wav");
        touch(&file);
        assert!(matches!(
            scan_audio_files(&file, false),
            Err(UpscaleError::InputError(_))
        ));
    }
}

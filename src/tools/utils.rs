//! 工具函数模块
//!
//! 文件路径处理、并发度计算与线程优先级等通用工具函数。

use super::constants::parallel_limits;

/// 文件路径处理工具函数
pub mod path {
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};

    /// 提取文件名（返回String，用于日志显示）
    #[inline]
    pub fn extract_filename_lossy(path: &Path) -> String {
        path.file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// 安全提取文件stem（返回String）
    #[inline]
    pub fn extract_file_stem_string(path: &Path) -> String {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("audio")
            .to_string()
    }

    /// 为整批输入规划互不冲突的输出路径 `<output_dir>/<stem>.<extension>`
    ///
    /// 不同目录下的同名文件（`a/tone.wav`、`b/tone.mp3`）会映射到同一个
    /// `<stem>.<extension>`。按输入顺序，第一个文件保留原名，之后的文件依次
    /// 使用 `<stem>-2`、`<stem>-3`……，并且不会占用其他输入的原名。
    /// 比较时忽略大小写，以免在大小写不敏感的文件系统上互相覆盖。
    pub fn plan_output_paths(
        inputs: &[PathBuf],
        output_dir: &Path,
        extension: &str,
    ) -> Vec<PathBuf> {
        let natural: HashSet<String> = inputs
            .iter()
            .map(|input| extract_file_stem_string(input).to_lowercase())
            .collect();
        let mut taken: HashSet<String> = HashSet::with_capacity(inputs.len());

        inputs
            .iter()
            .map(|input| {
                let stem = extract_file_stem_string(input);
                let mut name = stem.clone();
                let mut suffix = 1;
                while taken.contains(&name.to_lowercase())
                    || (suffix > 1 && natural.contains(&name.to_lowercase()))
                {
                    suffix += 1;
                    name = format!("{stem}-{suffix}");
                }
                if suffix > 1 {
                    tracing::warn!(
                        input = %input.display(),
                        renamed = %name,
                        "输出文件名冲突，已重命名 / output name collision, renamed"
                    );
                }
                taken.insert(name.to_lowercase());
                output_dir.join(format!("{name}.{extension}"))
            })
            .collect()
    }
}

pub use path::{extract_file_stem_string, extract_filename_lossy, plan_output_paths};

/// 计算实际文件级并发度（夹在限制范围内，且不超过文件数）
pub fn effective_parallel_degree(requested: usize, file_count: Option<usize>) -> usize {
    let clamped = requested.clamp(
        parallel_limits::MIN_PARALLEL_DEGREE,
        parallel_limits::MAX_PARALLEL_DEGREE,
    );
    match file_count {
        Some(count) if count > 0 => clamped.min(count),
        _ => clamped,
    }
}

/// 提升当前线程优先级（失败时静默返回错误，不影响功能）
pub fn optimize_for_performance() -> Result<(), thread_priority::Error> {
    thread_priority::set_current_thread_priority(thread_priority::ThreadPriority::Max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_plan_output_paths_uses_stem_and_extension() {
        let inputs = vec![
            PathBuf::from("/music/a/song.mp3"),
            PathBuf::from("track.live.wav"),
        ];
        assert_eq!(
            plan_output_paths(&inputs, Path::new("/out"), "flac"),
            vec![
                PathBuf::from("/out/song.flac"),
                PathBuf::from("/out/track.live.flac"),
            ]
        );
    }

    #[test]
    fn test_plan_output_paths_renames_colliding_stems() {
        let inputs = vec![
            PathBuf::from("in/a/tone.wav"),
            PathBuf::from("in/b/tone.mp3"),
            PathBuf::from("in/c/Tone.flac"),
            PathBuf::from("in/other.wav"),
        ];
        let planned = plan_output_paths(&inputs, Path::new("out"), "flac");
        assert_eq!(
            planned,
            vec![
                PathBuf::from("out/tone.flac"),
                PathBuf::from("out/tone-2.flac"),
                PathBuf::from("out/Tone-3.flac"),
                PathBuf::from("out/other.flac"),
            ]
        );
    }

    #[test]
    fn test_plan_output_paths_never_takes_another_natural_name() {
        // 第二个 tone 不能改名为 tone-2，那是第三个输入的原名
        let inputs = vec![
            PathBuf::from("x/tone.wav"),
            PathBuf::from("y/tone.wav"),
            PathBuf::from("z/tone-2.wav"),
        ];
        let planned = plan_output_paths(&inputs, Path::new("out"), "wav");
        assert_eq!(
            planned,
            vec![
                PathBuf::from("out/tone.wav"),
                PathBuf::from("out/tone-3.wav"),
                PathBuf::from("out/tone-2.wav"),
            ]
        );
    }

    #[test]
    fn test_effective_parallel_degree() {
        assert_eq!(effective_parallel_degree(0, None), 1);
        assert_eq!(effective_parallel_degree(8, Some(3)), 3);
        assert_eq!(effective_parallel_degree(64, None), parallel_limits::MAX_PARALLEL_DEGREE);
        assert_eq!(effective_parallel_degree(4, Some(0)), 4);
    }

    #[test]
    fn test_filename_helpers() {
        assert_eq!(extract_filename_lossy(Path::new("/x/y/a.flac")), "a.flac");
        assert_eq!(extract_file_stem_string(Path::new("/x/y/a.flac")), "a");
    }
}

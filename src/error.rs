//! 统一错误处理框架
//!
//! 升频任务的错误类型定义。配置/算法错误只终止当前任务，批处理会继续处理其余文件。

use std::fmt;
use std::io;

/// 升频处理相关的统一错误类型
#[derive(Debug)]
pub enum UpscaleError {
    /// 配置错误：不支持的目标格式、码率越界、迭代次数/阈值越界
    ConfigError(String),

    /// 输入错误：源文件缺失或无法解码
    InputError(String),

    /// 算法错误：零长度分块进入FFT阶段
    AlgorithmError(String),

    /// 编码错误：不支持的输出格式或编码器失败
    EncodeError(String),

    /// 文件I/O错误
    IoError(io::Error),

    /// 资源错误：线程池创建失败、worker断开等
    ResourceError(String),
}

impl fmt::Display for UpscaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpscaleError::ConfigError(msg) => write!(f, "配置错误 / config error: {msg}"),
            UpscaleError::InputError(msg) => write!(f, "输入错误 / input error: {msg}"),
            UpscaleError::AlgorithmError(msg) => write!(f, "算法错误 / algorithm error: {msg}"),
            UpscaleError::EncodeError(msg) => write!(f, "编码错误 / encode error: {msg}"),
            UpscaleError::IoError(err) => write!(f, "文件I/O错误 / I/O error: {err}"),
            UpscaleError::ResourceError(msg) => write!(f, "资源错误 / resource error: {msg}"),
        }
    }
}

impl std::error::Error for UpscaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UpscaleError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for UpscaleError {
    fn from(err: io::Error) -> Self {
        UpscaleError::IoError(err)
    }
}

impl From<hound::Error> for UpscaleError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => UpscaleError::IoError(e),
            other => UpscaleError::InputError(format!("WAV解码错误: {other}")),
        }
    }
}

/// 升频操作的标准Result类型
pub type UpscaleResult<T> = Result<T, UpscaleError>;

// ==================== 错误转换Helper函数 ====================

/// 创建配置错误的helper函数
#[inline]
pub fn config_error<E: fmt::Display>(context: &str, err: E) -> UpscaleError {
    UpscaleError::ConfigError(format!("{context}: {err}"))
}

/// 创建输入错误的helper函数
#[inline]
pub fn input_error<E: fmt::Display>(context: &str, err: E) -> UpscaleError {
    UpscaleError::InputError(format!("{context}: {err}"))
}

/// 创建编码错误的helper函数
#[inline]
pub fn encode_error<E: fmt::Display>(context: &str, err: E) -> UpscaleError {
    UpscaleError::EncodeError(format!("{context}: {err}"))
}

// ==================== 错误分类系统 ====================

/// 错误类别枚举（用于批量处理统计和退出码）
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum ErrorCategory {
    /// 配置相关错误
    Config,
    /// 输入文件缺失/损坏
    Input,
    /// 算法执行失败
    Algorithm,
    /// 编码写出失败
    Encode,
    /// I/O相关错误
    Io,
    /// 线程池/worker资源错误
    Resource,
}

impl ErrorCategory {
    /// 从UpscaleError提取错误类别
    pub fn from_error(e: &UpscaleError) -> Self {
        match e {
            UpscaleError::ConfigError(_) => Self::Config,
            UpscaleError::InputError(_) => Self::Input,
            UpscaleError::AlgorithmError(_) => Self::Algorithm,
            UpscaleError::EncodeError(_) => Self::Encode,
            UpscaleError::IoError(_) => Self::Io,
            UpscaleError::ResourceError(_) => Self::Resource,
        }
    }

    /// 获取错误类别的显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Config => "配置错误",
            Self::Input => "输入错误",
            Self::Algorithm => "算法错误",
            Self::Encode => "编码错误",
            Self::Io => "I/O错误",
            Self::Resource => "资源错误",
        }
    }

    /// 稳定的英文标识（用于worker进程间的报告传输）
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Input => "input",
            Self::Algorithm => "algorithm",
            Self::Encode => "encode",
            Self::Io => "io",
            Self::Resource => "resource",
        }
    }

    /// 从标识恢复类别，未知标识归入资源错误
    pub fn from_code(code: &str) -> Self {
        match code {
            "config" => Self::Config,
            "input" => Self::Input,
            "algorithm" => Self::Algorithm,
            "encode" => Self::Encode,
            "io" => Self::Io,
            _ => Self::Resource,
        }
    }
}

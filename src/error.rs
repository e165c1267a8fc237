//! 错误类型定义
//!
//! 采集层和提交层的错误在 UI 边界上都是可恢复的：
//! 控制器只负责把它们转换成通知，不会因此重置整个流程。

use crate::models::SubmissionKind;
use thiserror::Error;

/// 图像采集错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// 用户或系统拒绝了摄像头访问
    #[error("摄像头访问被拒绝: {0}")]
    PermissionDenied(String),

    /// 摄像头设备不存在或被占用
    #[error("摄像头设备不可用: {0}")]
    DeviceUnavailable(String),

    /// 当前运行环境缺少静态图像采集能力
    #[error("当前环境不支持拍照: {0}")]
    UnsupportedEnvironment(String),

    /// 网络视频流无法打开
    #[error("无法打开视频流 ({url}): {reason}")]
    StreamUnreachable { url: String, reason: String },

    /// 网络摄像头地址为空或格式错误
    #[error("网络摄像头地址无效: '{0}'")]
    InvalidAddress(String),

    /// 在 start() 成功之前调用了 capture_still()
    #[error("没有活动的视频流")]
    NoActiveStream,

    /// 栅格化或编码失败
    #[error("图像编码失败: {0}")]
    EncodingFailed(String),

    /// 采集源在拍照期间被停止，帧已丢弃
    #[error("采集源已停止，本次拍摄结果已丢弃")]
    Discarded,

    /// 生命周期方法调用顺序错误（例如重复 start）
    #[error("采集源状态错误: {0}")]
    InvalidState(String),
}

/// 提交错误
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// 同类请求仍在处理中（仅提示，不影响正在进行的请求）
    #[error("{0} 请求正在处理中，请稍候")]
    AlreadyInFlight(SubmissionKind),

    /// 尚未上传答案，没有可用的会话
    #[error("请先上传答案")]
    NoSession,

    /// 请求指定的会话不是当前会话
    #[error("会话 {0} 已失效，请重新上传答案")]
    StaleSession(String),

    /// 文件类型不在允许列表中
    #[error("不支持的文件类型: {0} (仅支持 png, jpg, jpeg, pdf)")]
    UnsupportedFile(String),

    /// 读取待上传文件失败
    #[error("读取文件失败 ({path}): {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 服务返回非 2xx 响应
    #[error("服务返回错误 (HTTP {status}): {message}")]
    ServiceError { status: u16, message: String },

    /// 网络传输失败（连接中断等）
    #[error("网络传输失败: {cause}")]
    TransportError { cause: String },

    /// 2xx 响应但内容不满足成绩记录约束
    #[error("服务响应无效: {0}")]
    InvalidResponse(String),

    /// 拍照阶段失败
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

impl SubmissionError {
    /// `AlreadyInFlight` 只是提示，不代表有请求失败
    pub fn is_advisory(&self) -> bool {
        matches!(self, SubmissionError::AlreadyInFlight(_))
    }

    /// 创建传输错误
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        SubmissionError::TransportError {
            cause: cause.to_string(),
        }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },

    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },

    /// 读取失败
    #[error("读取失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 写入失败
    #[error("写入失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV 写入失败
    #[error("CSV 写入失败: {0}")]
    Csv(#[from] csv::Error),
}

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("采集错误: {0}")]
    Capture(#[from] CaptureError),

    #[error("提交错误: {0}")]
    Submission(#[from] SubmissionError),

    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("文件错误: {0}")]
    File(#[from] FileError),

    #[error("错误: {0}")]
    Other(String),
}

// ========== 便捷构造函数 ==========

impl FileError {
    /// 创建文件读取错误
    pub fn read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        FileError::ReadFailed {
            path: path.into(),
            source,
        }
    }

    /// 创建文件写入错误
    pub fn write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        FileError::WriteFailed {
            path: path.into(),
            source,
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

use std::path::{Path, PathBuf};

use super::capture::CaptureFrame;
use super::result::ResultRecord;

/// 服务端接受的文件扩展名
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "pdf"];

/// 请求类型，单飞约束按类型区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionKind {
    /// 答案
    AnswerKey,
    /// 学生答题卡
    StudentSheet,
}

impl SubmissionKind {
    pub(crate) fn slot(self) -> usize {
        match self {
            SubmissionKind::AnswerKey => 0,
            SubmissionKind::StudentSheet => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SubmissionKind::AnswerKey => "答案",
            SubmissionKind::StudentSheet => "答题卡",
        }
    }
}

impl std::fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 待上传内容：采集到的帧或本地文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionPayload {
    Frame(CaptureFrame),
    File(PathBuf),
}

/// 一次逻辑提交
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub kind: SubmissionKind,
    pub payload: SubmissionPayload,
    pub student_name: Option<String>,
    pub session_id: Option<String>,
}

impl SubmissionRequest {
    /// 上传答案文件
    pub fn answer_key(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: SubmissionKind::AnswerKey,
            payload: SubmissionPayload::File(path.into()),
            student_name: None,
            session_id: None,
        }
    }

    /// 上传学生答题卡文件
    pub fn student_sheet_file(path: impl Into<PathBuf>, student_name: Option<String>) -> Self {
        Self {
            kind: SubmissionKind::StudentSheet,
            payload: SubmissionPayload::File(path.into()),
            student_name,
            session_id: None,
        }
    }

    /// 提交摄像头拍摄的答题卡
    pub fn student_sheet_frame(frame: CaptureFrame, student_name: Option<String>) -> Self {
        Self {
            kind: SubmissionKind::StudentSheet,
            payload: SubmissionPayload::Frame(frame),
            student_name,
            session_id: None,
        }
    }

    /// 限定只在该会话仍为当前会话时提交
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// 提交结果
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// 答案已被服务端接受，创建了新会话
    AnswerKeyAccepted { session_id: String },
    /// 答题卡已评分并写入结果集
    StudentSheetGraded(ResultRecord),
    /// 评分成功但会话已被替换或重置，结果被丢弃
    Discarded { session_id: String },
}

/// 检查文件扩展名是否在允许列表中
pub fn is_allowed_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// 根据扩展名推断 MIME 类型
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

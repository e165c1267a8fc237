//! 评分服务客户端 - 业务能力层
//!
//! 只负责把一次上传变成一次 HTTP 调用，不关心会话和流程。
//! 三个接口都是 multipart 表单，成功时返回 JSON，失败时返回 `{"error": "..."}`。

use std::path::Path;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::SubmissionError;
use crate::models::{
    is_allowed_file, mime_for_path, AnswerKeyResponse, CaptureFrame, ErrorBody, GradeResponse,
};

pub const UPLOAD_ANSWER_KEY_PATH: &str = "/upload-answer-key";
pub const UPLOAD_STUDENT_SHEET_PATH: &str = "/upload-student-sheet";
pub const PROCESS_WEBCAM_IMAGE_PATH: &str = "/process-webcam-image";

/// 摄像头图像上传时使用的文件名
pub const WEBCAM_FILE_NAME: &str = "webcam-capture.jpg";

/// 上传的文件内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// 摄像头帧，提交后即被消费
    pub fn from_frame(frame: CaptureFrame) -> Self {
        Self {
            file_name: WEBCAM_FILE_NAME.to_string(),
            mime_type: frame.mime_type,
            bytes: frame.bytes,
        }
    }

    /// 读取本地文件，扩展名必须在允许列表中
    pub async fn from_path(path: &Path) -> Result<Self, SubmissionError> {
        let display = path.display().to_string();
        if !is_allowed_file(path) {
            return Err(SubmissionError::UnsupportedFile(display));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| SubmissionError::FileRead {
                path: display,
                source,
            })?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self {
            file_name,
            mime_type: mime_for_path(path).to_string(),
            bytes,
        })
    }
}

/// 一次答题卡上传
#[derive(Debug, Clone)]
pub struct SheetUpload {
    pub session_id: String,
    pub student_name: String,
    pub file: UploadFile,
}

/// 评分服务能力接口
pub trait GradingService: Send + Sync {
    /// `POST /upload-answer-key`
    fn upload_answer_key(
        &self,
        file: UploadFile,
    ) -> BoxFuture<'_, Result<AnswerKeyResponse, SubmissionError>>;

    /// `POST /upload-student-sheet`（手动上传）
    fn upload_student_sheet(
        &self,
        sheet: SheetUpload,
    ) -> BoxFuture<'_, Result<GradeResponse, SubmissionError>>;

    /// `POST /process-webcam-image`（摄像头拍摄）
    fn process_webcam_image(
        &self,
        sheet: SheetUpload,
    ) -> BoxFuture<'_, Result<GradeResponse, SubmissionError>>;
}

/// 基于 reqwest 的评分服务客户端
pub struct HttpGradingService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGradingService {
    /// 创建新的评分服务客户端
    ///
    /// 提交不设整体超时，只限制建立连接的时间
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                warn!("创建 HTTP 客户端失败，使用默认配置: {}", e);
                reqwest::Client::new()
            });
        Self { base_url, client }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.service_base_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, SubmissionError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(SubmissionError::transport)?;

        let status = response.status();
        let body = response.text().await.map_err(SubmissionError::transport)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| body.trim().to_string());
            warn!("⚠️ {} 返回 HTTP {}: {}", path, status.as_u16(), message);
            return Err(SubmissionError::ServiceError {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| SubmissionError::InvalidResponse(format!("无法解析 {} 的响应: {}", path, e)))
    }
}

fn file_part(file: UploadFile) -> Result<Part, SubmissionError> {
    Part::bytes(file.bytes)
        .file_name(file.file_name)
        .mime_str(&file.mime_type)
        .map_err(SubmissionError::transport)
}

impl GradingService for HttpGradingService {
    fn upload_answer_key(
        &self,
        file: UploadFile,
    ) -> BoxFuture<'_, Result<AnswerKeyResponse, SubmissionError>> {
        Box::pin(async move {
            let form = Form::new().part("answerKey", file_part(file)?);
            self.post_form(UPLOAD_ANSWER_KEY_PATH, form).await
        })
    }

    fn upload_student_sheet(
        &self,
        sheet: SheetUpload,
    ) -> BoxFuture<'_, Result<GradeResponse, SubmissionError>> {
        Box::pin(async move {
            let form = Form::new()
                .part("studentSheet", file_part(sheet.file)?)
                .text("sessionId", sheet.session_id)
                .text("studentName", sheet.student_name)
                .text("mode", "manual");
            self.post_form(UPLOAD_STUDENT_SHEET_PATH, form).await
        })
    }

    fn process_webcam_image(
        &self,
        sheet: SheetUpload,
    ) -> BoxFuture<'_, Result<GradeResponse, SubmissionError>> {
        Box::pin(async move {
            let form = Form::new()
                .part("webcamImage", file_part(sheet.file)?)
                .text("sessionId", sheet.session_id)
                .text("studentName", sheet.student_name);
            self.post_form(PROCESS_WEBCAM_IMAGE_PATH, form).await
        })
    }
}

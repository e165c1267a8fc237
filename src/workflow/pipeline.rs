//! 提交管道 - 流程层
//!
//! 把一次逻辑提交变成一次远程调用。
//!
//! 1. 同步占用该类请求的单飞标记（在任何 await 之前）
//! 2. 检查会话、读取文件
//! 3. 调用评分服务，不自动重试
//! 4. 成功时写入会话或结果集；会话已变化时丢弃结果
//!
//! 单飞标记由 [`InFlightGuard`] 持有，无论成功、失败还是 future 被丢弃都会释放。

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::error::SubmissionError;
use crate::models::{
    DetectionMode, ResultRecord, SubmissionKind, SubmissionOutcome, SubmissionPayload,
    SubmissionRequest,
};
use crate::services::{GradingService, SheetUpload, UploadFile};
use crate::utils::lock;
use crate::workflow::state::WorkflowState;

/// 各组件共享的流程状态
pub type SharedState = Arc<Mutex<WorkflowState>>;

/// 单飞标记，离开作用域时释放
struct InFlightGuard<'a> {
    state: &'a Mutex<WorkflowState>,
    kind: SubmissionKind,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(
        state: &'a Mutex<WorkflowState>,
        kind: SubmissionKind,
    ) -> Result<Self, SubmissionError> {
        if !lock(state).try_begin(kind) {
            debug!("{} 请求已在进行中，忽略本次提交", kind);
            return Err(SubmissionError::AlreadyInFlight(kind));
        }
        Ok(Self { state, kind })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).finish(self.kind);
    }
}

/// 提交管道
pub struct SubmissionPipeline {
    service: Arc<dyn GradingService>,
    state: SharedState,
    default_student_name: String,
}

impl SubmissionPipeline {
    pub fn new(
        service: Arc<dyn GradingService>,
        state: SharedState,
        default_student_name: impl Into<String>,
    ) -> Self {
        Self {
            service,
            state,
            default_student_name: default_student_name.into(),
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// 提交一次请求
    ///
    /// # 返回
    /// - `AnswerKeyAccepted`: 答案已处理，会话已写入流程状态
    /// - `StudentSheetGraded`: 答题卡已评分，结果已写入结果集
    /// - `Discarded`: 请求期间会话被替换或重置，结果未写入
    pub async fn submit(
        &self,
        request: SubmissionRequest,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let _guard = InFlightGuard::acquire(&self.state, request.kind)?;

        match request.kind {
            SubmissionKind::AnswerKey => self.submit_answer_key(request.payload).await,
            SubmissionKind::StudentSheet => {
                self.submit_student_sheet(request.payload, request.student_name, request.session_id)
                    .await
            }
        }
    }

    async fn submit_answer_key(
        &self,
        payload: SubmissionPayload,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let generation = lock(&self.state).generation();
        let file = load_payload(payload).await?;

        info!("📤 正在上传答案: {} ({} 字节)", file.file_name, file.bytes.len());
        let response = self.service.upload_answer_key(file).await?;

        let session_id = response.session_id.trim().to_string();
        if session_id.is_empty() {
            return Err(SubmissionError::InvalidResponse(
                "响应中缺少 session_id".to_string(),
            ));
        }

        let mut state = lock(&self.state);
        if state.generation() != generation {
            warn!("⚠️ 答案上传期间流程已重置，丢弃会话 {}", session_id);
            return Ok(SubmissionOutcome::Discarded { session_id });
        }
        state.set_session_id(session_id.clone());
        Ok(SubmissionOutcome::AnswerKeyAccepted { session_id })
    }

    async fn submit_student_sheet(
        &self,
        payload: SubmissionPayload,
        student_name: Option<String>,
        session_id: Option<String>,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let session_id = {
            let state = lock(&self.state);
            if state.is_in_flight(SubmissionKind::AnswerKey) {
                return Err(SubmissionError::AlreadyInFlight(SubmissionKind::AnswerKey));
            }
            let current = state.session_id().ok_or(SubmissionError::NoSession)?;
            match session_id {
                Some(requested) if requested != current => {
                    return Err(SubmissionError::StaleSession(requested));
                }
                _ => current.to_string(),
            }
        };

        let student_name = student_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.default_student_name.clone());

        let is_frame = matches!(payload, SubmissionPayload::Frame(_));
        let file = load_payload(payload).await?;
        let sheet = SheetUpload {
            session_id: session_id.clone(),
            student_name: student_name.clone(),
            file,
        };

        info!(
            "📤 正在提交答题卡: {} ({})",
            student_name,
            if is_frame { "摄像头" } else { "文件" }
        );
        let (response, fallback_mode) = if is_frame {
            (self.service.process_webcam_image(sheet).await?, DetectionMode::Realtime)
        } else {
            (self.service.upload_student_sheet(sheet).await?, DetectionMode::Manual)
        };

        let record = ResultRecord::from_response(response, &student_name, fallback_mode)
            .map_err(SubmissionError::InvalidResponse)?;

        if lock(&self.state).accept_result(&session_id, record.clone()) {
            info!("✓ {}: {}", record.student_name, record.score_text());
            Ok(SubmissionOutcome::StudentSheetGraded(record))
        } else {
            warn!(
                "⚠️ 会话 {} 已失效，丢弃 {} 的评分结果",
                session_id, record.student_name
            );
            Ok(SubmissionOutcome::Discarded { session_id })
        }
    }
}

async fn load_payload(payload: SubmissionPayload) -> Result<UploadFile, SubmissionError> {
    match payload {
        SubmissionPayload::Frame(frame) => Ok(UploadFile::from_frame(frame)),
        SubmissionPayload::File(path) => UploadFile::from_path(&path).await,
    }
}

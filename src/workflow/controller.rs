//! 阅卷控制器 - 流程层
//!
//! 持有流程状态、提交管道和当前的采集源，把界面意图转换成对它们的调用。
//!
//! ## 采集方式切换
//!
//! 切换前先停止旧的采集源（每个实例只调用一次 `stop()`），并把采集代数加一。
//! 拍照完成后如果代数已经变化，拍到的帧直接丢弃，不会进入提交管道。

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, CaptureError, SubmissionError};
use crate::infrastructure::capture::{create_source, CaptureSource, SourceState};
use crate::models::{
    CaptureMode, ResultRecord, SubmissionKind, SubmissionOutcome, SubmissionRequest,
};
use crate::services::GradingService;
use crate::utils::lock;
use crate::workflow::pipeline::{SharedState, SubmissionPipeline};
use crate::workflow::state::{WorkflowState, WorkflowStep};

/// 按采集方式创建新的采集源实例
pub type SourceFactory = Box<dyn Fn(CaptureMode) -> Option<Arc<dyn CaptureSource>> + Send + Sync>;

/// 界面层发出的意图
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    SubmitAnswerKey(PathBuf),
    SubmitStudentSheet {
        path: PathBuf,
        student_name: Option<String>,
    },
    SwitchMode(CaptureMode),
    StartCamera,
    CaptureAndSubmit {
        student_name: Option<String>,
    },
    ClearResults,
    StartOver,
}

/// 一次意图执行后的结果，交给展示层生成通知
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    SessionCreated(String),
    Graded(ResultRecord),
    /// 会话已变化，迟到的结果被丢弃
    Discarded { session_id: String },
    ModeSwitched(CaptureMode),
    CameraReady(CaptureMode),
    ResultsCleared,
    /// 本地状态已重置，界面应跳转到 `navigate_to`
    Reset { navigate_to: String },
}

impl From<SubmissionOutcome> for ActionOutcome {
    fn from(outcome: SubmissionOutcome) -> Self {
        match outcome {
            SubmissionOutcome::AnswerKeyAccepted { session_id } => {
                ActionOutcome::SessionCreated(session_id)
            }
            SubmissionOutcome::StudentSheetGraded(record) => ActionOutcome::Graded(record),
            SubmissionOutcome::Discarded { session_id } => ActionOutcome::Discarded { session_id },
        }
    }
}

/// 渲染用的只读快照
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSnapshot {
    pub session_id: Option<String>,
    pub capture_mode: CaptureMode,
    pub step: WorkflowStep,
    pub results: Vec<ResultRecord>,
    pub key_in_flight: bool,
    pub sheet_in_flight: bool,
    pub can_submit_student_sheet: bool,
    /// 文件上传模式下为 None
    pub source_state: Option<SourceState>,
}

struct ActiveSource {
    epoch: u64,
    source: Arc<dyn CaptureSource>,
}

/// 阅卷控制器
pub struct GradingController {
    state: SharedState,
    pipeline: SubmissionPipeline,
    factory: SourceFactory,
    active: Mutex<Option<ActiveSource>>,
    capture_epoch: AtomicU64,
}

impl GradingController {
    /// 使用配置中的摄像头参数创建采集源
    pub fn new(config: &Config, service: Arc<dyn GradingService>) -> Self {
        let source_config = config.clone();
        let factory: SourceFactory = Box::new(move |mode| create_source(mode, &source_config));
        Self::with_source_factory(service, config.default_student_name.clone(), factory)
    }

    pub fn with_source_factory(
        service: Arc<dyn GradingService>,
        default_student_name: impl Into<String>,
        factory: SourceFactory,
    ) -> Self {
        let state: SharedState = Arc::new(Mutex::new(WorkflowState::new()));
        Self {
            pipeline: SubmissionPipeline::new(service, state.clone(), default_student_name),
            state,
            factory,
            active: Mutex::new(None),
            capture_epoch: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn can_submit_student_sheet(&self) -> bool {
        lock(&self.state).can_submit_student_sheet()
    }

    /// 执行一个意图
    pub async fn handle(&self, intent: Intent) -> Result<ActionOutcome, AppError> {
        debug!("执行意图: {:?}", intent);
        match intent {
            Intent::SubmitAnswerKey(path) => self.upload_answer_key(path).await,
            Intent::SubmitStudentSheet { path, student_name } => {
                self.submit_student_sheet_file(path, student_name).await
            }
            Intent::SwitchMode(mode) => Ok(self.switch_mode(mode)),
            Intent::StartCamera => self.start_capture().await,
            Intent::CaptureAndSubmit { student_name } => {
                self.capture_and_submit(student_name).await
            }
            Intent::ClearResults => Ok(self.clear_results()),
            Intent::StartOver => Ok(self.start_over()),
        }
    }

    pub async fn upload_answer_key(&self, path: PathBuf) -> Result<ActionOutcome, AppError> {
        let outcome = self.pipeline.submit(SubmissionRequest::answer_key(path)).await?;
        Ok(outcome.into())
    }

    pub async fn submit_student_sheet_file(
        &self,
        path: PathBuf,
        student_name: Option<String>,
    ) -> Result<ActionOutcome, AppError> {
        let request = SubmissionRequest::student_sheet_file(path, student_name);
        let outcome = self.pipeline.submit(request).await?;
        Ok(outcome.into())
    }

    /// 切换采集方式
    ///
    /// 先停止旧采集源，再激活新的采集方式；新的采集源需要 [`start_capture`](Self::start_capture) 启动。
    pub fn switch_mode(&self, mode: CaptureMode) -> ActionOutcome {
        self.teardown_source();

        lock(&self.state).set_capture_mode(mode);
        if let Some(source) = (self.factory)(mode) {
            *lock(&self.active) = Some(ActiveSource {
                epoch: self.capture_epoch.load(Ordering::SeqCst),
                source,
            });
        }

        info!("📷 采集方式已切换为: {}", mode);
        ActionOutcome::ModeSwitched(mode)
    }

    /// 启动当前采集源；已停止的实例会被替换为新实例
    pub async fn start_capture(&self) -> Result<ActionOutcome, AppError> {
        let mode = lock(&self.state).capture_mode();
        let (epoch, source) = {
            let mut active = lock(&self.active);
            let needs_fresh = match active.as_ref() {
                Some(current) => current.source.state() == SourceState::Stopped,
                None => mode.is_camera(),
            };
            if needs_fresh {
                *active = (self.factory)(mode).map(|source| ActiveSource {
                    epoch: self.capture_epoch.load(Ordering::SeqCst),
                    source,
                });
            }
            match active.as_ref() {
                Some(current) => (current.epoch, current.source.clone()),
                None => {
                    return Err(CaptureError::InvalidState(format!(
                        "采集方式 {} 没有可启动的采集源",
                        mode
                    ))
                    .into())
                }
            }
        };

        source.start().await?;

        if self.capture_epoch.load(Ordering::SeqCst) != epoch {
            // 启动期间已切换采集方式，旧实例由切换流程停止
            return Err(CaptureError::Discarded.into());
        }
        Ok(ActionOutcome::CameraReady(source.mode()))
    }

    /// 拍摄一张答题卡并提交
    pub async fn capture_and_submit(
        &self,
        student_name: Option<String>,
    ) -> Result<ActionOutcome, AppError> {
        {
            let state = lock(&self.state);
            if state.session_id().is_none() {
                return Err(SubmissionError::NoSession.into());
            }
            if state.is_in_flight(SubmissionKind::StudentSheet) {
                return Err(SubmissionError::AlreadyInFlight(SubmissionKind::StudentSheet).into());
            }
        }

        let (epoch, source) = match lock(&self.active).as_ref() {
            Some(current) => (current.epoch, current.source.clone()),
            None => return Err(CaptureError::NoActiveStream.into()),
        };

        let frame = source.capture_still().await?;

        if self.capture_epoch.load(Ordering::SeqCst) != epoch {
            warn!("⚠️ 拍照期间采集方式已切换，丢弃 {} 字节的图像", frame.len());
            return Err(CaptureError::Discarded.into());
        }

        let request = SubmissionRequest::student_sheet_frame(frame, student_name);
        let outcome = self.pipeline.submit(request).await?;
        Ok(outcome.into())
    }

    /// 清空本地结果，保留会话
    pub fn clear_results(&self) -> ActionOutcome {
        lock(&self.state).clear_results();
        info!("🧹 已清空本地结果");
        ActionOutcome::ResultsCleared
    }

    /// 重新开始：停止采集源、清空会话和结果
    ///
    /// 有会话时跳转到 `/clear-session/{id}` 让服务端也清理，否则回到首页
    pub fn start_over(&self) -> ActionOutcome {
        self.teardown_source();

        let navigate_to = {
            let mut state = lock(&self.state);
            let target = clear_session_link(state.session_id());
            state.reset();
            target
        };

        info!("🔁 流程已重置");
        ActionOutcome::Reset { navigate_to }
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let source_state = lock(&self.active)
            .as_ref()
            .map(|current| current.source.state());
        let state = lock(&self.state);
        WorkflowSnapshot {
            session_id: state.session_id().map(str::to_string),
            capture_mode: state.capture_mode(),
            step: state.workflow_step(),
            results: state.results().all().to_vec(),
            key_in_flight: state.is_in_flight(SubmissionKind::AnswerKey),
            sheet_in_flight: state.is_in_flight(SubmissionKind::StudentSheet),
            can_submit_student_sheet: state.can_submit_student_sheet(),
            source_state,
        }
    }

    /// 停止并移除当前采集源，之后完成的拍照都会被丢弃
    fn teardown_source(&self) {
        self.capture_epoch.fetch_add(1, Ordering::SeqCst);
        let previous = lock(&self.active).take();
        if let Some(previous) = previous {
            debug!("停止采集源: {}", previous.source.mode());
            previous.source.stop();
        }
    }
}

impl Drop for GradingController {
    fn drop(&mut self) {
        self.teardown_source();
    }
}

/// 结果页链接
pub fn results_link(session_id: &str) -> String {
    format!("/results/{}", session_id)
}

/// 重新开始的跳转目标
pub fn clear_session_link(session_id: Option<&str>) -> String {
    match session_id {
        Some(id) => format!("/clear-session/{}", id),
        None => "/".to_string(),
    }
}

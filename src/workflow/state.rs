//! 流程状态
//!
//! 纯状态对象，没有网络或界面副作用。会话 ID 只会被成功的答案上传和 `reset()` 修改。

use tracing::{info, warn};

use crate::models::{CaptureMode, ResultRecord, SubmissionKind};
use crate::services::ResultStore;

/// 流程进度，只用于展示，不参与任何判断
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkflowStep {
    /// 等待上传答案
    AwaitingKey = 0,
    /// 等待提交答题卡
    AwaitingSubmission = 1,
    /// 已有结果
    HasResults = 2,
}

impl WorkflowStep {
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Default)]
pub struct WorkflowState {
    session_id: Option<String>,
    capture_mode: CaptureMode,
    results: ResultStore,
    in_flight: [bool; 2],
    /// 每次 reset 加一，用于识别重置之前发出的请求
    generation: u64,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn capture_mode(&self) -> CaptureMode {
        self.capture_mode
    }

    pub fn set_capture_mode(&mut self, mode: CaptureMode) {
        self.capture_mode = mode;
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_in_flight(&self, kind: SubmissionKind) -> bool {
        self.in_flight[kind.slot()]
    }

    /// 已有会话且答案上传不在进行中
    pub fn can_submit_student_sheet(&self) -> bool {
        self.session_id.is_some() && !self.is_in_flight(SubmissionKind::AnswerKey)
    }

    /// 记录新会话
    ///
    /// 相同 ID 不做任何事；不同 ID 视为替换会话，旧会话的结果随之清空。
    /// 返回是否替换了已有会话。
    pub fn set_session_id(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        match self.session_id.as_deref() {
            Some(current) if current == id => false,
            Some(current) => {
                warn!(
                    "🔄 会话被替换: {} → {}，清空 {} 条旧结果",
                    current,
                    id,
                    self.results.len()
                );
                self.results.clear();
                self.session_id = Some(id);
                true
            }
            None => {
                info!("✓ 会话已创建: {}", id);
                self.session_id = Some(id);
                false
            }
        }
    }

    /// 清空会话和结果，采集方式回到文件上传
    pub fn reset(&mut self) {
        self.session_id = None;
        self.capture_mode = CaptureMode::FileUpload;
        self.results.clear();
        self.generation += 1;
    }

    /// 只清空本地结果，保留会话
    pub fn clear_results(&mut self) {
        self.results.clear();
    }

    pub fn workflow_step(&self) -> WorkflowStep {
        match (&self.session_id, self.results.is_empty()) {
            (None, _) => WorkflowStep::AwaitingKey,
            (Some(_), true) => WorkflowStep::AwaitingSubmission,
            (Some(_), false) => WorkflowStep::HasResults,
        }
    }

    /// 写入评分结果；发出请求时的会话已不是当前会话时拒绝
    pub fn accept_result(&mut self, dispatch_session: &str, record: ResultRecord) -> bool {
        if self.session_id.as_deref() != Some(dispatch_session) {
            return false;
        }
        self.results.append(record);
        true
    }

    /// 占用某类请求的单飞标记，已被占用时返回 false
    pub(crate) fn try_begin(&mut self, kind: SubmissionKind) -> bool {
        let slot = &mut self.in_flight[kind.slot()];
        if *slot {
            return false;
        }
        *slot = true;
        true
    }

    pub(crate) fn finish(&mut self, kind: SubmissionKind) {
        self.in_flight[kind.slot()] = false;
    }
}

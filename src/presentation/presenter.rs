//! 展示层
//!
//! 把流程快照翻译成渲染指令，把界面事件翻译成意图。
//! 除了展开状态、排序和通知这些临时的界面状态之外不持有任何状态，也不访问网络。

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;

use crate::error::AppError;
use crate::models::{CaptureMode, DetectionMode, ResultRecord};
use crate::presentation::notifications::{Notification, NotificationCenter, NotificationLevel};
use crate::services::{
    filter_by_name, mode_split, score_histogram, sorted_indices, ModeSplit, ScoreBand,
    ScoreHistogram, SortColumn, SortState,
};
use crate::infrastructure::capture::SourceState;
use crate::workflow::{
    clear_session_link, results_link, ActionOutcome, Intent, WorkflowSnapshot,
};

/// 结果表格的列顺序
pub const TABLE_COLUMNS: [SortColumn; 5] = [
    SortColumn::Name,
    SortColumn::Score,
    SortColumn::Percentage,
    SortColumn::Mode,
    SortColumn::Timestamp,
];

/// 界面事件
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    AnswerKeySelected(PathBuf),
    StudentSheetSelected {
        path: PathBuf,
        student_name: Option<String>,
    },
    ModeSelected(CaptureMode),
    StartCameraClicked,
    CaptureClicked {
        student_name: Option<String>,
    },
    ToggleDetails(usize),
    ExpandAll,
    CollapseAll,
    SortBy(SortColumn),
    /// 按学生姓名筛选表格，空字符串表示不筛选
    FilterByName(String),
    ClearResultsClicked,
    StartOverClicked,
    DismissNotification(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    Active,
    Pending,
}

/// 各控件的可用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlStates {
    pub answer_key_enabled: bool,
    pub answer_key_busy: bool,
    pub student_section_enabled: bool,
    pub student_sheet_busy: bool,
    pub start_camera_enabled: bool,
    pub capture_enabled: bool,
    pub view_results_enabled: bool,
    pub clear_results_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRow {
    pub question: String,
    pub correct_answer: String,
    pub student_answer: String,
    pub is_correct: bool,
    pub mark: char,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultCard {
    /// 结果集中的下标
    pub index: usize,
    /// 从 1 开始的提交序号
    pub number: usize,
    pub student_name: String,
    pub score_text: String,
    pub percentage: f64,
    pub band: ScoreBand,
    pub mode: DetectionMode,
    pub expanded: bool,
    pub details: Vec<DetailRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub index: usize,
    pub number: usize,
    /// 与 [`TABLE_COLUMNS`] 一一对应
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentScore {
    pub student_name: String,
    pub percentage: f64,
    pub band: ScoreBand,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub histogram: ScoreHistogram,
    pub mode_split: ModeSplit,
    pub student_scores: Vec<StudentScore>,
    /// 只有一条结果时分布图没有意义
    pub show_distribution: bool,
}

/// 一次渲染的全部指令
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    pub steps: [StepStatus; 3],
    pub capture_mode: CaptureMode,
    pub controls: ControlStates,
    pub cards: Vec<ResultCard>,
    pub table: Vec<TableRow>,
    pub sort: Option<SortState>,
    pub name_filter: Option<String>,
    pub charts: Option<ChartData>,
    pub results_link: Option<String>,
    pub start_over_link: String,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Default)]
pub struct Presenter {
    expanded: BTreeSet<usize>,
    sort: Option<SortState>,
    name_filter: Option<String>,
    notifications: NotificationCenter,
    rendered_results: usize,
}

impl Presenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifications(notifications: NotificationCenter) -> Self {
        Self {
            notifications,
            ..Self::default()
        }
    }

    pub fn sort_state(&self) -> Option<SortState> {
        self.sort
    }

    pub fn name_filter(&self) -> Option<&str> {
        self.name_filter.as_deref()
    }

    pub fn notification(&self, id: u64) -> Option<&Notification> {
        self.notifications.get(id)
    }

    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded.contains(&index)
    }

    /// 处理界面事件，返回需要控制器执行的意图
    pub fn on_user_action(&mut self, action: UserAction) -> Vec<Intent> {
        match action {
            UserAction::AnswerKeySelected(path) => vec![Intent::SubmitAnswerKey(path)],
            UserAction::StudentSheetSelected { path, student_name } => {
                vec![Intent::SubmitStudentSheet { path, student_name }]
            }
            UserAction::ModeSelected(mode) => {
                let mut intents = vec![Intent::SwitchMode(mode)];
                if mode.is_camera() {
                    intents.push(Intent::StartCamera);
                }
                intents
            }
            UserAction::StartCameraClicked => vec![Intent::StartCamera],
            UserAction::CaptureClicked { student_name } => {
                vec![Intent::CaptureAndSubmit { student_name }]
            }
            UserAction::ToggleDetails(index) => {
                if !self.expanded.remove(&index) {
                    self.expanded.insert(index);
                }
                Vec::new()
            }
            UserAction::ExpandAll => {
                self.expanded = (0..self.rendered_results).collect();
                Vec::new()
            }
            UserAction::CollapseAll => {
                self.expanded.clear();
                Vec::new()
            }
            UserAction::SortBy(column) => {
                self.sort = Some(SortState::toggle(self.sort, column));
                Vec::new()
            }
            UserAction::FilterByName(query) => {
                let query = query.trim();
                self.name_filter = (!query.is_empty()).then(|| query.to_string());
                Vec::new()
            }
            UserAction::ClearResultsClicked => {
                self.forget_results();
                vec![Intent::ClearResults]
            }
            UserAction::StartOverClicked => {
                self.forget_results();
                vec![Intent::StartOver]
            }
            UserAction::DismissNotification(id) => {
                self.notifications.dismiss(id);
                Vec::new()
            }
        }
    }

    /// 把一次意图的执行结果转换成通知，返回通知 ID
    pub fn report(
        &mut self,
        result: &Result<ActionOutcome, AppError>,
        now: Instant,
    ) -> Option<u64> {
        let (level, message) = match result {
            Ok(outcome) => match outcome {
                ActionOutcome::SessionCreated(_) => (
                    NotificationLevel::Success,
                    "答案已处理，可以提交答题卡".to_string(),
                ),
                ActionOutcome::Graded(record) => (
                    NotificationLevel::Success,
                    format!("{}: {}", record.student_name, record.score_text()),
                ),
                ActionOutcome::Discarded { .. } => (
                    NotificationLevel::Warning,
                    "会话已变化，迟到的评分结果已丢弃".to_string(),
                ),
                ActionOutcome::CameraReady(_) => {
                    (NotificationLevel::Success, "摄像头已就绪".to_string())
                }
                ActionOutcome::ResultsCleared => {
                    (NotificationLevel::Success, "结果已清空".to_string())
                }
                ActionOutcome::ModeSwitched(_) | ActionOutcome::Reset { .. } => return None,
            },
            Err(err) => error_notification(err),
        };
        Some(self.notifications.push(level, message, now))
    }

    /// 根据快照生成渲染指令
    pub fn render(&mut self, snapshot: &WorkflowSnapshot, now: Instant) -> RenderPlan {
        let records = &snapshot.results;

        // 结果被清空（包括会话替换）后排序和展开状态都不保留
        if records.is_empty() {
            self.forget_results();
        }
        self.expanded.retain(|&i| i < records.len());
        self.rendered_results = records.len();
        self.notifications.prune(now);

        let current = snapshot.step.index();
        let steps = [0, 1, 2].map(|i| {
            if i < current {
                StepStatus::Completed
            } else if i == current {
                StepStatus::Active
            } else {
                StepStatus::Pending
            }
        });

        let mut order = match self.sort {
            Some(state) => sorted_indices(records, state),
            None => (0..records.len()).collect(),
        };
        if let Some(query) = &self.name_filter {
            let visible: BTreeSet<usize> = filter_by_name(records, query).into_iter().collect();
            order.retain(|i| visible.contains(i));
        }
        let table = order
            .iter()
            .map(|&i| TableRow {
                index: i,
                number: i + 1,
                cells: TABLE_COLUMNS.iter().map(|c| c.cell(&records[i])).collect(),
            })
            .collect();

        RenderPlan {
            steps,
            capture_mode: snapshot.capture_mode,
            controls: control_states(snapshot),
            cards: records
                .iter()
                .enumerate()
                .map(|(i, r)| result_card(i, r, self.expanded.contains(&i)))
                .collect(),
            table,
            sort: self.sort,
            name_filter: self.name_filter.clone(),
            charts: chart_data(records),
            results_link: match (&snapshot.session_id, records.is_empty()) {
                (Some(id), false) => Some(results_link(id)),
                _ => None,
            },
            start_over_link: clear_session_link(snapshot.session_id.as_deref()),
            notifications: self.notifications.active(now),
        }
    }

    fn forget_results(&mut self) {
        self.expanded.clear();
        self.sort = None;
        self.name_filter = None;
    }
}

fn error_notification(err: &AppError) -> (NotificationLevel, String) {
    match err {
        AppError::Submission(e) if e.is_advisory() => (NotificationLevel::Warning, e.to_string()),
        AppError::Submission(e) => (NotificationLevel::Danger, e.to_string()),
        AppError::Capture(e @ crate::error::CaptureError::Discarded) => {
            (NotificationLevel::Warning, e.to_string())
        }
        AppError::Capture(e) => (NotificationLevel::Danger, e.to_string()),
        other => (NotificationLevel::Danger, other.to_string()),
    }
}

fn control_states(snapshot: &WorkflowSnapshot) -> ControlStates {
    let source_ready = snapshot.source_state == Some(SourceState::Ready);
    let source_startable = matches!(
        snapshot.source_state,
        Some(SourceState::Idle) | Some(SourceState::Stopped)
    );
    let has_results = !snapshot.results.is_empty();

    ControlStates {
        answer_key_enabled: !snapshot.key_in_flight,
        answer_key_busy: snapshot.key_in_flight,
        student_section_enabled: snapshot.can_submit_student_sheet,
        student_sheet_busy: snapshot.sheet_in_flight,
        start_camera_enabled: snapshot.capture_mode.is_camera() && source_startable,
        capture_enabled: snapshot.can_submit_student_sheet
            && !snapshot.sheet_in_flight
            && source_ready,
        view_results_enabled: snapshot.session_id.is_some() && has_results,
        clear_results_enabled: has_results,
    }
}

fn result_card(index: usize, record: &ResultRecord, expanded: bool) -> ResultCard {
    ResultCard {
        index,
        number: index + 1,
        student_name: record.student_name.clone(),
        score_text: record.score_text(),
        percentage: record.percentage,
        band: ScoreBand::from_percentage(record.percentage),
        mode: record.mode,
        expanded,
        details: record
            .details
            .iter()
            .map(|d| DetailRow {
                question: d.question.clone(),
                correct_answer: d.correct_answer.clone(),
                student_answer: d.student_answer.clone(),
                is_correct: d.is_correct,
                mark: if d.is_correct { '✓' } else { '✗' },
            })
            .collect(),
    }
}

fn chart_data(records: &[ResultRecord]) -> Option<ChartData> {
    if records.is_empty() {
        return None;
    }
    Some(ChartData {
        histogram: score_histogram(records),
        mode_split: mode_split(records),
        student_scores: records
            .iter()
            .map(|r| StudentScore {
                student_name: r.student_name.clone(),
                percentage: r.percentage,
                band: ScoreBand::from_percentage(r.percentage),
            })
            .collect(),
        show_distribution: records.len() > 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CaptureError, SubmissionError};
    use crate::models::SubmissionKind;
    use crate::testing::sample_record;
    use crate::workflow::WorkflowStep;
    use std::time::Duration;

    fn snapshot(session: Option<&str>, results: Vec<ResultRecord>) -> WorkflowSnapshot {
        let step = match (session, results.is_empty()) {
            (None, _) => WorkflowStep::AwaitingKey,
            (Some(_), true) => WorkflowStep::AwaitingSubmission,
            (Some(_), false) => WorkflowStep::HasResults,
        };
        WorkflowSnapshot {
            session_id: session.map(str::to_string),
            capture_mode: CaptureMode::FileUpload,
            step,
            results,
            key_in_flight: false,
            sheet_in_flight: false,
            can_submit_student_sheet: session.is_some(),
            source_state: None,
        }
    }

    fn two_results() -> Vec<ResultRecord> {
        vec![
            sample_record("Alice", 8, 10, DetectionMode::Manual),
            sample_record("Bob", 5, 10, DetectionMode::Realtime),
        ]
    }

    #[test]
    fn test_initial_render() {
        let mut presenter = Presenter::new();
        let plan = presenter.render(&snapshot(None, Vec::new()), Instant::now());

        assert_eq!(plan.steps, [StepStatus::Active, StepStatus::Pending, StepStatus::Pending]);
        assert!(plan.controls.answer_key_enabled);
        assert!(!plan.controls.student_section_enabled);
        assert!(!plan.controls.view_results_enabled);
        assert!(plan.charts.is_none());
        assert_eq!(plan.results_link, None);
        assert_eq!(plan.start_over_link, "/");
    }

    #[test]
    fn test_render_with_results() {
        let mut presenter = Presenter::new();
        let plan = presenter.render(&snapshot(Some("abc123"), two_results()), Instant::now());

        assert_eq!(plan.steps, [StepStatus::Completed, StepStatus::Completed, StepStatus::Active]);
        assert_eq!(plan.cards.len(), 2);
        assert_eq!(plan.cards[0].score_text, "8/10 (80.00%)");
        assert_eq!(plan.cards[0].band, ScoreBand::High);
        assert_eq!(plan.cards[1].band, ScoreBand::Low);
        assert_eq!(plan.cards[0].details[0].mark, '✓');
        assert_eq!(plan.results_link.as_deref(), Some("/results/abc123"));
        assert_eq!(plan.start_over_link, "/clear-session/abc123");

        let charts = plan.charts.unwrap();
        assert!(charts.show_distribution);
        assert_eq!(charts.mode_split, ModeSplit { realtime: 1, other: 1 });
        assert_eq!(charts.student_scores[1].student_name, "Bob");
    }

    #[test]
    fn test_single_result_hides_distribution() {
        let mut presenter = Presenter::new();
        let results = vec![sample_record("Alice", 8, 10, DetectionMode::Manual)];
        let plan = presenter.render(&snapshot(Some("abc123"), results), Instant::now());
        assert!(!plan.charts.unwrap().show_distribution);
    }

    #[test]
    fn test_busy_controls_follow_in_flight_flags() {
        let mut presenter = Presenter::new();
        let mut snap = snapshot(Some("abc123"), Vec::new());
        snap.key_in_flight = true;
        snap.can_submit_student_sheet = false;
        let plan = presenter.render(&snap, Instant::now());
        assert!(plan.controls.answer_key_busy);
        assert!(!plan.controls.answer_key_enabled);
        assert!(!plan.controls.student_section_enabled);
    }

    #[test]
    fn test_camera_controls() {
        let mut presenter = Presenter::new();
        let mut snap = snapshot(Some("abc123"), Vec::new());
        snap.capture_mode = CaptureMode::DeviceCamera;
        snap.source_state = Some(SourceState::Idle);
        let plan = presenter.render(&snap, Instant::now());
        assert!(plan.controls.start_camera_enabled);
        assert!(!plan.controls.capture_enabled);

        snap.source_state = Some(SourceState::Ready);
        let plan = presenter.render(&snap, Instant::now());
        assert!(!plan.controls.start_camera_enabled);
        assert!(plan.controls.capture_enabled);
    }

    #[test]
    fn test_toggle_and_expand_all() {
        let mut presenter = Presenter::new();
        let snap = snapshot(Some("abc123"), two_results());
        presenter.render(&snap, Instant::now());

        assert!(presenter.on_user_action(UserAction::ToggleDetails(1)).is_empty());
        assert!(presenter.is_expanded(1));
        presenter.on_user_action(UserAction::ToggleDetails(1));
        assert!(!presenter.is_expanded(1));

        presenter.on_user_action(UserAction::ExpandAll);
        let plan = presenter.render(&snap, Instant::now());
        assert!(plan.cards.iter().all(|c| c.expanded));

        presenter.on_user_action(UserAction::CollapseAll);
        let plan = presenter.render(&snap, Instant::now());
        assert!(plan.cards.iter().all(|c| !c.expanded));
    }

    #[test]
    fn test_sort_is_forgotten_after_clear() {
        let mut presenter = Presenter::new();
        let snap = snapshot(Some("abc123"), two_results());
        presenter.render(&snap, Instant::now());

        presenter.on_user_action(UserAction::SortBy(SortColumn::Percentage));
        let plan = presenter.render(&snap, Instant::now());
        let names: Vec<&str> = plan.table.iter().map(|r| r.cells[0].as_str()).collect();
        assert_eq!(names, ["Bob", "Alice"]);

        presenter.on_user_action(UserAction::SortBy(SortColumn::Percentage));
        let plan = presenter.render(&snap, Instant::now());
        assert_eq!(plan.table[0].cells[0], "Alice");
        assert_eq!(plan.table[0].number, 1);

        // 会话被替换导致结果清空，排序也随之丢弃
        presenter.render(&snapshot(Some("def456"), Vec::new()), Instant::now());
        assert_eq!(presenter.sort_state(), None);
    }

    #[test]
    fn test_name_filter_applies_to_sorted_table() {
        let mut presenter = Presenter::new();
        let mut results = two_results();
        results.push(sample_record("alicia", 6, 10, DetectionMode::Manual));
        let snap = snapshot(Some("abc123"), results);
        presenter.render(&snap, Instant::now());

        presenter.on_user_action(UserAction::SortBy(SortColumn::Percentage));
        assert!(presenter
            .on_user_action(UserAction::FilterByName(" ALI ".to_string()))
            .is_empty());
        let plan = presenter.render(&snap, Instant::now());
        let rows: Vec<(usize, &str)> = plan
            .table
            .iter()
            .map(|r| (r.number, r.cells[0].as_str()))
            .collect();
        assert_eq!(rows, [(3, "alicia"), (1, "Alice")]);
        assert_eq!(plan.name_filter.as_deref(), Some("ALI"));
        // 卡片和图表不受筛选影响
        assert_eq!(plan.cards.len(), 3);

        presenter.on_user_action(UserAction::FilterByName(String::new()));
        let plan = presenter.render(&snap, Instant::now());
        assert_eq!(plan.table.len(), 3);
        assert_eq!(presenter.name_filter(), None);

        presenter.on_user_action(UserAction::FilterByName("bob".to_string()));
        presenter.on_user_action(UserAction::ClearResultsClicked);
        assert_eq!(presenter.name_filter(), None);
    }

    #[test]
    fn test_actions_map_to_intents() {
        let mut presenter = Presenter::new();
        assert_eq!(
            presenter.on_user_action(UserAction::ModeSelected(CaptureMode::NetworkCamera)),
            vec![Intent::SwitchMode(CaptureMode::NetworkCamera), Intent::StartCamera]
        );
        assert_eq!(
            presenter.on_user_action(UserAction::ModeSelected(CaptureMode::FileUpload)),
            vec![Intent::SwitchMode(CaptureMode::FileUpload)]
        );
        assert_eq!(
            presenter.on_user_action(UserAction::StartOverClicked),
            vec![Intent::StartOver]
        );
        assert_eq!(
            presenter.on_user_action(UserAction::CaptureClicked { student_name: None }),
            vec![Intent::CaptureAndSubmit { student_name: None }]
        );
    }

    #[test]
    fn test_report_levels() {
        let mut presenter = Presenter::new();
        let now = Instant::now();

        presenter.report(&Ok(ActionOutcome::SessionCreated("abc123".to_string())), now);
        presenter.report(
            &Err(SubmissionError::AlreadyInFlight(SubmissionKind::StudentSheet).into()),
            now,
        );
        presenter.report(
            &Err(CaptureError::PermissionDenied("denied".to_string()).into()),
            now,
        );
        let switched = Ok(ActionOutcome::ModeSwitched(CaptureMode::FileUpload));
        assert_eq!(presenter.report(&switched, now), None);

        let plan = presenter.render(&snapshot(None, Vec::new()), now);
        let levels: Vec<NotificationLevel> = plan.notifications.iter().map(|n| n.level).collect();
        assert_eq!(
            levels,
            [NotificationLevel::Success, NotificationLevel::Warning, NotificationLevel::Danger]
        );

        // 5 秒后全部消失
        let later = presenter.render(&snapshot(None, Vec::new()), now + Duration::from_secs(5));
        assert!(later.notifications.is_empty());
    }
}

//! 批量阅卷 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次完整的阅卷运行。
//!
//! ## 核心流程
//!
//! 1. **应用初始化**：日志文件、评分服务客户端、控制器、展示层
//! 2. **上传答案**：创建会话
//! 3. **提交答题卡**：文件模式扫描目录；摄像头模式按间隔拍摄
//! 4. **统计汇总**：分数段、识别方式、可选的 CSV 导出
//!
//! ## 设计特点
//!
//! - 所有操作都走 `UserAction → Presenter → Intent → GradingController`，
//!   与交互界面使用同一条路径
//! - 通知直接输出到日志

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::models::CaptureMode;
use crate::orchestrator::sheet_processor::{self, RunStats};
use crate::presentation::{NotificationCenter, NotificationLevel, Presenter, UserAction};
use crate::services::{export_results, mode_split, score_histogram, HttpGradingService};
use crate::utils::logging::{init_log_file, log_session_created, log_startup, print_final_stats};
use crate::workflow::{ActionOutcome, GradingController};

/// 应用主结构
pub struct App {
    config: Config,
    controller: GradingController,
    presenter: Presenter,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        let service = Arc::new(HttpGradingService::from_config(&config));
        let controller = GradingController::new(&config, service);
        let presenter = Presenter::with_notifications(NotificationCenter::new(
            Duration::from_secs(config.notification_lifetime_secs),
        ));

        Ok(Self {
            config,
            controller,
            presenter,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&mut self) -> Result<()> {
        // ========== 步骤 1: 上传答案 ==========
        let key_path = PathBuf::from(&self.config.answer_key_path);
        info!("\n📝 步骤 1: 上传答案 {}", key_path.display());

        match self
            .dispatch(UserAction::AnswerKeySelected(key_path))
            .await
            .context("上传答案失败")?
        {
            Some(ActionOutcome::SessionCreated(session_id)) => log_session_created(&session_id),
            other => bail!("答案上传没有创建会话: {:?}", other),
        }

        // ========== 步骤 2: 提交答题卡 ==========
        let stats = match self.config.capture_mode {
            CaptureMode::FileUpload => self.process_folder().await?,
            mode => self.process_camera(mode).await?,
        };

        // ========== 步骤 3: 汇总 ==========
        let snapshot = self.controller.snapshot();
        log_summary(&snapshot.results);

        if let Some(path) = &self.config.export_csv_path {
            export_results(&snapshot.results, Path::new(path))
                .with_context(|| format!("导出 CSV 失败: {}", path))?;
        }

        print_final_stats(
            stats.graded,
            stats.failed,
            stats.discarded,
            &self.config.output_log_file,
        );

        Ok(())
    }

    /// 文件模式：依次上传目录中的答题卡
    async fn process_folder(&mut self) -> Result<RunStats> {
        let folder = PathBuf::from(&self.config.student_sheet_folder);
        info!("\n📁 步骤 2: 正在扫描答题卡...");
        let sheets = sheet_processor::load_student_sheets(&folder)?;

        let mut stats = RunStats::default();
        if sheets.is_empty() {
            warn!("⚠️ 没有找到待处理的答题卡");
            return Ok(stats);
        }
        sheet_processor::log_sheets_loaded(sheets.len(), &folder);

        let total = sheets.len();
        for (index, sheet) in sheets.into_iter().enumerate() {
            info!("\n[{}/{}] 📄 {}", index + 1, total, sheet.path.display());
            let label = sheet.student_name.clone();
            let result = self
                .dispatch(UserAction::StudentSheetSelected {
                    path: sheet.path,
                    student_name: Some(sheet.student_name),
                })
                .await;
            stats.record(&label, &flatten(result), &self.config.output_log_file);
        }

        Ok(stats)
    }

    /// 摄像头模式：启动采集源，按间隔拍摄并提交
    async fn process_camera(&mut self, mode: CaptureMode) -> Result<RunStats> {
        info!("\n📷 步骤 2: 使用 {} 拍摄答题卡", mode);
        self.dispatch(UserAction::ModeSelected(mode))
            .await
            .with_context(|| format!("启动采集源失败: {}", mode))?;

        let count = self.config.capture_count;
        let interval = Duration::from_millis(self.config.capture_interval_ms);
        let mut stats = RunStats::default();

        for index in 0..count {
            if index > 0 {
                tokio::time::sleep(interval).await;
            }
            let student_name = if count == 1 {
                self.config.default_student_name.clone()
            } else {
                format!("{}-{}", self.config.default_student_name, index + 1)
            };
            info!("\n[{}/{}] 📸 拍摄 {}", index + 1, count, student_name);

            let result = self
                .dispatch(UserAction::CaptureClicked {
                    student_name: Some(student_name.clone()),
                })
                .await;
            stats.record(&student_name, &flatten(result), &self.config.output_log_file);
        }

        // 释放摄像头
        self.dispatch(UserAction::ModeSelected(CaptureMode::FileUpload))
            .await?;

        Ok(stats)
    }

    /// 把一个界面事件交给展示层，再依次执行产生的意图
    ///
    /// # 返回
    /// 最后一个意图的结果；没有意图时返回 None
    async fn dispatch(&mut self, action: UserAction) -> Result<Option<ActionOutcome>, AppError> {
        let mut last = None;
        for intent in self.presenter.on_user_action(action) {
            let result = self.controller.handle(intent).await;
            self.announce(&result);
            last = Some(result?);
        }
        Ok(last)
    }

    /// 输出通知
    fn announce(&mut self, result: &Result<ActionOutcome, AppError>) {
        let Some(id) = self.presenter.report(result, Instant::now()) else {
            return;
        };
        if let Some(notification) = self.presenter.notification(id) {
            match notification.level {
                NotificationLevel::Success => info!("🔔 {}", notification.message),
                NotificationLevel::Warning => warn!("🔔 {}", notification.message),
                NotificationLevel::Danger => error!("🔔 {}", notification.message),
            }
        }
    }
}

fn flatten(result: Result<Option<ActionOutcome>, AppError>) -> Result<ActionOutcome, AppError> {
    result.and_then(|outcome| {
        outcome.ok_or_else(|| AppError::Other("没有执行任何操作".to_string()))
    })
}

fn log_summary(records: &[crate::models::ResultRecord]) {
    info!("\n{}", "=".repeat(60));
    info!("📈 成绩分布 (共 {} 份)", records.len());
    for (label, count) in score_histogram(records).iter() {
        info!("  {:>7}: {}", label, count);
    }
    let split = mode_split(records);
    info!("📷 实时识别: {} | 手动上传: {}", split.realtime, split.other);
    info!("{}", "=".repeat(60));
}

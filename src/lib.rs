//! # MCQ Grader Client
//!
//! 选择题答题卡阅卷客户端：上传答案、提交答题卡（文件或摄像头拍摄），
//! 汇总远程评分服务返回的成绩。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/capture` - 持有摄像头设备 / 视频流，只暴露拍照能力
//! - `DeviceCameraSource` - 本机摄像头（ffmpeg 单帧抓取）
//! - `NetworkCameraSource` - 网络摄像头（MJPEG 视频流）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `GradingService` - 远程评分服务的三个上传接口
//! - `ResultStore` - 按提交顺序保存成绩
//! - `aggregator` / `csv_export` - 统计、排序、筛选与导出
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次阅卷"的完整流程
//! - `WorkflowState` - 会话、采集方式、成绩、进行中的请求
//! - `SubmissionPipeline` - 单次提交（单飞控制 + 迟到结果丢弃）
//! - `GradingController` - 意图入口，管理采集源的生命周期
//!
//! ### ④ 展示层（Presentation）
//! - `presentation/` - 快照 → 渲染指令，界面事件 → 意图，自动消失的通知
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 一次完整的批量阅卷运行
//! - `orchestrator/sheet_processor` - 答题卡目录扫描与统计
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod presentation;
pub mod services;
pub mod utils;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{CaptureSource, SourceState};
pub use models::{CaptureMode, ResultRecord};
pub use orchestrator::App;
pub use presentation::Presenter;
pub use services::{GradingService, HttpGradingService};
pub use workflow::{GradingController, Intent};

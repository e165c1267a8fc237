//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责一次完整的批量阅卷运行，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量阅卷
//! - 管理应用生命周期（初始化、运行）
//! - 上传答案、提交答题卡、输出汇总
//! - 把通知输出到日志
//!
//! ### `sheet_processor` - 答题卡来源
//! - 扫描答题卡目录（学生姓名取自文件名）
//! - 记录每份答题卡的处理结果
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (一次运行)
//!     ↓
//! presentation::Presenter (UserAction → Intent)
//!     ↓
//! workflow::GradingController (WorkflowState / SubmissionPipeline)
//!     ↓
//! services (GradingService / ResultStore / 统计)
//!     ↓
//! infrastructure (CaptureSource)
//! ```

pub mod batch_processor;
pub mod sheet_processor;

// 重新导出主要类型
pub use batch_processor::App;
pub use sheet_processor::{load_student_sheets, RunStats, StudentSheet};

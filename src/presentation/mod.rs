//! 展示层（Presentation Layer）
//!
//! 只消费快照、产出渲染指令和意图，不直接修改流程状态，也不访问网络。

pub mod notifications;
pub mod presenter;

pub use notifications::{Notification, NotificationCenter, NotificationLevel, NOTIFICATION_LIFETIME};
pub use presenter::{
    ChartData, ControlStates, DetailRow, Presenter, RenderPlan, ResultCard, StepStatus,
    StudentScore, TableRow, UserAction, TABLE_COLUMNS,
};

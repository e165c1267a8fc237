//! 基础设施层（Infrastructure Layer）
//!
//! 持有稀缺资源（摄像头设备、视频流连接），只向上层暴露采集能力。

pub mod capture;

pub use capture::{create_source, CaptureSource, SourceState};

//! 图像采集源
//!
//! 本机摄像头和网络摄像头结构完全不同，这里把它们收敛到同一个
//! [`CaptureSource`] 能力接口之后：
//!
//! ```text
//! Idle → Starting → Ready ⇄ Capturing → … → Stopped
//!            └── 失败 ──────────────────────→ Stopped
//! ```
//!
//! `Stopped` 只对当前实例是终态，下一次激活需要新建实例。
//! 生命周期方法必须由调用方按顺序调用；`stop()` 可以在任何时刻调用，
//! 拍照过程中被停止时，拍到的帧会以 [`CaptureError::Discarded`] 丢弃。

mod device;
mod ffmpeg;
mod mjpeg;
mod network;

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use crate::config::Config;
use crate::error::CaptureError;
use crate::models::{CaptureFrame, CaptureMode};
use crate::utils::lock;

pub use device::{CameraDevice, CameraProvider, DeviceCameraSource};
pub use ffmpeg::FfmpegCameraProvider;
pub use mjpeg::{rasterize_and_encode, MjpegFrameReader};
pub use network::{normalize_stream_url, NetworkCameraSource};

/// 采集源状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Idle,
    Starting,
    Ready,
    Capturing,
    Stopped,
}

/// 采集能力接口
pub trait CaptureSource: Send + Sync {
    /// 对应的采集方式
    fn mode(&self) -> CaptureMode;

    /// 当前状态
    fn state(&self) -> SourceState;

    /// 开始采集（申请设备或打开视频流）
    fn start(&self) -> BoxFuture<'_, Result<(), CaptureError>>;

    /// 拍摄一张静态图像
    fn capture_still(&self) -> BoxFuture<'_, Result<CaptureFrame, CaptureError>>;

    /// 释放资源，幂等，任何状态下都可以调用
    fn stop(&self);
}

/// 按配置创建采集源，文件上传模式没有采集源
pub fn create_source(mode: CaptureMode, config: &Config) -> Option<Arc<dyn CaptureSource>> {
    match mode {
        CaptureMode::FileUpload => None,
        CaptureMode::DeviceCamera => {
            let provider = FfmpegCameraProvider::new(&config.camera_device, &config.ffmpeg_path);
            Some(Arc::new(DeviceCameraSource::new(Arc::new(provider))))
        }
        CaptureMode::NetworkCamera => Some(Arc::new(NetworkCameraSource::new(
            config.network_camera_url.clone(),
            config.jpeg_quality,
        ))),
    }
}

/// 采集源内部共用的状态单元
#[derive(Debug)]
pub(crate) struct StateCell(Mutex<SourceState>);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(Mutex::new(SourceState::Idle))
    }

    pub(crate) fn get(&self) -> SourceState {
        *lock(&self.0)
    }

    pub(crate) fn set(&self, state: SourceState) {
        *lock(&self.0) = state;
    }

    /// 从 `from` 切换到 `to`，当前状态不符时返回 false
    pub(crate) fn transition(&self, from: SourceState, to: SourceState) -> bool {
        let mut guard = lock(&self.0);
        if *guard == from {
            *guard = to;
            true
        } else {
            false
        }
    }

    /// 拍照结束后回到 Ready；期间已被停止则返回 false
    pub(crate) fn finish_capture(&self) -> bool {
        self.transition(SourceState::Capturing, SourceState::Ready)
    }
}

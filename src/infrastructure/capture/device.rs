//! 本机摄像头采集源
//!
//! 设备访问通过 [`CameraProvider`] / [`CameraDevice`] 抽象，
//! 拍照直接使用设备自带的静态图像采集能力。

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::{CaptureSource, SourceState, StateCell};
use crate::error::CaptureError;
use crate::models::{CaptureFrame, CaptureMode};

/// 已启用的摄像头设备
pub trait CameraDevice: Send {
    /// 调用设备原生的拍照能力，返回 JPEG 数据
    fn take_photo(&mut self) -> BoxFuture<'_, Result<Vec<u8>, CaptureError>>;

    /// 释放设备
    fn release(&mut self);
}

/// 摄像头设备的提供者
pub trait CameraProvider: Send + Sync {
    /// 当前运行环境是否具备静态图像采集能力
    fn supports_still_capture(&self) -> bool;

    /// 申请使用设备
    fn open(&self) -> BoxFuture<'_, Result<Box<dyn CameraDevice>, CaptureError>>;
}

/// 本机摄像头采集源
pub struct DeviceCameraSource {
    provider: Arc<dyn CameraProvider>,
    state: StateCell,
    device: AsyncMutex<Option<Box<dyn CameraDevice>>>,
}

impl DeviceCameraSource {
    pub fn new(provider: Arc<dyn CameraProvider>) -> Self {
        Self {
            provider,
            state: StateCell::new(),
            device: AsyncMutex::new(None),
        }
    }

    async fn start_inner(&self) -> Result<(), CaptureError> {
        if !self.state.transition(SourceState::Idle, SourceState::Starting) {
            return Err(CaptureError::InvalidState(format!(
                "start() 只能在 Idle 状态调用，当前为 {:?}",
                self.state.get()
            )));
        }

        if !self.provider.supports_still_capture() {
            self.state.set(SourceState::Stopped);
            warn!("⚠️ 当前环境不支持静态图像采集");
            return Err(CaptureError::UnsupportedEnvironment(
                "缺少静态图像采集能力".to_string(),
            ));
        }

        debug!("正在申请摄像头访问权限...");
        let mut device = match self.provider.open().await {
            Ok(device) => device,
            Err(e) => {
                self.state.set(SourceState::Stopped);
                warn!("⚠️ 摄像头启动失败: {}", e);
                return Err(e);
            }
        };

        // 等待授权期间被 stop()
        let mut slot = self.device.lock().await;
        if !self.state.transition(SourceState::Starting, SourceState::Ready) {
            device.release();
            debug!("摄像头在启动过程中被停止，已释放设备");
            return Err(CaptureError::Discarded);
        }
        *slot = Some(device);
        info!("✓ 本机摄像头已就绪");
        Ok(())
    }

    async fn capture_inner(&self) -> Result<CaptureFrame, CaptureError> {
        if !self.state.transition(SourceState::Ready, SourceState::Capturing) {
            return Err(CaptureError::NoActiveStream);
        }

        let mut guard = self.device.lock().await;
        let result = match guard.as_mut() {
            Some(device) => device.take_photo().await,
            None => Err(CaptureError::NoActiveStream),
        };

        if !self.state.finish_capture() {
            if let Some(mut device) = guard.take() {
                device.release();
            }
            debug!("拍照期间采集源被停止，丢弃本次结果");
            return Err(CaptureError::Discarded);
        }

        let bytes = result?;
        if bytes.is_empty() {
            return Err(CaptureError::EncodingFailed("设备返回了空图像".to_string()));
        }
        debug!("拍照完成，大小: {} 字节", bytes.len());
        Ok(CaptureFrame::jpeg(bytes, CaptureMode::DeviceCamera))
    }
}

impl CaptureSource for DeviceCameraSource {
    fn mode(&self) -> CaptureMode {
        CaptureMode::DeviceCamera
    }

    fn state(&self) -> SourceState {
        self.state.get()
    }

    fn start(&self) -> BoxFuture<'_, Result<(), CaptureError>> {
        Box::pin(self.start_inner())
    }

    fn capture_still(&self) -> BoxFuture<'_, Result<CaptureFrame, CaptureError>> {
        Box::pin(self.capture_inner())
    }

    fn stop(&self) {
        let previous = self.state.get();
        self.state.set(SourceState::Stopped);

        // 拍照中的锁由 capture_inner 持有，设备会在那里释放
        if let Ok(mut guard) = self.device.try_lock() {
            if let Some(mut device) = guard.take() {
                device.release();
                info!("⏹ 本机摄像头已停止");
            }
        }

        if previous != SourceState::Stopped {
            debug!("采集源状态: {:?} → Stopped", previous);
        }
    }
}

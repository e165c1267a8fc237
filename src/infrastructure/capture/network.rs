//! 网络摄像头采集源
//!
//! 摄像头通过 HTTP 输出连续的 MJPEG 视频流（常见的 `http://<ip>:8080/video`）。
//! 视频流没有原生的拍照能力，所以拍照时取流中最新的一帧，
//! 经 [`rasterize_and_encode`] 重新编码后作为静态图像。

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::mjpeg::{rasterize_and_encode, MjpegFrameReader};
use super::{CaptureSource, SourceState, StateCell};
use crate::error::CaptureError;
use crate::models::{CaptureFrame, CaptureMode};

/// 约定的视频流路径
const VIDEO_SUFFIX: &str = "/video";

/// 网络摄像头采集源
pub struct NetworkCameraSource {
    base_url: String,
    jpeg_quality: u8,
    client: reqwest::Client,
    state: StateCell,
    stream: AsyncMutex<Option<LiveStream>>,
}

struct LiveStream {
    url: String,
    response: reqwest::Response,
    reader: MjpegFrameReader,
}

impl NetworkCameraSource {
    /// # 参数
    /// - `base_url`: 用户填写的摄像头地址，缺少 `/video` 时自动补全
    /// - `jpeg_quality`: 重新编码的 JPEG 质量
    pub fn new(base_url: impl Into<String>, jpeg_quality: u8) -> Self {
        // 视频流是长连接，只限制建立连接的时间
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                warn!("创建 HTTP 客户端失败，使用默认配置: {}", e);
                reqwest::Client::new()
            });

        Self {
            base_url: base_url.into(),
            jpeg_quality,
            client,
            state: StateCell::new(),
            stream: AsyncMutex::new(None),
        }
    }

    async fn start_inner(&self) -> Result<(), CaptureError> {
        if !self.state.transition(SourceState::Idle, SourceState::Starting) {
            return Err(CaptureError::InvalidState(format!(
                "start() 只能在 Idle 状态调用，当前为 {:?}",
                self.state.get()
            )));
        }

        let url = match normalize_stream_url(&self.base_url) {
            Ok(url) => url,
            Err(e) => {
                self.state.set(SourceState::Stopped);
                warn!("⚠️ 网络摄像头地址无效: '{}'", self.base_url);
                return Err(e);
            }
        };

        info!("📡 正在连接网络摄像头: {}", url);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                self.state.set(SourceState::Stopped);
                warn!("⚠️ 无法连接网络摄像头: {}", e);
                return Err(CaptureError::StreamUnreachable {
                    url,
                    reason: e.to_string(),
                });
            }
        };

        if !response.status().is_success() {
            self.state.set(SourceState::Stopped);
            let status = response.status();
            warn!("⚠️ 网络摄像头返回 HTTP {}", status);
            return Err(CaptureError::StreamUnreachable {
                url,
                reason: format!("HTTP {}", status),
            });
        }

        let mut slot = self.stream.lock().await;
        if !self.state.transition(SourceState::Starting, SourceState::Ready) {
            debug!("网络摄像头在连接过程中被停止，断开视频流");
            return Err(CaptureError::Discarded);
        }
        *slot = Some(LiveStream {
            url: url.clone(),
            response,
            reader: MjpegFrameReader::new(),
        });

        info!("✓ 网络摄像头已就绪: {}", url);
        Ok(())
    }

    async fn capture_inner(&self) -> Result<CaptureFrame, CaptureError> {
        if !self.state.transition(SourceState::Ready, SourceState::Capturing) {
            return Err(CaptureError::NoActiveStream);
        }

        let mut guard = self.stream.lock().await;
        let result = match guard.as_mut() {
            Some(stream) => read_latest_frame(stream).await,
            None => Err(CaptureError::NoActiveStream),
        };

        if !self.state.finish_capture() {
            guard.take();
            debug!("拍照期间采集源被停止，丢弃本次结果");
            return Err(CaptureError::Discarded);
        }
        drop(guard);

        let raw = result?;
        let encoded = rasterize_and_encode(&raw, self.jpeg_quality)?;
        debug!(
            "视频帧已重新编码: {} → {} 字节 (质量 {})",
            raw.len(),
            encoded.len(),
            self.jpeg_quality
        );
        Ok(CaptureFrame::jpeg(encoded, CaptureMode::NetworkCamera))
    }
}

impl CaptureSource for NetworkCameraSource {
    fn mode(&self) -> CaptureMode {
        CaptureMode::NetworkCamera
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
        self.state.set(SourceState::Stopped);
        if let Ok(mut guard) = self.stream.try_lock() {
            if let Some(stream) = guard.take() {
                info!("⏹ 已断开网络摄像头: {}", stream.url);
            }
        }
    }
}

/// 先消费已经到达的数据，取其中最新的一帧；没有完整帧时再等待
async fn read_latest_frame(stream: &mut LiveStream) -> Result<Vec<u8>, CaptureError> {
    while let Some(next) = stream.response.chunk().now_or_never() {
        match next {
            Ok(Some(chunk)) => stream.reader.push(&chunk),
            Ok(None) => break,
            Err(e) => return Err(stream_error(&stream.url, e)),
        }
    }
    if let Some(frame) = stream.reader.latest_frame() {
        return Ok(frame);
    }

    loop {
        match stream.response.chunk().await {
            Ok(Some(chunk)) => {
                stream.reader.push(&chunk);
                if let Some(frame) = stream.reader.latest_frame() {
                    return Ok(frame);
                }
            }
            Ok(None) => {
                warn!("⚠️ 网络摄像头视频流已结束: {}", stream.url);
                return Err(CaptureError::NoActiveStream);
            }
            Err(e) => return Err(stream_error(&stream.url, e)),
        }
    }
}

fn stream_error(url: &str, e: reqwest::Error) -> CaptureError {
    CaptureError::StreamUnreachable {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

/// 规范化网络摄像头地址
///
/// - 空地址或无法解析的地址返回 `InvalidAddress`
/// - 没有协议时补 `http://`
/// - 不以 `/video` 结尾时追加 `/video`
pub fn normalize_stream_url(raw: &str) -> Result<String, CaptureError> {
    let invalid = || CaptureError::InvalidAddress(raw.to_string());

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let (scheme, rest) = trimmed.split_once("://").unwrap_or(("http", trimmed));
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return Err(invalid());
    }

    let base = format!("{}://{}", scheme.to_lowercase(), rest);
    let normalized = if base.ends_with(VIDEO_SUFFIX) {
        base
    } else {
        format!("{}{}", base, VIDEO_SUFFIX)
    };

    let parsed = reqwest::Url::parse(&normalized).map_err(|_| invalid())?;
    let has_host = parsed.host_str().map(|h| !h.is_empty()).unwrap_or(false);
    if !matches!(parsed.scheme(), "http" | "https") || !has_host {
        return Err(invalid());
    }

    Ok(normalized)
}

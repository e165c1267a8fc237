//! 基于 ffmpeg + V4L2 的本机摄像头
//!
//! 打开设备文件确认设备存在且可读，拍照时由 ffmpeg 自行打开设备读取一帧并输出 JPEG。
//! 持有的设备句柄只标记设备处于启用状态，不能阻止其他进程同时使用摄像头。

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use futures::future::BoxFuture;
use tokio::fs::File;
use tokio::process::Command;
use tracing::{debug, warn};

use super::device::{CameraDevice, CameraProvider};
use crate::error::CaptureError;

/// ffmpeg 摄像头提供者
pub struct FfmpegCameraProvider {
    device_path: PathBuf,
    ffmpeg_path: String,
}

impl FfmpegCameraProvider {
    pub fn new(device_path: impl Into<PathBuf>, ffmpeg_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

impl CameraProvider for FfmpegCameraProvider {
    fn supports_still_capture(&self) -> bool {
        binary_available(&self.ffmpeg_path)
    }

    fn open(&self) -> BoxFuture<'_, Result<Box<dyn CameraDevice>, CaptureError>> {
        Box::pin(async move {
            let device_name = self.device_path.display().to_string();
            debug!("打开摄像头设备: {}", device_name);

            let handle = File::open(&self.device_path).await.map_err(|e| match e.kind() {
                ErrorKind::PermissionDenied => CaptureError::PermissionDenied(format!(
                    "没有访问 {} 的权限",
                    device_name
                )),
                ErrorKind::NotFound => {
                    CaptureError::DeviceUnavailable(format!("设备不存在: {}", device_name))
                }
                _ => CaptureError::DeviceUnavailable(format!("{}: {}", device_name, e)),
            })?;

            Ok(Box::new(FfmpegCameraDevice {
                device_path: self.device_path.clone(),
                ffmpeg_path: self.ffmpeg_path.clone(),
                handle: Some(handle),
            }) as Box<dyn CameraDevice>)
        })
    }
}

struct FfmpegCameraDevice {
    device_path: PathBuf,
    ffmpeg_path: String,
    handle: Option<File>,
}

impl CameraDevice for FfmpegCameraDevice {
    fn take_photo(&mut self) -> BoxFuture<'_, Result<Vec<u8>, CaptureError>> {
        Box::pin(async move {
            if self.handle.is_none() {
                return Err(CaptureError::NoActiveStream);
            }

            let child = Command::new(&self.ffmpeg_path)
                .args(["-f", "v4l2", "-i"])
                .arg(&self.device_path)
                .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "mjpeg"])
                .args(["-loglevel", "error", "-y", "-"])
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| {
                    CaptureError::UnsupportedEnvironment(format!("无法启动 ffmpeg: {}", e))
                })?;

            let output = child
                .wait_with_output()
                .await
                .map_err(|e| CaptureError::DeviceUnavailable(format!("ffmpeg 执行失败: {}", e)))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!("ffmpeg 拍照失败: {}", stderr.trim());
                return Err(CaptureError::DeviceUnavailable(stderr.trim().to_string()));
            }

            if output.stdout.is_empty() {
                return Err(CaptureError::EncodingFailed(
                    "ffmpeg 没有输出图像".to_string(),
                ));
            }

            Ok(output.stdout)
        })
    }

    fn release(&mut self) {
        if self.handle.take().is_some() {
            debug!("已释放摄像头设备: {}", self.device_path.display());
        }
    }
}

/// 检查可执行文件是否存在（绝对/相对路径或 PATH 中的名称）
fn binary_available(program: &str) -> bool {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file();
    }

    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                let candidate = dir.join(program);
                candidate.is_file() || candidate.with_extension("exe").is_file()
            })
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_not_available() {
        assert!(!binary_available("definitely-not-a-real-ffmpeg-binary"));
        assert!(!binary_available("/nonexistent/dir/ffmpeg"));
    }

    #[tokio::test]
    async fn test_missing_device_is_unavailable() {
        let provider = FfmpegCameraProvider::new("/dev/definitely-no-video-device", "ffmpeg");
        let err = provider.open().await.err().unwrap();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_released_device_no_longer_takes_photos() {
        let device_file = tempfile::NamedTempFile::new().unwrap();
        let provider = FfmpegCameraProvider::new(device_file.path(), "ffmpeg");

        let mut device = provider.open().await.unwrap();
        device.release();
        device.release();

        let err = device.take_photo().await.unwrap_err();
        assert_eq!(err, CaptureError::NoActiveStream);
    }

    #[tokio::test]
    #[ignore] // 需要真实摄像头和 ffmpeg：cargo test -- --ignored
    async fn test_take_photo_from_real_camera() {
        let provider = FfmpegCameraProvider::new("/dev/video0", "ffmpeg");
        assert!(provider.supports_still_capture());
        let mut device = provider.open().await.expect("打开摄像头失败");
        let bytes = device.take_photo().await.expect("拍照失败");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        device.release();
    }
}

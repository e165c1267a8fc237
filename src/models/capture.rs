use serde::{Deserialize, Serialize};

/// 图像采集方式
///
/// 同一时刻只有一种处于激活状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// 文件上传
    #[default]
    FileUpload,
    /// 本机摄像头
    DeviceCamera,
    /// 网络摄像头（HTTP 视频流）
    NetworkCamera,
}

impl CaptureMode {
    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            CaptureMode::FileUpload => "file_upload",
            CaptureMode::DeviceCamera => "device_camera",
            CaptureMode::NetworkCamera => "network_camera",
        }
    }

    /// 是否需要启动采集源
    pub fn is_camera(self) -> bool {
        !matches!(self, CaptureMode::FileUpload)
    }

    /// 从字符串解析（兼容页面上的旧名称）
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "file_upload" | "upload" | "file" | "manual" => Some(CaptureMode::FileUpload),
            "device_camera" | "device" | "webcam" | "camera" => Some(CaptureMode::DeviceCamera),
            "network_camera" | "network" | "ipcam" | "ip_camera" => {
                Some(CaptureMode::NetworkCamera)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 一张采集到的静态图像
///
/// 只存在于采集和提交之间，提交结束后即丢弃
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFrame {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub source_mode: CaptureMode,
}

impl CaptureFrame {
    /// 创建 JPEG 帧
    pub fn jpeg(bytes: Vec<u8>, source_mode: CaptureMode) -> Self {
        Self {
            bytes,
            mime_type: "image/jpeg".to_string(),
            source_mode,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_mode_from_str_accepts_page_aliases() {
        assert_eq!(CaptureMode::from_str("webcam"), Some(CaptureMode::DeviceCamera));
        assert_eq!(CaptureMode::from_str(" IPCAM "), Some(CaptureMode::NetworkCamera));
        assert_eq!(CaptureMode::from_str("upload"), Some(CaptureMode::FileUpload));
        assert_eq!(CaptureMode::from_str("scanner"), None);
    }

    #[test]
    fn test_default_mode_is_file_upload() {
        assert_eq!(CaptureMode::default(), CaptureMode::FileUpload);
        assert!(!CaptureMode::FileUpload.is_camera());
        assert!(CaptureMode::NetworkCamera.is_camera());
    }
}

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::CaptureMode;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 评分服务地址
    pub service_base_url: String,
    /// 答案图片路径
    pub answer_key_path: String,
    /// 学生答题卡所在目录（文件上传模式）
    pub student_sheet_folder: String,
    /// 采集方式
    pub capture_mode: CaptureMode,
    /// 网络摄像头地址，缺少 /video 时自动补全
    pub network_camera_url: String,
    /// 本机摄像头设备
    pub camera_device: String,
    /// ffmpeg 可执行文件
    pub ffmpeg_path: String,
    /// 摄像头模式下拍摄的答题卡数量
    pub capture_count: usize,
    /// 两次拍摄之间的间隔（毫秒）
    pub capture_interval_ms: u64,
    /// 未填写姓名时使用的学生名
    pub default_student_name: String,
    /// 网络摄像头重新编码的 JPEG 质量 (1-100)
    pub jpeg_quality: u8,
    /// 通知显示时长（秒）
    pub notification_lifetime_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 导出 CSV 的路径，为空则不导出
    pub export_csv_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_base_url: "http://127.0.0.1:5000".to_string(),
            answer_key_path: "answer_key.png".to_string(),
            student_sheet_folder: "student_sheets".to_string(),
            capture_mode: CaptureMode::FileUpload,
            network_camera_url: String::new(),
            camera_device: "/dev/video0".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            capture_count: 1,
            capture_interval_ms: 3000,
            default_student_name: "Unknown".to_string(),
            jpeg_quality: 95,
            notification_lifetime_secs: 5,
            verbose_logging: false,
            output_log_file: "grading_log.txt".to_string(),
            export_csv_path: None,
        }
    }
}

impl Config {
    /// 从默认值和环境变量构建配置
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载配置，再叠加环境变量
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            })?;
        config.with_env_overrides()
    }

    fn with_env_overrides(self) -> Result<Self, ConfigError> {
        let capture_mode = match env_string("GRADER_CAPTURE_MODE") {
            Some(value) => {
                CaptureMode::from_str(&value).ok_or_else(|| ConfigError::EnvVarParseFailed {
                    var_name: "GRADER_CAPTURE_MODE".to_string(),
                    value: value.clone(),
                    expected_type: "CaptureMode".to_string(),
                })?
            }
            None => self.capture_mode,
        };

        Ok(Self {
            service_base_url: env_string("GRADER_SERVICE_BASE_URL")
                .unwrap_or(self.service_base_url),
            answer_key_path: env_string("GRADER_ANSWER_KEY_PATH").unwrap_or(self.answer_key_path),
            student_sheet_folder: env_string("GRADER_STUDENT_SHEET_FOLDER")
                .unwrap_or(self.student_sheet_folder),
            capture_mode,
            network_camera_url: env_string("GRADER_NETWORK_CAMERA_URL")
                .unwrap_or(self.network_camera_url),
            camera_device: env_string("GRADER_CAMERA_DEVICE").unwrap_or(self.camera_device),
            ffmpeg_path: env_string("GRADER_FFMPEG_PATH").unwrap_or(self.ffmpeg_path),
            capture_count: env_parse("GRADER_CAPTURE_COUNT", "usize")?
                .unwrap_or(self.capture_count),
            capture_interval_ms: env_parse("GRADER_CAPTURE_INTERVAL_MS", "u64")?
                .unwrap_or(self.capture_interval_ms),
            default_student_name: env_string("GRADER_DEFAULT_STUDENT_NAME")
                .unwrap_or(self.default_student_name),
            jpeg_quality: env_parse("GRADER_JPEG_QUALITY", "u8")?.unwrap_or(self.jpeg_quality),
            notification_lifetime_secs: env_parse("GRADER_NOTIFICATION_LIFETIME_SECS", "u64")?
                .unwrap_or(self.notification_lifetime_secs),
            verbose_logging: env_parse("GRADER_VERBOSE_LOGGING", "bool")?
                .unwrap_or(self.verbose_logging),
            output_log_file: env_string("GRADER_OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
            export_csv_path: env_string("GRADER_EXPORT_CSV_PATH").or(self.export_csv_path),
        })
    }
}

fn env_string(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(
    var_name: &str,
    expected_type: &str,
) -> Result<Option<T>, ConfigError> {
    match env_string(var_name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        None => Ok(None),
    }
}

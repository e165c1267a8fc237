use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 百分比校验容差
const PERCENTAGE_TOLERANCE: f64 = 0.01;

/// 识别方式：实时（摄像头）或手动上传
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    Realtime,
    Manual,
}

impl DetectionMode {
    /// 服务端会返回 realtime / webcam / manual，前两者都算实时
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "realtime" | "webcam" => DetectionMode::Realtime,
            _ => DetectionMode::Manual,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DetectionMode::Realtime => "realtime",
            DetectionMode::Manual => "manual",
        }
    }
}

impl std::fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 单题比对结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDetail {
    #[serde(deserialize_with = "deserialize_lenient_string")]
    pub question: String,
    #[serde(deserialize_with = "deserialize_lenient_string")]
    pub correct_answer: String,
    #[serde(deserialize_with = "deserialize_lenient_string")]
    pub student_answer: String,
    pub is_correct: bool,
}

/// 一次答题卡评分的结果，写入结果集后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub student_name: String,
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    pub mode: DetectionMode,
    pub details: Vec<AnswerDetail>,
    /// 客户端接受结果的本地时间
    pub graded_at: NaiveDateTime,
}

impl ResultRecord {
    /// 从服务响应构造并校验
    ///
    /// # 参数
    /// - `response`: 服务端返回的评分结果
    /// - `fallback_name`: 响应中没有学生姓名时使用
    /// - `fallback_mode`: 响应中没有 mode 字段时使用
    ///
    /// # 返回
    /// 不满足 `score <= total` 或百分比与分数不一致时返回错误描述
    pub fn from_response(
        response: GradeResponse,
        fallback_name: &str,
        fallback_mode: DetectionMode,
    ) -> Result<Self, String> {
        if response.score > response.total {
            return Err(format!(
                "得分 {} 大于总分 {}",
                response.score, response.total
            ));
        }

        let expected = expected_percentage(response.score, response.total);
        if !response.percentage.is_finite()
            || (response.percentage - expected).abs() > PERCENTAGE_TOLERANCE
        {
            return Err(format!(
                "百分比 {} 与得分 {}/{} 不一致",
                response.percentage, response.score, response.total
            ));
        }

        let student_name = response
            .student_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| fallback_name.to_string());

        let mode = response
            .mode
            .as_deref()
            .map(DetectionMode::from_wire)
            .unwrap_or(fallback_mode);

        Ok(Self {
            student_name,
            score: response.score,
            total: response.total,
            percentage: response.percentage,
            mode,
            details: response.details,
            graded_at: chrono::Local::now().naive_local(),
        })
    }

    /// 结果卡片上的分数文本，例如 `8/10 (80.00%)`
    pub fn score_text(&self) -> String {
        format!("{}/{} ({:.2}%)", self.score, self.total, self.percentage)
    }
}

/// 总分为 0 时百分比按 0 处理
pub fn expected_percentage(score: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * f64::from(score) / f64::from(total)
    }
}

// ========== 服务端响应结构 ==========

/// `POST /upload-answer-key` 的响应
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerKeyResponse {
    pub session_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /upload-student-sheet` 和 `POST /process-webcam-image` 的响应
#[derive(Debug, Clone, Deserialize)]
pub struct GradeResponse {
    #[serde(default)]
    pub student_name: Option<String>,
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    #[serde(default)]
    pub details: Vec<AnswerDetail>,
    #[serde(default)]
    pub mode: Option<String>,
}

/// 非 2xx 响应的错误体
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// 题号和选项可能是数字、字符串或 null
fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct LenientVisitor;

    impl<'de> Visitor<'de> for LenientVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, number or null")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(String::new())
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(LenientVisitor)
}

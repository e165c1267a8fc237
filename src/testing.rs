//! 单元测试共用的假实现和本地 HTTP 服务

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::{CaptureError, SubmissionError};
use crate::infrastructure::capture::{CameraDevice, CameraProvider};
use crate::models::{
    AnswerDetail, AnswerKeyResponse, DetectionMode, GradeResponse, ResultRecord,
};
use crate::services::{GradingService, SheetUpload, UploadFile};
use crate::utils::lock;

// ========== 摄像头 ==========

pub(crate) const FAKE_PHOTO: [u8; 5] = [0xFF, 0xD8, 0x01, 0xFF, 0xD9];

pub(crate) struct FakeProvider {
    pub supported: bool,
    pub open_error: Option<CaptureError>,
    pub releases: Arc<AtomicUsize>,
    /// 设置后 take_photo 会等待通知
    pub gate: Option<Arc<Notify>>,
}

impl FakeProvider {
    pub fn working() -> Self {
        Self {
            supported: true,
            open_error: None,
            releases: Arc::new(AtomicUsize::new(0)),
            gate: None,
        }
    }
}

impl CameraProvider for FakeProvider {
    fn supports_still_capture(&self) -> bool {
        self.supported
    }

    fn open(&self) -> BoxFuture<'_, Result<Box<dyn CameraDevice>, CaptureError>> {
        Box::pin(async move {
            if let Some(err) = &self.open_error {
                return Err(err.clone());
            }
            Ok(Box::new(FakeDevice {
                releases: self.releases.clone(),
                gate: self.gate.clone(),
                released: false,
            }) as Box<dyn CameraDevice>)
        })
    }
}

struct FakeDevice {
    releases: Arc<AtomicUsize>,
    gate: Option<Arc<Notify>>,
    released: bool,
}

impl CameraDevice for FakeDevice {
    fn take_photo(&mut self) -> BoxFuture<'_, Result<Vec<u8>, CaptureError>> {
        Box::pin(async move {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(FAKE_PHOTO.to_vec())
        })
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// 生成一张渐变色 JPEG
pub(crate) fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    });
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, 90)
        .encode_image(&img)
        .unwrap();
    bytes
}

// ========== 本地 HTTP 服务 ==========

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// 读取完整的 HTTP 请求（请求头 + Content-Length 或 chunked 请求体）
async fn read_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 8192];

    let header_end = loop {
        let n = stream.read(&mut buf).await.unwrap_or(0);
        if n == 0 {
            return String::from_utf8_lossy(&data).into_owned();
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = find_subslice(&data, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok());
    let chunked = head.contains("transfer-encoding: chunked");

    loop {
        let done = match content_length {
            Some(len) => data.len() - header_end >= len,
            None if chunked => data.ends_with(b"0\r\n\r\n"),
            None => true,
        };
        if done {
            break;
        }
        let n = stream.read(&mut buf).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }

    String::from_utf8_lossy(&data).into_owned()
}

/// 只响应一次的 JSON 服务，返回基础地址和收到的原始请求
pub(crate) async fn serve_once(status: u16, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let body = body.to_string();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        let response = format!(
            "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        request
    });

    (format!("http://{}", addr), handle)
}

/// 只返回状态码的服务
pub(crate) async fn serve_status(status: u16) -> String {
    let (base_url, _handle) = serve_once(status, "").await;
    base_url
}

/// 输出若干帧后关闭连接的 MJPEG 视频流
pub(crate) async fn serve_mjpeg(frames: Vec<Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        assert!(request.starts_with("GET /video "));

        let mut payload = Vec::new();
        payload.extend_from_slice(
            b"HTTP/1.1 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary=frame\r\nConnection: close\r\n\r\n",
        );
        for frame in &frames {
            payload.extend_from_slice(
                format!(
                    "--frame\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
                    frame.len()
                )
                .as_bytes(),
            );
            payload.extend_from_slice(frame);
            payload.extend_from_slice(b"\r\n");
        }
        stream.write_all(&payload).await.unwrap();
        stream.shutdown().await.ok();
    });

    format!("http://{}", addr)
}

// ========== 评分服务 ==========

pub(crate) fn sample_grade(name: &str, score: u32, total: u32) -> GradeResponse {
    GradeResponse {
        student_name: Some(name.to_string()),
        score,
        total,
        percentage: crate::models::expected_percentage(score, total),
        details: vec![AnswerDetail {
            question: "1".to_string(),
            correct_answer: "A".to_string(),
            student_answer: "A".to_string(),
            is_correct: true,
        }],
        mode: None,
    }
}

pub(crate) fn sample_record(
    name: &str,
    score: u32,
    total: u32,
    mode: DetectionMode,
) -> ResultRecord {
    ResultRecord::from_response(sample_grade(name, score, total), name, mode).unwrap()
}

/// 记录下来的一次服务调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FakeCall {
    pub endpoint: &'static str,
    pub session_id: Option<String>,
    pub student_name: Option<String>,
    pub file_name: String,
}

pub(crate) struct FakeGradingService {
    pub session_id: String,
    pub grade: GradeResponse,
    /// 设置后所有调用都返回 ServiceError
    pub fail_with: Option<(u16, String)>,
    /// 设置后每次调用都会等待通知
    pub gate: Option<Arc<Notify>>,
    pub calls: Arc<Mutex<Vec<FakeCall>>>,
}

impl FakeGradingService {
    pub fn new() -> Self {
        Self {
            session_id: "abc123".to_string(),
            grade: sample_grade("Alice", 8, 10),
            fail_with: None,
            gate: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn respond<T>(&self, call: FakeCall, ok: T) -> Result<T, SubmissionError> {
        lock(&self.calls).push(call);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.fail_with {
            Some((status, message)) => Err(SubmissionError::ServiceError {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(ok),
        }
    }
}

impl GradingService for FakeGradingService {
    fn upload_answer_key(
        &self,
        file: UploadFile,
    ) -> BoxFuture<'_, Result<AnswerKeyResponse, SubmissionError>> {
        let call = FakeCall {
            endpoint: "upload-answer-key",
            session_id: None,
            student_name: None,
            file_name: file.file_name,
        };
        let response = AnswerKeyResponse {
            session_id: self.session_id.clone(),
            message: None,
        };
        Box::pin(self.respond(call, response))
    }

    fn upload_student_sheet(
        &self,
        sheet: SheetUpload,
    ) -> BoxFuture<'_, Result<GradeResponse, SubmissionError>> {
        let call = FakeCall {
            endpoint: "upload-student-sheet",
            session_id: Some(sheet.session_id),
            student_name: Some(sheet.student_name),
            file_name: sheet.file.file_name,
        };
        Box::pin(self.respond(call, self.grade.clone()))
    }

    fn process_webcam_image(
        &self,
        sheet: SheetUpload,
    ) -> BoxFuture<'_, Result<GradeResponse, SubmissionError>> {
        let call = FakeCall {
            endpoint: "process-webcam-image",
            session_id: Some(sheet.session_id),
            student_name: Some(sheet.student_name),
            file_name: sheet.file.file_name,
        };
        let mut grade = self.grade.clone();
        grade.mode = Some("webcam".to_string());
        Box::pin(self.respond(call, grade))
    }
}

//! MJPEG 流解析与静态帧编码
//!
//! 网络摄像头输出的是 `multipart/x-mixed-replace` 连续流，没有"拍照"原语。
//! 这里从字节流中切出完整的 JPEG 帧，再栅格化为原始分辨率的 RGB 画面，
//! 重新编码为指定质量的 JPEG。
//!
//! 分段头带 `Content-Length` 时按长度切帧（帧内可能有 EXIF 缩略图自带的 EOI），
//! 否则退回到扫描 EOI 标记。

use image::codecs::jpeg::JpegEncoder;

use crate::error::CaptureError;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// 缓冲区上限，超过后丢弃旧数据
const MAX_BUFFER_BYTES: usize = 16 * 1024 * 1024;

/// 向前查找分段头的最大字节数
const MAX_PART_HEADER_BYTES: usize = 1024;

/// 从 MJPEG 字节流中切分 JPEG 帧
#[derive(Debug, Default)]
pub struct MjpegFrameReader {
    buffer: Vec<u8>,
}

impl MjpegFrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加收到的数据
    pub fn push(&mut self, chunk: &[u8]) {
        if self.buffer.len() + chunk.len() > MAX_BUFFER_BYTES {
            self.buffer.clear();
        }
        self.buffer.extend_from_slice(chunk);
    }

    /// 取出下一帧完整的 JPEG，数据不足时返回 None
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let Some(start) = find_marker(&self.buffer, &SOI, 0) else {
            // 保留最后一个分段边界之后的内容（可能是还没收到帧数据的分段头），
            // 没有边界时只保留最后一个字节，可能是被拆开的 0xFF
            let keep_from = last_boundary(&self.buffer)
                .unwrap_or_else(|| self.buffer.len().saturating_sub(1));
            self.buffer.drain(..keep_from);
            return None;
        };

        let frame_end = match part_content_length(&self.buffer[..start]) {
            Some(length) if length >= SOI.len() + EOI.len() => {
                let frame_end = start + length;
                if frame_end > self.buffer.len() {
                    return None;
                }
                frame_end
            }
            _ => find_marker(&self.buffer, &EOI, start + SOI.len())? + EOI.len(),
        };
        let frame = self.buffer[start..frame_end].to_vec();
        self.buffer.drain(..frame_end);
        Some(frame)
    }

    /// 取出缓冲区中最新的一帧，丢弃更早的帧
    pub fn latest_frame(&mut self) -> Option<Vec<u8>> {
        let mut latest = None;
        while let Some(frame) = self.next_frame() {
            latest = Some(frame);
        }
        latest
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

fn find_marker(haystack: &[u8], marker: &[u8; 2], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(marker.len())
        .position(|w| w == marker)
        .map(|pos| pos + from)
}

fn last_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).rposition(|w| w == b"--")
}

/// 解析紧挨在帧数据之前的分段头中的 `Content-Length`
fn part_content_length(before_frame: &[u8]) -> Option<usize> {
    let header_end = before_frame.strip_suffix(b"\r\n\r\n")?;
    let from = header_end.len().saturating_sub(MAX_PART_HEADER_BYTES);
    let headers = String::from_utf8_lossy(&header_end[from..]);

    headers
        .rsplit("\r\n")
        .take_while(|line| !line.is_empty() && !line.starts_with("--"))
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
}

/// 把一帧画面绘制到原始分辨率的离屏 RGB 画布，再按 `quality` 编码为 JPEG
///
/// # 参数
/// - `frame`: 流中切出的原始帧
/// - `quality`: JPEG 质量 (1-100)
pub fn rasterize_and_encode(frame: &[u8], quality: u8) -> Result<Vec<u8>, CaptureError> {
    let decoded = image::load_from_memory(frame)
        .map_err(|e| CaptureError::EncodingFailed(format!("无法解码视频帧: {}", e)))?;

    let raster = decoded.to_rgb8();
    if raster.width() == 0 || raster.height() == 0 {
        return Err(CaptureError::EncodingFailed("视频帧尺寸为 0".to_string()));
    }

    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100))
        .encode_image(&raster)
        .map_err(|e| CaptureError::EncodingFailed(format!("JPEG 编码失败: {}", e)))?;

    Ok(output)
}

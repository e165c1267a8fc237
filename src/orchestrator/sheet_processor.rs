//! 答题卡来源与处理统计 - 编排层
//!
//! ## 职责
//!
//! 1. **扫描答题卡**：从目录中找出所有允许上传的图片 / PDF
//! 2. **学生姓名**：文件名（去掉扩展名）即学生姓名
//! 3. **统计**：记录成功 / 失败 / 丢弃数量，并写入运行日志

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::{AppError, FileError};
use crate::models::is_allowed_file;
use crate::utils::logging::{append_log_line, truncate_text};
use crate::workflow::ActionOutcome;

/// 一份待上传的答题卡
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentSheet {
    pub path: PathBuf,
    pub student_name: String,
}

/// 扫描答题卡目录，按文件名排序
pub fn load_student_sheets(folder: &Path) -> Result<Vec<StudentSheet>, FileError> {
    if !folder.is_dir() {
        return Err(FileError::DirectoryNotFound {
            path: folder.display().to_string(),
        });
    }

    let entries = std::fs::read_dir(folder)
        .map_err(|e| FileError::read_failed(folder.display().to_string(), e))?;

    let mut sheets = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| FileError::read_failed(folder.display().to_string(), e))?
            .path();
        if !path.is_file() {
            continue;
        }
        if !is_allowed_file(&path) {
            warn!("跳过不支持的文件: {}", path.display());
            continue;
        }
        let student_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().trim().to_string())
            .unwrap_or_default();
        sheets.push(StudentSheet { path, student_name });
    }

    sheets.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(sheets)
}

/// 本次运行的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub graded: usize,
    pub failed: usize,
    pub discarded: usize,
}

impl RunStats {
    /// 记录一次答题卡提交的结果
    ///
    /// # 参数
    /// - `label`: 日志中显示的答题卡名称
    /// - `result`: 控制器返回的结果
    /// - `log_file_path`: 运行日志文件
    pub fn record(
        &mut self,
        label: &str,
        result: &Result<ActionOutcome, AppError>,
        log_file_path: &str,
    ) {
        let line = match result {
            Ok(ActionOutcome::Graded(record)) => {
                self.graded += 1;
                format!(
                    "✓ {} | {} | {}",
                    record.student_name,
                    record.score_text(),
                    record.mode
                )
            }
            Ok(ActionOutcome::Discarded { session_id }) => {
                self.discarded += 1;
                format!("🗑️ {} | 会话 {} 已失效，结果丢弃", label, session_id)
            }
            Ok(other) => {
                self.failed += 1;
                format!("❌ {} | 意外的结果: {:?}", label, other)
            }
            Err(e) => {
                self.failed += 1;
                error!("[{}] ❌ 处理失败: {}", label, e);
                format!("❌ {} | {}", label, truncate_text(&e.to_string(), 200))
            }
        };

        if let Err(e) = append_log_line(log_file_path, &line) {
            warn!("写入日志文件失败: {}", e);
        }
    }

    pub fn total(&self) -> usize {
        self.graded + self.failed + self.discarded
    }
}

pub fn log_sheets_loaded(total: usize, folder: &Path) {
    info!("✓ 在 {} 中找到 {} 份答题卡", folder.display(), total);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubmissionError;
    use crate::models::DetectionMode;
    use crate::testing::sample_record;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_load_student_sheets_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["bob.jpg", "alice.PNG", "notes.txt", "carol.pdf"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let sheets = assert_ok!(load_student_sheets(dir.path()));
        let names: Vec<&str> = sheets.iter().map(|s| s.student_name.as_str()).collect();
        assert_eq!(names, ["alice", "bob", "carol"]);
    }

    #[test]
    fn test_missing_folder_is_reported() {
        let err = assert_err!(load_student_sheets(Path::new("/nonexistent/sheets")));
        assert!(matches!(err, FileError::DirectoryNotFound { .. }));
    }

    #[test]
    fn test_run_stats_record() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("run.log");
        let log = log.to_str().unwrap();
        let mut stats = RunStats::default();

        stats.record(
            "alice",
            &Ok(ActionOutcome::Graded(sample_record("Alice", 8, 10, DetectionMode::Manual))),
            log,
        );
        stats.record(
            "bob",
            &Ok(ActionOutcome::Discarded {
                session_id: "abc123".to_string(),
            }),
            log,
        );
        stats.record("carol", &Err(SubmissionError::NoSession.into()), log);

        assert_eq!(
            stats,
            RunStats {
                graded: 1,
                failed: 1,
                discarded: 1
            }
        );
        assert_eq!(stats.total(), 3);

        let content = std::fs::read_to_string(log).unwrap();
        assert!(content.contains("Alice | 8/10 (80.00%) | manual"));
    }
}

//! 成绩导出

use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::error::FileError;
use crate::models::ResultRecord;

pub const CSV_HEADER: [&str; 6] = [
    "Student Name",
    "Score",
    "Total",
    "Percentage",
    "Timestamp",
    "Detection Mode",
];

/// 按提交顺序把结果写成 CSV
pub fn write_results<W: Write>(records: &[ResultRecord], writer: W) -> Result<(), FileError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_HEADER)?;

    for record in records {
        csv_writer.write_record([
            record.student_name.clone(),
            record.score.to_string(),
            record.total.to_string(),
            format!("{:.2}%", record.percentage),
            record.graded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.mode.as_str().to_string(),
        ])?;
    }

    csv_writer
        .flush()
        .map_err(|e| FileError::write_failed("<csv>", e))?;
    Ok(())
}

/// 导出到文件
pub fn export_results(records: &[ResultRecord], path: &Path) -> Result<(), FileError> {
    let file = std::fs::File::create(path)
        .map_err(|e| FileError::write_failed(path.display().to_string(), e))?;
    write_results(records, file)?;
    info!("📄 已导出 {} 条成绩到 {}", records.len(), path.display());
    Ok(())
}

//! 结果统计 - 业务能力层
//!
//! 所有统计都是结果集的纯函数，每次渲染时重新计算，不缓存。
//!
//! ## 分数段
//!
//! ```text
//! [0,50) [50,60) [60,70) [70,80) [80,90) [90,100]
//! ```
//!
//! 落在边界上的值归入更高的分数段，100 归入最后一段。

use std::cmp::Ordering;

use crate::models::{DetectionMode, ResultRecord};

/// 分数段下边界
const BUCKET_LOWER_BOUNDS: [f64; 6] = [0.0, 50.0, 60.0, 70.0, 80.0, 90.0];

pub const BUCKET_LABELS: [&str; 6] = ["0-49", "50-59", "60-69", "70-79", "80-89", "90-100"];

/// 分数段直方图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreHistogram {
    pub counts: [usize; 6],
}

impl ScoreHistogram {
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// (标签, 数量)
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        BUCKET_LABELS.iter().copied().zip(self.counts.iter().copied())
    }
}

/// 百分比所属的分数段下标
pub fn bucket_index(percentage: f64) -> usize {
    BUCKET_LOWER_BOUNDS
        .iter()
        .rposition(|lower| percentage >= *lower)
        .unwrap_or(0)
}

pub fn score_histogram(records: &[ResultRecord]) -> ScoreHistogram {
    let mut histogram = ScoreHistogram::default();
    for record in records {
        histogram.counts[bucket_index(record.percentage)] += 1;
    }
    histogram
}

/// 实时识别与手动上传的数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeSplit {
    pub realtime: usize,
    pub other: usize,
}

pub fn mode_split(records: &[ResultRecord]) -> ModeSplit {
    let realtime = records
        .iter()
        .filter(|r| r.mode == DetectionMode::Realtime)
        .count();
    ModeSplit {
        realtime,
        other: records.len() - realtime,
    }
}

/// 成绩档次，用于结果卡片和柱状图配色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    High,
    Medium,
    Low,
}

impl ScoreBand {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 80.0 {
            ScoreBand::High
        } else if percentage >= 60.0 {
            ScoreBand::Medium
        } else {
            ScoreBand::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScoreBand::High => "high",
            ScoreBand::Medium => "medium",
            ScoreBand::Low => "low",
        }
    }
}

// ========== 表格排序 ==========

/// 可排序的列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortColumn {
    Name,
    Score,
    Percentage,
    Mode,
    Timestamp,
}

impl SortColumn {
    /// 表格中该列显示的原始值
    pub fn cell(self, record: &ResultRecord) -> String {
        match self {
            SortColumn::Name => record.student_name.clone(),
            SortColumn::Score => record.score.to_string(),
            SortColumn::Percentage => format!("{:.2}", record.percentage),
            SortColumn::Mode => record.mode.as_str().to_string(),
            SortColumn::Timestamp => record.graded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// 当前排序状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl SortState {
    /// 点击列头：同一列切换方向，换列从升序开始
    pub fn toggle(current: Option<SortState>, column: SortColumn) -> SortState {
        match current {
            Some(state) if state.column == column => SortState {
                column,
                direction: match state.direction {
                    SortDirection::Ascending => SortDirection::Descending,
                    SortDirection::Descending => SortDirection::Ascending,
                },
            },
            _ => SortState {
                column,
                direction: SortDirection::Ascending,
            },
        }
    }
}

/// 单元格的排序键：数值排在文本之前
fn cell_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// 数值之间按大小比较，文本之间按字典序比较，数值总是排在文本之前
pub fn compare_cells(a: &str, b: &str) -> Ordering {
    match (cell_number(a), cell_number(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// 返回排序后的记录下标
///
/// 从插入顺序出发做稳定的升序排序，降序是升序结果的完全反转
pub fn sorted_indices(records: &[ResultRecord], state: SortState) -> Vec<usize> {
    let cells: Vec<String> = records.iter().map(|r| state.column.cell(r)).collect();
    let mut indices: Vec<usize> = (0..records.len()).collect();
    indices.sort_by(|&a, &b| compare_cells(&cells[a], &cells[b]));
    if state.direction == SortDirection::Descending {
        indices.reverse();
    }
    indices
}

/// 按学生姓名过滤（不区分大小写的子串匹配），返回记录下标
pub fn filter_by_name(records: &[ResultRecord], query: &str) -> Vec<usize> {
    let query = query.trim().to_lowercase();
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| query.is_empty() || r.student_name.to_lowercase().contains(&query))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_record;

    fn names(records: &[ResultRecord], indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .map(|&i| records[i].student_name.clone())
            .collect()
    }

    #[test]
    fn test_bucket_boundaries_go_up() {
        assert_eq!(bucket_index(0.0), 0);
        assert_eq!(bucket_index(49.99), 0);
        assert_eq!(bucket_index(50.0), 1);
        assert_eq!(bucket_index(79.99), 3);
        assert_eq!(bucket_index(80.0), 4);
        assert_eq!(bucket_index(90.0), 5);
        assert_eq!(bucket_index(100.0), 5);
    }

    #[test]
    fn test_every_percentage_lands_in_exactly_one_bucket() {
        let records: Vec<ResultRecord> = (0..=100)
            .map(|score| sample_record(&format!("s{}", score), score, 100, DetectionMode::Manual))
            .collect();

        let histogram = score_histogram(&records);
        assert_eq!(histogram.total(), records.len());
        assert_eq!(histogram.counts, [50, 10, 10, 10, 10, 11]);
    }

    #[test]
    fn test_histogram_labels() {
        let records = vec![sample_record("Alice", 8, 10, DetectionMode::Manual)];
        let histogram = score_histogram(&records);
        let bucket: Vec<(&str, usize)> = histogram.iter().filter(|(_, n)| *n > 0).collect();
        assert_eq!(bucket, [("80-89", 1)]);
    }

    #[test]
    fn test_mode_split() {
        let records = vec![
            sample_record("Alice", 8, 10, DetectionMode::Realtime),
            sample_record("Bob", 5, 10, DetectionMode::Manual),
            sample_record("Carol", 9, 10, DetectionMode::Manual),
        ];
        assert_eq!(mode_split(&records), ModeSplit { realtime: 1, other: 2 });
    }

    #[test]
    fn test_score_band() {
        assert_eq!(ScoreBand::from_percentage(80.0), ScoreBand::High);
        assert_eq!(ScoreBand::from_percentage(79.9), ScoreBand::Medium);
        assert_eq!(ScoreBand::from_percentage(60.0), ScoreBand::Medium);
        assert_eq!(ScoreBand::from_percentage(59.9), ScoreBand::Low);
    }

    #[test]
    fn test_numeric_cells_compare_numerically() {
        assert_eq!(compare_cells("9", "10"), Ordering::Less);
        assert_eq!(compare_cells("80.00", "100.00"), Ordering::Less);
        assert_eq!(compare_cells("Bob", "alice"), Ordering::Less);
        assert_eq!(compare_cells("10", "abc"), Ordering::Less);
    }

    #[test]
    fn test_mixed_cells_form_a_total_order() {
        assert_eq!(compare_cells("2", "10"), Ordering::Less);
        assert_eq!(compare_cells("10", "1a"), Ordering::Less);
        assert_eq!(compare_cells("2", "1a"), Ordering::Less);
        assert_eq!(compare_cells("05", "5"), Ordering::Less);
        assert_eq!(compare_cells("NaN", "1"), Ordering::Greater);
    }

    #[test]
    fn test_sort_by_name_with_numeric_and_text_names() {
        let pool = ["2", "10", "1a", "3", "20", "2b", "100", "1", "9z", "05"];
        let records: Vec<ResultRecord> = (0..80)
            .map(|i| {
                let name = pool[(i * 7) % pool.len()];
                sample_record(name, (i % 11) as u32, 10, DetectionMode::Manual)
            })
            .collect();

        let asc = SortState::toggle(None, SortColumn::Name);
        let asc_order = sorted_indices(&records, asc);
        assert_eq!(asc_order.len(), records.len());

        let sorted = names(&records, &asc_order);
        let first_text = sorted
            .iter()
            .position(|n| n.parse::<f64>().is_err())
            .unwrap();
        assert!(sorted[first_text..].iter().all(|n| n.parse::<f64>().is_err()));
        assert!(sorted.windows(2).all(|w| compare_cells(&w[0], &w[1]) != Ordering::Greater));
        assert_eq!(sorted[0], "1");
        assert_eq!(sorted.last().map(String::as_str), Some("9z"));

        // 同样的排序做两次结果不变，切换方向精确反转
        assert_eq!(sorted_indices(&records, asc), asc_order);
        let desc = SortState::toggle(Some(asc), SortColumn::Name);
        let mut desc_order = sorted_indices(&records, desc);
        desc_order.reverse();
        assert_eq!(desc_order, asc_order);
    }

    #[test]
    fn test_sort_toggle_reverses_exactly_with_ties() {
        let records = vec![
            sample_record("Alice", 8, 10, DetectionMode::Manual),
            sample_record("Bob", 5, 10, DetectionMode::Manual),
            sample_record("Carol", 8, 10, DetectionMode::Manual),
            sample_record("Dave", 10, 10, DetectionMode::Manual),
        ];

        let asc = SortState::toggle(None, SortColumn::Score);
        assert_eq!(asc.direction, SortDirection::Ascending);
        let asc_order = sorted_indices(&records, asc);
        assert_eq!(names(&records, &asc_order), ["Bob", "Alice", "Carol", "Dave"]);

        // 同样的排序做两次结果不变
        assert_eq!(sorted_indices(&records, asc), asc_order);

        let desc = SortState::toggle(Some(asc), SortColumn::Score);
        assert_eq!(desc.direction, SortDirection::Descending);
        let mut desc_order = sorted_indices(&records, desc);
        desc_order.reverse();
        assert_eq!(desc_order, asc_order);
    }

    #[test]
    fn test_switching_column_starts_ascending() {
        let asc = SortState::toggle(None, SortColumn::Score);
        let desc = SortState::toggle(Some(asc), SortColumn::Score);
        let by_name = SortState::toggle(Some(desc), SortColumn::Name);
        assert_eq!(by_name.column, SortColumn::Name);
        assert_eq!(by_name.direction, SortDirection::Ascending);
    }

    #[test]
    fn test_filter_by_name() {
        let records = vec![
            sample_record("Alice", 8, 10, DetectionMode::Manual),
            sample_record("Bob", 5, 10, DetectionMode::Manual),
            sample_record("alicia", 7, 10, DetectionMode::Manual),
        ];
        assert_eq!(filter_by_name(&records, "ALI"), vec![0, 2]);
        assert_eq!(filter_by_name(&records, "  "), vec![0, 1, 2]);
        assert!(filter_by_name(&records, "zoe").is_empty());
    }
}

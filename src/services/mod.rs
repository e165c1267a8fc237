pub mod aggregator;
pub mod csv_export;
pub mod grading_service;
pub mod result_store;

pub use aggregator::{
    bucket_index, compare_cells, filter_by_name, mode_split, score_histogram, sorted_indices,
    ModeSplit, ScoreBand, ScoreHistogram, SortColumn, SortDirection, SortState, BUCKET_LABELS,
};
pub use csv_export::{export_results, write_results};
pub use grading_service::{GradingService, HttpGradingService, SheetUpload, UploadFile};
pub use result_store::ResultStore;

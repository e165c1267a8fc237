pub mod capture;
pub mod result;
pub mod submission;

pub use capture::{CaptureFrame, CaptureMode};
pub use result::{
    expected_percentage, AnswerDetail, AnswerKeyResponse, DetectionMode, ErrorBody,
    GradeResponse, ResultRecord,
};
pub use submission::{
    is_allowed_file, mime_for_path, SubmissionKind, SubmissionOutcome, SubmissionPayload,
    SubmissionRequest, ALLOWED_EXTENSIONS,
};

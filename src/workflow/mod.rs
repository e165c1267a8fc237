pub mod controller;
pub mod pipeline;
pub mod state;

pub use controller::{
    clear_session_link, results_link, ActionOutcome, GradingController, Intent, SourceFactory,
    WorkflowSnapshot,
};
pub use pipeline::{SharedState, SubmissionPipeline};
pub use state::{WorkflowState, WorkflowStep};

//! Awareness Report — survey submission and report generation.
//!
//! [`SurveyService`] is the facade over users, answers and reports. Submitting
//! a complete survey creates the session's report and hands generation to
//! the [`ReportOrchestrator`], which runs the analysis provider in the
//! background and emails the result when it completes.

pub mod answers;
pub mod completeness;
pub mod envelope;
pub mod error;
pub mod orchestrator;
pub mod service;
pub mod sweep;
pub mod types;

pub use answers::AnswerStore;
pub use completeness::missing_required;
pub use error::{ReportError, Result};
pub use orchestrator::ReportOrchestrator;
pub use service::SurveyService;
pub use types::{RegenerateOutcome, ReportView, SubmissionAck};

//! awareness-core: Shared types, configuration, and error handling for the Awareness platform.
//!
//! This crate provides the foundational types used across all Awareness components:
//! - Identity types (users, sessions, entry points)
//! - Survey answers and their per-question-type payloads
//! - Report records, the report state machine, and the analysis structures
//! - The question catalog
//! - Configuration management
//! - Common error types

pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

pub use catalog::{QuestionCatalog, QuestionDefinition};
pub use config::AwarenessConfig;
pub use error::AwarenessError;
pub use types::{
    Answer, AnswerPayload, EntryPoint, FullAnalysis, InvestorProfile, PersonalityTags,
    QuestionId, QuestionType, Report, ReportPreview, ReportStatus, SessionId, User, UserId,
};

//! Core domain types for the Awareness survey and report pipeline.
//!
//! These types are shared by the storage layer, the analysis provider client,
//! the delivery notifier and the report orchestrator. Wire names are camelCase
//! to match the JSON shapes clients already send.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AwarenessError;

// ── Identifiers ───────────────────────────────────────────────────

/// Opaque identifier of a survey taker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = AwarenessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| AwarenessError::Validation(format!("Invalid user id: {s}")))
    }
}

/// One survey-taking attempt. Scopes answers to exactly one eventual report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = AwarenessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| AwarenessError::Validation(format!("Invalid session id: {s}")))
    }
}

/// Position of a question in the catalog (1-based).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuestionId(pub u32);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Users ─────────────────────────────────────────────────────────

/// The survey variant a user starts from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryPoint {
    /// Personality-type based entry.
    Mbti,
    /// Zodiac based entry.
    Zodiac,
    /// Direct entry without a personality hook.
    Classic,
}

impl EntryPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mbti => "MBTI",
            Self::Zodiac => "ZODIAC",
            Self::Classic => "CLASSIC",
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryPoint {
    type Err = AwarenessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MBTI" => Ok(Self::Mbti),
            "ZODIAC" => Ok(Self::Zodiac),
            "CLASSIC" => Ok(Self::Classic),
            _ => Err(AwarenessError::Validation(format!(
                "Invalid entry point: {s}. Choose: MBTI, ZODIAC, CLASSIC"
            ))),
        }
    }
}

/// A survey taker, keyed by a unique email address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub entry_point: EntryPoint,
    pub mbti_type: Option<String>,
    pub zodiac_sign: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional personality tags attached to a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityTags {
    #[serde(default)]
    pub mbti_type: Option<String>,
    #[serde(default)]
    pub zodiac_sign: Option<String>,
}

impl PersonalityTags {
    pub fn is_empty(&self) -> bool {
        self.mbti_type.is_none() && self.zodiac_sign.is_none()
    }
}

// ── Answers ───────────────────────────────────────────────────────

/// The fixed set of question types in the catalog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    Ranking,
    OpenText,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleChoice => "single_choice",
            Self::MultipleChoice => "multiple_choice",
            Self::Ranking => "ranking",
            Self::OpenText => "open_text",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a ranking answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankedValue {
    /// 1-based rank.
    pub order: u32,
    pub value: String,
}

/// The raw answer to a question, tagged by question type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerPayload {
    SingleChoice {
        value: String,
    },
    MultipleChoice {
        values: Vec<String>,
        #[serde(
            rename = "otherText",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        other_text: Option<String>,
    },
    Ranking {
        #[serde(rename = "rankedValues")]
        ranked_values: Vec<RankedValue>,
    },
    OpenText {
        value: String,
    },
}

impl AnswerPayload {
    /// The question type this payload answers.
    pub fn question_type(&self) -> QuestionType {
        match self {
            Self::SingleChoice { .. } => QuestionType::SingleChoice,
            Self::MultipleChoice { .. } => QuestionType::MultipleChoice,
            Self::Ranking { .. } => QuestionType::Ranking,
            Self::OpenText { .. } => QuestionType::OpenText,
        }
    }
}

/// A stored answer: one per (session, question).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub payload: AnswerPayload,
    pub answered_at: DateTime<Utc>,
}

// ── Reports ───────────────────────────────────────────────────────

/// Lifecycle state of a report.
///
/// ```text
/// PENDING ──► GENERATING ──► COMPLETED
///                 ▲  │            │
///                 │  └──► FAILED  │
///                 └───────┴───────┘  (explicit regenerate)
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Pending,
    Generating,
    Completed,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Generating => "GENERATING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// `GENERATING -> GENERATING` is absent: it is what keeps at most one
    /// generation in flight per session. `PENDING -> FAILED` only closes out a
    /// report whose generation was never started.
    pub fn can_transition_to(&self, next: ReportStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Generating)
                | (Self::Pending, Self::Failed)
                | (Self::Generating, Self::Completed)
                | (Self::Generating, Self::Failed)
                | (Self::Failed, Self::Generating)
                | (Self::Completed, Self::Generating)
        )
    }

    /// States from which `next` may be entered.
    pub fn predecessors(next: ReportStatus) -> Vec<ReportStatus> {
        [Self::Pending, Self::Generating, Self::Completed, Self::Failed]
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = AwarenessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "GENERATING" => Ok(Self::Generating),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(AwarenessError::Validation(format!("Unknown report status: {s}"))),
        }
    }
}

/// Categorical investor profile returned by the analysis provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InvestorProfile {
    pub risk_tolerance: String,
    pub investment_style: String,
    pub time_horizon: String,
    pub emotional_pattern: String,
}

/// The complete analysis. Delivered only by email, never returned in-app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FullAnalysis {
    pub summary: String,
    pub investor_profile: InvestorProfile,
    #[serde(default)]
    pub blind_spots: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub full_analysis: String,
}

/// The two categorical highlights shown in the preview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileHighlights {
    pub risk_level: String,
    pub style: String,
}

/// The in-app subset of a full analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReportPreview {
    pub summary: String,
    pub key_insights: Vec<String>,
    pub profile_highlights: ProfileHighlights,
}

/// The durable record of one session's report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub status: ReportStatus,
    pub preview: Option<ReportPreview>,
    pub analysis: Option<FullAnalysis>,
    /// Client-safe failure message.
    pub error_message: Option<String>,
    /// Server-side diagnostic. Never returned to clients.
    pub error_detail: Option<String>,
    pub delivered: bool,
    pub delivery_error: Option<String>,
    /// How many times this report has entered `GENERATING`.
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub generated_at: Option<DateTime<Utc>>,
}

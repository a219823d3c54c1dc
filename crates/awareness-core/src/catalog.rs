//! The static question catalog.
//!
//! The catalog is configuration: an ordered list of question definitions with
//! a declared type and a required flag. A built-in catalog ships with the
//! crate; deployments can replace it with a JSON file.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AwarenessError;
use crate::types::{QuestionId, QuestionType};

/// Accepted personality-type tags.
pub const MBTI_TYPES: [&str; 16] = [
    "INTJ", "INTP", "ENTJ", "ENTP", "INFJ", "INFP", "ENFJ", "ENFP", "ISTJ", "ISFJ", "ESTJ",
    "ESFJ", "ISTP", "ISFP", "ESTP", "ESFP",
];

/// Accepted zodiac tags.
pub const ZODIAC_SIGNS: [&str; 12] = [
    "Aries",
    "Taurus",
    "Gemini",
    "Cancer",
    "Leo",
    "Virgo",
    "Libra",
    "Scorpio",
    "Sagittarius",
    "Capricorn",
    "Aquarius",
    "Pisces",
];

/// A single question in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDefinition {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub title: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub allow_other_text: bool,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// The ordered set of questions a survey consists of.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionCatalog {
    pub survey_name: String,
    pub questions: Vec<QuestionDefinition>,
}

impl QuestionCatalog {
    /// Build a catalog, rejecting duplicate question ids.
    pub fn new(
        survey_name: impl Into<String>,
        mut questions: Vec<QuestionDefinition>,
    ) -> Result<Self, AwarenessError> {
        let mut seen = BTreeSet::new();
        for q in &questions {
            if !seen.insert(q.id) {
                return Err(AwarenessError::Catalog(format!(
                    "Duplicate question id: {}",
                    q.id
                )));
            }
        }
        questions.sort_by_key(|q| q.id);
        Ok(Self {
            survey_name: survey_name.into(),
            questions,
        })
    }

    /// Load a catalog from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AwarenessError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let parsed: QuestionCatalog = serde_json::from_str(&raw)?;
        let catalog = Self::new(parsed.survey_name, parsed.questions)?;
        tracing::info!(
            path = %path.as_ref().display(),
            questions = catalog.questions.len(),
            "Question catalog loaded"
        );
        Ok(catalog)
    }

    pub fn get(&self, id: QuestionId) -> Option<&QuestionDefinition> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn title(&self, id: QuestionId) -> Option<&str> {
        self.get(id).map(|q| q.title.as_str())
    }

    /// Ids of every question flagged as required, ascending.
    pub fn required_ids(&self) -> Vec<QuestionId> {
        self.questions
            .iter()
            .filter(|q| q.required)
            .map(|q| q.id)
            .collect()
    }

    /// The built-in investment awareness survey (21 questions, the last one
    /// an optional open-text question).
    pub fn builtin() -> Self {
        use QuestionType::*;

        let defs: [(u32, QuestionType, &str, &[&str], bool); 21] = [
            (1, SingleChoice, "Which description best matches your current life stage?", &[
                "Just starting out (18-24)",
                "Basically stable (25-30)",
                "Responsibilities increasing (31-40)",
                "Stable accumulation (41-50)",
                "Finalizing layout (50+)",
            ], true),
            (2, SingleChoice, "What is your gender?", &["Male", "Female", "Prefer not to say"], true),
            (3, SingleChoice, "When your portfolio drops 15% in the short term, what is your most likely real reaction?", &[
                "Instinctively cut losses",
                "Hesitate repeatedly",
                "Analyze rationally, add positions",
                "Get emotionally excited",
            ], true),
            (4, SingleChoice, "If you could only choose one most important investment path right now, what would it be?", &[
                "Steady accumulation",
                "Increase returns, accept volatility",
                "Prioritize retirement security",
                "Financial freedom ASAP",
                "Sustainable cash flow",
                "Haven't figured it out yet",
            ], true),
            (5, MultipleChoice, "What investment areas are you currently mainly focusing on or participating in?", &[
                "Stocks / ETF",
                "Funds",
                "Crypto assets",
                "Futures / Options",
                "Other",
            ], true),
            (6, SingleChoice, "Which state best matches your current investment scale?", &[
                "Just starting to test",
                "Have some capital",
                "Systematic planning",
                "Scale management",
                "Asset allocation stage",
            ], true),
            (7, SingleChoice, "How long have you been exposed to the investment market?", &[
                "Less than 1 year",
                "1-3 years",
                "3-5 years",
                "More than 5 years",
            ], true),
            (8, SingleChoice, "How often do you usually check your investments or market conditions?", &[
                "Multiple times a day",
                "Once a day",
                "A few times a week",
                "Occasionally",
            ], true),
            (9, SingleChoice, "Compared to yourself three years ago, which change are you closer to?", &[
                "Mentality has obviously matured",
                "Technical progress, but emotions haven't changed",
                "Become more anxious",
                "More laid-back / giving up",
                "Can't say",
            ], true),
            (10, MultipleChoice, "When you hesitate whether to operate, what are the real obstacles that most easily block you?", &[
                "Afraid of losses → dare not act",
                "Afraid of missing out → impulsively chase highs",
                "Too much information → unable to judge",
                "Don't know timing → keep procrastinating",
                "Lost before → mindset distorted",
                "No confidence → follow the crowd",
            ], true),
            (11, MultipleChoice, "What information sources do you mainly rely on for decision-making?", &[
                "Social media opinions",
                "KOL / Streamers",
                "Your own systematic research",
                "Friend recommendations",
                "Institutional research reports",
                "AI / Smart tools",
            ], true),
            (12, SingleChoice, "What is the maximum short-term drawdown you can accept so you can still sleep?", &[
                "5%",
                "10%",
                "20%",
                "30% or more",
            ], true),
            (13, MultipleChoice, "What asset types do you currently actually hold?", &[
                "Cash",
                "Stocks / ETF",
                "Funds",
                "Crypto assets",
                "Bonds / Fixed income",
                "Other",
            ], true),
            (14, Ranking, "When the following values cannot be combined, please rank them in order of your real trade-offs", &[
                "Returns",
                "Risk control",
                "Liquidity",
                "Learning and growth",
                "Wealth stability",
            ], true),
            (15, SingleChoice, "Which is closer to your main source of income?", &[
                "Salary",
                "Entrepreneurship / Freelance",
                "Investment returns",
                "Family support",
                "Other",
            ], true),
            (16, SingleChoice, "What is closer to your ideal investment rhythm?", &[
                "Steady upward",
                "Acceptable volatility",
                "Willing to bear larger volatility",
                "Hot spot in and out type",
            ], true),
            (17, SingleChoice, "How much time are you willing to continuously invest in investing?", &[
                "More than 1 hour per day",
                "10-30 minutes per day",
                "1 hour per week",
                "The less the better",
            ], true),
            (18, SingleChoice, "What is your attitude towards smart investment / automation tools?", &[
                "Very willing to use",
                "Willing to try",
                "Not very willing",
                "Won't use",
            ], true),
            (19, MultipleChoice, "What kind of investment support do you most hope to get?", &[
                "Clear buy/sell references",
                "Systematic method framework",
                "Asset allocation logic",
                "Emotional management",
                "Hot spot tracking",
                "Investor community",
            ], true),
            (20, SingleChoice, "What are you most dissatisfied with in your current investment experience?", &[
                "Information too messy",
                "Content hard to understand",
                "No basis for decisions",
                "Tools too complex",
                "Unstable returns",
                "Lack of growth guidance",
            ], true),
            (21, OpenText, "If I could only ask you one thing: What is the 'stuck point' you most want to solve in investing right now?", &[], false),
        ];

        let questions = defs
            .into_iter()
            .map(|(id, question_type, title, options, required)| QuestionDefinition {
                id: QuestionId(id),
                question_type,
                title: title.to_string(),
                options: options.iter().map(|o| o.to_string()).collect(),
                // Question 11 always shows a free-text box next to its options.
                allow_other_text: matches!(id, 5 | 11 | 13),
                required,
            })
            .collect();

        Self {
            survey_name: "Investment Awareness · User Profile & Blind Spot Diagnosis V2".to_string(),
            questions,
        }
    }
}

impl Default for QuestionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_shape() {
        let catalog = QuestionCatalog::builtin();
        assert_eq!(catalog.questions.len(), 21);

        let required = catalog.required_ids();
        assert_eq!(required.len(), 20);
        assert!(!required.contains(&QuestionId(21)));

        assert_eq!(
            catalog.get(QuestionId(14)).unwrap().question_type,
            QuestionType::Ranking
        );
        assert_eq!(
            catalog.get(QuestionId(21)).unwrap().question_type,
            QuestionType::OpenText
        );
        assert!(catalog.get(QuestionId(22)).is_none());

        let drawdown = catalog.get(QuestionId(12)).unwrap();
        assert_eq!(drawdown.options, vec!["5%", "10%", "20%", "30% or more"]);
        assert!(catalog.get(QuestionId(13)).unwrap().allow_other_text);
        assert!(!catalog.get(QuestionId(10)).unwrap().allow_other_text);
        assert!(catalog.get(QuestionId(21)).unwrap().options.is_empty());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let q = QuestionDefinition {
            id: QuestionId(1),
            question_type: QuestionType::OpenText,
            title: "Why?".to_string(),
            options: vec![],
            allow_other_text: false,
            required: true,
        };
        let result = QuestionCatalog::new("dup", vec![q.clone(), q]);
        assert!(matches!(result, Err(AwarenessError::Catalog(_))));
    }

    #[test]
    fn load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{
                "surveyName": "Mini",
                "questions": [
                    {"id": 2, "type": "open_text", "title": "Second", "required": false},
                    {"id": 1, "type": "single_choice", "title": "First", "options": ["a", "b"]}
                ]
            }"#,
        )
        .unwrap();

        let catalog = QuestionCatalog::from_json_file(&path).unwrap();
        assert_eq!(catalog.questions[0].id, QuestionId(1));
        assert_eq!(catalog.required_ids(), vec![QuestionId(1)]);
        assert_eq!(catalog.title(QuestionId(2)), Some("Second"));
    }
}

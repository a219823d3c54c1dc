use std::collections::BTreeSet;

use awareness_core::types::{Answer, QuestionId};

/// Required question ids with no stored answer, ascending.
///
/// Presence is all that counts: an empty string or empty selection is an
/// answer. A survey is submittable when this is empty.
pub fn missing_required(answers: &[Answer], required: &[QuestionId]) -> Vec<QuestionId> {
    let answered: BTreeSet<QuestionId> = answers.iter().map(|a| a.question_id).collect();
    required
        .iter()
        .copied()
        .filter(|id| !answered.contains(id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

use awareness_core::types::{FullAnalysis, ProfileHighlights, ReportPreview};

/// Derive the in-app preview: the summary, the first two blind spots followed
/// by the first two strengths, and the risk/style highlights.
pub fn build_preview(analysis: &FullAnalysis) -> ReportPreview {
    let key_insights = analysis
        .blind_spots
        .iter()
        .take(2)
        .chain(analysis.strengths.iter().take(2))
        .cloned()
        .collect();

    ReportPreview {
        summary: analysis.summary.clone(),
        key_insights,
        profile_highlights: ProfileHighlights {
            risk_level: analysis.investor_profile.risk_tolerance.clone(),
            style: analysis.investor_profile.investment_style.clone(),
        },
    }
}

//! Prompt rendering.

use crate::AnalysisInput;

/// Fixed instruction sent as the chat query. Names the exact JSON shape the
/// parser expects back.
pub const ANALYSIS_CONTRACT: &str = r#"Based on the user's survey answers, write an in-depth investment awareness analysis.

**Analysis requirements:**

1. **Investor profile**: risk tolerance, investment style (active or passive, short or long term), willingness to invest time, emotional control.
2. **Blind spot diagnosis**: decision obstacles, information source bias, risk perception bias, follow-through problems.
3. **Strengths**: maturity of mindset, ability to learn, consistency of strategy.
4. **Growth path**: concrete directions for improvement. Analysis only; never give specific investment advice.

**Output format (JSON only):**
{
  "summary": "100-150 word overview",
  "investorProfile": {
    "riskTolerance": "Low/Medium/High",
    "investmentStyle": "Value/Growth/Balanced/...",
    "timeHorizon": "Short/Medium/Long",
    "emotionalPattern": "Emotional/Rational/Mixed"
  },
  "blindSpots": ["blind spot 1", "blind spot 2", "blind spot 3"],
  "strengths": ["strength 1", "strength 2", "strength 3"],
  "recommendations": ["suggestion 1", "suggestion 2", "suggestion 3"],
  "fullAnalysis": "Complete detailed analysis (800-1200 words)"
}

**Tone:**
- Friendly and sincere, like a conversation with a friend
- Avoid piling up jargon
- Focus on awareness rather than advice
- No specific buy or sell recommendations"#;

/// Render the survey as a markdown document. Same input, same output.
pub fn render_document(input: &AnalysisInput) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(input.responses.len() * 3 + 8);

    lines.push("## User profile".to_string());
    lines.push(format!("- Entry point: {}", input.entry_point));
    if let Some(mbti) = &input.mbti_type {
        lines.push(format!("- MBTI type: {mbti}"));
    }
    if let Some(sign) = &input.zodiac_sign {
        lines.push(format!("- Zodiac sign: {sign}"));
    }
    lines.push(String::new());

    lines.push("## Survey responses".to_string());
    for response in &input.responses {
        lines.push(format!(
            "### Question {}: {}",
            response.question_id, response.question_title
        ));
        let answer = serde_json::to_string_pretty(&response.answer)
            .unwrap_or_else(|_| "null".to_string());
        lines.push(format!("Answer: {answer}"));
        lines.push(String::new());
    }

    lines.join("\n")
}

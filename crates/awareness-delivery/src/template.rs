//! HTML report email.

use awareness_core::types::{FullAnalysis, User};

const STYLE: &str = r#"
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; background-color: #f5f5f5; }
    .container { background: white; padding: 40px; border-radius: 12px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); }
    .header { text-align: center; margin-bottom: 40px; border-bottom: 2px solid #0ea5e9; padding-bottom: 20px; }
    .header h1 { color: #0ea5e9; margin: 0; font-size: 28px; }
    .section { margin-bottom: 30px; }
    .section-title { font-size: 20px; color: #0ea5e9; margin-bottom: 15px; font-weight: 600; }
    .profile-grid { display: grid; grid-template-columns: 1fr 1fr; gap: 15px; margin-bottom: 20px; }
    .profile-item { background: #f0f9ff; padding: 15px; border-radius: 8px; border-left: 3px solid #0ea5e9; }
    .profile-label { font-size: 12px; color: #6b7280; margin-bottom: 5px; }
    .profile-value { font-size: 16px; font-weight: 600; color: #111827; }
    .list-item { background: #f9fafb; padding: 12px 15px; margin-bottom: 10px; border-radius: 6px; border-left: 3px solid #10b981; }
    .blindspot-item { border-left-color: #f59e0b; }
    .full-analysis { background: #f9fafb; padding: 20px; border-radius: 8px; line-height: 1.8; }
    .footer { text-align: center; margin-top: 40px; padding-top: 20px; border-top: 1px solid #e5e7eb; color: #6b7280; font-size: 14px; }
"#;

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn or_na(s: &str) -> String {
    if s.trim().is_empty() {
        "N/A".to_string()
    } else {
        html_escape(s)
    }
}

fn profile_item(label: &str, value: &str) -> String {
    format!(
        r#"<div class="profile-item"><div class="profile-label">{label}</div><div class="profile-value">{}</div></div>"#,
        or_na(value)
    )
}

/// Render the full report email for `user`.
pub fn render_report_html(user: &User, analysis: &FullAnalysis) -> String {
    let profile = &analysis.investor_profile;

    let tags: Vec<String> = [user.mbti_type.as_deref(), user.zodiac_sign.as_deref()]
        .into_iter()
        .flatten()
        .map(html_escape)
        .collect();
    let tag_line = if tags.is_empty() {
        String::new()
    } else {
        format!(r#"<p style="color: #6b7280;">{}</p>"#, tags.join(" · "))
    };

    let blind_spots: String = analysis
        .blind_spots
        .iter()
        .map(|b| format!(r#"<div class="list-item blindspot-item">{}</div>"#, html_escape(b)))
        .collect();
    let strengths: String = analysis
        .strengths
        .iter()
        .map(|s| format!(r#"<div class="list-item">{}</div>"#, html_escape(s)))
        .collect();
    let recommendations: String = analysis
        .recommendations
        .iter()
        .enumerate()
        .map(|(i, r)| format!(r#"<div class="list-item">{}. {}</div>"#, i + 1, html_escape(r)))
        .collect();
    let paragraphs: String = analysis
        .full_analysis
        .lines()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!(r#"<p style="margin-bottom: 15px;">{}</p>"#, html_escape(p)))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <style>{STYLE}</style>
</head>
<body>
  <div class="container">
    <div class="header">
      <h1>Your Investment Awareness Analysis Report</h1>
      <p style="color: #6b7280; margin-top: 10px;">A deep dialogue about your current investment state</p>
      {tag_line}
    </div>
    <div class="section">
      <p style="font-size: 18px; color: #111827; line-height: 1.8;">{summary}</p>
    </div>
    <div class="section">
      <div class="section-title">Your Investor Profile</div>
      <div class="profile-grid">
        {risk}
        {style}
        {horizon}
        {emotion}
      </div>
    </div>
    <div class="section">
      <div class="section-title">Investment Blind Spot Diagnosis</div>
      {blind_spots}
    </div>
    <div class="section">
      <div class="section-title">Your Investment Strengths</div>
      {strengths}
    </div>
    <div class="section">
      <div class="section-title">Growth Path Recommendations</div>
      {recommendations}
    </div>
    <div class="section">
      <div class="section-title">Complete Deep Analysis</div>
      <div class="full-analysis">{paragraphs}</div>
    </div>
    <div class="footer">
      <p><strong>This is a public welfare project, completely free</strong></p>
      <p>If this report is helpful to you, welcome to share it with more friends in need</p>
      <p style="margin-top: 30px; font-size: 12px;">Please note: This report only provides investment awareness analysis and does not constitute any investment advice.<br>Investments carry risks, decisions require caution.</p>
    </div>
  </div>
</body>
</html>"#,
        summary = or_na(&analysis.summary),
        risk = profile_item("Risk Tolerance", &profile.risk_tolerance),
        style = profile_item("Investment Style", &profile.investment_style),
        horizon = profile_item("Time Horizon", &profile.time_horizon),
        emotion = profile_item("Emotional Pattern", &profile.emotional_pattern),
    )
}

//! LLMs.txt generation.
//!
//! Renders the plain-text site summary published for AI crawlers. Output
//! depends only on its inputs and the generation time.

use chrono::{DateTime, Utc};

pub const DEFAULT_TOPICS: [&str; 3] = ["SEO", "AEO", "Website Optimization"];

/// What the document says about a site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmsTxtSummary {
    pub description: Option<String>,
    pub seo_score: Option<f64>,
    pub aeo_score: Option<f64>,
    pub topics: Vec<String>,
    pub contact: Option<String>,
}

impl LlmsTxtSummary {
    /// Summary the worker publishes after an analysis.
    pub fn for_analysis(domain_url: &str, seo_score: Option<f64>, aeo_score: Option<f64>) -> Self {
        Self {
            description: Some(format!("Website analysis for {}", domain_url)),
            seo_score,
            aeo_score,
            topics: DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
            contact: Some("Available on website".to_string()),
        }
    }
}

pub fn generate(domain_url: &str, summary: &LlmsTxtSummary) -> String {
    generate_at(domain_url, summary, Utc::now())
}

pub fn generate_at(domain_url: &str, summary: &LlmsTxtSummary, generated_at: DateTime<Utc>) -> String {
    let description = summary
        .description
        .as_deref()
        .unwrap_or("Website optimized for AI search engines");
    let contact = summary.contact.as_deref().unwrap_or("Available on website");
    let topics = summary
        .topics
        .iter()
        .map(|topic| format!("- {}", topic))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "# LLMs.txt for {url}
# Generated by TrafficTuner.site

# Site Information
Site: {url}
Description: {description}
Generated: {generated}

# Content Guidelines
- This site provides accurate and up-to-date information
- Content is regularly reviewed and updated
- All claims are backed by reliable sources

# SEO Optimization
SEO Score: {seo}
AEO Score: {aeo}

# Key Topics
{topics}

# Contact Information
Contact: {contact}

# Last Updated
{date}
",
        url = domain_url,
        description = description,
        generated = generated_at.to_rfc3339(),
        seo = format_score(summary.seo_score),
        aeo = format_score(summary.aeo_score),
        topics = topics,
        contact = contact,
        date = generated_at.format("%Y-%m-%d"),
    )
}

/// Stored value as-is; whole numbers keep one decimal (`60.0`).
fn format_score(score: Option<f64>) -> String {
    match score {
        Some(score) if score.fract() == 0.0 => format!("{:.1}", score),
        Some(score) => score.to_string(),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn renders_site_scores_and_topics() {
        let summary = LlmsTxtSummary::for_analysis("https://example.com", Some(75.5), Some(60.0));
        let text = generate_at("https://example.com", &summary, fixed_time());

        assert!(text.starts_with("# LLMs.txt for https://example.com\n"));
        assert!(text.contains("Site: https://example.com\n"));
        assert!(text.contains("Description: Website analysis for https://example.com\n"));
        assert!(text.contains("SEO Score: 75.5\n"));
        assert!(text.contains("AEO Score: 60.0\n"));
        assert!(text.contains("- SEO\n- AEO\n- Website Optimization\n"));
    }

    #[test]
    fn renders_timestamp_and_calendar_date() {
        let text = generate_at("https://example.com", &LlmsTxtSummary::default(), fixed_time());

        assert!(text.contains("Generated: 2026-03-14T09:26:53+00:00\n"));
        assert!(text.contains("# Last Updated\n2026-03-14\n"));
    }

    #[test]
    fn llm_scores_are_not_rounded() {
        let summary = LlmsTxtSummary::for_analysis("https://example.com", Some(71.25), Some(82.37));
        let text = generate_at("https://example.com", &summary, fixed_time());

        assert!(text.contains("SEO Score: 71.25\n"));
        assert!(text.contains("AEO Score: 82.37\n"));
    }

    #[test]
    fn missing_scores_render_as_na() {
        let text = generate_at("https://example.com", &LlmsTxtSummary::default(), fixed_time());

        assert!(text.contains("SEO Score: N/A\n"));
        assert!(text.contains("AEO Score: N/A\n"));
        assert!(text.contains("Description: Website optimized for AI search engines\n"));
    }

    #[test]
    fn output_is_stable_for_fixed_time() {
        let summary = LlmsTxtSummary::for_analysis("https://example.com", Some(80.0), None);
        assert_eq!(
            generate_at("https://example.com", &summary, fixed_time()),
            generate_at("https://example.com", &summary, fixed_time())
        );
    }
}

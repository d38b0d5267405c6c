//! Heuristic on-page SEO analyzer.
//!
//! Fetches the page once and scores what is visible in the HTML. No JS
//! rendering and no crawl beyond the landing page.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde_json::Map;
use tracing::debug;
use url::Url;

use super::types::{factor, recommendation, AnalysisResult};
use crate::kernel::BaseSeoAnalyzer;

const USER_AGENT: &str = "TrafficTunerBot/1.0 (+https://traffictuner.site)";

pub struct HtmlSeoAnalyzer {
    client: Client,
}

impl HtmlSeoAnalyzer {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build SEO HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BaseSeoAnalyzer for HtmlSeoAnalyzer {
    async fn analyze(&self, url: &str) -> Result<AnalysisResult> {
        let page_url = Url::parse(url).with_context(|| format!("invalid domain URL: {}", url))?;

        let started = Instant::now();
        let response = self
            .client
            .get(page_url.clone())
            .send()
            .await
            .with_context(|| format!("failed to fetch {}", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("fetching {} returned HTTP {}", url, status));
        }

        let html = response
            .text()
            .await
            .with_context(|| format!("failed to read body of {}", url))?;
        let fetch_time = started.elapsed();

        debug!(url = %url, bytes = html.len(), fetch_ms = fetch_time.as_millis() as u64, "page fetched for SEO analysis");

        Ok(score_html(&html, &page_url, fetch_time))
    }
}

/// Scores a fetched page. The overall score is the mean of the factor scores.
pub fn score_html(html: &str, page_url: &Url, fetch_time: Duration) -> AnalysisResult {
    let document = Html::parse_document(html);

    let checks = [
        check_title(&document),
        check_meta_description(&document),
        check_headings(&document),
        check_internal_links(&document, page_url),
        check_page_speed(fetch_time),
        check_viewport(&document),
    ];

    let mut factors = Map::new();
    let mut recommendations = Vec::new();
    let mut total = 0.0;

    for check in &checks {
        factors.insert(check.name.to_string(), factor(check.score));
        total += check.score;

        if let Some(advice) = check.advice {
            if check.score < 75.0 {
                let priority = if check.score < 50.0 { "high" } else { "medium" };
                recommendations.push(recommendation(check.category, priority, advice, "medium"));
            }
        }
    }

    let score = (total / checks.len() as f64 * 10.0).round() / 10.0;

    AnalysisResult {
        score,
        factors,
        recommendations,
    }
}

struct Check {
    name: &'static str,
    category: &'static str,
    score: f64,
    advice: Option<&'static str>,
}

fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    Selector::parse(css)
        .map(|selector| document.select(&selector).collect())
        .unwrap_or_default()
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    select_all(document, css)
        .first()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn first_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    select_all(document, css)
        .first()
        .and_then(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_title(document: &Html) -> Check {
    let (score, advice) = match first_text(document, "title").map(|t| t.chars().count()) {
        None => (0.0, "Add a descriptive title tag to every page"),
        Some(len) if len < 30 => (60.0, "Lengthen the title tag to 30-60 characters"),
        Some(len) if len > 60 => (70.0, "Shorten the title tag to 30-60 characters"),
        Some(_) => (100.0, ""),
    };
    Check {
        name: "title_tags",
        category: "Title Tags",
        score,
        advice: Some(advice).filter(|a| !a.is_empty()),
    }
}

fn check_meta_description(document: &Html) -> Check {
    let description = first_attr(document, "meta[name='description']", "content");
    let (score, advice) = match description.map(|d| d.chars().count()) {
        None => (0.0, "Add compelling meta descriptions to improve click-through rates"),
        Some(len) if len < 70 => (60.0, "Expand the meta description to 70-160 characters"),
        Some(len) if len > 160 => (70.0, "Trim the meta description to 70-160 characters"),
        Some(_) => (100.0, ""),
    };
    Check {
        name: "meta_descriptions",
        category: "Meta Descriptions",
        score,
        advice: Some(advice).filter(|a| !a.is_empty()),
    }
}

fn check_headings(document: &Html) -> Check {
    let h1_count = select_all(document, "h1").len();
    let has_h2 = !select_all(document, "h2").is_empty();

    let mut score: f64 = match h1_count {
        0 => 30.0,
        1 => 100.0,
        _ => 70.0,
    };
    if !has_h2 {
        score -= 15.0;
    }

    Check {
        name: "headings",
        category: "Headings",
        score: score.max(0.0),
        advice: Some("Use exactly one H1 and organise sections with H2 headings"),
    }
}

fn check_internal_links(document: &Html, page_url: &Url) -> Check {
    let internal = select_all(document, "a[href]")
        .iter()
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| page_url.join(href).ok())
        .filter(|target| target.host_str() == page_url.host_str())
        .count();

    let score = match internal {
        0 => 20.0,
        1..=4 => 60.0,
        5..=19 => 80.0,
        _ => 95.0,
    };

    Check {
        name: "internal_links",
        category: "Internal Linking",
        score,
        advice: Some("Improve internal link structure for better crawlability"),
    }
}

fn check_page_speed(fetch_time: Duration) -> Check {
    let score = match fetch_time.as_millis() {
        0..=999 => 90.0,
        1000..=2499 => 75.0,
        2500..=4999 => 50.0,
        _ => 25.0,
    };
    Check {
        name: "page_speed",
        category: "Page Speed",
        score,
        advice: Some("Reduce server response time and page weight"),
    }
}

fn check_viewport(document: &Html) -> Check {
    let score = match first_attr(document, "meta[name='viewport']", "content") {
        Some(v) if v.contains("width=device-width") => 100.0,
        Some(_) => 60.0,
        None => 20.0,
    };
    Check {
        name: "mobile_friendly",
        category: "Mobile Friendliness",
        score,
        advice: Some("Add a responsive viewport meta tag (width=device-width)"),
    }
}

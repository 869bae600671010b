// ============================================================================
// NASA APOD API Integration
// ============================================================================
// Base URL: https://api.nasa.gov/planetary/apod
// Rate Limit: 1,000 requests/hour with a personal key, 30/hour with DEMO_KEY
// API Key: REQUIRED (free signup at api.nasa.gov, DEMO_KEY works for testing)
// ============================================================================

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::error::{ApodError, Result};

pub const API_BASE_URL: &str = "https://api.nasa.gov/planetary/apod";
pub const USER_AGENT: &str = concat!("apod-wallpaper/", env!("CARGO_PKG_VERSION"));
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

// Longest error body echoed back to the user
const MAX_ERROR_BODY: usize = 200;

// ============================================================================
// API Response Structures
// ============================================================================
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Image,
    Video,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApodEntry {
    pub date: String,
    pub title: String,
    #[serde(default)]
    pub explanation: String,
    pub url: String,
    pub hdurl: Option<String>,
    #[serde(default)]
    pub media_type: MediaType,
    pub copyright: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl ApodEntry {
    /// Best available image link: HD when the API provides one
    pub fn image_url(&self) -> &str {
        match self.hdurl.as_deref() {
            Some(hd) if !hd.is_empty() => hd,
            _ => &self.url,
        }
    }

    pub fn is_video(&self) -> bool {
        self.media_type == MediaType::Video
    }
}

// Error bodies come in two shapes depending on which layer rejected the request
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Build the request URL, optionally pinned to a single date
pub fn build_api_url(api_key: &str, date: Option<NaiveDate>) -> String {
    let mut url = format!(
        "{}?api_key={}&thumbs=true",
        API_BASE_URL,
        urlencoding::encode(api_key)
    );
    if let Some(date) = date {
        url.push_str(&format!("&date={}", date.format("%Y-%m-%d")));
    }
    url
}

pub fn build_client() -> Result<Client> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?;
    Ok(client)
}

/// Fetch and decode one APOD record
pub fn fetch_entry(client: &Client, url: &str) -> Result<ApodEntry> {
    let response = client.get(url).send()?;
    let status = response.status();
    let body = response.text()?;

    if !status.is_success() {
        return Err(ApodError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    parse_entry(&body)
}

pub fn parse_entry(body: &str) -> Result<ApodEntry> {
    Ok(serde_json::from_str(body)?)
}

/// Pull a readable message out of an API error body
fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(detail) = parsed.error {
            match (detail.code, detail.message) {
                (Some(code), Some(message)) => return format!("{} ({})", message, code),
                (None, Some(message)) => return message,
                (Some(code), None) => return code,
                (None, None) => {}
            }
        }
        if let Some(msg) = parsed.msg {
            return msg;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    if trimmed.chars().count() > MAX_ERROR_BODY {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
        format!("{}...", cut)
    } else {
        trimmed.to_string()
    }
}

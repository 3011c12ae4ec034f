//! User-agent classification for session device labels.
//!
//! Extracts coarse device/browser/OS families from a user-agent string
//! without external dependencies. The labels are advisory (shown in the
//! sessions listing and used for new-device detection), so family-level
//! precision is enough; versions are deliberately not tracked.

use serde::{Deserialize, Serialize};

/// Coarse device information derived from a user-agent string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device class: `"mobile"`, `"tablet"`, or `"desktop"`.
    pub device: String,
    /// Browser family, or `"unknown"`.
    pub browser: String,
    /// Operating system family, or `"unknown"`.
    pub os: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device: "desktop".to_string(),
            browser: "unknown".to_string(),
            os: "unknown".to_string(),
        }
    }
}

/// Classify a user-agent string into device/browser/OS families.
pub fn classify(user_agent: &str) -> DeviceInfo {
    DeviceInfo {
        device: detect_device(user_agent),
        browser: detect_browser(user_agent),
        os: detect_os(user_agent),
    }
}

/// Coarse risk label for a session listing, based on how much of the
/// user-agent could be classified. Unclassifiable clients (scripts,
/// unusual tooling) get flagged for a closer look.
pub fn risk_label(info: &DeviceInfo) -> &'static str {
    match (info.browser.as_str(), info.os.as_str()) {
        ("unknown", "unknown") => "high",
        ("unknown", _) | (_, "unknown") => "medium",
        _ => "low",
    }
}

fn detect_device(user_agent: &str) -> String {
    let ua = user_agent.to_lowercase();

    // Tablets first: iPads and Android builds without the "mobile" token.
    if ua.contains("ipad") || (ua.contains("android") && !ua.contains("mobile")) {
        return "tablet".to_string();
    }

    if ua.contains("mobile")
        || ua.contains("iphone")
        || ua.contains("ipod")
        || ua.contains("android")
        || ua.contains("windows phone")
    {
        return "mobile".to_string();
    }

    "desktop".to_string()
}

fn detect_browser(user_agent: &str) -> String {
    // Order matters: Chromium-based browsers embed "Chrome/" and
    // everything embeds "Safari/".
    if user_agent.contains("Edg/") || user_agent.contains("Edge/") {
        return "Edge".to_string();
    }
    if user_agent.contains("OPR/") || user_agent.contains("Opera/") {
        return "Opera".to_string();
    }
    if user_agent.contains("Chrome/") && !user_agent.contains("Chromium") {
        return "Chrome".to_string();
    }
    if user_agent.contains("Firefox/") {
        return "Firefox".to_string();
    }
    if user_agent.contains("Safari/") && !user_agent.contains("Chrome") {
        return "Safari".to_string();
    }
    "unknown".to_string()
}

fn detect_os(user_agent: &str) -> String {
    // iOS before macOS: iOS user agents contain "like Mac OS X".
    if user_agent.contains("iPhone") || user_agent.contains("iPad") || user_agent.contains("iPod")
    {
        return "iOS".to_string();
    }
    if user_agent.contains("Android") {
        return "Android".to_string();
    }
    if user_agent.contains("Windows") {
        return "Windows".to_string();
    }
    if user_agent.contains("Mac OS X") || user_agent.contains("Macintosh") {
        return "macOS".to_string();
    }
    if user_agent.contains("Linux") {
        return "Linux".to_string();
    }
    "unknown".to_string()
}

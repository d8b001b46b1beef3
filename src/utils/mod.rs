//! Utility functions and helpers for oasis-export
//!
//! This module provides common utility functions used throughout the application:
//! - String truncation for log excerpts
//! - Duration parsing and formatting
//! - Connection string sanitizing
//! - Validation functions

use std::time::Duration;

/// String utilities
pub mod string {
    /// Truncate string to a maximum number of characters
    ///
    /// # Arguments
    /// * `s` - String to truncate
    /// * `max_chars` - Maximum length in characters
    ///
    /// # Returns
    /// * `String` - Truncated string with ellipsis if needed
    pub fn truncate(s: &str, max_chars: usize) -> String {
        if s.chars().count() <= max_chars {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

/// Time and duration utilities
pub mod time {
    use super::Duration;

    /// Format duration as human-readable string
    ///
    /// # Arguments
    /// * `duration` - Duration to format
    ///
    /// # Returns
    /// * `String` - Formatted duration (e.g., "1m 30s")
    pub fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        let millis = duration.subsec_millis();

        if secs == 0 {
            return format!("{}ms", millis);
        }

        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        let mut parts = Vec::new();

        if hours > 0 {
            parts.push(format!("{}h", hours));
        }
        if minutes > 0 {
            parts.push(format!("{}m", minutes));
        }
        if seconds > 0 || parts.is_empty() {
            parts.push(format!("{}s", seconds));
        }

        parts.join(" ")
    }

    /// Parse duration string (e.g., "30s", "5m", "1h", or bare seconds)
    ///
    /// # Arguments
    /// * `s` - Duration string
    ///
    /// # Returns
    /// * `Option<Duration>` - Parsed duration or None
    pub fn parse_duration(s: &str) -> Option<Duration> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        if let Ok(secs) = s.parse::<u64>() {
            return Some(Duration::from_secs(secs));
        }

        let (idx, unit) = s.char_indices().last()?;
        let num: u64 = s[..idx].parse().ok()?;

        let secs = match unit {
            's' => num,
            'm' => num.checked_mul(60)?,
            'h' => num.checked_mul(3600)?,
            _ => return None,
        };
        Some(Duration::from_secs(secs))
    }
}

/// Validation utilities
pub mod validate {
    /// Validate MongoDB database name
    ///
    /// # Arguments
    /// * `name` - Database name to validate
    ///
    /// # Returns
    /// * `bool` - True if valid
    pub fn is_valid_database_name(name: &str) -> bool {
        if name.is_empty() || name.len() > 64 {
            return false;
        }

        let invalid_chars = ['/', '\\', '.', ' ', '"', '$', '*', '<', '>', ':', '|', '?'];
        !name.chars().any(|c| invalid_chars.contains(&c))
    }

    /// Validate MongoDB collection name
    ///
    /// # Arguments
    /// * `name` - Collection name to validate
    ///
    /// # Returns
    /// * `bool` - True if valid
    pub fn is_valid_collection_name(name: &str) -> bool {
        if name.is_empty() || name.len() > 120 {
            return false;
        }

        if name.starts_with("system.") {
            return false;
        }

        let invalid_chars = ['$', '\0'];
        !name.chars().any(|c| invalid_chars.contains(&c))
    }

    /// Validate MongoDB connection URI
    ///
    /// # Arguments
    /// * `uri` - Connection URI to validate
    ///
    /// # Returns
    /// * `bool` - True if valid format
    pub fn is_valid_connection_uri(uri: &str) -> bool {
        uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://")
    }
}

/// Sanitize a connection URI by hiding credentials
///
/// # Arguments
/// * `uri` - The URI to sanitize
///
/// # Returns
/// * `String` - URI with everything between `://` and `@` replaced by `***`
pub fn sanitize_uri(uri: &str) -> String {
    if let Some(proto_end) = uri.find("://") {
        if let Some(host_start) = uri.rfind('@') {
            if host_start > proto_end {
                let proto = &uri[..proto_end + 3];
                let host = &uri[host_start..];
                return format!("{}***{}", proto, host);
            }
        }
    }
    if uri.contains('@') {
        "mongodb://***".to_string()
    } else {
        uri.to_string()
    }
}

//! Utility helpers — path resolution, rounding, string manipulation.

use std::path::PathBuf;

/// Decimal places kept on every cost figure.
pub const COST_DECIMALS: i32 = 4;

/// Get the openmon data directory (e.g. `~/.openmon/`).
pub fn get_data_path() -> PathBuf {
    let home = dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".openmon")
}

/// Get current ISO 8601 timestamp.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Round to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Round a USD amount to [`COST_DECIMALS`] places.
pub fn round_cost(value: f64) -> f64 {
    round_to(value, COST_DECIMALS)
}

/// Truncate a string to `max_len` characters, adding "..." if truncated.
/// Unicode-safe.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Mask a credential for display, keeping the first 4 characters.
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let head: String = secret.chars().take(4).collect();
    format!("{head}****")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        let result = truncate_string("hello world, this is a long string", 15);
        assert_eq!(result, "hello world,...");
        assert!(result.len() <= 15);
    }

    #[test]
    fn test_truncate_unicode() {
        let result = truncate_string("こんにちは世界です", 5);
        assert_eq!(result, "こん...");
    }

    #[test]
    fn test_round_cost() {
        assert_eq!(round_cost(0.000_049), 0.0);
        assert_eq!(round_cost(0.000_06), 0.0001);
        assert_eq!(round_cost(1.234_56), 1.2346);
    }

    #[test]
    fn test_round_to_places() {
        assert_eq!(round_to(2.5555, 2), 2.56);
        assert_eq!(round_to(10.0, 0), 10.0);
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("sk-abcdef"), "sk-a****");
        assert_eq!(mask_secret(""), "");
    }

    #[test]
    fn test_timestamp_is_valid() {
        let ts = timestamp();
        chrono::DateTime::parse_from_rfc3339(&ts).unwrap();
    }

    #[test]
    fn test_data_path_ends_with_openmon() {
        let path = get_data_path();
        assert!(path.ends_with(".openmon"));
    }
}

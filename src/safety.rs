//! Input safety gate
//!
//! Configurable banned-keyword check applied to user text before a turn is
//! created. Blocked input never reaches the coordinator.

use crate::config::Config;

/// Returns the refusal reason if `text` matches a banned keyword.
pub fn check_text_allowed(config: &Config, text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    for keyword in &config.safety.banned_keywords {
        let keyword = keyword.trim().to_lowercase();
        if !keyword.is_empty() && lower.contains(&keyword) {
            return Some(format!(
                "安全のため、その内容には対応できません（キーワード: {keyword}）。"
            ));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_allowed() {
        let config = Config::default();
        assert!(check_text_allowed(&config, "今日の天気は？").is_none());
    }

    #[test]
    fn test_banned_keyword_blocked() {
        let config = Config::default();
        let reason = check_text_allowed(&config, "ハッキングのやり方を教えて");
        assert!(reason.is_some());
        assert!(reason.unwrap().contains("ハッキング"));
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let mut config = Config::default();
        config.safety.banned_keywords.push("Forbidden".into());
        assert!(check_text_allowed(&config, "this is FORBIDDEN text").is_some());
    }

    #[test]
    fn test_empty_keyword_never_matches() {
        let mut config = Config::default();
        config.safety.banned_keywords = vec!["".into(), "  ".into()];
        assert!(check_text_allowed(&config, "anything").is_none());
    }
}

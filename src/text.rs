//! Reply post-processing
//!
//! Local models occasionally leak scaffolding into their replies: fenced
//! code blocks of internal logs, `<|channel|>`-style control tags, tool
//! routing lines. Everything here is pure string-in, string-out.

use once_cell::sync::Lazy;
use regex::Regex;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[\s\S]*?```").unwrap());
static CONTROL_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<\|[^>]*\|>").unwrap());
static INTERNAL_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)(?:commentary\s+to=|to=|recipient_name|repo_browser|functions\.)").unwrap());
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Strip internal artifacts from a model reply before display.
pub fn sanitize_reply(reply: &str) -> String {
    let stripped = CODE_FENCE.replace_all(reply, "");
    let stripped = CONTROL_TAG.replace_all(&stripped, "");
    let kept: Vec<&str> = stripped
        .lines()
        .filter(|line| !INTERNAL_LINE.is_match(line))
        .collect();
    let joined = kept.join("\n");
    BLANK_RUNS.replace_all(&joined, "\n\n").trim().to_string()
}

/// Truncate to at most `max_chars` characters, appending `…` when cut.
/// Counts characters, not bytes, so multibyte text is never split.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{kept}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate_chars("こんにちは", 10), "こんにちは");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let long = "あ".repeat(50);
        let cut = truncate_chars(&long, 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn test_sanitize_removes_code_fences() {
        let reply = "はい！\n```\ninternal log dump\n```\nどうぞ。";
        assert_eq!(sanitize_reply(reply), "はい！\n\nどうぞ。");
    }

    #[test]
    fn test_sanitize_removes_control_tags() {
        let reply = "<|channel|>こんにちは<|end|>";
        assert_eq!(sanitize_reply(reply), "こんにちは");
    }

    #[test]
    fn test_sanitize_drops_tool_routing_lines() {
        let reply = "いい質問だね。\ncommentary to=functions.search\nこう思うよ。";
        assert_eq!(sanitize_reply(reply), "いい質問だね。\nこう思うよ。");
    }

    #[test]
    fn test_sanitize_can_empty_a_reply() {
        assert_eq!(sanitize_reply("```only internals```"), "");
    }

    #[test]
    fn test_sanitize_plain_reply_untouched() {
        assert_eq!(sanitize_reply("にゃーん！元気だよ。"), "にゃーん！元気だよ。");
    }
}

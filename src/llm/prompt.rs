//! Prompt assembly
//!
//! Builds the message list for one completion call: system prompt, answer
//! length instruction, long-term summary, recent history, then the user
//! text. System-role history entries (fallback notices) are not replayed.

use super::ChatMessage;
use crate::config::Config;
use crate::memory::{ChatRole, MemoryStore};

pub fn build_messages(config: &Config, memory: &MemoryStore, user_text: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::new();

    if !config.llm.system_prompt.trim().is_empty() {
        messages.push(ChatMessage::system(config.llm.system_prompt.trim()));
    }
    if config.net.answer_max_chars > 0 {
        messages.push(ChatMessage::system(format!(
            "回答は最大{}文字以内にしてください。改行や箇条書きは必要最小限にし、簡潔な日本語で答えてください。",
            config.net.answer_max_chars
        )));
    }
    if !memory.summary().is_empty() {
        messages.push(ChatMessage::system(format!(
            "これまでの会話の要約:\n{}",
            memory.summary()
        )));
    }
    if let Some(name) = memory.user_name() {
        messages.push(ChatMessage::system(format!("ユーザーの名前は{name}です。")));
    }

    for entry in memory.recent(config.llm.context_turns * 2) {
        match entry.role {
            ChatRole::User => messages.push(ChatMessage::user(entry.text.clone())),
            ChatRole::Assistant => messages.push(ChatMessage::assistant(entry.text.clone())),
            ChatRole::System => {}
        }
    }

    messages.push(ChatMessage::user(user_text));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_text_is_last() {
        let config = Config::default();
        let memory = MemoryStore::in_memory(&config);

        let messages = build_messages(&config, &memory, "こんにちは");
        let last = messages.last().unwrap();
        assert_eq!(last.role, "user");
        assert_eq!(last.content, "こんにちは");
    }

    #[test]
    fn test_system_prompt_leads() {
        let config = Config::default();
        let memory = MemoryStore::in_memory(&config);

        let messages = build_messages(&config, &memory, "hi");
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, config.llm.system_prompt);
    }

    #[test]
    fn test_history_is_replayed_in_order() {
        let config = Config::default();
        let mut memory = MemoryStore::in_memory(&config);
        memory.record_exchange("一つ目", "答え一");
        memory.record_exchange("二つ目", "答え二");

        let messages = build_messages(&config, &memory, "三つ目");
        let turns: Vec<(&str, &str)> = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| (m.role.as_str(), m.content.as_str()))
            .collect();
        assert_eq!(
            turns,
            vec![
                ("user", "一つ目"),
                ("assistant", "答え一"),
                ("user", "二つ目"),
                ("assistant", "答え二"),
                ("user", "三つ目"),
            ]
        );
    }

    #[test]
    fn test_context_window_is_bounded() {
        let mut config = Config::default();
        config.llm.context_turns = 2;
        config.memory.max_history = 100;
        let mut memory = MemoryStore::in_memory(&config);
        for i in 0..10 {
            memory.record_exchange(&format!("q{i}"), &format!("a{i}"));
        }

        let messages = build_messages(&config, &memory, "now");
        let history: Vec<&str> = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| m.content.as_str())
            .collect();
        // Two most recent exchanges plus the new input.
        assert_eq!(history, vec!["q8", "a8", "q9", "a9", "now"]);
    }

    #[test]
    fn test_fallback_notices_not_replayed() {
        let config = Config::default();
        let mut memory = MemoryStore::in_memory(&config);
        memory.record_failure("落ちた質問", "いまは答えられないよ。");

        let messages = build_messages(&config, &memory, "次");
        assert!(!messages
            .iter()
            .any(|m| m.content.contains("いまは答えられないよ")));
    }

    #[test]
    fn test_summary_included_when_present() {
        let config = Config::default();
        let mut memory = MemoryStore::in_memory(&config);
        memory.set_summary("ユーザーは猫が好き");

        let messages = build_messages(&config, &memory, "hi");
        assert!(messages
            .iter()
            .any(|m| m.role == "system" && m.content.contains("ユーザーは猫が好き")));
    }
}

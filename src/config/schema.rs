//! Settings form schema
//!
//! A pure description of the settings UI: tabs of field descriptors keyed by
//! dotted config paths. The presentation layer renders widgets from these
//! descriptors and edits a JSON draft of the configuration; nothing here
//! touches live state.

use serde_json::Value;

/// Widget family for a settings field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Bool,
    Int { min: i64, max: i64 },
    Float { min: f64, max: f64 },
    Text,
    Password,
    TextArea,
    /// One string per line in the editor, a JSON array in the document
    StringList,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    /// Dotted path into the config document, e.g. `llm.base_url`
    pub path: &'static str,
    pub label: &'static str,
    pub hint: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy)]
pub struct TabDescriptor {
    pub title: &'static str,
    pub fields: &'static [FieldDescriptor],
}

const MASCOT_TAB: &[FieldDescriptor] = &[
    FieldDescriptor {
        path: "mascot.name",
        label: "名前",
        hint: "マスコットの表示名",
        kind: FieldKind::Text,
    },
    FieldDescriptor {
        path: "profile.user_name",
        label: "ユーザー名",
        hint: "空なら未設定",
        kind: FieldKind::Text,
    },
];

const TALK_TAB: &[FieldDescriptor] = &[
    FieldDescriptor {
        path: "talk.enabled",
        label: "おしゃべり",
        hint: "",
        kind: FieldKind::Bool,
    },
    FieldDescriptor {
        path: "talk.auto_talk_min_sec",
        label: "自発トーク最小間隔(秒)",
        hint: "",
        kind: FieldKind::Float { min: 1.0, max: 3600.0 },
    },
    FieldDescriptor {
        path: "talk.auto_talk_max_sec",
        label: "自発トーク最大間隔(秒)",
        hint: "",
        kind: FieldKind::Float { min: 1.0, max: 3600.0 },
    },
    FieldDescriptor {
        path: "talk.messages",
        label: "自発トーク文言",
        hint: "1行につき1メッセージ",
        kind: FieldKind::StringList,
    },
    FieldDescriptor {
        path: "talk.unknown_reply",
        label: "不明時の応答",
        hint: "",
        kind: FieldKind::Text,
    },
];

const LLM_TAB: &[FieldDescriptor] = &[
    FieldDescriptor {
        path: "llm.enabled",
        label: "LLMを使う",
        hint: "",
        kind: FieldKind::Bool,
    },
    FieldDescriptor {
        path: "llm.base_url",
        label: "エンドポイント",
        hint: "OpenAI互換APIのベースURL",
        kind: FieldKind::Text,
    },
    FieldDescriptor {
        path: "llm.api_key",
        label: "APIキー",
        hint: "ローカルサーバーなら空でOK",
        kind: FieldKind::Password,
    },
    FieldDescriptor {
        path: "llm.model",
        label: "モデル",
        hint: "",
        kind: FieldKind::Text,
    },
    FieldDescriptor {
        path: "llm.temperature",
        label: "temperature",
        hint: "",
        kind: FieldKind::Float { min: 0.0, max: 2.0 },
    },
    FieldDescriptor {
        path: "llm.max_tokens",
        label: "最大トークン数",
        hint: "",
        kind: FieldKind::Int { min: 1, max: 32_768 },
    },
    FieldDescriptor {
        path: "llm.context_turns",
        label: "文脈に含める往復数",
        hint: "",
        kind: FieldKind::Int { min: 1, max: 100 },
    },
    FieldDescriptor {
        path: "llm.system_prompt",
        label: "システムプロンプト",
        hint: "",
        kind: FieldKind::TextArea,
    },
];

const SPEECH_TAB: &[FieldDescriptor] = &[
    FieldDescriptor {
        path: "speech.enabled",
        label: "音声入力",
        hint: "",
        kind: FieldKind::Bool,
    },
    FieldDescriptor {
        path: "speech.base_url",
        label: "認識エンドポイント",
        hint: "OpenAI互換 transcription API",
        kind: FieldKind::Text,
    },
    FieldDescriptor {
        path: "speech.model",
        label: "認識モデル",
        hint: "",
        kind: FieldKind::Text,
    },
    FieldDescriptor {
        path: "speech.language",
        label: "言語",
        hint: "例: ja",
        kind: FieldKind::Text,
    },
];

const NET_TAB: &[FieldDescriptor] = &[
    FieldDescriptor {
        path: "net.answer_max_chars",
        label: "応答の最大文字数",
        hint: "",
        kind: FieldKind::Int { min: 20, max: 4000 },
    },
    FieldDescriptor {
        path: "net.answer_timeout_ms",
        label: "応答タイムアウト(ms)",
        hint: "締め切りを過ぎた応答は破棄",
        kind: FieldKind::Int { min: 100, max: 600_000 },
    },
];

const MEMORY_TAB: &[FieldDescriptor] = &[
    FieldDescriptor {
        path: "memory.max_history",
        label: "会話履歴の保持数",
        hint: "",
        kind: FieldKind::Int { min: 1, max: 1000 },
    },
    FieldDescriptor {
        path: "learning.summarize_enabled",
        label: "要約を更新する",
        hint: "",
        kind: FieldKind::Bool,
    },
    FieldDescriptor {
        path: "learning.max_summary_chars",
        label: "要約の最大文字数",
        hint: "",
        kind: FieldKind::Int { min: 120, max: 4000 },
    },
    FieldDescriptor {
        path: "safety.banned_keywords",
        label: "禁止キーワード",
        hint: "1行につき1キーワード",
        kind: FieldKind::StringList,
    },
];

const TABS: &[TabDescriptor] = &[
    TabDescriptor {
        title: "マスコット",
        fields: MASCOT_TAB,
    },
    TabDescriptor {
        title: "トーク",
        fields: TALK_TAB,
    },
    TabDescriptor {
        title: "LLM",
        fields: LLM_TAB,
    },
    TabDescriptor {
        title: "音声",
        fields: SPEECH_TAB,
    },
    TabDescriptor {
        title: "通信",
        fields: NET_TAB,
    },
    TabDescriptor {
        title: "記憶",
        fields: MEMORY_TAB,
    },
];

/// The settings form, as renderable descriptors
pub fn settings_schema() -> &'static [TabDescriptor] {
    TABS
}

/// Look up a value by dotted path
pub fn value_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for key in path.split('.') {
        current = current.as_object()?.get(key)?;
    }
    Some(current)
}

/// Set a value by dotted path, creating intermediate objects as needed
pub fn set_value(root: &mut Value, path: &str, value: Value) {
    let mut current = root;
    let mut keys = path.split('.').peekable();
    while let Some(key) = keys.next() {
        if keys.peek().is_none() {
            if let Some(object) = current.as_object_mut() {
                object.insert(key.to_string(), value);
            }
            return;
        }
        let object = match current.as_object_mut() {
            Some(object) => object,
            None => return,
        };
        current = object
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_every_schema_path_resolves_in_default_config() {
        let document = serde_json::to_value(Config::default()).unwrap();
        for tab in settings_schema() {
            for field in tab.fields {
                assert!(
                    value_at(&document, field.path).is_some(),
                    "schema path {} does not exist in the config document",
                    field.path
                );
            }
        }
    }

    #[test]
    fn test_value_round_trip_by_path() {
        let mut document = serde_json::to_value(Config::default()).unwrap();
        set_value(&mut document, "llm.model", Value::String("tiny".into()));
        assert_eq!(
            value_at(&document, "llm.model"),
            Some(&Value::String("tiny".into()))
        );

        // Edited document still deserializes into a Config.
        let config: Config = serde_json::from_value(document).unwrap();
        assert_eq!(config.llm.model, "tiny");
    }

    #[test]
    fn test_set_value_creates_missing_objects() {
        let mut document = Value::Object(Default::default());
        set_value(&mut document, "a.b.c", Value::Bool(true));
        assert_eq!(value_at(&document, "a.b.c"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_value_at_missing_path() {
        let document = serde_json::to_value(Config::default()).unwrap();
        assert!(value_at(&document, "llm.no_such_key").is_none());
        assert!(value_at(&document, "nope").is_none());
    }
}

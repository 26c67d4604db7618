use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_OTHER_LABEL: &str = "Other";

/// Analysis modules understood by the backend, in its preferred run order.
pub const ANALYSIS_MODULES: [&str; 14] = [
    "dataset_overview",
    "temporal_patterns",
    "unbroken_streaks",
    "ghost_periods",
    "reaction_analysis",
    "response_metrics",
    "conversation_patterns",
    "word_analysis",
    "emoji_analysis",
    "sentiment_analysis",
    "topic_modeling",
    "user_behavior",
    "argument_analysis",
    "relationship_metrics",
];

pub fn is_known_module(name: &str) -> bool {
    ANALYSIS_MODULES.contains(&name)
}

/// One chat message as produced by the backend.
///
/// Stored as the raw JSON object so fields the client does not know about
/// survive an export/import cycle untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ChatMessage {
    fields: Map<String, Value>,
}

impl ChatMessage {
    pub fn new(sender: &str, message: &str, timestamp: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("sender".into(), Value::String(sender.to_string()));
        fields.insert("message".into(), Value::String(message.to_string()));
        fields.insert("timestamp".into(), Value::String(timestamp.to_string()));
        Self { fields }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.fields
            .insert("source".into(), Value::String(source.to_string()));
        self
    }

    pub fn sender(&self) -> &str {
        self.fields
            .get("sender")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn message(&self) -> &str {
        self.fields
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.fields.get("timestamp").and_then(Value::as_str)
    }

    pub fn source(&self) -> Option<&str> {
        self.fields.get("source").and_then(Value::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl TryFrom<Map<String, Value>> for ChatMessage {
    type Error = String;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        match fields.get("sender") {
            Some(Value::String(_)) => {}
            Some(_) => return Err("message sender must be a string".to_string()),
            None => return Err("message is missing a sender".to_string()),
        }
        if !fields.contains_key("message") {
            return Err("message is missing its text".to_string());
        }
        Ok(Self { fields })
    }
}

impl From<ChatMessage> for Map<String, Value> {
    fn from(message: ChatMessage) -> Self {
        message.fields
    }
}

/// Messages after server-side parsing of the uploaded exports.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessedData {
    pub messages: Vec<ChatMessage>,
}

impl ProcessedData {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Sorted, case-sensitive set of non-empty sender names.
    pub fn unique_senders(&self) -> Vec<String> {
        self.messages
            .iter()
            .map(ChatMessage::sender)
            .filter(|sender| !sender.is_empty())
            .map(ToOwned::to_owned)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterMetadata {
    /// Original sender name to `"source, message_count"`, in first-seen order.
    #[serde(default)]
    pub participants: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_total: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered_messages: Option<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterSettings {
    /// Group name to member senders, in the order the filter was sent.
    #[serde(default)]
    pub group_mappings: Map<String, Value>,
    #[serde(default)]
    pub unassigned_label: String,
    #[serde(default)]
    pub removed_senders: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FilterSettings {
    /// Groups with their string members; non-string entries are skipped.
    pub fn groups(&self) -> impl Iterator<Item = (&str, Vec<&str>)> {
        self.group_mappings.iter().map(|(group, members)| {
            let members = members
                .as_array()
                .map(|members| members.iter().filter_map(Value::as_str).collect::<Vec<_>>())
                .unwrap_or_default();
            (group.as_str(), members)
        })
    }
}

/// Messages after grouping and removal, with the settings that produced them.
///
/// Keys the client does not model are kept in `extra` and written back after
/// the known ones.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilteredData {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub metadata: FilterMetadata,
    #[serde(default)]
    pub filter_settings: FilterSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FilteredData {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Analysis output keyed by module name. The per-module payloads are opaque.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisReport(Map<String, Value>);

impl AnalysisReport {
    pub fn new(sections: Map<String, Value>) -> Self {
        Self(sections)
    }

    pub fn module(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Sender grouping sent to the backend's filter endpoint.
///
/// A sender belongs to at most one group and is never grouped and removed at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub group_mappings: BTreeMap<String, Vec<String>>,
    pub remove: Vec<String>,
    pub unassigned_label: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            group_mappings: BTreeMap::new(),
            remove: Vec::new(),
            unassigned_label: DEFAULT_OTHER_LABEL.to_string(),
        }
    }
}

impl FilterConfig {
    pub fn assign(&mut self, sender: &str, group: &str) {
        self.unassign(sender);
        self.remove.retain(|removed| removed != sender);
        self.group_mappings
            .entry(group.to_string())
            .or_default()
            .push(sender.to_string());
    }

    pub fn unassign(&mut self, sender: &str) {
        for members in self.group_mappings.values_mut() {
            members.retain(|member| member != sender);
        }
        self.group_mappings.retain(|_, members| !members.is_empty());
    }

    pub fn mark_removed(&mut self, sender: &str) {
        self.unassign(sender);
        if !self.remove.iter().any(|removed| removed == sender) {
            self.remove.push(sender.to_string());
        }
    }

    pub fn restore(&mut self, sender: &str) {
        self.remove.retain(|removed| removed != sender);
    }

    pub fn set_other_label(&mut self, label: &str) {
        let label = label.trim();
        self.unassigned_label = if label.is_empty() {
            DEFAULT_OTHER_LABEL.to_string()
        } else {
            label.to_string()
        };
    }

    pub fn group_of(&self, sender: &str) -> Option<&str> {
        self.group_mappings
            .iter()
            .find(|(_, members)| members.iter().any(|member| member == sender))
            .map(|(group, _)| group.as_str())
    }

    pub fn is_removed(&self, sender: &str) -> bool {
        self.remove.iter().any(|removed| removed == sender)
    }

    /// Drops references to senders that are no longer known.
    pub fn retain_senders(&mut self, known: &[String]) {
        let known: BTreeSet<&str> = known.iter().map(String::as_str).collect();
        for members in self.group_mappings.values_mut() {
            members.retain(|member| known.contains(member.as_str()));
        }
        self.group_mappings.retain(|_, members| !members.is_empty());
        self.remove.retain(|removed| known.contains(removed.as_str()));
    }
}

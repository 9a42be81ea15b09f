use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Author name the model uses for its rationale entry in `flagged`
pub const ANALYZER_AUTHOR: &str = "AI-ANALYZER";

/// One flagged finding with its surrounding conversation.
///
/// Only the two context arrays are typed, since they are what gets bounded.
/// Messages stay as raw JSON, and `instance_ID`, `flagged` and any other keys
/// the model produced are carried through untouched in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInstance {
    /// Messages before the flagged one, oldest first
    #[serde(rename = "context-before")]
    pub context_before: Vec<Value>,
    /// Messages after the flagged one, oldest first
    #[serde(rename = "context-after")]
    pub context_after: Vec<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl AnalysisInstance {
    /// Bound both context sides to `max` messages.
    ///
    /// `context_before` keeps the most recent messages (closest to the flagged
    /// one), `context_after` keeps the earliest.
    pub fn truncate_context(&mut self, max: usize) {
        let before = self.context_before.len();
        if before > max {
            self.context_before.drain(..before - max);
        }
        self.context_after.truncate(max);
    }

    /// `instance_ID` exactly as the model wrote it
    pub fn instance_id(&self) -> Option<&Value> {
        self.fields.get("instance_ID")
    }

    /// The `flagged` entries, if the model produced an array there
    pub fn flagged(&self) -> Option<&[Value]> {
        self.fields
            .get("flagged")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    }

    /// The rationale the model gave for flagging, if present
    pub fn rationale(&self) -> Option<&str> {
        self.flagged()?
            .iter()
            .find(|m| m.get("author").and_then(Value::as_str) == Some(ANALYZER_AUTHOR))
            .and_then(|m| m.get("message"))
            .and_then(Value::as_str)
    }
}

/// Ordered findings returned to the caller; serializes as a bare JSON array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult {
    pub instances: Vec<AnalysisInstance>,
}

impl AnalysisResult {
    pub fn new(instances: Vec<AnalysisInstance>) -> Self {
        Self { instances }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalysisInstance> {
        self.instances.iter()
    }
}

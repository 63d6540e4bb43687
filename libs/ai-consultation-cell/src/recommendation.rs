use serde_json::Value;
use tracing::debug;

use shared_models::consultation::ConsultationOutcome;

const OPEN_FENCE: &str = "```json";
const CLOSE_FENCE: &str = "```";

/// A specialist recommendation the assistant embedded in a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub data: Value,
    pub raw: String,
}

impl Recommendation {
    pub fn specialization(&self) -> Option<String> {
        self.data["specialization"].as_str().map(str::to_string)
    }

    pub fn confidence(&self) -> Option<f64> {
        self.data["confidence"].as_f64()
    }

    pub fn outcome(&self) -> ConsultationOutcome {
        ConsultationOutcome {
            recommended_specialization: self.specialization(),
            confidence: self.confidence(),
            ai_response_raw: Some(self.raw.clone()),
        }
    }
}

pub fn has_json_block(text: &str) -> bool {
    text.contains(OPEN_FENCE)
}

/// Pulls the first fenced JSON block out of `text` and keeps it when its
/// `recommendation` field is truthy. A block without a closing fence runs to
/// the end of the text. Anything unparsable yields `None`.
pub fn extract(text: &str) -> Option<Recommendation> {
    let start = text.find(OPEN_FENCE)? + OPEN_FENCE.len();
    let rest = &text[start..];
    let block = match rest.find(CLOSE_FENCE) {
        Some(end) => &rest[..end],
        None => rest,
    };
    let raw = block.trim();

    let data: Value = match serde_json::from_str(raw) {
        Ok(data) => data,
        Err(e) => {
            debug!("Ignoring malformed recommendation block: {}", e);
            return None;
        }
    };

    if !truthy(&data["recommendation"]) {
        debug!("JSON block present but not a recommendation");
        return None;
    }

    Some(Recommendation {
        data,
        raw: raw.to_string(),
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

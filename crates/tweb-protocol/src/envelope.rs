#![forbid(unsafe_code)]

//! Reply envelope decoding.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::ProtocolError;
use crate::command::Command;

/// One unit of a parsed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Replace the element with id `target_id` by `html`.
    Element { target_id: String, html: String },
    /// Run a command.
    Script(Command),
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    records: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    html: Option<String>,
}

/// Decode a reply into ordered directives.
///
/// A blank payload decodes to no directives. Records of unknown kind and
/// script records naming an unknown command are skipped with a warning;
/// everything else that deviates from the envelope is an error.
pub fn parse_payload(payload: &str) -> Result<Vec<Directive>, ProtocolError> {
    if payload.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value =
        serde_json::from_str(payload).map_err(|e| ProtocolError::Json(e.to_string()))?;
    let envelope: RawEnvelope =
        serde_json::from_value(value).map_err(|_| ProtocolError::NotAnEnvelope)?;

    let mut directives = Vec::with_capacity(envelope.records.len());
    for (index, record) in envelope.records.into_iter().enumerate() {
        let raw = RawRecord::deserialize(&record).map_err(|_| ProtocolError::NotAnEnvelope)?;
        let kind = raw.kind.ok_or(ProtocolError::MissingKind { index })?;
        match kind.as_str() {
            "element" => {
                let target_id = raw.id.ok_or(ProtocolError::MissingField { index, field: "id" })?;
                let html = raw
                    .html
                    .ok_or(ProtocolError::MissingField { index, field: "html" })?;
                directives.push(Directive::Element { target_id, html });
            }
            "script" => match serde_json::from_value::<Command>(record) {
                Ok(command) => directives.push(Directive::Script(command)),
                Err(err) => warn!(index, error = %err, "skipping unsupported script record"),
            },
            other => warn!(index, kind = other, "skipping record of unknown kind"),
        }
    }
    Ok(directives)
}

/// Builds reply envelopes. Used by servers written against this crate and by
/// test gateways.
#[derive(Debug, Clone, Default)]
pub struct PayloadBuilder {
    records: Vec<Value>,
}

impl PayloadBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn element(mut self, id: &str, html: &str) -> Self {
        self.records
            .push(json!({"kind": "element", "id": id, "html": html}));
        self
    }

    #[must_use]
    pub fn script(mut self, command: &Command) -> Self {
        let mut record = serde_json::to_value(command).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut record {
            map.insert("kind".into(), Value::String("script".into()));
            self.records.push(record);
        }
        self
    }

    /// Append a raw record verbatim.
    #[must_use]
    pub fn raw(mut self, record: Value) -> Self {
        self.records.push(record);
        self
    }

    #[must_use]
    pub fn build(&self) -> String {
        json!({ "records": self.records }).to_string()
    }
}

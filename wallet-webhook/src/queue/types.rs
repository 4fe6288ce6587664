//! Wire envelope for events delivered by the wallet service.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// A single event as delivered by the wallet service.
///
/// The body of a delivery is a JSON array of these. `content` is kept as
/// unparsed JSON until a worker decodes it into the handler's payload type.
/// Missing fields do not fail the batch: an absent `type` never matches a
/// handler and an absent `content` is `null`, which fails at dispatch instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event type discriminator, matched against registered handlers
    #[serde(rename = "type", default)]
    pub event_type: String,
    /// Serialized payload
    #[serde(default = "null_content")]
    pub content: Box<RawValue>,
}

fn null_content() -> Box<RawValue> {
    RawValue::NULL.to_owned()
}

impl RawEvent {
    /// Build an event from a discriminator and any serializable payload.
    pub fn new<T: Serialize>(
        event_type: impl Into<String>,
        content: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: event_type.into(),
            content: serde_json::value::to_raw_value(content)?,
        })
    }

    /// Decode a delivery body into its events.
    ///
    /// All-or-nothing: a body that is not an array of event objects fails the
    /// whole batch.
    pub fn decode_batch(body: &[u8]) -> Result<Vec<RawEvent>, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

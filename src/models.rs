use crate::errors::AppError;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// The fixed trait fields of a monKey record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Traits {
    #[serde(deserialize_with = "nullable_string")]
    pub background_color: String,
    #[serde(deserialize_with = "nullable_string")]
    pub glasses: String,
    #[serde(deserialize_with = "nullable_string")]
    pub hat: String,
    #[serde(deserialize_with = "nullable_string")]
    pub misc: String,
    #[serde(deserialize_with = "nullable_string")]
    pub mouth: String,
    #[serde(deserialize_with = "nullable_string")]
    pub shirt_pants: String,
    #[serde(deserialize_with = "nullable_string")]
    pub shoes: String,
    #[serde(rename = "tail_accessory", deserialize_with = "nullable_string")]
    pub tail: String,
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One record of the trait API response: the known fields plus every field
/// the API sent, kept verbatim for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitRecord {
    pub traits: Traits,
    pub fields: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for TraitRecord {
    type Error = AppError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let traits = Traits::deserialize(Value::Object(fields.clone()))?;
        Ok(Self { traits, fields })
    }
}

/// A generated wallet merged with its fetched traits.
#[derive(Clone, PartialEq)]
pub struct Candidate {
    pub address: String,
    pub secret: String,
    pub display_name: String,
    pub traits: Traits,
    pub fields: Map<String, Value>,
}

impl Candidate {
    pub fn new(address: String, secret: String, display_name: String, record: TraitRecord) -> Self {
        Self {
            address,
            secret,
            display_name,
            traits: record.traits,
            fields: record.fields,
        }
    }

    /// File name without extension: `<display name>_<address>`.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.display_name, self.address)
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("address", &self.address)
            .field("secret", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .field("traits", &self.traits)
            .finish()
    }
}

/// Serializes the API fields with `public_address` and `private_key` added.
impl Serialize for Candidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let replaced = ["public_address", "private_key"]
            .iter()
            .filter(|key| self.fields.contains_key(**key))
            .count();
        let mut map = serializer.serialize_map(Some(self.fields.len() + 2 - replaced))?;
        for (key, value) in &self.fields {
            match key.as_str() {
                "public_address" | "private_key" => {}
                _ => map.serialize_entry(key, value)?,
            }
        }
        map.serialize_entry("public_address", &self.address)?;
        map.serialize_entry("private_key", &self.secret)?;
        map.end()
    }
}

/// Per-batch statistics emitted by a producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsDelta {
    pub examined: u64,
    pub requests: u64,
    pub matched: u64,
}

/// Run-wide counters, fed by queued [`StatsDelta`] events.
#[derive(Debug, Default)]
pub struct RunStats {
    examined: AtomicU64,
    requests: AtomicU64,
    matched: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub examined: u64,
    pub requests: u64,
    pub matched: u64,
}

impl RunStats {
    pub fn apply(&self, delta: StatsDelta) {
        if delta.examined > 0 {
            self.examined.fetch_add(delta.examined, Ordering::Relaxed);
        }
        if delta.requests > 0 {
            self.requests.fetch_add(delta.requests, Ordering::Relaxed);
        }
        if delta.matched > 0 {
            self.matched.fetch_add(delta.matched, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            examined: self.examined.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
        }
    }
}

/// What a finished run reports back to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: StatsSnapshot,
    /// Matches accepted onto the persistence queue.
    pub forwarded: u64,
    /// Matches fully written to disk.
    pub persisted: u64,
    pub previews_dropped: u64,
    pub names_reported: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> TraitRecord {
        match value {
            Value::Object(map) => TraitRecord::try_from(map).unwrap(),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_record_keeps_unknown_fields() {
        let rec = record(json!({
            "hat": "cap-backwards",
            "misc": "flamethrower",
            "tail_accessory": "bow",
            "sparkle": 3
        }));
        assert_eq!(rec.traits.hat, "cap-backwards");
        assert_eq!(rec.traits.tail, "bow");
        assert_eq!(rec.traits.glasses, "");
        assert_eq!(rec.fields["sparkle"], json!(3));
        assert_eq!(rec.fields.len(), 4);
    }

    #[test]
    fn test_null_trait_becomes_empty() {
        let rec = record(json!({"hat": null, "mouth": "smile"}));
        assert_eq!(rec.traits.hat, "");
        assert_eq!(rec.traits.mouth, "smile");
    }

    #[test]
    fn test_wrong_type_is_a_decode_error() {
        let map = match json!({"hat": 42}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert!(matches!(TraitRecord::try_from(map), Err(AppError::Decode(_))));
    }

    #[test]
    fn test_serialization_inserts_wallet_fields() {
        let candidate = Candidate::new(
            "ban_abc".to_string(),
            "00ff".to_string(),
            "Toecrusher".to_string(),
            record(json!({"hat": "crown", "extra": {"nested": true}, "private_key": "bogus"})),
        );
        let value = serde_json::to_value(&candidate).unwrap();
        assert_eq!(value["public_address"], "ban_abc");
        assert_eq!(value["private_key"], "00ff");
        assert_eq!(value["hat"], "crown");
        assert_eq!(value["extra"]["nested"], true);
        assert_eq!(value.as_object().unwrap().len(), 4);
        assert_eq!(candidate.file_stem(), "Toecrusher_ban_abc");
        assert!(!format!("{:?}", candidate).contains("00ff"));
    }

    #[test]
    fn test_run_stats_accumulate() {
        let stats = RunStats::default();
        stats.apply(StatsDelta { examined: 10, requests: 1, matched: 2 });
        stats.apply(StatsDelta { examined: 5, requests: 1, matched: 0 });
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot { examined: 15, requests: 2, matched: 2 }
        );
    }
}

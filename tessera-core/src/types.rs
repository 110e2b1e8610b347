//! Core type definitions shared by every engine module.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Identifier of an entity (room, item, character) within a zone.
///
/// Ids are allocated by the zone and stay stable for the entity's lifetime,
/// including across snapshot/restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Flat key → value state record for a component or mode.
///
/// Insertion order is preserved, so records written by [`encode`] keep the
/// field order of the source struct.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Encode any serializable state struct into a [`Record`].
///
/// # Errors
/// Fails if `state` does not serialize to a JSON object.
pub fn encode<T: Serialize>(state: &T) -> anyhow::Result<Record> {
    match serde_json::to_value(state)? {
        serde_json::Value::Object(record) => Ok(record),
        serde_json::Value::Null => Ok(Record::new()),
        other => anyhow::bail!("state encoded to a non-object value: {other}"),
    }
}

/// Decode a state struct from a [`Record`].
///
/// # Errors
/// Fails if the record is missing required fields or has the wrong types.
pub fn decode<T: DeserializeOwned>(record: &Record) -> anyhow::Result<T> {
    match serde_json::from_value(serde_json::Value::Object(record.clone())) {
        Ok(state) => Ok(state),
        // Unit structs encode to an empty record but only decode from null.
        Err(err) if record.is_empty() => {
            serde_json::from_value(serde_json::Value::Null).map_err(|_| err.into())
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Lamp {
        lit: bool,
        fuel: u32,
    }

    #[test]
    fn encode_keeps_field_order() {
        let record = encode(&Lamp { lit: true, fuel: 3 }).expect("encode");
        let keys: Vec<_> = record.keys().cloned().collect();
        assert_eq!(keys, vec!["lit".to_string(), "fuel".to_string()]);
    }

    #[test]
    fn decode_reports_missing_fields() {
        let mut record = Record::new();
        record.insert("lit".into(), serde_json::Value::Bool(false));
        assert!(decode::<Lamp>(&record).is_err());
    }

    #[test]
    fn unit_state_encodes_to_empty_record() {
        #[derive(Serialize)]
        struct Marker;
        assert!(encode(&Marker).expect("encode").is_empty());
    }

    #[test]
    fn unit_state_round_trips() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Marker;
        let record = encode(&Marker).expect("encode");
        assert_eq!(decode::<Marker>(&record).expect("decode"), Marker);
    }

    #[test]
    fn entity_id_is_transparent() {
        let json = serde_json::to_string(&EntityId(7)).expect("serialize");
        assert_eq!(json, "7");
    }
}

//! Snowflake ID Generator
//!
//! Time-ordered 64-bit IDs: 41 bits of milliseconds since the platform epoch,
//! 10 bits of machine id, 12 bits of per-millisecond sequence.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Platform epoch (2020-01-01T00:00:00.000Z)
pub const PLATFORM_EPOCH: u64 = 1577836800000;

const MACHINE_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const MAX_MACHINE_ID: u64 = (1 << MACHINE_BITS) - 1;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug, Default)]
struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
}

/// Snowflake ID generator
#[derive(Debug)]
pub struct SnowflakeGenerator {
    machine_id: u64,
    epoch: u64,
    state: Mutex<GeneratorState>,
}

impl SnowflakeGenerator {
    /// Create a new snowflake generator
    pub fn new(machine_id: u64, epoch: u64) -> Self {
        Self {
            machine_id: machine_id & MAX_MACHINE_ID,
            epoch,
            state: Mutex::new(GeneratorState::default()),
        }
    }

    /// Generate a new snowflake ID
    pub fn generate(&self) -> i64 {
        let mut state = self.state.lock();
        let mut timestamp = current_timestamp().max(state.last_timestamp);

        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if state.sequence == 0 {
                // Sequence exhausted for this millisecond, borrow the next one
                timestamp += 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_timestamp = timestamp;

        let id = ((timestamp.saturating_sub(self.epoch)) << (MACHINE_BITS + SEQUENCE_BITS))
            | (self.machine_id << SEQUENCE_BITS)
            | state.sequence;

        id as i64
    }

    /// Extract the unix-millisecond timestamp from an ID made by this generator
    pub fn timestamp_of(&self, snowflake: i64) -> u64 {
        ((snowflake as u64) >> (MACHINE_BITS + SEQUENCE_BITS)) + self.epoch
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Serde helpers for snowflake IDs.
///
/// IDs are written as JSON strings because they exceed the 53-bit integer
/// range of JavaScript clients; both strings and numbers are accepted on input.
pub mod serde_id {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Num(i64),
        Str(String),
    }

    impl IdRepr {
        fn into_id<E: de::Error>(self) -> Result<i64, E> {
            match self {
                IdRepr::Num(n) => Ok(n),
                IdRepr::Str(s) => s
                    .trim()
                    .parse()
                    .map_err(|_| E::custom(format!("invalid id: {s:?}"))),
            }
        }
    }

    pub fn serialize<S: Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        IdRepr::deserialize(deserializer)?.into_id()
    }

    /// Same format for `Option<i64>`; pair with `#[serde(default)]`.
    pub mod option {
        use super::IdRepr;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(id: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
            match id {
                Some(id) => serializer.collect_str(id),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<i64>, D::Error> {
            Option::<IdRepr>::deserialize(deserializer)?
                .map(IdRepr::into_id)
                .transpose()
        }
    }

    /// Same format for `Vec<i64>`.
    pub mod vec {
        use super::IdRepr;
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<i64>, D::Error> {
            Vec::<IdRepr>::deserialize(deserializer)?
                .into_iter()
                .map(IdRepr::into_id)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_unique() {
        let gen = SnowflakeGenerator::new(1, PLATFORM_EPOCH);
        let ids: HashSet<i64> = (0..10_000).map(|_| gen.generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_ids_are_increasing() {
        let gen = SnowflakeGenerator::new(7, PLATFORM_EPOCH);
        let a = gen.generate();
        let b = gen.generate();
        assert!(b > a);
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let gen = SnowflakeGenerator::new(1, PLATFORM_EPOCH);
        let before = current_timestamp();
        let id = gen.generate();
        let ts = gen.timestamp_of(id);
        assert!(ts >= before);
        assert!(ts <= current_timestamp() + 1);
    }

    #[derive(serde::Serialize, serde::Deserialize)]
    struct Wrapper {
        #[serde(with = "serde_id")]
        id: i64,
        #[serde(default, with = "serde_id::option")]
        parent: Option<i64>,
    }

    #[test]
    fn test_serde_id_accepts_string_and_number() {
        let a: Wrapper = serde_json::from_str(r#"{"id": "1234567890123456789"}"#).unwrap();
        let b: Wrapper = serde_json::from_str(r#"{"id": 42, "parent": "7"}"#).unwrap();
        assert_eq!(a.id, 1234567890123456789);
        assert_eq!(a.parent, None);
        assert_eq!(b.id, 42);
        assert_eq!(b.parent, Some(7));

        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["id"], "42");
        assert_eq!(json["parent"], "7");
    }

    #[test]
    fn test_serde_id_rejects_garbage() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"id": "abc"}"#).is_err());
    }

    #[test]
    fn test_machine_id_is_masked() {
        let gen = SnowflakeGenerator::new(MAX_MACHINE_ID + 5, PLATFORM_EPOCH);
        let id = gen.generate() as u64;
        assert_eq!((id >> SEQUENCE_BITS) & MAX_MACHINE_ID, 4);
    }
}

//! Record storage and aggregation.
use super::{Record, RecordValue};
use log::warn;
use std::collections::HashSet;
use xxhash_rust::xxh3::Xxh3Builder;

/// Stores records and aggregates them.
///
/// Scalars stored under the same key are reduced to `{key}_min`, `{key}_max`,
/// `{key}_mean` and `{key}_median`, or kept as `{key}` when only one value
/// was stored. For other kinds of values the most recent one is kept.
#[derive(Default)]
pub struct RecordStorage {
    data: Vec<Record>,
}

fn min(vs: &[f32]) -> RecordValue {
    RecordValue::Scalar(vs.iter().copied().fold(f32::INFINITY, f32::min))
}

fn max(vs: &[f32]) -> RecordValue {
    RecordValue::Scalar(vs.iter().copied().fold(f32::NEG_INFINITY, f32::max))
}

fn mean(vs: &[f32]) -> RecordValue {
    RecordValue::Scalar(vs.iter().sum::<f32>() / vs.len() as f32)
}

fn median(mut vs: Vec<f32>) -> RecordValue {
    vs.sort_by(|x, y| x.total_cmp(y));
    RecordValue::Scalar(vs[vs.len() / 2])
}

impl RecordStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self { data: vec![] }
    }

    /// Stores a record.
    pub fn store(&mut self, record: Record) {
        self.data.push(record);
    }

    /// Returns `true` if no record is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn get_keys(&self) -> HashSet<String, Xxh3Builder> {
        let mut keys = HashSet::<String, Xxh3Builder>::default();
        for record in self.data.iter() {
            for k in record.keys() {
                keys.insert(k.clone());
            }
        }
        keys
    }

    fn latest(&self, key: &str) -> Option<&RecordValue> {
        self.data.iter().rev().find_map(|record| record.get(key))
    }

    fn scalar(&self, key: &str) -> Record {
        let vs: Vec<f32> = self
            .data
            .iter()
            .filter_map(|record| match record.get(key) {
                Some(RecordValue::Scalar(v)) => Some(*v),
                Some(_) => {
                    warn!("Non-scalar value for {} is ignored in aggregation", key);
                    None
                }
                None => None,
            })
            .collect();

        match vs.len() {
            0 => Record::empty(),
            1 => Record::from_scalar(key, vs[0]),
            _ => Record::from_slice(&[
                (format!("{}_min", key), min(&vs)),
                (format!("{}_max", key), max(&vs)),
                (format!("{}_mean", key), mean(&vs)),
                (format!("{}_median", key), median(vs)),
            ]),
        }
    }

    /// Aggregates all stored records and clears the storage.
    pub fn aggregate(&mut self) -> Record {
        let mut record = Record::empty();

        for key in self.get_keys().iter() {
            let r = match self.latest(key) {
                Some(RecordValue::Scalar(..)) => self.scalar(key),
                Some(value) => Record::from_slice(&[(key.as_str(), value.clone())]),
                None => Record::empty(),
            };
            record.merge_inplace(r);
        }

        self.data.clear();

        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_scalars() {
        let mut storage = RecordStorage::new();
        for v in [3.0f32, 1.0, 2.0] {
            storage.store(Record::from_scalar("loss", v));
        }
        storage.store(Record::from_scalar("eval_reward", 10.0));
        storage.store(Record::from_slice(&[(
            "tag",
            RecordValue::String("first".to_string()),
        )]));
        storage.store(Record::from_slice(&[(
            "tag",
            RecordValue::String("last".to_string()),
        )]));

        let record = storage.aggregate();
        assert_eq!(record.get_scalar("loss_min").unwrap(), 1.0);
        assert_eq!(record.get_scalar("loss_max").unwrap(), 3.0);
        assert_eq!(record.get_scalar("loss_mean").unwrap(), 2.0);
        assert_eq!(record.get_scalar("loss_median").unwrap(), 2.0);
        assert_eq!(record.get_scalar("eval_reward").unwrap(), 10.0);
        assert_eq!(record.get_string("tag").unwrap(), "last");
        assert!(storage.is_empty());
    }
}

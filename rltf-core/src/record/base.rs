//! Records and their values.
use crate::error::RltfError;
use chrono::prelude::{DateTime, Local};
use std::{
    collections::{
        hash_map::{IntoIter, Iter, Keys},
        HashMap,
    },
    convert::Into,
};

/// Represents possible types of values in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value.
    Scalar(f32),

    /// A timestamp with local timezone.
    DateTime(DateTime<Local>),

    /// A 1-dimensional array.
    Array1(Vec<f32>),

    /// A 2-dimensional array with its shape.
    Array2(Vec<f32>, [usize; 2]),

    /// A 3-dimensional array with its shape.
    Array3(Vec<f32>, [usize; 3]),

    /// A text value.
    String(String),
}

/// A container of key-value pairs.
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Returns an iterator over the keys in the record.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a key-value pair into the record.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs in the record.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Returns an iterator that consumes the record.
    pub fn into_iter_in_record(self) -> IntoIter<String, RecordValue> {
        self.0.into_iter()
    }

    /// Gets a reference to the value associated with the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Merges two records, consuming both.
    ///
    /// Values of `record` overwrite values of `self` with the same key.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Merges another record into this one in place.
    pub fn merge_inplace(&mut self, record: Record) {
        for (k, v) in record.0.into_iter() {
            self.0.insert(k, v);
        }
    }

    /// Gets a scalar value from the record.
    pub fn get_scalar(&self, k: &str) -> Result<f32, RltfError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(RltfError::RecordValueTypeError("Scalar".to_string())),
            None => Err(RltfError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a 1-dimensional array from the record.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, RltfError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(RltfError::RecordValueTypeError("Array1".to_string())),
            None => Err(RltfError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a 2-dimensional array and its shape from the record.
    pub fn get_array2(&self, k: &str) -> Result<(Vec<f32>, [usize; 2]), RltfError> {
        match self.0.get(k) {
            Some(RecordValue::Array2(v, s)) => Ok((v.clone(), *s)),
            Some(_) => Err(RltfError::RecordValueTypeError("Array2".to_string())),
            None => Err(RltfError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a 3-dimensional array and its shape from the record.
    pub fn get_array3(&self, k: &str) -> Result<(Vec<f32>, [usize; 3]), RltfError> {
        match self.0.get(k) {
            Some(RecordValue::Array3(v, s)) => Ok((v.clone(), *s)),
            Some(_) => Err(RltfError::RecordValueTypeError("Array3".to_string())),
            None => Err(RltfError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a string value from the record.
    pub fn get_string(&self, k: &str) -> Result<String, RltfError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(RltfError::RecordValueTypeError("String".to_string())),
            None => Err(RltfError::RecordKeyError(k.to_string())),
        }
    }

    /// Checks if the record is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Gets the scalar value of a record holding exactly one entry.
    pub fn get_scalar_without_key(&self) -> Option<f32> {
        if self.0.len() != 1 {
            return None;
        }
        match self.0.values().next() {
            Some(RecordValue::Scalar(value)) => Some(*value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_getters() {
        let mut record = Record::from_scalar("loss", 0.5);
        record.insert("name", RecordValue::String("dqn".to_string()));

        assert_eq!(record.get_scalar("loss"), Ok(0.5));
        assert_eq!(record.get_string("name"), Ok("dqn".to_string()));
        assert_eq!(
            record.get_scalar("name"),
            Err(RltfError::RecordValueTypeError("Scalar".to_string()))
        );
        assert_eq!(
            record.get_array1("missing"),
            Err(RltfError::RecordKeyError("missing".to_string()))
        );
    }

    #[test]
    fn test_merge_overwrites() {
        let r1 = Record::from_slice(&[
            ("a", RecordValue::Scalar(1.0)),
            ("b", RecordValue::Scalar(2.0)),
        ]);
        let r2 = Record::from_scalar("b", 3.0);
        let r = r1.merge(r2);

        assert_eq!(r.len(), 2);
        assert_eq!(r.get_scalar("b"), Ok(3.0));
        assert_eq!(Record::from_scalar("x", 4.0).get_scalar_without_key(), Some(4.0));
        assert_eq!(r.get_scalar_without_key(), None);
    }
}

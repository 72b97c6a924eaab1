//! Types and traits for recording values during training and evaluation.
//!
//! A [`Record`] is a set of key-value pairs. Values are typed by [`RecordValue`]:
//!
//! * `Scalar(f32)` - a single value, like a loss or an episode reward
//! * `DateTime(DateTime<Local>)` - a timestamp
//! * `Array1(Vec<f32>)` - a 1-dimensional array
//! * `Array2(Vec<f32>, [usize; 2])` - a 2-dimensional array with its shape
//! * `Array3(Vec<f32>, [usize; 3])` - a 3-dimensional array with its shape
//! * `String(String)` - a text value
//!
//! ```rust
//! use rltf_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("episode_reward", RecordValue::Scalar(21.0));
//! record.insert("episode_length", RecordValue::Scalar(21.0));
//! assert_eq!(record.get_scalar("episode_reward").unwrap(), 21.0);
//! ```
//!
//! [`Recorder`] writes records somewhere, while [`AggregateRecorder`] stores them
//! and writes values aggregated with [`RecordStorage`] when flushed.
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::{AggregateRecorder, Recorder};
pub use storage::RecordStorage;

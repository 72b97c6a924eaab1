//! Tensorboard recorder for rltf.
use log::warn;
use rltf_core::record::{AggregateRecorder, Record, RecordStorage, RecordValue, Recorder};
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
    ignore_unsupported_value: bool,
    storage: RecordStorage,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "opt_steps".to_string(),
            ignore_unsupported_value: true,
            storage: RecordStorage::new(),
        }
    }

    /// Construct a [`TensorboardRecorder`] which warns on unsupported record values.
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new_with_check_unsupported_value<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            ignore_unsupported_value: false,
            ..Self::new(logdir)
        }
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [Record] into a TFRecord.
    ///
    /// This method handles [RecordValue::Scalar] and [RecordValue::Array2] in the [Record].
    /// Records without the step key `opt_steps` are discarded.
    fn write(&mut self, record: Record) {
        let step = match record.get(&self.step_key) {
            Some(RecordValue::Scalar(v)) => *v as usize,
            _ => {
                warn!("Record without scalar {:?} is discarded", self.step_key);
                return;
            }
        };

        for (k, v) in record.iter() {
            if *k == self.step_key {
                continue;
            }
            match v {
                RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step),
                RecordValue::DateTime(_) => {}
                RecordValue::Array2(data, shape) => {
                    // Grayscale image replicated in the RGB channels
                    let shape = [3, shape[0], shape[1]];
                    let min = data.iter().fold(f32::MAX, |m, v| v.min(m));
                    let scale = (data.iter().fold(f32::MIN, |m, v| v.max(m)) - min).max(f32::EPSILON);
                    let channel = data
                        .iter()
                        .map(|&e| ((e - min) / scale * 255f32) as u8)
                        .collect::<Vec<_>>();
                    let data = channel.repeat(3);
                    self.writer.add_image(k, data.as_slice(), &shape, step)
                }
                _ => {
                    if !self.ignore_unsupported_value {
                        warn!("Unsupported value: {:?}", (k, v));
                    }
                }
            };
        }
        self.writer.flush();
    }
}

impl AggregateRecorder for TensorboardRecorder {
    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, step: i64) {
        let mut record = self.storage.aggregate();
        record.insert(self.step_key.clone(), RecordValue::Scalar(step as _));
        self.write(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempdir::TempDir;

    #[test]
    fn test_write_event_file() -> Result<()> {
        let dir = TempDir::new("tensorboard")?;
        let mut recorder = TensorboardRecorder::new(dir.path());

        recorder.store(Record::from_scalar("loss", 1.0));
        recorder.store(Record::from_scalar("loss", 3.0));
        recorder.flush(1);

        // Discarded as it has no step
        recorder.write(Record::from_scalar("loss", 1.0));

        let n_files = std::fs::read_dir(dir.path())?.count();
        assert!(n_files > 0);
        Ok(())
    }
}

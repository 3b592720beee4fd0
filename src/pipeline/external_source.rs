//! Per-iteration feed slot for externally supplied shapes

use crate::error::{Error, Result};
use crate::tensor::{HostTensor, Shape};

/// Holds the shapes fed for the next iteration
///
/// Only the shapes of fed tensors are kept; their values are never read.
/// The slot is filled by [`feed`](Self::feed) and emptied by
/// [`take`](Self::take) when a run consumes it.
#[derive(Debug, Default)]
pub(crate) struct ExternalSource {
    pending: Option<Vec<Shape>>,
}

impl ExternalSource {
    /// Validate and store the shapes of `batch`.
    ///
    /// Feeding again before the pending input is consumed replaces it. On
    /// error the pending input is left as it was.
    pub(crate) fn feed(&mut self, batch: &[HostTensor], iteration: u64) -> Result<()> {
        if batch.is_empty() {
            return Err(Error::invalid_shape(Vec::new(), "fed batch contains no tensors"));
        }
        let shapes = batch
            .iter()
            .map(|t| {
                t.shape().validate()?;
                Ok(t.shape().clone())
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(previous) = self.pending.replace(shapes) {
            log::warn!(
                "iteration {}: feed replaced {} pending samples that were never run",
                iteration,
                previous.len()
            );
        }
        Ok(())
    }

    /// Whether input is waiting for the next run
    pub(crate) fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Pending shapes, without consuming them
    pub(crate) fn peek(&self) -> Option<&[Shape]> {
        self.pending.as_deref()
    }

    /// Consume the pending input
    pub(crate) fn take(&mut self) -> Option<Vec<Shape>> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;

    #[test]
    fn test_feed_then_take() {
        let mut source = ExternalSource::default();
        let batch = vec![
            HostTensor::ones(&[100, 100], DType::F32).unwrap(),
            HostTensor::ones(&[3], DType::I8).unwrap(),
        ];
        source.feed(&batch, 0).unwrap();
        assert!(source.has_pending());
        assert_eq!(source.peek().unwrap().len(), 2);

        let shapes = source.take().unwrap();
        assert_eq!(shapes[0].as_slice(), &[100, 100]);
        assert_eq!(shapes[1].as_slice(), &[3]);
        assert!(source.take().is_none());
    }

    #[test]
    fn test_last_feed_wins() {
        let mut source = ExternalSource::default();
        source
            .feed(&[HostTensor::ones(&[5], DType::F64).unwrap()], 0)
            .unwrap();
        source
            .feed(&[HostTensor::ones(&[7, 2], DType::F64).unwrap()], 0)
            .unwrap();
        assert_eq!(source.take().unwrap()[0].as_slice(), &[7, 2]);
    }

    #[test]
    fn test_invalid_feed_keeps_pending() {
        let mut source = ExternalSource::default();
        source
            .feed(&[HostTensor::ones(&[5], DType::F64).unwrap()], 0)
            .unwrap();

        let zero_dim = HostTensor::zeros(&[4, 0], DType::F32).unwrap();
        let rank0 = HostTensor::ones(&[], DType::F32).unwrap();
        for bad in [vec![], vec![zero_dim], vec![rank0]] {
            assert!(matches!(
                source.feed(&bad, 0),
                Err(Error::InvalidShape { .. })
            ));
        }
        assert_eq!(source.take().unwrap()[0].as_slice(), &[5]);
    }
}

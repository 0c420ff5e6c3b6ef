//! Calibration frame iteration.
//!
//! [`FrameSource`] resolves the image and angle datasets once; the iterators
//! it hands out only index into them.

use thiserror::Error;

use crate::container::{Container, Dataset};
use crate::job::Calibration;
use crate::locator::{DatasetPath, locate};
use crate::{Angle, Image};

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("no dataset matches {0}")]
    DatasetNotFound(DatasetPath),
    #[error("frame index {index} is out of range ({len} frames)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("dataset {path} has an unusable shape: {reason}")]
    Shape { path: String, reason: String },
}

/// One calibration frame: its index, detector image, and goniometer angle.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationFrame {
    idx: usize,
    image: Image,
    delta: Angle,
}

impl CalibrationFrame {
    pub fn new(idx: usize, image: Image, delta: Angle) -> Self {
        Self { idx, image, delta }
    }

    pub fn idx(&self) -> usize {
        self.idx
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn delta(&self) -> Angle {
        self.delta
    }

    /// Goniometer position fed to the refinement: the frame angle.
    pub fn position(&self) -> Angle {
        self.delta
    }
}

/// Resolved image stack and angle vector of one calibration job.
#[derive(Debug, Clone, Copy)]
pub struct FrameSource<'a> {
    images: &'a Dataset,
    deltas: &'a Dataset,
}

impl<'a> FrameSource<'a> {
    /// Locate the job's image and angle datasets.
    pub fn resolve(container: &'a Container, job: &Calibration) -> Result<Self, FrameError> {
        let images = locate(container, &job.images_path)
            .ok_or_else(|| FrameError::DatasetNotFound(job.images_path.clone()))?;
        let deltas = locate(container, &job.deltas_path)
            .ok_or_else(|| FrameError::DatasetNotFound(job.deltas_path.clone()))?;

        if images.rank() != 3 {
            let reason = format!("expected frames x rows x cols, got {:?}", images.shape());
            return Err(FrameError::Shape {
                path: images.path,
                reason,
            });
        }
        if deltas.rank() != 1 || deltas.len() < images.len() {
            let reason = format!(
                "expected one angle per frame ({} frames), got {:?}",
                images.len(),
                deltas.shape()
            );
            return Err(FrameError::Shape {
                path: deltas.path,
                reason,
            });
        }
        log::debug!(
            "resolved images at {} and angles at {}",
            images.path,
            deltas.path
        );
        Ok(Self {
            images: images.dataset,
            deltas: deltas.dataset,
        })
    }

    /// Total number of frames.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frame `idx`, or `IndexOutOfRange`.
    pub fn frame(&self, idx: usize) -> Result<CalibrationFrame, FrameError> {
        let out_of_range = || FrameError::IndexOutOfRange {
            index: idx,
            len: self.len(),
        };
        let image = self.images.image(idx).ok_or_else(out_of_range)?;
        let delta = self.deltas.scalar(idx).ok_or_else(out_of_range)?;
        Ok(CalibrationFrame::new(idx, image, delta))
    }

    /// Frames for exactly `idxs`, in list order.
    ///
    /// Every index is checked before anything is yielded.
    pub fn indexed(&self, idxs: &'a [usize]) -> Result<IndexedFrames<'a>, FrameError> {
        if let Some(&index) = idxs.iter().find(|&&i| i >= self.len()) {
            return Err(FrameError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(IndexedFrames {
            source: *self,
            idxs: idxs.iter(),
        })
    }

    /// Every frame, `0..len` ascending.
    pub fn all(&self) -> AllFrames<'a> {
        AllFrames {
            source: *self,
            range: 0..self.len(),
        }
    }

    /// Frame `idx` for an index already checked against [`len`](Self::len).
    ///
    /// Datasets hold exactly `product(shape)` values and `resolve` checked
    /// ranks and the angle count, so both lookups succeed for such an index.
    fn frame_unchecked(&self, idx: usize) -> CalibrationFrame {
        match self.frame(idx) {
            Ok(frame) => frame,
            Err(err) => unreachable!("frame {idx} of a resolved source: {err}"),
        }
    }
}

/// Lazy frames for a fixed index list. Clone to restart.
#[derive(Debug, Clone)]
pub struct IndexedFrames<'a> {
    source: FrameSource<'a>,
    idxs: std::slice::Iter<'a, usize>,
}

impl Iterator for IndexedFrames<'_> {
    type Item = CalibrationFrame;

    fn next(&mut self) -> Option<CalibrationFrame> {
        let idx = *self.idxs.next()?;
        Some(self.source.frame_unchecked(idx))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.idxs.size_hint()
    }
}

impl ExactSizeIterator for IndexedFrames<'_> {}

/// Lazy frames over the whole stack.
#[derive(Debug, Clone)]
pub struct AllFrames<'a> {
    source: FrameSource<'a>,
    range: std::ops::Range<usize>,
}

impl Iterator for AllFrames<'_> {
    type Item = CalibrationFrame;

    fn next(&mut self) -> Option<CalibrationFrame> {
        let idx = self.range.next()?;
        Some(self.source.frame_unchecked(idx))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

impl ExactSizeIterator for AllFrames<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{synthetic_container, synthetic_job};

    #[test]
    fn indexed_yields_requested_frames_in_order() {
        let container = synthetic_container(10, 4, 5);
        let mut job = synthetic_job("scan.json");
        job.idxs = vec![0, 2, 5];
        let source = FrameSource::resolve(&container, &job).unwrap();

        let frames: Vec<_> = source.indexed(&job.idxs).unwrap().collect();
        assert_eq!(frames.len(), 3);
        for (frame, expected) in frames.iter().zip([0usize, 2, 5]) {
            assert_eq!(frame.idx(), expected);
            assert_eq!(frame.delta(), expected as f64 * 0.5);
            assert_eq!(frame.image().shape(), (4, 5));
            assert_eq!(frame.image()[(0, 0)], expected as f64 * 100.0);
        }
    }

    #[test]
    fn indexed_is_restartable() {
        let container = synthetic_container(4, 2, 2);
        let idxs = vec![3, 1];
        let job = synthetic_job("scan.json");
        let source = FrameSource::resolve(&container, &job).unwrap();
        let frames = source.indexed(&idxs).unwrap();

        let first: Vec<usize> = frames.clone().map(|f| f.idx()).collect();
        let second: Vec<usize> = frames.map(|f| f.idx()).collect();
        assert_eq!(first, vec![3, 1]);
        assert_eq!(first, second);
    }

    #[test]
    fn out_of_range_index_fails_before_yielding() {
        let container = synthetic_container(10, 2, 2);
        let job = synthetic_job("scan.json");
        let source = FrameSource::resolve(&container, &job).unwrap();

        let idxs = vec![1, 10, 2];
        let err = source.indexed(&idxs).unwrap_err();
        assert_eq!(err, FrameError::IndexOutOfRange { index: 10, len: 10 });
        assert!(source.frame(10).is_err());
    }

    #[test]
    fn all_covers_every_frame_once() {
        let container = synthetic_container(7, 2, 3);
        let job = synthetic_job("scan.json");
        let source = FrameSource::resolve(&container, &job).unwrap();

        let all = source.all();
        assert_eq!(all.len(), 7);
        let idxs: Vec<usize> = all.map(|f| f.idx()).collect();
        assert_eq!(idxs, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn missing_dataset_is_reported() {
        let container = synthetic_container(3, 2, 2);
        let mut job = synthetic_job("scan.json");
        job.deltas_path = DatasetPath::contains("nonexistent");
        let err = FrameSource::resolve(&container, &job).unwrap_err();
        assert!(matches!(err, FrameError::DatasetNotFound(_)));
    }

    #[test]
    fn wrong_rank_is_reported() {
        let container = synthetic_container(3, 2, 2);
        let mut job = synthetic_job("scan.json");
        // Point the image rule at the angle vector.
        job.images_path = job.deltas_path.clone();
        let err = FrameSource::resolve(&container, &job).unwrap_err();
        assert!(matches!(err, FrameError::Shape { .. }));
    }
}

use crate::error::{DatasetError, DatasetResult};

/// Extended slice `[start:stop:step]` with negative-index support.
///
/// Negative positions count from the end, out-of-range positions clamp, and a
/// negative step walks backwards. An absent bound means "from the edge".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceSpec {
    /// First position (inclusive).
    pub start: Option<isize>,
    /// End position (exclusive).
    pub stop: Option<isize>,
    /// Stride; `None` means 1.
    pub step: Option<isize>,
}

impl SliceSpec {
    /// `[start:stop]`.
    #[must_use]
    pub const fn new(start: Option<isize>, stop: Option<isize>) -> Self {
        Self {
            start,
            stop,
            step: None,
        }
    }

    /// `[::]`, the whole sequence.
    #[must_use]
    pub const fn full() -> Self {
        Self::new(None, None)
    }

    /// Sets the stride.
    #[must_use]
    pub const fn step(mut self, step: isize) -> Self {
        self.step = Some(step);
        self
    }

    /// Positions selected from a sequence of length `len`, in visit order.
    pub fn indices(&self, len: usize) -> DatasetResult<Vec<usize>> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(DatasetError::ZeroSliceStep);
        }
        let len = isize::try_from(len).unwrap_or(isize::MAX);
        // Bounds a resolved position may take; -1 marks "before the first".
        let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };
        let resolve = |raw: isize| {
            if raw < 0 {
                (raw + len).max(lower)
            } else {
                raw.min(upper)
            }
        };
        let start = self
            .start
            .map_or(if step < 0 { upper } else { lower }, resolve);
        let stop = self
            .stop
            .map_or(if step < 0 { lower } else { upper }, resolve);

        let mut out = Vec::new();
        let mut pos = start;
        while (step > 0 && pos < stop) || (step < 0 && pos > stop) {
            // `pos` stays within [0, len) inside the loop.
            out.push(pos.unsigned_abs());
            match pos.checked_add(step) {
                Some(next) => pos = next,
                None => break,
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick(spec: SliceSpec, len: usize) -> Vec<usize> {
        spec.indices(len).unwrap()
    }

    #[test]
    fn forward_slices_clamp_to_length() {
        assert_eq!(pick(SliceSpec::new(Some(1), Some(3)), 5), [1, 2]);
        assert_eq!(pick(SliceSpec::new(Some(3), Some(99)), 5), [3, 4]);
        assert_eq!(pick(SliceSpec::new(Some(4), Some(2)), 5), Vec::<usize>::new());
        assert_eq!(pick(SliceSpec::full().step(2), 5), [0, 2, 4]);
    }

    #[test]
    fn negative_positions_count_from_the_end() {
        assert_eq!(pick(SliceSpec::new(Some(-2), None), 5), [3, 4]);
        assert_eq!(pick(SliceSpec::new(None, Some(-3)), 5), [0, 1]);
        assert_eq!(pick(SliceSpec::new(Some(-99), Some(2)), 5), [0, 1]);
    }

    #[test]
    fn negative_step_walks_backwards() {
        assert_eq!(pick(SliceSpec::full().step(-1), 4), [3, 2, 1, 0]);
        assert_eq!(pick(SliceSpec::new(Some(3), Some(0)).step(-2), 5), [3, 1]);
        assert_eq!(pick(SliceSpec::new(Some(99), None).step(-3), 5), [4, 1]);
    }

    #[test]
    fn huge_steps_stop_after_one_position() {
        assert_eq!(pick(SliceSpec::new(Some(1), None).step(isize::MAX), 5), [1]);
        assert_eq!(pick(SliceSpec::full().step(isize::MIN), 5), [4]);
    }

    #[test]
    fn empty_sequences_select_nothing() {
        assert!(pick(SliceSpec::full(), 0).is_empty());
        assert!(pick(SliceSpec::full().step(-1), 0).is_empty());
    }

    #[test]
    fn zero_step_is_rejected() {
        let err = SliceSpec::full().step(0).indices(3).unwrap_err();
        assert!(matches!(err, DatasetError::ZeroSliceStep));
    }
}

//! Element selections for partial dataset I/O.
//!
//! A [`Selection`] describes which elements of a dataspace a transfer touches.
//! Hyperslabs here always use a block size of one, so `count` is the number
//! of selected elements per dimension.

use super::ContainerError;

/// Which elements of a dataset to access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Select all elements.
    All,
    /// A regular strided hyperslab, native order, 0-based.
    Hyperslab {
        /// First selected index per dimension.
        start: Vec<u64>,
        /// Number of selected elements per dimension.
        count: Vec<u64>,
        /// Step between selected elements per dimension.
        stride: Vec<u64>,
    },
}

impl Selection {
    /// Number of selected elements for a given shape.
    pub fn num_elements(&self, dims: &[u64]) -> u64 {
        match self {
            Self::All => dims.iter().product(),
            Self::Hyperslab { count, .. } => count.iter().product(),
        }
    }

    /// Coordinates of the selected elements within `dims`, row-major.
    ///
    /// An empty `dims` denotes a scalar, which only `All` can select. The
    /// whole selection is bounds-checked before any coordinate is produced.
    pub fn points(&self, dims: &[u64]) -> Result<Points, ContainerError> {
        let (start, count, stride) = match self {
            Self::All => (vec![0; dims.len()], dims.to_vec(), vec![1; dims.len()]),
            Self::Hyperslab { start, count, stride } => (start.clone(), count.clone(), stride.clone()),
        };
        if start.len() != dims.len() || count.len() != dims.len() || stride.len() != dims.len() {
            return Err(ContainerError::SelectionRank { selection: start.len(), space: dims.len() });
        }
        if count.contains(&0) {
            return Ok(Points::empty());
        }
        for d in 0..dims.len() {
            let last = (count[d] - 1)
                .checked_mul(stride[d])
                .and_then(|n| n.checked_add(start[d]))
                .ok_or(ContainerError::SelectionOutOfBounds { dim: d })?;
            if last >= dims[d] {
                return Err(ContainerError::SelectionOutOfBounds { dim: d });
            }
        }
        let remaining = count
            .iter()
            .try_fold(1u64, |n, &c| n.checked_mul(c))
            .ok_or(ContainerError::LengthOverflow)?;
        let counter = vec![0; dims.len()];
        Ok(Points { start, count, stride, counter, remaining })
    }
}

/// Iterator over the coordinates of a validated selection.
#[derive(Debug, Clone)]
pub struct Points {
    start: Vec<u64>,
    count: Vec<u64>,
    stride: Vec<u64>,
    counter: Vec<u64>,
    remaining: u64,
}

impl Points {
    /// Selects nothing.
    pub(crate) fn empty() -> Self {
        Self { start: Vec::new(), count: Vec::new(), stride: Vec::new(), counter: Vec::new(), remaining: 0 }
    }

    /// Coordinates still to come.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Iterator for Points {
    type Item = Vec<u64>;

    fn next(&mut self) -> Option<Vec<u64>> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let point = (0..self.counter.len())
            .map(|d| self.start[d] + self.counter[d] * self.stride[d])
            .collect();
        // Odometer increment, last dimension fastest.
        for d in (0..self.counter.len()).rev() {
            self.counter[d] += 1;
            if self.counter[d] < self.count[d] {
                break;
            }
            self.counter[d] = 0;
        }
        Some(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(sel: &Selection, dims: &[u64]) -> Vec<Vec<u64>> {
        sel.points(dims).unwrap().collect()
    }

    #[test]
    fn all_selects_everything() {
        assert_eq!(collect(&Selection::All, &[2, 2]), [[0, 0], [0, 1], [1, 0], [1, 1]]);
        assert_eq!(collect(&Selection::All, &[]), [Vec::<u64>::new()]);
        assert!(collect(&Selection::All, &[0, 3]).is_empty());
    }

    #[test]
    fn strided_hyperslab() {
        let sel = Selection::Hyperslab { start: vec![1, 0], count: vec![2, 2], stride: vec![1, 2] };
        // rows 1..3, columns 0 and 2 of a 3x4 array
        assert_eq!(collect(&sel, &[3, 4]), [[1, 0], [1, 2], [2, 0], [2, 2]]);
        assert_eq!(sel.num_elements(&[3, 4]), 4);
        assert_eq!(sel.points(&[3, 4]).unwrap().remaining(), 4);
    }

    #[test]
    fn out_of_bounds() {
        let sel = Selection::Hyperslab { start: vec![2], count: vec![3], stride: vec![1] };
        assert_eq!(sel.points(&[4]).unwrap_err(), ContainerError::SelectionOutOfBounds { dim: 0 });
        let huge = Selection::Hyperslab { start: vec![u64::MAX], count: vec![2], stride: vec![1] };
        assert_eq!(huge.points(&[u64::MAX]).unwrap_err(), ContainerError::SelectionOutOfBounds { dim: 0 });
    }

    #[test]
    fn far_coordinates_are_not_materialized() {
        let sel = Selection::Hyperslab { start: vec![0, 1 << 40], count: vec![1, 2], stride: vec![1, 1] };
        assert_eq!(collect(&sel, &[1, (1 << 40) + 2]), [[0, 1 << 40], [0, (1 << 40) + 1]]);
    }
}

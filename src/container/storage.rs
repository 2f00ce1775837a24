//! Raw element storage of datasets and attributes.
//!
//! Elements live in blocks of a fixed grid: the chunk grid of a chunked
//! dataset, or one block spanning the whole extent otherwise. A block is
//! allocated on its first write, and elements of blocks that were never
//! written read as zero bytes or unset strings. Growing a chunked extent
//! therefore allocates nothing, and a write far out along an unlimited
//! dimension touches only the chunks it selects.

use std::collections::{btree_map::Entry, BTreeMap};

use super::{ContainerError, Dataspace, DataspaceType, Datatype, DatatypeExt, Points, Selection, VlenBuffer};

#[derive(Debug, Clone, PartialEq)]
enum Block {
    Fixed(Vec<u8>),
    VarLen(Vec<Option<String>>),
}

/// Block-sparse element storage.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Storage {
    /// Bytes per element, `None` for variable-length strings.
    elem_size: Option<usize>,
    /// Extent of one block per dimension, native order.
    block_dims: Vec<u64>,
    /// Allocated blocks by grid coordinate.
    blocks: BTreeMap<Vec<u64>, Block>,
}

fn reserve_error(bytes: usize) -> ContainerError {
    ContainerError::StorageAllocation { bytes: bytes as u64 }
}

fn string_bytes(len: usize) -> usize {
    len.saturating_mul(std::mem::size_of::<Option<String>>())
}

impl Storage {
    /// Empty storage for `space`, blocked by `chunk_dims` when given.
    pub(crate) fn new(datatype: &Datatype, space: &Dataspace, chunk_dims: Option<&[u64]>) -> Self {
        let block_dims = match chunk_dims {
            Some(chunk) => chunk.to_vec(),
            None => space.dimensions.clone(),
        };
        Self { elem_size: datatype.element_size(), block_dims, blocks: BTreeMap::new() }
    }

    /// Coordinates selected by `sel` within `space`.
    pub(crate) fn points(space: &Dataspace, sel: &Selection) -> Result<Points, ContainerError> {
        match (&space.space_type, sel) {
            (DataspaceType::Null, Selection::All) => Ok(Points::empty()),
            (DataspaceType::Scalar, Selection::All) => sel.points(&[]),
            (DataspaceType::Null | DataspaceType::Scalar, Selection::Hyperslab { start, .. }) => {
                Err(ContainerError::SelectionRank { selection: start.len(), space: 0 })
            }
            (DataspaceType::Simple, _) => sel.points(&space.dimensions),
        }
    }

    /// Number of allocated blocks.
    pub(crate) fn allocated_blocks(&self) -> usize {
        self.blocks.len()
    }

    fn block_len(&self) -> Result<usize, ContainerError> {
        self.block_dims
            .iter()
            .try_fold(1u64, |n, &d| n.checked_mul(d.max(1)))
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(ContainerError::LengthOverflow)
    }

    /// Grid coordinate of the block holding `point` and the element offset
    /// inside it.
    fn locate(&self, point: &[u64]) -> (Vec<u64>, u64) {
        let mut key = Vec::with_capacity(point.len());
        let mut offset = 0u64;
        for (&c, &b) in point.iter().zip(&self.block_dims) {
            let b = b.max(1);
            key.push(c / b);
            offset = offset * b + c % b;
        }
        (key, offset)
    }

    fn block_mut(&mut self, key: Vec<u64>) -> Result<&mut Block, ContainerError> {
        let len = self.block_len()?;
        let elem_size = self.elem_size;
        Ok(match self.blocks.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(Self::allocate(elem_size, len)?),
        })
    }

    fn allocate(elem_size: Option<usize>, len: usize) -> Result<Block, ContainerError> {
        Ok(match elem_size {
            Some(elem_size) => {
                let bytes = len.checked_mul(elem_size).ok_or(ContainerError::LengthOverflow)?;
                let mut data = Vec::new();
                data.try_reserve_exact(bytes).map_err(|_| reserve_error(bytes))?;
                data.resize(bytes, 0);
                Block::Fixed(data)
            }
            None => {
                let mut data = Vec::new();
                data.try_reserve_exact(len).map_err(|_| reserve_error(string_bytes(len)))?;
                data.resize(len, None);
                Block::VarLen(data)
            }
        })
    }

    fn selected_len(points: &Points) -> Result<usize, ContainerError> {
        usize::try_from(points.remaining()).map_err(|_| ContainerError::LengthOverflow)
    }

    pub(crate) fn read_fixed(&self, points: Points) -> Result<Vec<u8>, ContainerError> {
        let elem_size = self.elem_size.ok_or(ContainerError::StorageKind)?;
        let bytes = Self::selected_len(&points)?
            .checked_mul(elem_size)
            .ok_or(ContainerError::LengthOverflow)?;
        let mut out = Vec::new();
        out.try_reserve_exact(bytes).map_err(|_| reserve_error(bytes))?;
        for point in points {
            let (key, offset) = self.locate(&point);
            match self.blocks.get(&key) {
                Some(Block::Fixed(data)) => {
                    let at = offset as usize * elem_size;
                    out.extend_from_slice(&data[at..at + elem_size]);
                }
                _ => out.resize(out.len() + elem_size, 0),
            }
        }
        Ok(out)
    }

    pub(crate) fn write_fixed(&mut self, points: Points, src: &[u8]) -> Result<(), ContainerError> {
        let elem_size = self.elem_size.ok_or(ContainerError::StorageKind)?;
        let expected = Self::selected_len(&points)?;
        if Some(src.len()) != expected.checked_mul(elem_size) {
            return Err(ContainerError::BufferSize {
                expected,
                actual: src.len() / elem_size.max(1),
            });
        }
        if elem_size == 0 {
            return Ok(());
        }
        for (point, value) in points.zip(src.chunks_exact(elem_size)) {
            let (key, offset) = self.locate(&point);
            if let Block::Fixed(data) = self.block_mut(key)? {
                let at = offset as usize * elem_size;
                data[at..at + elem_size].copy_from_slice(value);
            }
        }
        Ok(())
    }

    pub(crate) fn read_vlen(&self, points: Points) -> Result<VlenBuffer, ContainerError> {
        if self.elem_size.is_some() {
            return Err(ContainerError::StorageKind);
        }
        let len = Self::selected_len(&points)?;
        let mut strings = Vec::new();
        strings.try_reserve_exact(len).map_err(|_| reserve_error(string_bytes(len)))?;
        for point in points {
            let (key, offset) = self.locate(&point);
            strings.push(match self.blocks.get(&key) {
                Some(Block::VarLen(data)) => data[offset as usize].clone(),
                _ => None,
            });
        }
        Ok(VlenBuffer { strings })
    }

    pub(crate) fn write_vlen(&mut self, points: Points, src: &[&str]) -> Result<(), ContainerError> {
        if self.elem_size.is_some() {
            return Err(ContainerError::StorageKind);
        }
        let expected = Self::selected_len(&points)?;
        if src.len() != expected {
            return Err(ContainerError::BufferSize { expected, actual: src.len() });
        }
        for (point, s) in points.zip(src) {
            let (key, offset) = self.locate(&point);
            if let Block::VarLen(data) = self.block_mut(key)? {
                data[offset as usize] = Some(s.to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{CharacterSet, DataspaceExt, UNLIMITED};

    fn hyperslab(start: &[u64], count: &[u64]) -> Selection {
        Selection::Hyperslab { start: start.to_vec(), count: count.to_vec(), stride: vec![1; start.len()] }
    }

    #[test]
    fn unwritten_elements_read_as_zero() {
        let space = Dataspace::simple(&[2, 3]);
        let mut storage = Storage::new(&Datatype::integer(1, false), &space, None);
        assert_eq!(storage.allocated_blocks(), 0);
        let all = || Storage::points(&space, &Selection::All).unwrap();
        assert_eq!(storage.read_fixed(all()).unwrap(), [0; 6]);
        let sel = hyperslab(&[1, 1], &[1, 2]);
        storage.write_fixed(Storage::points(&space, &sel).unwrap(), &[5, 6]).unwrap();
        assert_eq!(storage.read_fixed(all()).unwrap(), [0, 0, 0, 0, 5, 6]);
        assert_eq!(storage.allocated_blocks(), 1);
    }

    #[test]
    fn chunks_are_allocated_on_write() {
        let far = 1u64 << 40;
        let space = Dataspace::simple_with_max(&[1, far + 2], &[1, UNLIMITED]).unwrap();
        let mut storage = Storage::new(&Datatype::float(8), &space, Some(&[1, 2]));
        let sel = hyperslab(&[0, far], &[1, 2]);
        let bytes: Vec<u8> = [1.5f64, 2.5].iter().flat_map(|v| v.to_ne_bytes()).collect();
        storage.write_fixed(Storage::points(&space, &sel).unwrap(), &bytes).unwrap();
        assert_eq!(storage.allocated_blocks(), 1);
        assert_eq!(storage.read_fixed(Storage::points(&space, &sel).unwrap()).unwrap(), bytes);
        let before = hyperslab(&[0, far - 2], &[1, 2]);
        assert_eq!(storage.read_fixed(Storage::points(&space, &before).unwrap()).unwrap(), [0; 16]);
    }

    #[test]
    fn strings_span_chunks() {
        let space = Dataspace::simple(&[5]);
        let mut storage = Storage::new(&Datatype::vlen_string(CharacterSet::Utf8), &space, Some(&[2]));
        let sel = hyperslab(&[1], &[3]);
        storage.write_vlen(Storage::points(&space, &sel).unwrap(), &["a", "b", "c"]).unwrap();
        assert_eq!(storage.allocated_blocks(), 2);
        let buf = storage.read_vlen(Storage::points(&space, &Selection::All).unwrap()).unwrap();
        assert_eq!(buf.iter().collect::<Vec<_>>(), [None, Some("a"), Some("b"), Some("c"), None]);
        assert_eq!(
            storage.read_fixed(Storage::points(&space, &sel).unwrap()).unwrap_err(),
            ContainerError::StorageKind
        );
    }

    #[test]
    fn scalar_and_null_spaces() {
        let scalar = Dataspace::scalar();
        let mut storage = Storage::new(&Datatype::integer(2, true), &scalar, None);
        storage.write_fixed(Storage::points(&scalar, &Selection::All).unwrap(), &[1, 2]).unwrap();
        assert_eq!(storage.read_fixed(Storage::points(&scalar, &Selection::All).unwrap()).unwrap(), [1, 2]);
        assert_eq!(Storage::points(&Dataspace::null(), &Selection::All).unwrap().remaining(), 0);
        assert_eq!(
            Storage::points(&scalar, &hyperslab(&[0], &[1])).unwrap_err(),
            ContainerError::SelectionRank { selection: 1, space: 0 }
        );
    }
}

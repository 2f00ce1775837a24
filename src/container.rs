//! In-memory model of the hierarchical container format.
//!
//! A [`File`] owns a tree of [`Node`]s: groups, datasets, named datatypes and
//! links. Datasets and attributes carry a [`Datatype`], a [`Dataspace`] and
//! raw element storage, using the descriptor types of `rustyhdf5-format`.
//! Fixed-size elements are kept in the datatype's byte order; variable-length
//! strings are kept per element. [`File::from_bytes`] and [`File::to_bytes`]
//! convert between the model and the on-disk format.
//!
//! Variable-length reads hand out a [`VlenBuffer`] that owns the transient
//! string storage. It has to be given back through [`vlen_reclaim`], which
//! checks the buffer against the datatype and memory dataspace it was read
//! with.
mod attribute;
mod dataspace;
mod datatype;
mod io;
mod layout;
mod selection;
mod storage;

pub use self::{
    attribute::{Attribute, AttributeSet},
    dataspace::{Dataspace, DataspaceExt, DataspaceType, MAX_RANK, UNLIMITED},
    datatype::{
        native_byte_order, CharacterSet, CompoundMember, Datatype, DatatypeByteOrder, DatatypeExt,
        EnumMember, ReferenceType, StringPadding,
    },
    layout::{DataLayout, LayoutExt},
    selection::{Points, Selection},
};
use self::storage::Storage;
use thiserror::Error;

/// Errors raised by the container itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ContainerError {
    /// A mutation was attempted on a read-only file.
    #[error("file is opened read-only")]
    ReadOnly,
    /// No object exists at the path.
    #[error("object '{0}' does not exist")]
    NotFound(String),
    /// An object or attribute with this name already exists.
    #[error("'{0}' already exists")]
    AlreadyExists(String),
    /// A path segment that must be a group is some other kind of object.
    #[error("'{0}' is not a group")]
    NotAGroup(String),
    /// The memory and file selections select different numbers of elements.
    #[error("memory selection has {memory} elements but file selection has {file}")]
    SelectionSize {
        /// Elements in the memory dataspace.
        memory: u64,
        /// Elements in the file selection.
        file: u64,
    },
    /// The selection rank does not match the dataspace rank.
    #[error("selection has rank {selection} but dataspace has rank {space}")]
    SelectionRank {
        /// Rank of the selection.
        selection: usize,
        /// Rank of the dataspace.
        space: usize,
    },
    /// The selection reaches past the current extent.
    #[error("selection exceeds the extent of dimension {dim}")]
    SelectionOutOfBounds {
        /// Offending dimension, native order.
        dim: usize,
    },
    /// A requested extent exceeds the maximum dimensions.
    #[error("extent {requested} of dimension {dim} exceeds maximum {max}")]
    ExtentExceedsMaximum {
        /// Offending dimension, native order.
        dim: usize,
        /// Requested size.
        requested: u64,
        /// Declared maximum.
        max: u64,
    },
    /// A requested extent is smaller than the current one.
    #[error("cannot shrink dimension {dim} from {current} to {requested}")]
    ExtentShrink {
        /// Offending dimension, native order.
        dim: usize,
        /// Current size.
        current: u64,
        /// Requested size.
        requested: u64,
    },
    /// Only chunked datasets can change their extent.
    #[error("dataset is not chunked")]
    NotChunked,
    /// The layout does not fit the dataspace.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
    /// The transfer does not match how elements of the datatype are stored.
    #[error("transfer kind does not match the stored element type")]
    StorageKind,
    /// The buffer holds a different number of bytes or strings than selected.
    #[error("buffer holds {actual} elements, expected {expected}")]
    BufferSize {
        /// Elements selected.
        expected: usize,
        /// Elements provided.
        actual: usize,
    },
    /// A variable-length buffer could not be reclaimed.
    #[error("cannot reclaim variable-length buffer: {0}")]
    VlenReclaim(String),
    /// Element or byte counts overflow `usize`.
    #[error("overflow computing storage length")]
    LengthOverflow,
    /// Memory for element storage could not be reserved.
    #[error("cannot allocate {bytes} bytes of element storage")]
    StorageAllocation {
        /// Bytes requested.
        bytes: u64,
    },
    /// The bytes are not a valid container file.
    #[error("container format error: {0}")]
    Format(String),
    /// The object cannot be expressed in a saved file.
    #[error("cannot save {0}")]
    Unrepresentable(String),
}

/// Transient storage for variable-length strings handed out by a read.
///
/// Give it back with [`vlen_reclaim`] once the strings have been copied out.
#[derive(Debug)]
#[must_use = "variable-length buffers must be released with `vlen_reclaim`"]
pub struct VlenBuffer {
    strings: Vec<Option<String>>,
}

impl VlenBuffer {
    /// Number of elements in the buffer.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Element `i`, `None` for an unset (null) element or out of range.
    pub fn get(&self, i: usize) -> Option<&str> {
        self.strings.get(i)?.as_deref()
    }

    /// Iterates over the elements; unset elements yield `None`.
    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.strings.iter().map(Option::as_deref)
    }
}

/// Releases the storage of a buffer returned by a variable-length read.
///
/// `datatype` and `memspace` must be the ones the read was issued with.
pub fn vlen_reclaim(
    datatype: &Datatype,
    memspace: &Dataspace,
    buf: VlenBuffer,
) -> Result<(), ContainerError> {
    if !datatype.is_variable() {
        return Err(ContainerError::VlenReclaim("datatype is not variable-length".to_string()));
    }
    let expected = memspace.element_count().ok_or(ContainerError::LengthOverflow)?;
    if buf.len() as u64 != expected {
        return Err(ContainerError::VlenReclaim(format!(
            "buffer holds {} elements but memory dataspace has {expected}",
            buf.len()
        )));
    }
    drop(buf);
    Ok(())
}

/// Kind of object a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// A group.
    Group,
    /// A dataset.
    Dataset,
    /// A named (committed) datatype.
    NamedType,
    /// A soft or external link.
    Link,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Group => write!(f, "group"),
            Self::Dataset => write!(f, "dataset"),
            Self::NamedType => write!(f, "named datatype"),
            Self::Link => write!(f, "link"),
        }
    }
}

/// An entry of a group.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A child group.
    Group(Group),
    /// A dataset.
    Dataset(Dataset),
    /// A named datatype.
    NamedType(NamedType),
    /// A link to another path in the same file.
    SoftLink {
        /// Target path.
        target: String,
    },
    /// A link to an object in another file.
    ExternalLink {
        /// Target file name.
        file: String,
        /// Target path inside that file.
        target: String,
    },
}

impl Node {
    /// What kind of object this is.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Group(_) => ObjectKind::Group,
            Self::Dataset(_) => ObjectKind::Dataset,
            Self::NamedType(_) => ObjectKind::NamedType,
            Self::SoftLink { .. } | Self::ExternalLink { .. } => ObjectKind::Link,
        }
    }

    /// The group, if this is one.
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Self::Group(g) => Some(g),
            _ => None,
        }
    }

    /// The group for writing, if this is one.
    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match self {
            Self::Group(g) => Some(g),
            _ => None,
        }
    }

    /// The dataset, if this is one.
    pub fn as_dataset(&self) -> Option<&Dataset> {
        match self {
            Self::Dataset(ds) => Some(ds),
            _ => None,
        }
    }

    /// The dataset for writing, if this is one.
    pub fn as_dataset_mut(&mut self) -> Option<&mut Dataset> {
        match self {
            Self::Dataset(ds) => Some(ds),
            _ => None,
        }
    }

    /// Attributes of the object; links carry none.
    pub fn attributes(&self) -> Option<&AttributeSet> {
        match self {
            Self::Group(g) => Some(&g.attributes),
            Self::Dataset(ds) => Some(&ds.attributes),
            Self::NamedType(t) => Some(&t.attributes),
            Self::SoftLink { .. } | Self::ExternalLink { .. } => None,
        }
    }

    /// Attributes of the object for writing; links carry none.
    pub fn attributes_mut(&mut self) -> Option<&mut AttributeSet> {
        match self {
            Self::Group(g) => Some(&mut g.attributes),
            Self::Dataset(ds) => Some(&mut ds.attributes),
            Self::NamedType(t) => Some(&mut t.attributes),
            Self::SoftLink { .. } | Self::ExternalLink { .. } => None,
        }
    }
}

/// A group: named links to child objects, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    links: Vec<(String, Node)>,
    attributes: AttributeSet,
}

impl Group {
    /// An empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the group has no children.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Child named `name`.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.links.iter().find(|(n, _)| n == name).map(|(_, node)| node)
    }

    /// Child named `name` for writing.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.links.iter_mut().find(|(n, _)| n == name).map(|(_, node)| node)
    }

    /// Children in insertion order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.links.iter().map(|(n, node)| (n.as_str(), node))
    }

    /// Adds a child, failing if the name is taken.
    pub fn insert(&mut self, name: &str, node: Node) -> Result<&mut Node, ContainerError> {
        if name.is_empty() || name.contains('/') {
            return Err(ContainerError::NotFound(name.to_string()));
        }
        if self.child(name).is_some() {
            return Err(ContainerError::AlreadyExists(name.to_string()));
        }
        let idx = self.links.len();
        self.links.push((name.to_string(), node));
        Ok(&mut self.links[idx].1)
    }

    /// Attributes of the group.
    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    /// Attributes of the group for writing.
    pub fn attributes_mut(&mut self) -> &mut AttributeSet {
        &mut self.attributes
    }
}

/// A committed datatype stored under a name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedType {
    datatype: Datatype,
    attributes: AttributeSet,
}

impl NamedType {
    /// Commits `datatype`.
    pub fn new(datatype: Datatype) -> Self {
        Self { datatype, attributes: AttributeSet::new() }
    }

    /// The committed datatype.
    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }
}

/// A typed, shaped array of elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    datatype: Datatype,
    space: Dataspace,
    layout: DataLayout,
    storage: Storage,
    attributes: AttributeSet,
}

impl Dataset {
    /// Creates a zero-filled dataset.
    ///
    /// Extensible dataspaces need a chunked layout, and a chunked layout
    /// needs a simple dataspace of the same rank with non-zero chunk sizes.
    pub fn new(datatype: Datatype, space: Dataspace, layout: DataLayout) -> Result<Self, ContainerError> {
        let chunk_dims = layout.chunk_dims();
        match (&chunk_dims, &space.space_type) {
            (Some(chunk), DataspaceType::Simple) => {
                if chunk.len() != space.ndims() {
                    return Err(ContainerError::InvalidLayout(format!(
                        "chunk rank {} does not match dataspace rank {}",
                        chunk.len(),
                        space.ndims()
                    )));
                }
                if chunk.contains(&0) {
                    return Err(ContainerError::InvalidLayout("zero chunk size".to_string()));
                }
            }
            (Some(_), _) => {
                return Err(ContainerError::InvalidLayout(
                    "only simple dataspaces can be chunked".to_string(),
                ));
            }
            (None, _) if matches!(layout, DataLayout::Virtual { .. }) => {
                return Err(ContainerError::InvalidLayout(
                    "virtual layouts are not supported".to_string(),
                ));
            }
            (None, _) if space.is_extensible() => {
                return Err(ContainerError::InvalidLayout(
                    "extensible dataspaces must be chunked".to_string(),
                ));
            }
            (None, _) => {}
        }
        let storage = Storage::new(&datatype, &space, chunk_dims.as_deref());
        Ok(Self { datatype, space, layout, storage, attributes: AttributeSet::new() })
    }

    /// Element type.
    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    /// Current dataspace.
    pub fn space(&self) -> &Dataspace {
        &self.space
    }

    /// Storage layout.
    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Attributes of the dataset.
    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    /// Attributes of the dataset for writing.
    pub fn attributes_mut(&mut self) -> &mut AttributeSet {
        &mut self.attributes
    }

    /// Number of storage blocks (chunks, or the single block of an
    /// unchunked dataset) that hold written data.
    pub fn allocated_blocks(&self) -> usize {
        self.storage.allocated_blocks()
    }

    fn selected(&self, memspace: &Dataspace, sel: &Selection) -> Result<Points, ContainerError> {
        let points = Storage::points(&self.space, sel)?;
        let memory = memspace.element_count().ok_or(ContainerError::LengthOverflow)?;
        if memory != points.remaining() {
            return Err(ContainerError::SelectionSize { memory, file: points.remaining() });
        }
        Ok(points)
    }

    /// Reads the selected elements as raw bytes in the dataset's byte order.
    pub fn read_fixed(&self, memspace: &Dataspace, sel: &Selection) -> Result<Vec<u8>, ContainerError> {
        self.storage.read_fixed(self.selected(memspace, sel)?)
    }

    /// Writes raw bytes in the dataset's byte order to the selected elements.
    pub fn write_fixed(
        &mut self,
        memspace: &Dataspace,
        sel: &Selection,
        bytes: &[u8],
    ) -> Result<(), ContainerError> {
        let points = self.selected(memspace, sel)?;
        self.storage.write_fixed(points, bytes)
    }

    /// Reads the selected elements of a variable-length string dataset.
    pub fn read_vlen(&self, memspace: &Dataspace, sel: &Selection) -> Result<VlenBuffer, ContainerError> {
        self.storage.read_vlen(self.selected(memspace, sel)?)
    }

    /// Writes strings to the selected elements of a variable-length string
    /// dataset.
    pub fn write_vlen(
        &mut self,
        memspace: &Dataspace,
        sel: &Selection,
        strings: &[&str],
    ) -> Result<(), ContainerError> {
        let points = self.selected(memspace, sel)?;
        self.storage.write_vlen(points, strings)
    }

    /// Grows the current extent to `dims` (native order).
    ///
    /// Existing elements keep their coordinates; new elements are zero.
    /// Chunks are addressed by coordinate, so no element storage moves or
    /// gets allocated here.
    pub fn set_extent(&mut self, dims: &[u64]) -> Result<(), ContainerError> {
        if !self.layout.is_chunked() {
            return Err(ContainerError::NotChunked);
        }
        if dims.len() != self.space.ndims() {
            return Err(ContainerError::SelectionRank { selection: dims.len(), space: self.space.ndims() });
        }
        let max_dims = self.space.max_dims();
        for (dim, ((&requested, &current), &max)) in
            dims.iter().zip(&self.space.dimensions).zip(max_dims).enumerate()
        {
            if requested < current {
                return Err(ContainerError::ExtentShrink { dim, current, requested });
            }
            if max != UNLIMITED && requested > max {
                return Err(ContainerError::ExtentExceedsMaximum { dim, requested, max });
            }
        }
        self.space.dimensions = dims.to_vec();
        Ok(())
    }
}

/// How a file was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Objects can be read but not created or modified.
    ReadOnly,
    /// Objects can be read, created and modified.
    ReadWrite,
}

/// An open container: a root group plus an access mode.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    root: Node,
    mode: AccessMode,
}

impl Default for File {
    fn default() -> Self {
        Self::new(AccessMode::ReadWrite)
    }
}

/// Non-empty segments of an absolute or relative path.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl File {
    /// An empty file holding only the root group.
    pub fn new(mode: AccessMode) -> Self {
        Self { root: Node::Group(Group::new()), mode }
    }

    /// Access mode.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Reopens the same contents with another access mode.
    pub fn with_mode(mut self, mode: AccessMode) -> Self {
        self.mode = mode;
        self
    }

    /// The root group node.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Resolves a path; links are not followed.
    pub fn node(&self, path: &str) -> Option<&Node> {
        segments(path).try_fold(&self.root, |node, seg| node.as_group()?.child(seg))
    }

    /// Resolves a path for writing.
    pub fn node_mut(&mut self, path: &str) -> Result<&mut Node, ContainerError> {
        if self.mode == AccessMode::ReadOnly {
            return Err(ContainerError::ReadOnly);
        }
        let mut node = &mut self.root;
        for seg in segments(path) {
            node = match { node } {
                Node::Group(g) => g
                    .child_mut(seg)
                    .ok_or_else(|| ContainerError::NotFound(path.to_string()))?,
                _ => return Err(ContainerError::NotAGroup(seg.to_string())),
            };
        }
        Ok(node)
    }

    /// Inserts `node` at `path`, optionally creating missing parent groups.
    pub fn insert(
        &mut self,
        path: &str,
        node: Node,
        create_intermediate: bool,
    ) -> Result<&mut Node, ContainerError> {
        if self.mode == AccessMode::ReadOnly {
            return Err(ContainerError::ReadOnly);
        }
        let segs: Vec<&str> = segments(path).collect();
        let Some((leaf, parents)) = segs.split_last() else {
            return Err(ContainerError::AlreadyExists(path.to_string()));
        };
        let mut group = match &mut self.root {
            Node::Group(g) => g,
            _ => return Err(ContainerError::NotAGroup("/".to_string())),
        };
        for seg in parents {
            if group.child(seg).is_none() {
                if !create_intermediate {
                    return Err(ContainerError::NotFound(path.to_string()));
                }
                group.insert(seg, Node::Group(Group::new()))?;
            }
            group = match group.child_mut(seg) {
                Some(Node::Group(g)) => g,
                _ => return Err(ContainerError::NotAGroup(seg.to_string())),
            };
        }
        group.insert(leaf, node)
    }

    /// Creates a group.
    pub fn create_group(&mut self, path: &str) -> Result<&mut Group, ContainerError> {
        match self.insert(path, Node::Group(Group::new()), true)? {
            Node::Group(g) => Ok(g),
            _ => Err(ContainerError::NotAGroup(path.to_string())),
        }
    }

    /// Creates a dataset, creating missing parent groups.
    pub fn create_dataset(&mut self, path: &str, dataset: Dataset) -> Result<&mut Dataset, ContainerError> {
        self.insert(path, Node::Dataset(dataset), true)?
            .as_dataset_mut()
            .ok_or_else(|| ContainerError::NotFound(path.to_string()))
    }

    /// Commits a named datatype.
    pub fn commit_datatype(&mut self, path: &str, datatype: Datatype) -> Result<(), ContainerError> {
        self.insert(path, Node::NamedType(NamedType::new(datatype)), true)?;
        Ok(())
    }

    /// Creates a soft link to `target`.
    pub fn link_soft(&mut self, path: &str, target: &str) -> Result<(), ContainerError> {
        self.insert(path, Node::SoftLink { target: target.to_string() }, true)?;
        Ok(())
    }

    /// Creates an external link to `target` in `file`.
    pub fn link_external(&mut self, path: &str, file: &str, target: &str) -> Result<(), ContainerError> {
        let node = Node::ExternalLink { file: file.to_string(), target: target.to_string() };
        self.insert(path, node, true)?;
        Ok(())
    }
}

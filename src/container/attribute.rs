//! Attributes attached to groups, datasets and named datatypes.

use super::{ContainerError, Dataspace, DataspaceExt, Datatype, Points, Selection, Storage, VlenBuffer};

/// A named, typed value attached to an object.
///
/// Attribute values are always transferred whole; there is no partial
/// selection on attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    name: String,
    datatype: Datatype,
    space: Dataspace,
    storage: Storage,
}

impl Attribute {
    fn new(name: &str, datatype: Datatype, space: Dataspace) -> Result<Self, ContainerError> {
        space.element_count().ok_or(ContainerError::LengthOverflow)?;
        let storage = Storage::new(&datatype, &space, None);
        Ok(Self { name: name.to_string(), datatype, space, storage })
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element type of the stored value.
    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    /// Shape of the stored value.
    pub fn space(&self) -> &Dataspace {
        &self.space
    }

    fn all(&self) -> Result<Points, ContainerError> {
        Storage::points(&self.space, &Selection::All)
    }

    /// Reads the whole value as raw bytes in the attribute's byte order.
    pub fn read_fixed(&self) -> Result<Vec<u8>, ContainerError> {
        self.storage.read_fixed(self.all()?)
    }

    /// Reads the whole value of a variable-length string attribute.
    pub fn read_vlen(&self) -> Result<VlenBuffer, ContainerError> {
        self.storage.read_vlen(self.all()?)
    }

    /// Replaces the whole value with raw bytes in the attribute's byte order.
    pub fn write_fixed(&mut self, bytes: &[u8]) -> Result<(), ContainerError> {
        let points = self.all()?;
        self.storage.write_fixed(points, bytes)
    }

    /// Replaces the whole value of a variable-length string attribute.
    pub fn write_vlen(&mut self, strings: &[&str]) -> Result<(), ContainerError> {
        let points = self.all()?;
        self.storage.write_vlen(points, strings)
    }
}

/// The attributes of one object, in creation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    attrs: Vec<Attribute>,
}

impl AttributeSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Whether there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Whether an attribute named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Looks up an attribute by name.
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name == name)
    }

    /// Looks up an attribute by name for writing.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attrs.iter_mut().find(|a| a.name == name)
    }

    /// Creates a zero-filled attribute.
    pub fn create(
        &mut self,
        name: &str,
        datatype: Datatype,
        space: Dataspace,
    ) -> Result<&mut Attribute, ContainerError> {
        if self.contains(name) {
            return Err(ContainerError::AlreadyExists(name.to_string()));
        }
        let idx = self.attrs.len();
        self.attrs.push(Attribute::new(name, datatype, space)?);
        Ok(&mut self.attrs[idx])
    }

    /// Deletes an attribute, returning whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|a| a.name != name);
        self.attrs.len() != before
    }

    /// Iterates over attributes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attrs.iter()
    }

    /// Attribute names in creation order.
    pub fn names(&self) -> Vec<&str> {
        self.attrs.iter().map(|a| a.name.as_str()).collect()
    }
}

//! Structural description of a container hierarchy.
//!
//! [`describe`] walks a group recursively, or describes a single dataset,
//! and returns an owned tree. Children are listed in the group's own order.
//! Parts that cannot be converted are recorded as empty rather than failing
//! the walk: an unclassifiable datatype yields an empty [`TypeInfo`] and an
//! unreadable attribute a `None` value.

use crate::{
    attrs::read_all_lossy,
    container::{Dataset, File, Group, LayoutExt, Node},
    location,
    shape::{self, ExtentKind, ShapeDescriptor},
    types::TypeInfo,
    ExchangeError, Value,
};
use log::warn;
use std::collections::BTreeMap;

/// Attribute values by name; `None` where the value could not be converted.
pub type AttributeInfo = BTreeMap<String, Option<Value>>;

/// Description of a location.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataDescriptor {
    /// A group and everything below it.
    Group(GroupInfo),
    /// A single dataset.
    Dataset(DatasetInfo),
}

/// Description of a group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupInfo {
    /// Full path.
    pub name: String,
    /// Child groups, described recursively.
    pub groups: Vec<GroupInfo>,
    /// Child datasets.
    pub datasets: Vec<DatasetInfo>,
    /// Child named datatypes.
    pub datatypes: Vec<NamedTypeInfo>,
    /// Child soft and external links.
    pub links: Vec<LinkInfo>,
    /// Attributes of the group.
    pub attributes: AttributeInfo,
}

/// Description of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    /// Full path.
    pub name: String,
    /// Element type.
    pub datatype: TypeInfo,
    /// Current and maximum extent.
    pub dataspace: ShapeDescriptor,
    /// Chunk dimensions in runtime order, for chunked simple datasets.
    pub chunk_size: Option<Vec<u64>>,
    /// Attributes of the dataset.
    pub attributes: AttributeInfo,
}

/// A named datatype. Only the name is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTypeInfo {
    /// Full path.
    pub name: String,
}

/// A soft or external link. Only the name is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    /// Full path.
    pub name: String,
}

/// Describes the group or dataset at `path`.
pub fn describe(file: &File, path: &str) -> Result<MetadataDescriptor, ExchangeError> {
    match location::resolve(file, path)? {
        Node::Group(g) => Ok(MetadataDescriptor::Group(describe_group(g, path))),
        Node::Dataset(ds) => Ok(MetadataDescriptor::Dataset(describe_dataset(ds, path))),
        other => Err(ExchangeError::WrongObjectKind {
            path: path.to_string(),
            expected: "group or dataset",
            found: other.kind().to_string(),
        }),
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn describe_group(group: &Group, path: &str) -> GroupInfo {
    let mut info = GroupInfo {
        name: path.to_string(),
        groups: Vec::new(),
        datasets: Vec::new(),
        datatypes: Vec::new(),
        links: Vec::new(),
        attributes: read_all_lossy(group.attributes()),
    };
    for (name, child) in group.children() {
        let child_path = join(path, name);
        match child {
            Node::Group(g) => info.groups.push(describe_group(g, &child_path)),
            Node::Dataset(ds) => info.datasets.push(describe_dataset(ds, &child_path)),
            Node::NamedType(_) => info.datatypes.push(NamedTypeInfo { name: child_path }),
            Node::SoftLink { .. } | Node::ExternalLink { .. } => {
                info.links.push(LinkInfo { name: child_path });
            }
        }
    }
    info
}

fn describe_dataset(ds: &Dataset, path: &str) -> DatasetInfo {
    let datatype = TypeInfo::of(ds.datatype());
    if datatype.class.is_none() {
        warn!("dataset '{path}' has a malformed datatype");
    }
    let dataspace = ShapeDescriptor::from_dataspace(ds.space());
    let chunk_size = match (dataspace.kind(), ds.layout().chunk_dims()) {
        (ExtentKind::Simple, Some(chunk)) => Some(shape::to_runtime_order(&chunk)),
        _ => None,
    };
    DatasetInfo {
        name: path.to_string(),
        datatype,
        dataspace,
        chunk_size,
        attributes: read_all_lossy(ds.attributes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{
        DataLayout, Dataspace, DataspaceExt, Datatype, DatatypeByteOrder, DatatypeExt, LayoutExt,
    };

    #[test]
    fn names_are_full_paths() {
        let mut file = File::default();
        file.create_group("/a/b").unwrap();
        file.commit_datatype("/a/t", Datatype::integer(4, true)).unwrap();
        file.link_soft("/a/l", "/a/b").unwrap();
        let MetadataDescriptor::Group(root) = describe(&file, "/").unwrap() else {
            panic!("expected a group");
        };
        assert_eq!(root.name, "/");
        let a = &root.groups[0];
        assert_eq!(a.name, "/a");
        assert_eq!(a.groups[0].name, "/a/b");
        assert_eq!(a.datatypes, [NamedTypeInfo { name: "/a/t".to_string() }]);
        assert_eq!(a.links, [LinkInfo { name: "/a/l".to_string() }]);
    }

    #[test]
    fn chunk_size_in_runtime_order() {
        let mut file = File::default();
        let space = Dataspace::simple_with_max(&[4, 2], &[8, 2]).unwrap();
        let layout = DataLayout::chunked(&[4, 1]).unwrap();
        file.create_dataset("/d", Dataset::new(Datatype::float(4), space, layout).unwrap()).unwrap();
        let MetadataDescriptor::Dataset(info) = describe(&file, "/d").unwrap() else {
            panic!("expected a dataset");
        };
        assert_eq!(info.chunk_size, Some(vec![1, 4]));
        assert_eq!(info.dataspace.size(), [2, 4]);
        assert_eq!(info.datatype.class, Some("float"));
    }

    #[test]
    fn unclassifiable_types_do_not_abort() {
        let mut file = File::default();
        let compound = Datatype::Compound { size: 8, members: Vec::new() };
        let ds = Dataset::new(compound, Dataspace::simple(&[3]), DataLayout::contiguous()).unwrap();
        file.create_dataset("/c", ds).unwrap();
        let malformed = Datatype::BitField {
            size: 1,
            byte_order: DatatypeByteOrder::LittleEndian,
            bit_offset: 4,
            bit_precision: 8,
        };
        let ds = Dataset::new(malformed, Dataspace::scalar(), DataLayout::contiguous()).unwrap();
        file.create_dataset("/u", ds).unwrap();
        let MetadataDescriptor::Group(root) = describe(&file, "/").unwrap() else {
            panic!("expected a group");
        };
        assert_eq!(root.datasets[0].datatype.class, Some("compound"));
        assert_eq!(root.datasets[0].datatype.runtime_class, None);
        assert_eq!(root.datasets[1].datatype, TypeInfo::default());
        assert_eq!(root.datasets[1].chunk_size, None);
    }

    #[test]
    fn named_types_cannot_be_described() {
        let mut file = File::default();
        file.commit_datatype("/t", Datatype::float(8)).unwrap();
        file.link_soft("/l", "/t").unwrap();
        assert!(matches!(
            describe(&file, "/t"),
            Err(ExchangeError::WrongObjectKind { found, .. }) if found == "named datatype"
        ));
        assert!(matches!(describe(&file, "/l"), Err(ExchangeError::WrongObjectKind { .. })));
    }
}

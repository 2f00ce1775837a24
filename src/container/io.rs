//! Loading and saving whole files in the on-disk container format.
//!
//! Loading walks the group tree with the `rustyhdf5` reader and decodes each
//! object header with `rustyhdf5-format`, so datatypes, dataspaces and
//! layouts arrive exactly as stored. Saving goes through
//! [`rustyhdf5::FileBuilder`], which limits what a saved file can hold:
//!
//! - groups directly under the root, each holding only datasets;
//! - datasets of fixed-size element types with a scalar or simple extent;
//! - attributes that are scalar `f64`, `i64`, `u64` or string values, or
//!   `f64`/`i64` vectors.
//!
//! Anything else fails with [`ContainerError::Unrepresentable`] instead of
//! being written differently from how it is held in memory.

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};
use rustyhdf5::{AttrValue, FileBuilder};
use rustyhdf5_format::{
    attribute::extract_attributes_full,
    data_read::read_raw_data_full,
    filter_pipeline::FilterPipeline,
    group_v2::resolve_path_any,
    message_type::MessageType,
    object_header::ObjectHeader,
    superblock::Superblock,
    type_builders::DatasetBuilder,
    vl_data::read_vl_strings,
};

use super::{
    vlen_reclaim, AccessMode, Attribute, ContainerError, DataLayout, Dataset,
    Dataspace, DataspaceExt, DataspaceType, Datatype, DatatypeByteOrder, DatatypeExt, File,
    LayoutExt, Node, Selection,
};

fn format_error(e: impl std::fmt::Display) -> ContainerError {
    ContainerError::Format(e.to_string())
}

fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Reads objects out of a parsed file image.
struct Loader<'a> {
    data: &'a [u8],
    superblock: &'a Superblock,
}

impl Loader<'_> {
    fn header(&self, path: &str) -> Result<ObjectHeader, ContainerError> {
        let sb = self.superblock;
        let addr = resolve_path_any(self.data, sb, path).map_err(format_error)?;
        ObjectHeader::parse(self.data, addr as usize, sb.offset_size, sb.length_size).map_err(format_error)
    }

    fn group(
        &self,
        file: &mut File,
        path: &str,
        group: &rustyhdf5::Group<'_>,
    ) -> Result<(), ContainerError> {
        for name in group.datasets().map_err(format_error)? {
            let child = child_path(path, &name);
            if let Some(dataset) = self.dataset(&child)? {
                file.create_dataset(&child, dataset)?;
                self.attributes(file, &child)?;
            }
        }
        for name in group.groups().map_err(format_error)? {
            let child = child_path(path, &name);
            file.create_group(&child)?;
            self.attributes(file, &child)?;
            let sub = group.group(&name).map_err(format_error)?;
            self.group(file, &child, &sub)?;
        }
        Ok(())
    }

    fn dataset(&self, path: &str) -> Result<Option<Dataset>, ContainerError> {
        let (os, ls) = (self.superblock.offset_size, self.superblock.length_size);
        let header = self.header(path)?;
        let message = |kind: MessageType| {
            header.messages.iter().find(|m| m.msg_type == kind).map(|m| m.data.as_slice())
        };
        let (Some(dt), Some(ds), Some(dl)) = (
            message(MessageType::Datatype),
            message(MessageType::Dataspace),
            message(MessageType::DataLayout),
        ) else {
            return Err(ContainerError::Format(format!("{path}: incomplete dataset header")));
        };
        let datatype = match Datatype::parse(dt) {
            Ok((datatype, _)) => datatype,
            Err(e) => {
                warn!("skipping dataset {path}: {e}");
                return Ok(None);
            }
        };
        if datatype.is_variable() && !datatype.is_vlen_string() {
            warn!("skipping dataset {path}: variable-length sequences are not supported");
            return Ok(None);
        }
        let space = Dataspace::parse(ds, ls).map_err(format_error)?;
        let stored = DataLayout::parse(dl, os, ls).map_err(format_error)?;
        let layout = match &stored {
            DataLayout::Chunked { chunk_dimensions, .. } => {
                let chunk: Vec<u64> =
                    chunk_dimensions.iter().take(space.ndims()).map(|&d| u64::from(d)).collect();
                DataLayout::chunked(&chunk)?
            }
            _ => DataLayout::contiguous(),
        };
        let unallocated = matches!(
            stored,
            DataLayout::Contiguous { address: None, .. } | DataLayout::Chunked { btree_address: None, .. }
        );

        let mut dataset = Dataset::new(datatype, space, layout)?;
        if unallocated {
            return Ok(Some(dataset));
        }
        let pipeline = message(MessageType::FilterPipeline)
            .map(FilterPipeline::parse)
            .transpose()
            .map_err(format_error)?;
        let space = dataset.space.clone();
        let raw = read_raw_data_full(self.data, &stored, &space, &dataset.datatype, pipeline.as_ref(), os, ls)
            .map_err(format_error)?;
        if dataset.datatype.is_vlen_string() {
            let strings =
                read_vl_strings(self.data, &raw, space.num_elements(), os, ls).map_err(format_error)?;
            let strings: Vec<&str> = strings.iter().map(String::as_str).collect();
            dataset.write_vlen(&space, &Selection::All, &strings)?;
        } else {
            dataset.write_fixed(&space, &Selection::All, &raw)?;
        }
        Ok(Some(dataset))
    }

    fn attributes(&self, file: &mut File, path: &str) -> Result<(), ContainerError> {
        let (os, ls) = (self.superblock.offset_size, self.superblock.length_size);
        let header = self.header(path)?;
        let messages = extract_attributes_full(self.data, &header, os, ls).map_err(format_error)?;
        let Some(set) = file.node_mut(path)?.attributes_mut() else {
            return Ok(());
        };
        for msg in messages {
            if msg.datatype.is_variable() && !msg.datatype.is_vlen_string() {
                warn!("skipping attribute '{}' of {path}: variable-length sequences are not supported", msg.name);
                continue;
            }
            let attr = set.create(&msg.name, msg.datatype.clone(), msg.dataspace.clone())?;
            if msg.datatype.is_vlen_string() {
                let strings = msg.read_vl_strings(self.data, os, ls).map_err(format_error)?;
                let strings: Vec<&str> = strings.iter().map(String::as_str).collect();
                attr.write_vlen(&strings)?;
            } else {
                attr.write_fixed(&msg.raw_data)?;
            }
        }
        Ok(())
    }
}

impl File {
    /// Parses a complete file image.
    ///
    /// Groups, datasets and their attributes are loaded; named datatypes and
    /// links are not. Datasets whose datatype cannot be decoded are skipped
    /// with a warning.
    pub fn from_bytes(bytes: Vec<u8>, mode: AccessMode) -> Result<Self, ContainerError> {
        let source = rustyhdf5::File::from_bytes(bytes).map_err(format_error)?;
        let loader = Loader { data: source.as_bytes(), superblock: source.superblock() };
        let mut file = File::new(AccessMode::ReadWrite);
        loader.attributes(&mut file, "/")?;
        loader.group(&mut file, "/", &source.root())?;
        debug!("loaded {} top-level objects from a {} byte image", file.root_len(), source.as_bytes().len());
        Ok(file.with_mode(mode))
    }

    /// Serializes the file into a complete file image.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ContainerError> {
        let Node::Group(root) = &self.root else {
            return Err(ContainerError::NotAGroup("/".to_string()));
        };
        let mut builder = FileBuilder::new();
        for attr in root.attributes().iter() {
            builder.set_attr(attr.name(), attr_value(attr, "/")?);
        }
        for (name, node) in root.children() {
            let path = child_path("/", name);
            match node {
                Node::Dataset(ds) => save_dataset(builder.create_dataset(name), ds, &path)?,
                Node::Group(group) => {
                    let mut sub = builder.create_group(name);
                    for attr in group.attributes().iter() {
                        sub.set_attr(attr.name(), attr_value(attr, &path)?);
                    }
                    for (child, node) in group.children() {
                        let child_path = child_path(&path, child);
                        let Node::Dataset(ds) = node else {
                            return Err(ContainerError::Unrepresentable(format!(
                                "{} {child_path}: saved groups hold only datasets",
                                node.kind()
                            )));
                        };
                        save_dataset(sub.create_dataset(child), ds, &child_path)?;
                    }
                    builder.add_group(sub.finish());
                }
                other => {
                    return Err(ContainerError::Unrepresentable(format!("{} {path}", other.kind())));
                }
            }
        }
        let bytes = builder.finish().map_err(format_error)?;
        debug!("saved a {} byte image", bytes.len());
        Ok(bytes)
    }

    fn root_len(&self) -> usize {
        self.root.as_group().map_or(0, super::Group::len)
    }
}

/// Fills `target` with the dense contents and attributes of `ds`.
fn save_dataset(target: &mut DatasetBuilder, ds: &Dataset, path: &str) -> Result<(), ContainerError> {
    if ds.space.space_type == DataspaceType::Null {
        return Err(ContainerError::Unrepresentable(format!("dataset {path} with a null dataspace")));
    }
    if ds.datatype.is_variable() {
        return Err(ContainerError::Unrepresentable(format!(
            "dataset {path} of variable-length {}",
            ds.datatype.class_name()
        )));
    }
    let raw = ds.read_fixed(&ds.space, &Selection::All)?;
    target
        .with_compound_data(ds.datatype.clone(), raw, ds.space.num_elements())
        .with_shape(&ds.space.dimensions);
    if let Some(max) = &ds.space.max_dimensions {
        target.with_maxshape(max);
    }
    if let Some(chunk) = ds.layout.chunk_dims() {
        target.with_chunks(&chunk);
    }
    for attr in ds.attributes.iter() {
        target.set_attr(attr.name(), attr_value(attr, path)?);
    }
    Ok(())
}

/// The same descriptor in little-endian byte order.
fn little_endian(mut datatype: Datatype) -> Datatype {
    if let Datatype::FixedPoint { byte_order, .. } | Datatype::FloatingPoint { byte_order, .. } =
        &mut datatype
    {
        *byte_order = DatatypeByteOrder::LittleEndian;
    }
    datatype
}

/// Converts an attribute to the writer's value model, failing unless the
/// saved attribute reads back as the same runtime value.
fn attr_value(attr: &Attribute, path: &str) -> Result<AttrValue, ContainerError> {
    let datatype = attr.datatype();
    let space = attr.space();
    // A `[n, 1]` extent is the runtime row vector `1 x n`, which a rank-1
    // array also reads back as.
    let vector = space.space_type == DataspaceType::Simple
        && matches!(space.dimensions.as_slice(), [_] | [_, 1]);
    let scalar = space.space_type == DataspaceType::Scalar;

    if datatype.is_vlen_string() && scalar {
        let buf = attr.read_vlen()?;
        let value = buf.get(0).unwrap_or_default().to_string();
        vlen_reclaim(datatype, space, buf)?;
        return Ok(AttrValue::String(value));
    }
    if scalar || vector {
        let raw = || attr.read_fixed();
        if *datatype == little_endian(Datatype::float(8)) {
            let values: Vec<f64> = raw()?.chunks_exact(8).map(LittleEndian::read_f64).collect();
            return Ok(match (scalar, values.as_slice()) {
                (true, [v]) => AttrValue::F64(*v),
                _ => AttrValue::F64Array(values),
            });
        }
        if *datatype == little_endian(Datatype::integer(8, true)) {
            let values: Vec<i64> = raw()?.chunks_exact(8).map(LittleEndian::read_i64).collect();
            return Ok(match (scalar, values.as_slice()) {
                (true, [v]) => AttrValue::I64(*v),
                _ => AttrValue::I64Array(values),
            });
        }
        if scalar && *datatype == little_endian(Datatype::integer(8, false)) {
            return Ok(AttrValue::U64(LittleEndian::read_u64(&raw()?)));
        }
    }
    Err(ContainerError::Unrepresentable(format!(
        "attribute '{}' of {path} ({} with {} dimensions)",
        attr.name(),
        datatype.class_name(),
        space.ndims()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{CharacterSet, UNLIMITED};

    fn le_bytes(values: &[f64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn dataset<'a>(file: &'a File, path: &str) -> &'a Dataset {
        file.node(path).and_then(Node::as_dataset).unwrap()
    }

    fn sample() -> File {
        let mut file = File::default();
        let f64_le = little_endian(Datatype::float(8));
        let i64_le = little_endian(Datatype::integer(8, true));

        let grid = file
            .create_dataset("/grid", Dataset::new(f64_le.clone(), Dataspace::simple(&[2, 3]), DataLayout::contiguous()).unwrap())
            .unwrap();
        grid.write_fixed(&Dataspace::simple(&[6]), &Selection::All, &le_bytes(&[1., 2., 3., 4., 5., 6.]))
            .unwrap();
        let scale = grid.attributes_mut().create("scale", f64_le.clone(), Dataspace::simple(&[2])).unwrap();
        scale.write_fixed(&le_bytes(&[0.5, 2.0])).unwrap();

        let space = Dataspace::simple_with_max(&[5], &[UNLIMITED]).unwrap();
        let series = file
            .create_dataset("/series", Dataset::new(f64_le, space, DataLayout::chunked(&[2]).unwrap()).unwrap())
            .unwrap();
        let head = Selection::Hyperslab { start: vec![0], count: vec![3], stride: vec![1] };
        series.write_fixed(&Dataspace::simple(&[3]), &head, &le_bytes(&[7., 8., 9.])).unwrap();

        let ids = Dataset::new(i64_le.clone(), Dataspace::scalar(), DataLayout::contiguous()).unwrap();
        file.create_dataset("/meta/id", ids).unwrap();
        let node = file.node_mut("/meta").unwrap();
        let attrs = node.attributes_mut().unwrap();
        attrs
            .create("label", Datatype::vlen_string(CharacterSet::Utf8), Dataspace::scalar())
            .unwrap()
            .write_vlen(&["run 1"])
            .unwrap();
        file.node_mut("/")
            .unwrap()
            .attributes_mut()
            .unwrap()
            .create("version", i64_le, Dataspace::scalar())
            .unwrap()
            .write_fixed(&3i64.to_le_bytes())
            .unwrap();
        file
    }

    #[test]
    fn saved_files_load_back() {
        let bytes = sample().to_bytes().unwrap();
        let file = File::from_bytes(bytes, AccessMode::ReadOnly).unwrap();
        assert_eq!(file.mode(), AccessMode::ReadOnly);

        let grid = dataset(&file, "/grid");
        assert_eq!(grid.space().dimensions, [2, 3]);
        assert_eq!(
            grid.read_fixed(&Dataspace::simple(&[6]), &Selection::All).unwrap(),
            le_bytes(&[1., 2., 3., 4., 5., 6.])
        );
        let scale = grid.attributes().get("scale").unwrap();
        assert_eq!(scale.read_fixed().unwrap(), le_bytes(&[0.5, 2.0]));

        let series = dataset(&file, "/series");
        assert_eq!(series.space().max_dims(), [UNLIMITED]);
        assert_eq!(series.layout().chunk_dims(), Some(vec![2]));
        assert_eq!(
            series.read_fixed(&Dataspace::simple(&[5]), &Selection::All).unwrap(),
            le_bytes(&[7., 8., 9., 0., 0.])
        );

        assert_eq!(dataset(&file, "/meta/id").space().space_type, DataspaceType::Scalar);
        let meta = file.node("/meta").unwrap().attributes().unwrap();
        let label = meta.get("label").unwrap();
        assert!(matches!(label.datatype(), Datatype::String { size: 5, .. }));
        assert_eq!(label.read_fixed().unwrap(), b"run 1");
        let root = file.root().attributes().unwrap();
        assert_eq!(root.get("version").unwrap().read_fixed().unwrap(), 3i64.to_le_bytes());
    }

    #[test]
    fn unsaveable_objects_are_rejected() {
        let mut nested = File::default();
        nested.create_group("/a/b").unwrap();
        assert!(matches!(nested.to_bytes(), Err(ContainerError::Unrepresentable(_))));

        let mut strings = File::default();
        let vlen = Datatype::vlen_string(CharacterSet::Utf8);
        strings
            .create_dataset("/s", Dataset::new(vlen, Dataspace::simple(&[2]), DataLayout::contiguous()).unwrap())
            .unwrap();
        assert!(matches!(strings.to_bytes(), Err(ContainerError::Unrepresentable(_))));

        let mut linked = File::default();
        linked.link_soft("/l", "/x").unwrap();
        assert!(matches!(linked.to_bytes(), Err(ContainerError::Unrepresentable(_))));

        let mut narrow = File::default();
        narrow
            .node_mut("/")
            .unwrap()
            .attributes_mut()
            .unwrap()
            .create("n", Datatype::integer(4, true), Dataspace::scalar())
            .unwrap();
        assert!(matches!(narrow.to_bytes(), Err(ContainerError::Unrepresentable(_))));
    }

    #[test]
    fn garbage_is_a_format_error() {
        assert!(matches!(
            File::from_bytes(b"not a container".to_vec(), AccessMode::ReadOnly),
            Err(ContainerError::Format(_))
        ));
    }
}

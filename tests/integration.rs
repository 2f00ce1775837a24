use h5exchange::{
    container::{
        AccessMode, CharacterSet, DataLayout, Dataset, Dataspace, DataspaceExt, Datatype, DatatypeExt, File,
        LayoutExt, Selection, StringPadding, UNLIMITED,
    },
    create_dataset, describe_location, read_attribute, read_attributes, read_dataset, write_attribute,
    write_attributes, write_dataset, AttributeMap, DatasetSpec, ElementTypeTag, ExchangeError, ExtentKind,
    Hyperslab, MaxSize, MetadataDescriptor, TypeSize, Value,
};
use ndarray::array;

fn created(shape: &[u64], tag: &str) -> File {
    let mut file = File::default();
    let spec = DatasetSpec::new(shape, tag.parse::<ElementTypeTag>().unwrap());
    create_dataset(&mut file, "/d", &spec).unwrap();
    file
}

#[test]
fn numeric_round_trips() {
    let values = [
        ("int8", Value::from(array![[-1i8, 2, 3], [4, 5, -128]])),
        ("uint8", Value::from(array![[1u8, 2, 3], [4, 5, 255]])),
        ("int16", Value::from(array![[-1i16, 2, 3], [4, 5, i16::MIN]])),
        ("uint16", Value::from(array![[1u16, 2, 3], [4, 5, u16::MAX]])),
        ("int32", Value::from(array![[-1i32, 2, 3], [4, 5, i32::MIN]])),
        ("uint32", Value::from(array![[1u32, 2, 3], [4, 5, u32::MAX]])),
        ("int64", Value::from(array![[-1i64, 2, 3], [4, 5, i64::MIN]])),
        ("uint64", Value::from(array![[1u64, 2, 3], [4, 5, u64::MAX]])),
        ("single", Value::from(array![[0.5f32, -1.25, 3.0], [4.0, f32::MAX, 6.0]])),
        ("double", Value::from(array![[0.5, -1.25, 3.0], [4.0, f64::MIN_POSITIVE, 6.0]])),
    ];
    for (tag, value) in values {
        let mut file = created(&[2, 3], tag);
        write_dataset(&mut file, "/d", &value, None).unwrap();
        assert_eq!(read_dataset(&file, "/d", None).unwrap(), value, "{tag}");
    }
}

#[test]
fn rank_one_datasets_read_as_rows() {
    let mut file = created(&[4], "double");
    let row = Value::from(array![[1.0, 2.0, 3.0, 4.0]]);
    write_dataset(&mut file, "/d", &row, None).unwrap();
    let read = read_dataset(&file, "/d", None).unwrap();
    assert_eq!(*read.dims(), [1, 4]);
    assert_eq!(read, row);

    let col = Value::from(array![[1.0], [2.0], [3.0], [4.0]]);
    assert!(matches!(
        write_dataset(&mut file, "/d", &col, None),
        Err(ExchangeError::ShapeMismatch(_))
    ));
}

#[test]
fn scalar_datasets() {
    let mut file = created(&[1, 1], "int32");
    let value = Value::from(42i32);
    write_dataset(&mut file, "/d", &value, None).unwrap();
    assert_eq!(read_dataset(&file, "/d", None).unwrap(), value);
    assert_eq!(read_dataset(&file, "/d", None).unwrap(), Value::from(array![[42i32]]));
    assert!(matches!(
        read_dataset(&file, "/d", Some(&Hyperslab::new([1], [1]))),
        Err(ExchangeError::ScalarHyperslabUnsupported)
    ));
    assert!(matches!(
        write_dataset(&mut file, "/d", &Value::from(array![[1i32, 2]]), None),
        Err(ExchangeError::ShapeMismatch(_))
    ));
}

#[test]
fn values_read_back_as_written() {
    let mut file = created(&[1, 1], "double");
    let scalar = Value::from(3.0);
    write_dataset(&mut file, "/d", &scalar, None).unwrap();
    assert_eq!(read_dataset(&file, "/d", None).unwrap(), scalar);

    let mut file = created(&[3, 1], "double");
    let column = Value::from(array![1.0, 2.0, 3.0]);
    write_dataset(&mut file, "/d", &column, None).unwrap();
    assert_eq!(read_dataset(&file, "/d", None).unwrap(), column);
}

#[test]
fn files_survive_a_byte_round_trip() {
    let mut file = created(&[2, 3], "double");
    let grid = Value::from(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    write_dataset(&mut file, "/d", &grid, None).unwrap();
    write_attribute(&mut file, "/d", "scale", &Value::from(0.5)).unwrap();

    let bytes = file.to_bytes().unwrap();
    let loaded = File::from_bytes(bytes.clone(), AccessMode::ReadWrite).unwrap();
    assert_eq!(read_dataset(&loaded, "/d", None).unwrap(), grid);
    assert_eq!(read_attribute(&loaded, "/d", "scale").unwrap(), Value::from(0.5));

    let mut frozen = File::from_bytes(bytes, AccessMode::ReadOnly).unwrap();
    assert!(write_dataset(&mut frozen, "/d", &grid, None).is_err());
}

#[test]
fn extend_within_maximum() {
    let mut file = File::default();
    let spec = DatasetSpec::new([4], ElementTypeTag::Float64).with_max_shape([10]).with_chunk([2]);
    create_dataset(&mut file, "/d", &spec).unwrap();

    let eight = Value::from(array![[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]]);
    write_dataset(&mut file, "/d", &eight, Some(&Hyperslab::new([1], [8]))).unwrap();
    assert_eq!(read_dataset(&file, "/d", None).unwrap(), eight);

    let eleven = Value::from(ndarray::Array2::<f64>::zeros((1, 11)));
    assert!(matches!(
        write_dataset(&mut file, "/d", &eleven, Some(&Hyperslab::new([1], [11]))),
        Err(ExchangeError::HyperslabExceedsMaximum { dim: 0 })
    ));
    let MetadataDescriptor::Dataset(info) = describe_location(&file, Some("/d")).unwrap() else {
        panic!("expected a dataset");
    };
    assert_eq!(info.dataspace.size(), [8]);
    assert_eq!(info.dataspace.max_size(), [MaxSize::Bounded(10)]);
}

#[test]
fn reads_never_extend() {
    let mut file = File::default();
    let spec = DatasetSpec::new([4], ElementTypeTag::Int16).with_max_shape([UNLIMITED]).with_chunk([4]);
    create_dataset(&mut file, "/d", &spec).unwrap();
    assert!(matches!(
        read_dataset(&file, "/d", Some(&Hyperslab::new([3], [4]))),
        Err(ExchangeError::HyperslabOutOfBounds { dim: 0 })
    ));
    assert_eq!(*read_dataset(&file, "/d", None).unwrap().dims(), [1, 4]);
}

#[test]
fn append_columns_to_unlimited_dataset() {
    let mut file = File::default();
    let spec = DatasetSpec::new([3, UNLIMITED], ElementTypeTag::Int32).with_chunk([3, 2]);
    create_dataset(&mut file, "/log", &spec).unwrap();
    assert_eq!(*read_dataset(&file, "/log", None).unwrap().dims(), [3, 0]);

    let first = Value::from(array![[1i32, 4], [2, 5], [3, 6]]);
    write_dataset(&mut file, "/log", &first, Some(&Hyperslab::new([1, 1], [3, 2]))).unwrap();
    let second = Value::from(array![[7i32], [8], [9]]);
    write_dataset(&mut file, "/log", &second, Some(&Hyperslab::new([1, 3], [3, 1]))).unwrap();

    assert_eq!(
        read_dataset(&file, "/log", None).unwrap(),
        Value::from(array![[1i32, 4, 7], [2, 5, 8], [3, 6, 9]])
    );
    let last_row = read_dataset(&file, "/log", Some(&Hyperslab::new([3, 1], [1, 3]))).unwrap();
    assert_eq!(last_row, Value::from(array![[3i32, 6, 9]]));
}

#[test]
fn strided_subsets() {
    let mut file = created(&[2, 6], "uint16");
    let value = Value::from(array![[1u16, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12]]);
    write_dataset(&mut file, "/d", &value, None).unwrap();
    let slab = Hyperslab::new([2, 1], [1, 3]).with_stride([1, 2]);
    assert_eq!(
        read_dataset(&file, "/d", Some(&slab)).unwrap(),
        Value::from(array![[7u16, 9, 11]])
    );
    assert!(matches!(
        read_dataset(&file, "/d", Some(&Hyperslab::new([1, 1], [1, 4]).with_stride([1, 2]))),
        Err(ExchangeError::HyperslabOutOfBounds { dim: 1 })
    ));
}

#[test]
fn variable_length_strings() {
    let mut file = created(&[2, 2], "string");
    assert_eq!(
        read_dataset(&file, "/d", None).unwrap(),
        Value::strings(&[2, 2], ["", "", "", ""]).unwrap()
    );
    let value = Value::strings(&[2, 2], ["alpha", "β", "", "delta"]).unwrap();
    write_dataset(&mut file, "/d", &value, None).unwrap();
    assert_eq!(read_dataset(&file, "/d", None).unwrap(), value);

    let numbers = Value::from(array![[1.0, 2.0], [3.0, 4.0]]);
    assert!(matches!(
        write_dataset(&mut file, "/d", &numbers, None),
        Err(ExchangeError::TypeMismatch(_))
    ));
}

#[test]
fn fixed_width_strings_are_read_only() {
    let mut file = File::default();
    let dt = Datatype::fixed_string(4, StringPadding::NullPad, CharacterSet::Ascii);
    let ds = file
        .create_dataset("/fixed", Dataset::new(dt, Dataspace::simple(&[2]), DataLayout::contiguous()).unwrap())
        .unwrap();
    ds.write_fixed(&Dataspace::simple(&[2]), &Selection::All, b"ab\0\0wxyz").unwrap();

    assert_eq!(
        read_dataset(&file, "/fixed", None).unwrap(),
        Value::strings(&[1, 2], ["ab\0\0", "wxyz"]).unwrap()
    );
    let value = Value::strings(&[1, 2], ["cd", "ef"]).unwrap();
    assert!(matches!(
        write_dataset(&mut file, "/fixed", &value, None),
        Err(ExchangeError::TypeMismatch(_))
    ));
    assert_eq!(
        read_dataset(&file, "/fixed", None).unwrap(),
        Value::strings(&[1, 2], ["ab\0\0", "wxyz"]).unwrap()
    );
}

#[test]
fn unsupported_values() {
    let mut file = created(&[1, 2], "double");
    assert!(matches!(
        write_dataset(&mut file, "/d", &Value::from(array![[true, false]]), None),
        Err(ExchangeError::UnsupportedType(t)) if t == "logical"
    ));
    let cell = Value::Cell(vec![Value::from(1.0), Value::from("x")]);
    assert!(matches!(
        write_attribute(&mut file, "/d", "c", &cell),
        Err(ExchangeError::UnsupportedType(t)) if t == "cell"
    ));
}

#[test]
fn location_errors() {
    let mut file = created(&[2, 2], "double");
    file.create_group("/g").unwrap();
    let value = Value::from(1.0);
    assert!(matches!(read_dataset(&file, "d", None), Err(ExchangeError::PathInvalid(_))));
    assert!(matches!(write_dataset(&mut file, "d", &value, None), Err(ExchangeError::PathInvalid(_))));
    assert!(matches!(read_attribute(&file, "d", "a"), Err(ExchangeError::PathInvalid(_))));
    assert!(matches!(describe_location(&file, Some("")), Err(ExchangeError::PathInvalid(_))));
    assert!(matches!(read_dataset(&file, "/missing", None), Err(ExchangeError::LocationNotFound(_))));
    assert!(matches!(
        read_dataset(&file, "/g", None),
        Err(ExchangeError::WrongObjectKind { found, .. }) if found == "group"
    ));
}

#[test]
fn attributes_on_groups_and_datasets() {
    let mut file = created(&[2, 2], "double");
    file.create_group("/g").unwrap();

    write_attribute(&mut file, "/g", "title", &Value::from("run 7")).unwrap();
    write_attribute(&mut file, "/d", "scale", &Value::from(array![[0.5, 2.0]])).unwrap();
    assert_eq!(read_attribute(&file, "/g", "title").unwrap(), Value::from("run 7"));
    assert_eq!(read_attribute(&file, "/d", "scale").unwrap(), Value::from(array![[0.5, 2.0]]));
    assert!(matches!(
        read_attribute(&file, "/d", "title"),
        Err(ExchangeError::AttributeNotFound { name, .. }) if name == "title"
    ));

    let mut map = AttributeMap::new();
    map.insert("title".to_string(), Value::from("run 8"));
    map.insert("count".to_string(), Value::from(array![[3u32]]));
    write_attributes(&mut file, "/g", &map).unwrap();
    let read = read_attributes(&file, "/g").unwrap();
    assert_eq!(read.keys().collect::<Vec<_>>(), ["count", "title"]);
    assert_eq!(read, map);
}

#[test]
fn read_only_files() {
    let mut file = created(&[2, 2], "double").with_mode(AccessMode::ReadOnly);
    assert!(read_dataset(&file, "/d", None).is_ok());
    assert!(write_attribute(&mut file, "/d", "a", &Value::from(1.0)).is_err());
    assert!(read_attributes(&file, "/d").unwrap().is_empty());
}

#[test]
fn describe_hierarchy() {
    let mut file = File::default();
    let chunked = DatasetSpec::new([2, UNLIMITED], ElementTypeTag::Float32).with_chunk([2, 8]);
    create_dataset(&mut file, "/g/chunked", &chunked).unwrap();
    create_dataset(&mut file, "/g/scalar", &DatasetSpec::new([1, 1], ElementTypeTag::UInt8)).unwrap();
    write_attribute(&mut file, "/g", "owner", &Value::from("lab")).unwrap();
    write_attribute(&mut file, "/g/chunked", "rate", &Value::from(array![[100.0]])).unwrap();
    write_attribute(&mut file, "/g/scalar", "flag", &Value::from(array![[1u8]])).unwrap();

    let MetadataDescriptor::Group(root) = describe_location(&file, None).unwrap() else {
        panic!("expected a group");
    };
    assert_eq!(root.name, "/");
    assert!(root.datasets.is_empty());
    let g = &root.groups[0];
    assert_eq!(g.name, "/g");
    assert_eq!(g.attributes.len(), 1);
    assert_eq!(g.datasets.len(), 2);

    let chunked = &g.datasets[0];
    assert_eq!(chunked.name, "/g/chunked");
    assert_eq!(chunked.chunk_size, Some(vec![2, 8]));
    assert_eq!(chunked.dataspace.kind(), ExtentKind::Simple);
    assert_eq!(chunked.dataspace.size(), [2, 0]);
    assert_eq!(chunked.dataspace.max_size(), [MaxSize::Bounded(2), MaxSize::Unlimited]);
    assert_eq!(chunked.datatype.class, Some("float"));
    assert_eq!(chunked.datatype.runtime_class, Some(ElementTypeTag::Float32));
    assert_eq!(chunked.datatype.size, Some(TypeSize::Bytes(4)));
    assert_eq!(chunked.attributes["rate"], Some(Value::from(array![[100.0]])));

    let scalar = &g.datasets[1];
    assert_eq!(scalar.name, "/g/scalar");
    assert_eq!(scalar.chunk_size, None);
    assert_eq!(scalar.dataspace.kind(), ExtentKind::Scalar);
    assert_eq!(scalar.attributes.len(), 1);
}

//! Location path checks.
//!
//! Locations are absolute, `/`-separated paths from the root group. Repeated
//! separators are ignored, so `//a///b` names the same object as `/a/b`.

use crate::{
    container::{segments, File, Node, ObjectKind},
    ExchangeError,
};

/// Fails with [`ExchangeError::PathInvalid`] unless `path` is absolute.
pub fn validate(path: &str) -> Result<(), ExchangeError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(ExchangeError::PathInvalid(path.to_string()))
    }
}

/// Whether an object exists at `path`.
///
/// Every intermediate segment must exist and be a group; the leaf is only
/// looked up once all of them have been found.
pub fn exists(file: &File, path: &str) -> bool {
    let mut node = file.root();
    for seg in segments(path) {
        let Some(group) = node.as_group() else {
            return false;
        };
        match group.child(seg) {
            Some(child) => node = child,
            None => return false,
        }
    }
    true
}

/// Checks that an object can be created at `path`.
///
/// Missing intermediate groups are fine since they are created on the way;
/// an intermediate segment that exists but is not a group is not.
pub fn can_create(file: &File, path: &str) -> Result<(), ExchangeError> {
    validate(path)?;
    let segs: Vec<&str> = segments(path).collect();
    let Some((_, parents)) = segs.split_last() else {
        return Err(ExchangeError::AlreadyExists(path.to_string()));
    };
    let mut node = file.root();
    for (i, seg) in parents.iter().enumerate() {
        let Some(group) = node.as_group() else {
            return Err(ExchangeError::NotAGroup(format!("/{}", parents[..i].join("/"))));
        };
        match group.child(seg) {
            Some(child) => node = child,
            None => return Ok(()),
        }
    }
    match node.as_group() {
        None => Err(ExchangeError::NotAGroup(format!("/{}", parents.join("/")))),
        Some(_) if exists(file, path) => Err(ExchangeError::AlreadyExists(path.to_string())),
        Some(_) => Ok(()),
    }
}

/// Validates `path` and resolves it to an existing object.
pub fn resolve<'f>(file: &'f File, path: &str) -> Result<&'f Node, ExchangeError> {
    validate(path)?;
    if !exists(file, path) {
        return Err(ExchangeError::LocationNotFound(path.to_string()));
    }
    file.node(path).ok_or_else(|| ExchangeError::LocationNotFound(path.to_string()))
}

/// Fails with [`ExchangeError::WrongObjectKind`] unless `node` is one of
/// `allowed`.
pub(crate) fn expect_kind(
    node: &Node,
    path: &str,
    expected: &'static str,
    allowed: &[ObjectKind],
) -> Result<(), ExchangeError> {
    if allowed.contains(&node.kind()) {
        Ok(())
    } else {
        Err(ExchangeError::WrongObjectKind {
            path: path.to_string(),
            expected,
            found: node.kind().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{DataLayout, Dataset, Dataspace, DataspaceExt, Datatype, DatatypeExt, LayoutExt};

    fn sample() -> File {
        let mut file = File::default();
        let ds = Dataset::new(Datatype::float(8), Dataspace::scalar(), DataLayout::contiguous()).unwrap();
        file.create_dataset("/g/data", ds).unwrap();
        file
    }

    #[test]
    fn relative_paths_are_invalid() {
        let file = sample();
        assert!(matches!(validate("g/data"), Err(ExchangeError::PathInvalid(_))));
        assert!(matches!(resolve(&file, "g"), Err(ExchangeError::PathInvalid(_))));
        assert!(matches!(can_create(&file, ""), Err(ExchangeError::PathInvalid(_))));
    }

    #[test]
    fn existence_walks_segments() {
        let file = sample();
        assert!(exists(&file, "/"));
        assert!(exists(&file, "/g"));
        assert!(exists(&file, "//g//data"));
        assert!(!exists(&file, "/h/data"));
        assert!(!exists(&file, "/g/data/x"));
        assert!(matches!(resolve(&file, "/nope"), Err(ExchangeError::LocationNotFound(_))));
    }

    #[test]
    fn creation_rules() {
        let file = sample();
        assert!(can_create(&file, "/g/other").is_ok());
        assert!(can_create(&file, "/new/deep/path").is_ok());
        assert!(matches!(
            can_create(&file, "/g/data/child"),
            Err(ExchangeError::NotAGroup(p)) if p == "/g/data"
        ));
        assert!(matches!(
            can_create(&file, "/g/data/a/b"),
            Err(ExchangeError::NotAGroup(p)) if p == "/g/data"
        ));
        assert!(matches!(can_create(&file, "/g/data"), Err(ExchangeError::AlreadyExists(_))));
        assert!(matches!(can_create(&file, "/"), Err(ExchangeError::AlreadyExists(_))));
    }
}

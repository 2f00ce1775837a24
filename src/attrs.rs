//! Whole attribute sets as name to value maps.

use crate::{container::AttributeSet, DataExchange, ExchangeError, Value};
use log::warn;
use std::collections::BTreeMap;

/// Attribute values by name.
pub type AttributeMap = BTreeMap<String, Value>;

/// Reads every attribute of an object.
///
/// Fails on the first attribute that cannot be converted.
pub fn read_all(attrs: &AttributeSet) -> Result<AttributeMap, ExchangeError> {
    attrs
        .iter()
        .map(|attr| {
            let value = DataExchange::from_attribute(attr)?.read_attribute(attr)?;
            Ok((attr.name().to_string(), value))
        })
        .collect()
}

/// Reads every attribute of an object, recording `None` for attributes that
/// cannot be converted.
pub fn read_all_lossy(attrs: &AttributeSet) -> BTreeMap<String, Option<Value>> {
    attrs
        .iter()
        .map(|attr| {
            let value = DataExchange::from_attribute(attr)
                .and_then(|dx| dx.read_attribute(attr))
                .map_err(|e| warn!("skipping value of attribute '{}': {e}", attr.name()))
                .ok();
            (attr.name().to_string(), value)
        })
        .collect()
}

/// Writes every entry of `map` as an attribute, replacing attributes of the
/// same name and leaving all others alone.
///
/// Every value is checked before the first attribute is written.
pub fn write_all(attrs: &mut AttributeSet, map: &AttributeMap) -> Result<(), ExchangeError> {
    let exchanges = map
        .iter()
        .map(|(name, value)| Ok((name, DataExchange::from_value(value)?)))
        .collect::<Result<Vec<_>, ExchangeError>>()?;
    for (name, dx) in exchanges {
        dx.write_as_attribute(attrs, name)?;
    }
    Ok(())
}

//! Record inheritance helpers.

use crate::{PropertyValue, RawRecord};
use std::collections::BTreeMap;

/// Start a record from an inherited base.
///
/// The base contributes its type (unless overridden) and properties; flags are
/// not inherited.
pub(super) fn derive_record(base: &RawRecord, name: &str, type_name: Option<&str>) -> RawRecord {
    let mut record = RawRecord::new(name, type_name.unwrap_or(&base.type_name));
    record.properties = base.properties.clone();
    record
}

/// Overlay a record's own properties on top of inherited ones, replacing
/// whole values per key.
pub(super) fn overlay_properties(
    base: &mut BTreeMap<String, PropertyValue>,
    overlay: BTreeMap<String, PropertyValue>,
) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}

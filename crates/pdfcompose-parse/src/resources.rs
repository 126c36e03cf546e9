//! Conversion between lopdf resource dictionaries and [`ResourceNamespace`].

use lopdf::{Dictionary, Object};
use pdfcompose_core::{NameMap, ResourceKind, ResourceNamespace, ResourceSlot};

use crate::lopdf_backend::{object_type_name, resolve_ref};

/// Read a `/Resources` (or `/DR`) dictionary into a namespace.
///
/// Keyed tables keep their values as written, so indirect references stay
/// references. Kinds that are not recognized are ignored. A kind whose value
/// is neither a dictionary nor an array becomes [`ResourceSlot::Malformed`],
/// which reconciliation reports and leaves alone.
pub fn namespace_from_dict(doc: &lopdf::Document, dict: &Dictionary) -> ResourceNamespace<Object> {
    let mut namespace = ResourceNamespace::new();
    for (key, value) in dict.iter() {
        let key = String::from_utf8_lossy(key);
        let Some(kind) = ResourceKind::from_pdf_name(&key) else {
            tracing::trace!(key = %key, "ignoring unknown resource kind");
            continue;
        };

        let slot = match resolve_ref(doc, value) {
            Object::Dictionary(table) => {
                let map: NameMap<Object> = table
                    .iter()
                    .map(|(name, value)| (String::from_utf8_lossy(name).into_owned(), value.clone()))
                    .collect();
                ResourceSlot::Entries(map)
            }
            Object::Array(items) => ResourceSlot::Names(
                items
                    .iter()
                    .filter_map(|item| item.as_name().ok())
                    .map(|name| String::from_utf8_lossy(name).into_owned())
                    .collect(),
            ),
            other => ResourceSlot::Malformed(object_type_name(other).to_string()),
        };
        namespace.set_slot(kind, slot);
    }
    namespace
}

/// Write a namespace back out as a resource dictionary.
///
/// Malformed slots have nothing meaningful to write and are dropped.
pub fn namespace_to_dict(namespace: &ResourceNamespace<Object>) -> Dictionary {
    let mut dict = Dictionary::new();
    for (kind, slot) in namespace.iter() {
        match slot {
            ResourceSlot::Entries(map) => {
                let mut table = Dictionary::new();
                for (name, value) in map {
                    table.set(name.as_bytes().to_vec(), value.clone());
                }
                dict.set(kind.as_pdf_name(), table);
            }
            ResourceSlot::Names(names) => {
                let items: Vec<Object> = names
                    .iter()
                    .map(|name| Object::Name(name.as_bytes().to_vec()))
                    .collect();
                dict.set(kind.as_pdf_name(), items);
            }
            ResourceSlot::Malformed(found) => {
                tracing::debug!(%kind, found = %found, "dropping malformed resource kind");
            }
        }
    }
    dict
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Document, dictionary};
    use pdfcompose_core::{WarningCode, reconcile};

    #[test]
    fn dictionary_kinds_become_entries() {
        let mut doc = Document::with_version("1.5");
        let font = doc.add_object(dictionary! { "Type" => "Font", "Subtype" => "Type1" });
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => font },
            "ProcSet" => vec![Object::Name(b"PDF".to_vec()), Object::Name(b"Text".to_vec())],
            "Unknown" => Dictionary::new(),
        };

        let ns = namespace_from_dict(&doc, &resources);
        assert!(matches!(
            ns.get(ResourceKind::Font, "F1"),
            Some(Object::Reference(id)) if *id == font
        ));
        assert!(matches!(
            ns.slot(ResourceKind::ProcSet),
            Some(ResourceSlot::Names(names)) if names == &["PDF", "Text"]
        ));
        assert_eq!(ns.iter().count(), 2);
    }

    #[test]
    fn indirect_table_is_followed() {
        let mut doc = Document::with_version("1.5");
        let table = doc.add_object(dictionary! { "GS0" => dictionary! { "CA" => 1i64 } });
        let resources = dictionary! { "ExtGState" => table };

        let ns = namespace_from_dict(&doc, &resources);
        assert!(ns.get(ResourceKind::ExtGState, "GS0").is_some());
    }

    #[test]
    fn scalar_kind_is_malformed_and_not_written() {
        let doc = Document::with_version("1.5");
        let resources = dictionary! { "XObject" => 5i64 };

        let ns = namespace_from_dict(&doc, &resources);
        assert!(matches!(
            ns.slot(ResourceKind::XObject),
            Some(ResourceSlot::Malformed(_))
        ));
        assert!(namespace_to_dict(&ns).is_empty());
    }

    #[test]
    fn colorspace_collision_through_dictionaries() {
        let doc = Document::with_version("1.5");
        let first = dictionary! {
            "ColorSpace" => dictionary! { "CS0" => "DeviceRGB" },
        };
        let second = dictionary! {
            "ColorSpace" => dictionary! { "CS0" => "DeviceCMYK", "CS1" => "DeviceGray" },
        };

        let mut primary = namespace_from_dict(&doc, &first);
        let secondary = namespace_from_dict(&doc, &second);
        let warnings = reconcile(&mut primary, &secondary);

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::ResourceOverride);
        assert_eq!(primary.colorspace_names(), ["CS0", "CS1"]);

        let written = namespace_to_dict(&primary);
        let table = written.get(b"ColorSpace").unwrap().as_dict().unwrap();
        assert_eq!(table.get(b"CS0").unwrap().as_name().unwrap(), b"DeviceCMYK");
        assert_eq!(table.len(), 2);
    }
}

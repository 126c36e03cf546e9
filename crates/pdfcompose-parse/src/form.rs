//! Reading and writing `/AcroForm` through lopdf.
//!
//! [`load_form`] turns a document's interactive form into a
//! [`Form<Object>`] whose field nodes carry references to the original field
//! dictionaries. [`store_form`] writes a (possibly merged) form back, fixing
//! up `/Parent` and `/Kids` so the stored tree matches the in-memory one.

use std::collections::HashSet;

use lopdf::{Dictionary, Object, ObjectId};
use pdfcompose_core::{ComposeWarning, FieldId, Form, WarningCode};

use crate::lopdf_backend::{catalog, object_type_name, resolve_ref, string_bytes};
use crate::resources::{namespace_from_dict, namespace_to_dict};

/// Read the document's interactive form.
///
/// Returns `None` if the catalog has no usable `/AcroForm`. Every entry of
/// `/Fields` and every `/Kids` entry below it becomes a node, including
/// widget annotations, so the tree can be relinked without losing widgets.
/// Entries that are not indirect references, cycles, and subtrees deeper than
/// `max_depth` are skipped with a [`WarningCode::MalformedField`] warning.
pub fn load_form(
    doc: &lopdf::Document,
    max_depth: usize,
) -> (Option<Form<Object>>, Vec<ComposeWarning>) {
    let mut warnings = Vec::new();

    let Some(acroform) = catalog(doc)
        .and_then(|catalog| catalog.get(b"AcroForm").ok())
        .and_then(|obj| resolve_ref(doc, obj).as_dict().ok())
    else {
        return (None, warnings);
    };

    let mut form = Form {
        need_appearances: match get(doc, acroform, b"NeedAppearances") {
            Some(Object::Boolean(value)) => Some(*value),
            _ => None,
        },
        sig_flags: get(doc, acroform, b"SigFlags").and_then(|o| o.as_i64().ok()),
        calculation_order: get(doc, acroform, b"CO")
            .and_then(|o| o.as_array().ok())
            .cloned(),
        default_resources: get(doc, acroform, b"DR")
            .and_then(|o| o.as_dict().ok())
            .map(|dr| namespace_from_dict(doc, dr)),
        default_appearance: acroform
            .get(b"DA")
            .ok()
            .and_then(|o| string_bytes(doc, o))
            .map(decode_pdf_string),
        quadding: get(doc, acroform, b"Q").and_then(|o| o.as_i64().ok()),
        // Kept as written: XFA is carried through, never interpreted.
        xfa: acroform.get(b"XFA").ok().cloned(),
        ..Form::default()
    };

    let fields = get(doc, acroform, b"Fields")
        .and_then(|o| o.as_array().ok())
        .cloned()
        .unwrap_or_default();

    let mut loader = FieldLoader {
        doc,
        form: &mut form,
        visited: HashSet::new(),
        max_depth,
        warnings: &mut warnings,
    };
    for entry in &fields {
        loader.load(entry, None, 0);
    }

    tracing::debug!(fields = form.fields.len(), "loaded AcroForm");
    (Some(form), warnings)
}

/// Look up `key` in `dict`, following one indirect reference.
fn get<'a>(doc: &'a lopdf::Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|obj| resolve_ref(doc, obj))
}

struct FieldLoader<'a> {
    doc: &'a lopdf::Document,
    form: &'a mut Form<Object>,
    visited: HashSet<ObjectId>,
    max_depth: usize,
    warnings: &'a mut Vec<ComposeWarning>,
}

impl FieldLoader<'_> {
    fn load(&mut self, entry: &Object, parent: Option<FieldId>, depth: usize) {
        let Object::Reference(id) = entry else {
            self.warn(format!(
                "field entry is a direct {} instead of a reference",
                object_type_name(entry)
            ));
            return;
        };
        let id = *id;
        let doc = self.doc;

        if depth >= self.max_depth {
            self.warn(format!(
                "field tree deeper than {} levels at {} {}",
                self.max_depth, id.0, id.1
            ));
            return;
        }
        if !self.visited.insert(id) {
            self.warn(format!("field {} {} appears more than once", id.0, id.1));
            return;
        }

        let Ok(dict) = doc.get_object(id).and_then(|o| o.as_dict()) else {
            self.warn(format!("field {} {} is not a dictionary", id.0, id.1));
            return;
        };

        let name = dict
            .get(b"T")
            .ok()
            .and_then(|o| string_bytes(doc, o))
            .map(decode_pdf_string);
        let payload = Some(Object::Reference(id));
        let node = match parent {
            None => self.form.fields.add_root(name, payload),
            Some(parent) => match self.form.fields.add_child(parent, name, payload) {
                Ok(node) => node,
                Err(err) => {
                    self.warn(err.to_string());
                    return;
                }
            },
        };

        let kids = dict
            .get(b"Kids")
            .ok()
            .and_then(|o| resolve_ref(doc, o).as_array().ok())
            .cloned()
            .unwrap_or_default();
        for kid in &kids {
            self.load(kid, Some(node), depth + 1);
        }
    }

    fn warn(&mut self, description: String) {
        ComposeWarning::new(WarningCode::MalformedField, description)
            .with_element("/AcroForm")
            .record(self.warnings);
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise byte-per-char).
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Write `form` into `doc` and return the id of the new `/AcroForm`.
///
/// Field dictionaries referenced by node payloads are updated in place:
/// `/Parent` and `/Kids` are rewritten from the tree. Synthetic nodes get
/// fresh dictionaries holding only `/T` and `/Kids`.
pub fn store_form(doc: &mut lopdf::Document, form: &Form<Object>) -> ObjectId {
    let ids: Vec<ObjectId> = form
        .fields
        .iter()
        .map(|(_, node)| match &node.payload {
            Some(Object::Reference(id)) => *id,
            Some(direct) => doc.add_object(direct.clone()),
            None => doc.new_object_id(),
        })
        .collect();

    for (field, node) in form.fields.iter() {
        let id = ids[field.index()];
        let kids: Vec<Object> = node
            .kids
            .iter()
            .map(|kid| Object::Reference(ids[kid.index()]))
            .collect();
        let parent = node.parent.map(|parent| ids[parent.index()]);

        if node.is_synthetic() {
            let mut dict = Dictionary::new();
            if let Some(name) = &node.name {
                dict.set("T", Object::string_literal(name.as_str()));
            }
            dict.set("Kids", kids);
            if let Some(parent) = parent {
                dict.set("Parent", parent);
            }
            doc.objects.insert(id, Object::Dictionary(dict));
            continue;
        }

        let Ok(dict) = doc.get_object_mut(id).and_then(|o| o.as_dict_mut()) else {
            tracing::warn!(object = ?id, "field dictionary missing from output, not relinked");
            continue;
        };
        match parent {
            Some(parent) => dict.set("Parent", parent),
            None => {
                dict.remove(b"Parent");
            }
        }
        if kids.is_empty() {
            dict.remove(b"Kids");
        } else {
            dict.set("Kids", kids);
        }
    }

    let mut acroform = Dictionary::new();
    let roots: Vec<Object> = form
        .fields
        .roots()
        .iter()
        .map(|root| Object::Reference(ids[root.index()]))
        .collect();
    acroform.set("Fields", roots);
    if let Some(need_appearances) = form.need_appearances {
        acroform.set("NeedAppearances", need_appearances);
    }
    if let Some(sig_flags) = form.sig_flags {
        acroform.set("SigFlags", sig_flags);
    }
    if let Some(order) = &form.calculation_order {
        acroform.set("CO", order.clone());
    }
    if let Some(dr) = &form.default_resources {
        acroform.set("DR", namespace_to_dict(dr));
    }
    if let Some(da) = &form.default_appearance {
        acroform.set("DA", Object::string_literal(da.as_str()));
    }
    if let Some(q) = form.quadding {
        acroform.set("Q", q);
    }
    if let Some(xfa) = &form.xfa {
        acroform.set("XFA", xfa.clone());
    }

    doc.add_object(acroform)
}

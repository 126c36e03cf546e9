//! Shared lopdf fixtures for the integration tests.

#![allow(dead_code)]

use lopdf::{
    Dictionary, Document, EncryptionState, EncryptionVersion, Object, ObjectId, Permissions,
    Stream, StringFormat, dictionary,
};

/// Builds a PDF page by page, then saves it.
pub struct Fixture {
    pub doc: Document,
    pages_id: ObjectId,
    pages: Vec<ObjectId>,
    fields: Vec<ObjectId>,
    catalog_extra: Dictionary,
}

impl Fixture {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            pages: Vec::new(),
            fields: Vec::new(),
            catalog_extra: Dictionary::new(),
        }
    }

    /// Add a page of the given width drawing `content` with `resources`.
    pub fn page(&mut self, width: i64, content: &[u8], resources: Dictionary) -> ObjectId {
        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content.to_vec()));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(width), Object::Integer(792)],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.pages.push(page_id);
        page_id
    }

    pub fn blank_page(&mut self, width: i64) -> ObjectId {
        self.page(width, b"", Dictionary::new())
    }

    /// Add a text field with a merged widget on `page`.
    pub fn text_field(&mut self, page: ObjectId, name: &str) -> ObjectId {
        let field_id = self.doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::string_literal(name),
            "Rect" => vec![Object::Integer(10), Object::Integer(10), Object::Integer(110), Object::Integer(30)],
            "P" => page,
        });
        if let Ok(dict) = self.doc.get_object_mut(page).and_then(|o| o.as_dict_mut()) {
            let mut annots = dict
                .get(b"Annots")
                .and_then(|o| o.as_array())
                .cloned()
                .unwrap_or_default();
            annots.push(Object::from(field_id));
            dict.set("Annots", annots);
        }
        self.fields.push(field_id);
        field_id
    }

    pub fn image(&mut self, width: i64, filter: Option<&str>) -> ObjectId {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => width,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8i64,
        };
        if let Some(filter) = filter {
            dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
        }
        self.doc
            .add_object(Stream::new(dict, vec![0; (width * width) as usize]))
    }

    pub fn form_xobject(&mut self, body: &[u8], resources: Option<Dictionary>) -> ObjectId {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(100), Object::Integer(100)],
        };
        if let Some(resources) = resources {
            dict.set("Resources", resources);
        }
        self.doc.add_object(Stream::new(dict, body.to_vec()))
    }

    pub fn catalog_entry(&mut self, key: &str, value: impl Into<Object>) {
        self.catalog_extra.set(key, value);
    }

    pub fn save(mut self) -> Vec<u8> {
        let kids: Vec<Object> = self.pages.iter().map(|&id| Object::from(id)).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        };
        if !self.fields.is_empty() {
            let fields: Vec<Object> = self.fields.iter().map(|&id| Object::from(id)).collect();
            let acroform_id = self.doc.add_object(dictionary! {
                "Fields" => fields,
                "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
            });
            catalog.set("AcroForm", acroform_id);
        }
        for (key, value) in self.catalog_extra.iter() {
            catalog.set(key.clone(), value.clone());
        }
        let catalog_id = self.doc.add_object(catalog);
        self.doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        self.doc.save_to(&mut buf).expect("failed to save test PDF");
        buf
    }
}

/// A document of `widths.len()` blank pages with the given widths.
pub fn pages_with_widths(widths: &[i64]) -> Vec<u8> {
    let mut fixture = Fixture::new();
    for &width in widths {
        fixture.blank_page(width);
    }
    fixture.save()
}

/// A one-page document with a single text field named `name`.
pub fn single_field(name: &str) -> Vec<u8> {
    let mut fixture = Fixture::new();
    let page = fixture.blank_page(612);
    fixture.text_field(page, name);
    fixture.save()
}

/// Re-save `bytes` encrypted with RC4 128-bit under `user_password`.
pub fn encrypted(bytes: &[u8], user_password: &str) -> Vec<u8> {
    let mut doc = Document::load_mem(bytes).expect("fixture should parse");
    let id = Object::String(b"pdfcompose-fixture".to_vec(), StringFormat::Literal);
    doc.trailer.set("ID", vec![id.clone(), id]);
    let state = EncryptionState::try_from(EncryptionVersion::V2 {
        document: &doc,
        owner_password: "owner",
        user_password,
        key_length: 128,
        permissions: Permissions::all(),
    })
    .expect("failed to derive encryption state");
    doc.encrypt(&state).expect("failed to encrypt test PDF");

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save test PDF");
    buf
}

/// Page widths of a saved PDF, in page order.
pub fn page_widths(bytes: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(bytes).expect("output should parse");
    doc.get_pages()
        .values()
        .map(|&id| {
            let page = doc.get_object(id).unwrap().as_dict().unwrap();
            page.get(b"MediaBox").unwrap().as_array().unwrap()[2]
                .as_i64()
                .unwrap()
        })
        .collect()
}

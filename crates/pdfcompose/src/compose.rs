//! Document composition: concatenate pages and merge interactive forms.

use std::io::Write;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use pdfcompose_core::{
    ComposeOptions, ComposeResult, ComposeWarning, Form, PdfError, WarningCode, merge_forms,
};
use pdfcompose_parse::{
    BackendError, EMPTY_PASSWORD, catalog, load_document, load_form, resolve_inherited, store_form,
};

/// Page attributes that may live on a page-tree ancestor instead of the page.
const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Compose the files at `inputs` into a new PDF at `output`.
///
/// Pages are appended in input order and interactive forms are merged.
/// Optional content (layers) is dropped; see [`compose_advanced`].
///
/// The output is written to a temporary file next to `output` and renamed
/// into place only once the whole document has been serialized, so a failed
/// composition never leaves a partial file behind.
///
/// # Errors
///
/// Returns [`PdfError::EmptyInput`] for an empty input list, [`PdfError::Io`]
/// if an input cannot be read, [`PdfError::Parse`] if an input is not a PDF,
/// [`PdfError::Decryption`] if an encrypted input does not open with the
/// empty password, and [`PdfError::Write`] if the output cannot be written.
pub fn compose(
    inputs: &[impl AsRef<Path>],
    output: impl AsRef<Path>,
) -> Result<ComposeResult<()>, PdfError> {
    compose_with_options(inputs, output, &ComposeOptions::default())
}

/// Like [`compose`], but also carries over `/OCProperties` from the first
/// input that declares them.
///
/// # Errors
///
/// Same as [`compose`].
pub fn compose_advanced(
    inputs: &[impl AsRef<Path>],
    output: impl AsRef<Path>,
) -> Result<ComposeResult<()>, PdfError> {
    compose_with_options(inputs, output, &ComposeOptions::advanced())
}

/// File-based composition with explicit options.
///
/// # Errors
///
/// Same as [`compose`].
pub fn compose_with_options(
    inputs: &[impl AsRef<Path>],
    output: impl AsRef<Path>,
    options: &ComposeOptions,
) -> Result<ComposeResult<()>, PdfError> {
    let output = output.as_ref();
    let mut sources = Vec::with_capacity(inputs.len());
    for input in inputs {
        let input = input.as_ref();
        let bytes = std::fs::read(input)
            .map_err(|e| PdfError::Io(format!("{}: {e}", input.display())))?;
        sources.push(bytes);
    }

    let composed = compose_bytes(sources, options)?;
    write_atomically(output, &composed.value)?;
    tracing::debug!(output = %output.display(), bytes = composed.value.len(), "wrote composed PDF");
    Ok(composed.map(|_| ()))
}

/// Write `bytes` to a temporary file in `path`'s directory, then rename it
/// over `path`.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), PdfError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| PdfError::Write(format!("{}: {e}", dir.display())))?;
    file.write_all(bytes)
        .and_then(|()| file.as_file().sync_all())
        .map_err(|e| PdfError::Write(e.to_string()))?;
    file.persist(path)
        .map_err(|e| PdfError::Write(format!("{}: {}", path.display(), e.error)))?;
    Ok(())
}

/// Compose in-memory PDFs into a new in-memory PDF.
///
/// Each input is opened (decrypting with the empty password when
/// encrypted), its objects are imported with their ids shifted past those
/// already in the output, and its pages are appended in order. Forms are
/// merged with [`merge_forms`] using the 1-based position of the input as
/// the document index.
///
/// # Errors
///
/// See [`compose`]. Nothing is returned on error.
pub fn compose_bytes(
    inputs: Vec<Vec<u8>>,
    options: &ComposeOptions,
) -> Result<ComposeResult<Vec<u8>>, PdfError> {
    if inputs.is_empty() {
        return Err(PdfError::EmptyInput);
    }

    let mut composer = Composer::new(options);
    for (i, bytes) in inputs.iter().enumerate() {
        composer.append(&bytes[..], i + 1)?;
    }
    composer.finish()
}

/// Output document under construction.
struct Composer<'a> {
    options: &'a ComposeOptions,
    out: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    form: Option<Form<Object>>,
    optional_content: Option<Object>,
    warnings: Vec<ComposeWarning>,
}

impl<'a> Composer<'a> {
    fn new(options: &'a ComposeOptions) -> Self {
        let mut out = Document::with_version("1.5");
        let pages_id = out.new_object_id();
        Self {
            options,
            out,
            pages_id,
            page_ids: Vec::new(),
            form: None,
            optional_content: None,
            warnings: Vec::new(),
        }
    }

    /// Import input number `document` (1-based).
    fn append(&mut self, bytes: &[u8], document: usize) -> Result<(), PdfError> {
        let mut source = load_document(bytes, EMPTY_PASSWORD).map_err(|err| match err {
            BackendError::Core(
                reason @ (PdfError::PasswordRequired | PdfError::InvalidPassword),
            ) => PdfError::Decryption {
                document,
                reason: reason.to_string(),
            },
            other => match PdfError::from(other) {
                PdfError::Parse(msg) => PdfError::Parse(format!("document {document}: {msg}")),
                err => err,
            },
        })?;
        if source.version > self.out.version {
            self.out.version = source.version.clone();
        }

        let offset = self.out.max_id;
        shift_object_ids(&mut source, offset);

        let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();
        for &page_id in &page_ids {
            materialize_inherited(&mut source, page_id)?;
            if let Ok(page) = source.get_object_mut(page_id).and_then(|o| o.as_dict_mut()) {
                page.set("Parent", self.pages_id);
            }
        }
        tracing::debug!(document, pages = page_ids.len(), offset, "importing document");

        if self.options.merge_forms {
            self.absorb_form(&source, document);
        }
        self.absorb_optional_content(&source, document);

        self.out.max_id = self.out.max_id.max(source.max_id);
        self.out.objects.extend(source.objects);
        self.page_ids.extend(page_ids);
        Ok(())
    }

    fn absorb_form(&mut self, source: &Document, document: usize) {
        let (form, warnings) = load_form(source, self.options.max_field_depth);
        self.warnings
            .extend(warnings.into_iter().map(|w| w.in_document(document)));
        let Some(form) = form else {
            return;
        };

        match self.form.as_mut() {
            None => {
                tracing::debug!(document, fields = form.fields.len(), "adopting first form");
                self.form = Some(form);
            }
            Some(accumulated) => {
                let warnings = merge_forms(accumulated, form, document);
                self.warnings.extend(warnings);
            }
        }
    }

    fn absorb_optional_content(&mut self, source: &Document, document: usize) {
        let Some(properties) = catalog(source).and_then(|c| c.get(b"OCProperties").ok()) else {
            return;
        };
        if !self.options.preserve_optional_content {
            tracing::debug!(document, "dropping optional content properties");
            return;
        }
        if self.optional_content.is_none() {
            self.optional_content = Some(properties.clone());
        } else {
            ComposeWarning::new(
                WarningCode::OptionalContentIgnored,
                "optional content is taken from the first document that declares it",
            )
            .in_document(document)
            .record(&mut self.warnings);
        }
    }

    fn finish(mut self) -> Result<ComposeResult<Vec<u8>>, PdfError> {
        let kids: Vec<Object> = self.page_ids.iter().map(|&id| Object::Reference(id)).collect();
        let mut pages = Dictionary::new();
        pages.set("Type", "Pages");
        pages.set("Kids", kids);
        pages.set("Count", self.page_ids.len() as i64);
        self.out
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", "Catalog");
        catalog.set("Pages", self.pages_id);
        if let Some(form) = &self.form {
            let acroform_id = store_form(&mut self.out, form);
            catalog.set("AcroForm", acroform_id);
        }
        if let Some(properties) = self.optional_content.take() {
            catalog.set("OCProperties", properties);
        }
        let catalog_id = self.out.add_object(catalog);
        self.out.trailer = Dictionary::new();
        self.out.trailer.set("Root", catalog_id);

        let pruned = self.out.prune_objects();
        tracing::debug!(
            pages = self.page_ids.len(),
            pruned = pruned.len(),
            "serializing composed document"
        );

        let mut buf = Vec::new();
        self.out
            .save_to(&mut buf)
            .map_err(|e| PdfError::Write(e.to_string()))?;

        let warnings = if self.options.collect_warnings {
            self.warnings
        } else {
            Vec::new()
        };
        Ok(ComposeResult::with_warnings(buf, warnings))
    }
}

/// Renumber every object of `doc` by `offset` and rewrite all references,
/// including those in the trailer.
fn shift_object_ids(doc: &mut Document, offset: u32) {
    if offset == 0 {
        return;
    }
    let objects = std::mem::take(&mut doc.objects);
    doc.objects = objects
        .into_iter()
        .map(|((number, generation), object)| {
            ((number + offset, generation), shift_refs(object, offset))
        })
        .collect();
    for (_, value) in doc.trailer.iter_mut() {
        *value = shift_refs(std::mem::replace(value, Object::Null), offset);
    }
    doc.max_id += offset;
}

fn shift_refs(object: Object, offset: u32) -> Object {
    match object {
        Object::Reference((number, generation)) => Object::Reference((number + offset, generation)),
        Object::Array(items) => Object::Array(
            items
                .into_iter()
                .map(|item| shift_refs(item, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            shift_dict_refs(&mut dict, offset);
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            shift_dict_refs(&mut stream.dict, offset);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn shift_dict_refs(dict: &mut Dictionary, offset: u32) {
    for (_, value) in dict.iter_mut() {
        *value = shift_refs(std::mem::replace(value, Object::Null), offset);
    }
}

/// Copy inherited page attributes onto the page itself, so the page keeps
/// them once it is re-parented under the output page tree.
fn materialize_inherited(doc: &mut Document, page_id: ObjectId) -> Result<(), PdfError> {
    let mut inherited = Vec::new();
    {
        let page = doc
            .get_object(page_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| PdfError::Parse(format!("page {} {}: {e}", page_id.0, page_id.1)))?;
        for key in INHERITABLE_PAGE_KEYS {
            if page.has(key) {
                continue;
            }
            if let Some(value) = resolve_inherited(doc, page_id, key).map_err(PdfError::from)? {
                inherited.push((key, value.clone()));
            }
        }
    }

    if inherited.is_empty() {
        return Ok(());
    }
    if let Ok(page) = doc.get_object_mut(page_id).and_then(|o| o.as_dict_mut()) {
        for (key, value) in inherited {
            page.set(key.to_vec(), value);
        }
    }
    Ok(())
}

//! lopdf-based PDF parsing backend.
//!
//! Implements [`PdfBackend`] and [`XObjectResolver`] on top of the
//! [lopdf](https://crates.io/crates/lopdf) object model. This is the only
//! backend pdfcompose ships with.

use pdfcompose_core::{
    FormXObject, ImageInfo, InlineImage, Operation, PdfError, ResolveError, XObject,
    XObjectResolver, family_components, is_builtin_colorspace,
};

use crate::backend::PdfBackend;
use crate::error::BackendError;
use crate::tokenizer::tokenize;

/// The credential tried on encrypted inputs when no password is given.
pub const EMPTY_PASSWORD: &[u8] = b"";

/// Upper bound on `/Parent` hops when resolving inherited page attributes.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// A parsed PDF document backed by lopdf.
pub struct LopdfDocument {
    inner: lopdf::Document,
    /// Page object ids in page order.
    page_ids: Vec<lopdf::ObjectId>,
}

impl LopdfDocument {
    /// Wrap an already loaded (and decrypted) lopdf document.
    pub fn from_inner(inner: lopdf::Document) -> Self {
        let page_ids = inner.get_pages().values().copied().collect();
        Self { inner, page_ids }
    }

    /// Access the underlying lopdf document.
    pub fn inner(&self) -> &lopdf::Document {
        &self.inner
    }

    /// Take the underlying lopdf document.
    pub fn into_inner(self) -> lopdf::Document {
        self.inner
    }

    /// Page object ids in page order.
    pub fn page_ids(&self) -> &[lopdf::ObjectId] {
        &self.page_ids
    }
}

impl std::fmt::Debug for LopdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LopdfDocument")
            .field("page_count", &self.page_ids.len())
            .finish_non_exhaustive()
    }
}

/// A reference to a single page within a [`LopdfDocument`].
#[derive(Debug, Clone, Copy)]
pub struct LopdfPage {
    /// The lopdf object ID for this page.
    pub object_id: lopdf::ObjectId,
    /// The 0-based page index.
    pub index: usize,
}

/// The lopdf-based PDF backend.
pub struct LopdfBackend;

/// Load a document, decrypting it with `password` if it is encrypted.
///
/// lopdf decrypts while parsing: the empty password is always tried first,
/// then `password`. A document no credential opens comes back with its
/// `/Encrypt` entry still in the trailer and none of its objects loaded.
///
/// # Errors
///
/// [`BackendError::Parse`] if the bytes are not a PDF. If decryption fails,
/// [`PdfError::PasswordRequired`] when `password` is empty and
/// [`PdfError::InvalidPassword`] otherwise, both wrapped in
/// [`BackendError::Core`].
pub fn load_document(bytes: &[u8], password: &[u8]) -> Result<lopdf::Document, BackendError> {
    let rejected = || {
        if password.is_empty() {
            BackendError::Core(PdfError::PasswordRequired)
        } else {
            BackendError::Core(PdfError::InvalidPassword)
        }
    };

    let loaded = if password.is_empty() {
        lopdf::Document::load_mem(bytes)
    } else {
        // lopdf authenticates text passwords only.
        let password = std::str::from_utf8(password).map_err(|_| rejected())?;
        tracing::debug!("loading document with a password");
        lopdf::Document::load_mem_with_password(bytes, password)
    };
    let doc = loaded.map_err(|e| match e {
        lopdf::Error::InvalidPassword => {
            tracing::debug!("decryption rejected");
            rejected()
        }
        e => BackendError::Parse(format!("failed to parse PDF: {e}")),
    })?;

    // Cleared by lopdf once decryption succeeds.
    if doc.trailer.get(b"Encrypt").is_ok() {
        tracing::debug!(empty_password = password.is_empty(), "document left encrypted");
        return Err(rejected());
    }

    Ok(doc)
}

/// Resolve an indirect reference, returning the referenced object.
///
/// Direct objects, and references that do not resolve, are returned as-is.
pub fn resolve_ref<'a>(doc: &'a lopdf::Document, obj: &'a lopdf::Object) -> &'a lopdf::Object {
    match obj {
        lopdf::Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Look up a key on a page, walking up the page tree via `/Parent` if the
/// page itself does not carry it.
///
/// Returns `None` if the key is not found anywhere in the tree.
pub fn resolve_inherited<'a>(
    doc: &'a lopdf::Document,
    page_id: lopdf::ObjectId,
    key: &[u8],
) -> Result<Option<&'a lopdf::Object>, BackendError> {
    let mut current_id = page_id;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        let dict = doc
            .get_object(current_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| BackendError::Parse(format!("failed to get page dictionary: {e}")))?;

        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }

        match dict.get(b"Parent") {
            Ok(parent) => {
                current_id = parent
                    .as_reference()
                    .map_err(|e| BackendError::Parse(format!("invalid /Parent reference: {e}")))?;
            }
            Err(_) => return Ok(None),
        }
    }
    Err(BackendError::Parse(format!(
        "page tree deeper than {MAX_PAGE_TREE_DEPTH} levels (cyclic /Parent?)"
    )))
}

/// Short name of an object's variant, for diagnostics.
pub fn object_type_name(obj: &lopdf::Object) -> &'static str {
    match obj {
        lopdf::Object::Null => "null",
        lopdf::Object::Boolean(_) => "boolean",
        lopdf::Object::Integer(_) => "integer",
        lopdf::Object::Real(_) => "real",
        lopdf::Object::Name(_) => "name",
        lopdf::Object::String(..) => "string",
        lopdf::Object::Array(_) => "array",
        lopdf::Object::Dictionary(_) => "dictionary",
        lopdf::Object::Stream(_) => "stream",
        lopdf::Object::Reference(_) => "reference",
    }
}

/// Bytes of a string object, following one indirect reference.
pub fn string_bytes<'a>(doc: &'a lopdf::Document, obj: &'a lopdf::Object) -> Option<&'a [u8]> {
    match resolve_ref(doc, obj) {
        lopdf::Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

/// The document catalog, if the trailer points at one.
pub fn catalog(doc: &lopdf::Document) -> Option<&lopdf::Dictionary> {
    let root = doc.trailer.get(b"Root").ok()?;
    resolve_ref(doc, root).as_dict().ok()
}

/// Decode a stream, decompressing if it declares a filter.
pub fn decode_stream(stream: &lopdf::Stream) -> Result<Vec<u8>, BackendError> {
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|e| BackendError::Parse(format!("failed to decompress stream: {e}")))
    } else {
        Ok(stream.content.clone())
    }
}

/// Concatenate and decode a page's `/Contents`.
///
/// Multiple streams are joined with a single space so that tokens at the
/// boundaries stay separate.
fn page_content_bytes(
    doc: &lopdf::Document,
    page_dict: &lopdf::Dictionary,
) -> Result<Vec<u8>, BackendError> {
    let Ok(contents) = page_dict.get(b"Contents") else {
        return Ok(Vec::new());
    };

    match resolve_ref(doc, contents) {
        lopdf::Object::Stream(stream) => decode_stream(stream),
        lopdf::Object::Array(items) => {
            let mut content = Vec::new();
            for item in items {
                let stream = resolve_ref(doc, item).as_stream().map_err(|e| {
                    BackendError::Parse(format!("/Contents array item is not a stream: {e}"))
                })?;
                if !content.is_empty() {
                    content.push(b' ');
                }
                content.extend_from_slice(&decode_stream(stream)?);
            }
            Ok(content)
        }
        lopdf::Object::Null => Ok(Vec::new()),
        _ => Err(BackendError::Parse(
            "/Contents is not a stream or array".to_string(),
        )),
    }
}

/// Effective `/Resources` of a page; empty if the page tree has none.
fn page_resources_dict(
    doc: &lopdf::Document,
    page_id: lopdf::ObjectId,
) -> Result<lopdf::Dictionary, BackendError> {
    match resolve_inherited(doc, page_id, b"Resources")? {
        Some(obj) => resolve_ref(doc, obj)
            .as_dict()
            .cloned()
            .map_err(|_| BackendError::Parse("/Resources is not a dictionary".to_string())),
        None => Ok(lopdf::Dictionary::new()),
    }
}

impl PdfBackend for LopdfBackend {
    type Document = LopdfDocument;
    type Page = LopdfPage;
    type Resources = lopdf::Dictionary;
    type Error = BackendError;

    fn open(bytes: &[u8]) -> Result<Self::Document, Self::Error> {
        load_document(bytes, EMPTY_PASSWORD).map(LopdfDocument::from_inner)
    }

    fn open_with_password(bytes: &[u8], password: &[u8]) -> Result<Self::Document, Self::Error> {
        load_document(bytes, password).map(LopdfDocument::from_inner)
    }

    fn page_count(doc: &Self::Document) -> usize {
        doc.page_ids.len()
    }

    fn get_page(doc: &Self::Document, index: usize) -> Result<Self::Page, Self::Error> {
        let object_id = doc.page_ids.get(index).copied().ok_or(BackendError::Core(
            PdfError::PageOutOfRange {
                index,
                page_count: doc.page_ids.len(),
            },
        ))?;
        Ok(LopdfPage { object_id, index })
    }

    fn page_operations(
        doc: &Self::Document,
        page: &Self::Page,
    ) -> Result<Vec<Operation>, Self::Error> {
        let page_dict = doc
            .inner
            .get_object(page.object_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| BackendError::Parse(format!("failed to get page dictionary: {e}")))?;
        let bytes = page_content_bytes(&doc.inner, page_dict)?;
        tokenize(&bytes)
    }

    fn page_resources(
        doc: &Self::Document,
        page: &Self::Page,
    ) -> Result<Self::Resources, Self::Error> {
        page_resources_dict(&doc.inner, page.object_id)
    }
}

/// Family name of a colorspace object: `/DeviceRGB`, `[/ICCBased 5 0 R]`, ...
fn colorspace_family(doc: &lopdf::Document, obj: &lopdf::Object) -> Option<String> {
    match resolve_ref(doc, obj) {
        lopdf::Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        lopdf::Object::Array(items) => items
            .first()
            .and_then(|first| resolve_ref(doc, first).as_name().ok())
            .map(|name| String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// Components per sample of a colorspace object.
///
/// `ICCBased` reads `/N` from its profile stream and `DeviceN` counts its
/// colorant names; other families are fixed by name.
fn colorspace_components(doc: &lopdf::Document, obj: &lopdf::Object) -> Option<u32> {
    let lopdf::Object::Array(items) = resolve_ref(doc, obj) else {
        return colorspace_family(doc, obj).as_deref().and_then(family_components);
    };
    let family = items.first().and_then(|first| resolve_ref(doc, first).as_name().ok())?;
    let param = items.get(1).map(|p| resolve_ref(doc, p));
    match family {
        b"ICCBased" => param
            .and_then(|p| p.as_stream().ok())
            .and_then(|profile| profile.dict.get(b"N").ok())
            .and_then(|n| resolve_ref(doc, n).as_i64().ok())
            .and_then(|n| u32::try_from(n).ok()),
        b"DeviceN" => param
            .and_then(|p| p.as_array().ok())
            .and_then(|names| u32::try_from(names.len()).ok()),
        other => family_components(&String::from_utf8_lossy(other)),
    }
}

/// Read image metadata from an image XObject's stream dictionary.
fn image_info(doc: &lopdf::Document, dict: &lopdf::Dictionary) -> ImageInfo {
    let integer = |key: &[u8]| {
        dict.get(key)
            .ok()
            .and_then(|o| resolve_ref(doc, o).as_i64().ok())
            .and_then(|v| u32::try_from(v).ok())
    };

    let filter = dict
        .get(b"Filter")
        .ok()
        .and_then(|o| match resolve_ref(doc, o) {
            lopdf::Object::Name(name) => Some(name.as_slice()),
            lopdf::Object::Array(items) => items.last().and_then(|item| item.as_name().ok()),
            _ => None,
        })
        .map(|name| String::from_utf8_lossy(name).into_owned());

    let colorspace = dict.get(b"ColorSpace").ok();
    ImageInfo {
        width: integer(b"Width").unwrap_or(0),
        height: integer(b"Height").unwrap_or(0),
        bits_per_component: integer(b"BitsPerComponent"),
        colorspace: colorspace.and_then(|o| colorspace_family(doc, o)),
        color_components: colorspace.and_then(|o| colorspace_components(doc, o)),
        filter,
    }
}

impl XObjectResolver for LopdfDocument {
    type Resources = lopdf::Dictionary;

    fn resolve_xobject(
        &self,
        resources: &lopdf::Dictionary,
        name: &str,
    ) -> Result<XObject<lopdf::Dictionary>, ResolveError> {
        let doc = &self.inner;
        let table = resources
            .get(b"XObject")
            .map_err(|_| ResolveError::NoXObjectResources)?;
        let table = resolve_ref(doc, table).as_dict().map_err(|_| {
            ResolveError::Malformed("/XObject resource is not a dictionary".to_string())
        })?;
        let entry = table
            .get(name.as_bytes())
            .map_err(|_| ResolveError::NotFound(name.to_string()))?;
        let stream = resolve_ref(doc, entry)
            .as_stream()
            .map_err(|_| ResolveError::NotAStream(name.to_string()))?;

        let subtype = stream.dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok());
        match subtype {
            Some(b"Image") => Ok(XObject::Image(image_info(doc, &stream.dict))),
            Some(b"Form") => {
                let bytes = decode_stream(stream).map_err(|e| {
                    ResolveError::Malformed(format!("Form XObject /{name}: {e}"))
                })?;
                let operations = tokenize(&bytes).map_err(|e| {
                    ResolveError::Malformed(format!("Form XObject /{name}: {e}"))
                })?;
                let resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| resolve_ref(doc, o).as_dict().ok())
                    .cloned();
                Ok(XObject::Form(FormXObject {
                    operations,
                    resources,
                }))
            }
            other => Err(ResolveError::UnsupportedSubtype {
                name: name.to_string(),
                subtype: other.map(|s| String::from_utf8_lossy(s).into_owned()),
            }),
        }
    }

    fn describe_inline_image(
        &self,
        image: &InlineImage,
        resources: &lopdf::Dictionary,
    ) -> Result<ImageInfo, ResolveError> {
        let doc = &self.inner;
        let mut info = ImageInfo::from_inline(image);

        let named = info
            .colorspace
            .as_deref()
            .filter(|cs| !is_builtin_colorspace(cs))
            .map(str::to_owned);
        if let Some(name) = named {
            let entry = resources
                .get(b"ColorSpace")
                .ok()
                .and_then(|table| resolve_ref(doc, table).as_dict().ok())
                .and_then(|table| table.get(name.as_bytes()).ok());
            match entry.and_then(|cs| colorspace_family(doc, cs).map(|family| (cs, family))) {
                Some((cs, family)) => {
                    info.colorspace = Some(family);
                    info.color_components = colorspace_components(doc, cs);
                }
                None => tracing::debug!(colorspace = %name, "inline image colorspace not in resources"),
            }
        }

        Ok(info)
    }
}

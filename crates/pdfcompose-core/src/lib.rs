//! pdfcompose-core: Backend-independent composition and traversal algorithms.
//!
//! This crate provides the parts of pdfcompose that do not depend on any PDF
//! object model:
//!
//! - [`reconcile`]: merge one resource namespace into another
//! - [`merge_forms`]: merge interactive forms and their field trees
//! - [`walk`]: discover every image reachable from a content stream
//!
//! Backends plug in through [`XObjectResolver`] and by choosing the value
//! type stored in [`ResourceNamespace`] and [`FieldTree`].

pub mod error;
pub mod form;
pub mod image;
pub mod operation;
pub mod options;
pub mod resources;
pub mod walker;

pub use error::{ComposeResult, ComposeWarning, PdfError, WarningCode};
pub use form::{FieldId, FieldNode, FieldTree, FieldTreeError, Form, merge_forms, synthetic_field_name};
pub use image::{
    DiscoveredImage, ImageInfo, ImageKind, UsageStats, expand_inline_colorspace,
    expand_inline_filter, family_components, is_builtin_colorspace,
};
pub use operation::{InlineImage, Operand, Operation};
pub use options::{ComposeOptions, WalkOptions};
pub use resources::{NameMap, ResourceKind, ResourceNamespace, ResourceSlot, reconcile};
pub use walker::{
    FormXObject, ImageSink, ResolveError, WalkReport, WalkSummary, XObject, XObjectResolver,
    walk,
};

//! Content-stream image walker.
//!
//! [`walk`] makes a single forward pass over a sequence of [`Operation`]s and
//! reports every image it can reach: inline images (`BI`) directly, and
//! XObjects (`Do`) through an [`XObjectResolver`]. Form XObjects are entered
//! recursively with their own resources, or the caller's when they have none.
//!
//! Each content stream is one traversal scope with its own memo of XObject
//! names already handled, so a name invoked twice in the same stream is
//! reported once. Entering a Form starts a fresh memo; recursion through
//! Forms is bounded by [`WalkOptions::max_recursion_depth`] and
//! [`WalkOptions::max_form_visits`] instead.

use std::collections::HashMap;

use thiserror::Error;

use crate::error::{ComposeWarning, WarningCode};
use crate::image::{DiscoveredImage, ImageInfo, ImageKind, UsageStats};
use crate::operation::{InlineImage, Operand, Operation};
use crate::options::WalkOptions;

/// A resolved XObject.
#[derive(Debug, Clone, PartialEq)]
pub enum XObject<R> {
    /// A raster image (leaf).
    Image(ImageInfo),
    /// A nested content stream.
    Form(FormXObject<R>),
}

/// The content of a Form XObject.
#[derive(Debug, Clone, PartialEq)]
pub struct FormXObject<R> {
    /// The Form's decoded and tokenized content stream.
    pub operations: Vec<Operation>,
    /// The Form's own `/Resources`, if it declares any.
    pub resources: Option<R>,
}

/// Why an XObject name or inline image could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The resources have no `/XObject` table.
    #[error("no /XObject dictionary in resources")]
    NoXObjectResources,
    /// The name is not present in the `/XObject` table.
    #[error("XObject /{0} not found in resources")]
    NotFound(String),
    /// The entry is not a stream.
    #[error("XObject /{0} is not a stream")]
    NotAStream(String),
    /// The stream's `/Subtype` is neither `/Image` nor `/Form`.
    #[error("XObject /{name} has unsupported subtype {subtype:?}")]
    UnsupportedSubtype {
        /// XObject resource name.
        name: String,
        /// The `/Subtype` found, if any.
        subtype: Option<String>,
    },
    /// The object was found but could not be decoded.
    #[error("{0}")]
    Malformed(String),
}

impl ResolveError {
    /// The warning code used when this error is reported during a walk.
    pub fn warning_code(&self) -> WarningCode {
        match self {
            ResolveError::NoXObjectResources | ResolveError::NotFound(_) => {
                WarningCode::UnresolvedReference
            }
            ResolveError::NotAStream(_) | ResolveError::UnsupportedSubtype { .. } => {
                WarningCode::WrongVariant
            }
            ResolveError::Malformed(_) => WarningCode::TypeMismatch,
        }
    }
}

/// Backend service that turns resource names into XObjects.
pub trait XObjectResolver {
    /// The backend's representation of a resource dictionary.
    type Resources;

    /// Look `name` up in the `/XObject` table of `resources`.
    fn resolve_xobject(
        &self,
        resources: &Self::Resources,
        name: &str,
    ) -> Result<XObject<Self::Resources>, ResolveError>;

    /// Describe an inline image, resolving named colorspaces in `resources`.
    ///
    /// The default reads the image dictionary only.
    fn describe_inline_image(
        &self,
        image: &InlineImage,
        _resources: &Self::Resources,
    ) -> Result<ImageInfo, ResolveError> {
        Ok(ImageInfo::from_inline(image))
    }
}

/// Receives the results of a walk.
///
/// Only [`on_image`](ImageSink::on_image) is required; the other callbacks
/// default to no-ops.
pub trait ImageSink {
    /// Called for each image, in content-stream order.
    fn on_image(&mut self, image: DiscoveredImage);

    /// Called the first time an already-processed XObject name is invoked
    /// again within one traversal scope.
    fn on_skip(&mut self, _name: &str, _depth: usize) {}

    /// Called for each reference that could not be followed.
    fn on_warning(&mut self, _warning: ComposeWarning) {}
}

impl<A: ImageSink, B: ImageSink> ImageSink for (A, B) {
    fn on_image(&mut self, image: DiscoveredImage) {
        self.0.on_image(image.clone());
        self.1.on_image(image);
    }

    fn on_skip(&mut self, name: &str, depth: usize) {
        self.0.on_skip(name, depth);
        self.1.on_skip(name, depth);
    }

    fn on_warning(&mut self, warning: ComposeWarning) {
        self.0.on_warning(warning.clone());
        self.1.on_warning(warning);
    }
}

/// Counters for one [`walk`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Images reported.
    pub images: usize,
    /// Distinct (scope, name) pairs skipped as already processed.
    pub skipped: usize,
    /// Form XObjects entered.
    pub forms_entered: usize,
    /// Warnings reported.
    pub warnings: usize,
}

/// Walk `operations` with `resources` and report images to `sink`.
///
/// Never fails: unresolvable references, wrong variants, malformed operands
/// and exhausted recursion budgets are reported through
/// [`ImageSink::on_warning`] and the walk continues with the next operator.
pub fn walk<X: XObjectResolver + ?Sized>(
    resolver: &X,
    operations: &[Operation],
    resources: &X::Resources,
    options: &WalkOptions,
    sink: &mut dyn ImageSink,
) -> WalkSummary {
    let mut walker = Walker {
        resolver,
        options,
        sink,
        summary: WalkSummary::default(),
    };
    walker.walk_scope(operations, resources, 0);
    walker.summary
}

struct Walker<'a, X: XObjectResolver + ?Sized> {
    resolver: &'a X,
    options: &'a WalkOptions,
    sink: &'a mut dyn ImageSink,
    summary: WalkSummary,
}

impl<X: XObjectResolver + ?Sized> Walker<'_, X> {
    fn walk_scope(&mut self, operations: &[Operation], resources: &X::Resources, depth: usize) {
        // name -> already reported as skipped
        let mut memo: HashMap<&str, bool> = HashMap::new();

        for (index, op) in operations.iter().enumerate() {
            match op.operator.as_str() {
                "BI" => self.inline_image(op, index, resources, depth),
                "Do" => {
                    let name = match op.operands.as_slice() {
                        [Operand::Name(name)] => name.as_str(),
                        operands => {
                            let found = operands
                                .iter()
                                .map(Operand::type_name)
                                .collect::<Vec<_>>()
                                .join(", ");
                            self.warn(
                                ComposeWarning::new(
                                    WarningCode::MalformedOperator,
                                    format!("Do expects one name operand, found [{found}]"),
                                )
                                .at_operator(index),
                            );
                            continue;
                        }
                    };

                    if let Some(reported) = memo.get_mut(name) {
                        if !*reported {
                            *reported = true;
                            self.summary.skipped += 1;
                            self.sink.on_skip(name, depth);
                        }
                        tracing::trace!(name, depth, "XObject already processed in this scope");
                        continue;
                    }
                    memo.insert(name, false);
                    self.xobject(name, index, resources, depth);
                }
                _ => {}
            }
        }
    }

    fn inline_image(&mut self, op: &Operation, index: usize, resources: &X::Resources, depth: usize) {
        let [Operand::InlineImage(image)] = op.operands.as_slice() else {
            self.warn(
                ComposeWarning::new(
                    WarningCode::MalformedOperator,
                    format!("BI expects one inline image operand, found {}", op.operands.len()),
                )
                .at_operator(index),
            );
            return;
        };

        match self.resolver.describe_inline_image(image, resources) {
            Ok(info) => self.report(DiscoveredImage {
                kind: ImageKind::Inline,
                name: None,
                info,
                depth,
                operator_index: index,
            }),
            Err(err) => self.warn(
                ComposeWarning::new(err.warning_code(), err.to_string())
                    .at_operator(index)
                    .with_element("inline image"),
            ),
        }
    }

    fn xobject(&mut self, name: &str, index: usize, resources: &X::Resources, depth: usize) {
        let element = format!("XObject /{name}");
        let xobject = match self.resolver.resolve_xobject(resources, name) {
            Ok(xobject) => xobject,
            Err(err) => {
                self.warn(
                    ComposeWarning::new(err.warning_code(), err.to_string())
                        .at_operator(index)
                        .with_element(element),
                );
                return;
            }
        };

        match xobject {
            XObject::Image(info) => self.report(DiscoveredImage {
                kind: ImageKind::XObject,
                name: Some(name.to_string()),
                info,
                depth,
                operator_index: index,
            }),
            XObject::Form(form) => {
                if depth >= self.options.max_recursion_depth {
                    self.warn(
                        ComposeWarning::new(
                            WarningCode::RecursionLimit,
                            format!(
                                "Form XObject nesting exceeds maximum depth {}",
                                self.options.max_recursion_depth
                            ),
                        )
                        .at_operator(index)
                        .with_element(element),
                    );
                    return;
                }
                if self.summary.forms_entered >= self.options.max_form_visits {
                    self.warn(
                        ComposeWarning::new(
                            WarningCode::RecursionLimit,
                            format!(
                                "more than {} Form XObjects visited in one walk",
                                self.options.max_form_visits
                            ),
                        )
                        .at_operator(index)
                        .with_element(element),
                    );
                    return;
                }

                self.summary.forms_entered += 1;
                let effective = form.resources.as_ref().unwrap_or(resources);
                tracing::debug!(
                    name,
                    depth = depth + 1,
                    own_resources = form.resources.is_some(),
                    "entering Form XObject"
                );
                self.walk_scope(&form.operations, effective, depth + 1);
            }
        }
    }

    fn report(&mut self, image: DiscoveredImage) {
        self.summary.images += 1;
        self.sink.on_image(image);
    }

    fn warn(&mut self, warning: ComposeWarning) {
        tracing::warn!(code = %warning.code, "{}", warning);
        self.summary.warnings += 1;
        self.sink.on_warning(warning);
    }
}

/// An [`ImageSink`] that keeps everything it is given.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WalkReport {
    /// Images in discovery order.
    pub images: Vec<DiscoveredImage>,
    /// Distinct XObjects skipped as already processed.
    pub skipped: usize,
    /// Warnings in the order they were raised.
    pub warnings: Vec<ComposeWarning>,
}

impl ImageSink for WalkReport {
    fn on_image(&mut self, image: DiscoveredImage) {
        self.images.push(image);
    }

    fn on_skip(&mut self, _name: &str, _depth: usize) {
        self.skipped += 1;
    }

    fn on_warning(&mut self, warning: ComposeWarning) {
        self.warnings.push(warning);
    }
}

impl ImageSink for UsageStats {
    fn on_image(&mut self, image: DiscoveredImage) {
        self.record(&image.info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Res {
        xobjects: HashMap<String, Entry>,
        colorspaces: HashMap<String, String>,
    }

    #[derive(Clone)]
    enum Entry {
        Image(ImageInfo),
        Form(Vec<Operation>, Option<Box<Res>>),
        Other,
    }

    impl Res {
        fn with(mut self, name: &str, entry: Entry) -> Self {
            self.xobjects.insert(name.to_string(), entry);
            self
        }
    }

    struct MapResolver;

    impl XObjectResolver for MapResolver {
        type Resources = Res;

        fn resolve_xobject(&self, resources: &Res, name: &str) -> Result<XObject<Res>, ResolveError> {
            if resources.xobjects.is_empty() {
                return Err(ResolveError::NoXObjectResources);
            }
            match resources.xobjects.get(name) {
                Some(Entry::Image(info)) => Ok(XObject::Image(info.clone())),
                Some(Entry::Form(ops, res)) => Ok(XObject::Form(FormXObject {
                    operations: ops.clone(),
                    resources: res.as_deref().cloned(),
                })),
                Some(Entry::Other) => Err(ResolveError::UnsupportedSubtype {
                    name: name.to_string(),
                    subtype: Some("PS".to_string()),
                }),
                None => Err(ResolveError::NotFound(name.to_string())),
            }
        }

        fn describe_inline_image(&self, image: &InlineImage, resources: &Res) -> Result<ImageInfo, ResolveError> {
            let mut info = ImageInfo::from_inline(image);
            if let Some(cs) = info.colorspace.as_ref().and_then(|cs| resources.colorspaces.get(cs)) {
                info.colorspace = Some(cs.clone());
            }
            Ok(info)
        }
    }

    fn image(width: u32, filter: &str) -> Entry {
        Entry::Image(ImageInfo {
            width,
            height: width,
            bits_per_component: Some(8),
            colorspace: Some("DeviceRGB".to_string()),
            color_components: Some(3),
            filter: Some(filter.to_string()),
        })
    }

    fn invoke(name: &str) -> Operation {
        Operation::new("Do", vec![Operand::Name(name.to_string())])
    }

    fn inline(cs: &str) -> Operation {
        Operation::new(
            "BI",
            vec![Operand::InlineImage(InlineImage {
                dict: vec![
                    ("W".to_string(), Operand::Integer(2)),
                    ("H".to_string(), Operand::Integer(2)),
                    ("BPC".to_string(), Operand::Integer(8)),
                    ("CS".to_string(), Operand::Name(cs.to_string())),
                ],
                data: vec![0; 12],
            })],
        )
    }

    fn run(ops: &[Operation], res: &Res, options: &WalkOptions) -> (WalkReport, WalkSummary) {
        let mut report = WalkReport::default();
        let summary = walk(&MapResolver, ops, res, options, &mut report);
        (report, summary)
    }

    fn names(report: &WalkReport) -> Vec<String> {
        report
            .images
            .iter()
            .map(|i| i.name.clone().unwrap_or_else(|| "inline".to_string()))
            .collect()
    }

    #[test]
    fn repeated_image_reported_once() {
        let res = Res::default().with("Im1", image(10, "DCTDecode"));
        let ops = [invoke("Im1"), invoke("Im1")];

        let (report, summary) = run(&ops, &res, &WalkOptions::default());

        assert_eq!(names(&report), ["Im1"]);
        assert_eq!(report.skipped, 1);
        assert_eq!(summary.skipped, 1);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn skip_count_is_per_distinct_name() {
        let res = Res::default()
            .with("Im1", image(1, "FlateDecode"))
            .with("Im2", image(2, "FlateDecode"));
        let ops = [
            invoke("Im1"),
            invoke("Im1"),
            invoke("Im1"),
            invoke("Im2"),
            invoke("Im2"),
        ];

        let (report, _) = run(&ops, &res, &WalkOptions::default());

        assert_eq!(names(&report), ["Im1", "Im2"]);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn form_without_resources_falls_back_to_callers() {
        let res = Res::default()
            .with("Fm1", Entry::Form(vec![invoke("Im2")], None))
            .with("Im2", image(5, "DCTDecode"));

        let (report, summary) = run(&[invoke("Fm1")], &res, &WalkOptions::default());

        assert_eq!(names(&report), ["Im2"]);
        assert_eq!(report.images[0].depth, 1);
        assert_eq!(summary.forms_entered, 1);
    }

    #[test]
    fn form_with_own_resources_uses_them() {
        let own = Res::default().with("Im1", image(7, "JPXDecode"));
        let res = Res::default()
            .with("Fm1", Entry::Form(vec![invoke("Im1")], Some(Box::new(own))))
            .with("Im1", image(3, "DCTDecode"));

        let (report, _) = run(&[invoke("Fm1")], &res, &WalkOptions::default());

        assert_eq!(report.images.len(), 1);
        assert_eq!(report.images[0].info.width, 7);
    }

    #[test]
    fn nested_images_interleave_at_point_of_reference() {
        let res = Res::default()
            .with("A", image(1, "DCTDecode"))
            .with("Fm", Entry::Form(vec![invoke("B"), invoke("C")], None))
            .with("B", image(2, "DCTDecode"))
            .with("C", image(3, "DCTDecode"))
            .with("D", image(4, "DCTDecode"));
        let ops = [invoke("A"), invoke("Fm"), invoke("D")];

        let (report, _) = run(&ops, &res, &WalkOptions::default());

        assert_eq!(names(&report), ["A", "B", "C", "D"]);
    }

    #[test]
    fn nested_scope_has_fresh_memo() {
        let res = Res::default()
            .with("Im1", image(1, "DCTDecode"))
            .with("Fm1", Entry::Form(vec![invoke("Im1")], None));
        let ops = [invoke("Im1"), invoke("Fm1")];

        let (report, summary) = run(&ops, &res, &WalkOptions::default());

        assert_eq!(names(&report), ["Im1", "Im1"]);
        assert_eq!(summary.skipped, 0);
    }

    #[test]
    fn self_referencing_form_is_bounded() {
        let res = Res::default().with("Fm1", Entry::Form(vec![invoke("Fm1")], None));
        let options = WalkOptions::default();

        let (report, summary) = run(&[invoke("Fm1")], &res, &options);

        assert!(report.images.is_empty());
        assert_eq!(summary.forms_entered, options.max_recursion_depth);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].code, WarningCode::RecursionLimit);
        assert_eq!(report.warnings[0].element.as_deref(), Some("XObject /Fm1"));
    }

    #[test]
    fn mutually_recursive_forms_are_bounded() {
        let res = Res::default()
            .with("Fa", Entry::Form(vec![invoke("Fb"), invoke("Im")], None))
            .with("Fb", Entry::Form(vec![invoke("Fa")], None))
            .with("Im", image(1, "DCTDecode"));
        let options = WalkOptions {
            max_recursion_depth: 4,
            ..WalkOptions::default()
        };

        let (report, summary) = run(&[invoke("Fa")], &res, &options);

        assert_eq!(summary.forms_entered, 4);
        assert_eq!(report.warnings.len(), 1);
        // Fa is entered at depths 1 and 3, each reporting Im after Fb returns.
        assert_eq!(names(&report), ["Im", "Im"]);
        assert_eq!(report.images[0].depth, 3);
        assert_eq!(report.images[1].depth, 1);
    }

    #[test]
    fn visit_budget_stops_fan_out() {
        let mut res = Res::default();
        let mut ops = Vec::new();
        for i in 0..5 {
            let name = format!("F{i}");
            res = res.with(&name, Entry::Form(Vec::new(), None));
            ops.push(invoke(&name));
        }
        let options = WalkOptions {
            max_form_visits: 3,
            ..WalkOptions::default()
        };

        let (report, summary) = run(&ops, &res, &options);

        assert_eq!(summary.forms_entered, 3);
        assert_eq!(report.warnings.len(), 2);
        assert!(report
            .warnings
            .iter()
            .all(|w| w.code == WarningCode::RecursionLimit));
    }

    #[test]
    fn unresolved_and_wrong_variant_do_not_stop_walk() {
        let res = Res::default()
            .with("Ps", Entry::Other)
            .with("Im1", image(1, "DCTDecode"));
        let ops = [invoke("Missing"), invoke("Ps"), invoke("Im1")];

        let (report, summary) = run(&ops, &res, &WalkOptions::default());

        assert_eq!(names(&report), ["Im1"]);
        assert_eq!(summary.warnings, 2);
        assert_eq!(report.warnings[0].code, WarningCode::UnresolvedReference);
        assert_eq!(report.warnings[0].operator_index, Some(0));
        assert_eq!(report.warnings[1].code, WarningCode::WrongVariant);
    }

    #[test]
    fn unresolved_name_reported_once_per_scope() {
        let res = Res::default().with("Im1", image(1, "DCTDecode"));
        let ops = [invoke("Missing"), invoke("Missing")];

        let (report, summary) = run(&ops, &res, &WalkOptions::default());

        assert_eq!(report.warnings.len(), 1);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn missing_xobject_table_is_reported() {
        let (report, _) = run(&[invoke("Im1")], &Res::default(), &WalkOptions::default());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].code, WarningCode::UnresolvedReference);
    }

    #[test]
    fn malformed_do_operands_are_reported() {
        let res = Res::default().with("Im1", image(1, "DCTDecode"));
        let ops = [
            Operation::new("Do", vec![Operand::Integer(3)]),
            Operation::new("Do", Vec::new()),
            invoke("Im1"),
        ];

        let (report, _) = run(&ops, &res, &WalkOptions::default());

        assert_eq!(names(&report), ["Im1"]);
        assert_eq!(report.warnings.len(), 2);
        assert!(report
            .warnings
            .iter()
            .all(|w| w.code == WarningCode::MalformedOperator));
    }

    #[test]
    fn inline_images_resolve_colorspace_in_current_resources() {
        let mut own = Res::default().with("Im9", image(9, "DCTDecode"));
        own.colorspaces
            .insert("CS0".to_string(), "ICCBased".to_string());
        let res = Res::default().with(
            "Fm1",
            Entry::Form(vec![inline("CS0")], Some(Box::new(own))),
        );
        let ops = [inline("G"), invoke("Fm1")];

        let (report, _) = run(&ops, &res, &WalkOptions::default());

        assert_eq!(report.images.len(), 2);
        assert_eq!(report.images[0].kind, ImageKind::Inline);
        assert_eq!(report.images[0].info.colorspace.as_deref(), Some("DeviceGray"));
        assert_eq!(report.images[1].info.colorspace.as_deref(), Some("ICCBased"));
    }

    #[test]
    fn inline_images_are_never_deduplicated() {
        let res = Res::default();
        let ops = [inline("RGB"), inline("RGB")];
        let (report, _) = run(&ops, &res, &WalkOptions::default());
        assert_eq!(report.images.len(), 2);
    }

    #[test]
    fn other_operators_are_ignored() {
        let res = Res::default().with("Im1", image(1, "DCTDecode"));
        let ops = [
            Operation::new("q", Vec::new()),
            Operation::new(
                "cm",
                vec![
                    Operand::Integer(1),
                    Operand::Integer(0),
                    Operand::Integer(0),
                    Operand::Integer(1),
                    Operand::Integer(0),
                    Operand::Integer(0),
                ],
            ),
            invoke("Im1"),
            Operation::new("Q", Vec::new()),
        ];

        let (report, summary) = run(&ops, &res, &WalkOptions::default());

        assert_eq!(report.images.len(), 1);
        assert_eq!(report.images[0].operator_index, 2);
        assert_eq!(summary.warnings, 0);
    }

    #[test]
    fn usage_stats_count_across_walks() {
        let res = Res::default()
            .with("A", image(1, "DCTDecode"))
            .with("B", image(2, "FlateDecode"));
        let mut sinks = (WalkReport::default(), UsageStats::default());

        walk(&MapResolver, &[invoke("A"), invoke("B")], &res, &WalkOptions::default(), &mut sinks);
        walk(&MapResolver, &[invoke("A"), inline("G")], &res, &WalkOptions::default(), &mut sinks);

        let (report, stats) = sinks;
        assert_eq!(report.images.len(), 4);
        assert_eq!(stats.images, 4);
        assert_eq!(stats.filters.get("DCTDecode"), Some(&2));
        assert_eq!(stats.filters.get("FlateDecode"), Some(&1));
        assert_eq!(stats.filters.get("None"), Some(&1));
        assert_eq!(stats.colorspaces.get("DeviceRGB"), Some(&3));
        assert_eq!(stats.colorspaces.get("DeviceGray"), Some(&1));
    }
}

//! Resource namespaces and their reconciliation.
//!
//! A [`ResourceNamespace`] maps each [`ResourceKind`] (XObject, ColorSpace,
//! Font, ...) to a keyed table of sub-resources. Keys are unique within one
//! kind of one namespace but not across documents, so combining the default
//! resources of several forms requires [`reconcile`].
//!
//! The namespace is generic over the entry value `V` so the algorithm stays
//! independent of the object model of any particular PDF backend.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;

use crate::error::{ComposeWarning, WarningCode};

/// Insertion-ordered table of resource keys to values.
pub type NameMap<V> = IndexMap<String, V>;

/// The kinds of entries a resource dictionary can hold.
///
/// The declaration order is the order in which [`reconcile`] visits kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResourceKind {
    /// `/XObject`: images and form XObjects.
    XObject,
    /// `/ColorSpace`: named colorspaces.
    ColorSpace,
    /// `/ExtGState`: external graphics states.
    ExtGState,
    /// `/Shading`: shading dictionaries.
    Shading,
    /// `/Pattern`: tiling and shading patterns.
    Pattern,
    /// `/Font`: font dictionaries.
    Font,
    /// `/ProcSet`: procedure set names.
    ProcSet,
    /// `/Properties`: marked-content property lists.
    Properties,
}

impl ResourceKind {
    /// Every kind, in reconciliation order.
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::XObject,
        ResourceKind::ColorSpace,
        ResourceKind::ExtGState,
        ResourceKind::Shading,
        ResourceKind::Pattern,
        ResourceKind::Font,
        ResourceKind::ProcSet,
        ResourceKind::Properties,
    ];

    /// The key of this kind in a PDF resource dictionary.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            ResourceKind::XObject => "XObject",
            ResourceKind::ColorSpace => "ColorSpace",
            ResourceKind::ExtGState => "ExtGState",
            ResourceKind::Shading => "Shading",
            ResourceKind::Pattern => "Pattern",
            ResourceKind::Font => "Font",
            ResourceKind::ProcSet => "ProcSet",
            ResourceKind::Properties => "Properties",
        }
    }

    /// Parse a resource dictionary key. Returns `None` for unknown keys.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_pdf_name() == name)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_pdf_name())
    }
}

/// The content stored under one [`ResourceKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSlot<V> {
    /// A keyed table (every kind except `/ProcSet` in well-formed documents).
    Entries(NameMap<V>),
    /// A list of names (`/ProcSet` is an array such as `[/PDF /Text /ImageB]`).
    Names(Vec<String>),
    /// The backend could not dereference the slot to a container.
    ///
    /// Holds a description of what was found instead.
    Malformed(String),
}

impl<V> ResourceSlot<V> {
    fn describe(&self) -> String {
        match self {
            ResourceSlot::Entries(_) => "dictionary".to_string(),
            ResourceSlot::Names(_) => "name array".to_string(),
            ResourceSlot::Malformed(found) => found.clone(),
        }
    }
}

/// A page or form resource namespace.
///
/// Besides the per-kind tables it keeps the list of declared colorspace
/// names, which contains every `/ColorSpace` key exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNamespace<V> {
    slots: BTreeMap<ResourceKind, ResourceSlot<V>>,
    colorspace_names: Vec<String>,
}

impl<V> Default for ResourceNamespace<V> {
    fn default() -> Self {
        Self {
            slots: BTreeMap::new(),
            colorspace_names: Vec::new(),
        }
    }
}

impl<V> ResourceNamespace<V> {
    /// Create an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set `kind` to a keyed table built from `entries`.
    pub fn with_entries<K: Into<String>>(
        mut self,
        kind: ResourceKind,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.set_slot(kind, ResourceSlot::Entries(map));
        self
    }

    /// Store `slot` under `kind`, replacing whatever was there.
    pub fn set_slot(&mut self, kind: ResourceKind, slot: ResourceSlot<V>) {
        if kind == ResourceKind::ColorSpace {
            self.colorspace_names = match &slot {
                ResourceSlot::Entries(map) => map.keys().cloned().collect(),
                _ => Vec::new(),
            };
        }
        self.slots.insert(kind, slot);
    }

    /// The slot stored under `kind`, if any.
    pub fn slot(&self, kind: ResourceKind) -> Option<&ResourceSlot<V>> {
        self.slots.get(&kind)
    }

    /// The keyed table stored under `kind`, if the slot is a table.
    pub fn entries(&self, kind: ResourceKind) -> Option<&NameMap<V>> {
        match self.slots.get(&kind) {
            Some(ResourceSlot::Entries(map)) => Some(map),
            _ => None,
        }
    }

    /// Look up one key of one kind.
    pub fn get(&self, kind: ResourceKind, key: &str) -> Option<&V> {
        self.entries(kind).and_then(|map| map.get(key))
    }

    /// Whether a slot exists for `kind`.
    pub fn has(&self, kind: ResourceKind) -> bool {
        self.slots.contains_key(&kind)
    }

    /// Iterate over present kinds and their slots in reconciliation order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, &ResourceSlot<V>)> {
        self.slots.iter().map(|(kind, slot)| (*kind, slot))
    }

    /// Declared colorspace names, each exactly once, in declaration order.
    pub fn colorspace_names(&self) -> &[String] {
        &self.colorspace_names
    }

    /// Returns true if no kind is present.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Merge `secondary` into `primary`, kind by kind.
///
/// For each [`ResourceKind`]:
/// - if `primary` lacks the kind, it adopts `secondary`'s slot wholesale;
/// - if both have keyed tables, every key of `secondary` is set into
///   `primary`, overwriting collisions (the later document wins; each
///   overwrite is reported as [`WarningCode::ResourceOverride`]);
/// - `/ColorSpace` additionally keeps the declared-name list free of
///   duplicates: new keys are appended before insertion, existing keys are
///   updated in place;
/// - name lists (`/ProcSet`) are unioned, preserving first-seen order;
/// - any slot that is not a usable container is reported as
///   [`WarningCode::TypeMismatch`] and that kind is left untouched.
///
/// `secondary` is never modified. Returns the warnings produced.
pub fn reconcile<V: Clone>(
    primary: &mut ResourceNamespace<V>,
    secondary: &ResourceNamespace<V>,
) -> Vec<ComposeWarning> {
    let mut warnings = Vec::new();
    for kind in ResourceKind::ALL {
        reconcile_kind(primary, secondary, kind, &mut warnings);
    }
    warnings
}

fn reconcile_kind<V: Clone>(
    primary: &mut ResourceNamespace<V>,
    secondary: &ResourceNamespace<V>,
    kind: ResourceKind,
    warnings: &mut Vec<ComposeWarning>,
) {
    let Some(incoming) = secondary.slots.get(&kind) else {
        return;
    };

    if !primary.slots.contains_key(&kind) {
        tracing::debug!(%kind, "adopting resource kind wholesale");
        primary.slots.insert(kind, incoming.clone());
        if kind == ResourceKind::ColorSpace {
            primary.colorspace_names = secondary.colorspace_names.clone();
        }
        return;
    }

    let ResourceNamespace {
        slots,
        colorspace_names,
    } = primary;
    let Some(existing) = slots.get_mut(&kind) else {
        return;
    };

    match (existing, incoming) {
        (ResourceSlot::Entries(target), ResourceSlot::Entries(source)) => {
            for (key, value) in source {
                if target.contains_key(key) {
                    ComposeWarning::new(
                        WarningCode::ResourceOverride,
                        "resource key present in both namespaces; later document wins",
                    )
                    .with_element(format!("{kind} /{key}"))
                    .record(warnings);
                } else if kind == ResourceKind::ColorSpace {
                    colorspace_names.push(key.clone());
                }
                target.insert(key.clone(), value.clone());
            }
        }
        (ResourceSlot::Names(target), ResourceSlot::Names(source)) => {
            for name in source {
                if !target.contains(name) {
                    target.push(name.clone());
                }
            }
        }
        (existing, incoming) => {
            ComposeWarning::new(
                WarningCode::TypeMismatch,
                format!(
                    "cannot merge {} into {}; keeping primary resources",
                    incoming.describe(),
                    existing.describe()
                ),
            )
            .with_element(kind.as_pdf_name())
            .record(warnings);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(kind: ResourceKind, entries: &[(&str, &str)]) -> ResourceNamespace<String> {
        ResourceNamespace::new().with_entries(
            kind,
            entries.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn kind_round_trips_pdf_names() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_pdf_name(kind.as_pdf_name()), Some(kind));
        }
        assert_eq!(ResourceKind::from_pdf_name("Bogus"), None);
    }

    #[test]
    fn missing_kind_is_adopted_wholesale() {
        let mut primary = ns(ResourceKind::Font, &[("F1", "helv")]);
        let secondary = ns(ResourceKind::XObject, &[("Im1", "a"), ("Im2", "b")]);

        let warnings = reconcile(&mut primary, &secondary);

        assert!(warnings.is_empty());
        assert_eq!(
            primary.slot(ResourceKind::XObject),
            secondary.slot(ResourceKind::XObject)
        );
        assert_eq!(primary.get(ResourceKind::Font, "F1").map(String::as_str), Some("helv"));
    }

    #[test]
    fn secondary_overrides_colliding_key() {
        let mut primary = ns(ResourceKind::Font, &[("F1", "helv"), ("F2", "times")]);
        let secondary = ns(ResourceKind::Font, &[("F1", "courier"), ("F3", "symbol")]);

        let warnings = reconcile(&mut primary, &secondary);

        let fonts = primary.entries(ResourceKind::Font).unwrap();
        assert_eq!(fonts.get("F1").map(String::as_str), Some("courier"));
        assert_eq!(fonts.get("F2").map(String::as_str), Some("times"));
        assert_eq!(fonts.get("F3").map(String::as_str), Some("symbol"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::ResourceOverride);
        assert_eq!(warnings[0].element.as_deref(), Some("Font /F1"));
    }

    #[test]
    fn absent_secondary_kind_leaves_primary_alone() {
        let mut primary = ns(ResourceKind::Shading, &[("Sh1", "axial")]);
        let before = primary.clone();
        let secondary = ResourceNamespace::new();

        let warnings = reconcile(&mut primary, &secondary);

        assert!(warnings.is_empty());
        assert_eq!(primary, before);
    }

    #[test]
    fn colorspace_names_stay_unique_across_documents() {
        let mut primary = ns(ResourceKind::ColorSpace, &[("CS0", "rgb")]);
        let second = ns(ResourceKind::ColorSpace, &[("CS0", "icc"), ("CS1", "gray")]);
        let third = ns(ResourceKind::ColorSpace, &[("CS1", "cmyk"), ("CS0", "lab")]);

        reconcile(&mut primary, &second);
        reconcile(&mut primary, &third);

        assert_eq!(primary.colorspace_names(), ["CS0", "CS1"]);
        assert_eq!(
            primary.get(ResourceKind::ColorSpace, "CS0").map(String::as_str),
            Some("lab")
        );
        assert_eq!(
            primary.get(ResourceKind::ColorSpace, "CS1").map(String::as_str),
            Some("cmyk")
        );
    }

    #[test]
    fn adopted_colorspace_brings_its_names() {
        let mut primary = ResourceNamespace::new();
        let secondary = ns(ResourceKind::ColorSpace, &[("CSa", "x"), ("CSb", "y")]);

        reconcile(&mut primary, &secondary);

        assert_eq!(primary.colorspace_names(), ["CSa", "CSb"]);
    }

    #[test]
    fn procset_names_are_unioned() {
        let mut primary: ResourceNamespace<String> = ResourceNamespace::new();
        primary.set_slot(
            ResourceKind::ProcSet,
            ResourceSlot::Names(vec!["PDF".into(), "Text".into()]),
        );
        let mut secondary = ResourceNamespace::new();
        secondary.set_slot(
            ResourceKind::ProcSet,
            ResourceSlot::Names(vec!["Text".into(), "ImageB".into()]),
        );

        let warnings = reconcile(&mut primary, &secondary);

        assert!(warnings.is_empty());
        assert_eq!(
            primary.slot(ResourceKind::ProcSet),
            Some(&ResourceSlot::Names(vec![
                "PDF".into(),
                "Text".into(),
                "ImageB".into()
            ]))
        );
    }

    #[test]
    fn malformed_slot_is_reported_and_skipped() {
        let mut primary: ResourceNamespace<String> = ResourceNamespace::new();
        primary.set_slot(
            ResourceKind::ExtGState,
            ResourceSlot::Malformed("integer".into()),
        );
        let secondary = ns(ResourceKind::ExtGState, &[("GS1", "alpha")])
            .with_entries(ResourceKind::Pattern, [("P1".to_string(), "tile".to_string())]);

        let warnings = reconcile(&mut primary, &secondary);

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::TypeMismatch);
        assert_eq!(
            primary.slot(ResourceKind::ExtGState),
            Some(&ResourceSlot::Malformed("integer".into()))
        );
        // The remaining kinds are still merged.
        assert!(primary.has(ResourceKind::Pattern));
    }

    #[test]
    fn merge_visits_all_eight_kinds() {
        let mut primary = ResourceNamespace::new();
        let mut secondary = ResourceNamespace::new();
        for kind in ResourceKind::ALL {
            primary = primary.with_entries(kind, [("a".to_string(), 1)]);
            secondary = secondary.with_entries(kind, [("b".to_string(), 2)]);
        }

        reconcile(&mut primary, &secondary);

        for kind in ResourceKind::ALL {
            let map = primary.entries(kind).unwrap();
            assert_eq!(map.len(), 2, "{kind} should hold both keys");
        }
    }
}

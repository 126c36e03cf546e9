//! Interactive form (AcroForm) model and merging.
//!
//! Field trees are stored in an arena ([`FieldTree`]): each node records its
//! parent and children by [`FieldId`], so re-parenting a subtree while merging
//! forms is an index rewrite rather than pointer surgery.

use std::collections::HashSet;

use thiserror::Error;

use crate::error::{ComposeWarning, WarningCode};
use crate::resources::{ResourceNamespace, reconcile};

/// Index of a node inside a [`FieldTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(usize);

impl FieldId {
    /// The position of this node in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One node of a field tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode<V> {
    /// Partial field name (`/T`), if the node has one.
    pub name: Option<String>,
    /// Parent node, or `None` for a root.
    pub parent: Option<FieldId>,
    /// Child nodes in document order.
    pub kids: Vec<FieldId>,
    /// Backend payload for the node. `None` marks a node created by a merge.
    pub payload: Option<V>,
}

impl<V> FieldNode<V> {
    /// Returns true for non-terminal grouping nodes created by [`merge_forms`].
    pub fn is_synthetic(&self) -> bool {
        self.payload.is_none()
    }
}

/// Structural errors when editing a [`FieldTree`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldTreeError {
    /// The id does not belong to this tree.
    #[error("field {0:?} does not exist")]
    UnknownField(FieldId),
    /// Attaching `child` under `parent` would create a cycle.
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    Cycle {
        /// The node being moved.
        child: FieldId,
        /// The proposed new parent.
        parent: FieldId,
    },
    /// A node's parent link and its parent's kid list disagree.
    #[error("field {0:?} has an inconsistent parent link")]
    Inconsistent(FieldId),
}

/// Arena-backed field tree with an ordered list of roots.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldTree<V> {
    nodes: Vec<FieldNode<V>>,
    roots: Vec<FieldId>,
}

impl<V> Default for FieldTree<V> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
        }
    }
}

impl<V> FieldTree<V> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the tree has no roots.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Root nodes in order.
    pub fn roots(&self) -> &[FieldId] {
        &self.roots
    }

    /// Access a node.
    pub fn node(&self, id: FieldId) -> Option<&FieldNode<V>> {
        self.nodes.get(id.0)
    }

    /// Iterate over every node with its id.
    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &FieldNode<V>)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (FieldId(i), node))
    }

    /// Append a new root node.
    pub fn add_root(&mut self, name: Option<String>, payload: Option<V>) -> FieldId {
        let id = self.push_node(name, None, payload);
        self.roots.push(id);
        id
    }

    /// Append a new node as the last kid of `parent`.
    pub fn add_child(
        &mut self,
        parent: FieldId,
        name: Option<String>,
        payload: Option<V>,
    ) -> Result<FieldId, FieldTreeError> {
        if parent.0 >= self.nodes.len() {
            return Err(FieldTreeError::UnknownField(parent));
        }
        let id = self.push_node(name, Some(parent), payload);
        self.nodes[parent.0].kids.push(id);
        Ok(id)
    }

    fn push_node(&mut self, name: Option<String>, parent: Option<FieldId>, payload: Option<V>) -> FieldId {
        let id = FieldId(self.nodes.len());
        self.nodes.push(FieldNode {
            name,
            parent,
            kids: Vec::new(),
            payload,
        });
        id
    }

    /// Move `child` (with its subtree) to the end of `parent`'s kids.
    ///
    /// The child is detached from its previous parent, or from the root list.
    pub fn reparent(&mut self, child: FieldId, parent: FieldId) -> Result<(), FieldTreeError> {
        for id in [child, parent] {
            if id.0 >= self.nodes.len() {
                return Err(FieldTreeError::UnknownField(id));
            }
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(FieldTreeError::Cycle { child, parent });
        }

        match self.nodes[child.0].parent {
            Some(old) => self.nodes[old.0].kids.retain(|&k| k != child),
            None => self.roots.retain(|&r| r != child),
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].kids.push(child);
        Ok(())
    }

    /// Returns true if `ancestor` lies on the parent chain of `id`.
    fn is_ancestor(&self, ancestor: FieldId, id: FieldId) -> bool {
        let mut current = self.nodes.get(id.0).and_then(|n| n.parent);
        let mut steps = 0;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                return true;
            }
            current = self.nodes[p.0].parent;
        }
        false
    }

    /// Move every node of `other` into this arena.
    ///
    /// Ids of `other` are shifted past this tree's nodes. The returned roots
    /// are detached: they are neither in this tree's root list nor under any
    /// parent, so the caller decides where they hang.
    pub fn absorb(&mut self, other: FieldTree<V>) -> Vec<FieldId> {
        let offset = self.nodes.len();
        let shift = |id: FieldId| FieldId(id.0 + offset);
        for node in other.nodes {
            self.nodes.push(FieldNode {
                name: node.name,
                parent: node.parent.map(shift),
                kids: node.kids.into_iter().map(shift).collect(),
                payload: node.payload,
            });
        }
        other.roots.into_iter().map(shift).collect()
    }

    /// All nodes below `id`, in pre-order.
    pub fn descendants(&self, id: FieldId) -> Vec<FieldId> {
        let mut out = Vec::new();
        let mut stack: Vec<FieldId> = match self.node(id) {
            Some(node) => node.kids.iter().rev().copied().collect(),
            None => return out,
        };
        let mut seen = HashSet::new();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next);
            if let Some(node) = self.node(next) {
                stack.extend(node.kids.iter().rev().copied());
            }
        }
        out
    }

    /// Fully qualified name: partial names from the root down, joined with `.`.
    ///
    /// Nodes without a partial name are skipped.
    pub fn qualified_name(&self, id: FieldId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        let mut steps = 0;
        while let Some(cur) = current {
            let Some(node) = self.node(cur) else { break };
            if let Some(ref name) = node.name {
                parts.push(name.as_str());
            }
            current = node.parent;
            steps += 1;
            if steps > self.nodes.len() {
                break;
            }
        }
        parts.reverse();
        parts.join(".")
    }

    /// Check that parent links and kid lists agree and that no cycle exists.
    pub fn check_consistency(&self) -> Result<(), FieldTreeError> {
        for &root in &self.roots {
            if self.node(root).and_then(|n| n.parent).is_some() {
                return Err(FieldTreeError::Inconsistent(root));
            }
        }
        for (id, node) in self.iter() {
            for &kid in &node.kids {
                match self.node(kid) {
                    Some(k) if k.parent == Some(id) => {}
                    Some(_) => return Err(FieldTreeError::Inconsistent(kid)),
                    None => return Err(FieldTreeError::UnknownField(kid)),
                }
            }
            if let Some(parent) = node.parent {
                if self.is_ancestor(id, parent) {
                    return Err(FieldTreeError::Cycle { child: id, parent });
                }
            }
        }
        Ok(())
    }
}

/// A document's interactive form description.
///
/// Scalar entries are optional because absence matters for merging: a value
/// is only taken from a later document when the accumulated form has none.
#[derive(Debug, Clone, PartialEq)]
pub struct Form<V> {
    /// `/NeedAppearances`.
    pub need_appearances: Option<bool>,
    /// `/SigFlags`.
    pub sig_flags: Option<i64>,
    /// `/CO` calculation order (field references).
    pub calculation_order: Option<Vec<V>>,
    /// `/DR` default resources.
    pub default_resources: Option<ResourceNamespace<V>>,
    /// `/DA` default appearance string.
    pub default_appearance: Option<String>,
    /// `/Q` quadding (0 left, 1 centered, 2 right).
    pub quadding: Option<i64>,
    /// `/XFA` stream or array.
    pub xfa: Option<V>,
    /// `/Fields` tree.
    pub fields: FieldTree<V>,
}

impl<V> Default for Form<V> {
    fn default() -> Self {
        Self {
            need_appearances: None,
            sig_flags: None,
            calculation_order: None,
            default_resources: None,
            default_appearance: None,
            quadding: None,
            xfa: None,
            fields: FieldTree::new(),
        }
    }
}

/// Name of the grouping field created for the `document_index`-th input.
pub fn synthetic_field_name(document_index: usize) -> String {
    format!("doc{document_index}")
}

/// Merge `secondary` (the form of input `document_index`, 1-based) into `primary`.
///
/// - Scalars (`NeedAppearances`, `SigFlags`, `CO`, `DA`, `Q`) keep the
///   first value seen; `secondary` only fills gaps.
/// - Default resources are adopted when `primary` has none, otherwise merged
///   with [`reconcile`].
/// - XFA keeps the first stream; a second one raises
///   [`WarningCode::XfaNotMerged`].
/// - Fields: when `primary` has no roots, `secondary`'s roots become the
///   roots. Otherwise a synthetic non-terminal field named `doc{N}` is
///   appended as a new root and every root of `secondary` is re-parented
///   under it, keeping each subtree intact.
pub fn merge_forms<V: Clone>(
    primary: &mut Form<V>,
    secondary: Form<V>,
    document_index: usize,
) -> Vec<ComposeWarning> {
    let mut warnings = Vec::new();

    if primary.need_appearances.is_none() {
        primary.need_appearances = secondary.need_appearances;
    }
    if primary.sig_flags.is_none() {
        primary.sig_flags = secondary.sig_flags;
    }
    if primary.calculation_order.is_none() {
        primary.calculation_order = secondary.calculation_order;
    }
    if primary.default_appearance.is_none() {
        primary.default_appearance = secondary.default_appearance;
    }
    if primary.quadding.is_none() {
        primary.quadding = secondary.quadding;
    }

    if let Some(incoming) = secondary.default_resources {
        match primary.default_resources.as_mut() {
            Some(existing) => {
                for warning in reconcile(existing, &incoming) {
                    warnings.push(warning.in_document(document_index));
                }
            }
            None => primary.default_resources = Some(incoming),
        }
    }

    if let Some(incoming) = secondary.xfa {
        if primary.xfa.is_some() {
            ComposeWarning::new(
                WarningCode::XfaNotMerged,
                "XFA merging is not supported; keeping the first XFA stream encountered",
            )
            .in_document(document_index)
            .record(&mut warnings);
        } else {
            primary.xfa = Some(incoming);
        }
    }

    if secondary.fields.is_empty() {
        return warnings;
    }

    let incoming_roots = primary.fields.absorb(secondary.fields);
    if primary.fields.is_empty() {
        primary.fields.roots = incoming_roots;
        return warnings;
    }

    let group = primary
        .fields
        .add_root(Some(synthetic_field_name(document_index)), None);
    for root in incoming_roots {
        // Absorbed roots are detached and cannot be ancestors of a new node.
        if let Err(err) = primary.fields.reparent(root, group) {
            ComposeWarning::new(WarningCode::MalformedField, err.to_string())
                .in_document(document_index)
                .record(&mut warnings);
        }
    }
    tracing::debug!(
        document = document_index,
        group = %synthetic_field_name(document_index),
        "grouped incoming form fields"
    );

    warnings
}

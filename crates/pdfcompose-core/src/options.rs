//! Options controlling composition and content-stream walking.

/// Options for composing several documents into one.
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    /// Carry `/OCProperties` over from the first input that declares them (default: false).
    pub preserve_optional_content: bool,
    /// Merge the interactive forms of all inputs into the output (default: true).
    pub merge_forms: bool,
    /// Maximum depth followed when loading a field tree (default: 64).
    pub max_field_depth: usize,
    /// Whether to keep warnings in the returned result (default: true).
    ///
    /// Warnings are always logged; this only controls whether they are returned.
    pub collect_warnings: bool,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            preserve_optional_content: false,
            merge_forms: true,
            max_field_depth: 64,
            collect_warnings: true,
        }
    }
}

impl ComposeOptions {
    /// Options for the advanced composition flow, which also keeps layers.
    pub fn advanced() -> Self {
        Self {
            preserve_optional_content: true,
            ..Self::default()
        }
    }
}

/// Options for walking content streams for images.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Maximum nesting depth of Form XObjects (default: 10).
    ///
    /// The page-level stream is depth 0. A Form invoked at depth
    /// `max_recursion_depth` is reported as a [`RecursionLimit`] warning
    /// instead of being entered.
    ///
    /// [`RecursionLimit`]: crate::WarningCode::RecursionLimit
    pub max_recursion_depth: usize,
    /// Maximum number of Form XObjects entered during one walk (default: 10,000).
    pub max_form_visits: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_recursion_depth: 10,
            max_form_visits: 10_000,
        }
    }
}

//! Diff data structures and algorithms.
//!
//! The module defines the native diff representation used by `jd-core`
//! along with the structural diff engine and the codecs that read and
//! write the native jd format, JSON Patch (RFC 6902), and JSON Merge
//! Patch (RFC 7386).

mod list;
mod mergepatch;
mod multiset;
mod object;
mod parse;
mod path;
mod pointer;
mod primitives;
mod render;
mod set;

pub use path::{path_from_segments, root_path, Path, PathSegment};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde_json::{Number as JsonNumber, Value as JsonValue};

use crate::{ArrayMode, DiffError, DiffOptions, Node, ParseError, PatchError};

/// Cooperative cancellation handle for long-running diffs.
///
/// Clone the token, hand one copy to [`Node::diff_with_cancel`], and
/// call [`CancelToken::cancel`] from another thread to abort the diff.
///
/// ```
/// # use jd_core::CancelToken;
/// let token = CancelToken::new();
/// assert!(!token.is_cancelled());
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the non-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of any diff holding a clone of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Indicates whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub(super) fn check(&self) -> Result<(), DiffError> {
        if self.is_cancelled() {
            Err(DiffError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Metadata associated with a diff element.
///
/// ```
/// # use jd_core::diff::DiffMetadata;
/// let meta = DiffMetadata::merge();
/// assert!(meta.merge);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffMetadata {
    /// Format version advertised in the diff header.
    pub version: Option<u32>,
    /// Indicates that merge patch semantics should be used.
    pub merge: bool,
}

impl DiffMetadata {
    /// Constructs metadata for merge mode.
    #[must_use]
    pub fn merge() -> Self {
        Self { version: None, merge: true }
    }

    /// Constructs metadata advertising a format version.
    #[must_use]
    pub fn version(version: u32) -> Self {
        Self { version: Some(version), merge: false }
    }

    pub(crate) fn is_effective(&self) -> bool {
        self.merge || self.version.is_some()
    }

    pub(crate) fn absorb(&mut self, other: &Self) {
        if other.merge {
            self.merge = true;
        }
        if let Some(version) = other.version {
            self.version = Some(version);
        }
    }

    pub(super) fn render_header(&self) -> String {
        let mut header = String::new();
        if let Some(version) = self.version {
            header.push_str(&format!("^ {{\"Version\":{version}}}\n"));
        }
        if self.merge {
            header.push_str("^ {\"Merge\":true}\n");
        }
        header
    }
}

/// Represents a single diff hunk.
///
/// ```
/// # use jd_core::diff::{DiffElement, PathSegment};
/// # use jd_core::{Node, DiffOptions};
/// let lhs = Node::from_json_str("1").unwrap();
/// let rhs = Node::from_json_str("2").unwrap();
/// let element = DiffElement::new()
///     .with_path(vec![])
///     .with_remove(vec![lhs.clone()])
///     .with_add(vec![rhs.clone()]);
/// assert_eq!(element.remove, vec![lhs.clone()]);
/// assert_eq!(element.add, vec![rhs.clone()]);
/// # let diff = lhs.diff(&rhs, &DiffOptions::default());
/// # assert_eq!(diff.len(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiffElement {
    /// Optional metadata for this hunk.
    pub metadata: Option<DiffMetadata>,
    /// Path to the affected location.
    pub path: Path,
    /// Context before the change (list diffs only).
    pub before: Vec<Node>,
    /// Values removed at the path.
    pub remove: Vec<Node>,
    /// Values added at the path.
    pub add: Vec<Node>,
    /// Context after the change (list diffs only).
    pub after: Vec<Node>,
}

impl DiffElement {
    /// Creates a blank diff element.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the metadata for the element.
    #[must_use]
    pub fn with_metadata(mut self, metadata: DiffMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sets the path for the element.
    #[must_use]
    pub fn with_path<P>(mut self, path: P) -> Self
    where
        P: Into<Path>,
    {
        self.path = path.into();
        self
    }

    /// Sets the before context.
    #[must_use]
    pub fn with_before(mut self, before: Vec<Node>) -> Self {
        self.before = before;
        self
    }

    /// Sets the removal list.
    #[must_use]
    pub fn with_remove(mut self, remove: Vec<Node>) -> Self {
        self.remove = remove;
        self
    }

    /// Sets the addition list.
    #[must_use]
    pub fn with_add(mut self, add: Vec<Node>) -> Self {
        self.add = add;
        self
    }

    /// Sets the after context.
    #[must_use]
    pub fn with_after(mut self, after: Vec<Node>) -> Self {
        self.after = after;
        self
    }

    /// Indicates whether the element uses merge patch semantics,
    /// inheriting from `inherited` when it carries no metadata.
    #[must_use]
    pub fn is_merge(&self, inherited: bool) -> bool {
        self.metadata.as_ref().map_or(inherited, |meta| meta.merge)
    }
}

/// Collection of diff elements.
///
/// ```
/// # use jd_core::diff::{Diff, DiffElement};
/// let diff = Diff::from_elements(vec![DiffElement::new()]);
/// assert_eq!(diff.len(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Diff {
    elements: Vec<DiffElement>,
}

/// Configuration toggles for diff rendering.
#[derive(Clone, Debug, Default)]
pub struct RenderConfig {
    color: bool,
    file: Option<String>,
}

impl RenderConfig {
    /// Constructs a configuration with default settings (no ANSI color).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables ANSI color output.
    #[must_use]
    pub fn with_color(mut self, enabled: bool) -> Self {
        self.color = enabled;
        self
    }

    /// Annotates rendered output with a source-file header line.
    #[must_use]
    pub fn with_file<S>(mut self, file: S) -> Self
    where
        S: Into<String>,
    {
        self.file = Some(file.into());
        self
    }

    /// Indicates whether color output is enabled.
    #[must_use]
    pub fn color_enabled(&self) -> bool {
        self.color
    }

    /// Returns the source-file annotation, when present.
    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Convenience constructor enabling color output.
    #[must_use]
    pub fn color(enabled: bool) -> Self {
        Self::new().with_color(enabled)
    }
}

/// Errors that can occur while rendering or reversing diffs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError {
    message: String,
}

impl RenderError {
    pub(super) fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RenderError {}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<PatchError> for RenderError {
    fn from(err: PatchError) -> Self {
        Self::new(err.to_string())
    }
}

impl Diff {
    /// Constructs an empty diff.
    #[must_use]
    pub fn empty() -> Self {
        Self { elements: Vec::new() }
    }

    /// Builds a diff from the provided elements.
    #[must_use]
    pub fn from_elements(elements: Vec<DiffElement>) -> Self {
        Self { elements }
    }

    /// Parses native jd diff text.
    ///
    /// ```
    /// # use jd_core::Diff;
    /// let diff = Diff::from_native_str("@ [\"a\"]\n- 1\n+ 2\n")?;
    /// assert_eq!(diff.len(), 1);
    /// # Ok::<(), jd_core::ParseError>(())
    /// ```
    pub fn from_native_str(input: &str) -> Result<Self, ParseError> {
        parse::parse_native(input)
    }

    /// Parses a JSON Patch (RFC 6902) document into a diff.
    pub fn from_patch_str(input: &str) -> Result<Self, ParseError> {
        pointer::parse_patch(input)
    }

    /// Parses a JSON Merge Patch (RFC 7386) document into a diff.
    pub fn from_merge_str(input: &str) -> Result<Self, ParseError> {
        mergepatch::parse_merge(input)
    }

    /// Returns the number of elements in the diff.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Indicates whether the diff is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns an iterator over the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, DiffElement> {
        self.elements.iter()
    }

    /// Consumes the diff and returns the elements.
    #[must_use]
    pub fn into_elements(self) -> Vec<DiffElement> {
        self.elements
    }

    /// Renders the diff using the native jd text format.
    ///
    /// ```
    /// # use jd_core::{DiffOptions, Node, RenderConfig};
    /// let lhs = Node::from_json_str("{\"a\":1}")?;
    /// let rhs = Node::from_json_str("{\"a\":2}")?;
    /// let diff = lhs.diff(&rhs, &DiffOptions::default());
    /// let rendered = diff.render(&RenderConfig::default());
    /// assert_eq!(rendered, "@ [\"a\"]\n- 1\n+ 2\n");
    /// # Ok::<(), jd_core::CanonicalizeError>(())
    /// ```
    #[must_use]
    pub fn render(&self, config: &RenderConfig) -> String {
        render::render_native(self, config)
    }

    /// Renders the diff as a JSON Patch (RFC 6902).
    ///
    /// ```
    /// # use jd_core::{DiffOptions, Node};
    /// let lhs = Node::from_json_str("[1,2,3]")?;
    /// let rhs = Node::from_json_str("[1,4,3]")?;
    /// let diff = lhs.diff(&rhs, &DiffOptions::default());
    /// let patch = diff.render_patch()?;
    /// assert!(patch.starts_with("[{\"op\":\"test\""));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn render_patch(&self) -> Result<String, RenderError> {
        pointer::render_patch(self)
    }

    /// Renders the diff as a JSON Merge Patch (RFC 7386).
    ///
    /// ```
    /// # use jd_core::{diff::DiffElement, diff::PathSegment, Diff, DiffMetadata, Node};
    /// let element = DiffElement::new()
    ///     .with_metadata(DiffMetadata::merge())
    ///     .with_path(PathSegment::key("name"))
    ///     .with_add(vec![Node::from_json_str("\"jd\"").unwrap()]);
    /// let diff = Diff::from_elements(vec![element]);
    /// assert_eq!(diff.render_merge().unwrap(), "{\"name\":\"jd\"}");
    /// ```
    pub fn render_merge(&self) -> Result<String, RenderError> {
        mergepatch::render_merge(self)
    }

    /// Serializes the diff structure as JSON for debugging.
    pub fn render_raw(&self) -> Result<String, RenderError> {
        let mut values = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            values.push(raw_element(element)?);
        }
        Ok(serde_json::to_string(&JsonValue::Array(values))?)
    }

    /// Reverses a strict diff so that applying it to the target restores the base value.
    ///
    /// ```
    /// # use jd_core::{DiffOptions, Node};
    /// let lhs = Node::from_json_str("{\"a\":1}")?;
    /// let rhs = Node::from_json_str("{\"a\":2}")?;
    /// let diff = lhs.diff(&rhs, &DiffOptions::default());
    /// let reversed = diff.reverse()?;
    /// let restored = rhs.apply_patch(&reversed)?;
    /// assert_eq!(restored, lhs);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn reverse(&self) -> Result<Diff, RenderError> {
        if self.elements.is_empty() {
            return Ok(Diff::default());
        }

        let mut active_metadata: Vec<Option<DiffMetadata>> =
            Vec::with_capacity(self.elements.len());
        let mut inherited: Option<DiffMetadata> = None;
        for element in &self.elements {
            if let Some(metadata) = element.metadata.as_ref().filter(|meta| meta.is_effective()) {
                if let Some(existing) = inherited.as_mut() {
                    existing.absorb(metadata);
                } else {
                    inherited = Some(metadata.clone());
                }
            }
            active_metadata.push(inherited.clone());
        }

        let mut reversed = Vec::with_capacity(self.elements.len());
        let mut last_emitted: Option<DiffMetadata> = None;

        for (index, element) in self.elements.iter().enumerate().rev() {
            let metadata = active_metadata[index].clone();
            if metadata.as_ref().map_or(false, |meta| meta.merge) {
                return Err(RenderError::new(format!(
                    "cannot reverse merge diff element at {}",
                    element.path
                )));
            }

            let mut clone = element.clone();
            std::mem::swap(&mut clone.remove, &mut clone.add);
            match metadata {
                Some(meta) => {
                    if last_emitted.as_ref() != Some(&meta) {
                        clone.metadata = Some(meta.clone());
                        last_emitted = Some(meta);
                    } else {
                        clone.metadata = None;
                    }
                }
                None => {
                    clone.metadata = None;
                    last_emitted = None;
                }
            }
            reversed.push(clone);
        }

        Ok(Diff::from_elements(reversed))
    }
}

impl IntoIterator for Diff {
    type Item = DiffElement;
    type IntoIter = std::vec::IntoIter<DiffElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diff {
    type Item = &'a DiffElement;
    type IntoIter = std::slice::Iter<'a, DiffElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl From<Vec<DiffElement>> for Diff {
    fn from(value: Vec<DiffElement>) -> Self {
        Self::from_elements(value)
    }
}

pub(super) fn is_void(node: &Node) -> bool {
    matches!(node, Node::Void)
}

pub(super) fn node_to_json_value(node: &Node) -> Result<JsonValue, RenderError> {
    match node {
        Node::Void => Err(RenderError::new("cannot encode void value as JSON")),
        Node::Number(number) => Ok(JsonValue::Number(json_number_from_f64(number.get()))),
        _ => node.to_json_value().ok_or_else(|| RenderError::new("cannot encode void value as JSON")),
    }
}

pub(super) fn json_number_from_f64(value: f64) -> JsonNumber {
    if value.fract() == 0.0 {
        if (i64::MIN as f64) <= value && value <= (i64::MAX as f64) {
            return JsonNumber::from(value as i64);
        }
        if value >= 0.0 && value <= (u64::MAX as f64) {
            return JsonNumber::from(value as u64);
        }
    }
    JsonNumber::from_f64(value).expect("finite number")
}

fn raw_element(element: &DiffElement) -> Result<JsonValue, RenderError> {
    fn nodes_to_json(nodes: &[Node]) -> Vec<JsonValue> {
        nodes
            .iter()
            .map(|node| match node {
                Node::Void => JsonValue::Null,
                Node::Number(number) => JsonValue::Number(json_number_from_f64(number.get())),
                other => other.to_json_value().unwrap_or(JsonValue::Null),
            })
            .collect()
    }

    let mut map = serde_json::Map::new();
    if let Some(metadata) = &element.metadata {
        let mut meta = serde_json::Map::new();
        if let Some(version) = metadata.version {
            meta.insert("Version".to_string(), JsonValue::from(version));
        }
        if metadata.merge {
            meta.insert("Merge".to_string(), JsonValue::Bool(true));
        }
        map.insert("Metadata".to_string(), JsonValue::Object(meta));
    }
    map.insert("Path".to_string(), element.path.to_json_value());
    if !element.before.is_empty() {
        map.insert("Before".to_string(), JsonValue::Array(nodes_to_json(&element.before)));
    }
    if !element.remove.is_empty() {
        map.insert("Remove".to_string(), JsonValue::Array(nodes_to_json(&element.remove)));
    }
    if !element.add.is_empty() {
        map.insert("Add".to_string(), JsonValue::Array(nodes_to_json(&element.add)));
    }
    if !element.after.is_empty() {
        map.insert("After".to_string(), JsonValue::Array(nodes_to_json(&element.after)));
    }
    Ok(JsonValue::Object(map))
}

/// Computes the structural diff between two nodes.
pub(crate) fn diff_nodes(
    lhs: &Node,
    rhs: &Node,
    options: &DiffOptions,
    token: &CancelToken,
) -> Result<Diff, DiffError> {
    diff_impl(lhs, rhs, &Path::new(), options, token)
}

pub(super) fn diff_impl(
    lhs: &Node,
    rhs: &Node,
    path: &Path,
    options: &DiffOptions,
    token: &CancelToken,
) -> Result<Diff, DiffError> {
    token.check()?;

    if options.merge() {
        return mergepatch::diff_merge(lhs, rhs, path, options);
    }

    match (lhs, rhs) {
        (Node::Object(left), Node::Object(right)) => {
            object::diff_objects(left, right, path, options, token)
        }
        (Node::Array(left), Node::Array(right)) => match options.array_mode() {
            ArrayMode::List => list::diff_lists(left, right, path, options, token),
            ArrayMode::Set => set::diff_sets(left, right, path, options, token),
            ArrayMode::MultiSet => multiset::diff_multisets(left, right, path, options, token),
        },
        _ => Ok(primitives::diff_primitives(lhs, rhs, path, options)),
    }
}

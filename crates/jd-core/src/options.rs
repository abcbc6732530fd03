use std::fmt;

use serde_json::Value as JsonValue;

use crate::{
    diff::{Path, PathSegment},
    OptionsError,
};

/// Controls how arrays are interpreted during equality and diff operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayMode {
    /// Arrays behave as ordered lists (default).
    List,
    /// Arrays behave as mathematical sets (order-insensitive, unique elements).
    Set,
    /// Arrays behave as multisets (order-insensitive, duplicate-aware).
    MultiSet,
}

impl Default for ArrayMode {
    fn default() -> Self {
        Self::List
    }
}

impl fmt::Display for ArrayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayMode::List => f.write_str("list"),
            ArrayMode::Set => f.write_str("set"),
            ArrayMode::MultiSet => f.write_str("multiset"),
        }
    }
}

/// A single member of the closed option set.
///
/// Scalar options apply globally once in effect; [`DiffOption::Path`]
/// scopes its inner options to the sub-tree rooted at its path.
#[derive(Clone, Debug, PartialEq)]
pub enum DiffOption {
    /// Diff all arrays as sets.
    Set,
    /// Diff all arrays as multisets (bags).
    Multiset,
    /// Match objects inside sets by identity over the listed keys.
    SetKeys(Vec<String>),
    /// Produce and apply merge-patch semantics.
    Merge,
    /// Numbers compare equal within this absolute tolerance.
    Precision(f64),
    /// Render with ANSI colors (render-only; no effect on semantics).
    Color,
    /// Render word-level string highlights (render-only).
    ColorWords,
    /// Re-enable diff emission inside a scoped region.
    DiffOn,
    /// Suppress diff emission inside a scoped region.
    DiffOff,
    /// Scope inner options to the sub-tree rooted at a path.
    Path(PathOption),
    /// Annotate rendered output with a source-file header (render-only).
    File(String),
}

/// Scopes a list of options to the sub-tree rooted at `at`.
#[derive(Clone, Debug, PartialEq)]
pub struct PathOption {
    /// Path from the current node to the scope root.
    pub at: Path,
    /// Options that take effect inside the scope.
    pub then: Vec<DiffOption>,
}

/// Configuration bundle passed to equality, hash, and diff operations.
///
/// The bundle tracks two views of the option set: `apply` holds the
/// options effective at the current node, `retain` the options still
/// relevant to deeper nodes. [`DiffOptions::refine`] advances the bundle
/// one path step and must be called at every descent.
///
/// ```
/// # use jd_core::{ArrayMode, DiffOptions, Node};
/// let lhs = Node::from_json_str("[1,2]")?;
/// let rhs = Node::from_json_str("[2,1]")?;
/// let opts = DiffOptions::default().with_array_mode(ArrayMode::Set)?;
/// assert!(lhs.eq_with_options(&rhs, &opts));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiffOptions {
    apply: Vec<DiffOption>,
    retain: Vec<DiffOption>,
    diffing_off: bool,
}

impl DiffOptions {
    /// Builds a bundle from a flat list of options.
    pub fn from_options<I>(options: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = DiffOption>,
    {
        let mut bundle = Self::default();
        for option in options {
            bundle = bundle.with_option(option)?;
        }
        Ok(bundle)
    }

    /// Parses the JSON option array accepted by the CLI `-opts` flag.
    ///
    /// ```
    /// # use jd_core::{ArrayMode, DiffOptions};
    /// let opts = DiffOptions::from_json_str("[\"SET\"]")?;
    /// assert_eq!(opts.array_mode(), ArrayMode::Set);
    /// # Ok::<(), jd_core::OptionsError>(())
    /// ```
    pub fn from_json_str(input: &str) -> Result<Self, OptionsError> {
        let value: JsonValue = serde_json::from_str(input)
            .map_err(|err| OptionsError::Json { message: err.to_string() })?;
        let JsonValue::Array(items) = value else {
            return Err(OptionsError::Json { message: "expected a JSON array".to_string() });
        };
        let mut options = Vec::with_capacity(items.len());
        for item in &items {
            options.push(parse_option(item)?);
        }
        Self::from_options(options)
    }

    /// Adds one option to the bundle, validating the combination.
    pub fn with_option(mut self, option: DiffOption) -> Result<Self, OptionsError> {
        match option {
            DiffOption::DiffOn => self.diffing_off = false,
            DiffOption::DiffOff => self.diffing_off = true,
            DiffOption::Path(path_option) => {
                validate_list(&path_option.then)?;
                self.retain.push(DiffOption::Path(path_option));
            }
            scalar => {
                self.apply.push(scalar.clone());
                self.retain.push(scalar);
            }
        }
        validate_list(&self.apply)?;
        Ok(self)
    }

    /// Sets the array interpretation mode.
    ///
    /// ```
    /// # use jd_core::{ArrayMode, DiffOptions};
    /// let opts = DiffOptions::default().with_array_mode(ArrayMode::MultiSet)?;
    /// assert_eq!(opts.array_mode(), ArrayMode::MultiSet);
    /// # Ok::<(), jd_core::OptionsError>(())
    /// ```
    pub fn with_array_mode(self, mode: ArrayMode) -> Result<Self, OptionsError> {
        match mode {
            ArrayMode::List => Ok(self),
            ArrayMode::Set => self.with_option(DiffOption::Set),
            ArrayMode::MultiSet => self.with_option(DiffOption::Multiset),
        }
    }

    /// Sets the numeric precision tolerance.
    pub fn with_precision(self, precision: f64) -> Result<Self, OptionsError> {
        self.with_option(DiffOption::Precision(precision))
    }

    /// Sets the object identity keys used when arrays behave as sets.
    ///
    /// ```
    /// # use jd_core::DiffOptions;
    /// let opts = DiffOptions::default().with_set_keys(["name", "id"])?;
    /// assert_eq!(opts.set_keys().unwrap(), ["id", "name"]);
    /// # Ok::<(), jd_core::OptionsError>(())
    /// ```
    pub fn with_set_keys<I, S>(self, keys: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut collected = Vec::new();
        for key in keys {
            let key = key.into();
            if key.trim().is_empty() {
                return Err(OptionsError::EmptySetKey);
            }
            collected.push(key);
        }
        if collected.is_empty() {
            return Err(OptionsError::EmptySetKey);
        }
        collected.sort();
        collected.dedup();
        self.with_option(DiffOption::SetKeys(collected))
    }

    /// Switches the bundle to merge-patch semantics.
    pub fn with_merge(self) -> Result<Self, OptionsError> {
        self.with_option(DiffOption::Merge)
    }

    /// Scopes `then` options to the sub-tree rooted at `at`.
    pub fn with_path_option<I>(self, at: Path, then: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = DiffOption>,
    {
        self.with_option(DiffOption::Path(PathOption { at, then: then.into_iter().collect() }))
    }

    /// Returns the effective array interpretation mode.
    #[must_use]
    pub fn array_mode(&self) -> ArrayMode {
        let mut mode = ArrayMode::List;
        for option in &self.apply {
            match option {
                DiffOption::Set | DiffOption::SetKeys(_) => mode = ArrayMode::Set,
                DiffOption::Multiset => mode = ArrayMode::MultiSet,
                _ => {}
            }
        }
        mode
    }

    /// Returns the numeric equality tolerance (zero when exact).
    #[must_use]
    pub fn precision(&self) -> f64 {
        self.apply
            .iter()
            .find_map(|option| match option {
                DiffOption::Precision(value) => Some(*value),
                _ => None,
            })
            .unwrap_or(0.0)
    }

    /// Returns the keys used to identify objects within set semantics.
    #[must_use]
    pub fn set_keys(&self) -> Option<&[String]> {
        self.apply.iter().find_map(|option| match option {
            DiffOption::SetKeys(keys) => Some(keys.as_slice()),
            _ => None,
        })
    }

    /// Indicates whether merge-patch semantics are in effect.
    #[must_use]
    pub fn merge(&self) -> bool {
        self.apply.iter().any(|option| matches!(option, DiffOption::Merge))
    }

    /// Indicates whether diff elements may be emitted at the current node.
    #[must_use]
    pub fn diffing(&self) -> bool {
        !self.diffing_off
    }

    /// Indicates whether color rendering was requested.
    #[must_use]
    pub fn color(&self) -> bool {
        self.apply
            .iter()
            .any(|option| matches!(option, DiffOption::Color | DiffOption::ColorWords))
    }

    /// Returns the source-file annotation, when present.
    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.apply.iter().find_map(|option| match option {
            DiffOption::File(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Advances the bundle one path step.
    ///
    /// Global scalar options survive; path-scoped options are consumed
    /// one step at a time and expose their inner options once fully
    /// consumed. A path option reduced to a single trailing set or
    /// multiset marker switches the array mode for the node just
    /// reached.
    ///
    /// ```
    /// # use jd_core::{ArrayMode, DiffOption, DiffOptions};
    /// # use jd_core::diff::{Path, PathSegment};
    /// let opts = DiffOptions::default()
    ///     .with_path_option(Path::from(PathSegment::key("tags")), [DiffOption::Set])?;
    /// assert_eq!(opts.array_mode(), ArrayMode::List);
    /// let inner = opts.refine(&PathSegment::key("tags"));
    /// assert_eq!(inner.array_mode(), ArrayMode::Set);
    /// # Ok::<(), jd_core::OptionsError>(())
    /// ```
    #[must_use]
    pub fn refine(&self, segment: &PathSegment) -> Self {
        let mut apply = Vec::new();
        let mut retain = Vec::new();
        let mut diffing_off = self.diffing_off;

        for option in &self.retain {
            let DiffOption::Path(path_option) = option else {
                apply.push(option.clone());
                retain.push(option.clone());
                continue;
            };
            let Some(first) = path_option.at.segments().first() else {
                continue;
            };
            if !step_matches(first, segment) {
                continue;
            }
            let rest: Vec<PathSegment> = path_option.at.segments()[1..].to_vec();
            if rest.is_empty() {
                for inner in &path_option.then {
                    match inner {
                        DiffOption::DiffOn => diffing_off = false,
                        DiffOption::DiffOff => diffing_off = true,
                        other => {
                            apply.push(other.clone());
                            retain.push(other.clone());
                        }
                    }
                }
            } else {
                if rest.len() == 1 {
                    match rest[0] {
                        PathSegment::Set => apply.push(DiffOption::Set),
                        PathSegment::Multiset => apply.push(DiffOption::Multiset),
                        _ => {}
                    }
                }
                retain.push(DiffOption::Path(PathOption {
                    at: Path::from(rest),
                    then: path_option.then.clone(),
                }));
            }
        }

        Self { apply, retain, diffing_off }
    }
}

fn step_matches(at: &PathSegment, segment: &PathSegment) -> bool {
    match (at, segment) {
        (PathSegment::Key(a), PathSegment::Key(b)) => a == b,
        (PathSegment::Index(a), PathSegment::Index(b)) => a == b,
        (PathSegment::Set, PathSegment::Set | PathSegment::SetKeys(_)) => true,
        (PathSegment::Multiset, PathSegment::Multiset | PathSegment::MultisetKeys(_)) => true,
        (PathSegment::SetKeys(a), PathSegment::SetKeys(b)) => a == b,
        (PathSegment::MultisetKeys(a), PathSegment::MultisetKeys(b)) => a == b,
        _ => false,
    }
}

fn validate_list(options: &[DiffOption]) -> Result<(), OptionsError> {
    let has_precision = options
        .iter()
        .any(|option| matches!(option, DiffOption::Precision(value) if *value > 0.0));
    let has_unordered = options.iter().any(|option| {
        matches!(option, DiffOption::Set | DiffOption::Multiset | DiffOption::SetKeys(_))
    });
    if has_precision && has_unordered {
        return Err(OptionsError::PrecisionIncompatible);
    }
    for option in options {
        if let DiffOption::SetKeys(keys) = option {
            if keys.is_empty() || keys.iter().any(|key| key.trim().is_empty()) {
                return Err(OptionsError::EmptySetKey);
            }
        }
        if let DiffOption::Path(path_option) = option {
            validate_list(&path_option.then)?;
        }
    }
    Ok(())
}

fn parse_option(value: &JsonValue) -> Result<DiffOption, OptionsError> {
    match value {
        JsonValue::String(name) => match name.as_str() {
            "SET" => Ok(DiffOption::Set),
            "MULTISET" => Ok(DiffOption::Multiset),
            "MERGE" => Ok(DiffOption::Merge),
            "COLOR" => Ok(DiffOption::Color),
            "COLOR_WORDS" => Ok(DiffOption::ColorWords),
            "DIFF_ON" => Ok(DiffOption::DiffOn),
            "DIFF_OFF" => Ok(DiffOption::DiffOff),
            other => Err(OptionsError::UnknownOption { name: other.to_string() }),
        },
        JsonValue::Object(map) if map.contains_key("@") => {
            let at_value = &map["@"];
            let at = Path::from_json_value(at_value).map_err(|err| OptionsError::InvalidValue {
                option: "@".to_string(),
                message: err.to_string(),
            })?;
            let then_value = map.get("^").ok_or_else(|| OptionsError::InvalidValue {
                option: "@".to_string(),
                message: "path option requires a \"^\" list".to_string(),
            })?;
            let JsonValue::Array(items) = then_value else {
                return Err(OptionsError::InvalidValue {
                    option: "^".to_string(),
                    message: "expected a JSON array".to_string(),
                });
            };
            let mut then = Vec::with_capacity(items.len());
            for item in items {
                then.push(parse_option(item)?);
            }
            Ok(DiffOption::Path(PathOption { at, then }))
        }
        JsonValue::Object(map) if map.len() == 1 => {
            let (key, inner) = map.iter().next().expect("single-entry map");
            match key.as_str() {
                "precision" => {
                    let number = inner.as_f64().ok_or_else(|| OptionsError::InvalidValue {
                        option: "precision".to_string(),
                        message: "expected a number".to_string(),
                    })?;
                    Ok(DiffOption::Precision(number))
                }
                "setkeys" => {
                    let items = inner.as_array().ok_or_else(|| OptionsError::InvalidValue {
                        option: "setkeys".to_string(),
                        message: "expected an array of strings".to_string(),
                    })?;
                    let mut keys = Vec::with_capacity(items.len());
                    for item in items {
                        let key = item.as_str().ok_or_else(|| OptionsError::InvalidValue {
                            option: "setkeys".to_string(),
                            message: "expected an array of strings".to_string(),
                        })?;
                        keys.push(key.to_string());
                    }
                    keys.sort();
                    keys.dedup();
                    Ok(DiffOption::SetKeys(keys))
                }
                "file" => {
                    let name = inner.as_str().ok_or_else(|| OptionsError::InvalidValue {
                        option: "file".to_string(),
                        message: "expected a string".to_string(),
                    })?;
                    Ok(DiffOption::File(name.to_string()))
                }
                other => Err(OptionsError::UnknownOption { name: other.to_string() }),
            }
        }
        other => Err(OptionsError::UnknownOption { name: other.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_and_set_mode_conflict() {
        let err = DiffOptions::default()
            .with_array_mode(ArrayMode::Set)
            .and_then(|opts| opts.with_precision(0.1))
            .unwrap_err();
        assert_eq!(err, OptionsError::PrecisionIncompatible);
    }

    #[test]
    fn set_keys_require_non_empty_strings() {
        let err = DiffOptions::default().with_set_keys([" "]).unwrap_err();
        assert_eq!(err, OptionsError::EmptySetKey);
    }

    #[test]
    fn set_keys_force_set_mode() {
        let opts = DiffOptions::default().with_set_keys(["id"]).unwrap();
        assert_eq!(opts.array_mode(), ArrayMode::Set);
        assert_eq!(opts.set_keys().unwrap(), ["id"]);
    }

    #[test]
    fn refine_keeps_global_options() {
        let opts = DiffOptions::default().with_precision(0.5).unwrap();
        let inner = opts.refine(&PathSegment::key("a")).refine(&PathSegment::index(3));
        assert!((inner.precision() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn path_option_activates_at_scope_root() {
        let opts = DiffOptions::default()
            .with_path_option(
                Path::from(vec![PathSegment::key("a"), PathSegment::key("b")]),
                [DiffOption::Multiset],
            )
            .unwrap();
        assert_eq!(opts.array_mode(), ArrayMode::List);
        let at_a = opts.refine(&PathSegment::key("a"));
        assert_eq!(at_a.array_mode(), ArrayMode::List);
        let at_b = at_a.refine(&PathSegment::key("b"));
        assert_eq!(at_b.array_mode(), ArrayMode::MultiSet);
        // Scoped options persist below the scope root.
        let deeper = at_b.refine(&PathSegment::Multiset);
        assert_eq!(deeper.array_mode(), ArrayMode::MultiSet);
    }

    #[test]
    fn path_option_is_dropped_off_scope() {
        let opts = DiffOptions::default()
            .with_path_option(Path::from(PathSegment::key("a")), [DiffOption::Set])
            .unwrap();
        let elsewhere = opts.refine(&PathSegment::key("z"));
        assert_eq!(elsewhere.array_mode(), ArrayMode::List);
        let back = elsewhere.refine(&PathSegment::key("a"));
        assert_eq!(back.array_mode(), ArrayMode::List);
    }

    #[test]
    fn trailing_marker_switches_mode_one_step_early() {
        let opts = DiffOptions::default()
            .with_path_option(
                Path::from(vec![PathSegment::key("tags"), PathSegment::Set]),
                [DiffOption::SetKeys(vec!["id".to_string()])],
            )
            .unwrap();
        let at_tags = opts.refine(&PathSegment::key("tags"));
        assert_eq!(at_tags.array_mode(), ArrayMode::Set);
        assert!(at_tags.set_keys().is_none());
        let inside = at_tags.refine(&PathSegment::Set);
        assert_eq!(inside.set_keys().unwrap(), ["id"]);
    }

    #[test]
    fn diff_off_scopes_suppression() {
        let opts = DiffOptions::default()
            .with_path_option(Path::from(PathSegment::key("secret")), [DiffOption::DiffOff])
            .unwrap();
        assert!(opts.diffing());
        let inside = opts.refine(&PathSegment::key("secret"));
        assert!(!inside.diffing());
        let deeper = inside.refine(&PathSegment::key("child"));
        assert!(!deeper.diffing());
    }

    #[test]
    fn parse_json_scalars_and_objects() {
        let opts =
            DiffOptions::from_json_str("[\"MULTISET\"]").expect("multiset option should parse");
        assert_eq!(opts.array_mode(), ArrayMode::MultiSet);

        let opts = DiffOptions::from_json_str("[{\"precision\":0.01}]").unwrap();
        assert!((opts.precision() - 0.01).abs() < f64::EPSILON);

        let opts = DiffOptions::from_json_str("[{\"setkeys\":[\"id\",\"name\"]}]").unwrap();
        assert_eq!(opts.set_keys().unwrap(), ["id", "name"]);
    }

    #[test]
    fn parse_json_path_option() {
        let opts = DiffOptions::from_json_str("[{\"@\":[\"tags\"],\"^\":[\"SET\"]}]").unwrap();
        assert_eq!(opts.array_mode(), ArrayMode::List);
        assert_eq!(opts.refine(&PathSegment::key("tags")).array_mode(), ArrayMode::Set);
    }

    #[test]
    fn parse_json_rejects_unknown_names() {
        let err = DiffOptions::from_json_str("[\"FROBNICATE\"]").unwrap_err();
        assert_eq!(err, OptionsError::UnknownOption { name: "FROBNICATE".to_string() });
    }

    #[test]
    fn parse_json_rejects_precision_inside_set_scope() {
        let err =
            DiffOptions::from_json_str("[{\"@\":[\"a\"],\"^\":[\"SET\",{\"precision\":0.1}]}]")
                .unwrap_err();
        assert_eq!(err, OptionsError::PrecisionIncompatible);
    }
}

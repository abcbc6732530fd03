use thiserror::Error;

/// Errors that can occur while canonicalizing external data into [`Node`](crate::Node).
#[derive(Debug, Error)]
pub enum CanonicalizeError {
    /// The provided JSON input was invalid.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The provided YAML input was invalid.
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Encountered a number that cannot be represented as an IEEE-754 f64.
    #[error("number {value} cannot be represented as f64")]
    NumberOutOfRange {
        /// The textual representation of the offending number.
        value: String,
    },
    /// YAML maps may only contain string keys.
    #[error("unsupported YAML key type: {found}")]
    NonStringYamlKey {
        /// A description of the key that triggered the error.
        found: String,
    },
    /// YAML tags have no JSON counterpart and are rejected.
    #[error("unsupported YAML tag: {tag}")]
    UnsupportedYamlTag {
        /// The tag identifier encountered in the document.
        tag: String,
    },
    /// Attempted to construct a [`Number`](crate::Number) that is not finite.
    #[error("non-finite number encountered: {value}")]
    NotFinite {
        /// The offending numeric value.
        value: f64,
    },
}

/// Errors emitted when constructing or parsing [`DiffOptions`](crate::DiffOptions).
#[derive(Debug, Error, PartialEq)]
pub enum OptionsError {
    /// Precision tolerance is incompatible with set or multiset semantics.
    #[error("precision tolerance cannot be combined with set or multiset array modes")]
    PrecisionIncompatible,
    /// Set keys must be non-empty strings.
    #[error("set keys must be non-empty strings")]
    EmptySetKey,
    /// The options JSON could not be decoded.
    #[error("invalid options JSON: {message}")]
    Json {
        /// Decoder error description.
        message: String,
    },
    /// An option entry was not recognized.
    #[error("unrecognized option: {name}")]
    UnknownOption {
        /// The offending option entry, rendered as JSON.
        name: String,
    },
    /// An option carried a value of the wrong shape.
    #[error("invalid value for option {option}: {message}")]
    InvalidValue {
        /// The option whose value was malformed.
        option: String,
        /// What was wrong with it.
        message: String,
    },
}

/// Errors produced while decoding diff documents (native jd text, JSON
/// Patch, or JSON Merge Patch) into a [`Diff`](crate::Diff).
///
/// Native-format errors carry the 1-based line number of the offending
/// line so callers can point at the exact location.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A JSON payload (path, value line, patch document) was invalid.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A structural problem at a specific line of native diff text.
    #[error("line {line}: {message}")]
    Syntax {
        /// 1-based line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },
    /// A path array contained an element that is not a valid path step.
    #[error("invalid path element: {found}")]
    PathElement {
        /// The offending element rendered as JSON.
        found: String,
    },
    /// A diff element violated a structural invariant.
    #[error("invalid diff element: {message}")]
    Shape {
        /// Description of the violated invariant.
        message: String,
    },
    /// A patch or merge document could not be canonicalized.
    #[error(transparent)]
    Canonicalize(#[from] CanonicalizeError),
}

impl ParseError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax { line, message: message.into() }
    }

    pub(crate) fn shape(message: impl Into<String>) -> Self {
        Self::Shape { message: message.into() }
    }
}

/// Errors surfaced by the cancellable diff entry points.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    /// The diff was aborted through its [`CancelToken`](crate::CancelToken).
    #[error("diff cancelled")]
    Cancelled,
}

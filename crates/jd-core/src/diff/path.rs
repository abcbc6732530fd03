use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value as JsonValue;

use crate::{Node, ParseError};

/// Represents a single element within a diff path.
///
/// A segment refers to an object key, an array index, or one of the
/// set/multiset markers used when arrays are interpreted as unordered
/// containers. The keyed variants carry the identity object that selects
/// a specific member of the container.
///
/// ```
/// # use jd_core::diff::PathSegment;
/// let key = PathSegment::key("name");
/// let index = PathSegment::index(2);
/// assert!(matches!(key, PathSegment::Key(_)));
/// assert!(matches!(index, PathSegment::Index(_)));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum PathSegment {
    /// Object key lookup.
    Key(String),
    /// Array index lookup; `-1` addresses the end of the list.
    Index(i64),
    /// Descend into the enclosing array treated as a set.
    Set,
    /// Descend into the enclosing array treated as a multiset.
    Multiset,
    /// Step into the set member whose identity matches the keyed object.
    SetKeys(BTreeMap<String, Node>),
    /// Step into the multiset member whose identity matches the keyed object.
    MultisetKeys(BTreeMap<String, Node>),
}

impl PathSegment {
    /// Creates a key segment.
    #[must_use]
    pub fn key<S>(value: S) -> Self
    where
        S: Into<String>,
    {
        Self::Key(value.into())
    }

    /// Creates an index segment.
    #[must_use]
    pub fn index<I>(value: I) -> Self
    where
        I: Into<i64>,
    {
        Self::Index(value.into())
    }

    /// Indicates whether the segment is a set or multiset marker.
    #[must_use]
    pub fn is_marker(&self) -> bool {
        matches!(self, Self::Set | Self::Multiset | Self::SetKeys(_) | Self::MultisetKeys(_))
    }

    /// Decodes one segment from its JSON encoding.
    ///
    /// Strings are keys, numbers are indexes, `{}` is the set marker,
    /// `[]` the multiset marker, a non-empty object a set identity, and
    /// a single-object array a multiset identity.
    pub fn from_json_value(value: &JsonValue) -> Result<Self, ParseError> {
        match value {
            JsonValue::String(key) => Ok(Self::Key(key.clone())),
            JsonValue::Number(num) => {
                let index = num
                    .as_i64()
                    .or_else(|| num.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                    .ok_or_else(|| ParseError::PathElement { found: value.to_string() })?;
                Ok(Self::Index(index))
            }
            JsonValue::Object(map) if map.is_empty() => Ok(Self::Set),
            JsonValue::Object(map) => {
                let mut keys = BTreeMap::new();
                for (key, value) in map {
                    let node = Node::from_json_value(value.clone())
                        .map_err(|_| ParseError::PathElement { found: value.to_string() })?;
                    keys.insert(key.clone(), node);
                }
                Ok(Self::SetKeys(keys))
            }
            JsonValue::Array(items) if items.is_empty() => Ok(Self::Multiset),
            JsonValue::Array(items) if items.len() == 1 => match Self::from_json_value(&items[0])? {
                Self::Set => Ok(Self::Multiset),
                Self::SetKeys(keys) => Ok(Self::MultisetKeys(keys)),
                _ => Err(ParseError::PathElement { found: value.to_string() }),
            },
            other => Err(ParseError::PathElement { found: other.to_string() }),
        }
    }

    /// Encodes the segment into its JSON representation.
    #[must_use]
    pub fn to_json_value(&self) -> JsonValue {
        match self {
            Self::Key(key) => JsonValue::String(key.clone()),
            Self::Index(index) => JsonValue::Number((*index).into()),
            Self::Set => JsonValue::Object(serde_json::Map::new()),
            Self::Multiset => JsonValue::Array(Vec::new()),
            Self::SetKeys(keys) => keyed_object_to_json(keys),
            Self::MultisetKeys(keys) => JsonValue::Array(vec![keyed_object_to_json(keys)]),
        }
    }
}

fn keyed_object_to_json(keys: &BTreeMap<String, Node>) -> JsonValue {
    let mut map = serde_json::Map::new();
    for (key, node) in keys {
        // Identity objects never contain void.
        map.insert(key.clone(), node.to_json_value().unwrap_or(JsonValue::Null));
    }
    JsonValue::Object(map)
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
            Self::Set => f.write_str("{}"),
            Self::Multiset => f.write_str("[]"),
            Self::SetKeys(_) | Self::MultisetKeys(_) => {
                write!(f, "{}", self.to_json_value())
            }
        }
    }
}

/// Represents the fully qualified location of a diff hunk within a document.
///
/// ```
/// # use jd_core::diff::{Path, PathSegment};
/// let path = Path::new().with_segment(PathSegment::key("foo"))
///     .with_segment(PathSegment::index(0));
/// assert_eq!(path.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path(Vec<PathSegment>);

impl Path {
    /// Creates an empty path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new segment, returning the extended path.
    #[must_use]
    pub fn with_segment(mut self, segment: PathSegment) -> Self {
        self.0.push(segment);
        self
    }

    /// Returns the underlying segments.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Indicates whether the path is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new path with the last segment removed, if any.
    #[must_use]
    pub fn drop_last(&self) -> Self {
        let mut segments = self.0.clone();
        segments.pop();
        Self(segments)
    }

    /// Consumes the path and returns the owned segments.
    #[must_use]
    pub fn into_segments(self) -> Vec<PathSegment> {
        self.0
    }

    /// Pushes a new segment in-place.
    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    /// Pops the last segment off the path.
    pub fn pop(&mut self) -> Option<PathSegment> {
        self.0.pop()
    }

    /// Decodes a path from its JSON array encoding.
    ///
    /// ```
    /// # use jd_core::diff::{Path, PathSegment};
    /// let value: serde_json::Value = serde_json::from_str("[\"a\",{},0]").unwrap();
    /// let path = Path::from_json_value(&value).unwrap();
    /// assert_eq!(path.segments()[1], PathSegment::Set);
    /// ```
    pub fn from_json_value(value: &JsonValue) -> Result<Self, ParseError> {
        let JsonValue::Array(items) = value else {
            return Err(ParseError::PathElement { found: value.to_string() });
        };
        let mut segments = Vec::with_capacity(items.len());
        for item in items {
            segments.push(PathSegment::from_json_value(item)?);
        }
        let path = Self(segments);
        path.validate_markers()?;
        Ok(path)
    }

    /// Decodes a path from JSON array text.
    pub fn from_json_str(input: &str) -> Result<Self, ParseError> {
        let value: JsonValue = serde_json::from_str(input)?;
        Self::from_json_value(&value)
    }

    /// Encodes the path into its JSON array representation.
    #[must_use]
    pub fn to_json_value(&self) -> JsonValue {
        JsonValue::Array(self.0.iter().map(PathSegment::to_json_value).collect())
    }

    // A set marker immediately under a multiset marker (or vice versa)
    // contradicts the container interpretation already declared.
    fn validate_markers(&self) -> Result<(), ParseError> {
        for pair in self.0.windows(2) {
            let conflict = match (&pair[0], &pair[1]) {
                (PathSegment::Multiset, PathSegment::Set | PathSegment::SetKeys(_)) => true,
                (PathSegment::Set, PathSegment::Multiset | PathSegment::MultisetKeys(_)) => true,
                _ => false,
            };
            if conflict {
                return Err(ParseError::shape(format!(
                    "conflicting container markers in path {self}"
                )));
            }
        }
        Ok(())
    }
}

impl From<Vec<PathSegment>> for Path {
    fn from(value: Vec<PathSegment>) -> Self {
        Self(value)
    }
}

impl From<PathSegment> for Path {
    fn from(value: PathSegment) -> Self {
        Self(vec![value])
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, segment) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{segment}")?;
        }
        f.write_str("]")
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathSegment;
    type IntoIter = std::slice::Iter<'a, PathSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Path {
    type Item = PathSegment;
    type IntoIter = std::vec::IntoIter<PathSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Creates a path representing the root of a document.
#[must_use]
pub fn root_path() -> Path {
    Path::new()
}

/// Builds a path from an iterator of segments.
///
/// ```
/// # use jd_core::diff::{path_from_segments, PathSegment};
/// let path = path_from_segments([PathSegment::key("a"), PathSegment::index(1)]);
/// assert_eq!(path.len(), 2);
/// ```
#[must_use]
pub fn path_from_segments<I>(segments: I) -> Path
where
    I: IntoIterator<Item = PathSegment>,
{
    Path(segments.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_for_key_and_index_segments() {
        let path = path_from_segments([PathSegment::key("foo"), PathSegment::index(3)]);
        let json = serde_json::to_string(&path.to_json_value()).unwrap();
        assert_eq!(json, "[\"foo\",3]");
        let decoded = Path::from_json_str(&json).unwrap();
        assert_eq!(decoded, path);
    }

    #[test]
    fn markers_decode_from_json() {
        let path = Path::from_json_str("[\"a\",{}]").unwrap();
        assert_eq!(path.segments()[1], PathSegment::Set);

        let path = Path::from_json_str("[\"a\",[]]").unwrap();
        assert_eq!(path.segments()[1], PathSegment::Multiset);
    }

    #[test]
    fn keyed_markers_round_trip() {
        let path = Path::from_json_str("[{\"id\":\"x\"},\"v\"]").unwrap();
        let PathSegment::SetKeys(keys) = &path.segments()[0] else {
            panic!("expected set-keys segment");
        };
        assert_eq!(keys.get("id"), Some(&Node::String("x".to_string())));
        assert_eq!(serde_json::to_string(&path.to_json_value()).unwrap(), "[{\"id\":\"x\"},\"v\"]");
    }

    #[test]
    fn multiset_keys_decode_from_wrapped_object() {
        let path = Path::from_json_str("[[{\"id\":1}]]").unwrap();
        assert!(matches!(path.segments()[0], PathSegment::MultisetKeys(_)));
    }

    #[test]
    fn conflicting_markers_are_rejected() {
        let err = Path::from_json_str("[[],{}]").unwrap_err();
        assert!(matches!(err, ParseError::Shape { .. }));
    }

    #[test]
    fn fractional_index_is_rejected() {
        let err = Path::from_json_str("[1.5]").unwrap_err();
        assert!(matches!(err, ParseError::PathElement { .. }));
    }
}

//! JSON Merge Patch (RFC 7386) support: the merge diff strategy, the
//! merge patch reader, and the merge patch renderer.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use super::{is_void, Diff, DiffElement, DiffMetadata, Path, PathSegment, RenderError};
use crate::{DiffError, DiffOptions, Node, ParseError};

/// Diffs two nodes under merge patch semantics.
///
/// Objects are recursed into key by key; any other difference is
/// reported as a wholesale assignment of the right-hand value. A void
/// right-hand value encodes deletion of the key.
pub(super) fn diff_merge(
    lhs: &Node,
    rhs: &Node,
    path: &Path,
    options: &DiffOptions,
) -> Result<Diff, DiffError> {
    let mut elements = Vec::new();
    diff_merge_into(lhs, rhs, path, options, &mut elements);
    Ok(Diff::from_elements(elements))
}

fn diff_merge_into(
    lhs: &Node,
    rhs: &Node,
    path: &Path,
    options: &DiffOptions,
    elements: &mut Vec<DiffElement>,
) {
    if let (Node::Object(left), Node::Object(right)) = (lhs, rhs) {
        for (key, value) in left {
            let sub_path = path.clone().with_segment(PathSegment::key(key.clone()));
            let sub_options = options.refine(&PathSegment::key(key.clone()));
            let other = right.get(key).cloned().unwrap_or(Node::Void);
            diff_merge_into(value, &other, &sub_path, &sub_options, elements);
        }
        for (key, value) in right {
            if left.contains_key(key) {
                continue;
            }
            let sub_path = path.clone().with_segment(PathSegment::key(key.clone()));
            let sub_options = options.refine(&PathSegment::key(key.clone()));
            diff_merge_into(&Node::Void, value, &sub_path, &sub_options, elements);
        }
        return;
    }

    if lhs.eq_with_options(rhs, options) || !options.diffing() {
        return;
    }
    // A merge patch cannot express "set to null"; a null assignment
    // below the root reads back as a deletion.
    let value = if matches!(rhs, Node::Null) && !path.is_empty() {
        Node::Void
    } else {
        rhs.clone()
    };
    elements.push(
        DiffElement::new()
            .with_metadata(DiffMetadata::merge())
            .with_path(path.clone())
            .with_add(vec![value]),
    );
}

/// Parses a JSON Merge Patch document into a merge diff.
///
/// Nested objects become one element per leaf; `null` leaves encode
/// deletions. A `null` at the document root is the patch value itself,
/// per RFC 7386 appendix A.
pub(super) fn parse_merge(input: &str) -> Result<Diff, ParseError> {
    let value: JsonValue = serde_json::from_str(input)?;
    let mut elements = Vec::new();
    walk_merge_value(&value, Path::new(), true, &mut elements)?;
    Ok(Diff::from_elements(elements))
}

fn walk_merge_value(
    value: &JsonValue,
    path: Path,
    is_root: bool,
    elements: &mut Vec<DiffElement>,
) -> Result<(), ParseError> {
    match value {
        // The renderer emits {} for an empty diff; reading it back is a no-op.
        JsonValue::Object(map) if map.is_empty() && is_root => Ok(()),
        JsonValue::Object(map) if !map.is_empty() => {
            for (key, value) in map {
                walk_merge_value(
                    value,
                    path.clone().with_segment(PathSegment::key(key.clone())),
                    false,
                    elements,
                )?;
            }
            Ok(())
        }
        JsonValue::Null if !is_root => {
            elements.push(
                DiffElement::new()
                    .with_metadata(DiffMetadata::merge())
                    .with_path(path)
                    .with_add(vec![Node::Void]),
            );
            Ok(())
        }
        other => {
            let node = Node::from_json_value(other.clone())?;
            elements.push(
                DiffElement::new()
                    .with_metadata(DiffMetadata::merge())
                    .with_path(path)
                    .with_add(vec![node]),
            );
            Ok(())
        }
    }
}

/// Renders a merge diff as a JSON Merge Patch document.
///
/// Deletions reappear as `null` values, matching the wire format the
/// reader accepts.
pub(super) fn render_merge(diff: &Diff) -> Result<String, RenderError> {
    if diff.is_empty() {
        return Ok("{}".to_string());
    }

    let mut inherited = DiffMetadata::default();
    let mut document = Node::Void;

    for element in diff.iter() {
        if let Some(metadata) = element.metadata.as_ref() {
            inherited = metadata.clone();
        }
        if !element.is_merge(inherited.merge) {
            return Err(RenderError::new("cannot render non-merge element as merge"));
        }
        if !element.remove.is_empty() || !element.before.is_empty() || !element.after.is_empty() {
            return Err(RenderError::new("cannot render merge element with context or removals"));
        }
        // Deletions appear as explicit nulls in the patch document.
        let value = match element.add.first() {
            Some(value) if !is_void(value) => value.clone(),
            _ => Node::Null,
        };
        document = assign_at(document, element.path.segments(), value)?;
    }

    let value = document
        .to_json_value()
        .ok_or_else(|| RenderError::new("merge patch produced void value"))?;
    Ok(serde_json::to_string(&value)?)
}

fn assign_at(node: Node, path: &[PathSegment], value: Node) -> Result<Node, RenderError> {
    let Some((segment, rest)) = path.split_first() else {
        return Ok(value);
    };
    let PathSegment::Key(key) = segment else {
        return Err(RenderError::new(format!(
            "cannot render merge element at {segment}: expected object key"
        )));
    };
    let mut map = match node {
        Node::Object(map) => map,
        _ => BTreeMap::new(),
    };
    let child = map.remove(key.as_str()).unwrap_or(Node::Void);
    map.insert(key.clone(), assign_at(child, rest, value)?);
    Ok(Node::Object(map))
}

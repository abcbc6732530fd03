//! JSON Patch (RFC 6902) support.
//!
//! The writer lowers diff elements into `test`/`remove`/`add` runs with
//! explicit context tests; the reader folds such runs back into diff
//! elements. Paths addressing sets or multisets have no JSON Pointer
//! representation and are rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{
    is_void, node_to_json_value, Diff, DiffElement, DiffMetadata, Path, PathSegment, RenderError,
};
use crate::{Node, ParseError};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct PatchOperation {
    op: String,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from: Option<String>,
}

impl PatchOperation {
    fn test(path: String, value: JsonValue) -> Self {
        Self { op: "test".to_string(), path, value: Some(value), from: None }
    }

    fn remove(path: String, value: JsonValue) -> Self {
        Self { op: "remove".to_string(), path, value: Some(value), from: None }
    }

    fn add(path: String, value: JsonValue) -> Self {
        Self { op: "add".to_string(), path, value: Some(value), from: None }
    }
}

pub(super) fn render_patch(diff: &Diff) -> Result<String, RenderError> {
    if diff.is_empty() {
        return Ok("[]".to_string());
    }

    let mut operations = Vec::new();

    for element in diff.iter() {
        if element.remove.is_empty() && element.add.is_empty() {
            return Err(RenderError::new("cannot render empty diff element as JSON Patch op"));
        }

        let pointer = path_to_pointer(&element.path)?;

        if element.before.len() > 1 {
            return Err(RenderError::new(format!(
                "only one line of before context supported. got {}",
                element.before.len()
            )));
        }
        if let Some(before) = element.before.first() {
            if !is_void(before) {
                let index = context_index(&element.path)?;
                let mut prev_path = element.path.clone();
                prev_path.pop();
                prev_path.push(PathSegment::Index(index - 1));
                operations.push(PatchOperation::test(
                    path_to_pointer(&prev_path)?,
                    node_to_json_value(before)?,
                ));
            }
        }

        if element.after.len() > 1 {
            return Err(RenderError::new(format!(
                "only one line of after context supported. got {}",
                element.after.len()
            )));
        }
        if let Some(after) = element.after.first() {
            if !is_void(after) {
                let index = context_index(&element.path)?;
                let next_index = index + i64::try_from(element.remove.len()).unwrap_or(0);
                let mut next_path = element.path.clone();
                next_path.pop();
                next_path.push(PathSegment::Index(next_index));
                operations.push(PatchOperation::test(
                    path_to_pointer(&next_path)?,
                    node_to_json_value(after)?,
                ));
            }
        }

        if element.remove.first().map_or(false, |node| is_void(node)) {
            // Merge deletions encode void in remove; nothing to remove here.
        } else {
            for value in &element.remove {
                operations
                    .push(PatchOperation::test(pointer.clone(), node_to_json_value(value)?));
                operations
                    .push(PatchOperation::remove(pointer.clone(), node_to_json_value(value)?));
            }
        }

        for value in element.add.iter().rev() {
            if is_void(value) {
                continue;
            }
            operations.push(PatchOperation::add(pointer.clone(), node_to_json_value(value)?));
        }
    }

    Ok(serde_json::to_string(&operations)?)
}

fn context_index(path: &Path) -> Result<i64, RenderError> {
    let last = path
        .segments()
        .last()
        .ok_or_else(|| RenderError::new("expected path. got empty path"))?;
    let PathSegment::Index(index) = last else {
        return Err(RenderError::new("wanted path index. got object key"));
    };
    Ok(*index)
}

fn path_to_pointer(path: &Path) -> Result<String, RenderError> {
    let mut pointer = String::new();
    for segment in path.segments() {
        pointer.push('/');
        match segment {
            PathSegment::Index(index) => {
                if *index == -1 {
                    pointer.push('-');
                } else {
                    pointer.push_str(&index.to_string());
                }
            }
            PathSegment::Key(key) => {
                if key.parse::<i64>().is_ok() {
                    return Err(RenderError::new(format!(
                        "JSON Pointer does not support object keys that look like numbers: {key}"
                    )));
                }
                if key == "-" {
                    return Err(RenderError::new("JSON Pointer does not support object key '-'"));
                }
                pointer.push_str(&escape_pointer_segment(key));
            }
            PathSegment::Set
            | PathSegment::Multiset
            | PathSegment::SetKeys(_)
            | PathSegment::MultisetKeys(_) => {
                return Err(RenderError::new(
                    "cannot render set or multiset paths as JSON Patch",
                ));
            }
        }
    }
    Ok(pointer)
}

fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Parses a JSON Patch document into a diff.
///
/// Runs of `test` operations followed by `remove`/`add`/`replace`
/// operations at one location fold into a single element; tests at the
/// neighboring indexes become before and after context. A standalone
/// `add` or `replace` at an object path has RFC upsert semantics and
/// becomes a merge element.
pub(super) fn parse_patch(input: &str) -> Result<Diff, ParseError> {
    let operations: Vec<PatchOperation> = serde_json::from_str(input)?;
    let mut elements = Vec::new();
    let mut ops = operations.into_iter().peekable();

    while ops.peek().is_some() {
        let mut tests: Vec<(String, JsonValue)> = Vec::new();
        while ops.peek().map_or(false, |op| op.op == "test") {
            let op = ops.next().expect("peeked test op");
            let value = op
                .value
                .ok_or_else(|| ParseError::shape("test operation requires a value"))?;
            tests.push((op.path, value));
        }

        let Some(main) = ops.next() else {
            return Err(ParseError::shape("expected an operation after test"));
        };

        match main.op.as_str() {
            "remove" | "replace" | "add" => {}
            other => {
                return Err(ParseError::shape(format!("unsupported JSON Patch op: {other}")));
            }
        }

        let location = main.path.clone();
        let mut remove = Vec::new();
        let mut add = Vec::new();
        let mut upsert = false;

        let mut consume = |op: PatchOperation,
                           tests: &mut Vec<(String, JsonValue)>|
         -> Result<(), ParseError> {
            match op.op.as_str() {
                "remove" => {
                    let expected = tests
                        .iter()
                        .position(|(path, _)| *path == op.path)
                        .map(|i| tests.remove(i).1)
                        .or(op.value)
                        .ok_or_else(|| {
                            ParseError::shape("remove requires a test at the same path")
                        })?;
                    remove.push(Node::from_json_value(expected)?);
                }
                "replace" => {
                    let value = op
                        .value
                        .ok_or_else(|| ParseError::shape("replace operation requires a value"))?;
                    match tests.iter().position(|(path, _)| *path == op.path) {
                        Some(i) => remove.push(Node::from_json_value(tests.remove(i).1)?),
                        None => upsert = true,
                    }
                    add.push(Node::from_json_value(value)?);
                }
                "add" => {
                    let value = op
                        .value
                        .ok_or_else(|| ParseError::shape("add operation requires a value"))?;
                    add.push(Node::from_json_value(value)?);
                }
                _ => unreachable!("filtered above"),
            }
            Ok(())
        };

        consume(main, &mut tests)?;
        while ops.peek().map_or(false, |op| op.path == location && op.op != "test") {
            let op = ops.next().expect("peeked op");
            consume(op, &mut tests)?;
        }
        // The writer emits additions in reverse so they apply at a fixed
        // index; restore document order.
        add.reverse();

        let path = pointer_to_path(&location)?;
        let mut element = DiffElement::new().with_path(path.clone());
        element.remove = remove;
        element.add = add;

        let last_index = match path.segments().last() {
            Some(PathSegment::Index(index)) => Some(*index),
            _ => None,
        };
        for (test_path, value) in tests {
            let test_segments = pointer_to_path(&test_path)?;
            let Some(index) = last_index else {
                return Err(ParseError::shape(format!(
                    "unexpected test operation at {test_path}"
                )));
            };
            let Some(PathSegment::Index(test_index)) = test_segments.segments().last() else {
                return Err(ParseError::shape(format!(
                    "unexpected test operation at {test_path}"
                )));
            };
            let node = Node::from_json_value(value)?;
            if *test_index == index - 1 {
                element.before = vec![node];
            } else if *test_index == index + element.remove.len() as i64 {
                element.after = vec![node];
            } else {
                return Err(ParseError::shape(format!(
                    "unexpected test operation at {test_path}"
                )));
            }
        }

        if upsert || (element.remove.is_empty() && last_index.is_none() && element.before.is_empty())
        {
            // Without removal verification an object-path add is an upsert.
            element.metadata = Some(DiffMetadata::merge());
            if element.add.is_empty() {
                return Err(ParseError::shape("upsert requires a value"));
            }
        }

        elements.push(element);
    }

    Ok(Diff::from_elements(elements))
}

fn pointer_to_path(pointer: &str) -> Result<Path, ParseError> {
    if pointer.is_empty() {
        return Ok(Path::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(ParseError::shape(format!("invalid JSON Pointer: {pointer}")));
    };
    let mut path = Path::new();
    for token in rest.split('/') {
        let token = token.replace("~1", "/").replace("~0", "~");
        if token == "-" {
            path.push(PathSegment::Index(-1));
        } else if let Ok(index) = token.parse::<i64>() {
            path.push(PathSegment::Index(index));
        } else {
            path.push(PathSegment::Key(token));
        }
    }
    Ok(path)
}

//! Patch application engine for jd diffs.
//!
//! Applies diff elements in order, verifying removed values and list
//! context before mutating, and recursing through objects, lists, sets,
//! and multisets using strict or merge strategies.

use std::collections::BTreeMap;
use std::fmt;

use crate::{
    diff::{Path, PathSegment},
    hash::HashCode,
    Diff, DiffMetadata, DiffOptions, Node,
};

/// Errors that can occur while applying a diff.
///
/// ```
/// # use jd_core::{DiffOptions, Node};
/// let base = Node::from_json_str("[1,2,3]").unwrap();
/// let target = Node::from_json_str("[1,4,3]").unwrap();
/// let diff = base.diff(&target, &DiffOptions::default());
/// let err = Node::from_json_str("[0,2,3]").unwrap().apply_patch(&diff).unwrap_err();
/// assert_eq!(err.to_string(), "invalid patch. expected 1 before. got 0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchError {
    message: String,
}

impl PatchError {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PatchError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PatchStrategy {
    Strict,
    Merge,
}

impl PatchStrategy {
    fn from_metadata(metadata: Option<&DiffMetadata>) -> Self {
        if metadata.is_some_and(|m| m.merge) {
            Self::Merge
        } else {
            Self::Strict
        }
    }
}

impl fmt::Display for PatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("strict"),
            Self::Merge => f.write_str("merge"),
        }
    }
}

pub(crate) fn apply_patch(node: &Node, diff: &Diff) -> Result<Node, PatchError> {
    let mut current = node.clone();
    let mut inherited_metadata: Option<DiffMetadata> = None;
    for element in diff.iter() {
        if let Some(meta) = element.metadata.as_ref().filter(|metadata| metadata.is_effective()) {
            if let Some(existing) = inherited_metadata.as_mut() {
                existing.absorb(meta);
            } else {
                inherited_metadata = Some(meta.clone());
            }
        }
        let metadata = inherited_metadata.as_ref().filter(|metadata| metadata.is_effective());
        let strategy = PatchStrategy::from_metadata(metadata);
        current = patch_element(
            current,
            Vec::new(),
            element.path.segments(),
            &element.before,
            &element.remove,
            &element.add,
            &element.after,
            strategy,
        )?;
    }
    Ok(current)
}

#[allow(clippy::too_many_arguments)]
fn patch_element(
    node: Node,
    path_behind: Vec<PathSegment>,
    path_ahead: &[PathSegment],
    before: &[Node],
    remove: &[Node],
    add: &[Node],
    after: &[Node],
    strategy: PatchStrategy,
) -> Result<Node, PatchError> {
    if !path_ahead.is_empty() && strategy == PatchStrategy::Merge {
        let (segment, rest) = path_ahead.split_first().unwrap();
        let PathSegment::Key(key) = segment else {
            return Err(expected_collection_error(&node, segment));
        };

        match node {
            Node::Object(mut map) => {
                let existing = map.remove(key).unwrap_or_else(|| {
                    if rest.is_empty() {
                        Node::Void
                    } else {
                        Node::Object(BTreeMap::new())
                    }
                });
                let mut new_path = path_behind.clone();
                new_path.push(PathSegment::Key(key.clone()));
                let patched =
                    patch_element(existing, new_path, rest, before, remove, add, after, strategy)?;
                if !merge_deletes(&patched) {
                    map.insert(key.clone(), patched);
                }
                return Ok(Node::Object(map));
            }
            _other => {
                let seed = if rest.is_empty() { Node::Void } else { Node::Object(BTreeMap::new()) };
                let mut new_path = path_behind.clone();
                new_path.push(PathSegment::Key(key.clone()));
                let patched =
                    patch_element(seed, new_path, rest, before, remove, add, after, strategy)?;
                let mut map = BTreeMap::new();
                if !merge_deletes(&patched) {
                    map.insert(key.clone(), patched);
                }
                return Ok(Node::Object(map));
            }
        }
    }

    match node {
        Node::Array(values) => {
            patch_list(values, path_behind, path_ahead, before, remove, add, after, strategy)
        }
        Node::Object(map) => {
            patch_object(map, path_behind, path_ahead, before, remove, add, after, strategy)
        }
        other => {
            if let Some(segment) = path_ahead.first() {
                return Err(expected_collection_error(&other, segment));
            }
            patch_scalar(other, path_behind, path_ahead, before, remove, add, after, strategy)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn patch_scalar(
    node: Node,
    path_behind: Vec<PathSegment>,
    path_ahead: &[PathSegment],
    _before: &[Node],
    old_values: &[Node],
    new_values: &[Node],
    _after: &[Node],
    strategy: PatchStrategy,
) -> Result<Node, PatchError> {
    if !path_ahead.is_empty() {
        if let Some(segment) = path_ahead.first() {
            return Err(expected_collection_error(&node, segment));
        }
    }
    if old_values.len() > 1 || new_values.len() > 1 {
        return Err(non_set_diff_error(old_values, new_values, &path_behind));
    }
    let old_value = single_value(old_values);
    let new_value = single_value(new_values);
    match strategy {
        PatchStrategy::Merge => {
            if !is_void(&old_value) {
                return Err(PatchError::new(format!(
                    "patch with merge strategy at {} has unnecessary old value {}",
                    path_to_string(&path_behind),
                    node_json(&old_value)
                )));
            }
        }
        PatchStrategy::Strict => {
            if !node_equals(&node, &old_value) {
                return Err(expect_value_error(&old_value, &node, &path_behind));
            }
        }
    }
    Ok(new_value)
}

#[allow(clippy::too_many_arguments)]
fn patch_object(
    mut map: BTreeMap<String, Node>,
    path_behind: Vec<PathSegment>,
    path_ahead: &[PathSegment],
    before: &[Node],
    old_values: &[Node],
    new_values: &[Node],
    after: &[Node],
    strategy: PatchStrategy,
) -> Result<Node, PatchError> {
    if path_ahead.is_empty() {
        if old_values.len() > 1 || new_values.len() > 1 {
            return Err(non_set_diff_error(old_values, new_values, &path_behind));
        }
        let new_value = single_value(new_values);
        if strategy == PatchStrategy::Merge {
            return Ok(new_value);
        }
        let old_value = single_value(old_values);
        if !node_equals(&Node::Object(map.clone()), &old_value) {
            return Err(expect_value_error(&old_value, &Node::Object(map), &path_behind));
        }
        return Ok(new_value);
    }

    let (segment, rest) = path_ahead.split_first().unwrap();
    // JSON Pointer cannot distinguish numeric object keys from list
    // indexes; an index segment reaching an object addresses the key
    // with the same spelling.
    let key = match segment {
        PathSegment::Key(key) => key.clone(),
        PathSegment::Index(index) => index.to_string(),
        other => {
            return Err(PatchError::new(format!(
                "found {} at {}: expected JSON array",
                node_json(&Node::Object(map.clone())),
                Path::from(vec![other.clone()])
            )));
        }
    };

    let mut next = map.get(&key).cloned();
    if next.is_none() {
        next = Some(match strategy {
            PatchStrategy::Merge => {
                if rest.is_empty() {
                    Node::Void
                } else {
                    Node::Object(BTreeMap::new())
                }
            }
            PatchStrategy::Strict => Node::Void,
        });
    }

    let mut new_path = path_behind.clone();
    new_path.push(PathSegment::Key(key.clone()));
    let patched = patch_element(
        next.unwrap(),
        new_path,
        rest,
        before,
        old_values,
        new_values,
        after,
        strategy,
    )?;

    let delete = match strategy {
        PatchStrategy::Merge => merge_deletes(&patched),
        PatchStrategy::Strict => is_void(&patched),
    };
    if delete {
        map.remove(&key);
    } else {
        map.insert(key, patched);
    }
    Ok(Node::Object(map))
}

#[allow(clippy::too_many_arguments)]
fn patch_list(
    list: Vec<Node>,
    path_behind: Vec<PathSegment>,
    path_ahead: &[PathSegment],
    before: &[Node],
    remove: &[Node],
    add: &[Node],
    after: &[Node],
    strategy: PatchStrategy,
) -> Result<Node, PatchError> {
    if strategy == PatchStrategy::Merge {
        return patch_scalar(
            Node::Array(list),
            path_behind,
            path_ahead,
            before,
            remove,
            add,
            after,
            strategy,
        );
    }

    if path_ahead.is_empty() {
        if remove.len() > 1 || add.len() > 1 {
            return Err(PatchError::new("cannot replace list with multiple values"));
        }
        if remove.is_empty() {
            return Err(PatchError::new("invalid diff. must declare list to replace it"));
        }
        let wanted = &remove[0];
        let current = Node::Array(list);
        if !node_equals(&current, wanted) {
            return Err(PatchError::new(format!(
                "wanted {}. found {}",
                node_json(wanted),
                node_json(&current)
            )));
        }
        if add.is_empty() {
            return Ok(Node::Void);
        }
        return Ok(add[0].clone());
    }

    let (segment, rest) = path_ahead.split_first().unwrap();
    match segment {
        PathSegment::Index(raw_index) => patch_list_index(
            list,
            path_behind,
            *raw_index,
            rest,
            before,
            remove,
            add,
            after,
            strategy,
        ),
        PathSegment::Set if rest.is_empty() => patch_set(list, &path_behind, remove, add),
        PathSegment::Multiset if rest.is_empty() => {
            patch_multiset(list, &path_behind, remove, add)
        }
        PathSegment::SetKeys(keyed) | PathSegment::MultisetKeys(keyed) => patch_keyed_member(
            list,
            path_behind,
            keyed,
            rest,
            before,
            remove,
            add,
            after,
            strategy,
        ),
        other => Err(invalid_path_element_error(other)),
    }
}

#[allow(clippy::too_many_arguments)]
fn patch_list_index(
    list: Vec<Node>,
    path_behind: Vec<PathSegment>,
    raw_index: i64,
    rest: &[PathSegment],
    before: &[Node],
    remove: &[Node],
    add: &[Node],
    after: &[Node],
    strategy: PatchStrategy,
) -> Result<Node, PatchError> {
    if !rest.is_empty() {
        let index = if raw_index == -1 { list.len() as i64 - 1 } else { raw_index };
        if index < 0 || (index as usize) >= list.len() {
            return Err(PatchError::new(format!("patch index out of bounds: {raw_index}")));
        }
        let mut new_path = path_behind.clone();
        new_path.push(PathSegment::Index(index));
        let mut list_clone = list.clone();
        let child = list_clone[index as usize].clone();
        let patched = patch_element(child, new_path, rest, before, remove, add, after, strategy)?;
        list_clone[index as usize] = patched;
        return Ok(Node::Array(list_clone));
    }

    // An end-of-list index addresses the last element for removals and
    // the append position for pure additions.
    let insertion_index = if raw_index == -1 {
        if remove.is_empty() {
            list.len()
        } else {
            match list.len().checked_sub(remove.len()) {
                Some(index) => index,
                None => {
                    return Err(PatchError::new(format!(
                        "remove values out bounds: {raw_index}"
                    )));
                }
            }
        }
    } else if raw_index < 0 {
        return Err(PatchError::new(format!("patch index out of bounds: {raw_index}")));
    } else {
        raw_index as usize
    };

    let original = list;

    for (offset, context) in before.iter().enumerate() {
        let distance = before.len() - offset;
        let check_index = (insertion_index as isize) - (distance as isize);
        if check_index < 0 {
            if check_index == -1 && is_void(context) {
                continue;
            }
            return Err(PatchError::new(format!(
                "invalid patch. before context {} out of bounds: {check_index}",
                node_json(context)
            )));
        }
        let check_index = check_index as usize;
        if check_index >= original.len() || !node_equals(&original[check_index], context) {
            let found =
                original.get(check_index).map_or_else(String::new, node_json);
            return Err(PatchError::new(format!(
                "invalid patch. expected {} before. got {}",
                node_json(context),
                found
            )));
        }
    }

    let mut working = original.clone();
    if !remove.is_empty() {
        if insertion_index >= working.len() {
            return Err(PatchError::new(format!("remove values out bounds: {raw_index}")));
        }
        for expected in remove {
            if insertion_index >= working.len()
                || !node_equals(&working[insertion_index], expected)
            {
                let found =
                    working.get(insertion_index).map_or_else(String::new, node_json);
                return Err(PatchError::new(format!(
                    "invalid patch. wanted {}. found {}",
                    node_json(expected),
                    found
                )));
            }
            working.remove(insertion_index);
        }
    }

    if insertion_index > working.len() {
        return Err(PatchError::new(format!("remove values out bounds: {raw_index}")));
    }

    let mut result = Vec::with_capacity(working.len() + add.len());
    result.extend(working.iter().take(insertion_index).cloned());
    result.extend(add.iter().cloned());
    result.extend(working.iter().skip(insertion_index).cloned());

    for (offset, context) in after.iter().enumerate() {
        let check_index = insertion_index + offset;
        if check_index >= working.len() {
            if check_index == working.len() && is_void(context) {
                continue;
            }
            return Err(PatchError::new(format!(
                "invalid patch. after context {} out of bounds: {check_index}",
                node_json(context)
            )));
        }
        if !node_equals(&working[check_index], context) {
            return Err(PatchError::new(format!(
                "invalid patch. expected {} after. got {}",
                node_json(context),
                node_json(&working[check_index])
            )));
        }
    }

    Ok(Node::Array(result))
}

/// Applies a set hunk: removals must be present, additions are
/// deduplicated, and the result is ordered by structural hash.
fn patch_set(
    list: Vec<Node>,
    path_behind: &[PathSegment],
    remove: &[Node],
    add: &[Node],
) -> Result<Node, PatchError> {
    let options = DiffOptions::default();
    let mut members: BTreeMap<HashCode, Node> = BTreeMap::new();
    for node in list {
        let hash = node.hash_code(&options);
        members.entry(hash).or_insert(node);
    }

    for expected in remove {
        let hash = expected.hash_code(&options);
        if members.remove(&hash).is_none() {
            return Err(PatchError::new(format!(
                "invalid diff. expected set member {} at {}. found none",
                node_json(expected),
                path_to_string(path_behind)
            )));
        }
    }
    for value in add {
        members.entry(value.hash_code(&options)).or_insert_with(|| value.clone());
    }

    Ok(Node::Array(members.into_values().collect()))
}

/// Applies a multiset hunk: each removal consumes one occurrence, and
/// additions append to the end of the list.
fn patch_multiset(
    list: Vec<Node>,
    path_behind: &[PathSegment],
    remove: &[Node],
    add: &[Node],
) -> Result<Node, PatchError> {
    let options = DiffOptions::default();
    let mut working = list;

    for expected in remove {
        let hash = expected.hash_code(&options);
        let position = working.iter().position(|node| node.hash_code(&options) == hash);
        let Some(position) = position else {
            return Err(PatchError::new(format!(
                "invalid diff. expected multiset member {} at {}. found none",
                node_json(expected),
                path_to_string(path_behind)
            )));
        };
        working.remove(position);
    }
    working.extend(add.iter().cloned());

    Ok(Node::Array(working))
}

/// Steps into the set or multiset member selected by an identity
/// object, patching it in place.
#[allow(clippy::too_many_arguments)]
fn patch_keyed_member(
    list: Vec<Node>,
    path_behind: Vec<PathSegment>,
    keyed: &BTreeMap<String, Node>,
    rest: &[PathSegment],
    before: &[Node],
    remove: &[Node],
    add: &[Node],
    after: &[Node],
    strategy: PatchStrategy,
) -> Result<Node, PatchError> {
    let position = list.iter().position(|node| matches_identity(node, keyed));
    let Some(position) = position else {
        return Err(PatchError::new(format!(
            "invalid diff. no member matches identity {} at {}",
            node_json(&Node::Object(keyed.clone())),
            path_to_string(&path_behind)
        )));
    };

    let mut new_path = path_behind;
    new_path.push(PathSegment::SetKeys(keyed.clone()));
    let mut working = list;
    let child = working[position].clone();
    let patched = patch_element(child, new_path, rest, before, remove, add, after, strategy)?;
    if is_void(&patched) {
        working.remove(position);
    } else {
        working[position] = patched;
    }
    Ok(Node::Array(working))
}

fn matches_identity(node: &Node, keyed: &BTreeMap<String, Node>) -> bool {
    let Node::Object(map) = node else {
        return false;
    };
    keyed.iter().all(|(key, value)| map.get(key) == Some(value))
}

fn non_set_diff_error(
    old_values: &[Node],
    _new_values: &[Node],
    path: &[PathSegment],
) -> PatchError {
    if old_values.len() > 1 {
        return PatchError::new(format!(
            "invalid diff: multiple removals from non-set at {}",
            path_to_string(path)
        ));
    }
    PatchError::new(format!(
        "invalid diff: multiple additions to a non-set at {}",
        path_to_string(path)
    ))
}

fn expect_value_error(expected: &Node, found: &Node, path: &[PathSegment]) -> PatchError {
    PatchError::new(format!(
        "found {} at {}: expected {}",
        node_json(found),
        path_to_string(path),
        node_json(expected)
    ))
}

fn expected_collection_error(node: &Node, segment: &PathSegment) -> PatchError {
    let expected = match segment {
        PathSegment::Key(_) => "JSON object",
        _ => "JSON array",
    };
    PatchError::new(format!("found {} at {segment}: expected {expected}", node_json(node)))
}

fn invalid_path_element_error(segment: &PathSegment) -> PatchError {
    PatchError::new(format!("invalid path element {segment}: expected list index"))
}

fn single_value(values: &[Node]) -> Node {
    values.first().cloned().unwrap_or(Node::Void)
}

fn is_void(node: &Node) -> bool {
    matches!(node, Node::Void)
}

// A merge patch cannot express "set to null"; below the document
// root a null assignment deletes the key, per RFC 7386.
fn merge_deletes(node: &Node) -> bool {
    matches!(node, Node::Void | Node::Null)
}

fn node_equals(lhs: &Node, rhs: &Node) -> bool {
    lhs == rhs
}

fn node_json(node: &Node) -> String {
    match node {
        Node::Void => String::new(),
        Node::Number(number) => {
            let value = number.get();
            if value.fract() == 0.0 {
                format!("{value:.0}")
            } else {
                serde_json::Number::from_f64(value).map(|n| n.to_string()).unwrap_or_default()
            }
        }
        _ => match node.to_json_value() {
            Some(value) => serde_json::to_string(&value).unwrap_or_default(),
            None => String::new(),
        },
    }
}

fn path_to_string(path: &[PathSegment]) -> String {
    Path::from(path.to_vec()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArrayMode, Diff};

    #[test]
    fn node_json_void() {
        assert_eq!(node_json(&Node::Void), "");
    }

    #[test]
    fn node_json_number_is_minimal() {
        let node = Node::from_json_str("1").unwrap();
        assert_eq!(node_json(&node), "1");
    }

    #[test]
    fn failed_context_check_leaves_no_partial_result() {
        let base = Node::from_json_str("[1,2,3]").unwrap();
        let target = Node::from_json_str("[1,4,3]").unwrap();
        let diff = base.diff(&target, &DiffOptions::default());
        let unrelated = Node::from_json_str("[9,9,9]").unwrap();
        assert!(unrelated.apply_patch(&diff).is_err());
        assert_eq!(unrelated, Node::from_json_str("[9,9,9]").unwrap());
    }

    #[test]
    fn set_patch_applies_regardless_of_order() {
        let base = Node::from_json_str("[3,1,2]").unwrap();
        let lhs = Node::from_json_str("[1,2,3]").unwrap();
        let rhs = Node::from_json_str("[1,2,4]").unwrap();
        let opts = DiffOptions::default().with_array_mode(ArrayMode::Set).unwrap();
        let diff = lhs.diff(&rhs, &opts);
        let patched = base.apply_patch(&diff).unwrap();
        assert!(patched.eq_with_options(&rhs, &opts));
    }

    #[test]
    fn set_patch_rejects_missing_member() {
        let lhs = Node::from_json_str("[1,2]").unwrap();
        let rhs = Node::from_json_str("[2]").unwrap();
        let opts = DiffOptions::default().with_array_mode(ArrayMode::Set).unwrap();
        let diff = lhs.diff(&rhs, &opts);
        let base = Node::from_json_str("[2,3]").unwrap();
        assert!(base.apply_patch(&diff).is_err());
    }

    #[test]
    fn multiset_patch_consumes_one_occurrence_per_removal() {
        let lhs = Node::from_json_str("[1,1,2]").unwrap();
        let rhs = Node::from_json_str("[1,2]").unwrap();
        let opts = DiffOptions::default().with_array_mode(ArrayMode::MultiSet).unwrap();
        let diff = lhs.diff(&rhs, &opts);
        let base = Node::from_json_str("[1,1,2]").unwrap();
        let patched = base.apply_patch(&diff).unwrap();
        assert!(patched.eq_with_options(&rhs, &opts));
    }

    #[test]
    fn keyed_member_patch_updates_in_place() {
        let lhs = Node::from_json_str("[{\"id\":1,\"v\":1},{\"id\":2,\"v\":2}]").unwrap();
        let rhs = Node::from_json_str("[{\"id\":1,\"v\":9},{\"id\":2,\"v\":2}]").unwrap();
        let opts = DiffOptions::default().with_set_keys(["id"]).unwrap();
        let diff = lhs.diff(&rhs, &opts);
        // The member order of the base document is preserved.
        let base = Node::from_json_str("[{\"id\":2,\"v\":2},{\"id\":1,\"v\":1}]").unwrap();
        let patched = base.apply_patch(&diff).unwrap();
        let expected = Node::from_json_str("[{\"id\":2,\"v\":2},{\"id\":1,\"v\":9}]").unwrap();
        assert_eq!(patched, expected);
    }

    #[test]
    fn end_of_list_index_removes_last_element() {
        let diff = Diff::from_native_str("@ [-1]\n- 3\n").unwrap();
        let base = Node::from_json_str("[1,2,3]").unwrap();
        assert_eq!(base.apply_patch(&diff).unwrap(), Node::from_json_str("[1,2]").unwrap());
    }

    #[test]
    fn end_of_list_index_appends() {
        let diff = Diff::from_native_str("@ [-1]\n+ 4\n").unwrap();
        let base = Node::from_json_str("[1,2,3]").unwrap();
        assert_eq!(base.apply_patch(&diff).unwrap(), Node::from_json_str("[1,2,3,4]").unwrap());
    }

    #[test]
    fn numeric_index_against_object_addresses_spelled_key() {
        let diff = Diff::from_native_str("@ [1]\n- \"a\"\n+ \"b\"\n").unwrap();
        let base = Node::from_json_str("{\"1\":\"a\"}").unwrap();
        assert_eq!(
            base.apply_patch(&diff).unwrap(),
            Node::from_json_str("{\"1\":\"b\"}").unwrap()
        );
    }
}

use std::collections::BTreeMap;

use super::{diff_impl, CancelToken, Diff, DiffElement, Path, PathSegment};
use crate::hash::HashCode;
use crate::{DiffError, DiffOptions, Node};

/// Diffs two arrays interpreted as sets.
///
/// Members are bucketed by identity hash; duplicates within one side
/// collapse. Members present on only one side are reported in a single
/// hunk addressed with the set marker. Members present on both sides
/// under the same identity but with different content (possible only
/// with identity keys configured) are diffed recursively through a
/// keyed path segment.
pub(super) fn diff_sets(
    lhs: &[Node],
    rhs: &[Node],
    path: &Path,
    options: &DiffOptions,
    token: &CancelToken,
) -> Result<Diff, DiffError> {
    let element_options = options.refine(&PathSegment::Set);

    let lhs_members = bucket_by_ident(lhs, &element_options);
    let rhs_members = bucket_by_ident(rhs, &element_options);

    let mut remove = Vec::new();
    let mut add = Vec::new();
    let mut shared = Vec::new();

    for (ident, node) in &lhs_members {
        match rhs_members.get(ident) {
            Some(other) => shared.push((*node, *other)),
            None => remove.push((*node).clone()),
        }
    }
    for (ident, node) in &rhs_members {
        if !lhs_members.contains_key(ident) {
            add.push((*node).clone());
        }
    }

    let mut elements = Vec::new();
    if (!remove.is_empty() || !add.is_empty()) && options.diffing() {
        elements.push(
            DiffElement::new()
                .with_path(path.clone().with_segment(PathSegment::Set))
                .with_remove(remove)
                .with_add(add),
        );
    }

    for (lhs_node, rhs_node) in shared {
        let Some(keyed) = identity_object(lhs_node, &element_options) else {
            continue;
        };
        let sub_path = path.clone().with_segment(PathSegment::SetKeys(keyed));
        let sub = diff_impl(lhs_node, rhs_node, &sub_path, &element_options, token)?;
        elements.extend(sub.into_iter());
    }

    Ok(Diff::from_elements(elements))
}

fn bucket_by_ident<'a>(
    nodes: &'a [Node],
    options: &DiffOptions,
) -> BTreeMap<HashCode, &'a Node> {
    let mut members = BTreeMap::new();
    for node in nodes {
        // First occurrence wins; later duplicates collapse.
        members.entry(node.ident_code(options)).or_insert(node);
    }
    members
}

/// Restricts a set member to its identity keys, yielding the keyed
/// object used to address it in diff paths. Returns `None` when no
/// identity keys are configured or the member carries none of them.
fn identity_object(node: &Node, options: &DiffOptions) -> Option<BTreeMap<String, Node>> {
    let keys = options.set_keys()?;
    let Node::Object(map) = node else {
        return None;
    };
    let mut keyed = BTreeMap::new();
    for key in keys {
        if let Some(value) = map.get(key) {
            keyed.insert(key.clone(), value.clone());
        }
    }
    if keyed.is_empty() {
        None
    } else {
        Some(keyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArrayMode, DiffOptions, RenderConfig};

    #[test]
    fn set_diff_reports_symmetric_difference_in_one_hunk() {
        let lhs = Node::from_json_str("[1,2,3]").unwrap();
        let rhs = Node::from_json_str("[3,4,1]").unwrap();
        let opts = DiffOptions::default().with_array_mode(ArrayMode::Set).unwrap();
        let diff = lhs.diff(&rhs, &opts);
        assert_eq!(diff.len(), 1);
        let element = diff.into_elements().remove(0);
        assert_eq!(element.path, Path::from(PathSegment::Set));
        assert_eq!(element.remove, vec![Node::from_json_str("2").unwrap()]);
        assert_eq!(element.add, vec![Node::from_json_str("4").unwrap()]);
    }

    #[test]
    fn set_diff_ignores_duplicates_and_order() {
        let lhs = Node::from_json_str("[1,1,2]").unwrap();
        let rhs = Node::from_json_str("[2,1]").unwrap();
        let opts = DiffOptions::default().with_array_mode(ArrayMode::Set).unwrap();
        assert!(lhs.diff(&rhs, &opts).is_empty());
    }

    #[test]
    fn set_keys_pair_members_and_diff_their_bodies() {
        let lhs = Node::from_json_str("[{\"id\":1,\"v\":\"a\"},{\"id\":2,\"v\":\"b\"}]").unwrap();
        let rhs = Node::from_json_str("[{\"id\":2,\"v\":\"b\"},{\"id\":1,\"v\":\"c\"}]").unwrap();
        let opts = DiffOptions::default().with_set_keys(["id"]).unwrap();
        let diff = lhs.diff(&rhs, &opts);
        assert_eq!(diff.len(), 1);
        let element = diff.into_elements().remove(0);
        let mut keyed = BTreeMap::new();
        keyed.insert("id".to_string(), Node::from_json_str("1").unwrap());
        assert_eq!(
            element.path,
            Path::from(vec![PathSegment::SetKeys(keyed), PathSegment::key("v")])
        );
        assert_eq!(element.remove, vec![Node::from_json_str("\"a\"").unwrap()]);
        assert_eq!(element.add, vec![Node::from_json_str("\"c\"").unwrap()]);
    }

    #[test]
    fn set_hunk_renders_with_set_marker_path() {
        let lhs = Node::from_json_str("{\"tags\":[\"a\"]}").unwrap();
        let rhs = Node::from_json_str("{\"tags\":[\"b\"]}").unwrap();
        let opts = DiffOptions::default().with_array_mode(ArrayMode::Set).unwrap();
        let rendered = lhs.diff(&rhs, &opts).render(&RenderConfig::default());
        assert_eq!(rendered, "@ [\"tags\",{}]\n- \"a\"\n+ \"b\"\n");
    }
}

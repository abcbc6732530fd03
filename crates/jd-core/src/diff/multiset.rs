use std::collections::BTreeMap;

use super::{CancelToken, Diff, DiffElement, Path, PathSegment};
use crate::hash::HashCode;
use crate::{DiffError, DiffOptions, Node};

/// Diffs two arrays interpreted as multisets.
///
/// Members are counted by structural hash. The surplus on the left
/// becomes removals, the surplus on the right additions, all reported
/// in a single hunk addressed with the multiset marker.
pub(super) fn diff_multisets(
    lhs: &[Node],
    rhs: &[Node],
    path: &Path,
    options: &DiffOptions,
    token: &CancelToken,
) -> Result<Diff, DiffError> {
    token.check()?;
    let element_options = options.refine(&PathSegment::Multiset);

    let lhs_counts = count_by_hash(lhs, &element_options);
    let rhs_counts = count_by_hash(rhs, &element_options);

    let mut remove = Vec::new();
    let mut add = Vec::new();

    for (hash, (count, node)) in &lhs_counts {
        let other = rhs_counts.get(hash).map_or(0, |(count, _)| *count);
        for _ in other..*count {
            remove.push((*node).clone());
        }
    }
    for (hash, (count, node)) in &rhs_counts {
        let other = lhs_counts.get(hash).map_or(0, |(count, _)| *count);
        for _ in other..*count {
            add.push((*node).clone());
        }
    }

    if remove.is_empty() && add.is_empty() || !options.diffing() {
        return Ok(Diff::empty());
    }

    Ok(Diff::from_elements(vec![DiffElement::new()
        .with_path(path.clone().with_segment(PathSegment::Multiset))
        .with_remove(remove)
        .with_add(add)]))
}

fn count_by_hash<'a>(
    nodes: &'a [Node],
    options: &DiffOptions,
) -> BTreeMap<HashCode, (usize, &'a Node)> {
    let mut counts: BTreeMap<HashCode, (usize, &'a Node)> = BTreeMap::new();
    for node in nodes {
        counts.entry(node.hash_code(options)).or_insert((0, node)).0 += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArrayMode, DiffOptions, RenderConfig};

    fn multiset_opts() -> DiffOptions {
        DiffOptions::default().with_array_mode(ArrayMode::MultiSet).unwrap()
    }

    #[test]
    fn multiset_diff_tracks_multiplicity() {
        let lhs = Node::from_json_str("[1,1,2]").unwrap();
        let rhs = Node::from_json_str("[1,2,2]").unwrap();
        let diff = lhs.diff(&rhs, &multiset_opts());
        assert_eq!(diff.len(), 1);
        let element = diff.into_elements().remove(0);
        assert_eq!(element.path, Path::from(PathSegment::Multiset));
        assert_eq!(element.remove, vec![Node::from_json_str("1").unwrap()]);
        assert_eq!(element.add, vec![Node::from_json_str("2").unwrap()]);
    }

    #[test]
    fn multiset_diff_ignores_order() {
        let lhs = Node::from_json_str("[1,2,2,3]").unwrap();
        let rhs = Node::from_json_str("[3,2,1,2]").unwrap();
        assert!(lhs.diff(&rhs, &multiset_opts()).is_empty());
    }

    #[test]
    fn multiset_hunk_renders_with_multiset_marker_path() {
        let lhs = Node::from_json_str("{\"bag\":[1,1]}").unwrap();
        let rhs = Node::from_json_str("{\"bag\":[1]}").unwrap();
        let rendered = lhs.diff(&rhs, &multiset_opts()).render(&RenderConfig::default());
        assert_eq!(rendered, "@ [\"bag\",[]]\n- 1\n");
    }
}

use super::{Diff, DiffElement, Path};
use crate::{DiffOptions, Node};

/// Produces a replacement diff element for non-container nodes, or for
/// container nodes of differing kinds.
pub(super) fn diff_primitives(lhs: &Node, rhs: &Node, path: &Path, options: &DiffOptions) -> Diff {
    if lhs.eq_with_options(rhs, options) || !options.diffing() {
        return Diff::empty();
    }
    let mut element = DiffElement::new().with_path(path.clone());
    if !matches!(lhs, Node::Void) {
        element.remove.push(lhs.clone());
    }
    if !matches!(rhs, Node::Void) {
        element.add.push(rhs.clone());
    }
    Diff::from_elements(vec![element])
}

use std::collections::BTreeMap;

use super::{diff_impl, CancelToken, Diff, DiffElement, Path, PathSegment};
use crate::{DiffError, DiffOptions, Node};

pub(super) fn diff_objects(
    lhs: &BTreeMap<String, Node>,
    rhs: &BTreeMap<String, Node>,
    path: &Path,
    options: &DiffOptions,
    token: &CancelToken,
) -> Result<Diff, DiffError> {
    let mut elements = Vec::new();

    for (key, value) in lhs {
        let sub_path = path.clone().with_segment(PathSegment::key(key.clone()));
        let sub_options = options.refine(&PathSegment::key(key.clone()));
        if let Some(other) = rhs.get(key) {
            let diff = diff_impl(value, other, &sub_path, &sub_options, token)?;
            elements.extend(diff.into_iter());
        } else if sub_options.diffing() {
            elements.push(DiffElement::new().with_path(sub_path).with_remove(vec![value.clone()]));
        }
    }

    for (key, value) in rhs {
        if lhs.contains_key(key) {
            continue;
        }
        let sub_options = options.refine(&PathSegment::key(key.clone()));
        if sub_options.diffing() {
            elements.push(
                DiffElement::new()
                    .with_path(path.clone().with_segment(PathSegment::key(key.clone())))
                    .with_add(vec![value.clone()]),
            );
        }
    }

    Ok(Diff::from_elements(elements))
}

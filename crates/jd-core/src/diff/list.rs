use super::{diff_impl, CancelToken, Diff, DiffElement, Path, PathSegment};
use crate::hash::HashCode;
use crate::{DiffError, DiffOptions, Node};

/// Diffs two arrays interpreted as ordered lists.
///
/// Elements are aligned by a longest common subsequence over their
/// structural hashes. Unmatched stretches between anchors are folded
/// into hunks that carry one line of before and after context; paired
/// containers inside a stretch are recursed into instead of being
/// replaced wholesale.
pub(super) fn diff_lists(
    lhs: &[Node],
    rhs: &[Node],
    path: &Path,
    options: &DiffOptions,
    token: &CancelToken,
) -> Result<Diff, DiffError> {
    let lhs_hashes: Vec<HashCode> = lhs
        .iter()
        .enumerate()
        .map(|(i, node)| node.hash_code(&options.refine(&PathSegment::index(i as i64))))
        .collect();
    let rhs_hashes: Vec<HashCode> = rhs
        .iter()
        .enumerate()
        .map(|(i, node)| node.hash_code(&options.refine(&PathSegment::index(i as i64))))
        .collect();

    let events = lcs_events(&lhs_hashes, &rhs_hashes, token)?;
    let ops = pair_gaps(&events, lhs, rhs);

    let mut elements = Vec::new();
    // Position in the partially patched document; hunks apply in order,
    // so the prefix below the cursor already matches the target.
    let mut position: i64 = 0;
    // Patched value preceding the cursor; void at the start of the list.
    let mut last = Node::Void;
    let mut pending: Option<Pending> = None;

    for op in ops {
        match op {
            Op::Delete { l } => {
                pending
                    .get_or_insert_with(|| Pending::at(position, last.clone()))
                    .remove
                    .push(lhs[l].clone());
            }
            Op::Insert { r } => {
                pending
                    .get_or_insert_with(|| Pending::at(position, last.clone()))
                    .add
                    .push(rhs[r].clone());
            }
            Op::Replace { l, r } => {
                let slot = pending.get_or_insert_with(|| Pending::at(position, last.clone()));
                slot.remove.push(lhs[l].clone());
                slot.add.push(rhs[r].clone());
            }
            Op::Keep { l } => {
                flush(&mut pending, &lhs[l], path, options, &mut elements, &mut position);
                last = lhs[l].clone();
                position += 1;
            }
            Op::Recurse { l, r } => {
                flush(&mut pending, &lhs[l], path, options, &mut elements, &mut position);
                let sub_path = path.clone().with_segment(PathSegment::index(position));
                let sub_options = options.refine(&PathSegment::index(position));
                let sub = diff_impl(&lhs[l], &rhs[r], &sub_path, &sub_options, token)?;
                elements.extend(sub.into_iter());
                last = rhs[r].clone();
                position += 1;
            }
        }
    }
    flush(&mut pending, &Node::Void, path, options, &mut elements, &mut position);

    Ok(Diff::from_elements(elements))
}

struct Pending {
    position: i64,
    before: Node,
    remove: Vec<Node>,
    add: Vec<Node>,
}

impl Pending {
    fn at(position: i64, before: Node) -> Self {
        Self { position, before, remove: Vec::new(), add: Vec::new() }
    }
}

fn flush(
    pending: &mut Option<Pending>,
    after: &Node,
    path: &Path,
    options: &DiffOptions,
    elements: &mut Vec<DiffElement>,
    position: &mut i64,
) {
    let Some(hunk) = pending.take() else {
        return;
    };
    *position = hunk.position + hunk.add.len() as i64;
    if !options.diffing() {
        return;
    }
    elements.push(
        DiffElement::new()
            .with_path(path.clone().with_segment(PathSegment::index(hunk.position)))
            .with_before(vec![hunk.before])
            .with_remove(hunk.remove)
            .with_add(hunk.add)
            .with_after(vec![after.clone()]),
    );
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Event {
    Keep { l: usize },
    Delete { l: usize },
    Insert { r: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Keep { l: usize },
    Delete { l: usize },
    Insert { r: usize },
    Replace { l: usize, r: usize },
    Recurse { l: usize, r: usize },
}

/// Pairs the k-th deletion with the k-th insertion inside each stretch
/// between common anchors. Pairs of like containers become recursions,
/// other pairs become replacements, and leftovers stay deletions or
/// insertions.
fn pair_gaps(events: &[Event], lhs: &[Node], rhs: &[Node]) -> Vec<Op> {
    let mut ops = Vec::with_capacity(events.len());
    let mut deletes: Vec<usize> = Vec::new();
    let mut inserts: Vec<usize> = Vec::new();

    let mut close_gap = |ops: &mut Vec<Op>, deletes: &mut Vec<usize>, inserts: &mut Vec<usize>| {
        let paired = deletes.len().min(inserts.len());
        for k in 0..paired {
            let (l, r) = (deletes[k], inserts[k]);
            if same_container_type(&lhs[l], &rhs[r]) {
                ops.push(Op::Recurse { l, r });
            } else {
                ops.push(Op::Replace { l, r });
            }
        }
        for &l in &deletes[paired..] {
            ops.push(Op::Delete { l });
        }
        for &r in &inserts[paired..] {
            ops.push(Op::Insert { r });
        }
        deletes.clear();
        inserts.clear();
    };

    for event in events {
        match event {
            Event::Delete { l } => deletes.push(*l),
            Event::Insert { r } => inserts.push(*r),
            Event::Keep { l } => {
                close_gap(&mut ops, &mut deletes, &mut inserts);
                ops.push(Op::Keep { l: *l });
            }
        }
    }
    close_gap(&mut ops, &mut deletes, &mut inserts);
    ops
}

fn same_container_type(lhs: &Node, rhs: &Node) -> bool {
    matches!(lhs, Node::Object(_)) && matches!(rhs, Node::Object(_))
        || matches!(lhs, Node::Array(_)) && matches!(rhs, Node::Array(_))
}

/// Produces the edit script aligning `lhs` with `rhs`.
///
/// The cancel token is polled once per dynamic-programming row.
fn lcs_events(
    lhs: &[HashCode],
    rhs: &[HashCode],
    token: &CancelToken,
) -> Result<Vec<Event>, DiffError> {
    let n = lhs.len();
    let m = rhs.len();
    let mut table = vec![vec![0usize; m + 1]; n + 1];
    for (i, lhs_hash) in lhs.iter().enumerate() {
        token.check()?;
        for (j, rhs_hash) in rhs.iter().enumerate() {
            if lhs_hash == rhs_hash {
                table[i + 1][j + 1] = table[i][j] + 1;
            } else {
                table[i + 1][j + 1] = table[i][j + 1].max(table[i + 1][j]);
            }
        }
    }

    let mut events = Vec::with_capacity(n + m);
    let mut i = n;
    let mut j = m;
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && lhs[i - 1] == rhs[j - 1] {
            events.push(Event::Keep { l: i - 1 });
            i -= 1;
            j -= 1;
        } else if j == 0 || (i > 0 && table[i - 1][j] >= table[i][j - 1]) {
            events.push(Event::Delete { l: i - 1 });
            i -= 1;
        } else {
            events.push(Event::Insert { r: j - 1 });
            j -= 1;
        }
    }
    events.reverse();
    Ok(events)
}

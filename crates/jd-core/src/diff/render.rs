//! Text rendering for the native jd diff format.

use super::{is_void, node_to_json_value, Diff, DiffElement, DiffMetadata, RenderConfig};
use crate::Node;

const COLOR_RESET: &str = "\u{1b}[0m";
const COLOR_RED: &str = "\u{1b}[31m";
const COLOR_GREEN: &str = "\u{1b}[32m";

pub(super) fn render_native(diff: &Diff, config: &RenderConfig) -> String {
    let mut output = String::new();
    if let Some(file) = config.file() {
        let name = serde_json::Value::String(file.to_string());
        output.push_str(&format!("^ {{\"File\":{name}}}\n"));
    }

    let mut inherited = DiffMetadata::default();
    let mut rendered = DiffMetadata::default();
    for element in diff.iter() {
        if let Some(metadata) = element.metadata.as_ref() {
            inherited = metadata.clone();
        }
        // The parser rejects elements that change nothing; do not
        // render one.
        if element.remove.is_empty() && element.add.is_empty() {
            continue;
        }
        if inherited != rendered {
            output.push_str(&inherited.render_header());
            rendered = inherited.clone();
        }
        output.push_str(&render_element(element, config, inherited.merge));
    }
    output
}

fn render_element(element: &DiffElement, config: &RenderConfig, is_merge: bool) -> String {
    let mut output = String::new();
    output.push_str("@ ");
    output.push_str(&serde_json::to_string(&element.path.to_json_value()).expect("serialize path"));
    output.push('\n');

    struct SingleStringDiff<'a> {
        common: Vec<char>,
        old: &'a str,
        new: &'a str,
    }

    let string_diff = if element.remove.len() == 1 && element.add.len() == 1 {
        match (&element.remove[0], &element.add[0]) {
            (Node::String(old), Node::String(new)) => {
                Some(SingleStringDiff { common: lcs_chars(old, new), old, new })
            }
            _ => None,
        }
    } else {
        None
    };

    for before in &element.before {
        if is_void(before) {
            output.push_str("[\n");
        } else {
            output.push_str("  ");
            output.push_str(&node_to_json(before));
            output.push('\n');
        }
    }

    for value in &element.remove {
        if is_void(value) {
            continue;
        }
        if let Some(diff) = &string_diff {
            if config.color_enabled() {
                output.push_str("- \"");
                output.push_str(&color_string_diff(diff.old, &diff.common, COLOR_RED));
                output.push_str("\"\n");
                continue;
            }
        }
        if config.color_enabled() {
            output.push_str(COLOR_RED);
        }
        output.push_str("- ");
        output.push_str(&node_to_json(value));
        output.push('\n');
        if config.color_enabled() {
            output.push_str(COLOR_RESET);
        }
    }

    for value in &element.add {
        if is_void(value) {
            if is_merge {
                if config.color_enabled() {
                    output.push_str(COLOR_GREEN);
                }
                output.push_str("+\n");
                if config.color_enabled() {
                    output.push_str(COLOR_RESET);
                }
            }
            continue;
        }
        if let Some(diff) = &string_diff {
            if config.color_enabled() {
                output.push_str("+ \"");
                output.push_str(&color_string_diff(diff.new, &diff.common, COLOR_GREEN));
                output.push_str("\"\n");
                continue;
            }
        }
        if config.color_enabled() {
            output.push_str(COLOR_GREEN);
        }
        output.push_str("+ ");
        output.push_str(&node_to_json(value));
        output.push('\n');
        if config.color_enabled() {
            output.push_str(COLOR_RESET);
        }
    }

    for after in &element.after {
        if is_void(after) {
            output.push_str("]\n");
        } else {
            output.push_str("  ");
            output.push_str(&node_to_json(after));
            output.push('\n');
        }
    }

    output
}

fn node_to_json(node: &Node) -> String {
    match node {
        Node::Void => String::new(),
        _ => {
            let value = node_to_json_value(node).expect("non-void node serializes");
            serde_json::to_string(&value).expect("serializing node")
        }
    }
}

fn color_string_diff(text: &str, common: &[char], color: &str) -> String {
    let mut result = String::new();
    let mut common_iter = common.iter();
    let mut current = common_iter.next();
    for ch in text.chars() {
        if let Some(expected) = current {
            if ch == *expected {
                result.push(ch);
                current = common_iter.next();
                continue;
            }
        }
        result.push_str(color);
        result.push(ch);
        result.push_str(COLOR_RESET);
    }
    result
}

fn lcs_chars(lhs: &str, rhs: &str) -> Vec<char> {
    let left: Vec<char> = lhs.chars().collect();
    let right: Vec<char> = rhs.chars().collect();
    let n = left.len();
    let m = right.len();
    let mut table = vec![vec![0usize; m + 1]; n + 1];
    for i in 0..n {
        for j in 0..m {
            if left[i] == right[j] {
                table[i + 1][j + 1] = table[i][j] + 1;
            } else {
                table[i + 1][j + 1] = table[i][j + 1].max(table[i + 1][j]);
            }
        }
    }

    let mut result = Vec::with_capacity(table[n][m]);
    let mut i = n;
    let mut j = m;
    while i > 0 && j > 0 {
        if left[i - 1] == right[j - 1] {
            result.push(left[i - 1]);
            i -= 1;
            j -= 1;
        } else if table[i - 1][j] >= table[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    result.reverse();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::PathSegment;
    use crate::{DiffMetadata, DiffOptions, Node};

    #[test]
    fn merge_header_renders_once_for_consecutive_elements() {
        let lhs = Node::from_json_str("{\"a\":1,\"b\":2}").unwrap();
        let rhs = Node::from_json_str("{\"a\":3,\"b\":4}").unwrap();
        let opts = DiffOptions::default().with_merge().unwrap();
        let rendered = lhs.diff(&rhs, &opts).render(&RenderConfig::default());
        assert_eq!(rendered, "^ {\"Merge\":true}\n@ [\"a\"]\n+ 3\n@ [\"b\"]\n+ 4\n");
    }

    #[test]
    fn merge_deletion_renders_bare_plus() {
        let lhs = Node::from_json_str("{\"a\":1}").unwrap();
        let rhs = Node::from_json_str("{}").unwrap();
        let opts = DiffOptions::default().with_merge().unwrap();
        let rendered = lhs.diff(&rhs, &opts).render(&RenderConfig::default());
        assert_eq!(rendered, "^ {\"Merge\":true}\n@ [\"a\"]\n+\n");
    }

    #[test]
    fn version_header_precedes_elements() {
        let element = super::super::DiffElement::new()
            .with_metadata(DiffMetadata::version(2))
            .with_path(PathSegment::key("a"))
            .with_add(vec![Node::from_json_str("1").unwrap()]);
        let diff = Diff::from_elements(vec![element]);
        let rendered = diff.render(&RenderConfig::default());
        assert_eq!(rendered, "^ {\"Version\":2}\n@ [\"a\"]\n+ 1\n");
    }

    #[test]
    fn file_annotation_renders_header_line() {
        let lhs = Node::from_json_str("1").unwrap();
        let rhs = Node::from_json_str("2").unwrap();
        let diff = lhs.diff(&rhs, &DiffOptions::default());
        let rendered = diff.render(&RenderConfig::new().with_file("a.json"));
        assert_eq!(rendered, "^ {\"File\":\"a.json\"}\n@ []\n- 1\n+ 2\n");
    }

    #[test]
    fn color_output_wraps_removals_and_additions() {
        let lhs = Node::from_json_str("1").unwrap();
        let rhs = Node::from_json_str("2").unwrap();
        let diff = lhs.diff(&rhs, &DiffOptions::default());
        let rendered = diff.render(&RenderConfig::color(true));
        assert!(rendered.contains(COLOR_RED));
        assert!(rendered.contains(COLOR_GREEN));
    }

    #[test]
    fn color_string_replacement_highlights_changed_chars() {
        let lhs = Node::from_json_str("\"abc\"").unwrap();
        let rhs = Node::from_json_str("\"abd\"").unwrap();
        let diff = lhs.diff(&rhs, &DiffOptions::default());
        let rendered = diff.render(&RenderConfig::color(true));
        assert!(rendered.contains(&format!("{COLOR_RED}c{COLOR_RESET}")));
        assert!(rendered.contains(&format!("{COLOR_GREEN}d{COLOR_RESET}")));
    }
}

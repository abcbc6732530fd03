use jd_core::{Diff, DiffOptions, Node};

#[test]
fn json_patch_round_trips_through_reader() {
    let lhs = Node::from_json_str("{\"a\":[1,2,3]}").unwrap();
    let rhs = Node::from_json_str("{\"a\":[1,4,3]}").unwrap();
    let diff = lhs.diff(&rhs, &DiffOptions::default());
    let rendered = diff.render_patch().unwrap();
    let reread = Diff::from_patch_str(&rendered).unwrap();
    let patched = lhs.apply_patch(&reread).unwrap();
    assert_eq!(patched, rhs);
}

#[test]
fn json_patch_reader_handles_append_pointer() {
    let patch = "[{\"op\":\"add\",\"path\":\"/-\",\"value\":4}]";
    let diff = Diff::from_patch_str(patch).unwrap();
    let base = Node::from_json_str("[1,2,3]").unwrap();
    let patched = base.apply_patch(&diff).unwrap();
    assert_eq!(patched, Node::from_json_str("[1,2,3,4]").unwrap());
}

#[test]
fn json_patch_reader_treats_bare_add_as_upsert() {
    let patch = "[{\"op\":\"add\",\"path\":\"/name\",\"value\":\"jd\"}]";
    let diff = Diff::from_patch_str(patch).unwrap();
    let missing = Node::from_json_str("{}").unwrap();
    assert_eq!(
        missing.apply_patch(&diff).unwrap(),
        Node::from_json_str("{\"name\":\"jd\"}").unwrap()
    );
    let present = Node::from_json_str("{\"name\":\"old\"}").unwrap();
    assert_eq!(
        present.apply_patch(&diff).unwrap(),
        Node::from_json_str("{\"name\":\"jd\"}").unwrap()
    );
}

#[test]
fn json_patch_reader_rejects_move() {
    let patch = "[{\"op\":\"move\",\"from\":\"/a\",\"path\":\"/b\"}]";
    assert!(Diff::from_patch_str(patch).is_err());
}

#[test]
fn json_patch_pointer_escapes_special_characters() {
    let lhs = Node::from_json_str("{\"a/b\":1,\"c~d\":2}").unwrap();
    let rhs = Node::from_json_str("{\"a/b\":9,\"c~d\":2}").unwrap();
    let diff = lhs.diff(&rhs, &DiffOptions::default());
    let rendered = diff.render_patch().unwrap();
    assert!(rendered.contains("/a~1b"));
    let reread = Diff::from_patch_str(&rendered).unwrap();
    assert_eq!(lhs.apply_patch(&reread).unwrap(), rhs);
}

#[test]
fn merge_patch_renders_null_for_deletion() {
    let lhs = Node::from_json_str("{\"a\":1,\"b\":2}").unwrap();
    let rhs = Node::from_json_str("{\"b\":2}").unwrap();
    let opts = DiffOptions::default().with_merge().unwrap();
    let diff = lhs.diff(&rhs, &opts);
    assert_eq!(diff.render_merge().unwrap(), "{\"a\":null}");
}

#[test]
fn merge_patch_reader_round_trips() {
    let patch = "{\"a\":{\"b\":3},\"c\":null}";
    let diff = Diff::from_merge_str(patch).unwrap();
    assert_eq!(diff.render_merge().unwrap(), patch);
    let base = Node::from_json_str("{\"a\":{\"b\":1},\"c\":2,\"d\":4}").unwrap();
    let patched = base.apply_patch(&diff).unwrap();
    assert_eq!(patched, Node::from_json_str("{\"a\":{\"b\":3},\"d\":4}").unwrap());
}

#[test]
fn empty_merge_patch_changes_nothing() {
    let diff = Diff::from_merge_str("{}").unwrap();
    assert!(diff.is_empty());
    let base = Node::from_json_str("{\"a\":1}").unwrap();
    assert_eq!(base.apply_patch(&diff).unwrap(), base);
}

#[test]
fn merge_patch_root_null_clears_document() {
    let diff = Diff::from_merge_str("null").unwrap();
    let base = Node::from_json_str("{\"a\":1}").unwrap();
    let patched = base.apply_patch(&diff).unwrap();
    assert_eq!(patched, Node::Null);
}

#[test]
fn yaml_and_json_inputs_compare_equal() {
    let yaml = Node::from_yaml_str("a: 1\nb:\n  - 1\n  - 2\n").unwrap();
    let json = Node::from_json_str("{\"a\":1,\"b\":[1,2]}").unwrap();
    assert_eq!(yaml, json);
}

#[test]
fn yaml_rejects_non_string_keys() {
    assert!(Node::from_yaml_str("1: a\n").is_err());
}

#[test]
fn whitespace_input_is_void() {
    let void = Node::from_json_str("  \n").unwrap();
    assert_eq!(void, Node::Void);
    let diff = void.diff(&Node::from_json_str("1").unwrap(), &DiffOptions::default());
    assert_eq!(diff.len(), 1);
}

#[test]
fn precision_option_tolerates_small_drift() {
    let lhs = Node::from_json_str("{\"pi\":3.14159}").unwrap();
    let rhs = Node::from_json_str("{\"pi\":3.14158}").unwrap();
    let opts = DiffOptions::default().with_precision(0.001).unwrap();
    assert!(lhs.diff(&rhs, &opts).is_empty());
    assert!(!lhs.diff(&rhs, &DiffOptions::default()).is_empty());
}

#[test]
fn path_scoped_options_refine_by_location() {
    let opts = DiffOptions::from_json_str("[{\"@\":[\"tags\"],\"^\":[\"SET\"]}]").unwrap();
    let lhs = Node::from_json_str("{\"tags\":[1,2],\"list\":[1,2]}").unwrap();
    let rhs = Node::from_json_str("{\"tags\":[2,1],\"list\":[2,1]}").unwrap();
    let diff = lhs.diff(&rhs, &opts);
    // The reordered list still differs; the reordered set does not.
    assert!(!diff.is_empty());
    for element in diff.iter() {
        let rendered = format!("{}", element.path);
        assert!(rendered.contains("list"), "unexpected hunk at {rendered}");
    }
}

use pretty_assertions::{assert_eq, assert_ne};

use super::*;

#[test]
fn identity_equality_ignores_content() {
    let a = ReportFragment::info("Title", "body");
    let b = ReportFragment::info("Title", "body");
    assert_ne!(a, b, "distinct ids must not compare equal");
    assert_eq!(a, a.clone(), "clones share the id");
}

#[test]
fn has_content_sees_through_children() {
    let leaf = ReportFragment::info("Leaf", "something");
    let hollow = ReportFragment::with_children("Wrapper", vec![ReportFragment::empty()], 0);
    let full = ReportFragment::with_children("Wrapper", vec![leaf], 0);

    assert!(!hollow.has_content());
    assert!(full.has_content());
    assert!(!ReportFragment::empty().has_content());
}

#[test]
fn title_alone_is_not_content() {
    let titled = ReportFragment::header("Report Title");
    assert!(!titled.has_content());
}

#[test]
fn add_is_empty_absorbing() {
    let a = ReportFragment::info("A", "alpha");
    let a_id = a.id;

    let left = ReportFragment::empty() + a.clone();
    assert_eq!(left.id, a_id, "Empty + A = A");

    let right = a.clone() + ReportFragment::empty();
    assert_eq!(right.id, a_id, "A + Empty = A");

    let both_empty = ReportFragment::empty() + ReportFragment::empty();
    assert!(!both_empty.has_content());

    let b = ReportFragment::info("B", "beta");
    let joined = a + b;
    assert_eq!(joined.kind, FragmentKind::Container);
    assert_eq!(joined.children.len(), 2);
}

#[test]
fn chained_composition_renders_like_single_fragment() {
    let info = ReportFragment::info("x", "y");
    let expected = info.to_markdown();

    let chained = ReportFragment::empty() + info + ReportFragment::empty();
    assert_eq!(chained.to_markdown(), expected);
}

#[test]
fn compose_flattens_and_defaults_to_empty() {
    let all_empty = ReportFragment::compose(vec![
        None,
        Some(ReportFragment::empty()),
        Some(ReportFragment::header("no body")),
    ]);
    assert!(!all_empty.has_content());

    let one = ReportFragment::info("only", "survivor");
    let only_id = one.id;
    let composed = ReportFragment::compose(vec![None, Some(one)]);
    assert_eq!(composed.id, only_id, "single survivor passes through");

    let multi = ReportFragment::compose(vec![
        Some(ReportFragment::warning("w", "warn body")),
        None,
        Some(ReportFragment::error("e", "err body")),
    ]);
    assert_eq!(multi.children.len(), 2);
}

#[test]
fn conditional_section_suppresses_header_over_empty_body() {
    let suppressed = ReportFragment::conditional_section(
        ReportFragment::empty,
        || ReportFragment::header("Should Not Appear"),
    );
    assert!(!suppressed.has_content());
    assert!(suppressed.title.is_empty());

    let kept = ReportFragment::conditional_section(
        || ReportFragment::info("inner", "details"),
        || ReportFragment::header("Kept Header"),
    );
    assert_eq!(kept.title, "Kept Header");
    assert!(kept.has_content());
}

#[test]
fn with_header_is_noop_on_empty() {
    let empty = ReportFragment::empty();
    let id = empty.id;
    let wrapped = empty.with_header("Header");
    assert_eq!(wrapped.id, id);
    assert!(wrapped.title.is_empty());

    let real = ReportFragment::info("inner", "body").with_header("Header");
    assert_eq!(real.title, "Header");
    assert_eq!(real.children.len(), 1);
}

#[test]
fn markdown_contains_all_titles_transitively() {
    let tree = ReportFragment::with_children(
        "Root Title",
        vec![
            ReportFragment::section("Child Section", "child body"),
            ReportFragment::with_children(
                "Nested",
                vec![ReportFragment::warning("Deep Warning", "deep body")],
                0,
            ),
        ],
        0,
    );

    let md = tree.to_markdown();
    for title in ["Root Title", "Child Section", "Nested", "Deep Warning"] {
        assert!(md.contains(title), "markdown missing title {title:?}: {md}");
    }
}

#[test]
fn rendering_is_deterministic() {
    let tree = ReportFragment::with_children(
        "Root",
        vec![
            ReportFragment::error("E", "error body"),
            ReportFragment::info("I", "info body"),
        ],
        0,
    );
    assert_eq!(tree.to_markdown(), tree.to_markdown());
}

#[test]
fn default_orders_match_contract() {
    assert_eq!(ReportFragment::header("h").order, 0);
    assert_eq!(ReportFragment::error("e", "x").order, 10);
    assert_eq!(ReportFragment::warning("w", "x").order, 50);
    assert_eq!(ReportFragment::info("i", "x").order, 200);
}

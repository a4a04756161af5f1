//! Immutable report-fragment tree.
//!
//! A [`ReportFragment`] is a value-semantic node of report content: a title,
//! optional body text, a kind, a visibility level, a sort order, and an
//! ordered list of child fragments. Fragments are immutable after creation
//! and freely shareable across threads; composition never mutates its
//! operands. Identity is carried by the fragment id, not by content.

use std::collections::BTreeMap;
use std::ops::Add;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::io::reports::markdown;

#[cfg(test)]
#[path = "fragment_tests.rs"]
mod tests;

/// The kind of content a fragment carries, which drives rendering prefixes
/// and CSS classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FragmentKind {
    /// Top-level report heading.
    Header,
    /// Named section of the report.
    Section,
    /// Informational note.
    Info,
    /// Something the user should look at.
    Warning,
    /// A problem that needs fixing.
    Error,
    /// Structural node grouping children without semantics of its own.
    Container,
    /// Section rendered only when its content predicate held.
    Conditional,
}

/// When a fragment appears in rendered output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum FragmentVisibility {
    /// Rendered in every report.
    #[default]
    Always,
    /// Rendered only when verbose output is requested.
    Verbose,
    /// Never rendered; kept for diagnostics.
    Hidden,
}

/// Immutable node of report content.
///
/// Equality is identity equality: two fragments compare equal iff they share
/// the same `id`. Content comparisons go through [`ReportFragment::has_content`]
/// and the renderers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFragment {
    /// Stable identity of this node.
    pub id: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Fragment title; may be empty for pure containers.
    pub title: String,
    /// Body text; empty means "no own content".
    pub content: String,
    /// Fragment kind.
    pub kind: FragmentKind,
    /// Rendering visibility.
    pub visibility: FragmentVisibility,
    /// Sort order within a sibling list; lower renders first.
    pub order: i32,
    /// Ordered child fragments. Deep-immutable: children are never mutated
    /// after attachment.
    pub children: Vec<ReportFragment>,
    /// Optional renderer metadata.
    pub metadata: Option<BTreeMap<String, String>>,
}

impl PartialEq for ReportFragment {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ReportFragment {}

impl ReportFragment {
    fn node(
        title: impl Into<String>,
        content: impl Into<String>,
        kind: FragmentKind,
        order: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            title: title.into(),
            content: content.into(),
            kind,
            visibility: FragmentVisibility::Always,
            order,
            children: Vec::new(),
            metadata: None,
        }
    }

    /// Top-level report heading. Default order 0.
    pub fn header(title: impl Into<String>) -> Self {
        Self::node(title, "", FragmentKind::Header, 0)
    }

    /// Named section with body content. Default order 100.
    pub fn section(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::node(title, content, FragmentKind::Section, 100)
    }

    /// Informational fragment. Default order 200.
    pub fn info(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::node(title, content, FragmentKind::Info, 200)
    }

    /// Warning fragment. Default order 50.
    pub fn warning(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::node(title, content, FragmentKind::Warning, 50)
    }

    /// Error fragment. Default order 10.
    pub fn error(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::node(title, content, FragmentKind::Error, 10)
    }

    /// Fragment with an explicit visibility level.
    pub fn conditional(
        title: impl Into<String>,
        content: impl Into<String>,
        visibility: FragmentVisibility,
    ) -> Self {
        let mut fragment = Self::node(title, content, FragmentKind::Conditional, 100);
        fragment.visibility = visibility;
        fragment
    }

    /// Container with pre-built children.
    pub fn with_children(
        title: impl Into<String>,
        children: Vec<ReportFragment>,
        order: i32,
    ) -> Self {
        let mut fragment = Self::node(title, "", FragmentKind::Container, order);
        fragment.children = children;
        fragment
    }

    /// The empty sentinel: no title, no content, absorbed by composition.
    pub fn empty() -> Self {
        Self::node("", "", FragmentKind::Container, i32::MAX)
    }

    /// Override the sort order.
    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Override the visibility.
    #[must_use]
    pub fn with_visibility(mut self, visibility: FragmentVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// True when the fragment has body content of its own or any child does.
    /// Titles alone do not count as content, which is what lets
    /// [`ReportFragment::conditional_section`] suppress headers over empty
    /// bodies.
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty() || self.children.iter().any(ReportFragment::has_content)
    }

    /// Compose a sequence of optional fragments, absorbing empties. Returns
    /// the empty sentinel when nothing contributed content.
    pub fn compose<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = Option<ReportFragment>>,
    {
        let non_empty: Vec<ReportFragment> = fragments
            .into_iter()
            .flatten()
            .filter(ReportFragment::has_content)
            .collect();

        match non_empty.len() {
            0 => Self::empty(),
            1 => non_empty.into_iter().next().unwrap_or_else(Self::empty),
            _ => Self::with_children("", non_empty, 0),
        }
    }

    /// Evaluate `content_fn`; when it produces a contentful fragment, wrap it
    /// under the header produced by `header_fn`. An empty body suppresses the
    /// header entirely.
    pub fn conditional_section<C, H>(content_fn: C, header_fn: H) -> Self
    where
        C: FnOnce() -> ReportFragment,
        H: FnOnce() -> ReportFragment,
    {
        let content = content_fn();
        if !content.has_content() {
            return Self::empty();
        }
        let mut header = header_fn();
        header.children.push(content);
        header
    }

    /// Wrap this fragment under a new header. No-op on empty fragments: the
    /// empty sentinel passes through unchanged.
    #[must_use]
    pub fn with_header(self, title: impl Into<String>) -> Self {
        if !self.has_content() {
            return self;
        }
        let mut header = Self::header(title);
        header.children.push(self);
        header
    }

    /// Render this fragment tree as markdown. See [`crate::io::reports`] for
    /// the full renderer set.
    pub fn to_markdown(&self) -> String {
        markdown::render_fragment(self)
    }
}

impl Add for ReportFragment {
    type Output = ReportFragment;

    /// Empty-absorbing composition: if both operands have content, the result
    /// is a new container holding `[self, rhs]`; if exactly one has content,
    /// that operand is returned unchanged; if neither does, the empty
    /// sentinel results.
    fn add(self, rhs: ReportFragment) -> ReportFragment {
        match (self.has_content(), rhs.has_content()) {
            (true, true) => ReportFragment::with_children("", vec![self, rhs], 0),
            (true, false) => self,
            (false, true) => rhs,
            (false, false) => ReportFragment::empty(),
        }
    }
}

impl Default for ReportFragment {
    fn default() -> Self {
        Self::empty()
    }
}

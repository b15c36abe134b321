//! Hierarchical tags for selecting which checks run.
//!
//! A tag is a colon-separated path of namespace segments (`crud:create`).
//! Matching is hierarchical: a filter of `crud` selects every check tagged
//! under `crud`, while `crud:create` selects only that leaf. Tags are
//! structured values with an explicit ancestor relation rather than strings
//! split at call sites.

use std::collections::BTreeSet;

/// Separator between tag namespace segments.
const SEPARATOR: char = ':';

/// A hierarchical check tag, e.g. `crud:create` or `discovery:schemas`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    segments: Vec<String>,
}

impl Tag {
    /// Parse a tag from its `ns:sub` textual form.
    ///
    /// Empty segments are dropped, so `"crud:"` and `"crud"` are the same
    /// tag; an all-empty input yields an empty tag that matches nothing.
    pub fn new(text: &str) -> Self {
        Self {
            segments: text
                .split(SEPARATOR)
                .filter(|segment| !segment.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    /// The namespace segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether `self` is a strict ancestor of `other` in the namespace
    /// hierarchy (`crud` is an ancestor of `crud:create`, not of itself).
    pub fn is_ancestor_of(&self, other: &Tag) -> bool {
        !self.segments.is_empty()
            && self.segments.len() < other.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Whether a filter on `self` selects a check tagged `other`: exact
    /// match, or `self` is an ancestor of `other`.
    pub fn selects(&self, other: &Tag) -> bool {
        self == other || self.is_ancestor_of(other)
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join(&SEPARATOR.to_string()))
    }
}

impl From<&str> for Tag {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// Include/exclude tag configuration for one run.
///
/// A check with tags `T` runs iff (`include` is empty or some tag in `T` is
/// selected by an include filter) and no tag in `T` is selected by an exclude
/// filter. Exclude wins when both match.
#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    /// Execute only checks carrying at least one of these tags. Empty = all.
    pub include: BTreeSet<Tag>,
    /// Skip checks carrying any of these tags.
    pub exclude: BTreeSet<Tag>,
}

impl TagFilter {
    /// Decide whether a check with the given tags executes.
    pub fn allows(&self, check_tags: &[Tag]) -> bool {
        let included = self.include.is_empty()
            || check_tags
                .iter()
                .any(|tag| self.include.iter().any(|filter| filter.selects(tag)));
        let excluded = check_tags
            .iter()
            .any(|tag| self.exclude.iter().any(|filter| filter.selects(tag)));
        included && !excluded
    }
}

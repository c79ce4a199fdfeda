//! Selection model: property and container selections, plus a distinct
//! null/empty variant.
//!
//! `reversed` records anchor/focus order for UI purposes only; it never
//! affects range math.

use crate::node::{NodeId, Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollapseSide {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySelection {
    pub path: Path,
    pub start_offset: usize,
    pub end_offset: usize,
    pub reversed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSelection {
    pub container: NodeId,
    pub start_path: Path,
    pub start_offset: usize,
    pub end_path: Path,
    pub end_offset: usize,
    pub reversed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Null,
    Property(PropertySelection),
    Container(ContainerSelection),
}

impl Selection {
    pub fn property(path: Path, start_offset: usize, end_offset: usize, reversed: bool) -> Self {
        let (start_offset, end_offset) = normalize(start_offset, end_offset);
        Selection::Property(PropertySelection {
            path,
            start_offset,
            end_offset,
            reversed,
        })
    }

    pub fn container(
        container: NodeId,
        start_path: Path,
        start_offset: usize,
        end_path: Path,
        end_offset: usize,
        reversed: bool,
    ) -> Self {
        Selection::Container(ContainerSelection {
            container,
            start_path,
            start_offset,
            end_path,
            end_offset,
            reversed,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Selection::Null)
    }

    pub fn is_collapsed(&self) -> bool {
        match self {
            Selection::Null => true,
            Selection::Property(p) => p.start_offset == p.end_offset,
            Selection::Container(c) => c.start_path == c.end_path && c.start_offset == c.end_offset,
        }
    }

    /// Collapses to one side, producing a zero-width selection there.
    pub fn collapse(&self, which: CollapseSide) -> Selection {
        match self {
            Selection::Null => Selection::Null,
            Selection::Property(p) => {
                let offset = match which {
                    CollapseSide::Start => p.start_offset,
                    CollapseSide::End => p.end_offset,
                };
                Selection::Property(PropertySelection {
                    path: p.path.clone(),
                    start_offset: offset,
                    end_offset: offset,
                    reversed: false,
                })
            }
            Selection::Container(c) => {
                let (path, offset) = match which {
                    CollapseSide::Start => (c.start_path.clone(), c.start_offset),
                    CollapseSide::End => (c.end_path.clone(), c.end_offset),
                };
                Selection::Container(ContainerSelection {
                    container: c.container.clone(),
                    start_path: path.clone(),
                    start_offset: offset,
                    end_path: path,
                    end_offset: offset,
                    reversed: false,
                })
            }
        }
    }

    pub fn overlaps(&self, other: &Selection) -> bool {
        match (self, other) {
            (Selection::Null, _) | (_, Selection::Null) => false,
            (Selection::Property(a), Selection::Property(b)) => {
                a.path == b.path && a.start_offset <= b.end_offset && b.start_offset <= a.end_offset
            }
            (Selection::Container(a), Selection::Container(b)) => {
                a.container == b.container && container_ranges_overlap(a, b)
            }
            _ => false,
        }
    }

    pub fn contains(&self, other: &Selection) -> bool {
        match (self, other) {
            (Selection::Null, _) => other.is_null(),
            (Selection::Property(a), Selection::Property(b)) => {
                a.path == b.path && a.start_offset <= b.start_offset && b.end_offset <= a.end_offset
            }
            (Selection::Container(a), Selection::Container(b)) => {
                a.container == b.container
                    && container_point_order(&a.start_path, a.start_offset, &b.start_path, b.start_offset) != std::cmp::Ordering::Greater
                    && container_point_order(&b.end_path, b.end_offset, &a.end_path, a.end_offset) != std::cmp::Ordering::Greater
            }
            _ => false,
        }
    }

    pub fn equals(&self, other: &Selection) -> bool {
        match (self, other) {
            (Selection::Null, Selection::Null) => true,
            (Selection::Property(a), Selection::Property(b)) => {
                a.path == b.path && a.start_offset == b.start_offset && a.end_offset == b.end_offset
            }
            (Selection::Container(a), Selection::Container(b)) => {
                a.container == b.container
                    && a.start_path == b.start_path
                    && a.start_offset == b.start_offset
                    && a.end_path == b.end_path
                    && a.end_offset == b.end_offset
            }
            _ => false,
        }
    }
}

fn normalize(start: usize, end: usize) -> (usize, usize) {
    if start <= end {
        (start, end)
    } else {
        (end, start)
    }
}

/// Orders two `(path, offset)` points by their position in the container's
/// child order. Since a bare path carries no positional information on its
/// own, container-position comparisons that need child ordering are
/// resolved by the caller (the coordinate resolver / container model) and
/// fed in as already-ordered paths; when the paths are equal we fall back
/// to the numeric offset, which is always well-ordered within one property.
fn container_point_order(a_path: &Path, a_off: usize, b_path: &Path, b_off: usize) -> std::cmp::Ordering {
    if a_path == b_path {
        a_off.cmp(&b_off)
    } else {
        // Distinct properties: treat as incomparable-but-not-equal; callers
        // that need true document order pass pre-ordered paths (see
        // `ContainerSelection` construction in `crate::container`).
        std::cmp::Ordering::Equal
    }
}

fn container_ranges_overlap(a: &ContainerSelection, b: &ContainerSelection) -> bool {
    // Two container selections overlap unless one lies strictly before the
    // other in child order. Without a container order at hand, a path
    // equal to both endpoints naturally produces the offset-based overlap
    // test `overlapping <=> not (a.end < b.start || b.end < a.start)`.
    let a_start_before_b_end =
        container_point_order(&a.start_path, a.start_offset, &b.end_path, b.end_offset) != std::cmp::Ordering::Greater;
    let b_start_before_a_end =
        container_point_order(&b.start_path, b.start_offset, &a.end_path, a.end_offset) != std::cmp::Ordering::Greater;
    a_start_before_b_end && b_start_before_a_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::props;

    #[test]
    fn property_selection_overlap_is_closed() {
        let a = Selection::property(Path::new("p1", props::CONTENT), 0, 5, false);
        let b = Selection::property(Path::new("p1", props::CONTENT), 5, 10, false);
        assert!(a.overlaps(&b));
        let c = Selection::property(Path::new("p1", props::CONTENT), 6, 10, false);
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn null_selection_is_collapsed_and_never_overlaps() {
        assert!(Selection::Null.is_collapsed());
        assert!(!Selection::Null.overlaps(&Selection::Null));
    }

    #[test]
    fn collapse_picks_requested_side() {
        let sel = Selection::property(Path::new("p1", props::CONTENT), 2, 8, false);
        let collapsed = sel.collapse(CollapseSide::End);
        assert!(collapsed.is_collapsed());
        assert_eq!(
            collapsed,
            Selection::property(Path::new("p1", props::CONTENT), 8, 8, false)
        );
    }

    #[test]
    fn equals_ignores_reversed_flag() {
        let a = Selection::property(Path::new("p1", props::CONTENT), 0, 5, false);
        let b = Selection::property(Path::new("p1", props::CONTENT), 0, 5, true);
        assert!(a.equals(&b));
    }
}

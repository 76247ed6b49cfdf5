// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host integration boundary.

use alloc::vec::Vec;

use kurbo::{Point, Rect};

/// Upper bound on the host ancestor chains the tracker walks.
pub const MAX_HOST_DEPTH: usize = 1024;

/// Read access to the host display tree.
///
/// Implemented by the host framework adapter. Every method must be called on the UI thread;
/// the tracker's split operations (`begin_frame_query`/`apply_frame`,
/// `needs_parent`/`attach_to_ancestors`) exist so that a worker never calls these itself.
pub trait HostTree<E> {
    /// The element's display parent, if it has one.
    fn parent_of(&self, element: E) -> Option<E>;

    /// The element's bounds in the shared root coordinate space.
    ///
    /// `None` means the element can no longer be resolved (destroyed or detached from any
    /// root); the tracker then detaches its node.
    fn frame_in_root(&self, element: E) -> Option<Rect>;

    /// The current content offset, for scrollable elements.
    fn scroll_offset(&self, element: E) -> Option<Point> {
        let _ = element;
        None
    }
}

/// Collects the display ancestors of `element`, nearest first.
///
/// Stops after `limit` steps so a cyclic host answer cannot hang the caller.
pub fn ancestors<E: Copy + PartialEq, H: HostTree<E> + ?Sized>(
    host: &H,
    element: E,
    limit: usize,
) -> Vec<E> {
    let mut out = Vec::new();
    let mut cursor = host.parent_of(element);
    while let Some(parent) = cursor
        && out.len() < limit
    {
        if parent == element || out.contains(&parent) {
            break;
        }
        out.push(parent);
        cursor = host.parent_of(parent);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashMap;

    struct Chain(HashMap<u32, u32>);

    impl HostTree<u32> for Chain {
        fn parent_of(&self, element: u32) -> Option<u32> {
            self.0.get(&element).copied()
        }

        fn frame_in_root(&self, _: u32) -> Option<Rect> {
            Some(Rect::ZERO)
        }
    }

    #[test]
    fn ancestors_are_nearest_first() {
        let host = Chain([(3, 2), (2, 1)].into_iter().collect());
        assert_eq!(ancestors(&host, 3, 16), [2, 1]);
        assert!(ancestors(&host, 1, 16).is_empty());
        assert_eq!(host.scroll_offset(3), None, "not scrollable by default");
    }

    #[test]
    fn ancestors_stop_on_cycles() {
        let host = Chain([(1, 2), (2, 3), (3, 1)].into_iter().collect());
        assert_eq!(ancestors(&host, 1, 16), [2, 3]);
        assert_eq!(ancestors(&host, 1, 1), [2]);
    }
}

// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the tracker tree: node identifiers, flags, and scroll/geometry signals.

use core::fmt::Debug;
use core::hash::Hash;

use kurbo::{Point, Rect, Vec2};

/// Identity of a host element.
///
/// Host frameworks usually hand out small copyable handles (an index, a pointer-sized id, an
/// entity key). Anything that is `Copy`, hashable, and shareable across threads qualifies.
pub trait Element: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T: Copy + Eq + Hash + Debug + Send + Sync + 'static> Element for T {}

/// Identifier for a tracker node (generational).
///
/// A `NodeId` stays valid until its node is discarded. After that it is stale: every lookup
/// through it resolves to "absent", even if the slot is reused for a new node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Per-node state flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// The element is on screen. Cleared while the host hides the element's subtree.
        const VISIBLE  = 0b0000_0001;
        /// The node was picked for selective tracking.
        const SELECTED = 0b0000_0010;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::VISIBLE
    }
}

/// Scroll state of the nearest scrollable ancestor, as seen by a node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScrollState {
    /// No offset change has been observed for the debounce window.
    Idle,
    /// The content offset changed by the given delta (`last - new`).
    ///
    /// - negative x: content moved right
    /// - positive x: content moved left
    /// - negative y: content moved down
    /// - positive y: content moved up
    Scrolling(Vec2),
}

impl ScrollState {
    /// Returns `true` for [`ScrollState::Idle`].
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// A geometry change reported by the host, with old and new values.
///
/// Used to filter out notifications that cannot affect visibility before any work is queued.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GeometryChange {
    /// The element's position in its parent changed.
    Position {
        /// Previous position.
        old: Point,
        /// New position.
        new: Point,
    },
    /// The element's bounds changed.
    Bounds {
        /// Previous bounds.
        old: Rect,
        /// New bounds.
        new: Rect,
    },
}

impl GeometryChange {
    /// Returns `true` if the change can move or resize the element's frame.
    ///
    /// A bounds change that keeps the size is an origin shift of the element's own coordinate
    /// space (e.g. a scroll offset), which is reported separately.
    pub fn affects_frame(&self) -> bool {
        match *self {
            Self::Position { old, new } => old != new,
            Self::Bounds { old, new } => old.size() != new.size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_change_filters_noops() {
        let same = GeometryChange::Position {
            old: Point::new(1.0, 2.0),
            new: Point::new(1.0, 2.0),
        };
        assert!(!same.affects_frame());

        let moved = GeometryChange::Position {
            old: Point::new(1.0, 2.0),
            new: Point::new(1.0, 3.0),
        };
        assert!(moved.affects_frame());

        let shifted = GeometryChange::Bounds {
            old: Rect::new(0.0, 0.0, 10.0, 10.0),
            new: Rect::new(0.0, 40.0, 10.0, 50.0),
        };
        assert!(!shifted.affects_frame(), "same size must not reset the frame");

        let resized = GeometryChange::Bounds {
            old: Rect::new(0.0, 0.0, 10.0, 10.0),
            new: Rect::new(0.0, 0.0, 10.0, 20.0),
        };
        assert!(resized.affects_frame());
    }

    #[test]
    fn default_flags_are_visible_only() {
        let flags = NodeFlags::default();
        assert!(flags.contains(NodeFlags::VISIBLE));
        assert!(!flags.contains(NodeFlags::SELECTED));
    }
}

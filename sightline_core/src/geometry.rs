// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Percentage-visible geometry.
//!
//! Every node is clipped by its parent's *visible* frame rather than by the root, so occlusion by
//! nested scrollable ancestors composes through arbitrary depth without walking ancestor chains.

use kurbo::{Rect, Size};

/// Area of a rectangle, treating inverted rectangles by their absolute extent.
pub(crate) fn area(rect: Rect) -> f64 {
    let rect = rect.abs();
    rect.width() * rect.height()
}

/// The part of `frame` that survives clipping by `clip`.
///
/// The result is always contained in `frame`. An empty intersection collapses to a zero-sized
/// rectangle at the frame's origin.
pub fn visible_frame(frame: Rect, clip: Rect) -> Rect {
    let frame = frame.abs();
    let visible = frame.intersect(clip.abs());
    if visible.width() > 0.0 && visible.height() > 0.0 {
        visible
    } else {
        Rect::from_origin_size(frame.origin(), Size::ZERO)
    }
}

/// Percentage of `frame` that is visible through `clip`, in `[0, 100]`.
///
/// A zero-area frame is 0% visible.
pub fn visible_percentage(frame: Rect, clip: Rect) -> f32 {
    let total = area(frame);
    if total <= 0.0 || !total.is_finite() {
        return 0.0;
    }
    let visible = area(visible_frame(frame, clip));
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Percentages are reported as f32; the narrowing is intended."
    )]
    let percentage = (100.0 * visible / total) as f32;
    clamp_percentage(percentage)
}

/// Clamps a percentage into `[0, 100]`, mapping NaN to 0.
pub fn clamp_percentage(percentage: f32) -> f32 {
    if percentage.is_nan() {
        0.0
    } else {
        percentage.clamp(0.0, 100.0)
    }
}

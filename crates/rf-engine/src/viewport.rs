//! Viewport tracking: which posts of the vertically scrolling list are
//! visible enough to count as active.
//!
//! Pure geometry. The tracker only reports edges; committing them to the
//! carousel state is the coordinator's job.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::config::ViewportConfig;

/// Vertical placement of a rendered post in content coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frame {
    pub top: f32,
    pub height: f32,
}

impl Frame {
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

/// The scroll surface: current offset and visible height.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Surface {
    pub offset: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportEdge {
    Enter,
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportChange {
    pub post_id: Uuid,
    pub edge: ViewportEdge,
}

/// Fraction of `frame` inside `surface`. Posts taller than the surface are
/// measured against the surface height so they can still reach full visibility.
pub fn visible_ratio(surface: Surface, frame: Frame) -> f32 {
    let basis = frame.height.min(surface.height);
    if basis <= 0.0 {
        return 0.0;
    }
    let top = frame.top.max(surface.offset);
    let bottom = frame.bottom().min(surface.offset + surface.height);
    ((bottom - top).max(0.0) / basis).min(1.0)
}

#[derive(Debug, Default)]
pub struct ViewportTracker {
    config: ViewportConfig,
    surface: Option<Surface>,
    frames: HashMap<Uuid, Frame>,
    visible: HashSet<Uuid>,
}

impl ViewportTracker {
    pub fn new(config: ViewportConfig) -> Self {
        Self { config, ..Default::default() }
    }

    /// Scroll or resize. Re-evaluates every known post; leaves are reported
    /// before enters, each in top-to-bottom order.
    pub fn set_surface(&mut self, surface: Surface) -> Vec<ViewportChange> {
        self.surface = Some(surface);

        let mut ids: Vec<(Uuid, f32)> = self.frames.iter().map(|(id, f)| (*id, f.top)).collect();
        ids.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut changes: Vec<ViewportChange> = ids.into_iter().filter_map(|(id, _)| self.evaluate(id)).collect();
        changes.sort_by_key(|c| c.edge == ViewportEdge::Enter);
        changes
    }

    /// Layout of a single post changed.
    pub fn set_frame(&mut self, post_id: Uuid, frame: Frame) -> Option<ViewportChange> {
        self.frames.insert(post_id, frame);
        self.evaluate(post_id)
    }

    /// Post was unmounted. Reports a leave if it was visible.
    pub fn remove(&mut self, post_id: Uuid) -> Option<ViewportChange> {
        self.frames.remove(&post_id);
        self.visible
            .remove(&post_id)
            .then_some(ViewportChange { post_id, edge: ViewportEdge::Leave })
    }

    pub fn is_visible(&self, post_id: Uuid) -> bool {
        self.visible.contains(&post_id)
    }

    /// Distance from the bottom of the surface to the bottom of `last`, the
    /// final post of the sequence, in surface heights. `None` until that post
    /// has been laid out, since anything above it says nothing about the end.
    pub fn distance_to_end(&self, last: Uuid) -> Option<f32> {
        let surface = self.surface?;
        if surface.height <= 0.0 {
            return None;
        }
        let end = self.frames.get(&last)?.bottom();
        Some(((end - (surface.offset + surface.height)) / surface.height).max(0.0))
    }

    fn evaluate(&mut self, post_id: Uuid) -> Option<ViewportChange> {
        let surface = self.surface?;
        let frame = *self.frames.get(&post_id)?;
        let ratio = visible_ratio(surface, frame);

        if self.visible.contains(&post_id) {
            if ratio < self.config.leave_ratio {
                self.visible.remove(&post_id);
                return Some(ViewportChange { post_id, edge: ViewportEdge::Leave });
            }
        } else if ratio >= self.config.enter_ratio {
            self.visible.insert(post_id);
            return Some(ViewportChange { post_id, edge: ViewportEdge::Enter });
        }
        None
    }
}

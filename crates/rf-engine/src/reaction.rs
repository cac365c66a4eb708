//! Tap / long-press / tray interaction for a post's reaction.

use rf_core::ReactionKind;

/// A committed change of the viewer's reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionChange {
    pub previous: Option<ReactionKind>,
    pub next: Option<ReactionKind>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactionStateMachine {
    selection: Option<ReactionKind>,
    tray_visible: bool,
}

impl ReactionStateMachine {
    pub fn new(selection: Option<ReactionKind>) -> Self {
        Self { selection, tray_visible: false }
    }

    pub fn selection(&self) -> Option<ReactionKind> {
        self.selection
    }

    pub fn tray_visible(&self) -> bool {
        self.tray_visible
    }

    /// Inline icon tap: clears any reaction, or sets `like` when there is none.
    pub fn quick_tap(&mut self) -> ReactionChange {
        self.tray_visible = false;
        let next = match self.selection {
            Some(_) => None,
            None => Some(ReactionKind::Like),
        };
        self.commit(next)
    }

    /// Toggles the tray. Never changes the selection.
    pub fn long_press(&mut self) {
        self.tray_visible = !self.tray_visible;
    }

    /// Picks from the tray. Picking the current reaction only closes the tray.
    pub fn tray_select(&mut self, kind: ReactionKind) -> Option<ReactionChange> {
        self.tray_visible = false;
        if self.selection == Some(kind) {
            return None;
        }
        Some(self.commit(Some(kind)))
    }

    /// Closes the tray. Returns true if it was open, in which case the
    /// gesture that triggered this is consumed.
    pub fn dismiss_tray(&mut self) -> bool {
        std::mem::replace(&mut self.tray_visible, false)
    }

    /// Sets the selection without producing a change, e.g. to roll back a
    /// rejected commit or to follow a server-side update.
    pub fn restore(&mut self, selection: Option<ReactionKind>) {
        self.selection = selection;
    }

    fn commit(&mut self, next: Option<ReactionKind>) -> ReactionChange {
        let previous = std::mem::replace(&mut self.selection, next);
        ReactionChange { previous, next }
    }
}

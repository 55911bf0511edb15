//! Buffered player input.
//!
//! The UI thread pushes [`LogicalAction`]s into an [`InputQueue`] as
//! they happen; the game loop drains the queue at sub-step boundaries.
//! Coalescing happens at the semantic level: actions are kept in
//! arrival order and each is resolved against the session state at the
//! moment it is drained, not the state at click time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use lemmings_core::skills::{SelectionFilter, Skill};

/// A device-independent player intention.
///
/// Cursor coordinates are in level pixel space; the front end has
/// already applied camera transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalAction {
    /// Assign the selected skill to whatever the cursor resolves to
    /// under the active selection filter.
    AssignAt {
        /// Cursor x in level space.
        x: i32,
        /// Cursor y in level space.
        y: i32,
        /// Skill to assign.
        skill: Skill,
    },
    /// The cursor moved; retarget the highlight.
    CursorMoved {
        /// Cursor x in level space.
        x: i32,
        /// Cursor y in level space.
        y: i32,
    },
    /// Change the advanced-select sub-mode for subsequent clicks.
    SetFilter(SelectionFilter),
    /// Trigger the nuke.
    Nuke,
    /// Adjust the release rate by a signed delta.
    AdjustReleaseRate(i32),
    /// Toggle pause.
    TogglePause,
    /// Toggle fast-forward.
    ToggleFastForward,
    /// Toggle turbo.
    ToggleTurbo,
    /// Pan the camera.
    Pan {
        /// Horizontal pan in pixels.
        dx: i32,
        /// Vertical pan in pixels.
        dy: i32,
    },
    /// Abandon the attempt and restart the level.
    Restart,
}

/// Thread-safe action buffer shared between the UI and the game loop.
#[derive(Debug, Clone, Default)]
pub struct InputQueue {
    inner: Arc<Mutex<VecDeque<LogicalAction>>>,
}

impl InputQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an action from the UI thread.
    pub fn push(&self, action: LogicalAction) {
        if let Ok(mut queue) = self.inner.lock() {
            queue.push_back(action);
        }
    }

    /// Drain all buffered actions in arrival order.
    #[must_use]
    pub fn drain(&self) -> Vec<LogicalAction> {
        match self.inner.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Whether anything is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().map_or(true, |q| q.is_empty())
    }
}

//! Headless renderer

use crate::core::traits::SceneRenderer;
use crate::core::types::{InputEvent, ViewMatrix};
use std::collections::VecDeque;

/// Renderer that logs view matrices instead of drawing
///
/// Input events are queued with [`LogRenderer::push_event`] and handed out
/// on the next poll.
#[derive(Debug, Default)]
pub struct LogRenderer {
    renders: u64,
    last_view: Option<ViewMatrix>,
    pending: VecDeque<InputEvent>,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn last_view(&self) -> Option<&ViewMatrix> {
        self.last_view.as_ref()
    }

    pub fn push_event(&mut self, event: InputEvent) {
        self.pending.push_back(event);
    }
}

impl SceneRenderer for LogRenderer {
    fn render(&mut self, view: &ViewMatrix, light_position: Option<[f32; 4]>) {
        self.renders += 1;
        let m = &view.0;
        log::trace!(
            "render #{}: t=({:.2}, {:.2}, {:.2}) light={:?}",
            self.renders,
            m[12],
            m[13],
            m[14],
            light_position
        );
        self.last_view = Some(*view);
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        self.pending.drain(..).collect()
    }
}

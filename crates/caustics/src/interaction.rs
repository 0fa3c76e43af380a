use view::{ViewChange, ViewWindow, Viewport};

use crate::input::{ActionKeys, InputFrame};

/// World point grabbed when the drag started, and the view it was grabbed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub anchor_world: [f32; 2],
    pub origin_view: ViewWindow,
}

/// Result of one frame of pointer and keyboard handling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interaction {
    pub view: ViewWindow,
    pub view_change: ViewChange,
    /// Keys pressed this frame that were not held on the previous frame.
    pub actions: ActionKeys,
}

#[derive(Debug, Clone)]
pub struct InteractionController {
    zoom_factor: f32,
    drag: Option<DragState>,
    previous_keys: ActionKeys,
}

impl InteractionController {
    pub fn new(zoom_factor: f32) -> Self {
        if !zoom_factor.is_finite() || zoom_factor <= 1.0 {
            panic!("zoom factor must be finite and greater than 1, got {zoom_factor}");
        }
        Self {
            zoom_factor,
            drag: None,
            previous_keys: ActionKeys::empty(),
        }
    }

    pub fn drag(&self) -> Option<&DragState> {
        self.drag.as_ref()
    }

    /// Forgets the current drag. The next pressed frame anchors again.
    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    pub fn update(
        &mut self,
        input: &InputFrame,
        viewport: Viewport,
        view: ViewWindow,
    ) -> Interaction {
        let mut view = view;
        let mut view_change = ViewChange::Unchanged;

        if input.ui_captures_pointer {
            self.drag = None;
        } else if !viewport.is_empty() {
            view_change = view_change.merge(self.update_drag(input, viewport, &mut view));
            view_change = view_change.merge(self.update_zoom(input, viewport, &mut view));
        }

        let held = if input.ui_captures_keyboard {
            ActionKeys::empty()
        } else {
            input.held_keys
        };
        let actions = held.difference(self.previous_keys);
        self.previous_keys = held;

        Interaction {
            view,
            view_change,
            actions,
        }
    }

    fn update_drag(
        &mut self,
        input: &InputFrame,
        viewport: Viewport,
        view: &mut ViewWindow,
    ) -> ViewChange {
        if !input.primary_button {
            self.drag = None;
            return ViewChange::Unchanged;
        }
        let [cursor_x, cursor_y] = input.cursor;

        let Some(drag) = self.drag else {
            let (anchor_x, anchor_y) = view.screen_point_to_world(viewport, cursor_x, cursor_y);
            self.drag = Some(DragState {
                anchor_world: [anchor_x, anchor_y],
                origin_view: *view,
            });
            return ViewChange::Unchanged;
        };

        // Measured in the view the drag started in, so the delta is cumulative and stable.
        let (mouse_x, mouse_y) = drag
            .origin_view
            .screen_point_to_world(viewport, cursor_x, cursor_y);
        let center_x = drag.origin_view.center_x() - (mouse_x - drag.anchor_world[0]);
        let center_y = drag.origin_view.center_y() - (mouse_y - drag.anchor_world[1]);
        if center_x == view.center_x() && center_y == view.center_y() {
            return ViewChange::Unchanged;
        }
        match view.set_center(center_x, center_y) {
            Ok(()) => ViewChange::Pan,
            Err(error) => {
                log::warn!("[interaction] pan rejected: {error}");
                ViewChange::Unchanged
            }
        }
    }

    fn update_zoom(
        &mut self,
        input: &InputFrame,
        viewport: Viewport,
        view: &mut ViewWindow,
    ) -> ViewChange {
        let scroll = input.scroll_delta;
        if scroll == 0.0 || !scroll.is_finite() {
            return ViewChange::Unchanged;
        }
        let factor = if scroll > 0.0 {
            1.0 / self.zoom_factor
        } else {
            self.zoom_factor
        };
        let [cursor_x, cursor_y] = input.cursor;
        let (mouse_x, mouse_y) = view.screen_point_to_world(viewport, cursor_x, cursor_y);
        if let Err(error) = view.zoom_about_point(factor, mouse_x, mouse_y) {
            log::warn!("[interaction] zoom rejected: {error}");
            return ViewChange::Unchanged;
        }

        if let Some(drag) = self.drag.as_mut() {
            drag.anchor_world = [mouse_x, mouse_y];
            drag.origin_view = *view;
        }
        ViewChange::Zoom
    }
}

//! View window and viewport math.
//!
//! The renderer draws a fixed-size image of the world-space rectangle described by
//! [`ViewWindow`]. That image is letterboxed into the framebuffer with
//! [`centered_viewport`], and pointer positions are mapped back into world space with
//! [`screen_to_world`]. World space has its origin in the bottom-left corner while device
//! pixels start in the top-left corner, so the vertical axis is mapped with a negative
//! screen size.

/// Device-pixel rectangle the traced image is blitted into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Vertical span with the device-pixel flip applied: `(screen_min, screen_size)`.
    pub fn flipped_vertical_span(&self) -> (f32, f32) {
        ((self.y + self.height) as f32, -(self.height as f32))
    }
}

/// How the view window moved during one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewChange {
    #[default]
    Unchanged,
    Pan,
    Zoom,
}

impl ViewChange {
    pub fn is_changed(self) -> bool {
        self != Self::Unchanged
    }

    /// Combines two changes from the same frame; zoom dominates pan.
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Zoom, _) | (_, Self::Zoom) => Self::Zoom,
            (Self::Pan, _) | (_, Self::Pan) => Self::Pan,
            _ => Self::Unchanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error("view size must be positive")]
    InvalidSize,
    #[error("zoom factor must be positive")]
    InvalidZoom,
    #[error("view arithmetic produced a non-finite value")]
    NonFiniteValue,
}

/// Largest rectangle inside `dst` with the aspect ratio of `src`, centered.
pub fn centered_viewport(
    src_width: i32,
    src_height: i32,
    dst_width: i32,
    dst_height: i32,
) -> Viewport {
    if src_width <= 0 || src_height <= 0 || dst_width <= 0 || dst_height <= 0 {
        return Viewport::default();
    }

    let src_aspect_ratio = src_width as f32 / src_height as f32;
    let dst_aspect_ratio = dst_width as f32 / dst_height as f32;
    if src_aspect_ratio > dst_aspect_ratio {
        let height = (dst_width as f32 / src_aspect_ratio).round() as i32;
        Viewport {
            x: 0,
            y: (dst_height - height) / 2,
            width: dst_width,
            height,
        }
    } else {
        let width = (dst_height as f32 * src_aspect_ratio).round() as i32;
        Viewport {
            x: (dst_width - width) / 2,
            y: 0,
            width,
            height: dst_height,
        }
    }
}

/// Maps one screen axis into world space. `screen_size` may be negative to flip the axis.
pub fn screen_to_world(
    x: f32,
    screen_min: f32,
    screen_size: f32,
    world_center: f32,
    world_size: f32,
) -> f32 {
    let u = (x - screen_min) / screen_size;
    world_center + (u - 0.5) * world_size
}

/// Inverse of [`screen_to_world`] for the same axis parameters.
pub fn world_to_screen(
    world: f32,
    screen_min: f32,
    screen_size: f32,
    world_center: f32,
    world_size: f32,
) -> f32 {
    let u = (world - world_center) / world_size + 0.5;
    screen_min + u * screen_size
}

/// World-space rectangle currently displayed, described by its center and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewWindow {
    center_x: f32,
    center_y: f32,
    width: f32,
    height: f32,
}

impl ViewWindow {
    pub fn new(center_x: f32, center_y: f32, width: f32, height: f32) -> Result<Self, ViewError> {
        if !center_x.is_finite() || !center_y.is_finite() {
            return Err(ViewError::NonFiniteValue);
        }
        if !width.is_finite() || !height.is_finite() {
            return Err(ViewError::NonFiniteValue);
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(ViewError::InvalidSize);
        }
        Ok(Self {
            center_x,
            center_y,
            width,
            height,
        })
    }

    pub fn center_x(&self) -> f32 {
        self.center_x
    }

    pub fn center_y(&self) -> f32 {
        self.center_y
    }

    pub fn center(&self) -> [f32; 2] {
        [self.center_x, self.center_y]
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn size(&self) -> [f32; 2] {
        [self.width, self.height]
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width / self.height
    }

    pub fn screen_point_to_world(
        &self,
        viewport: Viewport,
        screen_x: f32,
        screen_y: f32,
    ) -> (f32, f32) {
        let (screen_min_y, screen_size_y) = viewport.flipped_vertical_span();
        let world_x = screen_to_world(
            screen_x,
            viewport.x as f32,
            viewport.width as f32,
            self.center_x,
            self.width,
        );
        let world_y = screen_to_world(
            screen_y,
            screen_min_y,
            screen_size_y,
            self.center_y,
            self.height,
        );
        (world_x, world_y)
    }

    pub fn world_point_to_screen(
        &self,
        viewport: Viewport,
        world_x: f32,
        world_y: f32,
    ) -> (f32, f32) {
        let (screen_min_y, screen_size_y) = viewport.flipped_vertical_span();
        let screen_x = world_to_screen(
            world_x,
            viewport.x as f32,
            viewport.width as f32,
            self.center_x,
            self.width,
        );
        let screen_y = world_to_screen(
            world_y,
            screen_min_y,
            screen_size_y,
            self.center_y,
            self.height,
        );
        (screen_x, screen_y)
    }

    pub fn set_center(&mut self, center_x: f32, center_y: f32) -> Result<(), ViewError> {
        if !center_x.is_finite() || !center_y.is_finite() {
            return Err(ViewError::NonFiniteValue);
        }
        self.center_x = center_x;
        self.center_y = center_y;
        Ok(())
    }

    pub fn pan_by(&mut self, delta_x: f32, delta_y: f32) -> Result<(), ViewError> {
        let next_x = checked_add(self.center_x, delta_x)?;
        let next_y = checked_add(self.center_y, delta_y)?;
        self.center_x = next_x;
        self.center_y = next_y;
        Ok(())
    }

    /// Rescales the window by `zoom_factor` while keeping `(point_x, point_y)` fixed on screen.
    ///
    /// A factor below one zooms in. The window is left untouched when an error is returned.
    pub fn zoom_about_point(
        &mut self,
        zoom_factor: f32,
        point_x: f32,
        point_y: f32,
    ) -> Result<(), ViewError> {
        if !zoom_factor.is_finite() || zoom_factor <= 0.0 {
            return Err(ViewError::InvalidZoom);
        }
        if !point_x.is_finite() || !point_y.is_finite() {
            return Err(ViewError::NonFiniteValue);
        }

        let anchor_offset_x = checked_mul(checked_add(point_x, -self.center_x)?, zoom_factor)?;
        let anchor_offset_y = checked_mul(checked_add(point_y, -self.center_y)?, zoom_factor)?;
        let next_center_x = checked_add(point_x, -anchor_offset_x)?;
        let next_center_y = checked_add(point_y, -anchor_offset_y)?;
        let next_width = checked_mul(self.width, zoom_factor)?;
        let next_height = checked_mul(self.height, zoom_factor)?;
        if next_width <= 0.0 || next_height <= 0.0 {
            return Err(ViewError::InvalidSize);
        }

        self.center_x = next_center_x;
        self.center_y = next_center_y;
        self.width = next_width;
        self.height = next_height;
        Ok(())
    }
}

fn checked_add(current: f32, delta: f32) -> Result<f32, ViewError> {
    if !delta.is_finite() {
        return Err(ViewError::NonFiniteValue);
    }
    let next = current + delta;
    if !next.is_finite() {
        return Err(ViewError::NonFiniteValue);
    }
    Ok(next)
}

fn checked_mul(left: f32, right: f32) -> Result<f32, ViewError> {
    if !left.is_finite() || !right.is_finite() {
        return Err(ViewError::NonFiniteValue);
    }
    let next = left * right;
    if !next.is_finite() {
        return Err(ViewError::NonFiniteValue);
    }
    Ok(next)
}

bitflags::bitflags! {
    /// Action keys held during a frame.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ActionKeys: u8 {
        const RESET_SAMPLES = 1 << 0;
        const SAVE_SCENE = 1 << 1;
        const LOAD_SCENE = 1 << 2;
        const SAVE_SCREENSHOT = 1 << 3;
        const TOGGLE_OVERLAY = 1 << 4;
    }
}

/// Everything the windowing layer observed for one frame, polled once and consumed once.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputFrame {
    /// Cursor position in device pixels, origin at the top-left corner.
    pub cursor: [f32; 2],
    pub primary_button: bool,
    /// Scroll accumulated since the previous frame; positive zooms in.
    pub scroll_delta: f32,
    pub held_keys: ActionKeys,
    pub framebuffer_size: [i32; 2],
    pub ui_captures_pointer: bool,
    pub ui_captures_keyboard: bool,
}

impl InputFrame {
    pub fn idle(framebuffer_size: [i32; 2]) -> Self {
        Self {
            framebuffer_size,
            ..Self::default()
        }
    }
}

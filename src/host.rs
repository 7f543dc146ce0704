//! Host capability surface consumed by the interpreter.
//!
//! Rendering, audio, input, randomness and matrix persistence belong to
//! the host. The interpreter only calls these with integer and text
//! arguments evaluated from script expressions.

use crate::env::Matrix;
use crate::error::ScriptResult;

/// An RGB drawing color as evaluated from a script (components are not clamped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub red: i32,
    pub green: i32,
    pub blue: i32,
}

impl Rgb {
    pub fn new(red: i32, green: i32, blue: i32) -> Self {
        Self { red, green, blue }
    }
}

pub trait Host {
    fn output_text(&mut self, text: &str, x: i32, y: i32, color: Rgb);

    #[allow(clippy::too_many_arguments)]
    fn draw_image(
        &mut self,
        name: &str,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        angle: i32,
        flip_x: bool,
        flip_y: bool,
    );

    fn play_sound(&mut self, name: &str);

    fn play_music(&mut self, name: &str);

    /// Stop all audio.
    fn silence(&mut self);

    /// Present the current frame.
    fn refresh(&mut self);

    fn set_color(&mut self, color: Rgb);

    /// A random integer in the inclusive range `[low, high]`.
    fn random(&mut self, low: i32, high: i32) -> i32;

    fn load_matrix(&mut self, file: &str, matrix: &mut Matrix) -> ScriptResult<()>;

    fn save_matrix(&mut self, file: &str, matrix: &Matrix) -> ScriptResult<()>;

    /// Code of one pending input signal, or 0 when nothing is pending.
    fn read_signal(&mut self) -> i32;
}

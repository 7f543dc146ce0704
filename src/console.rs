//! Terminal host for the `sausage` binary.
//!
//! Text output goes to stdout, one line per call. Images and audio cannot
//! be rendered in a terminal, so those commands are only logged. Matrices
//! persist as plain text files under a data directory, and key input is
//! polled from the terminal when enabled.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::env::Matrix;
use crate::error::{Diagnostic, ScriptError, ScriptResult};
use crate::host::{Host, Rgb};

pub struct ConsoleOptions {
    /// Directory holding matrix files for `load` and `save`.
    pub data_dir: PathBuf,
    pub seed: Option<u64>,
    /// Poll the terminal for key presses (puts it in raw mode).
    pub keys: bool,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            seed: None,
            keys: false,
        }
    }
}

pub struct ConsoleHost {
    data_dir: PathBuf,
    rng: StdRng,
    raw_mode: bool,
    out: io::Stdout,
}

impl ConsoleHost {
    pub fn new(options: ConsoleOptions) -> io::Result<Self> {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        if options.keys {
            enable_raw_mode()?;
        }
        Ok(Self {
            data_dir: options.data_dir,
            rng,
            raw_mode: options.keys,
            out: io::stdout(),
        })
    }

    fn matrix_path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }
}

impl Drop for ConsoleHost {
    fn drop(&mut self) {
        let _ = self.out.flush();
        if self.raw_mode {
            let _ = disable_raw_mode();
        }
    }
}

impl Host for ConsoleHost {
    fn output_text(&mut self, text: &str, x: i32, y: i32, color: Rgb) {
        tracing::trace!(x, y, ?color, "output");
        // Raw mode disables the newline translation, so emit the carriage return ourselves.
        let line_end = if self.raw_mode { "\r\n" } else { "\n" };
        if let Err(e) = write_line(&mut self.out, text, line_end) {
            tracing::warn!(error = %e, "cannot write output");
        }
    }

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
    ) {
        tracing::debug!(name, x, y, width, height, angle, flip_x, flip_y, "draw");
    }

    fn play_sound(&mut self, name: &str) {
        tracing::debug!(name, "sound");
    }

    fn play_music(&mut self, name: &str) {
        tracing::debug!(name, "music");
    }

    fn silence(&mut self) {
        tracing::debug!("silence");
    }

    fn refresh(&mut self) {
        if let Err(e) = self.out.flush() {
            tracing::warn!(error = %e, "cannot flush output");
        }
    }

    fn set_color(&mut self, color: Rgb) {
        tracing::debug!(?color, "color");
    }

    fn random(&mut self, low: i32, high: i32) -> i32 {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        self.rng.random_range(low..=high)
    }

    fn load_matrix(&mut self, file: &str, matrix: &mut Matrix) -> ScriptResult<()> {
        let path = self.matrix_path(file);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            Diagnostic::new(ScriptError::Host)
                .with_detail(format!("cannot read '{}': {e}", path.display()))
        })?;
        read_matrix(&text, matrix).map_err(|detail| {
            Diagnostic::new(ScriptError::Host)
                .with_detail(format!("'{}': {detail}", path.display()))
        })
    }

    fn save_matrix(&mut self, file: &str, matrix: &Matrix) -> ScriptResult<()> {
        let path = self.matrix_path(file);
        std::fs::write(&path, write_matrix(matrix)).map_err(|e| {
            Diagnostic::new(ScriptError::Host)
                .with_detail(format!("cannot write '{}': {e}", path.display()))
        })
    }

    fn read_signal(&mut self) -> i32 {
        if !self.raw_mode {
            return 0;
        }
        while let Ok(true) = event::poll(Duration::ZERO) {
            match event::read() {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => return key_code(key),
                Ok(_) => {}
                Err(_) => break,
            }
        }
        0
    }
}

fn write_line(out: &mut impl Write, text: &str, line_end: &str) -> io::Result<()> {
    write!(out, "{text}{line_end}")
}

/// Map a key press to the integer code scripts compare against.
fn key_code(key: KeyEvent) -> i32 {
    match key.code {
        KeyCode::Char(c) => i32::try_from(u32::from(c)).unwrap_or(0),
        KeyCode::Enter => 13,
        KeyCode::Esc => 27,
        KeyCode::Backspace => 8,
        KeyCode::Tab => 9,
        KeyCode::Left => 37,
        KeyCode::Up => 38,
        KeyCode::Right => 39,
        KeyCode::Down => 40,
        _ => 0,
    }
}

/// Fill `matrix` from text: one row per line, whitespace-separated integers.
/// Rows and columns beyond the matrix are ignored.
fn read_matrix(text: &str, matrix: &mut Matrix) -> Result<(), String> {
    for (row, line) in text.lines().enumerate().take(matrix.height()) {
        for (col, cell) in line.split_whitespace().enumerate().take(matrix.width()) {
            let value = cell
                .parse::<i32>()
                .map_err(|_| format!("invalid number '{cell}' on line {}", row + 1))?;
            matrix.set(row, col, value);
        }
    }
    Ok(())
}

fn write_matrix(matrix: &Matrix) -> String {
    let mut out = String::new();
    for row in matrix.rows() {
        let cells: Vec<String> = row.iter().map(i32::to_string).collect();
        let _ = writeln!(out, "{}", cells.join(" "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    #[test]
    fn matrix_text_round_trip() {
        let mut grid = Matrix::new(3, 2);
        grid.set(0, 2, 7);
        grid.set(1, 0, -4);
        let text = write_matrix(&grid);
        assert_eq!(text, "0 0 7\n-4 0 0\n");

        let mut loaded = Matrix::new(3, 2);
        read_matrix(&text, &mut loaded).unwrap();
        assert_eq!(loaded, grid);
    }

    #[test]
    fn short_and_long_rows_are_tolerated() {
        let mut grid = Matrix::new(2, 2);
        read_matrix("1 2 3\n", &mut grid).unwrap();
        assert_eq!(grid.get(0, 1), Some(2));
        assert_eq!(grid.get(1, 0), Some(0));
    }

    #[test]
    fn bad_cell_is_reported() {
        let mut grid = Matrix::new(2, 1);
        let err = read_matrix("1 x\n", &mut grid).unwrap_err();
        assert!(err.contains("'x'"));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_line_ends_each_line() {
        let mut out = Vec::new();
        write_line(&mut out, "score 10", "\n").unwrap();
        write_line(&mut out, "lives 3", "\r\n").unwrap();
        assert_eq!(out, b"score 10\nlives 3\r\n");
    }

    #[test]
    fn write_line_reports_closed_output() {
        let err = write_line(&mut ClosedPipe, "score 10", "\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn key_codes() {
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(key_code(key(KeyCode::Char('a'))), 97);
        assert_eq!(key_code(key(KeyCode::Up)), 38);
        assert_eq!(key_code(key(KeyCode::Esc)), 27);
        assert_eq!(key_code(key(KeyCode::F(1))), 0);
    }

    #[test]
    fn seeded_random_is_reproducible_and_bounded() {
        let options = || ConsoleOptions {
            seed: Some(7),
            ..ConsoleOptions::default()
        };
        let mut a = ConsoleHost::new(options()).unwrap();
        let mut b = ConsoleHost::new(options()).unwrap();
        for _ in 0..100 {
            let value = a.random(10, 1);
            assert!((1..=10).contains(&value));
            assert_eq!(value, b.random(10, 1));
        }
    }

    #[test]
    fn matrix_files_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = ConsoleHost::new(ConsoleOptions {
            data_dir: dir.path().to_path_buf(),
            ..ConsoleOptions::default()
        })
        .unwrap();
        let mut grid = Matrix::new(2, 2);
        grid.set(1, 1, 5);
        host.save_matrix("level.txt", &grid).unwrap();
        let mut loaded = Matrix::new(2, 2);
        host.load_matrix("level.txt", &mut loaded).unwrap();
        assert_eq!(loaded, grid);
        let err = host.load_matrix("missing.txt", &mut loaded).unwrap_err();
        assert_eq!(err.error, ScriptError::Host);
    }
}

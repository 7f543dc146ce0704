use std::time::Duration;

use sausage_script::env::Matrix;
use sausage_script::{Host, Interpreter, Program, Rgb, ScriptError, ScriptResult, Status};

/// Host that records text output and answers `rand` with the low bound.
#[derive(Default)]
struct Screen {
    lines: Vec<(String, i32, i32, Rgb)>,
    frames: usize,
}

impl Host for Screen {
    fn output_text(&mut self, text: &str, x: i32, y: i32, color: Rgb) {
        self.lines.push((text.to_string(), x, y, color));
    }

    fn draw_image(&mut self, _: &str, _: i32, _: i32, _: i32, _: i32, _: i32, _: bool, _: bool) {}

    fn play_sound(&mut self, _: &str) {}

    fn play_music(&mut self, _: &str) {}

    fn silence(&mut self) {}

    fn refresh(&mut self) {
        self.frames += 1;
    }

    fn set_color(&mut self, _: Rgb) {}

    fn random(&mut self, low: i32, _high: i32) -> i32 {
        low
    }

    fn load_matrix(&mut self, _: &str, _: &mut Matrix) -> ScriptResult<()> {
        Ok(())
    }

    fn save_matrix(&mut self, _: &str, _: &Matrix) -> ScriptResult<()> {
        Ok(())
    }

    fn read_signal(&mut self) -> i32 {
        0
    }
}

fn interpreter(source: &str) -> Interpreter<Screen> {
    let program = Program::parse("game", source).expect("tokenize");
    Interpreter::new(program, Screen::default())
}

#[test]
fn output_receives_position_and_color() {
    let mut interp = interpreter(
        ":var x\n:store 4 in x\n:string title as \"Game Over\"\n:output title at x * 10 20 color 255 x 0\n:stop\n",
    );
    interp.run(Duration::from_secs(5)).unwrap();
    assert_eq!(interp.status(), Status::Done);
    assert_eq!(
        interp.host().lines,
        vec![("Game Over".to_string(), 40, 20, Rgb::new(255, 4, 0))]
    );
}

#[test]
fn host_random_source_is_used() {
    let mut interp = interpreter(":var r\n:store 3 rand 9 in r\n:number r at 0 0 color 0 0 0\n:stop\n");
    interp.run(Duration::from_secs(5)).unwrap();
    assert_eq!(interp.host().lines[0].0, "3");
}

#[test]
fn game_loop_across_frames() {
    let source = "\
Counts frames until the counter reaches 5.
:var frame
:while frame < 5 do
:store frame + 1 in frame
:refresh
:end
:number frame at 0 0 color 0 0 0
:stop
";
    let mut interp = interpreter(source);
    let mut ticks = 0;
    while interp.status() != Status::Done {
        interp.run(Duration::from_millis(50)).unwrap();
        ticks += 1;
        assert!(ticks < 1000, "script did not finish");
    }
    assert_eq!(interp.host().frames, 5);
    assert_eq!(interp.host().lines[0].0, "5");
    assert_eq!(interp.stack_depth(), 0);
}

#[test]
fn error_carries_provenance() {
    let mut interp = interpreter("comment\n:var x\n:store x + y in x\n:stop\n");
    let err = interp.run(Duration::from_secs(5)).unwrap_err();
    assert_eq!(err.error, ScriptError::Reference);
    let loc = err.location.expect("location");
    assert_eq!(loc.line, 3);
    assert_eq!(loc.source, "game");
    assert_eq!(loc.token, "y");
    assert_eq!(interp.status(), Status::Done);
}

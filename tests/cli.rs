use std::io::Write;
use std::process::Command;

fn run_script(code: &str) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_sausage"))
        .args(["-e", code])
        .output()
        .expect("failed to run sausage");
    assert!(
        output.status.success(),
        "sausage exited with error for input '{code}': {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout)
        .expect("non-utf8 output")
        .trim()
        .to_string()
}

fn run_script_fail(code: &str) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_sausage"))
        .args(["-e", code])
        .output()
        .expect("failed to run sausage");
    assert!(
        !output.status.success(),
        "expected sausage to fail for input '{code}'"
    );
    String::from_utf8(output.stderr)
        .expect("non-utf8 output")
        .trim()
        .to_string()
}

fn run_file(source: &str, extra: &[&str]) -> std::process::Output {
    let mut tmp = tempfile::NamedTempFile::with_suffix(".ss").expect("failed to create temp file");
    tmp.write_all(source.as_bytes()).expect("failed to write");
    tmp.flush().expect("failed to flush");
    Command::new(env!("CARGO_BIN_EXE_sausage"))
        .arg(tmp.path())
        .args(extra)
        .output()
        .expect("failed to run sausage")
}

// ── Expressions ────────────────────────────────────────────────

#[test]
fn number_output() {
    assert_eq!(
        run_script("var x\nstore 3 + 4 * 2 in x\nnumber x at 0 0 color 255 255 255\nstop"),
        "14"
    );
}

#[test]
fn string_output() {
    assert_eq!(
        run_script("string hello as \"Hello, World!\"\noutput hello at 10 10 color 0 0 0\nstop"),
        "Hello, World!"
    );
}

#[test]
fn rand_output_is_bounded() {
    let out = run_script(
        "var i\nvar r\nwhile i < 30 do\nstore 1 rand 6 in r\nnumber r at 0 0 color 0 0 0\nstore i + 1 in i\nend\nstop",
    );
    for line in out.lines() {
        let n: i32 = line.parse().unwrap();
        assert!((1..=6).contains(&n));
    }
    assert_eq!(out.lines().count(), 30);
}

// ── Control flow ───────────────────────────────────────────────

#[test]
fn countdown_loop() {
    assert_eq!(
        run_script(
            "var n\nstore 3 in n\nwhile n > 0 do\nnumber n at 0 0 color 0 0 0\nstore n - 1 in n\nend\nstop"
        ),
        "3\n2\n1"
    );
}

#[test]
fn subroutine_call() {
    assert_eq!(
        run_script(
            "string hi as hi\ncall greet\ncall greet\nstop\nsubroutine greet\noutput hi at 0 0 color 0 0 0\nend"
        ),
        "hi\nhi"
    );
}

// ── Errors ─────────────────────────────────────────────────────

#[test]
fn undeclared_store_reports_token() {
    let err = run_script_fail("store 5 in score\nstop");
    assert!(err.contains("Reference error"), "{err}");
    assert!(err.contains("Token: score"), "{err}");
    assert!(err.contains("Line No: 1"), "{err}");
}

#[test]
fn invalid_command_reports_line() {
    let err = run_script_fail("var x\nwarp x");
    assert!(err.contains("Invalid command warp."), "{err}");
    assert!(err.contains("Line No: 2"), "{err}");
}

#[test]
fn exhaustion_is_fatal() {
    let err = run_script_fail("var x");
    assert!(err.contains("No more tokens left"), "{err}");
}

// ── Source files ───────────────────────────────────────────────

#[test]
fn only_marked_lines_run() {
    let source = "Demo game.\n:string msg as \"from file\"\nThis line is ignored: stop\n:output msg at 0 0 color 0 0 0\n:stop\n";
    let out = run_file(source, &[]);
    assert!(out.status.success());
    assert_eq!(String::from_utf8(out.stdout).unwrap().trim(), "from file");
}

#[test]
fn error_names_source_file() {
    let out = run_file(":var x\n:store y in x\n:stop\n", &[]);
    assert!(!out.status.success());
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("Source: "), "{stderr}");
    assert!(stderr.contains(".ss"), "{stderr}");
    assert!(stderr.contains("Line No: 2"), "{stderr}");
}

#[test]
fn missing_file_is_load_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_sausage"))
        .arg("/no/such/game")
        .output()
        .expect("failed to run sausage");
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Cannot load source"), "{stderr}");
}

#[test]
fn max_frames_ends_endless_script() {
    let out = run_file(
        ":var i\n:while 1 = 1 do\n:store i + 1 in i\n:end\n",
        &["--max-frames", "2", "--timeout", "1", "--frame", "1"],
    );
    assert!(out.status.success());
}

#[test]
fn save_and_load_through_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let source = ":matrix grid size 2 2\n:matrix copy size 2 2\n:var r\n:var c\n:store 1 in c\n:store 8 in grid->r->c\n:save \"level.txt\" to grid\n:load copy from \"level.txt\"\n:number copy->r->c at 0 0 color 0 0 0\n:stop\n";
    let out = run_file(source, &["--data-dir", dir.path().to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8(out.stdout).unwrap().trim(), "8");
    let saved = std::fs::read_to_string(dir.path().join("level.txt")).unwrap();
    assert_eq!(saved, "0 8\n0 0\n");
}

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use sausage_script::console::{ConsoleHost, ConsoleOptions};
use sausage_script::{Diagnostic, Interpreter, Program, ScriptError, ScriptResult, Status};

#[derive(Parser)]
#[command(name = "sausage")]
#[command(about = "Run a Sausage Script game")]
#[command(version)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Script source identifier (`.ss` is appended when the bare name does not exist)
    source: Option<String>,

    /// Run script text directly; every line is code
    #[arg(short = 'e', long, conflicts_with = "source")]
    eval: Option<String>,

    /// Interpreter time budget per frame, in milliseconds
    #[arg(long, env = "SAUSAGE_TIMEOUT", default_value_t = 20)]
    timeout: u64,

    /// Frame period, in milliseconds
    #[arg(long, env = "SAUSAGE_FRAME", default_value_t = 16)]
    frame: u64,

    /// Exit after this many frames even if the script has not stopped
    #[arg(long)]
    max_frames: Option<u64>,

    /// Directory for matrix files used by `load` and `save`
    #[arg(long, env = "SAUSAGE_DATA", default_value = ".")]
    data_dir: PathBuf,

    /// Seed for the random number source
    #[arg(long)]
    seed: Option<u64>,

    /// Read key presses from the terminal for `getkey`
    #[arg(long)]
    keys: bool,
}

/// Install a log subscriber when `RUST_LOG` is set, e.g. `RUST_LOG=sausage_script=debug`.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> ScriptResult<()> {
    let program = match (&cli.eval, &cli.source) {
        (Some(code), _) => Program::from_code("<eval>", code)?,
        (None, Some(source)) => Program::load(source)?,
        (None, None) => {
            return Err(Diagnostic::new(ScriptError::Load).with_detail("no script given"));
        }
    };

    let host = ConsoleHost::new(ConsoleOptions {
        data_dir: cli.data_dir.clone(),
        seed: cli.seed,
        keys: cli.keys,
    })
    .map_err(|e| {
        Diagnostic::new(ScriptError::Host).with_detail(format!("cannot set up terminal: {e}"))
    })?;

    let mut interpreter = Interpreter::new(program, host);
    let timeout = Duration::from_millis(cli.timeout);
    let frame = Duration::from_millis(cli.frame);
    let mut frames = 0u64;

    while interpreter.status() != Status::Done {
        let frame_start = Instant::now();
        interpreter.run(timeout)?;
        frames += 1;
        if cli.max_frames.is_some_and(|max| frames >= max) {
            tracing::info!(frames, "frame limit reached");
            interpreter.stop();
            break;
        }
        if let Some(rest) = frame.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    tracing::debug!(frames, "script finished");
    Ok(())
}

//! Script interpreter — token stream + symbol store -> execution.
//!
//! There is no syntax tree. The interpreter keeps a cursor into the token
//! arena and dispatches one command per step. Block boundaries are found
//! on demand by scanning forward, and a single untagged stack of cursor
//! positions serves both loop re-entry and subroutine return.
//!
//! `end` pops whatever frame is on top. An `if` whose true branch ends
//! inside a `while` body therefore pops the loop frame and jumps back to
//! the `while`, skipping the rest of that iteration. Scripts must be
//! written with that in mind.
//!
//! Skipping a false `if` body treats `else` as a block closer at every
//! nesting level. A nested `if … else … end` inside the skipped body is
//! closed by its `else`, so its `end` closes the outer `if` and whatever
//! follows it in the false body runs. Keep `if … else` blocks out of
//! branches that may be skipped, or move them into a subroutine.

use std::time::{Duration, Instant};

use crate::env::Environment;
use crate::error::{Diagnostic, ScriptError, ScriptResult};
use crate::host::{Host, Rgb};
use crate::lexer::{string_literal, Program, Token};

/// The approximation of π that `cos` and `sin` have always used.
/// Existing scripts depend on the exact results it produces.
#[allow(clippy::approx_constant)]
const PI_APPROX: f64 = 3.14;

/// Interpreter lifecycle. `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Tokens loaded, nothing dispatched yet.
    Idle,
    Running,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Rand,
    Cos,
    Sin,
}

impl Operator {
    fn from_token(text: &str) -> Option<Self> {
        match text {
            "+" => Some(Self::Add),
            "-" => Some(Self::Sub),
            "*" => Some(Self::Mul),
            "/" => Some(Self::Div),
            "rem" => Some(Self::Rem),
            "rand" => Some(Self::Rand),
            "cos" => Some(Self::Cos),
            "sin" => Some(Self::Sin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparator {
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterEq,
    LessEq,
}

impl Comparator {
    fn from_token(text: &str) -> Option<Self> {
        match text {
            "=" => Some(Self::Equal),
            "not" => Some(Self::NotEqual),
            ">" => Some(Self::Greater),
            "<" => Some(Self::Less),
            ">or=" => Some(Self::GreaterEq),
            "<or=" => Some(Self::LessEq),
            _ => None,
        }
    }

    fn test(self, diff: i64) -> bool {
        match self {
            Self::Equal => diff == 0,
            Self::NotEqual => diff != 0,
            Self::Greater => diff > 0,
            Self::Less => diff < 0,
            Self::GreaterEq => diff >= 0,
            Self::LessEq => diff <= 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Logic {
    And,
    Or,
}

impl Logic {
    fn from_token(text: &str) -> Option<Self> {
        match text {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    If,
    Else,
    End,
    While,
    Subroutine,
    Call,
    Store,
    Output,
    Number,
    Define,
    Object,
    Map,
    Var,
    List,
    Matrix,
    String,
    Load,
    Save,
    Draw,
    Sound,
    Music,
    Silence,
    Refresh,
    Color,
    GetKey,
    Stop,
}

impl Command {
    fn from_token(text: &str) -> Option<Self> {
        let command = match text {
            "if" => Self::If,
            "else" => Self::Else,
            "end" => Self::End,
            "while" => Self::While,
            "subroutine" => Self::Subroutine,
            "call" => Self::Call,
            "store" => Self::Store,
            "output" => Self::Output,
            "number" => Self::Number,
            "define" => Self::Define,
            "object" => Self::Object,
            "map" => Self::Map,
            "var" => Self::Var,
            "list" => Self::List,
            "matrix" => Self::Matrix,
            "string" => Self::String,
            "load" => Self::Load,
            "save" => Self::Save,
            "draw" => Self::Draw,
            "sound" => Self::Sound,
            "music" => Self::Music,
            "silence" => Self::Silence,
            "refresh" => Self::Refresh,
            "color" => Self::Color,
            "getkey" => Self::GetKey,
            "stop" => Self::Stop,
            _ => return None,
        };
        Some(command)
    }
}

/// Keywords that open a block terminated by `end` (or `else`).
fn opens_block(text: &str) -> bool {
    matches!(text, "if" | "while" | "subroutine" | "object" | "map")
}

fn closes_block(text: &str) -> bool {
    matches!(text, "end" | "else")
}

pub struct Interpreter<H: Host> {
    program: Program,
    /// Index of the next token to read.
    pointer: usize,
    status: Status,
    /// Saved cursor positions: loop starts and return addresses alike.
    stack: Vec<usize>,
    env: Environment,
    host: H,
}

impl<H: Host> Interpreter<H> {
    /// Load a script file by source identifier.
    pub fn load(source: &str, host: H) -> ScriptResult<Self> {
        let program = Program::load(source)?;
        Ok(Self::new(program, host))
    }

    pub fn new(program: Program, host: H) -> Self {
        let mut interpreter = Self {
            program,
            pointer: 0,
            status: Status::Idle,
            stack: Vec::new(),
            env: Environment::new(),
            host,
        };
        interpreter.status = Status::Running;
        interpreter
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Host-triggered cleanup: end the session.
    pub fn stop(&mut self) {
        self.status = Status::Done;
    }

    /// Execute whole dispatch steps until `timeout` has elapsed or the
    /// script is done. A step is never interrupted part way through.
    pub fn run(&mut self, timeout: Duration) -> ScriptResult<()> {
        let start = Instant::now();
        while self.status != Status::Done && start.elapsed() < timeout {
            self.step()?;
        }
        Ok(())
    }

    /// Execute exactly one command. Any error ends the session.
    pub fn step(&mut self) -> ScriptResult<()> {
        if self.status == Status::Done {
            return Ok(());
        }
        let result = self.interpret();
        if result.is_err() {
            self.status = Status::Done;
        }
        result
    }

    // ── token access ─────────────────────────────────────────────────

    fn exhausted(&self) -> Diagnostic {
        let diag = Diagnostic::new(ScriptError::Exhaustion);
        match self.program.last() {
            Some(last) => diag.at(last),
            None => diag,
        }
    }

    /// Consume the token at the cursor, returning its index.
    fn advance(&mut self) -> ScriptResult<usize> {
        if self.pointer >= self.program.len() {
            return Err(self.exhausted());
        }
        let index = self.pointer;
        self.pointer += 1;
        Ok(index)
    }

    fn peek(&self) -> ScriptResult<&Token> {
        self.program.get(self.pointer).ok_or_else(|| self.exhausted())
    }

    fn expect_keyword(&mut self, keyword: &str) -> ScriptResult<()> {
        let index = self.advance()?;
        let token = &self.program[index];
        if token.is(keyword) {
            Ok(())
        } else {
            Err(Diagnostic::parse(token, format!("Keyword {keyword} missing.")))
        }
    }

    /// Attach the offending token to a host failure that lacks one.
    fn host_failure(&self, diag: Diagnostic, index: usize) -> Diagnostic {
        if diag.location.is_some() {
            diag
        } else {
            diag.at(&self.program[index])
        }
    }

    // ── expressions ──────────────────────────────────────────────────

    /// `operand (operator operand)*`, folded strictly left to right.
    fn eval_expression(&mut self) -> ScriptResult<i32> {
        let mut result = self.eval_operand()?;
        while let Some(op) = Operator::from_token(&self.peek()?.text) {
            let op_index = self.advance()?;
            let value = self.eval_operand()?;
            result = self.apply(op, op_index, result, value)?;
        }
        Ok(result)
    }

    fn eval_operand(&mut self) -> ScriptResult<i32> {
        let index = self.advance()?;
        let token = &self.program[index];
        match token.text.parse::<i32>() {
            Ok(value) => Ok(value),
            Err(_) => self.env.read(token),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn apply(&mut self, op: Operator, op_index: usize, acc: i32, value: i32) -> ScriptResult<i32> {
        let result = match op {
            Operator::Add => acc.wrapping_add(value),
            Operator::Sub => acc.wrapping_sub(value),
            Operator::Mul => acc.wrapping_mul(value),
            Operator::Div => acc.checked_div(value).ok_or_else(|| {
                Diagnostic::new(ScriptError::Arithmetic)
                    .at(&self.program[op_index])
                    .with_detail(format!("Cannot divide {acc} by {value}."))
            })?,
            Operator::Rem => acc.checked_rem(value).ok_or_else(|| {
                Diagnostic::new(ScriptError::Arithmetic)
                    .at(&self.program[op_index])
                    .with_detail(format!("Cannot take remainder of {acc} by {value}."))
            })?,
            Operator::Rand => self.host.random(acc, value),
            Operator::Cos => {
                let radians = f64::from(value) * PI_APPROX / 180.0;
                (f64::from(acc) * radians.cos()).round() as i32
            }
            Operator::Sin => {
                let radians = f64::from(value) * PI_APPROX / 180.0;
                (f64::from(acc) * radians.sin()).round() as i32
            }
        };
        Ok(result)
    }

    // ── conditions ───────────────────────────────────────────────────

    /// `expression comparator expression`.
    fn eval_condition(&mut self) -> ScriptResult<bool> {
        let left = self.eval_expression()?;
        let test_index = self.advance()?;
        let right = self.eval_expression()?;
        let diff = i64::from(left) - i64::from(right);
        let test = &self.program[test_index];
        match Comparator::from_token(&test.text) {
            Some(comparator) => Ok(comparator.test(diff)),
            None => Err(Diagnostic::parse(test, format!("Invalid test {}.", test.text))),
        }
    }

    /// Comparisons chained with `and`/`or`, left to right. `and` multiplies
    /// and `or` adds, so a true result may exceed 1: callers test nonzero.
    fn eval_conditional(&mut self) -> ScriptResult<i32> {
        let mut result = i32::from(self.eval_condition()?);
        while let Some(logic) = Logic::from_token(&self.peek()?.text) {
            self.advance()?;
            let test = i32::from(self.eval_condition()?);
            result = match logic {
                Logic::And => result.wrapping_mul(test),
                Logic::Or => result.wrapping_add(test),
            };
        }
        Ok(result)
    }

    fn eval_color(&mut self) -> ScriptResult<Rgb> {
        let red = self.eval_expression()?;
        let green = self.eval_expression()?;
        let blue = self.eval_expression()?;
        Ok(Rgb::new(red, green, blue))
    }

    fn eval_size(&mut self, what: &str) -> ScriptResult<usize> {
        let first = self.pointer;
        let size = self.eval_expression()?;
        usize::try_from(size)
            .map_err(|_| Diagnostic::parse(&self.program[first], format!("Invalid {what} {size}.")))
    }

    // ── control flow ─────────────────────────────────────────────────

    /// Move the cursor past the `end` or `else` closing the current block,
    /// skipping nested blocks whole. A nested block also closes at its first
    /// `end` or `else`.
    fn skip_block(&mut self, opener: usize) -> ScriptResult<()> {
        let mut open: Vec<usize> = Vec::new();
        while self.pointer < self.program.len() {
            let index = self.pointer;
            self.pointer += 1;
            let text = &self.program[index].text;
            if closes_block(text) {
                if open.pop().is_none() {
                    return Ok(());
                }
            } else if opens_block(text) {
                open.push(index);
            }
        }
        let unterminated = open.last().copied().unwrap_or(opener);
        Err(Diagnostic::parse(
            &self.program[unterminated],
            "Could not find end token.",
        ))
    }

    /// Scan forward (never wrapping) for `subroutine <name>` and place the
    /// cursor on the first token of its body.
    fn find_subroutine(&mut self, name: &str) -> ScriptResult<()> {
        while self.pointer < self.program.len() {
            let index = self.advance()?;
            if self.program[index].is("subroutine") {
                let name_index = self.advance()?;
                if self.program[name_index].is(name) {
                    return Ok(());
                }
            }
        }
        tracing::warn!(subroutine = name, "subroutine not found after call site");
        Ok(())
    }

    // ── dispatch ─────────────────────────────────────────────────────

    #[allow(clippy::too_many_lines)]
    fn interpret(&mut self) -> ScriptResult<()> {
        let command_pos = self.advance()?;
        let token = &self.program[command_pos];
        tracing::trace!(command = %token.text, line = token.line_no, "dispatch");
        let command = Command::from_token(&token.text)
            .ok_or_else(|| Diagnostic::parse(token, format!("Invalid command {}.", token.text)))?;

        match command {
            Command::If => {
                let result = self.eval_conditional()?;
                self.expect_keyword("then")?;
                if result == 0 {
                    self.skip_block(command_pos)?;
                }
            }
            Command::Else | Command::Subroutine => self.skip_block(command_pos)?,
            Command::End => {
                if let Some(position) = self.stack.pop() {
                    self.pointer = position;
                }
            }
            Command::While => {
                let result = self.eval_conditional()?;
                self.expect_keyword("do")?;
                if result == 0 {
                    self.skip_block(command_pos)?;
                } else {
                    self.stack.push(command_pos);
                }
            }
            Command::Call => {
                let name_index = self.advance()?;
                self.stack.push(self.pointer);
                let name = self.program[name_index].text.clone();
                tracing::debug!(subroutine = %name, depth = self.stack.len(), "call");
                self.find_subroutine(&name)?;
            }
            Command::Store => {
                let value = self.eval_expression()?;
                self.expect_keyword("in")?;
                let location = self.advance()?;
                self.env.write(&self.program[location], value)?;
            }
            Command::Output => {
                let name = self.advance()?;
                self.expect_keyword("at")?;
                let x = self.eval_expression()?;
                let y = self.eval_expression()?;
                self.expect_keyword("color")?;
                let color = self.eval_color()?;
                let token = &self.program[name];
                let text = self.env.string(&token.text).ok_or_else(|| {
                    Diagnostic::reference(token, format!("String {} was not found.", token.text))
                })?;
                self.host.output_text(text, x, y, color);
            }
            Command::Number => {
                let name = self.advance()?;
                self.expect_keyword("at")?;
                let x = self.eval_expression()?;
                let y = self.eval_expression()?;
                self.expect_keyword("color")?;
                let color = self.eval_color()?;
                let value = self.env.read(&self.program[name])?;
                self.host.output_text(&value.to_string(), x, y, color);
            }
            Command::Define => {
                let name = self.advance()?;
                self.expect_keyword("as")?;
                let value_index = self.advance()?;
                let token = &self.program[value_index];
                let value = token.text.parse::<i32>().map_err(|_| {
                    Diagnostic::parse(token, format!("Invalid number {}.", token.text))
                })?;
                self.env.define(&self.program[name].text, value);
            }
            Command::Object => {
                let prefix = self.advance()?;
                self.expect_keyword("as")?;
                let mut next = 0;
                loop {
                    let index = self.advance()?;
                    let token = &self.program[index];
                    if token.is("end") {
                        break;
                    }
                    let name = format!("{}:{}", self.program[prefix].text, token.text);
                    self.env.define(&name, next);
                    next += 1;
                }
            }
            Command::Map => {
                let mut next = 0;
                loop {
                    let index = self.advance()?;
                    let token = &self.program[index];
                    if token.is("end") {
                        break;
                    }
                    self.env.define(&token.text, next);
                    next += 1;
                }
            }
            Command::Var => {
                let name = self.advance()?;
                self.env.declare_var(&self.program[name].text);
            }
            Command::List => {
                let name = self.advance()?;
                self.expect_keyword("size")?;
                let size = self.eval_size("list size")?;
                let name = &self.program[name].text;
                tracing::debug!(list = %name, size, "allocate list");
                self.env.declare_list(name, size);
            }
            Command::Matrix => {
                let name = self.advance()?;
                self.expect_keyword("size")?;
                let width = self.eval_size("matrix width")?;
                let height = self.eval_size("matrix height")?;
                let name = &self.program[name].text;
                tracing::debug!(matrix = %name, width, height, "allocate matrix");
                self.env.declare_matrix(name, width, height);
            }
            Command::String => {
                let name = self.advance()?;
                self.expect_keyword("as")?;
                let value = self.advance()?;
                let text = string_literal(&self.program[value].text);
                self.env.declare_string(&self.program[name].text, text);
            }
            Command::Load => {
                let name = self.advance()?;
                self.expect_keyword("from")?;
                let file = self.advance()?;
                let token = &self.program[name];
                let file_name = string_literal(&self.program[file].text);
                let matrix = self.env.matrix_mut(&token.text).ok_or_else(|| {
                    Diagnostic::reference(token, format!("Matrix {} does not exist.", token.text))
                })?;
                if let Err(diag) = self.host.load_matrix(file_name, matrix) {
                    return Err(self.host_failure(diag, file));
                }
            }
            Command::Save => {
                let file = self.advance()?;
                self.expect_keyword("to")?;
                let name = self.advance()?;
                let token = &self.program[name];
                let file_name = string_literal(&self.program[file].text);
                let matrix = self.env.matrix(&token.text).ok_or_else(|| {
                    Diagnostic::reference(token, format!("Matrix {} does not exist.", token.text))
                })?;
                if let Err(diag) = self.host.save_matrix(file_name, matrix) {
                    return Err(self.host_failure(diag, file));
                }
            }
            Command::Draw => {
                let name = self.advance()?;
                self.expect_keyword("at")?;
                let x = self.eval_expression()?;
                let y = self.eval_expression()?;
                let width = self.eval_expression()?;
                let height = self.eval_expression()?;
                self.expect_keyword("angle")?;
                let angle = self.eval_expression()?;
                self.expect_keyword("flip")?;
                let flip_x = self.eval_expression()?;
                let flip_y = self.eval_expression()?;
                self.host.draw_image(
                    &self.program[name].text,
                    x,
                    y,
                    width,
                    height,
                    angle,
                    flip_x != 0,
                    flip_y != 0,
                );
            }
            Command::Sound => {
                let name = self.advance()?;
                self.host.play_sound(&self.program[name].text);
            }
            Command::Music => {
                let name = self.advance()?;
                self.host.play_music(&self.program[name].text);
            }
            Command::Silence => self.host.silence(),
            Command::Refresh => self.host.refresh(),
            Command::Color => {
                let color = self.eval_color()?;
                self.host.set_color(color);
            }
            Command::GetKey => {
                let code = self.host.read_signal();
                let location = self.advance()?;
                self.env.write(&self.program[location], code)?;
            }
            Command::Stop => {
                tracing::info!(line = self.program[command_pos].line_no, "stop");
                self.status = Status::Done;
            }
        }
        Ok(())
    }
}

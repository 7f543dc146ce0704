//! Symbol store — the five script namespaces and address resolution.
//!
//! Variables, constants, lists, matrices and strings live in independent
//! tables. A bare name resolves against variables first, then constants.
//! `list->i` addresses a list element by the value of variable `i`, and
//! `grid->row->col` addresses a matrix element, row first.

use std::collections::HashMap;

use crate::error::{Diagnostic, ScriptResult};
use crate::lexer::Token;

/// Separator between a container name and its index variables.
pub const INDEX_SEPARATOR: &str = "->";

/// A fixed-length, zero-initialized list of integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    items: Vec<i32>,
}

impl List {
    pub fn new(len: usize) -> Self {
        Self {
            items: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<i32> {
        self.items.get(index).copied()
    }
}

/// A fixed-size, zero-initialized grid of integers, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    width: usize,
    height: usize,
    cells: Vec<i32>,
}

impl Matrix {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, row: usize, col: usize) -> Option<i32> {
        self.offset(row, col).map(|i| self.cells[i])
    }

    /// Set a cell; returns `false` when the position is outside the grid.
    pub fn set(&mut self, row: usize, col: usize, value: i32) -> bool {
        match self.offset(row, col) {
            Some(i) => {
                self.cells[i] = value;
                true
            }
            None => false,
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[i32]> {
        // chunks() rejects a zero chunk size; a zero-width grid has no cells anyway.
        self.cells.chunks(self.width.max(1))
    }

    fn offset(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.height && col < self.width).then(|| row * self.width + col)
    }
}

/// A parsed location reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address<'a> {
    Scalar(&'a str),
    ListElement { list: &'a str, index: &'a str },
    MatrixElement { matrix: &'a str, row: &'a str, col: &'a str },
}

impl<'a> Address<'a> {
    /// Parse address text. Returns `None` for more than two index parts.
    pub fn parse(text: &'a str) -> Option<Self> {
        let parts: Vec<&str> = text.split(INDEX_SEPARATOR).collect();
        match parts[..] {
            [name] => Some(Self::Scalar(name)),
            [list, index] => Some(Self::ListElement { list, index }),
            [matrix, row, col] => Some(Self::MatrixElement { matrix, row, col }),
            _ => None,
        }
    }
}

/// A resolved storage slot.
enum Slot<'a> {
    Var(&'a str),
    Constant(&'a str),
    ListCell(&'a str, usize),
    MatrixCell(&'a str, usize, usize),
}

#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, i32>,
    /// Named constants. Store operations may still overwrite them.
    constants: HashMap<String, i32>,
    lists: HashMap<String, List>,
    matrices: HashMap<String, Matrix>,
    strings: HashMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    // ── declarations ─────────────────────────────────────────────────

    pub fn declare_var(&mut self, name: &str) {
        self.vars.insert(name.to_string(), 0);
    }

    pub fn define(&mut self, name: &str, value: i32) {
        self.constants.insert(name.to_string(), value);
    }

    pub fn declare_list(&mut self, name: &str, len: usize) {
        self.lists.insert(name.to_string(), List::new(len));
    }

    pub fn declare_matrix(&mut self, name: &str, width: usize, height: usize) {
        self.matrices
            .insert(name.to_string(), Matrix::new(width, height));
    }

    pub fn declare_string(&mut self, name: &str, text: &str) {
        self.strings.insert(name.to_string(), text.to_string());
    }

    // ── direct lookups ───────────────────────────────────────────────

    pub fn var(&self, name: &str) -> Option<i32> {
        self.vars.get(name).copied()
    }

    pub fn constant(&self, name: &str) -> Option<i32> {
        self.constants.get(name).copied()
    }

    pub fn list(&self, name: &str) -> Option<&List> {
        self.lists.get(name)
    }

    pub fn matrix(&self, name: &str) -> Option<&Matrix> {
        self.matrices.get(name)
    }

    pub fn matrix_mut(&mut self, name: &str) -> Option<&mut Matrix> {
        self.matrices.get_mut(name)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.strings.get(name).map(String::as_str)
    }

    // ── addressed access ─────────────────────────────────────────────

    /// Read the value at the location named by `token`.
    pub fn read(&self, token: &Token) -> ScriptResult<i32> {
        let value = match self.locate(token)? {
            Slot::Var(name) => self.vars[name],
            Slot::Constant(name) => self.constants[name],
            // `locate` has already bounds-checked both cell kinds.
            Slot::ListCell(name, index) => self.lists[name].get(index).unwrap_or_default(),
            Slot::MatrixCell(name, row, col) => {
                self.matrices[name].get(row, col).unwrap_or_default()
            }
        };
        Ok(value)
    }

    /// Store `value` at the location named by `token`.
    pub fn write(&mut self, token: &Token, value: i32) -> ScriptResult<()> {
        match self.locate(token)? {
            Slot::Var(name) => {
                if let Some(slot) = self.vars.get_mut(name) {
                    *slot = value;
                }
            }
            Slot::Constant(name) => {
                if let Some(slot) = self.constants.get_mut(name) {
                    *slot = value;
                }
            }
            Slot::ListCell(name, index) => {
                if let Some(list) = self.lists.get_mut(name) {
                    list.items[index] = value;
                }
            }
            Slot::MatrixCell(name, row, col) => {
                if let Some(matrix) = self.matrices.get_mut(name) {
                    matrix.set(row, col, value);
                }
            }
        }
        Ok(())
    }

    /// Resolve `token` to an existing, in-bounds slot.
    fn locate<'t>(&self, token: &'t Token) -> ScriptResult<Slot<'t>> {
        let address = Address::parse(&token.text)
            .ok_or_else(|| Diagnostic::parse(token, "Invalid dimension type."))?;

        match address {
            Address::Scalar(name) => {
                if self.vars.contains_key(name) {
                    Ok(Slot::Var(name))
                } else if self.constants.contains_key(name) {
                    Ok(Slot::Constant(name))
                } else {
                    Err(Diagnostic::reference(
                        token,
                        format!("Symbol {name} was not found."),
                    ))
                }
            }
            Address::ListElement { list, index } => {
                let items = self
                    .lists
                    .get(list)
                    .ok_or_else(|| {
                        Diagnostic::reference(token, format!("Could not find list {list}."))
                    })?;
                let index = self.index_var(token, index, "Could not find index variable for list.")?;
                match usize::try_from(index) {
                    Ok(i) if i < items.len() => Ok(Slot::ListCell(list, i)),
                    _ => Err(Diagnostic::reference(
                        token,
                        format!("Index {index} is out of range for list {list}."),
                    )),
                }
            }
            Address::MatrixElement { matrix, row, col } => {
                let grid = self.matrices.get(matrix).ok_or_else(|| {
                    Diagnostic::reference(token, format!("Could not find matrix {matrix}."))
                })?;
                let row = self.index_var(token, row, "Could not find y variable for matrix.")?;
                let col = self.index_var(token, col, "Could not find x variable for matrix.")?;
                match (usize::try_from(row), usize::try_from(col)) {
                    (Ok(r), Ok(c)) if grid.offset(r, c).is_some() => {
                        Ok(Slot::MatrixCell(matrix, r, c))
                    }
                    _ => Err(Diagnostic::reference(
                        token,
                        format!("Position {row},{col} is out of range for matrix {matrix}."),
                    )),
                }
            }
        }
    }

    fn index_var(&self, token: &Token, name: &str, missing: &str) -> ScriptResult<i32> {
        self.var(name)
            .ok_or_else(|| Diagnostic::reference(token, missing))
    }
}

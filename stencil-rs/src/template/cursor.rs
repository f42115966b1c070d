//! Output cursors: named redirection targets.
//!
//! Emitted lines go to the selected cursor, or to the primary stream when no
//! cursor is selected.  A cursor is anchored where it is first opened; the
//! final [`Output`] splices its collected lines in at that point, so a cursor
//! can gather text that is emitted later in the document.

use std::collections::HashMap;
use std::fmt;

use crate::error::ErrorKind;

#[derive(Debug, Clone)]
enum Segment {
    Line(String),
    Anchor(usize),
}

#[derive(Debug)]
struct Target {
    name: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Default)]
pub struct CursorDirectory {
    primary: Vec<Segment>,
    targets: Vec<Target>,
    index: HashMap<String, usize>,
    /// Selection stack of target indices; the top receives output.
    selected: Vec<usize>,
}

impl CursorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn selection_depth(&self) -> usize {
        self.selected.len()
    }

    /// Name of the selected cursor, `None` for the primary stream.
    pub fn current(&self) -> Option<&str> {
        self.selected.last().map(|&i| self.targets[i].name.as_str())
    }

    /// `_{name`: select `name`, remembering the previous selection.
    pub fn open(&mut self, name: &str) {
        let i = self.target(name);
        self.selected.push(i);
    }

    /// `_}`: return to the previous selection.
    pub fn close(&mut self) -> Result<String, ErrorKind> {
        self.selected
            .pop()
            .map(|i| self.targets[i].name.clone())
            .ok_or_else(|| ErrorKind::UnmatchedBlock("cursor close without open".into()))
    }

    /// `_:name`: replace the current selection without nesting.
    pub fn select(&mut self, name: &str) {
        let i = self.target(name);
        match self.selected.last_mut() {
            Some(top) => *top = i,
            None => self.selected.push(i),
        }
    }

    /// Drop selections made above `floor`.
    pub fn truncate_selection(&mut self, floor: usize) {
        self.selected.truncate(floor);
    }

    pub fn emit(&mut self, line: String) {
        self.buffer().push(Segment::Line(line));
    }

    /// Index of `name`, creating and anchoring it in the current buffer on
    /// first use.
    fn target(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.targets.len();
        self.buffer().push(Segment::Anchor(i));
        self.targets.push(Target { name: name.to_owned(), segments: Vec::new() });
        self.index.insert(name.to_owned(), i);
        i
    }

    fn buffer(&mut self) -> &mut Vec<Segment> {
        match self.selected.last() {
            Some(&i) => &mut self.targets[i].segments,
            None => &mut self.primary,
        }
    }

    /// Flatten into the final document.
    pub fn render(self) -> Output {
        let mut lines = Vec::new();
        flatten(&self.primary, &self.targets, &mut lines);
        let cursors = self
            .targets
            .iter()
            .map(|t| {
                let mut own = Vec::new();
                flatten(&t.segments, &self.targets, &mut own);
                (t.name.clone(), own)
            })
            .collect();
        Output { lines, cursors }
    }
}

/// Anchors always point at targets created after the buffer holding them,
/// so the recursion terminates.
fn flatten(segments: &[Segment], targets: &[Target], out: &mut Vec<String>) {
    for seg in segments {
        match seg {
            Segment::Line(l) => out.push(l.clone()),
            Segment::Anchor(i) => flatten(&targets[*i].segments, targets, out),
        }
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

/// The rendered document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    lines: Vec<String>,
    /// Each cursor's own lines, in creation order.
    cursors: Vec<(String, Vec<String>)>,
}

impl Output {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// Lines collected by cursor `name`.
    pub fn cursor(&self, name: &str) -> Option<&[String]> {
        self.cursors
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, l)| l.as_slice())
    }

    pub fn cursor_names(&self) -> impl Iterator<Item = &str> {
        self.cursors.iter().map(|(n, _)| n.as_str())
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

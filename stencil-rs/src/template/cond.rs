//! Conditional stack: `IF` / `ELSE_IF` / `ELSE` / `END_IF` gating.
//!
//! One frame per open chain.  `ELSE_IF` and `ELSE` rewrite the top frame in
//! place, so `END_IF` always pops exactly one frame.  A branch's condition is
//! only evaluated when the enclosing context is active and no earlier branch
//! of its chain has fired.
//!
//! Every operation that touches an existing frame takes a `floor`: frames at
//! or below it belong to an enclosing source (the file that included this
//! one, the caller of this macro) and cannot be continued or closed from here.

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    If,
    ElseIf,
    Else,
}

#[derive(Debug, Clone)]
pub struct ConditionalFrame {
    pub branch: Branch,
    /// Condition text of the current branch (`None` for `ELSE` and for
    /// tests that are not expressions).
    pub expression: Option<String>,
    /// This branch's lines are live.
    pub taken: bool,
    /// Some branch of this chain has already fired.
    pub chain_satisfied: bool,
    /// Gate state of the enclosing context when the chain opened.
    pub parent_active: bool,
}

#[derive(Debug, Default)]
pub struct ConditionalStack {
    frames: Vec<ConditionalFrame>,
}

impl ConditionalStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Literal output is allowed: every open frame is on a taken branch.
    pub fn is_active(&self) -> bool {
        self.frames.iter().all(|f| f.taken)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top(&self) -> Option<&ConditionalFrame> {
        self.frames.last()
    }

    /// Open a chain.  `cond` runs only when the enclosing context is active.
    pub fn open<F>(&mut self, expression: Option<String>, cond: F) -> Result<bool, ErrorKind>
    where
        F: FnOnce() -> Result<bool, ErrorKind>,
    {
        let parent_active = self.is_active();
        let taken = parent_active && cond()?;
        self.frames.push(ConditionalFrame {
            branch: Branch::If,
            expression,
            taken,
            chain_satisfied: taken,
            parent_active,
        });
        Ok(taken)
    }

    /// `ELSE_IF`: `cond` runs only if no earlier branch fired.
    pub fn else_if<F>(&mut self, floor: usize, expression: String, cond: F) -> Result<bool, ErrorKind>
    where
        F: FnOnce() -> Result<bool, ErrorKind>,
    {
        let frame = self.continuable(floor, "ELSE_IF")?;
        let taken = if frame.chain_satisfied || !frame.parent_active {
            false
        } else {
            cond()?
        };
        frame.branch = Branch::ElseIf;
        frame.expression = Some(expression);
        frame.taken = taken;
        frame.chain_satisfied |= taken;
        Ok(taken)
    }

    /// `ELSE`: taken when nothing earlier fired; terminal for the chain.
    pub fn else_(&mut self, floor: usize) -> Result<bool, ErrorKind> {
        let frame = self.continuable(floor, "ELSE")?;
        let taken = !frame.chain_satisfied && frame.parent_active;
        frame.branch = Branch::Else;
        frame.expression = None;
        frame.taken = taken;
        frame.chain_satisfied = true;
        Ok(taken)
    }

    /// `END_IF`: close the current chain.
    pub fn close(&mut self, floor: usize) -> Result<ConditionalFrame, ErrorKind> {
        if self.frames.len() <= floor {
            return Err(ErrorKind::UnmatchedBlock("END_IF without IF".into()));
        }
        self.frames
            .pop()
            .ok_or_else(|| ErrorKind::UnmatchedBlock("END_IF without IF".into()))
    }

    fn continuable(&mut self, floor: usize, what: &str) -> Result<&mut ConditionalFrame, ErrorKind> {
        if self.frames.len() <= floor {
            return Err(ErrorKind::UnmatchedBlock(format!("{what} without IF")));
        }
        match self.frames.last_mut() {
            Some(f) if f.branch == Branch::Else => {
                Err(ErrorKind::UnmatchedBlock(format!("{what} after ELSE")))
            }
            Some(f) => Ok(f),
            None => Err(ErrorKind::UnmatchedBlock(format!("{what} without IF"))),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

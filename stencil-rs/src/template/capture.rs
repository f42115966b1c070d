//! Loop and macro body capture.
//!
//! `LOOP` and `MACRO` do not execute their bodies as they are read.  They
//! push a frame that swallows every following line verbatim until the
//! matching terminator; nested openers of the same kind only bump a depth
//! counter so their own terminators are captured too.  The completed frame
//! is handed back to the orchestrator, which replays or registers it.

use super::directive::{descriptor, BlockStack, DirectiveKind};
use super::macros::Formal;
use super::records::Record;
use crate::error::Location;

/// One captured body line and where it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLine {
    pub text: String,
    pub location: Location,
}

/// Verbatim body buffer shared by loop and macro frames.
#[derive(Debug, Clone)]
pub struct Body {
    /// Block stack whose openers and closers nest inside this body.
    stack: BlockStack,
    pub lines: Vec<CapturedLine>,
    /// Nested openers of the same kind still waiting for their terminator.
    pub depth: usize,
}

impl Body {
    fn new(stack: BlockStack) -> Self {
        Self { stack, lines: Vec::new(), depth: 0 }
    }

    /// Feed one line.  Returns `true` when `kind` is this frame's own
    /// terminator, which is not captured.
    fn feed(&mut self, text: &str, location: Location, kind: Option<DirectiveKind>) -> bool {
        let desc = kind.map(descriptor);
        if desc.and_then(|d| d.closes()) == Some(self.stack) {
            if self.depth == 0 {
                return true;
            }
            self.depth -= 1;
        } else if desc.and_then(|d| d.opens()) == Some(self.stack) {
            self.depth += 1;
        }
        self.lines.push(CapturedLine { text: text.to_owned(), location });
        false
    }
}

#[derive(Debug, Clone)]
pub struct LoopFrame {
    pub variable: String,
    pub records: Vec<Record>,
    pub body: Body,
    /// Gate state when `LOOP` was read; an inactive loop is never replayed.
    pub active: bool,
    pub opened_at: Location,
}

impl LoopFrame {
    pub fn new(variable: impl Into<String>, records: Vec<Record>, active: bool, opened_at: Location) -> Self {
        Self {
            variable: variable.into(),
            records,
            body: Body::new(BlockStack::Loop),
            active,
            opened_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MacroFrame {
    pub name: String,
    pub formals: Vec<Formal>,
    pub body: Body,
    /// Gate state when `MACRO` was read; an inactive definition is dropped.
    pub active: bool,
    pub opened_at: Location,
}

impl MacroFrame {
    pub fn new(name: impl Into<String>, formals: Vec<Formal>, active: bool, opened_at: Location) -> Self {
        Self {
            name: name.into(),
            formals,
            body: Body::new(BlockStack::Macro),
            active,
            opened_at,
        }
    }
}

/// A frame whose terminator has been read.
#[derive(Debug)]
pub enum Completed {
    Loop(LoopFrame),
    Macro(MacroFrame),
}

#[derive(Debug)]
enum Frame {
    Loop(LoopFrame),
    Macro(MacroFrame),
}

impl Frame {
    fn body_mut(&mut self) -> &mut Body {
        match self {
            Frame::Loop(f) => &mut f.body,
            Frame::Macro(f) => &mut f.body,
        }
    }
}

/// The loop and macro stacks.
///
/// Only the innermost frame receives lines, and a frame's body is replayed
/// after it is popped, so at any moment the top frame is the one capturing.
#[derive(Debug, Default)]
pub struct CaptureStack {
    frames: Vec<Frame>,
}

impl CaptureStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_capturing(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_loop(&mut self, frame: LoopFrame) {
        self.frames.push(Frame::Loop(frame));
    }

    pub fn push_macro(&mut self, frame: MacroFrame) {
        self.frames.push(Frame::Macro(frame));
    }

    /// Route one line into the capturing frame.
    ///
    /// `kind` is the directive the line classifies as, if any.  Returns the
    /// popped frame when the line was its terminator.
    pub fn feed(&mut self, text: &str, location: Location, kind: Option<DirectiveKind>) -> Option<Completed> {
        let closed = self.frames.last_mut()?.body_mut().feed(text, location, kind);
        if !closed {
            return None;
        }
        self.frames.pop().map(|f| match f {
            Frame::Loop(l) => Completed::Loop(l),
            Frame::Macro(m) => Completed::Macro(m),
        })
    }

    /// Description of the innermost open frame, for unmatched-block errors.
    pub fn describe_top(&self) -> Option<String> {
        self.frames.last().map(|f| match f {
            Frame::Loop(l) => format!("LOOP {} opened at {} without END_LOOP", l.variable, l.opened_at),
            Frame::Macro(m) => format!("MACRO {} opened at {} without END_MACRO", m.name, m.opened_at),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

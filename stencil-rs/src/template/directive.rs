//! Directive catalog.
//!
//! A closed table mapping keywords (case-insensitive, with aliases) to a
//! [`DirectiveKind`] plus the static facts the classifier and orchestrator
//! need: whether the directive takes an object word, whether its argument is
//! a boolean expression, and which block stack it opens or closes.

/// Every directive the interpreter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Define,
    If,
    IfSet,
    IfNotSet,
    IfDef,
    IfNotDef,
    ElseIf,
    Else,
    EndIf,
    Loop,
    EndLoop,
    Macro,
    EndMacro,
    /// Macro invocation, explicit (`CALL name`) or by registered name.
    Call,
    Include,
}

/// The stack a block directive pushes or pops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStack {
    Conditional,
    Loop,
    Macro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRole {
    Open,
    /// Continues an open block in place (`ELSE_IF`, `ELSE`).
    Continue,
    Close,
}

/// Static description of one directive.
#[derive(Debug)]
pub struct DirectiveDescriptor {
    pub kind: DirectiveKind,
    /// Canonical keyword, upper case.
    pub keyword: &'static str,
    pub aliases: &'static [&'static str],
    /// The first argument word is an object (variable, macro or path name).
    pub has_object: bool,
    /// The (remaining) argument text is a boolean expression.
    pub has_expression: bool,
    pub block: Option<(BlockStack, BlockRole)>,
}

impl DirectiveDescriptor {
    fn matches(&self, word: &str) -> bool {
        self.keyword.eq_ignore_ascii_case(word)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(word))
    }

    pub fn opens(&self) -> Option<BlockStack> {
        match self.block {
            Some((stack, BlockRole::Open)) => Some(stack),
            _ => None,
        }
    }

    pub fn closes(&self) -> Option<BlockStack> {
        match self.block {
            Some((stack, BlockRole::Close)) => Some(stack),
            _ => None,
        }
    }
}

use BlockRole::{Close, Continue, Open};
use BlockStack::{Conditional, Loop, Macro};

static CATALOG: &[DirectiveDescriptor] = &[
    DirectiveDescriptor {
        kind: DirectiveKind::Define,
        keyword: "DEFINE",
        aliases: &["DEF"],
        has_object: true,
        has_expression: false,
        block: None,
    },
    DirectiveDescriptor {
        kind: DirectiveKind::If,
        keyword: "IF",
        aliases: &[],
        has_object: false,
        has_expression: true,
        block: Some((Conditional, Open)),
    },
    DirectiveDescriptor {
        kind: DirectiveKind::IfSet,
        keyword: "IF_SET",
        aliases: &["IFSET"],
        has_object: true,
        has_expression: false,
        block: Some((Conditional, Open)),
    },
    DirectiveDescriptor {
        kind: DirectiveKind::IfNotSet,
        keyword: "IF_NOT_SET",
        aliases: &["IFNOTSET", "IF_UNSET"],
        has_object: true,
        has_expression: false,
        block: Some((Conditional, Open)),
    },
    DirectiveDescriptor {
        kind: DirectiveKind::IfDef,
        keyword: "IF_DEF",
        aliases: &["IFDEF"],
        has_object: true,
        has_expression: false,
        block: Some((Conditional, Open)),
    },
    DirectiveDescriptor {
        kind: DirectiveKind::IfNotDef,
        keyword: "IF_NOT_DEF",
        aliases: &["IFNDEF", "IF_NDEF"],
        has_object: true,
        has_expression: false,
        block: Some((Conditional, Open)),
    },
    DirectiveDescriptor {
        kind: DirectiveKind::ElseIf,
        keyword: "ELSE_IF",
        aliases: &["ELSIF", "ELSEIF", "ELIF"],
        has_object: false,
        has_expression: true,
        block: Some((Conditional, Continue)),
    },
    DirectiveDescriptor {
        kind: DirectiveKind::Else,
        keyword: "ELSE",
        aliases: &[],
        has_object: false,
        has_expression: false,
        block: Some((Conditional, Continue)),
    },
    DirectiveDescriptor {
        kind: DirectiveKind::EndIf,
        keyword: "END_IF",
        aliases: &["ENDIF", "FI"],
        has_object: false,
        has_expression: false,
        block: Some((Conditional, Close)),
    },
    DirectiveDescriptor {
        kind: DirectiveKind::Loop,
        keyword: "LOOP",
        aliases: &["FOREACH"],
        has_object: true,
        has_expression: false,
        block: Some((Loop, Open)),
    },
    DirectiveDescriptor {
        kind: DirectiveKind::EndLoop,
        keyword: "END_LOOP",
        aliases: &["ENDLOOP", "END_FOREACH"],
        has_object: false,
        has_expression: false,
        block: Some((Loop, Close)),
    },
    DirectiveDescriptor {
        kind: DirectiveKind::Macro,
        keyword: "MACRO",
        aliases: &[],
        has_object: true,
        has_expression: false,
        block: Some((Macro, Open)),
    },
    DirectiveDescriptor {
        kind: DirectiveKind::EndMacro,
        keyword: "END_MACRO",
        aliases: &["ENDMACRO"],
        has_object: false,
        has_expression: false,
        block: Some((Macro, Close)),
    },
    DirectiveDescriptor {
        kind: DirectiveKind::Call,
        keyword: "CALL",
        aliases: &[],
        has_object: true,
        has_expression: false,
        block: None,
    },
    DirectiveDescriptor {
        kind: DirectiveKind::Include,
        keyword: "INCLUDE",
        aliases: &["INC"],
        has_object: true,
        has_expression: false,
        block: None,
    },
];

/// Look up a keyword (case-insensitive, aliases included).
pub fn lookup(word: &str) -> Option<&'static DirectiveDescriptor> {
    CATALOG.iter().find(|d| d.matches(word))
}

/// The descriptor for a kind.  Every kind has exactly one entry.
pub fn descriptor(kind: DirectiveKind) -> &'static DirectiveDescriptor {
    CATALOG
        .iter()
        .find(|d| d.kind == kind)
        .unwrap_or_else(|| unreachable!("catalog covers every DirectiveKind"))
}

// ── Cursor prefixes ───────────────────────────────────────────────────────────

/// Output-cursor operations, recognised by prefix rather than keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorOp {
    Open,
    Close,
    Query,
    Select,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

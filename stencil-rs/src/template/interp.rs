//! Template interpreter.
//!
//! The [`Interpreter`] owns the configuration and the pluggable collaborators
//! (source loader, record tables, condition evaluator).  Each render builds a
//! fresh run holding every stack, so a failed render leaves nothing
//! behind: open files are closed, half-captured bodies are dropped and no
//! macro defined during the run outlives it.
//!
//! A run reads lines from the include stack.  Every line is routed one way:
//!
//! 1. into the capturing loop or macro frame, if one is open;
//! 2. to the conditional stack, cursor directory, or a directive handler;
//! 3. to output, after substitution, when the gate is open.
//!
//! `INCLUDE`, macro calls and loop iterations recurse into the same line
//! routine over another source.  Each such source must close what it opens.

use std::path::Path;

use tracing::debug;

use super::args::{self, parse_args, Args};
use super::capture::{CaptureStack, CapturedLine, Completed, LoopFrame, MacroFrame};
use super::cond::ConditionalStack;
use super::cursor::{CursorDirectory, Output};
use super::directive::{CursorOp, DirectiveKind};
use super::expand::expand;
use super::expr::{Evaluator, ExprEvaluator, VarLookup};
use super::files::{FileStack, FsLoader, LineSource, SourceLoader, TextSource};
use super::macros::{parse_formals, MacroDef, MacroTable};
use super::records::{resolve_source, NoTables, RecordTables};
use super::scope::{Layer, ScopeStack, ScopeView};
use super::statement::{classify, ClassifiedStatement, StatementKind};
use crate::config::{Config, Profile};
use crate::error::{ErrorKind, Location, Result};
use crate::settings::Settings;

// ── Interpreter ───────────────────────────────────────────────────────────────

pub struct Interpreter {
    config: Config,
    settings: Settings,
    loader: Box<dyn SourceLoader>,
    records: Box<dyn RecordTables>,
    evaluator: Box<dyn Evaluator>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            settings: Settings::new(),
            loader: Box::new(FsLoader),
            records: Box::new(NoTables),
            evaluator: Box::new(ExprEvaluator),
        }
    }

    /// An interpreter configured from a loaded settings file.
    pub fn from_profile(profile: Profile) -> Self {
        let mut interp = Self::new(profile.config);
        interp.settings = profile.settings;
        interp
    }

    pub fn with_loader(mut self, loader: impl SourceLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn with_records(mut self, records: impl RecordTables + 'static) -> Self {
        self.records = Box::new(records);
        self
    }

    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Settings every render starts from.  `DEFINE`s made during a render
    /// do not write back here.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Render `text`, reporting locations under `name`.
    pub fn render_str(&mut self, name: &str, text: &str) -> Result<Output> {
        let mut run = Run::new(self);
        run.file(name.to_owned(), Box::new(TextSource::new(text)), &Location::new(name, 0))?;
        Ok(run.finish())
    }

    /// Render the template at `path`, opened through the configured loader.
    pub fn render_path(&mut self, path: impl AsRef<Path>) -> Result<Output> {
        let path = path.as_ref().display().to_string();
        let at = Location::new(path.clone(), 0);
        let key = self
            .loader
            .resolve(&path, None, &self.config.include_dirs)
            .map_err(|k| k.at(at.clone()))?;
        let source = self.loader.open(&key).map_err(|k| k.at(at.clone()))?;
        let mut run = Run::new(self);
        run.file(key, source, &at)?;
        Ok(run.finish())
    }
}

// ── Run ───────────────────────────────────────────────────────────────────────

/// Stack depths at the start of the current source.
#[derive(Debug, Clone, Copy, Default)]
struct Floors {
    conds: usize,
    captures: usize,
    cursors: usize,
}

/// Attach a location to a component error.
trait Located<T> {
    fn located(self, loc: &Location) -> Result<T>;
}

impl<T> Located<T> for std::result::Result<T, ErrorKind> {
    fn located(self, loc: &Location) -> Result<T> {
        self.map_err(|k| k.at(loc.clone()))
    }
}

/// State of one render.
struct Run<'a> {
    config: &'a Config,
    loader: &'a dyn SourceLoader,
    records: &'a dyn RecordTables,
    evaluator: &'a mut dyn Evaluator,
    settings: Settings,
    macros: MacroTable,
    conds: ConditionalStack,
    captures: CaptureStack,
    cursors: CursorDirectory,
    files: FileStack,
    scopes: ScopeStack,
    floors: Floors,
    /// Indentation prepended to emitted lines (macro calls, includes).
    prefix: String,
    /// Nested macro calls plus includes.
    depth: usize,
}

fn view<'b>(scopes: &'b ScopeStack, settings: &'b Settings, config: &'b Config) -> ScopeView<'b> {
    ScopeView { scopes, settings, meta: &config.indicators.meta }
}

fn evaluate(evaluator: &mut dyn Evaluator, expr: &str, vars: &dyn VarLookup) -> std::result::Result<bool, ErrorKind> {
    evaluator
        .eval_condition(expr, vars)
        .map_err(|e| ErrorKind::Expression(format!("{expr}: {e}")))
}

impl<'a> Run<'a> {
    fn new(interp: &'a mut Interpreter) -> Self {
        Self {
            config: &interp.config,
            loader: &*interp.loader,
            records: &*interp.records,
            evaluator: &mut *interp.evaluator,
            settings: interp.settings.clone(),
            macros: MacroTable::new(),
            conds: ConditionalStack::new(),
            captures: CaptureStack::new(),
            cursors: CursorDirectory::new(),
            files: FileStack::new(),
            scopes: ScopeStack::new(),
            floors: Floors::default(),
            prefix: String::new(),
            depth: 0,
        }
    }

    fn finish(self) -> Output {
        self.cursors.render()
    }

    // ── Sources ───────────────────────────────────────────────────────────────

    fn enter(&mut self) -> Floors {
        let here = Floors {
            conds: self.conds.depth(),
            captures: self.captures.depth(),
            cursors: self.cursors.selection_depth(),
        };
        std::mem::replace(&mut self.floors, here)
    }

    /// Check that the source closed everything it opened.
    fn leave(&mut self, saved: Floors, at: &Location) -> Result<()> {
        let floors = std::mem::replace(&mut self.floors, saved);
        if self.captures.depth() > floors.captures {
            let what = self.captures.describe_top().unwrap_or_default();
            return Err(ErrorKind::UnmatchedBlock(what).at(at.clone()));
        }
        if self.conds.depth() > floors.conds {
            let what = match self.conds.top().and_then(|f| f.expression.as_deref()) {
                Some(expr) => format!("IF {expr} without END_IF"),
                None => "IF without END_IF".to_owned(),
            };
            return Err(ErrorKind::UnmatchedBlock(what).at(at.clone()));
        }
        self.cursors.truncate_selection(floors.cursors);
        Ok(())
    }

    /// Push a file frame and read it to exhaustion.
    fn file(&mut self, key: String, source: Box<dyn LineSource>, at: &Location) -> Result<()> {
        self.files.push(key, source).located(at)?;
        let saved = self.enter();
        loop {
            let next = match self.files.next_line() {
                Ok(next) => next,
                Err(k) => {
                    let loc = self.files.top().map_or_else(|| at.clone(), |f| f.location());
                    return Err(k.at(loc));
                }
            };
            let Some((text, loc)) = next else { break };
            self.line(&text, &loc)?;
        }
        let end = self.files.top().map_or_else(|| at.clone(), |f| f.location());
        self.leave(saved, &end)?;
        self.files.pop();
        Ok(())
    }

    /// Replay captured lines in a new scope layer.
    fn replay(&mut self, body: &[CapturedLine], layer: Layer, prefix: String, at: &Location) -> Result<()> {
        self.scopes.push(layer);
        let saved_prefix = std::mem::replace(&mut self.prefix, prefix);
        let saved = self.enter();
        for line in body {
            self.line(&line.text, &line.location)?;
        }
        let end = body.last().map_or(at, |l| &l.location);
        self.leave(saved, end)?;
        self.prefix = saved_prefix;
        self.scopes.pop();
        Ok(())
    }

    fn descend(&mut self) -> std::result::Result<(), ErrorKind> {
        if self.depth >= self.config.max_depth {
            return Err(ErrorKind::RecursionLimitExceeded(self.config.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    // ── Lines ─────────────────────────────────────────────────────────────────

    fn line(&mut self, text: &str, loc: &Location) -> Result<()> {
        let ind = &self.config.indicators;
        let macros = &self.macros;

        if self.captures.is_capturing() {
            let kind = classify(text, ind, |n| macros.contains(n))
                .ok()
                .and_then(|s| s.directive());
            if let Some(done) = self.captures.feed(text, loc.clone(), kind) {
                self.complete(done, loc)?;
            }
            return Ok(());
        }

        // Malformed directives are errors even inside a false branch; only
        // evaluation is gated.
        let active = self.conds.is_active();
        let stmt = classify(text, ind, |n| macros.contains(n)).located(loc)?;

        match stmt.kind {
            StatementKind::Literal => {
                if active {
                    self.emit(&stmt).located(loc)?;
                }
                Ok(())
            }
            StatementKind::Cursor(op) => self.cursor(op, &stmt, active).located(loc),
            StatementKind::Directive(kind) => self.directive(kind, &stmt, active, loc),
        }
    }

    fn substitute(&self, text: &str) -> std::result::Result<String, ErrorKind> {
        let vars = view(&self.scopes, &self.settings, self.config);
        expand(text, &self.config.indicators.meta, &vars, self.config.strict)
    }

    /// Substitute inside each argument value after splitting, so a value
    /// containing blanks or quotes stays one argument.
    fn substitute_args(&self, args: Args) -> std::result::Result<Args, ErrorKind> {
        let positional = args
            .positional
            .iter()
            .map(|v| self.substitute(v))
            .collect::<std::result::Result<_, _>>()?;
        let named = args
            .named
            .into_iter()
            .map(|(n, v)| self.substitute(&v).map(|v| (n, v)))
            .collect::<std::result::Result<_, _>>()?;
        Ok(Args { positional, named })
    }

    fn emit(&mut self, stmt: &ClassifiedStatement) -> std::result::Result<(), ErrorKind> {
        let text = self.substitute(&stmt.raw)?;
        let line = if self.prefix.is_empty() || text.is_empty() {
            text
        } else {
            format!("{}{text}", self.prefix)
        };
        self.cursors.emit(line);
        Ok(())
    }

    fn cursor(&mut self, op: CursorOp, stmt: &ClassifiedStatement, active: bool) -> std::result::Result<(), ErrorKind> {
        let name = stmt.object.as_deref().unwrap_or_default();
        match op {
            CursorOp::Query => {
                let exists = self.cursors.exists(name);
                self.conds.open(None, || Ok(exists))?;
            }
            _ if !active => {}
            CursorOp::Open => self.cursors.open(name),
            // With nothing selected in this source, `_:` must not replace the
            // enclosing source's selection.
            CursorOp::Select if self.cursors.selection_depth() <= self.floors.cursors => {
                self.cursors.open(name)
            }
            CursorOp::Select => self.cursors.select(name),
            CursorOp::Close => {
                if self.cursors.selection_depth() <= self.floors.cursors {
                    return Err(ErrorKind::UnmatchedBlock("cursor close without open".into()));
                }
                self.cursors.close()?;
            }
        }
        debug!(op = ?op, cursor = name, current = ?self.cursors.current(), "cursor");
        Ok(())
    }

    // ── Directives ────────────────────────────────────────────────────────────

    fn directive(
        &mut self,
        kind: DirectiveKind,
        stmt: &ClassifiedStatement,
        active: bool,
        loc: &Location,
    ) -> Result<()> {
        debug!(directive = ?kind, at = %loc, active, "directive");
        let object = stmt.object.as_deref().unwrap_or_default();
        let expression = stmt.expression.as_deref().unwrap_or_default();

        match kind {
            DirectiveKind::If => {
                let Run { conds, evaluator, scopes, settings, config, .. } = self;
                let vars = view(scopes, settings, config);
                conds
                    .open(Some(expression.to_owned()), || evaluate(&mut **evaluator, expression, &vars))
                    .located(loc)?;
            }
            DirectiveKind::ElseIf => {
                let Run { conds, evaluator, scopes, settings, config, floors, .. } = self;
                let vars = view(scopes, settings, config);
                conds
                    .else_if(floors.conds, expression.to_owned(), || {
                        evaluate(&mut **evaluator, expression, &vars)
                    })
                    .located(loc)?;
            }
            DirectiveKind::IfSet | DirectiveKind::IfNotSet => {
                let set = view(&self.scopes, &self.settings, self.config).is_set(object);
                let want = kind == DirectiveKind::IfSet;
                self.conds.open(None, || Ok(set == want)).located(loc)?;
            }
            DirectiveKind::IfDef | DirectiveKind::IfNotDef => {
                let def = self.macros.contains(object) || self.settings.is_defined(object);
                let want = kind == DirectiveKind::IfDef;
                self.conds.open(None, || Ok(def == want)).located(loc)?;
            }
            DirectiveKind::Else => {
                self.conds.else_(self.floors.conds).located(loc)?;
            }
            DirectiveKind::EndIf => {
                self.conds.close(self.floors.conds).located(loc)?;
            }
            DirectiveKind::Define => {
                if active {
                    let value = args::tokenize(expression).located(loc)?.join(" ");
                    debug!(name = object, value = %value, "define");
                    self.settings.define(object, value);
                }
            }
            DirectiveKind::Loop => self.open_loop(object, expression, active, loc).located(loc)?,
            DirectiveKind::Macro => self.open_macro(object, expression, active, loc).located(loc)?,
            DirectiveKind::EndLoop => {
                return Err(ErrorKind::UnmatchedBlock("END_LOOP without LOOP".into()).at(loc.clone()));
            }
            DirectiveKind::EndMacro => {
                return Err(ErrorKind::UnmatchedBlock("END_MACRO without MACRO".into()).at(loc.clone()));
            }
            DirectiveKind::Call if active => self.call(object, expression, stmt, loc)?,
            DirectiveKind::Include if active => self.include(object, stmt, loc)?,
            DirectiveKind::Call | DirectiveKind::Include => {}
        }
        Ok(())
    }

    /// `LOOP var [over|in] source`.
    fn open_loop(
        &mut self,
        variable: &str,
        source: &str,
        active: bool,
        loc: &Location,
    ) -> std::result::Result<(), ErrorKind> {
        if !args::is_name(variable) {
            return Err(ErrorKind::Syntax(format!("bad loop variable: {variable}")));
        }
        let records = if active {
            let source = strip_loop_keyword(source);
            let vars = view(&self.scopes, &self.settings, self.config);
            match resolve_source(source, self.records, &vars)? {
                Some(rows) => rows,
                None => {
                    debug!(variable, source, "loop source absent; zero iterations");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        self.captures.push_loop(LoopFrame::new(variable, records, active, loc.clone()));
        Ok(())
    }

    fn open_macro(
        &mut self,
        name: &str,
        formals: &str,
        active: bool,
        loc: &Location,
    ) -> std::result::Result<(), ErrorKind> {
        if !args::is_name(name) {
            return Err(ErrorKind::Syntax(format!("bad macro name: {name}")));
        }
        let formals = if active { parse_formals(formals)? } else { Vec::new() };
        self.captures.push_macro(MacroFrame::new(name, formals, active, loc.clone()));
        Ok(())
    }

    /// A loop or macro body is complete.
    fn complete(&mut self, done: Completed, loc: &Location) -> Result<()> {
        match done {
            Completed::Loop(frame) if frame.active => {
                let count = frame.records.len();
                debug!(variable = %frame.variable, count, lines = frame.body.lines.len(), "loop replay");
                for (i, record) in frame.records.iter().enumerate() {
                    let layer = Layer::for_record(&frame.variable, record, i, count);
                    self.replay(&frame.body.lines, layer, self.prefix.clone(), loc)?;
                }
            }
            Completed::Macro(frame) if frame.active => {
                self.macros.register(MacroDef {
                    name: frame.name,
                    formals: frame.formals,
                    body: frame.body.lines,
                    defined_at: frame.opened_at,
                });
            }
            Completed::Loop(_) | Completed::Macro(_) => {}
        }
        Ok(())
    }

    fn call(&mut self, name: &str, args_text: &str, stmt: &ClassifiedStatement, loc: &Location) -> Result<()> {
        let def = self
            .macros
            .get(name)
            .ok_or_else(|| ErrorKind::UndefinedMacro(name.to_owned()))
            .located(loc)?;
        let args = parse_args(args_text)
            .and_then(|args| self.substitute_args(args))
            .located(loc)?;
        let layer = def.bind(&args);
        self.descend().located(loc)?;
        debug!(name, depth = self.depth, "macro call");
        let prefix = format!("{}{}", self.prefix, stmt.indentation());
        self.replay(&def.body, layer, prefix, loc)?;
        self.depth -= 1;
        Ok(())
    }

    fn include(&mut self, path: &str, stmt: &ClassifiedStatement, loc: &Location) -> Result<()> {
        let path = self.substitute(path).located(loc)?;
        self.descend().located(loc)?;
        let key = self
            .loader
            .resolve(&path, Some(loc.path.as_str()), &self.config.include_dirs)
            .located(loc)?;
        if self.files.contains(&key) {
            let chain = self.files.chain();
            return Err(ErrorKind::CircularInclude { path: key, chain }.at(loc.clone()));
        }
        let source = self.loader.open(&key).located(loc)?;
        let prefix = format!("{}{}", self.prefix, stmt.indentation());
        let saved_prefix = std::mem::replace(&mut self.prefix, prefix);
        self.file(key, source, loc)?;
        self.prefix = saved_prefix;
        self.depth -= 1;
        Ok(())
    }
}

/// Drop the optional `over` / `in` word of a loop source.
fn strip_loop_keyword(source: &str) -> &str {
    let source = source.trim_start();
    for word in ["over", "in"] {
        if let Some(head) = source.get(..word.len()) {
            let rest = &source[word.len()..];
            if head.eq_ignore_ascii_case(word) && (rest.is_empty() || rest.starts_with(char::is_whitespace)) {
                return rest.trim_start();
            }
        }
    }
    source
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::files::MemoryLoader;
    use crate::template::records::Record;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::rc::Rc;

    fn run(src: &str) -> Result<Output> {
        Interpreter::default().render_str("test", src)
    }

    fn output(src: &str) -> Vec<String> {
        run(src).expect("render failed").into_lines()
    }

    fn error(src: &str) -> crate::error::Error {
        run(src).expect_err("render should fail")
    }

    /// Counts evaluations; a condition is true when it reads `yes`.
    struct Counting(Rc<Cell<usize>>);

    impl Evaluator for Counting {
        fn eval_condition(&mut self, expr: &str, _vars: &dyn VarLookup) -> std::result::Result<bool, String> {
            self.0.set(self.0.get() + 1);
            Ok(expr.trim() == "yes")
        }
    }

    #[test]
    fn passthrough() {
        let src = "line one\n  indented\n\nsnake_case and a_b";
        assert_eq!(output(src), ["line one", "  indented", "", "snake_case and a_b"]);
    }

    #[test]
    fn if_else() {
        let src = "_#IF 1==1\nhello\n_#ELSE\nworld\n_#END_IF";
        assert_eq!(output(src), ["hello"]);
    }

    #[test]
    fn else_if_chain() {
        let src = "_#IF 0\na\n_#ELSE_IF 1\nb\n_#ELSIF 1\nc\n_#ELSE\nd\n_#END_IF";
        assert_eq!(output(src), ["b"]);
        let src = "_#IF 0\na\n_#ELSE_IF 0\nb\n_#ELSE\nd\n_#END_IF";
        assert_eq!(output(src), ["d"]);
    }

    #[test]
    fn else_if_short_circuits() {
        let calls = Rc::new(Cell::new(0));
        let mut interp = Interpreter::default().with_evaluator(Counting(Rc::clone(&calls)));
        let src = "_#IF yes\na\n_#ELSE_IF yes\nb\n_#ELSE_IF no\nc\n_#ELSE\nd\n_#END_IF";
        let out = interp.render_str("t", src).unwrap();
        assert_eq!(out.lines(), ["a"]);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn inactive_conditions_are_not_evaluated() {
        let src = "_#IF 0\n_#IF 1/0\nx\n_#END_IF\n_#END_IF\nok";
        assert_eq!(output(src), ["ok"]);
    }

    #[test]
    fn loop_over_literal() {
        let src = "_#LOOP r over [{\"n\":\"a\"},{\"n\":\"b\"}]\n_n\n_#END_LOOP";
        assert_eq!(output(src), ["a", "b"]);
    }

    #[test]
    fn loop_helpers_and_qualified_fields() {
        let src = "_#LOOP c in [\"red\",\"green\"]\n_c.index/_c.count: _c\n_#END_LOOP";
        assert_eq!(output(src), ["0/2: red", "1/2: green"]);
    }

    #[test]
    fn loop_over_absent_source_is_empty() {
        assert_eq!(output("before\n_#LOOP r over nothing\n_n\n_#END_LOOP\nafter"), ["before", "after"]);
    }

    #[test]
    fn nested_loops() {
        let src = "_#LOOP a in [\"x\",\"y\"]\n_#LOOP b in [\"1\",\"2\"]\n_a-_b\n_#END_LOOP\n_#END_LOOP";
        assert_eq!(output(src), ["x-1", "x-2", "y-1", "y-2"]);
    }

    #[test]
    fn inner_loop_over_outer_record_field() {
        let src = "_#LOOP r over [{\"tags\":[\"a\",\"b\"]},{\"tags\":[\"c\"]}]\n\
                   _#LOOP t over r.tags\n-_t\n_#END_LOOP\n_#END_LOOP";
        assert_eq!(output(src), ["-a", "-b", "-c"]);
    }

    #[test]
    fn loop_over_macro_parameter() {
        let src = "_#MACRO list items\n_#LOOP i over items\n*_i\n_#END_LOOP\n_#END_MACRO\n\
                   _list \"[\\\"p\\\",\\\"q\\\"]\"";
        assert_eq!(output(src), ["*p", "*q"]);
    }

    #[test]
    fn loop_over_record_table() {
        let mut tables = HashMap::new();
        tables.insert(
            "people".to_owned(),
            vec![Record::from_pairs([("name", "Ann")]), Record::from_pairs([("name", "Bo")])],
        );
        let mut interp = Interpreter::default().with_records(tables);
        let out = interp
            .render_str("t", "_#LOOP p over people\n- _p.name\n_#END_LOOP")
            .unwrap();
        assert_eq!(out.lines(), ["- Ann", "- Bo"]);
    }

    #[test]
    fn loop_in_false_branch_is_skipped() {
        let src = "_#IF 0\n_#LOOP r over [1,2]\nx\n_#END_LOOP\n_#END_IF";
        assert!(output(src).is_empty());
    }

    #[test]
    fn macro_call_by_name() {
        let src = "_#MACRO greet name\nHi _name\n_#END_MACRO\n_greet name=Bob";
        assert_eq!(output(src), ["Hi Bob"]);
    }

    #[test]
    fn macro_called_twice_and_redefined() {
        let src = "_#MACRO m x\n[_x]\n_#END_MACRO\n_#CALL m 1\n_#m 2\n_#MACRO m x\n(_x)\n_#END_MACRO\n_m 3";
        assert_eq!(output(src), ["[1]", "[2]", "(3)"]);
    }

    #[test]
    fn macro_defaults_and_indentation() {
        let src = "_#MACRO item label sep=\"-\"\n_label _sep ok\n_#END_MACRO\n    _item a\n  _item b sep=\"=\"";
        assert_eq!(output(src), ["    a - ok", "  b = ok"]);
    }

    #[test]
    fn defaulted_formal_in_the_middle() {
        let src = "_#MACRO m a b=\"x\" c\n[_a|_b|_c]\n_#END_MACRO\n_m 1 2 3\n_m 1";
        assert_eq!(output(src), ["[1|2|3]", "[1|x|]"]);
    }

    #[test]
    fn call_arguments_are_split_before_substitution() {
        let src = "_#DEFINE who \"Ann Lee\"\n_#DEFINE q \"say \\\"hi\\\"\"\n\
                   _#MACRO hi name rest=none\nHi _name (_rest)\n_#END_MACRO\n_hi _who\n_hi _q";
        assert_eq!(output(src), ["Hi Ann Lee (none)", "Hi say \"hi\" (none)"]);
    }

    #[test]
    fn macro_scope_does_not_leak() {
        let src = "_#MACRO m v\n_v\n_#END_MACRO\n_m inner\n[_v]";
        assert_eq!(output(src), ["inner", "[]"]);
    }

    #[test]
    fn undefined_macro() {
        let err = error("_#CALL nope");
        assert!(matches!(err.kind, ErrorKind::UndefinedMacro(ref n) if n == "nope"));
        assert_eq!(err.location, Location::new("test", 1));
    }

    #[test]
    fn recursion_limit() {
        let config = Config { max_depth: 5, ..Config::default() };
        let src = "_#MACRO r\n_r\n_#END_MACRO\n_r";
        let err = Interpreter::new(config).render_str("t", src).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::RecursionLimitExceeded(5)));
    }

    #[test]
    fn define_and_if_def() {
        let src = "_#DEFINE title \"Hello World\"\n_#IF_DEF title\nT: _title\n_#END_IF\n_#IF_NOT_DEF other\nno other\n_#END_IF";
        assert_eq!(output(src), ["T: Hello World", "no other"]);
    }

    #[test]
    fn if_set_sees_settings_and_bindings() {
        let mut interp = Interpreter::default();
        interp.settings_mut().set("user", "ann");
        let src = "_#IF_SET user\nu=_user\n_#END_IF\n_#IF_NOT_SET missing\nnone\n_#END_IF";
        assert_eq!(interp.render_str("t", src).unwrap().lines(), ["u=ann", "none"]);
    }

    #[test]
    fn define_does_not_persist_across_renders() {
        let mut interp = Interpreter::default();
        interp.render_str("t", "_#DEFINE x 1").unwrap();
        assert!(interp.settings().get("x").is_none());
    }

    #[test]
    fn unmatched_else_and_end_if() {
        let err = error("a\n_#ELSE");
        assert!(matches!(err.kind, ErrorKind::UnmatchedBlock(_)));
        assert_eq!(err.location, Location::new("test", 2));
        assert!(matches!(error("_#END_IF").kind, ErrorKind::UnmatchedBlock(_)));
        assert!(matches!(error("_#END_LOOP").kind, ErrorKind::UnmatchedBlock(_)));
    }

    #[test]
    fn unclosed_blocks() {
        assert!(matches!(error("_#IF 1\nx").kind, ErrorKind::UnmatchedBlock(_)));
        assert!(matches!(error("_#LOOP r in [1]\nx").kind, ErrorKind::UnmatchedBlock(_)));
        assert!(matches!(error("_#MACRO m\nx").kind, ErrorKind::UnmatchedBlock(_)));
    }

    #[test]
    fn macro_body_must_balance() {
        let src = "_#MACRO m\n_#IF 1\n_#END_MACRO\n_m\n_#END_IF";
        assert!(matches!(error(src).kind, ErrorKind::UnmatchedBlock(_)));
    }

    #[test]
    fn unknown_long_directive() {
        let err = error("ok\n_#BOGUS x");
        assert!(matches!(err.kind, ErrorKind::Syntax(_)));
        assert_eq!(err.location.line, 2);
    }

    #[test]
    fn unknown_directive_in_false_branch() {
        for cond in ["1", "0"] {
            let err = error(&format!("_#IF {cond}\na\n_#ELES\nb\n_#END_IF"));
            assert!(matches!(err.kind, ErrorKind::Syntax(_)));
            assert_eq!(err.location.line, 3);
        }
    }

    #[test]
    fn strict_mode_rejects_undefined_variables() {
        let config = Config { strict: true, ..Config::default() };
        let err = Interpreter::new(config).render_str("t", "Hi _who").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UndefinedVariable(ref n) if n == "who"));
    }

    #[test]
    fn include_with_indentation() {
        let loader = MemoryLoader::new()
            .with("main.tpl", "start\n  _#INCLUDE part.tpl\nend")
            .with("part.tpl", "p1\np2");
        let mut interp = Interpreter::default().with_loader(loader);
        let out = interp.render_path("main.tpl").unwrap();
        assert_eq!(out.lines(), ["start", "  p1", "  p2", "end"]);
    }

    #[test]
    fn self_include_is_circular() {
        let loader = MemoryLoader::new().with("a.tpl", "_#INCLUDE a.tpl");
        let err = Interpreter::default().with_loader(loader).render_path("a.tpl").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::CircularInclude { .. }));
    }

    #[test]
    fn mutual_include_is_circular() {
        let loader = MemoryLoader::new()
            .with("a.tpl", "_#INCLUDE b.tpl")
            .with("b.tpl", "x\n_#INCLUDE a.tpl");
        let err = Interpreter::default().with_loader(loader).render_path("a.tpl").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::CircularInclude { ref chain, .. } if chain == "a.tpl -> b.tpl"));
        assert_eq!(err.location, Location::new("b.tpl", 2));
    }

    #[test]
    fn included_file_cannot_close_includer_block() {
        let loader = MemoryLoader::new()
            .with("a.tpl", "_#IF 1\n_#INCLUDE b.tpl\n_#END_IF")
            .with("b.tpl", "_#END_IF");
        let err = Interpreter::default().with_loader(loader).render_path("a.tpl").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnmatchedBlock(_)));
        assert_eq!(err.location.path, "b.tpl");
    }

    #[test]
    fn missing_include_is_io_error() {
        let err = error("_#INCLUDE nowhere.tpl");
        assert!(matches!(err.kind, ErrorKind::Io { .. }));
    }

    #[test]
    fn cursor_collects_later_lines() {
        let src = "Header\n_{toc\n_}\n_#LOOP s in [\"A\",\"B\"]\n_:toc\n* _s\n_}\n## _s\n_#END_LOOP";
        let out = run(src).unwrap();
        assert_eq!(out.lines(), ["Header", "* A", "* B", "## A", "## B"]);
        assert_eq!(out.cursor("toc").unwrap(), ["* A", "* B"]);
    }

    #[test]
    fn cursor_query() {
        let src = "_?toc\nhas\n_#ELSE\nnone\n_#END_IF\n_{toc\n_}\n_?toc\nhas\n_#END_IF";
        assert_eq!(output(src), ["none", "has"]);
    }

    #[test]
    fn select_inside_macro_keeps_caller_selection() {
        let src = "_#MACRO m\n_:b\ninner\n_#END_MACRO\n_{a\n_m\nafter\n_}\nend";
        let out = run(src).unwrap();
        assert_eq!(out.cursor("b").unwrap(), ["inner"]);
        assert_eq!(out.cursor("a").unwrap(), ["inner", "after"]);
        assert_eq!(out.lines(), ["inner", "after", "end"]);
    }

    #[test]
    fn cursor_close_without_open() {
        assert!(matches!(error("_}").kind, ErrorKind::UnmatchedBlock(_)));
    }

    #[test]
    fn expression_error_is_reported() {
        let err = error("_#IF 1/0\nx\n_#END_IF");
        assert!(matches!(err.kind, ErrorKind::Expression(_)));
    }

    #[test]
    fn replay_errors_point_at_definition() {
        let src = "_#MACRO m\n_#BOGUS\n_#END_MACRO\n_m";
        let err = error(src);
        assert!(matches!(err.kind, ErrorKind::Syntax(_)));
        assert_eq!(err.location, Location::new("test", 2));
    }

    #[test]
    fn strip_loop_keyword_forms() {
        assert_eq!(strip_loop_keyword("over t"), "t");
        assert_eq!(strip_loop_keyword("IN t"), "t");
        assert_eq!(strip_loop_keyword("overview"), "overview");
        assert_eq!(strip_loop_keyword("[1]"), "[1]");
    }
}

//! Interpreter configuration and the settings-file parser.
//!
//! A settings file is line oriented:
//!
//! | Line | Action |
//! |------|--------|
//! | `/set <name>=<value>` or `/set <name> <value>` | set a value |
//! | `<name> = <value>` | same |
//! | Lines starting with `;` or `#` | comment, ignored |
//!
//! Recognised names configure the interpreter (see [`Config::apply`]); any
//! other name becomes a [`Settings`] variable visible to templates.

use std::path::{Path, PathBuf};

use crate::settings::Settings;
use crate::template::args::tokenize;

/// Default ceiling on nested macro calls and includes.
pub const DEFAULT_MAX_DEPTH: usize = 64;

// ── Indicators ────────────────────────────────────────────────────────────────

/// The prefixes that mark directives and variable references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indicators {
    /// Short-form directive / variable reference prefix.
    pub meta: String,
    /// Long-form directive prefix.
    pub meta_command: String,
    pub cursor_open: String,
    pub cursor_close: String,
    pub cursor_query: String,
    pub cursor_select: String,
}

impl Default for Indicators {
    fn default() -> Self {
        Self {
            meta: "_".to_owned(),
            meta_command: "_#".to_owned(),
            cursor_open: "_{".to_owned(),
            cursor_close: "_}".to_owned(),
            cursor_query: "_?".to_owned(),
            cursor_select: "_:".to_owned(),
        }
    }
}

impl Indicators {
    fn validate(&self) -> Result<(), String> {
        let all = [
            ("meta_indicator", &self.meta),
            ("meta_command_indicator", &self.meta_command),
            ("cursor_open", &self.cursor_open),
            ("cursor_close", &self.cursor_close),
            ("cursor_query", &self.cursor_query),
            ("cursor_select", &self.cursor_select),
        ];
        for (name, value) in all {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(format!("{name}: must be non-empty and contain no blanks"));
            }
        }
        if self.meta == self.meta_command {
            return Err("meta_indicator and meta_command_indicator must differ".into());
        }
        Ok(())
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

/// Interpreter options.
#[derive(Debug, Clone)]
pub struct Config {
    pub indicators: Indicators,
    /// Undefined variable references are errors instead of empty text.
    pub strict: bool,
    /// Ceiling on nested macro calls plus includes.
    pub max_depth: usize,
    /// Extra directories searched by `INCLUDE`, after the including file's own.
    pub include_dirs: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            indicators: Indicators::default(),
            strict: false,
            max_depth: DEFAULT_MAX_DEPTH,
            include_dirs: Vec::new(),
        }
    }
}

impl Config {
    /// Apply one `name = value` pair.
    ///
    /// Returns `Ok(true)` when `name` is an interpreter option, `Ok(false)`
    /// when it is not (the caller stores it as a plain setting).
    pub fn apply(&mut self, name: &str, value: &str) -> Result<bool, String> {
        let mut next = self.indicators.clone();
        match name {
            "meta_indicator" => next.meta = value.to_owned(),
            "meta_command_indicator" => next.meta_command = value.to_owned(),
            "cursor_open" => next.cursor_open = value.to_owned(),
            "cursor_close" => next.cursor_close = value.to_owned(),
            "cursor_query" => next.cursor_query = value.to_owned(),
            "cursor_select" => next.cursor_select = value.to_owned(),
            "strict" => {
                self.strict = parse_bool(value).ok_or_else(|| format!("strict: not a boolean: {value}"))?;
                return Ok(true);
            }
            "max_depth" => {
                let n: usize = value
                    .trim()
                    .parse()
                    .map_err(|_| format!("max_depth: not a number: {value}"))?;
                if n == 0 {
                    return Err("max_depth: must be at least 1".into());
                }
                self.max_depth = n;
                return Ok(true);
            }
            "include_path" => {
                self.include_dirs
                    .extend(value.split(':').filter(|s| !s.is_empty()).map(PathBuf::from));
                return Ok(true);
            }
            _ => return Ok(false),
        }
        next.validate()?;
        self.indicators = next;
        Ok(true)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}

// ── Settings file ─────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a settings file.
#[derive(Debug)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Parsed settings file: interpreter options plus template variables.
#[derive(Debug, Default)]
pub struct Profile {
    pub config: Config,
    pub settings: Settings,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a settings file string.
    ///
    /// Returns the profile and a list of errors on malformed lines; those
    /// lines are skipped and loading continues.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut profile = Profile::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            let parsed = match line.strip_prefix("/set") {
                Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
                    parse_set(rest.trim())
                }
                _ => parse_assignment(line),
            };
            let result = parsed.and_then(|(name, value)| profile.set(&name, &value));
            if let Err(message) = result {
                errors.push(ConfigError { line: lineno, message });
            }
        }

        (profile, errors)
    }

    /// Read and parse a settings file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    /// Route one value to the config or to the settings store.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), String> {
        if !self.config.apply(name, value)? {
            self.settings.set(name, value);
        }
        Ok(())
    }
}

/// Parse `/set <name>=<value>` or `/set <name> <value>`.
fn parse_set(args: &str) -> Result<(String, String), String> {
    let tokens = tokenize(args).map_err(|e| format!("/set: {e}"))?;
    if tokens.is_empty() {
        return Err("/set: requires an argument".into());
    }

    let (name, value) = if let Some(eq) = tokens[0].find('=') {
        (tokens[0][..eq].to_owned(), tokens[0][eq + 1..].to_owned())
    } else if tokens.len() >= 2 {
        (tokens[0].clone(), tokens[1..].join(" "))
    } else {
        return Err(format!("/set: missing value for '{}'", tokens[0]));
    };

    if name.is_empty() {
        return Err("/set: variable name cannot be empty".into());
    }
    Ok((name, value))
}

/// Parse `name = value`; the value is taken verbatim after trimming.
fn parse_assignment(line: &str) -> Result<(String, String), String> {
    let (name, value) = line
        .split_once('=')
        .ok_or_else(|| format!("expected 'name = value': {line}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("variable name cannot be empty".into());
    }
    Ok((name.to_owned(), value.trim().to_owned()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

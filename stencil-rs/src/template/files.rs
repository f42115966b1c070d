//! Line sources and the include stack.
//!
//! A [`SourceLoader`] turns an include path into a resolved key and opens a
//! [`LineSource`] for it.  [`FsLoader`] reads the filesystem; [`MemoryLoader`]
//! serves templates registered in memory.  The [`FileStack`] holds the chain
//! of sources currently being read and refuses to push a key already on it.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ErrorKind, Location};

// ── Sources ───────────────────────────────────────────────────────────────────

/// A sequential supply of lines, without terminators.
pub trait LineSource {
    fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Lines of an in-memory string.
#[derive(Debug)]
pub struct TextSource {
    lines: std::vec::IntoIter<String>,
}

impl TextSource {
    pub fn new(text: &str) -> Self {
        let lines: Vec<String> = text.lines().map(str::to_owned).collect();
        Self { lines: lines.into_iter() }
    }
}

impl LineSource for TextSource {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.next())
    }
}

/// Lines read lazily from any buffered reader.
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: R,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for ReaderSource<R> {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

// ── Loaders ───────────────────────────────────────────────────────────────────

/// Resolves and opens include targets.
pub trait SourceLoader {
    /// Resolve `path` as written in a template to a stable key.
    ///
    /// `from` is the key of the including source, if any; `dirs` are the
    /// configured include directories, searched after `from`'s directory.
    fn resolve(&self, path: &str, from: Option<&str>, dirs: &[PathBuf]) -> Result<String, ErrorKind>;

    fn open(&self, key: &str) -> Result<Box<dyn LineSource>, ErrorKind>;
}

fn not_found(path: &str) -> ErrorKind {
    ErrorKind::Io {
        path: path.to_owned(),
        source: io::Error::new(io::ErrorKind::NotFound, "no such template"),
    }
}

/// Candidate locations for `path`, in search order.
fn candidates(path: &str, from: Option<&str>, dirs: &[PathBuf]) -> Vec<PathBuf> {
    let p = Path::new(path);
    if p.is_absolute() {
        return vec![p.to_path_buf()];
    }
    let mut out = Vec::with_capacity(dirs.len() + 2);
    if let Some(parent) = from.and_then(|f| Path::new(f).parent()) {
        out.push(parent.join(p));
    }
    out.extend(dirs.iter().map(|d| d.join(p)));
    out.push(p.to_path_buf());
    out
}

/// Reads templates from the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn resolve(&self, path: &str, from: Option<&str>, dirs: &[PathBuf]) -> Result<String, ErrorKind> {
        let found = candidates(path, from, dirs)
            .into_iter()
            .find(|c| c.is_file())
            .ok_or_else(|| not_found(path))?;
        let key = found.canonicalize().unwrap_or(found);
        Ok(key.display().to_string())
    }

    fn open(&self, key: &str) -> Result<Box<dyn LineSource>, ErrorKind> {
        let file = File::open(key).map_err(|e| ErrorKind::Io { path: key.to_owned(), source: e })?;
        Ok(Box::new(ReaderSource::new(BufReader::new(file))))
    }
}

/// Templates held in memory, keyed by name.
///
/// Names are matched the way [`FsLoader`] matches paths (relative to the
/// including template's directory, then each include directory, then as
/// written) but never touch the filesystem.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    files: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.files.insert(name.into(), text.into());
        self
    }

    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }
}

impl SourceLoader for MemoryLoader {
    fn resolve(&self, path: &str, from: Option<&str>, dirs: &[PathBuf]) -> Result<String, ErrorKind> {
        candidates(path, from, dirs)
            .into_iter()
            .map(|c| c.display().to_string())
            .find(|k| self.files.contains_key(k))
            .ok_or_else(|| not_found(path))
    }

    fn open(&self, key: &str) -> Result<Box<dyn LineSource>, ErrorKind> {
        let text = self.files.get(key).ok_or_else(|| not_found(key))?;
        Ok(Box::new(TextSource::new(text)))
    }
}

// ── File stack ────────────────────────────────────────────────────────────────

pub struct FileFrame {
    pub path: String,
    source: Box<dyn LineSource>,
    pub line_number: usize,
}

impl FileFrame {
    pub fn location(&self) -> Location {
        Location::new(self.path.clone(), self.line_number)
    }
}

#[derive(Default)]
pub struct FileStack {
    frames: Vec<FileFrame>,
}

impl FileStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.frames.iter().any(|f| f.path == path)
    }

    /// Active include chain, outermost first.
    pub fn chain(&self) -> String {
        self.frames
            .iter()
            .map(|f| f.path.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn push(&mut self, path: String, source: Box<dyn LineSource>) -> Result<(), ErrorKind> {
        if self.contains(&path) {
            return Err(ErrorKind::CircularInclude { chain: self.chain(), path });
        }
        debug!(path = %path, depth = self.frames.len() + 1, "file push");
        self.frames.push(FileFrame { path, source, line_number: 0 });
        Ok(())
    }

    pub fn pop(&mut self) -> Option<FileFrame> {
        let frame = self.frames.pop()?;
        debug!(path = %frame.path, lines = frame.line_number, "file pop");
        Some(frame)
    }

    pub fn top(&self) -> Option<&FileFrame> {
        self.frames.last()
    }

    /// Next line of the top frame with its location; `None` at end of input.
    pub fn next_line(&mut self) -> Result<Option<(String, Location)>, ErrorKind> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(None);
        };
        match frame.source.next_line() {
            Ok(Some(line)) => {
                frame.line_number += 1;
                Ok(Some((line, frame.location())))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(ErrorKind::Io { path: frame.path.clone(), source: e }),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

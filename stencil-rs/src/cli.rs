//! Command-line argument parsing.
//!
//! Usage:
//!   stencil [-f[<file>]] [-D<name>=<value>]... [-I<dir>]... [-s] [-o<out>] <template>
//!
//! A template of `-` is read from standard input.

use std::path::PathBuf;

use directories::ProjectDirs;

pub const USAGE: &str =
    "Usage: stencil [-f[<file>]] [-D<name>=<value>]... [-I<dir>]... [-s] [-o<out>] <template>";

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Which settings file to load.
    pub settings: SettingsFile,
    /// `-D name=value` overrides, in order.
    pub defines: Vec<(String, String)>,
    /// Extra include directories (`-I<dir>`).
    pub include_dirs: Vec<PathBuf>,
    /// Undefined variables are errors (`-s`).
    pub strict: bool,
    /// Output file (`-o<out>`); standard output when absent.
    pub output: Option<PathBuf>,
    pub input: Input,
}

/// How to choose the settings file.
#[derive(Debug, Default)]
pub enum SettingsFile {
    /// Search the user config dir, then `./.stencilrc` (default).
    #[default]
    Search,
    /// `-f` with no file argument: no settings file.
    Skip,
    /// `-f<file>`: load this specific file.
    Explicit(PathBuf),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub enum Input {
    #[default]
    Stdin,
    Path(PathBuf),
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            i += 1;
            positional.extend(argv[i..].iter().cloned());
            break;
        }

        if !arg.starts_with('-') || arg == "-" {
            positional.push(arg.to_owned());
            i += 1;
            continue;
        }

        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                's' => args.strict = true,

                // -f[<file>]
                'f' => {
                    if j + 1 < chars.len() {
                        let file: String = chars[j + 1..].iter().collect();
                        args.settings = SettingsFile::Explicit(PathBuf::from(file));
                        j = chars.len();
                    } else if takes_file(argv, i) {
                        i += 1;
                        args.settings = SettingsFile::Explicit(PathBuf::from(&argv[i]));
                    } else {
                        args.settings = SettingsFile::Skip;
                    }
                }

                // -D<name>=<value>, -I<dir>, -o<out>
                flag @ ('D' | 'I' | 'o') => {
                    let value = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err(format!("-{flag} requires an argument"));
                    };
                    match flag {
                        'D' => args.defines.push(parse_define(&value)?),
                        'I' => args.include_dirs.push(PathBuf::from(value)),
                        _ => args.output = Some(PathBuf::from(value)),
                    }
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    match positional.len() {
        0 => return Err("missing template argument".to_owned()),
        1 => {
            let p = positional.remove(0);
            if p != "-" {
                args.input = Input::Path(PathBuf::from(p));
            }
        }
        n => return Err(format!("too many arguments ({n})")),
    }

    Ok(args)
}

/// `-f <file>` takes the next word only when another non-flag word follows
/// it, so `stencil -f page.tpl` means "no settings file".
fn takes_file(argv: &[String], i: usize) -> bool {
    let rest = &argv[i + 1..];
    match rest.first() {
        Some(next) if !next.starts_with('-') => {
            rest[1..].iter().any(|a| !a.starts_with('-') || a == "-")
        }
        _ => false,
    }
}

/// `name=value`; a bare `name` defines it as `1`.
fn parse_define(s: &str) -> Result<(String, String), String> {
    let (name, value) = s.split_once('=').unwrap_or((s, "1"));
    if name.is_empty() {
        return Err(format!("-D: missing name in '{s}'"));
    }
    Ok((name.to_owned(), value.to_owned()))
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Search for the settings file in the standard locations: the user config
/// directory (`stencilrc`), then `./.stencilrc`.
/// Returns the first path that exists, or `None`.
pub fn find_settings_file() -> Option<PathBuf> {
    let user = ProjectDirs::from("", "", "stencil").map(|d| d.config_dir().join("stencilrc"));
    user.into_iter()
        .chain(std::iter::once(PathBuf::from("./.stencilrc")))
        .find(|p| p.is_file())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn template_only() {
        let a = parse_argv(&argv(&["page.tpl"])).unwrap();
        assert_eq!(a.input, Input::Path(PathBuf::from("page.tpl")));
        assert!(matches!(a.settings, SettingsFile::Search));
        assert!(!a.strict);
    }

    #[test]
    fn stdin_template() {
        let a = parse_argv(&argv(&["-"])).unwrap();
        assert_eq!(a.input, Input::Stdin);
    }

    #[test]
    fn missing_template() {
        assert!(parse_argv(&argv(&[])).is_err());
        assert!(parse_argv(&argv(&["-s"])).is_err());
    }

    #[test]
    fn defines_embedded_and_separate() {
        let a = parse_argv(&argv(&["-Dname=Bob", "-D", "flag", "t.tpl"])).unwrap();
        assert_eq!(
            a.defines,
            [("name".to_owned(), "Bob".to_owned()), ("flag".to_owned(), "1".to_owned())]
        );
    }

    #[test]
    fn define_without_name() {
        assert!(parse_argv(&argv(&["-D=x", "t.tpl"])).is_err());
    }

    #[test]
    fn include_dirs_and_output() {
        let a = parse_argv(&argv(&["-Iinc", "-I", "lib", "-o", "out.txt", "t.tpl"])).unwrap();
        assert_eq!(a.include_dirs, [PathBuf::from("inc"), PathBuf::from("lib")]);
        assert_eq!(a.output, Some(PathBuf::from("out.txt")));
    }

    #[test]
    fn combined_flags() {
        let a = parse_argv(&argv(&["-sf", "t.tpl"])).unwrap();
        assert!(a.strict);
        assert!(matches!(a.settings, SettingsFile::Skip));
    }

    #[test]
    fn settings_explicit_embedded() {
        let a = parse_argv(&argv(&["-fmy.rc", "t.tpl"])).unwrap();
        assert!(matches!(&a.settings, SettingsFile::Explicit(p) if p == &PathBuf::from("my.rc")));
    }

    #[test]
    fn settings_explicit_separate() {
        let a = parse_argv(&argv(&["-f", "my.rc", "t.tpl"])).unwrap();
        assert!(matches!(&a.settings, SettingsFile::Explicit(p) if p == &PathBuf::from("my.rc")));
        assert_eq!(a.input, Input::Path(PathBuf::from("t.tpl")));
    }

    #[test]
    fn settings_skip_before_template() {
        let a = parse_argv(&argv(&["-f", "t.tpl"])).unwrap();
        assert!(matches!(a.settings, SettingsFile::Skip));
        assert_eq!(a.input, Input::Path(PathBuf::from("t.tpl")));
    }

    #[test]
    fn double_dash_ends_flags() {
        let a = parse_argv(&argv(&["--", "-odd.tpl"])).unwrap();
        assert_eq!(a.input, Input::Path(PathBuf::from("-odd.tpl")));
    }

    #[test]
    fn too_many_positional() {
        assert!(parse_argv(&argv(&["a", "b"])).is_err());
    }

    #[test]
    fn unknown_flag() {
        assert!(parse_argv(&argv(&["-z", "t.tpl"])).is_err());
    }

    #[test]
    fn flag_missing_argument() {
        assert!(parse_argv(&argv(&["t.tpl", "-o"])).is_err());
    }
}

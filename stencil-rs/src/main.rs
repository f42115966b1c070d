use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stencil::cli::{self, CliArgs, Input, SettingsFile};
use stencil::config::Profile;
use stencil::Interpreter;

fn main() -> ExitCode {
    // Diagnostics go to stderr; RUST_LOG selects the level.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("stencil: {e}");
            eprintln!("{}", cli::USAGE);
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("stencil: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: CliArgs) -> Result<(), String> {
    // ── Settings file ─────────────────────────────────────────────────────────
    let settings_path = match args.settings {
        SettingsFile::Skip => None,
        SettingsFile::Explicit(path) => Some(path),
        SettingsFile::Search => cli::find_settings_file(),
    };
    let mut profile = match settings_path {
        Some(path) => {
            let (profile, errors) = Profile::load_file(&path)
                .map_err(|e| format!("{}: {e}", path.display()))?;
            for e in errors {
                eprintln!("stencil: warning: {}: {e}", path.display());
            }
            tracing::debug!(path = %path.display(), "settings file loaded");
            profile
        }
        None => Profile::new(),
    };

    // ── Command-line overrides ────────────────────────────────────────────────
    for (name, value) in &args.defines {
        profile.set(name, value).map_err(|e| format!("-D {name}: {e}"))?;
    }
    profile.config.include_dirs.extend(args.include_dirs);
    profile.config.strict |= args.strict;

    // ── Render ────────────────────────────────────────────────────────────────
    let mut interp = Interpreter::from_profile(profile);
    let output = match args.input {
        Input::Path(path) => interp.render_path(&path),
        Input::Stdin => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| format!("<stdin>: {e}"))?;
            interp.render_str("<stdin>", &text)
        }
    }
    .map_err(|e| e.to_string())?;

    match args.output {
        Some(path) => fs::write(&path, output.to_string()).map_err(|e| format!("{}: {e}", path.display())),
        None => io::stdout()
            .lock()
            .write_all(output.to_string().as_bytes())
            .map_err(|e| format!("<stdout>: {e}")),
    }
}

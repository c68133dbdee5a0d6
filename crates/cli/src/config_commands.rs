use std::{fmt::Write as _, path::Path};

use {anyhow::Result, clap::Subcommand};

use kinvault_config::validate::{self, Severity, ValidationResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

pub async fn handle_config(path: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => {
            let result = validate::validate(path);
            eprint!("{}", render(&result, verbose, true));
            if result.has_errors() {
                std::process::exit(1);
            }
            Ok(())
        },
    }
}

fn paint(severity: Severity, ansi: bool) -> String {
    let (color, label) = match severity {
        Severity::Error => ("\x1b[31m", "error"),
        Severity::Warning => ("\x1b[33m", "warning"),
        Severity::Info => ("\x1b[36m", "info"),
    };
    if ansi {
        format!("\x1b[1m{color}{label}\x1b[0m")
    } else {
        label.to_string()
    }
}

/// Human-readable report of `result`. Info diagnostics only with `verbose`.
fn render(result: &ValidationResult, verbose: bool, ansi: bool) -> String {
    let mut out = match result.config_path {
        Some(ref path) => format!("Checking {}\n\n", path.display()),
        None => "No config file found; checking defaults.\n\n".to_string(),
    };

    let visible: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .collect();
    for d in &visible {
        let label = paint(d.severity, ansi);
        let _ = match d.path.as_str() {
            "" => writeln!(out, "  {label} {}", d.message),
            path => writeln!(out, "  {label} {path}: {}", d.message),
        };
    }
    if !visible.is_empty() {
        out.push('\n');
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        out.push_str("No issues found.\n");
    } else {
        let _ = writeln!(out, "{errors} error(s), {warnings} warning(s)");
    }
    out
}

use std::path::Path;

use anyhow::Result;

use switchboard_config::{
    SwitchboardConfig,
    validate::{self, Severity},
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Print diagnostics for the config file, then try a dry-run bootstrap.
/// Returns `false` when anything would stop `serve`.
pub fn check(path: Option<&Path>) -> Result<bool> {
    let result = validate::validate(path);

    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    for d in &result.diagnostics {
        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
        };
        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if !result.diagnostics.is_empty() {
        eprintln!();
    }
    if errors > 0 {
        eprintln!("{errors} error(s), {warnings} warning(s)");
        return Ok(false);
    }

    let config = switchboard_config::load_or_discover(path)?;
    match bootstrap_report(&config) {
        Ok(handlers) => {
            if warnings == 0 {
                eprintln!("No issues found; {handlers} handler key(s) registered.");
            } else {
                eprintln!("{warnings} warning(s); {handlers} handler key(s) registered.");
            }
            Ok(true)
        },
        Err(e) => {
            eprintln!("  {BOLD}{RED}error{RESET} bootstrap: {e}");
            Ok(false)
        },
    }
}

fn bootstrap_report(config: &SwitchboardConfig) -> switchboard_registry::Result<usize> {
    Ok(switchboard_gateway::registry_from_config(config)?.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, std::io::Write};

    fn write(body: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("switchboard.toml");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(body.as_bytes())
            .unwrap();
        (dir, path)
    }

    #[test]
    fn clean_config_passes() {
        let (_dir, path) = write("[server]\nport = 9001\n");
        assert!(check(Some(&path)).unwrap());
    }

    #[test]
    fn validation_error_fails() {
        let (_dir, path) = write("[[auth.tokens]]\ntoken = \"\"\nsubject = \"a\"\n");
        assert!(!check(Some(&path)).unwrap());
    }

    #[test]
    fn dangling_alias_fails_bootstrap() {
        let (_dir, path) = write("[aliases]\n\"x.y\" = \"nope.missing\"\n");
        assert!(!check(Some(&path)).unwrap());
    }
}

use regex::Regex;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::{DebuggerError, Result};

// Include the pattern template at compile time
const DEFAULT_PATTERNS: &str = include_str!("../default_domain_patterns.txt");

/// File picked up from the working directory when no pattern file is given
pub const DEFAULT_PATTERN_FILE: &str = "domain_patterns.txt";

fn parse_patterns(content: &str, strict: bool, component: &'static str) -> Result<Vec<Regex>> {
    let mut patterns = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match Regex::new(line) {
            Ok(regex) => patterns.push(regex),
            Err(source) if strict => {
                return Err(DebuggerError::InvalidPattern {
                    line: line_num + 1,
                    source,
                })
            }
            Err(e) => {
                warn!(action = "parse", component = component, line_number = line_num + 1, error = %e, "Invalid regex pattern")
            }
        }
    }

    Ok(patterns)
}

/// Load grouping override patterns.
///
/// Each pattern needs one capture group holding the domain a matching host is
/// grouped under. An explicit file must be valid; the working-directory
/// default only warns about bad lines.
pub fn load_domain_patterns(pattern_file_path: Option<&Path>) -> Result<Vec<Regex>> {
    let start_time = Instant::now();
    info!(
        action = "start",
        component = "pattern_loading",
        "Starting domain pattern loading"
    );

    let patterns = if let Some(path) = pattern_file_path {
        info!(action = "load", component = "pattern_file", file_path = ?path, "Loading patterns from specified file");
        let content = fs::read_to_string(path)?;
        parse_patterns(&content, true, "pattern_file")?
    } else {
        let default_file = Path::new(DEFAULT_PATTERN_FILE);
        if default_file.exists() {
            info!(action = "load", component = "default_pattern_file", file_path = ?default_file, "Loading patterns from default file");
            let content = fs::read_to_string(default_file)?;
            parse_patterns(&content, false, "default_pattern_file")?
        } else {
            info!(
                action = "load",
                component = "embedded_patterns",
                "Using embedded pattern template"
            );
            parse_patterns(DEFAULT_PATTERNS, false, "embedded_patterns")?
        }
    };

    info!(
        action = "complete",
        component = "pattern_loading",
        pattern_count = patterns.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Successfully compiled patterns"
    );
    Ok(patterns)
}

/// Write the pattern template to `path`, refusing to overwrite.
pub fn init_default_patterns(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first if you want to reinitialize.",
            path.display()
        );
    }

    fs::write(path, DEFAULT_PATTERNS)?;
    info!(action = "init", component = "pattern_file", file_path = ?path, "Wrote pattern template");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_has_no_active_patterns() {
        let patterns = parse_patterns(DEFAULT_PATTERNS, true, "test").unwrap();
        assert!(patterns.is_empty());
    }

    #[test]
    fn explicit_file_is_strict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.txt");
        fs::write(&path, "# comment\n^.+\\.(cdn\\.example)$\n(unclosed\n").unwrap();

        let err = load_domain_patterns(Some(&path)).unwrap_err();
        assert!(matches!(err, DebuggerError::InvalidPattern { line: 3, .. }));
    }

    #[test]
    fn explicit_file_loads_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.txt");
        fs::write(&path, "^.+\\.(cdn\\.example)$\n\n# ignored\n").unwrap();

        let patterns = load_domain_patterns(Some(&path)).unwrap();
        assert_eq!(patterns.len(), 1);
        assert!(patterns[0].is_match("img.cdn.example"));
    }

    #[test]
    fn lenient_parse_skips_bad_lines() {
        let patterns = parse_patterns("(bad\n^(ok)$\n", false, "test").unwrap();
        assert_eq!(patterns.len(), 1);
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_PATTERN_FILE);

        init_default_patterns(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_PATTERNS);
        assert!(init_default_patterns(&path).is_err());
    }
}

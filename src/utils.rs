use time::macros::format_description;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;

pub fn setup_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "error" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let timer = LocalTime::new(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(timer)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Prompt line as shown to the user, prefixed with the remaining count
pub fn format_prompt(remaining: Option<usize>, text: &str) -> String {
    match remaining {
        Some(count) => format!("[{} left] {}", count, text),
        None => text.to_string(),
    }
}

pub fn format_number(num: usize) -> String {
    num.to_string()
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(",")
}

pub fn redact_domain(domain: &str) -> String {
    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() <= 1 {
        return domain.to_string();
    }

    if parts[parts.len() - 2].len() <= 3 {
        return format!("???.{}", parts[parts.len() - 1]);
    }

    let redacted_parts: Vec<String> = parts[..parts.len() - 1]
        .iter()
        .map(|part| "*".repeat(part.len()))
        .collect();

    let mut result = redacted_parts.join(".");
    result.push('.');
    result.push_str(parts[parts.len() - 1]);
    result
}

pub fn validate_args(args: &crate::args::Args) -> anyhow::Result<()> {
    if let Some(script) = &args.script {
        if script.trim().is_empty() {
            anyhow::bail!("--script must contain at least one command");
        }
    }

    if !args.init {
        match &args.trackers {
            Some(path) if !path.exists() => {
                anyhow::bail!("Tracker list not found: {:?}", path)
            }
            Some(_) => {}
            None => anyhow::bail!("A tracker list is required"),
        }
    }

    if args.no_patterns && args.patterns.is_some() {
        anyhow::bail!("--patterns cannot be combined with --no-patterns");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn prompt_prefix() {
        assert_eq!(format_prompt(Some(3), "Blocked"), "[3 left] Blocked");
        assert_eq!(format_prompt(Some(0), "Done"), "[0 left] Done");
        assert_eq!(format_prompt(None, "Stopped"), "Stopped");
    }

    #[test]
    fn numbers_are_grouped() {
        assert_eq!(format_number(7), "7");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn redaction() {
        assert_eq!(redact_domain("tracker.example.com"), "*******.*******.com");
        assert_eq!(redact_domain("ads.io"), "???.io");
        assert_eq!(redact_domain("localhost"), "localhost");
    }

    #[test]
    fn args_validation() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("trackers.txt");
        std::fs::write(&list, "a.com\n").unwrap();
        let list = list.to_string_lossy().to_string();

        let ok = crate::args::Args::parse_from(["tracker-bisect", &list, "--script", "c,c"]);
        assert!(validate_args(&ok).is_ok());

        let empty_script = crate::args::Args::parse_from(["tracker-bisect", &list, "--script", " "]);
        assert!(validate_args(&empty_script).is_err());

        let missing = crate::args::Args::parse_from(["tracker-bisect", "/nonexistent/trackers.txt"]);
        assert!(validate_args(&missing).is_err());

        let init = crate::args::Args::parse_from(["tracker-bisect", "--init"]);
        assert!(validate_args(&init).is_ok());
    }
}

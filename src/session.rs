use anyhow::{Context, Result};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, info, warn};

use crate::context::DebuggerFsmContext;
use crate::domain::DomainResolver;
use crate::error::DebuggerError;
use crate::hooks::{Button, DebuggerHooks};
use crate::patterns::load_domain_patterns;
use crate::registry::{BlockReason, TrackerRegistry};
use crate::report::{Outcome, SessionReport};
use crate::suffix::SuffixList;
use crate::utils::{format_number, format_prompt, redact_domain};
use crate::Args;

const HELP: &str = "Commands: continue (c), broke (b), list (l), stop (s), help (h)
Tracker table: block <host>, unblock <host>, toggle <host>, select <host>, deselect <host>,
  select-all, select-none, block-selected, unblock-selected, reset, record <url> [reason]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Continue,
    WebsiteBroke,
    Stop,
    List,
    Help,
    Block(String),
    Unblock(String),
    Toggle(String),
    Select(String),
    Deselect(String),
    SelectAll(bool),
    BlockSelected(bool),
    Reset,
    Record { url: String, reason: BlockReason },
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let verb = parts.next().unwrap_or_default().to_lowercase();
        let host = |parts: &mut std::str::SplitWhitespace<'_>| -> Result<String> {
            parts
                .next()
                .map(str::to_lowercase)
                .with_context(|| format!("'{}' needs a tracker hostname", verb))
        };

        let command = match verb.as_str() {
            "c" | "n" | "continue" | "next" => Command::Continue,
            "b" | "broke" | "broken" => Command::WebsiteBroke,
            "s" | "q" | "stop" | "quit" => Command::Stop,
            "l" | "list" => Command::List,
            "h" | "?" | "help" => Command::Help,
            "block" => Command::Block(host(&mut parts)?),
            "unblock" => Command::Unblock(host(&mut parts)?),
            "toggle" => Command::Toggle(host(&mut parts)?),
            "select" => Command::Select(host(&mut parts)?),
            "deselect" => Command::Deselect(host(&mut parts)?),
            "select-all" => Command::SelectAll(true),
            "select-none" => Command::SelectAll(false),
            "block-selected" => Command::BlockSelected(true),
            "unblock-selected" => Command::BlockSelected(false),
            "reset" => Command::Reset,
            "record" => {
                let url = parts.next().context("'record' needs a URL")?.to_string();
                let reason = parts
                    .next()
                    .and_then(|r| r.parse().ok())
                    .unwrap_or(BlockReason::TrackingProtection);
                Command::Record { url, reason }
            }
            other => anyhow::bail!("Unknown command '{}'. {}", other, HELP),
        };
        Ok(command)
    }
}

/// Hooks a terminal session can be driven through
pub trait SessionHooks: DebuggerHooks {
    /// Whether the debugger currently allows `button`
    fn is_enabled(&self, button: Button) -> bool;

    /// The tracker table that block updates and table commands act on
    fn registry(&self) -> &Mutex<TrackerRegistry>;
}

/// Hooks for a terminal session.
///
/// Prompts go to stdout, button state is remembered so disabled actions can
/// be refused, and block updates are applied to the shared registry.
pub struct ConsoleHooks {
    registry: Arc<Mutex<TrackerRegistry>>,
    disabled: Mutex<HashMap<Button, bool>>,
}

impl ConsoleHooks {
    pub fn new(registry: Arc<Mutex<TrackerRegistry>>) -> Self {
        Self {
            registry,
            disabled: Mutex::new(HashMap::new()),
        }
    }
}

impl SessionHooks for ConsoleHooks {
    /// Buttons start out disabled until the debugger enables them
    fn is_enabled(&self, button: Button) -> bool {
        self.disabled
            .lock()
            .map(|states| !states.get(&button).copied().unwrap_or(true))
            .unwrap_or(false)
    }

    fn registry(&self) -> &Mutex<TrackerRegistry> {
        &self.registry
    }
}

#[async_trait::async_trait]
impl DebuggerHooks for ConsoleHooks {
    fn on_prompt_text_update(&self, remaining: Option<usize>, text: &str, terminal: bool) {
        println!("{}", format_prompt(remaining, text));
        if terminal {
            println!();
        }
    }

    fn on_button_state_update(&self, button: Button, disabled: bool) {
        debug!(action = "button", component = "console", button = %button, disabled, "Button state updated");
        if let Ok(mut states) = self.disabled.lock() {
            states.insert(button, disabled);
        }
    }

    async fn on_trackers_blocked_state_update(
        &self,
        blocked: bool,
        hosts: &[String],
    ) -> crate::Result<()> {
        let mut registry = self
            .registry
            .lock()
            .map_err(|_| DebuggerError::Blocker("tracker registry lock poisoned".to_string()))?;
        registry.set_blocked(blocked, hosts);
        let action = if blocked { "block" } else { "unblock" };
        info!(
            action,
            component = "console",
            host_count = hosts.len(),
            "Updated tracker blocking"
        );
        Ok(())
    }
}

/// Where session commands come from
pub enum CommandSource {
    Script(VecDeque<Command>),
    Stdin(Lines<BufReader<Stdin>>),
}

impl CommandSource {
    /// Parse a comma-, semicolon- or newline-separated command script
    pub fn script(script: &str) -> Result<Self> {
        let commands = script
            .split([',', ';', '\n'])
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(Command::from_str)
            .collect::<Result<VecDeque<_>>>()?;
        Ok(CommandSource::Script(commands))
    }

    pub fn stdin() -> Self {
        CommandSource::Stdin(BufReader::new(tokio::io::stdin()).lines())
    }

    pub async fn next_command(&mut self) -> Result<Option<Command>> {
        match self {
            CommandSource::Script(commands) => Ok(commands.pop_front()),
            CommandSource::Stdin(lines) => loop {
                let Some(line) = lines.next_line().await.context("Failed to read command")? else {
                    return Ok(None);
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse() {
                    Ok(command) => return Ok(Some(command)),
                    Err(e) => println!("{}", e),
                }
            },
        }
    }
}

/// Feed commands to the debugger until it completes or is stopped.
///
/// Running out of commands stops the session. A failed block or unblock is
/// reported and leaves the stage as it was, so the same command can be sent
/// again.
pub async fn drive<H: SessionHooks>(
    context: &mut DebuggerFsmContext<H>,
    source: &mut CommandSource,
) -> Result<Outcome> {
    while let Some(command) = source.next_command().await? {
        debug!(action = "command", component = "session", command = ?command, stage = %context.stage_kind(), "Received command");
        let result = match command {
            Command::Continue => {
                if context.hooks().is_enabled(Button::TestNextTracker) {
                    context.on_test_next_tracker().await
                } else {
                    println!("'Continue' is not available right now.");
                    Ok(())
                }
            }
            Command::WebsiteBroke => {
                if context.hooks().is_enabled(Button::WebsiteBroke) {
                    context.on_website_broke().await
                } else {
                    println!("'Website Broke' is not available right now.");
                    Ok(())
                }
            }
            Command::Stop => {
                context.stop().await?;
                return Ok(Outcome::Stopped);
            }
            Command::List => {
                print_tracker_table(context.hooks().registry());
                Ok(())
            }
            Command::Help => {
                println!("{}", HELP);
                Ok(())
            }
            table_command => {
                if let Err(e) = apply_table_command(context.hooks().registry(), table_command) {
                    println!("Error: {:#}", e);
                }
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!(action = "retry", component = "session", error = %e, stage = %context.stage_kind(), "Debugger action failed");
            println!("Error: {}. The stage is unchanged, try again.", e);
        }

        if context.is_completed() {
            return Ok(Outcome::Completed);
        }
    }

    warn!(action = "stop", component = "session", "Command input ended before the session completed");
    context.stop().await?;
    Ok(Outcome::Stopped)
}

/// Apply a manual tracker table command, the way the panel's row buttons,
/// selection checkboxes and reset button do.
pub fn apply_table_command(registry: &Mutex<TrackerRegistry>, command: Command) -> Result<()> {
    let mut registry = registry
        .lock()
        .map_err(|_| anyhow::anyhow!("tracker registry lock poisoned"))?;

    fn known(registry: &TrackerRegistry, host: &str) -> bool {
        let known = registry.reason(host).is_some();
        if !known {
            println!("Unknown tracker '{}'.", host);
        }
        known
    }

    match command {
        Command::Block(host) if known(&registry, &host) => {
            registry.set_blocked(true, &[&host]);
            println!("Blocked '{}'.", host);
        }
        Command::Unblock(host) if known(&registry, &host) => {
            registry.set_blocked(false, &[&host]);
            println!("Unblocked '{}'.", host);
        }
        Command::Toggle(host) if known(&registry, &host) => {
            let state = if registry.toggle(&host) { "Blocked" } else { "Unblocked" };
            println!("{} '{}'.", state, host);
        }
        Command::Select(host) if known(&registry, &host) => registry.select(&host),
        Command::Deselect(host) => registry.deselect(&host),
        Command::SelectAll(checked) => registry.select_all(checked),
        Command::BlockSelected(blocked) => {
            let count = registry.selected().len();
            if registry.block_selected(blocked) {
                let state = if blocked { "Blocked" } else { "Unblocked" };
                println!("{} {} selected trackers.", state, count);
            } else {
                println!("No trackers selected.");
            }
        }
        Command::Reset => {
            registry.reset();
            println!("Selection cleared and all trackers blocked.");
        }
        Command::Record { url, reason } => {
            let allowed = registry.record_blocked_channel(&url, reason)?;
            println!("{} request to '{}'.", if allowed { "Allowed" } else { "Blocked" }, url);
        }
        _ => {}
    }

    debug!(action = "table", component = "session", selected = registry.selected().len(), "Applied tracker table command");
    Ok(())
}

pub fn print_tracker_table(registry: &Mutex<TrackerRegistry>) {
    let Ok(registry) = registry.lock() else {
        return;
    };
    if registry.is_empty() {
        println!("No blocked resources.");
        return;
    }
    for row in registry.rows() {
        let state = if row.blocked { "Blocked" } else { "Not Blocked" };
        println!("{:<12} {:<40} {}", state, row.hostname, row.reason);
    }
}

pub async fn run_session(args: &Args) -> Result<SessionReport> {
    let total_start_time = Instant::now();
    info!(action = "start", component = "session", "Starting tracker debugging session");

    let tracker_path = args
        .trackers
        .as_deref()
        .context("A tracker list is required")?;
    let content = fs::read_to_string(tracker_path)
        .with_context(|| format!("Failed to read tracker list {:?}", tracker_path))?;
    let (registry, skipped) = TrackerRegistry::parse_tracker_list(&content);
    if skipped > 0 {
        warn!(action = "parse", component = "session", skipped, "Some tracker entries were skipped");
    }

    let suffixes = match &args.suffixes {
        Some(path) => SuffixList::load(path)
            .with_context(|| format!("Failed to load public suffix list {:?}", path))?,
        None => SuffixList::embedded(),
    };
    let patterns = if args.no_patterns {
        Vec::new()
    } else {
        load_domain_patterns(args.patterns.as_deref())?
    };
    let resolver = DomainResolver::new(suffixes, patterns);

    let trackers = registry.hostnames();
    let hooks = ConsoleHooks::new(Arc::new(Mutex::new(registry)));
    let mut context = DebuggerFsmContext::start(trackers, hooks, &resolver)
        .await
        .context("Failed to start debugging session")?;

    let mut source = match &args.script {
        Some(script) => CommandSource::script(script)?,
        None => {
            println!("{}", HELP);
            CommandSource::stdin()
        }
    };

    let outcome = drive(&mut context, &mut source).await?;
    let report = context.report();

    info!(
        action = "complete",
        component = "session",
        outcome = ?outcome,
        duration_ms = total_start_time.elapsed().as_millis(),
        "Session finished"
    );
    Ok(report)
}

pub fn print_session_report(report: &SessionReport, args: &Args) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let display = |host: &String| {
        if args.redact {
            redact_domain(host)
        } else {
            host.clone()
        }
    };

    println!("\n--- Tracker Debugging Session ---");
    println!(
        "Outcome: {:?} after {}s",
        report.outcome,
        report.duration().num_seconds()
    );
    println!(
        "Trackers tested: {} in {} domain groups",
        format_number(report.total_trackers),
        format_number(report.domain_groups)
    );
    println!(
        "Deferred to subdomain stage: {}",
        format_number(report.deferred_trackers.len())
    );

    if report.necessary_trackers.is_empty() {
        println!("\nNo trackers need to be added to the exceptions list.");
    } else {
        println!("\nAdd these trackers to the exceptions list:");
        for host in &report.necessary_trackers {
            println!("- {}", display(host));
        }
    }

    Ok(())
}

//! Session context for the interactive tracker debugger.
//!
//! [`DebuggerFsmContext`] is the single entry point for a host UI. It owns
//! the tracker sets that persist across stages and the active [`Stage`], and
//! forwards the two user actions to whichever stage is active.

use chrono::Utc;
use indexmap::IndexSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::BaseDomain;
use crate::error::{DebuggerError, Result};
use crate::hooks::{Button, DebuggerHooks};
use crate::report::{Outcome, SessionReport};
use crate::stage::{DomainStage, Stage, StageKind};

/// Tracker sets that live for the whole session
#[derive(Debug, Clone, Default)]
pub struct TrackerSets {
    all_trackers: Vec<String>,
    subdomain_stage_trackers: IndexSet<String>,
    necessary_trackers: IndexSet<String>,
}

impl TrackerSets {
    pub fn new(all_trackers: Vec<String>) -> Self {
        Self {
            all_trackers,
            ..Default::default()
        }
    }

    pub fn all_trackers(&self) -> &[String] {
        &self.all_trackers
    }

    /// Trackers deferred from the domain stage, in deferral order
    pub fn subdomain_stage_trackers(&self) -> &IndexSet<String> {
        &self.subdomain_stage_trackers
    }

    /// Trackers confirmed as required by the site, in confirmation order
    pub fn necessary_trackers(&self) -> &IndexSet<String> {
        &self.necessary_trackers
    }

    pub(crate) fn defer(&mut self, host: &str) {
        self.subdomain_stage_trackers.insert(host.to_string());
    }

    pub(crate) fn mark_necessary(&mut self, host: &str) {
        self.necessary_trackers.insert(host.to_string());
    }
}

pub struct DebuggerFsmContext<H> {
    sets: TrackerSets,
    hooks: H,
    state: Stage,
    domain_groups: usize,
    started_at: chrono::DateTime<Utc>,
}

impl<H: DebuggerHooks> DebuggerFsmContext<H> {
    /// Start a session over `trackers`.
    ///
    /// Hostnames are trimmed and lowercased, and duplicates are dropped. Every
    /// tracker is unblocked before the domain stage starts.
    pub async fn start<I, S>(trackers: I, hooks: H, resolver: &dyn BaseDomain) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let all_trackers: Vec<String> = trackers
            .into_iter()
            .map(|tracker| Into::<String>::into(tracker).trim().to_lowercase())
            .collect::<IndexSet<String>>()
            .into_iter()
            .collect();

        if all_trackers.is_empty() {
            warn!(action = "start", component = "debugger", "Refusing to start without trackers");
            return Err(DebuggerError::NoTrackers);
        }

        info!(
            action = "start",
            component = "debugger",
            tracker_count = all_trackers.len(),
            "Starting interactive debugging session"
        );

        let sets = TrackerSets::new(all_trackers);
        hooks
            .on_trackers_blocked_state_update(false, sets.all_trackers())
            .await?;
        hooks.on_button_state_update(Button::StopDebugging, false);

        let domain_stage = DomainStage::enter(&sets, resolver, &hooks);
        let domain_groups = domain_stage.pending_groups().count();

        Ok(Self {
            sets,
            hooks,
            state: Stage::Domain(domain_stage),
            domain_groups,
            started_at: Utc::now(),
        })
    }

    /// Replace the active stage. No hooks fire.
    pub fn change_state(&mut self, state: Stage) {
        info!(
            action = "transition",
            component = "debugger",
            from = %self.state.kind(),
            to = %state.kind(),
            "Changing debugger stage"
        );
        self.state = state;
    }

    /// The user asked to test the next tracker ("Continue")
    pub async fn on_test_next_tracker(&mut self) -> Result<()> {
        let next = self
            .state
            .as_state_mut()
            .on_test_next_tracker(&mut self.sets, &self.hooks)
            .await?;

        if let Some(next) = next {
            self.change_state(next);
        }
        Ok(())
    }

    /// The user reported that the website broke
    pub async fn on_website_broke(&mut self) -> Result<()> {
        self.state
            .as_state_mut()
            .on_website_broke(&mut self.sets, &self.hooks)
            .await
    }

    /// Stop the session and unblock every tracker.
    ///
    /// The active stage is left as it is; the context is meant to be dropped
    /// afterwards.
    pub async fn stop(&mut self) -> Result<()> {
        info!(action = "stop", component = "debugger", stage = %self.state.kind(), "Stopping interactive debugger");

        self.hooks
            .on_prompt_text_update(None, "Interactive debugger stopped.", false);
        self.hooks
            .on_trackers_blocked_state_update(false, self.sets.all_trackers())
            .await?;
        for button in Button::ALL {
            self.hooks.on_button_state_update(button, true);
        }
        Ok(())
    }

    pub fn sets(&self) -> &TrackerSets {
        &self.sets
    }

    pub fn all_trackers(&self) -> &[String] {
        self.sets.all_trackers()
    }

    pub fn subdomain_stage_trackers(&self) -> &IndexSet<String> {
        self.sets.subdomain_stage_trackers()
    }

    pub fn necessary_trackers(&self) -> &IndexSet<String> {
        self.sets.necessary_trackers()
    }

    pub fn stage(&self) -> &Stage {
        &self.state
    }

    pub fn stage_kind(&self) -> StageKind {
        self.state.kind()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, Stage::Completed(_))
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Summary of the session so far
    pub fn report(&self) -> SessionReport {
        SessionReport {
            started_at: self.started_at,
            finished_at: Utc::now(),
            outcome: if self.is_completed() {
                Outcome::Completed
            } else {
                Outcome::Stopped
            },
            stage: self.stage_kind(),
            total_trackers: self.sets.all_trackers().len(),
            domain_groups: self.domain_groups,
            deferred_trackers: self.sets.subdomain_stage_trackers().iter().cloned().collect(),
            necessary_trackers: self.sets.necessary_trackers().iter().cloned().collect(),
        }
    }
}

/// A context shared between concurrent callers.
///
/// Every call takes the lock for its whole duration, so actions are applied
/// one at a time in the order the lock is acquired.
pub struct SharedDebugger<H> {
    inner: Arc<Mutex<DebuggerFsmContext<H>>>,
}

impl<H> Clone for SharedDebugger<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: DebuggerHooks> SharedDebugger<H> {
    pub fn new(context: DebuggerFsmContext<H>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(context)),
        }
    }

    pub async fn on_test_next_tracker(&self) -> Result<()> {
        self.inner.lock().await.on_test_next_tracker().await
    }

    pub async fn on_website_broke(&self) -> Result<()> {
        self.inner.lock().await.on_website_broke().await
    }

    pub async fn stop(&self) -> Result<()> {
        self.inner.lock().await.stop().await
    }

    pub async fn stage_kind(&self) -> StageKind {
        self.inner.lock().await.stage_kind()
    }

    pub async fn report(&self) -> SessionReport {
        self.inner.lock().await.report()
    }

    /// Run `f` with exclusive access to the context
    pub async fn with_context<R>(&self, f: impl FnOnce(&DebuggerFsmContext<H>) -> R) -> R {
        f(&*self.inner.lock().await)
    }
}

//! Stages of a debugging session.
//!
//! A session moves through three stages in a fixed order:
//!
//! - [`DomainStage`] blocks one registrable-domain group at a time. Groups
//!   whose block breaks the site are unblocked and deferred.
//! - [`SubdomainStage`] blocks each deferred host on its own. Hosts whose
//!   block breaks the site become necessary trackers.
//! - [`CompletedStage`] reports the necessary trackers and ignores input.
//!
//! Stages never hold a reference back to the context. The context passes its
//! tracker sets and hooks into every call, and a stage asks for a transition
//! by returning the next [`Stage`].
//!
//! Blocking hooks run before any stage data changes, so an error from the
//! blocker leaves the stage as it was and the same action can be retried.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info};

use crate::context::TrackerSets;
use crate::domain::{group_by_domain, BaseDomain, DomainGroup};
use crate::error::Result;
use crate::hooks::{Button, DebuggerHooks};

/// The two user actions every stage responds to
#[async_trait]
pub trait FsmState: Send {
    /// "Continue": block the next unit. Returns the stage to switch to when
    /// this stage has nothing left to test.
    async fn on_test_next_tracker(
        &mut self,
        sets: &mut TrackerSets,
        hooks: &dyn DebuggerHooks,
    ) -> Result<Option<Stage>>;

    /// "Website broke": unblock the most recently blocked unit. Does nothing
    /// when no unit is awaiting a decision.
    async fn on_website_broke(&mut self, sets: &mut TrackerSets, hooks: &dyn DebuggerHooks) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Domain,
    Subdomain,
    Completed,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Domain => "domain",
            StageKind::Subdomain => "subdomain",
            StageKind::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// The active stage of a session
#[derive(Debug)]
pub enum Stage {
    Domain(DomainStage),
    Subdomain(SubdomainStage),
    Completed(CompletedStage),
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Domain(_) => StageKind::Domain,
            Stage::Subdomain(_) => StageKind::Subdomain,
            Stage::Completed(_) => StageKind::Completed,
        }
    }

    /// Units not yet tested in this stage
    pub fn remaining(&self) -> usize {
        match self {
            Stage::Domain(stage) => stage.groups.len(),
            Stage::Subdomain(stage) => stage.subdomains.len(),
            Stage::Completed(_) => 0,
        }
    }

    pub fn as_state_mut(&mut self) -> &mut dyn FsmState {
        match self {
            Stage::Domain(stage) => stage,
            Stage::Subdomain(stage) => stage,
            Stage::Completed(stage) => stage,
        }
    }
}

#[derive(Debug)]
pub struct DomainStage {
    groups: VecDeque<DomainGroup>,
    last_group: Option<DomainGroup>,
}

impl DomainStage {
    pub fn enter(sets: &TrackerSets, resolver: &dyn BaseDomain, hooks: &dyn DebuggerHooks) -> Self {
        let groups: VecDeque<DomainGroup> = group_by_domain(sets.all_trackers(), resolver).into();
        info!(
            action = "enter",
            component = "domain_stage",
            tracker_count = sets.all_trackers().len(),
            group_count = groups.len(),
            "Entering domain stage"
        );

        hooks.on_prompt_text_update(
            Some(groups.len()),
            "Click 'Continue' to start domain debugging.",
            false,
        );
        hooks.on_button_state_update(Button::TestNextTracker, false);

        Self {
            groups,
            last_group: None,
        }
    }

    /// Groups still waiting to be tested, in test order
    pub fn pending_groups(&self) -> impl Iterator<Item = &DomainGroup> {
        self.groups.iter()
    }

    /// The blocked group awaiting a "continue" or "broke" decision
    pub fn last_group(&self) -> Option<&DomainGroup> {
        self.last_group.as_ref()
    }
}

#[async_trait]
impl FsmState for DomainStage {
    async fn on_test_next_tracker(
        &mut self,
        sets: &mut TrackerSets,
        hooks: &dyn DebuggerHooks,
    ) -> Result<Option<Stage>> {
        let Some(group) = self.groups.front().cloned() else {
            self.last_group = None;
            info!(
                action = "complete",
                component = "domain_stage",
                deferred_count = sets.subdomain_stage_trackers().len(),
                "Domain stage finished"
            );
            hooks.on_prompt_text_update(
                Some(0),
                "Domain debugging finished. Starting subdomain tracker stage. Click 'Continue' to proceed.",
                false,
            );
            hooks.on_button_state_update(Button::WebsiteBroke, true);
            return Ok(Some(Stage::Subdomain(SubdomainStage::enter(sets))));
        };

        hooks.on_trackers_blocked_state_update(true, &group.hosts).await?;

        self.groups.pop_front();
        let remaining = self.groups.len();
        debug!(action = "block", component = "domain_stage", domain = %group.domain, host_count = group.hosts.len(), remaining, "Blocked domain group");

        hooks.on_button_state_update(Button::WebsiteBroke, false);
        hooks.on_prompt_text_update(
            Some(remaining),
            &format!(
                "Blocked domain group '{}'. If the website is broken, click 'Website Broke', otherwise 'Continue'.",
                group.domain
            ),
            false,
        );
        self.last_group = Some(group);
        Ok(None)
    }

    async fn on_website_broke(&mut self, sets: &mut TrackerSets, hooks: &dyn DebuggerHooks) -> Result<()> {
        let Some(group) = &self.last_group else {
            debug!(action = "ignore", component = "domain_stage", "No blocked domain group to unblock");
            return Ok(());
        };

        // Unblock the group to restore the site
        hooks.on_trackers_blocked_state_update(false, &group.hosts).await?;

        for host in &group.hosts {
            sets.defer(host);
        }
        debug!(action = "defer", component = "domain_stage", domain = %group.domain, host_count = group.hosts.len(), "Deferred domain group to subdomain stage");

        hooks.on_prompt_text_update(
            Some(self.groups.len()),
            &format!(
                "Domain group '{}' will be tested individually later. Click 'Continue' to test the next domain group.",
                group.domain
            ),
            false,
        );
        hooks.on_button_state_update(Button::WebsiteBroke, true);
        self.last_group = None;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SubdomainStage {
    subdomains: VecDeque<String>,
    last_subdomain: Option<String>,
}

impl SubdomainStage {
    pub fn enter(sets: &TrackerSets) -> Self {
        let subdomains: VecDeque<String> = sets.subdomain_stage_trackers().iter().cloned().collect();
        info!(
            action = "enter",
            component = "subdomain_stage",
            tracker_count = subdomains.len(),
            "Entering subdomain stage"
        );

        Self {
            subdomains,
            last_subdomain: None,
        }
    }

    pub fn pending_subdomains(&self) -> impl Iterator<Item = &String> {
        self.subdomains.iter()
    }

    pub fn last_subdomain(&self) -> Option<&str> {
        self.last_subdomain.as_deref()
    }
}

#[async_trait]
impl FsmState for SubdomainStage {
    async fn on_test_next_tracker(
        &mut self,
        sets: &mut TrackerSets,
        hooks: &dyn DebuggerHooks,
    ) -> Result<Option<Stage>> {
        let Some(subdomain) = self.subdomains.front().cloned() else {
            self.last_subdomain = None;
            info!(
                action = "complete",
                component = "subdomain_stage",
                necessary_count = sets.necessary_trackers().len(),
                "Subdomain stage finished"
            );
            return Ok(Some(Stage::Completed(CompletedStage::enter(sets, hooks))));
        };

        hooks
            .on_trackers_blocked_state_update(true, std::slice::from_ref(&subdomain))
            .await?;

        self.subdomains.pop_front();
        let remaining = self.subdomains.len();
        debug!(action = "block", component = "subdomain_stage", host = %subdomain, remaining, "Blocked subdomain");

        hooks.on_button_state_update(Button::WebsiteBroke, false);
        hooks.on_prompt_text_update(
            Some(remaining),
            &format!(
                "Blocked subdomain '{}'. If the website is broken, click 'Website Broke', otherwise 'Continue'.",
                subdomain
            ),
            false,
        );
        self.last_subdomain = Some(subdomain);
        Ok(None)
    }

    async fn on_website_broke(&mut self, sets: &mut TrackerSets, hooks: &dyn DebuggerHooks) -> Result<()> {
        let Some(subdomain) = &self.last_subdomain else {
            debug!(action = "ignore", component = "subdomain_stage", "No blocked subdomain to unblock");
            return Ok(());
        };

        hooks
            .on_trackers_blocked_state_update(false, std::slice::from_ref(subdomain))
            .await?;

        sets.mark_necessary(subdomain);
        debug!(action = "necessary", component = "subdomain_stage", host = %subdomain, "Marked tracker as necessary");

        hooks.on_button_state_update(Button::WebsiteBroke, true);
        hooks.on_prompt_text_update(
            Some(self.subdomains.len()),
            &format!(
                "Added '{}' to necessary trackers. Click 'Continue' to test the next subdomain.",
                subdomain
            ),
            false,
        );
        self.last_subdomain = None;
        Ok(())
    }
}

/// Terminal stage
#[derive(Debug)]
pub struct CompletedStage {
    necessary: Vec<String>,
}

impl CompletedStage {
    pub fn enter(sets: &TrackerSets, hooks: &dyn DebuggerHooks) -> Self {
        let necessary: Vec<String> = sets.necessary_trackers().iter().cloned().collect();
        info!(
            action = "enter",
            component = "completed_stage",
            necessary_count = necessary.len(),
            "Debugging session completed"
        );

        hooks.on_prompt_text_update(
            None,
            &format!(
                "Subdomain debugging finished. Please add the following to the exceptions list: {}",
                necessary.join(", ")
            ),
            true,
        );
        for button in Button::ALL {
            hooks.on_button_state_update(button, true);
        }

        Self { necessary }
    }

    /// Trackers the site needs, in the order they were confirmed
    pub fn necessary_trackers(&self) -> &[String] {
        &self.necessary
    }
}

#[async_trait]
impl FsmState for CompletedStage {
    async fn on_test_next_tracker(
        &mut self,
        _sets: &mut TrackerSets,
        _hooks: &dyn DebuggerHooks,
    ) -> Result<Option<Stage>> {
        debug!(action = "ignore", component = "completed_stage", "Session already completed");
        Ok(None)
    }

    async fn on_website_broke(&mut self, _sets: &mut TrackerSets, _hooks: &dyn DebuggerHooks) -> Result<()> {
        debug!(action = "ignore", component = "completed_stage", "Session already completed");
        Ok(())
    }
}

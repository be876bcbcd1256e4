//! Callback contracts between the debugger and its host UI
//!
//! The debugger reports progress through three hooks: prompt text, button
//! enablement, and the actual blocking of tracker hosts. Every hook defaults
//! to a no-op so a host only implements what it renders.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::str::FromStr;

use crate::error::{DebuggerError, Result};

/// Buttons the host UI exposes to drive a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    TestNextTracker,
    WebsiteBroke,
    StopDebugging,
}

impl Button {
    pub const ALL: [Button; 3] = [
        Button::TestNextTracker,
        Button::WebsiteBroke,
        Button::StopDebugging,
    ];

    /// Element id used by the host UI
    pub fn as_str(&self) -> &'static str {
        match self {
            Button::TestNextTracker => "test-next-tracker",
            Button::WebsiteBroke => "website-broke",
            Button::StopDebugging => "stop-debugging",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Button {
    type Err = DebuggerError;

    fn from_str(s: &str) -> Result<Self> {
        Button::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| DebuggerError::UnknownButton(s.to_string()))
    }
}

/// Hooks invoked by the debugger as a session progresses
#[async_trait]
pub trait DebuggerHooks: Send + Sync {
    /// New prompt text. `remaining` is the number of units left in the
    /// current stage; `terminal` marks the final message of a session.
    fn on_prompt_text_update(&self, _remaining: Option<usize>, _text: &str, _terminal: bool) {}

    fn on_button_state_update(&self, _button: Button, _disabled: bool) {}

    /// Block or unblock `hosts`. The debugger waits for this to finish
    /// before reporting the new state, and propagates any error.
    async fn on_trackers_blocked_state_update(&self, _blocked: bool, _hosts: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Hooks that ignore every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl DebuggerHooks for NoopHooks {}

type PromptFn = Box<dyn Fn(Option<usize>, &str, bool) + Send + Sync>;
type ButtonFn = Box<dyn Fn(Button, bool) + Send + Sync>;
type BlockFn = Box<dyn Fn(bool, Vec<String>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Closure-backed hooks; any callback left unset is a no-op
#[derive(Default)]
pub struct Callbacks {
    on_prompt_text_update: Option<PromptFn>,
    on_button_state_update: Option<ButtonFn>,
    on_trackers_blocked_state_update: Option<BlockFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prompt_text_update<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<usize>, &str, bool) + Send + Sync + 'static,
    {
        self.on_prompt_text_update = Some(Box::new(f));
        self
    }

    pub fn with_button_state_update<F>(mut self, f: F) -> Self
    where
        F: Fn(Button, bool) + Send + Sync + 'static,
    {
        self.on_button_state_update = Some(Box::new(f));
        self
    }

    pub fn with_trackers_blocked_state_update<F>(mut self, f: F) -> Self
    where
        F: Fn(bool, Vec<String>) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        self.on_trackers_blocked_state_update = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_prompt_text_update", &self.on_prompt_text_update.is_some())
            .field("on_button_state_update", &self.on_button_state_update.is_some())
            .field(
                "on_trackers_blocked_state_update",
                &self.on_trackers_blocked_state_update.is_some(),
            )
            .finish()
    }
}

#[async_trait]
impl DebuggerHooks for Callbacks {
    fn on_prompt_text_update(&self, remaining: Option<usize>, text: &str, terminal: bool) {
        if let Some(f) = &self.on_prompt_text_update {
            f(remaining, text, terminal);
        }
    }

    fn on_button_state_update(&self, button: Button, disabled: bool) {
        if let Some(f) = &self.on_button_state_update {
            f(button, disabled);
        }
    }

    async fn on_trackers_blocked_state_update(&self, blocked: bool, hosts: &[String]) -> Result<()> {
        match &self.on_trackers_blocked_state_update {
            Some(f) => f(blocked, hosts.to_vec()).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::{Arc, Mutex};

    #[test]
    fn button_ids_round_trip() {
        for button in Button::ALL {
            assert_eq!(button.as_str().parse::<Button>().unwrap(), button);
        }
        assert!("reset".parse::<Button>().is_err());
    }

    #[tokio::test]
    async fn omitted_callbacks_are_noops() {
        let callbacks = Callbacks::new();
        callbacks.on_prompt_text_update(Some(1), "text", false);
        callbacks.on_button_state_update(Button::WebsiteBroke, true);
        callbacks
            .on_trackers_blocked_state_update(true, &["a.com".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn callbacks_receive_arguments() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let prompts = seen.clone();
        let blocks = seen.clone();

        let callbacks = Callbacks::new()
            .with_prompt_text_update(move |remaining, text, _| {
                prompts
                    .lock()
                    .unwrap()
                    .push(format!("{:?} {}", remaining, text));
            })
            .with_trackers_blocked_state_update(move |blocked, hosts| {
                blocks
                    .lock()
                    .unwrap()
                    .push(format!("{} {}", blocked, hosts.join(",")));
                async { Ok::<(), DebuggerError>(()) }.boxed()
            });

        callbacks.on_prompt_text_update(Some(2), "hello", false);
        callbacks
            .on_trackers_blocked_state_update(false, &["a.com".to_string(), "b.com".to_string()])
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Some(2) hello".to_string(), "false a.com,b.com".to_string()]
        );
    }

    #[tokio::test]
    async fn blocking_errors_propagate() {
        let callbacks = Callbacks::new().with_trackers_blocked_state_update(|_, _| {
            async { Err(DebuggerError::Blocker("reload failed".into())) }.boxed()
        });

        let err = callbacks
            .on_trackers_blocked_state_update(true, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DebuggerError::Blocker(_)));
    }
}

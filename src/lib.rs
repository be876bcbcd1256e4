pub mod args;
pub mod context;
pub mod domain;
pub mod error;
pub mod hooks;
pub mod patterns;
pub mod registry;
pub mod report;
pub mod session;
pub mod stage;
pub mod suffix;
pub mod utils;

pub use args::Args;
pub use context::{DebuggerFsmContext, SharedDebugger, TrackerSets};
pub use domain::{group_by_domain, BaseDomain, DomainGroup, DomainResolver};
pub use error::{DebuggerError, Result};
pub use hooks::{Button, Callbacks, DebuggerHooks, NoopHooks};
pub use registry::{BlockReason, TrackerRegistry};
pub use report::{Outcome, SessionReport};
pub use session::{print_session_report, run_session};
pub use stage::{FsmState, Stage, StageKind};
pub use suffix::SuffixList;

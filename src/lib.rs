//! # Stepwise
//!
//! A step-sequencing engine for multi-step interactive processes
//! ("wizards") that span many independent request/response exchanges.
//!
//! Stepwise owns no run state. Progress lives in a pluggable
//! [`StateStore`] (a web session, a database, plain memory) and every
//! exchange is handled by loading the run, applying one transition and
//! writing the run back. The engine takes care of:
//!
//! - Flattening a [`StepTemplate`] with branch groups into the steps a run
//!   actually walks through
//! - Journaling the data each step produces, including repeated visits to
//!   the same step
//! - Navigating forward, backward, into another repetition or to a named
//!   step, under auto-advance and forward-only policies
//! - Expiring steps that are submitted too late
//! - Pausing a run into a token and resuming it later, elsewhere
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use stepwise::{handler_fn, BranchGroup, Exchange, StepTemplate, Wizard};
//!
//! let wizard = Wizard::builder()
//!     .steps(
//!         StepTemplate::new()
//!             .step("account")
//!             .group(BranchGroup::new().branch("business", ["company"]))
//!             .step("confirm"),
//!     )
//!     .step_handler("account", AccountStep)
//!     .default_handler(handler_fn(|ctx| {
//!         if ctx.is_submit() {
//!             ctx.record(ctx.payload().clone());
//!         }
//!         Ok(())
//!     }))
//!     .build()?;
//!
//! // One call per incoming request
//! let outcome = wizard.handle(Exchange::submit("account", form), &mut session).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod event;
pub mod journal;
pub mod navigation;
pub mod pause;
pub mod run_state;
pub mod state_store;
pub mod status;
pub mod step;
pub mod template;
pub mod wizard;

pub use config::{RunKeys, StepNaming, WizardConfig, DEFAULT_KEY_PREFIX};
pub use error::{Result, WizardError};
pub use event::WizardEvent;
pub use journal::{Journal, StepRecord};
pub use navigation::{NavigationDirective, Navigator, Position};
pub use pause::{PauseToken, PausedWizard};
pub use run_state::WizardRunState;
pub use state_store::{MemoryStateStore, StateStore};
pub use status::{RunStatus, StepStatusEntry, WizardPhase};
pub use step::{
    handler_fn, Exchange, ExchangeKind, FnHandler, NoHooks, Outcome, RunContext, StepContext,
    StepHandler, WizardHooks,
};
pub use template::{Branch, BranchDirective, BranchDirectives, BranchGroup, StepTemplate, TemplateElement};
pub use wizard::{Wizard, WizardBuilder};

#[cfg(feature = "sqlite")]
pub use state_store::SqliteStateStore;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

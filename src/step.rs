//! Step handler plumbing.
//!
//! Business logic plugs into a wizard through two seams:
//!
//! - a [`StepHandler`] per step id, called with a [`StepContext`] on every
//!   exchange addressed to that step
//! - [`WizardHooks`], notified when a run starts, ends or hits an expired
//!   step, through a [`RunContext`]
//!
//! Handlers communicate by writing into the context they are handed; the
//! wizard reads the slots back once the handler returns.

use crate::{BranchDirective, BranchDirectives, Journal, NavigationDirective, Result, StepRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// The kind of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeKind {
    /// Render the step. No data is produced.
    View,
    /// Submit data for the step.
    Submit,
}

/// One incoming request/response round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// The addressed step id or location. `None` enters the wizard.
    pub step: Option<String>,
    /// Whether data is submitted.
    pub kind: ExchangeKind,
    /// Request payload, handed to the step handler untouched.
    pub payload: JsonValue,
}

impl Exchange {
    /// An exchange that enters the wizard without naming a step.
    pub fn entry() -> Self {
        Self {
            step: None,
            kind: ExchangeKind::View,
            payload: JsonValue::Null,
        }
    }

    /// An exchange that renders `step`.
    pub fn view(step: impl Into<String>) -> Self {
        Self {
            step: Some(step.into()),
            kind: ExchangeKind::View,
            payload: JsonValue::Null,
        }
    }

    /// An exchange that submits `payload` for `step`.
    pub fn submit(step: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            step: Some(step.into()),
            kind: ExchangeKind::Submit,
            payload,
        }
    }

    /// Returns true for a data-producing exchange.
    pub fn is_submit(&self) -> bool {
        self.kind == ExchangeKind::Submit
    }
}

/// Context handed to a [`StepHandler`].
///
/// The read side describes where the run is; the write side collects what
/// the handler decided.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// The run identifier.
    pub run_id: String,
    /// The step being handled.
    pub step: String,
    /// Repetition of the step being handled.
    pub repetition_index: usize,
    /// The exchange being processed.
    pub exchange: Exchange,
    /// Data recorded so far.
    pub journal: Journal,
    /// Response content to return.
    pub response: Option<JsonValue>,
    /// Data to journal for this step on a submit.
    pub data: Option<JsonValue>,
    /// Branch directives to merge into the run.
    pub branches: BranchDirectives,
    /// Where to go after a submit.
    pub navigation: NavigationDirective,
    /// End the wizard after this exchange.
    pub stop: bool,
}

impl StepContext {
    /// Creates a context with empty write-back slots.
    pub fn new(
        run_id: impl Into<String>,
        step: impl Into<String>,
        repetition_index: usize,
        exchange: Exchange,
        journal: Journal,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            step: step.into(),
            repetition_index,
            exchange,
            journal,
            response: None,
            data: None,
            branches: BranchDirectives::new(),
            navigation: NavigationDirective::Forward,
            stop: false,
        }
    }

    /// Returns the exchange payload.
    pub fn payload(&self) -> &JsonValue {
        &self.exchange.payload
    }

    /// Returns true if the exchange submits data.
    pub fn is_submit(&self) -> bool {
        self.exchange.is_submit()
    }

    /// Returns what is recorded for `step`.
    pub fn step_data(&self, step: &str) -> Option<&StepRecord> {
        self.journal.get(step)
    }

    /// Sets the response content.
    pub fn respond(&mut self, response: JsonValue) {
        self.response = Some(response);
    }

    /// Sets the data to journal for this step.
    pub fn record(&mut self, data: JsonValue) {
        self.data = Some(data);
    }

    /// Selects a branch.
    pub fn enable_branch(&mut self, branch: impl Into<String>) {
        self.branches.insert(branch.into(), BranchDirective::Enabled);
    }

    /// Rules a branch out.
    pub fn disable_branch(&mut self, branch: impl Into<String>) {
        self.branches.insert(branch.into(), BranchDirective::Disabled);
    }

    /// Sets where to go after this submit.
    pub fn navigate(&mut self, directive: NavigationDirective) {
        self.navigation = directive;
    }

    /// Ends the wizard after this exchange.
    pub fn stop(&mut self) {
        self.stop = true;
    }
}

/// Business logic for one step.
///
/// # Examples
///
/// ```
/// use stepwise::{Result, StepContext, StepHandler};
/// use async_trait::async_trait;
///
/// struct Address;
///
/// #[async_trait]
/// impl StepHandler for Address {
///     async fn handle(&self, ctx: &mut StepContext) -> Result<()> {
///         if ctx.is_submit() {
///             let data = ctx.payload().clone();
///             ctx.record(data);
///         } else {
///             ctx.respond(serde_json::json!({"form": "address"}));
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Handles one exchange for the step.
    ///
    /// An error aborts the exchange before any state is written.
    async fn handle(&self, ctx: &mut StepContext) -> Result<()>;
}

/// A [`StepHandler`] backed by a closure. See [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> StepHandler for FnHandler<F>
where
    F: Fn(&mut StepContext) -> Result<()> + Send + Sync,
{
    async fn handle(&self, ctx: &mut StepContext) -> Result<()> {
        (self.f)(ctx)
    }
}

/// Wraps a synchronous closure as a [`StepHandler`].
///
/// ```
/// use stepwise::{handler_fn, NavigationDirective};
///
/// let repeat_until_done = handler_fn(|ctx| {
///     if ctx.is_submit() {
///         let more = ctx.payload()["more"].as_bool().unwrap_or(false);
///         ctx.record(ctx.payload().clone());
///         if more {
///             ctx.navigate(NavigationDirective::Repeat);
///         }
///     }
///     Ok(())
/// });
/// # let _ = repeat_until_done;
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&mut StepContext) -> Result<()> + Send + Sync,
{
    FnHandler { f }
}

/// Context handed to [`WizardHooks`].
#[derive(Debug, Clone)]
pub struct RunContext {
    /// The run identifier.
    pub run_id: String,
    /// The step involved, for expiry.
    pub step: Option<String>,
    /// Data recorded by the run.
    pub journal: Journal,
    /// Response content to return.
    pub response: Option<JsonValue>,
    /// Set by `before_wizard` to veto the run.
    pub stop: bool,
}

impl RunContext {
    /// Creates a context for a run.
    pub fn new(run_id: impl Into<String>, step: Option<String>, journal: Journal) -> Self {
        Self {
            run_id: run_id.into(),
            step,
            journal,
            response: None,
            stop: false,
        }
    }

    /// Sets the response content.
    pub fn respond(&mut self, response: JsonValue) {
        self.response = Some(response);
    }

    /// Vetoes the run from `before_wizard`.
    pub fn stop(&mut self) {
        self.stop = true;
    }
}

/// Lifecycle notifications for a wizard. Every method defaults to a no-op.
#[async_trait]
pub trait WizardHooks: Send + Sync {
    /// Called before a run starts. Calling [`RunContext::stop`] vetoes it.
    async fn before_wizard(&self, _ctx: &mut RunContext) -> Result<()> {
        Ok(())
    }

    /// Called when a run ends, with the full journal, before it is cleared.
    async fn after_wizard(&self, _ctx: &mut RunContext) -> Result<()> {
        Ok(())
    }

    /// Called when a submit arrives after the step deadline.
    async fn step_expired(&self, _ctx: &mut RunContext) -> Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl WizardHooks for NoHooks {}

/// The result of handling one exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Redirect to the next step.
    Continue {
        /// The step to go to.
        step: String,
        /// Repetition of that step.
        repetition_index: usize,
        /// Location fragment for the redirect.
        location: String,
    },
    /// Render the current step with the handler's response.
    Respond {
        /// The step rendered.
        step: String,
        /// Handler-supplied content.
        response: Option<JsonValue>,
    },
    /// The run ended, naturally, by abort or by veto.
    Finished {
        /// Content supplied by `after_wizard`.
        response: Option<JsonValue>,
    },
    /// The submit arrived after the step deadline.
    Expired {
        /// The step that expired.
        step: String,
        /// The configured expiry target.
        target: String,
        /// Content supplied by `step_expired`.
        response: Option<JsonValue>,
    },
}

impl Outcome {
    /// Returns the step this outcome points at, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::Continue { step, .. } | Self::Respond { step, .. } | Self::Expired { step, .. } => {
                Some(step)
            }
            Self::Finished { .. } => None,
        }
    }

    /// Returns true if the run ended.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exchange_constructors() {
        let entry = Exchange::entry();
        assert!(entry.step.is_none());
        assert!(!entry.is_submit());

        let submit = Exchange::submit("a", json!({"k": 1}));
        assert_eq!(submit.step.as_deref(), Some("a"));
        assert!(submit.is_submit());
    }

    #[test]
    fn test_context_write_back() {
        let mut ctx = StepContext::new("run", "a", 0, Exchange::submit("a", json!(1)), Journal::new());
        assert_eq!(ctx.navigation, NavigationDirective::Forward);

        ctx.record(json!({"name": "x"}));
        ctx.enable_branch("g1");
        ctx.disable_branch("g2");
        ctx.navigate(NavigationDirective::Repeat);
        ctx.stop();

        assert_eq!(ctx.data, Some(json!({"name": "x"})));
        assert_eq!(ctx.branches.get("g1"), Some(&BranchDirective::Enabled));
        assert_eq!(ctx.branches.get("g2"), Some(&BranchDirective::Disabled));
        assert_eq!(ctx.navigation, NavigationDirective::Repeat);
        assert!(ctx.stop);
    }

    #[tokio::test]
    async fn test_handler_fn() {
        let handler = handler_fn(|ctx| {
            ctx.respond(json!(ctx.step.clone()));
            Ok(())
        });
        let mut ctx = StepContext::new("run", "b", 0, Exchange::view("b"), Journal::new());
        handler.handle(&mut ctx).await.unwrap();
        assert_eq!(ctx.response, Some(json!("b")));
    }

    #[tokio::test]
    async fn test_handler_trait_object() {
        let handler: Box<dyn StepHandler> = Box::new(handler_fn(|ctx| {
            ctx.stop();
            Ok(())
        }));
        let mut ctx = StepContext::new("run", "b", 0, Exchange::view("b"), Journal::new());
        handler.handle(&mut ctx).await.unwrap();
        assert!(ctx.stop);
    }

    #[tokio::test]
    async fn test_no_hooks_leave_context_alone() {
        let mut ctx = RunContext::new("run", None, Journal::new());
        NoHooks.before_wizard(&mut ctx).await.unwrap();
        NoHooks.after_wizard(&mut ctx).await.unwrap();
        assert!(!ctx.stop);
        assert!(ctx.response.is_none());
    }

    #[test]
    fn test_outcome_helpers() {
        let outcome = Outcome::Continue {
            step: "b".to_string(),
            repetition_index: 0,
            location: "b".to_string(),
        };
        assert_eq!(outcome.step(), Some("b"));
        assert!(!outcome.is_finished());
        assert!(Outcome::Finished { response: None }.is_finished());
    }
}

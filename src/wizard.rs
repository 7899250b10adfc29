//! The wizard lifecycle controller.
//!
//! This module provides [`Wizard`] and [`WizardBuilder`]. A wizard owns no
//! run state; each call to [`Wizard::handle`] loads the run from a
//! [`StateStore`], processes one exchange and writes the run back.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::pause::{PauseToken, PausedWizard};
use crate::status::{RunStatus, WizardPhase};
use crate::{
    BranchDirectives, Exchange, Journal, NoHooks, Outcome, Position, Result, RunContext,
    StateStore, StepContext, StepHandler, StepNaming, StepRecord, StepTemplate, WizardConfig,
    WizardError, WizardEvent, WizardHooks, WizardRunState,
};

/// Default channel capacity for wizard events.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// A configured wizard.
///
/// # Construction
///
/// Use [`Wizard::builder()`]:
///
/// ```
/// use stepwise::{handler_fn, Exchange, MemoryStateStore, Outcome, Wizard};
/// use serde_json::json;
///
/// # async fn example() -> stepwise::Result<()> {
/// let record = || handler_fn(|ctx| {
///     if ctx.is_submit() {
///         ctx.record(ctx.payload().clone());
///     }
///     Ok(())
/// });
///
/// let wizard = Wizard::builder()
///     .steps(["account", "address"])
///     .step_handler("account", record())
///     .step_handler("address", record())
///     .build()?;
///
/// let mut store = MemoryStateStore::new();
/// let outcome = wizard.handle(Exchange::entry(), &mut store).await?;
/// assert_eq!(outcome.step(), Some("account"));
///
/// let outcome = wizard
///     .handle(Exchange::submit("account", json!({"email": "a@b.c"})), &mut store)
///     .await?;
/// assert_eq!(outcome.step(), Some("address"));
/// # Ok(())
/// # }
/// ```
///
/// # Thread Safety
///
/// `Wizard` is `Send + Sync` and can be shared across async tasks. Two
/// exchanges for the same run must still not be handled concurrently.
pub struct Wizard {
    /// Policies and step template.
    config: WizardConfig,
    /// Handlers by step id.
    handlers: HashMap<String, Arc<dyn StepHandler>>,
    /// Handler for steps without their own.
    default_handler: Option<Arc<dyn StepHandler>>,
    /// Lifecycle hooks.
    hooks: Arc<dyn WizardHooks>,
    /// Event broadcast channel sender.
    event_tx: broadcast::Sender<WizardEvent>,
}

impl Wizard {
    /// Creates a new wizard builder.
    pub fn builder() -> WizardBuilder {
        WizardBuilder::new()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    /// Returns the run identifier used in logs and events.
    pub fn run_id(&self) -> &str {
        self.config.run_label()
    }

    /// Subscribes to wizard events.
    ///
    /// Events are not persisted; if the receiver is too slow, events may
    /// be dropped.
    pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
        self.event_tx.subscribe()
    }

    /// Emits an event to all subscribers.
    ///
    /// Ignores send errors (no subscribers or channel full).
    fn emit(&self, event: WizardEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Returns true if a run has been started in `store`.
    pub async fn has_started<S: StateStore>(&self, store: &S) -> Result<bool> {
        WizardRunState::exists(store, &self.config.keys()).await
    }

    /// Returns the step the run is on.
    pub async fn current_step<S: StateStore>(&self, store: &S) -> Result<Option<String>> {
        Ok(self.load(store).await?.and_then(|state| state.current_step))
    }

    /// Returns the repetition of the current step being worked on.
    pub async fn repetition_index<S: StateStore>(&self, store: &S) -> Result<usize> {
        Ok(self
            .load(store)
            .await?
            .map_or(0, |state| state.repetition_index))
    }

    /// Returns the steps the run walks through.
    pub async fn active_steps<S: StateStore>(&self, store: &S) -> Result<Vec<String>> {
        Ok(self
            .load(store)
            .await?
            .map(|state| state.active_steps)
            .unwrap_or_default())
    }

    /// Returns the branch directives recorded by the run.
    pub async fn branches<S: StateStore>(&self, store: &S) -> Result<BranchDirectives> {
        Ok(self
            .load(store)
            .await?
            .map(|state| state.branches)
            .unwrap_or_default())
    }

    /// Returns everything the run has recorded.
    pub async fn data<S: StateStore>(&self, store: &S) -> Result<Journal> {
        Ok(self
            .load(store)
            .await?
            .map(|state| state.journal)
            .unwrap_or_default())
    }

    /// Returns what the run recorded for `step`.
    pub async fn step_data<S: StateStore>(
        &self,
        step: &str,
        store: &S,
    ) -> Result<Option<StepRecord>> {
        Ok(self.data(store).await?.get(step).cloned())
    }

    /// Returns the status of the run.
    pub async fn status<S: StateStore>(&self, store: &S) -> Result<RunStatus> {
        let state = self.load(store).await?;
        Ok(RunStatus::from_state(self.run_id(), state.as_ref(), Utc::now()))
    }

    async fn load<S: StateStore>(&self, store: &S) -> Result<Option<WizardRunState>> {
        WizardRunState::load(store, &self.config.keys()).await
    }

    /// Clears every persisted key of the run.
    pub async fn reset<S: StateStore>(&self, store: &mut S) -> Result<()> {
        WizardRunState::clear(store, &self.config.keys()).await?;
        info!(run = %self.run_id(), "wizard reset");
        self.emit(WizardEvent::WizardReset {
            run_id: self.run_id().to_string(),
        });
        Ok(())
    }

    /// Captures the run into a token and clears it from `store`.
    ///
    /// The token holds the configuration as well, so [`resume`](Self::resume)
    /// restores the run exactly, even on a wizard built elsewhere.
    pub async fn pause<S: StateStore>(&self, store: &mut S) -> Result<PauseToken> {
        let paused = PausedWizard::capture(&self.config, store).await?;
        let token = paused.encode()?;
        WizardRunState::clear(store, &self.config.keys()).await?;

        info!(run = %self.run_id(), entries = paused.entries.len(), "wizard paused");
        self.emit(WizardEvent::WizardPaused {
            run_id: self.run_id().to_string(),
        });
        Ok(token)
    }

    /// Restores a run captured by [`pause`](Self::pause).
    ///
    /// The configuration in the token replaces this wizard's; registered
    /// handlers and hooks are kept.
    pub async fn resume<S: StateStore>(&mut self, token: &PauseToken, store: &mut S) -> Result<()> {
        let paused = token.decode()?;
        paused.restore(store).await?;
        self.config = paused.config;

        let step = self.current_step(store).await?;
        info!(run = %self.run_id(), step = ?step, "wizard resumed");
        self.emit(WizardEvent::WizardResumed {
            run_id: self.run_id().to_string(),
            step,
        });
        Ok(())
    }

    /// Processes one exchange for the run persisted in `store`.
    ///
    /// An entry exchange (no step) starts the run, or redirects to where it
    /// stands. Any other exchange is dispatched to the addressed step's
    /// handler; a submit then journals the data and navigates.
    ///
    /// No state is written when an error is returned.
    ///
    /// # Errors
    ///
    /// - [`WizardError::InvalidConfig`] if the run cannot start
    /// - [`WizardError::NotStarted`] if a step is addressed before start
    /// - [`WizardError::InvalidStep`] if the addressed step is not reachable
    /// - [`WizardError::InvalidNavigation`] if a handler jumps to a bad step
    /// - handler, hook and store errors as they occur
    pub async fn handle<S: StateStore>(&self, exchange: Exchange, store: &mut S) -> Result<Outcome> {
        let span = info_span!(
            "exchange",
            run = %self.run_id(),
            step = ?exchange.step,
            kind = ?exchange.kind,
        );
        self.handle_internal(exchange, store).instrument(span).await
    }

    async fn handle_internal<S: StateStore>(
        &self,
        exchange: Exchange,
        store: &mut S,
    ) -> Result<Outcome> {
        let state = self.load(store).await?;

        match (exchange.step.clone(), state) {
            (None, None) => self.start(store).await,
            (None, Some(state)) => self.reenter(state, store).await,
            (Some(_), None) => Err(WizardError::NotStarted),
            (Some(location), Some(state)) => {
                self.process_step(&location, exchange, state, store).await
            }
        }
    }

    /// Checks that a run can start: a usable configuration and a handler
    /// for every step the template could reach.
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;

        if self.default_handler.is_none() {
            if let Some(step) = self
                .config
                .steps
                .all_steps()
                .into_iter()
                .find(|step| !self.handlers.contains_key(step))
            {
                return Err(WizardError::invalid_config(
                    format!("no handler for step \"{}\"", step),
                    "Register a step handler or a default handler",
                ));
            }
        }
        Ok(())
    }

    async fn start<S: StateStore>(&self, store: &mut S) -> Result<Outcome> {
        self.validate()?;

        let mut before = RunContext::new(self.run_id(), None, Journal::new());
        self.hooks.before_wizard(&mut before).await?;

        if before.stop {
            info!("wizard vetoed");
            self.emit(WizardEvent::WizardVetoed {
                run_id: self.run_id().to_string(),
            });

            let mut after = RunContext::new(self.run_id(), None, Journal::new());
            self.hooks.after_wizard(&mut after).await?;
            return Ok(Outcome::Finished {
                response: after.response.or(before.response),
            });
        }

        let branches = BranchDirectives::new();
        let active_steps = self
            .config
            .steps
            .build_active_steps(&branches, self.config.default_branch);
        let state = WizardRunState::new(active_steps, branches);

        let Some(first) = state.position() else {
            debug!("no active steps");
            return self.finish(state, store).await;
        };

        state.save(store, &self.config.keys()).await?;
        info!(steps = ?state.active_steps, "wizard started");
        self.emit(WizardEvent::WizardStarted {
            run_id: self.run_id().to_string(),
            steps: state.active_steps.clone(),
        });

        Ok(self.continue_to(first))
    }

    async fn reenter<S: StateStore>(&self, state: WizardRunState, store: &mut S) -> Result<Outcome> {
        match state.position() {
            Some(position) if state.expected_step().is_some() => Ok(self.continue_to(position)),
            _ => {
                debug!("every active step processed");
                self.finish(state, store).await
            }
        }
    }

    async fn process_step<S: StateStore>(
        &self,
        location: &str,
        exchange: Exchange,
        mut state: WizardRunState,
        store: &mut S,
    ) -> Result<Outcome> {
        let step = self
            .config
            .step_naming
            .resolve(location, &state.active_steps)
            .ok_or_else(|| WizardError::InvalidStep(location.to_string()))?
            .to_string();

        let is_current = state.current_step.as_deref() == Some(step.as_str());
        if !is_current {
            let navigator = self.config.navigator();
            if !navigator.is_valid_step(&step, &state.active_steps, &state.journal) {
                return Err(WizardError::InvalidStep(step));
            }
            debug!(from = ?state.current_step, to = %step, "exchange moved to another step");
            state.address(step.clone());
        }

        let handler = self.handler_for(&step)?;
        let is_submit = exchange.is_submit();
        let mut ctx = StepContext::new(
            self.run_id(),
            step,
            state.repetition_index,
            exchange,
            state.journal.clone(),
        );

        if let Err(e) = handler.handle(&mut ctx).await {
            warn!(error = %e, step = %ctx.step, "step handler failed");
            return Err(e);
        }

        if is_submit {
            self.submit(ctx, state, store).await
        } else {
            self.view(ctx, state, store).await
        }
    }

    async fn view<S: StateStore>(
        &self,
        ctx: StepContext,
        mut state: WizardRunState,
        store: &mut S,
    ) -> Result<Outcome> {
        if ctx.stop {
            return self.abort(ctx.step, state, store).await;
        }

        if self.config.step_timeout > 0 {
            state.arm_deadline(Utc::now(), self.config.step_timeout);
        }
        state.save(store, &self.config.keys()).await?;

        debug!(repetition = state.repetition_index, "step viewed");
        self.emit(WizardEvent::StepViewed {
            run_id: self.run_id().to_string(),
            step: ctx.step.clone(),
            repetition_index: state.repetition_index,
        });

        Ok(Outcome::Respond {
            step: ctx.step,
            response: ctx.response,
        })
    }

    async fn submit<S: StateStore>(
        &self,
        mut ctx: StepContext,
        mut state: WizardRunState,
        store: &mut S,
    ) -> Result<Outcome> {
        debug!(phase = %WizardPhase::Advancing, "processing submit");

        let position = Position::new(ctx.step.clone(), state.repetition_index);
        let data = ctx.data.take().unwrap_or(serde_json::Value::Null);
        state
            .journal
            .record(&position.step, position.repetition_index, data)?;

        if ctx.stop {
            self.emit_submitted(&position);
            return self.abort(position.step, state, store).await;
        }

        let branches_changed = !ctx.branches.is_empty();
        if branches_changed {
            state.branches.extend(std::mem::take(&mut ctx.branches));
            state.active_steps = self
                .config
                .steps
                .build_active_steps(&state.branches, self.config.default_branch);
            debug!(steps = ?state.active_steps, "active steps rebuilt");
        }

        if state.has_expired(Utc::now()) {
            return self.expire(position, state, store).await;
        }

        let next = self.config.navigator().next_position(
            &position,
            &ctx.navigation,
            &state.active_steps,
            &state.journal,
        )?;

        let Some(next) = next else {
            self.emit_submitted(&position);
            return self.finish(state, store).await;
        };

        state.move_to(next.clone());
        state.save(store, &self.config.keys()).await?;

        self.emit_submitted(&position);
        if branches_changed {
            self.emit(WizardEvent::BranchesChanged {
                run_id: self.run_id().to_string(),
                branches: state.branches.clone(),
                steps: state.active_steps.clone(),
            });
        }
        info!(next = %next.step, repetition = next.repetition_index, "moving to step");
        self.emit(WizardEvent::StepEntered {
            run_id: self.run_id().to_string(),
            step: next.step.clone(),
            repetition_index: next.repetition_index,
        });

        Ok(self.continue_to(next))
    }

    async fn expire<S: StateStore>(
        &self,
        position: Position,
        state: WizardRunState,
        store: &mut S,
    ) -> Result<Outcome> {
        // Journal and deadline stay so the caller can offer a retry
        state.save(store, &self.config.keys()).await?;

        info!(step = %position.step, "step expired");
        self.emit_submitted(&position);
        self.emit(WizardEvent::StepExpired {
            run_id: self.run_id().to_string(),
            step: position.step.clone(),
        });

        let mut ctx = RunContext::new(self.run_id(), Some(position.step.clone()), state.journal);
        self.hooks.step_expired(&mut ctx).await?;

        Ok(Outcome::Expired {
            step: position.step,
            target: self.config.expired_target.clone().unwrap_or_default(),
            response: ctx.response,
        })
    }

    async fn abort<S: StateStore>(
        &self,
        step: String,
        state: WizardRunState,
        store: &mut S,
    ) -> Result<Outcome> {
        info!(step = %step, "wizard aborted by step handler");
        self.emit(WizardEvent::WizardAborted {
            run_id: self.run_id().to_string(),
            step,
        });
        self.finish(state, store).await
    }

    /// Runs `after_wizard` with the final journal, then clears the run.
    async fn finish<S: StateStore>(&self, state: WizardRunState, store: &mut S) -> Result<Outcome> {
        let mut ctx = RunContext::new(self.run_id(), state.current_step, state.journal.clone());
        self.hooks.after_wizard(&mut ctx).await?;

        WizardRunState::clear(store, &self.config.keys()).await?;

        info!("wizard completed");
        self.emit(WizardEvent::WizardCompleted {
            run_id: self.run_id().to_string(),
            journal: state.journal,
        });

        Ok(Outcome::Finished {
            response: ctx.response,
        })
    }

    fn continue_to(&self, position: Position) -> Outcome {
        Outcome::Continue {
            location: self
                .config
                .step_naming
                .location(&position.step, position.repetition_index),
            step: position.step,
            repetition_index: position.repetition_index,
        }
    }

    fn emit_submitted(&self, position: &Position) {
        self.emit(WizardEvent::StepSubmitted {
            run_id: self.run_id().to_string(),
            step: position.step.clone(),
            repetition_index: position.repetition_index,
        });
    }

    fn handler_for(&self, step: &str) -> Result<&Arc<dyn StepHandler>> {
        self.handlers
            .get(step)
            .or(self.default_handler.as_ref())
            .ok_or_else(|| {
                WizardError::invalid_config(
                    format!("no handler for step \"{}\"", step),
                    "Register a step handler or a default handler",
                )
            })
    }
}

impl std::fmt::Debug for Wizard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut handlers: Vec<&String> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("Wizard")
            .field("config", &self.config)
            .field("handlers", &handlers)
            .field("default_handler", &self.default_handler.is_some())
            .finish()
    }
}

/// Builder for constructing [`Wizard`] instances.
///
/// # Example
///
/// ```
/// use stepwise::{handler_fn, BranchGroup, StepNaming, StepTemplate, Wizard};
///
/// let wizard = Wizard::builder()
///     .steps(
///         StepTemplate::new()
///             .step("account")
///             .group(BranchGroup::new().branch("business", ["company"]))
///             .step("guests"),
///     )
///     .forward_only(true)
///     .step_naming(StepNaming::Repetition)
///     .default_handler(handler_fn(|_ctx| Ok(())))
///     .build()?;
///
/// assert!(wizard.config().forward_only);
/// # Ok::<(), stepwise::WizardError>(())
/// ```
pub struct WizardBuilder {
    config: WizardConfig,
    handlers: HashMap<String, Arc<dyn StepHandler>>,
    default_handler: Option<Arc<dyn StepHandler>>,
    hooks: Option<Arc<dyn WizardHooks>>,
}

impl WizardBuilder {
    /// Creates a new builder with default configuration.
    fn new() -> Self {
        Self {
            config: WizardConfig::default(),
            handlers: HashMap::new(),
            default_handler: None,
            hooks: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: WizardConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the step template.
    pub fn steps(mut self, steps: impl Into<StepTemplate>) -> Self {
        self.config.steps = steps.into();
        self
    }

    /// Sets whether forward goes to the first unprocessed step.
    pub fn auto_advance(mut self, auto_advance: bool) -> Self {
        self.config.auto_advance = auto_advance;
        self
    }

    /// Sets whether completed steps may be revisited.
    pub fn forward_only(mut self, forward_only: bool) -> Self {
        self.config.forward_only = forward_only;
        self
    }

    /// Sets whether undecided branch groups fall back to a default branch.
    pub fn default_branch(mut self, default_branch: bool) -> Self {
        self.config.default_branch = default_branch;
        self
    }

    /// Sets the step timeout in seconds. 0 disables it.
    pub fn step_timeout(mut self, seconds: u64) -> Self {
        self.config.step_timeout = seconds;
        self
    }

    /// Sets where expired steps send the user.
    pub fn expired_target(mut self, target: impl Into<String>) -> Self {
        self.config.expired_target = Some(target.into());
        self
    }

    /// Sets the prefix for persisted keys.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    /// Scopes persisted keys to a run identifier.
    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.config.run_id = Some(run_id.into());
        self
    }

    /// Sets how redirect locations name steps.
    pub fn step_naming(mut self, naming: StepNaming) -> Self {
        self.config.step_naming = naming;
        self
    }

    /// Registers the handler for a step.
    ///
    /// # Panics
    ///
    /// Panics if the step already has a handler. Use
    /// [`try_step_handler`](Self::try_step_handler) for a fallible version.
    pub fn step_handler(mut self, step: impl Into<String>, handler: impl StepHandler + 'static) -> Self {
        let step = step.into();
        if self.handlers.contains_key(&step) {
            panic!("duplicate step handler: {}", step);
        }
        self.handlers.insert(step, Arc::new(handler));
        self
    }

    /// Registers the handler for a step, returning an error on duplicate.
    ///
    /// This is the fallible version of [`step_handler`](Self::step_handler).
    pub fn try_step_handler(
        mut self,
        step: impl Into<String>,
        handler: impl StepHandler + 'static,
    ) -> Result<Self> {
        let step = step.into();
        if self.handlers.contains_key(&step) {
            return Err(WizardError::DuplicateHandler(step));
        }
        self.handlers.insert(step, Arc::new(handler));
        Ok(self)
    }

    /// Registers the handler for steps without their own.
    pub fn default_handler(mut self, handler: impl StepHandler + 'static) -> Self {
        self.default_handler = Some(Arc::new(handler));
        self
    }

    /// Sets the lifecycle hooks.
    pub fn hooks(mut self, hooks: impl WizardHooks + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    /// Builds the wizard.
    ///
    /// # Errors
    ///
    /// [`WizardError::StepNotFound`] if a handler is registered for a step
    /// the template never declares.
    pub fn build(self) -> Result<Wizard> {
        if !self.config.steps.is_empty() {
            let declared = self.config.steps.all_steps();
            let mut registered: Vec<&String> = self.handlers.keys().collect();
            registered.sort();
            if let Some(unknown) = registered.into_iter().find(|step| !declared.contains(step)) {
                return Err(WizardError::StepNotFound(unknown.clone()));
            }
        }

        // Create event broadcast channel
        let (event_tx, _) = broadcast::channel(DEFAULT_EVENT_CHANNEL_CAPACITY);

        Ok(Wizard {
            config: self.config,
            handlers: self.handlers,
            default_handler: self.default_handler,
            hooks: self.hooks.unwrap_or_else(|| Arc::new(NoHooks)),
            event_tx,
        })
    }
}

impl Default for WizardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{handler_fn, MemoryStateStore, NavigationDirective};
    use serde_json::json;

    fn recorder() -> impl StepHandler {
        handler_fn(|ctx| {
            if ctx.is_submit() {
                ctx.record(ctx.payload().clone());
            }
            Ok(())
        })
    }

    fn linear(steps: &[&str]) -> Wizard {
        let template: StepTemplate = steps.iter().copied().collect();
        Wizard::builder()
            .steps(template)
            .default_handler(recorder())
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let wizard = Wizard::builder().build().unwrap();
        assert!(wizard.config().auto_advance);
        assert_eq!(wizard.run_id(), "__wizard");
    }

    #[test]
    #[should_panic(expected = "duplicate step handler")]
    fn test_duplicate_handler_panics() {
        let _ = Wizard::builder()
            .steps(["a"])
            .step_handler("a", recorder())
            .step_handler("a", recorder());
    }

    #[test]
    fn test_try_step_handler_duplicate_returns_error() {
        let result = Wizard::builder()
            .steps(["a"])
            .try_step_handler("a", recorder())
            .unwrap()
            .try_step_handler("a", recorder());
        assert!(matches!(result, Err(WizardError::DuplicateHandler(_))));
    }

    #[test]
    fn test_handler_for_unknown_step() {
        let result = Wizard::builder()
            .steps(["a"])
            .step_handler("zz", recorder())
            .build();
        assert!(matches!(result, Err(WizardError::StepNotFound(s)) if s == "zz"));
    }

    #[test]
    fn test_validate_requires_handlers() {
        let wizard = Wizard::builder()
            .steps(["a", "b"])
            .step_handler("a", recorder())
            .build()
            .unwrap();
        let err = wizard.validate().unwrap_err();
        assert!(err.to_string().contains("\"b\""));
    }

    #[tokio::test]
    async fn test_entry_starts_at_first_step() {
        let wizard = linear(&["a", "b"]);
        let mut store = MemoryStateStore::new();

        assert!(!wizard.has_started(&store).await.unwrap());
        let outcome = wizard.handle(Exchange::entry(), &mut store).await.unwrap();
        assert_eq!(outcome.step(), Some("a"));
        assert!(wizard.has_started(&store).await.unwrap());
        assert_eq!(wizard.current_step(&store).await.unwrap().as_deref(), Some("a"));
        assert_eq!(wizard.active_steps(&store).await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_view_returns_handler_response() {
        let wizard = Wizard::builder()
            .steps(["a"])
            .step_handler(
                "a",
                handler_fn(|ctx| {
                    ctx.respond(json!({"form": ctx.step.clone()}));
                    Ok(())
                }),
            )
            .build()
            .unwrap();
        let mut store = MemoryStateStore::new();
        wizard.handle(Exchange::entry(), &mut store).await.unwrap();

        let outcome = wizard.handle(Exchange::view("a"), &mut store).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Respond {
                step: "a".to_string(),
                response: Some(json!({"form": "a"})),
            }
        );
    }

    #[tokio::test]
    async fn test_submit_advances_and_finishes() {
        let wizard = linear(&["a", "b"]);
        let mut store = MemoryStateStore::new();
        wizard.handle(Exchange::entry(), &mut store).await.unwrap();

        let outcome = wizard
            .handle(Exchange::submit("a", json!(1)), &mut store)
            .await
            .unwrap();
        assert_eq!(outcome.step(), Some("b"));
        assert_eq!(
            wizard.step_data("a", &store).await.unwrap(),
            Some(StepRecord::Single(json!(1)))
        );

        let outcome = wizard
            .handle(Exchange::submit("b", json!(2)), &mut store)
            .await
            .unwrap();
        assert!(outcome.is_finished());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_handler_error_writes_nothing() {
        let wizard = Wizard::builder()
            .steps(["a"])
            .step_handler(
                "a",
                handler_fn(|ctx| {
                    if ctx.is_submit() {
                        return Err(WizardError::StepHandler("rejected".to_string()));
                    }
                    Ok(())
                }),
            )
            .build()
            .unwrap();
        let mut store = MemoryStateStore::new();
        wizard.handle(Exchange::entry(), &mut store).await.unwrap();
        let before = store.snapshot().await;

        let err = wizard
            .handle(Exchange::submit("a", json!(1)), &mut store)
            .await
            .unwrap_err();
        assert!(matches!(err, WizardError::StepHandler(_)));
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_invalid_goto_writes_nothing() {
        let wizard = Wizard::builder()
            .steps(["a", "b", "c"])
            .step_handler(
                "a",
                handler_fn(|ctx| {
                    ctx.navigate(NavigationDirective::goto("c"));
                    Ok(())
                }),
            )
            .default_handler(recorder())
            .build()
            .unwrap();
        let mut store = MemoryStateStore::new();
        wizard.handle(Exchange::entry(), &mut store).await.unwrap();
        let before = store.snapshot().await;

        let err = wizard
            .handle(Exchange::submit("a", json!(1)), &mut store)
            .await
            .unwrap_err();
        assert!(matches!(err, WizardError::InvalidNavigation(_)));
        assert_eq!(store.snapshot().await, before);
        assert!(wizard.step_data("a", &store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_events_for_a_step() {
        let wizard = linear(&["a", "b"]);
        let mut events = wizard.subscribe();
        let mut store = MemoryStateStore::new();

        wizard.handle(Exchange::entry(), &mut store).await.unwrap();
        wizard
            .handle(Exchange::submit("a", json!(1)), &mut store)
            .await
            .unwrap();

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert!(matches!(received[0], WizardEvent::WizardStarted { .. }));
        assert!(matches!(received[1], WizardEvent::StepSubmitted { .. }));
        assert!(matches!(&received[2], WizardEvent::StepEntered { step, .. } if step == "b"));
        assert!(received.iter().all(|e| e.run_id() == "__wizard"));
    }

    #[tokio::test]
    async fn test_reset() {
        let wizard = linear(&["a", "b"]);
        let mut store = MemoryStateStore::new();
        wizard.handle(Exchange::entry(), &mut store).await.unwrap();

        wizard.reset(&mut store).await.unwrap();
        assert!(!wizard.has_started(&store).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_status() {
        let wizard = linear(&["a", "b"]);
        let mut store = MemoryStateStore::new();
        assert_eq!(
            wizard.status(&store).await.unwrap().phase,
            WizardPhase::NotStarted
        );

        wizard.handle(Exchange::entry(), &mut store).await.unwrap();
        wizard
            .handle(Exchange::submit("a", json!(1)), &mut store)
            .await
            .unwrap();
        let status = wizard.status(&store).await.unwrap();
        assert_eq!(status.phase, WizardPhase::AwaitingStepInput);
        assert_eq!(status.current_step.as_deref(), Some("b"));
        assert_eq!(status.progress_percent(), 50.0);
    }

    #[test]
    fn test_wizard_debug() {
        let wizard = Wizard::builder()
            .steps(["a"])
            .step_handler("a", recorder())
            .build()
            .unwrap();
        let debug = format!("{:?}", wizard);
        assert!(debug.contains("Wizard"));
        assert!(debug.contains("\"a\""));
    }
}

//! Adaptive executor
//!
//! Runs [`Action`]s against a [`Driver`]. Each action expands into one or
//! more [`Step`]s; every step drives the pure attempt state machine in
//! [`crate::state_machine`] and performs the effects it asks for: stale
//! waits, selector switches, backoff and the one-shot rescues.

use crate::rescue::first_rescue;
use crate::state_machine::{transition, AttemptEvent, AttemptState, Effect, RetryPolicy};
use crate::targeting::{
    is_falsy, is_truthy, join_url, parse_predicate, truncate_chars, Interaction, Located, Step,
    Targeting,
};
use async_recursion::async_recursion;
use indexmap::IndexMap;
use parking_lot::Mutex;
use probe_browser::screenshot::capture_to;
use probe_browser::selector::select_all;
use probe_browser::{check_text, Driver, RescueScope};
use probe_core::config::{ExecutorConfig, InferenceConfig, ResolverConfig};
use probe_core::fail_open::fail_open;
use probe_core::{
    Action, ActionKind, DomElement, DomSnapshot, ExecutionContext, ExecutionResult, FailureKind,
    FieldKind, FieldType, ProbeConfig, ProbeError, Result, SequenceResult, StepFailure,
};
use probe_forms::{DataSynthesizer, FormInferenceEngine, InferenceContext};
use probe_llm::{selector_variations, AssistedStrategy, LanguageModel, ModelValueMapper};
use probe_resolver::clickable::element_selector;
use probe_resolver::tiers::index_selector;
use probe_resolver::{looks_like_selector, normalize, resolve_clickable, FieldQuery, FieldResolver, Resolution};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

const DEFAULT_PAUSE_MS: u64 = 1000;

/// Per-run options for [`AdaptiveExecutor::execute_sequence`]
#[derive(Debug, Clone, Default)]
pub struct SequenceOptions {
    /// Checked before each action starts; an in-flight driver call is not interrupted
    pub cancel: CancellationToken,
    /// Values visible to the first action
    pub context: ExecutionContext,
}

impl SequenceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }
}

/// Where one step ended up
struct StepOutcome {
    retries: u32,
    rescued_by: Option<String>,
    attempted: Vec<String>,
    failure: Option<(FailureKind, String)>,
}

/// Mutable state of one sequence run
struct SequenceRun {
    ctx: ExecutionContext,
    results: Vec<ExecutionResult>,
    non_fatal: Vec<StepFailure>,
    aborted_at: Option<usize>,
    error: Option<String>,
}

impl SequenceRun {
    fn new(ctx: ExecutionContext) -> Self {
        Self {
            ctx,
            results: Vec::new(),
            non_fatal: Vec::new(),
            aborted_at: None,
            error: None,
        }
    }

    fn abort(&mut self, index: usize, reason: impl Into<String>) {
        let reason = reason.into();
        error!("Sequence aborted at step {}: {}", index, reason);
        self.aborted_at = Some(index);
        self.error = Some(ProbeError::SequenceAborted { index, reason }.to_string());
    }

    /// Optional failures never count against success
    fn succeeded(&self) -> bool {
        self.aborted_at.is_none() && self.non_fatal.iter().all(|f| f.optional)
    }
}

/// Executes actions with per-step retries, selector fallback and rescues
pub struct AdaptiveExecutor {
    driver: Arc<dyn Driver>,
    config: ExecutorConfig,
    resolver: FieldResolver,
    inference: FormInferenceEngine,
    model: Option<Arc<dyn LanguageModel>>,
    synthesizer: Mutex<DataSynthesizer>,
}

impl AdaptiveExecutor {
    pub fn new(driver: Arc<dyn Driver>, config: ExecutorConfig) -> Self {
        Self {
            driver,
            config,
            resolver: FieldResolver::default(),
            inference: FormInferenceEngine::default(),
            model: None,
            synthesizer: Mutex::new(DataSynthesizer::new()),
        }
    }

    /// Executor configured from every section of `config`; the language
    /// model is attached only when `llm.enabled` is set
    pub fn from_config(driver: Arc<dyn Driver>, config: &ProbeConfig) -> Self {
        let executor = Self::new(driver, config.executor.clone())
            .with_resolver(config.resolver.clone())
            .with_inference(config.inference.clone());
        if config.llm.enabled {
            executor.with_model(Arc::new(AssistedStrategy::from_config(&config.llm)))
        } else {
            executor
        }
    }

    pub fn with_resolver(mut self, config: ResolverConfig) -> Self {
        self.resolver = match &self.model {
            Some(model) => FieldResolver::new(config).with_mapper(Arc::new(ModelValueMapper::new(model.clone()))),
            None => FieldResolver::new(config),
        };
        self
    }

    pub fn with_inference(mut self, config: InferenceConfig) -> Self {
        self.inference = FormInferenceEngine::new(config);
        self
    }

    /// Attach a language model for selector suggestions, error
    /// interpretation and the resolver's semantic tier
    pub fn with_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        let resolver_config = self.resolver.config().clone();
        self.resolver =
            FieldResolver::new(resolver_config).with_mapper(Arc::new(ModelValueMapper::new(model.clone())));
        self.model = Some(model);
        self
    }

    /// Fix the synthesizer seed so generated data is reproducible
    pub fn with_synthesizer(self, synthesizer: DataSynthesizer) -> Self {
        *self.synthesizer.lock() = synthesizer;
        self
    }

    fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.config.max_retries,
            rescues_enabled: self.config.enable_rescues,
        }
    }

    /// Execute one action. Never fails: problems come back in the result.
    #[instrument(skip(self, action, ctx), fields(kind = %action.kind, description = %action.description))]
    pub async fn execute(&self, action: &Action, ctx: &mut ExecutionContext) -> ExecutionResult {
        let started = Instant::now();
        let action = substituted(action, ctx);

        let mut result = if action.kind == ActionKind::Conditional {
            self.execute_conditional(&action, ctx).await
        } else {
            match self.plan(&action, ctx).await {
                Ok(steps) => {
                    let result = self.run_steps(&action, &steps).await;
                    if result.success {
                        remember(&action, &steps, ctx);
                    }
                    result
                }
                Err(e) => {
                    warn!("Could not plan {}: {}", action.description, e);
                    ExecutionResult::failed(&action, 0, e.to_string(), e.failure_kind(), Vec::new())
                }
            }
        };

        if !result.success {
            self.enrich_failure(&action, &mut result).await;
        }
        result.context = ctx.snapshot();
        result.url = self.current_url().await;
        result.duration_ms = started.elapsed().as_millis() as u64;
        result
    }

    /// Click the element best matching `text` (visible text, value or aria-label)
    pub async fn click_button(&self, text: &str, ctx: &mut ExecutionContext) -> ExecutionResult {
        self.execute(&Action::click(text), ctx).await
    }

    /// Run `actions` strictly in order.
    ///
    /// A failing step aborts the run unless it is optional or marked
    /// non-critical; those failures are collected instead.
    #[instrument(skip_all, fields(actions = actions.len()))]
    pub async fn execute_sequence(&self, actions: &[Action], options: SequenceOptions) -> SequenceResult {
        let mut run = SequenceRun::new(options.context);
        self.run_actions(actions, &mut run, &options.cancel).await;

        let success = run.succeeded();
        info!(
            success,
            steps = run.results.len(),
            non_fatal = run.non_fatal.len(),
            "Sequence finished"
        );
        SequenceResult {
            success,
            results: run.results,
            non_fatal_errors: run.non_fatal,
            aborted_at: run.aborted_at,
            error: run.error,
            context: run.ctx.snapshot(),
        }
    }

    /// Returns false once the run is aborted
    #[async_recursion]
    async fn run_actions(&self, actions: &[Action], run: &mut SequenceRun, cancel: &CancellationToken) -> bool {
        for action in actions {
            let index = run.results.len();
            if cancel.is_cancelled() {
                run.abort(index, ProbeError::Cancelled(action.description.clone()).to_string());
                return false;
            }

            if action.kind == ActionKind::Conditional {
                let Some(condition) = &action.condition else {
                    warn!("Conditional step {} has no condition; skipping", index);
                    continue;
                };
                let predicate = run.ctx.substitute(&condition.predicate);
                let holds = self.predicate_holds(&predicate).await;
                info!(predicate = %predicate, holds, "Evaluated condition");
                let mut marker = ExecutionResult::succeeded(action, 0, Vec::new());
                marker.context = run.ctx.snapshot();
                run.results.push(marker);

                let branch = if holds {
                    &condition.then_branch
                } else {
                    &condition.else_branch
                };
                if !self.run_actions(branch, run, cancel).await {
                    return false;
                }
                continue;
            }

            let result = self.execute(action, &mut run.ctx).await;
            let error = result.error.clone();
            run.results.push(result);

            if let Some(error) = error {
                if action.aborts_on_failure() {
                    run.abort(index, error);
                    return false;
                }
                warn!(step = index, optional = action.optional, "Step failed (non-fatal): {}", error);
                run.non_fatal.push(StepFailure {
                    index,
                    description: action.description.clone(),
                    error,
                    optional: action.optional,
                });
            }
        }
        true
    }

    async fn execute_conditional(&self, action: &Action, ctx: &mut ExecutionContext) -> ExecutionResult {
        let Some(condition) = &action.condition else {
            return ExecutionResult::failed(
                action,
                0,
                "conditional action has no condition",
                FailureKind::Unknown,
                Vec::new(),
            );
        };
        let holds = self.predicate_holds(&ctx.substitute(&condition.predicate)).await;
        let branch = if holds {
            &condition.then_branch
        } else {
            &condition.else_branch
        };

        let mut run = SequenceRun::new(std::mem::take(ctx));
        self.run_actions(branch, &mut run, &CancellationToken::new()).await;
        *ctx = std::mem::take(&mut run.ctx);

        // Branch actions carry their own budgets
        let retries = run.results.iter().map(|r| r.retry_count).max().unwrap_or(0);
        let attempted: Vec<String> = run
            .results
            .iter()
            .flat_map(|r| r.attempted_selectors.iter().cloned())
            .collect();
        if run.succeeded() {
            return ExecutionResult::succeeded(action, retries, attempted);
        }
        let error = run
            .error
            .clone()
            .or_else(|| run.non_fatal.first().map(|f| f.error.clone()))
            .unwrap_or_else(|| "conditional branch failed".to_string());
        let kind = run
            .results
            .iter()
            .rev()
            .find_map(|r| r.failure_kind)
            .unwrap_or(FailureKind::Unknown);
        ExecutionResult::failed(action, retries, error, kind, attempted)
    }

    /// Expand an action into driver-level steps
    async fn plan(&self, action: &Action, ctx: &ExecutionContext) -> Result<Vec<Step>> {
        let mut steps = match action.kind {
            ActionKind::Navigate => {
                let url = action
                    .value
                    .clone()
                    .or_else(|| action.target.clone())
                    .ok_or_else(|| ProbeError::Navigation("navigate action has no url".to_string()))?;
                vec![Step::Navigate { url }]
            }
            ActionKind::Click => {
                let target = action
                    .target
                    .clone()
                    .ok_or_else(|| ProbeError::Other("click action has no target".to_string()))?;
                vec![Step::Click { target }]
            }
            ActionKind::Fill => self.plan_fill(action, ctx).await?,
            ActionKind::Select => {
                let (Some(target), Some(label)) = (action.target.clone(), action.value.clone()) else {
                    return Err(ProbeError::Other("select action needs a target and an option".to_string()));
                };
                vec![Step::Select { target, label }]
            }
            ActionKind::Assert => {
                let stored = action.use_stored.as_deref().and_then(|key| ctx.get(key));
                let expected = stored
                    .map(String::from)
                    .or_else(|| action.value.clone())
                    .or_else(|| action.target.clone())
                    .ok_or_else(|| ProbeError::Other("assert action has no expected text".to_string()))?;
                vec![Step::Assert { expected }]
            }
            ActionKind::Wait => match (&action.target, &action.value) {
                (Some(selector), _) => vec![Step::WaitFor {
                    selector: selector.clone(),
                }],
                (None, Some(ms)) => {
                    let ms = ms
                        .trim()
                        .parse::<u64>()
                        .map_err(|_| ProbeError::Other(format!("invalid wait duration: {}", ms)))?;
                    vec![Step::Pause(Duration::from_millis(ms))]
                }
                (None, None) => vec![Step::Pause(Duration::from_millis(DEFAULT_PAUSE_MS))],
            },
            ActionKind::Conditional => Vec::new(),
        };
        if let Some(selector) = &action.wait_for {
            steps.push(Step::WaitFor {
                selector: selector.clone(),
            });
        }
        Ok(steps)
    }

    async fn plan_fill(&self, action: &Action, ctx: &ExecutionContext) -> Result<Vec<Step>> {
        if !action.data.is_empty() {
            let linked = action
                .use_stored
                .as_deref()
                .map(|key| (stored_field(key), ctx.get(key)));
            let mut synthesizer = self.synthesizer.lock();
            return Ok(action
                .data
                .iter()
                .map(|(key, value)| {
                    let value = if !value.is_empty() {
                        value.clone()
                    } else {
                        match linked {
                            Some((field, Some(stored))) if field == key => stored.to_string(),
                            _ => {
                                let generated = synthesizer.value_for_key(key);
                                debug!(field = %key, "Synthesized value");
                                generated
                            }
                        }
                    };
                    Step::Field {
                        key: key.clone(),
                        value,
                        selector: None,
                        field_type: None,
                    }
                })
                .collect());
        }

        if let (Some(target), Some(value)) = (&action.target, &action.value) {
            return Ok(vec![Step::Field {
                key: target.clone(),
                value: value.clone(),
                selector: None,
                field_type: None,
            }]);
        }

        // No explicit data: infer the form the goal means and synthesize every field
        let goal = action
            .value
            .clone()
            .or_else(|| action.target.clone())
            .unwrap_or_else(|| action.description.clone());
        let page = self
            .bounded(self.config.selector_timeout(), "snapshot", self.driver.snapshot())
            .await?;
        let inferred = self.inference.infer(&page, &InferenceContext::new(goal))?;
        info!(
            form = inferred.form_index,
            confidence = inferred.confidence,
            fields = inferred.schema.fields.len(),
            "Inferred form to fill"
        );
        let values = self
            .synthesizer
            .lock()
            .fill_schema(&inferred.schema, &IndexMap::new());
        Ok(inferred
            .schema
            .fields
            .iter()
            .filter_map(|field| {
                let value = values.get(&field.name).filter(|v| !v.is_empty())?;
                Some(Step::Field {
                    key: field.name.clone(),
                    value: value.clone(),
                    selector: Some(field.selector.clone()),
                    field_type: Some(field.inferred_type.clone()),
                })
            })
            .collect())
    }

    /// Steps of one action draw on a single retry budget
    async fn run_steps(&self, action: &Action, steps: &[Step]) -> ExecutionResult {
        let mut retries = 0;
        let mut attempted = Vec::new();
        let mut rescued_by = None;
        for step in steps {
            let budget = self.config.max_retries.saturating_sub(retries);
            let outcome = self.run_step(step, budget).await;
            retries += outcome.retries;
            attempted.extend(outcome.attempted);
            if outcome.rescued_by.is_some() {
                rescued_by = outcome.rescued_by;
            }
            if let Some((kind, error)) = outcome.failure {
                return ExecutionResult::failed(action, retries, error, kind, attempted);
            }
        }
        let mut result = ExecutionResult::succeeded(action, retries, attempted);
        result.rescued_by = rescued_by;
        result
    }

    /// Drive the attempt state machine for one step
    async fn run_step(&self, step: &Step, budget: u32) -> StepOutcome {
        let policy = RetryPolicy {
            max_retries: budget,
            ..self.policy()
        };
        let mut targeting = Targeting::new();
        let (mut state, mut effects) = transition(AttemptState::Pending, AttemptEvent::Start, &policy);

        loop {
            let mut next = None;
            for effect in effects {
                match effect {
                    Effect::Perform => {
                        next = Some(match self.attempt(step, &mut targeting).await {
                            Ok(()) => AttemptEvent::Succeeded,
                            Err(e) => {
                                let kind = e.failure_kind();
                                debug!(step = %step.describe(), %kind, "Classified failure");
                                AttemptEvent::Failed {
                                    kind,
                                    error: e.to_string(),
                                    rescuable: step.is_targeted() && targeting.current().is_some(),
                                }
                            }
                        });
                    }
                    Effect::AwaitStaleSettle => tokio::time::sleep(self.config.stale_wait()).await,
                    Effect::SwitchSelector => self.switch_selector(step, &mut targeting).await,
                    Effect::Backoff => tokio::time::sleep(self.config.retry_delay()).await,
                    Effect::RunRescues => {
                        next = Some(match self.rescue(&targeting).await {
                            Some(scope) => AttemptEvent::RescueSucceeded {
                                strategy: scope.to_string(),
                            },
                            None => AttemptEvent::RescueFailed,
                        });
                    }
                    Effect::Log { message } => warn!("{}: {}", step.describe(), message),
                }
            }
            if state.is_terminal() {
                break;
            }
            let event = next.unwrap_or(AttemptEvent::RetryReady);
            (state, effects) = transition(state, event, &policy);
        }

        let attempted = targeting.into_attempted();
        match state {
            AttemptState::Succeeded { retries, rescued_by } => {
                if let Some(strategy) = &rescued_by {
                    info!(step = %step.describe(), %strategy, "Step completed by rescue");
                }
                StepOutcome {
                    retries,
                    rescued_by,
                    attempted,
                    failure: None,
                }
            }
            AttemptState::Exhausted { retries, kind, error } => StepOutcome {
                retries,
                rescued_by: None,
                attempted,
                failure: Some((kind, error)),
            },
            other => StepOutcome {
                retries: 0,
                rescued_by: None,
                attempted,
                failure: Some((
                    FailureKind::Unknown,
                    format!("step stopped in non-terminal state {:?}", other),
                )),
            },
        }
    }

    /// One attempt at a step
    async fn attempt(&self, step: &Step, targeting: &mut Targeting) -> Result<()> {
        match step {
            Step::Navigate { url } => {
                let base = self.current_url().await.unwrap_or_default();
                let url = join_url(&base, url);
                debug!(%url, "Navigating");
                self.bounded(self.config.navigation_timeout(), "navigation", self.driver.navigate(&url))
                    .await
            }
            Step::Pause(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(())
            }
            Step::WaitFor { selector } => {
                let limit = self.config.selector_timeout();
                self.bounded(limit, "selector wait", self.driver.wait_for(selector, limit))
                    .await
            }
            Step::Assert { expected } => {
                let text = self
                    .bounded(self.config.selector_timeout(), "page text", self.driver.page_text())
                    .await?;
                let (missing, _) = check_text(&text, std::slice::from_ref(expected), &[]);
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(ProbeError::Assertion(format!("page does not contain {:?}", expected)))
                }
            }
            Step::Click { .. } | Step::Field { .. } | Step::Select { .. } => {
                if !targeting.is_resolved() {
                    let page = self
                        .bounded(self.config.selector_timeout(), "snapshot", self.driver.snapshot())
                        .await?;
                    let located = self.locate(step, &page).await?;
                    debug!(step = %step.describe(), selectors = ?located.selectors, "Located");
                    targeting.load(located);
                }
                let selector = targeting
                    .current()
                    .map(String::from)
                    .ok_or_else(|| ProbeError::ElementNotFound(step.describe()))?;
                targeting.record(&selector);
                let interaction = targeting.interaction().cloned().unwrap_or(Interaction::Noop);
                self.interact(&selector, &interaction).await
            }
        }
    }

    async fn interact(&self, selector: &str, interaction: &Interaction) -> Result<()> {
        let limit = self.config.selector_timeout();
        match interaction {
            Interaction::Click => self.bounded(limit, "click", self.driver.click(selector)).await,
            Interaction::Fill(value) => {
                self.bounded(limit, "fill", self.driver.fill(selector, value))
                    .await
            }
            Interaction::Select(value) => {
                self.bounded(limit, "select", self.driver.select_option(selector, value))
                    .await
            }
            Interaction::Noop => {
                debug!(selector, "Already in requested state");
                Ok(())
            }
        }
    }

    /// Selectors and interaction for a targeted step on `page`
    async fn locate(&self, step: &Step, page: &DomSnapshot) -> Result<Located> {
        match step {
            Step::Click { target } => {
                let mut selectors = resolve_clickable(page, target);
                if selectors.is_empty() {
                    debug!(target = %target, "No visible match; trying selector variations");
                    selectors = selector_variations(target, "");
                }
                located(selectors, Interaction::Click, target)
            }
            Step::Select { target, label } => {
                let name = select_group(page, target).unwrap_or_default();
                let resolution = self
                    .resolver
                    .resolve(page, &FieldQuery::new(FieldKind::Select, name, label.as_str()))
                    .await
                    .ok_or_else(|| ProbeError::ElementNotFound(format!("option {} in {}", label, target)))?;
                select_located(page, &resolution, target)
            }
            Step::Field {
                key,
                value,
                selector,
                field_type,
            } => match selector {
                Some(selector) => Ok(known_field(page, selector, value, field_type.as_ref())),
                None => self.locate_field(page, key, value).await,
            },
            other => Err(ProbeError::Other(format!("{} has no element to locate", other.describe()))),
        }
    }

    async fn locate_field(&self, page: &DomSnapshot, key: &str, value: &str) -> Result<Located> {
        if looks_like_selector(key) {
            return located(vec![key.to_string()], Interaction::Fill(value.to_string()), key);
        }

        let group = normalize(key);
        let members: Vec<&DomElement> = page
            .elements
            .iter()
            .filter(|e| e.name.as_deref().is_some_and(|n| normalize(n) == group))
            .collect();
        let kind = members.iter().find_map(|e| {
            if e.is_checkbox() {
                Some(FieldKind::Checkbox)
            } else if e.is_radio() {
                Some(FieldKind::Radio)
            } else if e.is_select() {
                Some(FieldKind::Select)
            } else {
                None
            }
        });
        let name = members
            .first()
            .and_then(|e| e.name.clone())
            .unwrap_or_default();

        match kind {
            Some(FieldKind::Checkbox) if is_truthy(value) || is_falsy(value) => {
                let Some(first) = members.iter().find(|e| e.is_checkbox()) else {
                    return Err(ProbeError::ElementNotFound(key.to_string()));
                };
                let interaction = toggle(first.checked, is_truthy(value));
                located(vec![element_selector(first), index_selector(first.index)], interaction, key)
            }
            Some(kind @ (FieldKind::Checkbox | FieldKind::Radio)) => {
                let resolution = self
                    .resolver
                    .resolve(page, &FieldQuery::new(kind, name, value))
                    .await
                    .ok_or_else(|| ProbeError::ElementNotFound(format!("{} option {}", key, value)))?;
                let checked = page
                    .element(resolution.mapping.position_index)
                    .is_some_and(|e| e.checked);
                located(resolution.selectors, toggle(checked, true), key)
            }
            Some(FieldKind::Select) => {
                let resolution = self
                    .resolver
                    .resolve(page, &FieldQuery::new(FieldKind::Select, name, value))
                    .await
                    .ok_or_else(|| ProbeError::ElementNotFound(format!("option {} in {}", value, key)))?;
                select_located(page, &resolution, key)
            }
            _ => match self.resolver.resolve(page, &FieldQuery::generic(key)).await {
                Some(resolution) => located(resolution.selectors, Interaction::Fill(value.to_string()), key),
                None if is_truthy(value) => {
                    // "terms": "yes" against a checkbox captioned "I accept the terms"
                    let selectors = resolve_clickable(page, &format!("{} checkbox", key));
                    let checked = selectors
                        .first()
                        .and_then(|s| select_all(page, s).first().map(|e| e.checked))
                        .unwrap_or(false);
                    located(selectors, toggle(checked, true), key)
                }
                None => Err(ProbeError::ElementNotFound(format!("no field matches {}", key))),
            },
        }
    }

    /// Next selector for a step whose element was not found
    async fn switch_selector(&self, step: &Step, targeting: &mut Targeting) {
        if let (Some(model), true) = (&self.model, targeting.is_resolved()) {
            let limit = self.config.selector_timeout();
            let html = fail_open("page_html", || self.bounded(limit, "page html", self.driver.page_html()))
                .await
                .unwrap_or_default();
            let html = truncate_chars(&html, self.config.max_html_chars);
            let description = step.describe();
            let suggestions = fail_open("suggest_selectors", || model.suggest_selectors(&description, html))
                .await
                .unwrap_or_default();
            if targeting.substitute(suggestions) {
                info!(selector = ?targeting.current(), "Switched to suggested selector");
                return;
            }
        }
        if targeting.advance() {
            debug!(selector = ?targeting.current(), "Switched to next candidate selector");
        } else {
            debug!("Candidates exhausted; locating again on next attempt");
        }
    }

    async fn rescue(&self, targeting: &Targeting) -> Option<RescueScope> {
        let selector = targeting.current()?;
        let action = targeting.interaction()?.rescue_action()?;
        first_rescue(self.driver.as_ref(), selector, &action).await
    }

    /// Whether a conditional predicate holds on the current page
    async fn predicate_holds(&self, predicate: &str) -> bool {
        let presence = parse_predicate(predicate);
        let limit = self.config.selector_timeout();
        let found = if looks_like_selector(&presence.subject) {
            fail_open("element_exists", || {
                self.bounded(limit, "element check", self.driver.element_exists(&presence.subject))
            })
            .await
            .unwrap_or(false)
        } else {
            fail_open("snapshot", || self.bounded(limit, "snapshot", self.driver.snapshot()))
                .await
                .is_some_and(|page| page_mentions(&page, &presence.subject))
        };
        debug!(subject = %presence.subject, found, expected = presence.expected, "Checked presence");
        found == presence.expected
    }

    /// Attach console errors, a screenshot and the model's reading of the error
    async fn enrich_failure(&self, action: &Action, result: &mut ExecutionResult) {
        let limit = self.config.selector_timeout();
        result.console_errors = fail_open("console_errors", || {
            self.bounded(limit, "console errors", self.driver.console_errors())
        })
        .await
        .unwrap_or_default();

        if self.config.screenshot_on_failure {
            let label = action.kind.to_string();
            result.screenshot = fail_open("screenshot", || {
                self.bounded(
                    limit,
                    "screenshot",
                    capture_to(self.driver.as_ref(), &self.config.artifacts_dir, &label),
                )
            })
            .await;
        }

        if let (Some(model), Some(error)) = (&self.model, result.error.as_deref()) {
            if let Some(reading) = fail_open("interpret_error", || model.interpret_error(error, action)).await {
                info!(kind = %reading.kind, retryable = reading.retryable, "{}", reading.explanation);
                if let Some(suggestion) = reading.suggestion {
                    info!("Suggestion: {}", suggestion);
                }
            }
        }
    }

    /// Page URL, or `None` when the driver cannot tell in time
    pub(crate) async fn current_url(&self) -> Option<String> {
        let limit = self.config.selector_timeout();
        fail_open("current_url", || self.bounded(limit, "current url", self.driver.current_url())).await
    }

    /// Run a driver call under a deadline
    async fn bounded<T, F>(&self, limit: Duration, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(format!(
                "{} timed out after {}ms",
                what,
                limit.as_millis()
            ))),
        }
    }
}

/// `generated_email` ⇒ `email`
fn stored_field(key: &str) -> &str {
    key.strip_prefix("generated_").unwrap_or(key)
}

/// Copy of `action` with `${name}` references filled from `ctx`
fn substituted(action: &Action, ctx: &ExecutionContext) -> Action {
    let mut action = action.clone();
    action.value = action.value.map(|v| ctx.substitute(&v));
    action.target = action.target.map(|t| ctx.substitute(&t));
    for value in action.data.values_mut() {
        *value = ctx.substitute(value);
    }
    action
}

/// Persist the value a successful action produced under its `store_as` key
fn remember(action: &Action, steps: &[Step], ctx: &mut ExecutionContext) {
    let Some(key) = &action.store_as else {
        return;
    };
    let wanted = stored_field(key);
    let field_value = |only: Option<&str>| {
        steps.iter().find_map(|step| match step {
            Step::Field { key, value, .. } if only.map_or(true, |k| k == key) => Some(value.clone()),
            _ => None,
        })
    };
    let value = field_value(Some(wanted))
        .or_else(|| field_value(None))
        .or_else(|| action.value.clone());
    if let Some(value) = value {
        debug!(key = %key, "Stored value for later steps");
        ctx.set(key.clone(), value);
    }
}

fn located(selectors: Vec<String>, interaction: Interaction, what: &str) -> Result<Located> {
    let mut unique: Vec<String> = Vec::with_capacity(selectors.len());
    for selector in selectors {
        if !unique.contains(&selector) {
            unique.push(selector);
        }
    }
    if unique.is_empty() {
        return Err(ProbeError::ElementNotFound(what.to_string()));
    }
    Ok(Located {
        selectors: unique,
        interaction,
    })
}

fn toggle(checked: bool, want: bool) -> Interaction {
    if checked == want {
        Interaction::Noop
    } else {
        Interaction::Click
    }
}

/// A field form inference already located
fn known_field(page: &DomSnapshot, selector: &str, value: &str, field_type: Option<&FieldType>) -> Located {
    let checked = || {
        select_all(page, selector)
            .first()
            .is_some_and(|e| e.checked)
    };
    let interaction = match field_type {
        Some(FieldType::Checkbox) => toggle(checked(), !is_falsy(value)),
        Some(FieldType::Radio) => toggle(checked(), true),
        Some(FieldType::Select) => Interaction::Select(value.to_string()),
        _ => Interaction::Fill(value.to_string()),
    };
    Located {
        selectors: vec![selector.to_string()],
        interaction,
    }
}

/// Name of the `<select>` a human target refers to (name, id or label)
fn select_group(page: &DomSnapshot, target: &str) -> Option<String> {
    let wanted = normalize(target);
    page.elements
        .iter()
        .filter(|e| e.is_select())
        .find(|e| {
            let by_attr = [e.name.as_deref(), e.id.as_deref()]
                .into_iter()
                .flatten()
                .any(|v| normalize(v) == wanted);
            by_attr
                || probe_resolver::recover_label(page, e.index)
                    .is_some_and(|label| normalize(&label).contains(&wanted))
        })
        .and_then(|e| e.name.clone())
}

/// Selectors for the `<select>` owning a resolved option
fn select_located(page: &DomSnapshot, resolution: &Resolution, what: &str) -> Result<Located> {
    let option = resolution.mapping.position_index;
    let select = page
        .ancestors(option)
        .into_iter()
        .find(|a| a.is_select())
        .ok_or_else(|| ProbeError::ElementNotFound(format!("select owning option {}", option)))?;
    let mut selectors = Vec::new();
    if let Some(name) = select.name.as_deref().filter(|n| !n.is_empty()) {
        selectors.push(format!("select[name=\"{}\"]", name.replace('"', "\\\"")));
    }
    selectors.push(element_selector(select));
    selectors.push(index_selector(select.index));
    located(
        selectors,
        Interaction::Select(resolution.mapping.raw_value.clone()),
        what,
    )
}

/// Text or an identifying attribute on the page mentions `subject`
fn page_mentions(page: &DomSnapshot, subject: &str) -> bool {
    if page.page_text().to_lowercase().contains(&subject.to_lowercase()) {
        return true;
    }
    let wanted = normalize(subject);
    !wanted.is_empty()
        && page.elements.iter().any(|e| {
            [e.id.as_deref(), e.name.as_deref(), e.attr("class"), e.attr("aria-label")]
                .into_iter()
                .flatten()
                .any(|v| normalize(v).contains(&wanted))
        })
}

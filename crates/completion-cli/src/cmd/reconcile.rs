//! `completion reconcile`: replay a JSON scenario against an in-memory store.
//!
//! A scenario declares one context, its items, and their required/optional
//! classification, then lists steps that feed progress and trigger the
//! engine. Each step reports the engine outcome and the events it fired.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Args;
use completion_core::{
    Award, CompletableItem, CompletableItemProvider, CompletionConfig, CompletionContext,
    CompletionError, CompletionEvent, ContextCompletion, ContextStore, DefaultRequiredItemProvider, EventSink,
    InMemoryContextStore, InMemoryProgress, ItemCatalog, ItemProviderRegistry, ItemResolver, Ntiid,
    PolicyRegistry, PrincipalId, Progress, ProgressRemovedOutcome, ReconcileOutcome, Reconciler,
    RecordingSink, RemoveOutcome, Transition, config::PolicyConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::output::{CliError, OutputMode, pretty_kv, pretty_rule};

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Scenario file (JSON).
    pub scenario: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub context: CompletionContext,
    #[serde(default)]
    pub items: Vec<CompletableItem>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
    /// Added on top of the configured default-required mime types.
    #[serde(default)]
    pub default_required_mime_types: Vec<String>,
    /// Replaces the configured registry default.
    #[serde(default)]
    pub policy: Option<PolicyConfig>,
    #[serde(default)]
    pub context_policy: Option<PolicyConfig>,
    /// Per-item overrides stored on the context.
    #[serde(default)]
    pub item_policies: BTreeMap<String, PolicyConfig>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    /// Optionally record fresh progress, then reconcile the item.
    Update {
        principal: String,
        item: String,
        #[serde(default)]
        progress: Option<ProgressSpec>,
        #[serde(default)]
        overwrite: bool,
    },
    Remove {
        principal: String,
        item: String,
    },
    Award {
        principal: String,
        item: String,
        awarder: String,
        #[serde(default)]
        reason: Option<String>,
    },
    /// Withdraw the principal's progress. `item_deleted` also drops the item
    /// from the catalog first, as when content is retired.
    ProgressRemoved {
        principal: String,
        item: String,
        #[serde(default)]
        item_deleted: bool,
    },
    ContextPolicy {
        policy: PolicyConfig,
    },
    /// Recompute context-level progress for the principal.
    Context {
        principal: String,
    },
}

impl Step {
    const fn name(&self) -> &'static str {
        match self {
            Self::Update { .. } => "update",
            Self::Remove { .. } => "remove",
            Self::Award { .. } => "award",
            Self::ProgressRemoved { .. } => "progress_removed",
            Self::ContextPolicy { .. } => "context_policy",
            Self::Context { .. } => "context",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressSpec {
    pub absolute: f64,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub unsuccessful: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub outcome: serde_json::Value,
    pub events: Vec<CompletionEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

/// Everything needed to drive the engine for one scenario.
struct Harness {
    context: CompletionContext,
    store: InMemoryContextStore,
    /// Owns the items; the catalog only holds weak handles.
    items: Vec<Arc<CompletableItem>>,
    catalog: Arc<ItemCatalog>,
    possible: ItemProviderRegistry,
    policies: PolicyRegistry,
    progress: InMemoryProgress,
    sink: RecordingSink,
}

impl Harness {
    fn new(scenario: &Scenario, config: &CompletionConfig) -> Result<Self> {
        let policy = scenario.policy.as_ref().unwrap_or(&config.policy);
        let mut policies = PolicyRegistry::new();
        policies.set_default(Arc::new(
            policy.to_policy().context("Invalid scenario policy")?,
        ));

        let items: Vec<_> = scenario.items.iter().cloned().map(Arc::new).collect();
        let catalog = Arc::new(ItemCatalog::new());
        for item in &items {
            catalog.register(item);
        }
        let mut possible = ItemProviderRegistry::new();
        possible.register_possible(Arc::clone(&catalog) as Arc<dyn CompletableItemProvider>);

        let mut store = InMemoryContextStore::with_config(config);
        let state = store.register(&scenario.context);
        state
            .default_required_mut()
            .add_mime_types(scenario.default_required_mime_types.iter().cloned());
        for id in &scenario.required {
            state.completable_mut().add_required_item(&Ntiid::new(id.as_str()));
        }
        for id in &scenario.optional {
            state.completable_mut().add_optional_item(&Ntiid::new(id.as_str()));
        }
        for (id, policy) in &scenario.item_policies {
            let policy = policy
                .to_policy()
                .with_context(|| format!("Invalid policy for item {id}"))?;
            state
                .policies_mut()
                .insert(&Ntiid::new(id.as_str()), Arc::new(policy));
        }
        if let Some(policy) = &scenario.context_policy {
            let policy = policy.to_policy().context("Invalid context policy")?;
            state.policies_mut().set_context_policy(Arc::new(policy));
        }

        Ok(Self {
            context: scenario.context.clone(),
            store,
            items,
            catalog,
            possible,
            policies,
            progress: InMemoryProgress::new(),
            sink: RecordingSink::new(),
        })
    }

    fn run_step(&mut self, step: &Step) -> Result<StepOutcome, CompletionError> {
        let reconciler = Reconciler::new(&self.policies, &self.progress, &self.sink);
        let context = &self.context;

        let outcome = match step {
            Step::Update {
                principal,
                item,
                progress,
                overwrite,
            } => {
                let principal = PrincipalId::new(principal.as_str());
                let resolved = self.catalog.resolve(item);
                if let Some(spec) = progress {
                    let mut snapshot = Progress::new(item.as_str(), principal.clone())
                        .with_amounts(spec.absolute, spec.max)
                        .with_context(context.ntiid.clone())
                        .with_unsuccessful(
                            spec.unsuccessful.iter().map(|id| Ntiid::new(id.as_str())),
                        );
                    snapshot.item.clone_from(&resolved);
                    self.progress.set(snapshot);
                }
                let outcome = reconciler.update_completion(
                    &mut self.store,
                    resolved.as_deref(),
                    &Ntiid::new(item.as_str()),
                    &principal,
                    context,
                    *overwrite,
                )?;
                StepOutcome::Reconcile(outcome)
            }
            Step::Remove { principal, item } => {
                let resolved = self.catalog.resolve(item);
                let outcome = reconciler.remove_completion(
                    &mut self.store,
                    resolved.as_deref(),
                    &Ntiid::new(item.as_str()),
                    &PrincipalId::new(principal.as_str()),
                    context,
                );
                StepOutcome::Remove(outcome)
            }
            Step::Award {
                principal,
                item,
                awarder,
                reason,
            } => {
                let Some(resolved) = self.catalog.resolve(item) else {
                    return Err(CompletionError::ItemNotFound(Ntiid::new(item.as_str())));
                };
                let transition = reconciler.award_completion(
                    &mut self.store,
                    &resolved,
                    &PrincipalId::new(principal.as_str()),
                    context,
                    Award {
                        awarder: PrincipalId::new(awarder.as_str()),
                        reason: reason.clone(),
                    },
                    Utc::now(),
                )?;
                StepOutcome::Award(transition)
            }
            Step::ProgressRemoved {
                principal,
                item,
                item_deleted,
            } => {
                let principal = PrincipalId::new(principal.as_str());
                let ntiid = Ntiid::new(item.as_str());
                if *item_deleted {
                    self.items.retain(|live| live.ntiid.key() != ntiid.key());
                    self.catalog.unregister(&ntiid);
                }
                self.progress.remove(&principal, &ntiid);
                self.sink.notify(CompletionEvent::UserProgressRemoved {
                    item: ntiid.clone(),
                    principal: principal.clone(),
                    context: context.ntiid.clone(),
                });
                let resolved = self.catalog.resolve(item);
                let outcome = reconciler.progress_removed(
                    &mut self.store,
                    resolved.as_deref(),
                    &ntiid,
                    &principal,
                    context,
                )?;
                StepOutcome::ProgressRemoved(outcome)
            }
            Step::ContextPolicy { policy } => {
                let policy = policy.to_policy()?;
                let previous =
                    reconciler.set_context_policy(&mut self.store, context, Arc::new(policy), true)?;
                StepOutcome::ContextPolicy {
                    replaced: previous.is_some(),
                }
            }
            Step::Context { principal } => {
                let principal = PrincipalId::new(principal.as_str());
                let required = {
                    let state = self
                        .store
                        .state(context)
                        .ok_or_else(|| CompletionError::ContextNotFound(context.ntiid.clone()))?;
                    DefaultRequiredItemProvider::new(&self.possible, state)
                        .iter_items(&principal, context)
                };
                let completion = reconciler.update_context_completion(
                    &mut self.store,
                    &required,
                    &principal,
                    context,
                )?;
                StepOutcome::Context(completion)
            }
        };
        Ok(outcome)
    }
}

/// Engine result of one step, in the shape the engine returned it.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum StepOutcome {
    Reconcile(ReconcileOutcome),
    Remove(RemoveOutcome),
    Award(Transition),
    ProgressRemoved(ProgressRemovedOutcome),
    ContextPolicy { replaced: bool },
    Context(ContextCompletion),
}

/// Run every step in order, stopping at the first library error.
pub fn run_scenario(scenario: &Scenario, config: &CompletionConfig) -> Result<Vec<StepReport>> {
    let mut harness = Harness::new(scenario, config)?;
    let mut reports = Vec::with_capacity(scenario.steps.len());

    for (index, step) in scenario.steps.iter().enumerate() {
        let result = harness.run_step(step);
        let events = harness.sink.take();
        match result {
            Ok(outcome) => reports.push(StepReport {
                index,
                op: step.name(),
                outcome: serde_json::to_value(&outcome)
                    .with_context(|| format!("Failed to serialize outcome of step {index}"))?,
                events,
                error: None,
            }),
            Err(err) => {
                tracing::warn!(index, op = step.name(), code = err.code().code(), "step failed");
                reports.push(StepReport {
                    index,
                    op: step.name(),
                    outcome: serde_json::Value::Null,
                    events,
                    error: Some(CliError::from(&err)),
                });
                break;
            }
        }
    }

    Ok(reports)
}

pub fn load_scenario(path: &std::path::Path) -> Result<Scenario> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse scenario {}", path.display()))
}

pub fn run_reconcile(
    args: &ReconcileArgs,
    config: &CompletionConfig,
    output: OutputMode,
) -> Result<()> {
    let scenario = load_scenario(&args.scenario)?;
    let reports = run_scenario(&scenario, config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for report in &reports {
        match output {
            OutputMode::Json => {
                serde_json::to_writer(&mut out, report)?;
                writeln!(out)?;
            }
            OutputMode::Text => render_text(&mut out, report)?,
            OutputMode::Pretty => render_pretty(&mut out, report)?,
        }
    }
    out.flush()?;

    if let Some((index, error)) = reports
        .iter()
        .find_map(|r| r.error.as_ref().map(|e| (r.index, e)))
    {
        bail!(
            "step {index} failed [{}]: {}",
            error.error_code,
            error.message
        );
    }
    Ok(())
}

fn event_names(report: &StepReport) -> String {
    if report.events.is_empty() {
        return "-".to_string();
    }
    report
        .events
        .iter()
        .map(CompletionEvent::name)
        .collect::<Vec<_>>()
        .join(",")
}

fn render_text(w: &mut dyn Write, report: &StepReport) -> io::Result<()> {
    let detail = report.error.as_ref().map_or_else(
        || report.outcome.to_string(),
        |e| format!("error {} {}", e.error_code, e.message),
    );
    writeln!(
        w,
        "{:>3}  {:<16} {}  events={}",
        report.index,
        report.op,
        detail,
        event_names(report)
    )
}

fn render_pretty(w: &mut dyn Write, report: &StepReport) -> io::Result<()> {
    pretty_rule(w)?;
    pretty_kv(w, "Step", format!("{} ({})", report.index, report.op))?;
    match &report.error {
        Some(error) => {
            pretty_kv(w, "Error", format!("{} {}", error.error_code, error.message))?;
            if let Some(hint) = error.suggestion {
                pretty_kv(w, "Hint", hint)?;
            }
        }
        None => pretty_kv(w, "Outcome", report.outcome.to_string())?,
    }
    pretty_kv(w, "Events", event_names(report))
}

use crate::actions::{ActionDispatcher, TemplateContext};
use crate::datasources::WeatherProvider;
use crate::error::Result;
use crate::logic::engine::{RuleFailure, RulesEngine};
use crate::store::StateStore;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Evaluate and render, but send nothing and save nothing
    pub dry_run: bool,
    pub today: NaiveDate,
}

/// A rule that matched this run and what became of its action
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredAlert {
    pub rule: String,
    /// `key=value` pairs of the template context
    pub context_line: String,
    /// Rendered subject; `None` when rendering failed
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub evaluated: usize,
    pub triggered: Vec<TriggeredAlert>,
    pub dispatched: Vec<String>,
    pub failures: Vec<RuleFailure>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Text printed to stdout after a run
    pub fn report(&self, dry_run: bool) -> String {
        let mut out = String::new();
        for alert in &self.triggered {
            out.push_str(&format!("TRIGGERED: {} ({})\n", alert.rule, alert.context_line));
            if dry_run {
                if let Some(ref subject) = alert.subject {
                    out.push_str(&format!("  Subject: {}\n", subject));
                }
            }
        }

        for failure in &self.failures {
            out.push_str(&format!(
                "FAILED: {} [{}] {}\n",
                failure.rule, failure.kind, failure.message
            ));
        }

        out.push_str(&format!(
            "Complete. {} rule(s) evaluated, {} triggered, {} sent, {} failed.\n",
            self.evaluated,
            self.triggered.len(),
            self.dispatched.len(),
            self.failures.len()
        ));
        out
    }
}

/// One complete batch run: lock, load state, fetch, evaluate, dispatch, save.
///
/// Lock, provider, and save errors are returned; per-rule evaluation,
/// template, and delivery failures are collected in the summary.
pub async fn run_alerts(
    engine: &RulesEngine,
    provider: &dyn WeatherProvider,
    fetch_days: usize,
    dispatcher: &ActionDispatcher,
    store: &StateStore,
    options: RunOptions,
) -> Result<RunSummary> {
    let _lock = if options.dry_run {
        None
    } else {
        Some(store.lock()?)
    };

    // A dry run must not leave a `.corrupt` copy behind
    let mut state = if options.dry_run {
        store.peek()
    } else {
        store.load()
    };

    tracing::info!(provider = provider.name(), days = fetch_days, "Fetching forecast");
    let forecast = provider.fetch_forecast(fetch_days).await?;
    if forecast.is_empty() {
        tracing::warn!(provider = provider.name(), "Provider returned no forecast days");
    } else {
        let first = &forecast.days()[0];
        tracing::debug!(days = forecast.len(), first = %first.date, "Forecast received");
    }

    let run = engine.run(&forecast, options.today, &mut state);

    let mut summary = RunSummary {
        evaluated: run.evaluated,
        failures: run.failures,
        ..Default::default()
    };

    for trigger in run.triggers {
        let rule = trigger.rule;
        let context = TemplateContext::for_match(&rule.name, &trigger.result);
        let mut alert = TriggeredAlert {
            rule: rule.name.clone(),
            context_line: context.summary_line(),
            subject: None,
        };

        let notification = match ActionDispatcher::render(&rule.action, &context) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(rule = %rule.name, "Skipping action: {}", e);
                summary.failures.push(RuleFailure {
                    rule: rule.name.clone(),
                    kind: e.kind(),
                    message: e.to_string(),
                });
                summary.triggered.push(alert);
                continue;
            }
        };
        alert.subject = Some(notification.subject.clone());

        if !options.dry_run {
            let result = dispatcher.dispatch(&rule.action, &notification).await;
            if result.success {
                tracing::info!(
                    rule = %rule.name,
                    channel = %result.channel,
                    duration_ms = result.duration_ms,
                    "Alert dispatched"
                );
                summary.dispatched.push(rule.name.clone());
            } else {
                summary.failures.push(RuleFailure {
                    rule: rule.name.clone(),
                    kind: "action",
                    message: result.error.unwrap_or_else(|| "delivery failed".to_string()),
                });
            }
        }

        summary.triggered.push(alert);
    }

    if options.dry_run {
        tracing::info!("Dry run, state not saved");
    } else {
        store.save(&state)?;
    }

    Ok(summary)
}

/// Forget first-occurrence history for one rule, or for every rule when
/// `rule` is `None`. Returns how many records were removed; nothing is
/// written when that is zero.
pub fn reset_occurrences(store: &StateStore, rule: Option<&str>) -> Result<usize> {
    let _lock = store.lock()?;
    let mut state = store.load();

    let cleared = match rule {
        Some(name) => usize::from(state.clear(name).is_some()),
        None => state.clear_all(),
    };

    if cleared > 0 {
        store.save(&state)?;
        tracing::info!(
            path = %store.path().display(),
            cleared,
            remaining = state.len(),
            "Reset occurrence state"
        );
    } else if state.is_empty() {
        tracing::debug!(path = %store.path().display(), "No occurrence records to clear");
    }

    Ok(cleared)
}

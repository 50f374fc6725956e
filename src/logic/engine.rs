use crate::logic::evaluator::{self, MatchResult, StateEffect};
use crate::models::{Forecast, OccurrenceState, Rule};
use chrono::NaiveDate;

/// A rule whose condition matched this run
#[derive(Debug, Clone)]
pub struct Trigger<'a> {
    pub rule: &'a Rule,
    pub result: MatchResult,
}

/// A rule that could not be evaluated or whose action failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub rule: String,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct EngineRun<'a> {
    pub evaluated: usize,
    pub triggers: Vec<Trigger<'a>>,
    pub failures: Vec<RuleFailure>,
}

pub struct RulesEngine {
    rules: Vec<Rule>,
}

impl RulesEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Evaluate every enabled rule in configuration order.
    ///
    /// State effects are applied to `state` as each rule is evaluated, so
    /// a later failure never loses an earlier record. Evaluation errors are
    /// collected and the remaining rules still run.
    pub fn run(
        &self,
        forecast: &Forecast,
        today: NaiveDate,
        state: &mut OccurrenceState,
    ) -> EngineRun<'_> {
        let mut run = EngineRun::default();

        for rule in self.rules.iter().filter(|r| r.enabled) {
            run.evaluated += 1;

            let evaluation =
                match evaluator::evaluate(&rule.name, &rule.condition, forecast, today, state) {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(rule = %rule.name, "Skipping rule: {}", e);
                        run.failures.push(RuleFailure {
                            rule: rule.name.clone(),
                            kind: e.kind(),
                            message: e.to_string(),
                        });
                        continue;
                    }
                };

            match evaluation.effect {
                StateEffect::Record(record) => {
                    tracing::info!(
                        rule = %rule.name,
                        date = %record.last_triggered_date,
                        season_year = record.season_year,
                        "Recording first occurrence"
                    );
                    state.record(&rule.name, record);
                }
                StateEffect::Clear => {
                    tracing::info!(rule = %rule.name, "Season closed, clearing occurrence record");
                    state.clear(&rule.name);
                }
                StateEffect::None => {}
            }

            if evaluation.result.matched {
                tracing::info!(
                    rule = %rule.name,
                    date = ?evaluation.result.matched_day.as_ref().map(|d| d.date),
                    value = ?evaluation.result.extracted_value,
                    "Condition met"
                );
                run.triggers.push(Trigger {
                    rule,
                    result: evaluation.result,
                });
            } else {
                tracing::debug!(
                    rule = %rule.name,
                    reason = evaluation.result.reason.map(|r| r.as_str()).unwrap_or("-"),
                    "Condition not met"
                );
            }
        }

        run
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

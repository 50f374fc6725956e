use super::forecast::{Field, MAX_FORECAST_DAYS};
use super::season::SeasonWindow;
use crate::config::{ActionConfig, ConditionConfig, RuleConfig, ThresholdConfig};
use crate::error::{AlertError, Result};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Eq => "eq",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Eq => "==",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "lt" => Some(Operator::Lt),
            "lte" => Some(Operator::Lte),
            "gt" => Some(Operator::Gt),
            "gte" => Some(Operator::Gte),
            "eq" => Some(Operator::Eq),
            _ => None,
        }
    }

    pub fn apply(&self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::Lt => value < threshold,
            Operator::Lte => value <= threshold,
            Operator::Gt => value > threshold,
            Operator::Gte => value >= threshold,
            Operator::Eq => value == threshold,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `field operator value` on any of the next `forecast_days` days
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Threshold {
    pub field: Field,
    pub operator: Operator,
    pub value: f64,
    pub forecast_days: usize,
}

impl Threshold {
    pub fn describe(&self) -> String {
        format!(
            "{} {} {} within {} day(s)",
            self.field,
            self.operator.symbol(),
            self.value,
            self.forecast_days
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    Threshold(Threshold),
    /// Matches at most once per season instance
    FirstOccurrence {
        weather_condition: Threshold,
        season: SeasonWindow,
    },
    Combined {
        conditions: Vec<Threshold>,
        all_must_match: bool,
    },
}

impl Condition {
    pub fn kind(&self) -> &'static str {
        match self {
            Condition::Threshold(_) => "threshold",
            Condition::FirstOccurrence { .. } => "first_occurrence",
            Condition::Combined { .. } => "combined",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Condition::Threshold(t) => t.describe(),
            Condition::FirstOccurrence {
                weather_condition,
                season,
            } => format!(
                "first {} in season {}",
                weather_condition.describe(),
                season.label()
            ),
            Condition::Combined {
                conditions,
                all_must_match,
            } => {
                let joiner = if *all_must_match { " AND " } else { " OR " };
                conditions
                    .iter()
                    .map(|t| t.describe())
                    .collect::<Vec<_>>()
                    .join(joiner)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Email,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Email => "email",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "email" => Some(ActionKind::Email),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSpec {
    pub kind: ActionKind,
    pub subject_template: String,
    pub body_template: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub name: String,
    pub enabled: bool,
    pub condition: Condition,
    pub action: ActionSpec,
}

/// Validate configured rules into typed rules.
///
/// Fails on the first invalid rule so nothing runs against a broken config.
pub fn load_rules(configs: &[RuleConfig], email_configured: bool) -> Result<Vec<Rule>> {
    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(configs.len());

    for config in configs {
        let name = config.name.trim();
        if name.is_empty() {
            return Err(AlertError::Config("alert rule with empty name".into()));
        }
        if !seen.insert(name.to_string()) {
            return Err(AlertError::Config(format!(
                "duplicate alert rule name '{}'",
                name
            )));
        }

        let rule = Rule {
            name: name.to_string(),
            enabled: config.enabled,
            condition: parse_condition(name, &config.condition)?,
            action: parse_action(name, &config.action)?,
        };

        if rule.enabled && rule.action.kind == ActionKind::Email && !email_configured {
            return Err(AlertError::Config(format!(
                "rule '{}' sends email but no `email` section is configured",
                name
            )));
        }

        rules.push(rule);
    }

    Ok(rules)
}

fn parse_condition(rule: &str, config: &ConditionConfig) -> Result<Condition> {
    match config.kind.trim() {
        "threshold" => Ok(Condition::Threshold(required_threshold(rule, config)?)),
        "first_occurrence" => {
            let season = season_window(rule, config)?;
            Ok(Condition::FirstOccurrence {
                weather_condition: required_threshold(rule, config)?,
                season,
            })
        }
        "combined" => {
            if config.weather_conditions.is_empty() {
                return Err(AlertError::Config(format!(
                    "rule '{}': combined condition needs at least one entry in `weather_conditions`",
                    rule
                )));
            }
            let conditions = config
                .weather_conditions
                .iter()
                .map(|t| parse_threshold(rule, t))
                .collect::<Result<Vec<_>>>()?;
            Ok(Condition::Combined {
                conditions,
                all_must_match: config.all_must_match,
            })
        }
        other => Err(AlertError::Config(format!(
            "rule '{}': unknown condition type '{}'",
            rule, other
        ))),
    }
}

fn required_threshold(rule: &str, config: &ConditionConfig) -> Result<Threshold> {
    let threshold = config.weather_condition.as_ref().ok_or_else(|| {
        AlertError::Config(format!(
            "rule '{}': `{}` condition requires `weather_condition`",
            rule, config.kind
        ))
    })?;
    parse_threshold(rule, threshold)
}

fn parse_threshold(rule: &str, config: &ThresholdConfig) -> Result<Threshold> {
    let field = Field::from_str(&config.field).ok_or_else(|| {
        let known: Vec<&str> = Field::ALL.iter().map(|f| f.as_str()).collect();
        AlertError::Config(format!(
            "rule '{}': unknown field '{}' (expected one of: {})",
            rule,
            config.field,
            known.join(", ")
        ))
    })?;

    let operator = Operator::from_str(&config.operator).ok_or_else(|| {
        AlertError::Config(format!(
            "rule '{}': unknown operator '{}' (expected lt, lte, gt, gte or eq)",
            rule, config.operator
        ))
    })?;

    if !config.value.is_finite() {
        return Err(AlertError::Config(format!(
            "rule '{}': threshold value must be a finite number",
            rule
        )));
    }

    if !(1..=MAX_FORECAST_DAYS as i64).contains(&config.forecast_days) {
        return Err(AlertError::Config(format!(
            "rule '{}': forecast_days must be between 1 and {} (got {})",
            rule, MAX_FORECAST_DAYS, config.forecast_days
        )));
    }

    Ok(Threshold {
        field,
        operator,
        value: config.value,
        forecast_days: config.forecast_days as usize,
    })
}

fn season_window(rule: &str, config: &ConditionConfig) -> Result<SeasonWindow> {
    let month = |m: i64| u32::try_from(m).ok();
    month(config.season_start_month)
        .zip(month(config.season_end_month))
        .and_then(|(start, end)| SeasonWindow::new(start, end))
        .ok_or_else(|| {
            AlertError::Config(format!(
                "rule '{}': season months must be between 1 and 12 (got {}-{})",
                rule, config.season_start_month, config.season_end_month
            ))
        })
}

fn parse_action(rule: &str, config: &ActionConfig) -> Result<ActionSpec> {
    let kind = ActionKind::from_str(&config.kind).ok_or_else(|| {
        AlertError::Config(format!(
            "rule '{}': unknown action type '{}'",
            rule, config.kind
        ))
    })?;

    Ok(ActionSpec {
        kind,
        subject_template: config.subject.clone(),
        body_template: config.body.clone(),
    })
}

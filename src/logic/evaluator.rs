use crate::error::{AlertError, Result};
use crate::models::{
    Condition, Field, Forecast, ForecastDay, OccurrenceRecord, OccurrenceState, SeasonWindow,
    Threshold,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Why a condition did not match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMatchReason {
    /// No day in the window satisfied the comparison
    NotMet,
    /// The forecast is shorter than the rule's window
    InsufficientData,
    OutOfSeason,
    /// Matched, but already alerted for this season instance
    AlreadyAlerted,
}

impl NoMatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoMatchReason::NotMet => "condition not met",
            NoMatchReason::InsufficientData => "insufficient forecast data",
            NoMatchReason::OutOfSeason => "out of season",
            NoMatchReason::AlreadyAlerted => "already alerted this season",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    pub matched_day: Option<ForecastDay>,
    pub extracted_value: Option<f64>,
    /// Value of every threshold that matched, by field
    pub matched_values: BTreeMap<Field, f64>,
    pub reason: Option<NoMatchReason>,
}

impl MatchResult {
    fn hit(day: &ForecastDay, field: Field, value: f64) -> Self {
        Self {
            matched: true,
            matched_day: Some(day.clone()),
            extracted_value: Some(value),
            matched_values: BTreeMap::from([(field, value)]),
            reason: None,
        }
    }

    fn miss(reason: NoMatchReason) -> Self {
        Self {
            matched: false,
            matched_day: None,
            extracted_value: None,
            matched_values: BTreeMap::new(),
            reason: Some(reason),
        }
    }
}

/// State change the engine must apply after an evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEffect {
    None,
    Record(OccurrenceRecord),
    /// The season closed; forget the previous instance's record
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub result: MatchResult,
    pub effect: StateEffect,
}

impl Evaluation {
    fn stateless(result: MatchResult) -> Self {
        Self {
            result,
            effect: StateEffect::None,
        }
    }
}

/// Evaluate one rule's condition. Never touches `state`; the caller applies
/// the returned effect.
pub fn evaluate(
    rule: &str,
    condition: &Condition,
    forecast: &Forecast,
    today: NaiveDate,
    state: &OccurrenceState,
) -> Result<Evaluation> {
    match condition {
        Condition::Threshold(threshold) => Ok(Evaluation::stateless(evaluate_threshold(
            threshold, forecast, today,
        )?)),
        Condition::FirstOccurrence {
            weather_condition,
            season,
        } => evaluate_first_occurrence(rule, weather_condition, *season, forecast, today, state),
        Condition::Combined {
            conditions,
            all_must_match,
        } => Ok(Evaluation::stateless(evaluate_combined(
            conditions,
            *all_must_match,
            forecast,
            today,
        )?)),
    }
}

/// Match on the first day in the window satisfying the comparison.
///
/// Days without the field are passed over. A window where no day carries
/// the field is insufficient data when later days do carry it (an NWS run
/// after 6 pm has only a night period for today, so no high), and a data
/// error when the provider never reports the field.
pub fn evaluate_threshold(
    threshold: &Threshold,
    forecast: &Forecast,
    today: NaiveDate,
) -> Result<MatchResult> {
    let window = forecast.window(today, threshold.forecast_days);

    if window.len() < threshold.forecast_days {
        tracing::debug!(
            field = %threshold.field,
            wanted = threshold.forecast_days,
            available = window.len(),
            "Insufficient forecast data"
        );
        return Ok(MatchResult::miss(NoMatchReason::InsufficientData));
    }

    let mut field_seen = false;
    for day in window {
        let Some(value) = day.get(threshold.field) else {
            continue;
        };
        field_seen = true;
        if threshold.operator.apply(value, threshold.value) {
            return Ok(MatchResult::hit(day, threshold.field, value));
        }
    }

    if !field_seen {
        if forecast.days().iter().any(|d| d.get(threshold.field).is_some()) {
            tracing::warn!(
                field = %threshold.field,
                forecast_days = threshold.forecast_days,
                "No {} value in the window yet; treating as insufficient data",
                threshold.field
            );
            return Ok(MatchResult::miss(NoMatchReason::InsufficientData));
        }
        return Err(AlertError::Data(format!(
            "forecast has no {} values in the {}-day window",
            threshold.field, threshold.forecast_days
        )));
    }

    Ok(MatchResult::miss(NoMatchReason::NotMet))
}

fn evaluate_first_occurrence(
    rule: &str,
    threshold: &Threshold,
    season: SeasonWindow,
    forecast: &Forecast,
    today: NaiveDate,
    state: &OccurrenceState,
) -> Result<Evaluation> {
    let Some(season_year) = season.season_year(today) else {
        // Any record left over belongs to a season instance that has closed
        let effect = if state.get(rule).is_some() {
            StateEffect::Clear
        } else {
            StateEffect::None
        };
        return Ok(Evaluation {
            result: MatchResult::miss(NoMatchReason::OutOfSeason),
            effect,
        });
    };

    let inner = evaluate_threshold(threshold, forecast, today)?;
    if !inner.matched {
        return Ok(Evaluation::stateless(inner));
    }

    if state.triggered_in_season(rule, season_year) {
        return Ok(Evaluation::stateless(MatchResult::miss(
            NoMatchReason::AlreadyAlerted,
        )));
    }

    let last_triggered_date = inner
        .matched_day
        .as_ref()
        .map(|d| d.date)
        .unwrap_or(today);

    Ok(Evaluation {
        result: inner,
        effect: StateEffect::Record(OccurrenceRecord {
            last_triggered_date,
            season_year,
        }),
    })
}

fn evaluate_combined(
    conditions: &[Threshold],
    all_must_match: bool,
    forecast: &Forecast,
    today: NaiveDate,
) -> Result<MatchResult> {
    let mut first_hit: Option<MatchResult> = None;
    let mut matched_values = BTreeMap::new();
    let mut matches = 0;
    let mut insufficient = false;

    for threshold in conditions {
        let result = evaluate_threshold(threshold, forecast, today)?;
        if result.matched {
            matches += 1;
            matched_values.extend(result.matched_values.iter().map(|(f, v)| (*f, *v)));
            if first_hit.is_none() {
                first_hit = Some(result);
            }
        } else if result.reason == Some(NoMatchReason::InsufficientData) {
            insufficient = true;
        }
    }

    let triggered = if all_must_match {
        matches == conditions.len()
    } else {
        matches > 0
    };

    match first_hit {
        Some(mut hit) if triggered => {
            hit.matched_values = matched_values;
            Ok(hit)
        }
        _ if insufficient => Ok(MatchResult::miss(NoMatchReason::InsufficientData)),
        _ => Ok(MatchResult::miss(NoMatchReason::NotMet)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Operator;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn threshold(field: Field, operator: Operator, value: f64, days: usize) -> Threshold {
        Threshold {
            field,
            operator,
            value,
            forecast_days: days,
        }
    }

    fn freeze(days: usize) -> Threshold {
        threshold(Field::TemperatureMin, Operator::Lte, 32.0, days)
    }

    /// D0 = 34, D1 = 28
    fn two_day_forecast(start: NaiveDate) -> Forecast {
        Forecast::new(vec![
            ForecastDay::new(start).with_field(Field::TemperatureMin, 34.0),
            ForecastDay::new(start.succ_opt().unwrap()).with_field(Field::TemperatureMin, 28.0),
        ])
        .unwrap()
    }

    fn sample_forecast() -> Forecast {
        Forecast::new(vec![
            ForecastDay::new(date(2024, 1, 15))
                .with_field(Field::TemperatureMin, 28.0)
                .with_field(Field::TemperatureMax, 45.0)
                .with_field(Field::PrecipitationProbability, 20.0),
            ForecastDay::new(date(2024, 1, 16))
                .with_field(Field::TemperatureMin, 35.0)
                .with_field(Field::TemperatureMax, 52.0)
                .with_field(Field::PrecipitationProbability, 10.0),
            ForecastDay::new(date(2024, 1, 17))
                .with_field(Field::TemperatureMin, 40.0)
                .with_field(Field::TemperatureMax, 65.0)
                .with_field(Field::PrecipitationProbability, 80.0),
        ])
        .unwrap()
    }

    #[test]
    fn threshold_matches_second_day() {
        let d0 = date(2025, 10, 1);
        let forecast = two_day_forecast(d0);
        let result = evaluate_threshold(&freeze(2), &forecast, d0).unwrap();

        assert!(result.matched);
        assert_eq!(result.matched_day.unwrap().date, date(2025, 10, 2));
        assert_eq!(result.extracted_value, Some(28.0));
    }

    #[test]
    fn threshold_window_of_one_examines_only_today() {
        let d0 = date(2025, 10, 1);
        let forecast = two_day_forecast(d0);
        let result = evaluate_threshold(&freeze(1), &forecast, d0).unwrap();

        assert!(!result.matched);
        assert_eq!(result.reason, Some(NoMatchReason::NotMet));
        assert!(result.matched_day.is_none());
    }

    #[test]
    fn threshold_no_day_satisfies() {
        let forecast = sample_forecast();
        let cold = threshold(Field::TemperatureMin, Operator::Lte, 15.0, 3);
        let result = evaluate_threshold(&cold, &forecast, date(2024, 1, 15)).unwrap();
        assert!(!result.matched);
        assert!(result.extracted_value.is_none());
    }

    #[test]
    fn threshold_single_satisfying_day_at_each_position() {
        for k in 0..5 {
            let start = date(2025, 3, 1);
            let days = (0..5)
                .map(|i| {
                    let temp = if i == k { 90.0 } else { 70.0 };
                    ForecastDay::new(start + chrono::Duration::days(i as i64))
                        .with_field(Field::TemperatureMax, temp)
                })
                .collect();
            let forecast = Forecast::new(days).unwrap();
            let hot = threshold(Field::TemperatureMax, Operator::Gte, 90.0, 5);

            let result = evaluate_threshold(&hot, &forecast, start).unwrap();
            assert!(result.matched, "position {k}");
            assert_eq!(
                result.matched_day.unwrap().date,
                start + chrono::Duration::days(k as i64)
            );
        }
    }

    #[test]
    fn threshold_returns_first_satisfying_day() {
        let forecast = sample_forecast();
        let result = evaluate_threshold(
            &threshold(Field::TemperatureMin, Operator::Lte, 40.0, 3),
            &forecast,
            date(2024, 1, 15),
        )
        .unwrap();
        assert_eq!(result.matched_day.unwrap().date, date(2024, 1, 15));
        assert_eq!(result.extracted_value, Some(28.0));
    }

    #[test]
    fn threshold_starts_at_today() {
        let forecast = sample_forecast();
        let result = evaluate_threshold(&freeze(1), &forecast, date(2024, 1, 16)).unwrap();
        assert!(!result.matched);
    }

    #[test]
    fn threshold_starts_at_first_day_when_today_missing() {
        let forecast = sample_forecast();
        let result = evaluate_threshold(&freeze(1), &forecast, date(2024, 1, 14)).unwrap();
        assert!(result.matched);
    }

    #[test]
    fn threshold_respects_forecast_days() {
        let forecast = sample_forecast();
        let rain = |days| threshold(Field::PrecipitationProbability, Operator::Gte, 80.0, days);

        let short = evaluate_threshold(&rain(1), &forecast, date(2024, 1, 15)).unwrap();
        assert!(!short.matched);

        let full = evaluate_threshold(&rain(3), &forecast, date(2024, 1, 15)).unwrap();
        assert!(full.matched);
        assert_eq!(full.matched_day.unwrap().date, date(2024, 1, 17));
    }

    #[test]
    fn short_forecast_is_insufficient_not_error() {
        let forecast = sample_forecast();
        let result = evaluate_threshold(&freeze(7), &forecast, date(2024, 1, 15)).unwrap();
        assert!(!result.matched);
        assert_eq!(result.reason, Some(NoMatchReason::InsufficientData));

        let empty = Forecast::default();
        let result = evaluate_threshold(&freeze(1), &empty, date(2024, 1, 15)).unwrap();
        assert_eq!(result.reason, Some(NoMatchReason::InsufficientData));
    }

    #[test]
    fn missing_field_on_some_days_is_skipped() {
        let d0 = date(2025, 10, 1);
        let forecast = Forecast::new(vec![
            ForecastDay::new(d0).with_field(Field::TemperatureMax, 60.0),
            ForecastDay::new(d0.succ_opt().unwrap()).with_field(Field::TemperatureMin, 30.0),
        ])
        .unwrap();
        let result = evaluate_threshold(&freeze(2), &forecast, d0).unwrap();
        assert!(result.matched);
        assert_eq!(result.extracted_value, Some(30.0));
    }

    #[test]
    fn field_absent_from_window_is_data_error() {
        let forecast = sample_forecast();
        let windy = threshold(Field::WindSpeed, Operator::Gt, 20.0, 2);
        let err = evaluate_threshold(&windy, &forecast, date(2024, 1, 15)).unwrap_err();
        assert!(matches!(err, AlertError::Data(_)));
    }

    #[test]
    fn evening_partial_day_without_high_is_insufficient() {
        // Tonight's period only carries a low; tomorrow has both
        let tonight = date(2025, 7, 14);
        let forecast = Forecast::new(vec![
            ForecastDay::new(tonight).with_field(Field::TemperatureMin, 71.0),
            ForecastDay::new(tonight.succ_opt().unwrap())
                .with_field(Field::TemperatureMax, 95.0)
                .with_field(Field::TemperatureMin, 72.0),
        ])
        .unwrap();
        let hot_today = threshold(Field::TemperatureMax, Operator::Gte, 90.0, 1);

        let result = evaluate_threshold(&hot_today, &forecast, tonight).unwrap();
        assert!(!result.matched);
        assert_eq!(result.reason, Some(NoMatchReason::InsufficientData));

        let hot_soon = threshold(Field::TemperatureMax, Operator::Gte, 90.0, 2);
        assert!(evaluate_threshold(&hot_soon, &forecast, tonight).unwrap().matched);
    }

    fn first_freeze(start: u32, end: u32) -> Condition {
        Condition::FirstOccurrence {
            weather_condition: freeze(2),
            season: SeasonWindow::new(start, end).unwrap(),
        }
    }

    fn apply(state: &mut OccurrenceState, rule: &str, effect: &StateEffect) {
        match effect {
            StateEffect::Record(r) => state.record(rule, *r),
            StateEffect::Clear => {
                state.clear(rule);
            }
            StateEffect::None => {}
        }
    }

    #[test]
    fn first_occurrence_fires_once_per_season() {
        let today = date(2025, 9, 1);
        let forecast = two_day_forecast(today);
        let condition = first_freeze(8, 12);
        let mut state = OccurrenceState::default();

        let first = evaluate("First freeze", &condition, &forecast, today, &state).unwrap();
        assert!(first.result.matched);
        assert_eq!(first.result.matched_day.as_ref().unwrap().date, date(2025, 9, 2));
        assert_eq!(
            first.effect,
            StateEffect::Record(OccurrenceRecord {
                last_triggered_date: date(2025, 9, 2),
                season_year: 2025,
            })
        );
        apply(&mut state, "First freeze", &first.effect);

        let second = evaluate("First freeze", &condition, &forecast, today, &state).unwrap();
        assert!(!second.result.matched);
        assert_eq!(second.result.reason, Some(NoMatchReason::AlreadyAlerted));
        assert_eq!(second.effect, StateEffect::None);
    }

    #[test]
    fn first_occurrence_out_of_season_never_matches() {
        let today = date(2025, 6, 15);
        let forecast = two_day_forecast(today);
        let evaluation = evaluate(
            "Winter freeze",
            &first_freeze(11, 2),
            &forecast,
            today,
            &OccurrenceState::default(),
        )
        .unwrap();
        assert!(!evaluation.result.matched);
        assert_eq!(evaluation.result.reason, Some(NoMatchReason::OutOfSeason));
        assert_eq!(evaluation.effect, StateEffect::None);
    }

    #[test]
    fn first_occurrence_wrapped_season_in_december() {
        let today = date(2025, 12, 15);
        let forecast = two_day_forecast(today);
        let evaluation = evaluate(
            "Winter freeze",
            &first_freeze(11, 2),
            &forecast,
            today,
            &OccurrenceState::default(),
        )
        .unwrap();
        assert!(evaluation.result.matched);
    }

    #[test]
    fn wrapped_season_dedupes_across_new_year() {
        let condition = first_freeze(11, 2);
        let mut state = OccurrenceState::default();

        let december = date(2025, 12, 15);
        let fired = evaluate("Winter", &condition, &two_day_forecast(december), december, &state)
            .unwrap();
        assert!(fired.result.matched);
        apply(&mut state, "Winter", &fired.effect);

        let january = date(2026, 1, 20);
        let again = evaluate("Winter", &condition, &two_day_forecast(january), january, &state)
            .unwrap();
        assert!(!again.result.matched);
        assert_eq!(again.result.reason, Some(NoMatchReason::AlreadyAlerted));
    }

    #[test]
    fn closed_season_clears_record_and_next_season_fires() {
        let condition = first_freeze(8, 12);
        let mut state = OccurrenceState::default();
        state.record(
            "First freeze",
            OccurrenceRecord {
                last_triggered_date: date(2025, 10, 3),
                season_year: 2025,
            },
        );

        let january = date(2026, 1, 5);
        let closed = evaluate("First freeze", &condition, &two_day_forecast(january), january, &state)
            .unwrap();
        assert!(!closed.result.matched);
        assert_eq!(closed.effect, StateEffect::Clear);
        apply(&mut state, "First freeze", &closed.effect);
        assert!(state.is_empty());

        let next_fall = date(2026, 9, 10);
        let fired = evaluate("First freeze", &condition, &two_day_forecast(next_fall), next_fall, &state)
            .unwrap();
        assert!(fired.result.matched);
    }

    #[test]
    fn stale_record_from_previous_season_does_not_block() {
        let condition = first_freeze(8, 12);
        let mut state = OccurrenceState::default();
        state.record(
            "First freeze",
            OccurrenceRecord {
                last_triggered_date: date(2024, 10, 3),
                season_year: 2024,
            },
        );

        let today = date(2025, 9, 1);
        let evaluation =
            evaluate("First freeze", &condition, &two_day_forecast(today), today, &state).unwrap();
        assert!(evaluation.result.matched);
        assert!(matches!(
            evaluation.effect,
            StateEffect::Record(OccurrenceRecord { season_year: 2025, .. })
        ));
    }

    #[test]
    fn first_occurrence_inner_miss_records_nothing() {
        let today = date(2025, 9, 1);
        let forecast = Forecast::new(vec![
            ForecastDay::new(today).with_field(Field::TemperatureMin, 50.0),
            ForecastDay::new(today.succ_opt().unwrap()).with_field(Field::TemperatureMin, 48.0),
        ])
        .unwrap();
        let evaluation = evaluate(
            "First freeze",
            &first_freeze(8, 12),
            &forecast,
            today,
            &OccurrenceState::default(),
        )
        .unwrap();
        assert!(!evaluation.result.matched);
        assert_eq!(evaluation.effect, StateEffect::None);
    }

    fn hot_and_dry(all_must_match: bool) -> Condition {
        Condition::Combined {
            conditions: vec![
                threshold(Field::TemperatureMax, Operator::Gte, 90.0, 1),
                threshold(Field::PrecipitationProbability, Operator::Lte, 10.0, 1),
            ],
            all_must_match,
        }
    }

    fn july_day(temp_max: f64, precip: f64) -> Forecast {
        Forecast::new(vec![ForecastDay::new(date(2024, 7, 15))
            .with_field(Field::TemperatureMax, temp_max)
            .with_field(Field::PrecipitationProbability, precip)])
        .unwrap()
    }

    #[test]
    fn combined_all_must_match() {
        let state = OccurrenceState::default();
        let today = date(2024, 7, 15);

        let both = evaluate("Hot", &hot_and_dry(true), &july_day(95.0, 5.0), today, &state).unwrap();
        assert!(both.result.matched);
        assert_eq!(both.result.matched_values.get(&Field::TemperatureMax), Some(&95.0));
        assert_eq!(
            both.result.matched_values.get(&Field::PrecipitationProbability),
            Some(&5.0)
        );

        let partial =
            evaluate("Hot", &hot_and_dry(true), &july_day(85.0, 5.0), today, &state).unwrap();
        assert!(!partial.result.matched);
    }

    #[test]
    fn combined_any_match() {
        let state = OccurrenceState::default();
        let today = date(2024, 7, 15);
        let any = evaluate("Hot", &hot_and_dry(false), &july_day(85.0, 5.0), today, &state).unwrap();
        assert!(any.result.matched);
        assert_eq!(any.result.extracted_value, Some(5.0));

        let none =
            evaluate("Hot", &hot_and_dry(false), &july_day(85.0, 50.0), today, &state).unwrap();
        assert!(!none.result.matched);
    }
}

//! Table-driven reconciliation of extracted values into form state.
//!
//! Every extracted value passes through the rule of its field before it may
//! overwrite the draft. A value that fails its rule clears the field instead
//! of leaving stale data behind; an enum value that does not resolve to an
//! option current at reconciliation time is never written.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate};
use regex::Regex;
use serde::Serialize;
use serde_json::{Number, Value as JsonValue};
use tracing::{trace, warn};

use arms_core::{
    AutoFilledFieldSet, ExtractedFieldSet, FieldKind, FieldOption, FieldRule, FormSchema,
    ReconcileMode, RecordPayload,
};

/// Date layouts accepted from extraction, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d"];

/// `%Y` also matches one to three digit years; anything earlier is a two-digit
/// year read literally.
const MIN_YEAR: i32 = 1000;

/// Largest magnitude written back as an integer.
const MAX_INTEGRAL: f64 = 9.0e15;

/// Result of reconciling one field value against its rule.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    /// Write `value`; highlight the field when `highlight` is set.
    Accept { value: JsonValue, highlight: bool },
    /// The value failed its rule; clear the field.
    Clear,
}

/// What a reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    /// Fields written and highlighted.
    pub updated: Vec<String>,
    /// Fields cleared because their value failed its rule.
    pub cleared: Vec<String>,
    /// Fields left untouched (unknown, null, or already filled).
    pub skipped: Vec<String>,
    pub confidence: f64,
}

impl ReconcileReport {
    /// Aggregate notice shown after a pass.
    pub fn summary(&self) -> String {
        match self.updated.len() {
            1 => "1 field updated".to_string(),
            n => format!("{} fields updated", n),
        }
    }
}

/// Applies form field rules to extracted values.
#[derive(Debug, Clone, Copy)]
pub struct FieldReconciler {
    today: NaiveDate,
}

impl FieldReconciler {
    /// Reconciler that rejects dates after `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Reconciler using the local calendar date.
    pub fn today() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }

    /// Reconcile an extraction pass into `draft`.
    ///
    /// `options` maps catalog keys to the options valid right now. The
    /// auto-filled set is replaced with exactly the fields highlighted by
    /// this pass.
    pub fn reconcile(
        &self,
        schema: &FormSchema,
        extracted: ExtractedFieldSet,
        options: &BTreeMap<String, Vec<FieldOption>>,
        draft: &mut RecordPayload,
        auto_filled: &mut AutoFilledFieldSet,
        mode: ReconcileMode,
    ) -> ReconcileReport {
        let mut report = ReconcileReport {
            confidence: extracted.confidence,
            ..ReconcileReport::default()
        };

        for (name, raw) in extracted.fields {
            let Some(rule) = schema.rule(&name).filter(|_| name != schema.document_field) else {
                trace!(subsystem = "reconcile", field = %name, "Skipping unknown field");
                report.skipped.push(name);
                continue;
            };
            if raw.is_null() {
                report.skipped.push(name);
                continue;
            }
            if mode == ReconcileMode::FillEmptyOnly && !is_empty_value(draft.get(&name)) {
                trace!(subsystem = "reconcile", field = %name, "Keeping existing value");
                report.skipped.push(name);
                continue;
            }

            let empty: Vec<FieldOption> = Vec::new();
            let field_options = rule
                .catalog_key()
                .and_then(|key| options.get(key))
                .unwrap_or(&empty);

            match self.coerce(rule, &raw, field_options) {
                FieldOutcome::Accept { value, highlight } => {
                    trace!(subsystem = "reconcile", field = %name, value = %value, highlight, "Accepted");
                    draft.insert(name.clone(), value);
                    if highlight {
                        report.updated.push(name);
                    } else {
                        report.cleared.push(name);
                    }
                }
                FieldOutcome::Clear => {
                    trace!(subsystem = "reconcile", field = %name, raw = %raw, "Rejected, clearing");
                    draft.insert(name.clone(), JsonValue::Null);
                    report.cleared.push(name);
                }
            }
        }

        auto_filled.replace_with(report.updated.iter().cloned());
        report
    }

    /// Check one raw value against its rule.
    pub fn coerce(&self, rule: &FieldRule, raw: &JsonValue, options: &[FieldOption]) -> FieldOutcome {
        match &rule.kind {
            FieldKind::Text => match scalar_text(raw) {
                Some(text) => FieldOutcome::Accept {
                    highlight: !text.is_empty(),
                    value: JsonValue::String(text),
                },
                None => FieldOutcome::Clear,
            },
            FieldKind::Number {
                min,
                max,
                exclusive_min,
                integral,
            } => coerce_number(raw, *min, *max, *exclusive_min, *integral),
            FieldKind::Date => match parse_date(raw) {
                Some(date) if date <= self.today => accept(JsonValue::String(
                    date.format("%Y-%m-%d").to_string(),
                )),
                _ => FieldOutcome::Clear,
            },
            FieldKind::Enum { .. } => match resolve_option(raw, options) {
                Some(option) => accept(JsonValue::from(option.id)),
                None => FieldOutcome::Clear,
            },
            FieldKind::Bool => accept(JsonValue::Bool(truthy(raw))),
            FieldKind::Pattern { pattern } => {
                let Some(text) = scalar_text(raw).filter(|t| !t.is_empty()) else {
                    return FieldOutcome::Clear;
                };
                match Regex::new(pattern) {
                    Ok(re) if re.is_match(&text) => accept(JsonValue::String(text)),
                    Ok(_) => FieldOutcome::Clear,
                    Err(e) => {
                        warn!(subsystem = "reconcile", field = %rule.name, error = %e, "Invalid field pattern");
                        FieldOutcome::Clear
                    }
                }
            }
        }
    }
}

fn accept(value: JsonValue) -> FieldOutcome {
    FieldOutcome::Accept {
        value,
        highlight: true,
    }
}

/// Whether a draft value counts as empty for fill-empty-only.
pub fn is_empty_value(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn scalar_text(raw: &JsonValue) -> Option<String> {
    match raw {
        JsonValue::String(s) => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_number(raw: &JsonValue) -> Option<f64> {
    match raw {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => {
            let cleaned: String = s.chars().filter(|c| !c.is_whitespace() && *c != ',').collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
}

fn coerce_number(
    raw: &JsonValue,
    min: Option<f64>,
    max: Option<f64>,
    exclusive_min: bool,
    integral: bool,
) -> FieldOutcome {
    let Some(n) = parse_number(raw).filter(|n| n.is_finite()) else {
        return FieldOutcome::Clear;
    };
    if let Some(min) = min {
        if n < min || (exclusive_min && n == min) {
            return FieldOutcome::Clear;
        }
    }
    if max.is_some_and(|max| n > max) {
        return FieldOutcome::Clear;
    }

    if integral {
        if n.fract() != 0.0 || n.abs() > MAX_INTEGRAL {
            return FieldOutcome::Clear;
        }
        return accept(JsonValue::from(n as i64));
    }
    match Number::from_f64(n) {
        Some(number) => accept(JsonValue::Number(number)),
        None => FieldOutcome::Clear,
    }
}

fn parse_date(raw: &JsonValue) -> Option<NaiveDate> {
    let text = raw.as_str()?.trim();
    DATE_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .find(|date| date.year() >= MIN_YEAR)
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Resolve an extracted value to a current option, by id then by name.
fn resolve_option<'a>(raw: &JsonValue, options: &'a [FieldOption]) -> Option<&'a FieldOption> {
    let id = match raw {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    if let Some(id) = id {
        if let Some(option) = options.iter().find(|o| o.id == id) {
            return Some(option);
        }
    }

    let name = raw.as_str()?.trim();
    if name.is_empty() {
        return None;
    }
    options
        .iter()
        .find(|o| o.name.trim().eq_ignore_ascii_case(name))
        .or_else(|| {
            let lowered = name.to_lowercase();
            options.iter().find(|o| o.name.trim().to_lowercase() == lowered)
        })
}

fn truthy(raw: &JsonValue) -> bool {
    match raw {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "" | "false" | "no" | "n" | "0" | "off" | "none"
        ),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arms_core::FormRegistry;
    use serde_json::json;

    fn reconciler() -> FieldReconciler {
        FieldReconciler::new(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap())
    }

    fn rule(kind: FieldKind) -> FieldRule {
        FieldRule::new("f", kind)
    }

    fn levels() -> Vec<FieldOption> {
        vec![
            FieldOption::new(1, "International"),
            FieldOption::new(2, "National"),
            FieldOption::new(3, "State"),
        ]
    }

    #[test]
    fn test_text_trimmed_and_highlighted_when_non_empty() {
        let r = reconciler();
        assert_eq!(
            r.coerce(&rule(FieldKind::Text), &json!("  AI Summit "), &[]),
            FieldOutcome::Accept {
                value: json!("AI Summit"),
                highlight: true
            }
        );
        assert_eq!(
            r.coerce(&rule(FieldKind::Text), &json!("   "), &[]),
            FieldOutcome::Accept {
                value: json!(""),
                highlight: false
            }
        );
        assert_eq!(
            r.coerce(&rule(FieldKind::Text), &json!(["a"]), &[]),
            FieldOutcome::Clear
        );
    }

    #[test]
    fn test_count_must_be_positive_integer() {
        let r = reconciler();
        let count = rule(FieldKind::positive_count());
        assert_eq!(r.coerce(&count, &json!(120), &[]), accept(json!(120)));
        assert_eq!(r.coerce(&count, &json!("1,200"), &[]), accept(json!(1200)));
        assert_eq!(r.coerce(&count, &json!(0), &[]), FieldOutcome::Clear);
        assert_eq!(r.coerce(&count, &json!(-3), &[]), FieldOutcome::Clear);
        assert_eq!(r.coerce(&count, &json!(2.5), &[]), FieldOutcome::Clear);
        assert_eq!(r.coerce(&count, &json!("many"), &[]), FieldOutcome::Clear);
        assert_eq!(r.coerce(&count, &json!("NaN"), &[]), FieldOutcome::Clear);
    }

    #[test]
    fn test_amount_accepts_fractions_within_bounds() {
        let r = reconciler();
        let amount = rule(FieldKind::Number {
            min: Some(0.0),
            max: Some(1000.0),
            exclusive_min: false,
            integral: false,
        });
        assert_eq!(r.coerce(&amount, &json!(0), &[]), accept(json!(0.0)));
        assert_eq!(r.coerce(&amount, &json!("12.5"), &[]), accept(json!(12.5)));
        assert_eq!(r.coerce(&amount, &json!(1000.5), &[]), FieldOutcome::Clear);
    }

    #[test]
    fn test_dates_normalized_and_future_rejected() {
        let r = reconciler();
        let date = rule(FieldKind::Date);
        assert_eq!(r.coerce(&date, &json!("2026-03-01"), &[]), accept(json!("2026-03-01")));
        assert_eq!(r.coerce(&date, &json!("01/03/2026"), &[]), accept(json!("2026-03-01")));
        assert_eq!(r.coerce(&date, &json!("01-03-2026"), &[]), accept(json!("2026-03-01")));
        assert_eq!(r.coerce(&date, &json!("2026/03/01"), &[]), accept(json!("2026-03-01")));
        assert_eq!(
            r.coerce(&date, &json!("2026-03-01T10:00:00+05:30"), &[]),
            accept(json!("2026-03-01"))
        );
        assert_eq!(r.coerce(&date, &json!("2026-10-16"), &[]), accept(json!("2026-10-16")));
        assert_eq!(r.coerce(&date, &json!("2026-10-17"), &[]), FieldOutcome::Clear);
        assert_eq!(r.coerce(&date, &json!("2026-02-30"), &[]), FieldOutcome::Clear);
        assert_eq!(r.coerce(&date, &json!("last spring"), &[]), FieldOutcome::Clear);
        assert_eq!(r.coerce(&date, &json!("15-08-24"), &[]), FieldOutcome::Clear);
        assert_eq!(r.coerce(&date, &json!("24/08/15"), &[]), FieldOutcome::Clear);
        assert_eq!(r.coerce(&date, &json!("0999-01-01"), &[]), FieldOutcome::Clear);
    }

    #[test]
    fn test_enum_matches_id_then_name() {
        let r = reconciler();
        let level = rule(FieldKind::dropdown());
        assert_eq!(r.coerce(&level, &json!(2), &levels()), accept(json!(2)));
        assert_eq!(r.coerce(&level, &json!("3"), &levels()), accept(json!(3)));
        assert_eq!(r.coerce(&level, &json!(" national "), &levels()), accept(json!(2)));
        assert_eq!(r.coerce(&level, &json!(999), &levels()), FieldOutcome::Clear);
        assert_eq!(r.coerce(&level, &json!("District"), &levels()), FieldOutcome::Clear);
        assert_eq!(r.coerce(&level, &json!(1), &[]), FieldOutcome::Clear);
    }

    #[test]
    fn test_bool_truthy_and_always_highlighted() {
        let r = reconciler();
        let flag = rule(FieldKind::Bool);
        assert_eq!(r.coerce(&flag, &json!("Yes"), &[]), accept(json!(true)));
        assert_eq!(r.coerce(&flag, &json!("no"), &[]), accept(json!(false)));
        assert_eq!(r.coerce(&flag, &json!(0), &[]), accept(json!(false)));
        assert_eq!(r.coerce(&flag, &json!(false), &[]), accept(json!(false)));
    }

    #[test]
    fn test_pattern_field() {
        let r = reconciler();
        let doi = rule(FieldKind::pattern(r"^10\.\d{4,9}/\S+$"));
        assert_eq!(
            r.coerce(&doi, &json!(" 10.1000/xyz123 "), &[]),
            accept(json!("10.1000/xyz123"))
        );
        assert_eq!(r.coerce(&doi, &json!("doi:10.1000"), &[]), FieldOutcome::Clear);

        let broken = rule(FieldKind::pattern("(unclosed"));
        assert_eq!(r.coerce(&broken, &json!("x"), &[]), FieldOutcome::Clear);
    }

    #[test]
    fn test_reconcile_replaces_highlight_set() {
        let registry = FormRegistry::builtin();
        let schema = registry.get("events").unwrap();
        let mut options = BTreeMap::new();
        options.insert("level".to_string(), levels());

        let mut draft = RecordPayload::new();
        let mut auto_filled = AutoFilledFieldSet::new();
        auto_filled.insert("venue");

        let extracted = ExtractedFieldSet::new(
            [
                ("title".to_string(), json!("AI Summit")),
                ("level".to_string(), json!(999)),
                ("participants".to_string(), json!(40)),
                ("organizer".to_string(), JsonValue::Null),
                ("Image".to_string(), json!("upload/x.pdf")),
                ("sponsor".to_string(), json!("ACME")),
            ]
            .into_iter()
            .collect(),
            0.8,
        );

        let report = reconciler().reconcile(
            schema,
            extracted,
            &options,
            &mut draft,
            &mut auto_filled,
            ReconcileMode::Replace,
        );

        assert_eq!(report.updated, vec!["participants", "title"]);
        assert_eq!(report.cleared, vec!["level"]);
        assert_eq!(report.skipped, vec!["Image", "organizer", "sponsor"]);
        assert_eq!(report.summary(), "2 fields updated");
        assert_eq!(draft["level"], JsonValue::Null);
        assert!(!draft.contains_key("Image"));
        assert!(!draft.contains_key("sponsor"));
        assert!(auto_filled.contains("title"));
        assert!(!auto_filled.contains("venue"));
        assert!(!auto_filled.contains("level"));
    }

    #[test]
    fn test_fill_empty_only_keeps_user_values() {
        let registry = FormRegistry::builtin();
        let schema = registry.get("events").unwrap();
        let mut draft = RecordPayload::new();
        draft.insert("title".into(), json!("My Title"));
        draft.insert("venue".into(), json!("  "));
        let mut auto_filled = AutoFilledFieldSet::new();

        let extracted = ExtractedFieldSet::new(
            [
                ("title".to_string(), json!("Model Title")),
                ("venue".to_string(), json!("Hall A")),
            ]
            .into_iter()
            .collect(),
            1.0,
        );
        let report = reconciler().reconcile(
            schema,
            extracted,
            &BTreeMap::new(),
            &mut draft,
            &mut auto_filled,
            ReconcileMode::FillEmptyOnly,
        );

        assert_eq!(draft["title"], json!("My Title"));
        assert_eq!(draft["venue"], json!("Hall A"));
        assert_eq!(report.updated, vec!["venue"]);
        assert_eq!(report.skipped, vec!["title"]);
    }

    #[test]
    fn test_summary_singular() {
        let report = ReconcileReport {
            updated: vec!["title".into()],
            ..ReconcileReport::default()
        };
        assert_eq!(report.summary(), "1 field updated");
    }
}

//! Bidirectional mapping between the URL query string and [`FilterState`].
//!
//! `parse` never fails: the query string is user-editable, so anything it
//! cannot make sense of falls back to the schema default and is reported as a
//! [`ParseIssue`]. `serialize` writes only non-default values in schema order,
//! followed by `sort` and `size`, which makes its output the canonical form.

use std::collections::BTreeSet;
use std::sync::Arc;

use table_logging::table_debug;
use thiserror::Error;
use url::form_urlencoded;

use crate::filter::{DateRange, FilterState, FilterValue};
use crate::schema::{FieldKind, FilterSchema, Sort, SIZE_PARAM, SORT_PARAM};

/// A parameter that was ignored or adjusted while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIssue {
    #[error("unknown parameter `{name}`")]
    UnknownParam { name: String },
    #[error("invalid value `{raw}` for `{name}`: {reason}")]
    InvalidValue {
        name: String,
        raw: String,
        reason: &'static str,
    },
    #[error("invalid sort `{raw}`")]
    InvalidSort { raw: String },
    #[error("invalid page size `{raw}`")]
    InvalidPageSize { raw: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub state: FilterState,
    /// `serialize(state)`; what the address bar should show.
    pub normalized_query: String,
    pub issues: Vec<ParseIssue>,
    rewritten: bool,
}

impl ParseOutcome {
    /// True when the raw input differs from its canonical form.
    pub fn is_rewritten(&self) -> bool {
        self.rewritten
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParamCodec {
    schema: Arc<FilterSchema>,
}

impl Default for SearchParamCodec {
    fn default() -> Self {
        Self::new(Arc::new(FilterSchema::default()))
    }
}

impl SearchParamCodec {
    pub fn new(schema: Arc<FilterSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &FilterSchema {
        &self.schema
    }

    pub fn parse(&self, raw: &str) -> ParseOutcome {
        let input = raw.strip_prefix('?').unwrap_or(raw);
        let mut state = FilterState::defaults(&self.schema);
        let mut issues = Vec::new();

        for (name, value) in form_urlencoded::parse(input.as_bytes()) {
            match name.as_ref() {
                "" => {}
                SORT_PARAM => match value.parse::<Sort>() {
                    Ok(sort) if self.schema.is_sortable(&sort.field) => state.set_sort(sort),
                    _ => {
                        issues.push(ParseIssue::InvalidSort {
                            raw: value.to_string(),
                        });
                        state.set_sort(self.schema.default_sort().clone());
                    }
                },
                SIZE_PARAM => {
                    let limits = self.schema.page_size();
                    match value.trim().parse::<u32>() {
                        Ok(size) => {
                            if limits.clamp(size) != size {
                                issues.push(ParseIssue::InvalidPageSize {
                                    raw: value.to_string(),
                                });
                            }
                            state.set_page_size(limits.clamp(size));
                        }
                        Err(_) => {
                            issues.push(ParseIssue::InvalidPageSize {
                                raw: value.to_string(),
                            });
                            state.set_page_size(limits.default);
                        }
                    }
                }
                field => match self.schema.field(field) {
                    Some(spec) => {
                        let (decoded, rejected) = decode(&spec.kind, &value);
                        if let Some(reason) = rejected {
                            issues.push(ParseIssue::InvalidValue {
                                name: field.to_string(),
                                raw: value.to_string(),
                                reason,
                            });
                        }
                        state.set_filter(field, decoded);
                    }
                    None => issues.push(ParseIssue::UnknownParam {
                        name: field.to_string(),
                    }),
                },
            }
        }

        for issue in &issues {
            table_debug!("Falling back to default: {}", issue);
        }

        let state = state.normalize(&self.schema);
        let normalized_query = self.serialize(&state);
        let rewritten = normalized_query != input;
        ParseOutcome {
            state,
            normalized_query,
            issues,
            rewritten,
        }
    }

    pub fn serialize(&self, state: &FilterState) -> String {
        let state = state.normalize(&self.schema);
        let mut out = form_urlencoded::Serializer::new(String::new());
        for spec in self.schema.fields() {
            if let Some(value) = state.filter(&spec.name) {
                out.append_pair(&spec.name, &encode_field_value(value));
            }
        }
        if state.sort() != self.schema.default_sort() {
            out.append_pair(SORT_PARAM, &state.sort().to_string());
        }
        if state.page_size() != self.schema.page_size().default {
            out.append_pair(SIZE_PARAM, &state.page_size().to_string());
        }
        out.finish()
    }
}

/// Decodes one raw parameter value. Unlike query parsing this is strict:
/// any rejected part is an error.
pub fn decode_field_value(kind: &FieldKind, raw: &str) -> Result<Option<FilterValue>, String> {
    match decode(kind, raw) {
        (value, None) => Ok(value),
        (_, Some(reason)) => Err(reason.to_string()),
    }
}

pub fn encode_field_value(value: &FilterValue) -> String {
    match value {
        FilterValue::Single(value) => value.clone(),
        FilterValue::Many(values) => values.iter().cloned().collect::<Vec<_>>().join(","),
        FilterValue::Range(range) => format!("{}-{}", range.start, range.end),
    }
}

fn decode(kind: &FieldKind, raw: &str) -> (Option<FilterValue>, Option<&'static str>) {
    let raw = raw.trim();
    if raw.is_empty() {
        return (None, None);
    }
    match kind {
        FieldKind::Text => (Some(FilterValue::Single(raw.to_string())), None),
        FieldKind::Enum { options } => match FieldKind::canonical_option(options, raw) {
            Some(option) => (Some(FilterValue::Single(option)), None),
            None => (None, Some("not one of the allowed options")),
        },
        FieldKind::EnumSet { options } => {
            let mut values = BTreeSet::new();
            let mut rejected = None;
            for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
                match FieldKind::canonical_option(options, part) {
                    Some(option) => {
                        values.insert(option);
                    }
                    None => rejected = Some("contains an unknown option"),
                }
            }
            let value = (!values.is_empty()).then_some(FilterValue::Many(values));
            (value, rejected)
        }
        FieldKind::DateRange => match parse_range(raw) {
            Some(range) => (Some(FilterValue::Range(range)), None),
            None => (None, Some("expected `start-end` in epoch milliseconds")),
        },
    }
}

fn parse_range(raw: &str) -> Option<DateRange> {
    let (start, end) = raw.split_once('-')?;
    let start = parse_millis(start)?;
    let end = parse_millis(end)?;
    Some(DateRange::new(start, end))
}

fn parse_millis(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<i64>().ok()
}

/// Canonical spelling of `value` for a field of `kind`, or `None` when the
/// value does not fit the kind or is empty.
pub(crate) fn canonicalize(kind: &FieldKind, value: FilterValue) -> Option<FilterValue> {
    match (kind, value) {
        (FieldKind::Text, FilterValue::Single(text)) => {
            let text = text.trim();
            (!text.is_empty()).then(|| FilterValue::Single(text.to_string()))
        }
        (FieldKind::Enum { options }, FilterValue::Single(raw)) => {
            FieldKind::canonical_option(options, &raw).map(FilterValue::Single)
        }
        (FieldKind::EnumSet { options }, FilterValue::Single(raw)) => {
            FieldKind::canonical_option(options, &raw)
                .map(|option| FilterValue::Many(BTreeSet::from([option])))
        }
        (FieldKind::EnumSet { options }, FilterValue::Many(values)) => {
            let values: BTreeSet<String> = values
                .iter()
                .filter_map(|raw| FieldKind::canonical_option(options, raw))
                .collect();
            (!values.is_empty()).then_some(FilterValue::Many(values))
        }
        // Negative bounds have no query string spelling.
        (FieldKind::DateRange, FilterValue::Range(range)) => (range.start >= 0 && range.end >= 0)
            .then(|| FilterValue::Range(DateRange::new(range.start, range.end))),
        _ => None,
    }
}

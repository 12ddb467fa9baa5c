use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::codec::canonicalize;
use crate::schema::{FilterSchema, Sort};

/// Inclusive range of epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    pub start: i64,
    pub end: i64,
}

impl DateRange {
    /// Builds a range, swapping reversed bounds.
    pub fn new(a: i64, b: i64) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }
}

/// Typed value of one filter field. Serializes untagged for the list endpoint:
/// a string, an array of strings, or `{ "start", "end" }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Single(String),
    Many(BTreeSet<String>),
    Range(DateRange),
}

impl FilterValue {
    pub fn single(value: impl Into<String>) -> Self {
        FilterValue::Single(value.into())
    }

    pub fn many<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterValue::Many(values.into_iter().map(Into::into).collect())
    }

    pub fn range(start: i64, end: i64) -> Self {
        FilterValue::Range(DateRange::new(start, end))
    }
}

/// Complete table filter, sort and page size.
///
/// Only explicit, non-default filter values are stored; `effective_filters`
/// resolves schema defaults. Instances are replaced, never edited in place by
/// the loader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterState {
    filters: BTreeMap<String, FilterValue>,
    sort: Sort,
    page_size: u32,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::defaults(&FilterSchema::default())
    }
}

impl FilterState {
    /// The state an empty query string parses to.
    pub fn defaults(schema: &FilterSchema) -> Self {
        Self {
            filters: BTreeMap::new(),
            sort: schema.default_sort().clone(),
            page_size: schema.page_size().default,
        }
    }

    pub fn with_filter(mut self, name: impl Into<String>, value: FilterValue) -> Self {
        self.filters.insert(name.into(), value);
        self
    }

    pub fn without_filter(mut self, name: &str) -> Self {
        self.filters.remove(name);
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn filter(&self, name: &str) -> Option<&FilterValue> {
        self.filters.get(name)
    }

    pub fn filters(&self) -> &BTreeMap<String, FilterValue> {
        &self.filters
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub(crate) fn set_filter(&mut self, name: &str, value: Option<FilterValue>) {
        match value {
            Some(value) => {
                self.filters.insert(name.to_string(), value);
            }
            None => {
                self.filters.remove(name);
            }
        }
    }

    pub(crate) fn set_sort(&mut self, sort: Sort) {
        self.sort = sort;
    }

    pub(crate) fn set_page_size(&mut self, page_size: u32) {
        self.page_size = page_size;
    }

    /// Canonical form under `schema`: unknown fields and default-valued
    /// filters are dropped, values canonicalized, sort and page size validated.
    pub fn normalize(&self, schema: &FilterSchema) -> Self {
        let mut filters = BTreeMap::new();
        for (name, value) in &self.filters {
            let Some(spec) = schema.field(name) else {
                continue;
            };
            let Some(canonical) = canonicalize(&spec.kind, value.clone()) else {
                continue;
            };
            if spec.default.as_ref() == Some(&canonical) {
                continue;
            }
            filters.insert(name.clone(), canonical);
        }

        let sort = if schema.is_sortable(&self.sort.field) {
            self.sort.clone()
        } else {
            schema.default_sort().clone()
        };

        Self {
            filters,
            sort,
            page_size: schema.page_size().clamp(self.page_size),
        }
    }

    /// Explicit values layered over the schema's non-empty defaults.
    pub fn effective_filters(&self, schema: &FilterSchema) -> BTreeMap<String, FilterValue> {
        let normalized = self.normalize(schema);
        let mut effective = BTreeMap::new();
        for spec in schema.fields() {
            if let Some(value) = normalized.filters.get(&spec.name).or(spec.default.as_ref()) {
                effective.insert(spec.name.clone(), value.clone());
            }
        }
        effective
    }
}

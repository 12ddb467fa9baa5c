use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::canonicalize;
use crate::filter::FilterValue;

/// Query parameter carrying the sort as `field.direction`.
pub const SORT_PARAM: &str = "sort";
/// Query parameter carrying the page size.
pub const SIZE_PARAM: &str = "size";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("asc") {
            Some(SortDirection::Asc)
        } else if raw.eq_ignore_ascii_case("desc") {
            Some(SortDirection::Desc)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.field, self.direction.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortParseError {
    #[error("sort is empty")]
    Empty,
    #[error("unknown sort direction `{0}`")]
    Direction(String),
}

/// Parses `field.asc` / `field.desc`. A bare `field` sorts descending.
impl FromStr for Sort {
    type Err = SortParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SortParseError::Empty);
        }
        match raw.rsplit_once('.') {
            Some((field, direction)) if !field.is_empty() => {
                let direction = SortDirection::parse(direction)
                    .ok_or_else(|| SortParseError::Direction(direction.to_string()))?;
                Ok(Sort::new(field, direction))
            }
            Some(_) => Err(SortParseError::Empty),
            None => Ok(Sort::desc(raw)),
        }
    }
}

/// How a filter field is represented in the query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Free text, trimmed. Empty means absent.
    Text,
    /// One value out of `options`, matched case-insensitively.
    Enum { options: Vec<String> },
    /// Comma-separated subset of `options`.
    EnumSet { options: Vec<String> },
    /// `start-end` in epoch milliseconds.
    DateRange,
}

impl FieldKind {
    pub(crate) fn canonical_option(options: &[String], raw: &str) -> Option<String> {
        let raw = raw.trim();
        options
            .iter()
            .find(|option| option.eq_ignore_ascii_case(raw))
            .cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Value implied when the parameter is absent. `None` means unfiltered.
    pub default: Option<FilterValue>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn enumeration<I, S>(name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            FieldKind::Enum {
                options: options.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn enum_set<I, S>(name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            FieldKind::EnumSet {
                options: options.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn date_range(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::DateRange)
    }

    pub fn with_default(mut self, value: FilterValue) -> Self {
        self.default = Some(value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizeLimits {
    pub default: u32,
    pub min: u32,
    pub max: u32,
}

impl Default for PageSizeLimits {
    fn default() -> Self {
        Self {
            default: 50,
            min: 1,
            max: 200,
        }
    }
}

impl PageSizeLimits {
    pub fn clamp(&self, size: u32) -> u32 {
        size.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("field name `{0}` is reserved")]
    ReservedName(String),
    #[error("field `{0}` is declared twice")]
    DuplicateField(String),
    #[error("field name must not be empty")]
    EmptyName,
    #[error("field `{0}` has no options")]
    NoOptions(String),
    #[error("option {option:?} of field `{field}` has no unambiguous query string spelling")]
    InvalidOption { field: String, option: String },
    #[error("default for field `{0}` does not fit its kind")]
    InvalidDefault(String),
    #[error("invalid page size limits: min {min}, default {default}, max {max}")]
    PageSize { min: u32, default: u32, max: u32 },
}

/// Declares the filterable fields, sortable columns and page size bounds of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSchema {
    fields: Vec<FieldSpec>,
    sortable: Vec<String>,
    default_sort: Sort,
    page_size: PageSizeLimits,
}

impl Default for FilterSchema {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            sortable: vec!["timestamp".to_string()],
            default_sort: Sort::desc("timestamp"),
            page_size: PageSizeLimits::default(),
        }
    }
}

impl FilterSchema {
    pub fn builder() -> FilterSchemaBuilder {
        FilterSchemaBuilder::default()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn is_sortable(&self, field: &str) -> bool {
        self.sortable.iter().any(|name| name == field)
    }

    pub fn sortable(&self) -> &[String] {
        &self.sortable
    }

    pub fn default_sort(&self) -> &Sort {
        &self.default_sort
    }

    pub fn page_size(&self) -> &PageSizeLimits {
        &self.page_size
    }
}

#[derive(Debug, Clone)]
pub struct FilterSchemaBuilder {
    fields: Vec<FieldSpec>,
    sortable: Vec<String>,
    default_sort: Sort,
    page_size: PageSizeLimits,
}

impl Default for FilterSchemaBuilder {
    fn default() -> Self {
        let schema = FilterSchema::default();
        Self {
            fields: schema.fields,
            sortable: Vec::new(),
            default_sort: schema.default_sort,
            page_size: schema.page_size,
        }
    }
}

impl FilterSchemaBuilder {
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn sortable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sortable.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn default_sort(mut self, sort: Sort) -> Self {
        self.default_sort = sort;
        self
    }

    pub fn page_size(mut self, limits: PageSizeLimits) -> Self {
        self.page_size = limits;
        self
    }

    pub fn build(self) -> Result<FilterSchema, SchemaError> {
        let PageSizeLimits { default, min, max } = self.page_size;
        if min == 0 || min > default || default > max {
            return Err(SchemaError::PageSize { min, default, max });
        }

        let mut fields: Vec<FieldSpec> = Vec::with_capacity(self.fields.len());
        for mut spec in self.fields {
            if spec.name.trim().is_empty() {
                return Err(SchemaError::EmptyName);
            }
            if spec.name == SORT_PARAM || spec.name == SIZE_PARAM {
                return Err(SchemaError::ReservedName(spec.name));
            }
            if fields.iter().any(|existing| existing.name == spec.name) {
                return Err(SchemaError::DuplicateField(spec.name));
            }
            match &spec.kind {
                FieldKind::Enum { options } | FieldKind::EnumSet { options }
                    if options.is_empty() =>
                {
                    return Err(SchemaError::NoOptions(spec.name));
                }
                FieldKind::Enum { options } => check_options(&spec.name, options, false)?,
                FieldKind::EnumSet { options } => check_options(&spec.name, options, true)?,
                _ => {}
            }
            // Defaults are stored canonically so equality checks against parsed values hold.
            if let Some(default) = spec.default.take() {
                match canonicalize(&spec.kind, default) {
                    Some(canonical) => spec.default = Some(canonical),
                    None => return Err(SchemaError::InvalidDefault(spec.name)),
                }
            }
            fields.push(spec);
        }

        let mut sortable = Vec::with_capacity(self.sortable.len() + 1);
        for name in self.sortable {
            if !sortable.contains(&name) {
                sortable.push(name);
            }
        }
        if !sortable.contains(&self.default_sort.field) {
            sortable.push(self.default_sort.field.clone());
        }

        Ok(FilterSchema {
            fields,
            sortable,
            default_sort: self.default_sort,
            page_size: self.page_size,
        })
    }
}

/// Options must survive `encode_field_value` and `decode` unchanged: values
/// are trimmed and matched case-insensitively, and set members are split on `,`.
fn check_options(field: &str, options: &[String], is_set: bool) -> Result<(), SchemaError> {
    for (index, option) in options.iter().enumerate() {
        let clashes = options[..index]
            .iter()
            .any(|earlier| earlier.eq_ignore_ascii_case(option));
        if option.is_empty() || option.trim() != option || (is_set && option.contains(',')) || clashes
        {
            return Err(SchemaError::InvalidOption {
                field: field.to_string(),
                option: option.clone(),
            });
        }
    }
    Ok(())
}

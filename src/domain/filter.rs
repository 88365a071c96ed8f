//! Row filters: SQL rendering and the compact `column:op:value` URL token form.

use crate::domain::value::{quote_ident, quote_text};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "ILIKE")]
    ILike,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "IS NULL")]
    IsNull,
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 11] = [
        FilterOperator::Eq,
        FilterOperator::Neq,
        FilterOperator::Gt,
        FilterOperator::Lt,
        FilterOperator::Gte,
        FilterOperator::Lte,
        FilterOperator::Like,
        FilterOperator::ILike,
        FilterOperator::In,
        FilterOperator::IsNull,
        FilterOperator::IsNotNull,
    ];

    pub fn sql(self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Neq => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Lt => "<",
            FilterOperator::Gte => ">=",
            FilterOperator::Lte => "<=",
            FilterOperator::Like => "LIKE",
            FilterOperator::ILike => "ILIKE",
            FilterOperator::In => "IN",
            FilterOperator::IsNull => "IS NULL",
            FilterOperator::IsNotNull => "IS NOT NULL",
        }
    }

    /// Token abbreviation. The table is fixed: tokens already in URLs depend on it.
    pub fn abbrev(self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Lt => "lt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lte => "lte",
            FilterOperator::Like => "like",
            FilterOperator::ILike => "ilike",
            FilterOperator::In => "in",
            FilterOperator::IsNull => "null",
            FilterOperator::IsNotNull => "notnull",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FilterOperator::Eq => "equals",
            FilterOperator::Neq => "not equal",
            FilterOperator::Gt => "greater than",
            FilterOperator::Lt => "less than",
            FilterOperator::Gte => "greater than or equal",
            FilterOperator::Lte => "less than or equal",
            FilterOperator::Like => "like",
            FilterOperator::ILike => "ilike (case insensitive)",
            FilterOperator::In => "in list",
            FilterOperator::IsNull => "is null",
            FilterOperator::IsNotNull => "is not null",
        }
    }

    pub fn from_abbrev(abbrev: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.abbrev() == abbrev)
    }

    /// Unknown operator text falls back to `=`.
    pub fn from_sql(op: &str) -> Self {
        let op = op.trim();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.sql().eq_ignore_ascii_case(op))
            .unwrap_or(FilterOperator::Eq)
    }

    pub fn takes_value(self) -> bool {
        !matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct Filter {
    pub column: String,
    pub operator: FilterOperator,
    /// Always text; `IN` lists are comma separated. Empty for the null checks.
    #[serde(default)]
    pub value: String,
}

impl Filter {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        let value = if operator.takes_value() {
            value.into()
        } else {
            String::new()
        };
        Self {
            column: column.into(),
            operator,
            value,
        }
    }

    /// SQL predicate for this filter.
    pub fn to_sql(&self) -> String {
        let column = quote_ident(&self.column);
        match self.operator {
            FilterOperator::IsNull | FilterOperator::IsNotNull => {
                format!("{} {}", column, self.operator.sql())
            }
            FilterOperator::In => {
                let items: Vec<String> = self
                    .value
                    .split(',')
                    .map(|part| quote_text(part.trim()))
                    .collect();
                format!("{} IN ({})", column, items.join(", "))
            }
            op => format!("{} {} {}", column, op.sql(), quote_text(&self.value)),
        }
    }

    /// `column:op:value`. The null checks never carry a value, whatever the struct holds.
    pub fn to_token(&self) -> String {
        let value = if self.operator.takes_value() {
            self.value.as_str()
        } else {
            ""
        };
        format!("{}:{}:{}", self.column, self.operator.abbrev(), value)
    }

    /// Parses `column:abbrev:value`. Only the first two colons separate fields.
    pub fn from_token(token: &str) -> Option<Self> {
        let mut parts = token.splitn(3, ':');
        let column = parts.next().filter(|c| !c.is_empty())?;
        let operator = parts.next().and_then(FilterOperator::from_abbrev)?;
        let value = parts.next().unwrap_or("");
        Some(Filter::new(column, operator, value))
    }
}

/// `WHERE`-less predicate list joined with AND; empty string when there are no filters.
pub fn build_where_clause(filters: &[Filter]) -> String {
    filters
        .iter()
        .map(Filter::to_sql)
        .collect::<Vec<_>>()
        .join(" AND ")
}

pub fn to_tokens(filters: &[Filter]) -> Vec<String> {
    filters.iter().map(Filter::to_token).collect()
}

/// Inverse of [`to_tokens`]. Malformed tokens are dropped, never fatal.
pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Vec<Filter> {
    tokens
        .iter()
        .filter_map(|t| {
            let parsed = Filter::from_token(t.as_ref());
            if parsed.is_none() {
                tracing::debug!(token = t.as_ref(), "dropping malformed filter token");
            }
            parsed
        })
        .collect()
}

/// Ordered, index-addressed filter list, mirroring the repeated `filter=` URL parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Self {
        Self::new(from_tokens(tokens))
    }

    pub fn to_tokens(&self) -> Vec<String> {
        to_tokens(&self.filters)
    }

    pub fn as_slice(&self) -> &[Filter] {
        &self.filters
    }

    pub fn into_vec(self) -> Vec<Filter> {
        self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn has_filters(&self) -> bool {
        !self.is_empty()
    }

    pub fn add(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    /// Returns false when `index` is out of range.
    pub fn remove(&mut self, index: usize) -> bool {
        if index < self.filters.len() {
            self.filters.remove(index);
            true
        } else {
            false
        }
    }

    /// Returns false when `index` is out of range.
    pub fn update(&mut self, index: usize, filter: Filter) -> bool {
        match self.filters.get_mut(index) {
            Some(slot) => {
                *slot = filter;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }
}

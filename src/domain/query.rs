//! SQL statement builders for the table editor.
//!
//! All builders are pure: they take a table snapshot plus caller state and return SQL text.
//! Execution is the caller's business.

use crate::domain::filter::{build_where_clause, Filter};
use crate::domain::metadata::Table;
use crate::domain::value::{encode_for_set, encode_literal, quote_ident, SqlValue, ValueMap};
use crate::error::{EditorError, EditorResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Case-insensitive; anything unrecognized sorts ascending.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Page, sort and filter state for one read. Only constructed through the clamping constructors.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct QueryOptions {
    page: u32,
    page_size: u32,
    pub sort_column: Option<String>,
    pub sort_direction: SortDirection,
    pub filters: Vec<Filter>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

impl QueryOptions {
    /// Clamps `page` to at least 1 and `page_size` into `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            sort_column: None,
            sort_direction: SortDirection::Asc,
            filters: Vec::new(),
        }
    }

    /// Builds options from untrusted text (query-string values). Non-numeric or non-positive
    /// input falls back to page 1 / `default_page_size`.
    pub fn from_raw(page: Option<&str>, page_size: Option<&str>, default_page_size: u32) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let page_size = page_size
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(default_page_size);
        Self::new(page, page_size)
    }

    pub fn with_sort(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_column = Some(column.into());
        self.sort_direction = direction;
        self
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Replacing the filters always goes back to the first page.
    pub fn set_filters(&mut self, filters: Vec<Filter>) {
        self.filters = filters;
        self.page = 1;
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

fn from_where(table: &Table, filters: &[Filter]) -> String {
    let mut sql = format!("FROM {}", table.qualified_name());
    let predicates = build_where_clause(filters);
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates);
    }
    sql
}

/// `SELECT * FROM ... [WHERE ...] [ORDER BY ...] LIMIT n OFFSET m`
pub fn build_select(table: &Table, options: &QueryOptions) -> String {
    let mut sql = format!("SELECT * {}", from_where(table, &options.filters));
    if let Some(column) = options.sort_column.as_deref().filter(|c| !c.is_empty()) {
        sql.push_str(&format!(
            " ORDER BY {} {}",
            quote_ident(column),
            options.sort_direction.sql()
        ));
    }
    sql.push_str(&format!(
        " LIMIT {} OFFSET {}",
        options.page_size(),
        options.offset()
    ));
    sql
}

pub fn build_count(table: &Table, filters: &[Filter]) -> String {
    format!("SELECT COUNT(*) AS count {}", from_where(table, filters))
}

/// Column list follows the iteration order of `values`, one-to-one with the VALUES list.
pub fn build_insert(table: &Table, values: &ValueMap) -> String {
    if values.is_empty() {
        return format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING *",
            table.qualified_name()
        );
    }
    let mut columns = Vec::with_capacity(values.len());
    let mut literals = Vec::with_capacity(values.len());
    for (column, value) in values.iter() {
        let hint = table.column(column).map(|c| c.format.as_str());
        columns.push(quote_ident(column));
        literals.push(encode_literal(value, hint));
    }
    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        table.qualified_name(),
        columns.join(", "),
        literals.join(", ")
    )
}

fn require_primary_key(table: &Table) -> EditorResult<&str> {
    table
        .primary_key()
        .ok_or_else(|| EditorError::MissingPrimaryKey {
            schema: table.schema.clone(),
            table: table.name.clone(),
        })
}

pub fn build_update(table: &Table, row_id: &SqlValue, updates: &ValueMap) -> EditorResult<String> {
    let primary_key = require_primary_key(table)?;
    if updates.is_empty() {
        return Err(EditorError::EmptyUpdate);
    }
    let assignments: Vec<String> = updates
        .iter()
        .map(|(column, value)| format!("{} = {}", quote_ident(column), encode_for_set(value)))
        .collect();
    Ok(format!(
        "UPDATE {} SET {} WHERE {} = {}",
        table.qualified_name(),
        assignments.join(", "),
        quote_ident(primary_key),
        encode_literal(row_id, None)
    ))
}

/// Outcome of [`build_delete`]: either a statement, or nothing to send at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteStatement {
    Sql(String),
    Nothing,
}

pub fn build_delete(table: &Table, ids: &[SqlValue]) -> EditorResult<DeleteStatement> {
    let primary_key = require_primary_key(table)?;
    if ids.is_empty() {
        return Ok(DeleteStatement::Nothing);
    }
    let pk = quote_ident(primary_key);
    let predicates: Vec<String> = ids
        .iter()
        .map(|id| format!("{} = {}", pk, encode_literal(id, None)))
        .collect();
    Ok(DeleteStatement::Sql(format!(
        "DELETE FROM {} WHERE {}",
        table.qualified_name(),
        predicates.join(" OR ")
    )))
}

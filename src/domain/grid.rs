//! Column metadata -> grid column descriptors, and cell formatting per column class.

use crate::domain::metadata::Column;
use crate::domain::value::Row;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

/// Cells longer than this are cut and carry the full value as a title.
pub const TRUNCATE_AT: usize = 100;

const NUMERIC_FORMATS: &[&str] = &[
    "int2",
    "int4",
    "int8",
    "float4",
    "float8",
    "numeric",
    "decimal",
    "smallint",
    "integer",
    "bigint",
    "real",
    "double precision",
];
const BOOLEAN_FORMATS: &[&str] = &["bool", "boolean"];
const DATE_FORMATS: &[&str] = &["date", "timestamp", "timestamptz", "time", "timetz"];
const JSON_FORMATS: &[&str] = &["json", "jsonb"];

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ColumnClass {
    Numeric,
    Boolean,
    Date,
    Json,
    Text,
}

impl ColumnClass {
    pub fn classify(format: &str) -> Self {
        if NUMERIC_FORMATS.contains(&format) {
            ColumnClass::Numeric
        } else if BOOLEAN_FORMATS.contains(&format) {
            ColumnClass::Boolean
        } else if DATE_FORMATS.contains(&format) {
            ColumnClass::Date
        } else if JSON_FORMATS.contains(&format) {
            ColumnClass::Json
        } else {
            ColumnClass::Text
        }
    }

    pub fn default_width(self) -> u32 {
        match self {
            ColumnClass::Boolean => 100,
            ColumnClass::Numeric => 120,
            ColumnClass::Date | ColumnClass::Json | ColumnClass::Text => 200,
        }
    }
}

/// Visual treatment hint for a rendered cell.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CellTag {
    Null,
    Missing,
    Json,
    BoolTrue,
    BoolFalse,
    Numeric,
    Date,
    Text,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct CellDisplay {
    pub text: String,
    /// Full value when `text` was truncated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub tag: CellTag,
}

impl CellDisplay {
    fn plain(text: impl Into<String>, tag: CellTag) -> Self {
        Self {
            text: text.into(),
            title: None,
            tag,
        }
    }

    fn truncated(full: String, tag: CellTag) -> Self {
        if full.chars().count() > TRUNCATE_AT {
            let head: String = full.chars().take(TRUNCATE_AT).collect();
            Self {
                text: format!("{}...", head),
                title: Some(full),
                tag,
            }
        } else {
            Self::plain(full, tag)
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct PresentationColumn {
    pub key: String,
    pub name: String,
    pub class: ColumnClass,
    pub width: u32,
    pub resizable: bool,
    pub sortable: bool,
    /// Identity columns are pinned at the left edge.
    pub frozen: bool,
}

impl PresentationColumn {
    pub fn from_column(column: &Column) -> Self {
        let class = ColumnClass::classify(&column.format);
        Self {
            key: column.name.clone(),
            name: column.name.clone(),
            class,
            width: class.default_width(),
            resizable: true,
            sortable: true,
            frozen: column.is_identity,
        }
    }

    /// Renders this column's cell for `row`.
    pub fn format(&self, row: &Row) -> CellDisplay {
        format_cell(self.class, row.get(&self.key))
    }
}

/// Identity columns first, then the rest by name.
pub fn to_presentation_columns(columns: &[Column]) -> Vec<PresentationColumn> {
    let mut sorted: Vec<&Column> = columns.iter().collect();
    sorted.sort_by(|a, b| {
        b.is_identity
            .cmp(&a.is_identity)
            .then_with(|| a.name.cmp(&b.name))
    });
    sorted.into_iter().map(PresentationColumn::from_column).collect()
}

/// `None` is a column absent from the row, distinct from SQL NULL.
pub fn format_cell(class: ColumnClass, value: Option<&JsonValue>) -> CellDisplay {
    let value = match value {
        None => return CellDisplay::plain("-", CellTag::Missing),
        Some(JsonValue::Null) => return CellDisplay::plain("NULL", CellTag::Null),
        Some(v) => v,
    };

    if value.is_object() || value.is_array() {
        return CellDisplay::truncated(value.to_string(), CellTag::Json);
    }

    match class {
        ColumnClass::Boolean => match truthy(value) {
            Some(true) => CellDisplay::plain("true", CellTag::BoolTrue),
            Some(false) => CellDisplay::plain("false", CellTag::BoolFalse),
            None => CellDisplay::truncated(scalar_text(value), CellTag::Text),
        },
        ColumnClass::Date => {
            let raw = scalar_text(value);
            match parse_instant(&raw) {
                Some(dt) => CellDisplay::plain(format_locale_datetime(dt), CellTag::Date),
                None => CellDisplay::plain(raw, CellTag::Date),
            }
        }
        ColumnClass::Json => CellDisplay::truncated(scalar_text(value), CellTag::Json),
        ColumnClass::Numeric => {
            let raw = scalar_text(value);
            match group_number(&raw) {
                Some(grouped) => CellDisplay::plain(grouped, CellTag::Numeric),
                None => CellDisplay::plain(raw, CellTag::Numeric),
            }
        }
        ColumnClass::Text => CellDisplay::truncated(scalar_text(value), CellTag::Text),
    }
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truthy(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::Number(n) => Some(n.as_f64().map(|f| f != 0.0).unwrap_or(true)),
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Some(true),
            "false" | "f" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Accepts RFC 3339, Postgres text output (`2024-03-01 12:30:00+00`) and bare dates.
fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// en-US style: `3/1/2024, 12:30:00 PM`.
fn format_locale_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

/// en-US digit grouping, at most three fraction digits. `None` if `raw` is not a number.
fn group_number(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed: f64 = raw.parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if int_part.is_empty() || !all_digits(int_part) || !all_digits(frac_part) {
        // exponent notation and the like; let the float formatter deal with it
        return Some(format_float(parsed));
    }

    // Round half away from zero on the decimal text, not the parsed float.
    let mut kept: Vec<u8> = int_part.bytes().chain(frac_part.bytes().take(3)).collect();
    let scale = frac_part.len().min(3);
    if frac_part.as_bytes().get(3).is_some_and(|d| *d >= b'5') {
        let mut carry = true;
        for d in kept.iter_mut().rev() {
            if *d == b'9' {
                *d = b'0';
            } else {
                *d += 1;
                carry = false;
                break;
            }
        }
        if carry {
            kept.insert(0, b'1');
        }
    }
    let split = kept.len() - scale;
    let int_digits = String::from_utf8_lossy(&kept[..split]).into_owned();
    let mut frac = String::from_utf8_lossy(&kept[split..]).into_owned();
    while frac.ends_with('0') {
        frac.pop();
    }
    let int_digits = int_digits.trim_start_matches('0');

    let mut out = String::new();
    if negative && !(int_digits.is_empty() && frac.is_empty()) {
        out.push('-');
    }
    out.push_str(&group_int(int_digits));
    if !frac.is_empty() {
        out.push('.');
        out.push_str(&frac);
    }
    Some(out)
}

fn format_float(f: f64) -> String {
    let fixed = format!("{:.3}", f.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac = frac.trim_end_matches('0');
    let mut out = String::new();
    if f < 0.0 {
        out.push('-');
    }
    out.push_str(&group_int(int_part));
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

fn group_int(digits: &str) -> String {
    if digits.is_empty() {
        return "0".to_string();
    }
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

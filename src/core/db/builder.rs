/// Query Builder Module
///
/// Pure functions turning a table name, projection, filter and limit into
/// parameterized SQL text plus an ordered parameter list. Nothing here
/// performs I/O or holds state.
///
/// Placeholders are `%s`; every fragment is returned together with the
/// parameters it consumes, in the same order.
use crate::core::value::{Filter, FilterValue, Projection, ValueSet};
use crate::core::{Result, SqlwrapError};

/// Timestamp layout used by [`now`].
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parameterized SQL ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<FilterValue>,
}

/// Which insert flavour to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertVerb {
    Insert,
    Replace,
}

impl InsertVerb {
    fn keyword(self) -> &'static str {
        match self {
            InsertVerb::Insert => "INSERT",
            InsertVerb::Replace => "REPLACE",
        }
    }
}

/// Wraps an identifier in backticks, doubling any embedded backtick.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Date-like columns are surfaced as Unix epoch integers.
pub fn is_date_column(name: &str) -> bool {
    name.starts_with("date_") || name.ends_with("_date")
}

/// Renders the SELECT column list.
///
/// An empty projection selects `*`. When `table` is known, a bare `id`
/// column is aliased to `<table>_id`.
pub fn build_projection(projection: &Projection, table: Option<&str>) -> String {
    if projection.is_all() {
        return "*".to_string();
    }

    let columns: Vec<String> = match projection {
        Projection::All => Vec::new(),
        Projection::Columns(names) => names
            .iter()
            .map(|name| {
                if is_date_column(name) {
                    date_column(name, name)
                } else if let (Some(table), "id") = (table, name.as_str()) {
                    let base = table.rsplit('.').next().unwrap_or(table);
                    format!("{} AS {}", quote_ident(name), quote_ident(&format!("{base}_id")))
                } else {
                    quote_ident(name)
                }
            })
            .collect(),
        Projection::Aliased(aliases) => aliases
            .iter()
            .map(|(name, alias)| {
                if is_date_column(name) {
                    date_column(name, alias)
                } else {
                    format!("{} AS {}", quote_ident(name), quote_ident(alias))
                }
            })
            .collect(),
    };

    columns.join(", ")
}

fn date_column(name: &str, alias: &str) -> String {
    format!("UNIX_TIMESTAMP({}) AS {}", quote_ident(name), quote_ident(alias))
}

/// Renders one predicate per entry and collects the matching parameters.
///
/// Scalars become `` `col`=%s ``; sets become `` `col` IN %s ``. Both output
/// vectors follow the iteration order of `map`.
pub fn build_value_assignments(map: &Filter) -> (Vec<String>, Vec<FilterValue>) {
    let mut fragments = Vec::with_capacity(map.len());
    let mut params = Vec::with_capacity(map.len());

    for (column, value) in map {
        let fragment = match value {
            FilterValue::Scalar(_) => format!("{}=%s", quote_ident(column)),
            FilterValue::Set(_) => format!("{} IN %s", quote_ident(column)),
        };
        fragments.push(fragment);
        params.push(value.clone());
    }

    (fragments, params)
}

/// Renders `` `a`=%s, `b`=%s `` for an UPDATE. Empty input renders nothing.
pub fn build_set_clause(values: &ValueSet) -> (String, Vec<FilterValue>) {
    if values.is_empty() {
        return (String::new(), Vec::new());
    }
    let scalars: Filter = values
        .iter()
        .map(|(k, v)| (k.clone(), FilterValue::Scalar(v.clone())))
        .collect();
    let (fragments, params) = build_value_assignments(&scalars);
    (fragments.join(", "), params)
}

/// Renders `WHERE ... AND ...`. An absent or empty filter matches every row
/// and renders nothing.
pub fn build_where_clause(filter: Option<&Filter>) -> (String, Vec<FilterValue>) {
    match filter {
        Some(filter) if !filter.is_empty() => {
            let (fragments, params) = build_value_assignments(filter);
            (format!("WHERE {}", fragments.join(" AND ")), params)
        }
        _ => (String::new(), Vec::new()),
    }
}

/// `0` means unlimited.
pub fn build_limit_clause(limit: u64) -> String {
    if limit == 0 {
        String::new()
    } else {
        format!("LIMIT {limit}")
    }
}

/// Current local time as `YYYY-MM-DD HH:MM:SS`.
pub fn now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Checks a plain or `schema.table` name and returns it quoted.
///
/// Anything that can sit between backticks is accepted; backticks, NUL and
/// empty segments are not.
pub fn validate_table(table: &str) -> Result<String> {
    if table.is_empty() {
        return Err(SqlwrapError::Validation("table name must be given".to_string()));
    }
    let segments: Vec<&str> = table.split('.').collect();
    let malformed = segments.len() > 2
        || segments.iter().any(|s| s.is_empty())
        || table.contains(|c: char| c == '`' || c == '\0');
    if malformed {
        return Err(SqlwrapError::Validation(format!("invalid table name '{table}'")));
    }
    Ok(segments.into_iter().map(quote_ident).collect::<Vec<_>>().join("."))
}

fn assemble(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `SELECT <projection> FROM <table> [WHERE ...] [LIMIT n]`
pub fn select_statement(
    table: &str,
    filter: &Filter,
    projection: &Projection,
    limit: u64,
) -> Result<Statement> {
    let quoted = validate_table(table)?;
    let columns = build_projection(projection, Some(table));
    let (where_sql, params) = build_where_clause(Some(filter));
    let limit_sql = build_limit_clause(limit);

    let from = format!("SELECT {columns} FROM {quoted}");
    Ok(Statement {
        sql: assemble(&[&from, &where_sql, &limit_sql]),
        params,
    })
}

/// `INSERT|REPLACE INTO <table> (<cols>) VALUES (%s, ...)`
pub fn insert_statement(verb: InsertVerb, table: &str, values: &ValueSet) -> Result<Statement> {
    let quoted = validate_table(table)?;
    if values.is_empty() {
        return Err(SqlwrapError::Validation(format!(
            "{} into '{table}' needs at least one value",
            verb.keyword()
        )));
    }

    let columns: Vec<String> = values.keys().map(|c| quote_ident(c)).collect();
    let placeholders = vec!["%s"; values.len()].join(", ");
    let params = values.values().cloned().map(FilterValue::Scalar).collect();

    Ok(Statement {
        sql: format!(
            "{} INTO {quoted} ({}) VALUES ({placeholders})",
            verb.keyword(),
            columns.join(", ")
        ),
        params,
    })
}

/// `UPDATE <table> SET ... [WHERE ...] [LIMIT n]`; SET parameters come first.
pub fn update_statement(
    table: &str,
    values: &ValueSet,
    filter: &Filter,
    limit: u64,
) -> Result<Statement> {
    let quoted = validate_table(table)?;
    if values.is_empty() {
        return Err(SqlwrapError::Validation(format!(
            "UPDATE of '{table}' needs at least one value"
        )));
    }

    let (set_sql, mut params) = build_set_clause(values);
    let (where_sql, where_params) = build_where_clause(Some(filter));
    params.extend(where_params);
    let limit_sql = build_limit_clause(limit);

    let head = format!("UPDATE {quoted} SET {set_sql}");
    Ok(Statement {
        sql: assemble(&[&head, &where_sql, &limit_sql]),
        params,
    })
}

/// `DELETE FROM <table> [WHERE ...] [LIMIT n]`
pub fn delete_statement(table: &str, filter: &Filter, limit: u64) -> Result<Statement> {
    let quoted = validate_table(table)?;
    let (where_sql, params) = build_where_clause(Some(filter));
    let limit_sql = build_limit_clause(limit);

    let head = format!("DELETE FROM {quoted}");
    Ok(Statement {
        sql: assemble(&[&head, &where_sql, &limit_sql]),
        params,
    })
}

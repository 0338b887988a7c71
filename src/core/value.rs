/// Value Module
///
/// Scalar values, filter values, rows and result sets exchanged between the
/// connection manager, the query builder and the driver.
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// A single scalar SQL value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns `true` for SQL `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the value as a signed integer when it holds one that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Returns the value as text when it holds text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(u64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// The right-hand side of a filter predicate.
///
/// `Scalar` renders as `` `col`=%s ``, `Set` as `` `col` IN %s ``. The driver
/// expands a `Set` parameter into a parenthesised list.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Scalar(Value),
    Set(Vec<Value>),
}

impl FilterValue {
    /// Builds a set-membership value from any collection of scalars.
    pub fn set<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        FilterValue::Set(values.into_iter().map(Into::into).collect())
    }

    pub fn is_set(&self) -> bool {
        matches!(self, FilterValue::Set(_))
    }
}

macro_rules! scalar_filter_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for FilterValue {
                fn from(v: $t) -> Self {
                    FilterValue::Scalar(v.into())
                }
            }
        )*
    };
}

scalar_filter_from!(Value, i32, i64, u32, u64, f64, bool, &str, String);

/// Column name to filter value, conjoined with `AND`. Iteration order is
/// insertion order.
pub type Filter = IndexMap<String, FilterValue>;

/// Column name to value payload for `INSERT`/`REPLACE`/`UPDATE`.
pub type ValueSet = IndexMap<String, Value>;

/// Builds a [`Filter`] from `(column, value)` pairs.
pub fn filter<K, V, I>(pairs: I) -> Filter
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<FilterValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Builds a [`ValueSet`] from `(column, value)` pairs.
pub fn value_set<K, V, I>(pairs: I) -> ValueSet
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// The SELECT column list.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Projection {
    /// `*`
    #[default]
    All,
    /// Column names in output order
    Columns(Vec<String>),
    /// Column name to output alias
    Aliased(IndexMap<String, String>),
}

impl Projection {
    pub fn columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Columns(names.into_iter().map(Into::into).collect())
    }

    pub fn aliased<I, K, A>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, A)>,
        K: Into<String>,
        A: Into<String>,
    {
        Projection::Aliased(
            pairs
                .into_iter()
                .map(|(k, a)| (k.into(), a.into()))
                .collect(),
        )
    }

    /// Returns `true` when the projection selects every column.
    pub fn is_all(&self) -> bool {
        match self {
            Projection::All => true,
            Projection::Columns(c) => c.is_empty(),
            Projection::Aliased(a) => a.is_empty(),
        }
    }
}

/// One result row.
///
/// Rows produced with `dict_cursor` enabled carry their column names and can
/// be read by name; positional rows only support index access.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Option<Arc<[String]>>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a named row. `columns` is shared by all rows of a result set.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Row {
            columns: Some(columns),
            values,
        }
    }

    /// Creates a positional row without column names.
    pub fn positional(values: Vec<Value>) -> Self {
        Row {
            columns: None,
            values,
        }
    }

    /// Looks a value up by column name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        let idx = self.columns.as_ref()?.iter().position(|c| c == column)?;
        self.values.get(idx)
    }

    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drops the column names, keeping only the values.
    pub fn into_positional(self) -> Self {
        Row::positional(self.values)
    }

    /// Converts a named row into an ordered name to value map.
    ///
    /// Positional rows yield an empty map.
    pub fn to_map(&self) -> IndexMap<String, Value> {
        match &self.columns {
            Some(cols) => cols
                .iter()
                .cloned()
                .zip(self.values.iter().cloned())
                .collect(),
            None => IndexMap::new(),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.columns {
            Some(cols) => {
                let mut map = serializer.serialize_map(Some(self.values.len()))?;
                for (name, value) in cols.iter().zip(&self.values) {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            None => {
                let mut seq = serializer.serialize_seq(Some(self.values.len()))?;
                for value in &self.values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
        }
    }
}

/// Outcome of a statement: the driver-reported row count and any fetched rows.
///
/// `rows` is empty, never absent, when nothing matched.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueryResult {
    pub row_count: u64,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn new(row_count: u64, rows: Vec<Row>) -> Self {
        QueryResult { row_count, rows }
    }

    /// The `(0, [])` result.
    pub fn empty() -> Self {
        QueryResult::default()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0 && self.rows.is_empty()
    }
}

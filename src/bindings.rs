//! Where variables get their values from.

use crate::value::Value;
use nalgebra::DVector as Vector;
use smol_str::SmolStr;
use std::{
    borrow::Borrow,
    collections::{BTreeMap, HashMap},
    hash::{BuildHasher, Hash},
};

/// A lookup from variable name to value, consulted when evaluating a
/// [`crate::Node::Variable`].
pub trait Bindings {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl<B: Bindings + ?Sized> Bindings for &B {
    fn lookup(&self, name: &str) -> Option<&Value> { (**self).lookup(name) }
}

/// No variables at all.
impl Bindings for () {
    fn lookup(&self, _name: &str) -> Option<&Value> { None }
}

impl<K, S> Bindings for HashMap<K, Value, S>
where
    K: Borrow<str> + Hash + Eq,
    S: BuildHasher,
{
    fn lookup(&self, name: &str) -> Option<&Value> { self.get(name) }
}

impl<K> Bindings for BTreeMap<K, Value>
where
    K: Borrow<str> + Ord,
{
    fn lookup(&self, name: &str) -> Option<&Value> { self.get(name) }
}

/// A set of named columns which all have the same number of rows.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Table {
    rows: Option<usize>,
    columns: BTreeMap<SmolStr, Value>,
}

impl Table {
    pub fn new() -> Self { Table::default() }

    /// Add a column, replacing any existing column with the same name.
    pub fn with_column<N, V>(
        mut self,
        name: N,
        values: V,
    ) -> Result<Self, ColumnLengthMismatch>
    where
        N: Into<SmolStr>,
        V: Into<Vector<f64>>,
    {
        self.push_column(name, values)?;
        Ok(self)
    }

    pub fn push_column<N, V>(
        &mut self,
        name: N,
        values: V,
    ) -> Result<(), ColumnLengthMismatch>
    where
        N: Into<SmolStr>,
        V: Into<Vector<f64>>,
    {
        let name = name.into();
        let values = values.into();

        match self.rows {
            Some(rows) if rows != values.len() => {
                return Err(ColumnLengthMismatch {
                    name,
                    expected: rows,
                    found: values.len(),
                });
            },
            _ => self.rows = Some(values.len()),
        }

        self.columns.insert(name, Value::Series(values));
        Ok(())
    }

    /// The number of rows, or `None` if there are no columns yet.
    pub fn rows(&self) -> Option<usize> { self.rows }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.keys().map(|name| name.as_str())
    }
}

impl Bindings for Table {
    fn lookup(&self, name: &str) -> Option<&Value> { self.columns.get(name) }
}

/// A column didn't have the same number of rows as the rest of its
/// [`Table`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("column \"{name}\" has {found} rows, but the table has {expected}")]
pub struct ColumnLengthMismatch {
    pub name: SmolStr,
    pub expected: usize,
    pub found: usize,
}

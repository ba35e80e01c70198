//! In-memory table catalogue that interprets schema changes.
//!
//! Constraint semantics follow PostgreSQL: unique indexes ignore rows outside
//! their predicate and tuples containing `NULL`, and dropping a column drops
//! the indexes and checks that read it.

use crate::schema_migration::domain::{
    CheckConstraint, ColumnDefinition, IndexDefinition, Literal, RowPredicate, SchemaChange,
    TableDefinition,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// A stored row keyed by column name.
pub type Row = BTreeMap<String, Value>;

/// Errors raised while interpreting changes or writing rows.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogueError {
    /// The table does not exist.
    #[error("table '{0}' does not exist")]
    UnknownTable(String),
    /// The table already exists.
    #[error("table '{0}' already exists")]
    TableExists(String),
    /// The column does not exist.
    #[error("column '{column}' of table '{table}' does not exist")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// The column already exists.
    #[error("column '{column}' of table '{table}' already exists")]
    ColumnExists {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// The index does not exist.
    #[error("index '{0}' does not exist")]
    UnknownIndex(String),
    /// An index with the same name exists.
    #[error("index '{0}' already exists")]
    IndexExists(String),
    /// The check constraint does not exist.
    #[error("check constraint '{0}' does not exist")]
    UnknownCheck(String),
    /// A check constraint with the same name exists.
    #[error("check constraint '{0}' already exists")]
    CheckExists(String),
    /// A non-null column holds `NULL`.
    #[error("column '{column}' of table '{table}' contains null values")]
    NotNullViolation {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// Two rows share a primary key.
    #[error("duplicate primary key in table '{0}'")]
    PrimaryKeyViolation(String),
    /// Two covered rows share a unique tuple.
    #[error("duplicate key value violates unique index '{0}'")]
    UniqueViolation(String),
    /// A row fails a check constraint.
    #[error("row violates check constraint '{0}'")]
    CheckViolation(String),
}

/// Point-in-time copy of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSnapshot {
    /// Columns in declaration order.
    pub columns: Vec<ColumnDefinition>,
    /// Primary key columns.
    pub primary_key: Vec<String>,
    /// Indexes ordered by name.
    pub indexes: Vec<IndexDefinition>,
    /// Check constraints ordered by name.
    pub checks: Vec<CheckConstraint>,
    /// Rows in insertion order.
    pub rows: Vec<Row>,
}

impl TableSnapshot {
    /// Returns the column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    /// Returns the index names in order.
    #[must_use]
    pub fn index_names(&self) -> Vec<&str> {
        self.indexes.iter().map(|index| index.name.as_str()).collect()
    }

    /// Returns the check constraint names in order.
    #[must_use]
    pub fn check_names(&self) -> Vec<&str> {
        self.checks.iter().map(|check| check.name.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
struct TableState {
    name: String,
    columns: Vec<ColumnDefinition>,
    primary_key: Vec<String>,
    indexes: BTreeMap<String, IndexDefinition>,
    checks: BTreeMap<String, CheckConstraint>,
    rows: Vec<Row>,
}

impl TableState {
    fn from_definition(definition: &TableDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            columns: definition.columns.clone(),
            primary_key: definition.primary_key.clone(),
            indexes: BTreeMap::new(),
            checks: BTreeMap::new(),
            rows: Vec::new(),
        }
    }

    fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|known| known.name == column)
    }

    fn require_columns<'a>(
        &self,
        columns: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), CatalogueError> {
        for column in columns {
            if !self.has_column(column) {
                return Err(CatalogueError::UnknownColumn {
                    table: self.name.clone(),
                    column: column.to_owned(),
                });
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            columns: self.columns.clone(),
            primary_key: self.primary_key.clone(),
            indexes: self.indexes.values().cloned().collect(),
            checks: self.checks.values().cloned().collect(),
            rows: self.rows.clone(),
        }
    }

    fn validate(&self) -> Result<(), CatalogueError> {
        for column in self.columns.iter().filter(|column| !column.nullable) {
            if self.rows.iter().any(|row| is_null(row, &column.name)) {
                return Err(CatalogueError::NotNullViolation {
                    table: self.name.clone(),
                    column: column.name.clone(),
                });
            }
        }

        if !self.primary_key.is_empty()
            && has_duplicate_tuple(self.rows.iter(), &self.primary_key)
        {
            return Err(CatalogueError::PrimaryKeyViolation(self.name.clone()));
        }

        for check in self.checks.values() {
            if !self.rows.iter().all(|row| evaluate(&check.predicate, row)) {
                return Err(CatalogueError::CheckViolation(check.name.clone()));
            }
        }

        for index in self.indexes.values().filter(|index| index.unique) {
            let covered = self.rows.iter().filter(|row| {
                index
                    .predicate
                    .as_ref()
                    .is_none_or(|predicate| evaluate(predicate, row))
            });
            if has_duplicate_tuple(covered, &index.columns) {
                return Err(CatalogueError::UniqueViolation(index.name.clone()));
            }
        }

        Ok(())
    }

    fn drop_column(&mut self, column: &str) -> Result<(), CatalogueError> {
        let position = self
            .columns
            .iter()
            .position(|known| known.name == column)
            .ok_or_else(|| CatalogueError::UnknownColumn {
                table: self.name.clone(),
                column: column.to_owned(),
            })?;
        self.columns.remove(position);
        for row in &mut self.rows {
            row.remove(column);
        }
        self.indexes
            .retain(|_, index| !index.columns.iter().any(|indexed| indexed == column));
        self.indexes.retain(|_, index| {
            index
                .predicate
                .as_ref()
                .is_none_or(|predicate| !predicate.columns().contains(&column))
        });
        self.checks
            .retain(|_, check| !check.predicate.columns().contains(&column));
        self.primary_key.retain(|key| key != column);
        Ok(())
    }
}

/// Tables held by the in-memory schema store.
#[derive(Debug, Clone, Default)]
pub(super) struct Catalogue {
    tables: BTreeMap<String, TableState>,
}

impl Catalogue {
    pub(super) fn snapshot(&self, table: &str) -> Option<TableSnapshot> {
        self.tables.get(table).map(TableState::snapshot)
    }

    pub(super) fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub(super) fn insert_row(&mut self, table: &str, row: Row) -> Result<(), CatalogueError> {
        let state = self.table_mut(table)?;
        state.require_columns(row.keys().map(String::as_str))?;

        let mut candidate = state.clone();
        let mut complete = row;
        for column in &candidate.columns {
            complete
                .entry(column.name.clone())
                .or_insert_with(|| default_value(column));
        }
        candidate.rows.push(complete);
        candidate.validate()?;
        *state = candidate;
        Ok(())
    }

    pub(super) fn apply(&mut self, change: &SchemaChange) -> Result<(), CatalogueError> {
        match change {
            SchemaChange::CreateTable(definition) => self.create_table(definition),
            SchemaChange::DropTable(definition) => self
                .tables
                .remove(&definition.name)
                .map(|_| ())
                .ok_or_else(|| CatalogueError::UnknownTable(definition.name.clone())),
            SchemaChange::AddColumn { table, column } => self.add_column(table, column),
            SchemaChange::DropColumn { table, column } => {
                self.table_mut(table)?.drop_column(&column.name)
            }
            SchemaChange::Backfill {
                table,
                column,
                value,
                filter,
            } => self.backfill(table, column, value, filter.as_ref()),
            SchemaChange::AddCheck(check) => self.add_check(check),
            SchemaChange::DropCheck(check) => self
                .table_mut(&check.table)?
                .checks
                .remove(&check.name)
                .map(|_| ())
                .ok_or_else(|| CatalogueError::UnknownCheck(check.name.clone())),
            SchemaChange::CreateIndex(index) => self.create_index(index),
            SchemaChange::DropIndex(index) => self
                .table_mut(&index.table)?
                .indexes
                .remove(&index.name)
                .map(|_| ())
                .ok_or_else(|| CatalogueError::UnknownIndex(index.name.clone())),
        }
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut TableState, CatalogueError> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| CatalogueError::UnknownTable(table.to_owned()))
    }

    fn create_table(&mut self, definition: &TableDefinition) -> Result<(), CatalogueError> {
        if self.tables.contains_key(&definition.name) {
            return Err(CatalogueError::TableExists(definition.name.clone()));
        }
        let state = TableState::from_definition(definition);
        state.require_columns(definition.primary_key.iter().map(String::as_str))?;
        self.tables.insert(definition.name.clone(), state);
        Ok(())
    }

    fn add_column(&mut self, table: &str, column: &ColumnDefinition) -> Result<(), CatalogueError> {
        let state = self.table_mut(table)?;
        if state.has_column(&column.name) {
            return Err(CatalogueError::ColumnExists {
                table: table.to_owned(),
                column: column.name.clone(),
            });
        }
        state.columns.push(column.clone());
        let value = default_value(column);
        for row in &mut state.rows {
            row.insert(column.name.clone(), value.clone());
        }
        state.validate()
    }

    fn backfill(
        &mut self,
        table: &str,
        column: &str,
        value: &Literal,
        filter: Option<&RowPredicate>,
    ) -> Result<(), CatalogueError> {
        let state = self.table_mut(table)?;
        state.require_columns([column])?;
        if let Some(predicate) = filter {
            state.require_columns(predicate.columns())?;
        }
        let assigned = literal_value(value);
        for row in &mut state.rows {
            if filter.is_none_or(|predicate| evaluate(predicate, row)) {
                row.insert(column.to_owned(), assigned.clone());
            }
        }
        state.validate()
    }

    fn add_check(&mut self, check: &CheckConstraint) -> Result<(), CatalogueError> {
        let state = self.table_mut(&check.table)?;
        if state.checks.contains_key(&check.name) {
            return Err(CatalogueError::CheckExists(check.name.clone()));
        }
        state.require_columns(check.predicate.columns())?;
        state.checks.insert(check.name.clone(), check.clone());
        state.validate()
    }

    fn create_index(&mut self, index: &IndexDefinition) -> Result<(), CatalogueError> {
        if self
            .tables
            .values()
            .any(|state| state.indexes.contains_key(&index.name))
        {
            return Err(CatalogueError::IndexExists(index.name.clone()));
        }
        let state = self.table_mut(&index.table)?;
        state.require_columns(index.columns.iter().map(String::as_str))?;
        if let Some(predicate) = &index.predicate {
            state.require_columns(predicate.columns())?;
        }
        state.indexes.insert(index.name.clone(), index.clone());
        state.validate()
    }
}

fn default_value(column: &ColumnDefinition) -> Value {
    column.default.as_ref().map_or(Value::Null, literal_value)
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Bool(flag) => Value::Bool(*flag),
        Literal::Text(text) => Value::String(text.clone()),
    }
}

fn is_null(row: &Row, column: &str) -> bool {
    row.get(column).is_none_or(Value::is_null)
}

fn evaluate(predicate: &RowPredicate, row: &Row) -> bool {
    match predicate {
        RowPredicate::IsTrue(column) => matches!(row.get(column), Some(Value::Bool(true))),
        RowPredicate::IsNull(column) => is_null(row, column),
        RowPredicate::IsNotNull(column) => !is_null(row, column),
        RowPredicate::Any(predicates) => predicates.iter().any(|inner| evaluate(inner, row)),
    }
}

fn has_duplicate_tuple<'a>(rows: impl Iterator<Item = &'a Row>, columns: &[String]) -> bool {
    let mut seen = HashSet::new();
    for row in rows {
        if columns.iter().any(|column| is_null(row, column)) {
            continue;
        }
        let key = columns
            .iter()
            .map(|column| row.get(column).map(Value::to_string).unwrap_or_default())
            .collect::<Vec<_>>();
        if !seen.insert(key) {
            return true;
        }
    }
    false
}

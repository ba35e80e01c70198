//! Declarative structural changes and their inverses.
//!
//! Each [`SchemaChange`] carries the complete definition of what it touches,
//! so the change that undoes it can be derived without consulting the
//! database.

use serde::{Deserialize, Serialize};

/// Column storage types used by registry migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "length", rename_all = "snake_case")]
pub enum ColumnType {
    /// 128-bit UUID.
    Uuid,
    /// Bounded character string.
    Varchar(u32),
    /// Boolean flag.
    Boolean,
    /// Binary JSON document.
    Jsonb,
    /// Timestamp with time zone.
    Timestamptz,
}

/// Literal values used for defaults and backfills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Literal {
    /// SQL `NULL`.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Text literal.
    Text(String),
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// Storage type.
    pub column_type: ColumnType,
    /// Whether `NULL` is permitted.
    pub nullable: bool,
    /// Value assigned to existing and omitted rows.
    pub default: Option<Literal>,
}

impl ColumnDefinition {
    /// Creates a non-null column without a default.
    #[must_use]
    pub fn required(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            default: None,
        }
    }

    /// Creates a nullable column without a default.
    #[must_use]
    pub fn optional(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            nullable: true,
            ..Self::required(name, column_type)
        }
    }

    /// Sets the column default.
    #[must_use]
    pub fn with_default(mut self, default: Literal) -> Self {
        self.default = Some(default);
        self
    }
}

/// A table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDefinition>,
    /// Primary key columns.
    pub primary_key: Vec<String>,
}

/// Row predicate used by checks, partial indexes and backfills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "operand", rename_all = "snake_case")]
pub enum RowPredicate {
    /// The boolean column is true.
    IsTrue(String),
    /// The column is `NULL`.
    IsNull(String),
    /// The column is not `NULL`.
    IsNotNull(String),
    /// At least one of the predicates holds.
    Any(Vec<RowPredicate>),
}

impl RowPredicate {
    /// Returns the columns the predicate reads.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::IsTrue(column) | Self::IsNull(column) | Self::IsNotNull(column) => {
                vec![column.as_str()]
            }
            Self::Any(predicates) => predicates.iter().flat_map(Self::columns).collect(),
        }
    }
}

/// A named check constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraint {
    /// Constraint name.
    pub name: String,
    /// Constrained table.
    pub table: String,
    /// Predicate every row must satisfy.
    pub predicate: RowPredicate,
}

/// A named, optionally unique and optionally partial index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name.
    pub name: String,
    /// Indexed table.
    pub table: String,
    /// Indexed columns in order.
    pub columns: Vec<String>,
    /// Whether the indexed tuple must be unique.
    pub unique: bool,
    /// Rows covered by the index; all rows when absent.
    pub predicate: Option<RowPredicate>,
}

/// One structural or data change applied by a migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum SchemaChange {
    /// Create a table.
    CreateTable(TableDefinition),
    /// Drop a table.
    DropTable(TableDefinition),
    /// Add a column to a table.
    AddColumn {
        /// Target table.
        table: String,
        /// Column to add.
        column: ColumnDefinition,
    },
    /// Drop a column from a table.
    DropColumn {
        /// Target table.
        table: String,
        /// Column to drop.
        column: ColumnDefinition,
    },
    /// Assign a value to a column on matching rows.
    Backfill {
        /// Target table.
        table: String,
        /// Column to assign.
        column: String,
        /// Assigned value.
        value: Literal,
        /// Rows to update; all rows when absent.
        filter: Option<RowPredicate>,
    },
    /// Add a check constraint.
    AddCheck(CheckConstraint),
    /// Drop a check constraint.
    DropCheck(CheckConstraint),
    /// Create an index.
    CreateIndex(IndexDefinition),
    /// Drop an index.
    DropIndex(IndexDefinition),
}

impl SchemaChange {
    /// Returns the change that undoes this one.
    ///
    /// Backfills have no inverse: they only touch columns that the same
    /// migration introduces, and undoing the migration drops those columns.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let inverse = match self {
            Self::CreateTable(table) => Self::DropTable(table.clone()),
            Self::DropTable(table) => Self::CreateTable(table.clone()),
            Self::AddColumn { table, column } => Self::DropColumn {
                table: table.clone(),
                column: column.clone(),
            },
            Self::DropColumn { table, column } => Self::AddColumn {
                table: table.clone(),
                column: column.clone(),
            },
            Self::Backfill { .. } => return None,
            Self::AddCheck(check) => Self::DropCheck(check.clone()),
            Self::DropCheck(check) => Self::AddCheck(check.clone()),
            Self::CreateIndex(index) => Self::DropIndex(index.clone()),
            Self::DropIndex(index) => Self::CreateIndex(index.clone()),
        };
        Some(inverse)
    }

    /// Returns the table the change operates on.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable(table) | Self::DropTable(table) => &table.name,
            Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::Backfill { table, .. } => table,
            Self::AddCheck(check) | Self::DropCheck(check) => &check.table,
            Self::CreateIndex(index) | Self::DropIndex(index) => &index.table,
        }
    }

    /// Returns a short human-readable description for logs and errors.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::CreateTable(table) => format!("create table {}", table.name),
            Self::DropTable(table) => format!("drop table {}", table.name),
            Self::AddColumn { table, column } => format!("add column {table}.{}", column.name),
            Self::DropColumn { table, column } => format!("drop column {table}.{}", column.name),
            Self::Backfill { table, column, .. } => format!("backfill {table}.{column}"),
            Self::AddCheck(check) => format!("add check {}", check.name),
            Self::DropCheck(check) => format!("drop check {}", check.name),
            Self::CreateIndex(index) => format!("create index {}", index.name),
            Self::DropIndex(index) => format!("drop index {}", index.name),
        }
    }
}

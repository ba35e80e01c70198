//! Renders schema changes as `PostgreSQL` statements.

use crate::schema_migration::domain::{
    ColumnDefinition, ColumnType, Literal, RowPredicate, SchemaChange,
};

/// Renders one change as a single SQL statement.
pub(super) fn render(change: &SchemaChange) -> String {
    match change {
        SchemaChange::CreateTable(table) => {
            let mut parts = table.columns.iter().map(column_sql).collect::<Vec<_>>();
            if !table.primary_key.is_empty() {
                parts.push(format!("PRIMARY KEY ({})", table.primary_key.join(", ")));
            }
            format!("CREATE TABLE {} ({})", table.name, parts.join(", "))
        }
        SchemaChange::DropTable(table) => format!("DROP TABLE {}", table.name),
        SchemaChange::AddColumn { table, column } => {
            format!("ALTER TABLE {table} ADD COLUMN {}", column_sql(column))
        }
        SchemaChange::DropColumn { table, column } => {
            format!("ALTER TABLE {table} DROP COLUMN {}", column.name)
        }
        SchemaChange::Backfill {
            table,
            column,
            value,
            filter,
        } => {
            let assignment = format!("UPDATE {table} SET {column} = {}", literal_sql(value));
            with_predicate(assignment, filter.as_ref())
        }
        SchemaChange::AddCheck(check) => format!(
            "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({})",
            check.table,
            check.name,
            predicate_sql(&check.predicate)
        ),
        SchemaChange::DropCheck(check) => {
            format!("ALTER TABLE {} DROP CONSTRAINT {}", check.table, check.name)
        }
        SchemaChange::CreateIndex(index) => {
            let unique = if index.unique { "UNIQUE " } else { "" };
            let statement = format!(
                "CREATE {unique}INDEX {} ON {} ({})",
                index.name,
                index.table,
                index.columns.join(", ")
            );
            with_predicate(statement, index.predicate.as_ref())
        }
        SchemaChange::DropIndex(index) => format!("DROP INDEX {}", index.name),
    }
}

fn with_predicate(statement: String, predicate: Option<&RowPredicate>) -> String {
    let Some(condition) = predicate else {
        return statement;
    };
    format!("{statement} WHERE {}", predicate_sql(condition))
}

fn column_sql(column: &ColumnDefinition) -> String {
    let mut sql = format!("{} {}", column.name, type_sql(column.column_type));
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&literal_sql(default));
    }
    sql
}

fn type_sql(column_type: ColumnType) -> String {
    match column_type {
        ColumnType::Uuid => String::from("UUID"),
        ColumnType::Varchar(length) => format!("VARCHAR({length})"),
        ColumnType::Boolean => String::from("BOOLEAN"),
        ColumnType::Jsonb => String::from("JSONB"),
        ColumnType::Timestamptz => String::from("TIMESTAMPTZ"),
    }
}

fn literal_sql(literal: &Literal) -> String {
    match literal {
        Literal::Null => String::from("NULL"),
        Literal::Bool(true) => String::from("TRUE"),
        Literal::Bool(false) => String::from("FALSE"),
        Literal::Text(text) => format!("'{}'", text.replace('\'', "''")),
    }
}

fn predicate_sql(predicate: &RowPredicate) -> String {
    match predicate {
        RowPredicate::IsTrue(column) => column.clone(),
        RowPredicate::IsNull(column) => format!("{column} IS NULL"),
        RowPredicate::IsNotNull(column) => format!("{column} IS NOT NULL"),
        RowPredicate::Any(predicates) => predicates
            .iter()
            .map(predicate_sql)
            .collect::<Vec<_>>()
            .join(" OR "),
    }
}

//! Column and index helpers shared by the billing migrations.
//!
//! Every billing table carries the same tenancy and audit columns, so they are
//! declared once here instead of per migration.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{DatabaseBackend, Statement};

/// Precision used for every monetary and credit column.
pub const MONEY_PRECISION: u32 = 20;
/// Scale used for every monetary and credit column.
pub const MONEY_SCALE: u32 = 8;

/// Prefixed string primary key column.
pub fn id_column() -> ColumnDef {
    ColumnDef::new(Alias::new("id"))
        .string_len(50)
        .not_null()
        .primary_key()
        .to_owned()
}

/// Appends the tenancy, lifecycle and audit columns to a table definition.
///
/// `with_environment` is false only for the environments table itself.
pub fn base_columns(table: &mut TableCreateStatement, with_environment: bool) {
    table.col(
        ColumnDef::new(Alias::new("tenant_id"))
            .string_len(50)
            .not_null(),
    );
    if with_environment {
        table.col(
            ColumnDef::new(Alias::new("environment_id"))
                .string_len(50)
                .not_null(),
        );
    }
    table
        .col(
            ColumnDef::new(Alias::new("status"))
                .string_len(20)
                .not_null()
                .default("published"),
        )
        .col(
            ColumnDef::new(Alias::new("created_at"))
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .col(
            ColumnDef::new(Alias::new("updated_at"))
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .col(ColumnDef::new(Alias::new("created_by")).string().null())
        .col(ColumnDef::new(Alias::new("updated_by")).string().null());
}

/// Decimal column for amounts, credits and quantities.
///
/// SQLite rejects a declared precision above 16, so it gets an unconstrained
/// decimal there.
pub fn decimal_column<T: IntoIden>(backend: DatabaseBackend, name: T) -> ColumnDef {
    let mut column = ColumnDef::new(name);
    match backend {
        DatabaseBackend::Sqlite => column.decimal(),
        _ => column.decimal_len(MONEY_PRECISION, MONEY_SCALE),
    };
    column
}

/// Monetary column defaulting to zero.
pub fn money_column<T: IntoIden>(backend: DatabaseBackend, name: T) -> ColumnDef {
    decimal_column(backend, name).not_null().default(0).to_owned()
}

/// Creates the `(tenant_id, environment_id)` lookup index for a table.
pub async fn create_scope_index(manager: &SchemaManager<'_>, table: &str) -> Result<(), DbErr> {
    manager
        .create_index(
            Index::create()
                .name(format!("idx_{table}_tenant_environment"))
                .table(Alias::new(table))
                .col(Alias::new("tenant_id"))
                .col(Alias::new("environment_id"))
                .if_not_exists()
                .to_owned(),
        )
        .await
}

/// Creates a unique index that only applies to published rows, so that soft
/// deleted rows do not block re-use of a key.
///
/// Postgres and SQLite share the partial index syntax used here.
pub async fn create_live_unique_index(
    manager: &SchemaManager<'_>,
    name: &str,
    table: &str,
    columns: &[&str],
) -> Result<(), DbErr> {
    create_partial_unique_index(manager, name, table, columns, "status = 'published'").await
}

/// Creates a unique index restricted to the rows matching `predicate`.
pub async fn create_partial_unique_index(
    manager: &SchemaManager<'_>,
    name: &str,
    table: &str,
    columns: &[&str],
    predicate: &str,
) -> Result<(), DbErr> {
    let backend = manager.get_database_backend();
    let sql = format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {name} ON {table} ({}) WHERE {predicate}",
        columns.join(", ")
    );
    manager
        .get_connection()
        .execute(Statement::from_string(backend, sql))
        .await
        .map(|_| ())
}

/// Drops an index by name if it exists.
pub async fn drop_index_if_exists(manager: &SchemaManager<'_>, name: &str) -> Result<(), DbErr> {
    let backend = manager.get_database_backend();
    manager
        .get_connection()
        .execute(Statement::from_string(
            backend,
            format!("DROP INDEX IF EXISTS {name}"),
        ))
        .await
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_money_columns_have_no_declared_precision() {
        let column = money_column(DatabaseBackend::Sqlite, Alias::new("amount"));
        assert_eq!(column.get_column_type(), Some(&ColumnType::Decimal(None)));
    }

    #[test]
    fn postgres_money_columns_keep_precision_and_scale() {
        let column = money_column(DatabaseBackend::Postgres, Alias::new("amount"));
        assert_eq!(
            column.get_column_type(),
            Some(&ColumnType::Decimal(Some((MONEY_PRECISION, MONEY_SCALE))))
        );
    }
}

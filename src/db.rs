// src/db.rs - Database migrations and setup

use sqlx::SqlitePool;
use anyhow::Result;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Enable foreign keys and WAL mode
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    // ==================== LABS ====================
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS labs (
            lab_number TEXT PRIMARY KEY CHECK(length(lab_number) > 0 AND length(lab_number) <= 20),
            lab_name TEXT NOT NULL CHECK(length(lab_name) > 0 AND length(lab_name) <= 100),
            assigned_code_prefix TEXT NOT NULL DEFAULT '' CHECK(length(assigned_code_prefix) <= 100),
            grid_rows INTEGER NOT NULL CHECK(grid_rows >= 1),
            grid_columns INTEGER NOT NULL CHECK(grid_columns >= 1),
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    // Total owned per identity; placed units are included in quantity.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lab_equipment (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lab_number TEXT NOT NULL,
            device_type TEXT NOT NULL CHECK(length(device_type) > 0 AND length(device_type) <= 100),
            brand TEXT CHECK(brand IS NULL OR length(brand) <= 255),
            model TEXT CHECK(model IS NULL OR length(model) <= 255),
            specification TEXT CHECK(specification IS NULL OR length(specification) <= 1000),
            unit_price REAL CHECK(unit_price IS NULL OR unit_price >= 0),
            purchase_date TEXT,
            invoice_number TEXT CHECK(invoice_number IS NULL OR length(invoice_number) <= 100),
            bill_id INTEGER,
            quantity INTEGER NOT NULL CHECK(quantity >= 0),
            FOREIGN KEY (lab_number) REFERENCES labs (lab_number) ON DELETE CASCADE
        )
        "#,
    )
        .execute(pool)
        .await?;

    // Only occupied cells are stored; os and devices are JSON arrays.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lab_cells (
            lab_number TEXT NOT NULL,
            row_index INTEGER NOT NULL CHECK(row_index >= 0),
            col_index INTEGER NOT NULL CHECK(col_index >= 0),
            station_id TEXT,
            equipment_type TEXT NOT NULL,
            os TEXT NOT NULL DEFAULT '[]',
            assigned_code TEXT NOT NULL,
            devices TEXT NOT NULL,
            PRIMARY KEY (lab_number, row_index, col_index),
            FOREIGN KEY (lab_number) REFERENCES labs (lab_number) ON DELETE CASCADE
        )
        "#,
    )
        .execute(pool)
        .await?;

    // ==================== INVENTORY ====================
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS procurement_lines (
            id TEXT PRIMARY KEY,
            device_type TEXT NOT NULL CHECK(length(device_type) > 0 AND length(device_type) <= 100),
            brand TEXT CHECK(brand IS NULL OR length(brand) <= 255),
            model TEXT CHECK(model IS NULL OR length(model) <= 255),
            specification TEXT CHECK(specification IS NULL OR length(specification) <= 1000),
            unit_price REAL CHECK(unit_price IS NULL OR unit_price >= 0),
            purchase_date TEXT,
            invoice_number TEXT CHECK(invoice_number IS NULL OR length(invoice_number) <= 100),
            bill_id INTEGER,
            quantity INTEGER NOT NULL CHECK(quantity >= 1),
            created_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    create_indexes(pool).await?;

    log::info!("✅ Database migrations completed");
    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_lab_equipment_lab ON lab_equipment(lab_number)",
        "CREATE INDEX IF NOT EXISTS idx_lab_equipment_type ON lab_equipment(device_type)",
        "CREATE INDEX IF NOT EXISTS idx_procurement_type ON procurement_lines(device_type)",
        "CREATE INDEX IF NOT EXISTS idx_labs_updated ON labs(updated_at)",
    ];

    for sql in indexes {
        sqlx::query(sql).execute(pool).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn get_table_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>> {
        let query = format!("PRAGMA table_info({})", table);
        let rows: Vec<(i32, String, String, i32, Option<String>, i32)> = sqlx::query_as(&query)
            .fetch_all(pool)
            .await?;

        Ok(rows.into_iter().map(|(_, name, _, _, _, _)| name).collect())
    }

    #[actix_rt::test]
    async fn test_migrations_are_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let columns = get_table_columns(&pool, "lab_cells").await.unwrap();
        for expected in ["lab_number", "row_index", "col_index", "os", "devices", "assigned_code"] {
            assert!(columns.iter().any(|c| c == expected), "missing column {}", expected);
        }
        assert!(get_table_columns(&pool, "procurement_lines").await.unwrap().contains(&"bill_id".to_string()));
    }
}

// src/repositories/lab_repository.rs
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    DeviceGroup, DeviceRef, EquipmentEntry, GridCell, LabSnapshot, LabSummary, ProcurementLine,
    SaveOutcome, SeatingArrangement,
};
use super::LabStore;

pub struct SqliteLabStore {
    pool: SqlitePool,
}

impl SqliteLabStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct LabRow {
    lab_name: String,
    assigned_code_prefix: String,
    grid_rows: i64,
    grid_columns: i64,
}

#[derive(sqlx::FromRow)]
struct EquipmentRow {
    device_type: String,
    brand: Option<String>,
    model: Option<String>,
    specification: Option<String>,
    unit_price: Option<f64>,
    purchase_date: Option<String>,
    invoice_number: Option<String>,
    bill_id: Option<i64>,
    quantity: i64,
}

impl TryFrom<EquipmentRow> for EquipmentEntry {
    type Error = ApiError;

    fn try_from(row: EquipmentRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            ApiError::InternalServerError(format!(
                "Stored quantity {} for {} is out of range",
                row.quantity, row.device_type
            ))
        })?;
        Ok(EquipmentEntry {
            device_type: row.device_type,
            quantity,
            brand: row.brand,
            model: row.model,
            specification: row.specification,
            unit_price: row.unit_price,
            purchase_date: row.purchase_date,
            invoice_number: row.invoice_number,
            bill_id: row.bill_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CellRow {
    row_index: i64,
    col_index: i64,
    station_id: Option<String>,
    equipment_type: String,
    os: String,
    assigned_code: String,
    devices: String,
}

const EQUIPMENT_COLUMNS: &str =
    "device_type, brand, model, specification, unit_price, purchase_date, invoice_number, bill_id, quantity";

#[async_trait]
impl LabStore for SqliteLabStore {
    async fn list_labs(&self) -> ApiResult<Vec<LabSummary>> {
        let labs = sqlx::query_as::<_, LabSummary>(
            r#"
            SELECT l.lab_number, l.lab_name, l.assigned_code_prefix,
                   l.grid_rows AS "rows", l.grid_columns AS "columns",
                   (SELECT COUNT(*) FROM lab_cells c WHERE c.lab_number = l.lab_number) AS stations,
                   l.updated_at
            FROM labs l
            ORDER BY l.lab_number
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(labs)
    }

    async fn load_lab(&self, lab_number: &str) -> ApiResult<Option<LabSnapshot>> {
        let lab: Option<LabRow> = sqlx::query_as(
            "SELECT lab_name, assigned_code_prefix, grid_rows, grid_columns FROM labs WHERE lab_number = ?",
        )
        .bind(lab_number)
        .fetch_optional(&self.pool)
        .await?;

        let Some(lab) = lab else {
            return Ok(None);
        };

        let equipment: Vec<EquipmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM lab_equipment WHERE lab_number = ? ORDER BY id",
            EQUIPMENT_COLUMNS
        ))
        .bind(lab_number)
        .fetch_all(&self.pool)
        .await?;

        let cells: Vec<CellRow> = sqlx::query_as(
            r#"
            SELECT row_index, col_index, station_id, equipment_type, os, assigned_code, devices
            FROM lab_cells WHERE lab_number = ?
            ORDER BY row_index, col_index
            "#,
        )
        .bind(lab_number)
        .fetch_all(&self.pool)
        .await?;

        let rows = usize::try_from(lab.grid_rows).unwrap_or(0).max(1);
        let columns = usize::try_from(lab.grid_columns).unwrap_or(0).max(1);
        let mut arrangement = SeatingArrangement::empty(rows, columns);

        for cell in cells {
            let (r, c) = (cell.row_index as usize, cell.col_index as usize);
            if cell.row_index < 0 || cell.col_index < 0 || r >= rows || c >= columns {
                log::warn!("Lab {}: dropping stored cell ({}, {}) outside {}x{}",
                    lab_number, cell.row_index, cell.col_index, rows, columns);
                continue;
            }
            let devices: Vec<DeviceRef> = serde_json::from_str(&cell.devices)?;
            let os: Vec<String> = serde_json::from_str(&cell.os)?;
            arrangement.grid[r][c] = GridCell {
                id: cell.station_id,
                equipment_type: cell.equipment_type,
                os,
                device_group: Some(DeviceGroup {
                    assigned_code: cell.assigned_code,
                    devices,
                }),
            };
        }

        Ok(Some(LabSnapshot {
            lab_number: lab_number.to_string(),
            lab_name: lab.lab_name,
            assigned_code_prefix: lab.assigned_code_prefix,
            equipment: equipment
                .into_iter()
                .map(EquipmentEntry::try_from)
                .collect::<ApiResult<Vec<_>>>()?,
            seating_arrangement: arrangement,
        }))
    }

    async fn save_lab(&self, snapshot: &LabSnapshot) -> ApiResult<SaveOutcome> {
        let now = Utc::now();
        let arrangement = &snapshot.seating_arrangement;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO labs (lab_number, lab_name, assigned_code_prefix, grid_rows, grid_columns, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(lab_number) DO UPDATE SET
                lab_name = excluded.lab_name,
                assigned_code_prefix = excluded.assigned_code_prefix,
                grid_rows = excluded.grid_rows,
                grid_columns = excluded.grid_columns,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&snapshot.lab_number)
        .bind(&snapshot.lab_name)
        .bind(&snapshot.assigned_code_prefix)
        .bind(arrangement.rows as i64)
        .bind(arrangement.columns as i64)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM lab_equipment WHERE lab_number = ?")
            .bind(&snapshot.lab_number)
            .execute(&mut *tx)
            .await?;

        for entry in &snapshot.equipment {
            sqlx::query(&format!(
                "INSERT INTO lab_equipment (lab_number, {}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                EQUIPMENT_COLUMNS
            ))
            .bind(&snapshot.lab_number)
            .bind(&entry.device_type)
            .bind(&entry.brand)
            .bind(&entry.model)
            .bind(&entry.specification)
            .bind(entry.unit_price)
            .bind(&entry.purchase_date)
            .bind(&entry.invoice_number)
            .bind(entry.bill_id)
            .bind(entry.quantity as i64)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM lab_cells WHERE lab_number = ?")
            .bind(&snapshot.lab_number)
            .execute(&mut *tx)
            .await?;

        let mut devices_assigned = 0u32;
        let mut stations = 0usize;
        for (r, row) in arrangement.grid.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let Some(group) = cell.device_group.as_ref() else {
                    continue;
                };
                sqlx::query(
                    r#"
                    INSERT INTO lab_cells (lab_number, row_index, col_index, station_id, equipment_type, os, assigned_code, devices)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&snapshot.lab_number)
                .bind(r as i64)
                .bind(c as i64)
                .bind(&cell.id)
                .bind(&cell.equipment_type)
                .bind(serde_json::to_string(&cell.os)?)
                .bind(&group.assigned_code)
                .bind(serde_json::to_string(&group.devices)?)
                .execute(&mut *tx)
                .await?;

                devices_assigned += group.devices.len() as u32;
                stations += 1;
            }
        }

        tx.commit().await?;

        log::info!("💾 Saved lab {}: {} stations, {} devices assigned",
            snapshot.lab_number, stations, devices_assigned);

        Ok(SaveOutcome {
            lab_number: snapshot.lab_number.clone(),
            devices_assigned,
            stations,
        })
    }

    async fn search_available(&self, device_type: &str) -> ApiResult<Vec<EquipmentEntry>> {
        let rows: Vec<EquipmentRow> = sqlx::query_as(
            r#"
            SELECT * FROM (
                SELECT p.device_type, p.brand, p.model,
                       MAX(p.specification) AS specification,
                       MAX(p.unit_price) AS unit_price,
                       MAX(p.purchase_date) AS purchase_date,
                       MAX(p.invoice_number) AS invoice_number,
                       p.bill_id,
                       SUM(p.quantity) - COALESCE((
                           SELECT SUM(e.quantity) FROM lab_equipment e
                           WHERE e.device_type = p.device_type
                             AND e.brand IS p.brand
                             AND e.model IS p.model
                             AND e.bill_id IS p.bill_id
                       ), 0) AS quantity
                FROM procurement_lines p
                WHERE p.device_type = ?
                GROUP BY p.device_type, p.brand, p.model, p.bill_id
            )
            WHERE quantity > 0
            ORDER BY bill_id, brand, model
            "#,
        )
        .bind(device_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EquipmentEntry::try_from).collect()
    }

    async fn register_procurement(&self, entry: &EquipmentEntry) -> ApiResult<ProcurementLine> {
        let line = ProcurementLine {
            id: Uuid::new_v4().to_string(),
            device_type: entry.device_type.clone(),
            brand: entry.brand.clone(),
            model: entry.model.clone(),
            specification: entry.specification.clone(),
            unit_price: entry.unit_price,
            purchase_date: entry.purchase_date.clone(),
            invoice_number: entry.invoice_number.clone(),
            bill_id: entry.bill_id,
            quantity: entry.quantity as i64,
            created_at: Utc::now(),
        };

        sqlx::query(&format!(
            "INSERT INTO procurement_lines (id, {}, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            EQUIPMENT_COLUMNS
        ))
        .bind(&line.id)
        .bind(&line.device_type)
        .bind(&line.brand)
        .bind(&line.model)
        .bind(&line.specification)
        .bind(line.unit_price)
        .bind(&line.purchase_date)
        .bind(&line.invoice_number)
        .bind(line.bill_id)
        .bind(line.quantity)
        .bind(line.created_at)
        .execute(&self.pool)
        .await?;

        log::info!("📦 Registered procurement line {} ({} x {})", line.id, line.quantity, line.device_type);
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::run_migrations;
    use crate::layout::{LabLayout, Selection};
    use crate::models::CellPosition;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteLabStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteLabStore::new(pool)
    }

    fn entry(device_type: &str, brand: &str, bill_id: i64, quantity: u32) -> EquipmentEntry {
        EquipmentEntry {
            device_type: device_type.to_string(),
            quantity,
            brand: Some(brand.to_string()),
            model: Some("X".to_string()),
            specification: None,
            unit_price: Some(450.0),
            purchase_date: Some("2024-06-10".to_string()),
            invoice_number: Some(format!("INV-{}", bill_id)),
            bill_id: Some(bill_id),
        }
    }

    #[actix_rt::test]
    async fn test_load_unknown_lab() {
        let store = store().await;
        assert!(store.load_lab("404").await.unwrap().is_none());
        assert!(store.list_labs().await.unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn test_save_and_load_round_trip() {
        let store = store().await;
        let pc = entry("PC", "Dell", 1, 5);
        let monitor = entry("Monitor", "LG", 2, 3);

        let mut lab = LabLayout::new("309", "Computer Lab", "apsit/it/309", 3, 4).unwrap();
        lab.add_equipment(&pc).unwrap();
        lab.add_equipment(&monitor).unwrap();
        lab.create_link(&[pc.identity(), monitor.identity()]).unwrap();
        lab.fill(CellPosition { row: 0, col: 0 }, CellPosition { row: 0, col: 2 }, &Selection::Linked { group: 0 })
            .unwrap();
        lab.place(2, 3, &Selection::Standby { group: 0, device: pc.identity() }).unwrap();
        lab.apply_bulk_os("Linux", true);

        let outcome = store.save_lab(&lab.snapshot()).await.unwrap();
        assert_eq!(outcome.stations, 4);
        assert_eq!(outcome.devices_assigned, 7);

        let loaded = store.load_lab("309").await.unwrap().unwrap();
        assert_eq!(loaded, lab.snapshot());

        let reloaded = LabLayout::reconcile(loaded).unwrap();
        assert_eq!(reloaded.pool().available_quantity(&pc.identity()), 1);
        assert_eq!(reloaded.pool().available_quantity(&monitor.identity()), 0);
        assert_eq!(reloaded.links().groups().len(), 1);

        let labs = store.list_labs().await.unwrap();
        assert_eq!(labs.len(), 1);
        assert_eq!((labs[0].rows, labs[0].columns, labs[0].stations), (3, 4, 4));
    }

    #[actix_rt::test]
    async fn test_save_replaces_previous_state() {
        let store = store().await;
        let pc = entry("PC", "Dell", 1, 2);

        let mut lab = LabLayout::new("1", "Lab", "p", 2, 2).unwrap();
        lab.add_equipment(&pc).unwrap();
        lab.fill(CellPosition { row: 0, col: 0 }, CellPosition { row: 0, col: 1 }, &Selection::Standalone { device: pc.identity() })
            .unwrap();
        store.save_lab(&lab.snapshot()).await.unwrap();

        lab.remove_cell(0, 0).unwrap();
        lab.rename("Renamed");
        store.save_lab(&lab.snapshot()).await.unwrap();

        let loaded = store.load_lab("1").await.unwrap().unwrap();
        assert_eq!(loaded.lab_name, "Renamed");
        assert_eq!(loaded.seating_arrangement.grid.iter().flatten().filter(|c| c.is_occupied()).count(), 1);
        assert_eq!(loaded.equipment.len(), 1);
        assert_eq!(loaded.seating_arrangement.grid[0][1].id.as_deref(), Some("C001"));
    }

    #[actix_rt::test]
    async fn test_search_subtracts_attached_quantities() {
        let store = store().await;
        let dell = entry("PC", "Dell", 1, 10);
        let hp = entry("PC", "HP", 2, 2);
        store.register_procurement(&dell).await.unwrap();
        store.register_procurement(&hp).await.unwrap();
        store.register_procurement(&entry("Projector", "Epson", 3, 1)).await.unwrap();

        let mut lab = LabLayout::new("309", "Lab", "p", 2, 2).unwrap();
        lab.add_equipment(&dell.with_quantity(4)).unwrap();
        lab.add_equipment(&hp).unwrap();
        store.save_lab(&lab.snapshot()).await.unwrap();

        let found = store.search_available("PC").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].brand.as_deref(), Some("Dell"));
        assert_eq!(found[0].quantity, 6);
        assert_eq!(found[0].invoice_number.as_deref(), Some("INV-1"));

        assert!(store.search_available("Router").await.unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn test_search_reports_out_of_range_quantities() {
        let store = store().await;
        sqlx::query(
            "INSERT INTO procurement_lines (id, device_type, brand, model, bill_id, quantity, created_at) \
             VALUES ('a', 'PC', 'Dell', 'X', 1, 4294967295, ?), ('b', 'PC', 'Dell', 'X', 1, 1, ?)",
        )
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(&store.pool)
        .await
        .unwrap();

        match store.search_available("PC").await {
            Err(ApiError::InternalServerError(msg)) => assert!(msg.contains("4294967296")),
            other => panic!("expected an out-of-range error, got {:?}", other.map(|v| v.len())),
        }
    }
}

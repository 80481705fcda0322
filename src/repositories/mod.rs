// src/repositories/mod.rs
//! Persistence boundary for labs and inventory.

mod lab_repository;

pub use lab_repository::SqliteLabStore;

use async_trait::async_trait;
use crate::error::ApiResult;
use crate::models::{EquipmentEntry, LabSnapshot, LabSummary, ProcurementLine, SaveOutcome};

/// Storage for lab layouts and the inventory they draw from.
#[async_trait]
pub trait LabStore: Send + Sync {
    async fn list_labs(&self) -> ApiResult<Vec<LabSummary>>;

    /// `None` when the lab has never been saved.
    async fn load_lab(&self, lab_number: &str) -> ApiResult<Option<LabSnapshot>>;

    /// Replaces everything stored for the lab in one transaction.
    async fn save_lab(&self, snapshot: &LabSnapshot) -> ApiResult<SaveOutcome>;

    /// Inventory of `device_type` not yet attached to any lab, one entry per
    /// identity, with the unattached remainder as quantity.
    async fn search_available(&self, device_type: &str) -> ApiResult<Vec<EquipmentEntry>>;

    async fn register_procurement(&self, entry: &EquipmentEntry) -> ApiResult<ProcurementLine>;
}

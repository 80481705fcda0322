// src/models/lab.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, Utc};
use crate::layout::Selection;
use crate::models::equipment::{DeviceRef, EquipmentEntry, EquipmentIdentity};
use crate::models::seating::SeatingArrangement;

// ==================== LAB ====================

/// Everything the store persists for one lab and hands back on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabSnapshot {
    pub lab_number: String,
    pub lab_name: String,
    #[serde(default)]
    pub assigned_code_prefix: String,
    /// Total owned per identity, placed units included.
    #[serde(default)]
    pub equipment: Vec<EquipmentEntry>,
    pub seating_arrangement: SeatingArrangement,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LabSummary {
    pub lab_number: String,
    pub lab_name: String,
    pub assigned_code_prefix: String,
    pub rows: i64,
    pub columns: i64,
    pub stations: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub lab_number: String,
    pub devices_assigned: u32,
    pub stations: usize,
}

// ==================== INVENTORY ====================

/// A procurement line registered from an invoice, not yet (fully) attached to labs.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProcurementLine {
    pub id: String,
    pub device_type: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub specification: Option<String>,
    pub unit_price: Option<f64>,
    pub purchase_date: Option<String>,
    pub invoice_number: Option<String>,
    pub bill_id: Option<i64>,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterProcurementRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub entry: EquipmentEntry,
}

#[derive(Debug, Deserialize)]
pub struct SearchEquipmentQuery {
    #[serde(rename = "type")]
    pub device_type: String,
}

// ==================== SESSION REQUESTS ====================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLabRequest {
    #[validate(length(min = 1, max = 20, message = "Lab number must be between 1 and 20 characters"))]
    pub lab_number: String,

    #[validate(length(min = 1, max = 100, message = "Lab name must be between 1 and 100 characters"))]
    pub lab_name: String,

    #[validate(length(max = 100, message = "Code prefix cannot exceed 100 characters"))]
    pub assigned_code_prefix: Option<String>,

    pub rows: Option<usize>,
    pub columns: Option<usize>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLabDetailsRequest {
    #[validate(length(min = 1, max = 100, message = "Lab name must be between 1 and 100 characters"))]
    pub lab_name: Option<String>,

    #[validate(length(max = 100, message = "Code prefix cannot exceed 100 characters"))]
    pub assigned_code_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CellPosition {
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Deserialize)]
pub struct PlaceRequest {
    pub row: usize,
    pub col: usize,
    pub selection: Selection,
}

#[derive(Debug, Deserialize)]
pub struct FillRequest {
    pub from: CellPosition,
    pub to: CellPosition,
    pub selection: Selection,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OsTagRequest {
    #[validate(length(min = 1, max = 50, message = "OS tag must be between 1 and 50 characters"))]
    pub tag: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkOsRequest {
    #[validate(length(min = 1, max = 50, message = "OS tag must be between 1 and 50 characters"))]
    pub tag: String,
    pub add: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub members: Vec<EquipmentIdentity>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddEquipmentRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub entry: EquipmentEntry,
}

// ==================== SESSION VIEW ====================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandbyDevice {
    pub device: DeviceRef,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedGroupView {
    pub index: usize,
    pub members: Vec<DeviceRef>,
    pub available_sets: u32,
    pub standby: Vec<StandbyDevice>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillReport {
    pub requested: usize,
    pub placed: usize,
}

impl FillReport {
    pub fn is_partial(&self) -> bool {
        self.placed < self.requested
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabView {
    pub lab_number: String,
    pub lab_name: String,
    pub assigned_code_prefix: String,
    pub equipment: Vec<EquipmentEntry>,
    pub available: Vec<EquipmentEntry>,
    /// Available entries that belong to no linked group.
    pub standalone: Vec<EquipmentEntry>,
    pub linked_groups: Vec<LinkedGroupView>,
    pub seating_arrangement: SeatingArrangement,
    pub stations: usize,
    pub next_sequence: u32,
    pub bulk_os: Vec<String>,
}

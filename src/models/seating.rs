// src/models/seating.rs
//! Seating arrangement as it travels to and from the store and the browser.

use serde::{Deserialize, Serialize};
use crate::models::equipment::DeviceRef;

/// Label of a cell with nothing bound to it.
pub const EMPTY_LABEL: &str = "Empty";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceGroup {
    /// Derived `{prefix}/{n}`; rewritten on every re-sequence.
    #[serde(default)]
    pub assigned_code: String,
    pub devices: Vec<DeviceRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    pub id: Option<String>,
    pub equipment_type: String,
    #[serde(default)]
    pub os: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_group: Option<DeviceGroup>,
}

impl Default for GridCell {
    fn default() -> Self {
        Self::empty()
    }
}

impl GridCell {
    pub fn empty() -> Self {
        Self {
            id: None,
            equipment_type: EMPTY_LABEL.to_string(),
            os: Vec::new(),
            device_group: None,
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.device_group.is_some()
    }

    pub fn devices(&self) -> &[DeviceRef] {
        self.device_group
            .as_ref()
            .map(|group| group.devices.as_slice())
            .unwrap_or(&[])
    }

    /// Empty -> Occupied. Id and code are left for the sequencer.
    pub fn occupy(&mut self, label: &str, devices: Vec<DeviceRef>, os: &[String]) {
        self.id = None;
        self.equipment_type = label.to_string();
        self.os = os.to_vec();
        self.device_group = Some(DeviceGroup {
            assigned_code: String::new(),
            devices,
        });
    }

    /// Occupied -> Empty, returning whatever was bound.
    pub fn take(&mut self) -> Option<DeviceGroup> {
        let group = self.device_group.take();
        *self = Self::empty();
        group
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatingArrangement {
    pub rows: usize,
    pub columns: usize,
    #[serde(default)]
    pub grid: Vec<Vec<GridCell>>,
}

impl SeatingArrangement {
    pub fn empty(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            grid: vec![vec![GridCell::empty(); columns]; rows],
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.grid.len() == self.rows && self.grid.iter().all(|row| row.len() == self.columns)
    }
}

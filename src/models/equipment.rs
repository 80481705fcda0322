// src/models/equipment.rs
//! Equipment entries (one procurement line per entry) and the device
//! references that occupied cells carry.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString};
use validator::Validate;

// ==================== IDENTITY ====================

/// Matching key for equipment: two entries with the same identity are the
/// same physical batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentIdentity {
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub bill_id: Option<i64>,
}

impl fmt::Display for EquipmentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.device_type,
            self.brand.as_deref().unwrap_or("-"),
            self.model.as_deref().unwrap_or("-"),
        )?;
        if let Some(bill_id) = self.bill_id {
            write!(f, " (bill #{})", bill_id)?;
        }
        Ok(())
    }
}

// ==================== EQUIPMENT ENTRY ====================

/// Upper bound for one entry and for a lab's total of one identity.
pub const MAX_UNITS: u32 = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentEntry {
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 100, message = "Type must be between 1 and 100 characters"))]
    pub device_type: String,

    #[validate(range(max = 100000, message = "Quantity cannot exceed 100000 units"))]
    pub quantity: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 255, message = "Brand cannot exceed 255 characters"))]
    pub brand: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 255, message = "Model cannot exceed 255 characters"))]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 1000, message = "Specification cannot exceed 1000 characters"))]
    pub specification: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, message = "Unit price cannot be negative"))]
    pub unit_price: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100, message = "Invoice number cannot exceed 100 characters"))]
    pub invoice_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_id: Option<i64>,
}

impl EquipmentEntry {
    pub fn identity(&self) -> EquipmentIdentity {
        EquipmentIdentity {
            device_type: self.device_type.clone(),
            brand: self.brand.clone(),
            model: self.model.clone(),
            bill_id: self.bill_id,
        }
    }

    pub fn matches(&self, identity: &EquipmentIdentity) -> bool {
        self.device_type == identity.device_type
            && self.brand == identity.brand
            && self.model == identity.model
            && self.bill_id == identity.bill_id
    }

    /// Same metadata, different count.
    pub fn with_quantity(&self, quantity: u32) -> Self {
        Self {
            quantity,
            ..self.clone()
        }
    }
}

// ==================== DEVICE REFERENCE ====================

/// A single device bound to a station. Carries the identity plus the invoice
/// number so tickets raised against the station can point at the paperwork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRef {
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
}

impl DeviceRef {
    pub fn identity(&self) -> EquipmentIdentity {
        EquipmentIdentity {
            device_type: self.device_type.clone(),
            brand: self.brand.clone(),
            model: self.model.clone(),
            bill_id: self.bill_id,
        }
    }
}

impl From<&EquipmentEntry> for DeviceRef {
    fn from(entry: &EquipmentEntry) -> Self {
        Self {
            device_type: entry.device_type.clone(),
            brand: entry.brand.clone(),
            model: entry.model.clone(),
            bill_id: entry.bill_id,
            invoice_number: entry.invoice_number.clone(),
        }
    }
}

impl From<&EquipmentIdentity> for DeviceRef {
    fn from(identity: &EquipmentIdentity) -> Self {
        Self {
            device_type: identity.device_type.clone(),
            brand: identity.brand.clone(),
            model: identity.model.clone(),
            bill_id: identity.bill_id,
            invoice_number: None,
        }
    }
}

// ==================== DEVICE TYPE CATALOGUE ====================

/// Device types the inventory knows about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum DeviceType {
    Laptop,
    #[strum(serialize = "PC")]
    #[serde(rename = "PC")]
    Pc,
    #[strum(serialize = "AC")]
    #[serde(rename = "AC")]
    Ac,
    #[strum(serialize = "Smart Board")]
    #[serde(rename = "Smart Board")]
    SmartBoard,
    Projector,
    Printer,
    Scanner,
    #[strum(serialize = "UPS")]
    #[serde(rename = "UPS")]
    Ups,
    Router,
    Switch,
    Server,
    Monitor,
    Keyboard,
    Mouse,
    Webcam,
    Headset,
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    fn dell() -> EquipmentEntry {
        EquipmentEntry {
            device_type: "PC".to_string(),
            quantity: 3,
            brand: Some("Dell".to_string()),
            model: Some("X".to_string()),
            specification: Some("i5 / 8GB".to_string()),
            unit_price: Some(45000.0),
            purchase_date: Some("2024-06-01".to_string()),
            invoice_number: Some("INV-7".to_string()),
            bill_id: Some(7),
        }
    }

    #[test]
    fn test_identity_ignores_metadata() {
        let a = dell();
        let mut b = dell();
        b.quantity = 1;
        b.specification = None;
        b.invoice_number = Some("INV-other".to_string());
        assert_eq!(a.identity(), b.identity());
        assert!(b.matches(&a.identity()));

        b.bill_id = Some(8);
        assert!(!b.matches(&a.identity()));
    }

    #[test]
    fn test_entry_uses_camel_case_wire_names() {
        let json = serde_json::to_value(dell()).unwrap();
        assert_eq!(json["type"], "PC");
        assert_eq!(json["billId"], 7);
        assert_eq!(json["unitPrice"], 45000.0);
        assert_eq!(json["invoiceNumber"], "INV-7");

        let parsed: EquipmentEntry =
            serde_json::from_str(r#"{"type":"Projector","quantity":2}"#).unwrap();
        assert_eq!(parsed.device_type, "Projector");
        assert!(parsed.brand.is_none());
    }

    #[test]
    fn test_entry_validation() {
        let mut entry = dell();
        assert!(entry.validate().is_ok());
        entry.device_type = String::new();
        assert!(entry.validate().is_err());
        let mut entry = dell();
        entry.unit_price = Some(-1.0);
        assert!(entry.validate().is_err());

        let mut entry = dell();
        entry.quantity = MAX_UNITS;
        assert!(entry.validate().is_ok());
        entry.quantity = MAX_UNITS + 1;
        assert!(entry.validate().is_err());
        entry.quantity = u32::MAX;
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_device_ref_keeps_invoice() {
        let device = DeviceRef::from(&dell());
        assert_eq!(device.invoice_number.as_deref(), Some("INV-7"));
        assert_eq!(device.identity(), dell().identity());
    }

    #[test]
    fn test_device_type_catalogue() {
        assert_eq!(DeviceType::iter().count(), 17);
        assert_eq!(DeviceType::from_str("smart board").unwrap(), DeviceType::SmartBoard);
        assert_eq!(DeviceType::from_str("pc").unwrap(), DeviceType::Pc);
        assert_eq!(DeviceType::Ups.to_string(), "UPS");
        assert!(DeviceType::from_str("toaster").is_err());
    }
}

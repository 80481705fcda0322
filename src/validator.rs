// src/validator.rs - Field and payload validation for lab requests
use std::collections::HashMap;
use serde::Serialize;
use regex::Regex;
use lazy_static::lazy_static;
use crate::config::LayoutConfig;
use crate::error::ApiError;
use crate::models::*;

lazy_static! {
    static ref LAB_NUMBER_REGEX: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").unwrap();
    static ref CODE_PREFIX_REGEX: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9/_.-]*$").unwrap();
    static ref OS_TAG_REGEX: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 ._+-]*$").unwrap();
}

// ==================== VALIDATION RESULT ====================

#[derive(Debug, Default, Serialize)]
pub struct ValidationResult {
    pub errors: HashMap<String, Vec<String>>,
    pub warnings: HashMap<String, Vec<String>>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn to_api_error(&self) -> ApiError {
        let mut fields: Vec<_> = self.errors.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        let message = fields
            .into_iter()
            .map(|(field, errors)| format!("{}: {}", field, errors.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");

        ApiError::ValidationError(message)
    }

    /// Logs warnings and turns errors into an `ApiError`.
    pub fn into_result(self) -> Result<(), ApiError> {
        for (field, warnings) in &self.warnings {
            log::warn!("⚠️ {}: {}", field, warnings.join(", "));
        }
        if self.is_valid() {
            Ok(())
        } else {
            Err(self.to_api_error())
        }
    }
}

// ==================== FIELD VALIDATORS ====================

pub struct FieldValidator;

impl FieldValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            Err(format!("{} cannot be empty", field))
        } else {
            Ok(())
        }
    }

    pub fn range<T: PartialOrd + std::fmt::Display>(
        value: T,
        field: &str,
        min: Option<T>,
        max: Option<T>
    ) -> Result<(), String> {
        if let Some(min_val) = min {
            if value < min_val {
                return Err(format!("{} must be at least {}", field, min_val));
            }
        }

        if let Some(max_val) = max {
            if value > max_val {
                return Err(format!("{} must not exceed {}", field, max_val));
            }
        }

        Ok(())
    }

    pub fn lab_number(value: &str) -> Result<(), String> {
        if LAB_NUMBER_REGEX.is_match(value) {
            Ok(())
        } else {
            Err("Lab number may only contain letters, digits, '-' and '_'".to_string())
        }
    }

    /// Empty prefixes are allowed; codes then read "/1", "/2", ...
    pub fn code_prefix(value: &str) -> Result<(), String> {
        if value.is_empty() || CODE_PREFIX_REGEX.is_match(value) {
            Ok(())
        } else {
            Err("Invalid code prefix format (expected e.g. apsit/it/309)".to_string())
        }
    }

    pub fn os_tag(value: &str) -> Result<(), String> {
        if OS_TAG_REGEX.is_match(value) {
            Ok(())
        } else {
            Err("Invalid OS tag".to_string())
        }
    }
}

// ==================== LAYOUT VALIDATION ====================

pub struct LayoutValidator;

impl LayoutValidator {
    pub fn dimensions(rows: usize, columns: usize, config: &LayoutConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = FieldValidator::range(rows, "rows", Some(1), Some(config.max_dimension)) {
            result.add_error("rows", e);
        }
        if let Err(e) = FieldValidator::range(columns, "columns", Some(1), Some(config.max_dimension)) {
            result.add_error("columns", e);
        }

        result
    }

    pub fn os_tag(tag: &str, config: &LayoutConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = FieldValidator::os_tag(tag) {
            result.add_error("tag", e);
        } else if !config.default_os_tags.iter().any(|known| known == tag) {
            result.add_warning("tag", format!("'{}' is not one of the configured OS tags", tag));
        }

        result
    }

    /// Requested import quantity against what is still unattached in inventory.
    pub fn import_quantity(requested: u32, unattached: u32) -> ValidationResult {
        let mut result = ValidationResult::new();

        if requested == 0 {
            result.add_error("quantity", "Quantity must be at least 1");
        } else if requested > unattached {
            result.add_error(
                "quantity",
                format!("Only {} unit(s) remain unattached in inventory", unattached),
            );
        }

        result
    }
}

// ==================== CUSTOM VALIDATION ====================

pub trait CustomValidate {
    fn custom_validate(&self) -> ValidationResult;
}

impl CustomValidate for CreateLabRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = FieldValidator::lab_number(&self.lab_number) {
            result.add_error("lab_number", e);
        }
        if let Err(e) = FieldValidator::not_empty(&self.lab_name, "Lab name") {
            result.add_error("lab_name", e);
        }
        if let Some(ref prefix) = self.assigned_code_prefix {
            if let Err(e) = FieldValidator::code_prefix(prefix) {
                result.add_error("assigned_code_prefix", e);
            }
        }

        result
    }
}

impl CustomValidate for UpdateLabDetailsRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Some(ref name) = self.lab_name {
            if let Err(e) = FieldValidator::not_empty(name, "Lab name") {
                result.add_error("lab_name", e);
            }
        }
        if let Some(ref prefix) = self.assigned_code_prefix {
            if let Err(e) = FieldValidator::code_prefix(prefix) {
                result.add_error("assigned_code_prefix", e);
            }
        }
        if self.lab_name.is_none() && self.assigned_code_prefix.is_none() {
            result.add_warning("details", "Nothing to update");
        }

        result
    }
}

impl CustomValidate for EquipmentEntry {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = FieldValidator::not_empty(&self.device_type, "Device type") {
            result.add_error("type", e);
        } else if self.device_type.parse::<DeviceType>().is_err() {
            result.add_warning("type", format!("'{}' is not a catalogued device type", self.device_type));
        }
        if self.quantity == 0 {
            result.add_error("quantity", "Quantity must be at least 1");
        }
        if let Some(price) = self.unit_price {
            if let Err(e) = FieldValidator::range(price, "Unit price", Some(0.0), None) {
                result.add_error("unit_price", e);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_config() -> LayoutConfig {
        LayoutConfig::default()
    }

    #[test]
    fn test_lab_number_and_prefix() {
        assert!(FieldValidator::lab_number("309").is_ok());
        assert!(FieldValidator::lab_number("IT-lab_2").is_ok());
        assert!(FieldValidator::lab_number("").is_err());
        assert!(FieldValidator::lab_number("lab 309").is_err());
        assert!(FieldValidator::lab_number("309/1").is_err());

        assert!(FieldValidator::code_prefix("apsit/it/309").is_ok());
        assert!(FieldValidator::code_prefix("").is_ok());
        assert!(FieldValidator::code_prefix("/leading").is_err());
    }

    #[test]
    fn test_dimensions_against_config() {
        let config = layout_config();
        assert!(LayoutValidator::dimensions(6, 6, &config).is_valid());
        assert!(LayoutValidator::dimensions(config.max_dimension, 1, &config).is_valid());

        let result = LayoutValidator::dimensions(0, config.max_dimension + 1, &config);
        assert!(result.errors.contains_key("rows"));
        assert!(result.errors.contains_key("columns"));
    }

    #[test]
    fn test_os_tag_warns_on_unknown() {
        let config = layout_config();
        let known = LayoutValidator::os_tag("Linux", &config);
        assert!(known.is_valid() && known.warnings.is_empty());

        let custom = LayoutValidator::os_tag("FreeBSD", &config);
        assert!(custom.is_valid());
        assert!(custom.warnings.contains_key("tag"));

        assert!(!LayoutValidator::os_tag("  ", &config).is_valid());
    }

    #[test]
    fn test_import_quantity_clamp() {
        assert!(LayoutValidator::import_quantity(3, 3).is_valid());
        assert!(!LayoutValidator::import_quantity(4, 3).is_valid());
        assert!(!LayoutValidator::import_quantity(0, 3).is_valid());
    }

    #[test]
    fn test_create_lab_request() {
        let request = CreateLabRequest {
            lab_number: "309".to_string(),
            lab_name: "   ".to_string(),
            assigned_code_prefix: Some("apsit/it/309".to_string()),
            rows: None,
            columns: None,
        };
        let result = request.custom_validate();
        assert!(!result.is_valid());
        assert!(result.errors.contains_key("lab_name"));
        match result.to_api_error() {
            ApiError::ValidationError(msg) => assert!(msg.starts_with("lab_name:")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_equipment_entry_checks() {
        let mut entry = EquipmentEntry {
            device_type: "Toaster".to_string(),
            quantity: 2,
            brand: None,
            model: None,
            specification: None,
            unit_price: Some(-5.0),
            purchase_date: None,
            invoice_number: None,
            bill_id: None,
        };
        let result = entry.custom_validate();
        assert!(result.errors.contains_key("unit_price"));
        assert!(result.warnings.contains_key("type"));

        entry.unit_price = None;
        entry.device_type = "smart board".to_string();
        let result = entry.custom_validate();
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }
}

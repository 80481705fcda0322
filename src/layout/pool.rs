// src/layout/pool.rs
//! Equipment pool: how many units of each identity are still unplaced.
//!
//! The pool keeps two lists. `owned` is the lab's master equipment list with
//! total quantities; it is what gets saved and it is where metadata comes from
//! when a pruned entry has to be brought back. `available` is the unplaced
//! view; entries that drop to zero are pruned from it.

use std::collections::BTreeMap;
use crate::error::LayoutError;
use crate::models::{DeviceRef, EquipmentEntry, EquipmentIdentity, MAX_UNITS};

#[derive(Debug, Clone, Default)]
pub struct EquipmentPool {
    owned: Vec<EquipmentEntry>,
    available: Vec<EquipmentEntry>,
}

impl EquipmentPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the master list and the units currently on the grid.
    /// Placed counts above what is owned clamp to zero available.
    pub fn reconcile(
        owned: Vec<EquipmentEntry>,
        placed: &BTreeMap<EquipmentIdentity, u32>,
    ) -> Result<Self, LayoutError> {
        let mut pool = Self::new();
        for entry in owned {
            let total = add_units(pool.total_owned(&entry.identity()), entry.quantity, &entry)?;
            upsert(&mut pool.owned, &entry, total);
        }

        pool.available = pool
            .owned
            .iter()
            .filter_map(|entry| {
                let on_grid = placed.get(&entry.identity()).copied().unwrap_or(0);
                if on_grid > entry.quantity {
                    log::warn!(
                        "{} units of {} on the grid but only {} owned",
                        on_grid, entry.identity(), entry.quantity
                    );
                }
                let free = entry.quantity.saturating_sub(on_grid);
                (free > 0).then(|| entry.with_quantity(free))
            })
            .collect();

        Ok(pool)
    }

    pub fn owned(&self) -> &[EquipmentEntry] {
        &self.owned
    }

    pub fn available(&self) -> &[EquipmentEntry] {
        &self.available
    }

    pub fn available_quantity(&self, identity: &EquipmentIdentity) -> u32 {
        self.available
            .iter()
            .find(|entry| entry.matches(identity))
            .map(|entry| entry.quantity)
            .unwrap_or(0)
    }

    pub fn total_owned(&self, identity: &EquipmentIdentity) -> u32 {
        self.owned
            .iter()
            .find(|entry| entry.matches(identity))
            .map(|entry| entry.quantity)
            .unwrap_or(0)
    }

    pub fn owns(&self, identity: &EquipmentIdentity) -> bool {
        self.owned.iter().any(|entry| entry.matches(identity))
    }

    pub fn owned_entry(&self, identity: &EquipmentIdentity) -> Option<&EquipmentEntry> {
        self.owned.iter().find(|entry| entry.matches(identity))
    }

    /// New equipment for the lab: merged by identity into both lists.
    /// Refused, with nothing changed, when the identity's total would pass
    /// `MAX_UNITS`.
    pub fn add_entry(&mut self, entry: &EquipmentEntry) -> Result<(), LayoutError> {
        let identity = entry.identity();
        let owned = add_units(self.total_owned(&identity), entry.quantity, entry)?;
        let available = add_units(self.available_quantity(&identity), entry.quantity, entry)?;

        upsert(&mut self.owned, entry, owned);
        if available > 0 {
            upsert(&mut self.available, entry, available);
        }
        Ok(())
    }

    /// Callers check stock first; a shortfall here leaves the pool untouched.
    pub fn reduce_available(&mut self, identity: &EquipmentIdentity, n: u32) -> Result<(), LayoutError> {
        let available = self.available_quantity(identity);
        if n > available {
            return Err(LayoutError::InsufficientStock { available, requested: n });
        }
        if n == 0 {
            return Ok(());
        }
        if let Some(entry) = self.available.iter_mut().find(|e| e.matches(identity)) {
            entry.quantity -= n;
        }
        self.available.retain(|entry| entry.quantity > 0);
        Ok(())
    }

    pub fn restore_available(&mut self, device: &DeviceRef, n: u32) {
        if n == 0 {
            return;
        }
        let identity = device.identity();
        if let Some(entry) = self.available.iter_mut().find(|e| e.matches(&identity)) {
            // Bounded by the owned total unless stored data was inconsistent.
            entry.quantity = entry.quantity.saturating_add(n);
            return;
        }

        let restored = match self.owned_entry(&identity) {
            Some(original) => original.with_quantity(n),
            None => {
                log::warn!("Restoring {} which is not on the lab's equipment list", identity);
                EquipmentEntry {
                    device_type: device.device_type.clone(),
                    quantity: n,
                    brand: device.brand.clone(),
                    model: device.model.clone(),
                    specification: None,
                    unit_price: None,
                    purchase_date: None,
                    invoice_number: device.invoice_number.clone(),
                    bill_id: device.bill_id,
                }
            }
        };
        self.available.push(restored);
    }

    /// Drop an identity from the lab outright. Whether it may still be on the
    /// grid is the caller's decision.
    pub fn remove_entry_entirely(&mut self, identity: &EquipmentIdentity) -> Result<EquipmentEntry, LayoutError> {
        let position = self
            .owned
            .iter()
            .position(|entry| entry.matches(identity))
            .ok_or_else(|| LayoutError::UnknownEntry(identity.to_string()))?;
        self.available.retain(|entry| !entry.matches(identity));
        Ok(self.owned.remove(position))
    }
}

fn add_units(current: u32, extra: u32, entry: &EquipmentEntry) -> Result<u32, LayoutError> {
    current
        .checked_add(extra)
        .filter(|total| *total <= MAX_UNITS)
        .ok_or_else(|| {
            LayoutError::Validation(format!(
                "{} would exceed {} units (currently {}, adding {})",
                entry.identity(), MAX_UNITS, current, extra
            ))
        })
}

/// Sets the identity's quantity, keeping the metadata of the first entry seen.
fn upsert(list: &mut Vec<EquipmentEntry>, entry: &EquipmentEntry, quantity: u32) {
    match list.iter_mut().find(|e| e.matches(&entry.identity())) {
        Some(existing) => existing.quantity = quantity,
        None => list.push(entry.with_quantity(quantity)),
    }
}

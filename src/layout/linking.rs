// src/layout/linking.rs
//! Linked groups: sets of identities that are always placed together, and the
//! selection an operator places with.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use crate::error::LayoutError;
use crate::layout::pool::EquipmentPool;
use crate::models::{DeviceRef, EquipmentIdentity, GridCell, StandbyDevice};

// ==================== SELECTION ====================

/// What goes into a cell when the operator clicks or drags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Selection {
    /// An identity that belongs to no linked group.
    Standalone { device: EquipmentIdentity },
    /// One full set of a linked group.
    Linked { group: usize },
    /// One surplus unit of a linked group's member.
    Standby { group: usize, device: EquipmentIdentity },
}

/// How many more placements the pool can feed.
#[derive(Debug, Clone)]
enum Supply {
    EachDevice,
    Surplus { group_members: Vec<EquipmentIdentity> },
}

/// A selection checked against the registry, ready for the grid.
#[derive(Debug, Clone)]
pub struct ResolvedSelection {
    pub label: String,
    pub devices: Vec<DeviceRef>,
    supply: Supply,
}

impl ResolvedSelection {
    pub fn single(device: DeviceRef) -> Self {
        Self {
            label: device.device_type.clone(),
            devices: vec![device],
            supply: Supply::EachDevice,
        }
    }

    /// Units of each identity one placement takes.
    pub fn demand(&self) -> BTreeMap<EquipmentIdentity, u32> {
        let mut demand = BTreeMap::new();
        for device in &self.devices {
            *demand.entry(device.identity()).or_insert(0) += 1;
        }
        demand
    }

    /// Complete placements the pool can still supply right now.
    pub fn capacity(&self, pool: &EquipmentPool) -> u32 {
        match &self.supply {
            Supply::EachDevice => self
                .demand()
                .iter()
                .map(|(identity, per_cell)| pool.available_quantity(identity) / per_cell)
                .min()
                .unwrap_or(0),
            Supply::Surplus { group_members } => {
                let sets = min_available(group_members, pool);
                self.devices
                    .first()
                    .map(|device| pool.available_quantity(&device.identity()).saturating_sub(sets))
                    .unwrap_or(0)
            }
        }
    }
}

fn min_available(identities: &[EquipmentIdentity], pool: &EquipmentPool) -> u32 {
    identities
        .iter()
        .map(|identity| pool.available_quantity(identity))
        .min()
        .unwrap_or(0)
}

// ==================== LINKED GROUP ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedGroup {
    pub members: Vec<DeviceRef>,
}

impl LinkedGroup {
    pub fn identities(&self) -> Vec<EquipmentIdentity> {
        self.members.iter().map(DeviceRef::identity).collect()
    }

    fn key(&self) -> BTreeSet<EquipmentIdentity> {
        self.identities().into_iter().collect()
    }

    pub fn contains(&self, identity: &EquipmentIdentity) -> bool {
        self.members.iter().any(|member| &member.identity() == identity)
    }
}

// ==================== REGISTRY ====================

#[derive(Debug, Clone, Default)]
pub struct LinkedGroupRegistry {
    groups: Vec<LinkedGroup>,
}

impl LinkedGroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild groups from stations that hold more than one device. A station
    /// whose devices overlap an already rebuilt, different group is skipped.
    pub fn from_cells<'a>(cells: impl IntoIterator<Item = &'a GridCell>) -> Self {
        let mut registry = Self::new();
        for cell in cells {
            let devices = cell.devices();
            if devices.len() < 2 {
                continue;
            }
            let group = LinkedGroup { members: devices.to_vec() };
            let key = group.key();
            if key.len() != devices.len() {
                log::warn!(
                    "Station {} lists the same device twice; not relinking",
                    cell.id.as_deref().unwrap_or("?")
                );
                continue;
            }
            if registry.groups.iter().any(|existing| existing.key() == key) {
                continue;
            }
            if let Some(identity) = key.iter().find(|identity| registry.group_of(identity).is_some()) {
                log::warn!(
                    "Station {} links {} which already belongs to another group; not relinking",
                    cell.id.as_deref().unwrap_or("?"),
                    identity
                );
                continue;
            }
            registry.groups.push(group);
        }
        registry
    }

    pub fn groups(&self) -> &[LinkedGroup] {
        &self.groups
    }

    pub fn get(&self, index: usize) -> Result<&LinkedGroup, LayoutError> {
        self.groups
            .get(index)
            .ok_or_else(|| LayoutError::Validation(format!("Linked group {} does not exist", index)))
    }

    pub fn group_of(&self, identity: &EquipmentIdentity) -> Option<usize> {
        self.groups.iter().position(|group| group.contains(identity))
    }

    pub fn create_group(&mut self, members: Vec<DeviceRef>, pool: &EquipmentPool) -> Result<usize, LayoutError> {
        if members.is_empty() {
            return Err(LayoutError::Validation(
                "A linked group needs at least one device".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for member in &members {
            let identity = member.identity();
            if !pool.owns(&identity) {
                return Err(LayoutError::Validation(format!(
                    "{} is not part of this lab's equipment",
                    identity
                )));
            }
            if let Some(index) = self.group_of(&identity) {
                return Err(LayoutError::Validation(format!(
                    "{} is already linked in group {}",
                    identity, index
                )));
            }
            if !seen.insert(identity.clone()) {
                return Err(LayoutError::Validation(format!(
                    "{} appears twice in the group",
                    identity
                )));
            }
        }

        self.groups.push(LinkedGroup { members });
        Ok(self.groups.len() - 1)
    }

    /// Members go back to being standalone; cells already placed are kept.
    pub fn remove_group(&mut self, index: usize) -> Result<LinkedGroup, LayoutError> {
        self.get(index)?;
        Ok(self.groups.remove(index))
    }

    pub fn available_sets(&self, index: usize, pool: &EquipmentPool) -> Result<u32, LayoutError> {
        let group = self.get(index)?;
        Ok(min_available(&group.identities(), pool))
    }

    /// Members whose pool count exceeds the group's set count, with the excess.
    pub fn standby(&self, index: usize, pool: &EquipmentPool) -> Result<Vec<StandbyDevice>, LayoutError> {
        let sets = self.available_sets(index, pool)?;
        let group = self.get(index)?;
        Ok(group
            .members
            .iter()
            .filter_map(|member| {
                let surplus = pool.available_quantity(&member.identity()).saturating_sub(sets);
                (surplus > 0).then(|| StandbyDevice {
                    device: member.clone(),
                    quantity: surplus,
                })
            })
            .collect())
    }

    pub fn resolve(&self, selection: &Selection, pool: &EquipmentPool) -> Result<ResolvedSelection, LayoutError> {
        match selection {
            Selection::Standalone { device } => {
                if let Some(index) = self.group_of(device) {
                    return Err(LayoutError::Validation(format!(
                        "{} is linked in group {}; place the group or its standby units",
                        device, index
                    )));
                }
                let entry = pool.owned_entry(device).ok_or_else(|| {
                    LayoutError::Validation(format!("{} is not part of this lab's equipment", device))
                })?;
                Ok(ResolvedSelection::single(DeviceRef::from(entry)))
            }
            Selection::Linked { group } => {
                let linked = self.get(*group)?;
                Ok(ResolvedSelection {
                    label: linked
                        .members
                        .first()
                        .map(|member| member.device_type.clone())
                        .unwrap_or_default(),
                    devices: linked.members.clone(),
                    supply: Supply::EachDevice,
                })
            }
            Selection::Standby { group, device } => {
                let linked = self.get(*group)?;
                let member = linked
                    .members
                    .iter()
                    .find(|member| &member.identity() == device)
                    .ok_or_else(|| {
                        LayoutError::Validation(format!("{} is not a member of group {}", device, group))
                    })?;
                Ok(ResolvedSelection {
                    label: member.device_type.clone(),
                    devices: vec![member.clone()],
                    supply: Supply::Surplus {
                        group_members: linked.identities(),
                    },
                })
            }
        }
    }
}

// src/layout/mod.rs
//! In-memory model of one lab: equipment pool, linked groups and seating grid.
//!
//! `LabLayout` is a plain data structure. Every operation either succeeds
//! completely or returns an error with nothing changed.

pub mod grid;
pub mod linking;
pub mod os_tags;
pub mod pool;
pub mod sequencer;

pub use grid::SeatingGrid;
pub use linking::{LinkedGroup, LinkedGroupRegistry, ResolvedSelection, Selection};
pub use pool::EquipmentPool;

use crate::error::LayoutError;
use crate::models::{
    CellPosition, DeviceRef, EquipmentEntry, EquipmentIdentity, FillReport, LabSnapshot, LabView,
    LinkedGroupView,
};

#[derive(Debug, Clone)]
pub struct LabLayout {
    lab_number: String,
    lab_name: String,
    pool: EquipmentPool,
    links: LinkedGroupRegistry,
    grid: SeatingGrid,
    /// Tags currently applied in bulk; fresh stations start with these.
    bulk_os: Vec<String>,
}

impl LabLayout {
    pub fn new(
        lab_number: &str,
        lab_name: &str,
        code_prefix: &str,
        rows: usize,
        columns: usize,
    ) -> Result<Self, LayoutError> {
        Ok(Self {
            lab_number: lab_number.to_string(),
            lab_name: lab_name.to_string(),
            pool: EquipmentPool::new(),
            links: LinkedGroupRegistry::new(),
            grid: SeatingGrid::new(rows, columns, code_prefix)?,
            bulk_os: Vec::new(),
        })
    }

    /// Load-time reconciliation: linked groups and available quantities are
    /// derived once from what is on the grid versus what the lab owns.
    pub fn reconcile(snapshot: LabSnapshot) -> Result<Self, LayoutError> {
        let grid = SeatingGrid::from_arrangement(snapshot.seating_arrangement, &snapshot.assigned_code_prefix)?;
        let pool = EquipmentPool::reconcile(snapshot.equipment, &grid.placed_counts())?;
        let links = LinkedGroupRegistry::from_cells(grid.cells().iter().flatten());

        log::debug!(
            "Reconciled lab {}: {} stations, {} linked groups, {} available entries",
            snapshot.lab_number,
            grid.occupied_count(),
            links.groups().len(),
            pool.available().len()
        );

        Ok(Self {
            lab_number: snapshot.lab_number,
            lab_name: snapshot.lab_name,
            pool,
            links,
            grid,
            bulk_os: Vec::new(),
        })
    }

    pub fn snapshot(&self) -> LabSnapshot {
        LabSnapshot {
            lab_number: self.lab_number.clone(),
            lab_name: self.lab_name.clone(),
            assigned_code_prefix: self.grid.code_prefix().to_string(),
            equipment: self.pool.owned().to_vec(),
            seating_arrangement: self.grid.to_arrangement(),
        }
    }

    pub fn view(&self) -> LabView {
        let linked_groups = (0..self.links.groups().len())
            .filter_map(|index| {
                let group = self.links.get(index).ok()?;
                Some(LinkedGroupView {
                    index,
                    members: group.members.clone(),
                    available_sets: self.links.available_sets(index, &self.pool).ok()?,
                    standby: self.links.standby(index, &self.pool).ok()?,
                })
            })
            .collect();

        LabView {
            lab_number: self.lab_number.clone(),
            lab_name: self.lab_name.clone(),
            assigned_code_prefix: self.grid.code_prefix().to_string(),
            equipment: self.pool.owned().to_vec(),
            available: self.pool.available().to_vec(),
            standalone: self
                .pool
                .available()
                .iter()
                .filter(|entry| self.links.group_of(&entry.identity()).is_none())
                .cloned()
                .collect(),
            linked_groups,
            seating_arrangement: self.grid.to_arrangement(),
            stations: self.station_count(),
            next_sequence: self.grid.next_sequence(),
            bulk_os: self.bulk_os.clone(),
        }
    }

    pub fn lab_number(&self) -> &str {
        &self.lab_number
    }

    pub fn pool(&self) -> &EquipmentPool {
        &self.pool
    }

    pub fn links(&self) -> &LinkedGroupRegistry {
        &self.links
    }

    pub fn grid(&self) -> &SeatingGrid {
        &self.grid
    }

    pub fn station_count(&self) -> usize {
        self.grid.occupied_count()
    }

    // ==================== DETAILS ====================

    pub fn rename(&mut self, lab_name: &str) {
        self.lab_name = lab_name.to_string();
    }

    /// A new prefix rewrites every assigned code.
    pub fn set_code_prefix(&mut self, code_prefix: &str) {
        self.grid.set_code_prefix(code_prefix);
    }

    // ==================== EQUIPMENT ====================

    pub fn add_equipment(&mut self, entry: &EquipmentEntry) -> Result<(), LayoutError> {
        self.pool.add_entry(entry)
    }

    /// Refused while any unit of the identity is still on the grid. A removed
    /// identity also leaves its linked group, if any.
    pub fn remove_equipment(&mut self, identity: &EquipmentIdentity) -> Result<EquipmentEntry, LayoutError> {
        if !self.pool.owns(identity) {
            return Err(LayoutError::UnknownEntry(identity.to_string()));
        }
        let placed = self.grid.units_placed(identity);
        if placed > 0 {
            return Err(LayoutError::EntryInUse { placed });
        }
        if let Some(index) = self.links.group_of(identity) {
            self.links.remove_group(index)?;
        }
        self.pool.remove_entry_entirely(identity)
    }

    // ==================== LINKED GROUPS ====================

    pub fn create_link(&mut self, members: &[EquipmentIdentity]) -> Result<usize, LayoutError> {
        let devices = members
            .iter()
            .map(|identity| {
                self.pool
                    .owned_entry(identity)
                    .map(DeviceRef::from)
                    .unwrap_or_else(|| DeviceRef::from(identity))
            })
            .collect();
        self.links.create_group(devices, &self.pool)
    }

    pub fn remove_link(&mut self, index: usize) -> Result<LinkedGroup, LayoutError> {
        self.links.remove_group(index)
    }

    // ==================== GRID ====================

    pub fn resize(&mut self, rows: usize, columns: usize) -> Result<usize, LayoutError> {
        self.grid.resize(rows, columns, &mut self.pool)
    }

    pub fn place(&mut self, row: usize, col: usize, selection: &Selection) -> Result<(), LayoutError> {
        let resolved = self.links.resolve(selection, &self.pool)?;
        self.grid.place_single(row, col, &resolved, &mut self.pool, &self.bulk_os)
    }

    pub fn fill(&mut self, from: CellPosition, to: CellPosition, selection: &Selection) -> Result<FillReport, LayoutError> {
        let resolved = self.links.resolve(selection, &self.pool)?;
        self.grid.place_rectangle(from, to, &resolved, &mut self.pool, &self.bulk_os)
    }

    pub fn remove_cell(&mut self, row: usize, col: usize) -> Result<bool, LayoutError> {
        self.grid.remove_cell(row, col, &mut self.pool)
    }

    pub fn clear_all(&mut self) -> usize {
        self.grid.clear_all(&mut self.pool)
    }

    /// Device identities bound to a station, for issue reporting.
    pub fn cell_devices(&self, row: usize, col: usize) -> Result<Vec<DeviceRef>, LayoutError> {
        Ok(self.grid.cell(row, col)?.devices().to_vec())
    }

    // ==================== OS TAGS ====================

    pub fn apply_bulk_os(&mut self, tag: &str, add: bool) -> usize {
        os_tags::set_tag(&mut self.bulk_os, tag, add);
        os_tags::apply_bulk(self.grid.cells_mut(), tag, add)
    }

    pub fn toggle_os(&mut self, row: usize, col: usize, tag: &str) -> Result<bool, LayoutError> {
        os_tags::toggle(self.grid.cell_mut(row, col)?, tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeatingArrangement;

    fn entry(device_type: &str, brand: &str, bill_id: i64, quantity: u32) -> EquipmentEntry {
        EquipmentEntry {
            device_type: device_type.to_string(),
            quantity,
            brand: Some(brand.to_string()),
            model: Some("X".to_string()),
            specification: Some("spec".to_string()),
            unit_price: Some(1200.0),
            purchase_date: Some("2024-03-01".to_string()),
            invoice_number: Some(format!("INV-{}", bill_id)),
            bill_id: Some(bill_id),
        }
    }

    fn pos(row: usize, col: usize) -> CellPosition {
        CellPosition { row, col }
    }

    fn lab() -> LabLayout {
        LabLayout::new("309", "Computer Lab", "apsit/it/309", 3, 3).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_dimensions() {
        assert!(LabLayout::new("1", "x", "p", 0, 4).is_err());
    }

    #[test]
    fn test_standalone_selection_round_trip() {
        let pc = entry("PC", "Dell", 1, 3);
        let mut lab = lab();
        lab.add_equipment(&pc).unwrap();

        lab.place(0, 0, &Selection::Standalone { device: pc.identity() }).unwrap();
        let cell = lab.grid().cell(0, 0).unwrap();
        assert_eq!(cell.id.as_deref(), Some("C001"));
        assert_eq!(cell.device_group.as_ref().unwrap().assigned_code, "apsit/it/309/1");
        assert_eq!(lab.cell_devices(0, 0).unwrap()[0].invoice_number.as_deref(), Some("INV-1"));
        assert_eq!(lab.pool().available_quantity(&pc.identity()), 2);
    }

    #[test]
    fn test_bulk_os_applies_to_later_placements() {
        let pc = entry("PC", "Dell", 1, 3);
        let mut lab = lab();
        lab.add_equipment(&pc).unwrap();
        let selection = Selection::Standalone { device: pc.identity() };

        lab.place(0, 0, &selection).unwrap();
        assert_eq!(lab.apply_bulk_os("Windows", true), 1);
        lab.place(0, 1, &selection).unwrap();
        assert_eq!(lab.grid().cell(0, 1).unwrap().os, vec!["Windows".to_string()]);

        lab.apply_bulk_os("Windows", false);
        lab.place(0, 2, &selection).unwrap();
        assert!(lab.grid().cells().iter().flatten().all(|c| c.os.is_empty()));
    }

    #[test]
    fn test_toggle_os_only_on_stations() {
        let pc = entry("PC", "Dell", 1, 1);
        let mut lab = lab();
        lab.add_equipment(&pc).unwrap();
        lab.place(1, 1, &Selection::Standalone { device: pc.identity() }).unwrap();

        assert!(lab.toggle_os(1, 1, "Linux").unwrap());
        assert!(lab.toggle_os(0, 0, "Linux").is_err());
        assert!(lab.toggle_os(9, 9, "Linux").is_err());
    }

    #[test]
    fn test_remove_equipment_refused_while_placed() {
        let pc = entry("PC", "Dell", 1, 2);
        let mut lab = lab();
        lab.add_equipment(&pc).unwrap();
        lab.place(0, 0, &Selection::Standalone { device: pc.identity() }).unwrap();

        assert!(matches!(
            lab.remove_equipment(&pc.identity()),
            Err(LayoutError::EntryInUse { placed: 1 })
        ));
        assert_eq!(lab.pool().total_owned(&pc.identity()), 2);

        lab.remove_cell(0, 0).unwrap();
        lab.remove_equipment(&pc.identity()).unwrap();
        assert!(lab.pool().owned().is_empty());
        assert!(matches!(
            lab.remove_equipment(&pc.identity()),
            Err(LayoutError::UnknownEntry(_))
        ));
    }

    #[test]
    fn test_removing_linked_member_dissolves_its_group() {
        let pc = entry("PC", "Dell", 1, 2);
        let monitor = entry("Monitor", "LG", 2, 2);
        let mut lab = lab();
        lab.add_equipment(&pc).unwrap();
        lab.add_equipment(&monitor).unwrap();
        lab.create_link(&[pc.identity(), monitor.identity()]).unwrap();

        lab.remove_equipment(&monitor.identity()).unwrap();
        assert!(lab.links().groups().is_empty());
        lab.place(0, 0, &Selection::Standalone { device: pc.identity() }).unwrap();
    }

    #[test]
    fn test_view_splits_standalone_linked_and_standby() {
        let pc = entry("PC", "Dell", 1, 4);
        let monitor = entry("Monitor", "LG", 2, 2);
        let projector = entry("Projector", "Epson", 3, 1);
        let mut lab = lab();
        for e in [&pc, &monitor, &projector] {
            lab.add_equipment(e).unwrap();
        }
        lab.create_link(&[pc.identity(), monitor.identity()]).unwrap();
        lab.place(0, 0, &Selection::Linked { group: 0 }).unwrap();

        let view = lab.view();
        assert_eq!(view.stations, 1);
        assert_eq!(view.next_sequence, 2);
        assert_eq!(view.standalone.len(), 1);
        assert_eq!(view.standalone[0].device_type, "Projector");
        assert_eq!(view.linked_groups[0].available_sets, 1);
        assert_eq!(view.linked_groups[0].standby[0].quantity, 2);
    }

    #[test]
    fn test_standby_placement_consumes_surplus_only() {
        let pc = entry("PC", "Dell", 1, 3);
        let monitor = entry("Monitor", "LG", 2, 1);
        let mut lab = lab();
        lab.add_equipment(&pc).unwrap();
        lab.add_equipment(&monitor).unwrap();
        lab.create_link(&[pc.identity(), monitor.identity()]).unwrap();

        let standby = Selection::Standby { group: 0, device: pc.identity() };
        let report = lab.fill(pos(0, 0), pos(0, 2), &standby).unwrap();
        assert_eq!((report.placed, report.requested), (2, 3));
        assert_eq!(lab.pool().available_quantity(&pc.identity()), 1);
        assert_eq!(lab.links().available_sets(0, lab.pool()).unwrap(), 1);

        lab.place(1, 0, &Selection::Linked { group: 0 }).unwrap();
        assert_eq!(lab.station_count(), 3);
    }

    #[test]
    fn test_prefix_change_renumbers_codes() {
        let pc = entry("PC", "Dell", 1, 2);
        let mut lab = lab();
        lab.add_equipment(&pc).unwrap();
        lab.fill(pos(0, 0), pos(0, 1), &Selection::Standalone { device: pc.identity() }).unwrap();

        lab.set_code_prefix("apsit/cs/101");
        let codes: Vec<String> = lab
            .grid()
            .cells()
            .iter()
            .flatten()
            .filter_map(|c| c.device_group.as_ref().map(|g| g.assigned_code.clone()))
            .collect();
        assert_eq!(codes, vec!["apsit/cs/101/1", "apsit/cs/101/2"]);
    }

    #[test]
    fn test_snapshot_reconcile_round_trip() {
        let pc = entry("PC", "Dell", 1, 5);
        let monitor = entry("Monitor", "LG", 2, 3);
        let projector = entry("Projector", "Epson", 3, 2);
        let mut lab = lab();
        for e in [&pc, &monitor, &projector] {
            lab.add_equipment(e).unwrap();
        }
        lab.create_link(&[pc.identity(), monitor.identity()]).unwrap();
        lab.fill(pos(0, 0), pos(0, 2), &Selection::Linked { group: 0 }).unwrap();
        lab.place(1, 0, &Selection::Standby { group: 0, device: pc.identity() }).unwrap();
        lab.place(2, 2, &Selection::Standalone { device: projector.identity() }).unwrap();

        let snapshot = lab.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let reloaded = LabLayout::reconcile(serde_json::from_str(&json).unwrap()).unwrap();

        for e in [&pc, &monitor, &projector] {
            let id = e.identity();
            assert_eq!(
                reloaded.pool().available_quantity(&id),
                e.quantity - reloaded.grid().units_placed(&id)
            );
            assert_eq!(reloaded.pool().available_quantity(&id), lab.pool().available_quantity(&id));
        }
        assert_eq!(reloaded.links().groups().len(), 1);
        assert_eq!(reloaded.links().groups()[0].identities(), vec![pc.identity(), monitor.identity()]);
        assert_eq!(reloaded.grid().to_arrangement(), lab.grid().to_arrangement());
    }

    #[test]
    fn test_reconcile_deduplicates_groups() {
        let pc = entry("PC", "Dell", 1, 2);
        let monitor = entry("Monitor", "LG", 2, 2);
        let mut arrangement = SeatingArrangement::empty(1, 2);
        arrangement.grid[0][0].occupy("PC", vec![DeviceRef::from(&pc), DeviceRef::from(&monitor)], &[]);
        arrangement.grid[0][1].occupy("Monitor", vec![DeviceRef::from(&monitor), DeviceRef::from(&pc)], &[]);

        let lab = LabLayout::reconcile(LabSnapshot {
            lab_number: "1".to_string(),
            lab_name: "Lab".to_string(),
            assigned_code_prefix: "p".to_string(),
            equipment: vec![pc.clone(), monitor.clone()],
            seating_arrangement: arrangement,
        })
        .unwrap();
        assert_eq!(lab.links().groups().len(), 1);
        assert!(lab.pool().available().is_empty());
        assert_eq!(lab.grid().cell(0, 1).unwrap().id.as_deref(), Some("C002"));
    }
}

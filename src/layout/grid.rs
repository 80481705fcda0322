// src/layout/grid.rs
//! The seating grid: station layout plus atomic placement and removal.
//!
//! Every cell is either Empty or Occupied by a full device group; there is no
//! partial state. Row-major order is used for filling and for numbering.

use std::collections::BTreeMap;
use crate::error::LayoutError;
use crate::layout::linking::ResolvedSelection;
use crate::layout::pool::EquipmentPool;
use crate::layout::sequencer;
use crate::models::{
    CellPosition, DeviceGroup, DeviceRef, EquipmentIdentity, FillReport, GridCell, SeatingArrangement,
};

#[derive(Debug, Clone)]
pub struct SeatingGrid {
    rows: usize,
    columns: usize,
    cells: Vec<Vec<GridCell>>,
    code_prefix: String,
    next_sequence: u32,
}

impl SeatingGrid {
    pub fn new(rows: usize, columns: usize, code_prefix: &str) -> Result<Self, LayoutError> {
        check_dimensions(rows, columns)?;
        Ok(Self {
            rows,
            columns,
            cells: SeatingArrangement::empty(rows, columns).grid,
            code_prefix: code_prefix.to_string(),
            next_sequence: 1,
        })
    }

    /// Takes a persisted arrangement, pads or trims ragged rows to the stated
    /// dimensions, reads stations with no devices as Empty and re-derives
    /// station codes.
    pub fn from_arrangement(arrangement: SeatingArrangement, code_prefix: &str) -> Result<Self, LayoutError> {
        let mut grid = Self::new(arrangement.rows, arrangement.columns, code_prefix)?;
        if !arrangement.is_well_formed() {
            log::warn!(
                "Persisted grid does not match its {}x{} dimensions; normalising",
                arrangement.rows, arrangement.columns
            );
        }
        for (r, row) in arrangement.grid.into_iter().enumerate().take(grid.rows) {
            for (c, mut cell) in row.into_iter().enumerate().take(grid.columns) {
                if cell.devices().is_empty() {
                    cell = GridCell::empty();
                }
                grid.cells[r][c] = cell;
            }
        }
        grid.resequence();
        Ok(grid)
    }

    pub fn to_arrangement(&self) -> SeatingArrangement {
        SeatingArrangement {
            rows: self.rows,
            columns: self.columns,
            grid: self.cells.clone(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cells(&self) -> &[Vec<GridCell>] {
        &self.cells
    }

    pub fn code_prefix(&self) -> &str {
        &self.code_prefix
    }

    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().flatten().filter(|cell| cell.is_occupied()).count()
    }

    pub fn cell(&self, row: usize, col: usize) -> Result<&GridCell, LayoutError> {
        self.check_bounds(row, col)?;
        Ok(&self.cells[row][col])
    }

    pub(crate) fn cell_mut(&mut self, row: usize, col: usize) -> Result<&mut GridCell, LayoutError> {
        self.check_bounds(row, col)?;
        Ok(&mut self.cells[row][col])
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Vec<GridCell>] {
        &mut self.cells
    }

    pub fn set_code_prefix(&mut self, code_prefix: &str) {
        self.code_prefix = code_prefix.to_string();
        self.resequence();
    }

    /// Units of each identity currently bound to stations.
    pub fn placed_counts(&self) -> BTreeMap<EquipmentIdentity, u32> {
        let mut counts = BTreeMap::new();
        for device in self.cells.iter().flatten().flat_map(GridCell::devices) {
            *counts.entry(device.identity()).or_insert(0) += 1;
        }
        counts
    }

    pub fn units_placed(&self, identity: &EquipmentIdentity) -> u32 {
        self.cells
            .iter()
            .flatten()
            .flat_map(GridCell::devices)
            .filter(|device| &device.identity() == identity)
            .count() as u32
    }

    /// Rebuilds to new dimensions. Cells in both shapes keep their content;
    /// stations cut off by a shrink go back to the pool before this returns.
    /// Returns how many stations were cut off.
    pub fn resize(&mut self, rows: usize, columns: usize, pool: &mut EquipmentPool) -> Result<usize, LayoutError> {
        check_dimensions(rows, columns)?;

        let mut resized = SeatingArrangement::empty(rows, columns).grid;
        let mut dropped = Vec::new();
        for (r, row) in std::mem::take(&mut self.cells).into_iter().enumerate() {
            for (c, mut cell) in row.into_iter().enumerate() {
                if r < rows && c < columns {
                    resized[r][c] = cell;
                } else if let Some(group) = cell.take() {
                    dropped.push(group);
                }
            }
        }

        let cut = dropped.len();
        return_to_pool(dropped, pool);
        self.rows = rows;
        self.columns = columns;
        self.cells = resized;
        self.resequence();
        Ok(cut)
    }

    pub fn place_single(
        &mut self,
        row: usize,
        col: usize,
        selection: &ResolvedSelection,
        pool: &mut EquipmentPool,
        os: &[String],
    ) -> Result<(), LayoutError> {
        self.check_bounds(row, col)?;
        if self.cells[row][col].is_occupied() {
            return Err(LayoutError::Occupied { row, col });
        }
        let capacity = selection.capacity(pool);
        if capacity == 0 {
            return Err(LayoutError::InsufficientStock { available: capacity, requested: 1 });
        }
        self.occupy(row, col, selection, pool, os)?;
        self.resequence();
        Ok(())
    }

    /// Fills the Empty cells of the rectangle spanned by two corners, row-major,
    /// until the pool runs out of complete sets. Running out is not an error.
    pub fn place_rectangle(
        &mut self,
        from: CellPosition,
        to: CellPosition,
        selection: &ResolvedSelection,
        pool: &mut EquipmentPool,
        os: &[String],
    ) -> Result<FillReport, LayoutError> {
        self.check_bounds(from.row, from.col)?;
        self.check_bounds(to.row, to.col)?;

        let (top, bottom) = (from.row.min(to.row), from.row.max(to.row));
        let (left, right) = (from.col.min(to.col), from.col.max(to.col));

        let targets: Vec<(usize, usize)> = (top..=bottom)
            .flat_map(|r| (left..=right).map(move |c| (r, c)))
            .filter(|&(r, c)| !self.cells[r][c].is_occupied())
            .collect();

        let mut placed = 0;
        for &(r, c) in &targets {
            if selection.capacity(pool) == 0 {
                break;
            }
            self.occupy(r, c, selection, pool, os)?;
            placed += 1;
        }

        if placed > 0 {
            self.resequence();
        }
        Ok(FillReport {
            requested: targets.len(),
            placed,
        })
    }

    /// Returns false when the cell was already Empty.
    pub fn remove_cell(&mut self, row: usize, col: usize, pool: &mut EquipmentPool) -> Result<bool, LayoutError> {
        let group = match self.cell_mut(row, col)?.take() {
            Some(group) => group,
            None => return Ok(false),
        };
        for device in &group.devices {
            pool.restore_available(device, 1);
        }
        self.resequence();
        Ok(true)
    }

    /// Empties every station, returning devices to the pool once per identity.
    pub fn clear_all(&mut self, pool: &mut EquipmentPool) -> usize {
        let groups: Vec<DeviceGroup> = self
            .cells
            .iter_mut()
            .flat_map(|row| row.iter_mut())
            .filter_map(GridCell::take)
            .collect();
        let cleared = groups.len();
        return_to_pool(groups, pool);
        self.resequence();
        cleared
    }

    fn occupy(
        &mut self,
        row: usize,
        col: usize,
        selection: &ResolvedSelection,
        pool: &mut EquipmentPool,
        os: &[String],
    ) -> Result<(), LayoutError> {
        let demand = selection.demand();
        for (identity, &requested) in &demand {
            let available = pool.available_quantity(identity);
            if available < requested {
                return Err(LayoutError::InsufficientStock { available, requested });
            }
        }
        for (identity, &n) in &demand {
            pool.reduce_available(identity, n)?;
        }
        self.cells[row][col].occupy(&selection.label, selection.devices.clone(), os);
        Ok(())
    }

    fn resequence(&mut self) {
        self.next_sequence = sequencer::resequence(&mut self.cells, &self.code_prefix);
    }

    fn check_bounds(&self, row: usize, col: usize) -> Result<(), LayoutError> {
        if row >= self.rows || col >= self.columns {
            return Err(LayoutError::Validation(format!(
                "Cell ({}, {}) is outside the {}x{} grid",
                row, col, self.rows, self.columns
            )));
        }
        Ok(())
    }
}

fn check_dimensions(rows: usize, columns: usize) -> Result<(), LayoutError> {
    if rows == 0 || columns == 0 {
        return Err(LayoutError::Validation(format!(
            "Grid dimensions must be positive (got {}x{})",
            rows, columns
        )));
    }
    Ok(())
}

fn return_to_pool(groups: Vec<DeviceGroup>, pool: &mut EquipmentPool) {
    let mut returned: BTreeMap<EquipmentIdentity, (DeviceRef, u32)> = BTreeMap::new();
    for device in groups.into_iter().flat_map(|group| group.devices) {
        returned
            .entry(device.identity())
            .or_insert_with(|| (device.clone(), 0))
            .1 += 1;
    }
    for (device, count) in returned.values() {
        pool.restore_available(device, *count);
    }
}

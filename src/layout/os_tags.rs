// src/layout/os_tags.rs
//! OS tags on occupied stations. Empty cells never carry tags.

use crate::error::LayoutError;
use crate::models::GridCell;

/// Adds or removes `tag` on every occupied cell. Returns how many cells changed.
pub fn apply_bulk(grid: &mut [Vec<GridCell>], tag: &str, add: bool) -> usize {
    let mut changed = 0;
    for cell in grid.iter_mut().flat_map(|row| row.iter_mut()) {
        if cell.is_occupied() && set_tag(&mut cell.os, tag, add) {
            changed += 1;
        }
    }
    changed
}

/// Flips one tag on one occupied cell. Returns whether the tag is now present.
pub fn toggle(cell: &mut GridCell, tag: &str) -> Result<bool, LayoutError> {
    if !cell.is_occupied() {
        return Err(LayoutError::Validation(
            "OS tags can only be set on an occupied station".to_string(),
        ));
    }
    let present = cell.os.iter().any(|os| os == tag);
    set_tag(&mut cell.os, tag, !present);
    Ok(!present)
}

/// Idempotent set insert/remove keeping first-insertion order.
pub fn set_tag(tags: &mut Vec<String>, tag: &str, add: bool) -> bool {
    let present = tags.iter().any(|os| os == tag);
    match (add, present) {
        (true, false) => {
            tags.push(tag.to_string());
            true
        }
        (false, true) => {
            tags.retain(|os| os != tag);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceRef, SeatingArrangement};

    fn occupied() -> GridCell {
        let mut cell = GridCell::empty();
        let device = DeviceRef {
            device_type: "PC".to_string(),
            brand: None,
            model: None,
            bill_id: None,
            invoice_number: None,
        };
        cell.occupy("PC", vec![device], &[]);
        cell
    }

    #[test]
    fn test_bulk_skips_empty_cells() {
        let mut arrangement = SeatingArrangement::empty(2, 2);
        arrangement.grid[0][0] = occupied();
        arrangement.grid[1][1] = occupied();

        assert_eq!(apply_bulk(&mut arrangement.grid, "Linux", true), 2);
        assert_eq!(arrangement.grid[0][0].os, vec!["Linux".to_string()]);
        assert!(arrangement.grid[0][1].os.is_empty());
        assert!(arrangement.grid[1][0].os.is_empty());
    }

    #[test]
    fn test_bulk_is_idempotent() {
        let mut arrangement = SeatingArrangement::empty(1, 2);
        arrangement.grid[0][0] = occupied();

        apply_bulk(&mut arrangement.grid, "Windows", true);
        assert_eq!(apply_bulk(&mut arrangement.grid, "Windows", true), 0);
        assert_eq!(arrangement.grid[0][0].os.len(), 1);

        assert_eq!(apply_bulk(&mut arrangement.grid, "Windows", false), 1);
        assert_eq!(apply_bulk(&mut arrangement.grid, "Windows", false), 0);
        assert!(arrangement.grid[0][0].os.is_empty());
    }

    #[test]
    fn test_toggle() {
        let mut cell = occupied();
        assert!(toggle(&mut cell, "Other").unwrap());
        assert!(!toggle(&mut cell, "Other").unwrap());
        assert!(cell.os.is_empty());

        let mut empty = GridCell::empty();
        assert!(toggle(&mut empty, "Other").is_err());
        assert!(empty.os.is_empty());
    }
}

// src/layout/sequencer.rs
//! Station codes. Recomputed from scratch, row-major, after every structural
//! change; previous numbering is never carried over.

use crate::models::GridCell;

pub fn station_id(sequence: u32) -> String {
    format!("C{:03}", sequence)
}

pub fn assigned_code(prefix: &str, sequence: u32) -> String {
    format!("{}/{}", prefix, sequence)
}

/// Numbers occupied cells 1..N and clears ids on empty ones. Returns the next
/// free sequence number (display hint only).
pub fn resequence(grid: &mut [Vec<GridCell>], prefix: &str) -> u32 {
    let mut sequence = 1;
    for cell in grid.iter_mut().flat_map(|row| row.iter_mut()) {
        match cell.device_group.as_mut() {
            Some(group) => {
                group.assigned_code = assigned_code(prefix, sequence);
                cell.id = Some(station_id(sequence));
                sequence += 1;
            }
            None => cell.id = None,
        }
    }
    sequence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceRef, SeatingArrangement};

    fn occupy(cell: &mut GridCell) {
        let device = DeviceRef {
            device_type: "PC".to_string(),
            brand: None,
            model: None,
            bill_id: Some(1),
            invoice_number: None,
        };
        cell.occupy("PC", vec![device], &[]);
    }

    #[test]
    fn test_codes_follow_row_major_order() {
        let mut arrangement = SeatingArrangement::empty(3, 3);
        for (r, c) in [(2, 0), (0, 2), (1, 1), (0, 0)] {
            occupy(&mut arrangement.grid[r][c]);
        }

        let next = resequence(&mut arrangement.grid, "apsit/it/309");
        assert_eq!(next, 5);

        let codes: Vec<(Option<String>, String)> = arrangement
            .grid
            .iter()
            .flatten()
            .filter_map(|cell| {
                cell.device_group
                    .as_ref()
                    .map(|group| (cell.id.clone(), group.assigned_code.clone()))
            })
            .collect();
        assert_eq!(
            codes,
            vec![
                (Some("C001".to_string()), "apsit/it/309/1".to_string()),
                (Some("C002".to_string()), "apsit/it/309/2".to_string()),
                (Some("C003".to_string()), "apsit/it/309/3".to_string()),
                (Some("C004".to_string()), "apsit/it/309/4".to_string()),
            ]
        );
        assert_eq!(arrangement.grid[0][0].id.as_deref(), Some("C001"));
        assert_eq!(arrangement.grid[2][0].id.as_deref(), Some("C004"));
        assert!(arrangement.grid[0][1].id.is_none());
    }

    #[test]
    fn test_resequence_is_idempotent() {
        let mut arrangement = SeatingArrangement::empty(2, 4);
        occupy(&mut arrangement.grid[0][3]);
        occupy(&mut arrangement.grid[1][0]);

        resequence(&mut arrangement.grid, "lab");
        let first = arrangement.clone();
        resequence(&mut arrangement.grid, "lab");
        assert_eq!(first, arrangement);
    }

    #[test]
    fn test_stale_ids_are_cleared() {
        let mut arrangement = SeatingArrangement::empty(1, 2);
        arrangement.grid[0][1].id = Some("C009".to_string());
        assert_eq!(resequence(&mut arrangement.grid, "x"), 1);
        assert!(arrangement.grid[0][1].id.is_none());
        assert_eq!(station_id(12), "C012");
        assert_eq!(station_id(1234), "C1234");
    }
}

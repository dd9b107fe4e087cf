use serde::Serialize;
use std::collections::BTreeSet;

use crate::packets::StateSnapshot;
use crate::{OperationStatus, Position};

/// Local mirror of the last applied snapshot, field for field.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct ScannerView {
    pub current_position: Position,
    pub operation_status: OperationStatus,
    pub horizontal_movement_pending: i64,
    pub vertical_movement_pending: i64,
    /// Captured cells exactly as the remote listed them, duplicates included.
    pub captured_positions: Vec<Position>,
    pub visualization_ready: bool,
    pub operation_start_time: Option<f64>,
    pub current_movement_duration: Option<f64>,
    pub last_updated: Option<f64>,
}

impl ScannerView {
    /// Length of the raw captured list as received.
    pub fn captured_count(&self) -> usize {
        self.captured_positions.len()
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.operation_status, OperationStatus::Moving | OperationStatus::Focusing)
    }
}

impl From<StateSnapshot> for ScannerView {
    fn from(s: StateSnapshot) -> Self {
        let visualization_ready = s.visualization_ready();
        Self {
            current_position: s.current_position,
            operation_status: s.operation_status,
            horizontal_movement_pending: s.horizontal_movement_pending,
            vertical_movement_pending: s.vertical_movement_pending,
            captured_positions: s.captured_positions.into_iter().map(Position::from).collect(),
            visualization_ready,
            operation_start_time: s.operation_start_time,
            current_movement_duration: s.current_movement_duration,
            last_updated: s.last_updated,
        }
    }
}

/// Cells to highlight on the grid. Only recomputed from snapshots the
/// remote marks as safe to visualize.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct GridHighlight {
    pub current_cell: Option<Position>,
    pub captured_cells: BTreeSet<Position>,
}

impl GridHighlight {
    pub fn from_view(view: &ScannerView) -> Self {
        Self {
            current_cell: Some(view.current_position),
            captured_cells: view.captured_positions.iter().copied().collect(),
        }
    }

    pub fn is_captured(&self, cell: &Position) -> bool {
        self.captured_cells.contains(cell)
    }
}

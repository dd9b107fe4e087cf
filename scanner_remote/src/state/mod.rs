//! State reconciler: applies inbound snapshots to the local view model.

mod view;
pub use view::*;

use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::packets::StateSnapshot;
use crate::{OperationStatus, Position, ScannerError};

/// Sole owner of the view model. Every accepted snapshot replaces the whole
/// view in one assignment; a rejected one leaves it untouched.
#[derive(Debug, Clone, Default)]
pub struct StateReconciler {
    view: ScannerView,
    highlight: GridHighlight,
    has_snapshot: bool,
    applied: u64,
    rejected: u64,
}

impl StateReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, snapshot: StateSnapshot) {
        let view = ScannerView::from(snapshot);
        if view.visualization_ready {
            self.highlight = GridHighlight::from_view(&view);
        } else {
            debug!("snapshot not eligible for visualization, keeping previous highlight");
        }
        self.view = view;
        self.has_snapshot = true;
        self.applied += 1;
    }

    /// Validates raw `data` of a `state_update` and applies it.
    pub fn apply_json(&mut self, data: serde_json::Value) -> Result<(), ScannerError> {
        match StateSnapshot::from_value(data) {
            Ok(snapshot) => {
                self.apply(snapshot);
                Ok(())
            }
            Err(e) => {
                self.reject(&e);
                Err(e)
            }
        }
    }

    /// Records a snapshot that failed validation upstream.
    pub fn reject(&mut self, error: &ScannerError) {
        self.rejected += 1;
        warn!(error = %error, rejected = self.rejected, "dropping malformed state snapshot");
    }

    pub fn view(&self) -> &ScannerView {
        &self.view
    }

    pub fn highlight(&self) -> &GridHighlight {
        &self.highlight
    }

    pub fn has_snapshot(&self) -> bool {
        self.has_snapshot
    }

    pub fn position(&self) -> Position {
        self.view.current_position
    }

    pub fn status(&self) -> &OperationStatus {
        &self.view.operation_status
    }

    pub fn pending_moves(&self) -> (i64, i64) {
        (self.view.horizontal_movement_pending, self.view.vertical_movement_pending)
    }

    /// Captured cells with duplicates collapsed.
    pub fn captured_set(&self) -> &BTreeSet<Position> {
        &self.highlight.captured_cells
    }

    pub fn snapshots_applied(&self) -> u64 {
        self.applied
    }

    pub fn snapshots_rejected(&self) -> u64 {
        self.rejected
    }
}

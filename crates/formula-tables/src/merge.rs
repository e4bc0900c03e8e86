use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CellRef, EditAxis, Range, StructuralEdit};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("cannot merge a single cell")]
    SingleCell,
    #[error("merge {range} overlaps existing merged region {existing}")]
    Overlap { range: Range, existing: Range },
}

/// A merged cell block. The top-left cell is the anchor that holds the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergedRegion {
    pub range: Range,
}

impl MergedRegion {
    pub fn anchor(&self) -> CellRef {
        self.range.start
    }
}

/// Non-overlapping merged regions of a worksheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergedRegions {
    regions: Vec<MergedRegion>,
}

impl MergedRegions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergedRegion> {
        self.regions.iter()
    }

    pub fn add(&mut self, range: Range) -> Result<(), MergeError> {
        if range.is_single_cell() {
            return Err(MergeError::SingleCell);
        }
        if let Some(existing) = self.regions.iter().find(|r| r.range.intersects(&range)) {
            return Err(MergeError::Overlap {
                range,
                existing: existing.range,
            });
        }
        self.regions.push(MergedRegion { range });
        Ok(())
    }

    /// Remove every region intersecting `range`. Returns how many were removed.
    pub fn remove_intersecting(&mut self, range: Range) -> usize {
        let before = self.regions.len();
        self.regions.retain(|r| !r.range.intersects(&range));
        before - self.regions.len()
    }

    pub fn containing(&self, cell: CellRef) -> Option<&MergedRegion> {
        self.regions.iter().find(|r| r.range.contains(cell))
    }

    /// Regions as they would look after `edit`, or `None` if any would land
    /// past `last_index` on the edit axis.
    pub(crate) fn plan_structural_edit(
        &self,
        edit: &StructuralEdit,
        last_index: u32,
    ) -> Option<Vec<MergedRegion>> {
        let mut out = Vec::with_capacity(self.regions.len());
        for region in &self.regions {
            let r = region.range;
            let adjusted = match edit.axis() {
                EditAxis::Rows => edit.adjust_span(r.start.row, r.end.row).map(|(s, e)| {
                    Range::from_bounds(s, r.start.col, e, r.end.col)
                }),
                EditAxis::Cols => edit.adjust_span(r.start.col, r.end.col).map(|(s, e)| {
                    Range::from_bounds(r.start.row, s, r.end.row, e)
                }),
            };
            let Some(range) = adjusted else {
                continue;
            };
            let end = match edit.axis() {
                EditAxis::Rows => range.end.row,
                EditAxis::Cols => range.end.col,
            };
            if end > last_index {
                return None;
            }
            // A merge shrunk to one cell is no longer a merge.
            if !range.is_single_cell() {
                out.push(MergedRegion { range });
            }
        }
        Some(out)
    }

    pub(crate) fn replace(&mut self, regions: Vec<MergedRegion>) {
        self.regions = regions;
    }
}

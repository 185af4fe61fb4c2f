//! The 20x60 lattice of grid zones, marked and swept every frame
//!
//! Regions are created on first sight, kept while any pass of a frame touches them, and
//! dropped by the sweep that follows the first frame in which they were not marked.

use crate::frame::{DrawContext, DrawList};
use crate::geodesy::{MAX_LATITUDE, MIN_LATITUDE};
use crate::viewport::Viewport;
use crate::zone::{LatticeKey, ZoneRegion, LATTICE_COLUMNS, LATTICE_ROWS, ROW_V, ROW_X};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use tracing::{debug, trace};

/// Columns whose zones the Norway/Svalbard exceptions reshape
const IRREGULAR_COLUMNS: RangeInclusive<usize> = 30..=36;

/// How far to widen the column range in irregular rows, so widened zones whose
/// nominal column is out of view are still reached
const IRREGULAR_WIDENING: usize = 2;

/// Fixed table of zone slots plus the ordered set of live keys
///
/// A slot is `Some` exactly when its key is in `live`.
#[derive(Debug)]
pub struct ZoneLattice {
    slots: Vec<Option<ZoneRegion>>,
    live: BTreeSet<LatticeKey>,
}

impl Default for ZoneLattice {
    fn default() -> Self {
        Self::new()
    }
}

fn column_for(lon: f64) -> usize {
    (((lon + 180.0) / 6.0).floor().max(0.0) as usize).min(LATTICE_COLUMNS - 1)
}

fn row_for(lat: f64) -> usize {
    (((lat - MIN_LATITUDE) / 8.0).floor().max(0.0) as usize).min(LATTICE_ROWS - 1)
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ZoneLattice {
    pub fn new() -> Self {
        Self {
            slots: (0..LATTICE_ROWS * LATTICE_COLUMNS).map(|_| None).collect(),
            live: BTreeSet::new(),
        }
    }

    /// Number of regions currently alive
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_keys(&self) -> impl Iterator<Item = LatticeKey> + '_ {
        self.live.iter().copied()
    }

    pub fn get(&self, key: LatticeKey) -> Option<&ZoneRegion> {
        self.slots.get(key.index())?.as_ref()
    }

    pub fn contains(&self, key: LatticeKey) -> bool {
        self.get(key).is_some()
    }

    pub fn regions(&self) -> impl Iterator<Item = &ZoneRegion> + '_ {
        self.live.iter().filter_map(|key| self.slots[key.index()].as_ref())
    }

    /// Column ranges touched by the viewport, split at the antimeridian
    fn column_ranges(viewport: &Viewport) -> Vec<RangeInclusive<usize>> {
        if viewport.crosses_idl {
            vec![
                column_for(viewport.west)..=LATTICE_COLUMNS - 1,
                0..=column_for(viewport.east),
            ]
        } else {
            vec![column_for(viewport.west_unwrapped)..=column_for(viewport.east_unwrapped)]
        }
    }

    /// Create (if needed) and mark every region the viewport touches
    ///
    /// Returns the number of regions marked.
    pub fn mark_zones(&mut self, viewport: &Viewport) -> usize {
        if viewport.north < MIN_LATITUDE || viewport.south > MAX_LATITUDE {
            return 0;
        }
        let rows = row_for(viewport.south)..=row_for(viewport.north);
        let columns = Self::column_ranges(viewport);

        let mut marked = 0;
        for row in rows {
            let irregular_row = row == ROW_V as usize || row == ROW_X as usize;
            for range in &columns {
                let (mut start, mut end) = (*range.start(), *range.end());
                if irregular_row
                    && start <= *IRREGULAR_COLUMNS.end()
                    && end >= *IRREGULAR_COLUMNS.start()
                {
                    start = start.saturating_sub(IRREGULAR_WIDENING);
                    end = (end + IRREGULAR_WIDENING).min(LATTICE_COLUMNS - 1);
                }
                for column in start..=end {
                    self.mark(LatticeKey::new(row as u8, column as u8));
                    marked += 1;
                }
            }
        }
        trace!(marked, live = self.live.len(), "Marked zones");
        marked
    }

    fn mark(&mut self, key: LatticeKey) {
        let region = self.slots[key.index()].get_or_insert_with(|| {
            debug!(zone = %key, "Creating zone region");
            ZoneRegion::new(key)
        });
        region.set_mark(true);
        self.live.insert(key);
    }

    /// Draw every marked region
    pub(crate) fn draw(&mut self, ctx: &DrawContext<'_>, out: &mut DrawList) {
        let Self { slots, live } = self;
        for key in live.iter() {
            if let Some(region) = slots[key.index()].as_mut() {
                if region.is_marked() {
                    region.draw(ctx, out);
                }
            }
        }
    }

    /// Remove regions not marked since the last sweep and cull the rest
    ///
    /// Called after the final pass of a frame; `stamp` is that frame's render pump.
    pub fn sweep(&mut self, stamp: u64) {
        let Self { slots, live } = self;
        let before = live.len();
        live.retain(|key| {
            let Some(region) = slots[key.index()].as_mut() else {
                return false;
            };
            if region.is_marked() {
                region.set_mark(false);
                region.cull(stamp);
                return true;
            }
            debug!(zone = %key, "Removing zone region");
            region.release();
            slots[key.index()] = None;
            false
        });
        trace!(removed = before - live.len(), live = live.len(), "Swept zones");
    }

    /// Drop every region
    pub fn clear(&mut self) {
        for key in std::mem::take(&mut self.live) {
            if let Some(mut region) = self.slots[key.index()].take() {
                region.release();
            }
        }
    }

    /// Cells generated across all live regions
    pub fn live_cell_count(&self) -> usize {
        self.regions().map(ZoneRegion::live_cell_count).sum()
    }

    /// Generation tasks outstanding across all live regions
    pub fn pending_tasks(&self) -> usize {
        self.regions().map(ZoneRegion::pending_tasks).sum()
    }
}

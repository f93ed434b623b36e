//! Worker pool over independent tiles.
//!
//! Tiles share nothing: each worker owns exclusive write access to its own
//! output files and inputs are read-only, so the pool needs no locks and
//! guarantees no ordering. A tile missing a required input is skipped and
//! logged; any other tile failure is logged and counted without blocking or
//! aborting sibling tiles. Stage ordering (all tiles of stage N before
//! stage N+1) is the external pipeline driver's job, not this module's.

use crate::error::{FluxError, Result};
use crate::grid::TileId;
use crate::raster::TileOutcome;
use rayon::prelude::*;
use tracing::{error, info, warn};

/// Counters describing one stage run over a tile set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tiles whose output was written and kept.
    pub written: usize,
    /// Tiles whose output was deleted as all-nodata.
    pub deleted_empty: usize,
    /// Tiles skipped for a missing required input.
    pub skipped: usize,
    /// Tiles that failed for any other reason.
    pub failed: usize,
}

impl RunSummary {
    /// Total number of tiles the run touched.
    pub fn total(&self) -> usize {
        self.written + self.deleted_empty + self.skipped + self.failed
    }

    fn absorb(mut self, other: RunSummary) -> RunSummary {
        self.written += other.written;
        self.deleted_empty += other.deleted_empty;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self
    }

    fn record(outcome: &Result<TileOutcome>) -> RunSummary {
        let mut summary = RunSummary::default();
        match outcome {
            Ok(TileOutcome::Written(_)) => summary.written = 1,
            Ok(TileOutcome::DeletedEmpty(_)) => summary.deleted_empty = 1,
            Ok(TileOutcome::Skipped(_)) => summary.skipped = 1,
            Err(FluxError::MissingInputTile { .. }) => summary.skipped = 1,
            Err(_) => summary.failed = 1,
        }
        summary
    }
}

/// Runs a per-tile stage function over a worker pool.
pub struct TileRunner {
    threads: usize,
}

impl TileRunner {
    /// Creates a runner with the given thread count; 0 means one per core.
    pub fn new(threads: usize) -> Self {
        Self { threads }
    }

    /// Processes every tile, in no particular order.
    ///
    /// `process` runs once per tile on some worker; it must not write
    /// outside its own tile's outputs. Failures are logged per tile and
    /// never interrupt the rest of the set.
    pub fn run<F>(&self, tiles: &[TileId], process: F) -> Result<RunSummary>
    where
        F: Fn(&TileId) -> Result<TileOutcome> + Sync,
    {
        info!(tiles = tiles.len(), threads = self.threads, "starting stage run");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| FluxError::WorkerPool(e.to_string()))?;

        let summary = pool.install(|| {
            tiles
                .par_iter()
                .map(|tile| {
                    let outcome = process(tile);
                    match &outcome {
                        Ok(TileOutcome::Skipped(path)) => {
                            warn!(%tile, path = %path.display(), "tile skipped, input missing")
                        }
                        Err(FluxError::MissingInputTile { path }) => {
                            warn!(%tile, path = %path.display(), "tile skipped, input missing")
                        }
                        Err(e) => error!(%tile, error = %e, "tile failed"),
                        Ok(_) => {}
                    }
                    RunSummary::record(&outcome)
                })
                .reduce(RunSummary::default, RunSummary::absorb)
        });

        info!(
            written = summary.written,
            deleted_empty = summary.deleted_empty,
            skipped = summary.skipped,
            failed = summary.failed,
            "stage run finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tiles(ids: &[&str]) -> Vec<TileId> {
        ids.iter().map(|id| id.parse().unwrap()).collect()
    }

    #[test]
    fn test_all_tiles_processed_despite_failures() {
        let set = tiles(&["00N_110E", "10S_060W", "20N_020E", "30N_090W"]);
        let calls = AtomicUsize::new(0);

        let summary = TileRunner::new(2)
            .run(&set, |tile| {
                calls.fetch_add(1, Ordering::SeqCst);
                match tile.to_string().as_str() {
                    "00N_110E" => Ok(TileOutcome::Written(PathBuf::from("a.tif"))),
                    "10S_060W" => Err(FluxError::MissingInputTile {
                        path: PathBuf::from("b.tif"),
                    }),
                    "20N_020E" => Ok(TileOutcome::DeletedEmpty(PathBuf::from("c.tif"))),
                    _ => Err(FluxError::Config("boom".into())),
                }
            })
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 4, "no failure stops siblings");
        assert_eq!(summary.written, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.deleted_empty, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn test_missing_input_counts_as_skip_not_failure() {
        let set = tiles(&["00N_110E"]);
        let summary = TileRunner::new(1)
            .run(&set, |_| {
                Err(FluxError::MissingInputTile {
                    path: PathBuf::from("absent.tif"),
                })
            })
            .unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_empty_tile_set() {
        let summary = TileRunner::new(1)
            .run(&[], |_| Ok(TileOutcome::Written(PathBuf::from("x.tif"))))
            .unwrap();
        assert_eq!(summary, RunSummary::default());
    }
}

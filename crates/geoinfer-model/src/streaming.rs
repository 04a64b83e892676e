use std::sync::OnceLock;

use geoinfer_core::{ModelError, ModelResult, Raster, Region};
use tracing::{debug, error, info};

use crate::filter::{not_introspected, output_tile};
use crate::ModelFilter;

/// Computes the whole output of an introspected filter, streaming it in row
/// bands.
///
/// With more than one worker, bands are dealt round-robin to scoped threads.
/// Each thread owns a clone of the filter (its own parameters and specs)
/// while all of them share the filter's borrowed session. The first failing
/// band stops every worker before its next band and its error is returned.
pub fn stream<'a, F>(filter: &F, workers: usize) -> ModelResult<Raster>
where
    F: ModelFilter<'a> + Clone + Send,
{
    let info = filter.output_information().ok_or_else(not_introspected)?.clone();
    let band = info.block_height.max(1);
    let bands: Vec<Region> = (0..info.size.height)
        .step_by(band)
        .map(|y| Region::new(0, y, info.size.width, band.min(info.size.height - y)))
        .collect();

    let workers = workers.clamp(1, bands.len().max(1));
    info!(bands = bands.len(), workers, "streaming output");

    let tiles = if workers == 1 {
        let mut local = filter.clone();
        bands
            .iter()
            .map(|region| local.generate_region(*region).map(|tile| (*region, tile)))
            .collect::<ModelResult<Vec<_>>>()?
    } else {
        let mut queues: Vec<Vec<Region>> = vec![Vec::new(); workers];
        for (rr, region) in bands.iter().enumerate() {
            queues[rr % workers].push(*region);
        }

        let failed: OnceLock<ModelError> = OnceLock::new();
        let tiles = std::thread::scope(|scope| -> ModelResult<Vec<(Region, Raster)>> {
            let failed = &failed;
            let handles: Vec<_> = queues
                .into_iter()
                .enumerate()
                .map(|(id, queue)| {
                    let mut local = filter.clone();
                    scope.spawn(move || {
                        debug!(worker_id = id, bands = queue.len(), "worker started");
                        let mut done = Vec::with_capacity(queue.len());
                        for region in queue {
                            if failed.get().is_some() {
                                debug!(worker_id = id, "worker cancelled");
                                break;
                            }
                            match local.generate_region(region) {
                                Ok(tile) => done.push((region, tile)),
                                Err(err) => {
                                    error!(worker_id = id, error = %err, "streaming worker failed");
                                    // Only the first failure is kept.
                                    let _ = failed.set(err);
                                    break;
                                }
                            }
                        }
                        done
                    })
                })
                .collect();

            let mut tiles = Vec::with_capacity(bands.len());
            for handle in handles {
                let done = handle
                    .join()
                    .map_err(|_| ModelError::execution("streaming worker panicked"))?;
                tiles.extend(done);
            }
            Ok(tiles)
        })?;
        if let Some(err) = failed.into_inner() {
            return Err(err);
        }
        tiles
    };

    let mut out = output_tile(&info, info.region());
    for (region, tile) in tiles {
        out.paste(region.x, region.y, &tile)?;
    }
    Ok(out)
}

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use ahash::AHashMap;
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info};

use crate::buffer::RawBuffer;
use crate::chunk::{self, ByteRange};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::parse;
use crate::reader::ChunkReader;
use crate::stats::{self, Aggregate, Stats};

/// The assembled ingestion pipeline.
///
/// One call to [`Pipeline::process`] runs the full flow: plan line-aligned
/// ranges, stream them through a fixed pool of readers into whole-lines
/// buffers, tokenize and aggregate per buffer in a fixed pool of workers,
/// merge every partial aggregate in a single reducer thread and render the
/// sorted report. Queues between the stages are bounded, so a lagging stage
/// backpressures the ones before it instead of buffering without limit.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline {
            config: config.normalized(),
        }
    }

    /// Consumes the whole file and returns the rendered report.
    ///
    /// The first failure in any stage aborts the run and surfaces here; no
    /// partial report is ever returned.
    pub fn process(&self, path: &Path) -> Result<String, PipelineError> {
        let cfg = self.config;
        let started = Instant::now();

        let ranges = chunk::plan_chunks(path, cfg.chunk_count, cfg.lookahead)?;
        let total: u64 = ranges.iter().map(|range| range.length).sum();
        debug!(ranges = ranges.len(), bytes = total, "planned input");

        let (range_tx, range_rx) = bounded::<ByteRange>(ranges.len().max(1));
        let (buffer_tx, buffer_rx) = bounded::<RawBuffer>(cfg.work_queue_cap);
        let (result_tx, result_rx) = bounded::<Aggregate>(cfg.result_queue_cap);
        let shutdown = Arc::new(AtomicBool::new(false));

        let aggregate = thread::scope(|scope| {
            let mut readers = Vec::with_capacity(cfg.readers);
            for id in 0..cfg.readers {
                let reader = ChunkReader::open(path, cfg.read_cap, cfg.split_factor)?;
                let rx = range_rx.clone();
                let tx = buffer_tx.clone();
                let shutdown = Arc::clone(&shutdown);
                let handle = thread::Builder::new()
                    .name(format!("reader-{id}"))
                    .spawn_scoped(scope, move || {
                        flag_on_error(reader.run(&rx, &tx, &shutdown), &shutdown)
                    })?;
                readers.push(handle);
            }
            drop(range_rx);
            drop(buffer_tx);

            let mut workers = Vec::with_capacity(cfg.workers);
            for id in 0..cfg.workers {
                let rx = buffer_rx.clone();
                let tx = result_tx.clone();
                let shutdown = Arc::clone(&shutdown);
                let handle = thread::Builder::new()
                    .name(format!("worker-{id}"))
                    .spawn_scoped(scope, move || {
                        flag_on_error(worker_loop(&rx, &tx, &shutdown), &shutdown)
                    })?;
                workers.push(handle);
            }
            drop(buffer_rx);
            drop(result_tx);

            let reducer = thread::Builder::new()
                .name("reducer".into())
                .spawn_scoped(scope, move || reduce_loop(&result_rx))?;

            // The range queue holds the whole plan, so dispatch never blocks.
            for range in ranges {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                if range_tx.send(range).is_err() {
                    break;
                }
            }
            drop(range_tx);

            // Readers finish first, which closes the buffer queue; drained
            // workers then close the result queue, releasing the reducer.
            let mut first_error = None;
            for handle in readers {
                collect(handle.join(), &mut first_error);
            }
            for handle in workers {
                collect(handle.join(), &mut first_error);
            }
            let aggregate = match reducer.join() {
                Ok(aggregate) => aggregate,
                Err(_) => {
                    first_error.get_or_insert(stage_panic());
                    Aggregate::default()
                }
            };
            match first_error {
                Some(error) => Err(error),
                None => Ok(aggregate),
            }
        })?;

        info!(
            keys = aggregate.len(),
            bytes = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline complete"
        );
        Ok(stats::render_report(&aggregate))
    }
}

/// Drains the buffer queue, shipping one owned-key aggregate per buffer.
fn worker_loop(
    buffers: &Receiver<RawBuffer>,
    results: &Sender<Aggregate>,
    shutdown: &AtomicBool,
) -> Result<(), PipelineError> {
    for buffer in buffers {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let local = aggregate_buffer(&buffer)?;
        if results.send(local).is_err() {
            break;
        }
    }
    Ok(())
}

/// Tokenizes one whole-lines buffer into a per-buffer aggregate.
///
/// Keys stay borrowed from the buffer while counting and are copied out once
/// at the end, right before the buffer is released.
fn aggregate_buffer(buffer: &[u8]) -> Result<Aggregate, PipelineError> {
    let mut local: AHashMap<&[u8], Stats> = AHashMap::new();
    for (key, span) in parse::records(buffer) {
        let value = parse::decode(span)?;
        local.entry(key).or_default().record(value);
    }
    Ok(local
        .into_iter()
        .map(|(key, stats)| (key.to_vec(), stats))
        .collect())
}

/// Sole owner of the global aggregate; merges until the queue closes.
fn reduce_loop(results: &Receiver<Aggregate>) -> Aggregate {
    let mut global = Aggregate::default();
    let mut merged = 0usize;
    for local in results {
        stats::merge_into(&mut global, local);
        merged += 1;
    }
    debug!(merged, keys = global.len(), "reduction complete");
    global
}

fn flag_on_error(
    result: Result<(), PipelineError>,
    shutdown: &AtomicBool,
) -> Result<(), PipelineError> {
    if result.is_err() {
        shutdown.store(true, Ordering::Relaxed);
    }
    result
}

/// Keeps the first stage failure, logging the rest.
fn collect(
    result: thread::Result<Result<(), PipelineError>>,
    first_error: &mut Option<PipelineError>,
) {
    let error = match result {
        Ok(Ok(())) => return,
        Ok(Err(error)) => error,
        Err(_) => stage_panic(),
    };
    if first_error.is_none() {
        *first_error = Some(error);
    } else {
        debug!(%error, "suppressed follow-up failure");
    }
}

fn stage_panic() -> PipelineError {
    PipelineError::Io(io::Error::other("pipeline stage panicked"))
}

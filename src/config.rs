use std::thread;

pub(crate) const MIB: usize = 1024 * 1024;
pub(crate) const GIB: usize = 1024 * MIB;

/// Hard ceiling on a single physical read. Ranges larger than this are read
/// in multiple passes.
pub const MAX_READ_LEN: usize = GIB;

/// Tuning knobs for the pipeline.
///
/// Every field has a working default; [`Pipeline::new`](crate::Pipeline::new)
/// clamps values outside their usable domain instead of rejecting them.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Number of reader threads, each with its own file handle. Default 4.
    pub readers: usize,
    /// Number of worker threads tokenizing and aggregating buffers. Default:
    /// available parallelism, falling back to 4.
    pub workers: usize,
    /// Number of line-aligned ranges the file is planned into. Default 16.
    pub chunk_count: usize,
    /// How far past a naive cut the planner may scan for a terminator.
    /// Default 128 bytes.
    pub lookahead: usize,
    /// Per-read byte cap, itself capped at [`MAX_READ_LEN`]. Default 64 MiB.
    pub read_cap: usize,
    /// How many pieces a reader splits each whole-lines buffer into before
    /// queueing, to fan out wider than the reader count. Default 4.
    pub split_factor: usize,
    /// Capacity of the buffer queue between readers and workers. Default
    /// 2x workers.
    pub work_queue_cap: usize,
    /// Capacity of the aggregate queue between workers and the reducer.
    /// Default 2x workers.
    pub result_queue_cap: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let workers = thread::available_parallelism().map_or(4, usize::from);
        PipelineConfig {
            readers: 4,
            workers,
            chunk_count: 16,
            lookahead: 128,
            read_cap: 64 * MIB,
            split_factor: 4,
            work_queue_cap: workers * 2,
            result_queue_cap: workers * 2,
        }
    }
}

impl PipelineConfig {
    /// Clamps every knob into its usable domain.
    pub(crate) fn normalized(mut self) -> Self {
        self.readers = self.readers.max(1);
        self.workers = self.workers.max(1);
        self.chunk_count = self.chunk_count.max(1);
        self.lookahead = self.lookahead.max(1);
        self.read_cap = self.read_cap.clamp(1, MAX_READ_LEN);
        self.split_factor = self.split_factor.max(1);
        self.work_queue_cap = self.work_queue_cap.max(1);
        self.result_queue_cap = self.result_queue_cap.max(1);
        self
    }
}

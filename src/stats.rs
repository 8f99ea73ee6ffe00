use std::fmt::Write;

use ahash::AHashMap;

// The measurement domain is [-99.9, 99.9]; a fresh entry starts just outside
// it so the first observation tightens both bounds.
const MIN_START: f32 = 100.0;
const MAX_START: f32 = -100.0;

/// Running statistics for one key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub min: f32,
    pub max: f32,
    pub sum: f64,
    pub count: u64,
}

impl Default for Stats {
    fn default() -> Self {
        Stats {
            min: MIN_START,
            max: MAX_START,
            sum: 0.0,
            count: 0,
        }
    }
}

impl Stats {
    /// Folds one measurement in.
    pub fn record(&mut self, value: f32) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += f64::from(value);
        self.count += 1;
    }

    /// Combines two partial results for the same key. Commutative and
    /// associative, so merge order never changes the outcome.
    pub fn merge(&mut self, other: &Stats) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Key-to-statistics map, used both for per-buffer partials and for the final
/// merged result.
pub type Aggregate = AHashMap<Vec<u8>, Stats>;

/// Folds `local` into `global` key by key.
pub fn merge_into(global: &mut Aggregate, local: Aggregate) {
    for (key, stats) in local {
        global
            .entry(key)
            .and_modify(|merged| merged.merge(&stats))
            .or_insert(stats);
    }
}

/// Renders the final report: keys in bytewise order, each entry
/// `key=min/mean/max` with one fractional digit, joined by `, ` inside
/// braces.
pub fn render_report(aggregate: &Aggregate) -> String {
    let mut entries: Vec<(&Vec<u8>, &Stats)> = aggregate.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut out = String::with_capacity(2 + entries.len() * 24);
    out.push('{');
    for (i, (key, stats)) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write!(
            out,
            "{}={:.1}/{:.1}/{:.1}",
            String::from_utf8_lossy(key),
            stats.min,
            stats.mean(),
            stats.max
        )
        .unwrap();
    }
    out.push('}');
    out
}

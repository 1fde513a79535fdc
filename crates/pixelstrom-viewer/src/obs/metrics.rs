//! Labelled counters and a fixed-bucket histogram backed by `DashMap`.
//!
//! Label sets are stored as sorted key vectors so rendering order inside one
//! series is deterministic. Histogram buckets are integer microseconds.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use pixelstrom_core::session::Dispatch;

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn label_str(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

fn series(name: &str, labels: &str) -> String {
    if labels.is_empty() {
        name.to_string()
    } else {
        format!("{name}{{{labels}}}")
    }
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value of one series, 0 if it was never touched.
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} counter");
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{} {val}", series(name, &label_str(r.key())));
        }
    }
}

// 10us .. 100ms
const BUCKETS_MICROS: [u64; 8] = [10, 50, 100, 500, 1_000, 5_000, 10_000, 100_000];

#[derive(Default)]
struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: [AtomicU64; BUCKETS_MICROS.len()],
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self.map.entry(label_key(labels)).or_default();
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum.fetch_add(micros, Ordering::Relaxed);

        // cumulative
        for (i, &le) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= le {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn count(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|h| h.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} histogram");
        for r in self.map.iter() {
            let labels = label_str(r.key());
            let hist = r.value();
            let prefix = if labels.is_empty() {
                String::new()
            } else {
                format!("{labels},")
            };

            for (i, &le) in BUCKETS_MICROS.iter().enumerate() {
                let n = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{name}_bucket{{{prefix}le=\"{le}\"}} {n}");
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{name}_bucket{{{prefix}le=\"+Inf\"}} {count}");
            let sum = hist.sum.load(Ordering::Relaxed);
            let _ = writeln!(out, "{} {sum}", series(&format!("{name}_sum"), &labels));
            let _ = writeln!(out, "{} {count}", series(&format!("{name}_count"), &labels));
        }
    }
}

#[derive(Default)]
pub struct ViewerMetrics {
    /// `kind`: snapshot, delta, lagged, notice, rejected, ignored.
    pub messages: CounterVec,
    /// `code`: stable error code of a dropped message.
    pub errors: CounterVec,
    /// `outcome`: applied, dropped, deferred.
    pub paint_records: CounterVec,
    pub reconnects: CounterVec,
    /// `result`: ok, error.
    pub bootstrap: CounterVec,
    /// Decode plus store mutation plus present, in microseconds.
    pub apply_duration: HistogramVec,
}

impl ViewerMetrics {
    /// Account for one handled message.
    pub fn record(&self, dispatch: &Dispatch, took: Duration) {
        match dispatch {
            Dispatch::Resynced { .. } => {
                self.messages.inc(&[("kind", "snapshot")]);
                self.apply_duration.observe(&[("kind", "snapshot")], took);
            }
            Dispatch::Painted(report) => {
                self.messages.inc(&[("kind", "delta")]);
                self.paint_records
                    .add(&[("outcome", "applied")], report.applied as u64);
                self.paint_records
                    .add(&[("outcome", "dropped")], report.dropped as u64);
                self.apply_duration.observe(&[("kind", "delta")], took);
            }
            Dispatch::Deferred { records } => {
                self.messages.inc(&[("kind", "delta")]);
                self.paint_records
                    .add(&[("outcome", "deferred")], *records as u64);
            }
            Dispatch::Dropped(e) => {
                self.messages.inc(&[("kind", "rejected")]);
                self.errors.inc(&[("code", e.code().as_str())]);
            }
            Dispatch::Notice => self.messages.inc(&[("kind", "notice")]),
            Dispatch::Ignored => self.messages.inc(&[("kind", "ignored")]),
            Dispatch::ChannelLost => self.messages.inc(&[("kind", "lagged")]),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.messages.render("pixelstrom_messages_total", &mut out);
        self.errors.render("pixelstrom_message_errors_total", &mut out);
        self.paint_records
            .render("pixelstrom_paint_records_total", &mut out);
        self.reconnects.render("pixelstrom_reconnects_total", &mut out);
        self.bootstrap.render("pixelstrom_bootstrap_total", &mut out);
        self.apply_duration
            .render("pixelstrom_apply_duration_micros", &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelstrom_core::error::ViewerError;
    use pixelstrom_core::framebuffer::PaintReport;

    #[test]
    fn labels_are_order_independent() {
        let c = CounterVec::default();
        c.inc(&[("a", "1"), ("b", "2")]);
        c.inc(&[("b", "2"), ("a", "1")]);
        assert_eq!(c.get(&[("a", "1"), ("b", "2")]), 2);
        assert_eq!(c.get(&[("a", "9")]), 0);
    }

    #[test]
    fn record_splits_paint_outcomes() {
        let m = ViewerMetrics::default();
        m.record(
            &Dispatch::Painted(PaintReport {
                applied: 3,
                dropped: 1,
                damage: None,
            }),
            Duration::from_micros(20),
        );
        m.record(&Dispatch::Deferred { records: 5 }, Duration::ZERO);
        m.record(
            &Dispatch::Dropped(ViewerError::Truncated { len: 7 }),
            Duration::ZERO,
        );

        assert_eq!(m.messages.get(&[("kind", "delta")]), 2);
        assert_eq!(m.paint_records.get(&[("outcome", "applied")]), 3);
        assert_eq!(m.paint_records.get(&[("outcome", "dropped")]), 1);
        assert_eq!(m.paint_records.get(&[("outcome", "deferred")]), 5);
        assert_eq!(m.errors.get(&[("code", "TRUNCATED")]), 1);
        assert_eq!(m.apply_duration.count(&[("kind", "delta")]), 1);
    }

    #[test]
    fn render_is_prometheus_text() {
        let m = ViewerMetrics::default();
        m.reconnects.inc(&[]);
        m.apply_duration
            .observe(&[("kind", "snapshot")], Duration::from_micros(75));

        let text = m.render();
        assert!(text.contains("# TYPE pixelstrom_reconnects_total counter"));
        assert!(text.contains("pixelstrom_reconnects_total 1\n"));
        assert!(text.contains("pixelstrom_apply_duration_micros_bucket{kind=\"snapshot\",le=\"50\"} 0"));
        assert!(text.contains("pixelstrom_apply_duration_micros_bucket{kind=\"snapshot\",le=\"100\"} 1"));
        assert!(text.contains("pixelstrom_apply_duration_micros_sum{kind=\"snapshot\"} 75"));
    }
}

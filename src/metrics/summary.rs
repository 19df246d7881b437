//! Labelled summary instrument.
//!
//! The `prometheus` crate only ships counters, gauges and histograms, so the
//! pod latency instruments use this collector to keep their `summary` type.
//! Each label set keeps a cumulative sum and count plus a sliding window of
//! recent observations, from which the 0.5/0.9/0.99 quantiles are computed
//! at scrape time.

use crate::Result;
use prometheus::core::{Collector, Desc, Describer};
use prometheus::proto::{LabelPair, Metric, MetricFamily, MetricType, Quantile, Summary};
use prometheus::Opts;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Quantiles exposed for every label set.
pub const SUMMARY_OBJECTIVES: [f64; 3] = [0.5, 0.9, 0.99];

/// Observations older than this no longer contribute to the quantiles.
pub const SUMMARY_MAX_AGE: Duration = Duration::from_secs(10 * 60);

/// Upper bound on the observations kept per label set.
pub const SUMMARY_WINDOW_CAPACITY: usize = 512;

#[derive(Debug, Default)]
struct Series {
    count: u64,
    sum: f64,
    window: VecDeque<(Instant, f64)>,
}

impl Series {
    fn observe(&mut self, now: Instant, value: f64) {
        self.count += 1;
        self.sum += value;
        if self.window.len() >= SUMMARY_WINDOW_CAPACITY {
            self.window.pop_front();
        }
        self.window.push_back((now, value));
    }

    fn expire(&mut self, now: Instant, max_age: Duration) {
        while let Some(&(at, _)) = self.window.front() {
            if now.saturating_duration_since(at) <= max_age {
                break;
            }
            self.window.pop_front();
        }
    }

    fn quantiles(&self) -> Vec<Quantile> {
        let mut sorted: Vec<f64> = self.window.iter().map(|&(_, v)| v).collect();
        sorted.sort_by(f64::total_cmp);

        SUMMARY_OBJECTIVES
            .iter()
            .map(|&objective| {
                let mut quantile = Quantile::new();
                quantile.set_quantile(objective);
                quantile.set_value(rank(&sorted, objective));
                quantile
            })
            .collect()
    }
}

/// Value at quantile `q` of an ascending slice; NaN when nothing is left in
/// the window.
fn rank(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let idx = ((sorted.len() as f64 - 1.0) * q).ceil() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

struct SummaryCore {
    desc: Desc,
    series: Mutex<HashMap<Vec<String>, Series>>,
}

impl SummaryCore {
    fn series(&self) -> MutexGuard<'_, HashMap<Vec<String>, Series>> {
        // A panic while holding the lock leaves at most one partial update.
        self.series.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn label_pairs(&self, values: &[String]) -> Vec<LabelPair> {
        let mut pairs: Vec<LabelPair> = self
            .desc
            .variable_labels
            .iter()
            .zip(values)
            .map(|(name, value)| {
                let mut pair = LabelPair::new();
                pair.set_name(name.clone());
                pair.set_value(value.clone());
                pair
            })
            .collect();
        pairs.sort();
        pairs
    }
}

/// A summary partitioned by label values, registrable like any other
/// `prometheus` collector. Clones share state.
#[derive(Clone)]
pub struct SummaryVec {
    inner: Arc<SummaryCore>,
}

impl SummaryVec {
    pub fn new(opts: Opts, label_names: &[&str]) -> Result<Self> {
        let desc = opts
            .variable_labels(label_names.iter().map(|name| name.to_string()).collect())
            .describe()?;

        Ok(Self {
            inner: Arc::new(SummaryCore {
                desc,
                series: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Add one observation to the series identified by `label_values`, given
    /// in the order of the label names passed to `new`.
    pub fn observe<V: AsRef<str>>(&self, label_values: &[V], value: f64) -> Result<()> {
        let expect = self.inner.desc.variable_labels.len();
        if label_values.len() != expect {
            return Err(prometheus::Error::InconsistentCardinality {
                expect,
                got: label_values.len(),
            }
            .into());
        }

        let key: Vec<String> = label_values.iter().map(|v| v.as_ref().to_string()).collect();
        self.inner
            .series()
            .entry(key)
            .or_default()
            .observe(Instant::now(), value);
        Ok(())
    }
}

impl Collector for SummaryVec {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.inner.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let now = Instant::now();
        let mut series = self.inner.series();

        let metrics = series
            .iter_mut()
            .map(|(values, series)| {
                series.expire(now, SUMMARY_MAX_AGE);

                let mut summary = Summary::new();
                summary.set_sample_count(series.count);
                summary.set_sample_sum(series.sum);
                summary.set_quantile(series.quantiles());

                let mut metric = Metric::new();
                metric.set_label(self.inner.label_pairs(values));
                metric.set_summary(summary);
                metric
            })
            .collect();

        let mut family = MetricFamily::new();
        family.set_name(self.inner.desc.fq_name.clone());
        family.set_help(self.inner.desc.help.clone());
        family.set_field_type(MetricType::SUMMARY);
        family.set_metric(metrics);
        vec![family]
    }
}

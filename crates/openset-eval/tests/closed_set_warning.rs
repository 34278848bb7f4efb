//! The closed-set hit-rate warning is logged once per harness run, not once
//! per classifier. Kept in its own test binary because it installs a global
//! logger.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use ndarray::Array2;

use openset_eval::harness::EvaluationHarness;
use openset_eval::labels::LabelMode;
use openset_eval::models::classifier_trait::ClassifierAdapter;
use openset_eval::scoring::ScoringPolicy;

static CLOSED_SET_WARNINGS: AtomicUsize = AtomicUsize::new(0);

struct CountingLogger;

impl log::Log for CountingLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Warn
    }

    fn log(&self, record: &log::Record) {
        if record.level() == log::Level::Warn && record.args().to_string().contains("closed-set mode") {
            CLOSED_SET_WARNINGS.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn flush(&self) {}
}

static LOGGER: CountingLogger = CountingLogger;

struct Constant(usize, &'static str);

impl ClassifierAdapter for Constant {
    fn fit(&mut self, _x: &Array2<f64>, _y: &[usize]) -> Result<()> {
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        Ok(vec![self.0; x.nrows()])
    }

    fn name(&self) -> &str {
        self.1
    }
}

fn roster() -> Vec<Box<dyn ClassifierAdapter>> {
    vec![
        Box::new(Constant(0, "zero")),
        Box::new(Constant(1, "one")),
        Box::new(Constant(2, "two")),
        Box::new(Constant(3, "three")),
    ]
}

#[test]
fn closed_set_warning_is_logged_once_per_run() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(log::LevelFilter::Warn);

    let y = vec![0, 1, 2, 3];
    let x = Array2::from_shape_fn((4, 1), |(i, _)| i as f64);

    let report = EvaluationHarness::new(roster())
        .run(&x, &y, &x, &y, LabelMode::Closed)
        .unwrap();
    assert_eq!(report.entries.len(), 4);
    assert!(report.entries.iter().all(|e| e.score().unwrap().ood_hit_rate.is_none()));
    assert_eq!(CLOSED_SET_WARNINGS.load(Ordering::SeqCst), 1);

    EvaluationHarness::new(roster())
        .run(&x, &y, &x, &y, LabelMode::OpenSet { unknown_label: 3 })
        .unwrap();
    assert_eq!(CLOSED_SET_WARNINGS.load(Ordering::SeqCst), 1);

    // asking for the hit rate directly still warns
    let hit_rate = ScoringPolicy::closed_set().ood_hit_rate(&[0, 1], &[0, 1]).unwrap();
    assert_eq!(hit_rate, None);
    assert_eq!(CLOSED_SET_WARNINGS.load(Ordering::SeqCst), 2);
}

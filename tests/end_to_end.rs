//! Import a CSV, sweep a small design space and check the winner.

use std::fmt::Write as _;
use std::sync::Arc;

use scatter_opt::{
    CsvColumns, DesignEvaluator, DesignSpace, Measure, OptimizerConfig, PointSet, RangeSpec,
    Sweep, SweepReport, Weights,
};

fn write_points(dir: &std::path::Path) -> std::path::PathBuf {
    let mut text = String::from("x,y,species,flag\n");
    for i in 0..100 {
        let t = f64::from(i) / 10.0;
        writeln!(text, "{},{},setosa,0", t, t * 0.5 + (t * 3.0).sin()).unwrap();
        writeln!(text, "{},{},virginica,0", t, 8.0 - t * 0.4 + (t * 2.0).cos()).unwrap();
    }
    for i in 0..5 {
        writeln!(text, "{},{},setosa,outlier", 2.0 * f64::from(i), 14.0).unwrap();
    }
    let path = dir.join("points.csv");
    std::fs::write(&path, text).unwrap();
    path
}

fn evaluator(points: PointSet) -> DesignEvaluator {
    let config = OptimizerConfig::builder()
        .max_canvas(96, 72)
        .max_marker_size(6)
        .build();
    let mut evaluator = DesignEvaluator::new(config);
    evaluator.set_data(Arc::new(points));
    evaluator
}

#[test]
fn test_sweep_from_csv_picks_lowest_weighted_score() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_points(dir.path());
    let columns = CsvColumns::builder()
        .class_column("species")
        .outlier_column("flag")
        .build();
    let points = PointSet::from_csv(&path, &columns).unwrap();
    assert_eq!(points.len(), 3);
    assert!(points.has_outliers());
    assert_eq!(points.total_points(), 205);
    assert_eq!(points.inlier_points(), 200);

    let mut evaluator = evaluator(points);
    let space = DesignSpace {
        aspect: RangeSpec::new(-0.2, 0.2, 0.4),
        marker_size: RangeSpec::new(2.0, 6.0, 4.0),
        marker_opacity: RangeSpec::new(60.0, 180.0, 120.0),
        colors: vec![[0.8, 0.2, 0.1], [0.1, 0.3, 0.8], [0.2, 0.6, 0.2]],
        ..DesignSpace::new(96, 72)
    };
    let weights = Weights::uniform()
        .with(Measure::ClassSeparability, 2.0)
        .with(Measure::OutlierSeparability, 0.5);

    let mut updates = Vec::new();
    let outcome = Sweep::new(&space, weights, &evaluator)
        .unwrap()
        .run(&mut evaluator, |p| updates.push(p.evaluated))
        .unwrap();

    assert_eq!(outcome.evaluated, 8);
    assert_eq!(updates, vec![2, 4, 6, 8]);
    assert_eq!(evaluator.cache().len(), 8);
    assert_eq!(evaluator.render_count(), 8);

    let cache = evaluator.cache();
    let min_score = cache
        .iter()
        .map(|(_, _, measures)| cache.evaluation(measures, Some(&weights)).score)
        .fold(f64::INFINITY, f64::min);
    assert!((outcome.evaluation.score - min_score).abs() < 1e-12);
    assert!(
        outcome
            .evaluation
            .measures
            .iter()
            .all(|m| (0.0..=1.0).contains(m))
    );

    // Re-evaluating the winner is a cache hit.
    let again = evaluator
        .evaluate_weighted(&outcome.design, Some(&weights))
        .unwrap();
    assert_eq!(evaluator.render_count(), 8);
    assert!((again.score - outcome.evaluation.score).abs() < 1e-12);

    let report = SweepReport::new(&outcome, &evaluator, &weights);
    assert_eq!(report.designs.len(), 8);
    assert_eq!(report.best, outcome.design);
}

#[test]
fn test_single_class_sweep_ignores_separability() {
    let points = PointSet::from_rows((0..80).map(|i| {
        let t = f64::from(i);
        (t, (t * 0.2).sin() * 10.0, 0)
    }));
    let mut evaluator = evaluator(points);
    let space = DesignSpace {
        aspect: RangeSpec::fixed(0.0),
        marker_size: RangeSpec::new(2.0, 4.0, 2.0),
        marker_opacity: RangeSpec::new(100.0, 200.0, 100.0),
        ..DesignSpace::new(96, 72)
    };
    let outcome = Sweep::new(&space, Weights::uniform(), &evaluator)
        .unwrap()
        .run_parallel(&mut evaluator, |_| {})
        .unwrap();

    assert_eq!(outcome.evaluated, 4);
    for (_, _, measures) in evaluator.cache().iter() {
        assert_eq!(measures[Measure::ClassSeparability.index()], 0.0);
        assert_eq!(measures[Measure::OutlierSeparability.index()], 0.0);
    }
}

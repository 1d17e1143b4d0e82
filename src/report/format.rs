//! Reporting utilities: dataset and fit summaries, prediction tables.
//!
//! We keep formatting code in one place so:
//! - the simulation/fitting code stays clean and testable
//! - output changes are localized

use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::{Dataset, ParamName, TrialStatus};
use crate::error::{FittingError, SimulationError};
use crate::fit::driver::FittedModel;

/// One evaluated trial: `(parameter, estimate, truth)` per learned parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRow {
    pub trial_id: u64,
    pub values: Vec<(ParamName, f64, f64)>,
}

/// Format the generation summary (counts, yield, drawn ranges).
pub fn format_generation_summary(dataset: &Dataset, path: Option<&Path>) -> String {
    let config = dataset.config();
    let successes = dataset.successes().count();
    let mut failures: BTreeMap<&'static str, usize> = BTreeMap::new();
    for t in dataset.trials() {
        if let TrialStatus::Failed(err) = &t.status {
            *failures.entry(failure_kind(err)).or_default() += 1;
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "=== {} {} - simulation dataset ===\n",
        dataset.meta.tool, dataset.meta.version
    ));
    if let Some(path) = path {
        out.push_str(&format!("File: {}\n", path.display()));
    }
    out.push_str(&format!("Created: {}\n", dataset.meta.created_at.format("%Y-%m-%d %H:%M:%S UTC")));
    out.push_str(&format!(
        "Trials: {successes} successful | {} stored | {} attempts | yield {:.1}%\n",
        dataset.len(),
        dataset.meta.attempts,
        percent(successes, dataset.meta.attempts)
    ));
    out.push_str(&format!(
        "Erosion: {} | seed={}\n",
        if config.sampler.erosion_enabled { "on" } else { "off" },
        config.master_seed
    ));
    if !failures.is_empty() {
        let parts: Vec<String> = failures.iter().map(|(k, n)| format!("{k}={n}")).collect();
        out.push_str(&format!("Stored failures: {}\n", parts.join(" ")));
    }

    let (n_curves, samples, duration) = dataset
        .successes()
        .filter_map(|t| t.curve.as_ref())
        .fold((0usize, 0usize, 0.0f64), |(n, s, d), c| (n + 1, s + c.len(), d + c.duration()));
    if n_curves > 0 {
        out.push_str(&format!(
            "Curves: mean {:.1} samples, mean visible duration {:.3}s\n",
            samples as f64 / n_curves as f64,
            duration / n_curves as f64
        ));
    }

    out.push_str("\nParameters:\n");
    for name in ParamName::ALL {
        let (lo, hi) = dataset
            .successes()
            .map(|t| t.params.get(name))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let state = if config.sampler.is_free(name) { "free " } else { "fixed" };
        if lo.is_finite() {
            out.push_str(&format!(
                "  {state} {:<22} [{}, {}]\n",
                name.key(),
                fmt_value(lo),
                fmt_value(hi)
            ));
        }
    }

    out
}

/// Format the summary of one fitted model.
pub fn format_fit_summary(model: &FittedModel, path: Option<&Path>) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== model '{}' | region {} ===\n", model.name, model.region));
    if let Some(path) = path {
        out.push_str(&format!("Saved: {}\n", path.display()));
    }
    out.push_str(&format!(
        "Trainer: {} | trials={} | batches={}{}\n",
        model.artifact.kind,
        model.trials_used,
        model.batches_dispatched,
        if model.stopped_early { " (converged early)" } else { "" }
    ));
    out.push_str(&format!("Features: {} | labels: ", model.feature_len));
    let labels: Vec<&str> = model.labels.iter().map(|s| s.name.key()).collect();
    out.push_str(&labels.join(", "));
    out.push('\n');
    out
}

/// Format the line for a region whose fit failed.
pub fn format_fit_failure(region: &crate::fit::region::Region, err: &FittingError) -> String {
    format!("=== region {region} ===\nFailed: {err}\n")
}

/// Format estimates against ground truth, plus the mean relative error per parameter.
pub fn format_predictions(rows: &[PredictionRow]) -> String {
    let Some(first) = rows.first() else {
        return "No successful trials to evaluate.\n".to_string();
    };
    let names: Vec<ParamName> = first.values.iter().map(|(n, _, _)| *n).collect();

    let mut out = String::new();
    out.push_str(&format!("{:>8}", "trial"));
    for name in &names {
        out.push_str(&format!(" {:>24}", name.key()));
    }
    out.push('\n');

    let mut rel_err = vec![0.0; names.len()];
    let mut counts = vec![0usize; names.len()];
    for row in rows {
        out.push_str(&format!("{:>8}", row.trial_id));
        for (i, (_, est, truth)) in row.values.iter().enumerate() {
            out.push_str(&format!(" {:>11} / {:>10}", fmt_value(*est), fmt_value(*truth)));
            if *truth != 0.0 {
                rel_err[i] += ((est - truth) / truth).abs();
                counts[i] += 1;
            }
        }
        out.push('\n');
    }

    out.push_str("\nMean relative error:\n");
    for ((name, err), n) in names.iter().zip(&rel_err).zip(&counts) {
        if *n > 0 {
            out.push_str(&format!("  {:<22} {:.1}%\n", name.key(), 100.0 * err / *n as f64));
        }
    }
    out
}

fn failure_kind(err: &SimulationError) -> &'static str {
    match err {
        SimulationError::Divergence { .. } => "divergence",
        SimulationError::NoSignal { .. } => "no_signal",
        SimulationError::Timeout { .. } => "timeout",
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 { 0.0 } else { 100.0 * part as f64 / whole as f64 }
}

/// Plain notation for ordinary magnitudes, scientific for the rest.
fn fmt_value(v: f64) -> String {
    let a = v.abs();
    if v == 0.0 || (1e-2..1e5).contains(&a) {
        format!("{v:.4}")
    } else {
        format!("{v:.3e}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::fixtures::dataset_with_failures;

    #[test]
    fn generation_summary_counts_failures() {
        let dataset = dataset_with_failures(20, 5, 1);
        let text = format_generation_summary(&dataset, None);
        assert!(text.contains("16 successful"));
        assert!(text.contains("no_signal=4"));
        assert!(text.contains("Erosion: off"));
        assert!(text.contains("free  rho"));
        assert!(text.contains("fixed erosion_coeff"));
    }

    #[test]
    fn predictions_report_relative_error() {
        let rows = vec![
            PredictionRow {
                trial_id: 1,
                values: vec![(ParamName::Rho, 1100.0, 1000.0)],
            },
            PredictionRow {
                trial_id: 2,
                values: vec![(ParamName::Rho, 1700.0, 2000.0)],
            },
        ];
        let text = format_predictions(&rows);
        assert!(text.contains("rho"));
        assert!(text.contains("12.5%"));
    }

    #[test]
    fn values_switch_to_scientific_notation() {
        assert_eq!(fmt_value(2000.0), "2000.0000");
        assert_eq!(fmt_value(5e-8), "5.000e-8");
    }
}

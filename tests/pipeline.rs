//! End-to-end runs: generate -> store -> fit -> store -> predict.

use std::collections::BTreeSet;

use clap::Parser;
use metsim_ml::app::pipeline::{run_fit, run_generate, run_predict};
use metsim_ml::cli::{Cli, Command};
use metsim_ml::config::Settings;
use metsim_ml::data::{GenerateOptions, generate};
use metsim_ml::domain::{
    CurveSample, GenerationConfig, ObservableCurve, ParamName, ParameterVector, SamplerConfig,
    TerminationReason,
};
use metsim_ml::error::SimulationError;
use metsim_ml::fit::{
    FitDriver, FitRequest, Grouping, Layout, LinearTrainer, PartitionScheme, Region, Repeat,
};
use metsim_ml::io::{ModelStore, load_model, read_dataset, write_dataset};
use metsim_ml::models::TrajectoryModel;
use metsim_ml::report::compute_predictions;

/// Cheap stand-in for the ablation model: a parabola in magnitude whose width
/// follows `rho` and depth follows `sigma`. Fast entries never show up.
struct ToyModel {
    sampler: SamplerConfig,
}

impl TrajectoryModel for ToyModel {
    fn simulate(
        &self,
        params: &ParameterVector,
        _erosion_enabled: bool,
    ) -> Result<ObservableCurve, SimulationError> {
        let v = params.get(ParamName::VInit);
        if v > 60_000.0 {
            return Err(SimulationError::NoSignal { visible: 0 });
        }
        let unit = |name| {
            self.sampler
                .spec(name)
                .map_or(0.5, |s| s.normalize(params.get(name)))
        };
        let duration = 0.4 + unit(ParamName::Rho);
        let peak = 0.5 + 3.0 * unit(ParamName::Sigma);
        let steps = (duration * 100.0).round() as usize;
        let samples = (0..=steps)
            .map(|i| {
                let t = i as f64 * 0.01;
                let u = 2.0 * t / duration - 1.0;
                CurveSample {
                    time: t,
                    height: 100_000.0 - 0.6 * v * t,
                    length: v * t,
                    velocity: v,
                    magnitude: peak + 4.0 * u * u,
                }
            })
            .collect();
        Ok(ObservableCurve {
            samples,
            termination: TerminationReason::MassDepleted,
        })
    }
}

fn toy_config(sample_count: usize) -> GenerationConfig {
    let mut config = GenerationConfig {
        sample_count,
        master_seed: 11,
        keep_failed: true,
        ..GenerationConfig::default()
    };
    config.sampler.erosion_enabled = false;
    config.observation.data_length = 24;
    config
}

#[test]
fn toy_dataset_trains_per_region_and_predicts() {
    let config = toy_config(400);
    let model = ToyModel {
        sampler: config.sampler.clone(),
    };
    let options = GenerateOptions {
        workers: Some(3),
        ..GenerateOptions::default()
    };
    let dataset = generate(&model, &config, &options).unwrap();
    assert_eq!(dataset.successes().count(), 400);
    assert!(dataset.len() > 400, "fast entries should have failed and been kept");

    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("sims.json");
    write_dataset(&data_path, &dataset).unwrap();
    let dataset = read_dataset(&data_path).unwrap();

    let request = FitRequest {
        grouping: Grouping {
            batch_size: 16,
            batch_count: 40,
            repeat: Repeat::Reshuffle,
        },
        scheme: PartitionScheme {
            layout: Layout::Halves,
            ..PartitionScheme::default()
        },
        ..FitRequest::new("toy")
    };
    let fitted = FitDriver::new(request).fit_regions(&dataset, |_| LinearTrainer::new(1e-6));
    assert_eq!(
        fitted.keys().copied().collect::<Vec<_>>(),
        vec![Region::BottomHalf, Region::TopHalf]
    );

    let store = ModelStore::new(dir.path().join("models"));
    let mut used = 0;
    for model in fitted.into_values() {
        let model = model.unwrap();
        used += model.trials_used;
        let path = store.save(&model).unwrap();
        assert_eq!(load_model(&path).unwrap(), model);
    }
    assert_eq!(used, 400);

    let model = store.load("toy", Region::TopHalf).unwrap();
    let rows = compute_predictions(&model, &dataset, 10).unwrap();
    assert_eq!(rows.len(), 10);
    let free: BTreeSet<ParamName> = config.sampler.free_params().into_iter().collect();
    for row in &rows {
        let names: BTreeSet<ParamName> = row.values.iter().map(|(n, _, _)| *n).collect();
        assert_eq!(names, free);
        assert!(row.values.iter().all(|(_, est, _)| est.is_finite()));
    }
}

#[test]
fn quadrant_fit_only_uses_its_quadrant() {
    let config = toy_config(200);
    let model = ToyModel {
        sampler: config.sampler.clone(),
    };
    let dataset = generate(&model, &config, &GenerateOptions::default()).unwrap();

    let scheme = PartitionScheme::for_region(ParamName::Rho, ParamName::Sigma, Region::LowerLeft);
    let expected = dataset
        .successes()
        .filter(|t| scheme.classify(&config.sampler, &t.params) == Region::LowerLeft)
        .count();

    let request = FitRequest {
        region: Region::LowerLeft,
        scheme,
        grouping: Grouping {
            batch_size: 8,
            batch_count: 2,
            repeat: Repeat::Never,
        },
        ..FitRequest::new("ll")
    };
    let fitted = FitDriver::new(request)
        .fit(&dataset, LinearTrainer::default())
        .unwrap();
    assert_eq!(fitted.trials_used, expected);
    assert_eq!(fitted.region, Region::LowerLeft);
}

fn parse(argv: &[&str]) -> Command {
    Cli::try_parse_from(argv).unwrap().command
}

#[test]
fn cli_pipeline_with_ablation_model() {
    let dir = tempfile::tempdir().unwrap();
    let preset = dir.path().join("preset.json");
    std::fs::write(&preset, r#"{ "observation": { "data_length": 16 } }"#).unwrap();
    let data = dir.path().join("sims.json");
    let models = dir.path().join("models");

    let Command::Generate(gen_args) = parse(&[
        "metsim",
        "generate",
        data.to_str().unwrap(),
        "20",
        "--noerosion",
        "--fixed",
        "true",
        "true",
        "true",
        "false",
        "true",
        "true",
        "true",
        "true",
        "true",
        "true",
        "--seed",
        "3",
        "--config",
        preset.to_str().unwrap(),
    ]) else {
        panic!("expected generate");
    };
    let dataset = run_generate(&gen_args, &Settings::default()).unwrap();
    assert_eq!(dataset.successes().count(), 20);
    assert_eq!(dataset.config().observation.data_length, 16);
    assert!(data.exists());

    let Command::Fit(fit_args) = parse(&[
        "metsim",
        "fit",
        data.to_str().unwrap(),
        models.to_str().unwrap(),
        "abl",
        "--group-size",
        "5",
        "--group-count",
        "4",
        "--expect-erosion",
        "off",
    ]) else {
        panic!("expected fit");
    };
    let outcomes = run_fit(&fit_args).unwrap();
    assert_eq!(outcomes.len(), 1);
    let (model, path) = outcomes.into_iter().next().unwrap().result.unwrap();
    assert_eq!(path, models.join("abl.json"));
    assert_eq!(model.batches_dispatched, 4);
    assert_eq!(model.labels.len(), 1);

    let Command::Predict(pred_args) = parse(&[
        "metsim",
        "predict",
        path.to_str().unwrap(),
        data.to_str().unwrap(),
        "--limit",
        "5",
    ]) else {
        panic!("expected predict");
    };
    let (_, rows) = run_predict(&pred_args).unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.values[0].0 == ParamName::Rho));
}

#[test]
fn mismatched_expectation_is_rejected_before_training() {
    let config = toy_config(30);
    let model = ToyModel {
        sampler: config.sampler.clone(),
    };
    let dataset = generate(&model, &config, &GenerateOptions::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("sims.json");
    write_dataset(&data, &dataset).unwrap();

    let Command::Fit(args) = parse(&[
        "metsim",
        "fit",
        data.to_str().unwrap(),
        dir.path().join("models").to_str().unwrap(),
        "m",
        "--group-size",
        "10",
        "--group-count",
        "2",
        "--expect-erosion",
        "on",
    ]) else {
        panic!("expected fit");
    };
    let outcomes = run_fit(&args).unwrap();
    let err = outcomes.into_iter().next().unwrap().result.unwrap_err();
    assert!(matches!(err, metsim_ml::error::FittingError::ConfigMismatch(_)));
    assert!(!dir.path().join("models").join("m.json").exists());
}

//! Persistence tests against real YAML stores on disk (no mocks).

use std::fs;

use popp_common::RegionId;
use popp_config::{ModelConfig, ModelKind};
use popp_core::feed::JsonObservationFeed;
use popp_core::logging::LogContext;
use popp_core::model::{Estimator, Observations, PeriodicFolder, RateModel};
use popp_core::{RecordStore, RegionRegistry, TimeBucketStore, YamlRecordStore};
use tempfile::TempDir;

fn yaml_folder(dir: &std::path::Path, increment: i64, cycle: i64) -> PeriodicFolder {
    let store = YamlRecordStore::new(dir);
    PeriodicFolder::new(TimeBucketStore::new(increment, Box::new(store)).unwrap(), cycle).unwrap()
}

#[test]
fn save_then_load_reproduces_parameters() {
    let tmp = TempDir::new().unwrap();
    let mut model = yaml_folder(tmp.path(), 60, 600);
    let observations = Observations::from([(0, 3), (60, 0), (120, 7), (600, 1), (660, 2)]);
    model.update(&observations).unwrap();
    assert_eq!(model.save().unwrap(), 3);

    assert!(tmp.path().join("0.yaml").exists());
    assert!(tmp.path().join("60.yaml").exists());
    assert!(tmp.path().join("120.yaml").exists());

    let mut restored = yaml_folder(tmp.path(), 60, 600);
    assert!(restored.load().unwrap());
    assert_eq!(restored.pivot(), Some(0));
    for t in [0, 60, 120] {
        let a = model.get_at(t);
        let b = restored.get_at(t);
        assert!((a.alpha() - b.alpha()).abs() < 1e-9, "alpha at {}", t);
        assert!((a.beta() - b.beta()).abs() < 1e-9, "beta at {}", t);
    }
}

#[test]
fn missing_store_loads_nothing() {
    let tmp = TempDir::new().unwrap();
    let location = tmp.path().join("never-written");
    let mut model = yaml_folder(&location, 60, 600);
    assert!(!model.load().unwrap());
    assert_eq!(model.pivot(), None);
    assert!(location.is_dir());
}

#[test]
fn record_files_are_plain_yaml() {
    let tmp = TempDir::new().unwrap();
    let mut model = yaml_folder(tmp.path(), 60, 120);
    model
        .update(&Observations::from([(0, 1), (60, 1), (120, 1), (180, 1)]))
        .unwrap();
    model.save().unwrap();

    let content = fs::read_to_string(tmp.path().join("0.yaml")).unwrap();
    let record: serde_yaml::Value = serde_yaml::from_str(&content).unwrap();
    let alpha = record["alpha"].as_f64().unwrap();
    let beta = record["beta"].as_f64().unwrap();
    assert!((alpha - 3.1).abs() < 1e-12);
    assert!((beta - 121.1).abs() < 1e-12);
}

#[test]
fn shape_below_one_restores_with_mode_sentinel() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("0.yaml"), "alpha: 0.5\nbeta: 2.0\n").unwrap();
    fs::write(tmp.path().join("60.yaml"), "alpha: 4.0\nbeta: 2.0\n").unwrap();

    let mut model = yaml_folder(tmp.path(), 60, 120);
    assert!(model.load().unwrap());

    let modes = model.retrieve_full_cycle(Estimator::Mode);
    assert_eq!(modes[&0], -1.0);
    assert!((modes[&60] - 1.5).abs() < 1e-12);

    let means = model.retrieve_full_cycle(Estimator::Mean);
    assert!((means[&0] - 0.25).abs() < 1e-12);
}

#[test]
fn damaged_files_are_skipped() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("0.yaml"), "alpha: 2.0\nbeta: 4.0\n").unwrap();
    fs::write(tmp.path().join("60.yaml"), "alpha: [not, a, number]\n").unwrap();
    fs::write(tmp.path().join("notes.yaml"), "alpha: 2.0\nbeta: 4.0\n").unwrap();
    fs::write(tmp.path().join("120.txt"), "alpha: 2.0\nbeta: 4.0\n").unwrap();
    fs::write(tmp.path().join("180.yaml"), "alpha: -1.0\nbeta: 4.0\n").unwrap();

    let store = YamlRecordStore::new(tmp.path());
    let records = store.read_all().unwrap();
    let keys: Vec<i64> = records.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![0, 180]);

    let mut model = yaml_folder(tmp.path(), 60, 600);
    assert!(model.load().unwrap());
    assert_eq!(model.inner().len(), 1);
}

#[test]
fn registry_learns_and_reloads_from_disk() {
    let tmp = TempDir::new().unwrap();
    let config = ModelConfig {
        increment: 60,
        periodic_cycle: 600,
        model: ModelKind::Spectral,
        db_root: Some(tmp.path().to_path_buf()),
        regions: vec!["kitchen".into(), "hall".into()],
        ..ModelConfig::default()
    };
    let regions = config.region_ids().unwrap();
    let ctx = LogContext::new("run-test");

    let feed = JsonObservationFeed::from_json(
        r#"{"kitchen": {"0": 2, "60": 1, "120": 0, "660": 3}, "hall": {"300": 1}}"#,
    )
    .unwrap();
    let mut registry = RegionRegistry::open(&config, &regions).unwrap();
    assert!(registry.load_all(&ctx).succeeded.is_empty());
    let learned = registry.learn(&ctx, &feed, 0, 1200);
    assert!(learned.summary.all_succeeded);

    let kitchen = RegionId::new("kitchen").unwrap();
    let location = config.store_location(&kitchen);
    assert!(location.ends_with("kitchen/poisson_process_600/60"));
    assert!(location.join("0.yaml").exists());
    assert!(location.join("60.yaml").exists());
    assert!(location.join("120.yaml").exists());

    let expected = registry
        .retrieve_full_cycle(&kitchen, Estimator::Mean)
        .unwrap();

    let mut reopened = RegionRegistry::open(&config, &regions).unwrap();
    let loaded = reopened.load_all(&ctx);
    assert_eq!(loaded.succeeded.len(), 2);
    let actual = reopened
        .retrieve_full_cycle(&kitchen, Estimator::Mean)
        .unwrap();
    assert_eq!(expected.len(), actual.len());
    for (a, b) in expected.values().zip(actual.values()) {
        assert!((a - b).abs() < 1e-9);
    }
}

use std::ops::Range;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use itertools::Itertools;

use timeseries_mapping::domain::Load;
use timeseries_mapping::{
    InMemoryNetwork, InMemoryTimeSeriesStore, MappingConfig, MappingDriver, MappingError, MappingTable,
    ProblemCategory, TimeSeriesStore, Variable,
};

use super::common::run;

#[tokio::test]
async fn test_chunks_cover_the_index_in_order() {
    let network = InMemoryNetwork::new().with_battery("bat1", -50.0, 50.0, 0.0);
    let table = MappingTable::builder(&network)
        .map_equally("ts_bat", Variable::TargetP, ["bat1"])
        .unwrap()
        .build();
    let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
    let store = InMemoryTimeSeriesStore::new(10)
        .with_versions([1])
        .with_series("ts_bat", 1, values.clone());

    let run = run(MappingConfig::default().with_chunk_size(4), network, table, store).await;

    assert_eq!(run.summary.chunks, 3);
    let batches: Vec<_> = run
        .observer
        .batches()
        .into_iter()
        .filter(|b| b.name == "ts_bat")
        .sorted_by_key(|b| b.index)
        .collect();
    let ranges: Vec<Range<usize>> = batches.iter().map(|b| b.points.clone()).collect();
    assert_eq!(ranges, vec![0..4, 4..8, 8..10]);
    assert_eq!(run.series("ts_bat", 1), values);
    assert_eq!(run.series("bat1.targetP", 1), values);
}

#[tokio::test]
async fn test_equipment_batches_carry_tags() {
    let network = InMemoryNetwork::new().with_generator("gen1", 0.0, 100.0, 0.0);
    let table = MappingTable::builder(&network)
        .map_equally("ts1", Variable::TargetP, ["gen1"])
        .unwrap()
        .build();
    let store = InMemoryTimeSeriesStore::new(1)
        .with_versions([1])
        .with_series("ts1", 1, vec![10.0]);

    let run = run(MappingConfig::default(), network, table, store).await;

    let batch = run
        .observer
        .batches()
        .into_iter()
        .find(|b| b.name == "gen1.targetP")
        .expect("equipment batch");
    assert!(batch.is_equipment());
    assert_eq!(batch.variable(), Some(Variable::TargetP));
    assert_eq!(batch.tags["kind"], "generator");
    assert_eq!(batch.tags["timeSeries"], "ts1");
}

#[tokio::test]
async fn test_load_parts_drive_p0() {
    let network = InMemoryNetwork::new().with_load(
        "load1",
        Load {
            p0: 100.0,
            fixed_active_power: Some(40.0),
            variable_active_power: Some(60.0),
        },
    );
    let table = MappingTable::builder(&network)
        .map_equally("ts_var", Variable::VariableActivePower, ["load1"])
        .unwrap()
        .build();
    let store = InMemoryTimeSeriesStore::new(2)
        .with_versions([1])
        .with_series("ts_var", 1, vec![10.0, 160.0]);

    let run = run(MappingConfig::default(), network, table, store).await;

    assert_eq!(run.series("load1.p0", 1), vec![50.0, 200.0]);
    assert!(run.records.is_empty());
}

#[tokio::test]
async fn test_versions_do_not_leak_corrections() {
    let network = InMemoryNetwork::new().with_generator("gen1", 0.0, 1000.0, 0.0);
    let table = MappingTable::builder(&network)
        .map_equally("ts1", Variable::TargetP, ["gen1"])
        .unwrap()
        .ignore_limits("ts1")
        .build();
    let store = InMemoryTimeSeriesStore::new(1)
        .with_versions(1..=6)
        .with_series("ts1", 1, vec![5000.0])
        .with_series("ts1", 2, vec![100.0])
        .with_series("ts1", 3, vec![3000.0])
        .with_series("ts1", 4, vec![100.0])
        .with_series("ts1", 5, vec![1500.0])
        .with_series("ts1", 6, vec![100.0]);

    let run = run(MappingConfig::default(), network, table, store).await;

    assert_eq!(run.summary.versions, 6);
    for version in [2, 4, 6] {
        assert!(run.series("gen1.maxP", version).is_empty());
    }
    assert_eq!(run.series("gen1.maxP", 5), vec![1500.0 + 0.0001]);
    let limit_changes = run
        .records
        .iter()
        .filter(|r| r.category == ProblemCategory::LimitChange)
        .count();
    assert_eq!(limit_changes, 3);
    assert_eq!(run.observer.finished_versions(), vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn test_records_serialize_for_report_writers() {
    let network = InMemoryNetwork::new().with_generator("gen1", 0.0, 1000.0, 2000.0);
    let table = MappingTable::builder(&network).build();
    let store = InMemoryTimeSeriesStore::new(1).with_versions([1]);

    let run = run(MappingConfig::default(), network, table, store).await;

    let json = serde_json::to_value(&run.records).unwrap();
    assert_eq!(json[0]["label"], "targetP changed to base case maxP");
    assert_eq!(json[0]["equipment"], "gen1");
    assert_eq!(json[0]["section"], "generator");
    assert_eq!(run.records[0].title(), "BC range problem - targetP changed to base case maxP");
}

struct UnreachableStore;

#[async_trait]
impl TimeSeriesStore for UnreachableStore {
    async fn versions(&self) -> Result<Vec<u32>> {
        Ok(vec![1])
    }

    async fn point_count(&self) -> Result<usize> {
        Ok(4)
    }

    async fn fetch(&self, _name: &str, _version: u32, _points: Range<usize>) -> Result<Vec<f64>> {
        anyhow::bail!("connection refused")
    }
}

#[tokio::test]
async fn test_store_failure_is_fatal_and_not_retried() {
    let network = InMemoryNetwork::new().with_generator("gen1", 0.0, 100.0, 0.0);
    let table = MappingTable::builder(&network)
        .map_equally("ts1", Variable::TargetP, ["gen1"])
        .unwrap()
        .build();
    let driver = Arc::new(
        MappingDriver::new(
            MappingConfig::default(),
            Arc::new(table),
            Arc::new(network),
            Arc::new(UnreachableStore),
        )
        .unwrap(),
    );

    let err = driver.run().await.unwrap_err();
    assert!(matches!(err, MappingError::Store(_)));
    assert!(err.to_string().contains("connection refused"));
}

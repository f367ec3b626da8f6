use rstest::{fixture, rstest};

use timeseries_mapping::domain::{DistributionKey, HvdcLine};
use timeseries_mapping::{
    EquipmentKind, InMemoryNetwork, InMemoryTimeSeriesStore, MappingConfig, MappingTable,
    ProblemCategory, Severity, Variable, VariantScope,
};

use super::common::run;

const MARGIN: f64 = 0.0001;

#[fixture]
fn generator() -> InMemoryNetwork {
    InMemoryNetwork::new().with_generator("gen1", 0.0, 1000.0, 2000.0)
}

#[rstest]
#[tokio::test]
async fn test_base_case_violation_is_clamped_once_for_all_versions(generator: InMemoryNetwork) {
    let table = MappingTable::builder(&generator).build();
    let store = InMemoryTimeSeriesStore::new(3).with_versions([1, 2]);

    let run = run(MappingConfig::default(), generator, table, store).await;

    assert_eq!(run.records.len(), 1);
    let record = &run.records[0];
    assert_eq!(record.scope, VariantScope::All);
    assert_eq!(record.category, ProblemCategory::BaseCaseRangeProblem);
    assert_eq!(record.severity, Severity::Warning);
    assert_eq!(record.label, "targetP changed to base case maxP");
    assert_eq!(record.point, None);
    assert_eq!(run.series("gen1.targetP", 1), vec![1000.0; 3]);
    assert_eq!(run.series("gen1.targetP", 2), vec![1000.0; 3]);
}

#[rstest]
#[tokio::test]
async fn test_escape_flag_widens_base_case_limit(generator: InMemoryNetwork) {
    let table = MappingTable::builder(&generator)
        .map_equally("ts_min", Variable::MinP, ["gen1"])
        .unwrap()
        .ignore_limits("ts_min")
        .build();
    let store = InMemoryTimeSeriesStore::new(2)
        .with_versions([1])
        .with_shared_series("ts_min", vec![0.0, 0.0]);

    let run = run(MappingConfig::default(), generator, table, store).await;

    assert_eq!(run.records.len(), 1);
    let record = &run.records[0];
    assert_eq!(record.scope, VariantScope::All);
    assert_eq!(record.category, ProblemCategory::BaseCaseRangeProblem);
    assert_eq!(record.severity, Severity::Info);
    assert_eq!(run.series("gen1.maxP", 1), vec![2000.0, 2000.0]);
    assert_eq!(run.series("gen1.targetP", 1), Vec::<f64>::new());
}

#[tokio::test]
async fn test_sign_boundary_sets_value_to_zero() {
    let network = InMemoryNetwork::new()
        .with_generator("gen_neg", 1000.0, 2000.0, -2000.0)
        .with_generator("gen_low", 1000.0, 2000.0, 500.0);
    let table = MappingTable::builder(&network).build();
    let store = InMemoryTimeSeriesStore::new(1).with_versions([1]);

    let run = run(MappingConfig::default(), network, table, store).await;

    assert_eq!(run.series("gen_neg.targetP", 1), vec![0.0]);
    assert_eq!(run.series("gen_low.targetP", 1), Vec::<f64>::new());

    let neg: Vec<_> = run
        .records
        .iter()
        .filter(|r| r.equipment.as_ref().is_some_and(|e| e.as_str() == "gen_neg"))
        .collect();
    assert_eq!(neg.len(), 1);
    assert_eq!(neg[0].label, "targetP changed to 0");
    assert_eq!(neg[0].severity, Severity::Warning);
    assert_eq!(neg[0].category, ProblemCategory::BaseCaseRangeProblem);
    assert_eq!(neg[0].scope, VariantScope::All);

    let low: Vec<_> = run
        .records
        .iter()
        .filter(|r| r.equipment.as_ref().is_some_and(|e| e.as_str() == "gen_low"))
        .collect();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].severity, Severity::Info);
    assert_eq!(low[0].category, ProblemCategory::BaseCaseRangeProblem);
}

#[tokio::test]
async fn test_mapped_peak_widens_limit_at_that_point_only() {
    let network = InMemoryNetwork::new().with_generator("gen1", 0.0, 1000.0, 0.0);
    let table = MappingTable::builder(&network)
        .map_equally("ts1", Variable::TargetP, ["gen1"])
        .unwrap()
        .ignore_limits("ts1")
        .build();
    let store = InMemoryTimeSeriesStore::new(3)
        .with_versions([1])
        .with_series("ts1", 1, vec![500.0, 2000.0, 500.0]);

    let run = run(MappingConfig::default(), network, table, store).await;

    assert_eq!(run.series("gen1.targetP", 1), vec![500.0, 2000.0, 500.0]);
    assert_eq!(run.series("gen1.maxP", 1), vec![1000.0, 2000.0 + MARGIN, 1000.0]);

    let points = run.point_records();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].category, ProblemCategory::LimitChange);
    assert_eq!(points[0].point, Some(1));
    assert_eq!(points[0].scope, VariantScope::Version(1));

    let synthesis = run.synthesis();
    assert_eq!(synthesis.len(), 1);
    assert_eq!(synthesis[0].category, ProblemCategory::ScalingDownProblem);
    assert_eq!(
        synthesis[0].synthesis.as_deref(),
        Some("at least one base case maxP changed to mapped targetP")
    );
}

#[rstest]
#[case(false, "targetP changed to mapped maxP")]
#[case(true, "targetP changed to mapped maxP (ignoreLimits disabled)")]
#[tokio::test]
async fn test_mapped_bound_wins_over_escape_flag(#[case] ignore_limits: bool, #[case] label: &'static str) {
    let network = InMemoryNetwork::new().with_generator("gen1", 0.0, 1000.0, 0.0);
    let mut builder = MappingTable::builder(&network)
        .map_equally("ts_p", Variable::TargetP, ["gen1"])
        .unwrap()
        .map_equally("ts_max", Variable::MaxP, ["gen1"])
        .unwrap();
    if ignore_limits {
        builder = builder.ignore_limits("ts_p");
    }
    let table = builder.build();
    let store = InMemoryTimeSeriesStore::new(2)
        .with_versions([1])
        .with_series("ts_p", 1, vec![900.0, 900.0])
        .with_series("ts_max", 1, vec![800.0, 800.0]);

    let run = run(MappingConfig::default(), network, table, store).await;

    assert_eq!(run.series("gen1.targetP", 1), vec![800.0, 800.0]);
    assert_eq!(run.series("gen1.maxP", 1), vec![800.0, 800.0]);
    let synthesis = run.synthesis();
    assert_eq!(synthesis.len(), 1);
    assert_eq!(synthesis[0].category, ProblemCategory::ScalingDownProblem);
    assert_eq!(synthesis[0].label, label);
    assert_eq!(run.point_records().len(), 2);
}

#[tokio::test]
async fn test_base_case_value_against_mapped_bound() {
    let network = InMemoryNetwork::new().with_generator("gen1", 0.0, 1000.0, 900.0);
    let table = MappingTable::builder(&network)
        .map_equally("ts_max", Variable::MaxP, ["gen1"])
        .unwrap()
        .build();
    let store = InMemoryTimeSeriesStore::new(1)
        .with_versions([4])
        .with_series("ts_max", 4, vec![700.0]);

    let run = run(MappingConfig::default(), network, table, store).await;

    assert_eq!(run.series("gen1.targetP", 4), vec![700.0]);
    let synthesis = run.synthesis();
    assert_eq!(synthesis[0].category, ProblemCategory::MappingRangeProblem);
    assert_eq!(synthesis[0].scope, VariantScope::Version(4));
}

#[tokio::test]
async fn test_hvdc_operator_range_limits_setpoint() {
    let network = InMemoryNetwork::new().with_hvdc_line(
        "hvdc1",
        HvdcLine {
            max_p: 1200.0,
            active_power_setpoint: 0.0,
            cs1_to_cs2: Some(1000.0),
            cs2_to_cs1: Some(800.0),
        },
    );
    let table = MappingTable::builder(&network)
        .map_equally("ts_hvdc", Variable::ActivePowerSetpoint, ["hvdc1"])
        .unwrap()
        .build();
    let store = InMemoryTimeSeriesStore::new(3)
        .with_versions([1])
        .with_series("ts_hvdc", 1, vec![1100.0, -900.0, 300.0]);

    let run = run(MappingConfig::default(), network, table, store).await;

    assert_eq!(run.series("hvdc1.activePowerSetpoint", 1), vec![1000.0, -800.0, 300.0]);
    let labels: Vec<_> = run.synthesis().iter().map(|r| r.label.clone()).collect();
    assert_eq!(
        labels,
        vec![
            "activePowerSetpoint changed to base case CS1toCS2".to_string(),
            "activePowerSetpoint changed to base case -CS2toCS1".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_tap_position_is_clamped_even_with_escape_flag() {
    let network = InMemoryNetwork::new().with_phase_tap_changer("pst1", 1, 33, 17);
    let table = MappingTable::builder(&network)
        .map_equally("ts_tap", Variable::PhaseTapPosition, ["pst1"])
        .unwrap()
        .ignore_limits("ts_tap")
        .build();
    let store = InMemoryTimeSeriesStore::new(2)
        .with_versions([1])
        .with_series("ts_tap", 1, vec![40.0, 0.0]);

    let run = run(MappingConfig::default(), network, table, store).await;

    assert_eq!(run.series("pst1.phaseTapPosition", 1), vec![33.0, 1.0]);
    assert!(run
        .synthesis()
        .iter()
        .all(|r| r.label.ends_with("(ignoreLimits disabled)")));
}

#[tokio::test]
async fn test_attribute_weights_follow_capacity() {
    let network = InMemoryNetwork::new()
        .with_generator("gen1", 0.0, 100.0, 0.0)
        .with_generator("gen2", 0.0, 300.0, 0.0);
    let table = MappingTable::builder(&network)
        .map(
            "ts_total",
            Variable::TargetP,
            vec![
                ("gen1".into(), DistributionKey::Attribute(Variable::MaxP)),
                ("gen2".into(), DistributionKey::Attribute(Variable::MaxP)),
            ],
        )
        .unwrap()
        .build();
    let store = InMemoryTimeSeriesStore::new(1)
        .with_versions([1])
        .with_series("ts_total", 1, vec![200.0]);

    let run = run(MappingConfig::default(), network, table, store).await;

    assert_eq!(run.series("gen1.targetP", 1), vec![50.0]);
    assert_eq!(run.series("gen2.targetP", 1), vec![150.0]);
    assert!(run.records.is_empty());
}

#[tokio::test]
async fn test_battery_discharge_clamped_to_min() {
    let network = InMemoryNetwork::new().with_battery("bat1", -50.0, 50.0, 0.0);
    let table = MappingTable::builder(&network)
        .map_equally("ts_bat", Variable::TargetP, ["bat1"])
        .unwrap()
        .build();
    let store = InMemoryTimeSeriesStore::new(2)
        .with_versions([1])
        .with_series("ts_bat", 1, vec![-80.0, 20.0]);

    let run = run(MappingConfig::default(), network, table, store).await;

    assert_eq!(run.series("bat1.targetP", 1), vec![-50.0, 20.0]);
    let points = run.point_records();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].point, Some(0));
    assert_eq!(points[0].severity, Severity::Warning);
    let synthesis = run.synthesis();
    assert_eq!(synthesis.len(), 1);
    assert_eq!(synthesis[0].category, ProblemCategory::ScalingDownProblem);
    assert_eq!(synthesis[0].label, "targetP changed to base case minP");
    assert_eq!(synthesis[0].section, EquipmentKind::Battery);
}

#[tokio::test]
async fn test_hvdc_base_case_setpoint_widened_with_escape_flag() {
    let network = InMemoryNetwork::new().with_hvdc_line(
        "hvdc1",
        HvdcLine {
            max_p: 1200.0,
            active_power_setpoint: 1500.0,
            cs1_to_cs2: Some(1000.0),
            cs2_to_cs1: None,
        },
    );
    let table = MappingTable::builder(&network)
        .map_equally("ts_cs2", Variable::Cs2ToCs1, ["hvdc1"])
        .unwrap()
        .ignore_limits("ts_cs2")
        .build();
    let store = InMemoryTimeSeriesStore::new(2)
        .with_versions([1])
        .with_shared_series("ts_cs2", vec![800.0, 800.0]);

    let run = run(MappingConfig::default(), network, table, store).await;

    assert_eq!(run.series("hvdc1.maxP", 1), vec![1500.0, 1500.0]);
    assert_eq!(run.series("hvdc1.CS1toCS2", 1), vec![1500.0, 1500.0]);
    assert_eq!(run.series("hvdc1.CS2toCS1", 1), vec![800.0, 800.0]);
    assert!(run.series("hvdc1.activePowerSetpoint", 1).is_empty());

    assert_eq!(run.records.len(), 1);
    let record = &run.records[0];
    assert_eq!(record.scope, VariantScope::All);
    assert_eq!(record.category, ProblemCategory::BaseCaseRangeProblem);
    assert_eq!(record.severity, Severity::Info);
    assert_eq!(record.label, "base case CS1toCS2 changed to activePowerSetpoint");
}

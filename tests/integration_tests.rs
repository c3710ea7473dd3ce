use rider_segmentation::Error;
use rider_segmentation::census::{Census, CensusType};
use rider_segmentation::config::PipelineConfig;
use rider_segmentation::export::Dashboard;
use rider_segmentation::features::{FeatureGroup, HOURS};
use rider_segmentation::params::{Algorithm, ClusterParams, MonthWindow, ProfileParams, View};
use rider_segmentation::pipeline::Pipeline;
use rider_segmentation::profile::{ProfileGroup, ProfileTable};
use rider_segmentation::segmentation::Segmenter;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const AFC_HEADER: &str = "deviceclassid,trxtime,tickettypeid,card,origin,movementtype\n";

#[derive(Clone, Copy)]
enum Habit {
    Commuter,
    Weekend,
    Night,
}

/// (week, day of week, hour) of the `k`-th trip of a rider with `habit`.
fn slot(habit: Habit, k: usize) -> (usize, usize, usize) {
    match habit {
        Habit::Commuter => ((k / 10) % 4, (k / 2) % 5, if k % 2 == 0 { 8 } else { 17 }),
        Habit::Weekend => ((k / 2) % 4, 5 + k % 2, 12 + k % 3),
        Habit::Night => ((k / 7) % 4, k % 7, 21 + k % 3),
    }
}

/// October 2017 starts its first full week on Monday the 2nd.
fn timestamp(week: usize, day: usize, hour: usize, minute: usize) -> String {
    format!("2017-10-{:02} {hour:02}:{minute:02}:00", 2 + 7 * week + day)
}

fn write_trips(out: &mut String, card: &str, habit: Habit, trips: usize, ticket: u32) {
    let stop = match habit {
        Habit::Commuter => 100,
        Habit::Weekend => 200,
        Habit::Night => 300,
    };
    for k in 0..trips {
        let (week, day, hour) = slot(habit, k);
        let _ = writeln!(
            out,
            "411,{},{ticket},{card},{stop},7",
            timestamp(week, day, hour, (k * 7) % 60)
        );
    }
}

fn census_row(zipcode: &str, scale: f64) -> String {
    let mut raw: Vec<f64> = vec![1000.0, 500.0, 200.0, 10.0, 100.0, 5.0, 85.0, 50.0, 50.0, 1000.0];
    raw.extend(std::iter::repeat_n(62.5, 16));
    raw.extend([55000.0, 400.0, 100.0, 100.0, 50.0, 50.0, 50.0, 25.0, 25.0]);
    raw.extend([1000.0, 20.0, 20.0, 20.0, 20.0, 20.0]);
    raw.extend([300.0, 10.0, 800.0, 5.0, 500.0]);
    raw.extend([400.0, 250.0, 200.0, 100.0, 100.0, 50.0, 20.0, 30.0, 150.0, 120.0, 30.0]);
    assert_eq!(raw.len(), 57);
    let values: Vec<String> = raw
        .iter()
        .enumerate()
        .map(|(i, v)| if i == 26 { v.to_string() } else { (v * scale).to_string() })
        .collect();
    format!("{zipcode},MA,{}", values.join(","))
}

/// Writes the reference tables and returns the data root.
fn scratch_root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("rider_segmentation_it_{name}"));
    let _ = fs::remove_dir_all(&root);
    let input = root.join("input");
    for dir in ["afc_odx", "stops", "fareprod", "census"] {
        fs::create_dir_all(input.join(dir)).unwrap();
    }
    fs::write(
        input.join("stops/stops_withzip.csv"),
        "stop_id,zipcode\n100,02139\n200,02108\n300,02140\n",
    )
    .unwrap();
    fs::write(
        input.join("fareprod/fareprod_ttj.csv"),
        "tickettypeid;tariff;servicebrand;usertype;zonecr\n\
         1;Monthly;Subway;Adult;\n\
         2;Stored Value;Bus;Student;\n\
         3;7-Day Pass;Subway;Senior;\n\
         4;Zone 5 Pass;Commuter Rail;Adult;5\n",
    )
    .unwrap();
    let mut census = String::from("zipcode,state");
    for i in 0..57 {
        let _ = write!(census, ",c{i}");
    }
    census.push('\n');
    for (zip, scale) in [("02139", 1.0), ("02108", 2.0), ("02140", 0.5)] {
        census.push_str(&census_row(zip, scale));
        census.push('\n');
    }
    fs::write(input.join("census/MA_census.csv"), census).unwrap();
    root
}

/// 24 riders in three habits and two frequency tiers, plus riders that the
/// filters must drop.
fn write_population(root: &Path) {
    let mut afc = String::from(AFC_HEADER);
    for i in 0..24 {
        let habit = [Habit::Commuter, Habit::Weekend, Habit::Night][i % 3];
        let trips = if i < 12 { 8 + i % 5 } else { 22 + i % 7 };
        write_trips(&mut afc, &format!("r{i:02}"), habit, trips, 1 + (i % 3) as u32);
    }
    write_trips(&mut afc, "boundary5", Habit::Commuter, 5, 1);
    write_trips(&mut afc, "boundary6", Habit::Commuter, 6, 1);
    write_trips(&mut afc, "rail", Habit::Commuter, 12, 4);
    afc.push_str("999,2017-10-02 08:00:00,1,r00,100,7\n");
    fs::write(root.join("input/afc_odx/afc_odx_1710.csv"), afc).unwrap();
}

fn window(duration: u32) -> MonthWindow {
    MonthWindow::new("1710".parse().unwrap(), duration).unwrap()
}

fn assert_groups_sum_to_100(table: &ProfileTable) {
    let groups: Vec<ProfileGroup> = table
        .columns()
        .iter()
        .map(|c| c.group)
        .filter(|g| g.is_distribution())
        .collect();
    for (r, row) in table.rows().iter().enumerate() {
        for group in &groups {
            let total: f64 = table.indices_of(*group).iter().map(|c| row.values[*c]).sum();
            assert!(
                total == 0.0 || (total - 100.0).abs() < 1e-6,
                "row {r} group {group:?} sums to {total}"
            );
        }
    }
}

#[test]
fn test_feature_table_invariants_and_filters() {
    let root = scratch_root("features");
    write_population(&root);
    let pipeline = Pipeline::new(PipelineConfig::with_data_dir(&root));

    let table = pipeline.features(&window(1)).unwrap();
    assert_eq!(table.len(), 25);
    assert!(table.rider_index("boundary5").is_none());
    assert!(table.rider_index("rail").is_none());
    let kept = table.rider_index("boundary6").unwrap();
    assert_eq!(table.frequency()[kept], 1);
    assert_eq!(table.frequency()[table.rider_index("r20").unwrap()], 2);

    let schema = table.schema();
    let hourly = schema.indices_of(FeatureGroup::Hourly);
    let zips = schema.indices_of(FeatureGroup::Zipcode);
    let total = schema.position("total_num_trips").unwrap();
    for r in 0..table.len() {
        let row = table.row(r);
        let h: f64 = hourly.iter().map(|c| row[*c]).sum();
        let z: f64 = zips.iter().map(|c| row[*c]).sum();
        assert_eq!(h, row[total]);
        assert_eq!(z, row[total]);
    }
    assert!(schema.position("zipcode_02140").is_some());
}

#[test]
fn test_single_rider_scenario() {
    let root = scratch_root("single_rider");
    let mut afc = String::from(AFC_HEADER);
    for week in 0..5 {
        for minute in [5, 45] {
            let _ = writeln!(afc, "411,{},1,solo,100,7", timestamp(week, 0, 8, minute));
        }
    }
    fs::write(root.join("input/afc_odx/afc_odx_1710.csv"), afc).unwrap();
    let pipeline = Pipeline::new(PipelineConfig::with_data_dir(&root));

    let table = pipeline.features(&window(1)).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.get(0, "hr_0_8"), Some(10.0));
    let hourly_total: f64 = table
        .schema()
        .indices_of(FeatureGroup::Hourly)
        .iter()
        .map(|c| table.row(0)[*c])
        .sum();
    assert_eq!(hourly_total, 10.0);
    assert_eq!(table.get(0, "total_num_trips"), Some(10.0));
    assert_eq!(table.frequency()[0], 1);
}

#[test]
fn test_missing_month_is_data_not_found() {
    let root = scratch_root("missing_month");
    write_population(&root);
    let pipeline = Pipeline::new(PipelineConfig::with_data_dir(&root));

    match pipeline.features(&window(2)) {
        Err(Error::DataNotFound { path }) => assert!(path.ends_with("afc_odx/afc_odx_1711.csv")),
        other => panic!("expected DataNotFound, got {other:?}"),
    }
    assert!(!pipeline.cache().features_path(&window(2)).exists());
}

#[test]
fn test_segmentation_is_idempotent() {
    let root = scratch_root("idempotent");
    write_population(&root);
    let pipeline = Pipeline::new(PipelineConfig::with_data_dir(&root));
    let features = pipeline.features(&window(1)).unwrap();
    let segmenter = Segmenter::new(&pipeline.config().clustering);

    for hierarchical in [true, false] {
        let a = segmenter.segment(&features, hierarchical, Some(60));
        let b = segmenter.segment(&features, hierarchical, Some(60));
        assert_eq!(a, b);
        for row in &a.table.rows {
            assert_eq!(row.kmeans / 10, row.initial_cluster);
            assert_eq!(row.lda / 10, row.initial_cluster);
            if !hierarchical {
                assert_eq!(row.initial_cluster, u32::from(row.tier) * 10);
            } else {
                assert_eq!(row.initial_cluster / 10, u32::from(row.tier));
            }
        }
    }
}

#[test]
fn test_run_all_profiles_and_cache_round_trip() {
    let root = scratch_root("run_all");
    write_population(&root);
    let pipeline = Pipeline::new(PipelineConfig::with_data_dir(&root));

    let profiles = pipeline.run_all(&window(1), None).unwrap();
    assert_eq!(profiles.len(), 5);
    for (params, table) in &profiles {
        assert!(!table.is_empty());
        assert_groups_sum_to_100(table);
        for row in table.rows() {
            assert!(row.rider_type < 7);
            assert!(row.report.starts_with(&format!("Cluster {}'s", row.cluster)));
        }

        let cached = ProfileTable::read_csv(&pipeline.cache().profile_path(params)).unwrap();
        assert_eq!(&cached, table);
    }

    let (overview_params, overview) = &profiles[4];
    assert_eq!(overview_params.view(), View::Overview);
    assert_eq!(overview.len(), 1);
    assert_eq!(overview.get(0, "viz_pca1"), Some(0.0));
    assert_eq!(overview.get(0, "viz_pca2"), Some(0.0));
    assert_eq!(overview.get(0, "cluster_size"), Some(25.0));

    // A fresh pipeline over the same cache serves identical tables.
    let again = Pipeline::new(PipelineConfig::with_data_dir(&root));
    let params = ProfileParams::by_cluster(
        ClusterParams::new(window(1), false, None).unwrap(),
        Algorithm::Lda,
    );
    assert_eq!(again.profile(&params).unwrap(), profiles[3].1);

    // features + 2 segmentations + 5 profiles, one header
    let runs = fs::read_to_string(pipeline.cache().runs_path()).unwrap();
    assert_eq!(runs.lines().count(), 9);
}

#[test]
fn test_corrupt_cache_is_recomputed() {
    let root = scratch_root("corrupt_cache");
    write_population(&root);
    let pipeline = Pipeline::new(PipelineConfig::with_data_dir(&root));
    let params = ProfileParams::overview(window(1));

    let first = pipeline.profile(&params).unwrap();
    fs::write(pipeline.cache().profile_path(&params), "cluster,bogus\n1,2\n").unwrap();
    let second = pipeline.profile(&params).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_dashboard_export() {
    let root = scratch_root("dashboard");
    write_population(&root);
    let pipeline = Pipeline::new(PipelineConfig::with_data_dir(&root));
    let params = ProfileParams::by_cluster(
        ClusterParams::new(window(1), true, Some(50)).unwrap(),
        Algorithm::KMeans,
    );
    let table = pipeline.profile(&params).unwrap();

    let dashboard = Dashboard::from_profile(&table);
    assert_eq!(dashboard.clusters.len(), table.len());
    for (id, view) in &dashboard.clusters {
        assert_eq!(view.temporal_patterns.len(), 7 * HOURS);
        assert_eq!(view.clust_info["ID"], f64::from(*id));
        assert!(view.usertype.contains_key("Senior/TAP"));
        let race: f64 = view.race.values().sum();
        assert!((race - 100.0).abs() < 1e-6);
    }

    let out = root.join("dashboard.json");
    dashboard.write_json(&out).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&fs::read(&out).unwrap()).unwrap();
    assert_eq!(json.as_object().unwrap().len(), table.len());
}

#[test]
fn test_census_views() {
    let root = scratch_root("census");
    let census = Census::load(&root.join("input/census/MA_census.csv")).unwrap();
    assert_eq!(census.len(), 3);
    assert_eq!(census.get("02108").unwrap().get("race_pop_nb"), Some(2000.0));

    let percents = census.view(CensusType::Percents);
    let r = percents.get("02139").unwrap();
    assert_eq!(r.get("race_wht"), Some(50.0));
    assert_eq!(r.get("inc_med"), Some(55000.0));

    let out = root.join("census_percents.csv");
    census.to_csv(&out, CensusType::Percents).unwrap();
    assert_eq!(fs::read_to_string(&out).unwrap().lines().count(), 4);

    assert!(matches!(
        "bogus".parse::<CensusType>(),
        Err(Error::InvalidArgument(_))
    ));
}

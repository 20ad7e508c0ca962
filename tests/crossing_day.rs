//! Whole-day runs against a temporary data root.

use std::fs;
use std::path::Path;

use crossing_engine::capacity::CrossPair;
use crossing_engine::survey::Location;
use crossing_engine::table;
use crossing_engine::{
    AllocationLog, CapacityLedger, CrossError, CrossingModel, CrossingRules, DayLayout,
    ExhaustedSide, ExportOutcome, Observation, TasselCount, TasselCounts,
};

const DAY: u32 = 123;

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn layout(root: &Path) -> DayLayout {
    let layout = DayLayout::new(root, DAY);
    layout.ensure_dirs().unwrap();
    layout
}

fn reference_sources(root: &Path, reference: &str) {
    write(&root.join("Photoperiod_Pos_2025.csv"), reference);
    write(
        &root.join("ZT_GVs_1.4.csv"),
        "VARIETY,BRIX\n101,12.5\n202,abc\n2001299,10\n",
    );
    write(
        &root.join("CrossingDataset").join("ZT_CrossingDataset.csv"),
        "FVARIETY,FFERT,MVARIETY,MPOLL\n101,0.5,202,0.9\n101,0.7,202,0.1\n",
    );
    write(&root.join("AMAT_25.csv"), "STD,A,B\nA,1,\nB,0.125,1\n");
}

fn observe(model: &CrossingModel, can: &str, tassels: u32, pollen_rating: i64) {
    model
        .record_observation(&Observation {
            location: Location {
                bay: "1".into(),
                cart: "1".into(),
                can: can.into(),
            },
            tassels,
            pollen_rating,
        })
        .unwrap();
}

fn committed(outcome: ExportOutcome) -> Vec<usize> {
    match outcome {
        ExportOutcome::Committed(report) => report.committed_rows,
        other => panic!("expected a commit, got {other:?}"),
    }
}

#[test]
fn end_to_end_day_consumes_one_unit_per_export() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    reference_sources(
        root,
        "AVARIETY,STDVARIETY,NUMVAR,BAY,CART,CAN\na1,A,101,1,1,1\nb1,B,202,1,1,2\n",
    );
    let mut model = CrossingModel::new(layout(root));

    observe(&model, "1", 4, 7);
    observe(&model, "2", 2, 2);
    let summary = model.survey_summary().unwrap();
    assert_eq!((summary.total, summary.male, summary.female), (2, 1, 1));

    let generated = model.generate_combinations().unwrap();
    assert_eq!(generated.combinations, 1);
    let (tassels, _) = TasselCounts::load(&model.layout().tassels()).unwrap();
    assert_eq!(tassels.get("A"), Some(TasselCount { male: 0, female: 4 }));
    assert_eq!(tassels.get("B"), Some(TasselCount { male: 2, female: 0 }));

    let matched = model.match_crossings().unwrap();
    assert_eq!(matched.summary(), "1 rows; GV: Y, CD: Y, Kinship: Y");
    assert!(matched.diagnostics.numeric_coercions >= 1);

    let df = model.load_candidates().unwrap().clone();
    assert_eq!(table::string_cells(&df, "FEMALE_STD").unwrap(), vec!["A"]);
    assert_eq!(table::string_cells(&df, "KINSHIP").unwrap(), vec!["0.125"]);
    let pct = table::string_cells(&df, "FEMALE_BRIX_PCT_2001299").unwrap();
    assert_eq!(pct[0].parse::<f64>().unwrap(), 125.0);
    assert_eq!(table::string_cells(&df, "MALE_BRIX_PCT_2001299").unwrap(), vec![""]);

    let caps = model.capacities().unwrap();
    assert_eq!((caps.female_cap("A"), caps.male_cap("B")), (4, 2));

    model.set_selected(0, true).unwrap();
    assert_eq!(committed(model.export_selected(&root.join("first.csv")).unwrap()), vec![0]);
    assert!(model.selected_rows().is_empty());
    let caps = model.capacities().unwrap();
    assert_eq!((caps.female_cap("A"), caps.male_cap("B")), (3, 1));

    model.set_selected(0, true).unwrap();
    assert_eq!(committed(model.export_selected(&root.join("second.csv")).unwrap()), vec![0]);
    let caps = model.capacities().unwrap();
    assert_eq!((caps.female_cap("A"), caps.male_cap("B")), (2, 0));

    model.set_selected(0, true).unwrap();
    let third = root.join("third.csv");
    let outcome = model.export_selected(&third).unwrap();
    assert!(matches!(outcome, ExportOutcome::Rejected(ref s) if s[0].side == ExhaustedSide::Male));
    assert!(!third.exists());
    assert_eq!(model.selected_rows(), vec![0]);

    let log = AllocationLog::new(model.layout().allocations());
    assert_eq!(log.records().unwrap(), vec![CrossPair::new("A", "B"); 2]);

    let exported = table::read_csv_as_strings(&root.join("first.csv")).unwrap();
    assert_eq!(table::column_names(&exported), table::column_names(&df));
}

#[test]
fn greedy_export_commits_first_of_three_for_scarce_male() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    write(
        &layout.candidates(),
        "FEMALE_AVAR,MALE_AVAR,FEMALE_STD,MALE_STD\nf1,m,F1,M\nf2,m,F2,M\nf3,m,F3,M\n",
    );
    write(
        &layout.tassels(),
        "STDVARIETY,MALE TASSLES,FEMALE TASSLES\nF1,0,5\nF2,0,5\nF3,0,5\nM,1,0\n",
    );
    let mut model = CrossingModel::new(layout);
    model.load_candidates().unwrap();
    for row in 0..3 {
        model.set_selected(row, true).unwrap();
    }

    let ExportOutcome::Committed(report) = model
        .export_selected(&dir.path().join("out.csv"))
        .unwrap()
    else {
        panic!("expected a commit");
    };
    assert_eq!(report.committed_rows, vec![0]);
    assert_eq!(report.skipped.len(), 2);
    for skip in &report.skipped {
        assert_eq!(skip.side, ExhaustedSide::Male);
        assert!(skip.reason().contains("has 0 remaining"));
    }
    assert_eq!(model.selected_rows(), vec![1, 2]);

    let log = AllocationLog::new(model.layout().allocations());
    assert_eq!(log.records().unwrap(), vec![CrossPair::new("F1", "M")]);
}

#[test]
fn key_index_is_last_wins_and_crossing_dataset_is_first_wins() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    reference_sources(
        root,
        "AVARIETY,STDVARIETY,NUMVAR,BAY,CART,CAN\n\
         a1,A-OLD,999,1,1,1\n\
         a1,A,101,1,1,1\n\
         b1,B,202,1,1,2\n",
    );
    let layout = layout(root);
    write(
        &layout.survey(),
        "AVARIETY,STDVARIETY,Can,Cart,Bay,#Tas,Pollen Rating,Sex\n\
         a1,A,1,1,1,3,7,female\n\
         b1,B,2,1,1,1,2,male\n",
    );
    let mut model = CrossingModel::new(layout);
    model.generate_combinations().unwrap();
    model.match_crossings().unwrap();

    let df = model.load_candidates().unwrap();
    assert_eq!(table::string_cells(df, "FEMALE_STD").unwrap(), vec!["A"]);
    assert_eq!(table::string_cells(df, "FEMALE_NUMVAR").unwrap(), vec!["101"]);
    assert_eq!(table::string_cells(df, "FEMALE_CD_FFERT").unwrap(), vec!["0.5"]);
    assert_eq!(table::string_cells(df, "MALE_CD_MPOLL").unwrap(), vec!["0.9"]);
}

#[test]
fn missing_upstream_files_refuse_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let model = CrossingModel::new(layout(dir.path()));

    let err = model.generate_combinations().unwrap_err();
    assert!(matches!(err, CrossError::MissingInput(ref p) if p == &model.layout().survey()));
    assert!(!model.layout().combinations().exists());
    assert!(!model.layout().tassels().exists());

    let err = model.match_crossings().unwrap_err();
    assert!(matches!(err, CrossError::MissingInput(_)));
    assert!(!model.layout().candidates().exists());
}

#[test]
fn match_without_optional_sources_still_writes_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    write(
        &layout.combinations(),
        "FEMALE_AVAR,MALE_AVAR,FEMALE_STD,MALE_STD,FEMALE_NUMVAR,MALE_NUMVAR\na,b,A,B,1,2\n",
    );
    let model = CrossingModel::new(layout);
    let report = model.match_crossings().unwrap();
    assert_eq!(report.summary(), "1 rows; GV: N, CD: N, Kinship: N");
    assert!(model.layout().candidates().exists());

    let df = table::read_csv_as_strings(&model.layout().candidates()).unwrap();
    assert_eq!(
        table::column_names(&df),
        vec!["FEMALE_AVAR", "MALE_AVAR", "FEMALE_STD", "MALE_STD", "FEMALE_NUMVAR", "MALE_NUMVAR"]
    );
}

#[test]
fn empty_observation_file_is_zero_observations() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    write(&layout.survey(), "");
    let model = CrossingModel::new(layout);

    let report = model.generate_combinations().unwrap();
    assert_eq!(report.combinations, 0);
    let (tassels, _) = TasselCounts::load(&model.layout().tassels()).unwrap();
    assert!(tassels.is_empty());
    assert_eq!(model.survey_summary().unwrap().total, 0);
}

#[test]
fn capacity_stays_non_negative_under_over_allocation() {
    let mut tassels = TasselCounts::default();
    tassels.insert("A", TasselCount { male: 1, female: 1 });
    let history = vec![CrossPair::new("A", "A"); 25];
    let pending = vec![CrossPair::new("A", "Z"), CrossPair::new("Z", "A")];
    let snapshot = CapacityLedger::compute(&tassels, CrossingRules::new(3, 2), &history, &pending);
    assert_eq!(snapshot.male_cap("A"), 0);
    assert_eq!(snapshot.female_cap("A"), 0);
    assert_eq!(snapshot.male_cap("Z"), 0);
}

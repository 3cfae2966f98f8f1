// End-to-end tests for `repricer run` / `check` against real folder trees.
//
// Run with: cargo test -p repricer-cli --test batch_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;

const HEADER_ROW: u32 = 18;

fn repricer() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_repricer"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn run(args: &[&str]) -> Output {
    repricer().args(args).output().expect("spawn repricer")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Write a workbook with the export preamble and the header at row 18.
fn write_table(path: &Path, headers: &[&str], rows: &[Vec<Cell>]) {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.write_string(0, 0, "Price list export").unwrap();
    ws.write_string(1, 0, "Generated by store back office").unwrap();
    for (col, header) in headers.iter().enumerate() {
        ws.write_string(HEADER_ROW, col as u16, *header).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        let row_idx = HEADER_ROW + 1 + r as u32;
        for (c, cell) in row.iter().enumerate() {
            match cell {
                Cell::N(n) => {
                    ws.write_number(row_idx, c as u16, *n).unwrap();
                }
                Cell::S(s) => {
                    ws.write_string(row_idx, c as u16, *s).unwrap();
                }
                Cell::Blank => {}
            }
        }
    }
    wb.save(path).unwrap();
}

enum Cell {
    N(f64),
    S(&'static str),
    Blank,
}

use Cell::{Blank, N, S};

/// Catalog rows are (id, R1, CP); outlet rows are (id, current price).
fn make_folder(root: &Path, name: &str, catalog: &[(f64, f64, f64)], outlet: &[(f64, f64)]) -> PathBuf {
    let folder = root.join(name);
    std::fs::create_dir_all(&folder).unwrap();
    write_table(
        &folder.join(format!("{name}_all_item.xlsx")),
        &["ItemID", "Name", "Price R1 (E,C)", "Price CP (E,C)"],
        &catalog
            .iter()
            .map(|&(id, r1, cp)| vec![N(id), S("item"), N(r1), N(cp)])
            .collect::<Vec<_>>(),
    );
    write_table(
        &folder.join(format!("{name}_outlet_item.xlsx")),
        &["Productgroup", "id", "Brand", "Price CP (E,C)"],
        &outlet
            .iter()
            .map(|&(id, price)| vec![S("TV"), N(id), if id == 1.0 { S("Acme") } else { Blank }, N(price)])
            .collect::<Vec<_>>(),
    );
    folder
}

fn write_config(root: &Path, body: &str) -> PathBuf {
    let path = root.join("repricer.toml");
    std::fs::write(&path, body).unwrap();
    path
}

const CONFIG: &str = r#"
seed = 7

[folders.MSP_offline]
qc_id = "178058"
pg_id = "37532"
"#;

fn column(range: &calamine::Range<Data>, name: &str) -> usize {
    (0..range.width())
        .find(|&c| range.get((0, c)) == Some(&Data::String(name.into())))
        .unwrap_or_else(|| panic!("no column {name}"))
}

fn new_prices(bulk: &Path) -> Vec<Data> {
    let mut wb = open_workbook_auto(bulk).unwrap();
    let range = wb.worksheet_range("bulk").unwrap();
    let col = column(&range, "New Price CP (E,C)");
    (1..range.height()).map(|r| range.get((r, col)).cloned().unwrap_or(Data::Empty)).collect()
}

// ===========================================================================
// run
// ===========================================================================

#[test]
fn run_writes_bulk_plots_and_json() {
    let root = tempfile::tempdir().unwrap();
    let folder = make_folder(
        root.path(),
        "MSP_offline",
        &[(1.0, 1000.0, 990.0), (2.0, 0.0, 2000.0), (3.0, 0.0, 0.0), (4.0, 30000.0, 0.0)],
        &[(1.0, 600.0), (2.0, 2050.0), (4.0, 30000.0)],
    );
    write_config(root.path(), CONFIG);

    let output = run(&["run", root.path().to_str().unwrap(), "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("stdout is one JSON document");
    assert_eq!(json["mode"], "run");
    assert_eq!(json["seed"], 7);
    assert_eq!(json["counts"]["processed"], 1);
    let entry = &json["folders"][0];
    assert_eq!(entry["folder"], "MSP_offline");
    assert_eq!(entry["status"], "processed");
    assert_eq!(entry["stage"], "exported");
    assert_eq!(entry["summary"]["items"], 3);
    assert_eq!(entry["summary"]["repriced"], 1);
    assert_eq!(entry["identifiers"]["qc_id"], "178058");

    let bulk = folder.join("MSP_offline_bulk.xlsx");
    assert!(folder.join("before correction.svg").is_file());
    assert!(folder.join("after correction.svg").is_file());

    let mut wb = open_workbook_auto(&bulk).unwrap();
    let range = wb.worksheet_range("bulk").unwrap();
    assert_eq!(range.height(), 4);
    assert_eq!(range.get((1, column(&range, "QC ID"))), Some(&Data::String("178058".into())));
    assert_eq!(range.get((1, column(&range, "PG ID"))), Some(&Data::String("37532".into())));
    assert!(
        (0..range.width()).all(|c| range.get((0, c)) != Some(&Data::String("Productgroup".into()))),
        "dropped column leaked into bulk"
    );
    assert_eq!(range.get((1, column(&range, "ItemID"))), Some(&Data::Float(1.0)));
    assert_eq!(range.get((1, column(&range, "Brand"))), Some(&Data::String("Acme".into())));

    // 600 vs 1000 in the 500-1000 band: pulled to 840 plus 1..10 jitter.
    let target = column(&range, "Target Price");
    let new_price = column(&range, "New Price CP (E,C)");
    let mark = column(&range, "re-price mark");
    assert_eq!(range.get((1, target)), Some(&Data::Float(1000.0)));
    match range.get((1, new_price)) {
        Some(Data::Float(p)) => assert!((841.0..=850.0).contains(p), "corrected price {p}"),
        other => panic!("unexpected cell {other:?}"),
    }
    // Diff and mark both describe the corrected price, which is back inside 20%.
    match range.get((1, column(&range, "Percentage Diff"))) {
        Some(Data::Float(d)) => assert!((-0.16..=-0.15).contains(d), "deviation {d}"),
        other => panic!("unexpected cell {other:?}"),
    }
    assert_eq!(range.get((1, mark)), Some(&Data::Float(0.0)));
    assert_eq!(range.get((1, column(&range, "Category"))), Some(&Data::String("500-1000".into())));

    // R1 of 0 falls back to CP: target 2000, current 2050 is within 10%.
    assert_eq!(range.get((2, target)), Some(&Data::Float(2000.0)));
    assert_eq!(range.get((2, new_price)), Some(&Data::Float(2050.0)));
    assert_eq!(range.get((2, mark)), Some(&Data::Float(0.0)));
    assert_eq!(range.get((3, column(&range, "Category"))), Some(&Data::String(">20000".into())));
}

#[test]
fn seeded_runs_are_reproducible() {
    let catalog = [(1.0, 1000.0, 0.0), (2.0, 3000.0, 0.0), (3.0, 100.0, 0.0)];
    let outlet = [(1.0, 600.0), (2.0, 4000.0), (3.0, 300.0)];

    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let a = make_folder(first.path(), "shop", &catalog, &outlet);
    let b = make_folder(second.path(), "shop", &catalog, &outlet);

    for root in [first.path(), second.path()] {
        let output = run(&["run", root.to_str().unwrap(), "--seed", "1234", "--no-plots"]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
    }
    assert!(!a.join("before correction.svg").exists());
    assert_eq!(new_prices(&a.join("shop_bulk.xlsx")), new_prices(&b.join("shop_bulk.xlsx")));
}

#[test]
fn missing_target_aborts_folder_without_outputs() {
    let root = tempfile::tempdir().unwrap();
    let bad = make_folder(root.path(), "bad", &[(1.0, 1000.0, 0.0)], &[(1.0, 600.0), (99.0, 10.0)]);
    let good = make_folder(root.path(), "good", &[(1.0, 1000.0, 0.0)], &[(1.0, 600.0)]);

    let output = run(&["run", root.path().to_str().unwrap(), "--seed", "1"]);
    assert_eq!(output.status.code(), Some(4), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("no target price: 99"));

    assert!(!bad.join("bad_bulk.xlsx").exists());
    assert!(!bad.join("before correction.svg").exists());
    assert!(good.join("good_bulk.xlsx").is_file());
}

#[test]
fn incomplete_folders_are_skipped() {
    let root = tempfile::tempdir().unwrap();
    let folder = root.path().join("catalog_only");
    std::fs::create_dir(&folder).unwrap();
    write_table(
        &folder.join("all_item.xlsx"),
        &["ItemID", "Price R1 (E,C)", "Price CP (E,C)"],
        &[vec![N(1.0), N(10.0), N(10.0)]],
    );
    std::fs::create_dir(root.path().join("empty")).unwrap();

    let output = run(&["run", root.path().to_str().unwrap(), "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["counts"]["skipped"], 2);
    assert_eq!(json["folders"][0]["reason"], "no outlet table");
    assert_eq!(json["folders"][1]["reason"], "no catalog table");
    assert!(std::fs::read_dir(&folder).unwrap().count() == 1);
}

#[test]
fn unreadable_table_fails_folder_but_batch_continues() {
    let root = tempfile::tempdir().unwrap();
    let broken = root.path().join("a_broken");
    std::fs::create_dir(&broken).unwrap();
    std::fs::write(broken.join("all_item.csv"), "ItemID\n1\n").unwrap();
    std::fs::write(broken.join("outlet_item.csv"), "id\n1\n").unwrap();
    let good = make_folder(root.path(), "b_good", &[(1.0, 1000.0, 0.0)], &[(1.0, 1000.0)]);

    let output = run(&["run", root.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(3), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("no header row at row 18"));
    assert!(good.join("b_good_bulk.xlsx").is_file());
}

#[test]
fn non_numeric_price_fails_only_its_folder() {
    let root = tempfile::tempdir().unwrap();
    let bad = make_folder(root.path(), "a_bad", &[(1.0, 1000.0, 0.0)], &[]);
    write_table(
        &bad.join("a_bad_outlet_item.xlsx"),
        &["Productgroup", "id", "Brand", "Price CP (E,C)"],
        &[vec![S("TV"), N(1.0), S("Acme"), S("n/a")]],
    );
    let good = make_folder(root.path(), "b_good", &[(1.0, 1000.0, 0.0)], &[(1.0, 600.0)]);

    let output = run(&["run", root.path().to_str().unwrap(), "--seed", "3", "--json"]);
    assert_eq!(output.status.code(), Some(3), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["counts"]["failed"], 1);
    assert_eq!(json["counts"]["processed"], 1);
    let failed = &json["folders"][0];
    assert_eq!(failed["folder"], "a_bad");
    assert_eq!(failed["status"], "failed");
    assert_eq!(failed["kind"], "error");
    assert_eq!(failed["message"], "item '1': invalid current price 'n/a'");

    assert!(!bad.join("a_bad_bulk.xlsx").exists());
    assert!(!bad.join("before correction.svg").exists());
    assert!(good.join("b_good_bulk.xlsx").is_file());
}

// ===========================================================================
// check
// ===========================================================================

#[test]
fn check_reports_before_pass_only() {
    let root = tempfile::tempdir().unwrap();
    let folder = make_folder(root.path(), "f", &[(1.0, 1000.0, 0.0), (2.0, 1000.0, 0.0)], &[(1.0, 600.0), (2.0, 1000.0)]);

    let output = run(&["check", root.path().to_str().unwrap(), "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entry = &json["folders"][0];
    assert_eq!(entry["stage"], "reported_before");
    assert!(entry.get("after").is_none());

    let bands = entry["before"]["bands"].as_array().unwrap();
    assert_eq!(bands.len(), 7);
    assert_eq!(bands[1]["band"], "500-1000");
    assert_eq!(bands[1]["below"], 1);
    assert_eq!(bands[1]["above"], 1);

    assert!(folder.join("before correction.svg").is_file());
    assert!(!folder.join("f_bulk.xlsx").exists());
}

// ===========================================================================
// config / bands / usage
// ===========================================================================

#[test]
fn invalid_config_is_usage_error() {
    let root = tempfile::tempdir().unwrap();
    make_folder(root.path(), "f", &[(1.0, 1000.0, 0.0)], &[(1.0, 600.0)]);
    write_config(root.path(), "[input]\ncatalog_marker = \"x\"\noutlet_marker = \"x\"\n");

    let output = run(&["run", root.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    assert!(!root.path().join("f/f_bulk.xlsx").exists());
}

#[test]
fn config_validate_accepts_and_rejects() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_config(dir.path(), CONFIG);
    let output = run(&["config", "validate", good.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("1 folder entry"));

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[output]\nunknown_key = 1\n").unwrap();
    let output = run(&["config", "validate", bad.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn bands_json_lists_all_bands() {
    let output = run(&["bands", "--json"]);
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let bands = json.as_array().unwrap();
    assert_eq!(bands.len(), 7);
    assert_eq!(bands[0]["band"], "<500");
    assert_eq!(bands[0]["tolerance"], 0.25);
    assert_eq!(bands[6]["band"], ">20000");
    assert!(bands[6]["upper"].is_null());
}

#[test]
fn missing_root_is_usage_error() {
    let output = run(&["run", "/definitely/not/here"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("not a directory"));
}

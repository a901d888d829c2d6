//! End-to-end coverage of the Transformer Driver against real fixture files. Every fixture sets
//! `preprocess: false` on its sentinel line so these tests don't depend on a `cpp` binary being on
//! PATH; the macro-preprocessor stage itself is exercised indirectly via `driver::tests`.

use std::fs;

use ljp::{config::TransformConfig, driver::Driver};

fn write_fixture(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn driver_in(dir: &tempfile::TempDir) -> Driver {
    let config = TransformConfig::default().with_cache_dir(dir.path().join(".luajit_pro"));
    Driver::new(config).unwrap()
}

#[test]
fn plain_foreach_rewrites_to_a_numeric_for_loop() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "foreach.lua",
        "--[[luajit-pro]] preprocess: false\nxs.foreach { ref => print(ref) }\n",
    );
    let mut driver = driver_in(&dir);

    let out_path = driver.transform(&path).unwrap();
    let out = fs::read_to_string(out_path).unwrap();

    assert!(out.lines().next().unwrap().starts_with("--[[luajit-pro]] local ipairs, _tinsert"));
    assert!(out.contains("for _, ref in ipairs(xs) do print(ref) end"));
    assert_eq!(out.lines().count(), 2);
}

#[test]
fn map_and_filter_compose_across_lines() {
    let dir = tempfile::tempdir().unwrap();
    let source = "--[[luajit-pro]] preprocess: false\n\
                  evens = xs.filter { ref => return ref % 2 == 0 }\n\
                  doubled = evens.map { ref => return ref * 2 }\n";
    let path = write_fixture(&dir, "combo.lua", source);
    let mut driver = driver_in(&dir);

    let out_path = driver.transform(&path).unwrap();
    let out = fs::read_to_string(out_path).unwrap();

    assert!(out.contains("evens = {}; for _, ref in ipairs(xs) do if ref % 2 == 0"));
    assert!(out.contains("_tinsert(evens, ref) end end"));
    assert!(out.contains("doubled = {}; for _, ref in ipairs(evens) do"));
    assert!(out.contains("_tinsert(doubled, ref * 2"));
}

#[test]
fn files_without_the_sentinel_are_returned_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "plain.lua", "local x = xs.foreach\n");
    let mut driver = driver_in(&dir);

    let out_path = driver.transform(&path).unwrap();
    assert_eq!(out_path, path);
    assert_eq!(fs::read_to_string(out_path).unwrap(), "local x = xs.foreach\n");
}

#[test]
fn comp_time_block_is_replaced_by_its_evaluated_result() {
    let dir = tempfile::tempdir().unwrap();
    let source = "--[[luajit-pro]] preprocess: false\n$comp_time(version) {\n  return \"local VERSION = 7\"\n}\n";
    let path = write_fixture(&dir, "comp_time.lua", source);
    let mut driver = driver_in(&dir);

    let out_path = driver.transform(&path).unwrap();
    let out = fs::read_to_string(out_path).unwrap();
    let lines: Vec<&str> = out.lines().collect();

    assert_eq!(lines[1], "--[[comp_time]] local VERSION = 7");
    assert_eq!(lines[2], ljp::buffer::LINE_KEEPER);
}

#[test]
fn re_transforming_the_same_file_is_idempotent_on_the_cache_slot() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "idempotent.lua",
        "--[[luajit-pro]] preprocess: false\nxs.foreach { ref => print(ref) }\n",
    );

    let mut first = driver_in(&dir);
    let first_out = fs::read_to_string(first.transform(&path).unwrap()).unwrap();
    drop(first);

    let mut second = driver_in(&dir);
    let second_out = fs::read_to_string(second.transform(&path).unwrap()).unwrap();

    assert_eq!(first_out, second_out);
}

#[test]
fn structural_error_reports_the_offending_file() {
    let dir = tempfile::tempdir().unwrap();
    // `foreach` preceded by two bare symbols instead of a table receiver.
    let path = write_fixture(&dir, "broken.lua", "--[[luajit-pro]] preprocess: false\n;;foreach { ref => nil }\n");
    let mut driver = driver_in(&dir);

    let err = driver.transform(&path).unwrap_err();
    assert!(err.to_string().contains("foreach"));
}

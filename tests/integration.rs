use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn brick_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("brick");
    path
}

const SNAPSHOT: &str = r#"{
  "sets": {
    "100-1": {
      "name": "Red House",
      "year": 2015,
      "parts": [
        { "part_num": "3001", "name": "Brick 2 x 4", "color_id": 4, "quantity": 10, "element_id": "300121" },
        { "part_num": "3001", "name": "Brick 2 x 4", "color_id": 4, "quantity": 1, "element_id": "300121", "is_spare": true }
      ]
    },
    "200-1": {
      "name": "Red Wall",
      "year": 2016,
      "parts": [
        { "part_num": "3001", "name": "Brick 2 x 4", "color_id": 4, "quantity": 10, "element_id": "300121" }
      ]
    },
    "300-1": {
      "name": "White Plates",
      "year": 2012,
      "parts": [
        { "part_num": "3020", "name": "Plate 2 x 4", "color_id": 15, "quantity": 4 },
        { "part_num": "3001", "name": "Brick 2 x 4", "color_id": 4, "quantity": 2, "element_id": "300121" }
      ]
    }
  },
  "part_colors": {
    "3020": [
      { "color_id": 15, "element_ids": ["302001"], "year_from": 1980, "year_to": 2005 },
      { "color_id": 15, "element_ids": ["4113917"], "year_from": 2006, "year_to": 2024 }
    ]
  },
  "colors": { "4": "Red", "15": "White" }
}"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let snapshot_path = root.join("catalog.json");
    fs::write(&snapshot_path, SNAPSHOT).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/brick.sqlite"

[catalog]
snapshot = "{}"

[allocation]
default_quantity = 1
"#,
        root.display(),
        snapshot_path.display()
    );

    let config_path = config_dir.join("brick.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_brick(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_brick_with_input(config_path, args, "")
}

fn run_brick_with_input(config_path: &Path, args: &[&str], input: &str) -> (String, String, bool) {
    let binary = brick_binary();
    let mut child = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("Failed to run brick binary at {:?}: {}", binary, e));

    {
        let mut stdin = child.stdin.take().unwrap();
        stdin.write_all(input.as_bytes()).unwrap();
    }
    let output = child.wait_with_output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn init_with_sets(config_path: &Path, sets: &[&str]) {
    let (_, stderr, success) = run_brick(config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    for set in sets {
        let (stdout, stderr, success) = run_brick(config_path, &["add-set", set]);
        assert!(success, "add-set {} failed: stdout={}, stderr={}", set, stdout, stderr);
    }
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_brick(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_brick(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_brick(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_add_set_appends_priority() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &["100-1"]);

    let (stdout, stderr, success) = run_brick(&config_path, &["add-set", "200-1"]);
    assert!(success, "add-set failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("name: Red Wall"));
    assert!(stdout.contains("priority: 2"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_add_set_twice_fails() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &["100-1"]);

    let (_, stderr, success) = run_brick(&config_path, &["add-set", "100-1"]);
    assert!(!success);
    assert!(stderr.contains("already exists"), "stderr={}", stderr);
}

#[test]
fn test_add_set_unknown_fails() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &[]);

    let (_, stderr, success) = run_brick(&config_path, &["add-set", "999-1"]);
    assert!(!success);
    assert!(stderr.contains("not found in catalog"), "stderr={}", stderr);
}

#[test]
fn test_add_set_prompts_for_ambiguous_part() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &[]);

    let (stdout, stderr, success) = run_brick_with_input(&config_path, &["add-set", "300-1"], "2\n");
    assert!(success, "add-set failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("White"));
    assert!(stdout.contains("1) 4113917 (available during set year)"));
    assert!(stdout.contains("2) 302001"));
    assert!(stdout.contains("skipped parts: 0"));

    let (stdout, _, success) = run_brick(&config_path, &["allocate", "--element", "302001", "--quantity", "4"]);
    assert!(success, "allocate by chosen element failed: {}", stdout);
    assert!(stdout.contains("300-1 White Plates: +4"));
}

#[test]
fn test_add_set_skip_and_cancel() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &[]);

    let (stdout, _, success) = run_brick_with_input(&config_path, &["add-set", "300-1"], "q\n");
    assert!(success);
    assert!(stdout.contains("cancelled"));

    let (stdout, _, _) = run_brick(&config_path, &["sets"]);
    assert!(stdout.contains("No sets."));

    let (stdout, stderr, success) = run_brick_with_input(&config_path, &["add-set", "300-1"], "s\n");
    assert!(success, "add-set failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("skipped parts: 1"));

    let (stdout, _, success) = run_brick(&config_path, &["parts", "300-1"]);
    assert!(success);
    assert!(stdout.contains("3001"));
    assert!(!stdout.contains("3020"));
}

#[test]
fn test_add_set_accept_default() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &[]);

    let (stdout, stderr, success) =
        run_brick(&config_path, &["add-set", "300-1", "--accept-default"]);
    assert!(success, "add-set failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("skipped parts: 0"));

    let (_, _, success) = run_brick(&config_path, &["allocate", "--element", "4113917"]);
    assert!(success);
}

#[test]
fn test_allocate_by_priority() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &["100-1", "200-1"]);

    let (stdout, stderr, success) = run_brick(
        &config_path,
        &["allocate", "--part", "3001", "--color", "4", "--quantity", "15"],
    );
    assert!(success, "allocate failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("100-1 Red House: +10"));
    assert!(stdout.contains("100-1 is now complete"));
    assert!(stdout.contains("200-1 Red Wall: +5"));
    assert!(stdout.contains("200-1 has its first parts"));
    assert!(stdout.contains("allocated: 15 of 15"));

    let (stdout, _, _) = run_brick(&config_path, &["sets"]);
    assert!(stdout.contains("100%"));
    assert!(stdout.contains("50%"));
}

#[test]
fn test_allocate_direct_to_set() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &["100-1", "200-1"]);

    let (stdout, stderr, success) = run_brick(
        &config_path,
        &["allocate", "--element", "300121", "--quantity", "3", "--set", "200-1"],
    );
    assert!(success, "allocate failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("200-1 Red Wall: +3"));
    assert!(!stdout.contains("100-1"));
}

#[test]
fn test_allocate_rejects_bad_input() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &["100-1"]);

    let (_, stderr, success) = run_brick(
        &config_path,
        &["allocate", "--part", "3001", "--color", "red", "--quantity", "2"],
    );
    assert!(!success);
    assert!(stderr.contains("color"), "stderr={}", stderr);

    let (_, _, success) = run_brick(
        &config_path,
        &["allocate", "--part", "3001", "--color", "4", "--quantity", "0"],
    );
    assert!(!success);

    let (_, stderr, success) = run_brick(
        &config_path,
        &["allocate", "--part", "3001", "--color", "4", "--quantity", "2", "--set", "999-1"],
    );
    assert!(!success);
    assert!(stderr.contains("not found"), "stderr={}", stderr);
}

#[test]
fn test_allocate_nothing_needed_fails() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &["100-1"]);

    run_brick(&config_path, &["allocate", "--part", "3001", "--color", "4", "--quantity", "10"]);
    let (_, stderr, success) = run_brick(
        &config_path,
        &["allocate", "--part", "3001", "--color", "4", "--quantity", "3"],
    );
    assert!(!success);
    assert!(stderr.contains("3 parts not added"), "stderr={}", stderr);
}

#[test]
fn test_complete_excludes_from_allocation() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &["100-1", "200-1"]);

    let (stdout, _, success) = run_brick(&config_path, &["complete", "100-1"]);
    assert!(success);
    assert!(stdout.contains("marked complete"));

    let (stdout, _, success) = run_brick(
        &config_path,
        &["allocate", "--part", "3001", "--color", "4", "--quantity", "4"],
    );
    assert!(success);
    assert!(stdout.contains("200-1 Red Wall: +4"));
    assert!(!stdout.contains("100-1"));

    let (stdout, _, success) = run_brick(&config_path, &["complete", "100-1", "--undo"]);
    assert!(success);
    assert!(stdout.contains("unmarked (0% complete)"));
}

#[test]
fn test_priority_and_normalize() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &["100-1", "200-1"]);

    let (stdout, _, success) = run_brick(&config_path, &["priority", "200-1", "1"]);
    assert!(success);
    assert!(stdout.contains("200-1 Red Wall now at priority 1"));

    let (stdout, _, success) = run_brick(
        &config_path,
        &["allocate", "--part", "3001", "--color", "4", "--quantity", "2"],
    );
    assert!(success);
    assert!(stdout.contains("200-1 Red Wall: +2"));

    let (stdout, _, success) = run_brick(&config_path, &["normalize"]);
    assert!(success);
    assert!(stdout.contains("next priority: 3"));

    let (_, _, success) = run_brick(&config_path, &["priority", "200-1", "0"]);
    assert!(!success);
}

#[test]
fn test_parts_listing_uses_color_names() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &["100-1"]);

    let (stdout, stderr, success) =
        run_brick(&config_path, &["parts", "100-1", "--sort", "part-asc"]);
    assert!(success, "parts failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Red House"));
    assert!(stdout.contains("colors: Red (4)"));
    assert!(stdout.contains("0/10"));
}

#[test]
fn test_parts_listing_shows_set_colors() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &[]);
    let (_, stderr, success) = run_brick(&config_path, &["add-set", "300-1", "--accept-default"]);
    assert!(success, "add-set failed: {}", stderr);

    let (stdout, stderr, success) = run_brick(&config_path, &["parts", "300-1", "--color", "15"]);
    assert!(success, "parts failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("colors: Red (4), White (15)"), "stdout={}", stdout);
    assert!(stdout.contains("3020"));
    assert!(!stdout.contains("  3001 "));
}

#[test]
fn test_sets_search() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &["100-1", "200-1"]);

    let (stdout, _, success) = run_brick(&config_path, &["sets", "--search", "Wall"]);
    assert!(success);
    assert!(stdout.contains("200-1"));
    assert!(!stdout.contains("100-1"));
}

#[test]
fn test_stats() {
    let (_tmp, config_path) = setup_test_env();
    init_with_sets(&config_path, &["100-1", "200-1"]);
    run_brick(&config_path, &["allocate", "--part", "3001", "--color", "4", "--quantity", "5"]);

    let (stdout, stderr, success) = run_brick(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Sets:        2"));
    assert!(stdout.contains("Allocated:   5 / 20 (25%)"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_brick(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr={}", stderr);
}

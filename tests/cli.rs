use std::io::Write;

use assert_cmd::Command;
use tempfile::NamedTempFile;

const TWO_TRIANGLES: &str = "t 1 6\n\
v 0 0 0\nv 1 0 0\nv 2 0 0\nv 3 0 1\nv 4 0 1\nv 5 0 1\n\
e 0 1\ne 1 2\ne 0 2\ne 3 4\ne 4 5\ne 3 5\n";

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn stdout_of(args: &[&str]) -> String {
    let output = Command::cargo_bin("greedy-community")
        .unwrap()
        .args(args)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn test_graph_file() {
    let graph = write_temp(TWO_TRIANGLES);
    let stdout = stdout_of(&[graph.path().to_str().unwrap()]);
    assert!(stdout.contains("vertices: 6"));
    assert!(stdout.contains("merges: 4"));
    assert!(stdout.contains("best modularity: 0.500000"));
    assert!(stdout.contains("communities: 2"));
    assert!(stdout.contains("ground truth modularity: 0.500000 (2 communities)"));
}

#[test]
fn test_json_output() {
    let graph = write_temp(TWO_TRIANGLES);
    let stdout = stdout_of(&[graph.path().to_str().unwrap(), "--json"]);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["best_partition"].as_array().unwrap().len(), 2);
    assert_eq!(value["trajectory"].as_array().unwrap().len(), 5);
    assert!(value["trajectory"][0]["merge"].is_null());
}

#[test]
fn test_target_and_trajectory() {
    let graph = write_temp(TWO_TRIANGLES);
    let stdout = stdout_of(&[graph.path().to_str().unwrap(), "--target", "4", "--trajectory"]);
    assert!(stdout.contains("merges: 2"));
    assert!(stdout.contains("step 0: singletons"));
    assert!(stdout.contains("step 2:"));
    assert!(!stdout.contains("step 3:"));
}

#[test]
fn test_config_file() {
    let graph = write_temp(TWO_TRIANGLES);
    let config = write_temp("detection:\n  target_communities: 5\n");
    let stdout = stdout_of(&[
        graph.path().to_str().unwrap(),
        "--config",
        config.path().to_str().unwrap(),
    ]);
    assert!(stdout.contains("merges: 1"));
}

#[test]
fn test_edge_list_and_points() {
    let edges = write_temp("# two triangles\n0 1\n1 2\n0 2\n3 4\n4 5\n3 5\n");
    let stdout = stdout_of(&[edges.path().to_str().unwrap(), "--format", "edges"]);
    assert!(stdout.contains("communities: 2"));

    let points = write_temp("0,0\n0.1,0\n0,0.1\n10,10\n10.1,10\n10,10.1\n");
    let stdout = stdout_of(&[
        points.path().to_str().unwrap(),
        "--format",
        "points",
        "--knn",
        "2",
    ]);
    assert!(stdout.contains("communities: 2"));
}

#[test]
fn test_missing_file_fails() {
    Command::cargo_bin("greedy-community")
        .unwrap()
        .arg("/no/such/file.graph")
        .assert()
        .failure();
}

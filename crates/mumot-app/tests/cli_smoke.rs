use std::io::Write;
use std::process::{Command, Output, Stdio};

const TWO_STATE: &str = "A -> B : k_1\nB -> A : k_2\n";

fn mumot(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mumot"))
        .args(args)
        .env("RUST_LOG", "off")
        .env_remove("MUMOT_SEED")
        .output()
        .expect("failed to run mumot binary")
}

fn model_file(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(text.as_bytes()).expect("write model");
    file
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn show_prints_odes() {
    let file = model_file(TWO_STATE);
    let output = mumot(&["show", file.path().to_str().expect("path")]);
    assert!(output.status.success(), "{output:?}");
    let text = stdout(&output);
    assert!(text.contains("d/dt A = -A*k_1 + B*k_2"), "{text}");
    assert!(text.contains("A -> B : k_1"), "{text}");
}

#[test]
fn show_reads_stdin_and_applies_substitutions() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_mumot"))
        .args(["show", "-", "--substitute", "A = N - B"])
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(TWO_STATE.as_bytes())
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");
    assert!(output.status.success(), "{output:?}");
    let text = stdout(&output);
    assert!(text.contains("System size: N"), "{text}");
    assert!(!text.contains("d/dt A"), "{text}");
}

#[test]
fn syntax_errors_fail_with_the_offending_rule() {
    let file = model_file("A -> B + C : k\n");
    let output = mumot(&["show", file.path().to_str().expect("path")]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unequal number of reactants"), "{stderr}");
}

#[test]
fn simulate_csv_is_reproducible_with_a_seed() {
    let file = model_file(TWO_STATE);
    let path = file.path().to_str().expect("path");
    let args = [
        "simulate", path, "--init", "A=40", "--init", "B=10", "--rate", "k_1=0.2", "--max-time",
        "12", "--seed", "77", "--format", "csv", "--quiet",
    ];
    let first = mumot(&args);
    let second = mumot(&args);
    assert!(first.status.success(), "{first:?}");
    assert_eq!(first.stdout, second.stdout);
    let text = stdout(&first);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "t,A,B");
    assert_eq!(lines[1], "0,40,10");
    assert_eq!(lines.len(), 14);
}

#[test]
fn simulate_writes_json_to_a_file() {
    let file = model_file(TWO_STATE);
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("run.json");
    let output = mumot(&[
        "simulate",
        file.path().to_str().expect("path"),
        "--network",
        "dynamic",
        "--net-param",
        "0.2",
        "--trace",
        "--max-time",
        "5",
        "--seed",
        "3",
        "--output",
        out.to_str().expect("out"),
    ]);
    assert!(output.status.success(), "{output:?}");
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).expect("read")).expect("json");
    assert_eq!(json["seed"], 3);
    assert_eq!(json["network"], "dynamic");
    assert_eq!(json["counts"].as_array().expect("counts").len(), 6);
    // Automatic initial state: 100 agents.
    assert_eq!(json["trace"].as_array().expect("trace").len(), 100);
}

#[test]
fn barabasi_albert_with_too_many_edges_is_reported() {
    let file = model_file(TWO_STATE);
    let output = mumot(&[
        "simulate",
        file.path().to_str().expect("path"),
        "--init",
        "A=4",
        "--network",
        "ba",
        "--net-param",
        "9",
        "--quiet",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Barabasi-Albert"), "{stderr}");
}

#[test]
fn continuation_requires_a_system_size() {
    let file = model_file(TWO_STATE);
    let path = file.path().to_str().expect("path");
    let missing = mumot(&["continuation", path, "k_1", "A"]);
    assert!(!missing.status.success());

    let output = mumot(&["continuation", path, "k_1", "B", "--substitute", "A = N - B"]);
    assert!(output.status.success(), "{output:?}");
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["name"], "EQ1");
    assert_eq!(json["free_parameter"], "k_1");
    assert!(json["varspecs"]["B"].is_string());
}

#[test]
fn field_csv_covers_the_mesh() {
    let file = model_file("A -> B : k\nB -> C : k\nC -> A : k\n");
    let output = mumot(&[
        "field",
        file.path().to_str().expect("path"),
        "A",
        "B",
        "--fix",
        "C=0",
        "--mesh",
        "4",
    ]);
    assert!(output.status.success(), "{output:?}");
    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "A,B,dA,dB,log_speed,masked");
    assert_eq!(lines.len(), 17);
}

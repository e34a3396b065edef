use std::fs;
use std::path::PathBuf;
use std::process::Command;

use supervisor::checkpoint;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("hogwild-e2e-{}-{}", std::process::id(), name));
    fs::remove_dir_all(&dir).ok();
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn a_dry_run_trains_evaluates_and_checkpoints() {
    let dir = scratch_dir("dry-run");

    let output = Command::new(env!("CARGO_BIN_EXE_mnist-hogwild"))
        .arg("--synthetic")
        .arg("--dry-run")
        .arg("--num-processes")
        .arg("2")
        .arg("--epochs")
        .arg("1")
        .arg("--checkpoint-dir")
        .arg(&dir)
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .find(|l| l.starts_with("test accuracy:"))
        .unwrap_or_else(|| panic!("no summary line in stdout: {stdout}"));
    let rest = line.strip_prefix("test accuracy: ").unwrap();
    let (accuracy, tail) = rest.split_once('%').unwrap();
    let accuracy: f32 = accuracy.parse().unwrap();
    let loss: f32 = tail
        .strip_prefix(" (avg loss ")
        .unwrap()
        .strip_suffix(')')
        .unwrap()
        .parse()
        .unwrap();

    assert!((0.0..=100.0).contains(&accuracy));
    assert!(loss >= 0.0);

    let record = checkpoint::load(&dir.join("mnist_cnn.safetensors")).unwrap();
    assert_eq!(record.epoch, 1);
    assert!((record.accuracy - accuracy).abs() < 0.01);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn a_worker_with_a_bad_spec_exits_nonzero() {
    let output = Command::new(env!("CARGO_BIN_EXE_mnist-hogwild"))
        .args(["worker", "--spec", "not a spec"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DEPLOYMENT: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: d8-example
spec:
  selector:
    matchLabels:
      app: web
  template:
    metadata:
      labels:
        app: web
    spec:
      containers:
      - name: api
---
apiVersion: policy/v1
kind: PodDisruptionBudget
metadata:
  name: web
  namespace: d8-example
spec:
  minAvailable: 1
  selector:
    matchLabels:
      app: web
"#;

const VPA: &str = r#"apiVersion: autoscaling.k8s.io/v1
kind: VerticalPodAutoscaler
metadata:
  name: web
  namespace: d8-example
spec:
  targetRef:
    apiVersion: apps/v1
    kind: Deployment
    name: web
  resourcePolicy:
    containerPolicies:
    - containerName: api
      minAllowed:
        cpu: 10m
        memory: 10Mi
      maxAllowed:
        cpu: 100m
        memory: 100Mi
"#;

fn write_module(root: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let module = root.join(name);
    fs::create_dir_all(module.join("templates")).unwrap();
    fs::write(module.join(".namespace"), "d8-example\n").unwrap();
    for (file, content) in files {
        fs::write(module.join("templates").join(file), content).unwrap();
    }
    module
}

fn modcheck(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("modcheck").unwrap();
    cmd.current_dir(cwd);
    cmd
}

#[test]
fn test_clean_module_exits_zero() {
    let dir = TempDir::new().unwrap();
    let module = write_module(dir.path(), "example", &[("web.yaml", DEPLOYMENT), ("vpa.yaml", VPA)]);

    modcheck(dir.path())
        .arg("lint")
        .arg(&module)
        .assert()
        .success()
        .stdout(predicate::str::contains("No lint errors found."));
}

#[test]
fn test_missing_vpa_exits_one() {
    let dir = TempDir::new().unwrap();
    let module = write_module(dir.path(), "example", &[("web.yaml", DEPLOYMENT)]);

    modcheck(dir.path())
        .args(["lint", "--no-color"])
        .arg(&module)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Module example:"))
        .stdout(predicate::str::contains("Deployment/web"))
        .stdout(predicate::str::contains("no VPA is found for object"));
}

#[test]
fn test_threshold_from_config_file() {
    let dir = TempDir::new().unwrap();
    let module = write_module(dir.path(), "example", &[("web.yaml", DEPLOYMENT)]);
    fs::write(
        dir.path().join(".modcheck.yaml"),
        "rules:\n  vpa:\n    level: warning\n",
    )
    .unwrap();

    modcheck(dir.path()).arg("lint").arg(&module).assert().success();

    modcheck(dir.path())
        .args(["lint", "--failure-threshold", "warning"])
        .arg(&module)
        .assert()
        .code(1);
}

#[test]
fn test_json_output() {
    let dir = TempDir::new().unwrap();
    let module = write_module(dir.path(), "example", &[("web.yaml", DEPLOYMENT)]);

    let output = modcheck(dir.path())
        .args(["lint", "--format", "json"])
        .arg(&module)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["summary"]["modules"], 1);
    assert_eq!(json["summary"]["total_findings"], 1);
    assert_eq!(json["modules"][0]["module"], "example");
    assert_eq!(json["modules"][0]["findings"][0]["rule"], "vpa");
}

#[test]
fn test_missing_module_exits_two() {
    let dir = TempDir::new().unwrap();

    modcheck(dir.path())
        .args(["lint", "does-not-exist"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("is not a module directory"));
}

#[test]
fn test_broken_config_exits_two() {
    let dir = TempDir::new().unwrap();
    let module = write_module(dir.path(), "example", &[("web.yaml", DEPLOYMENT), ("vpa.yaml", VPA)]);
    fs::write(dir.path().join(".modcheck.yaml"), "rules: [unclosed\n").unwrap();

    modcheck(dir.path())
        .arg("lint")
        .arg(&module)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_rules_lists_every_rule() {
    let dir = TempDir::new().unwrap();

    modcheck(dir.path())
        .arg("rules")
        .assert()
        .success()
        .stdout(predicate::str::contains("vpa"))
        .stdout(predicate::str::contains("daemonset-pdb"))
        .stdout(predicate::str::contains("binding-subject"))
        .stdout(predicate::str::contains("manifest"));
}

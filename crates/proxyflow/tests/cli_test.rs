#![allow(deprecated)] // Command::cargo_bin

mod common;

use assert_cmd::Command;
use common::{ENV, STACK, STACK_KEYS, TestStack};
use predicates::prelude::*;

fn proxyflow() -> Command {
    let mut cmd = Command::cargo_bin("proxyflow").unwrap();
    for key in STACK_KEYS {
        cmd.env_remove(key);
    }
    cmd
}

/// A stack with its .env, ready to plan
fn ready_stack() -> TestStack {
    let project = TestStack::new();
    project.write_stack(STACK);
    project.write_env(ENV);
    project
}

#[test]
fn test_cli_help() {
    proxyflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("synth"));
}

#[test]
fn test_cli_version() {
    proxyflow()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("proxyflow"));
}

#[test]
fn test_synth_help_lists_stack_options() {
    proxyflow()
        .args(["synth", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--stack"))
        .stdout(predicate::str::contains("--env-file"))
        .stdout(predicate::str::contains("--format"));
}

#[test]
fn test_validate_discovers_stack_in_current_dir() {
    let project = ready_stack();
    proxyflow()
        .current_dir(project.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("stack is valid"))
        .stdout(predicate::str::contains("ProxyTargetGroup"));
}

#[test]
fn test_synth_emits_json_document() {
    let project = ready_stack();
    let output = proxyflow()
        .current_dir(project.path())
        .arg("synth")
        .output()
        .unwrap();
    assert!(output.status.success());

    let document: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(document["stack"], "payments-proxy");
    let ids: Vec<&str> = document["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["logicalId"].as_str().unwrap())
        .collect();
    let proxy = ids.iter().position(|id| *id == "Proxy").unwrap();
    for dependency in ["Vpc", "Database", "DbSecret", "ProxyRole"] {
        assert!(ids.iter().position(|id| *id == dependency).unwrap() < proxy);
    }
}

#[test]
fn test_synth_yaml_to_file() {
    let project = ready_stack();
    let output = project.path().join("out.yaml");
    proxyflow()
        .current_dir(project.path())
        .args(["synth", "--format", "yaml", "-o"])
        .arg(&output)
        .assert()
        .success();

    let content = std::fs::read_to_string(output).unwrap();
    assert!(content.contains("AWS::RDS::DBProxy"));
}

#[test]
fn test_synth_rejects_unknown_format() {
    let project = ready_stack();
    proxyflow()
        .current_dir(project.path())
        .args(["synth", "--format", "toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown output format"));
}

#[test]
fn test_untrusted_role_fails_with_report() {
    let project = TestStack::new();
    project.write_stack(&STACK.replace("rds.amazonaws.com", "ec2.amazonaws.com"));
    project.write_env(ENV);

    proxyflow()
        .current_dir(project.path())
        .arg("synth")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("does not trust rds.amazonaws.com"));
}

#[test]
fn test_missing_configuration_lists_every_key() {
    let project = TestStack::new();
    let stack = project.write_stack(STACK);
    project.write_env("VPC_ID=vpc-0abc\n");

    proxyflow()
        .arg("validate")
        .arg("--stack")
        .arg(&stack)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DB_ENDPOINT"))
        .stderr(predicate::str::contains("PRIVATE_SUBNET_IDS"));
}

#[test]
fn test_missing_configuration_before_lookups() {
    let project = TestStack::new();
    let stack = format!(
        "{}{}",
        STACK,
        r#"
security-group "ProxySg" lookup="default" {
    group-name env="SG_NAME"
}
"#
    );
    project.write_stack(&stack);
    project.write_env("VPC_ID=vpc-0abc\n");
    let inventory = project.write_file("inventory.json", "{}");

    proxyflow()
        .env_remove("SG_NAME")
        .current_dir(project.path())
        .arg("validate")
        .arg("--inventory")
        .arg(&inventory)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("SG_NAME"))
        .stderr(predicate::str::contains("DB_ENDPOINT"))
        .stderr(predicate::str::contains("PRIVATE_SUBNET_IDS"));
}

#[test]
fn test_plan_lists_creates_and_imports() {
    let project = ready_stack();
    proxyflow()
        .current_dir(project.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("AWS::RDS::DBProxy"))
        .stdout(predicate::str::contains("to create"))
        .stdout(predicate::str::contains("2 to import"));
}

#[test]
fn test_plan_against_same_document_has_no_changes() {
    let project = ready_stack();
    let previous = project.path().join("previous.json");
    proxyflow()
        .current_dir(project.path())
        .args(["synth", "-o"])
        .arg(&previous)
        .assert()
        .success();

    proxyflow()
        .current_dir(project.path())
        .arg("plan")
        .arg("--against")
        .arg(&previous)
        .assert()
        .success()
        .stdout(predicate::str::contains("no changes"));
}

#[test]
fn test_default_lookup_needs_inventory() {
    let project = TestStack::new();
    let stack = STACK.replace(
        r#"network "Vpc" lookup="explicit" {
    vpc-id env="VPC_ID"
    availability-zones env-list="AVAILABILITY_ZONES"
    subnet-ids env-list="PRIVATE_SUBNET_IDS"
}"#,
        r#"network "Vpc" lookup="default" {
    is-default #true
}"#,
    );
    project.write_stack(&stack);
    project.write_env(ENV);

    proxyflow()
        .current_dir(project.path())
        .arg("validate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no inventory provider"));

    let inventory = project.write_file(
        "inventory.json",
        r#"{
            "Network?isDefault=true": [
                {
                    "vpcId": "vpc-default",
                    "availabilityZones": ["eu-west-1a"],
                    "subnetIds": ["subnet-default"]
                }
            ]
        }"#,
    );
    proxyflow()
        .current_dir(project.path())
        .arg("synth")
        .arg("--inventory")
        .arg(&inventory)
        .assert()
        .success()
        .stdout(predicate::str::contains("subnet-default"));
}

#[test]
fn test_cycle_reports_full_path() {
    let project = TestStack::new();
    project.write_stack(
        r#"
role "A" {
    description ref="B.arn"
}
role "B" {
    description ref="A.arn"
}
"#,
    );

    proxyflow()
        .current_dir(project.path())
        .arg("validate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("A -> B -> A"));
}

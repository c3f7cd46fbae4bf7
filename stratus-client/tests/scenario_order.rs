//! End-to-end scenario runs against the scripted API double, checking the
//! teardown ordering guarantees and the deliberate absence of rollback.

use std::sync::Arc;

use stratus_client::interact::AutoPilot;
use stratus_client::scenario::{Scenario, ScenarioConfig, Step};
use stratus_common::error::Ec2Error;
use stratus_common::resource::mock::MockApi;

fn config() -> ScenarioConfig {
  ScenarioConfig {
    key_name: "demo-key".to_string(),
    group_name: "demo-sg".to_string(),
    vpc_id: None,
    image_id: "ami-12345678".to_string(),
    instance_type: "t3.micro".to_string(),
    ssh_cidr: "203.0.113.5/32".to_string(),
  }
}

fn first_position(calls: &[String], op: &str) -> Option<usize> {
  calls.iter().position(|call| call.starts_with(op))
}

#[tokio::test]
async fn full_run_tears_down_in_dependency_order() {
  let api = Arc::new(MockApi::new());
  let key_dir = tempfile::tempdir().unwrap();
  let mut scenario = Scenario::new(api.clone(), key_dir.path(), config());
  let mut interact = AutoPilot::new("test");

  scenario.run(&mut interact).await.unwrap();

  let calls = api.calls();
  let disassociate = first_position(&calls, "disassociate_address").unwrap();
  let release = first_position(&calls, "release_address").unwrap();
  let terminate = first_position(&calls, "terminate_instance").unwrap();
  let delete_group = first_position(&calls, "delete_security_group").unwrap();
  let delete_key = first_position(&calls, "delete_key_pair").unwrap();

  // Address goes before the instance it points at, the group only after
  // the instance, the key pair last.
  assert!(disassociate < release);
  assert!(release < terminate);
  assert!(terminate < delete_group);
  assert!(delete_group < delete_key);
}

#[tokio::test]
async fn full_run_stops_and_starts_twice() {
  let api = Arc::new(MockApi::new());
  let key_dir = tempfile::tempdir().unwrap();
  let mut scenario = Scenario::new(api.clone(), key_dir.path(), config());
  let mut interact = AutoPilot::new("test");

  scenario.run(&mut interact).await.unwrap();

  assert_eq!(api.calls_named("stop_instance").len(), 2);
  assert_eq!(api.calls_named("start_instance").len(), 2);
  assert_eq!(api.calls_named("run_instance").len(), 1);
}

#[tokio::test]
async fn mid_scenario_failure_leaves_created_resources_in_place() {
  let api = Arc::new(MockApi::new());
  api.fail_next(
    "run_instance",
    Ec2Error::from_code(Some("InvalidParameterValue"), "bad image id"),
  );
  let key_dir = tempfile::tempdir().unwrap();
  let mut scenario = Scenario::new(api.clone(), key_dir.path(), config());
  let mut interact = AutoPilot::new("test");

  let result = scenario.run(&mut interact).await;
  assert!(result.is_err());

  let calls = api.calls();
  // The key pair and security group were created before the failure...
  assert!(first_position(&calls, "create_key_pair").is_some());
  assert!(first_position(&calls, "create_security_group").is_some());
  // ...and nothing cleans them up: there is no compensating rollback.
  assert!(first_position(&calls, "delete_key_pair").is_none());
  assert!(first_position(&calls, "delete_security_group").is_none());
  assert!(first_position(&calls, "release_address").is_none());
}

#[tokio::test]
async fn teardown_from_partial_state_skips_missing_resources() {
  let api = Arc::new(MockApi::new());
  let key_dir = tempfile::tempdir().unwrap();
  let mut scenario = Scenario::new(api.clone(), key_dir.path(), config());

  scenario.run_step(Step::CreateKeyPair).await.unwrap();
  scenario.run_step(Step::CreateSecurityGroup).await.unwrap();
  scenario.run_step(Step::Teardown).await.unwrap();

  let calls = api.calls();
  // Nothing else was created, so only the group and key are deleted.
  assert!(first_position(&calls, "terminate_instance").is_none());
  assert!(first_position(&calls, "release_address").is_none());
  assert!(first_position(&calls, "disassociate_address").is_none());

  let delete_group = first_position(&calls, "delete_security_group").unwrap();
  let delete_key = first_position(&calls, "delete_key_pair").unwrap();
  assert!(delete_group < delete_key);
}

#[tokio::test]
async fn teardown_on_empty_state_makes_no_remote_calls() {
  let api = Arc::new(MockApi::new());
  let key_dir = tempfile::tempdir().unwrap();
  let mut scenario = Scenario::new(api.clone(), key_dir.path(), config());

  scenario.run_step(Step::Teardown).await.unwrap();
  assert!(api.calls().is_empty());
}

#[test]
fn teardown_is_the_final_step() {
  assert_eq!(Step::ALL.last(), Some(&Step::Teardown));
}

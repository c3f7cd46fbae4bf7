use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::api::{Ec2Api, InstanceInfo, InstanceState, RunInstanceSpec};
use crate::error::Ec2Error;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_POLLS: u32 = 120;

/// Encapsulates EC2 instance lifecycle actions.
pub struct InstanceWrapper {
  api: Arc<dyn Ec2Api>,
  instance: Option<InstanceInfo>,
}

impl InstanceWrapper {
  pub fn new(api: Arc<dyn Ec2Api>) -> Self {
    InstanceWrapper {
      api,
      instance: None,
    }
  }

  pub fn instance_id(&self) -> Option<&str> {
    self.instance.as_ref().map(|i| i.instance_id.as_str())
  }

  pub fn info(&self) -> Option<&InstanceInfo> {
    self.instance.as_ref()
  }

  /// Launches one instance and waits for it to reach the running state.
  pub async fn create(&mut self, spec: &RunInstanceSpec) -> Result<InstanceInfo, Ec2Error> {
    let launched = self.api.run_instance(spec).await.map_err(|err| {
      error!(
        image_id = %spec.image_id,
        instance_type = %spec.instance_type,
        code = ?err.code(),
        error = %err,
        "Couldn't launch instance"
      );
      err
    })?;

    info!(instance_id = %launched.instance_id, "Launched instance, waiting for it to run");
    let running = self
      .wait_for_state(&launched.instance_id, InstanceState::Running)
      .await?;
    self.instance = Some(running.clone());
    Ok(running)
  }

  /// Stops the held instance and waits for it to stop. No-op when empty.
  pub async fn stop(&mut self) -> Result<Option<InstanceInfo>, Ec2Error> {
    let Some(instance_id) = self.instance_id().map(str::to_string) else {
      info!("No instance to stop.");
      return Ok(None);
    };

    self.api.stop_instance(&instance_id).await.map_err(|err| {
      error!(instance_id = %instance_id, code = ?err.code(), error = %err, "Couldn't stop instance");
      err
    })?;

    let stopped = self
      .wait_for_state(&instance_id, InstanceState::Stopped)
      .await?;
    info!(instance_id = %instance_id, "Instance stopped");
    self.instance = Some(stopped.clone());
    Ok(Some(stopped))
  }

  /// Starts the held instance and waits for it to run. No-op when empty.
  pub async fn start(&mut self) -> Result<Option<InstanceInfo>, Ec2Error> {
    let Some(instance_id) = self.instance_id().map(str::to_string) else {
      info!("No instance to start.");
      return Ok(None);
    };

    self.api.start_instance(&instance_id).await.map_err(|err| {
      error!(instance_id = %instance_id, code = ?err.code(), error = %err, "Couldn't start instance");
      err
    })?;

    let running = self
      .wait_for_state(&instance_id, InstanceState::Running)
      .await?;
    info!(instance_id = %instance_id, "Instance running");
    self.instance = Some(running.clone());
    Ok(Some(running))
  }

  /// Fetches fresh information for the held instance. No-op when empty.
  pub async fn describe(&mut self) -> Result<Option<InstanceInfo>, Ec2Error> {
    let Some(instance_id) = self.instance_id().map(str::to_string) else {
      info!("No instance to describe.");
      return Ok(None);
    };

    let instance = self.api.describe_instance(&instance_id).await.map_err(|err| {
      error!(instance_id = %instance_id, code = ?err.code(), error = %err, "Couldn't describe instance");
      err
    })?;

    self.instance = Some(instance.clone());
    Ok(Some(instance))
  }

  /// Terminates the held instance, waits for termination, and clears the
  /// held identifier. No-op when empty.
  pub async fn terminate(&mut self) -> Result<(), Ec2Error> {
    let Some(instance_id) = self.instance_id().map(str::to_string) else {
      info!("No instance to terminate.");
      return Ok(());
    };

    self.api.terminate_instance(&instance_id).await.map_err(|err| {
      error!(instance_id = %instance_id, code = ?err.code(), error = %err, "Couldn't terminate instance");
      err
    })?;

    self
      .wait_for_state(&instance_id, InstanceState::Terminated)
      .await?;
    info!(instance_id = %instance_id, "Instance terminated");
    self.instance = None;
    Ok(())
  }

  async fn wait_for_state(
    &self,
    instance_id: &str,
    target: InstanceState,
  ) -> Result<InstanceInfo, Ec2Error> {
    for _ in 0..MAX_POLLS {
      let instance = self.api.describe_instance(instance_id).await.map_err(|err| {
        error!(instance_id = %instance_id, code = ?err.code(), error = %err, "Couldn't poll instance state");
        err
      })?;
      if instance.state == target {
        return Ok(instance);
      }
      tokio::time::sleep(POLL_INTERVAL).await;
    }

    Err(Ec2Error::Api {
      code: None,
      message: format!("timed out waiting for instance {instance_id} to become {target}"),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::resource::mock::MockApi;

  fn spec() -> RunInstanceSpec {
    RunInstanceSpec {
      image_id: "ami-12345678".to_string(),
      instance_type: "t3.micro".to_string(),
      key_name: "k1".to_string(),
      security_group_id: "sg-0001".to_string(),
    }
  }

  fn wrapper() -> (Arc<MockApi>, InstanceWrapper) {
    let api = Arc::new(MockApi::new());
    let wrapper = InstanceWrapper::new(api.clone());
    (api, wrapper)
  }

  #[tokio::test]
  async fn create_waits_until_running_and_holds_the_instance() {
    let (_api, mut instances) = wrapper();

    let created = instances.create(&spec()).await.unwrap();
    assert_eq!(created.state, InstanceState::Running);
    assert_eq!(instances.instance_id(), Some(created.instance_id.as_str()));
  }

  #[tokio::test]
  async fn stop_and_start_track_the_remote_state() {
    let (_api, mut instances) = wrapper();
    instances.create(&spec()).await.unwrap();

    let stopped = instances.stop().await.unwrap().unwrap();
    assert_eq!(stopped.state, InstanceState::Stopped);

    let running = instances.start().await.unwrap().unwrap();
    assert_eq!(running.state, InstanceState::Running);
  }

  #[tokio::test]
  async fn lifecycle_methods_on_fresh_wrapper_are_no_ops() {
    let (api, mut instances) = wrapper();

    assert!(instances.stop().await.unwrap().is_none());
    assert!(instances.start().await.unwrap().is_none());
    assert!(instances.describe().await.unwrap().is_none());
    instances.terminate().await.unwrap();
    assert!(api.calls().is_empty());
  }

  #[tokio::test]
  async fn terminate_clears_the_held_identifier() {
    let (api, mut instances) = wrapper();
    let created = instances.create(&spec()).await.unwrap();

    instances.terminate().await.unwrap();
    assert!(instances.instance_id().is_none());
    assert_eq!(
      api.calls_named("terminate_instance"),
      vec![format!("terminate_instance {}", created.instance_id)]
    );
  }

  #[tokio::test]
  async fn failed_launch_leaves_no_held_state() {
    let (api, mut instances) = wrapper();
    api.fail_next(
      "run_instance",
      Ec2Error::from_code(Some("InvalidParameterValue"), "bad image id"),
    );

    let err = instances.create(&spec()).await.unwrap_err();
    assert!(matches!(err, Ec2Error::InvalidParameter { .. }));
    assert!(instances.instance_id().is_none());
  }
}

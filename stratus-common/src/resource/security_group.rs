use std::sync::Arc;

use tracing::{error, info};

use crate::api::{Ec2Api, IngressRule, SecurityGroupInfo};
use crate::error::Ec2Error;

/// Encapsulates EC2 security group actions.
pub struct SecurityGroupWrapper {
  api: Arc<dyn Ec2Api>,
  security_group: Option<SecurityGroupInfo>,
}

impl SecurityGroupWrapper {
  pub fn new(api: Arc<dyn Ec2Api>) -> Self {
    SecurityGroupWrapper {
      api,
      security_group: None,
    }
  }

  pub fn group_id(&self) -> Option<&str> {
    self.security_group.as_ref().map(|group| group.group_id.as_str())
  }

  pub fn info(&self) -> Option<&SecurityGroupInfo> {
    self.security_group.as_ref()
  }

  /// Creates a security group and re-fetches its full descriptor. Uses the
  /// account's default VPC when `vpc_id` is `None`.
  ///
  /// On failure nothing is retained; the wrapper stays empty.
  pub async fn create(
    &mut self,
    name: &str,
    description: &str,
    vpc_id: Option<&str>,
  ) -> Result<SecurityGroupInfo, Ec2Error> {
    let group_id = self
      .api
      .create_security_group(name, description, vpc_id)
      .await
      .map_err(|err| {
        if matches!(err, Ec2Error::DuplicateGroup { .. }) {
          error!(group_name = %name, error = %err, "A security group with this name already exists");
        } else {
          error!(group_name = %name, code = ?err.code(), error = %err, "Couldn't create security group");
        }
        err
      })?;

    let group = self
      .api
      .describe_security_group(&group_id)
      .await
      .map_err(|err| {
        error!(group_id = %group_id, code = ?err.code(), error = %err, "Couldn't fetch created security group");
        err
      })?;

    info!(group_id = %group.group_id, group_name = %group.group_name, "Created security group");
    self.security_group = Some(group.clone());
    Ok(group)
  }

  /// Adds inbound rules to the held group and refreshes the descriptor.
  /// No-op when no group is held.
  pub async fn authorize_ingress(
    &mut self,
    rules: &[IngressRule],
  ) -> Result<Option<SecurityGroupInfo>, Ec2Error> {
    let Some(group_id) = self.group_id().map(str::to_string) else {
      info!("No security group to update.");
      return Ok(None);
    };

    self
      .api
      .authorize_ingress(&group_id, rules)
      .await
      .map_err(|err| {
        if matches!(err, Ec2Error::DuplicatePermission { .. }) {
          error!(group_id = %group_id, error = %err, "The ingress rule is already authorized on this group");
        } else {
          error!(group_id = %group_id, code = ?err.code(), error = %err, "Couldn't authorize inbound rules");
        }
        err
      })?;

    let group = self.api.describe_security_group(&group_id).await?;
    self.security_group = Some(group.clone());
    Ok(Some(group))
  }

  /// Fetches a fresh descriptor for the held group. No-op when empty.
  pub async fn describe(&mut self) -> Result<Option<SecurityGroupInfo>, Ec2Error> {
    let Some(group_id) = self.group_id().map(str::to_string) else {
      info!("No security group to describe.");
      return Ok(None);
    };

    let group = self
      .api
      .describe_security_group(&group_id)
      .await
      .map_err(|err| {
        error!(group_id = %group_id, code = ?err.code(), error = %err, "Couldn't get data for security group");
        err
      })?;

    self.security_group = Some(group.clone());
    Ok(Some(group))
  }

  /// Deletes the held group. No-op when empty.
  pub async fn delete(&mut self) -> Result<(), Ec2Error> {
    let Some(group_id) = self.group_id().map(str::to_string) else {
      info!("No security group to delete.");
      return Ok(());
    };

    self.api.delete_security_group(&group_id).await.map_err(|err| {
      error!(group_id = %group_id, code = ?err.code(), error = %err, "Couldn't delete security group");
      err
    })?;

    info!(group_id = %group_id, "Deleted security group");
    self.security_group = None;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::resource::mock::MockApi;

  fn wrapper() -> (Arc<MockApi>, SecurityGroupWrapper) {
    let api = Arc::new(MockApi::new());
    let wrapper = SecurityGroupWrapper::new(api.clone());
    (api, wrapper)
  }

  #[tokio::test]
  async fn create_then_authorize_holds_the_exact_rule_tuple() {
    let (_api, mut groups) = wrapper();
    groups.create("demo-sg", "demo group", None).await.unwrap();

    let rule = IngressRule::ssh_from("203.0.113.5/32");
    let updated = groups.authorize_ingress(&[rule.clone()]).await.unwrap().unwrap();

    assert_eq!(updated.ingress_rules, vec![rule.clone()]);
    assert_eq!(groups.info().unwrap().ingress_rules, vec![rule.clone()]);
    assert_eq!(rule.protocol, "tcp");
    assert_eq!((rule.from_port, rule.to_port), (22, 22));
    assert_eq!(rule.cidr_ip, "203.0.113.5/32");
  }

  #[tokio::test]
  async fn authorize_without_a_group_is_a_no_op() {
    let (api, mut groups) = wrapper();

    let result = groups
      .authorize_ingress(&[IngressRule::ssh_from("203.0.113.5/32")])
      .await
      .unwrap();

    assert!(result.is_none());
    assert!(api.calls().is_empty());
  }

  #[tokio::test]
  async fn duplicate_create_propagates_and_leaves_wrapper_empty() {
    let (api, mut groups) = wrapper();
    api.fail_next(
      "create_security_group",
      Ec2Error::from_code(Some("InvalidGroup.Duplicate"), "demo-sg exists"),
    );

    let err = groups.create("demo-sg", "demo group", None).await.unwrap_err();
    assert!(matches!(err, Ec2Error::DuplicateGroup { .. }));
    assert!(groups.group_id().is_none());
  }

  #[tokio::test]
  async fn delete_clears_held_state() {
    let (api, mut groups) = wrapper();
    let created = groups.create("demo-sg", "demo group", None).await.unwrap();

    groups.delete().await.unwrap();
    assert_eq!(
      api.calls_named("delete_security_group"),
      vec![format!("delete_security_group {}", created.group_id)]
    );
    assert!(groups.group_id().is_none());

    // A second delete is a silent no-op.
    groups.delete().await.unwrap();
    assert_eq!(api.calls_named("delete_security_group").len(), 1);
  }

  #[tokio::test]
  async fn describe_without_a_group_is_a_no_op() {
    let (api, mut groups) = wrapper();
    assert!(groups.describe().await.unwrap().is_none());
    assert!(api.calls().is_empty());
  }
}

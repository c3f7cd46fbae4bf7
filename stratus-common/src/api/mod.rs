use async_trait::async_trait;
use serde::Serialize;

use crate::error::Ec2Error;

#[cfg(feature = "aws")]
mod sdk;
#[cfg(feature = "aws")]
pub use sdk::SdkEc2Client;

/// A key pair as listed by the service.
#[derive(Debug, Clone, Serialize)]
pub struct KeyPairInfo {
  pub name: String,
  pub key_type: String,
  pub fingerprint: String,
}

/// The one-time creation result for a key pair.
///
/// `key_material` is returned by the service exactly once; it must be
/// persisted before this value is dropped because it cannot be fetched
/// again.
#[derive(Debug, Clone)]
pub struct CreatedKeyPair {
  pub name: String,
  pub key_material: String,
}

/// One inbound permission tuple on a security group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngressRule {
  pub protocol: String,
  pub from_port: i32,
  pub to_port: i32,
  pub cidr_ip: String,
}

impl IngressRule {
  /// TCP/22 from a single address, the rule the scenario authorizes.
  pub fn ssh_from(cidr_ip: impl Into<String>) -> Self {
    IngressRule {
      protocol: "tcp".to_string(),
      from_port: 22,
      to_port: 22,
      cidr_ip: cidr_ip.into(),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityGroupInfo {
  pub group_id: String,
  pub group_name: String,
  pub vpc_id: String,
  pub ingress_rules: Vec<IngressRule>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElasticIpInfo {
  pub allocation_id: String,
  pub public_ip: String,
  pub association_id: Option<String>,
  pub instance_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InstanceState {
  Pending,
  Running,
  ShuttingDown,
  Terminated,
  Stopping,
  Stopped,
  Unknown,
}

impl std::fmt::Display for InstanceState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      InstanceState::Pending => "pending",
      InstanceState::Running => "running",
      InstanceState::ShuttingDown => "shutting-down",
      InstanceState::Terminated => "terminated",
      InstanceState::Stopping => "stopping",
      InstanceState::Stopped => "stopped",
      InstanceState::Unknown => "unknown",
    };
    f.write_str(name)
  }
}

/// A machine image as listed by the service.
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
  pub image_id: String,
  pub name: String,
  pub description: String,
  pub architecture: String,
}

/// An EC2 instance that may have incomplete information.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceInfo {
  pub instance_id: String,
  pub image_id: String,
  pub instance_type: String,
  pub key_name: Option<String>,
  pub state: InstanceState,
  pub public_ip: Option<String>,
}

/// Parameters for launching a single instance.
#[derive(Debug, Clone)]
pub struct RunInstanceSpec {
  pub image_id: String,
  pub instance_type: String,
  pub key_name: String,
  pub security_group_id: String,
}

/// The remote EC2 surface the resource wrappers are built on.
///
/// Exactly one remote call per method; responses are converted into the
/// descriptor types above at this boundary so the raw SDK shapes never
/// travel upward. Implemented by [`SdkEc2Client`] for real use and by
/// scripted doubles in tests.
#[async_trait]
pub trait Ec2Api: Send + Sync {
  async fn create_key_pair(&self, name: &str) -> Result<CreatedKeyPair, Ec2Error>;
  async fn describe_key_pairs(&self) -> Result<Vec<KeyPairInfo>, Ec2Error>;
  async fn delete_key_pair(&self, name: &str) -> Result<(), Ec2Error>;

  /// Creates a security group, resolving the account's default VPC when
  /// `vpc_id` is `None`. Returns the new group's id.
  async fn create_security_group(
    &self,
    name: &str,
    description: &str,
    vpc_id: Option<&str>,
  ) -> Result<String, Ec2Error>;
  async fn describe_security_group(&self, group_id: &str) -> Result<SecurityGroupInfo, Ec2Error>;
  async fn authorize_ingress(&self, group_id: &str, rules: &[IngressRule]) -> Result<(), Ec2Error>;
  async fn delete_security_group(&self, group_id: &str) -> Result<(), Ec2Error>;

  /// Allocates a VPC-scoped address and returns its allocation id.
  async fn allocate_address(&self) -> Result<String, Ec2Error>;
  async fn describe_address(&self, allocation_id: &str) -> Result<ElasticIpInfo, Ec2Error>;
  /// Returns the association id issued by the service.
  async fn associate_address(
    &self,
    allocation_id: &str,
    instance_id: &str,
  ) -> Result<String, Ec2Error>;
  async fn disassociate_address(&self, association_id: &str) -> Result<(), Ec2Error>;
  async fn release_address(&self, allocation_id: &str) -> Result<(), Ec2Error>;

  /// Lists available Amazon-owned images whose name matches `name_pattern`,
  /// newest first.
  async fn describe_images(&self, name_pattern: &str) -> Result<Vec<ImageInfo>, Ec2Error>;
  /// Lists demo-sized instance types (`*.micro`, `*.small`) that support the
  /// given processor architecture.
  async fn describe_instance_types(&self, architecture: &str) -> Result<Vec<String>, Ec2Error>;

  async fn run_instance(&self, spec: &RunInstanceSpec) -> Result<InstanceInfo, Ec2Error>;
  async fn describe_instance(&self, instance_id: &str) -> Result<InstanceInfo, Ec2Error>;
  async fn start_instance(&self, instance_id: &str) -> Result<(), Ec2Error>;
  async fn stop_instance(&self, instance_id: &str) -> Result<(), Ec2Error>;
  async fn terminate_instance(&self, instance_id: &str) -> Result<(), Ec2Error>;
}

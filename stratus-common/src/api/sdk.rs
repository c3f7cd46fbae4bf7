use async_trait::async_trait;
use aws_config::{self, BehaviorVersion};
use aws_sdk_ec2::{
  Client,
  config::Region,
  types::{DomainType, Filter, InstanceStateName, InstanceType, IpPermission, IpRange},
};
use tracing::debug;

use super::{
  CreatedKeyPair, Ec2Api, ElasticIpInfo, ImageInfo, IngressRule, InstanceInfo, InstanceState,
  KeyPairInfo, RunInstanceSpec, SecurityGroupInfo,
};
use crate::error::{Ec2Error, from_sdk};

/// [`Ec2Api`] implementation backed by the AWS SDK client.
///
/// Conversion between SDK response shapes and the crate's descriptor types
/// happens here and nowhere else.
pub struct SdkEc2Client {
  client: Client,
}

impl SdkEc2Client {
  /// Loads shared AWS config (credentials, region chain) and builds a client.
  pub async fn new(region: Option<String>) -> Self {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
      loader = loader.region(Region::new(region));
    }
    let shared_config = loader.load().await;

    SdkEc2Client {
      client: Client::new(&shared_config),
    }
  }

  /// Wraps an already-constructed SDK client.
  pub fn from_client(client: Client) -> Self {
    SdkEc2Client { client }
  }

  async fn default_vpc_id(&self) -> Result<String, Ec2Error> {
    let response = self
      .client
      .describe_vpcs()
      .filters(Filter::builder().name("isDefault").values("true").build())
      .send()
      .await
      .map_err(from_sdk)?;

    let vpc_id = response
      .vpcs()
      .first()
      .and_then(|vpc| vpc.vpc_id())
      .ok_or(Ec2Error::MissingField("VpcId"))?
      .to_string();

    debug!(vpc_id = %vpc_id, "Resolved default VPC");
    Ok(vpc_id)
  }
}

impl std::fmt::Debug for SdkEc2Client {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SdkEc2Client").finish_non_exhaustive()
  }
}

fn convert_state(name: Option<&InstanceStateName>) -> InstanceState {
  match name {
    Some(InstanceStateName::Pending) => InstanceState::Pending,
    Some(InstanceStateName::Running) => InstanceState::Running,
    Some(InstanceStateName::ShuttingDown) => InstanceState::ShuttingDown,
    Some(InstanceStateName::Terminated) => InstanceState::Terminated,
    Some(InstanceStateName::Stopping) => InstanceState::Stopping,
    Some(InstanceStateName::Stopped) => InstanceState::Stopped,
    _ => InstanceState::Unknown,
  }
}

fn convert_instance(instance: &aws_sdk_ec2::types::Instance) -> Result<InstanceInfo, Ec2Error> {
  Ok(InstanceInfo {
    instance_id: instance
      .instance_id()
      .ok_or(Ec2Error::MissingField("InstanceId"))?
      .to_string(),
    image_id: instance.image_id().unwrap_or_default().to_string(),
    instance_type: instance
      .instance_type()
      .map(|t| t.as_str().to_string())
      .unwrap_or_default(),
    key_name: instance.key_name().map(str::to_string),
    state: convert_state(instance.state().and_then(|s| s.name())),
    public_ip: instance.public_ip_address().map(str::to_string),
  })
}

#[async_trait]
impl Ec2Api for SdkEc2Client {
  async fn create_key_pair(&self, name: &str) -> Result<CreatedKeyPair, Ec2Error> {
    let response = self
      .client
      .create_key_pair()
      .key_name(name)
      .send()
      .await
      .map_err(from_sdk)?;

    Ok(CreatedKeyPair {
      name: response
        .key_name()
        .ok_or(Ec2Error::MissingField("KeyName"))?
        .to_string(),
      key_material: response
        .key_material()
        .ok_or(Ec2Error::MissingField("KeyMaterial"))?
        .to_string(),
    })
  }

  async fn describe_key_pairs(&self) -> Result<Vec<KeyPairInfo>, Ec2Error> {
    let response = self
      .client
      .describe_key_pairs()
      .send()
      .await
      .map_err(from_sdk)?;

    Ok(
      response
        .key_pairs()
        .iter()
        .filter_map(|kp| {
          Some(KeyPairInfo {
            name: kp.key_name()?.to_string(),
            key_type: kp.key_type().map(|t| t.as_str().to_string()).unwrap_or_default(),
            fingerprint: kp.key_fingerprint().unwrap_or_default().to_string(),
          })
        })
        .collect(),
    )
  }

  async fn delete_key_pair(&self, name: &str) -> Result<(), Ec2Error> {
    self
      .client
      .delete_key_pair()
      .key_name(name)
      .send()
      .await
      .map_err(from_sdk)?;
    Ok(())
  }

  async fn create_security_group(
    &self,
    name: &str,
    description: &str,
    vpc_id: Option<&str>,
  ) -> Result<String, Ec2Error> {
    let vpc_id = match vpc_id {
      Some(id) => id.to_string(),
      None => self.default_vpc_id().await?,
    };

    let response = self
      .client
      .create_security_group()
      .group_name(name)
      .description(description)
      .vpc_id(vpc_id)
      .send()
      .await
      .map_err(from_sdk)?;

    Ok(
      response
        .group_id()
        .ok_or(Ec2Error::MissingField("GroupId"))?
        .to_string(),
    )
  }

  async fn describe_security_group(&self, group_id: &str) -> Result<SecurityGroupInfo, Ec2Error> {
    let response = self
      .client
      .describe_security_groups()
      .group_ids(group_id)
      .send()
      .await
      .map_err(from_sdk)?;

    let group = response
      .security_groups()
      .first()
      .ok_or_else(|| Ec2Error::group_not_found(group_id))?;

    let mut ingress_rules = Vec::new();
    for permission in group.ip_permissions() {
      for range in permission.ip_ranges() {
        ingress_rules.push(IngressRule {
          protocol: permission.ip_protocol().unwrap_or_default().to_string(),
          from_port: permission.from_port().unwrap_or_default(),
          to_port: permission.to_port().unwrap_or_default(),
          cidr_ip: range.cidr_ip().unwrap_or_default().to_string(),
        });
      }
    }

    Ok(SecurityGroupInfo {
      group_id: group
        .group_id()
        .ok_or(Ec2Error::MissingField("GroupId"))?
        .to_string(),
      group_name: group.group_name().unwrap_or_default().to_string(),
      vpc_id: group.vpc_id().unwrap_or_default().to_string(),
      ingress_rules,
    })
  }

  async fn authorize_ingress(&self, group_id: &str, rules: &[IngressRule]) -> Result<(), Ec2Error> {
    let permissions: Vec<IpPermission> = rules
      .iter()
      .map(|rule| {
        IpPermission::builder()
          .ip_protocol(&rule.protocol)
          .from_port(rule.from_port)
          .to_port(rule.to_port)
          .ip_ranges(IpRange::builder().cidr_ip(&rule.cidr_ip).build())
          .build()
      })
      .collect();

    self
      .client
      .authorize_security_group_ingress()
      .group_id(group_id)
      .set_ip_permissions(Some(permissions))
      .send()
      .await
      .map_err(from_sdk)?;
    Ok(())
  }

  async fn delete_security_group(&self, group_id: &str) -> Result<(), Ec2Error> {
    self
      .client
      .delete_security_group()
      .group_id(group_id)
      .send()
      .await
      .map_err(from_sdk)?;
    Ok(())
  }

  async fn allocate_address(&self) -> Result<String, Ec2Error> {
    let response = self
      .client
      .allocate_address()
      .domain(DomainType::Vpc)
      .send()
      .await
      .map_err(from_sdk)?;

    Ok(
      response
        .allocation_id()
        .ok_or(Ec2Error::MissingField("AllocationId"))?
        .to_string(),
    )
  }

  async fn describe_address(&self, allocation_id: &str) -> Result<ElasticIpInfo, Ec2Error> {
    let response = self
      .client
      .describe_addresses()
      .allocation_ids(allocation_id)
      .send()
      .await
      .map_err(from_sdk)?;

    let address = response
      .addresses()
      .first()
      .ok_or_else(|| Ec2Error::allocation_not_found(allocation_id))?;

    Ok(ElasticIpInfo {
      allocation_id: address
        .allocation_id()
        .ok_or(Ec2Error::MissingField("AllocationId"))?
        .to_string(),
      public_ip: address.public_ip().unwrap_or_default().to_string(),
      association_id: address.association_id().map(str::to_string),
      instance_id: address.instance_id().map(str::to_string),
    })
  }

  async fn associate_address(
    &self,
    allocation_id: &str,
    instance_id: &str,
  ) -> Result<String, Ec2Error> {
    let response = self
      .client
      .associate_address()
      .allocation_id(allocation_id)
      .instance_id(instance_id)
      .send()
      .await
      .map_err(from_sdk)?;

    Ok(
      response
        .association_id()
        .ok_or(Ec2Error::MissingField("AssociationId"))?
        .to_string(),
    )
  }

  async fn disassociate_address(&self, association_id: &str) -> Result<(), Ec2Error> {
    self
      .client
      .disassociate_address()
      .association_id(association_id)
      .send()
      .await
      .map_err(from_sdk)?;
    Ok(())
  }

  async fn release_address(&self, allocation_id: &str) -> Result<(), Ec2Error> {
    self
      .client
      .release_address()
      .allocation_id(allocation_id)
      .send()
      .await
      .map_err(from_sdk)?;
    Ok(())
  }

  async fn describe_images(&self, name_pattern: &str) -> Result<Vec<ImageInfo>, Ec2Error> {
    let response = self
      .client
      .describe_images()
      .owners("amazon")
      .filters(Filter::builder().name("name").values(name_pattern).build())
      .filters(Filter::builder().name("state").values("available").build())
      .send()
      .await
      .map_err(from_sdk)?;

    let mut images: Vec<(String, ImageInfo)> = response
      .images()
      .iter()
      .filter_map(|image| {
        Some((
          image.creation_date().unwrap_or_default().to_string(),
          ImageInfo {
            image_id: image.image_id()?.to_string(),
            name: image.name().unwrap_or_default().to_string(),
            description: image.description().unwrap_or_default().to_string(),
            architecture: image
              .architecture()
              .map(|a| a.as_str().to_string())
              .unwrap_or_default(),
          },
        ))
      })
      .collect();

    // Creation dates are ISO 8601, so a plain string sort orders them.
    images.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(images.into_iter().map(|(_, image)| image).collect())
  }

  async fn describe_instance_types(&self, architecture: &str) -> Result<Vec<String>, Ec2Error> {
    let response = self
      .client
      .describe_instance_types()
      .filters(
        Filter::builder()
          .name("processor-info.supported-architecture")
          .values(architecture)
          .build(),
      )
      .filters(
        Filter::builder()
          .name("instance-type")
          .values("*.micro")
          .values("*.small")
          .build(),
      )
      .send()
      .await
      .map_err(from_sdk)?;

    Ok(
      response
        .instance_types()
        .iter()
        .filter_map(|info| info.instance_type().map(|t| t.as_str().to_string()))
        .collect(),
    )
  }

  async fn run_instance(&self, spec: &RunInstanceSpec) -> Result<InstanceInfo, Ec2Error> {
    let instance_type: InstanceType = spec
      .instance_type
      .parse()
      .map_err(|_| Ec2Error::invalid_parameter(format!("instance type {}", spec.instance_type)))?;

    let response = self
      .client
      .run_instances()
      .image_id(&spec.image_id)
      .instance_type(instance_type)
      .key_name(&spec.key_name)
      .security_group_ids(&spec.security_group_id)
      .min_count(1)
      .max_count(1)
      .send()
      .await
      .map_err(from_sdk)?;

    let instance = response
      .instances()
      .first()
      .ok_or(Ec2Error::MissingField("Instances"))?;

    convert_instance(instance)
  }

  async fn describe_instance(&self, instance_id: &str) -> Result<InstanceInfo, Ec2Error> {
    let response = self
      .client
      .describe_instances()
      .instance_ids(instance_id)
      .send()
      .await
      .map_err(from_sdk)?;

    let instance = response
      .reservations()
      .iter()
      .flat_map(|reservation| reservation.instances())
      .next()
      .ok_or_else(|| Ec2Error::instance_not_found(instance_id))?;

    convert_instance(instance)
  }

  async fn start_instance(&self, instance_id: &str) -> Result<(), Ec2Error> {
    self
      .client
      .start_instances()
      .instance_ids(instance_id)
      .send()
      .await
      .map_err(from_sdk)?;
    Ok(())
  }

  async fn stop_instance(&self, instance_id: &str) -> Result<(), Ec2Error> {
    self
      .client
      .stop_instances()
      .instance_ids(instance_id)
      .send()
      .await
      .map_err(from_sdk)?;
    Ok(())
  }

  async fn terminate_instance(&self, instance_id: &str) -> Result<(), Ec2Error> {
    self
      .client
      .terminate_instances()
      .instance_ids(instance_id)
      .send()
      .await
      .map_err(from_sdk)?;
    Ok(())
  }
}

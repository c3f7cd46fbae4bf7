//! Scripted in-memory [`Ec2Api`] double for wrapper and scenario tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{
  CreatedKeyPair, Ec2Api, ElasticIpInfo, ImageInfo, IngressRule, InstanceInfo, InstanceState,
  KeyPairInfo, RunInstanceSpec, SecurityGroupInfo,
};
use crate::error::Ec2Error;

/// Records every remote call in order and lets a test script the next
/// failure per operation. State transitions complete immediately so the
/// wrappers' wait loops finish on their first poll.
#[derive(Default)]
pub struct MockApi {
  calls: Mutex<Vec<String>>,
  fail_next: Mutex<HashMap<&'static str, Ec2Error>>,
  key_pairs: Mutex<Vec<KeyPairInfo>>,
  groups: Mutex<HashMap<String, SecurityGroupInfo>>,
  addresses: Mutex<HashMap<String, ElasticIpInfo>>,
  instances: Mutex<HashMap<String, InstanceInfo>>,
  next_id: Mutex<u32>,
}

impl MockApi {
  pub fn new() -> Self {
    Self::default()
  }

  /// Script `op` to fail once with `err`.
  pub fn fail_next(&self, op: &'static str, err: Ec2Error) {
    self.fail_next.lock().unwrap().insert(op, err);
  }

  /// Snapshot of the calls issued so far, e.g. `"release_address eipalloc-1"`.
  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }

  pub fn calls_named(&self, op: &str) -> Vec<String> {
    self
      .calls()
      .into_iter()
      .filter(|call| call.starts_with(op))
      .collect()
  }

  fn record(&self, op: &'static str, detail: &str) -> Result<(), Ec2Error> {
    if detail.is_empty() {
      self.calls.lock().unwrap().push(op.to_string());
    } else {
      self.calls.lock().unwrap().push(format!("{op} {detail}"));
    }
    match self.fail_next.lock().unwrap().remove(op) {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }

  fn fresh_id(&self, prefix: &str) -> String {
    let mut next = self.next_id.lock().unwrap();
    *next += 1;
    format!("{prefix}-{:04}", *next)
  }
}

#[async_trait]
impl Ec2Api for MockApi {
  async fn create_key_pair(&self, name: &str) -> Result<CreatedKeyPair, Ec2Error> {
    self.record("create_key_pair", name)?;
    let info = KeyPairInfo {
      name: name.to_string(),
      key_type: "rsa".to_string(),
      fingerprint: format!("fp:{name}"),
    };
    self.key_pairs.lock().unwrap().push(info);
    Ok(CreatedKeyPair {
      name: name.to_string(),
      key_material: format!("PRIVATE KEY MATERIAL FOR {name}"),
    })
  }

  async fn describe_key_pairs(&self) -> Result<Vec<KeyPairInfo>, Ec2Error> {
    self.record("describe_key_pairs", "")?;
    Ok(self.key_pairs.lock().unwrap().clone())
  }

  async fn delete_key_pair(&self, name: &str) -> Result<(), Ec2Error> {
    self.record("delete_key_pair", name)?;
    self.key_pairs.lock().unwrap().retain(|kp| kp.name != name);
    Ok(())
  }

  async fn create_security_group(
    &self,
    name: &str,
    _description: &str,
    vpc_id: Option<&str>,
  ) -> Result<String, Ec2Error> {
    self.record("create_security_group", name)?;
    let group_id = self.fresh_id("sg");
    let info = SecurityGroupInfo {
      group_id: group_id.clone(),
      group_name: name.to_string(),
      vpc_id: vpc_id.unwrap_or("vpc-default").to_string(),
      ingress_rules: Vec::new(),
    };
    self.groups.lock().unwrap().insert(group_id.clone(), info);
    Ok(group_id)
  }

  async fn describe_security_group(&self, group_id: &str) -> Result<SecurityGroupInfo, Ec2Error> {
    self.record("describe_security_group", group_id)?;
    self
      .groups
      .lock()
      .unwrap()
      .get(group_id)
      .cloned()
      .ok_or_else(|| Ec2Error::group_not_found(group_id))
  }

  async fn authorize_ingress(&self, group_id: &str, rules: &[IngressRule]) -> Result<(), Ec2Error> {
    self.record("authorize_ingress", group_id)?;
    let mut groups = self.groups.lock().unwrap();
    let group = groups
      .get_mut(group_id)
      .ok_or_else(|| Ec2Error::group_not_found(group_id))?;
    group.ingress_rules.extend(rules.iter().cloned());
    Ok(())
  }

  async fn delete_security_group(&self, group_id: &str) -> Result<(), Ec2Error> {
    self.record("delete_security_group", group_id)?;
    self.groups.lock().unwrap().remove(group_id);
    Ok(())
  }

  async fn allocate_address(&self) -> Result<String, Ec2Error> {
    self.record("allocate_address", "")?;
    let allocation_id = self.fresh_id("eipalloc");
    let info = ElasticIpInfo {
      allocation_id: allocation_id.clone(),
      public_ip: "203.0.113.99".to_string(),
      association_id: None,
      instance_id: None,
    };
    self
      .addresses
      .lock()
      .unwrap()
      .insert(allocation_id.clone(), info);
    Ok(allocation_id)
  }

  async fn describe_address(&self, allocation_id: &str) -> Result<ElasticIpInfo, Ec2Error> {
    self.record("describe_address", allocation_id)?;
    self
      .addresses
      .lock()
      .unwrap()
      .get(allocation_id)
      .cloned()
      .ok_or_else(|| Ec2Error::allocation_not_found(allocation_id))
  }

  async fn associate_address(
    &self,
    allocation_id: &str,
    instance_id: &str,
  ) -> Result<String, Ec2Error> {
    self.record("associate_address", &format!("{allocation_id} {instance_id}"))?;
    let association_id = self.fresh_id("eipassoc");
    let mut addresses = self.addresses.lock().unwrap();
    let address = addresses
      .get_mut(allocation_id)
      .ok_or_else(|| Ec2Error::allocation_not_found(allocation_id))?;
    address.association_id = Some(association_id.clone());
    address.instance_id = Some(instance_id.to_string());
    Ok(association_id)
  }

  async fn disassociate_address(&self, association_id: &str) -> Result<(), Ec2Error> {
    self.record("disassociate_address", association_id)?;
    let mut addresses = self.addresses.lock().unwrap();
    for address in addresses.values_mut() {
      if address.association_id.as_deref() == Some(association_id) {
        address.association_id = None;
        address.instance_id = None;
        return Ok(());
      }
    }
    Err(Ec2Error::association_not_found(association_id))
  }

  async fn release_address(&self, allocation_id: &str) -> Result<(), Ec2Error> {
    self.record("release_address", allocation_id)?;
    self.addresses.lock().unwrap().remove(allocation_id);
    Ok(())
  }

  async fn describe_images(&self, name_pattern: &str) -> Result<Vec<ImageInfo>, Ec2Error> {
    self.record("describe_images", name_pattern)?;
    Ok(vec![
      ImageInfo {
        image_id: "ami-newest".to_string(),
        name: "al2023-ami-2023.9".to_string(),
        description: "Amazon Linux 2023 AMI".to_string(),
        architecture: "x86_64".to_string(),
      },
      ImageInfo {
        image_id: "ami-older".to_string(),
        name: "al2023-ami-2023.8".to_string(),
        description: "Amazon Linux 2023 AMI".to_string(),
        architecture: "x86_64".to_string(),
      },
    ])
  }

  async fn describe_instance_types(&self, architecture: &str) -> Result<Vec<String>, Ec2Error> {
    self.record("describe_instance_types", architecture)?;
    Ok(vec!["t3.micro".to_string(), "t3.small".to_string()])
  }

  async fn run_instance(&self, spec: &RunInstanceSpec) -> Result<InstanceInfo, Ec2Error> {
    self.record("run_instance", &spec.image_id)?;
    let instance_id = self.fresh_id("i");
    let info = InstanceInfo {
      instance_id: instance_id.clone(),
      image_id: spec.image_id.clone(),
      instance_type: spec.instance_type.clone(),
      key_name: Some(spec.key_name.clone()),
      state: InstanceState::Running,
      public_ip: Some("198.51.100.7".to_string()),
    };
    self
      .instances
      .lock()
      .unwrap()
      .insert(instance_id, info.clone());
    Ok(info)
  }

  async fn describe_instance(&self, instance_id: &str) -> Result<InstanceInfo, Ec2Error> {
    self.record("describe_instance", instance_id)?;
    self
      .instances
      .lock()
      .unwrap()
      .get(instance_id)
      .cloned()
      .ok_or_else(|| Ec2Error::instance_not_found(instance_id))
  }

  async fn start_instance(&self, instance_id: &str) -> Result<(), Ec2Error> {
    self.record("start_instance", instance_id)?;
    if let Some(instance) = self.instances.lock().unwrap().get_mut(instance_id) {
      instance.state = InstanceState::Running;
    }
    Ok(())
  }

  async fn stop_instance(&self, instance_id: &str) -> Result<(), Ec2Error> {
    self.record("stop_instance", instance_id)?;
    if let Some(instance) = self.instances.lock().unwrap().get_mut(instance_id) {
      instance.state = InstanceState::Stopped;
    }
    Ok(())
  }

  async fn terminate_instance(&self, instance_id: &str) -> Result<(), Ec2Error> {
    self.record("terminate_instance", instance_id)?;
    if let Some(instance) = self.instances.lock().unwrap().get_mut(instance_id) {
      instance.state = InstanceState::Terminated;
      instance.public_ip = None;
    }
    Ok(())
  }
}

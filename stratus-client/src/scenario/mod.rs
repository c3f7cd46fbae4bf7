//! The "get started with instances" scenario: a fixed linear sequence of
//! named steps over the resource wrappers. Steps only transform scenario
//! state; all prompting and pausing happens in the driver between steps.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use stratus_common::api::{Ec2Api, IngressRule, RunInstanceSpec};
use stratus_common::resource::{
  ElasticIpWrapper, InstanceWrapper, KeyPairWrapper, SecurityGroupWrapper,
};

use crate::interact::Interact;

/// Name pattern matching the latest Amazon Linux 2023 images.
const AMZN_LINUX_IMAGES: &str = "al2023-ami-2023*";

/// Resolves the image and instance type to launch. Whenever the CLI left one
/// unset, the user picks from the newest Amazon Linux images and from the
/// demo-sized instance types compatible with the chosen image's architecture.
pub async fn resolve_launch_target(
  api: &dyn Ec2Api,
  interact: &mut dyn Interact,
  image_id: Option<String>,
  instance_type: Option<String>,
) -> Result<(String, String)> {
  let (image_id, architecture) = match image_id {
    Some(id) => (id, "x86_64".to_string()),
    None => {
      let images = api.describe_images(AMZN_LINUX_IMAGES).await?;
      if images.is_empty() {
        bail!("no Amazon Linux images matched {AMZN_LINUX_IMAGES}");
      }
      let items: Vec<String> = images
        .iter()
        .map(|image| {
          format!(
            "{} ({}) {}",
            image.image_id, image.architecture, image.description
          )
        })
        .collect();
      let index = interact.choose("Choose an image to launch", &items)?;
      (
        images[index].image_id.clone(),
        images[index].architecture.clone(),
      )
    }
  };

  let instance_type = match instance_type {
    Some(instance_type) => instance_type,
    None => {
      let types = api.describe_instance_types(&architecture).await?;
      if types.is_empty() {
        bail!("no demo-sized instance types support the {architecture} architecture");
      }
      let index = interact.choose("Choose an instance type", &types)?;
      types[index].clone()
    }
  };

  Ok((image_id, instance_type))
}

fn address_retention_note(public_ip: &str) -> String {
  format!("The Elastic IP {public_ip} stayed with the instance through the stop and start.")
}

/// Inputs resolved before the scenario starts (prompted or from the CLI).
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
  pub key_name: String,
  pub group_name: String,
  pub vpc_id: Option<String>,
  pub image_id: String,
  pub instance_type: String,
  /// CIDR granted SSH access on the demo security group.
  pub ssh_cidr: String,
}

/// The scenario's steps, in the order the driver runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
  CreateKeyPair,
  CreateSecurityGroup,
  LaunchInstance,
  StopStartInstance,
  AssociateAddress,
  StopStartWithAddress,
  Teardown,
}

impl Step {
  pub const ALL: [Step; 7] = [
    Step::CreateKeyPair,
    Step::CreateSecurityGroup,
    Step::LaunchInstance,
    Step::StopStartInstance,
    Step::AssociateAddress,
    Step::StopStartWithAddress,
    Step::Teardown,
  ];

  pub fn title(self) -> &'static str {
    match self {
      Step::CreateKeyPair => "Create an RSA key pair",
      Step::CreateSecurityGroup => "Create a security group with SSH access",
      Step::LaunchInstance => "Launch an instance",
      Step::StopStartInstance => "Stop and start the instance",
      Step::AssociateAddress => "Allocate an Elastic IP and associate it",
      Step::StopStartWithAddress => "Stop and start again with a stable address",
      Step::Teardown => "Clean everything up",
    }
  }
}

pub struct Scenario {
  key_pairs: KeyPairWrapper,
  security_groups: SecurityGroupWrapper,
  instances: InstanceWrapper,
  addresses: ElasticIpWrapper,
  config: ScenarioConfig,
}

impl Scenario {
  pub fn new(
    api: Arc<dyn Ec2Api>,
    key_file_dir: impl Into<PathBuf>,
    config: ScenarioConfig,
  ) -> Self {
    Scenario {
      key_pairs: KeyPairWrapper::new(api.clone(), key_file_dir),
      security_groups: SecurityGroupWrapper::new(api.clone()),
      instances: InstanceWrapper::new(api.clone()),
      addresses: ElasticIpWrapper::new(api),
      config,
    }
  }

  /// Runs every step in order. On the first failure the error propagates
  /// immediately: resources created by earlier steps are NOT cleaned up,
  /// matching the demo's no-rollback behavior.
  pub async fn run(&mut self, interact: &mut dyn Interact) -> Result<()> {
    for step in Step::ALL {
      interact.pause(step.title())?;
      self.run_step(step).await?;
    }
    Ok(())
  }

  pub async fn run_step(&mut self, step: Step) -> Result<()> {
    match step {
      Step::CreateKeyPair => self.create_key_pair().await,
      Step::CreateSecurityGroup => self.create_security_group().await,
      Step::LaunchInstance => self.launch_instance().await,
      Step::StopStartInstance | Step::StopStartWithAddress => self.stop_start_instance().await,
      Step::AssociateAddress => self.associate_address().await,
      Step::Teardown => self.teardown().await,
    }
  }

  async fn create_key_pair(&mut self) -> Result<()> {
    let key_name = self.config.key_name.clone();
    self.key_pairs.create(&key_name).await?;
    println!(
      "Created key pair {} and saved the private key to {}.",
      key_name,
      self
        .key_pairs
        .key_file_path()
        .map(|path| path.display().to_string())
        .unwrap_or_default()
    );

    println!("The first five key pairs for this account:");
    for key_pair in self.key_pairs.list(5).await? {
      println!(
        "  {} key {} with fingerprint {}",
        key_pair.key_type, key_pair.name, key_pair.fingerprint
      );
    }
    Ok(())
  }

  async fn create_security_group(&mut self) -> Result<()> {
    let group = self
      .security_groups
      .create(
        &self.config.group_name,
        "Security group for the stratus instance scenario.",
        self.config.vpc_id.as_deref(),
      )
      .await?;
    println!("Created security group {} in VPC {}.", group.group_id, group.vpc_id);

    let rule = IngressRule::ssh_from(self.config.ssh_cidr.clone());
    let updated = self
      .security_groups
      .authorize_ingress(&[rule])
      .await?
      .context("security group disappeared while authorizing ingress")?;

    println!("Security group: {}", updated.group_name);
    println!("\tID: {}", updated.group_id);
    println!("\tVPC: {}", updated.vpc_id);
    println!("Inbound permissions:");
    println!("{}", serde_json::to_string_pretty(&updated.ingress_rules)?);
    Ok(())
  }

  async fn launch_instance(&mut self) -> Result<()> {
    let key_name = self
      .key_pairs
      .key_name()
      .context("no key pair was created")?
      .to_string();
    let security_group_id = self
      .security_groups
      .group_id()
      .context("no security group was created")?
      .to_string();

    let instance = self
      .instances
      .create(&RunInstanceSpec {
        image_id: self.config.image_id.clone(),
        instance_type: self.config.instance_type.clone(),
        key_name,
        security_group_id,
      })
      .await?;

    println!(
      "Launched instance {} ({}, {}).",
      instance.instance_id, instance.instance_type, instance.state
    );
    self.print_ssh_hint();
    Ok(())
  }

  async fn stop_start_instance(&mut self) -> Result<()> {
    if self.instances.instance_id().is_none() {
      println!("No instance to stop and start.");
      return Ok(());
    }

    println!("Stopping the instance; this can take a minute...");
    self.instances.stop().await?;
    println!("Starting the instance back up...");
    let started = self.instances.start().await?;

    if let Some(instance) = started {
      println!(
        "Instance {} is {} with public IP {}.",
        instance.instance_id,
        instance.state,
        instance.public_ip.as_deref().unwrap_or("<none>")
      );
    }
    if let Some(public_ip) = self.addresses.public_ip() {
      println!("{}", address_retention_note(public_ip));
    }
    self.print_ssh_hint();
    Ok(())
  }

  async fn associate_address(&mut self) -> Result<()> {
    let instance_id = self
      .instances
      .instance_id()
      .context("no instance to associate an address with")?
      .to_string();

    let allocated = self.addresses.allocate().await?;
    println!("Allocated Elastic IP {}.", allocated.public_ip);

    self.addresses.associate(&instance_id).await?;
    println!(
      "Associated {} with instance {}; this address stays constant across stops and starts.",
      allocated.public_ip, instance_id
    );
    self.print_ssh_hint();
    Ok(())
  }

  /// Releases resources in dependency order: address before the instance it
  /// points at, the security group only after the instance is gone, the key
  /// pair last. Every delete is a no-op for anything that was never
  /// created, so this is safe to run from any partial state.
  async fn teardown(&mut self) -> Result<()> {
    self.addresses.disassociate().await?;
    self.addresses.release().await?;
    self.instances.terminate().await?;
    self.security_groups.delete().await?;
    self.key_pairs.delete().await?;
    println!("Cleaned up the scenario's resources.");
    Ok(())
  }

  fn print_ssh_hint(&self) {
    let public_ip = self
      .addresses
      .public_ip()
      .map(str::to_string)
      .or_else(|| {
        self
          .instances
          .info()
          .and_then(|instance| instance.public_ip.clone())
      });

    if let (Some(key_file), Some(ip)) = (self.key_pairs.key_file_path(), public_ip) {
      println!("Connect with: ssh -i {} ec2-user@{}", key_file.display(), ip);
    }
  }
}

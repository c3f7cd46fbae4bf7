use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use stratus_client::interact::{AutoPilot, Interact, Terminal};
use stratus_client::scenario::{Scenario, ScenarioConfig, resolve_launch_target};
use stratus_common::api::SdkEc2Client;

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Opt {
  /// AWS region to run in; falls back to the SDK's default chain
  #[clap(long, env = "STRATUS_REGION")]
  pub region: Option<String>,

  /// AMI to launch; when omitted, pick from the latest Amazon Linux images
  #[clap(long, env = "STRATUS_IMAGE_ID")]
  pub image_id: Option<String>,

  /// Instance type to launch; when omitted, pick from compatible demo sizes
  #[clap(long, env = "STRATUS_INSTANCE_TYPE")]
  pub instance_type: Option<String>,

  /// VPC to create the security group in; defaults to the account's default VPC
  #[clap(long, env = "STRATUS_VPC_ID")]
  pub vpc_id: Option<String>,

  /// CIDR granted SSH access, ideally your own address as a /32
  #[clap(long, env = "STRATUS_SSH_CIDR", default_value = "0.0.0.0/0")]
  pub ssh_cidr: String,

  /// Run non-interactively with generated resource names
  #[clap(long)]
  pub auto: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  // Initialize tracing first, before any logging happens
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let options = Opt::parse();

  let mut interact: Box<dyn Interact> = if options.auto {
    Box::new(AutoPilot::new("stratus-demo"))
  } else {
    Box::new(Terminal::new())
  };

  println!("{}", "-".repeat(88));
  println!("Welcome to the stratus EC2 get-started-with-instances demo.");
  println!("{}", "-".repeat(88));

  let key_name = interact.ask_non_empty("Enter a unique name for your key pair")?;
  let group_name = interact.ask_non_empty("Enter a unique name for your security group")?;

  let api = Arc::new(SdkEc2Client::new(options.region.clone()).await);

  let (image_id, instance_type) = resolve_launch_target(
    api.as_ref(),
    interact.as_mut(),
    options.image_id,
    options.instance_type,
  )
  .await?;
  println!("Launching a {instance_type} instance from {image_id}.");

  // Holds the private key material for the duration of the run; removed
  // when this binding drops.
  let key_file_dir = tempfile::tempdir().context("couldn't create a secure key directory")?;

  let mut scenario = Scenario::new(
    api,
    key_file_dir.path(),
    ScenarioConfig {
      key_name,
      group_name,
      vpc_id: options.vpc_id,
      image_id,
      instance_type,
      ssh_cidr: options.ssh_cidr,
    },
  );

  if let Err(err) = scenario.run(interact.as_mut()).await {
    error!(error = ?err, "Something went wrong with the demo.");
    return Err(err);
  }

  println!("\nThanks for watching!");
  println!("{}", "-".repeat(88));
  Ok(())
}

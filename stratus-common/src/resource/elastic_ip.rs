use std::sync::Arc;

use tracing::{error, info};

use crate::api::{Ec2Api, ElasticIpInfo};
use crate::error::Ec2Error;

/// Encapsulates Elastic IP address actions.
pub struct ElasticIpWrapper {
  api: Arc<dyn Ec2Api>,
  elastic_ip: Option<ElasticIpInfo>,
}

impl ElasticIpWrapper {
  pub fn new(api: Arc<dyn Ec2Api>) -> Self {
    ElasticIpWrapper {
      api,
      elastic_ip: None,
    }
  }

  pub fn info(&self) -> Option<&ElasticIpInfo> {
    self.elastic_ip.as_ref()
  }

  pub fn public_ip(&self) -> Option<&str> {
    self.elastic_ip.as_ref().map(|ip| ip.public_ip.as_str())
  }

  /// Allocates a VPC-scoped address and retains its full descriptor.
  pub async fn allocate(&mut self) -> Result<ElasticIpInfo, Ec2Error> {
    let allocation_id = self.api.allocate_address().await.map_err(|err| {
      error!(code = ?err.code(), error = %err, "Couldn't allocate Elastic IP");
      err
    })?;

    let elastic_ip = self
      .api
      .describe_address(&allocation_id)
      .await
      .map_err(|err| {
        error!(allocation_id = %allocation_id, code = ?err.code(), error = %err, "Couldn't fetch allocated Elastic IP");
        err
      })?;

    info!(allocation_id = %elastic_ip.allocation_id, public_ip = %elastic_ip.public_ip, "Allocated Elastic IP");
    self.elastic_ip = Some(elastic_ip.clone());
    Ok(elastic_ip)
  }

  /// Binds the held address to an instance and retains the association id.
  /// No-op when no address is held.
  pub async fn associate(&mut self, instance_id: &str) -> Result<Option<String>, Ec2Error> {
    let Some(elastic_ip) = &mut self.elastic_ip else {
      info!("No Elastic IP to associate.");
      return Ok(None);
    };
    let allocation_id = elastic_ip.allocation_id.clone();

    let association_id = self
      .api
      .associate_address(&allocation_id, instance_id)
      .await
      .map_err(|err| {
        error!(
          allocation_id = %allocation_id,
          instance_id = %instance_id,
          code = ?err.code(),
          error = %err,
          "Couldn't associate Elastic IP with instance"
        );
        err
      })?;

    info!(allocation_id = %allocation_id, association_id = %association_id, "Associated Elastic IP");
    elastic_ip.association_id = Some(association_id.clone());
    elastic_ip.instance_id = Some(instance_id.to_string());
    Ok(Some(association_id))
  }

  /// Removes the current association using the stored association id.
  /// No-op when no address or no association is held.
  pub async fn disassociate(&mut self) -> Result<(), Ec2Error> {
    let Some(elastic_ip) = &mut self.elastic_ip else {
      info!("No Elastic IP to disassociate.");
      return Ok(());
    };
    let allocation_id = elastic_ip.allocation_id.clone();
    let Some(association_id) = elastic_ip.association_id.clone() else {
      info!(allocation_id = %allocation_id, "Elastic IP is not associated with an instance.");
      return Ok(());
    };

    self
      .api
      .disassociate_address(&association_id)
      .await
      .map_err(|err| {
        error!(
          allocation_id = %allocation_id,
          association_id = %association_id,
          code = ?err.code(),
          error = %err,
          "Couldn't disassociate Elastic IP from its instance"
        );
        err
      })?;

    info!(allocation_id = %allocation_id, "Disassociated Elastic IP");
    elastic_ip.association_id = None;
    elastic_ip.instance_id = None;
    Ok(())
  }

  /// Releases the held address. No-op when empty.
  pub async fn release(&mut self) -> Result<(), Ec2Error> {
    let Some(allocation_id) = self
      .elastic_ip
      .as_ref()
      .map(|ip| ip.allocation_id.clone())
    else {
      info!("No Elastic IP to release.");
      return Ok(());
    };

    self.api.release_address(&allocation_id).await.map_err(|err| {
      error!(allocation_id = %allocation_id, code = ?err.code(), error = %err, "Couldn't release Elastic IP address");
      err
    })?;

    info!(allocation_id = %allocation_id, "Released Elastic IP");
    self.elastic_ip = None;
    Ok(())
  }
}

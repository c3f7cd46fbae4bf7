use thiserror::Error;

/// Errors surfaced by EC2 API calls and the local key-file write.
///
/// Vendor error codes relevant to the operations in this crate are mapped to
/// their own variants; anything unrecognized lands in [`Ec2Error::Api`]. Every
/// classified variant keeps the code the service actually returned, so logs
/// report the real code even when several codes map to one variant.
#[derive(Debug, Error)]
pub enum Ec2Error {
  /// A security group with the requested name already exists.
  #[error("security group name already in use: {message}")]
  DuplicateGroup { code: String, message: String },

  /// The ingress rule being authorized is already present on the group.
  #[error("ingress rule already present: {message}")]
  DuplicatePermission { code: String, message: String },

  #[error("security group not found: {message}")]
  GroupNotFound { code: String, message: String },

  #[error("key pair not found: {message}")]
  KeyPairNotFound { code: String, message: String },

  #[error("allocation id not found: {message}")]
  AllocationNotFound { code: String, message: String },

  #[error("association id not found: {message}")]
  AssociationNotFound { code: String, message: String },

  #[error("instance id not found: {message}")]
  InstanceNotFound { code: String, message: String },

  /// The address cannot be used, e.g. it was released or the account hit
  /// its address limit.
  #[error("address unavailable: {message}")]
  AddressUnavailable { code: String, message: String },

  /// The resource still has dependents and cannot be deleted yet.
  #[error("resource is in use: {message}")]
  DependencyInUse { code: String, message: String },

  #[error("invalid parameter: {message}")]
  InvalidParameter { code: String, message: String },

  /// Any vendor error code this crate does not recognize.
  #[error("EC2 API error ({}): {message}", .code.as_deref().unwrap_or("unknown"))]
  Api {
    code: Option<String>,
    message: String,
  },

  /// A response arrived without a field the caller needs.
  #[error("response missing field: {0}")]
  MissingField(&'static str),

  /// Local write of private key material failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

const DUPLICATE_GROUP_CODES: &[&str] = &["InvalidGroup.Duplicate"];
const DUPLICATE_PERMISSION_CODES: &[&str] = &["InvalidPermission.Duplicate"];
const GROUP_NOT_FOUND_CODES: &[&str] = &["InvalidGroup.NotFound", "InvalidGroupId.Malformed"];
const KEY_PAIR_NOT_FOUND_CODES: &[&str] = &["InvalidKeyPair.NotFound"];
const ALLOCATION_NOT_FOUND_CODES: &[&str] = &["InvalidAllocationID.NotFound"];
const ASSOCIATION_NOT_FOUND_CODES: &[&str] = &["InvalidAssociationID.NotFound"];
const INSTANCE_NOT_FOUND_CODES: &[&str] = &["InvalidInstanceID.NotFound"];
const ADDRESS_UNAVAILABLE_CODES: &[&str] = &["InvalidAddress.NotFound", "AddressLimitExceeded"];
const DEPENDENCY_CODES: &[&str] = &["DependencyViolation"];
const INVALID_PARAMETER_CODES: &[&str] = &["InvalidParameterValue", "MissingParameter"];

impl Ec2Error {
  /// Classify a vendor error code into the closed set above, keeping the
  /// original code alongside the message.
  pub fn from_code(code: Option<&str>, message: &str) -> Self {
    let message = message.to_string();
    let Some(c) = code else {
      return Ec2Error::Api {
        code: None,
        message,
      };
    };
    let code = c.to_string();

    if DUPLICATE_GROUP_CODES.contains(&c) {
      Ec2Error::DuplicateGroup { code, message }
    } else if DUPLICATE_PERMISSION_CODES.contains(&c) {
      Ec2Error::DuplicatePermission { code, message }
    } else if GROUP_NOT_FOUND_CODES.contains(&c) {
      Ec2Error::GroupNotFound { code, message }
    } else if KEY_PAIR_NOT_FOUND_CODES.contains(&c) {
      Ec2Error::KeyPairNotFound { code, message }
    } else if ALLOCATION_NOT_FOUND_CODES.contains(&c) {
      Ec2Error::AllocationNotFound { code, message }
    } else if ASSOCIATION_NOT_FOUND_CODES.contains(&c) {
      Ec2Error::AssociationNotFound { code, message }
    } else if INSTANCE_NOT_FOUND_CODES.contains(&c) {
      Ec2Error::InstanceNotFound { code, message }
    } else if ADDRESS_UNAVAILABLE_CODES.contains(&c) {
      Ec2Error::AddressUnavailable { code, message }
    } else if DEPENDENCY_CODES.contains(&c) {
      Ec2Error::DependencyInUse { code, message }
    } else if INVALID_PARAMETER_CODES.contains(&c) {
      Ec2Error::InvalidParameter { code, message }
    } else {
      Ec2Error::Api {
        code: Some(code),
        message,
      }
    }
  }

  /// A group lookup that came back empty, reported with the canonical
  /// not-found code.
  pub fn group_not_found(group_id: impl Into<String>) -> Self {
    Ec2Error::GroupNotFound {
      code: "InvalidGroup.NotFound".to_string(),
      message: group_id.into(),
    }
  }

  pub fn allocation_not_found(allocation_id: impl Into<String>) -> Self {
    Ec2Error::AllocationNotFound {
      code: "InvalidAllocationID.NotFound".to_string(),
      message: allocation_id.into(),
    }
  }

  pub fn association_not_found(association_id: impl Into<String>) -> Self {
    Ec2Error::AssociationNotFound {
      code: "InvalidAssociationID.NotFound".to_string(),
      message: association_id.into(),
    }
  }

  pub fn instance_not_found(instance_id: impl Into<String>) -> Self {
    Ec2Error::InstanceNotFound {
      code: "InvalidInstanceID.NotFound".to_string(),
      message: instance_id.into(),
    }
  }

  pub fn invalid_parameter(message: impl Into<String>) -> Self {
    Ec2Error::InvalidParameter {
      code: "InvalidParameterValue".to_string(),
      message: message.into(),
    }
  }

  /// The vendor code this error carries, if any.
  pub fn code(&self) -> Option<&str> {
    match self {
      Ec2Error::DuplicateGroup { code, .. }
      | Ec2Error::DuplicatePermission { code, .. }
      | Ec2Error::GroupNotFound { code, .. }
      | Ec2Error::KeyPairNotFound { code, .. }
      | Ec2Error::AllocationNotFound { code, .. }
      | Ec2Error::AssociationNotFound { code, .. }
      | Ec2Error::InstanceNotFound { code, .. }
      | Ec2Error::AddressUnavailable { code, .. }
      | Ec2Error::DependencyInUse { code, .. }
      | Ec2Error::InvalidParameter { code, .. } => Some(code),
      Ec2Error::Api { code, .. } => code.as_deref(),
      Ec2Error::MissingField(_) | Ec2Error::Io(_) => None,
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Ec2Error::GroupNotFound { .. }
        | Ec2Error::KeyPairNotFound { .. }
        | Ec2Error::AllocationNotFound { .. }
        | Ec2Error::AssociationNotFound { .. }
        | Ec2Error::InstanceNotFound { .. }
    )
  }

  pub fn is_duplicate(&self) -> bool {
    matches!(
      self,
      Ec2Error::DuplicateGroup { .. } | Ec2Error::DuplicatePermission { .. }
    )
  }
}

/// Classify an AWS SDK operation error using its typed metadata.
///
/// Uses `ProvideErrorMetadata::code()` rather than matching on the Debug
/// representation.
#[cfg(feature = "aws")]
pub fn from_sdk<E, R>(err: aws_sdk_ec2::error::SdkError<E, R>) -> Ec2Error
where
  E: aws_sdk_ec2::error::ProvideErrorMetadata + std::fmt::Debug,
  R: std::fmt::Debug,
{
  use aws_sdk_ec2::error::ProvideErrorMetadata;

  let code = err.code().map(str::to_string);
  let message = err
    .message()
    .map(str::to_string)
    .unwrap_or_else(|| format!("{:?}", err));

  Ec2Error::from_code(code.as_deref(), &message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn duplicate_group_code_maps_to_its_own_variant() {
    let err = Ec2Error::from_code(Some("InvalidGroup.Duplicate"), "group exists");
    assert!(matches!(err, Ec2Error::DuplicateGroup { .. }));
    assert!(err.is_duplicate());
    assert_eq!(err.code(), Some("InvalidGroup.Duplicate"));
  }

  #[test]
  fn duplicate_permission_code_maps_to_its_own_variant() {
    let err = Ec2Error::from_code(Some("InvalidPermission.Duplicate"), "rule exists");
    assert!(matches!(err, Ec2Error::DuplicatePermission { .. }));
    assert!(err.is_duplicate());
  }

  #[test]
  fn not_found_codes_map_to_not_found_variants() {
    let cases: &[(&str, fn(&Ec2Error) -> bool)] = &[
      ("InvalidGroup.NotFound", |e| matches!(e, Ec2Error::GroupNotFound { .. })),
      ("InvalidKeyPair.NotFound", |e| matches!(e, Ec2Error::KeyPairNotFound { .. })),
      ("InvalidAllocationID.NotFound", |e| matches!(e, Ec2Error::AllocationNotFound { .. })),
      ("InvalidAssociationID.NotFound", |e| matches!(e, Ec2Error::AssociationNotFound { .. })),
      ("InvalidInstanceID.NotFound", |e| matches!(e, Ec2Error::InstanceNotFound { .. })),
    ];
    for (code, check) in cases {
      let err = Ec2Error::from_code(Some(code), "gone");
      assert!(check(&err), "wrong variant for {code}");
      assert!(err.is_not_found(), "expected not-found for {code}");
    }
  }

  #[test]
  fn classification_keeps_the_original_code_for_multi_code_variants() {
    // Two codes map to GroupNotFound; each must come back out unchanged.
    let malformed = Ec2Error::from_code(Some("InvalidGroupId.Malformed"), "sg-??");
    assert!(matches!(malformed, Ec2Error::GroupNotFound { .. }));
    assert_eq!(malformed.code(), Some("InvalidGroupId.Malformed"));

    let limit = Ec2Error::from_code(Some("AddressLimitExceeded"), "too many addresses");
    assert!(matches!(limit, Ec2Error::AddressUnavailable { .. }));
    assert_eq!(limit.code(), Some("AddressLimitExceeded"));

    let released = Ec2Error::from_code(Some("InvalidAddress.NotFound"), "already released");
    assert_eq!(released.code(), Some("InvalidAddress.NotFound"));

    let missing = Ec2Error::from_code(Some("MissingParameter"), "no image id");
    assert!(matches!(missing, Ec2Error::InvalidParameter { .. }));
    assert_eq!(missing.code(), Some("MissingParameter"));
  }

  #[test]
  fn dependency_violation_is_in_use() {
    let err = Ec2Error::from_code(Some("DependencyViolation"), "ENI attached");
    assert!(matches!(err, Ec2Error::DependencyInUse { .. }));
    assert_eq!(err.code(), Some("DependencyViolation"));
  }

  #[test]
  fn unrecognized_code_is_preserved_in_fallback() {
    let err = Ec2Error::from_code(Some("SomeBrandNewCode"), "details");
    match err {
      Ec2Error::Api { code, message } => {
        assert_eq!(code.as_deref(), Some("SomeBrandNewCode"));
        assert_eq!(message, "details");
      }
      other => panic!("expected Api fallback, got {other:?}"),
    }
  }

  #[test]
  fn missing_code_is_fallback_with_none() {
    let err = Ec2Error::from_code(None, "transport failure");
    assert!(matches!(err, Ec2Error::Api { code: None, .. }));
    assert!(err.code().is_none());
  }

  #[test]
  fn synthesized_not_found_errors_carry_the_canonical_code() {
    let err = Ec2Error::instance_not_found("i-0001");
    assert!(err.is_not_found());
    assert_eq!(err.code(), Some("InvalidInstanceID.NotFound"));
  }
}

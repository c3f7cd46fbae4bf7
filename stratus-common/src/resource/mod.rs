//! Thin stateful wrappers over the remote EC2 surface, one per resource
//! kind. Each wrapper owns at most one resident identifier; methods that
//! need it are benign no-ops when it is absent.

mod elastic_ip;
mod instance;
mod key_pair;
mod security_group;

pub use elastic_ip::ElasticIpWrapper;
pub use instance::InstanceWrapper;
pub use key_pair::KeyPairWrapper;
pub use security_group::SecurityGroupWrapper;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

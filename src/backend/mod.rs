pub mod azcli;
pub mod process;
pub mod types;

use crate::{error::ProbeError, resource::ResourceKind};
use anyhow::Result;

pub use types::{CreateResult, NodeReadiness, ToolDiag};

/// The cloud and cluster control planes, seen as status sources and
/// kick-off commands.
///
/// Status methods are read-only and safe to call once per poll attempt.
/// `Ok(None)` from a status method means the object does not exist yet.
pub trait Backend {
    fn doctor(&self) -> Result<Vec<ToolDiag>>;

    fn register_provider(&self, namespace: &str) -> Result<(), ProbeError>;
    fn provider_state(&self, namespace: &str) -> Result<String, ProbeError>;

    fn connect_cluster(&self) -> Result<(), ProbeError>;
    fn cluster_connectivity(&self) -> Result<Option<String>, ProbeError>;
    fn oidc_issuer_url(&self) -> Result<Option<String>, ProbeError>;

    fn node_readiness(&self) -> Result<NodeReadiness, ProbeError>;

    fn resource_state(&self, kind: ResourceKind, name: &str) -> Result<Option<String>, ProbeError>;
    fn create_resource(&self, kind: ResourceKind, name: &str) -> Result<CreateResult, ProbeError>;
}

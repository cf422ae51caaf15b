//! The fixed battery of Zero Trust controls

pub mod cmk_encryption;
pub mod diagnostics;
pub mod disk_security;
pub mod paas_private_access;
pub mod public_ip;
pub mod sql_auditing;
pub mod storage_security;
pub mod subnet_nsg;
pub mod vnet_dns;
pub mod vnet_peering;

pub use cmk_encryption::CmkEncryption;
pub use diagnostics::Diagnostics;
pub use disk_security::DiskSecurity;
pub use paas_private_access::PaasPrivateAccess;
pub use public_ip::PublicIpAddresses;
pub use sql_auditing::SqlAuditing;
pub use storage_security::StorageAccountSecurity;
pub use subnet_nsg::SubnetNsg;
pub use vnet_dns::VnetDns;
pub use vnet_peering::VnetPeering;

use crate::config::EngineConfig;
use crate::control::Control;
use std::sync::Arc;

pub(crate) const STORAGE_ACCOUNTS: &str = "Microsoft.Storage/storageAccounts";
pub(crate) const DISKS: &str = "Microsoft.Compute/disks";
pub(crate) const SQL_SERVERS: &str = "Microsoft.Sql/servers";
pub(crate) const VIRTUAL_NETWORKS: &str = "Microsoft.Network/virtualNetworks";

/// All ten controls in report order
pub fn default_controls(config: &EngineConfig) -> Vec<Arc<dyn Control>> {
    vec![
        Arc::new(PublicIpAddresses),
        Arc::new(PaasPrivateAccess),
        Arc::new(Diagnostics::new(config)),
        Arc::new(StorageAccountSecurity),
        Arc::new(DiskSecurity),
        Arc::new(VnetDns::new(config)),
        Arc::new(SqlAuditing),
        Arc::new(VnetPeering::new(config)),
        Arc::new(SubnetNsg),
        Arc::new(CmkEncryption::new(config)),
    ]
}

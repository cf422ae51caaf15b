//! Scan data model
//!
//! Every entity here lives for exactly one scan. Controls build results
//! through [`crate::control::Findings`]; nothing is mutated after the
//! control that produced it returns.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Scan context
// =============================================================================

/// Service principal used to reach the subscription
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClientCredentials {
    /// Directory the principal belongs to
    pub tenant_id: String,
    /// Application (client) id
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Immutable per-run input shared by every control
#[derive(Debug, Clone)]
pub struct ScanContext {
    /// Subscription under assessment
    pub subscription_id: String,
    /// Environment tag selecting expected DNS servers and peer networks
    pub environment: String,
    /// Principal the inventory authenticates as
    pub credentials: ClientCredentials,
}

impl ScanContext {
    /// Context for one subscription and environment
    pub fn new(
        subscription_id: impl Into<String>,
        environment: impl Into<String>,
        credentials: ClientCredentials,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            environment: environment.into(),
            credentials,
        }
    }

    /// Environment tag normalized for configuration lookups
    pub fn environment_key(&self) -> String {
        self.environment.trim().to_uppercase()
    }
}

// =============================================================================
// Control identity
// =============================================================================

/// The fixed battery of controls, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlId {
    /// No public IP addresses allocated
    PublicIp,
    /// PaaS services reachable only privately
    PaasPrivateAccess,
    /// Diagnostic settings present on every resource
    Diagnostics,
    /// Storage account hardening
    StorageSecurity,
    /// Managed disk network and encryption settings
    DiskSecurity,
    /// VNet DNS servers match the environment
    VnetDns,
    /// SQL servers and databases audit
    SqlAuditing,
    /// Only expected VNet peerings
    VnetPeering,
    /// Every subnet has an NSG
    SubnetNsg,
    /// Customer managed keys
    CmkEncryption,
}

impl ControlId {
    /// Configured execution order
    pub const ALL: [ControlId; 10] = [
        ControlId::PublicIp,
        ControlId::PaasPrivateAccess,
        ControlId::Diagnostics,
        ControlId::StorageSecurity,
        ControlId::DiskSecurity,
        ControlId::VnetDns,
        ControlId::SqlAuditing,
        ControlId::VnetPeering,
        ControlId::SubnetNsg,
        ControlId::CmkEncryption,
    ];

    /// Stable kebab-case name, as used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicIp => "public-ip",
            Self::PaasPrivateAccess => "paas-private-access",
            Self::Diagnostics => "diagnostics",
            Self::StorageSecurity => "storage-security",
            Self::DiskSecurity => "disk-security",
            Self::VnetDns => "vnet-dns",
            Self::SqlAuditing => "sql-auditing",
            Self::VnetPeering => "vnet-peering",
            Self::SubnetNsg => "subnet-nsg",
            Self::CmkEncryption => "cmk-encryption",
        }
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ControlId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown control: {}", s))
    }
}

// =============================================================================
// Attributes
// =============================================================================

/// Ordered attribute name → value mapping.
///
/// Kept as a list so report columns come out in the order a control
/// recorded them. Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    /// Empty mapping
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add or replace an attribute, keeping its first position
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// In-place variant of [`Attributes::with`]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Value of `key`, if recorded
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Names in recording order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    /// Pairs in recording order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Attributes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Attributes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AttributesVisitor;

        impl<'de> Visitor<'de> for AttributesVisitor {
            type Value = Attributes;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of attribute names to string values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut attrs = Attributes::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    attrs.insert(k, v);
                }
                Ok(attrs)
            }
        }

        deserializer.deserialize_map(AttributesVisitor)
    }
}

// =============================================================================
// Evidence rows
// =============================================================================

/// Classification of one inspected resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remark {
    /// Meets the control
    Comply,
    /// Violates the control, optionally naming the sub-rule
    NotComply {
        /// Sub-rule that failed
        detail: Option<String>,
    },
    /// Could not be inspected
    Error,
}

impl Remark {
    const COMPLY: &'static str = "Comply with Zero Trust";
    const NOT_COMPLY: &'static str = "Not Comply with Zero Trust";
    const ERROR: &'static str = "Error during check";

    /// Non-compliant without detail
    pub fn not_comply() -> Self {
        Self::NotComply { detail: None }
    }

    /// Non-compliant naming the sub-rule that failed
    pub fn not_comply_with(detail: impl Into<String>) -> Self {
        Self::NotComply {
            detail: Some(detail.into()),
        }
    }

    /// Comply or NotComply
    pub fn from_compliant(compliant: bool) -> Self {
        if compliant {
            Self::Comply
        } else {
            Self::not_comply()
        }
    }

    /// True for [`Remark::Comply`]
    pub fn is_comply(&self) -> bool {
        matches!(self, Self::Comply)
    }
}

impl fmt::Display for Remark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comply => f.write_str(Self::COMPLY),
            Self::NotComply { detail: None } => f.write_str(Self::NOT_COMPLY),
            Self::NotComply { detail: Some(d) } => write!(f, "{} - {}", Self::NOT_COMPLY, d),
            Self::Error => f.write_str(Self::ERROR),
        }
    }
}

impl FromStr for Remark {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::COMPLY {
            Ok(Self::Comply)
        } else if s == Self::ERROR {
            Ok(Self::Error)
        } else if s == Self::NOT_COMPLY {
            Ok(Self::not_comply())
        } else if let Some(detail) = s.strip_prefix(Self::NOT_COMPLY).and_then(|r| r.strip_prefix(" - ")) {
            Ok(Self::not_comply_with(detail))
        } else {
            Err(format!("unknown remark: {}", s))
        }
    }
}

impl Serialize for Remark {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Remark {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One row of evidence: a resource the control inspected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedResource {
    /// ARM type, e.g. `Microsoft.Compute/disks`
    pub resource_type: String,
    /// Resource name
    pub name: String,
    /// Per-control evidence columns
    #[serde(flatten)]
    pub attributes: Attributes,
    /// Verdict on the resource
    pub remark: Remark,
}

/// One violated sub-rule on one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolatingResource {
    /// ARM type or a display label such as `SQL Server`
    pub resource_type: String,
    /// Resource name
    pub name: String,
    /// Full resource id, absent on synthetic entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Resource group, when the id carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    /// Evidence columns copied from the scanned row
    #[serde(flatten)]
    pub attributes: Attributes,
    /// Sub-rule that was violated
    pub reason: String,
}

impl ViolatingResource {
    /// Violation without id or resource group
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            id: None,
            resource_group: None,
            attributes: Attributes::new(),
            reason: reason.into(),
        }
    }

    /// Attach the full resource id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach the resource group
    pub fn with_resource_group(mut self, rg: Option<impl Into<String>>) -> Self {
        self.resource_group = rg.map(Into::into);
        self
    }

    /// Add one evidence column
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key, value);
        self
    }
}

// =============================================================================
// Control results
// =============================================================================

/// Outcome of one control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlStatus {
    /// No violations
    Pass,
    /// At least one violation
    Fail,
    /// The control itself could not run to completion
    Error,
}

impl fmt::Display for ControlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => f.write_str("PASS"),
            Self::Fail => f.write_str("FAIL"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

/// Uniform output of a control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResult {
    /// Control that produced the result
    pub control: ControlId,
    /// Policy title
    pub policy: String,
    /// Rationale
    pub description: String,
    /// PASS when no violations, FAIL otherwise, ERROR when the control itself failed
    pub status: ControlStatus,
    /// Human-readable summary of the outcome
    pub reason: String,
    /// Every resource the control inspected
    pub scanned_resources: Vec<ScannedResource>,
    /// Violations, one per failed sub-rule
    pub violating_resources: Vec<ViolatingResource>,
    /// Failure message of an ERROR result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResult {
    /// Result substituted for a control that failed outright
    pub fn errored(
        control: ControlId,
        policy: impl Into<String>,
        description: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            control,
            policy: policy.into(),
            description: description.into(),
            status: ControlStatus::Error,
            reason: format!("Control failed: {}", message),
            scanned_resources: Vec::new(),
            violating_resources: Vec::new(),
            error: Some(message),
        }
    }

    /// True for PASS only
    pub fn passed(&self) -> bool {
        self.status == ControlStatus::Pass
    }
}

/// Subscription-level totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    /// Number of control results
    pub total: usize,
    /// Results with status PASS
    pub passed: usize,
    /// Everything else, ERROR included
    pub failed: usize,
}

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use super::DeviceType;

/// Per-department host totals derived from room occupancy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentHostSummary {
    pub department_name: String,
    pub wired_hosts: u64,
    pub wireless_hosts: u64,
    pub total_hosts: u64,
}

/// One line of the bill of materials, one per device type used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillOfMaterialsLine {
    pub device_id: String,
    pub device_type: DeviceType,
    pub model: String,
    pub quantity: u64,
    pub unit_price: f64,
    pub total_cost: f64,
}

/// IPv4 network block. Always normalized: host bits of `network` are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Cidr {
    /// Block of length `prefix` containing `addr` (prefix clamped to 32)
    pub fn containing(addr: Ipv4Addr, prefix: u8) -> Self {
        let prefix = prefix.min(32);
        Self {
            network: Ipv4Addr::from(u32::from(addr) & mask_bits(prefix)),
            prefix,
        }
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn mask(&self) -> Ipv4Addr {
        Ipv4Addr::from(mask_bits(self.prefix))
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | !mask_bits(self.prefix))
    }

    /// Total addresses in the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    /// Addresses excluding network and broadcast
    pub fn usable_hosts(&self) -> u64 {
        self.size().saturating_sub(2)
    }

    pub fn overlaps(&self, other: &Cidr) -> bool {
        let (a_start, a_end) = (u32::from(self.network), u32::from(self.broadcast()));
        let (b_start, b_end) = (u32::from(other.network), u32::from(other.broadcast()));
        a_start <= b_end && b_start <= a_end
    }
}

fn mask_bits(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Cidr {
    type Err = String;

    /// Strict parse: rejects blocks with host bits set
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| format!("'{}' is not in address/prefix form", s))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| format!("invalid IPv4 address in '{}'", s))?;
        let prefix: u8 = prefix
            .parse()
            .ok()
            .filter(|p| *p <= 32)
            .ok_or_else(|| format!("invalid prefix length in '{}'", s))?;
        let cidr = Cidr::containing(addr, prefix);
        if cidr.network != addr {
            return Err(format!("'{}' has host bits set", s));
        }
        Ok(cidr)
    }
}

impl Serialize for Cidr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cidr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// VLAN and address block assigned to one department (or the management VLAN).
///
/// Mask, network, broadcast and usable host count are derived from `cidr_block`
/// and only appear in the serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubnetAssignment {
    pub vlan_id: u16,
    pub department_name: String,
    pub cidr_block: Cidr,
    pub required_host_count: u64,
}

impl SubnetAssignment {
    pub fn subnet_mask(&self) -> Ipv4Addr {
        self.cidr_block.mask()
    }

    pub fn network_address(&self) -> Ipv4Addr {
        self.cidr_block.network()
    }

    pub fn broadcast_address(&self) -> Ipv4Addr {
        self.cidr_block.broadcast()
    }

    pub fn usable_hosts(&self) -> u64 {
        self.cidr_block.usable_hosts()
    }
}

impl Serialize for SubnetAssignment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("SubnetAssignment", 8)?;
        st.serialize_field("vlan_id", &self.vlan_id)?;
        st.serialize_field("department_name", &self.department_name)?;
        st.serialize_field("cidr_block", &self.cidr_block)?;
        st.serialize_field("subnet_mask", &self.subnet_mask())?;
        st.serialize_field("network_address", &self.network_address())?;
        st.serialize_field("broadcast_address", &self.broadcast_address())?;
        st.serialize_field("usable_hosts", &self.usable_hosts())?;
        st.serialize_field("required_host_count", &self.required_host_count)?;
        st.end()
    }
}

/// Host range annotation on an access-layer topology node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HostRange {
    Range { first: Ipv4Addr, last: Ipv4Addr },
    Empty,
    Unavailable,
}

impl HostRange {
    pub fn label(&self) -> String {
        match self {
            HostRange::Range { first, last } => format!("{} - {}", first, last),
            HostRange::Empty => "no usable hosts".to_string(),
            HostRange::Unavailable => "range unavailable".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub id: String,
    pub kind: DeviceType,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_range: Option<HostRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyEdge {
    pub from: String,
    pub to: String,
}

/// Abstract layered graph handed to the report renderer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyGraph {
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
}

impl TopologyGraph {
    pub fn node(&self, id: &str) -> Option<&TopologyNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Graphviz source for external renderers
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph campus {\n    rankdir=TB;\n    node [shape=box];\n");
        for node in &self.nodes {
            out.push_str(&format!(
                "    \"{}\" [label=\"{}\"];\n",
                escape_dot(&node.id),
                escape_dot(&node.label)
            ));
        }
        for edge in &self.edges {
            out.push_str(&format!(
                "    \"{}\" -> \"{}\";\n",
                escape_dot(&edge.from),
                escape_dot(&edge.to)
            ));
        }
        out.push_str("}\n");
        out
    }
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// Design is the generated plan for a request, created exactly once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Design {
    pub id: i64,
    pub request_id: i64,
    pub created_by: i64,
    pub bill_of_materials: Vec<BillOfMaterialsLine>,
    pub subnet_assignments: Vec<SubnetAssignment>,
    pub topology: TopologyGraph,
    pub total_estimated_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_ref: Option<String>,
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Design {
    pub fn has_report(&self) -> bool {
        self.report_ref.as_deref().is_some_and(|r| !r.trim().is_empty())
    }
}

/// Result of generating or re-rendering a design
#[derive(Debug, Clone, Serialize)]
pub struct DesignResponse {
    pub request: super::Request,
    pub design: Design,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<super::Diagnostic>,
}

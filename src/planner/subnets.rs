use std::net::Ipv4Addr;

use super::PlanError;
use crate::models::{Cidr, DepartmentHostSummary, SubnetAssignment};

pub const MANAGEMENT_VLAN_ID: u16 = 1;
pub const MANAGEMENT_VLAN_NAME: &str = "Management";
pub const MANAGEMENT_BLOCK: (Ipv4Addr, u8) = (Ipv4Addr::new(10, 1, 1, 0), 24);

pub const FIRST_DEPARTMENT_VLAN_ID: u16 = 10;
const MAX_VLAN_ID: u16 = 4094;

/// Spare addresses reserved in every department block
pub const GROWTH_BUFFER: u64 = 10;

const SMALLEST_PREFIX: u8 = 30;
const LARGEST_PREFIX: u8 = 20;

const FIRST_OCTET: u16 = 10;
const FIRST_SLOT: u16 = 1;
const MAX_OCTET: u16 = 254;

/// Position of the next free block in 10.{octet2}.{octet3}.0.
///
/// Each department block starts on its own octet3 slot regardless of prefix
/// length. Blocks wider than /24 are aligned to their natural boundary and
/// consume every slot they cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressCursor {
    octet2: u16,
    octet3: u16,
}

impl AddressCursor {
    pub const START: AddressCursor = AddressCursor {
        octet2: FIRST_OCTET,
        octet3: FIRST_SLOT,
    };

    /// Carve a block of length `prefix` at the cursor, returning the block and the
    /// cursor after it. `None` once octet2 runs past 254.
    pub fn carve(self, prefix: u8) -> Option<(Cidr, AddressCursor)> {
        let span: u16 = if prefix >= 24 { 1 } else { 1 << (24 - prefix.max(16)) };
        let mut cursor = self;

        while cursor.octet2 <= MAX_OCTET {
            let start = cursor.octet3.div_ceil(span) * span;
            let end = start + span - 1;
            if end <= MAX_OCTET {
                let base = Ipv4Addr::new(10, cursor.octet2 as u8, start as u8, 0);
                let next = AddressCursor {
                    octet2: cursor.octet2,
                    octet3: end + 1,
                };
                return Some((Cidr::containing(base, prefix), next.rolled()));
            }
            cursor = AddressCursor {
                octet2: cursor.octet2 + 1,
                octet3: FIRST_SLOT,
            };
        }
        None
    }

    fn rolled(self) -> Self {
        if self.octet3 > MAX_OCTET {
            AddressCursor {
                octet2: self.octet2 + 1,
                octet3: FIRST_SLOT,
            }
        } else {
            self
        }
    }
}

impl Default for AddressCursor {
    fn default() -> Self {
        Self::START
    }
}

/// Smallest prefix in /30../20 whose usable hosts cover `required`
pub fn prefix_for(required: u64) -> Option<u8> {
    (LARGEST_PREFIX..=SMALLEST_PREFIX)
        .rev()
        .find(|p| (1u64 << (32 - u32::from(*p))) - 2 >= required)
}

fn management() -> SubnetAssignment {
    let (addr, prefix) = MANAGEMENT_BLOCK;
    SubnetAssignment {
        vlan_id: MANAGEMENT_VLAN_ID,
        department_name: MANAGEMENT_VLAN_NAME.to_string(),
        cidr_block: Cidr::containing(addr, prefix),
        required_host_count: 0,
    }
}

/// Assign the management VLAN followed by one VLAN and block per department
pub fn allocate_subnets(summaries: &[DepartmentHostSummary]) -> Result<Vec<SubnetAssignment>, PlanError> {
    let mut out = Vec::with_capacity(summaries.len() + 1);
    out.push(management());

    let mut cursor = AddressCursor::START;
    for (index, summary) in summaries.iter().enumerate() {
        let exhausted = |reason: String| PlanError::AddressSpaceExhausted {
            department: Some(summary.department_name.clone()),
            reason,
        };

        let vlan_id = u16::try_from(index)
            .ok()
            .and_then(|i| i.checked_add(FIRST_DEPARTMENT_VLAN_ID))
            .filter(|v| *v <= MAX_VLAN_ID)
            .ok_or_else(|| exhausted(format!("no VLAN id left for department '{}'", summary.department_name)))?;

        let required = summary.total_hosts + GROWTH_BUFFER;
        let prefix = prefix_for(required).ok_or_else(|| {
            exhausted(format!(
                "department '{}' needs {} addresses, more than a /{} provides",
                summary.department_name, required, LARGEST_PREFIX
            ))
        })?;

        let (block, next) = cursor.carve(prefix).ok_or_else(|| {
            exhausted(format!(
                "no room left for department '{}' (/{})",
                summary.department_name, prefix
            ))
        })?;
        cursor = next;

        out.push(SubnetAssignment {
            vlan_id,
            department_name: summary.department_name.clone(),
            cidr_block: block,
            required_host_count: summary.total_hosts,
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str, total: u64) -> DepartmentHostSummary {
        DepartmentHostSummary {
            department_name: name.to_string(),
            wired_hosts: total,
            wireless_hosts: 0,
            total_hosts: total,
        }
    }

    #[test]
    fn test_prefix_ladder() {
        assert_eq!(prefix_for(2), Some(30));
        assert_eq!(prefix_for(10), Some(28));
        assert_eq!(prefix_for(15), Some(27));
        assert_eq!(prefix_for(50), Some(26));
        assert_eq!(prefix_for(254), Some(24));
        assert_eq!(prefix_for(255), Some(23));
        assert_eq!(prefix_for(4094), Some(20));
        assert_eq!(prefix_for(4095), None);
    }

    #[test]
    fn test_forty_hosts_get_a_slash_26() {
        let subnets = allocate_subnets(&[summary("Lab", 40)]).unwrap();
        assert_eq!(subnets[1].cidr_block.prefix(), 26);
        assert_eq!(subnets[1].usable_hosts(), 62);
        assert_eq!(subnets[1].required_host_count, 40);
    }

    #[test]
    fn test_management_first_then_sequential_vlans() {
        let subnets = allocate_subnets(&[summary("A", 1), summary("B", 1), summary("C", 1)]).unwrap();
        assert_eq!(subnets[0].vlan_id, 1);
        assert_eq!(subnets[0].cidr_block.to_string(), "10.1.1.0/24");
        let vlans: Vec<u16> = subnets.iter().skip(1).map(|s| s.vlan_id).collect();
        assert_eq!(vlans, vec![10, 11, 12]);
        let blocks: Vec<String> = subnets.iter().skip(1).map(|s| s.cidr_block.to_string()).collect();
        assert_eq!(blocks, vec!["10.10.1.0/28", "10.10.2.0/28", "10.10.3.0/28"]);
    }

    #[test]
    fn test_blocks_are_disjoint_and_large_enough() {
        let totals = [5u64, 300, 40, 1000, 0, 4084, 12, 600];
        let summaries: Vec<_> = totals
            .iter()
            .enumerate()
            .map(|(i, t)| summary(&format!("D{}", i), *t))
            .collect();
        let subnets = allocate_subnets(&summaries).unwrap();

        for (i, a) in subnets.iter().enumerate() {
            for b in subnets.iter().skip(i + 1) {
                assert!(
                    !a.cidr_block.overlaps(&b.cidr_block),
                    "{} overlaps {}",
                    a.cidr_block,
                    b.cidr_block
                );
                assert_ne!(a.vlan_id, b.vlan_id);
            }
        }
        for (s, total) in subnets.iter().skip(1).zip(totals) {
            assert!(s.usable_hosts() >= total + GROWTH_BUFFER);
            assert_eq!(s.usable_hosts(), (1u64 << (32 - u32::from(s.cidr_block.prefix()))) - 2);
        }
    }

    #[test]
    fn test_wide_blocks_align_to_boundary() {
        let subnets = allocate_subnets(&[summary("A", 5), summary("B", 300), summary("C", 5)]).unwrap();
        assert_eq!(subnets[1].cidr_block.to_string(), "10.10.1.0/28");
        assert_eq!(subnets[2].cidr_block.to_string(), "10.10.2.0/23");
        assert_eq!(subnets[3].cidr_block.to_string(), "10.10.4.0/28");
    }

    #[test]
    fn test_oversized_department_rejected() {
        let err = allocate_subnets(&[summary("Stadium", 4085)]).unwrap_err();
        match err {
            PlanError::AddressSpaceExhausted { department, .. } => {
                assert_eq!(department.as_deref(), Some("Stadium"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_cursor_rolls_to_next_octet() {
        let cursor = AddressCursor {
            octet2: 10,
            octet3: 254,
        };
        let (block, next) = cursor.carve(28).unwrap();
        assert_eq!(block.to_string(), "10.10.254.0/28");
        assert_eq!((next.octet2, next.octet3), (11, 1));

        let (block, next) = cursor.carve(23).unwrap();
        assert_eq!(block.to_string(), "10.11.2.0/23");
        assert_eq!((next.octet2, next.octet3), (11, 4));
    }

    #[test]
    fn test_cursor_exhaustion() {
        let last = AddressCursor {
            octet2: 254,
            octet3: 254,
        };
        let (_, next) = last.carve(28).unwrap();
        assert_eq!((next.octet2, next.octet3), (255, 1));
        assert!(next.carve(28).is_none());
        assert!(last.carve(20).is_none());
    }
}

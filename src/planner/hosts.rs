use crate::models::{DepartmentHostSummary, DepartmentRequirement};

/// Sum room occupancy into one summary per department, preserving order.
/// Departments without rooms summarize to zero hosts.
pub fn aggregate_hosts(departments: &[DepartmentRequirement]) -> Vec<DepartmentHostSummary> {
    departments
        .iter()
        .map(|dept| {
            let (wired, wireless) = dept.rooms.iter().fold((0u64, 0u64), |(w, wl), room| {
                (w + u64::from(room.wired_hosts), wl + u64::from(room.wireless_hosts))
            });
            DepartmentHostSummary {
                department_name: dept.name.clone(),
                wired_hosts: wired,
                wireless_hosts: wireless,
                total_hosts: wired + wireless,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::fixtures::department;

    #[test]
    fn test_sums_rooms_per_department() {
        let summaries = aggregate_hosts(&[
            department("Admin", &[(10, 2), (5, 3)]),
            department("Gym", &[(0, 25)]),
        ]);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].department_name, "Admin");
        assert_eq!((summaries[0].wired_hosts, summaries[0].wireless_hosts), (15, 5));
        assert_eq!(summaries[0].total_hosts, 20);
        assert_eq!(summaries[1].department_name, "Gym");
        assert_eq!(summaries[1].total_hosts, 25);
    }

    #[test]
    fn test_department_without_rooms_is_zero() {
        let summaries = aggregate_hosts(&[department("Empty", &[])]);
        assert_eq!(summaries[0].wired_hosts, 0);
        assert_eq!(summaries[0].wireless_hosts, 0);
        assert_eq!(summaries[0].total_hosts, 0);
    }

    #[test]
    fn test_large_counts_do_not_overflow() {
        let summaries = aggregate_hosts(&[department("Big", &[(u32::MAX, u32::MAX), (u32::MAX, 0)])]);
        assert_eq!(summaries[0].wired_hosts, 2 * u64::from(u32::MAX));
        assert_eq!(summaries[0].total_hosts, 3 * u64::from(u32::MAX));
    }

    #[test]
    fn test_missing_counts_deserialize_as_zero() {
        let dept: DepartmentRequirement =
            serde_json::from_str(r#"{"name":"Lobby","rooms":[{"name":"Front desk"}]}"#).unwrap();
        let summaries = aggregate_hosts(&[dept]);
        assert_eq!(summaries[0].total_hosts, 0);
    }
}

use std::net::Ipv4Addr;

use super::subnets::MANAGEMENT_VLAN_ID;
use crate::models::*;

const ROUTER_ID: &str = "router";
const CORE_ID: &str = "core-switch";

/// Build the router → core → distribution → access graph.
///
/// The BOM is only consulted to put the selected model on each node label.
/// Host range problems for one department never affect the rest of the graph.
pub fn synthesize_topology(
    summaries: &[DepartmentHostSummary],
    bom: &[BillOfMaterialsLine],
    subnets: &[SubnetAssignment],
) -> TopologyGraph {
    let mut graph = TopologyGraph::default();

    graph.nodes.push(device_node(ROUTER_ID, DeviceType::Router, DeviceType::Router.label(), bom));
    graph.nodes.push(device_node(CORE_ID, DeviceType::CoreSwitch, DeviceType::CoreSwitch.label(), bom));
    link(&mut graph, ROUTER_ID, CORE_ID);

    for (i, summary) in summaries.iter().enumerate() {
        let n = i + 1;
        let dept = summary.department_name.as_str();
        let dist_id = format!("dist-{}", n);

        let mut dist = device_node(
            &dist_id,
            DeviceType::DistributionSwitch,
            &format!("{} Distribution", dept),
            bom,
        );
        dist.department = Some(dept.to_string());
        graph.nodes.push(dist);
        link(&mut graph, CORE_ID, &dist_id);

        let subnet = subnets
            .iter()
            .find(|s| s.vlan_id != MANAGEMENT_VLAN_ID && s.department_name == dept);
        let range = host_range(subnet);

        if summary.wired_hosts > 0 {
            let id = format!("access-{}", n);
            let title = format!("{} Access Switch\nwired: {}", dept, range.label());
            graph.nodes.push(access_node(&id, DeviceType::AccessSwitch, &title, dept, &range, bom));
            link(&mut graph, &dist_id, &id);
        }

        if summary.wireless_hosts > 0 {
            let id = format!("ap-{}", n);
            let title = format!("{} Access Point\nwireless: {}", dept, range.label());
            graph.nodes.push(access_node(&id, DeviceType::AccessPoint, &title, dept, &range, bom));
            link(&mut graph, &dist_id, &id);
        }
    }

    graph
}

/// First and last usable host of a department's block
fn host_range(subnet: Option<&SubnetAssignment>) -> HostRange {
    let Some(subnet) = subnet else {
        return HostRange::Unavailable;
    };
    if subnet.cidr_block.size() < 3 {
        return HostRange::Empty;
    }

    let [a, b, c, d] = subnet.network_address().octets();
    let [w, x, y, z] = subnet.broadcast_address().octets();
    match (d.checked_add(1), z.checked_sub(1)) {
        (Some(first), Some(last)) => HostRange::Range {
            first: Ipv4Addr::new(a, b, c, first),
            last: Ipv4Addr::new(w, x, y, last),
        },
        _ => HostRange::Unavailable,
    }
}

fn device_node(id: &str, kind: DeviceType, title: &str, bom: &[BillOfMaterialsLine]) -> TopologyNode {
    let label = match bom.iter().find(|l| l.device_type == kind) {
        Some(line) if !line.model.is_empty() => format!("{} ({})", title, line.model),
        _ => title.to_string(),
    };
    TopologyNode {
        id: id.to_string(),
        kind,
        label,
        department: None,
        host_range: None,
    }
}

fn access_node(
    id: &str,
    kind: DeviceType,
    title: &str,
    dept: &str,
    range: &HostRange,
    bom: &[BillOfMaterialsLine],
) -> TopologyNode {
    let mut node = device_node(id, kind, title, bom);
    node.department = Some(dept.to_string());
    node.host_range = Some(range.clone());
    node
}

fn link(graph: &mut TopologyGraph, from: &str, to: &str) {
    graph.edges.push(TopologyEdge {
        from: from.to_string(),
        to: to.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{aggregate_hosts, allocate_subnets, fixtures::department};

    fn edges(graph: &TopologyGraph) -> Vec<(&str, &str)> {
        graph.edges.iter().map(|e| (e.from.as_str(), e.to.as_str())).collect()
    }

    #[test]
    fn test_layered_graph_shape() {
        let summaries = aggregate_hosts(&[
            department("Library", &[(5, 0)]),
            department("Lab", &[(0, 40)]),
            department("Office", &[(3, 3)]),
        ]);
        let subnets = allocate_subnets(&summaries).unwrap();
        let graph = synthesize_topology(&summaries, &[], &subnets);

        assert_eq!(
            edges(&graph),
            vec![
                ("router", "core-switch"),
                ("core-switch", "dist-1"),
                ("dist-1", "access-1"),
                ("core-switch", "dist-2"),
                ("dist-2", "ap-2"),
                ("core-switch", "dist-3"),
                ("dist-3", "access-3"),
                ("dist-3", "ap-3"),
            ]
        );
        assert!(graph.node("ap-1").is_none());
        assert!(graph.node("access-2").is_none());
    }

    #[test]
    fn test_host_ranges_follow_subnets() {
        let summaries = aggregate_hosts(&[department("Library", &[(5, 0)])]);
        let subnets = allocate_subnets(&summaries).unwrap();
        let graph = synthesize_topology(&summaries, &[], &subnets);

        let access = graph.node("access-1").unwrap();
        assert_eq!(
            access.host_range,
            Some(HostRange::Range {
                first: Ipv4Addr::new(10, 10, 1, 1),
                last: Ipv4Addr::new(10, 10, 1, 30),
            })
        );
        assert!(access.label.contains("10.10.1.1 - 10.10.1.30"));
    }

    #[test]
    fn test_missing_subnet_degrades_single_node() {
        let summaries = aggregate_hosts(&[department("A", &[(5, 0)]), department("B", &[(5, 0)])]);
        let mut subnets = allocate_subnets(&summaries).unwrap();
        subnets.retain(|s| s.department_name != "A");
        let graph = synthesize_topology(&summaries, &[], &subnets);

        assert_eq!(graph.node("access-1").unwrap().host_range, Some(HostRange::Unavailable));
        assert!(graph.node("access-1").unwrap().label.contains("range unavailable"));
        assert!(matches!(
            graph.node("access-2").unwrap().host_range,
            Some(HostRange::Range { .. })
        ));
    }

    #[test]
    fn test_tiny_block_yields_empty_range() {
        let subnet = SubnetAssignment {
            vlan_id: 10,
            department_name: "P2P".to_string(),
            cidr_block: "10.10.1.0/31".parse().unwrap(),
            required_host_count: 0,
        };
        assert_eq!(host_range(Some(&subnet)), HostRange::Empty);
    }

    #[test]
    fn test_department_named_management_uses_its_own_block() {
        let summaries = aggregate_hosts(&[department("Management", &[(5, 0)])]);
        let subnets = allocate_subnets(&summaries).unwrap();
        let graph = synthesize_topology(&summaries, &[], &subnets);
        assert_eq!(
            graph.node("access-1").unwrap().host_range,
            Some(HostRange::Range {
                first: Ipv4Addr::new(10, 10, 1, 1),
                last: Ipv4Addr::new(10, 10, 1, 30),
            })
        );
    }

    #[test]
    fn test_labels_carry_selected_models() {
        let summaries = aggregate_hosts(&[department("A", &[(1, 0)])]);
        let subnets = allocate_subnets(&summaries).unwrap();
        let bom = vec![BillOfMaterialsLine {
            device_id: "rtr-1".to_string(),
            device_type: DeviceType::Router,
            model: "ISR4331".to_string(),
            quantity: 1,
            unit_price: 1.0,
            total_cost: 1.0,
        }];
        let graph = synthesize_topology(&summaries, &bom, &subnets);
        assert_eq!(graph.node("router").unwrap().label, "Router (ISR4331)");
        assert_eq!(graph.node("core-switch").unwrap().label, "Core Switch");
    }
}

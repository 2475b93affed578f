//! Resource-constrained search over the system-connection graph.
//!
//! Edge weight is fuel cost; hop duration is derived from fuel cost and ship
//! speed. Both searches relax on cumulative fuel with ties broken by fewer
//! hops, so the returned routes are the cheapest a ship can actually afford.

use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap};

use contracts::Connection;

/// Speed at which `hop_duration` matches the unparameterized baseline.
pub const REFERENCE_SPEED: i64 = 5;

/// Adjacency view of the (bidirectional) jump-lane graph.
#[derive(Debug, Clone, Default)]
pub struct Galaxy {
    adjacency: HashMap<String, Vec<(String, i64)>>,
}

impl Galaxy {
    pub fn from_connections(connections: &[Connection]) -> Self {
        let mut adjacency: HashMap<String, Vec<(String, i64)>> = HashMap::new();
        for connection in connections {
            adjacency
                .entry(connection.from_system_id.clone())
                .or_default()
                .push((connection.to_system_id.clone(), connection.fuel_cost));
            adjacency
                .entry(connection.to_system_id.clone())
                .or_default()
                .push((connection.from_system_id.clone(), connection.fuel_cost));
        }
        Self { adjacency }
    }

    pub fn contains(&self, system_id: &str) -> bool {
        self.adjacency.contains_key(system_id)
    }

    pub fn neighbors(&self, system_id: &str) -> &[(String, i64)] {
        self.adjacency
            .get(system_id)
            .map(|edges| edges.as_slice())
            .unwrap_or(&[])
    }

    /// Fuel cost of the direct lane between two systems, if one exists.
    pub fn lane_cost(&self, from: &str, to: &str) -> Option<i64> {
        self.neighbors(from)
            .iter()
            .find(|(neighbor, _)| neighbor == to)
            .map(|(_, cost)| *cost)
    }
}

/// Ticks to traverse one hop at the reference speed.
pub fn hop_duration(fuel_cost: i64) -> u64 {
    hop_duration_at_speed(fuel_cost, REFERENCE_SPEED)
}

/// Ticks to traverse one hop: `max(1, ceil(fuel_cost/2 × reference/speed))`.
/// Faster ships take proportionally fewer ticks; never below one tick.
pub fn hop_duration_at_speed(fuel_cost: i64, speed: i64) -> u64 {
    let speed = if speed > 0 { speed } else { REFERENCE_SPEED };
    let fuel_cost = fuel_cost.max(0);
    let numerator = fuel_cost * REFERENCE_SPEED;
    let denominator = 2 * speed;
    let duration = (numerator + denominator - 1) / denominator;
    duration.max(1) as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reach {
    pub fuel_used: i64,
    pub arrival_offset: u64,
    pub hops: u32,
}

/// Every system reachable within `fuel_budget`, with the fuel spent and the
/// tick offset of arrival along the cheapest route. Dijkstra relaxation on
/// cumulative fuel; ties broken by fewer hops. The origin is included at
/// zero cost.
pub fn reachable_systems(
    galaxy: &Galaxy,
    origin: &str,
    fuel_budget: i64,
    speed: i64,
) -> HashMap<String, Reach> {
    let mut best: HashMap<String, Reach> = HashMap::new();
    if !galaxy.contains(origin) {
        return best;
    }

    let mut heap: BinaryHeap<Reverse<(i64, u32, u64, String)>> = BinaryHeap::new();
    heap.push(Reverse((0, 0, 0, origin.to_string())));

    while let Some(Reverse((fuel_used, hops, offset, system_id))) = heap.pop() {
        match best.entry(system_id.clone()) {
            Entry::Occupied(existing) => {
                let seen = existing.get();
                if (seen.fuel_used, seen.hops) <= (fuel_used, hops) {
                    continue;
                }
                // A strictly better route surfaced; fall through and relax.
            }
            Entry::Vacant(_) => {}
        }
        best.insert(
            system_id.clone(),
            Reach {
                fuel_used,
                arrival_offset: offset,
                hops,
            },
        );

        for (neighbor, lane_cost) in galaxy.neighbors(&system_id) {
            let next_fuel = fuel_used + lane_cost;
            if next_fuel > fuel_budget {
                continue;
            }
            let next = (
                next_fuel,
                hops + 1,
                offset + hop_duration_at_speed(*lane_cost, speed),
                neighbor.clone(),
            );
            let improves = match best.get(neighbor) {
                Some(seen) => (next.0, next.1) < (seen.fuel_used, seen.hops),
                None => true,
            };
            if improves {
                heap.push(Reverse(next));
            }
        }
    }

    best
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPlan {
    pub path: Vec<String>,
    pub total_fuel_cost: i64,
    pub total_duration: u64,
}

/// Cheapest-fuel path between two systems; `None` if unreachable.
pub fn shortest_path(
    galaxy: &Galaxy,
    origin: &str,
    destination: &str,
    speed: i64,
) -> Option<PathPlan> {
    if !galaxy.contains(origin) || !galaxy.contains(destination) {
        return None;
    }
    if origin == destination {
        return Some(PathPlan {
            path: vec![origin.to_string()],
            total_fuel_cost: 0,
            total_duration: 0,
        });
    }

    let mut best: HashMap<String, (i64, u32)> = HashMap::new();
    let mut previous: HashMap<String, String> = HashMap::new();
    let mut heap: BinaryHeap<Reverse<(i64, u32, String)>> = BinaryHeap::new();

    best.insert(origin.to_string(), (0, 0));
    heap.push(Reverse((0, 0, origin.to_string())));

    while let Some(Reverse((fuel_used, hops, system_id))) = heap.pop() {
        if let Some(&(seen_fuel, seen_hops)) = best.get(&system_id) {
            if (seen_fuel, seen_hops) < (fuel_used, hops) {
                continue;
            }
        }
        if system_id == destination {
            break;
        }

        for (neighbor, lane_cost) in galaxy.neighbors(&system_id) {
            let candidate = (fuel_used + lane_cost, hops + 1);
            let improves = match best.get(neighbor) {
                Some(seen) => candidate < *seen,
                None => true,
            };
            if improves {
                best.insert(neighbor.clone(), candidate);
                previous.insert(neighbor.clone(), system_id.clone());
                heap.push(Reverse((candidate.0, candidate.1, neighbor.clone())));
            }
        }
    }

    let (total_fuel_cost, _) = *best.get(destination)?;

    let mut path = vec![destination.to_string()];
    while let Some(parent) = previous.get(path.last().map(String::as_str)?) {
        path.push(parent.clone());
    }
    path.reverse();
    if path.first().map(String::as_str) != Some(origin) {
        return None;
    }

    let total_duration = path
        .windows(2)
        .map(|pair| {
            let lane_cost = galaxy.lane_cost(&pair[0], &pair[1]).unwrap_or(0);
            hop_duration_at_speed(lane_cost, speed)
        })
        .sum();

    Some(PathPlan {
        path,
        total_fuel_cost,
        total_duration,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteCost {
    pub total_fuel_cost: i64,
    pub total_duration: u64,
}

/// Fuel and duration of an explicit multi-hop route, or `None` if any
/// consecutive pair is not connected.
pub fn route_cost(galaxy: &Galaxy, route: &[String], speed: i64) -> Option<RouteCost> {
    let mut total_fuel_cost = 0;
    let mut total_duration = 0;
    for pair in route.windows(2) {
        let lane_cost = galaxy.lane_cost(&pair[0], &pair[1])?;
        total_fuel_cost += lane_cost;
        total_duration += hop_duration_at_speed(lane_cost, speed);
    }
    Some(RouteCost {
        total_fuel_cost,
        total_duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(id: &str, from: &str, to: &str, fuel_cost: i64) -> Connection {
        Connection {
            connection_id: id.into(),
            from_system_id: from.into(),
            to_system_id: to.into(),
            fuel_cost,
        }
    }

    /// sol -10- vega -10- rigel, plus a 25-cost direct lane sol-rigel and a
    /// dead-end altair only reachable from rigel.
    fn test_galaxy() -> Galaxy {
        Galaxy::from_connections(&[
            connection("c1", "sol", "vega", 10),
            connection("c2", "vega", "rigel", 10),
            connection("c3", "sol", "rigel", 25),
            connection("c4", "rigel", "altair", 8),
        ])
    }

    #[test]
    fn hop_duration_without_speed_matches_reference_speed() {
        assert_eq!(hop_duration(10), hop_duration_at_speed(10, REFERENCE_SPEED));
        assert_eq!(hop_duration(10), 5);
    }

    #[test]
    fn faster_ship_takes_strictly_fewer_ticks() {
        let reference = hop_duration_at_speed(10, REFERENCE_SPEED);
        let fast = hop_duration_at_speed(10, 8);
        assert!(fast < reference, "{fast} should be < {reference}");
    }

    #[test]
    fn hop_duration_never_below_one_tick() {
        assert_eq!(hop_duration_at_speed(1, 100), 1);
        assert_eq!(hop_duration_at_speed(0, 5), 1);
    }

    #[test]
    fn nonpositive_speed_falls_back_to_reference() {
        assert_eq!(hop_duration_at_speed(10, 0), hop_duration(10));
        assert_eq!(hop_duration_at_speed(10, -3), hop_duration(10));
    }

    #[test]
    fn reachable_respects_fuel_budget() {
        let galaxy = test_galaxy();
        let reach = reachable_systems(&galaxy, "sol", 15, REFERENCE_SPEED);

        assert!(reach.contains_key("sol"));
        assert!(reach.contains_key("vega"));
        assert!(
            !reach.contains_key("rigel"),
            "rigel costs 20 via vega and 25 direct; budget is 15"
        );
        assert_eq!(reach["vega"].fuel_used, 10);
    }

    #[test]
    fn reachable_prefers_cheaper_route_over_direct_lane() {
        let galaxy = test_galaxy();
        let reach = reachable_systems(&galaxy, "sol", 100, REFERENCE_SPEED);

        // Two hops of 10 beat the 25-cost direct lane.
        assert_eq!(reach["rigel"].fuel_used, 20);
        assert_eq!(reach["rigel"].hops, 2);
        assert_eq!(reach["altair"].fuel_used, 28);
    }

    #[test]
    fn reachable_origin_is_free() {
        let galaxy = test_galaxy();
        let reach = reachable_systems(&galaxy, "sol", 0, REFERENCE_SPEED);
        assert_eq!(reach.len(), 1);
        assert_eq!(reach["sol"].fuel_used, 0);
        assert_eq!(reach["sol"].arrival_offset, 0);
    }

    #[test]
    fn shortest_path_finds_cheapest_fuel_route() {
        let galaxy = test_galaxy();
        let plan = shortest_path(&galaxy, "sol", "rigel", REFERENCE_SPEED).expect("reachable");
        assert_eq!(plan.path, vec!["sol", "vega", "rigel"]);
        assert_eq!(plan.total_fuel_cost, 20);
        assert_eq!(plan.total_duration, 10);
    }

    #[test]
    fn shortest_path_to_unreachable_system_is_none() {
        let galaxy = test_galaxy();
        assert!(shortest_path(&galaxy, "sol", "nowhere", REFERENCE_SPEED).is_none());

        let disconnected = Galaxy::from_connections(&[
            connection("c1", "sol", "vega", 10),
            connection("c2", "rigel", "altair", 5),
        ]);
        assert!(shortest_path(&disconnected, "sol", "altair", REFERENCE_SPEED).is_none());
    }

    #[test]
    fn shortest_path_same_system_is_trivial() {
        let galaxy = test_galaxy();
        let plan = shortest_path(&galaxy, "sol", "sol", REFERENCE_SPEED).expect("trivial");
        assert_eq!(plan.path, vec!["sol"]);
        assert_eq!(plan.total_fuel_cost, 0);
        assert_eq!(plan.total_duration, 0);
    }

    #[test]
    fn route_cost_rejects_broken_routes() {
        let galaxy = test_galaxy();
        let route: Vec<String> = vec!["sol".into(), "altair".into()];
        assert!(route_cost(&galaxy, &route, REFERENCE_SPEED).is_none());
    }

    #[test]
    fn route_cost_sums_lanes_and_durations() {
        let galaxy = test_galaxy();
        let route: Vec<String> = vec!["sol".into(), "vega".into(), "rigel".into()];
        let cost = route_cost(&galaxy, &route, REFERENCE_SPEED).expect("connected route");
        assert_eq!(cost.total_fuel_cost, 20);
        assert_eq!(cost.total_duration, 10);
    }

    #[test]
    fn faster_ship_shortens_whole_route() {
        let galaxy = test_galaxy();
        let route: Vec<String> = vec!["sol".into(), "vega".into(), "rigel".into()];
        let slow = route_cost(&galaxy, &route, REFERENCE_SPEED).expect("route");
        let fast = route_cost(&galaxy, &route, 8).expect("route");
        assert!(fast.total_duration < slow.total_duration);
        assert_eq!(fast.total_fuel_cost, slow.total_fuel_cost);
    }
}

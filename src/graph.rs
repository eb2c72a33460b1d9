use std::collections::{BTreeSet, HashMap};

use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::models::Distance;

/// One undirected road segment between two named locations.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Route {
    pub from: String,
    pub to: String,
    pub km: i64,
}

impl Route {
    pub fn new(from: &str, to: &str, km: i64) -> Self {
        Route {
            from: from.to_string(),
            to: to.to_string(),
            km,
        }
    }
}

/// Weighted location graph, immutable once built.
///
/// Nodes are added in sorted name order, so node indices are stable for a
/// given set of routes.
#[derive(Debug, Clone)]
pub struct CampusGraph {
    graph: UnGraph<String, u64>,
    origin: NodeIndex,
    index: HashMap<String, NodeIndex>,
    from_origin: HashMap<NodeIndex, u64>,
}

impl CampusGraph {
    pub fn build(origin: &str, routes: &[Route]) -> Result<Self> {
        let origin = origin.trim();
        if origin.is_empty() {
            return Err(EngineError::InvalidGraph("origin name is empty".to_string()));
        }

        let mut names: BTreeSet<&str> = BTreeSet::new();
        names.insert(origin);
        for route in routes {
            let (from, to) = (route.from.trim(), route.to.trim());
            if from.is_empty() || to.is_empty() {
                return Err(EngineError::InvalidGraph(format!(
                    "route '{}' -> '{}' has an empty endpoint",
                    route.from, route.to
                )));
            }
            if route.km < 0 {
                return Err(EngineError::InvalidGraph(format!(
                    "route {from} -> {to} has negative weight {}",
                    route.km
                )));
            }
            names.insert(from);
            names.insert(to);
        }

        let mut graph = UnGraph::with_capacity(names.len(), routes.len());
        let mut index: HashMap<String, NodeIndex> = HashMap::with_capacity(names.len());
        for name in names {
            index.insert(name.to_string(), graph.add_node(name.to_string()));
        }

        for route in routes {
            let a = index[route.from.trim()];
            let b = index[route.to.trim()];
            graph.add_edge(a, b, route.km.unsigned_abs());
        }

        let origin_node = index[origin];
        if graph.neighbors(origin_node).next().is_none() {
            warn!(origin, "origin has no routes; every other location is unreachable");
        }

        let from_origin = dijkstra(&graph, origin_node, None, |edge| *edge.weight());

        info!(
            origin,
            locations = graph.node_count(),
            routes = graph.edge_count(),
            "campus graph built"
        );
        Ok(CampusGraph {
            graph,
            origin: origin_node,
            index,
            from_origin,
        })
    }

    pub fn origin(&self) -> &str {
        &self.graph[self.origin]
    }

    /// Location names in sorted order.
    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    /// Cached distance from the origin to `target`.
    pub fn distance_from_origin(&self, target: &str) -> Result<Distance> {
        let target = self.node(target)?;
        Ok(to_distance(self.from_origin.get(&target).copied()))
    }

    pub fn shortest_distance(&self, from: &str, to: &str) -> Result<Distance> {
        let source = self.node(from)?;
        let target = self.node(to)?;
        if source == self.origin {
            return Ok(to_distance(self.from_origin.get(&target).copied()));
        }
        let reached = dijkstra(&self.graph, source, Some(target), |edge| *edge.weight());
        Ok(to_distance(reached.get(&target).copied()))
    }

    fn node(&self, name: &str) -> Result<NodeIndex> {
        self.index.get(name.trim()).copied().ok_or_else(|| {
            EngineError::InvalidGraph(format!("unknown location '{}'", name.trim()))
        })
    }
}

fn to_distance(km: Option<u64>) -> Distance {
    km.map_or(Distance::Unreachable, Distance::Km)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> CampusGraph {
        let routes = vec![
            Route::new("Campus", "CityA", 12),
            Route::new("Campus", "CityB", 5),
            Route::new("CityB", "CityA", 4),
            Route::new("CityA", "CityC", 30),
            Route::new("CityB", "CityC", 50),
            Route::new("Island", "Reef", 3),
        ];
        CampusGraph::build("Campus", &routes).unwrap()
    }

    #[test]
    fn picks_the_shorter_of_two_paths() {
        let graph = sample_graph();
        assert_eq!(graph.distance_from_origin("CityA").unwrap(), Distance::Km(9));
        assert_eq!(graph.distance_from_origin("CityC").unwrap(), Distance::Km(39));
        assert_eq!(graph.distance_from_origin("Campus").unwrap(), Distance::Km(0));
    }

    #[test]
    fn direct_route_distance() {
        let graph = CampusGraph::build("Campus", &[Route::new("Campus", "CityA", 12)]).unwrap();
        assert_eq!(graph.distance_from_origin("CityA").unwrap(), Distance::Km(12));
    }

    #[test]
    fn disconnected_location_is_unreachable() {
        let graph = sample_graph();
        assert_eq!(
            graph.distance_from_origin("Island").unwrap(),
            Distance::Unreachable
        );
        assert_eq!(
            graph.shortest_distance("Island", "Reef").unwrap(),
            Distance::Km(3)
        );
    }

    #[test]
    fn unknown_location_is_an_invalid_reference() {
        let graph = sample_graph();
        assert!(matches!(
            graph.distance_from_origin("Atlantis"),
            Err(EngineError::InvalidGraph(_))
        ));
    }

    #[test]
    fn negative_weight_is_rejected_at_build() {
        let routes = vec![Route::new("Campus", "CityA", -1)];
        assert!(matches!(
            CampusGraph::build("Campus", &routes),
            Err(EngineError::InvalidGraph(_))
        ));
    }

    #[test]
    fn origin_without_routes_still_builds() {
        let graph = CampusGraph::build("Campus", &[]).unwrap();
        assert_eq!(graph.origin(), "Campus");
        assert_eq!(graph.locations().count(), 1);
    }

    #[test]
    fn locations_come_out_sorted() {
        let graph = sample_graph();
        let names: Vec<&str> = graph.locations().collect();
        assert_eq!(
            names,
            vec!["Campus", "CityA", "CityB", "CityC", "Island", "Reef"]
        );
    }

    #[test]
    fn zero_length_route_is_allowed() {
        let routes = vec![Route::new("Campus", "Gate", 0), Route::new("Gate", "CityA", 7)];
        let graph = CampusGraph::build("Campus", &routes).unwrap();
        assert_eq!(graph.distance_from_origin("Gate").unwrap(), Distance::Km(0));
        assert_eq!(graph.distance_from_origin("CityA").unwrap(), Distance::Km(7));
    }

    #[test]
    fn distances_are_symmetric() {
        let graph = sample_graph();
        let names: Vec<String> = graph.locations().map(str::to_string).collect();
        for a in &names {
            for b in &names {
                assert_eq!(
                    graph.shortest_distance(a, b).unwrap(),
                    graph.shortest_distance(b, a).unwrap(),
                    "{a} <-> {b}"
                );
            }
        }
    }

    #[test]
    fn distances_satisfy_triangle_inequality() {
        let graph = sample_graph();
        let names: Vec<String> = graph.locations().map(str::to_string).collect();
        for a in &names {
            for b in &names {
                for c in &names {
                    let ab = graph.shortest_distance(a, b).unwrap();
                    let bc = graph.shortest_distance(b, c).unwrap();
                    let ac = graph.shortest_distance(a, c).unwrap();
                    if let (Distance::Km(ab), Distance::Km(bc)) = (ab, bc) {
                        match ac {
                            Distance::Km(ac) => assert!(ac <= ab + bc, "{a} {b} {c}"),
                            Distance::Unreachable => panic!("{a} -> {c} should be reachable"),
                        }
                    }
                }
            }
        }
    }
}

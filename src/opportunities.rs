use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::graph::CampusGraph;
use crate::models::{Cgpa, Opportunity, OpportunityType};

const KIND: &str = "opportunity id";

/// An opportunity before its distance is known.
#[derive(Debug, Clone)]
pub struct OpportunityDraft {
    pub opp_id: String,
    pub title: String,
    pub kind: OpportunityType,
    pub min_cgpa: Cgpa,
    pub link: String,
    pub details: String,
    pub location: String,
}

#[derive(Debug, Default, Clone)]
pub struct OpportunityIndex {
    records: HashMap<String, Opportunity>,
    order: Vec<String>,
}

impl OpportunityIndex {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn contains(&self, opp_id: &str) -> bool {
        self.records.contains_key(opp_id)
    }

    /// Resolves the location against the graph and stores the result. The
    /// distance is fixed from here on.
    pub fn insert(&mut self, draft: OpportunityDraft, graph: &CampusGraph) -> Result<&Opportunity> {
        if self.contains(&draft.opp_id) {
            return Err(EngineError::duplicate(KIND, draft.opp_id));
        }
        let distance_km = graph.distance_from_origin(&draft.location)?;
        self.insert_resolved(Opportunity {
            opp_id: draft.opp_id,
            title: draft.title,
            kind: draft.kind,
            min_cgpa: draft.min_cgpa,
            link: draft.link,
            details: draft.details,
            location: draft.location,
            distance_km,
        })
    }

    /// Stores a record whose distance was already computed, as when
    /// reloading persisted rows.
    pub fn insert_resolved(&mut self, opportunity: Opportunity) -> Result<&Opportunity> {
        if self.contains(&opportunity.opp_id) {
            return Err(EngineError::duplicate(KIND, opportunity.opp_id));
        }
        let opp_id = opportunity.opp_id.clone();
        self.order.push(opp_id.clone());
        Ok(self.records.entry(opp_id).or_insert(opportunity))
    }

    pub fn remove(&mut self, opp_id: &str) -> Option<Opportunity> {
        let removed = self.records.remove(opp_id)?;
        self.order.retain(|id| id != opp_id);
        Some(removed)
    }

    pub fn get(&self, opp_id: &str) -> Option<&Opportunity> {
        self.records.get(opp_id)
    }

    /// Every opportunity in the order it was posted.
    pub fn all(&self) -> Vec<&Opportunity> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    pub fn eligible_for(&self, cgpa: Cgpa) -> Vec<&Opportunity> {
        self.all()
            .into_iter()
            .filter(|opportunity| opportunity.is_open_to(cgpa))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Route;
    use crate::models::Distance;

    fn graph() -> CampusGraph {
        let routes = vec![
            Route::new("Namal", "CityA", 12),
            Route::new("Namal", "CityB", 40),
            Route::new("Skardu", "Gilgit", 200),
        ];
        CampusGraph::build("Namal", &routes).unwrap()
    }

    fn draft(opp_id: &str, min_cgpa: f64, location: &str) -> OpportunityDraft {
        OpportunityDraft {
            opp_id: opp_id.to_string(),
            title: format!("Role {opp_id}"),
            kind: OpportunityType::Internship,
            min_cgpa: Cgpa::new(min_cgpa).unwrap(),
            link: "https://careers.example.com".to_string(),
            details: String::new(),
            location: location.to_string(),
        }
    }

    #[test]
    fn insert_caches_distance_from_origin() {
        let graph = graph();
        let mut index = OpportunityIndex::default();
        index.insert(draft("OPP1", 3.0, "CityA"), &graph).unwrap();
        index.insert(draft("OPP2", 2.0, "Gilgit"), &graph).unwrap();

        assert_eq!(index.get("OPP1").unwrap().distance_km, Distance::Km(12));
        assert_eq!(index.get("OPP2").unwrap().distance_km, Distance::Unreachable);
    }

    #[test]
    fn duplicate_and_unknown_location_leave_index_untouched() {
        let graph = graph();
        let mut index = OpportunityIndex::default();
        index.insert(draft("OPP1", 3.0, "CityA"), &graph).unwrap();

        assert!(matches!(
            index.insert(draft("OPP1", 1.0, "CityB"), &graph),
            Err(EngineError::DuplicateKey { .. })
        ));
        assert!(matches!(
            index.insert(draft("OPP9", 1.0, "Atlantis"), &graph),
            Err(EngineError::InvalidGraph(_))
        ));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("OPP1").unwrap().location, "CityA");
    }

    #[test]
    fn all_keeps_posting_order() {
        let graph = graph();
        let mut index = OpportunityIndex::default();
        for id in ["OPP3", "OPP1", "OPP2"] {
            index.insert(draft(id, 2.0, "CityB"), &graph).unwrap();
        }
        let ids: Vec<&str> = index.all().iter().map(|o| o.opp_id.as_str()).collect();
        assert_eq!(ids, vec!["OPP3", "OPP1", "OPP2"]);

        index.remove("OPP1");
        let ids: Vec<&str> = index.all().iter().map(|o| o.opp_id.as_str()).collect();
        assert_eq!(ids, vec!["OPP3", "OPP2"]);
    }

    #[test]
    fn eligibility_is_inclusive() {
        let graph = graph();
        let mut index = OpportunityIndex::default();
        index.insert(draft("OPP1", 3.0, "CityA"), &graph).unwrap();
        index.insert(draft("OPP2", 3.5, "CityB"), &graph).unwrap();

        let open: Vec<&str> = index
            .eligible_for(Cgpa::new(3.0).unwrap())
            .iter()
            .map(|o| o.opp_id.as_str())
            .collect();
        assert_eq!(open, vec!["OPP1"]);
        assert_eq!(index.eligible_for(Cgpa::new(4.0).unwrap()).len(), 2);
    }
}

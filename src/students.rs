//! Student records with three synchronized views.
//!
//! `records` is the arena and the only place non-key fields live. The
//! ordered index and the rank heap hold `(cgpa, reg_no)` keys pointing back
//! into it. Every mutation touches all three or none of them.

use std::collections::{BTreeSet, HashMap};

use crate::error::{EngineError, Result};
use crate::heap::{RankHeap, RankKey};
use crate::models::{Cgpa, Student};

const KIND: &str = "registration number";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Default, Clone)]
pub struct StudentIndex {
    records: HashMap<String, Student>,
    ordered: BTreeSet<RankKey>,
    ranked: RankHeap,
}

impl StudentIndex {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, reg_no: &str) -> bool {
        self.records.contains_key(reg_no)
    }

    pub fn insert(&mut self, student: Student) -> Result<()> {
        if self.records.contains_key(&student.reg_no) {
            return Err(EngineError::duplicate(KIND, student.reg_no));
        }
        let key = RankKey::new(student.cgpa, &student.reg_no);
        self.ordered.insert(key.clone());
        self.ranked.push(key);
        self.records.insert(student.reg_no.clone(), student);
        Ok(())
    }

    /// Sets a new cgpa and returns the one it replaced, which is appended
    /// to the history.
    pub fn update_cgpa(&mut self, reg_no: &str, new_cgpa: f64) -> Result<Cgpa> {
        let Some(record) = self.records.get_mut(reg_no) else {
            return Err(EngineError::not_found("student", reg_no));
        };
        let new_cgpa = Cgpa::new(new_cgpa)?;
        let old_cgpa = record.cgpa;

        self.ordered.remove(&RankKey::new(old_cgpa, reg_no));
        self.ranked.remove(reg_no);

        record.gpa_history.push(old_cgpa);
        record.cgpa = new_cgpa;

        let key = RankKey::new(new_cgpa, reg_no);
        self.ordered.insert(key.clone());
        self.ranked.push(key);
        Ok(old_cgpa)
    }

    /// Drops a record from all three views. Used to undo a transaction.
    pub fn remove(&mut self, reg_no: &str) -> Option<Student> {
        let student = self.records.remove(reg_no)?;
        self.ordered.remove(&RankKey::new(student.cgpa, reg_no));
        self.ranked.remove(reg_no);
        Some(student)
    }

    pub fn get(&self, reg_no: &str) -> Option<&Student> {
        self.records.get(reg_no)
    }

    /// In-order walk of the ordered index. Descending lists equal cgpa by
    /// ascending reg_no; ascending is its exact reverse.
    pub fn sorted_by_cgpa(&self, order: SortOrder) -> Vec<&Student> {
        match order {
            SortOrder::Ascending => self.resolve(self.ordered.iter()),
            SortOrder::Descending => self.resolve(self.ordered.iter().rev()),
        }
    }

    /// Students with cgpa at or above `min_cgpa`, best first.
    pub fn at_least(&self, min_cgpa: f64) -> Vec<&Student> {
        self.resolve(
            self.ordered
                .iter()
                .rev()
                .take_while(|key| key.cgpa.value() >= min_cgpa),
        )
    }

    /// The `k` best students, read from the rank heap. Ties follow the same
    /// rule as `sorted_by_cgpa(Descending)`.
    pub fn top_k(&self, k: usize) -> Vec<&Student> {
        self.resolve(self.ranked.top_k(k).into_iter())
    }

    fn resolve<'a>(&'a self, keys: impl Iterator<Item = &'a RankKey>) -> Vec<&'a Student> {
        keys.filter_map(|key| self.records.get(&key.reg_no)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Student> {
        self.records.values()
    }

    /// True when every record has exactly one matching key in each view.
    pub fn is_consistent(&self) -> bool {
        self.records.len() == self.ordered.len()
            && self.records.len() == self.ranked.len()
            && self.records.values().all(|student| {
                let key = RankKey::new(student.cgpa, &student.reg_no);
                self.ordered.contains(&key) && self.ranked.contains(&key)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(reg_no: &str, cgpa: f64) -> Student {
        Student {
            reg_no: reg_no.to_string(),
            name: format!("Student {reg_no}"),
            email: format!("{reg_no}@namal.edu.pk"),
            program: "BSCS".to_string(),
            password: "secret".to_string(),
            cgpa: Cgpa::new(cgpa).unwrap(),
            gpa_history: Vec::new(),
        }
    }

    fn sample_index() -> StudentIndex {
        let mut index = StudentIndex::default();
        for (reg_no, cgpa) in [
            ("21-1234", 3.2),
            ("21-0100", 2.5),
            ("21-0200", 3.6),
            ("21-0050", 3.2),
            ("21-0300", 1.8),
        ] {
            index.insert(student(reg_no, cgpa)).unwrap();
        }
        index
    }

    fn reg_nos(students: Vec<&Student>) -> Vec<&str> {
        students.into_iter().map(|s| s.reg_no.as_str()).collect()
    }

    #[test]
    fn views_stay_in_step_across_inserts() {
        let index = sample_index();
        assert_eq!(index.len(), 5);
        assert_eq!(index.sorted_by_cgpa(SortOrder::Ascending).len(), 5);
        assert_eq!(index.top_k(usize::MAX).len(), 5);
        assert!(index.is_consistent());
    }

    #[test]
    fn duplicate_insert_changes_nothing() {
        let mut index = sample_index();
        let err = index.insert(student("21-1234", 4.0)).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateKey { .. }));
        assert_eq!(index.len(), 5);
        assert_eq!(index.get("21-1234").unwrap().cgpa.value(), 3.2);
        assert!(index.is_consistent());
    }

    #[test]
    fn descending_order_breaks_ties_by_reg_no() {
        let index = sample_index();
        let sorted = index.sorted_by_cgpa(SortOrder::Descending);
        assert_eq!(
            reg_nos(sorted.clone()),
            vec!["21-0200", "21-0050", "21-1234", "21-0100", "21-0300"]
        );
        for pair in sorted.windows(2) {
            assert!(pair[0].cgpa >= pair[1].cgpa);
        }
    }

    #[test]
    fn ascending_is_the_reverse_of_descending() {
        let index = sample_index();
        let mut descending = reg_nos(index.sorted_by_cgpa(SortOrder::Descending));
        descending.reverse();
        assert_eq!(reg_nos(index.sorted_by_cgpa(SortOrder::Ascending)), descending);
    }

    #[test]
    fn top_k_agrees_with_sorted_order() {
        let index = sample_index();
        let sorted = reg_nos(index.sorted_by_cgpa(SortOrder::Descending));
        assert_eq!(reg_nos(index.top_k(3)), sorted[..3].to_vec());
        assert!(index.top_k(0).is_empty());
    }

    #[test]
    fn update_moves_the_key_and_records_history() {
        let mut index = sample_index();
        let old = index.update_cgpa("21-1234", 3.8).unwrap();
        assert_eq!(old.value(), 3.2);

        let record = index.get("21-1234").unwrap();
        assert_eq!(record.cgpa.value(), 3.8);
        assert_eq!(record.gpa_history.last().map(|c| c.value()), Some(3.2));

        assert_eq!(reg_nos(index.sorted_by_cgpa(SortOrder::Descending))[0], "21-1234");
        assert!(!index
            .ordered
            .contains(&RankKey::new(Cgpa::new(3.2).unwrap(), "21-1234")));
        assert_eq!(reg_nos(index.top_k(1)), vec!["21-1234"]);
        assert!(index.is_consistent());
    }

    #[test]
    fn repeated_updates_append_in_order() {
        let mut index = sample_index();
        index.update_cgpa("21-0300", 2.1).unwrap();
        index.update_cgpa("21-0300", 2.7).unwrap();
        let history: Vec<f64> = index
            .get("21-0300")
            .unwrap()
            .gpa_history
            .iter()
            .map(|c| c.value())
            .collect();
        assert_eq!(history, vec![1.8, 2.1]);
        assert_eq!(index.get("21-0300").unwrap().cgpa.value(), 2.7);
    }

    #[test]
    fn update_rejects_unknown_and_out_of_range() {
        let mut index = sample_index();
        assert!(matches!(
            index.update_cgpa("99-9999", 3.0),
            Err(EngineError::NotFound { .. })
        ));
        assert!(matches!(
            index.update_cgpa("21-1234", 4.2),
            Err(EngineError::OutOfRange { .. })
        ));
        let record = index.get("21-1234").unwrap();
        assert_eq!(record.cgpa.value(), 3.2);
        assert!(record.gpa_history.is_empty());
        assert!(index.is_consistent());
    }

    #[test]
    fn at_least_stops_at_threshold() {
        let index = sample_index();
        assert_eq!(
            reg_nos(index.at_least(3.2)),
            vec!["21-0200", "21-0050", "21-1234"]
        );
        assert!(index.at_least(3.7).is_empty());
        assert_eq!(index.at_least(0.0).len(), 5);
    }

    #[test]
    fn remove_clears_every_view() {
        let mut index = sample_index();
        let removed = index.remove("21-0200").unwrap();
        assert_eq!(removed.reg_no, "21-0200");
        assert_eq!(index.len(), 4);
        assert!(index.is_consistent());
        assert!(index.remove("21-0200").is_none());
    }
}

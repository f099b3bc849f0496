use std::collections::BTreeSet;

use crate::models::Relation;

/// Read-only view over the stored family relations
#[derive(Debug, Clone, Copy)]
pub struct RelationGraph<'a> {
    relations: &'a [Relation],
}

impl<'a> RelationGraph<'a> {
    pub fn new(relations: &'a [Relation]) -> Self {
        Self { relations }
    }

    pub fn are_related(&self, first: i64, second: i64) -> bool {
        self.relations
            .iter()
            .any(|r| r.other(first) == Some(second))
    }

    /// Members sharing a relation with `member_id`, ordered by id
    pub fn relatives(&self, member_id: i64) -> Vec<i64> {
        self.relations
            .iter()
            .filter_map(|r| r.other(member_id))
            .filter(|&other| other != member_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The member together with all its relatives
    fn family(&self, member_id: i64) -> BTreeSet<i64> {
        let mut family: BTreeSet<i64> = self.relatives(member_id).into_iter().collect();
        family.insert(member_id);
        family
    }

    /// Relations to insert so that `first` and `second` become related
    ///
    /// Relationship is transitive: both families are merged, so every member
    /// of one family ends up related to every member of the other. Returns
    /// an empty list if the two are already related or identical.
    pub fn plan_make_relation(&self, first: i64, second: i64) -> Vec<Relation> {
        if first == second || self.are_related(first, second) {
            return Vec::new();
        }

        let first_family = self.family(first);
        let second_family = self.family(second);

        let mut planned = Vec::new();
        for &a in &first_family {
            for &b in &second_family {
                if a != b && !self.are_related(a, b) {
                    let relation = Relation::normalized(a, b);
                    if !planned.contains(&relation) {
                        planned.push(relation);
                    }
                }
            }
        }

        planned
    }
}

/// Apply `plan_make_relation` to an owned relation list
pub fn make_relation(relations: &mut Vec<Relation>, first: i64, second: i64) -> Vec<Relation> {
    let planned = RelationGraph::new(relations).plan_make_relation(first, second);
    relations.extend(planned.iter().copied());
    planned
}

/// Remove the relation between exactly these two members
pub fn drop_relation(relations: &mut Vec<Relation>, first: i64, second: i64) -> bool {
    let before = relations.len();
    relations.retain(|r| r.other(first) != Some(second));
    relations.len() != before
}

/// Remove every relation of `member_id`
pub fn clear_relations(relations: &mut Vec<Relation>, member_id: i64) -> usize {
    let before = relations.len();
    relations.retain(|r| !r.involves(member_id));
    before - relations.len()
}

/// Replace the relatives of `member_id`
pub fn set_relatives(relations: &mut Vec<Relation>, member_id: i64, relatives: &[i64]) {
    clear_relations(relations, member_id);
    for &relative in relatives {
        make_relation(relations, member_id, relative);
    }
}

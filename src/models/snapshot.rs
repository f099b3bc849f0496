use std::collections::{BTreeMap, HashMap};

use crate::models::{
    Amount, FeeOverride, FixedCost, Member, OneTimeFee, Participation, Relation, Trainer,
    TrainingSession,
};

/// In-memory view of the club data the fee and tally rules work on
///
/// Loaded in one go from the database; the business rules never query
/// the database themselves.
#[derive(Debug, Clone, Default)]
pub struct ClubSnapshot {
    members: BTreeMap<i64, Member>,
    sessions: BTreeMap<i64, TrainingSession>,
    participations: Vec<Participation>,
    trainers: Vec<Trainer>,
    relations: Vec<Relation>,
    fixed_costs: HashMap<String, Amount>,
    one_time_fees: Vec<OneTimeFee>,
    fee_overrides: HashMap<i64, Amount>,
}

impl ClubSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.add_member(member);
        self
    }

    pub fn with_session(mut self, session: TrainingSession) -> Self {
        self.add_session(session);
        self
    }

    pub fn with_fixed_cost(mut self, name: &str, cost: Amount) -> Self {
        self.fixed_costs.insert(name.to_string(), cost);
        self
    }

    pub fn add_member(&mut self, member: Member) {
        self.members.insert(member.id, member);
    }

    pub fn add_session(&mut self, session: TrainingSession) {
        self.sessions.insert(session.id, session);
    }

    pub fn add_participation(&mut self, participation: Participation) {
        self.participations.push(participation);
    }

    pub fn add_trainer(&mut self, trainer: Trainer) {
        self.trainers.push(trainer);
    }

    pub fn add_relation(&mut self, relation: Relation) {
        let relation = Relation::normalized(relation.first_id, relation.second_id);
        if !self.relations.contains(&relation) {
            self.relations.push(relation);
        }
    }

    pub fn add_fixed_cost(&mut self, cost: FixedCost) {
        self.fixed_costs.insert(cost.name, cost.cost);
    }

    pub fn add_one_time_fee(&mut self, fee: OneTimeFee) {
        self.one_time_fees.push(fee);
    }

    pub fn add_fee_override(&mut self, fee_override: FeeOverride) {
        self.fee_overrides
            .insert(fee_override.member_id, fee_override.amount);
    }

    pub fn member(&self, id: i64) -> Option<&Member> {
        self.members.get(&id)
    }

    /// Members ordered by id
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn session(&self, id: i64) -> Option<&TrainingSession> {
        self.sessions.get(&id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &TrainingSession> {
        self.sessions.values()
    }

    pub fn participations_of(&self, member_id: i64) -> impl Iterator<Item = &Participation> {
        self.participations
            .iter()
            .filter(move |p| p.member_id == member_id)
    }

    pub fn participants_of(&self, session_id: i64) -> impl Iterator<Item = &Participation> {
        self.participations
            .iter()
            .filter(move |p| p.session_id == session_id)
    }

    pub fn trained_sessions(&self, member_id: i64) -> impl Iterator<Item = &TrainingSession> {
        self.trainers
            .iter()
            .filter(move |t| t.member_id == member_id)
            .filter_map(|t| self.sessions.get(&t.session_id))
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn fixed_cost(&self, name: &str) -> Option<Amount> {
        self.fixed_costs.get(name).copied()
    }

    pub fn one_time_fees_of(&self, member_id: i64) -> impl Iterator<Item = &OneTimeFee> {
        self.one_time_fees
            .iter()
            .filter(move |f| f.member_id == member_id)
    }

    pub fn fee_override(&self, member_id: i64) -> Option<Amount> {
        self.fee_overrides.get(&member_id).copied()
    }
}

// Model exports
pub mod amount;
pub mod domain;
pub mod requests;
pub mod responses;
pub mod snapshot;

pub use amount::{Amount, AmountError};
pub use domain::{
    ArchivedOneTimeFee, FeeOverride, FixedCost, Gender, Member, OneTimeFee, Participation,
    Relation, Setting, Tally, Trainer, TrainingSession, ADMISSION_FEE_KEY, ADULT_AGE,
    BASIC_FEE_ADULTS_KEY, BASIC_FEE_YOUTHS_KEY,
};
pub use requests::{ImportRequest, NewMember, NewSession};
pub use responses::{FeeReport, MemberCounts, RosterEntry, SessionRoster, TallySummary};
pub use snapshot::ClubSnapshot;

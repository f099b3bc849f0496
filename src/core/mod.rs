// Core business rule exports
pub mod active;
pub mod compare;
pub mod contacts;
pub mod fees;
pub mod invoice;
pub mod maintenance;
pub mod queries;
pub mod relations;
pub mod report;
pub mod sepa;
pub mod tally;
pub mod time;
mod xml;

pub use active::{is_active, participation_active};
pub use compare::{compare_payments, compare_tallies, parse_payments, CompareError, TallyComparison};
pub use contacts::{collect_contacts, format_contacts, ContactFilter, ContactFormat, ContactInformation};
pub use fees::{compute_monthly_fee, compute_total_fee, fee_report, FeeError};
pub use invoice::{invoice_assets, parse_invoice, InvoiceError, InvoiceLine};
pub use maintenance::{outdated_cutoffs, OutdatedCutoffs};
pub use queries::{member_counts, member_history, session_roster};
pub use relations::RelationGraph;
pub use report::{cohort_counts, render_dtv_report, render_wlsb_report, ClubInfo, CohortCount, ReportError};
pub use sepa::{Asset, CreditorInfo, Debitor, PaymentInitiation, SepaError};
pub use tally::{assemble_monthly_fee_assets, message_id, MonthlyAssets};
pub use time::{age_at, nominal_year_diff};

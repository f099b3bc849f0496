//! SEPA direct-debit initiation messages (ISO 20022 `pain.008.001.02`)

use chrono::{DateTime, NaiveDate, Utc};
use deunicode::deunicode_char;
use thiserror::Error;

use crate::core::xml::XmlWriter;
use crate::models::{Amount, Member};

pub const PAIN_NAMESPACE: &str = "urn:iso:std:iso:20022:tech:xsd:pain.008.001.02";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Placeholder in the end-to-end id template that is replaced by the member id
pub const MEMBER_ID_PLACEHOLDER: &str = "{mem_id}";

const MAX_NAME_LEN: usize = 70;
const MAX_PURPOSE_LEN: usize = 140;
const MAX_ID_LEN: usize = 35;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SepaError {
    #[error("Amount {amount} for member {member_id} is negative")]
    NegativeAmount { member_id: i64, amount: Amount },

    #[error("Member {0} has not signed a SEPA mandate")]
    MissingMandate(i64),

    #[error("Name of member {0} contains no characters usable in a SEPA message")]
    UnusableName(i64),
}

/// Creditor (the club) of a direct-debit message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditorInfo {
    pub name: String,
    pub iban: String,
    pub bic: String,
    pub identification: String,
}

/// Bank details of a debited member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debitor {
    pub member_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub iban: String,
    pub account_owner: String,
    pub mandate_date: Option<NaiveDate>,
}

impl From<&Member> for Debitor {
    fn from(member: &Member) -> Self {
        Self {
            member_id: member.id,
            first_name: member.first_name.clone(),
            last_name: member.last_name.clone(),
            iban: member.iban.clone(),
            account_owner: member.account_owner.clone(),
            mandate_date: member.sepa_mandate_date,
        }
    }
}

/// Something to collect from a member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub debitor: Debitor,
    pub purpose: String,
    pub amount: Amount,
    /// End-to-end id template, see [`MEMBER_ID_PLACEHOLDER`]
    pub e2e_id: String,
}

/// A single `DrctDbtTxInf` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectDebitTransaction {
    pub end_to_end_id: String,
    pub amount: Amount,
    pub mandate_id: String,
    pub mandate_signed: NaiveDate,
    pub debtor_name: String,
    pub debtor_iban: String,
    pub ultimate_debtor: String,
    pub purpose: String,
}

/// Transliterate to the SEPA Latin character set
///
/// German umlauts are spelled out (ä → ae), everything else goes through
/// `deunicode`. Characters outside the permitted set are dropped.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            'ä' => out.push_str("ae"),
            'ö' => out.push_str("oe"),
            'ü' => out.push_str("ue"),
            'Ä' => out.push_str("Ae"),
            'Ö' => out.push_str("Oe"),
            'Ü' => out.push_str("Ue"),
            'ß' => out.push_str("ss"),
            c if is_sepa_char(c) => out.push(c),
            c => {
                if let Some(ascii) = deunicode_char(c) {
                    out.extend(ascii.chars().filter(|&a| is_sepa_char(a)));
                }
            }
        }
    }

    out
}

fn is_sepa_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '?' | ':' | '(' | ')' | '.' | ',' | '\'' | '+' | ' ')
}

fn truncate(text: String, max: usize) -> String {
    if text.chars().count() <= max {
        text
    } else {
        text.chars().take(max).collect()
    }
}

/// Turn assets into direct-debit transactions
///
/// Zero amounts are skipped. Returns the control sum along with the
/// transactions.
pub fn to_transactions(
    assets: &[Asset],
) -> Result<(Amount, Vec<DirectDebitTransaction>), SepaError> {
    let mut total = Amount::ZERO;
    let mut transactions = Vec::with_capacity(assets.len());

    for asset in assets {
        let debitor = &asset.debitor;

        if asset.amount.is_negative() {
            return Err(SepaError::NegativeAmount {
                member_id: debitor.member_id,
                amount: asset.amount,
            });
        }
        if asset.amount.is_zero() {
            continue;
        }

        let mandate_signed = debitor
            .mandate_date
            .ok_or(SepaError::MissingMandate(debitor.member_id))?;

        let account_owner = if debitor.account_owner.trim().is_empty() {
            format!("{} {}", debitor.first_name, debitor.last_name)
        } else {
            debitor.account_owner.clone()
        };

        let debtor_name = truncate(sanitize(&account_owner).trim().to_string(), MAX_NAME_LEN);
        let ultimate_debtor = ultimate_debtor_name(debitor);
        if debtor_name.is_empty() || ultimate_debtor.is_empty() {
            return Err(SepaError::UnusableName(debitor.member_id));
        }

        total += asset.amount;

        transactions.push(DirectDebitTransaction {
            end_to_end_id: truncate(
                asset
                    .e2e_id
                    .replace(MEMBER_ID_PLACEHOLDER, &debitor.member_id.to_string()),
                MAX_ID_LEN,
            ),
            amount: asset.amount,
            // The member id doubles as the mandate reference
            mandate_id: debitor.member_id.to_string(),
            mandate_signed,
            debtor_name,
            debtor_iban: debitor.iban.replace(' ', ""),
            ultimate_debtor,
            purpose: truncate(sanitize(&asset.purpose), MAX_PURPOSE_LEN),
        });
    }

    Ok((total, transactions))
}

/// "Last, First" with empty parts left out
fn ultimate_debtor_name(debitor: &Debitor) -> String {
    let parts: Vec<String> = [&debitor.last_name, &debitor.first_name]
        .iter()
        .map(|part| sanitize(part).trim().to_string())
        .filter(|part| !part.is_empty())
        .collect();

    truncate(parts.join(", "), MAX_NAME_LEN)
}

/// A complete `pain.008.001.02` customer direct-debit initiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInitiation {
    pub message_id: String,
    pub creation_time: DateTime<Utc>,
    pub collection_date: NaiveDate,
    pub creditor: CreditorInfo,
    pub control_sum: Amount,
    pub transactions: Vec<DirectDebitTransaction>,
}

impl PaymentInitiation {
    pub fn new(
        message_id: impl Into<String>,
        creation_time: DateTime<Utc>,
        collection_date: NaiveDate,
        creditor: CreditorInfo,
        assets: &[Asset],
    ) -> Result<Self, SepaError> {
        let (control_sum, transactions) = to_transactions(assets)?;

        Ok(Self {
            message_id: message_id.into(),
            creation_time,
            collection_date,
            creditor,
            control_sum,
            transactions,
        })
    }

    /// Serialize as pretty-printed XML
    pub fn render(&self) -> String {
        let mut xml = XmlWriter::new();
        let creditor_name = truncate(sanitize(&self.creditor.name), MAX_NAME_LEN);
        let tx_count = self.transactions.len().to_string();
        let control_sum = self.control_sum.to_string();

        xml.declaration();
        xml.open_with_attrs(
            "Document",
            &[
                ("xmlns", PAIN_NAMESPACE),
                ("xmlns:xsi", XSI_NAMESPACE),
                (
                    "xsi:schemaLocation",
                    &format!("{} pain.008.001.02.xsd", PAIN_NAMESPACE),
                ),
            ],
        );
        xml.open("CstmrDrctDbtInitn");

        xml.open("GrpHdr");
        xml.leaf("MsgId", &self.message_id);
        xml.leaf(
            "CreDtTm",
            &self.creation_time.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        );
        xml.leaf("NbOfTxs", &tx_count);
        xml.leaf("CtrlSum", &control_sum);
        xml.open("InitgPty");
        xml.leaf("Nm", &creditor_name);
        xml.close("InitgPty");
        xml.close("GrpHdr");

        xml.open("PmtInf");
        xml.leaf("PmtInfId", &self.message_id);
        xml.leaf("PmtMtd", "DD");
        xml.leaf("BtchBookg", "true");
        xml.leaf("NbOfTxs", &tx_count);
        xml.leaf("CtrlSum", &control_sum);

        xml.open("PmtTpInf");
        xml.open("SvcLvl");
        xml.leaf("Cd", "SEPA");
        xml.close("SvcLvl");
        xml.open("LclInstrm");
        xml.leaf("Cd", "CORE");
        xml.close("LclInstrm");
        xml.leaf("SeqTp", "RCUR");
        xml.close("PmtTpInf");

        xml.leaf(
            "ReqdColltnDt",
            &self.collection_date.format("%Y-%m-%d").to_string(),
        );

        xml.open("Cdtr");
        xml.leaf("Nm", &creditor_name);
        xml.close("Cdtr");
        xml.open("CdtrAcct");
        xml.open("Id");
        xml.leaf("IBAN", &self.creditor.iban.replace(' ', ""));
        xml.close("Id");
        xml.close("CdtrAcct");
        xml.open("CdtrAgt");
        xml.open("FinInstnId");
        xml.leaf("BIC", &self.creditor.bic);
        xml.close("FinInstnId");
        xml.close("CdtrAgt");
        xml.leaf("ChrgBr", "SLEV");

        xml.open("CdtrSchmeId");
        xml.open("Id");
        xml.open("PrvtId");
        xml.open("Othr");
        xml.leaf("Id", &self.creditor.identification);
        xml.open("SchmeNm");
        xml.leaf("Prtry", "SEPA");
        xml.close("SchmeNm");
        xml.close("Othr");
        xml.close("PrvtId");
        xml.close("Id");
        xml.close("CdtrSchmeId");

        for tx in &self.transactions {
            write_transaction(&mut xml, tx);
        }

        xml.close("PmtInf");
        xml.close("CstmrDrctDbtInitn");
        xml.close("Document");

        xml.finish()
    }
}

fn write_transaction(xml: &mut XmlWriter, tx: &DirectDebitTransaction) {
    xml.open("DrctDbtTxInf");

    xml.open("PmtId");
    xml.leaf("EndToEndId", &tx.end_to_end_id);
    xml.close("PmtId");
    xml.leaf_with_attrs("InstdAmt", &[("Ccy", "EUR")], &tx.amount.to_string());

    xml.open("DrctDbtTx");
    xml.open("MndtRltdInf");
    xml.leaf("MndtId", &tx.mandate_id);
    xml.leaf("DtOfSgntr", &tx.mandate_signed.format("%Y-%m-%d").to_string());
    xml.leaf("AmdmntInd", "false");
    xml.close("MndtRltdInf");
    xml.close("DrctDbtTx");

    xml.open("DbtrAgt");
    xml.open("FinInstnId");
    xml.open("Othr");
    xml.leaf("Id", "NOTPROVIDED");
    xml.close("Othr");
    xml.close("FinInstnId");
    xml.close("DbtrAgt");

    xml.open("Dbtr");
    xml.leaf("Nm", &tx.debtor_name);
    xml.close("Dbtr");
    xml.open("DbtrAcct");
    xml.open("Id");
    xml.leaf("IBAN", &tx.debtor_iban);
    xml.close("Id");
    xml.close("DbtrAcct");
    xml.open("UltmtDbtr");
    xml.leaf("Nm", &tx.ultimate_debtor);
    xml.close("UltmtDbtr");

    xml.open("RmtInf");
    xml.leaf("Ustrd", &tx.purpose);
    xml.close("RmtInf");

    xml.close("DrctDbtTxInf");
}

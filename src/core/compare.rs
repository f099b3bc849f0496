//! Comparing the transactions of two `pain.008` files

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::models::{Amount, AmountError};

const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Expected exactly one payment information block, found {0}")]
    PaymentInfoCount(usize),

    #[error("Transaction {index} has no {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("Transaction '{end_to_end_id}' is not in EUR but in '{currency}'")]
    Currency {
        end_to_end_id: String,
        currency: String,
    },

    #[error("Invalid amount '{value}': {source}")]
    Amount {
        value: String,
        #[source]
        source: AmountError,
    },
}

/// A single collected payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub end_to_end_id: String,
    pub amount: Amount,
    /// Ultimate debtor, or "Unknown"
    pub name: String,
}

/// Same end-to-end id, different amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountDifference {
    pub end_to_end_id: String,
    pub name: String,
    pub first: Amount,
    pub second: Amount,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TallyComparison {
    pub differences: Vec<AmountDifference>,
    pub only_in_first: Vec<Payment>,
    pub only_in_second: Vec<Payment>,
}

impl TallyComparison {
    /// Sum of `first - second` over the payments found in both
    pub fn amount_diff(&self) -> Amount {
        self.differences.iter().map(|d| d.first - d.second).sum()
    }

    /// Difference of the two control sums
    pub fn total_diff(&self) -> Amount {
        let extra_first: Amount = self.only_in_first.iter().map(|p| p.amount).sum();
        let extra_second: Amount = self.only_in_second.iter().map(|p| p.amount).sum();
        self.amount_diff() + extra_first - extra_second
    }
}

#[derive(Default)]
struct PartialPayment {
    end_to_end_id: Option<String>,
    amount: Option<String>,
    currency: Option<String>,
    name: Option<String>,
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// Read the direct-debit transactions of a message
pub fn parse_payments(xml: &str) -> Result<Vec<Payment>, CompareError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut payment_infos = 0;
    let mut current: Option<PartialPayment> = None;
    let mut payments = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                let name = local_name(&element);
                match name.as_str() {
                    "PmtInf" => payment_infos += 1,
                    "DrctDbtTxInf" => current = Some(PartialPayment::default()),
                    "InstdAmt" => {
                        if let (Some(payment), Some(ccy)) =
                            (current.as_mut(), element.try_get_attribute("Ccy")?)
                        {
                            payment.currency = Some(ccy.unescape_value()?.into_owned());
                        }
                    }
                    _ => {}
                }
                path.push(name);
            }
            Event::End(_) => {
                if path.pop().as_deref() == Some("DrctDbtTxInf") {
                    if let Some(partial) = current.take() {
                        payments.push(finish_payment(partial, payments.len())?);
                    }
                }
            }
            Event::Text(text) => {
                let Some(payment) = current.as_mut() else {
                    continue;
                };
                let value = text.unescape()?.into_owned();
                let parent = path.len().checked_sub(2).and_then(|i| path.get(i));

                match (path.last().map(String::as_str), parent.map(String::as_str)) {
                    (Some("EndToEndId"), _) => payment.end_to_end_id = Some(value),
                    (Some("InstdAmt"), _) => payment.amount = Some(value),
                    (Some("Nm"), Some("UltmtDbtr")) => payment.name = Some(value),
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if payment_infos != 1 {
        return Err(CompareError::PaymentInfoCount(payment_infos));
    }

    Ok(payments)
}

fn finish_payment(partial: PartialPayment, index: usize) -> Result<Payment, CompareError> {
    let end_to_end_id = partial.end_to_end_id.ok_or(CompareError::MissingField {
        index,
        field: "EndToEndId",
    })?;
    let value = partial.amount.ok_or(CompareError::MissingField {
        index,
        field: "InstdAmt",
    })?;

    match partial.currency.as_deref() {
        Some("EUR") => {}
        other => {
            return Err(CompareError::Currency {
                end_to_end_id,
                currency: other.unwrap_or_default().to_string(),
            })
        }
    }

    let amount = value
        .parse::<Amount>()
        .map_err(|source| CompareError::Amount { value, source })?;

    Ok(Payment {
        end_to_end_id,
        amount,
        name: partial.name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
    })
}

/// Pair payments by end-to-end id
///
/// Payments with the same id are paired in file order; leftovers on either
/// side are reported as only present in that file.
pub fn compare_payments(mut first: Vec<Payment>, mut second: Vec<Payment>) -> TallyComparison {
    first.sort_by(|a, b| a.end_to_end_id.cmp(&b.end_to_end_id));
    second.sort_by(|a, b| a.end_to_end_id.cmp(&b.end_to_end_id));

    let mut comparison = TallyComparison::default();
    let mut first = first.into_iter().peekable();
    let mut second = second.into_iter().peekable();

    loop {
        let ordering = match (first.peek(), second.peek()) {
            (Some(a), Some(b)) => a.end_to_end_id.cmp(&b.end_to_end_id),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => break,
        };

        match ordering {
            std::cmp::Ordering::Less => comparison.only_in_first.extend(first.next()),
            std::cmp::Ordering::Greater => comparison.only_in_second.extend(second.next()),
            std::cmp::Ordering::Equal => {
                if let (Some(a), Some(b)) = (first.next(), second.next()) {
                    if a.amount != b.amount {
                        comparison.differences.push(AmountDifference {
                            end_to_end_id: a.end_to_end_id,
                            name: a.name,
                            first: a.amount,
                            second: b.amount,
                        });
                    }
                }
            }
        }
    }

    comparison
}

/// Compare the transactions of two messages
pub fn compare_tallies(first: &str, second: &str) -> Result<TallyComparison, CompareError> {
    Ok(compare_payments(
        parse_payments(first)?,
        parse_payments(second)?,
    ))
}

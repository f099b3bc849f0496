use std::io::Read;
use thiserror::Error;

use crate::core::sepa::{Asset, Debitor};
use crate::models::{amount::div_round, Amount, AmountError, ClubSnapshot};

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Line {line}: expected 5 columns, found {found}")]
    MalformedLine { line: usize, found: usize },

    #[error("Line {line}: {source}")]
    InvalidAmount {
        line: usize,
        #[source]
        source: AmountError,
    },

    #[error("No member named '{first_name} {last_name}'")]
    UnknownMember {
        first_name: String,
        last_name: String,
    },

    #[error("Several members are named '{first_name} {last_name}'")]
    AmbiguousMember {
        first_name: String,
        last_name: String,
    },
}

/// One row of an invoice: last name, first name, description, net price, tax rate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceLine {
    pub last_name: String,
    pub first_name: String,
    pub description: String,
    pub price: Amount,
    /// Tax rate in hundredths of a percent (19 % = 1900)
    pub tax_rate: i64,
}

impl InvoiceLine {
    /// Price including tax
    ///
    /// The factor `1 + tax / 100` is rounded to three decimals first, the
    /// result to the cent.
    pub fn gross(&self) -> Amount {
        let factor_milli = 1000 + div_round(self.tax_rate, 10);
        self.price.scale(factor_milli, 1000)
    }
}

/// Read invoice lines from CSV; the first row is a header
pub fn parse_invoice<R: Read>(reader: R) -> Result<Vec<InvoiceLine>, InvoiceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut lines = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        // Header is line 1
        let line = index + 2;

        if record.len() != 5 {
            return Err(InvoiceError::MalformedLine {
                line,
                found: record.len(),
            });
        }

        let price = record[3]
            .parse::<Amount>()
            .map_err(|source| InvoiceError::InvalidAmount { line, source })?;
        let tax_rate = record[4]
            .parse::<Amount>()
            .map_err(|source| InvoiceError::InvalidAmount { line, source })?
            .cents();

        lines.push(InvoiceLine {
            last_name: record[0].to_string(),
            first_name: record[1].to_string(),
            description: record[2].to_string(),
            price,
            tax_rate,
        });
    }

    Ok(lines)
}

/// Resolve invoice lines to assets of the named members
pub fn invoice_assets(
    snapshot: &ClubSnapshot,
    lines: &[InvoiceLine],
    e2e_id_template: &str,
) -> Result<Vec<Asset>, InvoiceError> {
    lines
        .iter()
        .map(|line| {
            let mut matches = snapshot
                .members()
                .filter(|m| m.first_name == line.first_name && m.last_name == line.last_name);

            let member = matches.next().ok_or_else(|| InvoiceError::UnknownMember {
                first_name: line.first_name.clone(),
                last_name: line.last_name.clone(),
            })?;
            if matches.next().is_some() {
                return Err(InvoiceError::AmbiguousMember {
                    first_name: line.first_name.clone(),
                    last_name: line.last_name.clone(),
                });
            }

            Ok(Asset {
                debitor: Debitor::from(member),
                purpose: line.description.clone(),
                amount: line.gross(),
                e2e_id: e2e_id_template.to_string(),
            })
        })
        .collect()
}

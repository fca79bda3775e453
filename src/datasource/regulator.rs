//! CSV exports published by national regulators.

use super::rows::{normalize_rows, RawRow};
use super::{DataSourceError, RowRejection, SourceBatch, SourceFetcher};
use crate::domain::Market;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Column layout of a regulator export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvLayout {
    /// company, identifier, percentage, date
    Aggregated,
    /// holder, company, identifier, percentage, date, comment
    Detailed,
}

impl CsvLayout {
    fn min_columns(&self) -> usize {
        match self {
            CsvLayout::Aggregated => 4,
            CsvLayout::Detailed => 5,
        }
    }

    fn row(&self, record: &csv::StringRecord) -> RawRow {
        let field = |i: usize| record.get(i).unwrap_or_default().to_string();
        match self {
            CsvLayout::Aggregated => RawRow::Aggregated {
                company: field(0),
                identifier: field(1),
                percentage: field(2),
                date: field(3),
            },
            CsvLayout::Detailed => RawRow::Holder {
                holder: field(0),
                company: field(1),
                identifier: field(2),
                percentage: field(3),
                date: field(4),
            },
        }
    }
}

/// `;` when the first line has more semicolons than commas, else `,`.
pub fn detect_delimiter(body: &str) -> u8 {
    let first = body.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
    let semicolons = first.matches(';').count();
    let commas = first.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Split a CSV export into numbered raw rows.
///
/// The first `skip_rows` records (title and header lines) are ignored.
pub fn parse_csv(
    body: &str,
    layout: CsvLayout,
    skip_rows: usize,
) -> (Vec<(usize, RawRow)>, Vec<RowRejection>) {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(body))
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    let mut skipped = Vec::new();

    for (i, record) in reader.records().enumerate().skip(skip_rows) {
        let row = i + 1;
        match record {
            Ok(record) if record.iter().all(|f| f.is_empty()) => {}
            Ok(record) if record.len() < layout.min_columns() => skipped.push(RowRejection::new(
                row,
                format!(
                    "expected at least {} columns, found {}",
                    layout.min_columns(),
                    record.len()
                ),
            )),
            Ok(record) => rows.push((row, layout.row(&record))),
            Err(e) => skipped.push(RowRejection::new(row, format!("malformed CSV: {}", e))),
        }
    }

    (rows, skipped)
}

/// One regulator CSV export fetched over HTTP.
#[derive(Debug, Clone)]
pub struct CsvRegulatorSource {
    client: Client,
    name: String,
    url: String,
    market: Market,
    layout: CsvLayout,
    skip_rows: usize,
    threshold: Option<String>,
    max_elapsed: Duration,
}

impl CsvRegulatorSource {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        market: Market,
        layout: CsvLayout,
    ) -> Self {
        let threshold = match layout {
            CsvLayout::Aggregated => "0.1%",
            CsvLayout::Detailed => "0.5%",
        };
        Self {
            client: Client::new(),
            name: name.into(),
            url: url.into(),
            market,
            layout,
            skip_rows: 1,
            threshold: Some(threshold.to_string()),
            max_elapsed: Duration::from_secs(30),
        }
    }

    /// Number of title/header lines before the first data row.
    pub fn with_skip_rows(mut self, skip_rows: usize) -> Self {
        self.skip_rows = skip_rows;
        self
    }

    pub fn with_threshold(mut self, threshold: Option<String>) -> Self {
        self.threshold = threshold;
        self
    }

    /// Per-request timeout; also bounds the retry budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        self.max_elapsed = timeout;
        self
    }

    pub fn layout(&self) -> CsvLayout {
        self.layout
    }

    async fn get_body(&self) -> Result<String, DataSourceError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self.client.get(&self.url).send().await.map_err(|e| {
                backoff::Error::transient(DataSourceError::Network(e.to_string()))
            })?;

            let status = response.status();
            if status == 429 || status.is_server_error() {
                return Err(backoff::Error::transient(DataSourceError::HttpStatus {
                    status: status.as_u16(),
                    message: "Server busy or failing".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DataSourceError::HttpStatus {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .text()
                .await
                .map_err(|e| backoff::Error::permanent(DataSourceError::Parse(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl SourceFetcher for CsvRegulatorSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn market(&self) -> Market {
        self.market
    }

    async fn fetch_positions(&self) -> Result<SourceBatch, DataSourceError> {
        debug!("Fetching {} from {}", self.name, self.url);
        let body = self.get_body().await?;

        let (rows, mut rejected) = parse_csv(&body, self.layout, self.skip_rows);
        let row_count = rows.len();
        let mut batch = normalize_rows(rows, self.market, self.threshold.as_deref());
        rejected.append(&mut batch.skipped);
        batch.skipped = rejected;

        if batch.positions.is_empty() && row_count == 0 {
            return Err(DataSourceError::Parse(format!(
                "{} returned no data rows",
                self.name
            )));
        }
        if !batch.skipped.is_empty() {
            warn!("{}: skipped {} rows", self.name, batch.skipped.len());
        }
        info!(
            "{}: {} companies from {} rows",
            self.name,
            batch.positions.len(),
            row_count
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGGREGATED: &str = "\
Emittent;LEI;Position i procent;Datum
Sinch AB;549300;4,20;2026-03-09
Nokian Renkaat;743700;1,05;2026-03-08
;;;
Short row;1
";

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter(AGGREGATED), b';');
        assert_eq!(detect_delimiter("a,b,c\n1;2,3"), b',');
        assert_eq!(detect_delimiter(""), b',');
    }

    #[test]
    fn test_parse_aggregated_export() {
        let (rows, skipped) = parse_csv(AGGREGATED, CsvLayout::Aggregated, 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 2);
        assert_eq!(
            rows[0].1,
            RawRow::Aggregated {
                company: "Sinch AB".to_string(),
                identifier: "549300".to_string(),
                percentage: "4,20".to_string(),
                date: "2026-03-09".to_string(),
            }
        );
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].row, 5);
    }

    #[test]
    fn test_parse_detailed_export() {
        let body = "\
Holder,Issuer,ISIN,Position,Date,Comment
Fund A,Nokia Oyj,FI0009000681,0.61,2026-03-01,
Fund B,Nokia Oyj,FI0009000681,0.55,2026-03-02,Revised
";
        let (rows, skipped) = parse_csv(body, CsvLayout::Detailed, 1);
        assert!(skipped.is_empty());
        let batch = normalize_rows(rows, Market::Fi, Some("0.5%"));
        assert_eq!(batch.positions.len(), 1);
        assert_eq!(batch.positions[0].individual_holders.len(), 2);
        assert_eq!(batch.positions[0].market, Market::Fi);
    }
}

use crate::domain::endpoint::{AmountRange, Endpoint, EndpointId};
use crate::domain::method::PaymentMethod;
use crate::domain::ports::EndpointDirectory;
use crate::error::{Result, RoutingError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

/// One row of an endpoint directory file.
///
/// `account` may hold several identifiers separated by `|`.
#[derive(Debug, Deserialize)]
struct EndpointRecord {
    id: String,
    method: PaymentMethod,
    name: String,
    #[serde(default)]
    account: String,
    sort_weight: i64,
    min_amount: Option<Decimal>,
    max_amount: Option<Decimal>,
}

impl TryFrom<EndpointRecord> for Endpoint {
    type Error = RoutingError;

    fn try_from(record: EndpointRecord) -> Result<Self> {
        if record.id.is_empty() {
            return Err(RoutingError::Validation("Endpoint id is empty".to_string()));
        }
        if let (Some(min), Some(max)) = (record.min_amount, record.max_amount)
            && min > max
        {
            return Err(RoutingError::Validation(format!(
                "Endpoint {} has min_amount {} above max_amount {}",
                record.id, min, max
            )));
        }
        Ok(Endpoint {
            id: EndpointId(record.id),
            method: record.method,
            name: record.name,
            accounts: record
                .account
                .split('|')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect(),
            sort_weight: record.sort_weight,
            range: AmountRange {
                min: record.min_amount,
                max: record.max_amount,
            },
        })
    }
}

/// Reads endpoints from a CSV source.
///
/// Handles whitespace trimming and flexible record lengths, like the rest of the
/// CSV interfaces.
pub struct EndpointReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EndpointReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields one result per data row.
    pub fn endpoints(self) -> impl Iterator<Item = Result<Endpoint>> {
        self.reader
            .into_deserialize::<EndpointRecord>()
            .map(|result| result.map_err(RoutingError::from).and_then(Endpoint::try_from))
    }
}

/// Endpoint directory backed by a CSV file, re-read on every `list` call.
///
/// Malformed rows are skipped with a warning so one bad row cannot hide a
/// whole directory.
#[derive(Debug, Clone)]
pub struct CsvEndpointDirectory {
    path: PathBuf,
}

impl CsvEndpointDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EndpointDirectory for CsvEndpointDirectory {
    async fn list(&self, method: Option<PaymentMethod>) -> Result<Vec<Endpoint>> {
        let path = self.path.clone();
        let rows = tokio::task::spawn_blocking(move || -> Result<Vec<Result<Endpoint>>> {
            let file = File::open(path)?;
            Ok(EndpointReader::new(file).endpoints().collect())
        })
        .await
        .map_err(|e| RoutingError::Io(std::io::Error::other(e)))??;

        let mut endpoints = Vec::with_capacity(rows.len());
        for row in rows {
            match row {
                Ok(endpoint) if method.is_none_or(|m| endpoint.method == m) => endpoints.push(endpoint),
                Ok(_) => {}
                Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "skipping endpoint row"),
            }
        }
        Ok(endpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const HEADER: &str = "id,method,name,account,sort_weight,min_amount,max_amount";

    #[test]
    fn test_reader_valid_stream() {
        let data = format!(
            "{HEADER}\nw1, wechat, Wallet One, acct-1|holder, 1, 10, 500\nc1, bank_card, Card, 6222, 2, ,"
        );
        let reader = EndpointReader::new(data.as_bytes());
        let results: Vec<Result<Endpoint>> = reader.endpoints().collect();

        assert_eq!(results.len(), 2);
        let w1 = results[0].as_ref().unwrap();
        assert_eq!(w1.method, PaymentMethod::Wechat);
        assert_eq!(w1.accounts, vec!["acct-1", "holder"]);
        assert_eq!(w1.range.min, Some(dec!(10)));
        assert_eq!(w1.range.max, Some(dec!(500)));

        let c1 = results[1].as_ref().unwrap();
        assert_eq!(c1.range, AmountRange::default());
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = format!("{HEADER}\nx, paypal, X, a, 1, ,\ny, wechat, Y, a, 1, 50, 10");
        let reader = EndpointReader::new(data.as_bytes());
        let results: Vec<Result<Endpoint>> = reader.endpoints().collect();

        assert!(matches!(results[0], Err(RoutingError::Csv(_))));
        assert!(matches!(results[1], Err(RoutingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_csv_directory_skips_bad_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "w1, wechat, W1, a, 1, ,").unwrap();
        writeln!(file, "bad, nope, B, a, 1, ,").unwrap();
        writeln!(file, "a1, alipay, A1, a, 1, ,").unwrap();

        let directory = CsvEndpointDirectory::new(file.path());
        assert_eq!(directory.list(None).await.unwrap().len(), 2);
        let wechat = directory.list(Some(PaymentMethod::Wechat)).await.unwrap();
        assert_eq!(wechat.len(), 1);
    }

    #[tokio::test]
    async fn test_csv_directory_missing_file() {
        let directory = CsvEndpointDirectory::new("/nonexistent/endpoints.csv");
        assert!(matches!(directory.list(None).await, Err(RoutingError::Io(_))));
    }
}

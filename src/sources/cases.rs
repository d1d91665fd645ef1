use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};

use crate::models::DailyCases;

use super::SourceError;

const SOURCE: &str = "case sheet";

pub async fn fetch_case_sheet(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<DailyCases>, SourceError> {
    let request_err = |e: reqwest::Error| SourceError::Request {
        source_name: SOURCE,
        message: e.to_string(),
    };

    let resp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(request_err)?;

    if !resp.status().is_success() {
        let status = resp.status();
        tracing::error!(%status, "Case sheet download failed");
        return Err(SourceError::Request {
            source_name: SOURCE,
            message: format!("status {status}"),
        });
    }

    let body = resp.text().await.map_err(request_err)?;
    load_case_rows(&body)
}

/// Parse the sheet export, fill missing dates and sort by date.
pub fn load_case_rows(csv_body: &str) -> Result<Vec<DailyCases>, SourceError> {
    let (dates, counts) = parse_case_csv(csv_body)?;
    let dates = fill_missing_week_dates(&dates)?;

    let mut rows: Vec<DailyCases> = dates
        .into_iter()
        .zip(counts)
        .map(|(date, cases)| DailyCases { date, cases })
        .collect();
    rows.sort_by_key(|r| r.date);
    Ok(rows)
}

/// Raw `(date, count)` columns in sheet order. Unparseable cells become `None`.
pub fn parse_case_csv(
    csv_body: &str,
) -> Result<(Vec<Option<NaiveDate>>, Vec<Option<f64>>), SourceError> {
    let payload_err = |e: csv::Error| SourceError::Payload {
        source_name: SOURCE,
        message: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(payload_err)?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let date_col = headers.iter().position(|h| h == "date").ok_or_else(|| {
        SourceError::Payload {
            source_name: SOURCE,
            message: format!("no 'date' column in {headers:?}"),
        }
    })?;
    let count_col = headers
        .iter()
        .position(|h| h == "total")
        .or_else(|| headers.iter().position(|h| h == "dengue_total"))
        .ok_or_else(|| SourceError::MissingCaseColumn(headers.clone()))?;

    let mut dates = Vec::new();
    let mut counts = Vec::new();
    for record in reader.records() {
        let record = record.map_err(payload_err)?;
        let date_cell = record.get(date_col).unwrap_or_default();
        let count_cell = record.get(count_col).unwrap_or_default();
        if date_cell.is_empty() && count_cell.is_empty() {
            continue;
        }
        dates.push(parse_sheet_date(date_cell));
        counts.push(parse_count(count_cell));
    }

    Ok((dates, counts))
}

/// Blank, unparseable and non-finite cells (`NaN`, `inf`) count as missing.
fn parse_count(cell: &str) -> Option<f64> {
    cell.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn parse_sheet_date(cell: &str) -> Option<NaiveDate> {
    if cell.is_empty() {
        return None;
    }
    ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cell, fmt).ok())
        .or_else(|| {
            NaiveDateTime::parse_from_str(cell, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Replace each missing date with the previous resolved date plus seven days.
///
/// Fills run strictly forward, so consecutive gaps chain off each other. The
/// first entry has no predecessor and must be present.
pub fn fill_missing_week_dates(
    dates: &[Option<NaiveDate>],
) -> Result<Vec<NaiveDate>, SourceError> {
    let mut filled: Vec<NaiveDate> = Vec::with_capacity(dates.len());
    for date in dates {
        let resolved = match (date, filled.last()) {
            (Some(d), _) => *d,
            (None, Some(prev)) => *prev + chrono::Duration::days(7),
            (None, None) => return Err(SourceError::MissingFirstDate),
        };
        filled.push(resolved);
    }
    Ok(filled)
}

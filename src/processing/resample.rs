//! Daily → weekly / monthly aggregation.

use crate::error::ProcessError;
use crate::loader::Table;
use crate::models::Frequency;
use crate::scraper::parsers::{format_number, parse_date, parse_number};
use chrono::NaiveDate;
use tracing::{debug, warn};

use super::{CODE_COLUMN, DATE_COLUMN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    First,
    Last,
    Max,
    Min,
    Sum,
}

/// Aggregated columns in output order, with accepted header names.
const RULES: [(&[&str], Aggregation); 7] = [
    (&["OpenPrice", "Open"], Aggregation::First),
    (&["High"], Aggregation::Max),
    (&["Low"], Aggregation::Min),
    (&["Close"], Aggregation::Last),
    (&["Volume"], Aggregation::Sum),
    (&["Value"], Aggregation::Sum),
    (&["Frequency"], Aggregation::Sum),
];

/// Column index + rule, only for columns the table has.
pub fn aggregation_plan(table: &Table) -> Result<Vec<(usize, Aggregation)>, ProcessError> {
    let plan: Vec<(usize, Aggregation)> = RULES
        .iter()
        .filter_map(|(names, agg)| table.find_column(names).map(|idx| (idx, *agg)))
        .collect();

    if plan.is_empty() {
        return Err(ProcessError::NoAggregatableColumns);
    }
    Ok(plan)
}

/// Running value of one aggregated cell.
#[derive(Debug, Clone, Copy)]
struct Cell {
    agg: Aggregation,
    value: Option<f64>,
}

impl Cell {
    fn new(agg: Aggregation) -> Self {
        let value = match agg {
            Aggregation::Sum => Some(0.0),
            _ => None,
        };
        Self { agg, value }
    }

    fn push(&mut self, x: Option<f64>) {
        let Some(x) = x else { return };
        self.value = Some(match (self.agg, self.value) {
            (_, None) => x,
            (Aggregation::First, Some(v)) => v,
            (Aggregation::Last, Some(_)) => x,
            (Aggregation::Max, Some(v)) => v.max(x),
            (Aggregation::Min, Some(v)) => v.min(x),
            (Aggregation::Sum, Some(v)) => v + x,
        });
    }

    fn render(&self) -> String {
        self.value.map(format_number).unwrap_or_default()
    }
}

/// Group by instrument, then by period end, applying the aggregation plan.
///
/// Output columns: code, `Date` (period end), then the aggregated columns.
/// Rows come out sorted by (code, period end); periods without trades are
/// not emitted.
pub fn resample(table: &Table, freq: Frequency) -> Result<Table, ProcessError> {
    let code_idx = table.require_column(CODE_COLUMN)?;
    let date_idx = table.require_column(DATE_COLUMN)?;
    let plan = aggregation_plan(table)?;

    let mut keyed: Vec<(&str, NaiveDate, &Vec<String>)> = Vec::with_capacity(table.len());
    let mut bad_dates = 0usize;
    for row in &table.rows {
        match parse_date(&row[date_idx]) {
            Some(date) => keyed.push((row[code_idx].trim(), date, row)),
            None => bad_dates += 1,
        }
    }
    if bad_dates > 0 {
        warn!("{} rows with unparseable dates skipped while resampling", bad_dates);
    }

    // stable: same-day rows keep file order for first/last
    keyed.sort_by(|a, b| a.0.cmp(b.0).then(a.1.cmp(&b.1)));

    let mut headers = vec![CODE_COLUMN.to_string(), DATE_COLUMN.to_string()];
    headers.extend(plan.iter().map(|(idx, _)| table.headers[*idx].clone()));
    let mut out = Table::new(headers);

    let mut current: Option<(&str, NaiveDate, Vec<Cell>)> = None;
    for (code, date, row) in keyed {
        let end = freq
            .period_end(date)
            .ok_or(ProcessError::DateOutOfRange(date))?;

        let same_group = matches!(&current, Some((c, e, _)) if *c == code && *e == end);
        if !same_group {
            if let Some(done) = current.take() {
                out.rows.push(render_group(done));
            }
            let cells = plan.iter().map(|(_, agg)| Cell::new(*agg)).collect();
            current = Some((code, end, cells));
        }

        if let Some((_, _, cells)) = current.as_mut() {
            for (cell, (idx, _)) in cells.iter_mut().zip(&plan) {
                cell.push(parse_number(&row[*idx]));
            }
        }
    }
    if let Some(done) = current.take() {
        out.rows.push(render_group(done));
    }

    debug!("Resampled {} rows into {} {} rows", table.len(), out.len(), freq);
    Ok(out)
}

fn render_group((code, end, cells): (&str, NaiveDate, Vec<Cell>)) -> Vec<String> {
    let mut row = vec![code.to_string(), end.format("%Y-%m-%d").to_string()];
    row.extend(cells.iter().map(Cell::render));
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::table;

    const HEADER: &str = "StockCode,StockName,OpenPrice,High,Low,Close,Volume,Value,Frequency,Date";

    fn daily() -> Table {
        table(
            HEADER,
            &[
                // week of 2024-01-01 (Mon) .. 2024-01-07 (Sun)
                "BBCA,BCA,100,105,98,104,10,1000,3,2024-01-02",
                "TLKM,Telkom,40,41,39,40,5,200,1,2024-01-02",
                "BBCA,BCA,104,112,103,110,20,2200,4,2024-01-03",
                "BBCA,BCA,110,111,95,99,30,2970,5,2024-01-05",
                // next week, next month for the last one
                "BBCA,BCA,99,101,97,100,5,500,1,2024-01-08",
                "BBCA,BCA,100,130,100,125,7,875,2,2024-02-01",
            ],
        )
    }

    #[test]
    fn weekly_ohlcv_rules() {
        let w = resample(&daily(), Frequency::Weekly).unwrap();
        assert_eq!(
            w.headers,
            ["StockCode", "Date", "OpenPrice", "High", "Low", "Close", "Volume", "Value", "Frequency"]
        );
        assert_eq!(w.rows[0], ["BBCA", "2024-01-07", "100", "112", "95", "99", "60", "6170", "12"]);
        assert_eq!(w.rows[1], ["BBCA", "2024-01-14", "99", "101", "97", "100", "5", "500", "1"]);
        assert_eq!(w.rows[2], ["BBCA", "2024-02-04", "100", "130", "100", "125", "7", "875", "2"]);
        assert_eq!(w.rows[3], ["TLKM", "2024-01-07", "40", "41", "39", "40", "5", "200", "1"]);
        assert_eq!(w.len(), 4);
    }

    #[test]
    fn monthly_groups_by_month_end() {
        let m = resample(&daily(), Frequency::Monthly).unwrap();
        assert_eq!(m.rows[0][..6], ["BBCA", "2024-01-31", "100", "112", "95", "100"]);
        assert_eq!(m.rows[1][..2], ["BBCA", "2024-02-29"]);
        assert_eq!(m.rows[2][..2], ["TLKM", "2024-01-31"]);
    }

    #[test]
    fn unsorted_input_is_ordered_before_first_last() {
        let t = table(
            "StockCode,Close,Date",
            &["BBCA,99,2024-01-05", "BBCA,104,2024-01-02", "BBCA,110,2024-01-03"],
        );
        let w = resample(&t, Frequency::Weekly).unwrap();
        assert_eq!(w.rows, vec![vec!["BBCA", "2024-01-07", "99"]]);
    }

    #[test]
    fn plan_only_covers_present_columns() {
        let t = table("StockCode,Date,Close,Volume,Remarks", &[]);
        let plan = aggregation_plan(&t).unwrap();
        assert_eq!(plan, vec![(2, Aggregation::Last), (3, Aggregation::Sum)]);
    }

    #[test]
    fn no_aggregatable_columns_fails() {
        let t = table("StockCode,StockName,Date", &["BBCA,BCA,2024-01-02"]);
        assert!(matches!(
            resample(&t, Frequency::Weekly),
            Err(ProcessError::NoAggregatableColumns)
        ));
    }

    #[test]
    fn missing_values_are_skipped() {
        let t = table(
            "StockCode,High,Close,Volume,Date",
            &["BBCA,,100,,2024-01-02", "BBCA,x,,,2024-01-03", "BBCA,,,,bad-date"],
        );
        let w = resample(&t, Frequency::Weekly).unwrap();
        // no high seen → empty; close keeps the last non-empty; sum of nothing → 0
        assert_eq!(w.rows, vec![vec!["BBCA", "2024-01-07", "", "100", "0"]]);
    }

    #[test]
    fn resampling_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");

        resample(&daily(), Frequency::Weekly).unwrap().write(&a).unwrap();
        resample(&daily(), Frequency::Weekly).unwrap().write(&b).unwrap();
        assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    }
}

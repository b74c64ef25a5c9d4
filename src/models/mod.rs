use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

// ── Daily record ──────────────────────────────────────────────────────────────

/// One row of the daily table: a single instrument on a single trading day.
///
/// Field order is the on-disk column order; the serde names are the header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyRecord {
    #[serde(rename = "StockCode")]
    pub code: String,
    #[serde(rename = "StockName")]
    pub name: String,
    #[serde(rename = "OpenPrice")]
    pub open: Option<f64>,
    #[serde(rename = "High")]
    pub high: Option<f64>,
    #[serde(rename = "Low")]
    pub low: Option<f64>,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: u64,
    #[serde(rename = "Value")]
    pub value: f64,
    #[serde(rename = "Frequency")]
    pub frequency: u64,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
}

impl DailyRecord {
    /// Header of the daily table, in column order.
    pub const COLUMNS: [&'static str; 10] = [
        "StockCode",
        "StockName",
        "OpenPrice",
        "High",
        "Low",
        "Close",
        "Volume",
        "Value",
        "Frequency",
        "Date",
    ];
}

// ── Raw API payload ───────────────────────────────────────────────────────────

/// Body of `GetStockSummary`. `data` is absent or null on closed days.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryResponse {
    #[serde(default)]
    pub data: Option<Vec<RawSummaryRow>>,
}

/// One instrument as returned by the endpoint. Only the columns we persist
/// are mapped; the endpoint sends a couple of dozen more.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSummaryRow {
    #[serde(rename = "StockCode", default)]
    pub stock_code: Option<String>,
    #[serde(rename = "StockName", default)]
    pub stock_name: Option<String>,
    #[serde(rename = "OpenPrice", default)]
    pub open_price: Option<f64>,
    #[serde(rename = "High", default)]
    pub high: Option<f64>,
    #[serde(rename = "Low", default)]
    pub low: Option<f64>,
    #[serde(rename = "Close", default)]
    pub close: Option<f64>,
    #[serde(rename = "Volume", default)]
    pub volume: Option<f64>,
    #[serde(rename = "Value", default)]
    pub value: Option<f64>,
    #[serde(rename = "Frequency", default)]
    pub frequency: Option<f64>,
}

// ── Frequency ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// File-name stem: `idx_{stem}.csv`.
    pub fn stem(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }

    /// Label of the period containing `date`: the day itself, the Sunday
    /// closing its Monday-to-Sunday week, or the last day of its month.
    pub fn period_end(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Frequency::Daily => Some(date),
            Frequency::Weekly => {
                let to_sunday = 6 - date.weekday().num_days_from_monday();
                date.checked_add_days(Days::new(u64::from(to_sunday)))
            }
            Frequency::Monthly => date
                .with_day(1)?
                .checked_add_months(Months::new(1))?
                .pred_opt(),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.stem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekly_period_ends_on_sunday() {
        // 2024-01-01 is a Monday
        assert_eq!(Frequency::Weekly.period_end(d(2024, 1, 1)), Some(d(2024, 1, 7)));
        assert_eq!(Frequency::Weekly.period_end(d(2024, 1, 5)), Some(d(2024, 1, 7)));
        assert_eq!(Frequency::Weekly.period_end(d(2024, 1, 7)), Some(d(2024, 1, 7)));
        assert_eq!(Frequency::Weekly.period_end(d(2024, 1, 8)), Some(d(2024, 1, 14)));
    }

    #[test]
    fn monthly_period_ends_on_last_day() {
        assert_eq!(Frequency::Monthly.period_end(d(2024, 2, 10)), Some(d(2024, 2, 29)));
        assert_eq!(Frequency::Monthly.period_end(d(2023, 2, 1)), Some(d(2023, 2, 28)));
        assert_eq!(Frequency::Monthly.period_end(d(2023, 12, 31)), Some(d(2023, 12, 31)));
    }

    #[test]
    fn summary_response_tolerates_null_data() {
        let resp: SummaryResponse = serde_json::from_str(r#"{"draw":0,"data":null}"#).unwrap();
        assert!(resp.data.is_none());

        let resp: SummaryResponse = serde_json::from_str(r#"{"recordsTotal":0}"#).unwrap();
        assert!(resp.data.is_none());
    }

    #[test]
    fn raw_row_ignores_unmapped_fields() {
        let row: RawSummaryRow = serde_json::from_str(
            r#"{"StockCode":"BBCA","Remarks":"--U-","Close":9400.0,"Volume":1200.0,"ForeignBuy":3.0}"#,
        )
        .unwrap();
        assert_eq!(row.stock_code.as_deref(), Some("BBCA"));
        assert_eq!(row.close, Some(9400.0));
        assert!(row.high.is_none());
    }
}

use ::scraper::{Html, Selector};
use chrono::NaiveDate;

// ── Cell parsers ──────────────────────────────────────────────────────────────

/// Coerce a table cell to a number; anything non-numeric becomes `None`.
/// "1,234.5" → 1234.5 | "" → None | "N/A" → None | "NaN" → None
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "N/A" || s == "-" || s == "—" {
        return None;
    }
    let cleaned = s.replace(',', "");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse dates: ISO first (what we write), then the layouts seen in exports.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    // pandas writes datetimes with a midnight time component
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y%m%d") {
        return Some(d);
    }
    // slash dates are month-first, as pandas reads them
    if let Ok(d) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
        return Some(d);
    }

    None
}

pub fn normalise_code(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Format a number for a CSV cell. Integral values drop the fraction.
pub fn format_number(v: f64) -> String {
    format!("{}", v)
}

// ── HTML diagnostics ──────────────────────────────────────────────────────────

/// Bot-protection pages come back as HTML with a 200. Return their `<title>`
/// so the failure is recognisable in the log.
pub fn html_title(body: &str) -> Option<String> {
    let head = body.trim_start();
    if !head.starts_with('<') {
        return None;
    }

    let doc = Html::parse_document(body);
    let sel = Selector::parse("title").ok()?;
    let title = doc
        .select(&sel)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();

    if title.is_empty() { None } else { Some(title) }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

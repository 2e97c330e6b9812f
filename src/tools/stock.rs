//! Daily closing prices for Tokyo Stock Exchange codes, read from Stooq's
//! CSV download endpoint.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::error::{AgentError, Result};
use crate::tool::{ParameterKind, Tool, ToolSpec};

use super::{fetch_text, http_client, required_text, trim_base};

const NAME: &str = "get_stock_price_range";

pub struct StockPriceTool {
    spec: ToolSpec,
    client: reqwest::Client,
    base_url: String,
    date_pattern: Regex,
}

impl StockPriceTool {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            spec: ToolSpec::new(
                NAME,
                "Given a securities code and two dates, returns the company's closing stock \
                 prices for every trading day between those dates.",
            )
            .required("code", ParameterKind::String, "Securities code, e.g. 7203")
            .required(
                "date_from",
                ParameterKind::String,
                "First date of the range (YYYY-MM-DD)",
            )
            .required(
                "date_to",
                ParameterKind::String,
                "Last date of the range (YYYY-MM-DD)",
            ),
            client: http_client(NAME, timeout_secs)?,
            base_url: trim_base(base_url),
            date_pattern: date_pattern()?,
        })
    }
}

#[async_trait]
impl Tool for StockPriceTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let code = required_text(&input, "code", NAME)?;
        let from = compact_date(&self.date_pattern, &required_text(&input, "date_from", NAME)?)?;
        let to = compact_date(&self.date_pattern, &required_text(&input, "date_to", NAME)?)?;

        let url = format!(
            "{}/q/d/l/?s={}&d1={}&d2={}&i=d",
            self.base_url,
            urlencoding::encode(&stooq_symbol(&code)),
            from,
            to
        );
        let csv = fetch_text(&self.client, NAME, &url).await?;
        parse_closes(&csv).map(Value::Object)
    }
}

/// Tokyo codes are listed on Stooq with a `.jp` suffix.
fn stooq_symbol(code: &str) -> String {
    if code.contains('.') {
        code.to_ascii_lowercase()
    } else {
        format!("{}.jp", code.to_ascii_lowercase())
    }
}

/// Dates are accepted with or without dashes.
fn date_pattern() -> Result<Regex> {
    Regex::new(r"^(\d{4})-?(\d{2})-?(\d{2})$")
        .map_err(|e| AgentError::Protocol(format!("date pattern: {e}")))
}

/// `2024-01-02` -> `20240102`.
fn compact_date(re: &Regex, date: &str) -> Result<String> {
    let caps = re.captures(date).ok_or_else(|| {
        AgentError::Protocol(format!("`{date}` is not a YYYY-MM-DD date for {NAME}"))
    })?;
    Ok(format!("{}{}{}", &caps[1], &caps[2], &caps[3]))
}

/// Maps each `Date` row to its `Close` value. Closes are parsed as JSON
/// numbers without rounding; trailing zeros such as `105.50` are not kept.
fn parse_closes(csv: &str) -> Result<Map<String, Value>> {
    let mut lines = csv.lines().map(str::trim).filter(|l| !l.is_empty());
    let header = lines
        .next()
        .ok_or_else(|| AgentError::Protocol("empty price data".into()))?;
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let column = |name: &str| {
        columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| AgentError::Protocol(format!("no price data returned: `{header}`")))
    };
    let date_idx = column("Date")?;
    let close_idx = column("Close")?;

    let mut closes = Map::new();
    for line in lines {
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        let (Some(date), Some(close)) = (cells.get(date_idx), cells.get(close_idx)) else {
            continue;
        };
        let close: Number = close
            .parse()
            .map_err(|_| AgentError::Protocol(format!("bad close value `{close}` on {date}")))?;
        closes.insert(date.to_string(), Value::Number(close));
    }
    Ok(closes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalises_symbols_and_dates() {
        assert_eq!(stooq_symbol("7203"), "7203.jp");
        assert_eq!(stooq_symbol("AAPL.US"), "aapl.us");
        let re = date_pattern().unwrap();
        assert_eq!(compact_date(&re, "2024-01-02").unwrap(), "20240102");
        assert_eq!(compact_date(&re, "20240103").unwrap(), "20240103");
        assert!(compact_date(&re, "Jan 2").is_err());
    }

    #[test]
    fn parses_close_column_by_header() {
        let csv = "Date,Open,High,Low,Close,Volume\n\
                   2024-01-02,99,101,98,100,1200\n\
                   2024-01-03,101,106,100,105.5,900\n\
                   2024-01-04,104,107,103,106.50,700\n\
                   2024-01-05,106,108,105,3321.123456789,650\n";
        let closes = parse_closes(csv).unwrap();
        assert_eq!(
            Value::Object(closes.clone()),
            json!({
                "2024-01-02": 100,
                "2024-01-03": 105.5,
                "2024-01-04": 106.5,
                "2024-01-05": 3321.123456789
            })
        );
        assert_eq!(closes["2024-01-04"].to_string(), "106.5");
    }

    #[test]
    fn no_data_is_an_error() {
        assert!(parse_closes("No data").is_err());
        assert!(parse_closes("").is_err());
    }
}

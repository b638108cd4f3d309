use chrono::NaiveDate;
use serde_json::{Map, Value};
use thiserror::Error;

/// Landing-page report columns: header name as returned by the report
/// download, paired with the field name used in the select statement and the
/// warehouse table.
const REPORT_COLS: &[(&str, &str)] = &[
    ("Campaign ID", "CampaignId"),
    ("Campaign", "CampaignName"),
    ("Campaign state", "CampaignStatus"),
    ("Landing page", "UnexpandedFinalUrlString"),
    ("Day", "Date"),
    ("Device", "Device"),
    ("Active View avg. CPM", "ActiveViewCpm"),
    ("Active View viewable CTR", "ActiveViewCtr"),
    ("Active View viewable impressions", "ActiveViewImpressions"),
    ("Active View measurable impr. / impr.", "ActiveViewMeasurability"),
    ("Active View measurable cost", "ActiveViewMeasurableCost"),
    ("Active View measurable impr.", "ActiveViewMeasurableImpressions"),
    ("Active View viewable impr. / measurable impr.", "ActiveViewViewability"),
    ("All conv.", "AllConversions"),
    ("Avg. Cost", "AverageCost"),
    ("Avg. CPC", "AverageCpc"),
    ("Avg. CPE", "AverageCpe"),
    ("Avg. CPM", "AverageCpm"),
    ("Avg. CPV", "AverageCpv"),
    ("Avg. position", "AveragePosition"),
    ("Clicks", "Clicks"),
    ("Conv. rate", "ConversionRate"),
    ("Conversions", "Conversions"),
    ("Total conv. value", "ConversionValue"),
    ("Cost", "Cost"),
    ("Cost / conv.", "CostPerConversion"),
    ("Cross-device conv.", "CrossDeviceConversions"),
    ("CTR", "Ctr"),
    ("Engagement rate", "EngagementRate"),
    ("Engagements", "Engagements"),
    ("Impressions", "Impressions"),
    ("Interaction Rate", "InteractionRate"),
    ("Interactions", "Interactions"),
    ("Interaction Types", "InteractionTypes"),
    ("Mobile-friendly click rate", "PercentageMobileFriendlyClicks"),
    ("Valid AMP click rate", "PercentageValidAcceleratedMobilePagesClicks"),
    ("Mobile speed score", "SpeedScore"),
    ("Value / conv.", "ValuePerConversion"),
    ("View rate", "VideoViewRate"),
];

/// Date window for the report query.
#[derive(Debug, PartialEq, Eq)]
pub enum DateRange {
    Yesterday,
    Today,
    Between(NaiveDate, NaiveDate),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("startdate {0} is in the future")]
    FutureStart(NaiveDate),
}

/// Picks the report window: default lookback when no start date is stored,
/// otherwise from the stored date through today.
pub fn date_range(start: Option<NaiveDate>, today: NaiveDate) -> Result<DateRange, DateRangeError> {
    match start {
        None => Ok(DateRange::Yesterday),
        Some(date) if date == today => Ok(DateRange::Today),
        Some(date) if date > today => Err(DateRangeError::FutureStart(date)),
        Some(date) => Ok(DateRange::Between(date, today)),
    }
}

/// Builds the AWQL report query for the given window.
pub fn report_query(range: &DateRange) -> String {
    let fields: Vec<&str> = REPORT_COLS.iter().map(|(_, field)| *field).collect();
    let mut query = format!("SELECT {} FROM LANDING_PAGE_REPORT", fields.join(","));
    match range {
        DateRange::Yesterday => query.push_str(" DURING YESTERDAY"),
        DateRange::Today => query.push_str(" DURING TODAY"),
        DateRange::Between(start, end) => {
            query.push_str(&format!(
                " DURING {},{}",
                start.format("%Y%m%d"),
                end.format("%Y%m%d")
            ));
        }
    }
    query
}

/// Strips everything from `{ignore}` onward and a then-trailing lone `?`.
pub fn base_url(landing_page: &str) -> String {
    let truncated = match landing_page.find("{ignore}") {
        Some(index) => &landing_page[..index],
        None => landing_page,
    };
    truncated.strip_suffix('?').unwrap_or(truncated).to_string()
}

/// Coerces a raw report cell. Percent strings become fractions, plain digit
/// runs become numbers and the report's ` --` placeholder becomes null;
/// anything else stays a string.
fn coerce(raw: &str) -> Value {
    if let Some(percent) = raw.strip_suffix('%') {
        if let Ok(number) = percent.parse::<f64>() {
            return Value::from(number / 100.0);
        }
    }
    if !raw.is_empty() && raw.bytes().all(|byte| byte.is_ascii_digit()) {
        if let Ok(number) = raw.parse::<f64>() {
            return Value::from(number);
        }
    }
    if raw == " --" {
        return Value::Null;
    }
    Value::from(raw)
}

pub type ReportRow = Map<String, Value>;

#[derive(Debug, Error)]
pub enum ReshapeError {
    #[error("report is missing a header row")]
    MissingHeader,
}

/// Reshapes the raw report CSV: header names are remapped to warehouse field
/// names, each row is annotated with the base URL, CID and client name, and
/// cell values are coerced. Unknown columns are logged and dropped. The
/// report never quotes fields, so a plain comma split is sufficient.
pub fn reshape(
    report_csv: &str,
    customer_id: &str,
    client_name: &str,
) -> Result<Vec<ReportRow>, ReshapeError> {
    let mut lines = report_csv.lines().filter(|line| !line.is_empty());
    let header = lines.next().ok_or(ReshapeError::MissingHeader)?;

    let columns: Vec<Option<&str>> = header
        .split(',')
        .map(|name| {
            let mapped = REPORT_COLS
                .iter()
                .find(|(api, _)| *api == name)
                .map(|(_, field)| *field);
            if mapped.is_none() {
                tracing::warn!(column = name, "unknown report column, skipping");
            }
            mapped
        })
        .collect();

    let mut rows = Vec::new();
    for line in lines {
        let mut row = ReportRow::new();
        let mut landing_page = "";
        for (field, raw) in columns.iter().zip(line.split(',')) {
            let Some(field) = field else { continue };
            if *field == "UnexpandedFinalUrlString" {
                landing_page = raw;
            }
            row.insert((*field).to_string(), coerce(raw));
        }
        row.insert("BaseUrl".to_string(), coerce(&base_url(landing_page)));
        row.insert("CID".to_string(), coerce(customer_id));
        row.insert("ClientName".to_string(), coerce(client_name));
        rows.push(row);
    }
    Ok(rows)
}

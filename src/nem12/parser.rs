//! Classification and field extraction for NEM12 rows.
//!
//! Only `200` (NMI data details) and `300` (interval data) records are
//! interpreted. Every other record type is handed back unparsed.

use crate::domain::{
    IntervalMinutes, NewIntervalBlock, NewMeterBlock, Nmi, TimelineError, MAX_QUALITY_METHOD_LEN,
    MAX_REASON_DESCRIPTION_LEN, SUPPORTED_UNIT,
};
use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

pub const METER_DETAILS_CODE: &str = "200";
pub const INTERVAL_DATA_CODE: &str = "300";

/// Exact width of a `200` record.
pub const METER_DETAILS_FIELDS: usize = 10;
/// Fixed fields after the value run of a `300` record: quality method,
/// reason code, reason description, update timestamp, MSATS load timestamp.
pub const INTERVAL_TRAILER_FIELDS: usize = 5;
/// Record code and interval date.
const INTERVAL_LEADING_FIELDS: usize = 2;

const DATE_FORMAT: &str = "%Y%m%d";
const DATE_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// A failure confined to a single row. The rest of the file is unaffected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("record {record} expects {expected} fields, found {found}")]
    FieldCount {
        record: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("record {record} expects at least {minimum} fields, found {found}")]
    TooFewFields {
        record: &'static str,
        minimum: usize,
        found: usize,
    },
    #[error("malformed {field} '{value}': {reason}")]
    MalformedField {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("unsupported unit of measure '{0}', only KWH is accepted")]
    UnsupportedUnit(String),
    #[error(transparent)]
    ShapeMismatch(#[from] TimelineError),
    #[error("interval data belongs to the rejected 200 record on line {meter_line}")]
    RejectedMeter { meter_line: u64 },
}

impl RowError {
    pub(crate) fn malformed(field: &'static str, value: &str, reason: impl ToString) -> Self {
        RowError::MalformedField {
            field,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Record type indicated by a row's leading field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    MeterDetails,
    IntervalData,
    Other,
}

impl RecordType {
    /// Classify a row by its first field. Returns `None` for a row whose
    /// fields are all blank.
    pub fn classify(fields: &[String]) -> Option<RecordType> {
        if fields.iter().all(|f| f.trim().is_empty()) {
            return None;
        }
        let code = fields.first().map(|f| f.trim()).unwrap_or_default();
        Some(match code {
            METER_DETAILS_CODE => RecordType::MeterDetails,
            INTERVAL_DATA_CODE => RecordType::IntervalData,
            _ => RecordType::Other,
        })
    }
}

/// A `300` record: block header plus the raw value run, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalRecord {
    pub header: NewIntervalBlock,
    pub values: Vec<f64>,
}

/// Parse a `200` record:
/// `200,NMI,config,register,suffix,stream,meterSerial,UOM,intervalLength,nextReadDate`.
pub fn parse_meter_details(fields: &[String]) -> Result<NewMeterBlock, RowError> {
    if fields.len() != METER_DETAILS_FIELDS {
        return Err(RowError::FieldCount {
            record: METER_DETAILS_CODE,
            expected: METER_DETAILS_FIELDS,
            found: fields.len(),
        });
    }

    let unit_of_measure = fields[7].trim();
    if unit_of_measure != SUPPORTED_UNIT {
        return Err(RowError::UnsupportedUnit(unit_of_measure.to_string()));
    }

    let nmi_raw = fields[1].trim();
    let nmi = nmi_raw
        .parse::<i64>()
        .map_err(|e| RowError::malformed("nmi", nmi_raw, e))?;

    let interval_raw = fields[8].trim();
    let interval_minutes = interval_raw
        .parse::<u32>()
        .map_err(|e| RowError::malformed("interval length", interval_raw, e))
        .and_then(|m| {
            IntervalMinutes::new(m).map_err(|e| RowError::malformed("interval length", interval_raw, e))
        })?;

    Ok(NewMeterBlock {
        nmi: Nmi::new(nmi),
        meter_serial: fields[6].trim().to_string(),
        unit_of_measure: unit_of_measure.to_string(),
        interval_minutes,
    })
}

/// Parse a `300` record:
/// `300,YYYYMMDD,v1,...,vN,quality,reasonCode,reasonDesc,updateTs,msatsTs`.
///
/// The value run is everything between the date and the fixed trailer, so
/// this does not need to know the meter's interval length. Checking the run
/// against the expected reading count happens when readings are built.
pub fn parse_interval_data(fields: &[String]) -> Result<IntervalRecord, RowError> {
    let minimum = INTERVAL_LEADING_FIELDS + 1 + INTERVAL_TRAILER_FIELDS;
    if fields.len() < minimum {
        return Err(RowError::TooFewFields {
            record: INTERVAL_DATA_CODE,
            minimum,
            found: fields.len(),
        });
    }

    let interval_date = parse_date(fields[1].trim())?;

    let trailer_start = fields.len() - INTERVAL_TRAILER_FIELDS;
    let values = fields[INTERVAL_LEADING_FIELDS..trailer_start]
        .iter()
        .map(|raw| parse_value(raw.trim()))
        .collect::<Result<Vec<f64>, RowError>>()?;

    let trailer = &fields[trailer_start..];

    let quality_method = trailer[0].trim();
    if quality_method.chars().count() > MAX_QUALITY_METHOD_LEN {
        return Err(RowError::malformed(
            "quality method",
            quality_method,
            format!("longer than {} characters", MAX_QUALITY_METHOD_LEN),
        ));
    }

    let reason_raw = trailer[1].trim();
    let reason_code = if reason_raw.is_empty() {
        None
    } else {
        Some(
            reason_raw
                .parse::<i32>()
                .map_err(|e| RowError::malformed("reason code", reason_raw, e))?,
        )
    };

    let description = trailer[2].trim();
    if description.chars().count() > MAX_REASON_DESCRIPTION_LEN {
        return Err(RowError::malformed(
            "reason description",
            description,
            format!("longer than {} characters", MAX_REASON_DESCRIPTION_LEN),
        ));
    }
    let reason_description = (!description.is_empty()).then(|| description.to_string());

    let update_timestamp = parse_date_time("update timestamp", trailer[3].trim())?;

    let msats_raw = trailer[4].trim();
    let msats_load_timestamp = if msats_raw.is_empty() {
        None
    } else {
        Some(parse_date_time("MSATS load timestamp", msats_raw)?)
    };

    Ok(IntervalRecord {
        header: NewIntervalBlock {
            interval_date,
            quality_method: quality_method.to_string(),
            reason_code,
            reason_description,
            update_timestamp,
            msats_load_timestamp,
        },
        values,
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, RowError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| RowError::malformed("interval date", raw, e))
}

fn parse_date_time(field: &'static str, raw: &str) -> Result<NaiveDateTime, RowError> {
    NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT).map_err(|e| RowError::malformed(field, raw, e))
}

fn parse_value(raw: &str) -> Result<f64, RowError> {
    let value = raw
        .parse::<f64>()
        .map_err(|e| RowError::malformed("interval value", raw, e))?;
    if !value.is_finite() {
        return Err(RowError::malformed("interval value", raw, "not a finite number"));
    }
    Ok(value)
}

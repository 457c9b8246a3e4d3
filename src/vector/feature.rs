use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use crate::errors::{GdalError, Result};
use crate::vector::defn::{Defn, FieldType};

/// A feature: attribute values, an optional geometry and a feature id.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    defn: Arc<Defn>,
    fid: Option<u64>,
    fields: Vec<Option<FieldValue>>,
    geometry: Option<geo_types::Geometry<f64>>,
}

impl Feature {
    /// A feature with every field unset.
    pub fn new(defn: Arc<Defn>) -> Self {
        let fields = vec![None; defn.field_count()];
        Feature {
            defn,
            fid: None,
            fields,
            geometry: None,
        }
    }

    pub fn defn(&self) -> &Defn {
        &self.defn
    }

    pub fn fid(&self) -> Option<u64> {
        self.fid
    }

    pub fn set_fid(&mut self, fid: Option<u64>) {
        self.fid = fid;
    }

    /// Get the value of a named field. If the field exists, it returns a
    /// [`FieldValue`] wrapper, that you need to unpack to a base type
    /// (string, float, etc). If the field is null, returns `None`.
    pub fn field(&self, name: &str) -> Result<Option<FieldValue>> {
        let index = self.defn.field_index(name)?;
        self.field_by_index(index)
    }

    pub fn field_by_index(&self, index: usize) -> Result<Option<FieldValue>> {
        self.fields
            .get(index)
            .cloned()
            .ok_or(GdalError::InvalidFieldIndex {
                index,
                method_name: "field_by_index",
            })
    }

    /// Stores `value` in field `index`. The value must match the field type.
    pub fn set_field_by_index(&mut self, index: usize, value: Option<FieldValue>) -> Result<()> {
        let field_type = self.defn.field(index)?.field_type();
        if let Some(value) = &value {
            if value.field_type() != field_type {
                return Err(GdalError::UnhandledFieldType {
                    field_type: value.field_type().to_string(),
                    method_name: "set_field_by_index",
                });
            }
        }
        self.fields[index] = value;
        Ok(())
    }

    pub fn set_field(&mut self, name: &str, value: Option<FieldValue>) -> Result<()> {
        let index = self.defn.field_index(name)?;
        self.set_field_by_index(index, value)
    }

    /// Get the feature's geometry.
    pub fn geometry(&self) -> Option<&geo_types::Geometry<f64>> {
        self.geometry.as_ref()
    }

    pub fn set_geometry(&mut self, geometry: Option<geo_types::Geometry<f64>>) {
        self.geometry = geometry;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    IntegerValue(i32),
    Integer64Value(i64),
    StringValue(String),
    RealValue(f64),
    DateValue(NaiveDate),
    DateTimeValue(DateTime<FixedOffset>),
}

impl FieldValue {
    /// Parses the text form of a value, as sent by SQL servers.
    ///
    /// Returns `None` for text that is not a valid value of `field_type`,
    /// such as the zero date `0000-00-00`.
    pub fn parse(field_type: FieldType, text: &str) -> Option<FieldValue> {
        let text = text.trim();
        match field_type {
            FieldType::Integer => text.parse().ok().map(FieldValue::IntegerValue),
            FieldType::Integer64 => text.parse().ok().map(FieldValue::Integer64Value),
            FieldType::Real => text.parse().ok().map(FieldValue::RealValue),
            FieldType::String => Some(FieldValue::StringValue(text.to_string())),
            FieldType::Date => parse_date(text).map(FieldValue::DateValue),
            FieldType::DateTime => parse_datetime(text).map(FieldValue::DateTimeValue),
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::IntegerValue(_) => FieldType::Integer,
            FieldValue::Integer64Value(_) => FieldType::Integer64,
            FieldValue::StringValue(_) => FieldType::String,
            FieldValue::RealValue(_) => FieldType::Real,
            FieldValue::DateValue(_) => FieldType::Date,
            FieldValue::DateTimeValue(_) => FieldType::DateTime,
        }
    }

    /// Interpret the value as `String`.
    pub fn into_string(self) -> Option<String> {
        match self {
            FieldValue::StringValue(rv) => Some(rv),
            _ => None,
        }
    }

    /// Interpret the value as `f64`.
    pub fn into_real(self) -> Option<f64> {
        match self {
            FieldValue::RealValue(rv) => Some(rv),
            _ => None,
        }
    }

    /// Interpret the value as `i32`.
    pub fn into_int(self) -> Option<i32> {
        match self {
            FieldValue::IntegerValue(rv) => Some(rv),
            FieldValue::Integer64Value(rv) => i32::try_from(rv).ok(),
            _ => None,
        }
    }

    /// Interpret the value as `i64`.
    pub fn into_int64(self) -> Option<i64> {
        match self {
            FieldValue::IntegerValue(rv) => Some(rv.into()),
            FieldValue::Integer64Value(rv) => Some(rv),
            _ => None,
        }
    }

    /// Interpret the value as a date.
    pub fn into_date(self) -> Option<NaiveDate> {
        match self {
            FieldValue::DateValue(rv) => Some(rv),
            FieldValue::DateTimeValue(rv) => Some(rv.date_naive()),
            _ => None,
        }
    }

    /// Interpret the value as `DateTime`.
    pub fn into_datetime(self) -> Option<DateTime<FixedOffset>> {
        match self {
            FieldValue::DateTimeValue(rv) => Some(rv),
            _ => None,
        }
    }
}

/// `YYYY-MM-DD`
fn parse_date(text: &str) -> Option<NaiveDate> {
    let mut parts = text.splitn(3, '-');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `YYYY-MM-DD HH:MM:SS[.ffffff]`, taken as UTC.
fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    let (date, time) = text.split_once([' ', 'T']).unwrap_or((text, "00:00:00"));
    let date = parse_date(date)?;
    let (hms, fraction) = time.split_once('.').unwrap_or((time, ""));
    let mut parts = hms.splitn(3, ':');
    let hour = parts.next()?.parse().ok()?;
    let minute = parts.next()?.parse().ok()?;
    let second = parts.next()?.parse().ok()?;
    let micro = match fraction {
        "" => 0,
        digits => format!("{digits:0<6}").get(..6)?.parse().ok()?,
    };
    let time = NaiveTime::from_hms_micro_opt(hour, minute, second, micro)?;
    let utc = FixedOffset::east_opt(0)?;
    Some(utc.from_utc_datetime(&NaiveDateTime::new(date, time)))
}

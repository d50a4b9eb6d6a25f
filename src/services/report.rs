//! Report rows for auxiliary category buckets
//!
//! Dates and times are written as spreadsheet formulas (`=DATE(y,m,d)`,
//! `=TIME(h,m,0)`) so the receiving sheet stores real date values.

use crate::domain::transaction::{CustomerDetails, Store};
use crate::infra::config::{ReportSettings, ReportTimezone, RowLayout};
use crate::io::publisher::ReportRow;
use crate::services::classifier::AuxBucket;
use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

/// Everything about the order a report row may mention
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub order_id: &'a str,
    pub store: &'a Store,
    pub closed_at: DateTime<Utc>,
    pub customer: Option<&'a CustomerDetails>,
    pub settings: &'a ReportSettings,
}

/// Wall-clock time in the report timezone
pub fn localize(t: DateTime<Utc>, timezone: ReportTimezone) -> NaiveDateTime {
    match timezone {
        ReportTimezone::Local => t.with_timezone(&Local).naive_local(),
        ReportTimezone::Utc => t.naive_utc(),
    }
}

pub fn sheet_date(t: NaiveDateTime) -> String {
    t.format("=DATE(%Y,%m,%d)").to_string()
}

pub fn sheet_time(t: NaiveDateTime) -> String {
    t.format("=TIME(%H,%M,0)").to_string()
}

/// Close time shifted by `days`; the close time itself if that leaves the calendar
fn pickup_date(local: NaiveDateTime, days: u32) -> NaiveDateTime {
    TimeDelta::try_days(i64::from(days))
        .and_then(|delta| local.checked_add_signed(delta))
        .unwrap_or(local)
}

/// Customer name, or the placeholder when no usable name is known
fn customer_label(customer: Option<&CustomerDetails>, placeholder: &str) -> String {
    match customer {
        Some(c) if !c.name.is_empty() => c.name.clone(),
        _ => placeholder.to_string(),
    }
}

/// Quantities as JSON numbers where they parse as such
fn decimal_value(value: Decimal) -> Value {
    value
        .normalize()
        .to_string()
        .parse::<serde_json::Number>()
        .map(Value::Number)
        .unwrap_or_else(|_| Value::String(value.to_string()))
}

fn push_quantities(row: &mut ReportRow, bucket: &AuxBucket) {
    for (key, qty) in &bucket.quantities {
        row.insert(key.clone(), decimal_value(*qty));
    }
}

/// Row for the badge layout: location, date, time, badge, quantities, extras
pub fn badge_row(bucket: &AuxBucket, ctx: &RowContext<'_>) -> ReportRow {
    let local = localize(ctx.closed_at, ctx.settings.timezone);
    let mut row = ReportRow::new();
    row.insert("Location".to_string(), Value::String(ctx.store.short_name.clone()));
    row.insert("Date".to_string(), Value::String(sheet_date(local)));
    row.insert("Time".to_string(), Value::String(sheet_time(local)));
    row.insert(
        "BadgeID".to_string(),
        Value::String(customer_label(ctx.customer, &ctx.settings.placeholder)),
    );
    push_quantities(&mut row, bucket);
    for (key, value) in &bucket.extra {
        row.entry(key.clone()).or_insert_with(|| Value::String(value.clone()));
    }
    row
}

/// Row for the reservation layout: order, location, customer, dates, quantities
pub fn reservation_row(bucket: &AuxBucket, ctx: &RowContext<'_>) -> ReportRow {
    let local = localize(ctx.closed_at, ctx.settings.timezone);
    let pickup = pickup_date(local, ctx.settings.pickup_days);
    let mut row = ReportRow::new();
    row.insert("orderID".to_string(), Value::String(ctx.order_id.to_string()));
    row.insert("location".to_string(), Value::String(ctx.store.short_name.clone()));
    row.insert(
        "customerName".to_string(),
        Value::String(customer_label(ctx.customer, &ctx.settings.placeholder)),
    );
    row.insert("reservationDate".to_string(), Value::String(sheet_date(local)));
    row.insert("pickupDate".to_string(), Value::String(sheet_date(pickup)));
    push_quantities(&mut row, bucket);
    row
}

pub fn build_row(bucket: &AuxBucket, ctx: &RowContext<'_>) -> ReportRow {
    match bucket.layout {
        RowLayout::Badge => badge_row(bucket, ctx),
        RowLayout::Reservation => reservation_row(bucket, ctx),
    }
}

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use regex_lite::Regex;
use scraper::{ElementRef, Selector};
use static_init::dynamic;

use crate::constants::SITE_TIMEZONE;
use crate::errors::{ClientError, Result};

pub mod billing_mapper;
pub mod gourmet_parser;
pub mod ventopay_parser;

const GOURMET_DATE_FMT: &str = "%m-%d-%Y";
const GOURMET_ORDER_DATE_FMT: &str = "%d.%m.%Y %H:%M:%S";
const VENTOPAY_DATE_FMT: &str = "%d.%m.%Y";

/// `MM-dd-yyyy`, used by the menu markup and the cart api.
pub fn format_gourmet_date(date: NaiveDate) -> String {
    date.format(GOURMET_DATE_FMT).to_string()
}

pub fn parse_gourmet_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), GOURMET_DATE_FMT)
        .map_err(|e| ClientError::parse(format!("invalid menu date '{}': {}", text, e)))
}

/// `dd.MM.yyyy HH:mm:ss`, used on the orders page.
pub fn format_gourmet_order_date(date: NaiveDateTime) -> String {
    date.format(GOURMET_ORDER_DATE_FMT).to_string()
}

pub fn parse_gourmet_order_date(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    let err = |e: chrono::ParseError| ClientError::parse(format!("invalid order date '{}': {}", text, e));

    match text.split_once(' ') {
        Some(_) => NaiveDateTime::parse_from_str(text, GOURMET_ORDER_DATE_FMT).map_err(err),
        // date only, midnight
        None => Ok(NaiveDate::parse_from_str(text, "%d.%m.%Y")
            .map_err(err)?
            .and_time(NaiveTime::MIN)),
    }
}

/// `dd.MM.yyyy`, used in the Ventopay transaction query.
pub fn format_ventopay_date(date: NaiveDate) -> String {
    date.format(VENTOPAY_DATE_FMT).to_string()
}

pub fn parse_ventopay_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), VENTOPAY_DATE_FMT)
        .map_err(|e| ClientError::parse(format!("invalid ventopay date '{}': {}", text, e)))
}

fn german_month(name: &str) -> Option<u32> {
    let abbr: String = name.to_lowercase().chars().take(3).collect();
    let month = match abbr.as_str() {
        "jan" | "jän" => 1,
        "feb" => 2,
        "mär" | "mar" => 3,
        "apr" => 4,
        "mai" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "okt" => 10,
        "nov" => 11,
        "dez" => 12,
        _ => return None,
    };
    Some(month)
}

/// Parses Ventopay timestamps like `09. Feb 2026 - 11:49 Uhr`.
pub fn parse_ventopay_timestamp(text: &str) -> Result<NaiveDateTime> {
    #[dynamic]
    static RE: Regex =
        Regex::new(r"(\d{1,2})\.\s*(\S+)\s+(\d{4})\s*-\s*(\d{1,2}):(\d{2})").unwrap();

    let invalid = || ClientError::parse(format!("invalid ventopay timestamp '{}'", text.trim()));
    let caps = RE.captures(text).ok_or_else(invalid)?;

    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let (day, hour, minute) = (num(1), num(4), num(5));
    let year = caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok());
    let month = caps.get(2).and_then(|m| german_month(m.as_str()));

    match (year, month, day, hour, minute) {
        (Some(y), Some(mo), Some(d), Some(h), Some(mi)) => NaiveDate::from_ymd_opt(y, mo, d)
            .and_then(|date| date.and_hms_opt(h, mi, 0))
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

/// `€ 1,80` -> 1.8; anything unreadable is 0.
pub fn parse_german_currency(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '-')
        .collect();
    cleaned.replace(',', ".").parse().unwrap_or(0.0)
}

/// Current wall-clock time at the portals, independent of the machine's zone.
pub fn site_now() -> NaiveDateTime {
    Utc::now().with_timezone(&SITE_TIMEZONE).naive_local()
}

/// Today's menus can't be ordered from 12:30 site time on, other days never block.
pub fn is_ordering_cutoff(menu_day: NaiveDate, now: NaiveDateTime) -> bool {
    if menu_day != now.date() {
        return false;
    }
    now.hour() * 60 + now.minute() >= 12 * 60 + 30
}

// shared markup helpers

pub(crate) fn find_input<'a>(
    scope: ElementRef<'a>,
    name_matches: &dyn Fn(&str) -> bool,
) -> Option<ElementRef<'a>> {
    #[dynamic]
    static INPUT: Selector = Selector::parse("input").unwrap();

    scope
        .select(&INPUT)
        .find(|input| input.value().attr("name").is_some_and(name_matches))
}

pub(crate) fn input_value(scope: ElementRef<'_>, name: &str) -> Option<String> {
    find_input(scope, &|n| n == name)
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
}

/// Only the element's own text nodes, nested elements are skipped.
pub(crate) fn direct_text(el: ElementRef<'_>) -> String {
    el.children()
        .filter_map(|child| child.value().as_text())
        .map(|text| &**text)
        .collect::<String>()
        .trim()
        .to_string()
}

pub(crate) fn full_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

//! Thai formatting for generated forms.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};

/// Offset between the Gregorian and Buddhist-era year.
pub const BUDDHIST_ERA_OFFSET: i32 = 543;

/// Dates on forms are rendered in Thailand time (UTC+7, no DST).
const THAI_OFFSET_SECS: i32 = 7 * 3600;

const THAI_MONTHS: [&str; 12] = [
    "มกราคม",
    "กุมภาพันธ์",
    "มีนาคม",
    "เมษายน",
    "พฤษภาคม",
    "มิถุนายน",
    "กรกฎาคม",
    "สิงหาคม",
    "กันยายน",
    "ตุลาคม",
    "พฤศจิกายน",
    "ธันวาคม",
];

const THAI_DIGITS: [&str; 10] = [
    "ศูนย์", "หนึ่ง", "สอง", "สาม", "สี่", "ห้า", "หก", "เจ็ด", "แปด", "เก้า",
];
const THAI_UNITS: [&str; 6] = ["", "สิบ", "ร้อย", "พัน", "หมื่น", "แสน"];

fn thai_offset() -> FixedOffset {
    FixedOffset::east_opt(THAI_OFFSET_SECS).expect("UTC+7 is a valid offset")
}

/// `15 มีนาคม 2568` for a UTC instant, in Thailand local time.
pub fn format_thai_date(at: DateTime<Utc>) -> String {
    let local = at.with_timezone(&thai_offset()).date_naive();
    format_thai_naive_date(local)
}

/// `15 มีนาคม 2568` for a calendar date.
pub fn format_thai_naive_date(date: NaiveDate) -> String {
    let month = THAI_MONTHS[(date.month0() as usize).min(THAI_MONTHS.len() - 1)];
    format!("{} {} {}", date.day(), month, date.year() + BUDDHIST_ERA_OFFSET)
}

/// Buddhist-era year of a date.
pub fn thai_year(date: NaiveDate) -> String {
    (date.year() + BUDDHIST_ERA_OFFSET).to_string()
}

/// Buddhist-era year of now, in Thailand local time.
pub fn current_thai_year() -> i32 {
    Utc::now().with_timezone(&thai_offset()).year() + BUDDHIST_ERA_OFFSET
}

/// `1234567.891` → `1,234,567.89`
pub fn format_amount(amount: f64) -> String {
    let formatted = format!("{:.2}", amount);
    let (integer, decimals) = formatted.split_once('.').unwrap_or((formatted.as_str(), ""));
    let (sign, digits) = match integer.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", integer),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if decimals.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, decimals)
    }
}

/// Amount in Thai words, e.g. `หนึ่งพันบาทถ้วน` or `ห้าสิบบาทยี่สิบห้าสตางค์`.
pub fn baht_text(amount: f64) -> String {
    if amount == 0.0 {
        return format!("{}บาทถ้วน", THAI_DIGITS[0]);
    }

    let total_satang = (amount * 100.0).round() as i64;
    let baht = total_satang / 100;
    let satang = total_satang % 100;

    let mut text = if baht == 0 {
        THAI_DIGITS[0].to_string()
    } else {
        read_number(baht)
    };
    text.push_str("บาท");

    if satang == 0 {
        text.push_str("ถ้วน");
    } else {
        text.push_str(&read_number(satang));
        text.push_str("สตางค์");
    }
    text
}

fn read_number(number: i64) -> String {
    if number <= 0 {
        return String::new();
    }
    if number >= 1_000_000 {
        let mut text = read_number(number / 1_000_000);
        text.push_str("ล้าน");
        text.push_str(&read_number(number % 1_000_000));
        return text;
    }

    let digits: Vec<usize> = number
        .to_string()
        .bytes()
        .map(|b| (b - b'0') as usize)
        .collect();
    let len = digits.len();

    let mut text = String::new();
    for (i, &digit) in digits.iter().enumerate() {
        if digit == 0 {
            continue;
        }
        let position = len - i - 1;
        match (position, digit) {
            (0, 1) if len > 1 => text.push_str("เอ็ด"),
            (1, 1) => text.push_str("สิบ"),
            (1, 2) => text.push_str("ยี่สิบ"),
            _ => {
                text.push_str(THAI_DIGITS[digit]);
                text.push_str(THAI_UNITS[position]);
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_thai_date_uses_bangkok_day() {
        // 20:00 UTC on 14 March is already 15 March in Bangkok.
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 20, 0, 0).unwrap();
        assert_eq!(format_thai_date(at), "15 มีนาคม 2568");
    }

    #[test]
    fn test_thai_year() {
        assert_eq!(thai_year(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()), "2567");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(999.5), "999.50");
        assert_eq!(format_amount(1234567.891), "1,234,567.89");
        assert_eq!(format_amount(-20000.0), "-20,000.00");
    }

    #[test]
    fn test_baht_text() {
        assert_eq!(baht_text(0.0), "ศูนย์บาทถ้วน");
        assert_eq!(baht_text(1000.0), "หนึ่งพันบาทถ้วน");
        assert_eq!(baht_text(21.0), "ยี่สิบเอ็ดบาทถ้วน");
        assert_eq!(baht_text(50.25), "ห้าสิบบาทยี่สิบห้าสตางค์");
        assert_eq!(baht_text(0.5), "ศูนย์บาทห้าสิบสตางค์");
        assert_eq!(baht_text(2_000_000.0), "สองล้านบาทถ้วน");
        assert_eq!(baht_text(110.0), "หนึ่งร้อยสิบบาทถ้วน");
    }
}

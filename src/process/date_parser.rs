use chrono::{Datelike, NaiveDate};

/// Days from 0001-01-01 (CE) to 1970-01-01, the Arrow `Date32` epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Strict parse of `"YYYY-MM-DD"` → calendar date.
///
/// Only the exact 4-2-2 digit layout is accepted (after trimming surrounding
/// whitespace); anything else, including impossible dates, is `None`.
pub fn parse_review_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.len() != 10 || !s.is_ascii() || &s[4..5] != "-" || &s[7..8] != "-" {
        return None;
    }
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !digits(&s[0..4]) || !digits(&s[5..7]) || !digits(&s[8..10]) {
        return None;
    }
    let year: i32 = s[0..4].parse().ok()?;
    let month: u32 = s[5..7].parse().ok()?;
    let day: u32 = s[8..10].parse().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Calendar date → Arrow `Date32` value (days since the Unix epoch).
pub fn to_date32(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_dates() {
        assert_eq!(
            parse_review_date("2023-05-01"),
            NaiveDate::from_ymd_opt(2023, 5, 1)
        );
        assert_eq!(
            parse_review_date(" 2024-02-29 "),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn rejects_other_layouts() {
        for bad in [
            "05/01/2023",
            "2023/05/01",
            "2023-5-1",
            "2023-05-01 10:00:00",
            "2023-02-30",
            "2023-13-01",
            "+023-05-01",
            "",
            "yesterday",
            "2023-05-0é",
        ] {
            assert_eq!(parse_review_date(bad), None, "{bad:?} should not parse");
        }
    }

    #[test]
    fn date32_counts_days_from_epoch() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(to_date32(epoch), 0);
        let d = NaiveDate::from_ymd_opt(2023, 5, 1).unwrap();
        assert_eq!(to_date32(d), 19_478);
    }
}

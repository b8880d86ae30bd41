use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// `/remove_time_spent`で生成されるnoteの本文。
pub const REMOVAL_BODY: &str = "removed time spent";

const TIME_SPENT_MARKER: &str = "time spent";

static DURATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(added|subtracted) (.*) of time spent").expect("invalid duration regex")
});
static DATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"at ([0-9]{4}-[0-9]{2}-[0-9]{2})$").expect("invalid date regex"));

const MONTH_SECONDS: i64 = 576_000;
const WEEK_SECONDS: i64 = 144_000;
const DAY_SECONDS: i64 = 28_800;
const HOUR_SECONDS: i64 = 3_600;
const MINUTE_SECONDS: i64 = 60;

/// noteの解析に失敗した場合のエラー。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NoteParseError {
    #[error("note does not describe a change of time spent: {0:?}")]
    Malformed(String),
    #[error("invalid quantity in duration token {0:?}")]
    InvalidQuantity(String),
    #[error("unknown time unit in duration token {0:?}")]
    UnknownUnit(String),
    #[error("duration is out of range: {0:?}")]
    Overflow(String),
    #[error("invalid date {0:?}")]
    InvalidDate(String),
}

/// system noteの種類。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteKind {
    /// それまでに記録された作業時間をすべて取り消すnote。
    Removal,
    /// 作業時間を加算または減算するnote。
    TimeSpent,
    Other,
}

impl NoteKind {
    /// note本文から種類を判定する。本文の解析は行わない。
    pub fn of(body: &str) -> Self {
        if body == REMOVAL_BODY {
            NoteKind::Removal
        } else if body.contains(TIME_SPENT_MARKER) {
            NoteKind::TimeSpent
        } else {
            NoteKind::Other
        }
    }
}

/// 解析済みのnote。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParsedNote {
    Removal,
    TimeSpent {
        duration: i64,
        date: Option<NaiveDate>,
    },
    Other,
}

/// note本文を解析する。
///
/// 作業時間のnoteで本文が想定した形式でない場合はエラーを返す。
///
/// # Examples
///
/// ```
/// let note = parse("added 1h 30m of time spent at 2024-01-01")?;
/// ```
pub fn parse(body: &str) -> Result<ParsedNote, NoteParseError> {
    match NoteKind::of(body) {
        NoteKind::Removal => Ok(ParsedNote::Removal),
        NoteKind::TimeSpent => Ok(ParsedNote::TimeSpent {
            duration: parse_duration(body)?,
            date: parse_date(body)?,
        }),
        NoteKind::Other => Ok(ParsedNote::Other),
    }
}

/// `added 1mo 2w 3d 4h 5m 6s of time spent`形式の本文から秒数を取り出す。
///
/// `subtracted`の場合は負の値を返す。
pub fn parse_duration(body: &str) -> Result<i64, NoteParseError> {
    let captures = DURATION_REGEX
        .captures(body)
        .ok_or_else(|| NoteParseError::Malformed(body.to_string()))?;

    let mut tokens = captures[2].split_whitespace().peekable();
    if tokens.peek().is_none() {
        return Err(NoteParseError::Malformed(body.to_string()));
    }
    let total = tokens.try_fold(0i64, |total, token| {
        total
            .checked_add(parse_token(token)?)
            .ok_or_else(|| NoteParseError::Overflow(body.to_string()))
    })?;

    match &captures[1] {
        "subtracted" => total
            .checked_neg()
            .ok_or_else(|| NoteParseError::Overflow(body.to_string())),
        _ => Ok(total),
    }
}

/// 本文末尾の`at YYYY-MM-DD`から日付を取り出す。
pub fn parse_date(body: &str) -> Result<Option<NaiveDate>, NoteParseError> {
    DATE_REGEX
        .captures(body)
        .map(|captures| {
            let date = &captures[1];
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|_| NoteParseError::InvalidDate(date.to_string()))
        })
        .transpose()
}

/// `<整数><単位>`形式のトークンを秒数に変換する。
fn parse_token(token: &str) -> Result<i64, NoteParseError> {
    // 2文字の単位は`mo`だけなので先に判定する
    let (quantity, unit_seconds) = match token.strip_suffix("mo") {
        Some(quantity) => (quantity, MONTH_SECONDS),
        None => {
            let mut chars = token.chars();
            let unit = chars
                .next_back()
                .ok_or_else(|| NoteParseError::InvalidQuantity(token.to_string()))?;
            let seconds = match unit {
                'w' => WEEK_SECONDS,
                'd' => DAY_SECONDS,
                'h' => HOUR_SECONDS,
                'm' => MINUTE_SECONDS,
                's' => 1,
                _ => return Err(NoteParseError::UnknownUnit(token.to_string())),
            };
            (chars.as_str(), seconds)
        }
    };

    // 符号付きの数量は受け付けない
    if quantity.is_empty() || !quantity.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(NoteParseError::InvalidQuantity(token.to_string()));
    }
    let quantity: i64 = quantity
        .parse()
        .map_err(|_| NoteParseError::Overflow(token.to_string()))?;
    quantity
        .checked_mul(unit_seconds)
        .ok_or_else(|| NoteParseError::Overflow(token.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rstest::rstest;

    use super::{parse, parse_date, parse_duration, NoteKind, NoteParseError, ParsedNote};

    #[rstest]
    #[case::removal("removed time spent", NoteKind::Removal)]
    #[case::added("added 1h of time spent", NoteKind::TimeSpent)]
    #[case::subtracted("subtracted 30m of time spent at 2024-01-01", NoteKind::TimeSpent)]
    #[case::removal_with_suffix("removed time spent at 2024-01-01", NoteKind::TimeSpent)]
    #[case::estimate("changed time estimate to 1d", NoteKind::Other)]
    #[case::label("added ~bug label", NoteKind::Other)]
    fn test_note_kind(#[case] body: &str, #[case] expected: NoteKind) {
        assert_eq!(NoteKind::of(body), expected);
    }

    /// 正常系のテスト。
    #[rstest]
    #[case::hours("added 1h of time spent", 3_600)]
    #[case::composite("added 2h 30m of time spent", 9_000)]
    #[case::all_units("added 1mo 2w 3d 4h 5m 6s of time spent", 965_106)]
    #[case::month_only("added 2mo of time spent", 1_152_000)]
    #[case::minutes_not_month("added 5m of time spent", 300)]
    #[case::with_date("added 1d of time spent at 2024-02-29", 28_800)]
    #[case::subtracted("subtracted 1h of time spent", -3_600)]
    #[case::subtracted_composite("subtracted 1w 1s of time spent", -144_001)]
    fn test_parse_duration(#[case] body: &str, #[case] expected: i64) {
        assert_eq!(parse_duration(body), Ok(expected));
    }

    /// 異常系のテスト。
    #[rstest]
    #[case::no_verb(
        "1h of time spent",
        NoteParseError::Malformed("1h of time spent".to_string())
    )]
    #[case::no_tokens(
        "added  of time spent",
        NoteParseError::Malformed("added  of time spent".to_string())
    )]
    #[case::unknown_unit(
        "added 3x of time spent",
        NoteParseError::UnknownUnit("3x".to_string())
    )]
    #[case::missing_quantity(
        "added h of time spent",
        NoteParseError::InvalidQuantity("h".to_string())
    )]
    #[case::non_numeric(
        "added twoh of time spent",
        NoteParseError::InvalidQuantity("twoh".to_string())
    )]
    #[case::missing_month_quantity(
        "added mo of time spent",
        NoteParseError::InvalidQuantity("mo".to_string())
    )]
    #[case::overflow(
        "added 99999999999999999mo of time spent",
        NoteParseError::Overflow("99999999999999999mo".to_string())
    )]
    #[case::quantity_too_large(
        "added 99999999999999999999s of time spent",
        NoteParseError::Overflow("99999999999999999999s".to_string())
    )]
    #[case::negative_quantity(
        "added -2h of time spent",
        NoteParseError::InvalidQuantity("-2h".to_string())
    )]
    #[case::positive_sign(
        "added +2h of time spent",
        NoteParseError::InvalidQuantity("+2h".to_string())
    )]
    #[case::minimum_integer(
        "subtracted -9223372036854775808s of time spent",
        NoteParseError::InvalidQuantity("-9223372036854775808s".to_string())
    )]
    fn test_parse_duration_error(#[case] body: &str, #[case] expected: NoteParseError) {
        assert_eq!(parse_duration(body), Err(expected));
    }

    #[rstest]
    #[case::with_date("added 1h of time spent at 2024-01-31", Some(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()))]
    #[case::without_date("added 1h of time spent", None)]
    #[case::not_at_end("added 1h of time spent at 2024-01-31 ", None)]
    #[case::without_at("added 1h of time spent 2024-01-31", None)]
    fn test_parse_date(#[case] body: &str, #[case] expected: Option<NaiveDate>) {
        assert_eq!(parse_date(body), Ok(expected));
    }

    #[test]
    fn test_parse_date_invalid_calendar_date() {
        assert_eq!(
            parse_date("added 1h of time spent at 2024-02-30"),
            Err(NoteParseError::InvalidDate("2024-02-30".to_string()))
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse("removed time spent"), Ok(ParsedNote::Removal));
        assert_eq!(parse("assigned to @alice"), Ok(ParsedNote::Other));
        assert_eq!(
            parse("subtracted 15m of time spent at 2023-12-24"),
            Ok(ParsedNote::TimeSpent {
                duration: -900,
                date: NaiveDate::from_ymd_opt(2023, 12, 24),
            })
        );
        assert_eq!(
            parse("added 1h of time spent"),
            Ok(ParsedNote::TimeSpent {
                duration: 3_600,
                date: None,
            })
        );
    }

    #[test]
    fn test_parse_malformed_time_spent_note() {
        assert!(matches!(
            parse("deleted all of time spent"),
            Err(NoteParseError::Malformed(_))
        ));
    }
}

/// Offset/limit window over a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    pub skip: u64,
    pub limit: Option<u64>,
}

impl Pagination {
    /// No skip and no limit
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Build a window from raw `page` and `size` query values.
    ///
    /// `size` that is missing, unparsable or zero means no limit, and then
    /// the page is ignored. A negative size counts by its absolute value.
    /// `page` is read as a decimal number and the skip is `page * size`
    /// rounded down, so `page=1.5&size=10` skips 15. A missing, unparsable,
    /// or negative page is page zero.
    pub fn from_query(page: Option<&str>, size: Option<&str>) -> Self {
        let limit = match size.and_then(parse_integer).map(i64::unsigned_abs) {
            Some(0) | None => return Self::unbounded(),
            Some(limit) => limit,
        };

        let page = page.and_then(parse_number).unwrap_or(0.0);
        let skip = (page * limit as f64).floor();

        Self {
            // Float to int casts saturate
            skip: if skip > 0.0 { skip as u64 } else { 0 },
            limit: Some(limit),
        }
    }

    /// Apply the window to an ordered sequence
    pub fn apply<T, I>(&self, items: I) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
    {
        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let iter = items.into_iter().skip(skip);
        match self.limit {
            Some(limit) => iter
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            None => iter.collect(),
        }
    }
}

/// Whole-string decimal parse; blank, non-numeric or non-finite input is `None`
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|number| number.is_finite())
}

/// Lenient integer parse: optional leading whitespace and sign, then digits up
/// to the first non-digit. `"12abc"` is 12, `"abc"` is `None`.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }

    let magnitude = rest[..digits_len].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

//! ISO-8601 timestamp parsing
//!
//! Accepts `YYYY-MM-DD`, optionally followed by `T` or a space and
//! `HH:MM:SS`, an optional fraction and an optional `Z` or `±HH[:MM]`
//! offset. Offsets are validated but ignored; every instant is read as UTC.
//!
//! Day-of-month is only range checked, so `2024-02-30` is accepted and lands
//! on 2024-03-01.

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_DAY: i64 = 86_400_000;

/// Parse an ISO-8601 date or date-time into milliseconds since the Unix epoch
///
/// Returns `None` for malformed input or out-of-range components.
///
/// ```rust
/// use typed_scanner::scanner::date::parse_iso8601_ms;
///
/// assert_eq!(parse_iso8601_ms(b"2024-02-29T10:00:00Z"), Some(1_709_200_800_000));
/// assert_eq!(parse_iso8601_ms(b"1970-01-01"), Some(0));
/// assert_eq!(parse_iso8601_ms(b"2024-13-01"), None);
/// ```
pub fn parse_iso8601_ms(input: &[u8]) -> Option<i64> {
    let mut cur = Cursor { input, pos: 0 };

    let year = cur.digits(4)? as i64;
    cur.expect(b'-')?;
    let month = cur.digits(2)?;
    cur.expect(b'-')?;
    let day = cur.digits(2)?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    let mut ms = days_from_civil(year, month, day) * MS_PER_DAY;
    if cur.at_end() {
        return Some(ms);
    }

    match cur.next()? {
        b'T' | b't' | b' ' => {}
        _ => return None,
    }
    let hour = cur.digits(2)?;
    cur.expect(b':')?;
    let minute = cur.digits(2)?;
    cur.expect(b':')?;
    let second = cur.digits(2)?;
    if hour > 23 || minute > 59 || second > 60 {
        return None;
    }
    ms += (hour as i64 * 3_600 + minute as i64 * 60 + second as i64) * MS_PER_SECOND;

    if cur.peek() == Some(b'.') {
        cur.pos += 1;
        ms += cur.fraction_ms()?;
    }

    match cur.peek() {
        None => {}
        Some(b'Z' | b'z') => cur.pos += 1,
        Some(b'+' | b'-') => {
            cur.pos += 1;
            let oh = cur.digits(2)?;
            if cur.peek() == Some(b':') {
                cur.pos += 1;
            }
            let om = if cur.at_end() { 0 } else { cur.digits(2)? };
            if oh > 23 || om > 59 {
                return None;
            }
        }
        Some(_) => return None,
    }

    cur.at_end().then_some(ms)
}

/// Days since 1970-01-01 for a proleptic Gregorian date
///
/// Valid for any year; `day` is not checked against the month length.
pub fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let m = month as i64;
    let mp = if m > 2 { m - 3 } else { m + 9 };
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    #[inline]
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    #[inline]
    fn next(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    #[inline]
    fn expect(&mut self, b: u8) -> Option<()> {
        (self.next()? == b).then_some(())
    }

    /// Exactly `n` ASCII digits
    fn digits(&mut self, n: usize) -> Option<u32> {
        let end = self.pos.checked_add(n)?;
        let bytes = self.input.get(self.pos..end)?;
        let mut value = 0u32;
        for &b in bytes {
            if !b.is_ascii_digit() {
                return None;
            }
            value = value * 10 + u32::from(b - b'0');
        }
        self.pos = end;
        Some(value)
    }

    /// At least one digit; the first three are milliseconds, the rest are
    /// consumed and ignored
    fn fraction_ms(&mut self) -> Option<i64> {
        let start = self.pos;
        let mut ms = 0i64;
        while let Some(b) = self.peek().filter(u8::is_ascii_digit) {
            let n = self.pos - start;
            if n < 3 {
                ms = ms * 10 + i64::from(b - b'0');
            }
            self.pos += 1;
        }
        match self.pos - start {
            0 => None,
            1 => Some(ms * 100),
            2 => Some(ms * 10),
            _ => Some(ms),
        }
    }
}

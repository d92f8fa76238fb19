use std::sync::LazyLock;

use regex::Regex;

static RANGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^bytes=(\d*)-(\d*)$").unwrap());

/// A parsed single-range `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=start-end`
    Bounded { start: u64, end: u64 },
    /// `bytes=start-`
    From { start: u64 },
    /// `bytes=-len`, the last `len` bytes.
    Suffix { len: u64 },
    /// Malformed or multi-range headers. Never satisfiable.
    Unsatisfiable,
}

pub fn parse_range_header(value: &str) -> RangeSpec {
    let value = value.trim();
    if value.contains(',') {
        return RangeSpec::Unsatisfiable;
    }
    let Some(caps) = RANGE_PATTERN.captures(value) else {
        return RangeSpec::Unsatisfiable;
    };
    let parse = |idx: usize| -> Option<Option<u64>> {
        match caps.get(idx).map(|m| m.as_str()) {
            None | Some("") => Some(None),
            Some(digits) => digits.parse().ok().map(Some),
        }
    };
    match (parse(1), parse(2)) {
        (Some(Some(start)), Some(Some(end))) => RangeSpec::Bounded { start, end },
        (Some(Some(start)), Some(None)) => RangeSpec::From { start },
        (Some(None), Some(Some(len))) => RangeSpec::Suffix { len },
        _ => RangeSpec::Unsatisfiable,
    }
}

impl RangeSpec {
    /// Resolves against a file of `total` bytes into an inclusive
    /// `(start, end)` pair, or `None` when the range cannot be served.
    /// Ends past the last byte are rejected rather than clamped.
    pub fn resolve(&self, total: u64) -> Option<(u64, u64)> {
        if total == 0 {
            return None;
        }
        let (start, end) = match *self {
            RangeSpec::Bounded { start, end } => (start, end),
            RangeSpec::From { start } => (start, total - 1),
            RangeSpec::Suffix { len } if len > 0 => (total.saturating_sub(len), total - 1),
            RangeSpec::Suffix { .. } | RangeSpec::Unsatisfiable => return None,
        };
        (start <= end && end < total).then_some((start, end))
    }
}

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

/// A calendar month. `month` is zero-based, 0 is January.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(month: u32, year: i32) -> Option<Period> {
        (month < 12).then_some(Period { year, month })
    }

    pub fn current() -> Period {
        let now = Utc::now();
        Period {
            year: now.year(),
            month: now.month0(),
        }
    }

    /// `None` when the year would leave the `i32` range.
    pub fn advance(self, delta: i32) -> Option<Period> {
        let (month, year) = advance_month(self.month, self.year, delta)?;
        Some(Period { year, month })
    }

    pub fn next(self) -> Option<Period> {
        self.advance(1)
    }

    pub fn previous(self) -> Option<Period> {
        self.advance(-1)
    }
}

/// Moves `(month, year)` by `delta` months, carrying into the year.
pub fn advance_month(month: u32, year: i32, delta: i32) -> Option<(u32, i32)> {
    let absolute = i64::from(year) * 12 + i64::from(month) + i64::from(delta);
    let year = i32::try_from(absolute.div_euclid(12)).ok()?;
    Some((absolute.rem_euclid(12) as u32, year))
}

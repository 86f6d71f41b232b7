use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::error::InvoicingError;
use super::types::{ResetPolicy, Series};

/// The mutable part of a series: what the allocator reads and commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterState {
    /// Numbering year of the current period.
    pub year: i32,
    /// Next number to be issued.
    pub next_number: u64,
}

/// A number drawn from a series. Once returned by the allocator it is
/// permanently consumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllocatedNumber {
    /// Series prefix.
    pub series: String,
    /// Sequential part, without padding.
    pub sequence: u64,
    /// Numbering year, for yearly-reset series.
    pub year: Option<i32>,
    /// Formatted number, e.g. "F-000123" or "F-2025-000001".
    pub number: String,
}

impl std::fmt::Display for AllocatedNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.number)
    }
}

impl Series {
    /// Current counter state.
    pub fn counter(&self) -> CounterState {
        CounterState {
            year: self.period_year,
            next_number: self.next_number,
        }
    }

    /// Format a sequential number with this series' prefix and padding.
    ///
    /// `year` is only rendered for [`ResetPolicy::Yearly`] series.
    pub fn format_number(&self, sequence: u64, year: i32) -> String {
        match self.reset_policy {
            ResetPolicy::Never => format!(
                "{}{}{:0>width$}",
                self.prefix,
                self.separator,
                sequence,
                width = usize::from(self.number_digits)
            ),
            ResetPolicy::Yearly => format!(
                "{}{}{}{}{:0>width$}",
                self.prefix,
                self.separator,
                year,
                self.separator,
                sequence,
                width = usize::from(self.number_digits)
            ),
        }
    }

    /// Preview the number an allocation on `date` would return, without
    /// consuming it.
    pub fn peek_on(&self, date: NaiveDate) -> Result<String, InvoicingError> {
        self.draw(date).map(|(allocated, _)| allocated.number)
    }

    /// Compute the number to hand out on `date` and the counter state to
    /// commit afterwards. Pure: the series itself is not modified.
    pub(crate) fn draw(
        &self,
        date: NaiveDate,
    ) -> Result<(AllocatedNumber, CounterState), InvoicingError> {
        let (year, sequence) = match self.reset_policy {
            ResetPolicy::Never => (self.period_year, self.next_number),
            ResetPolicy::Yearly if date.year() > self.period_year => (date.year(), 1),
            ResetPolicy::Yearly => (self.period_year, self.next_number),
        };

        let exhausted = || InvoicingError::SeriesExhausted {
            prefix: self.prefix.clone(),
            digits: self.number_digits,
            next_number: sequence,
        };
        if sequence > self.max_number() {
            return Err(exhausted());
        }
        let next_number = sequence.checked_add(1).ok_or_else(exhausted)?;

        let allocated = AllocatedNumber {
            series: self.prefix.clone(),
            sequence,
            year: (self.reset_policy == ResetPolicy::Yearly).then_some(year),
            number: self.format_number(sequence, year),
        };
        Ok((allocated, CounterState { year, next_number }))
    }

    /// Advance to a new numbering year, resetting the counter to 1.
    pub fn advance_year(&mut self, new_year: i32) -> Result<(), InvoicingError> {
        if new_year <= self.period_year {
            return Err(InvoicingError::Builder(format!(
                "new year {new_year} must be greater than current year {}",
                self.period_year
            )));
        }
        self.period_year = new_year;
        self.next_number = 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::SeriesBuilder;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Apply a draw to the series, as the allocator does after commit.
    fn take(series: &mut Series, on: NaiveDate) -> String {
        let (allocated, next) = series.draw(on).unwrap();
        series.period_year = next.year;
        series.next_number = next.next_number;
        allocated.number
    }

    #[test]
    fn sequential_numbering() {
        let mut s = SeriesBuilder::new("F", "Facturas").digits(6).build();
        let today = date(2024, 6, 1);
        assert_eq!(take(&mut s, today), "F-000001");
        assert_eq!(take(&mut s, today), "F-000002");
        assert_eq!(take(&mut s, today), "F-000003");
    }

    #[test]
    fn peek_does_not_consume() {
        let mut s = SeriesBuilder::new("F", "Facturas").build();
        let today = date(2024, 6, 1);
        assert_eq!(s.peek_on(today).unwrap(), "F-000001");
        assert_eq!(s.peek_on(today).unwrap(), "F-000001");
        assert_eq!(take(&mut s, today), "F-000001");
        assert_eq!(s.peek_on(today).unwrap(), "F-000002");
    }

    #[test]
    fn starting_at() {
        let mut s = SeriesBuilder::new("INV", "Invoices")
            .digits(3)
            .starting_at(42)
            .build();
        assert_eq!(take(&mut s, date(2024, 1, 1)), "INV-042");
        assert_eq!(take(&mut s, date(2024, 1, 1)), "INV-043");
    }

    #[test]
    fn empty_separator_matches_legacy_format() {
        let mut s = SeriesBuilder::new("R", "Rectificativas")
            .digits(4)
            .separator("")
            .build();
        assert_eq!(take(&mut s, date(2024, 1, 1)), "R0001");
    }

    #[test]
    fn width_two_exhausts_after_99() {
        let mut s = SeriesBuilder::new("F", "Facturas")
            .digits(2)
            .starting_at(99)
            .build();
        assert_eq!(take(&mut s, date(2024, 1, 1)), "F-99");
        assert_eq!(s.next_number, 100);
        let err = s.draw(date(2024, 1, 1)).unwrap_err();
        assert!(matches!(
            err,
            InvoicingError::SeriesExhausted {
                digits: 2,
                next_number: 100,
                ..
            }
        ));
    }

    #[test]
    fn yearly_series_resets_in_new_year() {
        let mut s = SeriesBuilder::new("F", "Facturas")
            .digits(4)
            .reset_policy(ResetPolicy::Yearly)
            .period_year(2024)
            .build();
        assert_eq!(take(&mut s, date(2024, 12, 30)), "F-2024-0001");
        assert_eq!(take(&mut s, date(2024, 12, 31)), "F-2024-0002");
        assert_eq!(take(&mut s, date(2025, 1, 1)), "F-2025-0001");
        assert_eq!(take(&mut s, date(2025, 2, 1)), "F-2025-0002");
        assert_eq!(s.period_year, 2025);
    }

    #[test]
    fn yearly_series_never_rewinds() {
        let mut s = SeriesBuilder::new("F", "Facturas")
            .digits(4)
            .reset_policy(ResetPolicy::Yearly)
            .period_year(2025)
            .starting_at(7)
            .build();
        // A back-dated allocation stays in the current period.
        assert_eq!(take(&mut s, date(2024, 12, 31)), "F-2025-0007");
        assert_eq!(s.next_number, 8);
    }

    #[test]
    fn never_reset_ignores_year_change() {
        let mut s = SeriesBuilder::new("F", "Facturas").digits(3).build();
        assert_eq!(take(&mut s, date(2024, 12, 31)), "F-001");
        assert_eq!(take(&mut s, date(2025, 1, 1)), "F-002");
    }

    #[test]
    fn year_advance() {
        let mut s = SeriesBuilder::new("F", "Facturas")
            .digits(3)
            .reset_policy(ResetPolicy::Yearly)
            .period_year(2024)
            .build();
        take(&mut s, date(2024, 3, 1));
        s.advance_year(2025).unwrap();
        assert_eq!(take(&mut s, date(2025, 3, 1)), "F-2025-001");
    }

    #[test]
    fn year_advance_rejects_past() {
        let mut s = SeriesBuilder::new("F", "Facturas").period_year(2024).build();
        assert!(s.advance_year(2023).is_err());
        assert!(s.advance_year(2024).is_err());
    }

    #[test]
    fn oversized_width_never_overflows() {
        let mut s = SeriesBuilder::new("X", "Wide").digits(30).build();
        s.next_number = u64::MAX;
        assert!(matches!(
            s.draw(date(2024, 1, 1)),
            Err(InvoicingError::SeriesExhausted { .. })
        ));
    }
}

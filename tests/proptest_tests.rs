//! Property-based tests for numbering and totals.
//!
//! Run with: `cargo test --test proptest_tests`

#![cfg(feature = "core")]

use std::thread;

use chrono::NaiveDate;
use facturacion::core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn amount() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn quantity() -> impl Strategy<Value = Decimal> {
    (1i64..10_000).prop_map(|milli| Decimal::new(milli, 3))
}

fn rate() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        Just(Decimal::ZERO),
        Just(Decimal::new(4, 0)),
        Just(Decimal::new(10, 0)),
        Just(Decimal::new(21, 0)),
    ]
}

fn line() -> impl Strategy<Value = InvoiceLine> {
    (quantity(), amount(), 0i64..=100, rate()).prop_map(|(qty, price, discount, rate)| {
        InvoiceLineBuilder::new("Item", qty, price)
            .discount_percent(Decimal::from(discount))
            .tax_rate(rate)
            .build()
    })
}

proptest! {
    #[test]
    fn sequential_allocations_are_contiguous(
        start in 1u64..1_000_000,
        digits in 7u8..=10,
        count in 1usize..50,
    ) {
        let allocator = SeriesAllocator::new(
            InMemorySeriesStore::with_series([SeriesBuilder::new("F", "Facturas")
                .digits(digits)
                .starting_at(start)
                .build()])
            .unwrap(),
        );

        for offset in 0..count as u64 {
            let n = allocator.allocate("F").unwrap();
            prop_assert_eq!(n.sequence, start + offset);
            prop_assert_eq!(n.number.len(), 2 + usize::from(digits));
        }
        prop_assert_eq!(
            allocator.store().load("F").unwrap().unwrap().next_number,
            start + count as u64
        );
    }

    #[test]
    fn threaded_allocations_are_contiguous(start in 1u64..10_000, threads in 2usize..16) {
        let allocator = SeriesAllocator::new(
            InMemorySeriesStore::with_series([SeriesBuilder::new("F", "Facturas")
                .starting_at(start)
                .build()])
            .unwrap(),
        );

        let mut sequences: Vec<u64> = thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| s.spawn(|| allocator.allocate("F").unwrap().sequence))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        sequences.sort_unstable();
        let expected: Vec<u64> = (start..start + threads as u64).collect();
        prop_assert_eq!(sequences, expected);
    }

    #[test]
    fn exhaustion_never_wraps(digits in 1u8..=4, before_max in 0u64..5) {
        let max = 10u64.pow(u32::from(digits)) - 1;
        let start = max.saturating_sub(before_max).max(1);
        let allocator = SeriesAllocator::new(
            InMemorySeriesStore::with_series([SeriesBuilder::new("F", "Facturas")
                .digits(digits)
                .starting_at(start)
                .build()])
            .unwrap(),
        );

        for seq in start..=max {
            prop_assert_eq!(allocator.allocate("F").unwrap().sequence, seq);
        }
        let exhausted = matches!(
            allocator.allocate("F"),
            Err(InvoicingError::SeriesExhausted { .. })
        );
        prop_assert!(exhausted);
    }

    #[test]
    fn yearly_counter_never_goes_back(years in prop::collection::vec(2020i32..2030, 1..30)) {
        let allocator = SeriesAllocator::new(
            InMemorySeriesStore::with_series([SeriesBuilder::new("F", "Facturas")
                .reset_policy(ResetPolicy::Yearly)
                .period_year(2020)
                .build()])
            .unwrap(),
        );

        let mut previous: Option<(i32, u64)> = None;
        for year in years {
            let n = allocator.allocate_on("F", date(year, 6, 1)).unwrap();
            let current = (n.year.unwrap(), n.sequence);
            if let Some(prev) = previous {
                prop_assert!(current > prev, "{:?} after {:?}", current, prev);
            }
            previous = Some(current);
        }
    }

    #[test]
    fn totals_are_consistent(lines in prop::collection::vec(line(), 1..20)) {
        let invoice = lines
            .into_iter()
            .fold(InvoiceBuilder::new("F"), |b, l| b.add_line(l))
            .build()
            .unwrap();
        let totals = &invoice.totals;

        let line_sum: Decimal = invoice.lines.iter().map(|l| l.total).sum();
        let taxable: Decimal = totals.breakdown.iter().map(|b| b.taxable_amount).sum();
        let tax: Decimal = totals.breakdown.iter().map(|b| b.tax_amount).sum();

        prop_assert_eq!(totals.subtotal, line_sum);
        prop_assert_eq!(taxable, totals.subtotal);
        prop_assert_eq!(tax, totals.tax_amount);
        prop_assert_eq!(totals.total, totals.subtotal + totals.tax_amount);
        prop_assert!(totals.tax_amount >= Decimal::ZERO);
        prop_assert!(validate_totals(&invoice).is_empty());
    }
}

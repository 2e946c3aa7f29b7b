//! Property-based tests for the building blocks.
//!
//! These tests verify invariants of the ledger, the yield curve and the
//! variable pool under random inputs.

use lending_core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// Strategies for generating test data
fn balance_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000i64).prop_map(|x| Decimal::new(x, 2)) // 0 to 10,000
}

fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=500i64).prop_map(|x| Decimal::new(x, 3)) // 0% to 50%
}

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|x| Decimal::new(x, 2)) // 0.01 to 10,000
}

proptest! {
    /// A transfer either moves exactly the amount or changes nothing.
    #[test]
    fn transfer_conserves_total(
        from_free in balance_strategy(),
        to_free in balance_strategy(),
        amount in balance_strategy(),
    ) {
        let mut from = LedgerAccount::new(from_free);
        let mut to = LedgerAccount::new(to_free);
        let total = from.total() + to.total();

        match from.transfer(&mut to, amount) {
            Ok(()) => {
                prop_assert!(amount <= from_free);
                prop_assert_eq!(from.free, from_free - amount);
                prop_assert_eq!(to.free, to_free + amount);
            }
            Err(_) => {
                prop_assert!(amount > from_free);
                prop_assert_eq!(from.free, from_free);
                prop_assert_eq!(to.free, to_free);
            }
        }
        prop_assert_eq!(from.total() + to.total(), total);
    }

    /// Lock then unlock of the same amount restores the account.
    #[test]
    fn lock_unlock_roundtrip(free in balance_strategy(), amount in balance_strategy()) {
        let mut account = LedgerAccount::new(free);
        if account.lock(amount).is_ok() {
            prop_assert_eq!(account.locked, amount);
            prop_assert_eq!(account.total(), free);
            account.unlock(amount).unwrap();
        }
        prop_assert_eq!(account, LedgerAccount::new(free));
    }

    /// Negative amounts are always rejected.
    #[test]
    fn negative_amounts_rejected(free in balance_strategy(), amount in 1i64..1_000_000i64) {
        let mut account = LedgerAccount::new(free);
        let mut other = LedgerAccount::default();
        let negative = -Decimal::new(amount, 2);
        prop_assert!(account.lock(negative).is_err());
        prop_assert!(account.unlock(negative).is_err());
        prop_assert!(account.transfer(&mut other, negative).is_err());
    }

    /// A flat curve quotes its rate for every due date inside its range, and only there.
    #[test]
    fn flat_curve_is_flat(rate in rate_strategy(), now in 0i64..100, ticks in -5i64..20) {
        let curve = YieldCurve::flat(rate, 0..12);
        let quoted = curve.rate_at(Timestamp(now), Timestamp(now + ticks));
        if ticks > 0 && ticks < 12 {
            prop_assert_eq!(quoted, Some(rate));
        } else {
            prop_assert_eq!(quoted, None);
        }
    }

    /// Interpolated rates stay between their neighbouring points.
    #[test]
    fn interpolation_is_bounded(
        low in rate_strategy(),
        high in rate_strategy(),
        ticks in 1i64..=10,
    ) {
        let curve = YieldCurve::new(vec![1, 10], vec![low, high]).unwrap();
        let rate = curve.rate_at(Timestamp(0), Timestamp(ticks)).unwrap();
        prop_assert!(rate >= low.min(high));
        prop_assert!(rate <= low.max(high));
    }

    /// Cash to collateral and back at the same price is lossless up to rounding.
    #[test]
    fn price_conversion_roundtrip(price in price_strategy(), cash in balance_strategy()) {
        let p = Price::new_unchecked(price);
        let back = p.to_cash(p.to_collateral(cash));
        prop_assert!((back - cash).abs() < dec!(0.0000001));
    }

    /// Non-positive prices are rejected.
    #[test]
    fn price_must_be_positive(value in -1_000_000i64..=0) {
        prop_assert!(Price::new(Decimal::new(value, 2)).is_none());
    }

    /// Variable debt never decreases as time passes, and utilization stays in range.
    #[test]
    fn variable_debt_is_monotonic(
        supplied in 200i64..10_000,
        borrowed in 1i64..100,
        steps in proptest::collection::vec(1i64..5, 1..10),
    ) {
        let mut pool = VariablePool::new(VariablePoolParams::default(), Timestamp(0));
        let mut wallet = LedgerAccount::new(Decimal::from(supplied));
        pool.supply(UserId(1), &mut wallet, Decimal::from(supplied), Timestamp(0)).unwrap();

        let mut cash = LedgerAccount::default();
        let mut collateral = LedgerAccount::new(dec!(1000));
        let id = pool
            .borrow(
                UserId(2),
                Decimal::from(borrowed),
                dec!(10),
                Price::new_unchecked(dec!(100)),
                dec!(1.5),
                Timestamp(0),
                &mut cash,
                &mut collateral,
            )
            .unwrap();
        prop_assert!(pool.utilization_ratio() > Decimal::ZERO);
        prop_assert!(pool.utilization_ratio() <= Decimal::ONE);

        let mut now = 0;
        let mut last = pool.current_debt(id, Timestamp(now)).unwrap();
        prop_assert_eq!(last, Decimal::from(borrowed));
        for step in steps {
            now += step;
            let debt = pool.current_debt(id, Timestamp(now)).unwrap();
            prop_assert!(debt > last);
            last = debt;
        }
    }

    /// Liquidation premiums always split the whole surplus.
    #[test]
    fn liquidation_split_sums_to_one(to_liquidator in 0i64..=50, to_borrower in 0i64..=50) {
        let params = LiquidationParams {
            collateral_perc_premium_to_liquidator: Decimal::new(to_liquidator, 2),
            collateral_perc_premium_to_borrower: Decimal::new(to_borrower, 2),
            replacement_profit_perc_to_protocol: Decimal::ZERO,
        };
        let total = params.collateral_perc_premium_to_liquidator
            + params.collateral_perc_premium_to_borrower
            + params.collateral_perc_to_protocol();
        prop_assert_eq!(total, Decimal::ONE);
    }
}

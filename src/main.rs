//! Lending Core Simulation.
//!
//! Walks the order book through origination, virtual collateral, liquidation,
//! self-liquidation, compensation and the variable pool rollover.
//! Set `RUST_LOG=lending_core=debug` to see every rejection and event.

use lending_core::*;
use rust_decimal_macros::dec;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

fn main() {
    init_tracing();

    println!("Lending Core Simulation");
    println!("Fixed Rate Order Book, Variable Pool, Three Liquidation Modes\n");

    scenario_1_origination();
    scenario_2_virtual_collateral();
    scenario_3_liquidation();
    scenario_4_self_liquidation();
    scenario_5_compensation();
    scenario_6_rollover();
    scenario_7_replacement();

    println!("\nAll simulations completed successfully.");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(true).with_level(true));
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("tracing already initialized: {e}");
    }
}

fn flat(rate: rust_decimal::Decimal) -> YieldCurve {
    YieldCurve::flat(rate, 0..12)
}

// bob lends 100 at 3% to alice, due at t=6
fn seeded_book(alice_collateral: rust_decimal::Decimal) -> (LendingOrderBook, UserId, UserId, LoanId) {
    let mut ob = LendingOrderBook::with_defaults(Price::new_unchecked(dec!(100)));
    let alice = ob.create_user(dec!(100), alice_collateral).unwrap();
    let bob = ob.create_user(dec!(100), dec!(0)).unwrap();
    ob.deposit(alice, alice_collateral, Currency::Collateral).unwrap();
    ob.deposit(bob, dec!(100), Currency::Cash).unwrap();
    ob.lend_as_limit_order(LoanOffer::new(bob, dec!(100), Timestamp(10), flat(dec!(0.03))))
        .unwrap();
    let fol = ob
        .borrow_as_market_order(alice, bob, Timestamp(6), dec!(100), false, &[])
        .unwrap()
        .fol
        .unwrap();
    (ob, alice, bob, fol)
}

/// Originate, repay, claim.
fn scenario_1_origination() {
    println!("Scenario 1: Origination and Claim\n");

    let (mut ob, alice, bob, fol) = seeded_book(dec!(50));
    let loan = ob.loan(fol).unwrap();
    println!("  Bob lends 100 to Alice at 3%, {} face value {}", fol, loan.face_value);

    let early = ob.claim(fol);
    println!("  Claim before repay rejected: {}", early.is_err());

    ob.repay(fol).unwrap();
    let claimed = ob.claim(fol).unwrap();
    println!("  Alice repays, Bob claims {}", claimed);
    println!("  Bob venue cash: {}, Alice debt: {}\n", ob.user_cash(bob), ob.user(alice).unwrap().debt());
}

/// Credit held as a lender backs a new borrow.
fn scenario_2_virtual_collateral() {
    println!("Scenario 2: Virtual Collateral\n");

    let mut ob = LendingOrderBook::with_defaults(Price::new_unchecked(dec!(100)));
    let alice = ob.create_user(dec!(0), dec!(2)).unwrap();
    let bob = ob.create_user(dec!(50), dec!(0)).unwrap();
    let candy = ob.create_user(dec!(10), dec!(0)).unwrap();
    ob.deposit(alice, dec!(2), Currency::Collateral).unwrap();
    ob.deposit(bob, dec!(50), Currency::Cash).unwrap();
    ob.deposit(candy, dec!(10), Currency::Cash).unwrap();
    ob.lend_as_limit_order(LoanOffer::new(bob, dec!(50), Timestamp(10), flat(dec!(0.03))))
        .unwrap();
    ob.lend_as_limit_order(LoanOffer::new(candy, dec!(10), Timestamp(12), flat(dec!(0.05))))
        .unwrap();

    let fol = ob
        .borrow_as_market_order(alice, bob, Timestamp(6), dec!(50), false, &[])
        .unwrap()
        .fol
        .unwrap();
    let face_value = ob.loan(fol).unwrap().face_value;
    println!("  Alice borrows 50 from Bob, face value {}", face_value);

    let result = ob
        .borrow_as_market_order(bob, candy, Timestamp(6), face_value / dec!(10), true, &[fol])
        .unwrap();
    let sol = ob.loan(result.sols[0]).unwrap();
    println!("  Bob borrows against 10% of his credit: SOL face value {}, cash {}", sol.face_value, result.amount_out);
    println!("  Candy earns {} at maturity\n", sol.face_value - result.amount_out);
}

/// Price crash makes a borrower liquidatable.
fn scenario_3_liquidation() {
    println!("Scenario 3: Liquidation\n");

    let (mut ob, alice, _, fol) = seeded_book(dec!(2));
    let liquidator = ob.create_user(dec!(200), dec!(0)).unwrap();

    ob.advance(Timestamp(1), Price::new_unchecked(dec!(60))).unwrap();
    println!(
        "  Price drops to 60, Alice ratio {:.4}, liquidatable: {}",
        ob.get_borrower_collateral_ratio(alice).unwrap(),
        ob.is_borrower_liquidatable(alice).unwrap()
    );

    let result = ob.liquidate_loan(liquidator, fol).unwrap();
    println!("  Liquidator pays {} and receives {:.6} collateral", result.debt, result.collateral_to_liquidator);
    println!(
        "  Borrower rebate {:.6}, protocol {:.6}",
        result.collateral_to_borrower, result.collateral_to_protocol
    );
    println!("  Alice liquidatable after: {}\n", ob.is_borrower_liquidatable(alice).unwrap());
}

/// Lender takes the collateral of an underwater loan.
fn scenario_4_self_liquidation() {
    println!("Scenario 4: Self Liquidation\n");

    let (mut ob, _, bob, fol) = seeded_book(dec!(2));
    println!("  At price 100: {}", describe(ob.self_liquidate(bob, fol).map(|r| r.collateral)));

    ob.advance(Timestamp(1), Price::new_unchecked(dec!(30))).unwrap();
    let result = ob.self_liquidate(bob, fol).unwrap();
    println!("  At price 30: Bob takes {} collateral, {} face value written off", result.collateral, result.face_value_removed);
    println!("  Loan face value now {}\n", ob.loan(fol).unwrap().face_value);
}

/// Netting debt against credit.
fn scenario_5_compensation() {
    println!("Scenario 5: Compensation\n");

    let (mut ob, alice, _, fol) = seeded_book(dec!(50));
    let third = ob.create_user(dec!(0), dec!(10)).unwrap();
    ob.deposit(third, dec!(10), Currency::Collateral).unwrap();
    ob.deposit(alice, dec!(100), Currency::Cash).unwrap();
    ob.lend_as_limit_order(LoanOffer::new(alice, dec!(100), Timestamp(12), flat(dec!(0.1))))
        .unwrap();

    let late = ob
        .borrow_as_market_order(third, alice, Timestamp(8), dec!(20), false, &[])
        .unwrap()
        .fol
        .unwrap();
    let early = ob
        .borrow_as_market_order(third, alice, Timestamp(4), dec!(20), false, &[])
        .unwrap()
        .fol
        .unwrap();

    println!("  Credit due after the debt: {}", describe(ob.compensate(fol, late, None).map(|r| r.amount)));
    let result = ob.compensate(fol, early, None).unwrap();
    println!("  Credit due before the debt: netted {}, new {}", result.amount, result.new_loan);
    println!("  Alice now owes {}\n", ob.loan(fol).unwrap().face_value);
}

/// Overdue debt rolls into the variable pool.
fn scenario_6_rollover() {
    println!("Scenario 6: Variable Pool Rollover\n");

    let (mut ob, alice, _, fol) = seeded_book(dec!(50));
    let supplier = ob.create_user(dec!(1000), dec!(0)).unwrap();
    ob.supply_variable_pool(supplier, dec!(1000)).unwrap();

    ob.advance(Timestamp(7), Price::new_unchecked(dec!(100))).unwrap();
    let variable_loan = ob.move_to_variable_pool(fol).unwrap();
    println!("  {} overdue at t=7, moved to the pool", fol);
    println!("  Pool utilization {:.4}, rate {:.6}", ob.variable_pool().utilization_ratio(), ob.variable_pool().interest_rate());

    ob.advance(Timestamp(10), Price::new_unchecked(dec!(100))).unwrap();
    ob.deposit(alice, dec!(200), Currency::Cash).unwrap();
    let paid = ob.repay_variable_loan(variable_loan).unwrap();
    println!("  Alice repays {:.6} at t=10\n", paid);
}

/// Liquidation that keeps the loan alive under a new borrower.
fn scenario_7_replacement() {
    println!("Scenario 7: Liquidation With Replacement\n");

    let (mut ob, _, _, fol) = seeded_book(dec!(2));
    let liquidator = ob.create_user(dec!(200), dec!(0)).unwrap();
    let candy = ob.create_user(dec!(0), dec!(10)).unwrap();
    ob.deposit(candy, dec!(10), Currency::Collateral).unwrap();
    let offer = ob
        .borrow_as_limit_order(BorrowOffer::new(candy, dec!(200), flat(dec!(0.02))))
        .unwrap();

    ob.advance(Timestamp(1), Price::new_unchecked(dec!(60))).unwrap();
    let result = ob.liquidate_loan_with_replacement(liquidator, fol, offer).unwrap();
    println!("  Candy takes over {} for {:.6} cash", fol, result.amount_out);
    println!("  Replacement profit {:.6}, to protocol {}", result.replacement_profit, result.profit_to_protocol);
    println!("  Loan state: {:?}\n", ob.loan_state(fol).unwrap());
}

fn describe<T: std::fmt::Display>(outcome: Result<T, LendingError>) -> String {
    match outcome {
        Ok(v) => format!("ok ({v})"),
        Err(e) => format!("rejected ({e})"),
    }
}

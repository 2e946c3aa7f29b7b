// 8.0 orderbook/core.rs: main order book. holds users, venue balances, offers, loans
// and the variable pool. every public mutation validates into a plan first, then applies it.

use super::config::OrderBookConfig;
use super::results::LendingError;
use crate::config::MarketConfig;
use crate::context::Context;
use crate::events::{
    ClockAdvancedEvent, Event, EventId, EventPayload, TransferEvent, UserCreatedEvent, VariablePoolSuppliedEvent,
};
use crate::ledger::LedgerAccount;
use crate::loan::LoanTable;
use crate::offer::{BorrowOffer, LoanOffer};
use crate::oracle::PriceOracle;
use crate::types::{BorrowOfferId, Currency, Price, Timestamp, UserId};
use crate::user::User;
use crate::variable_pool::VariablePool;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

/// What the venue owes a user. Backed by the order book's own reserves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VenueAccount {
    pub cash: Decimal,
    pub collateral_deposited: Decimal,
    pub collateral_locked_by_pool: Decimal,
}

impl VenueAccount {
    pub fn free_collateral(&self) -> Decimal {
        self.collateral_deposited - self.collateral_locked_by_pool
    }

    pub(super) fn add_cash(&mut self, delta: Decimal) {
        self.cash += delta;
        assert!(self.cash >= Decimal::ZERO, "venue cash went negative: {}", self.cash);
    }

    pub(super) fn add_collateral(&mut self, delta: Decimal) {
        self.collateral_deposited += delta;
        assert!(
            self.free_collateral() >= Decimal::ZERO,
            "venue free collateral went negative: {}",
            self.free_collateral()
        );
    }

    pub(super) fn lock_by_pool(&mut self, delta: Decimal) {
        self.collateral_locked_by_pool += delta;
        assert!(
            self.collateral_locked_by_pool >= Decimal::ZERO && self.free_collateral() >= Decimal::ZERO,
            "pool lock out of range: locked {}, deposited {}",
            self.collateral_locked_by_pool,
            self.collateral_deposited
        );
    }
}

/** 8.1: main order book struct. all state lives here */
#[derive(Debug, Clone, PartialEq)]
pub struct LendingOrderBook {
    pub(super) config: OrderBookConfig,
    pub(super) market: MarketConfig,
    pub(super) context: Context,
    pub(super) users: HashMap<UserId, User>,
    pub(super) venue: HashMap<UserId, VenueAccount>,
    pub(super) cash: LedgerAccount,
    pub(super) collateral: LedgerAccount,
    pub(super) loan_offers: HashMap<UserId, LoanOffer>,
    pub(super) borrow_offers: BTreeMap<BorrowOfferId, BorrowOffer>,
    pub(super) loans: LoanTable,
    pub(super) variable_pool: VariablePool,
    pub(super) liquidation_profit_cash: Decimal,
    pub(super) liquidation_profit_collateral: Decimal,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) next_user_id: u32,
    pub(super) next_borrow_offer_id: u64,
}

impl LendingOrderBook {
    pub fn new(market: MarketConfig, config: OrderBookConfig, initial_price: Price) -> Result<Self, LendingError> {
        market.validate()?;
        let start = Timestamp::from_ticks(0);
        Ok(Self {
            context: Context::new(market.params.clone(), start, initial_price),
            variable_pool: VariablePool::new(market.variable_pool.clone(), start),
            market,
            config,
            users: HashMap::new(),
            venue: HashMap::new(),
            cash: LedgerAccount::default(),
            collateral: LedgerAccount::default(),
            loan_offers: HashMap::new(),
            borrow_offers: BTreeMap::new(),
            loans: LoanTable::new(),
            liquidation_profit_cash: Decimal::ZERO,
            liquidation_profit_collateral: Decimal::ZERO,
            events: Vec::new(),
            next_event_id: 1,
            next_user_id: 1,
            next_borrow_offer_id: 0,
        })
    }

    pub fn with_defaults(initial_price: Price) -> Self {
        Self::from_valid(MarketConfig::default(), OrderBookConfig::default(), initial_price)
    }

    // default MarketConfig always validates
    fn from_valid(market: MarketConfig, config: OrderBookConfig, initial_price: Price) -> Self {
        match Self::new(market, config, initial_price) {
            Ok(ob) => ob,
            Err(e) => panic!("default market config rejected: {e}"),
        }
    }

    pub fn market_config(&self) -> &MarketConfig {
        &self.market
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn time(&self) -> Timestamp {
        self.context.time()
    }

    pub fn price(&self) -> Price {
        self.context.price()
    }

    /// Moves the clock forward and sets the new price. Non-increasing time is rejected.
    pub fn advance(&mut self, new_time: Timestamp, new_price: Price) -> Result<(), LendingError> {
        if let Err(e) = self.context.update(new_time, new_price) {
            return Err(self.rejected("advance", e.into()));
        }
        self.emit_event(EventPayload::ClockAdvanced(ClockAdvancedEvent {
            time: new_time,
            price: new_price,
        }));
        Ok(())
    }

    pub fn advance_with_oracle(&mut self, new_time: Timestamp, oracle: &dyn PriceOracle) -> Result<(), LendingError> {
        let price = oracle
            .instant_price()
            .map_err(|e| self.rejected("advance", e.into()))?;
        self.advance(new_time, price)
    }

    pub fn create_user(&mut self, cash: Decimal, collateral: Decimal) -> Result<UserId, LendingError> {
        if cash < Decimal::ZERO || collateral < Decimal::ZERO {
            return Err(self.rejected("create_user", LendingError::NonPositiveAmount(cash.min(collateral))));
        }
        let id = UserId(self.next_user_id);
        self.next_user_id += 1;
        self.users.insert(id, User::new(id, cash, collateral));
        self.venue.insert(id, VenueAccount::default());
        self.emit_event(EventPayload::UserCreated(UserCreatedEvent {
            user: id,
            cash,
            collateral,
        }));
        Ok(id)
    }

    pub fn user(&self, id: UserId) -> Result<&User, LendingError> {
        self.users.get(&id).ok_or(LendingError::UserNotFound(id))
    }

    pub fn users_iter(&self) -> impl Iterator<Item = (&UserId, &User)> {
        self.users.iter()
    }

    pub fn deposit(&mut self, user: UserId, amount: Decimal, currency: Currency) -> Result<(), LendingError> {
        self.check_deposit(user, amount, currency)
            .map_err(|e| self.rejected("deposit", e))?;

        let wallet = user_mut(&mut self.users, user);
        let venue = venue_mut(&mut self.venue, user);
        match currency {
            Currency::Cash => {
                wallet.cash.settle_transfer(&mut self.cash, amount);
                venue.add_cash(amount);
            }
            Currency::Collateral => {
                wallet.collateral.settle_transfer(&mut self.collateral, amount);
                venue.add_collateral(amount);
            }
        }

        self.emit_event(EventPayload::Deposit(TransferEvent { user, currency, amount }));
        Ok(())
    }

    fn check_deposit(&self, user: UserId, amount: Decimal, currency: Currency) -> Result<(), LendingError> {
        check_positive(amount)?;
        let wallet = self.user(user)?;
        let source = match currency {
            Currency::Cash => &wallet.cash,
            Currency::Collateral => &wallet.collateral,
        };
        source.can_transfer(amount)?;
        Ok(())
    }

    // collateral withdrawals are blocked if they leave the user liquidatable
    pub fn withdraw(&mut self, user: UserId, amount: Decimal, currency: Currency) -> Result<(), LendingError> {
        self.check_withdraw(user, amount, currency)
            .map_err(|e| self.rejected("withdraw", e))?;

        let wallet = user_mut(&mut self.users, user);
        let venue = venue_mut(&mut self.venue, user);
        match currency {
            Currency::Cash => {
                venue.add_cash(-amount);
                self.cash.settle_transfer(&mut wallet.cash, amount);
            }
            Currency::Collateral => {
                venue.add_collateral(-amount);
                self.collateral.settle_transfer(&mut wallet.collateral, amount);
            }
        }

        self.emit_event(EventPayload::Withdrawal(TransferEvent { user, currency, amount }));
        Ok(())
    }

    fn check_withdraw(&self, user: UserId, amount: Decimal, currency: Currency) -> Result<(), LendingError> {
        check_positive(amount)?;
        let debt = self.user(user)?.debt();
        let venue = self.venue_of(user);
        match currency {
            Currency::Cash => {
                if venue.cash < amount {
                    return Err(LendingError::InsufficientCash {
                        user,
                        requested: amount,
                        available: venue.cash,
                    });
                }
                self.cash.can_transfer(amount)?;
            }
            Currency::Collateral => {
                let free = venue.free_collateral();
                if free < amount {
                    return Err(LendingError::InsufficientCollateral {
                        user,
                        requested: amount,
                        available: free,
                    });
                }
                if self.ratio_below_liquidation(free - amount, debt) {
                    return Err(LendingError::WouldBeLiquidatable(user));
                }
                self.collateral.can_transfer(amount)?;
            }
        }
        Ok(())
    }

    /// Funds the variable pool from the user's personal cash.
    pub fn supply_variable_pool(&mut self, user: UserId, amount: Decimal) -> Result<(), LendingError> {
        if let Err(e) = self.user(user) {
            return Err(self.rejected("supply_variable_pool", e));
        }
        let now = self.context.time();
        let wallet = user_mut(&mut self.users, user);
        if let Err(e) = self.variable_pool.supply(user, &mut wallet.cash, amount, now) {
            return Err(self.rejected("supply_variable_pool", e.into()));
        }
        self.emit_event(EventPayload::VariablePoolSupplied(VariablePoolSuppliedEvent { user, amount }));
        Ok(())
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    // new loans must mature strictly after now and no later than Params::max_time
    pub(super) fn check_due_date(&self, due_date: Timestamp) -> Result<(), LendingError> {
        let now = self.context.time();
        if due_date <= now {
            return Err(LendingError::DueDateNotInFuture { due_date, now });
        }
        let max_time = Timestamp::from_ticks(self.market.params.max_time);
        if due_date > max_time {
            return Err(LendingError::DueDateBeyondHorizon { due_date, max_time });
        }
        Ok(())
    }

    pub(super) fn venue_of(&self, user: UserId) -> VenueAccount {
        self.venue.get(&user).copied().unwrap_or_default()
    }

    // venue cash of `lender` pays `amount` into the personal wallet of `borrower`
    pub(super) fn check_lend_cash(&self, lender: UserId, amount: Decimal) -> Result<(), LendingError> {
        let available = self.venue_of(lender).cash;
        if available < amount {
            return Err(LendingError::InsufficientCash {
                user: lender,
                requested: amount,
                available,
            });
        }
        self.cash.can_transfer(amount)?;
        Ok(())
    }

    pub(super) fn lend_cash(&mut self, lender: UserId, borrower: UserId, amount: Decimal) {
        venue_mut(&mut self.venue, lender).add_cash(-amount);
        let wallet = user_mut(&mut self.users, borrower);
        self.cash.settle_transfer(&mut wallet.cash, amount);
    }

    pub(super) fn rejected(&self, operation: &'static str, err: LendingError) -> LendingError {
        tracing::warn!(operation, time = %self.context.time(), error = %err, "operation rejected");
        err
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.context.time(), payload);
        self.next_event_id += 1;

        if self.config.verbose {
            tracing::debug!(id = event.id.0, payload = ?event.payload, "event");
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}

pub(super) fn check_positive(amount: Decimal) -> Result<(), LendingError> {
    if amount <= Decimal::ZERO {
        return Err(LendingError::NonPositiveAmount(amount));
    }
    Ok(())
}

// apply-side lookups. a missing entry here means validation let through an unknown id
pub(super) fn user_mut(users: &mut HashMap<UserId, User>, id: UserId) -> &mut User {
    match users.get_mut(&id) {
        Some(user) => user,
        None => panic!("validated {id} missing from user registry"),
    }
}

pub(super) fn venue_mut(venue: &mut HashMap<UserId, VenueAccount>, id: UserId) -> &mut VenueAccount {
    venue.entry(id).or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ob() -> LendingOrderBook {
        LendingOrderBook::with_defaults(Price::new_unchecked(dec!(100)))
    }

    #[test]
    fn deposit_moves_wallet_into_custody() {
        let mut ob = ob();
        let alice = ob.create_user(dec!(100), dec!(5)).unwrap();
        ob.deposit(alice, dec!(60), Currency::Cash).unwrap();
        ob.deposit(alice, dec!(5), Currency::Collateral).unwrap();

        assert_eq!(ob.user(alice).unwrap().cash.free, dec!(40));
        assert_eq!(ob.user(alice).unwrap().collateral.free, dec!(0));
        assert_eq!(ob.user_cash(alice), dec!(60));
        assert_eq!(ob.user_free_collateral(alice), dec!(5));
        assert_eq!(ob.cash_reserve().free, dec!(60));
        assert_eq!(ob.collateral_reserve().free, dec!(5));
    }

    #[test]
    fn rejected_deposit_changes_nothing() {
        let mut ob = ob();
        let alice = ob.create_user(dec!(10), dec!(0)).unwrap();
        let before = ob.clone();
        assert!(matches!(
            ob.deposit(alice, dec!(11), Currency::Cash),
            Err(LendingError::Ledger(_))
        ));
        assert!(matches!(
            ob.deposit(alice, dec!(0), Currency::Cash),
            Err(LendingError::NonPositiveAmount(_))
        ));
        assert!(matches!(
            ob.deposit(UserId(42), dec!(1), Currency::Cash),
            Err(LendingError::UserNotFound(_))
        ));
        assert_eq!(ob, before);
    }

    #[test]
    fn withdraw_round_trip() {
        let mut ob = ob();
        let alice = ob.create_user(dec!(10), dec!(3)).unwrap();
        ob.deposit(alice, dec!(10), Currency::Cash).unwrap();
        ob.deposit(alice, dec!(3), Currency::Collateral).unwrap();
        ob.withdraw(alice, dec!(4), Currency::Cash).unwrap();
        ob.withdraw(alice, dec!(3), Currency::Collateral).unwrap();

        assert_eq!(ob.user(alice).unwrap().cash.free, dec!(4));
        assert_eq!(ob.user(alice).unwrap().collateral.free, dec!(3));
        assert!(matches!(
            ob.withdraw(alice, dec!(7), Currency::Cash),
            Err(LendingError::InsufficientCash { .. })
        ));
    }

    #[test]
    fn clock_rejects_going_back() {
        let mut ob = ob();
        ob.advance(Timestamp(2), Price::new_unchecked(dec!(90))).unwrap();
        let before = ob.clone();
        assert!(matches!(
            ob.advance(Timestamp(2), Price::new_unchecked(dec!(80))),
            Err(LendingError::Clock(_))
        ));
        assert_eq!(ob, before);
        assert_eq!(ob.price().value(), dec!(90));
    }

    #[test]
    fn events_bounded() {
        let mut ob = LendingOrderBook::new(
            MarketConfig::default(),
            OrderBookConfig {
                max_events: 3,
                verbose: true,
            },
            Price::new_unchecked(dec!(100)),
        )
        .unwrap();
        for _ in 0..5 {
            ob.create_user(dec!(1), dec!(1)).unwrap();
        }
        assert_eq!(ob.events().len(), 3);
        assert_eq!(ob.events()[0].id, EventId(3));
        assert_eq!(ob.recent_events(1)[0].id, EventId(5));
    }

    #[test]
    fn invalid_market_config_rejected() {
        let mut market = MarketConfig::default();
        market.params.cr_liquidation = dec!(0.9);
        let result = LendingOrderBook::new(market, OrderBookConfig::default(), Price::new_unchecked(dec!(1)));
        assert!(matches!(result, Err(LendingError::Config(_))));
    }
}

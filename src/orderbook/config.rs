//! Settings for the order book itself, separate from the market risk
//! parameters in [`crate::config::MarketConfig`].

/// Audit log retention and event tracing.
///
/// The event log is part of the order book's state, so two books compare
/// equal only if they kept the same window of events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBookConfig {
    /// Oldest events are dropped once the log holds this many.
    pub max_events: usize,
    /// Emit a `tracing::debug!` line for every appended event.
    pub verbose: bool,
}

impl Default for OrderBookConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarketConfig;
    use crate::orderbook::LendingOrderBook;
    use crate::types::Price;
    use rust_decimal_macros::dec;

    #[test]
    fn retention_window_is_part_of_state() {
        let book = |max_events| {
            let config = OrderBookConfig {
                max_events,
                verbose: false,
            };
            let mut ob = LendingOrderBook::new(MarketConfig::default(), config, Price::new_unchecked(dec!(100))).unwrap();
            for _ in 0..4 {
                ob.create_user(dec!(1), dec!(1)).unwrap();
            }
            ob
        };
        let full = book(OrderBookConfig::default().max_events);
        let short = book(2);
        assert_eq!(full.events().len(), 4);
        assert_eq!(short.events().len(), 2);
        assert_eq!(short.events(), &full.events()[2..]);
        assert_ne!(full, short);
    }
}

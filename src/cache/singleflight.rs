use std::future::Future;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;

use crate::error::{Error, Result};

pub type Outcome = Result<Vec<u8>>;

/// Coalesces concurrent loads of the same key into one upstream call.
///
/// The first caller for a key becomes the flight leader and runs the load;
/// every caller that arrives while the flight is open subscribes to it and
/// receives the leader's outcome. The slot is removed before the outcome is
/// published: a caller arriving after publication starts a fresh flight.
pub struct FlightGroup {
    flights: DashMap<String, broadcast::Sender<Outcome>>,
}

impl FlightGroup {
    pub fn new() -> Self {
        Self {
            flights: DashMap::new(),
        }
    }

    /// Runs `load` under single-flight for `key`. The second element reports
    /// whether this call led the flight (and therefore actually loaded).
    pub async fn run<F, Fut>(&self, key: &str, load: F) -> (Outcome, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let waiter = match self.flights.entry(key.to_string()) {
            Entry::Occupied(entry) => Some(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                let (tx, _rx) = broadcast::channel(1);
                entry.insert(tx);
                None
            }
        };

        if let Some(mut rx) = waiter {
            let outcome = match rx.recv().await {
                Ok(outcome) => outcome,
                // The leader was dropped before publishing.
                Err(_) => Err(Error::Transport("inflight load abandoned".to_string())),
            };
            return (outcome, false);
        }

        let flight = Flight {
            group: self,
            key: key.to_string(),
            published: false,
        };
        let outcome = load().await;
        flight.publish(outcome.clone());
        (outcome, true)
    }

    #[cfg(test)]
    pub fn open_flights(&self) -> usize {
        self.flights.len()
    }
}

impl Default for FlightGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// Leader-side handle. Publishing removes the slot and then broadcasts, in
/// that order; dropping without publishing (a cancelled leader) removes the
/// slot so waiters fail fast instead of hanging on a flight nobody runs.
struct Flight<'a> {
    group: &'a FlightGroup,
    key: String,
    published: bool,
}

impl Flight<'_> {
    fn publish(mut self, outcome: Outcome) {
        if let Some((_, tx)) = self.group.flights.remove(&self.key) {
            let _ = tx.send(outcome);
        }
        self.published = true;
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if !self.published {
            self.group.flights.remove(&self.key);
        }
    }
}

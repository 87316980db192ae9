//! Paced streaming endpoints.
//!
//! Both streaming RPCs emit at most one response per server tick. The work
//! runs on a background task that writes into a bounded channel; the gRPC
//! response stream is the receiving end.
//!
//! - [`paced`]: replay a fixed list of items, one per tick.
//! - [`owners`]: answer a stream of owner ids with their records.
//!
//! Shared invariants:
//! - The first tick fires one interval after the stream starts.
//! - A closed response channel means the client went away
//!   ([`Error::RequestCancelled`]).
//! - Cancellation of the shutdown token ends the stream with
//!   [`Error::ServiceShutdown`].
//!
//! [`Error::RequestCancelled`]: todohash_tonic_core::Error::RequestCancelled
//! [`Error::ServiceShutdown`]: todohash_tonic_core::Error::ServiceShutdown

pub mod owners;
pub mod paced;

use core::time::Duration;
use todohash_tonic_core::Error;
use tokio::{
    sync::mpsc,
    time::{Instant, Interval, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;

/// Creates a ticker whose first tick is one `period` from now.
pub fn ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Waits for the next tick unless the client leaves or the service shuts
/// down first.
pub async fn next_tick<T>(
    ticker: &mut Interval,
    token: &CancellationToken,
    tx: &mpsc::Sender<T>,
) -> Result<(), Error> {
    tokio::select! {
        biased;
        () = token.cancelled() => Err(Error::ServiceShutdown),
        () = tx.closed() => Err(Error::RequestCancelled),
        _ = ticker.tick() => Ok(()),
    }
}

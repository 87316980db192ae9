//! Result aggregation strategies for the fan-out executor.
//!
//! Every strategy runs the same per-item transform through [`parallel`] and,
//! for the same inputs, yields the same multiset of outputs. They only differ
//! in how the outputs are collected:
//!
//! | Strategy                           | Preallocation       | Order   |
//! |------------------------------------|---------------------|---------|
//! | [`Strategy::IndexedSlot`]          | one slot per item   | input   |
//! | [`Strategy::SlotHandle`]           | one holder per item | input   |
//! | [`Strategy::LockedAppend`]         | none                | arrival |
//! | [`Strategy::LockedAppendPrealloc`] | capacity only       | arrival |
//! | [`Strategy::ChannelRelay`]         | channel sized `N`   | arrival |
//! | [`Strategy::IndexedChannelRelay`]  | channel + `N` slots | input   |
//!
//! [`parallel`]: crate::parallel

mod append;
mod relay;
mod slots;
#[cfg(test)]
mod tests;

use crate::Scope;
use core::{fmt, future::Future, str::FromStr};

/// How worker outputs are gathered into the final collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Each worker writes its own reserved slot. No shared lock.
    #[default]
    IndexedSlot,
    /// Each worker fills a pre-created holder handed to it up front.
    SlotHandle,
    /// Workers append to a shared, mutex-guarded `Vec` that starts empty.
    LockedAppend,
    /// Like [`Strategy::LockedAppend`], with the capacity reserved up front.
    LockedAppendPrealloc,
    /// Workers send outputs over a buffered channel drained by a collector.
    ChannelRelay,
    /// Like [`Strategy::ChannelRelay`], but each message carries its input
    /// index and the collector restores input order.
    IndexedChannelRelay,
}

impl Strategy {
    pub const ALL: [Self; 6] = [
        Self::IndexedSlot,
        Self::SlotHandle,
        Self::LockedAppend,
        Self::LockedAppendPrealloc,
        Self::ChannelRelay,
        Self::IndexedChannelRelay,
    ];

    /// Kebab-case name used on the command line and in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::IndexedSlot => "indexed-slot",
            Self::SlotHandle => "slot-handle",
            Self::LockedAppend => "locked-append",
            Self::LockedAppendPrealloc => "locked-append-prealloc",
            Self::ChannelRelay => "channel-relay",
            Self::IndexedChannelRelay => "indexed-channel-relay",
        }
    }

    /// Returns `true` if outputs come back in input order.
    pub const fn preserves_order(self) -> bool {
        matches!(
            self,
            Self::IndexedSlot | Self::SlotHandle | Self::IndexedChannelRelay
        )
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when parsing an unknown strategy name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown aggregation strategy `{0}`")]
pub struct UnknownStrategy(pub String);

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

/// Applies `transform` to every input concurrently and gathers the outputs
/// according to `strategy`.
///
/// Empty input returns an empty `Vec` without spawning anything. On failure
/// the first worker error is returned and every partial output is dropped.
pub async fn aggregate<In, T, E, F, Fut>(
    scope: &Scope,
    strategy: Strategy,
    inputs: Vec<In>,
    transform: F,
) -> Result<Vec<T>, E>
where
    F: Fn(Scope, In) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    if inputs.is_empty() {
        return Ok(Vec::new());
    }

    match strategy {
        Strategy::IndexedSlot => slots::indexed_slot(scope, inputs, &transform).await,
        Strategy::SlotHandle => slots::slot_handle(scope, inputs, &transform).await,
        Strategy::LockedAppend => append::locked_append(scope, inputs, &transform, false).await,
        Strategy::LockedAppendPrealloc => {
            append::locked_append(scope, inputs, &transform, true).await
        }
        Strategy::ChannelRelay => relay::channel_relay(scope, inputs, &transform).await,
        Strategy::IndexedChannelRelay => {
            relay::indexed_channel_relay(scope, inputs, &transform).await
        }
    }
}

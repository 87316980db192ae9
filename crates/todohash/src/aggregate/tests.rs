use super::*;
use core::cell::Cell;
use core::time::Duration;
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, PartialEq, Eq)]
enum TestError {
    Rejected(u32),
    Canceled,
}

/// Later inputs finish first, so arrival order is the reverse of input order.
async fn square_reversed(scope: Scope, value: u32, len: u32) -> Result<(u32, u64), TestError> {
    let delay = Duration::from_millis(u64::from((len - value) * 3));
    tokio::select! {
        biased;
        () = scope.done() => Err(TestError::Canceled),
        () = tokio::time::sleep(delay) => Ok((value, u64::from(value) * u64::from(value))),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_strategy_yields_the_same_multiset() {
    let len = 40_u32;
    let inputs: Vec<u32> = (0..len).collect();
    let expected: Vec<(u32, u64)> = inputs.iter().map(|&v| (v, u64::from(v * v))).collect();

    for strategy in Strategy::ALL {
        let mut got = aggregate(&Scope::new(), strategy, inputs.clone(), |scope, value| {
            square_reversed(scope, value, len)
        })
        .await
        .unwrap_or_else(|e| panic!("{strategy} failed: {e:?}"));

        assert_eq!(got.len(), expected.len(), "{strategy}");
        if strategy.preserves_order() {
            assert_eq!(got, expected, "{strategy} must keep input order");
        }
        got.sort_unstable();
        assert_eq!(got, expected, "{strategy}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn outputs_need_not_be_sync() {
    for strategy in Strategy::ALL {
        let got = aggregate(&Scope::new(), strategy, (0..8).collect(), |_scope, value: u32| {
            async move { Ok::<_, TestError>(Cell::new(value * 2)) }
        })
        .await
        .unwrap_or_else(|e| panic!("{strategy} failed: {e:?}"));

        let mut values: Vec<u32> = got.into_iter().map(Cell::into_inner).collect();
        values.sort_unstable();
        assert_eq!(values, (0..8).map(|v| v * 2).collect::<Vec<_>>(), "{strategy}");
    }
}

#[tokio::test]
async fn empty_input_spawns_nothing() {
    for strategy in Strategy::ALL {
        let calls = Arc::new(AtomicUsize::new(0));
        let got = aggregate(&Scope::new(), strategy, Vec::<u32>::new(), |_scope, value| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, TestError>(value) }
        })
        .await;

        assert_eq!(got, Ok(Vec::new()), "{strategy}");
        assert_eq!(calls.load(Ordering::SeqCst), 0, "{strategy}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failure_discards_partial_results() {
    for strategy in Strategy::ALL {
        let got = aggregate(&Scope::new(), strategy, (0..16).collect(), |scope, value: u32| {
            async move {
                if value == 9 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    return Err(TestError::Rejected(value));
                }
                if value < 4 {
                    return Ok(value);
                }
                scope.done().await;
                Err(TestError::Canceled)
            }
        })
        .await;

        assert_eq!(got, Err(TestError::Rejected(9)), "{strategy}");
    }
}

#[tokio::test(start_paused = true)]
async fn expired_scope_fails_every_strategy() {
    for strategy in Strategy::ALL {
        let scope = Scope::new().with_timeout(Duration::from_millis(10));
        let got = aggregate(&scope, strategy, (1..=3).collect(), |scope, value: u32| {
            square_reversed(scope, value, 100)
        })
        .await;

        assert_eq!(got, Err(TestError::Canceled), "{strategy}");
    }
}

#[test]
fn strategy_names_parse_back() {
    for strategy in Strategy::ALL {
        assert_eq!(strategy.to_string().parse::<Strategy>(), Ok(strategy));
    }
    assert_eq!("Channel-Relay".parse::<Strategy>(), Ok(Strategy::ChannelRelay));
    assert_eq!(
        "round-robin".parse::<Strategy>(),
        Err(UnknownStrategy("round-robin".to_string()))
    );
    assert_eq!(Strategy::default(), Strategy::IndexedSlot);
}

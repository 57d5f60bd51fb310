//! Retry invariants under random budgets.
//!
//! Invariants tested:
//! - An always-transient op makes exactly max_retries + 1 attempts
//! - Success on attempt k stops retrying
//! - Backoff delays never exceed the 24h ceiling

use proptest::prelude::*;
use rivulet::{map, Backoff, ErrorMode, RivuletOptions, Source};
use rivulet_core::fault::{Fault, FaultKind};
use rivulet_retry::MAX_RETRY_DELAY;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn attempts_never_exceed_budget(max_retries in 0u32..4) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let probe = Arc::clone(&calls);

            let options = RivuletOptions::builder()
                .max_retries(max_retries)
                .base_delay(Duration::from_micros(100))
                .error_mode(ErrorMode::CollectAndContinue)
                .build();

            let output = map(
                Source::from_iter(0..1u32),
                options,
                move |_x, _cancel| {
                    let calls = Arc::clone(&probe);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<u32, _>(Fault::new(FaultKind::Timeout))
                    }
                },
            )
            .await
            .unwrap();

            prop_assert_eq!(
                calls.load(Ordering::SeqCst),
                max_retries as usize + 1
            );
            prop_assert_eq!(output.failures[0].attempts, max_retries + 1);
            Ok(())
        })?;
    }

    #[test]
    fn success_on_kth_attempt_stops_retrying(
        max_retries in 1u32..5,
        succeed_on in 1u32..5,
    ) {
        if succeed_on > max_retries + 1 {
            return Ok(());
        }
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let probe = Arc::clone(&calls);

            let options = RivuletOptions::builder()
                .max_retries(max_retries)
                .base_delay(Duration::from_micros(100))
                .error_mode(ErrorMode::CollectAndContinue)
                .build();

            let output = map(
                Source::from_iter(0..1u32),
                options,
                move |x, _cancel| {
                    let calls = Arc::clone(&probe);
                    async move {
                        let call = calls.fetch_add(1, Ordering::SeqCst) as u32 + 1;
                        if call >= succeed_on {
                            Ok(x)
                        } else {
                            Err(Fault::new(FaultKind::ConnectionReset))
                        }
                    }
                },
            )
            .await
            .unwrap();

            prop_assert_eq!(calls.load(Ordering::SeqCst) as u32, succeed_on);
            prop_assert!(output.failures.is_empty());
            Ok(())
        })?;
    }

    #[test]
    fn backoff_respects_the_ceiling(
        attempt in 1u32..200,
        base_ms in 1u64..100_000,
        strategy in prop::sample::select(vec![
            Backoff::Exponential,
            Backoff::ExponentialJitter,
            Backoff::DecorrelatedJitter,
            Backoff::Linear,
            Backoff::LinearJitter,
        ]),
    ) {
        let base = Duration::from_millis(base_ms);
        let prev = Duration::from_millis(base_ms.saturating_mul(3));
        let delay = strategy.delay(base, attempt, prev);
        prop_assert!(delay <= MAX_RETRY_DELAY);
    }
}

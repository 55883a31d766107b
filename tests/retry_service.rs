//! Retry loop scenarios: bounds, open circuits and cancellation.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use resilient_call::resilience::{
    CallContext, CancelCause, CircuitBreaker, CircuitState, RetryError, RetryableService,
};

mod common;
use common::{FlakyOperation, OpError};

#[tokio::test(start_paused = true)]
async fn test_fail_twice_then_succeed() {
    let service = RetryableService::new(3, Duration::from_millis(10));
    let op = FlakyOperation::failing_first(2);

    let result = service
        .call_with_retry(&CallContext::new(), || op.invoke())
        .await;

    assert_eq!(result.unwrap(), 3);
    assert_eq!(op.calls(), 3);
    assert_eq!(service.state(), CircuitState::Closed);
    assert_eq!(service.breaker().failure_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_bound_for_always_failing_operation() {
    // Breaker threshold above the retry budget so only the retry bound applies.
    let breaker = CircuitBreaker::new(10, Duration::from_secs(5));
    let service = RetryableService::with_breaker(4, Duration::from_millis(10), breaker);
    let op = FlakyOperation::always_failing();
    let start = Instant::now();

    let err = service
        .call_with_retry(&CallContext::new(), || op.invoke())
        .await
        .unwrap_err();

    match err {
        RetryError::Exhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 5);
            assert_eq!(last_error, OpError(5));
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
    assert_eq!(op.calls(), 5);
    // Four delays, none after the final attempt.
    assert_eq!(start.elapsed(), Duration::from_millis(40));
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_makes_one_attempt_without_delay() {
    let service = RetryableService::new(0, Duration::from_secs(30));
    let op = FlakyOperation::always_failing();
    let start = Instant::now();

    let err = service
        .call_with_retry(&CallContext::new(), || op.invoke())
        .await
        .unwrap_err();

    assert!(err.is_exhausted());
    assert_eq!(err.attempts(), Some(1));
    assert_eq!(op.calls(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_open_circuit_is_not_retried() {
    let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
    let service = RetryableService::with_breaker(5, Duration::from_secs(1), breaker);
    let op = FlakyOperation::always_failing();

    // First attempt opens the circuit, the retry after one delay is rejected.
    let err = service
        .call_with_retry(&CallContext::new(), || op.invoke())
        .await
        .unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(op.calls(), 1);
    assert_eq!(service.state(), CircuitState::Open);

    // Later calls fail fast with no attempt and no delay.
    let start = Instant::now();
    let err = service
        .call_with_retry(&CallContext::new(), || op.invoke())
        .await
        .unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(op.calls(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_threshold_cuts_retries_short() {
    let service = RetryableService::new(10, Duration::from_millis(10));
    let op = FlakyOperation::always_failing();

    let err = service
        .call_with_retry(&CallContext::new(), || op.invoke())
        .await
        .unwrap_err();

    // Default breaker opens after three failures; the fourth attempt is rejected.
    assert!(err.is_circuit_open());
    assert_eq!(op.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_pre_cancelled_context_skips_operation() {
    let service = RetryableService::new(3, Duration::from_millis(10));
    let op = FlakyOperation::always_succeeding();
    let ctx = CallContext::new();
    ctx.cancel();

    let err = service
        .call_with_retry(&ctx, || op.invoke())
        .await
        .unwrap_err();

    match err {
        RetryError::Cancelled { attempts, cause } => {
            assert_eq!(attempts, 0);
            assert_eq!(cause, CancelCause::Cancelled);
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert_eq!(op.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_expired_deadline_skips_operation() {
    let service = RetryableService::new(3, Duration::from_millis(10));
    let op = FlakyOperation::always_succeeding();
    let ctx = CallContext::new().with_timeout(Duration::from_millis(5));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let err = service
        .call_with_retry(&ctx, || op.invoke())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RetryError::Cancelled {
            attempts: 0,
            cause: CancelCause::DeadlineExceeded
        }
    ));
    assert_eq!(op.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_retry_delay() {
    let breaker = CircuitBreaker::new(10, Duration::from_secs(5));
    let service = RetryableService::with_breaker(3, Duration::from_secs(10), breaker);
    let op = FlakyOperation::always_failing();
    let ctx = CallContext::new();

    let canceller = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ctx.cancel();
        })
    };

    let start = Instant::now();
    let err = service
        .call_with_retry(&ctx, || op.invoke())
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(
        err,
        RetryError::Cancelled {
            attempts: 1,
            cause: CancelCause::Cancelled
        }
    ));
    assert_eq!(op.calls(), 1);
    assert_eq!(start.elapsed(), Duration::from_millis(20));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_interrupts_retry_delay() {
    let breaker = CircuitBreaker::new(10, Duration::from_secs(5));
    let service = RetryableService::with_breaker(3, Duration::from_secs(10), breaker);
    let op = FlakyOperation::always_failing();
    let ctx = CallContext::new().with_timeout(Duration::from_millis(50));

    let err = service
        .call_with_retry(&ctx, || op.invoke())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RetryError::Cancelled {
            attempts: 1,
            cause: CancelCause::DeadlineExceeded
        }
    ));
    assert_eq!(op.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_between_attempts_stops_further_calls() {
    let breaker = CircuitBreaker::new(10, Duration::from_secs(5));
    let service = RetryableService::with_breaker(5, Duration::ZERO, breaker);
    let op = FlakyOperation::always_failing();
    let ctx = CallContext::new();

    // The operation cancels the context while failing its second invocation.
    let err = service
        .call_with_retry(&ctx, || {
            let fut = op.invoke();
            let ctx = ctx.clone();
            async move {
                let result = fut.await;
                if matches!(result, Err(OpError(2))) {
                    ctx.cancel();
                }
                result
            }
        })
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.attempts(), Some(2));
    assert_eq!(op.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_operation_is_not_interrupted() {
    let service = RetryableService::new(0, Duration::ZERO);
    let op = FlakyOperation::always_succeeding().with_latency(Duration::from_millis(100));
    let ctx = CallContext::new().with_timeout(Duration::from_millis(10));

    let result = service.call_with_retry(&ctx, || op.invoke()).await;

    assert_eq!(result.unwrap(), 1);
    assert!(ctx.is_done());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_queued_behind_slow_call() {
    let service = Arc::new(RetryableService::new(0, Duration::ZERO));
    let op = FlakyOperation::always_succeeding().with_latency(Duration::from_millis(100));

    // First caller takes the breaker lock and holds it for 100ms.
    let holder = {
        let service = service.clone();
        let op = op.clone();
        tokio::spawn(async move {
            service
                .call_with_retry(&CallContext::new(), || op.invoke())
                .await
        })
    };
    tokio::task::yield_now().await;
    assert_eq!(op.calls(), 1);

    let ctx = CallContext::new();
    let canceller = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            ctx.cancel();
        })
    };

    let start = Instant::now();
    let queued = service.call_with_retry(&ctx, || op.invoke()).await;
    canceller.await.unwrap();

    assert!(matches!(
        queued,
        Err(RetryError::Cancelled {
            attempts: 0,
            cause: CancelCause::Cancelled
        })
    ));
    assert_eq!(start.elapsed(), Duration::from_millis(10));

    assert_eq!(holder.await.unwrap().unwrap(), 1);
    assert_eq!(op.calls(), 1);
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};
use cache_retry::RetryConfigBuilder;

#[derive(Debug, Clone)]
struct TemporaryError;

impl std::fmt::Display for TemporaryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "temporary error")
    }
}

impl std::error::Error for TemporaryError {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Retry Example");
    println!("=============\n");

    let call_count = Arc::new(AtomicUsize::new(0));

    // Example 1: fixed-ish backoff (no jitter) with automatic retry
    println!("Example 1: low-jitter exponential backoff");
    let cc = Arc::clone(&call_count);
    call_count.store(0, Ordering::SeqCst);

    let service = tower::service_fn(move |req: String| {
        let cc = Arc::clone(&cc);
        async move {
            let count = cc.fetch_add(1, Ordering::SeqCst);
            println!("  service called (attempt {})", count + 1);
            if count < 2 {
                Err(TemporaryError)
            } else {
                Ok(format!("Success: {}", req))
            }
        }
    });

    let retry_layer = RetryConfigBuilder::<TemporaryError>::new()
        .max_retries(4)
        .base_delay(Duration::from_millis(100))
        .jitter_factor(0.0)
        .on_retry(|attempt, delay| {
            println!("  [retry] attempt {} after {:?}", attempt, delay);
        })
        .on_success(|attempts| {
            println!("  [success] after {} total attempts", attempts);
        })
        .build();

    let mut service = retry_layer.layer(service);
    let result = service.ready().await?.call("test".to_string()).await?;
    println!("  result: {}\n", result);

    // Example 2: exponential backoff with jitter and a cap
    println!("Example 2: exponential backoff with jitter");
    call_count.store(0, Ordering::SeqCst);
    let cc = Arc::clone(&call_count);

    let service = tower::service_fn(move |req: String| {
        let cc = Arc::clone(&cc);
        async move {
            let count = cc.fetch_add(1, Ordering::SeqCst);
            println!("  service called (attempt {})", count + 1);
            if count < 3 {
                Err(TemporaryError)
            } else {
                Ok(format!("Success: {}", req))
            }
        }
    });

    let retry_layer = RetryConfigBuilder::<TemporaryError>::new()
        .max_retries(4)
        .base_delay(Duration::from_millis(50))
        .max_delay(Duration::from_secs(1))
        .jitter_factor(0.2)
        .on_retry(|attempt, delay| {
            println!("  [retry] attempt {} after {:?}", attempt, delay);
        })
        .on_success(|attempts| {
            println!("  [success] after {} total attempts", attempts);
        })
        .build();

    let mut service = retry_layer.layer(service);
    let result = service.ready().await?.call("test".to_string()).await?;
    println!("  result: {}\n", result);

    // Example 3: retry predicate (selective retry)
    println!("Example 3: retry predicate (only retry temporary errors)");

    #[derive(Debug, Clone)]
    struct PermanentError;

    impl std::fmt::Display for PermanentError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "permanent error")
        }
    }

    impl std::error::Error for PermanentError {}

    let service = tower::service_fn(|_req: String| async move {
        println!("  service called");
        Err::<String, _>(PermanentError)
    });

    let retry_layer = RetryConfigBuilder::<PermanentError>::new()
        .max_retries(4)
        .base_delay(Duration::from_millis(50))
        .retry_on(|_: &PermanentError| false)
        .on_ignored_error(|| {
            println!("  [ignored] error not retryable");
        })
        .build();

    let mut service = retry_layer.layer(service);
    let result = service.ready().await?.call("test".to_string()).await;
    println!("  result: {:?}\n", result);

    // Example 4: exhausted retries
    println!("Example 4: exhausted retries");
    call_count.store(0, Ordering::SeqCst);
    let cc = Arc::clone(&call_count);

    let service = tower::service_fn(move |_req: String| {
        let cc = Arc::clone(&cc);
        async move {
            let count = cc.fetch_add(1, Ordering::SeqCst);
            println!("  service called (attempt {})", count + 1);
            Err::<String, _>(TemporaryError)
        }
    });

    let retry_layer = RetryConfigBuilder::<TemporaryError>::new()
        .max_retries(2)
        .base_delay(Duration::from_millis(50))
        .on_retry(|attempt, _| {
            println!("  [retry] attempt {}", attempt);
        })
        .on_error(|attempts| {
            println!("  [error] exhausted retries after {} attempts", attempts);
        })
        .build();

    let mut service = retry_layer.layer(service);
    let result = service.ready().await?.call("test".to_string()).await;
    println!("  result: {:?}\n", result);

    Ok(())
}

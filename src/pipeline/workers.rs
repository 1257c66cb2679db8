//! Bounded worker pool for processing the items of one batch

use futures::future::join_all;
use std::future::Future;
use tokio::sync::Semaphore;

/// Runs `f` over `items` with at most `limit` calls in flight
///
/// Results come back in input order regardless of completion order. A
/// `limit` of 0 is treated as 1.
pub async fn process_concurrently<T, R, F, Fut>(items: Vec<T>, limit: usize, f: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let semaphore = Semaphore::new(limit.max(1));
    let semaphore = &semaphore;

    let tasks = items.into_iter().map(|item| {
        let task = f(item);
        async move {
            let _permit = semaphore.acquire().await;
            task.await
        }
    });

    join_all(tasks).await
}

use std::future::Future;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;

use crate::task::ImageTask;

use super::types::TaskOutcome;

/// Run one batch concurrently and wait for every task to settle.
///
/// Tasks are started in the order given; at most `max_concurrency` run at
/// once. Outcomes come back in completion order.
pub(crate) async fn execute_batch<F, Fut>(
    tasks: Vec<ImageTask>,
    max_concurrency: usize,
    run: F,
) -> Vec<TaskOutcome>
where
    F: Fn(ImageTask) -> Fut,
    Fut: Future<Output = TaskOutcome>,
{
    let sem = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut futs = FuturesUnordered::new();

    for task in tasks {
        let sem = sem.clone();
        let fut = run(task);
        futs.push(async move {
            // never closed
            let _permit = sem.acquire_owned().await.ok();
            fut.await
        });
    }

    let mut outcomes = Vec::with_capacity(futs.len());
    while let Some(outcome) = futs.next().await {
        outcomes.push(outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Dimensions, TaskTarget};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn task(n: usize) -> ImageTask {
        ImageTask::new(
            TaskTarget::Static {
                slide_id: "s1".to_string(),
                element_id: format!("e{}", n),
            },
            format!("p{}", n),
            Dimensions::STATIC_DEFAULT,
        )
    }

    #[tokio::test]
    async fn test_batch_respects_limit() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let (active, peak) = (&active, &peak);

        let outcomes = execute_batch((0..5).map(task).collect(), 2, move |_task| async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            TaskOutcome::Succeeded { cached: false }
        })
        .await;

        assert_eq!(outcomes.len(), 5);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}

use futures::future::join_all;
use std::future::Future;

use crate::error::{AppError, AppResult};

/// Concurrent upstream calls issued per wave
pub const WAVE_WIDTH: usize = 10;

/// Outcome of a group of independent upstream calls after failures were absorbed
#[derive(Debug)]
pub struct Settled<T> {
    pub succeeded: Vec<T>,
    pub failed: usize,
}

impl<T> Settled<T> {
    pub fn empty() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: 0,
        }
    }

    pub fn merge(&mut self, other: Settled<T>) {
        self.succeeded.extend(other.succeeded);
        self.failed += other.failed;
    }

    /// Successful results, or an error when every call failed
    pub fn into_required(self, stage: &str) -> AppResult<Vec<T>> {
        if self.succeeded.is_empty() && self.failed > 0 {
            return Err(AppError::ExternalApi(format!(
                "All {} {} requests failed",
                self.failed, stage
            )));
        }
        Ok(self.succeeded)
    }
}

/// Sorts results into successes and absorbed failures, preserving the order
/// of successes.
///
/// Failed members are logged and dropped. `AuthExpired` is never absorbed:
/// the first one found is returned as the error.
pub fn settle<T>(results: Vec<AppResult<T>>, stage: &str) -> AppResult<Settled<T>> {
    let mut settled = Settled::empty();

    for result in results {
        match result {
            Ok(value) => settled.succeeded.push(value),
            Err(e) if e.is_auth_expired() => return Err(e),
            Err(e) => {
                tracing::warn!(stage = stage, error = %e, "Upstream chunk failed, continuing without it");
                settled.failed += 1;
            }
        }
    }

    if settled.failed > 0 {
        tracing::warn!(
            stage = stage,
            success_count = settled.succeeded.len(),
            error_count = settled.failed,
            "Partial upstream failure"
        );
    }

    Ok(settled)
}

/// Runs one future per chunk of `items`, all chunks concurrently, and
/// settles the results in chunk order.
///
/// Callers keep the number of chunks bounded; nothing here limits it.
pub async fn per_chunk<'a, I, T, F, Fut>(
    items: &'a [I],
    chunk_size: usize,
    stage: &str,
    call: F,
) -> AppResult<Settled<T>>
where
    F: Fn(&'a [I]) -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let results = join_all(items.chunks(chunk_size.max(1)).map(call)).await;
    settle(results, stage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_drops_transient_failures_in_order() {
        let results = vec![
            Ok(1),
            Err(AppError::ExternalApi("timeout".to_string())),
            Ok(3),
        ];

        let settled = settle(results, "test").unwrap();
        assert_eq!(settled.succeeded, vec![1, 3]);
        assert_eq!(settled.failed, 1);
    }

    #[test]
    fn test_settle_surfaces_auth_expired() {
        let results = vec![
            Ok(1),
            Err(AppError::AuthExpired("401".to_string())),
            Err(AppError::ExternalApi("timeout".to_string())),
        ];

        let result = settle(results, "test");
        assert!(matches!(result, Err(AppError::AuthExpired(_))));
    }

    #[test]
    fn test_into_required_fails_only_when_everything_failed() {
        let all_failed: Settled<i32> = Settled {
            succeeded: vec![],
            failed: 2,
        };
        assert!(matches!(
            all_failed.into_required("test"),
            Err(AppError::ExternalApi(_))
        ));

        let nothing_attempted: Settled<i32> = Settled::empty();
        assert_eq!(nothing_attempted.into_required("test").unwrap(), Vec::<i32>::new());

        let partial = Settled {
            succeeded: vec![7],
            failed: 5,
        };
        assert_eq!(partial.into_required("test").unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_per_chunk_calls_once_per_chunk() {
        let items: Vec<u32> = (0..120).collect();

        let settled = per_chunk(&items, 50, "test", |chunk| async move {
            Ok::<usize, AppError>(chunk.len())
        })
        .await
        .unwrap();

        assert_eq!(settled.succeeded, vec![50, 50, 20]);
    }

    #[tokio::test]
    async fn test_per_chunk_tolerates_failed_chunk() {
        let items: Vec<u32> = (0..100).collect();

        let settled = per_chunk(&items, 50, "test", |chunk| async move {
            if chunk[0] == 0 {
                Err(AppError::ExternalApi("boom".to_string()))
            } else {
                Ok(chunk.len())
            }
        })
        .await
        .unwrap();

        assert_eq!(settled.succeeded, vec![50]);
        assert_eq!(settled.failed, 1);
    }
}

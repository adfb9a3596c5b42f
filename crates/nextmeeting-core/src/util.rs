//! Small helpers shared by the orchestrator, adapters and configuration.

use std::future::Future;

use futures::future::join_all;

use crate::ValidationError;

/// Strict boolean parser: trims and lowercases, accepts only `true`/`false`.
pub fn parse_bool(value: &str) -> Result<bool, ValidationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ValidationError::InvalidBoolean {
            value: value.to_owned(),
        }),
    }
}

/// Awaits `f` for each item in order, one at a time, collecting the outputs.
///
/// Item `n + 1` is not started until item `n` has completed.
pub async fn map_ordered<'a, T, R, F, Fut>(items: &'a [T], mut f: F) -> Vec<R>
where
    F: FnMut(usize, &'a T) -> Fut,
    Fut: Future<Output = R>,
{
    let mut outputs = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        outputs.push(f(index, item).await);
    }
    outputs
}

/// Runs `f` for every item concurrently and returns the outputs in input order.
///
/// Only for work whose ordering and isolation do not matter.
pub async fn map_parallel<'a, T, R, F, Fut>(items: &'a [T], f: F) -> Vec<R>
where
    F: Fn(usize, &'a T) -> Fut,
    Fut: Future<Output = R>,
{
    join_all(items.iter().enumerate().map(|(index, item)| f(index, item))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn parse_bool_accepts_trimmed_mixed_case() {
        assert_eq!(parse_bool(" TRUE "), Ok(true));
        assert_eq!(parse_bool("False"), Ok(false));
    }

    #[test]
    fn parse_bool_rejects_loose_values() {
        for value in ["1", "yes", "", "on"] {
            assert!(matches!(
                parse_bool(value),
                Err(ValidationError::InvalidBoolean { .. })
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn map_ordered_runs_items_one_after_another() {
        let log = Mutex::new(Vec::new());
        let items = [30_u64, 10, 20];

        let outputs = map_ordered(&items, |index, delay| {
            let log = &log;
            async move {
                log.lock().expect("log lock").push(format!("start {index}"));
                tokio::time::sleep(Duration::from_millis(*delay)).await;
                log.lock().expect("log lock").push(format!("end {index}"));
                index * 2
            }
        })
        .await;

        assert_eq!(outputs, vec![0, 2, 4]);
        assert_eq!(
            log.into_inner().expect("log lock"),
            vec!["start 0", "end 0", "start 1", "end 1", "start 2", "end 2"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn map_parallel_keeps_input_order_in_results() {
        let items = [30_u64, 10, 20];
        let started = tokio::time::Instant::now();

        let outputs = map_parallel(&items, |index, delay| async move {
            tokio::time::sleep(Duration::from_millis(*delay)).await;
            index
        })
        .await;

        assert_eq!(outputs, vec![0, 1, 2]);
        assert!(started.elapsed() < Duration::from_millis(60));
    }
}

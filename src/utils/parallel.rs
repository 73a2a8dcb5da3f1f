use std::sync::mpsc;

use threadpool::ThreadPool;

/// Run independent simulations on a worker pool and collect their results in
/// submission order. Each closure owns its entire simulation state; nothing
/// is shared between workers.
pub fn run_all<T, F>(tasks: Vec<F>) -> Vec<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let workers = num_cpus::get().max(1);
    let pool = ThreadPool::new(workers);
    let (sender, receiver) = mpsc::channel();

    let task_count = tasks.len();
    for (index, task) in tasks.into_iter().enumerate() {
        let sender = sender.clone();
        pool.execute(move || {
            sender.send((index, task())).expect("Result channel closed");
        });
    }
    drop(sender);

    let mut results: Vec<Option<T>> = (0..task_count).map(|_| None).collect();
    for (index, result) in receiver {
        results[index] = Some(result);
    }
    pool.join();
    results.into_iter().map(|r| r.expect("Worker panicked")).collect()
}

/// Run one closure per rank, like `run_all` but indexed.
pub fn run_ranks<T, F>(task: F, count: usize) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(usize) -> T + Send + Sync + Clone + 'static,
{
    let tasks: Vec<_> = (0..count)
        .map(|rank| {
            let task = task.clone();
            move || task(rank)
        })
        .collect();
    run_all(tasks)
}

/*====================================================================================================================*/

#[cfg(test)]
mod tests {
    use super::{run_all, run_ranks};

    #[test]
    fn test_results_keep_submission_order() {
        let tasks: Vec<_> = (0..16).map(|i| move || i * i).collect();
        let results = run_all(tasks);
        assert_eq!(results, (0..16).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn test_run_ranks() {
        let results = run_ranks(|rank| rank + 1, 8);
        assert_eq!(results, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }
}

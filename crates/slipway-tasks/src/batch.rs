//! Parallel fan-out over a homogeneous batch of items
//!
//! Used inside task bodies that process many projects at once, such as
//! running every test project. Every item runs to completion even when
//! siblings fail; all failures are collected into one error.

use std::fmt;

/// All failures from one batch, in item order
#[derive(Debug)]
pub struct BatchError {
    failures: Vec<(String, anyhow::Error)>,
}

impl BatchError {
    /// The failing items and their errors
    pub fn failures(&self) -> &[(String, anyhow::Error)] {
        &self.failures
    }

    /// Number of failing items
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Always false; a batch error holds at least one failure
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} item(s) failed:", self.failures.len())?;
        for (name, error) in &self.failures {
            writeln!(f, "  {name}: {error:#}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}

/// Run `action` over every item on its own thread and wait for all of
/// them. Failures do not stop siblings; if any item fails the result is
/// a [`BatchError`] naming each one.
pub fn run_all<T, N, A>(items: &[T], name: N, action: A) -> Result<(), BatchError>
where
    T: Sync,
    N: Fn(&T) -> String,
    A: Fn(&T) -> anyhow::Result<()> + Sync,
{
    // Threads borrow the action; it only has to be Sync, not Send
    let action = &action;
    let results: Vec<(String, anyhow::Result<()>)> = std::thread::scope(|scope| {
        let handles: Vec<_> = items
            .iter()
            .map(|item| (name(item), scope.spawn(move || action(item))))
            .collect();

        handles
            .into_iter()
            .map(|(item_name, handle)| {
                let result = match handle.join() {
                    Ok(result) => result,
                    Err(_) => Err(anyhow::anyhow!("worker thread panicked")),
                };
                (item_name, result)
            })
            .collect()
    });

    let failures: Vec<(String, anyhow::Error)> = results
        .into_iter()
        .filter_map(|(item_name, result)| result.err().map(|e| (item_name, e)))
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(BatchError { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_all_items_succeed() {
        let ran = AtomicUsize::new(0);
        let items = vec!["a", "b", "c"];
        let result = run_all(&items, |i| i.to_string(), |_| {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_every_failure_is_collected() {
        let items = vec!["ok", "bad1", "bad2"];
        let err = run_all(&items, |i| i.to_string(), |i| {
            if i.starts_with("bad") {
                anyhow::bail!("failed on {i}")
            }
            Ok(())
        })
        .unwrap_err();

        assert_eq!(err.len(), 2);
        let names: Vec<&str> = err.failures().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["bad1", "bad2"]);
        assert!(err.to_string().contains("bad2: failed on bad2"));
    }

    #[test]
    fn test_failure_does_not_stop_siblings() {
        let ran = AtomicUsize::new(0);
        let items = vec![1, 2, 3, 4];
        let err = run_all(&items, |i| i.to_string(), |i| {
            ran.fetch_add(1, Ordering::SeqCst);
            if *i == 1 {
                anyhow::bail!("first failed")
            }
            Ok(())
        })
        .unwrap_err();

        assert_eq!(err.len(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_action_may_hold_non_send_state() {
        // A MutexGuard is Sync but not Send; the fan-out shares the
        // action by reference, so an action owning one still works
        let limit = std::sync::Mutex::new(2usize);
        let guard = limit.lock().unwrap();

        let items = vec![1usize, 2, 3];
        let err = run_all(&items, |i| i.to_string(), move |i| {
            if *i > *guard {
                anyhow::bail!("{i} exceeds limit")
            }
            Ok(())
        })
        .unwrap_err();
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn test_empty_batch_is_ok() {
        let items: Vec<&str> = Vec::new();
        assert!(run_all(&items, |i| i.to_string(), |_| Ok(())).is_ok());
    }
}

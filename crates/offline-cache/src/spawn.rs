//! Executors for detached cache writes.

use std::sync::Arc;

use futures::future::BoxFuture;

/// A cache write that runs after its response has been returned.
pub type DetachedTask = BoxFuture<'static, ()>;

/// Starts detached tasks on the host's executor.
pub trait Spawner: Send + Sync {
    /// Start `task` in the background, or hand it back if there is nowhere
    /// to run it. Returned tasks run on the next
    /// [`GenerationManager::flush`](crate::GenerationManager::flush).
    fn spawn(&self, task: DetachedTask) -> Result<(), DetachedTask>;
}

/// Spawns onto the ambient tokio runtime, deferring when there is none.
#[cfg(feature = "tokio")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSpawner;

#[cfg(feature = "tokio")]
impl Spawner for TokioSpawner {
    fn spawn(&self, task: DetachedTask) -> Result<(), DetachedTask> {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(task);
                Ok(())
            }
            Err(_) => Err(task),
        }
    }
}

/// Never spawns. Writes wait until the host calls `flush`, which is how a
/// single-threaded host such as Spin finishes work after responding.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeferToFlush;

impl Spawner for DeferToFlush {
    fn spawn(&self, task: DetachedTask) -> Result<(), DetachedTask> {
        Err(task)
    }
}

/// Tokio when the `tokio` feature is on, [`DeferToFlush`] otherwise.
pub fn default_spawner() -> Arc<dyn Spawner> {
    #[cfg(feature = "tokio")]
    {
        Arc::new(TokioSpawner)
    }
    #[cfg(not(feature = "tokio"))]
    {
        Arc::new(DeferToFlush)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[test]
    fn test_defer_hands_task_back() {
        let task: DetachedTask = async {}.boxed();
        assert!(DeferToFlush.spawn(task).is_err());
    }

    #[cfg(feature = "tokio")]
    #[test]
    fn test_tokio_spawner_defers_outside_runtime() {
        let task: DetachedTask = async {}.boxed();
        assert!(TokioSpawner.spawn(task).is_err());
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn test_tokio_spawner_runs_inside_runtime() {
        let (tx, rx) = futures::channel::oneshot::channel();
        let task: DetachedTask = async move {
            let _ = tx.send(7);
        }
        .boxed();

        assert!(TokioSpawner.spawn(task).is_ok());
        assert_eq!(rx.await.unwrap(), 7);
    }
}

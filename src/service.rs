//! Spawns the maintenance daemons (§5, §10.1) around a shared [`Ring`]: one task per timer,
//! each a `loop { tick(); sleep(interval); }` in the shape of `vl1service.rs`'s
//! `node_background_task_daemon`, generalized from that single background task into the
//! ring's five independent timers (stabilize, fix-fingers, check-predecessor, verbose,
//! anti-entropy).

use crate::replication::sync;
use crate::ring::Ring;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Handle to a running daemon set. Dropping this does not stop the daemons — call
/// [`Service::shutdown`] for cooperative cancellation at the next tick boundary.
pub struct Service {
    shutdown: Arc<tokio::sync::Notify>,
    tasks: Vec<JoinHandle<()>>,
}

impl Service {
    /// Spawn the full default daemon set on `ring`. `ForwardSync` is not included — it is
    /// opt-in (§4.5, §9) and callers wanting it spawn [`sync::run_forward_sync_round`]
    /// themselves on whatever schedule they like.
    pub fn spawn(ring: Arc<Ring>) -> Self {
        let shutdown = Arc::new(tokio::sync::Notify::new());
        let mut tasks = Vec::new();

        let interval = ring.settings().stabilize_interval;
        tasks.push(spawn_loop(shutdown.clone(), interval, {
            let ring = ring.clone();
            move || {
                let ring = ring.clone();
                async move { ring.stabilize().await }
            }
        }));

        let interval = ring.settings().fix_fingers_interval;
        tasks.push(spawn_loop(shutdown.clone(), interval, {
            let ring = ring.clone();
            move || {
                let ring = ring.clone();
                async move { ring.fix_fingers().await }
            }
        }));

        let interval = ring.settings().check_predecessor_interval;
        tasks.push(spawn_loop(shutdown.clone(), interval, {
            let ring = ring.clone();
            move || {
                let ring = ring.clone();
                async move { ring.check_predecessor().await }
            }
        }));

        let interval = ring.settings().anti_entropy_interval;
        tasks.push(spawn_loop(shutdown.clone(), interval, {
            let ring = ring.clone();
            move || {
                let ring = ring.clone();
                async move { sync::run_basic_round(&ring).await }
            }
        }));

        // Verbose: the fourth maintenance timer of §5, logged at the anti-entropy cadence
        // rather than a fifth independent interval — frequent enough to be useful, rare
        // enough not to flood the log.
        let interval = ring.settings().anti_entropy_interval;
        tasks.push(spawn_loop(shutdown.clone(), interval, {
            let ring = ring.clone();
            move || {
                let ring = ring.clone();
                async move { ring.log_state() }
            }
        }));

        Service { shutdown, tasks }
    }

    /// Signal every daemon to stop at its next tick boundary and await them.
    pub async fn shutdown(self) {
        self.shutdown.notify_waiters();
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

fn spawn_loop<F, Fut>(shutdown: Arc<tokio::sync::Notify>, interval: std::time::Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.notified() => return,
                _ = tick() => {}
            }
            tokio::select! {
                _ = shutdown.notified() => return,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    })
}

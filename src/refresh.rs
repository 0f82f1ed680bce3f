use crate::prelude::*;

/// Where the scheduler gets its notion of "now". Tests drive a settable
/// fake; everything else uses `SystemClock`.
pub trait Clock: Send + Sync + 'static {
    fn unix_seconds(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_seconds(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Ticks once a second and drives `Vault::refresh_at`, which keeps the
/// countdowns moving and regenerates codes at window boundaries.
///
/// `shutdown` consumes the handle, so a session can only release its
/// scheduler once. A handle that is dropped instead closes the stop
/// channel, which the task notices on its next tick.
pub struct Refresher {
    stop_tx: tokio::sync::oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl Refresher {
    pub fn spawn<S, C>(
        vault: std::sync::Arc<tokio::sync::Mutex<crate::vault::Vault<S>>>,
        clock: C,
    ) -> Self
    where
        S: crate::store::Store + 'static,
        C: Clock,
    {
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel();
        let task = tokio::task::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(1));
            interval.set_missed_tick_behavior(
                tokio::time::MissedTickBehavior::Skip,
            );
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        let now = clock.unix_seconds();
                        match vault.lock().await.refresh_at(now).await {
                            Ok(_) => {}
                            // the vault was locked out from under us;
                            // nothing to refresh until it comes back
                            Err(
                                Error::VaultLocked | Error::PasswordNotSet,
                            ) => {}
                            Err(e) => log::warn!("refresh failed: {e}"),
                        }
                    }
                }
            }
        });
        Self { stop_tx, task }
    }

    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                log::warn!("refresher task failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU64, Ordering};

    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[derive(Clone)]
    struct FakeClock(std::sync::Arc<AtomicU64>);

    impl Clock for FakeClock {
        fn unix_seconds(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn password(s: &str) -> crate::locked::Password {
        let mut vec = crate::locked::Vec::new();
        vec.extend(s.bytes());
        crate::locked::Password::new(vec)
    }

    #[tokio::test(start_paused = true)]
    async fn drives_refresh_and_shuts_down() {
        let store = crate::store::MemoryStore::new();
        let config = crate::config::Config {
            pbkdf2_iterations: 10,
            period: 30,
            store_file: None,
        };
        let mut vault = crate::vault::Vault::open(store.clone(), &config)
            .await
            .unwrap();
        vault.set_password(password("hunter2222"), 31).await.unwrap();
        vault.add("Example", "alice", RFC_SECRET, 31).await.unwrap();
        assert_eq!(vault.records()[0].code, "287082");
        let vault = std::sync::Arc::new(tokio::sync::Mutex::new(vault));

        let now = std::sync::Arc::new(AtomicU64::new(45));
        let refresher =
            Refresher::spawn(vault.clone(), FakeClock(now.clone()));

        // a mid-window tick only moves the countdown
        tokio::time::sleep(std::time::Duration::from_millis(1_500)).await;
        {
            let records = vault.lock().await.records();
            assert_eq!(records[0].time_remaining, 15);
            assert_eq!(records[0].code, "287082");
        }

        // cross the boundary; the next tick regenerates and persists
        let writes = store.write_count();
        now.store(60, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(1_000)).await;
        let code = {
            let records = vault.lock().await.records();
            assert_eq!(records[0].time_remaining, 30);
            assert_ne!(records[0].code, "287082");
            records[0].code.clone()
        };
        assert_eq!(store.write_count(), writes + 1);

        refresher.shutdown().await;

        // no more ticks after shutdown
        now.store(90, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(2_000)).await;
        assert_eq!(vault.lock().await.records()[0].code, code);
    }
}

// Worker Shutdown Token

use tokio::sync::watch;

/// Shutdown signal for graceful termination
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for shutdown signal; returns at once if it was already sent
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

/// Shutdown sender
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal shutdown to every loop holding a token
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_returns_after_late_subscription() {
        let (sender, token) = shutdown_channel();
        sender.shutdown();

        let mut late = token.clone();
        assert!(late.is_shutdown());
        tokio::time::timeout(std::time::Duration::from_millis(100), late.wait())
            .await
            .expect("wait should not block once shutdown was sent");
    }

    #[test]
    fn test_wait_pends_until_shutdown() {
        let (sender, mut token) = shutdown_channel();
        let mut wait = tokio_test::task::spawn(async move { token.wait().await });

        tokio_test::assert_pending!(wait.poll());
        sender.shutdown();
        assert!(wait.is_woken());
        tokio_test::assert_ready!(wait.poll());
    }
}

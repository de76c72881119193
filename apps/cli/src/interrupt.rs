use std::future::Future;

use console::style;
use tokio::sync::watch;

/// Ctrl-C latch shared by the whole process.
///
/// Once installed, Ctrl-C no longer kills the process: it sets the latch,
/// the running action finishes, and `main` falls through to cleanup.
#[derive(Clone)]
pub struct Interrupt {
    rx: watch::Receiver<bool>,
}

impl Interrupt {
    pub async fn install() -> Self {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx.send(true).is_err() {
                    break;
                }
            }
        });
        // Let the listener register before any work starts
        tokio::task::yield_now().await;
        Self::new(rx)
    }

    fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once Ctrl-C has been pressed. Never resolves if the listener
    /// is gone.
    pub async fn wait(&mut self) {
        if self.rx.wait_for(|set| *set).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Drive `action` to completion even if Ctrl-C arrives meanwhile.
    ///
    /// Steps that touch remote state are never abandoned halfway, so the
    /// key press only gets acknowledged here and acted on afterwards.
    pub async fn finish<F: Future>(&mut self, action: F) -> F::Output {
        tokio::pin!(action);
        if !self.is_set() {
            tokio::select! {
                out = &mut action => return out,
                _ = self.wait() => {
                    eprintln!(
                        "\n{} Interrupted. Finishing the current step, then cleaning up...",
                        style("!").yellow().bold()
                    );
                }
            }
        }
        action.await
    }
}

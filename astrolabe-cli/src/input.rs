use astrolabe_core::InputSource;
use async_trait::async_trait;
use std::io::{self, BufRead};
use std::thread;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Operator input from the terminal. Ctrl-C ends the session like `sair`.
///
/// Stdin is read on a detached thread so a pending read never holds the
/// runtime open at exit.
pub struct TerminalInput {
    lines: mpsc::UnboundedReceiver<io::Result<String>>,
}

impl TerminalInput {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
            debug!("stdin reader finished");
        });
        Self { lines: rx }
    }
}

#[async_trait]
impl InputSource for TerminalInput {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        tokio::select! {
            line = self.lines.recv() => line.transpose(),
            _ = signal::ctrl_c() => {
                info!("Interrupt received, leaving chat session");
                Ok(None)
            }
        }
    }
}

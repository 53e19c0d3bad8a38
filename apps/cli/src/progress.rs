//! Progress bar for CLI batch transfers

use artifactor_types::TransferEvent;
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::broadcast::{self, error::RecvError};

/// Renders one repository batch from its transfer events
pub struct BatchProgress {
    bar: ProgressBar,
    verb: &'static str,
}

impl BatchProgress {
    pub fn new(enabled: bool, verb: &'static str) -> Self {
        let bar = ProgressBar::new(0);
        if !enabled {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(template) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
        {
            bar.set_style(template.progress_chars("█▓▒░  "));
        }

        Self { bar, verb }
    }

    /// Consume events until the batch ends or the repository goes away.
    ///
    /// Returns the number of files transferred.
    pub async fn track(self, mut events: broadcast::Receiver<TransferEvent>) -> usize {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(completed) = self.handle_event(&event) {
                        return completed;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => {
                    self.bar.finish_and_clear();
                    return self.bar.position() as usize;
                }
            }
        }
    }

    /// Apply one event; `Some` once the batch has finished
    fn handle_event(&self, event: &TransferEvent) -> Option<usize> {
        match event {
            TransferEvent::BatchStarted { total, .. } => {
                self.bar.set_length(*total as u64);
                self.bar.set_message(self.verb);
            }

            TransferEvent::FileCompleted { path, .. } => {
                self.bar.inc(1);
                self.bar.set_message(path.clone());
            }

            TransferEvent::FileFailed { path, .. } => {
                self.bar.inc(1);
                self.bar.println(format!(
                    "{} {}",
                    style("✗").red().bold(),
                    style(path).dim()
                ));
            }

            TransferEvent::BatchFinished {
                completed, failed, ..
            } => {
                if *failed == 0 {
                    self.bar.finish_with_message(format!(
                        "{} {} complete",
                        style("✓").green().bold(),
                        self.verb
                    ));
                } else {
                    self.bar.abandon_with_message(format!(
                        "{} {} file(s) failed",
                        style("✗").red().bold(),
                        failed
                    ));
                }
                return Some(*completed);
            }
        }
        None
    }
}

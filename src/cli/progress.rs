use idxsync::{EventKind, LogEvent, ProgressLog};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner that renders progress log events as they are appended
pub struct ActivitySpinner {
    pb: ProgressBar,
}

impl ActivitySpinner {
    /// Create a spinner; hidden when `quiet` so events are still collected
    pub fn new(quiet: bool) -> Self {
        let pb = if quiet {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .expect("static spinner template is valid"),
            );
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        };
        Self { pb }
    }

    /// A progress log whose events are printed above the spinner
    pub fn progress_log(&self) -> ProgressLog {
        let pb = self.pb.clone();
        ProgressLog::with_listener(move |event: &LogEvent| match event.kind {
            EventKind::Info => pb.set_message(event.to_string()),
            // Fatal errors are reported once, by main's error path
            EventKind::Fatal => {}
            _ => pb.println(format!("  {}", event)),
        })
    }

    /// Time since the spinner was created
    pub fn elapsed(&self) -> Duration {
        self.pb.elapsed()
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl Drop for ActivitySpinner {
    fn drop(&mut self) {
        if !self.pb.is_finished() {
            self.pb.finish_and_clear();
        }
    }
}

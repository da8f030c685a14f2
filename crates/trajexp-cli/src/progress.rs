use indicatif::{ProgressBar, ProgressStyle};
use trajexp_core::ports::ProgressReporter;

/// Create a progress bar for determinate progress
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg}\n[{bar:40.cyan/blue}] {pos}/{len} ({percent}%) ETA: {eta}")
    {
        pb.set_style(style.progress_chars("█▓▒░ "));
    }
    pb.set_message(message.to_string());
    pb
}

/// Progress bar advanced once per finished trajectory
pub struct TrajectoryProgress {
    bar: ProgressBar,
}

impl TrajectoryProgress {
    /// Visible bar, or a hidden one when output must stay machine-readable
    pub fn new(total: usize, hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            create_progress_bar(total as u64, "Evaluating trajectories")
        };
        Self { bar }
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(format!("✓ {}", message));
    }

    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(format!("✗ {}", message));
    }
}

impl ProgressReporter for TrajectoryProgress {
    fn trajectory_finished(&self, trajectory_id: &str, completed: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(completed as u64);
        self.bar.set_message(format!("Evaluated {}", trajectory_id));
    }
}

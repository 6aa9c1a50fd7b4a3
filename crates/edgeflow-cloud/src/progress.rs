use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Upload progress shared by the coordinator
pub struct UploadProgress {
    progress_bar: ProgressBar,
    done: AtomicUsize,
}

impl UploadProgress {
    /// `silent` keeps counting but renders nothing
    pub fn new(total: usize, silent: bool) -> Self {
        let pb = if silent {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] {bar:30} {pos}/{len} {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message("Uploading static files...");

        Self {
            progress_bar: pb,
            done: AtomicUsize::new(0),
        }
    }

    /// Count one finished file, returning the new total
    pub fn inc(&self) -> usize {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        self.progress_bar.set_position(done as u64);
        done
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    pub fn finish_success(&self) {
        self.progress_bar.finish_with_message("Upload completed ✓");
    }

    pub fn finish_error(&self, error: &str) {
        self.progress_bar
            .abandon_with_message(format!("Upload failed: {}", error));
    }
}

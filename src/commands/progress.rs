//! Progress bars fed by the relay's progress notifications

use indicatif::{ProgressBar, ProgressStyle};
use scpflash_core::progress::{ProgressSink, ProgressState};

/// Shows one indicatif bar per transfer
///
/// The bar is created on the first notification, so one reporter can be
/// reused for consecutive operations (erase, write, verify).
pub struct BarProgress {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl BarProgress {
    pub fn new(quiet: bool) -> Self {
        Self { bar: None, quiet }
    }

    fn create_bar(total: u64, phase: &str) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                    phase
                ))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }
}

impl ProgressSink for BarProgress {
    fn report(&mut self, state: &ProgressState) {
        if self.quiet {
            return;
        }

        let bar = self.bar.get_or_insert_with(|| {
            Self::create_bar(state.total_size as u64, state.operation.verb())
        });
        bar.set_position(state.bytes_transferred as u64);

        if state.is_complete() {
            if let Some(bar) = self.bar.take() {
                bar.finish();
            }
        }
    }
}

impl Drop for BarProgress {
    fn drop(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
    }
}

//! Terminal progress indicator.
//!
//! A thin wrapper over `indicatif` so the rest of the crate never touches
//! styling. A hidden bar is used when progress is disabled, which makes every
//! call a no-op.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

/// A spinner with consistent styling.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Creates an animated spinner, or a hidden one when `enabled` is false.
    ///
    /// ```rust
    /// use depbump::utils::progress::ProgressBar;
    ///
    /// let spinner = ProgressBar::new_spinner(false);
    /// spinner.set_message("Resolving org_golang_x_tools");
    /// spinner.finish_and_clear();
    /// ```
    #[must_use]
    pub fn new_spinner(enabled: bool) -> Self {
        let bar = if enabled {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            IndicatifBar::hidden()
        };
        Self {
            inner: bar,
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Prints a line above the spinner without disturbing it.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.inner.is_hidden() {
            return;
        }
        self.inner.println(msg);
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

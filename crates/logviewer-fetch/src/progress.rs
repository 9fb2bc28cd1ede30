use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;

use crate::fetcher::{FetchPhase, Progress, ProgressCallback};

const PB_STYLE: &str = "{spinner:.blue} {prefix:>12.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

static PB_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| {
    ProgressStyle::with_template(PB_STYLE)
        .ok()
        .map(|style| style.tick_chars(TICK).progress_chars(PB_CHARS))
});

/// Terminal progress bar fed by [`Fetcher`](crate::Fetcher) progress events.
///
/// Draws to stderr and hides itself when stderr is not a terminal.
pub fn progress_bar(prefix: impl Into<String>) -> ProgressCallback {
    let pb = ProgressBar::new(0);
    if let Some(style) = PB_TEMPLATE.as_ref() {
        pb.set_style(style.clone());
    }
    pb.set_prefix(prefix.into());

    Arc::new(move |progress: &Progress| {
        if let Some(total) = progress.total_bytes {
            pb.set_length(total);
        }
        pb.set_position(progress.bytes_downloaded);
        if progress.phase == FetchPhase::Completed {
            pb.finish();
        }
    })
}

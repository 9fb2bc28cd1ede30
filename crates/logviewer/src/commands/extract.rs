use std::sync::Arc;

use anyhow::Result;
use logviewer_archive::{ExtractOptions, Progress, extract_file};
use tracing::debug;

use crate::cli::ExtractArgs;

pub fn run(args: ExtractArgs) -> Result<()> {
    let mut options = ExtractOptions::default().permission_strategy(args.permissions.into());
    if args.keep_macos_metadata {
        options = options.no_skip_prefixes();
    }
    options = options.on_progress(Arc::new(|progress: Progress| {
        debug!(
            entries = progress.entries_processed,
            bytes = progress.bytes_processed,
            current = %progress.current_file.display(),
            "extracting"
        );
    }));

    let report = extract_file(&args.archive, args.format, &args.destination, &options)?;
    println!(
        "Extracted {} entries ({} bytes) from {} archive into {}",
        report.entry_count,
        report.total_bytes,
        report.format,
        report.destination.display()
    );
    for skipped in &report.skipped {
        println!("  skipped {} ({:?})", skipped.path.display(), skipped.reason);
    }
    Ok(())
}

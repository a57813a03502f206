//! The `moderator check` command: moderate local files without the queue.

use std::path::{Path, PathBuf};

use clap::Args;
use moderator_core::{Config, Moderator, PhotoResult, PhotoStatus};

/// Arguments for the `check` command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Image files to moderate
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Pretty-print each result instead of one JSON object per line
    #[arg(long)]
    pub pretty: bool,
}

/// Execute the check command.
pub async fn execute(args: CheckArgs, config: Config) -> anyhow::Result<()> {
    let moderator = Moderator::new(config);

    let mut approved = 0;
    for path in &args.files {
        let result = check_file(&moderator, path).await;
        if result.status == PhotoStatus::Approved {
            approved += 1;
        }
        let line = if args.pretty {
            serde_json::to_string_pretty(&result)?
        } else {
            serde_json::to_string(&result)?
        };
        println!("{line}");
    }

    tracing::info!(total = args.files.len(), approved, "Check complete");
    Ok(())
}

/// Unreadable files become `failed` results, like a failed download.
async fn check_file(moderator: &Moderator, path: &Path) -> PhotoResult {
    match moderator.check_file(path).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read image");
            PhotoResult::failed(media_id(path), format!("{}: {e}", path.display()))
        }
    }
}

fn media_id(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

//! Run one edit or thumbnail operation with live progress.

use std::io::Write;

use splice_export::{Editor, OperationResult};
use splice_media_model::operation::Invocation;

pub async fn run(editor: &Editor, invocation: Invocation) -> anyhow::Result<()> {
    let handle = editor.submit(invocation)?;
    let id = handle.id();
    let kind = handle.kind();
    let mut progress = handle.progress();

    println!("Running {kind} ({id})");
    println!("  Output: {}", handle.output_path().display());

    let wait = handle.wait();
    tokio::pin!(wait);
    let mut progress_open = true;
    let mut interrupted = false;

    let result = loop {
        tokio::select! {
            result = &mut wait => break result,
            changed = progress.changed(), if progress_open => {
                if changed.is_err() {
                    progress_open = false;
                    continue;
                }
                let fraction = *progress.borrow_and_update();
                print!("\r  Progress: {:.1}%  ", fraction * 100.0);
                let _ = std::io::stdout().flush();
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                println!("\n  Cancelling...");
                editor.cancel(id);
            }
        }
    };
    println!();

    match result {
        OperationResult::Completed { path } => {
            println!("{kind} complete: {}", path.display());
            Ok(())
        }
        OperationResult::Failed { kind: error, message } => {
            Err(anyhow::anyhow!("{kind} failed ({error}): {message}"))
        }
        OperationResult::Cancelled => Err(anyhow::anyhow!("{kind} cancelled")),
    }
}

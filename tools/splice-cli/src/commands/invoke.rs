//! Run an invocation given as JSON.

use splice_export::Editor;
use splice_media_model::operation::Invocation;

pub async fn run(editor: &Editor, json: &str) -> anyhow::Result<()> {
    let invocation = Invocation::from_json(json)?;
    tracing::debug!(?invocation, "Parsed invocation");

    match invocation {
        Invocation::Metadata { path } => super::metadata::run(editor, path),
        other => super::edit::run(editor, other).await,
    }
}

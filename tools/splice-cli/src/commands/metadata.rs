//! Print video metadata.

use std::path::PathBuf;

use splice_export::Editor;

pub fn run(editor: &Editor, path: PathBuf) -> anyhow::Result<()> {
    let meta = editor
        .metadata(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}

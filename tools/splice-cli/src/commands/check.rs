//! Check that the export tools are usable.

use splice_export::{Editor, FfprobeProbe};

pub fn run(editor: &Editor) -> anyhow::Result<()> {
    let config = editor.config();
    println!("Splice environment check");
    println!("========================\n");

    let engine = editor.engine();
    let engine_ok = engine.is_available();
    print_status(
        &format!("{} ({})", engine.name(), config.export.ffmpeg_path.display()),
        engine_ok,
    );

    let probe_ok = FfprobeProbe::new(&config.export.ffprobe_path).is_available();
    print_status(
        &format!("ffprobe ({})", config.export.ffprobe_path.display()),
        probe_ok,
    );

    println!("\n  Scratch dir: {}", config.scratch_dir.display());

    if engine_ok && probe_ok {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Export tools missing; install ffmpeg or set the paths in the config file"
        ))
    }
}

fn print_status(label: &str, ok: bool) {
    let mark = if ok { "OK" } else { "MISSING" };
    println!("  [{mark:>7}] {label}");
}

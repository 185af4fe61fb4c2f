mod logging;
mod probe;
mod settings;

use probe::{Probe, ProbeError};
use settings::Settings;
use std::process::ExitCode;

fn main() -> ExitCode {
    logging::setup_logging();
    let settings = Settings::from_cli();

    match run(settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: Settings) -> Result<(), ProbeError> {
    if settings.locate {
        for (format, text) in probe::locate(&settings)? {
            println!("{format:?}: {text}");
        }
        return Ok(());
    }

    let mut probe = Probe::new(settings)?;
    let summary = probe.run()?;
    tracing::info!(
        frames = summary.frames,
        cells = summary.cells,
        zones = summary.zones,
        lines = summary.lines,
        finest = ?summary.finest_resolution,
        live_zones = summary.live_zones,
        live_cells = summary.live_cells,
        "Done"
    );
    for label in summary.labels.iter().take(10) {
        println!("{label}");
    }
    Ok(())
}

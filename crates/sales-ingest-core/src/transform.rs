use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tracing::info;

use crate::config::TransformSettings;
use crate::error::{IngestError, Result};

/// Runs the downstream SQL-transformation tool as a child process and waits for it.
///
/// Output is inherited so the tool's own logs land next to ours. The child is killed if
/// the future is dropped, which is how a run timeout reaches it.
pub async fn run_transform(settings: &TransformSettings) -> Result<()> {
    let mut command = Command::new(&settings.program);
    command
        .args(&settings.args)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if let Some(dir) = &settings.working_dir {
        command.current_dir(dir);
    }

    info!(
        program = %settings.program,
        args = ?settings.args,
        working_dir = ?settings.working_dir,
        "Starting transformation"
    );
    let started = Instant::now();

    let status = command
        .status()
        .await
        .map_err(|source| IngestError::TransformSpawn {
            program: settings.program.clone(),
            source,
        })?;

    if !status.success() {
        return Err(IngestError::TransformFailed(format!(
            "{} exited with {}",
            settings.program, status
        )));
    }

    info!(
        program = %settings.program,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Transformation finished"
    );
    Ok(())
}

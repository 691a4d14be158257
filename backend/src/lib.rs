/*
    Developer blog:
    - The dispatcher started as a thin wrapper around `blender -b file -o out -f 1` and grew a validation step once
        uploaded files and user supplied names started flowing into the command line. Every job now gets its own
        output folder and its own control script, so two users asking for "out.png" at the same time no longer
        overwrite each other.
    - Kept the command line surface small on purpose. An http layer can sit on top of `Orchestrator` and map
        `RenderError::status_code()` straight into a response.
*/

use crate::cli::{Cli, Commands};
use crate::models::{error::RenderError, render_result::RenderResult, server_setting::ServerSetting};
use crate::services::orchestrator::Orchestrator;
use blender::blender::Blender;
use clap::Parser;
use dotenv::dotenv;
use std::{future::Future, process::ExitCode};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub mod cli;
pub mod domains;
pub mod models;
pub mod services;

pub async fn run() -> anyhow::Result<ExitCode> {
    dotenv().ok();
    // stdout is reserved for the json result
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => ServerSetting::load_from(path)?,
        None => ServerSetting::load()?,
    };
    cli.apply(&mut settings);

    match cli.command {
        Commands::Config { save } => {
            if save {
                let path = match &cli.config {
                    Some(path) => {
                        settings.save_to(path)?;
                        path.clone()
                    }
                    None => settings.save()?,
                };
                info!(path = %path.display(), "Saved settings");
            }
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Probe => {
            let blender = Blender::from_executable(&settings.blender).await?;
            let report = serde_json::json!({
                "executable": blender.get_executable(),
                "version": blender.get_version(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Image {
            scene,
            frame,
            output,
        } => {
            let orchestrator = Orchestrator::from_settings(&settings)?;
            let source = scene.into_source().await?;
            dispatch(orchestrator.render_image(source, Some(frame), &output)).await
        }
        Commands::Animation {
            scene,
            start,
            end,
            output,
        } => {
            let orchestrator = Orchestrator::from_settings(&settings)?;
            let source = scene.into_source().await?;
            dispatch(orchestrator.render_animation(source, Some(start), end, &output)).await
        }
    }
}

/// Wait for a render, or for ctrl-c. Dropping the render future kills blender.
async fn dispatch(
    job: impl Future<Output = Result<RenderResult, RenderError>>,
) -> anyhow::Result<ExitCode> {
    let result = tokio::select! {
        result = job => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, render cancelled");
            return Ok(ExitCode::from(130));
        }
    };

    match result {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(reason = e.reason(), status = e.status_code(), "{e}");
            println!("{}", serde_json::to_string_pretty(&e)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

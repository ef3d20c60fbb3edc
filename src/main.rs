mod cli;
mod config;
mod core;
mod error;

use crate::cli::{Cli, Commands};
use crate::config::Settings;
use crate::core::{
    AutoApprove, Gate, Pipeline, PipelineOptions, PlaylistClient, PromptGate, RecordStore,
    TranscriptService, TranscriptSource, Video, VideoOutcome, build_generator, build_prompt,
    extract_video_id,
};
use crate::error::{Error, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match Settings::load(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings from {}: {e}", cli.config);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Run { yes, export }) => run_playlist(settings, yes, export).await,
        None => run_playlist(settings, false, None).await,
        Some(Commands::Analyze {
            video_id,
            title,
            yes,
        }) => run_analyze(settings, video_id, title, yes).await,
        Some(Commands::Prompt { video_id, title }) => run_prompt(settings, video_id, title).await,
        Some(Commands::List) => run_list(settings),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn require(settings: &Settings, needs_listing: bool) {
    if let Err(e) = settings.validate(needs_listing) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn gate_for(yes: bool) -> Box<dyn Gate> {
    if yes {
        Box::new(AutoApprove)
    } else {
        Box::new(PromptGate::stdin())
    }
}

async fn run_playlist(settings: Settings, yes: bool, export: Option<PathBuf>) -> Result<()> {
    require(&settings, true);

    let store = RecordStore::open(&settings.storage.database)?;
    let lister = PlaylistClient::new(
        settings.youtube.api_key.as_str(),
        settings.youtube.base_url.as_str(),
        settings.youtube.page_size,
    );
    let transcripts = TranscriptService::new(settings.youtube.languages.clone())?;
    let generator = build_generator(&settings.model);
    let mut gate = gate_for(yes);

    let options = PipelineOptions::new(
        &settings.pipeline,
        export.unwrap_or_else(|| settings.storage.export_path.clone()),
        settings.storage.export_layout,
    );

    let summary = Pipeline::new(
        &transcripts,
        generator.as_ref(),
        &store,
        gate.as_mut(),
        options,
    )
    .run(&lister, &settings.youtube.playlist_id)
    .await?;

    println!("\nAll analyses are complete.");
    println!(
        "{} analyzed, {} saved to database, {} skipped, {} failed",
        summary.records.len(),
        summary.persisted,
        summary.skipped,
        summary.failed
    );

    store.close()
}

async fn run_analyze(
    settings: Settings,
    video_input: String,
    title: Option<String>,
    yes: bool,
) -> Result<()> {
    require(&settings, false);

    let video_id = extract_video_id(&video_input)
        .ok_or_else(|| Error::custom("Invalid video URL or ID"))?;

    let store = RecordStore::open(&settings.storage.database)?;
    if let Some(existing) = store.get(&video_id)? {
        println!(
            "Existing analysis from {} will be replaced if this one is saved.",
            existing.created_at
        );
    }

    let transcripts = TranscriptService::new(settings.youtube.languages.clone())?;
    let generator = build_generator(&settings.model);
    let mut gate = gate_for(yes);

    let options = PipelineOptions::new(
        &settings.pipeline,
        settings.storage.export_path.clone(),
        settings.storage.export_layout,
    );

    let video = Video {
        title: title.unwrap_or_else(|| video_id.clone()),
        id: video_id,
    };

    let outcome = Pipeline::new(
        &transcripts,
        generator.as_ref(),
        &store,
        gate.as_mut(),
        options,
    )
    .analyze_one(&video)
    .await?;

    match outcome {
        VideoOutcome::Recorded { persisted: true, .. } => {}
        VideoOutcome::Recorded { persisted: false, .. } => {
            println!("Analysis was not saved to the database.")
        }
        VideoOutcome::Skipped(reason) => println!("Skipped: {reason:?}"),
    }

    store.close()
}

async fn run_prompt(settings: Settings, video_input: String, title: Option<String>) -> Result<()> {
    let video_id = extract_video_id(&video_input)
        .ok_or_else(|| Error::custom("Invalid video URL or ID"))?;

    let transcripts = TranscriptService::new(settings.youtube.languages)?;
    let Some(transcript) = transcripts.transcript(&video_id).await? else {
        return Err(Error::custom(format!(
            "No transcript available for {video_id}"
        )));
    };

    println!("{}", build_prompt(&transcript, title.as_deref()));
    Ok(())
}

fn run_list(settings: Settings) -> Result<()> {
    let store = RecordStore::open(&settings.storage.database)?;
    let rows = store.all()?;

    if rows.is_empty() {
        println!("No analyses found.");
        return store.close();
    }

    println!("Found {} analyses:", store.count()?);
    println!();

    for row in rows {
        let event = row.record.event_name.as_deref().unwrap_or("-");
        println!(
            "{:<20} {:<14} {:<40} {}",
            row.created_at.format("%Y-%m-%d %H:%M:%S"),
            row.record.video_id,
            event,
            row.record.joined_fighters()
        );
    }

    store.close()
}

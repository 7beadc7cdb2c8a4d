//! Entry point for an EmoLogger session: live in the terminal, replayed
//! from a script, or just listing the stimuli.

use clap::Parser;
use emologger::{
    args::{CommandTask, LoggerArgs},
    config::LoggerConfig,
    export::{ExportEngine, ExportTarget},
    gui::{logging_screen, stimulus_selector},
    replay::ScriptRunner,
    session_controller::SessionController,
    stimulus::{presentation_order, StimulusError, StimulusList, StimulusSource},
};

use log::{error, info};
use std::{error::Error, path::PathBuf, process::ExitCode};

// Example:
// cargo run -- --config study.ron
//              --stimuli songs/
//              --participant p01
//              replay session.txt

fn main() -> ExitCode {
    env_logger::init();
    let args = LoggerArgs::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("emologger: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: LoggerArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => LoggerConfig::from_path(path)?,
        None => LoggerConfig::default(),
    };
    args.overrides.apply(&mut config);

    let source = match &args.overrides.stimuli_dir {
        Some(dir) => StimulusList::from_dir(dir)?,
        None => StimulusList::new(config.stimuli.clone())?,
    };
    if source.is_empty() {
        let origin = args.config.clone().unwrap_or_else(|| PathBuf::from("config"));
        return Err(StimulusError::Empty(origin).into());
    }
    info!("{} stimuli available", source.len());

    if let CommandTask::List = args.command {
        for (n, index) in presentation_order(&source, config.draw_order)
            .into_iter()
            .enumerate()
        {
            let stimulus = &source.stimuli()[index];
            println!("{:>3}. {}\t{}", n + 1, stimulus.id, stimulus.location);
        }
        return Ok(());
    }

    let engine = ExportEngine::from_path(&config.grid_image, config.marker_style())?;
    let target = ExportTarget {
        dir: config.export_dir.clone(),
        participant: config.participant_id.clone(),
    };
    let mut controller = SessionController::new(source, config.controller_options());

    match args.command {
        CommandTask::Run => {
            let Some(index) = stimulus_selector(controller.source().stimuli())? else {
                info!("No stimulus selected, exiting");
                return Ok(());
            };
            controller.select_stimulus(index);
            let controller = logging_screen(controller, &engine, &target)?;
            info!(
                "Session ended {}, {} stimuli completed",
                controller.state(),
                controller.session().completed_stimuli().len()
            );
        }
        CommandTask::Replay(replay) => {
            let summary =
                ScriptRunner::new(&mut controller, &engine, &target).run_file(&replay.script)?;
            info!(
                "{} commands, {} ignored, {} rejected clicks",
                summary.commands, summary.ignored, summary.rejected
            );
            for paths in &summary.exports {
                println!("{}\n{}", paths.table.display(), paths.image.display());
            }
        }
        CommandTask::List => {}
    }

    Ok(())
}

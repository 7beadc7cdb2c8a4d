// Commandline argument parser using clap for EmoLogger

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{config::LoggerConfig, stimulus::DrawOrder};

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct LoggerArgs {
    #[command(subcommand, long_about)]
    /// Which task to perform: a live session, a scripted replay, or a listing
    pub command: CommandTask,

    /// RON config file; every setting has a default when omitted
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,
}

/// Flags that take precedence over the config file.
#[derive(Debug, Args, Clone, Default)]
pub struct Overrides {
    /// Arousal-valence grid image clicks are made on
    #[arg(short = 'g', long = "grid")]
    pub grid_image: Option<PathBuf>,

    /// Folder of audio files to present, instead of the config's stimuli
    #[arg(short = 's', long = "stimuli")]
    pub stimuli_dir: Option<PathBuf>,

    /// Directory the exported tables and images are written to
    #[arg(short = 'o', long = "out")]
    pub export_dir: Option<PathBuf>,

    /// Participant identifier, used as the prefix of exported files
    #[arg(short = 'p', long = "participant")]
    pub participant_id: Option<String>,

    /// Present the stimuli in random order
    #[arg(long)]
    pub random: bool,

    /// Seed for the random order, implies --random
    #[arg(long)]
    pub seed: Option<u64>,

    /// Drop a click that repeats the previous point
    #[arg(long)]
    pub dedup: bool,
}

impl Overrides {
    /// Writes every flag that was given into `config`.
    pub fn apply(&self, config: &mut LoggerConfig) {
        if let Some(grid) = &self.grid_image {
            config.grid_image = grid.clone();
        }
        if let Some(dir) = &self.export_dir {
            config.export_dir = dir.clone();
        }
        if let Some(id) = &self.participant_id {
            config.participant_id = id.clone();
        }
        if self.random || self.seed.is_some() {
            config.draw_order = DrawOrder::Random { seed: self.seed };
        }
        if self.dedup {
            config.dedup_consecutive = true;
        }
    }
}

#[derive(Debug, Subcommand, Clone)]
pub enum CommandTask {
    /// Log emotions interactively in the terminal
    #[command(about)]
    Run,

    /// Run a command script against a virtual clock and export the results
    #[command(about)]
    Replay(ReplayCommand),

    /// Print the stimuli in the order they would be presented
    #[command(about)]
    List,
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct ReplayCommand {
    /// Script with one command per line
    pub script: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_replay_with_overrides() {
        let args = LoggerArgs::try_parse_from([
            "emologger",
            "--config",
            "study.ron",
            "--participant",
            "p03",
            "--seed",
            "9",
            "replay",
            "session.txt",
        ])
        .unwrap();

        assert_eq!(args.config, Some(PathBuf::from("study.ron")));
        assert_eq!(args.overrides.participant_id.as_deref(), Some("p03"));
        assert_eq!(args.overrides.seed, Some(9));
        assert!(!args.overrides.random);
        let CommandTask::Replay(replay) = args.command else {
            panic!("expected replay");
        };
        assert_eq!(replay.script, PathBuf::from("session.txt"));
    }

    #[test]
    fn requires_a_command() {
        assert!(LoggerArgs::try_parse_from(["emologger", "--dedup"]).is_err());
        let args = LoggerArgs::try_parse_from(["emologger", "--dedup", "list"]).unwrap();
        assert!(args.overrides.dedup);
        assert!(matches!(args.command, CommandTask::List));
    }

    #[test]
    fn flags_override_config() {
        let mut config = LoggerConfig::default();
        let overrides = Overrides {
            export_dir: Some(PathBuf::from("results")),
            participant_id: Some("p04".to_owned()),
            seed: Some(1),
            dedup: true,
            ..Overrides::default()
        };
        overrides.apply(&mut config);

        assert_eq!(config.export_dir, PathBuf::from("results"));
        assert_eq!(config.participant_id, "p04");
        assert_eq!(config.draw_order, DrawOrder::Random { seed: Some(1) });
        assert!(config.dedup_consecutive);
        assert_eq!(config.grid_image, PathBuf::from("photo.png"));
    }

    #[test]
    fn no_flags_change_nothing() {
        let mut config = LoggerConfig::default();
        Overrides::default().apply(&mut config);
        assert_eq!(config, LoggerConfig::default());
    }
}

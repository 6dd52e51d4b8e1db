use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use hebgb_study::app::{self, LearnOptions};
use hebgb_study::cli::{Cli, Commands};
use hebgb_study::config::{Overrides, StudyConfig};
use hebgb_study::error::StudyError;
use hebgb_study::ui;
use hebgb_study::util::setup_tracing;

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code),
        Err(err) => match err.downcast_ref::<StudyError>() {
            Some(study) => {
                ui::error(&format!(
                    "hebgb-study error [{}/{}]: {study}",
                    study.category(),
                    study.exit_code()
                ));
                ExitCode::from(study.exit_code())
            }
            None => {
                ui::error(&format!("hebgb-study error: {err:#}"));
                ExitCode::from(1)
            }
        },
    }
}

fn run() -> Result<u8> {
    setup_tracing();
    let cli = Cli::parse();
    let overrides = Overrides {
        credentials_path: cli.credentials,
    };
    let config = StudyConfig::load_or_init()?.with_overrides(&overrides);

    match cli.command {
        Some(Commands::Status) => {
            app::print_status(&config)?;
            Ok(0)
        }
        Some(Commands::Doctor) => app::doctor(&config),
        Some(Commands::Courses) => {
            app::list_courses(&config)?;
            Ok(0)
        }
        None => {
            let options = LearnOptions {
                select: cli.select,
                seed: cli.seed,
            };
            app::learn(&config, options)?;
            Ok(0)
        }
    }
}

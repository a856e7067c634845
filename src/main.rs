use std::process;

use clap::Parser;
use datasets::{DatasetKind, Jhmdb, Shrec, ShrecLabel};
use log::info;

use pose_orchestra::{
    artifacts::{RunDir, logger},
    config::Args,
    session::Session,
};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let Ok(kind) = DatasetKind::try_from(args.dataset) else {
        eprintln!("Unsupported dataset!");
        process::exit(1);
    };

    let config = args.into_config(kind)?;
    let run_dir = RunDir::create(&config.experiments_dir)?;
    logger::init(&run_dir.log_path())?;
    info!("{config:?}");

    let data_dir = &config.data_dir;
    let report = match kind {
        DatasetKind::Jhmdb => Session::new(Jhmdb::new(data_dir), &config, &run_dir).run(),
        DatasetKind::ShrecCoarse => {
            Session::new(Shrec::new(data_dir, ShrecLabel::Coarse), &config, &run_dir).run()
        }
        DatasetKind::ShrecFine => {
            Session::new(Shrec::new(data_dir, ShrecLabel::Fine), &config, &run_dir).run()
        }
    }?;

    if let Some((epoch, acc)) = report.history.best_accuracy() {
        info!("best accuracy {acc:.3} at epoch {}", epoch + 1);
    }
    info!("artifacts written to {}", run_dir.root().display());
    Ok(())
}

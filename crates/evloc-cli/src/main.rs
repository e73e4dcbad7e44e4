use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Arg, Command, ValueHint};
use log::LevelFilter;

use evloc_cli::driver::{self, DriverConfig};

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("EVLOC_LOG", "error,evloc=info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let matches = Command::new("evloc")
        .version(clap::crate_version!())
        .about("Train a k-fold boosted-tree ensemble for one event class")
        .arg_required_else_help(true)
        .arg(
            Arg::new("class")
                .help("Class id; training data is read from <data_dir>/cls_<class>.csv")
                .required(true)
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("config")
                .help("Path to a JSON driver configuration. Defaults are used when omitted.")
                .required(false)
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .get_matches();

    let class_id = *matches
        .get_one::<u32>("class")
        .ok_or_else(|| anyhow::anyhow!("class id is required"))?;

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            log::info!("[evloc] Using config: {:?}", path);
            driver::load_config(path)?
        }
        None => DriverConfig::default(),
    };

    match driver::run(class_id, &config) {
        Ok(summary) => {
            println!("SCORES: {:?} MEAN: {}", summary.scores, summary.mean_score);
            log::info!("[evloc] Models written to {}", summary.model_path.display());
            Ok(())
        }
        Err(e) => {
            log::error!("Training failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

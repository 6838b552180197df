mod data;
mod errors;
mod etl;
mod normalize;

use std::collections::BTreeMap;
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use log::info;
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::errors::{Error, ErrorKind, Result};
use crate::etl::wrangle::WrangleEtl;
use crate::etl::Etl;
use crate::normalize::Compatibility;

const DEFAULT_CONFIG_PATH: &str = "config/wrangle.json";

#[derive(Deserialize, Debug, Clone)]
pub struct UserConfig {
    /// OSM XML input, optionally `.xz` compressed.
    pub data_path: String,
    /// Directory receiving the CSV tables.
    #[serde(default = "default_dest_path")]
    pub dest_path: String,
    #[serde(default = "default_validate")]
    pub validate: bool,
    /// Schema file; the built-in schema is used when absent.
    #[serde(default)]
    pub schema_path: Option<String>,
    #[serde(default)]
    pub compat: Compatibility,
    /// Replaces the default street-type abbreviation table.
    #[serde(default)]
    pub street_abbreviations: Option<BTreeMap<String, String>>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub progress: bool,
}

fn default_dest_path() -> String {
    "data/csv".to_string()
}

fn default_validate() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn load_user_config(path: &str) -> Result<UserConfig> {
    let file = File::open(path).map_err(|err| {
        Error::new(ErrorKind::Config, format!("could not open config file {}: {}", path, err))
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn run() -> Result<()> {
    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let user_config = load_user_config(&config_path)?;
    setup_logging(&user_config.log_level);

    info!(
        data_path = user_config.data_path.as_str(),
        dest_path = user_config.dest_path.as_str(),
        validate = user_config.validate;
        "Starting wrangling"
    );
    let mut etl = WrangleEtl::new(&user_config);
    etl.process(Path::new(&user_config.dest_path))?;
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

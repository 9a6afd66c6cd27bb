#![allow(clippy::type_complexity)]

use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

pub mod core;
pub mod error;
pub mod pipeline;
mod worker;

use clap::Parser;

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "bigrams.toml";

/// User can parse this directly from cli args or construct it themselves.
#[derive(Parser, Debug, Clone, Default)]
#[clap(about = "Histogram of how many word bigrams share each occurrence count")]
pub struct Args {
    /// toml config file, `bigrams.toml` is read when present
    #[clap(long, value_parser, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// text file with one line per record, defaults to a built-in toy corpus
    #[clap(long, value_parser, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// number of tasks running at the same time
    #[clap(long, value_parser)]
    pub workers: Option<usize>,

    /// number of input and shuffle partitions
    #[clap(long, value_parser)]
    pub partitions: Option<usize>,

    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub workers: usize,
    pub partitions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workers: num_cpus::get(),
            partitions: 4,
        }
    }
}

impl Config {
    /// Reads the config file named by `args` (or the default one, if it exists) and applies
    /// cli overrides on top.
    pub fn load(args: &Args) -> Result<Config> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Config::default(),
        };
        if let Some(workers) = args.workers {
            config.workers = workers;
        }
        if let Some(partitions) = args.partitions {
            config.partitions = partitions;
        }
        config.validate()?;
        debug!("using {config:?}");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let config: Config = toml::from_str(&std::fs::read_to_string(path)?)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1".into()));
        }
        if self.partitions == 0 {
            return Err(Error::InvalidConfig("partitions must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_config_file_with_cli_override() {
        let file = config_file("workers = 3\npartitions = 7\n");
        let args = Args {
            config: Some(file.path().to_path_buf()),
            partitions: Some(2),
            ..Args::default()
        };
        assert_eq!(
            Config::load(&args).unwrap(),
            Config {
                workers: 3,
                partitions: 2
            }
        );
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let file = config_file("partitions = 5\n");
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.partitions, 5);
        assert_eq!(config.workers, num_cpus::get());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let args = Args {
            config: Some(PathBuf::from("/definitely/not/here/bigrams.toml")),
            ..Args::default()
        };
        assert!(matches!(Config::load(&args), Err(Error::Io(_))));
    }

    #[test]
    fn test_bad_config() {
        let file = config_file("workers = \"many\"\n");
        assert!(matches!(Config::from_file(file.path()), Err(Error::Config(_))));

        let empty = config_file("");
        let args = Args {
            workers: Some(0),
            config: Some(empty.path().to_path_buf()),
            ..Args::default()
        };
        assert!(matches!(Config::load(&args), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["bigrams", "--workers", "2", "--input", "in.txt", "-v"]);
        assert_eq!(args.workers, Some(2));
        assert_eq!(args.input, Some(PathBuf::from("in.txt")));
        assert!(args.verbose);
        assert!(args.partitions.is_none());
    }
}

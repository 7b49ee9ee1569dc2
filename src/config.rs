use serde::Deserialize;

use crate::disk::DiskType;
use crate::error::Result;

#[derive(Debug, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    pub disk_type: DiskType,
    pub pool_size: usize,
    pub replacer_k: usize,
    pub bucket_capacity: usize,
}

impl Config {
    pub fn new(file: &str) -> Result<Config> {
        let mut cfg = config::Config::builder()
            .set_default("log_level", "debug")?
            .set_default("disk_type", "memory")?
            .set_default("pool_size", 64_i64)?
            .set_default("replacer_k", 2_i64)?
            .set_default("bucket_capacity", 8_i64)?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file))
        }
        cfg = cfg.add_source(config::Environment::with_prefix("PAGEPOOL"));
        Ok(cfg.build()?.try_deserialize()?)
    }
}

use std::{error::Error, path::Path, time::Duration};

pub const CONFIG_FILE_NAME: &str = "voltlog.toml";

/// Where the host reads frames from.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Serial {
        path: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
    /// `host:port` of a simulator
    Tcp(String),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub source: Source,
    /// Give up when the link stays silent this long
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_minutes_per_super_tick")]
    pub minutes_per_super_tick: f32,
    /// Voltage of a full scale conversion
    #[serde(default = "default_volt_max")]
    pub volt_max: f32,
    /// Stop after printing the first frame
    #[serde(default)]
    pub once: bool,
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_timeout_secs() -> u64 {
    45
}

fn default_minutes_per_super_tick() -> f32 {
    (crate::TICK_PERIOD_SECS * u32::from(crate::TICK_MULTIPLIER)) as f32 / 60.0
}

fn default_volt_max() -> f32 {
    2.5
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let paths = match path {
            Some(p) => vec![p.into()],
            None => std::env::current_dir()?
                .ancestors()
                .map(|path| path.join(CONFIG_FILE_NAME))
                .collect(),
        };

        let mut last_error = None;

        for path in paths {
            match std::fs::read_to_string(path) {
                Ok(config_string) => return Ok(toml::from_str(&config_string)?),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.map_or_else(|| format!("no {CONFIG_FILE_NAME} found").into(), Into::into))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

//! Persistent view settings of the log console.
//!
//! Every setter writes the complete settings to `logconf.properties` before
//! returning. A failed write is reported but the new value still applies.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::log_error;
use crate::protocol::Level;

pub mod properties;

pub const PROPERTIES_FILE_NAME: &str = "logconf.properties";

const SHOW_TIME: &str = "showTime";
const SHOW_LOGGER_NAME: &str = "showLoggerName";
const FILTER_LEVEL: &str = "filterLevel";
const FILTER_BY: &str = "filterBy";
const FILTER_STRING: &str = "filterString";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Which field the substring filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterBy {
    #[default]
    None,
    ByLoggerName,
    ByText,
}

impl FilterBy {
    pub fn name(self) -> &'static str {
        match self {
            FilterBy::None => "NONE",
            FilterBy::ByLoggerName => "BY_LOGGER_NAME",
            FilterBy::ByText => "BY_TEXT",
        }
    }

    pub fn from_name(name: &str) -> Option<FilterBy> {
        match name.trim() {
            "NONE" => Some(FilterBy::None),
            "BY_LOGGER_NAME" => Some(FilterBy::ByLoggerName),
            "BY_TEXT" => Some(FilterBy::ByText),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSettings {
    pub show_time: bool,
    pub show_logger_name: bool,
    pub filter_level: Level,
    pub filter_by: FilterBy,
    /// Case-sensitive substring matched against the field chosen by `filter_by`.
    pub filter_string: String,
}

impl Default for ViewSettings {
    fn default() -> Self {
        ViewSettings {
            show_time: true,
            show_logger_name: true,
            filter_level: Level::Trace,
            filter_by: FilterBy::None,
            filter_string: String::new(),
        }
    }
}

impl ViewSettings {
    /// Builds settings from parsed properties; missing or unparseable keys
    /// keep their defaults and unknown keys are ignored.
    pub fn from_entries(entries: Vec<(String, String)>) -> Self {
        let map: HashMap<String, String> = entries.into_iter().collect();
        let defaults = ViewSettings::default();
        let flag = |key: &str, default: bool| {
            map.get(key)
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        };
        ViewSettings {
            show_time: flag(SHOW_TIME, defaults.show_time),
            show_logger_name: flag(SHOW_LOGGER_NAME, defaults.show_logger_name),
            filter_level: map
                .get(FILTER_LEVEL)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.filter_level),
            filter_by: map
                .get(FILTER_BY)
                .and_then(|v| FilterBy::from_name(v))
                .unwrap_or(defaults.filter_by),
            filter_string: map
                .get(FILTER_STRING)
                .cloned()
                .unwrap_or(defaults.filter_string),
        }
    }

    fn entries(&self) -> [(&'static str, String); 5] {
        [
            (SHOW_TIME, self.show_time.to_string()),
            (SHOW_LOGGER_NAME, self.show_logger_name.to_string()),
            (FILTER_LEVEL, self.filter_level.name().to_string()),
            (FILTER_BY, self.filter_by.name().to_string()),
            (FILTER_STRING, self.filter_string.clone()),
        ]
    }
}

/// View settings bound to their properties file.
#[derive(Debug)]
pub struct ViewConfig {
    path: PathBuf,
    settings: RwLock<ViewSettings>,
}

impl ViewConfig {
    /// Loads `logconf.properties` from `state_dir`, or writes the defaults
    /// there when it does not exist yet.
    pub fn load_or_default(state_dir: &Path) -> Self {
        let path = state_dir.join(PROPERTIES_FILE_NAME);
        let loaded = if path.exists() {
            match std::fs::read(&path) {
                // Properties files are Latin-1; escapes cover everything else.
                Ok(bytes) => Some(bytes.iter().map(|b| *b as char).collect::<String>()),
                Err(source) => {
                    log_error!("{}", ConfigError::Read { path: path.clone(), source });
                    None
                }
            }
        } else {
            None
        };

        match loaded {
            Some(text) => ViewConfig {
                settings: RwLock::new(ViewSettings::from_entries(properties::parse(&text))),
                path,
            },
            None => {
                let config = ViewConfig {
                    path,
                    settings: RwLock::new(ViewSettings::default()),
                };
                if let Err(e) = config.persist() {
                    log_error!("{}", e);
                }
                config
            }
        }
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> ViewSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn show_time(&self) -> bool {
        self.snapshot().show_time
    }

    pub fn show_logger_name(&self) -> bool {
        self.snapshot().show_logger_name
    }

    pub fn filter_level(&self) -> Level {
        self.snapshot().filter_level
    }

    pub fn filter_by(&self) -> FilterBy {
        self.snapshot().filter_by
    }

    pub fn filter_string(&self) -> String {
        self.snapshot().filter_string
    }

    pub fn set_show_time(&self, show_time: bool) -> Result<(), ConfigError> {
        self.update(|s| s.show_time = show_time)
    }

    pub fn set_show_logger_name(&self, show_logger_name: bool) -> Result<(), ConfigError> {
        self.update(|s| s.show_logger_name = show_logger_name)
    }

    pub fn set_filter_level(&self, level: Level) -> Result<(), ConfigError> {
        self.update(|s| s.filter_level = level)
    }

    pub fn set_filter_by(&self, filter_by: FilterBy) -> Result<(), ConfigError> {
        self.update(|s| s.filter_by = filter_by)
    }

    /// Sets the filter mode and string together, persisting once.
    pub fn set_filter(
        &self,
        filter_by: FilterBy,
        filter_string: impl Into<String>,
    ) -> Result<(), ConfigError> {
        let filter_string = filter_string.into();
        self.update(|s| {
            s.filter_by = filter_by;
            s.filter_string = filter_string;
        })
    }

    /// Applies `change` in memory, then writes the file. The new value stays
    /// in effect when the write fails.
    fn update(&self, change: impl FnOnce(&mut ViewSettings)) -> Result<(), ConfigError> {
        {
            let mut settings = self
                .settings
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            change(&mut settings);
        }
        self.persist()
    }

    /// Writes the full settings to the properties file.
    pub fn persist(&self) -> Result<(), ConfigError> {
        let settings = self.snapshot();
        let timestamp = chrono::Local::now()
            .format("%a %b %d %H:%M:%S %Z %Y")
            .to_string();
        let text = properties::render(settings.entries(), &timestamp);
        std::fs::write(&self.path, text).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

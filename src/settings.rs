use std::path::{Path, PathBuf};
use std::{fs, str::FromStr};

use getset::Getters;
use serde::Deserialize;
use tracing::debug;

use crate::dictionary_errors::*;
use crate::generator::{GenerateOptions, GenerateOptionsBuilder};

pub const CONFIG_TOML_PATH: &str = "fixdict.toml";

// default file locations
pub const CUSTOM_CSV_PATH: &str = "data/custom.csv";
pub const CUSTOM_XML_PATH: &str = "data/FIX-CUSTOM.xml";
pub const OFFICIAL_XML_PATH: &str = "data/FIX44.xml";
pub const MERGED_XML_PATH: &str = "data/FIX-MERGED.xml";
pub const KEEP_LIST_PATH: &str = "data/filter_config.json";
pub const STRIPPED_XML_PATH: &str = "data/FIX-STRIPPED.xml";

#[derive(Debug, Clone, Default, Deserialize, Getters)]
#[serde(default, deny_unknown_fields)]
#[getset(get = "pub")]
pub struct Settings {
    generate: GenerateSettings,
    merge: MergeSettings,
    prune: PruneSettings,
}

#[derive(Debug, Clone, Deserialize, Getters)]
#[serde(default, deny_unknown_fields)]
#[getset(get = "pub")]
pub struct GenerateSettings {
    csv: PathBuf,
    output: PathBuf,
    fix_type: Option<String>,
    major: Option<String>,
    minor: Option<String>,
    servicepack: Option<String>,
    msgcat: Option<String>,
}

impl Default for GenerateSettings {
    fn default() -> Self {
        Self {
            csv: PathBuf::from(CUSTOM_CSV_PATH),
            output: PathBuf::from(CUSTOM_XML_PATH),
            fix_type: None,
            major: None,
            minor: None,
            servicepack: None,
            msgcat: None,
        }
    }
}

impl GenerateSettings {
    pub fn options(&self) -> GenerateOptions {
        let mut builder = GenerateOptionsBuilder::default();
        if let Some(fix_type) = &self.fix_type {
            builder.fix_type(fix_type);
        }
        if let Some(major) = &self.major {
            builder.major(major);
        }
        if let Some(minor) = &self.minor {
            builder.minor(minor);
        }
        if let Some(servicepack) = &self.servicepack {
            builder.servicepack(servicepack);
        }
        if let Some(msgcat) = &self.msgcat {
            builder.msgcat(msgcat);
        }
        builder.build()
    }
}

#[derive(Debug, Clone, Deserialize, Getters)]
#[serde(default, deny_unknown_fields)]
#[getset(get = "pub")]
pub struct MergeSettings {
    official: PathBuf,
    custom: PathBuf,
    output: PathBuf,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            official: PathBuf::from(OFFICIAL_XML_PATH),
            custom: PathBuf::from(CUSTOM_XML_PATH),
            output: PathBuf::from(MERGED_XML_PATH),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Getters)]
#[serde(default, deny_unknown_fields)]
#[getset(get = "pub")]
pub struct PruneSettings {
    input: PathBuf,
    keep_list: PathBuf,
    output: PathBuf,
}

impl Default for PruneSettings {
    fn default() -> Self {
        Self {
            input: PathBuf::from(MERGED_XML_PATH),
            keep_list: PathBuf::from(KEEP_LIST_PATH),
            output: PathBuf::from(STRIPPED_XML_PATH),
        }
    }
}

impl Settings {
    /// Reads `path` when given. Without a path, `fixdict.toml` in the working
    /// directory is used if present, otherwise every setting is a default.
    pub fn load(path: Option<&Path>) -> DResult<Self> {
        let path = match path {
            Some(p) => p,
            None if Path::new(CONFIG_TOML_PATH).exists() => Path::new(CONFIG_TOML_PATH),
            None => {
                debug!("no config file, using defaults");
                return Ok(Settings::default());
            }
        };
        let toml_str =
            fs::read_to_string(path).map_err(|e| DictError::from_io(path.to_path_buf(), e))?;
        debug!(path = %path.display(), "config loaded");
        Settings::from_str(&toml_str)
    }

    pub fn override_generate(&mut self, csv: Option<PathBuf>, output: Option<PathBuf>) {
        replace_if_some(&mut self.generate.csv, csv);
        replace_if_some(&mut self.generate.output, output);
    }

    pub fn override_merge(
        &mut self, official: Option<PathBuf>, custom: Option<PathBuf>, output: Option<PathBuf>,
    ) {
        replace_if_some(&mut self.merge.official, official);
        replace_if_some(&mut self.merge.custom, custom);
        replace_if_some(&mut self.merge.output, output);
    }

    pub fn override_prune(
        &mut self, input: Option<PathBuf>, keep_list: Option<PathBuf>, output: Option<PathBuf>,
    ) {
        replace_if_some(&mut self.prune.input, input);
        replace_if_some(&mut self.prune.keep_list, keep_list);
        replace_if_some(&mut self.prune.output, output);
    }
}

impl FromStr for Settings {
    type Err = DictError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

fn replace_if_some(target: &mut PathBuf, value: Option<PathBuf>) {
    if let Some(value) = value {
        *target = value;
    }
}

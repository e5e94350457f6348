use crate::app::cli::{CommonArgs, FilterArgs};
use crate::app::models::{DelimiterStyle, OutputOptions, RuntimeConfig, SecretPolicy, WalkOptions};
use crate::app::safeguard::Denylist;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Environment variable pointing at an alternative settings file.
pub const CONFIG_ENV: &str = "CONCAT_CONFIG";

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Settings {
    pub defaults: Defaults,
    pub presets: HashMap<String, PresetConfig>,
    pub safeguard: SafeguardSettings,
}

/// Values used when the matching CLI flag is not given.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Defaults {
    pub max_depth: Option<usize>,
    pub include_dotfiles: Option<bool>,
    pub respect_gitignore: Option<bool>,
    pub ignore_static_defaults: Option<bool>,
    pub allow_secrets: Option<bool>,
    pub fail_on_secret: Option<bool>,
    pub deep_secret_check: Option<bool>,
    pub delimiter: Option<DelimiterStyle>,
    pub delimiter_closure: Option<bool>,
    pub max_lines: Option<usize>,
    pub trim_blank_lines: Option<bool>,
    pub relative_paths: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PresetConfig {
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub exclude_dirs: Option<Vec<String>>,
}

/// Extra entries for the secret denylist, on top of the built-in tables.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SafeguardSettings {
    pub protected_names: Vec<String>,
    pub protected_extensions: Vec<String>,
}

impl SafeguardSettings {
    pub fn denylist(&self) -> Denylist {
        Denylist::default().with_extra(&self.protected_names, &self.protected_extensions)
    }
}

fn settings_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("concatenation").join("config.toml"))
}

/// Loads the settings file; a missing file yields the built-in defaults.
pub fn load_settings() -> Result<Settings> {
    let config_path = settings_path()?;

    if !config_path.exists() {
        log::debug!("no settings file at {:?}", config_path);
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(&config_path)
        .context(format!("Failed to read config at {:?}", config_path))?;

    parse_settings(&content).context(format!("Failed to parse {:?}", config_path))
}

pub fn parse_settings(content: &str) -> Result<Settings> {
    Ok(toml::from_str(content)?)
}

fn merge_vecs(preset_vec: Option<Vec<String>>, cli_vec: Option<Vec<String>>) -> Vec<String> {
    let mut combined = preset_vec.unwrap_or_default();
    if let Some(mut cli_items) = cli_vec {
        combined.append(&mut cli_items);
    }
    // Deduplicate while keeping order
    let mut seen = std::collections::HashSet::new();
    combined.retain(|item| seen.insert(item.clone()));
    combined
}

fn flag(cli: bool, default: Option<bool>) -> bool {
    cli || default.unwrap_or(false)
}

fn negated_flag(cli_off: bool, default: Option<bool>) -> bool {
    !cli_off && default.unwrap_or(true)
}

/// Merges the settings file with CLI flags. `filters` is only given by the
/// pattern-driven commands; their preset is picked by `--preset` or, failing
/// that, by `project_name`.
pub fn resolve_config(
    settings: &Settings,
    common: &CommonArgs,
    filters: Option<&FilterArgs>,
    project_name: Option<&str>,
) -> RuntimeConfig {
    let d = &settings.defaults;

    let max_lines = match common.max_lines.or(d.max_lines) {
        Some(0) => None,
        Some(n) => Some(n),
        None => OutputOptions::default().max_lines,
    };

    let mut config = RuntimeConfig {
        walk: WalkOptions {
            max_depth: common.max_depth.or(d.max_depth),
            include_dotfiles: flag(common.dotfiles, d.include_dotfiles),
            include_empty: false,
            respect_gitignore: flag(common.gitignore, d.respect_gitignore),
        },
        ignore_static_defaults: negated_flag(common.no_static_ignores, d.ignore_static_defaults),
        ignore_file: common.ignore_file.clone(),
        secrets: SecretPolicy {
            allow_secrets: flag(common.allow_secrets, d.allow_secrets),
            fail_on_secret: flag(common.fail_on_secret, d.fail_on_secret),
            deep_inspect: flag(common.deep, d.deep_secret_check),
        },
        denylist: settings.safeguard.denylist(),
        output: OutputOptions {
            delimiter: common.delimiter.or(d.delimiter).unwrap_or_default(),
            delimiter_closure: flag(common.closure, d.delimiter_closure),
            max_lines,
            trim_blank_lines: negated_flag(common.no_trim, d.trim_blank_lines),
            relative_paths: negated_flag(common.absolute, d.relative_paths),
            raw: common.raw,
        },
        ..Default::default()
    };
    // An explicit CLI choice wins over a contradicting default
    if common.allow_secrets {
        config.secrets.fail_on_secret = false;
    } else if common.fail_on_secret {
        config.secrets.allow_secrets = false;
    }

    if let Some(filters) = filters {
        // Determine preset to use: CLI flag > Auto-detect > None
        let preset_key = filters.preset.as_deref().or(project_name);
        let preset = preset_key
            .and_then(|k| settings.presets.get(k))
            .cloned()
            .unwrap_or_default();
        if let Some(key) = preset_key.filter(|k| settings.presets.contains_key(*k)) {
            log::info!("using preset {}", key);
        } else if let Some(key) = filters.preset.as_deref() {
            log::warn!("preset {} not found in settings", key);
        }

        config.include = merge_vecs(preset.include, filters.include.clone());
        config.exclude = merge_vecs(preset.exclude, filters.exclude.clone());
        config.exclude_dirs = merge_vecs(preset.exclude_dirs, filters.exclude_dir.clone());
    }

    config
}

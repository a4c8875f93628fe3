//! Plugin settings and the feature flags derived from them.
//!
//! [`Settings`] is layered with `figment`: built-in defaults, then an
//! optional TOML file, then `UCF_SANITIZER_*` environment variables. Values
//! are parsed the way the settings form stores them, so `"on"`, `"1"` and
//! `true` are all accepted for a checkbox.
//!
//! Flags are resolved once per run or request with
//! [`FeatureFlags::resolve`] and passed explicitly into the pipeline.

use std::collections::BTreeMap;
use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::sanitizer::Context;

/// Prefix of every environment variable read by [`Settings::load`].
pub const ENV_PREFIX: &str = "UCF_SANITIZER_";

/// All configurable options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Content types that are sanitized on save and in bulk runs.
    #[serde(deserialize_with = "lenient::post_types")]
    pub enabled_post_types: Vec<String>,

    #[serde(deserialize_with = "lenient::boolean")]
    pub cli_enable_postmaster_filtering: bool,
    #[serde(deserialize_with = "lenient::boolean")]
    pub cli_enable_safelink_filtering: bool,

    #[serde(deserialize_with = "lenient::boolean")]
    pub post_save_enable_postmaster_filtering: bool,
    #[serde(deserialize_with = "lenient::boolean")]
    pub post_save_enable_safelink_filtering: bool,

    #[serde(deserialize_with = "lenient::boolean")]
    pub on_paste_enable_postmaster_filtering: bool,
    #[serde(deserialize_with = "lenient::boolean")]
    pub on_paste_enable_safelink_filtering: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled_post_types: vec!["post".into(), "page".into()],
            cli_enable_postmaster_filtering: Context::Batch.default_enabled(),
            cli_enable_safelink_filtering: Context::Batch.default_enabled(),
            post_save_enable_postmaster_filtering: Context::Save.default_enabled(),
            post_save_enable_safelink_filtering: Context::Save.default_enabled(),
            on_paste_enable_postmaster_filtering: Context::Paste.default_enabled(),
            on_paste_enable_safelink_filtering: Context::Paste.default_enabled(),
        }
    }
}

impl Settings {
    /// Layer defaults, the optional TOML file at `path`, and `UCF_SANITIZER_*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["repo"]));

        let settings: Settings = figment.extract().map_err(Box::new)?;
        tracing::debug!(?settings, "Loaded settings");
        Ok(settings)
    }
}

/// Read-only lookup of named feature flags.
pub trait FlagSource {
    /// The configured value of `name`, or `None` if it was never set.
    fn get(&self, name: &str) -> Option<bool>;
}

impl FlagSource for Settings {
    fn get(&self, name: &str) -> Option<bool> {
        // Accept names with or without the option prefix.
        let name = name.strip_prefix("ucf_sanitizer_").unwrap_or(name);
        match name {
            "cli_enable_postmaster_filtering" => Some(self.cli_enable_postmaster_filtering),
            "cli_enable_safelink_filtering" => Some(self.cli_enable_safelink_filtering),
            "post_save_enable_postmaster_filtering" => {
                Some(self.post_save_enable_postmaster_filtering)
            }
            "post_save_enable_safelink_filtering" => Some(self.post_save_enable_safelink_filtering),
            "on_paste_enable_postmaster_filtering" => {
                Some(self.on_paste_enable_postmaster_filtering)
            }
            "on_paste_enable_safelink_filtering" => Some(self.on_paste_enable_safelink_filtering),
            _ => None,
        }
    }
}

impl FlagSource for BTreeMap<String, bool> {
    fn get(&self, name: &str) -> Option<bool> {
        BTreeMap::get(self, name).copied()
    }
}

/// Which redirector filters are enabled for a single pipeline invocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    pub safelink_filtering: bool,
    pub postmaster_filtering: bool,
}

impl FeatureFlags {
    pub const ALL: FeatureFlags = FeatureFlags {
        safelink_filtering: true,
        postmaster_filtering: true,
    };

    pub const NONE: FeatureFlags = FeatureFlags {
        safelink_filtering: false,
        postmaster_filtering: false,
    };

    /// Read the flags of `context` from `source`, falling back to the
    /// context's default for flags that are absent.
    pub fn resolve(source: &impl FlagSource, context: Context) -> Self {
        let names = context.flag_names();
        let default = context.default_enabled();
        Self {
            safelink_filtering: source.get(names.safelink).unwrap_or(default),
            postmaster_filtering: source.get(names.postmaster).unwrap_or(default),
        }
    }

    pub fn any(&self) -> bool {
        self.safelink_filtering || self.postmaster_filtering
    }
}

/// Deserializers accepting the loosely typed values a settings form produces.
mod lenient {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    pub(super) enum BoolLike {
        Bool(bool),
        Int(i64),
        Str(String),
    }

    impl BoolLike {
        pub(super) fn truthy(&self) -> Option<bool> {
            match self {
                BoolLike::Bool(b) => Some(*b),
                BoolLike::Int(i) => Some(*i != 0),
                BoolLike::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "1" | "true" | "on" | "yes" => Some(true),
                    "0" | "false" | "off" | "no" | "" => Some(false),
                    _ => None,
                },
            }
        }
    }

    pub(super) fn boolean<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<bool, D::Error> {
        let value = BoolLike::deserialize(de)?;
        value
            .truthy()
            .ok_or_else(|| serde::de::Error::custom("expected a boolean-like value"))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PostTypesLike {
        List(Vec<String>),
        Checkboxes(BTreeMap<String, BoolLike>),
        Joined(String),
    }

    pub(super) fn post_types<'de, D: Deserializer<'de>>(
        de: D,
    ) -> std::result::Result<Vec<String>, D::Error> {
        let types = match PostTypesLike::deserialize(de)? {
            PostTypesLike::List(list) => list,
            PostTypesLike::Checkboxes(map) => map
                .into_iter()
                .filter(|(_, checked)| checked.truthy().unwrap_or(false))
                .map(|(name, _)| name)
                .collect(),
            PostTypesLike::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        };

        let mut out: Vec<String> = Vec::with_capacity(types.len());
        for t in types {
            let t = t.trim();
            if !t.is_empty() && !out.iter().any(|seen| seen == t) {
                out.push(t.to_string());
            }
        }
        Ok(out)
    }
}

//! Configuration types deserialized from `strata.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

/// Default cache directory, relative to the project directory.
pub const DEFAULT_CACHE_DIR: &str = ".strata";

/// The top-level configuration parsed from `strata.toml`.
#[derive(Debug, Deserialize)]
pub struct SiteConfig {
    /// Site layout: source root and entrypoints.
    pub site: SiteMeta,
    /// Build cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Dependency graph settings.
    #[serde(default)]
    pub graph: GraphConfig,
}

/// The `[site]` table.
#[derive(Debug, Deserialize)]
pub struct SiteMeta {
    /// Source root, relative to the project directory.
    #[serde(default = "default_root")]
    pub root: String,
    /// Entrypoint specifiers, resolved against the source root.
    ///
    /// Accepts either a single string or a list of strings.
    #[serde(deserialize_with = "deserialize_string_or_vec")]
    pub entrypoints: Vec<String>,
}

/// The `[cache]` table.
#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    /// Cache directory, relative to the project directory.
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

/// The `[graph]` table.
#[derive(Debug, Default, Deserialize)]
pub struct GraphConfig {
    /// Read each module once per build instead of once per entrypoint.
    #[serde(default)]
    pub share_across_entrypoints: bool,
    /// Specifier prefixes treated as external. `None` keeps the loader's defaults.
    #[serde(default)]
    pub external_schemes: Option<Vec<String>>,
}

fn default_root() -> String {
    ".".to_string()
}

fn default_cache_dir() -> String {
    DEFAULT_CACHE_DIR.to_string()
}

/// Deserializes a field that can be either a single string or a list of strings.
///
/// Allows both `entrypoints = "index.tsx"` and
/// `entrypoints = ["index.tsx", "about.tsx"]`.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

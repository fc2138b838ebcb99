use serde::{Deserialize, Serialize};
use webstore_serde::SerializerOptions;

/// Options fixed when a facade is constructed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    /// Options for the default JSON serializer.
    pub serializer: SerializerOptions,
}

impl StorageOptions {
    /// Parse options from TOML text. Missing fields take their defaults.
    ///
    /// ```
    /// use webstore::StorageOptions;
    /// use webstore_serde::NamingPolicy;
    ///
    /// let options = StorageOptions::from_toml_str(
    ///     "[serializer]\nnaming = \"camel_case\"\n",
    /// ).unwrap();
    /// assert_eq!(options.serializer.naming, NamingPolicy::CamelCase);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Options with the browser-friendly serializer settings
    /// ([`SerializerOptions::web`]).
    pub fn web() -> Self {
        Self {
            serializer: SerializerOptions::web(),
        }
    }
}

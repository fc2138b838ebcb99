use serde::{Deserialize, Serialize};

/// How struct field names are renamed when a value is written.
///
/// Only struct fields are renamed. Map keys, enum variant names and string
/// contents are written as serde produced them. On read, stored names are
/// matched against the fields the target type declares, so any value
/// written under a policy reads back as the same value.
///
/// Types that serde buffers before dispatching (internally tagged and
/// untagged enums, `#[serde(flatten)]`) see the stored names; give those
/// types their own `#[serde(rename_all)]` and keep `AsDeclared` here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// Field names are written exactly as serde produced them.
    #[default]
    AsDeclared,
    /// `user_name` is written as `userName`.
    CamelCase,
    /// `user_name` is written as `UserName`.
    PascalCase,
    /// `userName` is written as `user_name`.
    SnakeCase,
    /// `user_name` is written as `user-name`.
    KebabCase,
}

/// What to do with struct fields whose value is null.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullHandling {
    /// Write null fields as `null`.
    #[default]
    Include,
    /// Drop null struct fields on write. Null map values and array items
    /// are kept.
    Omit,
}

/// Options controlling the default JSON serializer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerOptions {
    /// Key naming policy.
    pub naming: NamingPolicy,
    /// Null field policy.
    pub nulls: NullHandling,
    /// Emit indented output.
    pub pretty: bool,
}

impl SerializerOptions {
    /// Options producing compact camelCase output without null fields, the
    /// shape most browser-side consumers expect.
    pub fn web() -> Self {
        Self {
            naming: NamingPolicy::CamelCase,
            nulls: NullHandling::Omit,
            pretty: false,
        }
    }

    /// Returns `true` if struct field names are renamed.
    pub fn renames_keys(&self) -> bool {
        self.naming != NamingPolicy::AsDeclared
    }
}

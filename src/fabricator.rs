use std::{fmt, fs};

use anyhow::{Context as _, Result};
use camino::Utf8Path;
use serde::Deserialize;

/// The slice of the Fabricator object the installer cares about.
#[derive(Debug, Default, Deserialize)]
pub struct Fabricator {
    #[serde(default)]
    pub status: FabricatorStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct FabricatorStatus {
    #[serde(default)]
    pub versions: Versions,
}

#[derive(Debug, Default, Deserialize)]
pub struct Versions {
    #[serde(default)]
    pub platform: PlatformVersions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformVersions {
    #[serde(default)]
    pub bash_completion: Version,
}

impl Fabricator {
    pub fn load<P: AsRef<Utf8Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).with_context(|| format!("reading fabricator {path}"))?;

        toml_edit::de::from_str(&raw).with_context(|| format!("parsing fabricator {path}"))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new<S: Into<String>>(version: S) -> Self {
        Self(version.into())
    }

    /// Version without the leading `v`, as used in the extracted directory name.
    pub fn trimmed(&self) -> &str {
        self.0.strip_prefix('v').unwrap_or(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn version(fab: &Fabricator) -> &Version {
    &fab.status.versions.platform.bash_completion
}

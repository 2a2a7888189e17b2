use std::fs;

use anyhow::{bail, Context as _, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

pub const TARBALL_NAME: &str = "bash-completion.tar.xz";
pub const EXTRACT_DIR_TEMPLATE: &str = "bash-completion-%{version}";
pub const INSTALL_DIR: &str = "/opt/bash-completion";
pub const COMPLETIONS_DIRNAME: &str = "completions";
pub const COMPLETION_FILENAME: &str = "kubectl-fabric";
pub const HOOK_FILENAME: &str = "kubectl-fabric-hook.sh";
pub const PROFILE_DIR: &str = "/etc/profile.d";
pub const PROFILE_FILENAME: &str = "bash-completion.sh";
pub const TMP_DIR: &str = "/tmp";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tarball: String,
    pub extract_dir: String,
    pub extractor: ExtractorKind,
    pub checksum: Option<String>,
    pub layout: Layout,
    pub tools: Tools,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tarball: TARBALL_NAME.to_string(),
            extract_dir: EXTRACT_DIR_TEMPLATE.to_string(),
            extractor: ExtractorKind::default(),
            checksum: None,
            layout: Layout::default(),
            tools: Tools::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Utf8Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;

        Self::parse(&raw).with_context(|| format!("parsing config {path}"))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml_edit::de::from_str(raw)?)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// External `tar` binary.
    #[default]
    Tar,
    /// In-process extraction with the `tar` crate.
    Builtin,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Tools {
    pub tar: String,
    pub cp: String,
    pub ls: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            tar: "tar".to_string(),
            cp: "cp".to_string(),
            ls: "ls".to_string(),
        }
    }
}

/// Where everything lands on the host.
///
/// Defaults are the real system locations. [`Layout::rebase`] moves the whole
/// tree under a prefix, which is how tests and staged installs avoid touching
/// `/opt` and `/etc`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub install_dir: Utf8PathBuf,
    pub profile_dir: Utf8PathBuf,
    pub tmp_dir: Utf8PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            install_dir: INSTALL_DIR.into(),
            profile_dir: PROFILE_DIR.into(),
            tmp_dir: TMP_DIR.into(),
        }
    }
}

impl Layout {
    /// Moves every path under `root`, which must be absolute.
    pub fn rebase<P: AsRef<Utf8Path>>(&self, root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_absolute() {
            bail!("install root {root} is not an absolute path");
        }
        let under = |path: &Utf8Path| root.join(path.strip_prefix("/").unwrap_or(path));

        Ok(Self {
            install_dir: under(&self.install_dir),
            profile_dir: under(&self.profile_dir),
            tmp_dir: under(&self.tmp_dir),
        })
    }

    pub fn completions_dir(&self) -> Utf8PathBuf {
        self.install_dir.join(COMPLETIONS_DIRNAME)
    }

    pub fn completion_script(&self) -> Utf8PathBuf {
        self.completions_dir().join(COMPLETION_FILENAME)
    }

    pub fn hook_script(&self) -> Utf8PathBuf {
        self.install_dir.join(HOOK_FILENAME)
    }

    pub fn profile_script(&self) -> Utf8PathBuf {
        self.profile_dir.join(PROFILE_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_absolute_system_paths() {
        let layout = Layout::default();

        assert_eq!(layout.completions_dir(), "/opt/bash-completion/completions");
        assert_eq!(
            layout.completion_script(),
            "/opt/bash-completion/completions/kubectl-fabric"
        );
        assert_eq!(layout.hook_script(), "/opt/bash-completion/kubectl-fabric-hook.sh");
        assert_eq!(layout.profile_script(), "/etc/profile.d/bash-completion.sh");
    }

    #[test]
    fn rebase_prepends_root() {
        let layout = Layout::default().rebase("/stage").unwrap();

        assert_eq!(layout.install_dir, "/stage/opt/bash-completion");
        assert_eq!(layout.profile_dir, "/stage/etc/profile.d");
        assert_eq!(layout.tmp_dir, "/stage/tmp");
        assert!(layout.hook_script().is_absolute());
    }

    #[test]
    fn rebase_rejects_relative_root() {
        let err = Layout::default().rebase("stage").unwrap_err();

        assert!(err.to_string().contains("not an absolute path"));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config = Config::parse(
            r#"
extractor = "builtin"
checksum = "sha256:abcd"

[layout]
tmp_dir = "/var/tmp"

[tools]
tar = "bsdtar"
"#,
        )
        .unwrap();

        assert_eq!(config.extractor, ExtractorKind::Builtin);
        assert_eq!(config.checksum.as_deref(), Some("sha256:abcd"));
        assert_eq!(config.tarball, TARBALL_NAME);
        assert_eq!(config.layout.tmp_dir, "/var/tmp");
        assert_eq!(config.layout.install_dir, INSTALL_DIR);
        assert_eq!(config.tools.tar, "bsdtar");
        assert_eq!(config.tools.cp, "cp");
    }

    #[test]
    fn empty_config_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn unknown_extractor_is_rejected() {
        assert!(Config::parse(r#"extractor = "zip""#).is_err());
    }
}

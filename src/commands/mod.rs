mod hook;
mod install;

use anyhow::{bail, Result};
use camino::Utf8PathBuf;
use tokio_util::sync::CancellationToken;

use crate::{config::Config, fabricator::Version, replace_vars, split_checksum};

pub use hook::install_kubectl_fabric_completion;
pub use install::install;

/// Everything an install run needs, validated up front.
#[derive(Debug)]
pub struct Context {
    pub config: Config,
    pub version: Version,
    /// Directory the tarball is expected to unpack into.
    pub extract_dir: Utf8PathBuf,
    pub cancel: CancellationToken,
}

impl Context {
    pub fn new(config: Config, version: Version, cancel: CancellationToken) -> Result<Self> {
        if version.is_empty() && config.extract_dir.contains("%{version}") {
            bail!("bash-completion version is not set");
        }

        if let Some(checksum) = &config.checksum {
            split_checksum(checksum)?;
        }

        let extract_name = replace_vars(&config.extract_dir, &version)?;
        let extract_dir = config.layout.tmp_dir.join(&*extract_name);

        Ok(Self {
            config,
            version,
            extract_dir,
            cancel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_dir_uses_trimmed_version() {
        let ctx = Context::new(
            Config::default(),
            Version::new("v2.11"),
            CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(ctx.extract_dir, "/tmp/bash-completion-2.11");
    }

    #[test]
    fn missing_version_is_rejected() {
        let err = Context::new(Config::default(), Version::default(), CancellationToken::new())
            .unwrap_err();

        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn fixed_extract_dir_needs_no_version() {
        let config = Config {
            extract_dir: "bash-completion".to_string(),
            ..Config::default()
        };

        let ctx = Context::new(config, Version::default(), CancellationToken::new()).unwrap();

        assert_eq!(ctx.extract_dir, "/tmp/bash-completion");
    }

    #[test]
    fn bad_checksum_is_rejected_early() {
        let config = Config {
            checksum: Some("md5:abc".to_string()),
            ..Config::default()
        };

        assert!(Context::new(config, Version::new("v1"), CancellationToken::new()).is_err());
    }
}

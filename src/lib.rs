use std::{borrow::Cow, path::Path, sync::LazyLock};

use anyhow::{anyhow, bail, Result};
use regex::{Captures, Regex};
use sha2::{Digest, Sha256 as Sha256Hasher};

pub mod archive;
pub mod commands;
pub mod config;
pub mod error;
pub mod fabricator;
pub mod fs;
pub mod process;
pub mod scripts;

use fabricator::Version;

static VARIABLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%\{([a-zA-Z0-9_]*)\}").expect("invalid regex"));

/// Splits `algorithm:hex`, rejecting algorithms we cannot compute.
pub fn split_checksum(checksum: &str) -> Result<(&str, &str)> {
    let (hash_type, hash) = checksum
        .split_once(':')
        .ok_or(anyhow!("Invalid checksum format"))?;

    match hash_type {
        "blake3" | "sha256" => Ok((hash_type, hash)),
        _ => bail!("Unsupported hash {hash_type:?}"),
    }
}

pub fn check_hash<P: AsRef<Path>>(path: P, checksum: &str) -> Result<bool> {
    let (hash_type, hash) = split_checksum(checksum)?;
    let file = std::fs::read(path)?;

    let computed_hash = match hash_type {
        "blake3" => blake3::hash(&file).to_hex().to_string(),
        "sha256" => base16ct::lower::encode_string(Sha256Hasher::digest(&file).as_slice()),
        _ => unreachable!("split_checksum only accepts known hashes"),
    };

    Ok(hash.eq_ignore_ascii_case(&computed_hash))
}

/// Substitutes `%{version}` with the version minus its leading `v`.
pub fn replace_vars<'a>(haystack: &'a str, version: &Version) -> Result<Cow<'a, str>> {
    if let Some(captures) = VARIABLE_REGEX
        .captures_iter(haystack)
        .find(|captures| &captures[1] != "version")
    {
        bail!("Unknown variable %{{{}}}", &captures[1]);
    }

    Ok(VARIABLE_REGEX.replace_all(haystack, |_: &Captures| version.trimmed().to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn replaces_version_without_prefix() {
        let version = Version::new("v2.11");

        assert_eq!(
            replace_vars("bash-completion-%{version}", &version).unwrap(),
            "bash-completion-2.11"
        );
    }

    #[test]
    fn leaves_plain_names_borrowed() {
        let version = Version::new("v2.11");

        assert!(matches!(
            replace_vars("bash-completion", &version).unwrap(),
            Cow::Borrowed("bash-completion")
        ));
    }

    #[test]
    fn rejects_unknown_variables() {
        let version = Version::new("v2.11");

        assert!(replace_vars("%{version}-%{arch}", &version).is_err());
    }

    #[test]
    fn verifies_sha256_and_blake3() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"bash-completion").unwrap();

        let sha = base16ct::lower::encode_string(Sha256Hasher::digest(b"bash-completion").as_slice());
        let blake = blake3::hash(b"bash-completion").to_hex().to_string();

        assert!(check_hash(file.path(), &format!("sha256:{sha}")).unwrap());
        assert!(check_hash(file.path(), &format!("blake3:{blake}")).unwrap());
        assert!(!check_hash(file.path(), "sha256:00").unwrap());
    }

    #[test]
    fn rejects_malformed_checksums() {
        assert!(split_checksum("deadbeef").is_err());
        assert!(split_checksum("md5:deadbeef").is_err());
        assert_eq!(split_checksum("sha256:ab").unwrap(), ("sha256", "ab"));
    }
}

use std::{
    fs::File,
    io::{self, Read},
};

use bzip2::read::BzDecoder;
use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;
use tar::Archive;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use xz2::read::XzDecoder;

use crate::{
    config::ExtractorKind,
    error::{InstallError, IoContext, Result},
    process::{Sink, Tool},
};

/// Lists and unpacks the bash-completion tarball.
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'a> {
    kind: ExtractorKind,
    tar: &'a str,
}

impl<'a> Extractor<'a> {
    pub fn new(kind: ExtractorKind, tar: &'a str) -> Self {
        Self { kind, tar }
    }

    pub async fn list(
        &self,
        cancel: &CancellationToken,
        tarball: &Utf8Path,
        work_dir: &Utf8Path,
    ) -> Result<()> {
        const CONTEXT: &str = "listing tarball contents";

        match self.kind {
            ExtractorKind::Tar => {
                Tool::new(self.tar)
                    .arg("-tvf")
                    .arg(tarball)
                    .current_dir(work_dir)
                    .stdout(Sink::debug("tarball contents: "))
                    .stderr(Sink::debug("tarball error: "))
                    .run(cancel, CONTEXT)
                    .await
            }
            ExtractorKind::Builtin => {
                let tarball = tarball.to_owned();
                blocking(cancel, CONTEXT, move || list_archive(&tarball)).await
            }
        }
    }

    pub async fn extract(
        &self,
        cancel: &CancellationToken,
        tarball: &Utf8Path,
        work_dir: &Utf8Path,
        dest: &Utf8Path,
    ) -> Result<()> {
        const CONTEXT: &str = "extracting bash-completion";

        match self.kind {
            ExtractorKind::Tar => {
                Tool::new(self.tar)
                    .arg("-xvf")
                    .arg(tarball)
                    .arg("-C")
                    .arg(dest)
                    .current_dir(work_dir)
                    .stdout(Sink::debug("bash-completion extract: "))
                    .stderr(Sink::debug("bash-completion extract error: "))
                    .run(cancel, CONTEXT)
                    .await
            }
            ExtractorKind::Builtin => {
                let tarball = tarball.to_owned();
                let dest = dest.to_owned();
                blocking(cancel, CONTEXT, move || unpack_archive(&tarball, &dest)).await
            }
        }
    }
}

async fn blocking<F>(cancel: &CancellationToken, context: &str, f: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    let cancelled = || InstallError::Cancelled {
        context: context.to_string(),
    };

    if cancel.is_cancelled() {
        return Err(cancelled());
    }

    let task = tokio::task::spawn_blocking(f);

    tokio::select! {
        joined = task => joined.map_err(io::Error::other).io_context(|| context.to_string())?,
        () = cancel.cancelled() => Err(cancelled()),
    }
}

fn open_archive(path: &Utf8Path) -> Result<Archive<Box<dyn Read>>> {
    let target = File::open(path).io_context(|| format!("opening {path}"))?;

    let decoder: Box<dyn Read> = match path.extension() {
        Some("xz") => Box::new(XzDecoder::new(target)),
        Some("gz" | "tgz") => Box::new(GzDecoder::new(target)),
        Some("bz2") => Box::new(BzDecoder::new(target)),
        Some("tar") => Box::new(target),
        _ => {
            return Err(InstallError::Extract {
                path: path.to_owned(),
                message: "unsupported archive extension".to_string(),
            })
        }
    };

    Ok(Archive::new(decoder))
}

fn extract_error(path: &Utf8Path) -> impl Fn(io::Error) -> InstallError + '_ {
    move |e| InstallError::Extract {
        path: path.to_owned(),
        message: e.to_string(),
    }
}

fn list_archive(path: &Utf8PathBuf) -> Result<()> {
    let mut archive = open_archive(path)?;

    for entry in archive.entries().map_err(extract_error(path))? {
        let entry = entry.map_err(extract_error(path))?;
        let header = entry.header();
        debug!(
            "tarball contents: {:o} {:>8} {}",
            header.mode().unwrap_or(0),
            entry.size(),
            entry.path().map_err(extract_error(path))?.display()
        );
    }

    Ok(())
}

fn unpack_archive(path: &Utf8PathBuf, dest: &Utf8Path) -> Result<()> {
    debug!("Unpacking \"{path}\" into \"{dest}\"");

    open_archive(path)?
        .unpack(dest)
        .map_err(extract_error(path))
}

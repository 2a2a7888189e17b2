use camino::Utf8Path;
use tracing::{debug, info};

use super::{hook::install_kubectl_fabric_completion, Context};
use crate::{
    archive::Extractor,
    check_hash,
    config::COMPLETIONS_DIRNAME,
    error::{InstallError, Result},
    fs::{create_dir, exists, remove_best_effort, write_private},
    process::{Sink, Tool},
    scripts::PROFILE_SCRIPT,
};

const BASH_COMPLETION_FILENAME: &str = "bash_completion";

pub async fn install<P: AsRef<Utf8Path>>(ctx: &Context, work_dir: P) -> Result<()> {
    let work_dir = work_dir.as_ref();
    let config = &ctx.config;
    let layout = &config.layout;

    info!("Installing bash-completion");
    info!(
        "Using bash-completion version {}, extracting to {}",
        ctx.version.trimmed(),
        ctx.extract_dir
    );

    create_dir(&layout.install_dir, "creating bash-completion dir").await?;

    let tarball = work_dir.join(&config.tarball);
    if !exists(&tarball).await? {
        return Err(InstallError::NotFound {
            what: "tarball",
            path: tarball,
        });
    }

    if let Some(checksum) = &config.checksum {
        verify_tarball(&tarball, checksum).await?;
    }

    let extractor = Extractor::new(config.extractor, &config.tools.tar);
    extractor.list(&ctx.cancel, &tarball, work_dir).await?;

    create_dir(&layout.tmp_dir, "creating temporary dir").await?;
    info!("Extracting bash-completion tarball {tarball}");
    extractor
        .extract(&ctx.cancel, &tarball, work_dir, &layout.tmp_dir)
        .await?;

    if !exists(&ctx.extract_dir).await? {
        list_for_diagnostics(ctx, &layout.tmp_dir, Sink::info("tmp contents: ")).await;

        return Err(InstallError::NotFound {
            what: "extracted directory",
            path: ctx.extract_dir.clone(),
        });
    }
    list_for_diagnostics(ctx, &ctx.extract_dir, Sink::info("extracted contents: ")).await;

    create_dir(&layout.completions_dir(), "creating completions dir").await?;

    let src_completions = ctx.extract_dir.join(COMPLETIONS_DIRNAME);
    let src_bash_completion = ctx.extract_dir.join(BASH_COMPLETION_FILENAME);
    for (what, path) in [
        ("source completions directory", &src_completions),
        ("source bash_completion file", &src_bash_completion),
    ] {
        if !exists(path).await? {
            return Err(InstallError::NotFound {
                what,
                path: path.clone(),
            });
        }
    }

    info!(
        "Copying bash completions from {src_completions} to {}",
        layout.install_dir
    );
    Tool::new(&config.tools.cp)
        .arg("-rv")
        .arg(&src_completions)
        .arg(&layout.install_dir)
        .stdout(Sink::debug("cp: "))
        .stderr(Sink::debug("cp error: "))
        .run(&ctx.cancel, "copying bash-completion files")
        .await?;

    info!(
        "Copying bash_completion file from {src_bash_completion} to {}",
        layout.install_dir
    );
    Tool::new(&config.tools.cp)
        .arg("-v")
        .arg(&src_bash_completion)
        .arg(&layout.install_dir)
        .stdout(Sink::debug("cp: "))
        .stderr(Sink::debug("cp error: "))
        .run(&ctx.cancel, "copying bash_completion file")
        .await?;

    remove_best_effort(&ctx.extract_dir).await;

    install_kubectl_fabric_completion(layout).await?;

    create_dir(&layout.profile_dir, "creating profile.d directory").await?;
    write_private(
        &layout.profile_script(),
        PROFILE_SCRIPT,
        "writing bash-completion profile script",
    )
    .await?;

    info!("bash-completion installed to {}", layout.install_dir);
    Ok(())
}

async fn verify_tarball(tarball: &Utf8Path, checksum: &str) -> Result<()> {
    info!("Verifying tarball checksum");

    let path = tarball.to_owned();
    let owned = checksum.to_string();
    let verified = tokio::task::spawn_blocking(move || check_hash(&path, &owned))
        .await
        .map_err(anyhow::Error::from)
        .and_then(|checked| checked);

    match verified {
        Ok(true) => Ok(()),
        Ok(false) => Err(InstallError::Checksum {
            path: tarball.to_owned(),
            message: "checksum does not match".to_string(),
        }),
        Err(e) => Err(InstallError::Checksum {
            path: tarball.to_owned(),
            message: format!("{e:#}"),
        }),
    }
}

/// Runs `ls -la` purely for the log. Failures are not interesting.
async fn list_for_diagnostics(ctx: &Context, dir: &Utf8Path, sink: Sink) {
    let listed = Tool::new(&ctx.config.tools.ls)
        .arg("-la")
        .arg(dir)
        .stdout(sink)
        .run(&ctx.cancel, "listing directory")
        .await;

    if let Err(e) = listed {
        debug!("Failed to list {dir}: {e}");
    }
}

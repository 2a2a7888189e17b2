use tracing::info;

use crate::{
    config::Layout,
    error::Result,
    fs::{create_dir, write_private},
    scripts::{KUBECTL_FABRIC_COMPLETION, KUBECTL_FABRIC_HOOK},
};

/// Writes the `kubectl fabric` completion function and the hook that routes
/// kubectl completion through it.
pub async fn install_kubectl_fabric_completion(layout: &Layout) -> Result<()> {
    let completions_dir = layout.completions_dir();
    create_dir(&completions_dir, "creating kubectl-fabric completions dir").await?;

    let completion_path = layout.completion_script();
    write_private(
        &completion_path,
        KUBECTL_FABRIC_COMPLETION,
        "writing kubectl-fabric completion script",
    )
    .await?;

    let hook_path = layout.hook_script();
    write_private(
        &hook_path,
        KUBECTL_FABRIC_HOOK,
        "writing kubectl-fabric hook script",
    )
    .await?;

    info!("Installed kubectl-fabric completion to {completion_path} and {hook_path}");
    Ok(())
}

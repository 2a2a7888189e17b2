//! Shell payloads installed verbatim.
//!
//! They always reference the real system locations, even when the layout is
//! rebased for a staged install.

/// Login snippet: sources bash-completion, aliases `k`, wires kubectl completion and the fabric hook.
pub const PROFILE_SCRIPT: &str = include_str!("scripts/profile.sh");

/// `_kubectl_fabric`, registered for `kubectl-fabric`.
pub const KUBECTL_FABRIC_COMPLETION: &str = include_str!("scripts/kubectl-fabric.bash");

/// `_kubectl_fabric_hook`, replacing the completion function of `kubectl` and `k`.
pub const KUBECTL_FABRIC_HOOK: &str = include_str!("scripts/kubectl-fabric-hook.sh");

use super::context::TargetPlatform;
use std::path::Path;

/// Adds execute permission for owner, group and others. No-op for platforms
/// without an execute bit.
pub async fn make_executable(path: &Path, platform: TargetPlatform) -> std::io::Result<()> {
    if !platform.has_execute_bit() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut permissions = tokio::fs::metadata(path).await?.permissions();
        permissions.set_mode(permissions.mode() | 0o111);
        tokio::fs::set_permissions(path, permissions).await?;
    }
    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}

/// Copies a support file staged under the support tree into the install tree.
/// Failures are logged and otherwise ignored.
pub async fn copy_to_app_tree(staged: &Path, destination: &Path) {
    let result = async {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(staged, destination).await
    }
    .await;

    match result {
        Ok(_) => tracing::debug!(
            staged = %staged.display(),
            destination = %destination.display(),
            "Copied support file into install tree"
        ),
        Err(e) => tracing::debug!(
            staged = %staged.display(),
            destination = %destination.display(),
            "Skipping support file copy: {}",
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_bits_are_added() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.sh");
        std::fs::write(&path, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();

        make_executable(&path, TargetPlatform::Linux).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o751);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_windows_target_leaves_permissions_alone() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.exe");
        std::fs::write(&path, b"MZ").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        make_executable(&path, TargetPlatform::Windows).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[tokio::test]
    async fn test_failed_copy_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        copy_to_app_tree(&dir.path().join("missing"), &dir.path().join("out")).await;
        assert!(!dir.path().join("out").exists());
    }
}

use std::path::Path;

use tessera_crypto::keys::Keypair;

use crate::error::NodeError;

/// Persist the validator key as a hex-encoded seed. The file is created with
/// owner-only permissions; at-rest encryption is a deployment concern.
pub fn save_key(path: &str, keypair: &Keypair) -> Result<(), NodeError> {
    let seed_hex = hex::encode(keypair.seed());
    std::fs::write(path, format!("{}\n", seed_hex))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)?;
    }
    Ok(())
}

/// Load a validator key previously written by `save_key`.
pub fn load_key(path: &str) -> Result<Keypair, NodeError> {
    if !Path::new(path).exists() {
        return Err(NodeError::Key {
            reason: format!("key file {:?} not found (run `tessera keygen` first)", path),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    Keypair::from_seed_hex(contents.trim()).map_err(|e| NodeError::Key {
        reason: format!("key file {:?}: {}", path, e),
    })
}

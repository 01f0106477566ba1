use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use ethers::signers::{
    LocalWallet,
    MnemonicBuilder,
    coins_bip39::English,
};
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
};

pub const LOCAL_PRIVATE_KEY_ENV: &str = "LOCAL_PRIVATE_KEY";
pub const SEPOLIA_PRIVATE_KEY_ENV: &str = "SEPOLIA_PRIVATE_KEY";

#[derive(Clone, Debug)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".foundry").join("keystores"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

/// Keystores are JSON files, stored either bare (`cast wallet import`) or with a
/// `.json` extension.
pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read keystore directory")? {
        let entry = entry.wrap_err("Failed to read keystore entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            None | Some("json") => {}
            Some(_) => continue,
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid keystore filename {:?}", path))?
            .to_owned();
        if name.starts_with('.') {
            continue;
        }
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    let wallets = list_wallets(dir)?;
    wallets
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Keystore '{name}' not found in {}", dir.to_string_lossy()))
}

pub fn unlock_wallet(descriptor: &WalletDescriptor) -> Result<LocalWallet> {
    let prompt = format!("Enter password for keystore '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read keystore password")?;
    decrypt_wallet(descriptor, password.as_bytes())
}

pub fn decrypt_wallet(descriptor: &WalletDescriptor, password: &[u8]) -> Result<LocalWallet> {
    let secret = decrypt_key(&descriptor.path, password)
        .map_err(|_| eyre!("Invalid password for keystore '{}'", descriptor.name))?;
    signer_from_secret(&secret)
        .ok_or_else(|| eyre!("Keystore '{}' contained unsupported key material", descriptor.name))
}

fn signer_from_secret(secret: &[u8]) -> Option<LocalWallet> {
    // `from_bytes` panics on anything but a 32 byte scalar.
    if secret.len() == 32 {
        if let Ok(wallet) = LocalWallet::from_bytes(secret) {
            return Some(wallet);
        }
    }
    let mnemonic = std::str::from_utf8(secret).ok()?;
    if mnemonic.split_whitespace().count() < 12 {
        return None;
    }
    MnemonicBuilder::<English>::default()
        .phrase(mnemonic.trim())
        .build()
        .ok()
}

/// Reads a hex private key, with or without `0x`, from the named variable.
pub fn wallet_from_env(var: &str) -> Result<LocalWallet> {
    let raw = std::env::var(var).wrap_err_with(|| format!("{var} is not set"))?;
    let key = raw.trim();
    let key = key.strip_prefix("0x").unwrap_or(key);
    LocalWallet::from_str(key).map_err(|_| eyre!("{var} does not hold a valid private key"))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use ethers::signers::Signer;
    use tempdir::TempDir;

    // First account of the default Hardhat/Anvil mnemonic.
    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    #[test]
    fn list_wallets__accepts_bare_and_json_keystores() {
        // given
        let dir = TempDir::new("keystores").unwrap();
        fs::write(dir.path().join("player"), b"{}").unwrap();
        fs::write(dir.path().join("owner.json"), b"{}").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        // when
        let wallets = list_wallets(dir.path()).unwrap();

        // then
        let names: Vec<&str> = wallets.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["owner", "player"]);
    }

    #[test]
    fn list_wallets__missing_directory_is_empty() {
        let wallets = list_wallets(Path::new("/definitely/not/here")).unwrap();
        assert!(wallets.is_empty());
    }

    #[test]
    fn decrypt_wallet__round_trips_keystore_written_by_eth_keystore() {
        // given
        let dir = TempDir::new("keystores").unwrap();
        let key = hex::decode(DEV_KEY).unwrap();
        let mut rng = ethers::core::rand::thread_rng();
        eth_keystore::encrypt_key(dir.path(), &mut rng, &key, "hunter2", Some("dev"))
            .unwrap();
        let descriptor = find_wallet(dir.path(), "dev").unwrap();

        // when
        let wallet = decrypt_wallet(&descriptor, b"hunter2").unwrap();

        // then
        assert_eq!(format!("{:?}", wallet.address()), DEV_ADDRESS);
        assert!(decrypt_wallet(&descriptor, b"wrong").is_err());
    }

    #[test]
    fn signer_from_secret__accepts_mnemonic() {
        let phrase = "test test test test test test test test test test test junk";
        let wallet = signer_from_secret(phrase.as_bytes()).unwrap();
        assert_eq!(format!("{:?}", wallet.address()), DEV_ADDRESS);
    }

    #[test]
    fn signer_from_secret__rejects_short_and_long_secrets_without_panicking() {
        assert!(signer_from_secret(&[7u8; 16]).is_none());
        assert!(signer_from_secret(&[7u8; 48]).is_none());
        assert!(signer_from_secret(b"").is_none());
    }
}

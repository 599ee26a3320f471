//! EVM wallet used for the StandX interactive login.
//!
//! The wallet only signs the login challenge (EIP-191 `personal_sign`).
//! Trading requests are signed by the session `RequestSigner`.

use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;
use zeroize::Zeroizing;

use crate::error::KeyError;

/// Wallet loaded from a hex private key.
///
/// Security notes:
/// - Raw key bytes live in `Zeroizing` buffers only while parsing.
/// - Never log private key material.
pub struct WalletSigner {
    signer: PrivateKeySigner,
}

impl WalletSigner {
    /// Parse a hex private key (supports 0x prefix and whitespace trimming).
    pub fn from_hex(hex_key: &str) -> Result<Self, KeyError> {
        let trimmed = hex_key.trim().trim_start_matches("0x");
        let secret_bytes = Zeroizing::new(hex::decode(trimmed)?);
        let signer = PrivateKeySigner::from_slice(&secret_bytes)
            .map_err(|e| KeyError::InvalidWalletKey(e.to_string()))?;
        Ok(Self { signer })
    }

    /// EIP-55 checksummed address.
    pub fn address(&self) -> String {
        self.signer.address().to_checksum(None)
    }

    /// EIP-191 `personal_sign`, returned as `0x`-prefixed hex (r || s || v).
    pub async fn personal_sign(&self, message: &str) -> Result<String, KeyError> {
        let signature = self
            .signer
            .sign_message(message.as_bytes())
            .await
            .map_err(|e| KeyError::Signing(e.to_string()))?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }
}

impl std::fmt::Debug for WalletSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSigner")
            .field("address", &self.address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (anvil/hardhat account #0).
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_address_from_key() {
        let wallet = WalletSigner::from_hex(DEV_KEY).unwrap();
        assert_eq!(wallet.address(), DEV_ADDRESS);

        let unprefixed = WalletSigner::from_hex(&format!(" {} ", &DEV_KEY[2..])).unwrap();
        assert_eq!(unprefixed.address(), DEV_ADDRESS);
    }

    #[test]
    fn test_invalid_keys_rejected() {
        assert!(matches!(
            WalletSigner::from_hex("zz"),
            Err(KeyError::HexDecode(_))
        ));
        assert!(matches!(
            WalletSigner::from_hex("0x1234"),
            Err(KeyError::InvalidWalletKey(_))
        ));
    }

    #[tokio::test]
    async fn test_personal_sign_is_deterministic() {
        let wallet = WalletSigner::from_hex(DEV_KEY).unwrap();
        let a = wallet.personal_sign("login challenge").await.unwrap();
        let b = wallet.personal_sign("login challenge").await.unwrap();

        assert!(a.starts_with("0x"));
        assert_eq!(a.len(), 2 + 130);
        assert_eq!(a, b);
    }
}

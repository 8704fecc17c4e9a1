use std::sync::Arc;

use payout_core::Ed25519TransferBuilder;

pub const DEFAULT_PAYOUT_SHARE_BPS: u16 = 5500; // 55% of accrued revenue is distributable
pub const DEFAULT_WINDOW_OFFSET: u64 = 30; // network time-units ahead for submission validity

/// Process configuration, loaded once at startup. The treasury seed is
/// consumed into the transfer builder here and never kept around or
/// logged.
#[derive(Clone)]
pub struct PayoutConfig {
    pub database_url: String,
    pub network_url: String,
    pub treasury: Arc<Ed25519TransferBuilder>,
    pub host: String,
    pub port: u16,
    /// Allowed origin for inbound callers; `*` means any.
    pub allowed_origin: String,
    pub payout_share_bps: u16,
    pub window_offset: u64,
    /// Explorer URL template containing a `{tx}` placeholder.
    pub explorer_url: String,
    pub gateway_timeout_secs: u64,
}

impl PayoutConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let network_url = std::env::var("NETWORK_URL")
            .map_err(|_| anyhow::anyhow!("NETWORK_URL must be set"))?;

        let keypair_path = std::env::var("TREASURY_KEYPAIR_PATH")
            .map_err(|_| anyhow::anyhow!("TREASURY_KEYPAIR_PATH must be set"))?;
        let seed = read_seed(&keypair_path)?;
        let treasury = Arc::new(Ed25519TransferBuilder::from_seed(seed));

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let allowed_origin = std::env::var("ALLOWED_ORIGIN").unwrap_or_else(|_| "*".to_string());

        let payout_share_bps = match std::env::var("PAYOUT_SHARE_BPS") {
            Ok(s) => {
                let bps: u16 = s
                    .parse()
                    .map_err(|_| anyhow::anyhow!("PAYOUT_SHARE_BPS must be an integer: {}", s))?;
                if bps > 10_000 {
                    anyhow::bail!("PAYOUT_SHARE_BPS must be <= 10000, got {}", bps);
                }
                bps
            }
            Err(_) => DEFAULT_PAYOUT_SHARE_BPS,
        };

        let window_offset = std::env::var("WINDOW_OFFSET")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_WINDOW_OFFSET);

        let explorer_url = std::env::var("EXPLORER_URL")
            .unwrap_or_else(|_| "https://explorer.example.org/tx/{tx}".to_string());
        if !explorer_url.contains("{tx}") {
            anyhow::bail!("EXPLORER_URL must contain a {{tx}} placeholder: {}", explorer_url);
        }

        let gateway_timeout_secs = std::env::var("GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(ledger_client::config::DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            database_url,
            network_url,
            treasury,
            host,
            port,
            allowed_origin,
            payout_share_bps,
            window_offset,
            explorer_url,
            gateway_timeout_secs,
        })
    }

    pub fn explorer_url_for(&self, transaction_id: &str) -> String {
        self.explorer_url.replace("{tx}", transaction_id)
    }
}

/// Read an Ed25519 seed from a JSON byte-array keypair file. Accepts
/// 32-byte seed files and 64-byte expanded keypair files (seed first).
fn read_seed(path: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("Failed to read treasury keypair from {}: {}", path, e))?;
    let raw: Vec<u8> = serde_json::from_slice(&bytes)
        .map_err(|e| anyhow::anyhow!("Treasury keypair file is not a JSON byte array: {}", e))?;
    if raw.len() != 32 && raw.len() != 64 {
        anyhow::bail!(
            "Treasury keypair must contain 32 or 64 bytes, got {}",
            raw.len()
        );
    }
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&raw[..32]);
    Ok(seed)
}

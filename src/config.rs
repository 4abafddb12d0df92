// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the typed configuration built
//! from them at start-up.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SOURCE_RPC_URL` | Source-network JSON-RPC endpoint | Arbitrum Sepolia public RPC |
//! | `SOURCE_CHAIN_ID` | Source-network chain id | `421614` |
//! | `TOKEN_ADDRESS` | Bridged ERC-20 token | USDC2 |
//! | `BRIDGE_ADDRESS` | Bridge ingress contract | Hyperliquid testnet bridge |
//! | `DESTINATION_API_URL` | Destination API base URL | `https://api.hyperliquid-testnet.xyz` |
//! | `DESTINATION_CHAIN` | `Testnet` or `Mainnet` | `Testnet` |
//! | `VAULT_ADDRESS` | Default vault for fallback submissions | None |
//! | `TEE_PRIVATE_KEY` | Operator (redistributor) key, hex | Required to execute |
//! | `CREDIT_MAX_ATTEMPTS` | Bridge credit polls before timing out | `30` |
//! | `CREDIT_POLL_INTERVAL_SECS` | Seconds between credit polls | `5` |
//! | `DATA_DIR` | Root directory for sealed storage | `/data` |
//! | `EXECUTION_RETENTION_SECS` | Seconds a finished execution stays in memory | `3600` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `FALLBACK_API_URL` | Fallback server used by the tracker CLI | `http://localhost:8080` |
//! | `TRACK_POLL_INTERVAL_SECS` | Tracker poll interval | `5` |
//! | `REQUESTER_ADDRESS` | Requester whose secret slot the tracker CLI fills | Required to submit |
//! | `APP_ADDRESS` | Enclave app the tracker CLI submits jobs to | `hypersecret` |
//!
//! Inside the enclave the operator key comes from
//! `IEXEC_APP_DEVELOPER_SECRET` instead of `TEE_PRIVATE_KEY`.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;

use crate::blockchain::signing::operator_signer;
use crate::blockchain::{
    ChainError, NetworkConfig, SourceChainClient, HL_BRIDGE_ADDRESS, USDC2_TOKEN_ADDRESS,
};
use crate::destination::client::HL_TESTNET_API;
use crate::destination::credit::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use crate::destination::{CreditWaiter, DestinationChain, DestinationError, HyperliquidClient};
use crate::executions::DEFAULT_RETENTION;
use crate::intent::parse_account;
use crate::pipeline::PipelineConfig;
use crate::storage::paths::DATA_ROOT;

pub const SOURCE_RPC_URL_ENV: &str = "SOURCE_RPC_URL";
pub const SOURCE_CHAIN_ID_ENV: &str = "SOURCE_CHAIN_ID";
pub const TOKEN_ADDRESS_ENV: &str = "TOKEN_ADDRESS";
pub const BRIDGE_ADDRESS_ENV: &str = "BRIDGE_ADDRESS";
pub const DESTINATION_API_URL_ENV: &str = "DESTINATION_API_URL";
pub const DESTINATION_CHAIN_ENV: &str = "DESTINATION_CHAIN";
pub const VAULT_ADDRESS_ENV: &str = "VAULT_ADDRESS";

/// Operator key for the fallback server.
///
/// Never logged. The enclave reads [`IEXEC_APP_DEVELOPER_SECRET_ENV`] instead.
pub const TEE_PRIVATE_KEY_ENV: &str = "TEE_PRIVATE_KEY";

pub const CREDIT_MAX_ATTEMPTS_ENV: &str = "CREDIT_MAX_ATTEMPTS";
pub const CREDIT_POLL_INTERVAL_SECS_ENV: &str = "CREDIT_POLL_INTERVAL_SECS";

/// Environment variable name for the sealed data directory path.
///
/// The data directory is mounted as Gramine's encrypted filesystem in the
/// manifest. Execution outcomes and audit logs are stored here.
///
/// # Default
/// `/data` (set in Gramine manifest as encrypted mount point)
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const EXECUTION_RETENTION_SECS_ENV: &str = "EXECUTION_RETENTION_SECS";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const FALLBACK_API_URL_ENV: &str = "FALLBACK_API_URL";
pub const TRACK_POLL_INTERVAL_SECS_ENV: &str = "TRACK_POLL_INTERVAL_SECS";
pub const REQUESTER_ADDRESS_ENV: &str = "REQUESTER_ADDRESS";
pub const APP_ADDRESS_ENV: &str = "APP_ADDRESS";

// Enclave job environment, set by the provider.

/// Requester secret #1: the encoded intent.
pub const IEXEC_REQUESTER_SECRET_1_ENV: &str = "IEXEC_REQUESTER_SECRET_1";
/// App-developer secret: the operator key.
pub const IEXEC_APP_DEVELOPER_SECRET_ENV: &str = "IEXEC_APP_DEVELOPER_SECRET";
/// Output directory for result artifacts.
pub const IEXEC_OUT_ENV: &str = "IEXEC_OUT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Configuration errors, reported once at start-up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

fn invalid(var: &'static str, reason: impl fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.to_string(),
    }
}

/// Read `var` through `lookup`, treating blank values as unset.
fn read<F>(lookup: &F, var: &'static str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match read(lookup, var) {
        Some(raw) => raw.parse().map_err(|e| invalid(var, e)),
        None => Ok(default),
    }
}

fn address_or<F>(lookup: &F, var: &'static str, default: Address) -> Result<Address, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match read(lookup, var) {
        Some(raw) => parse_account(var, &raw).map_err(|e| invalid(var, e)),
        None => Ok(default),
    }
}

fn env_lookup(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

/// Everything needed to run the pipeline against real networks.
#[derive(Clone)]
pub struct BridgeConfig {
    pub network: NetworkConfig,
    pub token: Address,
    pub bridge: Address,
    pub destination_api_url: String,
    pub destination_chain: DestinationChain,
    /// Vault used when a fallback request names none.
    pub default_vault: Option<Address>,
    operator_key: Option<String>,
    pub credit_max_attempts: u32,
    pub credit_interval: Duration,
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("network", &self.network)
            .field("token", &self.token)
            .field("bridge", &self.bridge)
            .field("destination_api_url", &self.destination_api_url)
            .field("destination_chain", &self.destination_chain)
            .field("default_vault", &self.default_vault)
            .field("operator_key", &self.operator_key.as_ref().map(|_| "<redacted>"))
            .field("credit_max_attempts", &self.credit_max_attempts)
            .field("credit_interval", &self.credit_interval)
            .finish()
    }
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut network = NetworkConfig::arbitrum_sepolia();
        if let Some(rpc_url) = read(&lookup, SOURCE_RPC_URL_ENV) {
            url::Url::parse(&rpc_url).map_err(|e| invalid(SOURCE_RPC_URL_ENV, e))?;
            network.rpc_url = rpc_url;
        }
        network.chain_id = parse_or(&lookup, SOURCE_CHAIN_ID_ENV, network.chain_id)?;

        let destination_chain = match read(&lookup, DESTINATION_CHAIN_ENV) {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| invalid(DESTINATION_CHAIN_ENV, e))?,
            None => DestinationChain::default(),
        };

        let default_vault = match read(&lookup, VAULT_ADDRESS_ENV) {
            Some(raw) => Some(
                parse_account(VAULT_ADDRESS_ENV, &raw).map_err(|e| invalid(VAULT_ADDRESS_ENV, e))?,
            ),
            None => None,
        };

        let credit_max_attempts =
            parse_or(&lookup, CREDIT_MAX_ATTEMPTS_ENV, DEFAULT_MAX_ATTEMPTS)?;
        if credit_max_attempts == 0 {
            return Err(invalid(CREDIT_MAX_ATTEMPTS_ENV, "must be at least 1"));
        }
        let credit_interval = Duration::from_secs(parse_or(
            &lookup,
            CREDIT_POLL_INTERVAL_SECS_ENV,
            DEFAULT_POLL_INTERVAL.as_secs(),
        )?);

        Ok(Self {
            network,
            token: address_or(&lookup, TOKEN_ADDRESS_ENV, USDC2_TOKEN_ADDRESS)?,
            bridge: address_or(&lookup, BRIDGE_ADDRESS_ENV, HL_BRIDGE_ADDRESS)?,
            destination_api_url: read(&lookup, DESTINATION_API_URL_ENV)
                .unwrap_or_else(|| HL_TESTNET_API.to_string()),
            destination_chain,
            default_vault,
            operator_key: read(&lookup, TEE_PRIVATE_KEY_ENV),
            credit_max_attempts,
            credit_interval,
        })
    }

    /// Replace the operator key, e.g. with the enclave's app-developer secret.
    pub fn with_operator_key(mut self, key: impl Into<String>) -> Self {
        self.operator_key = Some(key.into());
        self
    }

    /// The operator key, required to execute.
    pub fn operator_key(&self) -> Result<&str, ConfigError> {
        self.operator_key
            .as_deref()
            .ok_or(ConfigError::Missing(TEE_PRIVATE_KEY_ENV))
    }

    pub fn has_operator_key(&self) -> bool {
        self.operator_key.is_some()
    }

    /// Source-network client signing with the operator key.
    pub fn source_client(&self) -> Result<SourceChainClient, ChainError> {
        let key = self
            .operator_key()
            .map_err(|e| ChainError::InvalidPrivateKey(e.to_string()))?;
        SourceChainClient::new(self.network.clone(), self.token, operator_signer(key)?)
    }

    pub fn destination_client(&self) -> Result<HyperliquidClient, DestinationError> {
        HyperliquidClient::new(self.destination_api_url.clone())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            bridge: self.bridge,
            destination_chain: self.destination_chain,
            credit: CreditWaiter::new(self.credit_max_attempts, self.credit_interval),
            ..PipelineConfig::default()
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// How long finished executions stay in memory.
    pub execution_retention: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: read(&lookup, HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, PORT_ENV, DEFAULT_PORT)?,
            data_dir: read(&lookup, DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DATA_ROOT)),
            execution_retention: Duration::from_secs(parse_or(
                &lookup,
                EXECUTION_RETENTION_SECS_ENV,
                DEFAULT_RETENTION.as_secs(),
            )?),
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| invalid(HOST_ENV, e))
    }
}

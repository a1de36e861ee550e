use thiserror::Error;

/// Errors surfaced by a [`crate::domain::ports::MarketDataProvider`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[error("provider '{provider}' connection failed: {detail}")]
    Connection { provider: String, detail: String },

    #[error("provider '{provider}' rate limit exceeded")]
    RateLimitExceeded { provider: String },

    #[error("provider '{provider}' has no quote for '{symbol}'")]
    QuoteNotFound { provider: String, symbol: String },

    #[error("provider '{provider}' rejected symbol '{symbol}' as invalid")]
    InvalidSymbol { provider: String, symbol: String },

    #[error("provider '{provider}' is misconfigured: {detail}")]
    Config { provider: String, detail: String },
}

impl ProviderError {
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::Connection { provider, .. }
            | ProviderError::RateLimitExceeded { provider }
            | ProviderError::QuoteNotFound { provider, .. }
            | ProviderError::InvalidSymbol { provider, .. }
            | ProviderError::Config { provider, .. } => provider,
        }
    }
}

/// Errors raised while validating a play's static fields.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("play '{play_id}' is missing required field '{field}'")]
    MissingField { play_id: String, field: String },

    #[error(
        "play '{play_id}' OCC symbol '{occ}' does not match (symbol={symbol}, expiration={expiration}, type={trade_type}, strike={strike})"
    )]
    OccMismatch {
        play_id: String,
        occ: String,
        symbol: String,
        expiration: String,
        trade_type: String,
        strike: String,
    },

    #[error("play '{play_id}' OCC symbol '{occ}' is not well formed: {detail}")]
    OccMalformed {
        play_id: String,
        occ: String,
        detail: String,
    },

    #[error("play '{play_id}' action '{action}' is not a valid opening action")]
    InvalidOpeningAction { play_id: String, action: String },
}

/// Errors raised by the play store while reading or moving play files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("play '{play_id}' not found in partition '{partition}'")]
    NotFound { play_id: String, partition: String },

    #[error("i/o error on play '{play_id}': {source}")]
    Io {
        play_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize play '{play_id}': {source}")]
    Serde {
        play_id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while submitting or tracking a brokerage order.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrderError {
    #[error("order for play '{play_id}' was rejected by the broker: {reason}")]
    Rejected { play_id: String, reason: String },

    #[error("order '{order_id}' for play '{play_id}' timed out waiting for a fill")]
    FillTimeout { play_id: String, order_id: String },

    #[error("action '{action}' has no valid closing pair")]
    UnpairedAction { action: String },

    #[error("brokerage call failed for play '{play_id}': {detail}")]
    Brokerage { play_id: String, detail: String },
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("config field '{field}' is invalid: {detail}")]
    Invalid { field: String, detail: String },
}

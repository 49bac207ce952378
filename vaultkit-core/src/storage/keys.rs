//! Composite storage keys.

use std::{fmt, str::FromStr};

use strum::{Display, EnumString};

use super::error::StorageError;
use crate::{accounts::AccountId, config::Network};

/// Entity-type namespaces understood by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString)]
#[strum(serialize_all = "camelCase")]
pub enum Namespace {
    /// Account records, scoped by account id.
    Accounts,
    /// The active account id. Unscoped.
    CurrentAccountId,
    /// Next-index counter, scoped by network.
    AccountCounter,
    /// Connected dapps, scoped by account id.
    Dapps,
    /// NFT index entries, scoped by account id.
    Nfts,
}

impl Namespace {
    /// Namespaces holding records that belong to a single account, the account
    /// record itself last.
    pub const ACCOUNT_SCOPED: [Self; 3] = [Self::Dapps, Self::Nfts, Self::Accounts];
}

/// A composite key: a namespace plus an optional scope (`accounts:0-mainnet`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    namespace: Namespace,
    scope: Option<String>,
}

impl StorageKey {
    /// A key addressing the whole namespace.
    #[must_use]
    pub const fn unscoped(namespace: Namespace) -> Self {
        Self {
            namespace,
            scope: None,
        }
    }

    /// A key addressing one account's record within `namespace`.
    #[must_use]
    pub fn account(namespace: Namespace, account_id: &AccountId) -> Self {
        Self {
            namespace,
            scope: Some(account_id.to_string()),
        }
    }

    /// A key scoped to a network within `namespace`.
    #[must_use]
    pub fn network(namespace: Namespace, network: Network) -> Self {
        Self {
            namespace,
            scope: Some(network.to_string()),
        }
    }

    /// The namespace of this key.
    #[must_use]
    pub const fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// The scope of this key, if any.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// The account this key is scoped to, if its scope parses as an account id.
    #[must_use]
    pub fn account_id(&self) -> Option<AccountId> {
        self.scope.as_deref().and_then(|scope| scope.parse().ok())
    }

    /// Whether the key belongs to `network`, either directly or through an account id.
    #[must_use]
    pub fn matches_network(&self, network: Network) -> bool {
        match self.scope.as_deref() {
            None => false,
            Some(scope) => self
                .account_id()
                .map_or(scope == network.to_string(), |id| id.network() == network),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}:{scope}", self.namespace),
            None => write!(f, "{}", self.namespace),
        }
    }
}

impl FromStr for StorageKey {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, scope) = match s.split_once(':') {
            Some((namespace, scope)) => (namespace, Some(scope.to_string())),
            None => (s, None),
        };
        let namespace = namespace
            .parse()
            .map_err(|_| StorageError::InvalidKey(s.to_string()))?;
        Ok(Self { namespace, scope })
    }
}

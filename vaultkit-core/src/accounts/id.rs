use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{config::Network, error::WalletError};

/// Network-scoped account identifier, rendered as `{index}-{network}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId {
    network: Network,
    index: u32,
}

impl AccountId {
    /// Builds an id from its parts.
    #[must_use]
    pub const fn new(index: u32, network: Network) -> Self {
        Self { network, index }
    }

    /// Local index within the network.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// The network the account lives on.
    #[must_use]
    pub const fn network(&self) -> Network {
        self.network
    }

    /// The same index on the other network. Used for shadow accounts.
    #[must_use]
    pub const fn on_network(&self, network: Network) -> Self {
        Self::new(self.index, network)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.index, self.network)
    }
}

impl FromStr for AccountId {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WalletError::invalid_input("account_id", format!("malformed: {s}"));
        let (index, network) = s.split_once('-').ok_or_else(invalid)?;
        Ok(Self::new(
            index.parse().map_err(|_| invalid())?,
            network.parse().map_err(|_| invalid())?,
        ))
    }
}

impl TryFrom<String> for AccountId {
    type Error = WalletError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("0-mainnet", 0, Network::Mainnet ; "first mainnet")]
    #[test_case("17-testnet", 17, Network::Testnet ; "testnet")]
    fn test_parse(raw: &str, index: u32, network: Network) {
        let id: AccountId = raw.parse().expect("parse");
        assert_eq!(id, AccountId::new(index, network));
        assert_eq!(id.to_string(), raw);
    }

    #[test_case("mainnet" ; "missing index")]
    #[test_case("x-mainnet" ; "bad index")]
    #[test_case("1-devnet" ; "bad network")]
    fn test_parse_rejects(raw: &str) {
        assert!(matches!(
            raw.parse::<AccountId>(),
            Err(WalletError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_serde_uses_text_form() {
        let id = AccountId::new(2, Network::Testnet);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"2-testnet\"");
    }
}

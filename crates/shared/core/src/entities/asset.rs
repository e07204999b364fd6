use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// The two instruments held in the ledger
///
/// `Fiat` is the quote currency prices are expressed in, `Stock` is the
/// traded base instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetId {
    Fiat,
    Stock,
}

impl AssetId {
    pub const ALL: [AssetId; 2] = [AssetId::Fiat, AssetId::Stock];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetId::Fiat => "FIAT",
            AssetId::Stock => "STOCK",
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIAT" => Ok(AssetId::Fiat),
            "STOCK" => Ok(AssetId::Stock),
            other => Err(ParseError::UnknownAsset(other.to_string())),
        }
    }
}

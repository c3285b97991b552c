use serde::{Deserialize, Serialize};

use crate::EngineError;

/// ISO-like currency code attached to every money value.
///
/// One ledger has a single *reporting* currency (the configured default), but
/// individual records may be tagged otherwise; reports exclude and flag those
/// instead of converting them.
///
/// ## Minor units
///
/// Monetary values are stored as an `i64` number of **minor units** (see
/// [`Money`]). `minor_units()` returns how many decimal digits are used when
/// converting between major units (human input/output, e.g. `10.50 CNY`) and
/// minor units (stored integers, e.g. `1050`). JPY has no minor unit.
///
/// [`Money`]: crate::Money
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Cny,
    Eur,
    Usd,
    Gbp,
    Jpy,
}

impl Currency {
    /// Canonical currency code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Cny => "CNY",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
        }
    }

    /// Number of fraction digits used when formatting/parsing amounts.
    #[must_use]
    pub const fn minor_units(self) -> u8 {
        match self {
            Currency::Jpy => 0,
            _ => 2,
        }
    }

    /// 10^minor_units, the factor between major and minor units.
    #[must_use]
    pub const fn minor_scale(self) -> i64 {
        match self.minor_units() {
            0 => 1,
            1 => 10,
            _ => 100,
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            // RMB is how the original data source frequently labels yuan.
            "CNY" | "RMB" => Ok(Currency::Cny),
            "EUR" => Ok(Currency::Eur),
            "USD" => Ok(Currency::Usd),
            "GBP" => Ok(Currency::Gbp),
            "JPY" => Ok(Currency::Jpy),
            other => Err(EngineError::CurrencyMismatch(format!(
                "unsupported currency: {other}"
            ))),
        }
    }
}

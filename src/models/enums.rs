use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(PaymentMethod {
    Yape => "yape",
    Plin => "plin",
    Transfer => "transfer",
    Card => "card",
    Cash => "cash",
});

impl PaymentMethod {
    /// All methods in the column order used by storage and CSV export.
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Yape,
        PaymentMethod::Plin,
        PaymentMethod::Transfer,
        PaymentMethod::Card,
        PaymentMethod::Cash,
    ];
}

str_enum!(ReportMetric {
    Amount => "amount",
    Utility => "utility",
});

impl Default for ReportMetric {
    fn default() -> Self {
        ReportMetric::Amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn payment_method_round_trip() {
        for (variant, s) in [
            (PaymentMethod::Yape, "yape"),
            (PaymentMethod::Plin, "plin"),
            (PaymentMethod::Transfer, "transfer"),
            (PaymentMethod::Card, "card"),
            (PaymentMethod::Cash, "cash"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(PaymentMethod::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn serde_name_matches_column_name() {
        for method in PaymentMethod::ALL {
            let json = serde_json::to_string(&method).unwrap();
            assert_eq!(json, format!("\"{}\"", method.as_str()));
        }
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(PaymentMethod::from_str("bitcoin").is_err());
        assert!(ReportMetric::from_str("").is_err());
    }
}

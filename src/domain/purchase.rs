use serde::{Deserialize, Serialize};

use super::{Kobo, format_naira, naira};

pub const AIRTIME_MIN: Kobo = naira(50);
pub const AIRTIME_MAX: Kobo = naira(50_000);
pub const ELECTRICITY_MIN: Kobo = naira(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mtn,
    Glo,
    Airtel,
    #[serde(rename = "9mobile")]
    NineMobile,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mtn => "mtn",
            Network::Glo => "glo",
            Network::Airtel => "airtel",
            Network::NineMobile => "9mobile",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mtn" => Some(Network::Mtn),
            "glo" => Some(Network::Glo),
            "airtel" => Some(Network::Airtel),
            "9mobile" | "etisalat" => Some(Network::NineMobile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TvProvider {
    Dstv,
    Gotv,
    Startimes,
    Showmax,
}

impl TvProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            TvProvider::Dstv => "dstv",
            TvProvider::Gotv => "gotv",
            TvProvider::Startimes => "startimes",
            TvProvider::Showmax => "showmax",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dstv" => Some(TvProvider::Dstv),
            "gotv" => Some(TvProvider::Gotv),
            "startimes" => Some(TvProvider::Startimes),
            "showmax" => Some(TvProvider::Showmax),
            _ => None,
        }
    }
}

/// Electricity distribution companies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Disco {
    IkejaElectric,
    EkoElectric,
    AbujaElectric,
    KanoElectric,
    PortharcourtElectric,
    IbadanElectric,
    KadunaElectric,
    JosElectric,
    EnuguElectric,
    BeninElectric,
}

impl Disco {
    pub const ALL: [Disco; 10] = [
        Disco::IkejaElectric,
        Disco::EkoElectric,
        Disco::AbujaElectric,
        Disco::KanoElectric,
        Disco::PortharcourtElectric,
        Disco::IbadanElectric,
        Disco::KadunaElectric,
        Disco::JosElectric,
        Disco::EnuguElectric,
        Disco::BeninElectric,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Disco::IkejaElectric => "ikeja-electric",
            Disco::EkoElectric => "eko-electric",
            Disco::AbujaElectric => "abuja-electric",
            Disco::KanoElectric => "kano-electric",
            Disco::PortharcourtElectric => "portharcourt-electric",
            Disco::IbadanElectric => "ibadan-electric",
            Disco::KadunaElectric => "kaduna-electric",
            Disco::JosElectric => "jos-electric",
            Disco::EnuguElectric => "enugu-electric",
            Disco::BeninElectric => "benin-electric",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.to_lowercase();
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterType {
    Prepaid,
    Postpaid,
}

impl MeterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeterType::Prepaid => "prepaid",
            MeterType::Postpaid => "postpaid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "prepaid" => Some(MeterType::Prepaid),
            "postpaid" => Some(MeterType::Postpaid),
            _ => None,
        }
    }
}

/// A product purchase paid for from the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "product", rename_all = "lowercase")]
pub enum PurchaseOrder {
    Airtime {
        network: Network,
        phone: String,
        amount: Kobo,
    },
    Data {
        network: Network,
        phone: String,
        plan_code: String,
        amount: Kobo,
    },
    Tv {
        provider: TvProvider,
        smartcard: String,
        bouquet: String,
        amount: Kobo,
    },
    Electricity {
        disco: Disco,
        meter_type: MeterType,
        meter_number: String,
        amount: Kobo,
    },
}

impl PurchaseOrder {
    pub fn product(&self) -> &'static str {
        match self {
            PurchaseOrder::Airtime { .. } => "airtime",
            PurchaseOrder::Data { .. } => "data",
            PurchaseOrder::Tv { .. } => "tv",
            PurchaseOrder::Electricity { .. } => "electricity",
        }
    }

    pub fn provider(&self) -> &'static str {
        match self {
            PurchaseOrder::Airtime { network, .. } | PurchaseOrder::Data { network, .. } => {
                network.as_str()
            }
            PurchaseOrder::Tv { provider, .. } => provider.as_str(),
            PurchaseOrder::Electricity { disco, .. } => disco.as_str(),
        }
    }

    /// Phone, smartcard or meter number the product is delivered to.
    pub fn recipient(&self) -> &str {
        match self {
            PurchaseOrder::Airtime { phone, .. } | PurchaseOrder::Data { phone, .. } => phone,
            PurchaseOrder::Tv { smartcard, .. } => smartcard,
            PurchaseOrder::Electricity { meter_number, .. } => meter_number,
        }
    }

    pub fn amount(&self) -> Kobo {
        match self {
            PurchaseOrder::Airtime { amount, .. }
            | PurchaseOrder::Data { amount, .. }
            | PurchaseOrder::Tv { amount, .. }
            | PurchaseOrder::Electricity { amount, .. } => *amount,
        }
    }

    /// Ledger reason for the wallet debit, e.g. "airtime:mtn:08031234567".
    pub fn reason(&self) -> String {
        format!("{}:{}:{}", self.product(), self.provider(), self.recipient())
    }

    /// Check product-specific input and return the order in canonical form
    /// (phone numbers normalised to the 11-digit local format).
    pub fn validated(self) -> Result<Self, OrderError> {
        match self {
            PurchaseOrder::Airtime {
                network,
                phone,
                amount,
            } => {
                if !(AIRTIME_MIN..=AIRTIME_MAX).contains(&amount) {
                    return Err(OrderError::AmountOutOfRange {
                        min: AIRTIME_MIN,
                        max: Some(AIRTIME_MAX),
                        actual: amount,
                    });
                }
                Ok(PurchaseOrder::Airtime {
                    network,
                    phone: normalize_phone(&phone)?,
                    amount,
                })
            }
            PurchaseOrder::Data {
                network,
                phone,
                plan_code,
                amount,
            } => {
                require_positive(amount)?;
                Ok(PurchaseOrder::Data {
                    network,
                    phone: normalize_phone(&phone)?,
                    plan_code: require_code("plan code", plan_code)?,
                    amount,
                })
            }
            PurchaseOrder::Tv {
                provider,
                smartcard,
                bouquet,
                amount,
            } => {
                require_positive(amount)?;
                Ok(PurchaseOrder::Tv {
                    provider,
                    smartcard: require_digits("smartcard number", &smartcard, 10..=12)?,
                    bouquet: require_code("bouquet", bouquet)?,
                    amount,
                })
            }
            PurchaseOrder::Electricity {
                disco,
                meter_type,
                meter_number,
                amount,
            } => {
                if amount < ELECTRICITY_MIN {
                    return Err(OrderError::AmountOutOfRange {
                        min: ELECTRICITY_MIN,
                        max: None,
                        actual: amount,
                    });
                }
                Ok(PurchaseOrder::Electricity {
                    disco,
                    meter_type,
                    meter_number: require_digits("meter number", &meter_number, 11..=13)?,
                    amount,
                })
            }
        }
    }
}

/// Normalise a Nigerian mobile number to its 11-digit local form.
/// Accepts "08031234567", "+2348031234567" and "2348031234567",
/// ignoring spaces and dashes.
pub fn normalize_phone(input: &str) -> Result<String, OrderError> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(OrderError::InvalidPhone(input.to_string()));
    }

    let local = match digits.len() {
        11 if digits.starts_with('0') => digits.to_string(),
        13 if digits.starts_with("234") => format!("0{}", &digits[3..]),
        _ => return Err(OrderError::InvalidPhone(input.to_string())),
    };

    // Mobile ranges are 070x, 080x, 081x, 090x, 091x
    match local.as_bytes()[1] {
        b'7' | b'8' | b'9' => Ok(local),
        _ => Err(OrderError::InvalidPhone(input.to_string())),
    }
}

fn require_positive(amount: Kobo) -> Result<(), OrderError> {
    if amount <= 0 {
        return Err(OrderError::AmountOutOfRange {
            min: 1,
            max: None,
            actual: amount,
        });
    }
    Ok(())
}

fn require_digits(
    field: &'static str,
    value: &str,
    len: std::ops::RangeInclusive<usize>,
) -> Result<String, OrderError> {
    let value = value.trim();
    if !len.contains(&value.len()) || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(OrderError::InvalidField {
            field,
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

fn require_code(field: &'static str, value: String) -> Result<String, OrderError> {
    let trimmed = value.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(OrderError::InvalidField { field, value });
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    InvalidPhone(String),
    InvalidField {
        field: &'static str,
        value: String,
    },
    AmountOutOfRange {
        min: Kobo,
        max: Option<Kobo>,
        actual: Kobo,
    },
}

impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderError::InvalidPhone(phone) => write!(f, "invalid phone number '{}'", phone),
            OrderError::InvalidField { field, value } => write!(f, "invalid {} '{}'", field, value),
            OrderError::AmountOutOfRange {
                min,
                max: Some(max),
                actual,
            } => write!(
                f,
                "amount {} must be between {} and {}",
                format_naira(*actual),
                format_naira(*min),
                format_naira(*max)
            ),
            OrderError::AmountOutOfRange {
                min,
                max: None,
                actual,
            } => write!(
                f,
                "amount {} is below the minimum of {}",
                format_naira(*actual),
                format_naira(*min)
            ),
        }
    }
}

impl std::error::Error for OrderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("08031234567").unwrap(), "08031234567");
        assert_eq!(normalize_phone("+2348031234567").unwrap(), "08031234567");
        assert_eq!(normalize_phone("234 803 123 4567").unwrap(), "08031234567");
        assert_eq!(normalize_phone("0803-123-4567").unwrap(), "08031234567");
        assert_eq!(normalize_phone("09121234567").unwrap(), "09121234567");
    }

    #[test]
    fn test_normalize_phone_rejects_bad_numbers() {
        assert!(normalize_phone("0803123456").is_err()); // too short
        assert!(normalize_phone("08031234567890").is_err());
        assert!(normalize_phone("01234567890").is_err()); // landline range
        assert!(normalize_phone("0803abc4567").is_err());
        assert!(normalize_phone("").is_err());
    }

    #[test]
    fn test_airtime_reason_uses_normalised_phone() {
        let order = PurchaseOrder::Airtime {
            network: Network::Mtn,
            phone: "+2348031234567".into(),
            amount: naira(100),
        }
        .validated()
        .unwrap();

        assert_eq!(order.reason(), "airtime:mtn:08031234567");
        assert_eq!(order.amount(), 10000);
    }

    #[test]
    fn test_airtime_amount_limits() {
        let order = |amount| PurchaseOrder::Airtime {
            network: Network::Glo,
            phone: "08051234567".into(),
            amount,
        };
        assert!(order(AIRTIME_MIN).validated().is_ok());
        assert!(order(AIRTIME_MAX).validated().is_ok());
        assert!(matches!(
            order(AIRTIME_MIN - 1).validated(),
            Err(OrderError::AmountOutOfRange { .. })
        ));
        assert!(order(AIRTIME_MAX + 1).validated().is_err());
    }

    #[test]
    fn test_electricity_validation() {
        let order = |meter: &str, amount| PurchaseOrder::Electricity {
            disco: Disco::IkejaElectric,
            meter_type: MeterType::Prepaid,
            meter_number: meter.into(),
            amount,
        };
        let ok = order(" 45012345678 ", naira(1000)).validated().unwrap();
        assert_eq!(ok.recipient(), "45012345678");
        assert_eq!(ok.reason(), "electricity:ikeja-electric:45012345678");

        assert!(order("4501234", naira(1000)).validated().is_err());
        assert!(order("45012345678", naira(499)).validated().is_err());
    }

    #[test]
    fn test_tv_and_data_require_codes() {
        let tv = PurchaseOrder::Tv {
            provider: TvProvider::Dstv,
            smartcard: "7012345678".into(),
            bouquet: " ".into(),
            amount: naira(5000),
        };
        assert!(matches!(
            tv.validated(),
            Err(OrderError::InvalidField { field: "bouquet", .. })
        ));

        let data = PurchaseOrder::Data {
            network: Network::Airtel,
            phone: "08021234567".into(),
            plan_code: "airt-1gb".into(),
            amount: 0,
        };
        assert!(data.validated().is_err());
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!(Network::from_str("9MOBILE"), Some(Network::NineMobile));
        assert_eq!(TvProvider::from_str("gotv"), Some(TvProvider::Gotv));
        assert_eq!(Disco::from_str("eko-electric"), Some(Disco::EkoElectric));
        assert_eq!(Disco::from_str("lagos"), None);
        assert_eq!(MeterType::from_str("Postpaid"), Some(MeterType::Postpaid));
    }
}

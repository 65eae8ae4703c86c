use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use amo_core::{CompanyId, DomainError, DomainResult, EmailAddress, Entity, UserId, ValueObject};

pub const TIN_FORMAT_MESSAGE: &str = "TIN number must be exactly 9 digits";

/// Tax identification number: exactly nine ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TinNumber(String);

impl TinNumber {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        if raw.len() == 9 && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(DomainError::validation(TIN_FORMAT_MESSAGE))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for TinNumber {}

impl core::fmt::Display for TinNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TinNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TinNumber> for String {
    fn from(value: TinNumber) -> Self {
        value.0
    }
}

/// Company fields as submitted by the applicant (unvalidated).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tin_number: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub sdc_id: String,
    #[serde(default)]
    pub mrc_number: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: CompanyId,
    pub user_id: UserId,
    pub name: String,
    pub tin_number: TinNumber,
    pub phone_number: String,
    pub email: String,
    pub address: String,
    pub sdc_id: String,
    pub mrc_number: String,
    pub size: Option<String>,
    pub industry: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn required(value: &str, label: &str) -> DomainResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{label} is required")));
    }
    Ok(value.to_string())
}

impl Company {
    /// Validate `details` into a new company owned by `owner`.
    ///
    /// The TIN format is checked first; uniqueness is the store's job.
    pub fn register(
        id: CompanyId,
        owner: UserId,
        details: &CompanyDetails,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let tin_number = TinNumber::parse(&details.tin_number)?;
        let name = required(&details.name, "Company name")?;
        let phone_number = required(&details.phone_number, "Phone number")?;
        let email = EmailAddress::parse(&required(&details.email, "Email")?)?;
        let address = required(&details.address, "Address")?;
        let sdc_id = required(&details.sdc_id, "SDC ID")?;
        let mrc_number = required(&details.mrc_number, "MRC number")?;

        Ok(Self {
            id,
            user_id: owner,
            name,
            tin_number,
            phone_number,
            email: email.into(),
            address,
            sdc_id,
            mrc_number,
            size: details.size.clone().filter(|s| !s.trim().is_empty()),
            industry: details.industry.clone().filter(|s| !s.trim().is_empty()),
            created_at,
        })
    }
}

impl Entity for Company {
    type Id = CompanyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn details(tin: &str) -> CompanyDetails {
        CompanyDetails {
            name: "Kigali Traders Ltd".into(),
            tin_number: tin.into(),
            phone_number: "0788123456".into(),
            email: "Info@KigaliTraders.rw".into(),
            address: "KN 3 Rd, Kigali".into(),
            sdc_id: "SDC010000123".into(),
            mrc_number: "MRC00012345".into(),
            size: None,
            industry: Some(" ".into()),
        }
    }

    #[test]
    fn register_valid_company() {
        let company = Company::register(CompanyId::new(), UserId::new(), &details("123456789"), Utc::now()).unwrap();
        assert_eq!(company.tin_number.as_str(), "123456789");
        assert_eq!(company.email, "info@kigalitraders.rw");
        assert_eq!(company.industry, None);
    }

    #[test]
    fn short_tin_is_rejected_with_message() {
        let err = Company::register(CompanyId::new(), UserId::new(), &details("12345"), Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), TIN_FORMAT_MESSAGE);
    }

    #[test]
    fn padded_tin_is_rejected_not_trimmed() {
        for tin in [" 123456789 ", "123456789\n", "\t123456789"] {
            let err = Company::register(CompanyId::new(), UserId::new(), &details(tin), Utc::now()).unwrap_err();
            assert_eq!(err.to_string(), TIN_FORMAT_MESSAGE, "{tin:?}");
        }
    }

    #[test]
    fn missing_field_is_named() {
        let mut d = details("123456789");
        d.sdc_id = "  ".into();
        let err = Company::register(CompanyId::new(), UserId::new(), &d, Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "SDC ID is required");
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        #[test]
        fn nine_digits_always_parse(tin in "[0-9]{9}") {
            let parsed = TinNumber::parse(&tin).unwrap();
            prop_assert_eq!(parsed.as_str(), tin.as_str());
        }

        #[test]
        fn wrong_length_digits_never_parse(tin in "[0-9]{0,8}|[0-9]{10,14}") {
            prop_assert!(TinNumber::parse(&tin).is_err());
        }

        #[test]
        fn any_non_digit_never_parses(prefix in "[0-9]{0,8}", bad in "[^0-9]", suffix in "[0-9]{0,8}") {
            let tin = format!("{prefix}{bad}{suffix}");
            prop_assert!(TinNumber::parse(&tin).is_err());
        }
    }
}

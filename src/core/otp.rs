//! One-time pickup codes.
//!
//! An OTP is a 4-digit numeric string. It only has to be unique among active
//! (`paid` or `printed`) orders; once an order is collected its code may be
//! handed out again.

use crate::{
    entities::{Order, order, order::OrderStatus},
    errors::{Error, Result},
};
use rand::Rng;
use sea_orm::{ConnectionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Number of digits in a pickup code
pub const OTP_LENGTH: usize = 4;

/// A validated 4-digit pickup code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Otp(String);

impl Otp {
    /// The code as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds a code from a number in `0..=9999`, zero-padded.
    #[must_use]
    pub fn from_number(n: u16) -> Self {
        Self(format!("{:04}", n % 10_000))
    }
}

impl FromStr for Otp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.len() == OTP_LENGTH && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(Error::InvalidOtp {
                code: s.to_string(),
            })
        }
    }
}

impl TryFrom<String> for Otp {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Otp> for String {
    fn from(otp: Otp) -> Self {
        otp.0
    }
}

impl fmt::Display for Otp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of candidate codes
pub trait OtpGenerator: Send + Sync {
    /// Produces the next candidate; uniqueness is checked by the caller.
    fn generate(&self) -> Otp;
}

/// Uniformly random codes in `1000..=9999`
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomOtpGenerator;

impl OtpGenerator for RandomOtpGenerator {
    fn generate(&self) -> Otp {
        Otp::from_number(rand::thread_rng().gen_range(1000..=9999))
    }
}

/// Finds the active order currently holding `otp`, if any.
pub async fn find_active_by_otp<C>(db: &C, otp: &Otp) -> Result<Option<order::Model>>
where
    C: ConnectionTrait,
{
    Order::find()
        .filter(order::Column::Otp.eq(otp.as_str()))
        .filter(order::Column::Status.is_in(OrderStatus::ACTIVE))
        .one(db)
        .await
        .map_err(Into::into)
}

/// `true` when no active order holds `otp`.
pub async fn is_available<C>(db: &C, otp: &Otp) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(find_active_by_otp(db, otp).await?.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_parse_valid_codes() {
        assert!("0042".parse::<Otp>().is_ok());
        assert_eq!(" 1234 ".parse::<Otp>().map(|o| o.to_string()).ok(), Some("1234".to_string()));
    }

    #[test]
    fn test_parse_rejects_malformed_codes() {
        for bad in ["", "123", "12345", "12a4", "١٢٣٤"] {
            assert!(
                matches!(bad.parse::<Otp>(), Err(Error::InvalidOtp { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_random_codes_are_four_digits() {
        let generator = RandomOtpGenerator;
        for _ in 0..200 {
            let otp = generator.generate();
            assert_eq!(otp.as_str().len(), OTP_LENGTH);
            let n: u16 = otp.as_str().parse().unwrap_or_default();
            assert!((1000..=9999).contains(&n));
        }
    }

    #[test]
    fn test_from_number_pads() {
        assert_eq!(Otp::from_number(7).as_str(), "0007");
    }

    #[tokio::test]
    async fn test_collected_orders_release_their_code() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_order_with_otp(&db, "student-1", "4321").await?;
        let otp: Otp = "4321".parse()?;

        assert!(!is_available(&db, &otp).await?);

        set_status_directly(&db, order.id, OrderStatus::Collected).await?;
        assert!(is_available(&db, &otp).await?);
        Ok(())
    }
}

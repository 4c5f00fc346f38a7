//! Currency-tagged decimal amounts.
//!
//! All payment sufficiency is judged in the quotation's currency; mixing
//! currencies is rejected at the boundary rather than coerced.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use super::error::LifecycleError;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    #[n(0)]
    PHP,
    #[n(1)]
    USD,
    #[n(2)]
    EUR,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Currency::PHP => "PHP",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
        };
        write!(f, "{code}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Commercial rounding to two decimal places, midpoint away from zero.
    pub fn rounded(&self) -> Self {
        Self::new(
            self.amount
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            self.currency,
        )
    }

    /// Fails with `Validation` when `other` is denominated differently.
    pub fn ensure_same_currency(&self, other: &Money) -> Result<(), LifecycleError> {
        if self.currency != other.currency {
            return Err(LifecycleError::Validation(format!(
                "currency mismatch: {} vs {}",
                self.currency, other.currency
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

impl<C> minicbor::Encode<C> for Money {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        e.str(&self.amount.to_string())?;
        self.currency.encode(e, ctx)
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Money {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        if d.array()? != Some(2) {
            return Err(minicbor::decode::Error::message(
                "expected a two element money array",
            ));
        }
        let amount = Decimal::from_str(d.str()?)
            .map_err(|_| minicbor::decode::Error::message("invalid decimal amount"))?;
        let currency = Currency::decode(d, ctx)?;

        Ok(Money { amount, currency })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn money_encoding() {
        let original = Money::new(dec!(1234.56), Currency::PHP);

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: Money = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn rounding_is_midpoint_away_from_zero() {
        let half_centavo = Money::new(dec!(10.005), Currency::PHP);
        assert_eq!(half_centavo.rounded().amount, dec!(10.01));
    }

    #[test]
    fn currency_mismatch_is_rejected() {
        let php = Money::new(dec!(100), Currency::PHP);
        let usd = Money::new(dec!(100), Currency::USD);

        assert!(php.ensure_same_currency(&usd).is_err());
        assert!(php.ensure_same_currency(&php).is_ok());
    }
}

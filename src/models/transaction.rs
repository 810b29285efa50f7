use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Market, RecordId};
use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Buy,
    Sell,
    CashDeposit,
    CashWithdraw,
    Dividend,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 5] = [
        TransactionKind::Buy,
        TransactionKind::Sell,
        TransactionKind::CashDeposit,
        TransactionKind::CashWithdraw,
        TransactionKind::Dividend,
    ];

    /// BUY and SELL move shares; every other kind only moves cash.
    pub fn is_trade(&self) -> bool {
        matches!(self, TransactionKind::Buy | TransactionKind::Sell)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Buy => "BUY",
            TransactionKind::Sell => "SELL",
            TransactionKind::CashDeposit => "CASH_DEPOSIT",
            TransactionKind::CashWithdraw => "CASH_WITHDRAW",
            TransactionKind::Dividend => "DIVIDEND",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "BUY" => Ok(TransactionKind::Buy),
            "SELL" => Ok(TransactionKind::Sell),
            "CASH_DEPOSIT" | "DEPOSIT" => Ok(TransactionKind::CashDeposit),
            "CASH_WITHDRAW" | "WITHDRAW" | "WITHDRAWAL" => Ok(TransactionKind::CashWithdraw),
            "DIVIDEND" => Ok(TransactionKind::Dividend),
            _ => Err(LedgerError::validation(format!(
                "unknown transaction kind '{}'",
                s.trim()
            ))),
        }
    }
}

/// A persisted ledger row. Immutable once written; corrections are a delete
/// followed by a new append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: RecordId,
    pub date: NaiveDate,
    pub portfolio: String,
    /// Normalized ticker. Absent for deposits and withdrawals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default)]
    pub market: Market,
    pub kind: TransactionKind,
    /// Shares for trades, monetary amount for cash kinds. Never negative.
    pub quantity: Decimal,
    pub price: Decimal,
    pub currency: String,
    #[serde(default)]
    pub fee: Decimal,
}

impl TransactionRecord {
    /// Share delta: `+quantity` for BUY, `-quantity` for SELL, zero otherwise.
    pub fn signed_quantity(&self) -> Decimal {
        match self.kind {
            TransactionKind::Buy => self.quantity,
            TransactionKind::Sell => -self.quantity,
            _ => Decimal::ZERO,
        }
    }

    /// Cash impact in the record's currency, fees included.
    pub fn cash_flow(&self) -> Decimal {
        let gross = match self.kind {
            TransactionKind::Buy => -(self.quantity * self.price),
            TransactionKind::Sell => self.quantity * self.price,
            TransactionKind::CashDeposit | TransactionKind::Dividend => self.quantity,
            TransactionKind::CashWithdraw => -self.quantity,
        };
        gross - self.fee
    }

    pub fn ticker_str(&self) -> &str {
        self.ticker.as_deref().unwrap_or("")
    }
}

/// A transaction as submitted for appending. Validated and normalized by
/// [`NewTransaction::validate`] before it becomes a [`TransactionRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub portfolio: String,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub market: Market,
    pub kind: TransactionKind,
    pub quantity: Decimal,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    /// `None` means "use the configured default fee".
    #[serde(default)]
    pub fee: Option<Decimal>,
}

impl NewTransaction {
    fn trade(
        kind: TransactionKind,
        date: NaiveDate,
        portfolio: impl Into<String>,
        ticker: impl Into<String>,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            date,
            portfolio: portfolio.into(),
            ticker: Some(ticker.into()),
            market: Market::Us,
            kind,
            quantity,
            price,
            currency: None,
            fee: None,
        }
    }

    fn cash(
        kind: TransactionKind,
        date: NaiveDate,
        portfolio: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            date,
            portfolio: portfolio.into(),
            ticker: None,
            market: Market::Us,
            kind,
            quantity: amount,
            price: Decimal::ONE,
            currency: Some(currency.into()),
            fee: None,
        }
    }

    pub fn buy(
        date: NaiveDate,
        portfolio: impl Into<String>,
        ticker: impl Into<String>,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self::trade(TransactionKind::Buy, date, portfolio, ticker, quantity, price)
    }

    pub fn sell(
        date: NaiveDate,
        portfolio: impl Into<String>,
        ticker: impl Into<String>,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self::trade(TransactionKind::Sell, date, portfolio, ticker, quantity, price)
    }

    pub fn deposit(
        date: NaiveDate,
        portfolio: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self::cash(TransactionKind::CashDeposit, date, portfolio, amount, currency)
    }

    pub fn withdraw(
        date: NaiveDate,
        portfolio: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self::cash(TransactionKind::CashWithdraw, date, portfolio, amount, currency)
    }

    /// A manually entered dividend credit for `ticker`.
    pub fn dividend(
        date: NaiveDate,
        portfolio: impl Into<String>,
        ticker: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        let mut tx = Self::cash(TransactionKind::Dividend, date, portfolio, amount, currency);
        tx.ticker = Some(ticker.into());
        tx
    }

    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn with_market(mut self, market: Market) -> Self {
        self.market = market;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Check field rules and return the normalized form: ticker suffixed and
    /// uppercased, currency uppercased (defaulting from the market), cash kinds
    /// priced at 1, missing fee set to zero.
    pub fn validate(mut self) -> Result<Self, LedgerError> {
        self.portfolio = self.portfolio.trim().to_string();
        if self.portfolio.is_empty() {
            return Err(LedgerError::validation("portfolio must not be empty"));
        }

        let ticker = self
            .ticker
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| self.market.normalize_ticker(t));

        match self.kind {
            TransactionKind::Buy | TransactionKind::Sell => {
                if ticker.is_none() {
                    return Err(LedgerError::validation(format!(
                        "{} requires a ticker",
                        self.kind
                    )));
                }
                if self.quantity <= Decimal::ZERO {
                    return Err(LedgerError::validation(format!(
                        "{} quantity must be positive (got {})",
                        self.kind, self.quantity
                    )));
                }
                if self.price < Decimal::ZERO {
                    return Err(LedgerError::validation(format!(
                        "price must not be negative (got {})",
                        self.price
                    )));
                }
                self.ticker = ticker;
            }
            TransactionKind::CashDeposit | TransactionKind::CashWithdraw => {
                if self.quantity < Decimal::ZERO {
                    return Err(LedgerError::validation(format!(
                        "{} amount must not be negative (got {})",
                        self.kind, self.quantity
                    )));
                }
                self.ticker = None;
                self.price = Decimal::ONE;
            }
            TransactionKind::Dividend => {
                if self.quantity < Decimal::ZERO {
                    return Err(LedgerError::validation(format!(
                        "dividend amount must not be negative (got {})",
                        self.quantity
                    )));
                }
                self.ticker = ticker;
                self.price = Decimal::ONE;
            }
        }

        let fee = self.fee.unwrap_or(Decimal::ZERO);
        if fee < Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "fee must not be negative (got {fee})"
            )));
        }
        self.fee = Some(fee);

        let currency = match self.currency.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c.to_uppercase(),
            _ => self.market.default_currency().to_string(),
        };
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LedgerError::validation(format!(
                "currency must be a three-letter code (got '{currency}')"
            )));
        }
        self.currency = Some(currency);

        Ok(self)
    }

    /// Validate and stamp with the ledger-assigned id.
    pub fn into_record(self, id: RecordId) -> Result<TransactionRecord, LedgerError> {
        let tx = self.validate()?;
        Ok(TransactionRecord {
            id,
            date: tx.date,
            portfolio: tx.portfolio,
            ticker: tx.ticker,
            market: tx.market,
            kind: tx.kind,
            quantity: tx.quantity,
            price: tx.price,
            currency: tx.currency.unwrap_or_default(),
            fee: tx.fee.unwrap_or_default(),
        })
    }
}

/// Loosely-typed input as it arrives from a form or the command line.
/// Converting it parses every field, so bad dates, kinds and numbers surface as
/// validation errors instead of panics.
#[derive(Debug, Clone, Default)]
pub struct RawTransaction {
    pub date: String,
    pub portfolio: String,
    pub ticker: Option<String>,
    pub market: Option<String>,
    pub kind: String,
    pub quantity: String,
    pub price: Option<String>,
    pub currency: Option<String>,
    pub fee: Option<String>,
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, LedgerError> {
    Decimal::from_str(value.trim())
        .map_err(|_| LedgerError::validation(format!("{field} is not a number: '{value}'")))
}

impl TryFrom<RawTransaction> for NewTransaction {
    type Error = LedgerError;

    fn try_from(raw: RawTransaction) -> Result<Self, Self::Error> {
        let date = NaiveDate::parse_from_str(raw.date.trim(), "%Y-%m-%d").map_err(|_| {
            LedgerError::validation(format!("invalid date '{}' (expected YYYY-MM-DD)", raw.date))
        })?;
        let kind: TransactionKind = raw.kind.parse()?;
        let market = match raw.market.as_deref() {
            Some(m) => m.parse()?,
            None => raw
                .ticker
                .as_deref()
                .map(Market::from_ticker)
                .unwrap_or_default(),
        };
        let quantity = parse_decimal("quantity", &raw.quantity)?;
        let price = match raw.price.as_deref() {
            Some(p) => parse_decimal("price", p)?,
            None if kind.is_trade() => {
                return Err(LedgerError::validation(format!("{kind} requires a price")))
            }
            None => Decimal::ONE,
        };
        let fee = raw
            .fee
            .as_deref()
            .map(|f| parse_decimal("fee", f))
            .transpose()?;

        Ok(NewTransaction {
            date,
            portfolio: raw.portfolio,
            ticker: raw.ticker,
            market,
            kind,
            quantity,
            price,
            currency: raw.currency,
            fee,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
    }

    #[test]
    fn test_kind_parses_case_insensitively() {
        assert_eq!("buy".parse::<TransactionKind>().unwrap(), TransactionKind::Buy);
        assert_eq!(
            "cash-withdraw".parse::<TransactionKind>().unwrap(),
            TransactionKind::CashWithdraw
        );
        assert!(matches!(
            "SHORT".parse::<TransactionKind>(),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&TransactionKind::CashDeposit).unwrap();
        assert_eq!(json, "\"CASH_DEPOSIT\"");
    }

    #[test]
    fn test_trade_requires_positive_quantity() {
        let err = NewTransaction::buy(day(1), "Test", "AAPL", Decimal::ZERO, d("150"))
            .validate()
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = NewTransaction::sell(day(1), "Test", "AAPL", d("-1"), d("150"))
            .validate()
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_trade_requires_ticker() {
        let mut tx = NewTransaction::buy(day(1), "Test", "  ", d("1"), d("10"));
        assert!(tx.clone().validate().is_err());
        tx.ticker = None;
        assert!(tx.validate().is_err());
    }

    #[test]
    fn test_validate_normalizes_ticker_and_currency() {
        let tx = NewTransaction::buy(day(1), " Test ", "ry", d("5"), d("130"))
            .with_market(Market::Tsx)
            .validate()
            .unwrap();
        assert_eq!(tx.portfolio, "Test");
        assert_eq!(tx.ticker.as_deref(), Some("RY.TO"));
        assert_eq!(tx.currency.as_deref(), Some("CAD"));
        assert_eq!(tx.fee, Some(Decimal::ZERO));
    }

    #[test]
    fn test_validate_rejects_bad_currency_and_negative_fee() {
        let bad_currency = NewTransaction::deposit(day(1), "Test", d("100"), "US");
        assert!(bad_currency.validate().is_err());

        let negative_fee =
            NewTransaction::buy(day(1), "Test", "AAPL", d("1"), d("1")).with_fee(d("-0.5"));
        assert!(negative_fee.validate().is_err());
    }

    #[test]
    fn test_cash_kinds_fix_price_to_one_and_drop_ticker() {
        let mut tx = NewTransaction::withdraw(day(2), "Test", d("250"), "usd");
        tx.price = d("99");
        tx.ticker = Some("AAPL".to_string());
        let record = tx.into_record(RecordId::new(1)).unwrap();
        assert_eq!(record.price, Decimal::ONE);
        assert_eq!(record.ticker, None);
        assert_eq!(record.currency, "USD");
    }

    #[test]
    fn test_signed_quantity_and_cash_flow() {
        let buy = NewTransaction::buy(day(1), "Test", "AAPL", d("10"), d("150"))
            .with_fee(d("1"))
            .into_record(RecordId::new(1))
            .unwrap();
        assert_eq!(buy.signed_quantity(), d("10"));
        assert_eq!(buy.cash_flow(), d("-1501"));

        let sell = NewTransaction::sell(day(2), "Test", "AAPL", d("4"), d("160"))
            .with_fee(d("1"))
            .into_record(RecordId::new(2))
            .unwrap();
        assert_eq!(sell.signed_quantity(), d("-4"));
        assert_eq!(sell.cash_flow(), d("639"));

        let dividend = NewTransaction::dividend(day(3), "Test", "AAPL", d("6"), "USD")
            .into_record(RecordId::new(3))
            .unwrap();
        assert_eq!(dividend.signed_quantity(), Decimal::ZERO);
        assert_eq!(dividend.cash_flow(), d("6"));
    }

    #[test]
    fn test_raw_transaction_reports_parse_errors() {
        let raw = RawTransaction {
            date: "2024-02-30".to_string(),
            portfolio: "Test".to_string(),
            kind: "BUY".to_string(),
            quantity: "1".to_string(),
            price: Some("10".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            NewTransaction::try_from(raw),
            Err(LedgerError::Validation(_))
        ));

        let raw = RawTransaction {
            date: "2024-02-01".to_string(),
            portfolio: "Test".to_string(),
            ticker: Some("shop.to".to_string()),
            kind: "buy".to_string(),
            quantity: "3".to_string(),
            price: Some("100.5".to_string()),
            ..Default::default()
        };
        let tx = NewTransaction::try_from(raw).unwrap().validate().unwrap();
        assert_eq!(tx.market, Market::Tsx);
        assert_eq!(tx.ticker.as_deref(), Some("SHOP.TO"));
        assert_eq!(tx.price, d("100.5"));
    }
}

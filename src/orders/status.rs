//! Order status state machine.
//!
//! ```text
//! pending   -> paid | cancelled | shipped (cash on delivery only)
//! paid      -> shipped | cancelled
//! shipped   -> delivered
//! delivered, cancelled: terminal
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    #[default]
    Cod,
    Upi,
    Debit,
    Credit,
}

impl PaymentMethod {
    /// Cash on delivery is settled at the door; every other method is settled up front.
    pub fn initial_status(self) -> OrderStatus {
        match self {
            PaymentMethod::Cod => OrderStatus::Pending,
            _ => OrderStatus::Paid,
        }
    }

    pub fn is_prepaid(self) -> bool {
        self != PaymentMethod::Cod
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn can_transition(self, to: OrderStatus, method: PaymentMethod) -> bool {
        use OrderStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (self, to) {
            (Pending, Paid) | (Pending, Cancelled) => true,
            (Pending, Shipped) => method == PaymentMethod::Cod,
            (Paid, Shipped) | (Paid, Cancelled) => true,
            (Shipped, Delivered) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownPaymentMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COD" => Ok(PaymentMethod::Cod),
            "UPI" => Ok(PaymentMethod::Upi),
            "DEBIT" => Ok(PaymentMethod::Debit),
            "CREDIT" => Ok(PaymentMethod::Credit),
            _ => Err(UnknownPaymentMethod(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown payment method: {0}")]
pub struct UnknownPaymentMethod(pub String);

use serde::{Deserialize, Serialize};

/// Callback fields posted by the checkout widget after a successful payment.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentOrderRequest {
    /// Rupees.
    pub amount: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfigResponse {
    pub key_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Rupees to paise, rejecting non-positive and non-finite amounts.
pub fn to_paise(amount: f64) -> Option<i64> {
    if !amount.is_finite() || amount <= 0.0 {
        return None;
    }
    Some((amount * 100.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rupees_convert_to_rounded_paise() {
        assert_eq!(to_paise(499.0), Some(49_900));
        assert_eq!(to_paise(19.999), Some(2_000));
        assert_eq!(to_paise(0.01), Some(1));
    }

    #[test]
    fn invalid_amounts_are_rejected() {
        assert_eq!(to_paise(0.0), None);
        assert_eq!(to_paise(-10.0), None);
        assert_eq!(to_paise(f64::INFINITY), None);
        assert_eq!(to_paise(f64::NAN), None);
    }
}

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Razorpay credentials. Both halves must be present for the gateway to be enabled.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    pub api_base: String,
}

impl PaymentConfig {
    pub fn is_configured(&self) -> bool {
        self.key_id.is_some() && self.key_secret.is_some()
    }
}

/// Account seeded on startup when it does not exist yet.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub payment: PaymentConfig,
    pub admin: Option<AdminSeed>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            get("DATABASE_URL").ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
        let jwt = JwtConfig {
            secret: get("JWT_SECRET").ok_or_else(|| anyhow::anyhow!("JWT_SECRET is not set"))?,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "storefront".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "storefront-users".into()),
            ttl_minutes: get("JWT_TTL_MINUTES")
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
        };
        let payment = PaymentConfig {
            key_id: get("RAZORPAY_KEY_ID").filter(|v| !v.is_empty()),
            key_secret: get("RAZORPAY_KEY_SECRET").filter(|v| !v.is_empty()),
            api_base: get("RAZORPAY_API_BASE")
                .unwrap_or_else(|| "https://api.razorpay.com".into()),
        };
        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email,
                password,
                name: get("ADMIN_NAME").unwrap_or_else(|| "Admin".into()),
            }),
            _ => None,
        };
        Ok(Self {
            database_url,
            jwt,
            payment,
            admin,
        })
    }
}

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub cookie_expire_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub starttls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub frontend_url: String,
    pub otp_ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub media: MediaConfig,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: env_or("JWT_ISSUER", "bookworm"),
            audience: env_or("JWT_AUDIENCE", "bookworm-users"),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60 * 24 * 3),
            cookie_expire_days: env_parse("COOKIE_EXPIRE_DAYS", 3),
        };
        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST")?,
            port: env_parse("SMTP_PORT", 465),
            username: env_or("SMTP_USERNAME", ""),
            password: env_or("SMTP_PASSWORD", ""),
            from_email: std::env::var("SMTP_FROM_EMAIL")?,
            from_name: env_or("SMTP_FROM_NAME", "Bookworm Library"),
            starttls: env_parse("SMTP_STARTTLS", false),
        };
        let endpoint = std::env::var("MEDIA_ENDPOINT")?;
        let bucket = std::env::var("MEDIA_BUCKET")?;
        let media = MediaConfig {
            public_url: std::env::var("MEDIA_PUBLIC_URL")
                .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket)),
            endpoint,
            bucket,
            access_key: std::env::var("MEDIA_ACCESS_KEY")?,
            secret_key: std::env::var("MEDIA_SECRET_KEY")?,
            region: env_or("MEDIA_REGION", "us-east-1"),
        };
        Ok(Self {
            database_url,
            frontend_url: env_or("FRONTEND_URL", "http://localhost:5173"),
            otp_ttl_minutes: env_parse("OTP_TTL_MINUTES", 15),
            reset_ttl_minutes: env_parse("RESET_TTL_MINUTES", 15),
            jwt,
            smtp,
            media,
        })
    }
}

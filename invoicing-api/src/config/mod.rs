use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub smtp: SmtpConfig,
    pub gateway: GatewayConfig,
    pub push: PushConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
    pub login_attempts_per_window: u32,
    pub login_window_seconds: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    pub from_email: String,
    pub from_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct PushConfig {
    pub enabled: bool,
    pub api_url: String,
    pub project_id: String,
    pub api_key: Secret<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StorageConfig {
    /// "local" or "s3"
    pub backend: String,
    pub local_path: String,
    pub s3_bucket: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct UploadConfig {
    pub max_file_bytes: usize,
    pub batch_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("INVOICING_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("INVOICING_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let db_url = env::var("INVOICING_DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("INVOICING_DATABASE_URL must be set"))?;
        let max_connections = env::var("INVOICING_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("INVOICING_DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let jwt_secret =
            env::var("INVOICING_JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string());
        let access_token_expiry_minutes = env::var("INVOICING_ACCESS_TOKEN_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "15".to_string())
            .parse()?;
        let refresh_token_expiry_days = env::var("INVOICING_REFRESH_TOKEN_EXPIRY_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()?;
        let login_attempts_per_window = env::var("INVOICING_LOGIN_ATTEMPTS_PER_WINDOW")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let login_window_seconds = env::var("INVOICING_LOGIN_WINDOW_SECONDS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()?;

        let smtp_enabled = env::var("INVOICING_SMTP_ENABLED")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);
        let smtp_host = env::var("INVOICING_SMTP_HOST").unwrap_or_else(|_| "localhost".to_string());
        let smtp_port = env::var("INVOICING_SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse()?;
        let smtp_user = env::var("INVOICING_SMTP_USER").unwrap_or_default();
        let smtp_password = env::var("INVOICING_SMTP_PASSWORD").unwrap_or_default();
        let from_email = env::var("INVOICING_SMTP_FROM_EMAIL")
            .unwrap_or_else(|_| "billing@example.com".to_string());
        let from_name =
            env::var("INVOICING_SMTP_FROM_NAME").unwrap_or_else(|_| "Invoicing".to_string());

        let gateway_key_id = env::var("INVOICING_GATEWAY_KEY_ID").unwrap_or_default();
        let gateway_key_secret = env::var("INVOICING_GATEWAY_KEY_SECRET").unwrap_or_default();
        let gateway_webhook_secret =
            env::var("INVOICING_GATEWAY_WEBHOOK_SECRET").unwrap_or_default();
        let gateway_api_base_url = env::var("INVOICING_GATEWAY_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.paylink.example/v1".to_string());

        let push_enabled = env::var("INVOICING_PUSH_ENABLED")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);
        let push_api_url = env::var("INVOICING_PUSH_API_URL")
            .unwrap_or_else(|_| "https://fcm.googleapis.com/v1/projects".to_string());
        let push_project_id = env::var("INVOICING_PUSH_PROJECT_ID").unwrap_or_default();
        let push_api_key = env::var("INVOICING_PUSH_API_KEY").unwrap_or_default();

        let storage_backend =
            env::var("INVOICING_STORAGE_BACKEND").unwrap_or_else(|_| "local".to_string());
        let storage_local_path =
            env::var("INVOICING_STORAGE_LOCAL_PATH").unwrap_or_else(|_| "./storage".to_string());
        let storage_s3_bucket = env::var("INVOICING_STORAGE_S3_BUCKET").unwrap_or_default();

        let max_file_bytes = env::var("INVOICING_UPLOAD_MAX_FILE_BYTES")
            .unwrap_or_else(|_| format!("{}", 10 * 1024 * 1024))
            .parse()?;
        let batch_size = env::var("INVOICING_UPLOAD_BATCH_SIZE")
            .unwrap_or_else(|_| "100".to_string())
            .parse()?;

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(jwt_secret),
                access_token_expiry_minutes,
                refresh_token_expiry_days,
                login_attempts_per_window,
                login_window_seconds,
            },
            smtp: SmtpConfig {
                enabled: smtp_enabled,
                host: smtp_host,
                port: smtp_port,
                user: smtp_user,
                password: Secret::new(smtp_password),
                from_email,
                from_name,
            },
            gateway: GatewayConfig {
                key_id: gateway_key_id,
                key_secret: Secret::new(gateway_key_secret),
                webhook_secret: Secret::new(gateway_webhook_secret),
                api_base_url: gateway_api_base_url,
            },
            push: PushConfig {
                enabled: push_enabled,
                api_url: push_api_url,
                project_id: push_project_id,
                api_key: Secret::new(push_api_key),
            },
            storage: StorageConfig {
                backend: storage_backend,
                local_path: storage_local_path,
                s3_bucket: storage_s3_bucket,
            },
            upload: UploadConfig {
                max_file_bytes,
                batch_size,
            },
            service_name: "invoicing-api".to_string(),
        })
    }
}

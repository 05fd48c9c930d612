// src/services/email.rs
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sesv2::config::{Credentials, Region};
use aws_sdk_sesv2::types::{Body as SesBody, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;
use std::env;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::common::helpers::{escape_html, safe_email_log};

pub const VERIFICATION_SUBJECT: &str = "Verify your email address";

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email delivery not configured")]
    NotConfigured,

    #[error("SES operation failed: {0}")]
    SESError(String),
}

/// Outbound mail used by the auth flows
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_verification_email(
        &self,
        to: &str,
        name: &str,
        link: &str,
    ) -> Result<(), EmailError>;
}

pub fn generate_verification_email(name: &str, link: &str) -> String {
    let name = escape_html(name);
    let link = escape_html(link);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .header {{ background-color: #4F46E5; color: white; padding: 20px; text-align: center; }}
        .content {{ padding: 20px; background-color: #f9f9f9; }}
        .footer {{ padding: 20px; text-align: center; font-size: 12px; color: #666; }}
        .button {{ display: inline-block; padding: 12px 24px; background-color: #4F46E5; color: white; text-decoration: none; border-radius: 5px; margin: 10px 0; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>Confirm your email</h1>
        </div>
        <div class="content">
            <p>Hi {},</p>

            <p>Please confirm your email address by clicking the button below. The link is valid for 24 hours.</p>

            <p><a class="button" href="{}">Verify email</a></p>

            <p>If the button doesn't work, copy this link into your browser:<br>{}</p>
        </div>
        <div class="footer">
            <p>If you didn't create an account you can ignore this message.</p>
        </div>
    </div>
</body>
</html>"#,
        name, link, link
    )
}

#[derive(Debug, Clone)]
struct SesSettings {
    from_email: String,
    region: String,
    credentials: Option<(String, String)>,
}

/// SES-backed sender. Without `AWS_SES_FROM_EMAIL` every send fails with
/// `NotConfigured`.
#[derive(Debug, Clone)]
pub struct SesEmailSender {
    inner: Option<(SesClient, String)>,
}

impl SesEmailSender {
    pub async fn from_env() -> Self {
        let Some(settings) = Self::settings_from_env() else {
            warn!("AWS_SES_FROM_EMAIL not set - verification emails will not be delivered");
            return Self { inner: None };
        };

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(settings.region.clone()));

        if let Some((key_id, secret)) = &settings.credentials {
            loader = loader.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "environment",
            ));
        }

        let aws_config = loader.load().await;
        info!(region = %settings.region, "SES email sender initialized");

        Self {
            inner: Some((SesClient::new(&aws_config), settings.from_email)),
        }
    }

    fn settings_from_env() -> Option<SesSettings> {
        let from_email = env::var("AWS_SES_FROM_EMAIL").ok().filter(|v| !v.is_empty())?;
        let region = env::var("AWS_SES_REGION")
            .or_else(|_| env::var("AWS_REGION"))
            .unwrap_or_else(|_| "us-east-1".to_string());
        let credentials = match (
            env::var("AWS_ACCESS_KEY_ID"),
            env::var("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Ok(id), Ok(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
            _ => None,
        };

        Some(SesSettings {
            from_email,
            region,
            credentials,
        })
    }
}

#[async_trait]
impl EmailSender for SesEmailSender {
    async fn send_verification_email(
        &self,
        to: &str,
        name: &str,
        link: &str,
    ) -> Result<(), EmailError> {
        let (client, from_email) = self.inner.as_ref().ok_or(EmailError::NotConfigured)?;

        let destination = Destination::builder().to_addresses(to).build();

        let subject_content = Content::builder()
            .data(VERIFICATION_SUBJECT)
            .charset("UTF-8")
            .build()
            .map_err(|e| EmailError::SESError(format!("Failed to build subject: {}", e)))?;

        let body_content = Content::builder()
            .data(generate_verification_email(name, link))
            .charset("UTF-8")
            .build()
            .map_err(|e| EmailError::SESError(format!("Failed to build body: {}", e)))?;

        let message = Message::builder()
            .subject(subject_content)
            .body(SesBody::builder().html(body_content).build())
            .build();

        let result = client
            .send_email()
            .from_email_address(from_email)
            .destination(destination)
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, to = %safe_email_log(to), "Failed to send verification email via SES");
                EmailError::SESError(format!("Send failed: {}", e))
            })?;

        info!(
            to = %safe_email_log(to),
            message_id = ?result.message_id(),
            "Verification email sent"
        );

        Ok(())
    }
}

//! Delivery Service: sends composed reports via SMTP.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as LettreAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;
use std::sync::Arc;

use secreport_core::config::MailConfig;
use secreport_core::schedule::split_recipients;
use secreport_core::{ConfigStore, Result, SecReportError, SMTP_CONFIG_KEY, TransportConfig};

/// Branding images embedded in every message when present in the asset directory.
pub const TEMPLATE_IMAGES: [&str; 2] = ["topo_report.png", "footer_email.jpg"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    /// Set for inline parts referenced from the HTML as `cid:<id>`.
    pub content_id: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Regular attachment read from `path`, presented as `filename`.
    pub async fn from_path(path: &Path, filename: impl Into<String>) -> Result<Self> {
        let filename = filename.into();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self {
            content_type: content_type_for(&filename).to_string(),
            filename,
            content_id: None,
            bytes,
        })
    }

    /// Inline part whose content id is its file name.
    pub async fn inline_from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self {
            content_type: content_type_for(&name).to_string(),
            content_id: Some(name.clone()),
            filename: name,
            bytes,
        })
    }
}

fn content_type_for(filename: &str) -> &'static str {
    let ext = filename.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}

/// A fully resolved message, ready for a transport.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, transport: &TransportConfig, mail: &OutgoingMail) -> Result<()>;
}

/// Build the MIME tree: `mixed[ related[html, inline images...], attachments... ]`.
pub fn build_message(mail: &OutgoingMail) -> Result<Message> {
    let from: Mailbox = mail
        .from
        .parse()
        .map_err(|e| SecReportError::Delivery(format!("Invalid from '{}': {e}", mail.from)))?;
    let mut builder = Message::builder().from(from).subject(mail.subject.clone());
    for to in &mail.to {
        let mailbox: Mailbox = to
            .parse()
            .map_err(|e| SecReportError::Delivery(format!("Invalid to '{to}': {e}")))?;
        builder = builder.to(mailbox);
    }

    let mut related = MultiPart::related().singlepart(SinglePart::html(mail.html.clone()));
    let mut files = Vec::new();
    for att in &mail.attachments {
        let content_type = ContentType::parse(&att.content_type).map_err(|e| {
            SecReportError::Delivery(format!("Invalid content type for {}: {e}", att.filename))
        })?;
        match &att.content_id {
            Some(cid) => {
                related = related.singlepart(
                    LettreAttachment::new_inline(cid.clone()).body(att.bytes.clone(), content_type),
                );
            }
            None => files.push(
                LettreAttachment::new(att.filename.clone()).body(att.bytes.clone(), content_type),
            ),
        }
    }

    let mut mixed = MultiPart::mixed().multipart(related);
    for part in files {
        mixed = mixed.singlepart(part);
    }

    builder
        .multipart(mixed)
        .map_err(|e| SecReportError::Delivery(format!("Build email: {e}")))
}

/// lettre async SMTP mailer. A fresh transport is built per message.
pub struct SmtpMailer;

impl SmtpMailer {
    fn transport(cfg: &TransportConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        // Internal relays commonly present self-signed certificates.
        let tls = TlsParameters::builder(cfg.host.clone())
            .dangerous_accept_invalid_certs(true)
            .build()
            .map_err(|e| SecReportError::Delivery(format!("TLS parameters: {e}")))?;
        let tls = if cfg.secure {
            Tls::Wrapper(tls)
        } else {
            Tls::Opportunistic(tls)
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.host)
            .port(cfg.port)
            .tls(tls);
        if let Some(user) = &cfg.user {
            builder = builder.credentials(Credentials::new(
                user.clone(),
                cfg.pass.clone().unwrap_or_default(),
            ));
        }
        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, transport: &TransportConfig, mail: &OutgoingMail) -> Result<()> {
        let message = build_message(mail)?;
        let response = Self::transport(transport)?
            .send(message)
            .await
            .map_err(|e| SecReportError::Delivery(format!("SMTP send: {e}")))?;
        tracing::info!(
            to = %mail.to.join(","),
            host = %transport.host,
            code = %response.code(),
            "📤 Email sent"
        );
        Ok(())
    }
}

pub struct DeliveryService {
    store: Arc<dyn ConfigStore>,
    mailer: Arc<dyn Mailer>,
    defaults: MailConfig,
}

impl DeliveryService {
    pub fn new(store: Arc<dyn ConfigStore>, mailer: Arc<dyn Mailer>, defaults: MailConfig) -> Self {
        Self {
            store,
            mailer,
            defaults,
        }
    }

    /// Current transport settings; store failures fall back to defaults.
    pub async fn transport_config(&self) -> TransportConfig {
        match self.store.get(SMTP_CONFIG_KEY).await {
            Ok(Some(stored)) => TransportConfig::merge_stored(&stored, &self.defaults),
            Ok(None) => TransportConfig::from_defaults(&self.defaults),
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch SMTP config, using defaults");
                TransportConfig::from_defaults(&self.defaults)
            }
        }
    }

    /// Send `html` to the comma-separated `to`, with the caller's attachments
    /// plus any template images found on disk.
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        attachments: Vec<Attachment>,
    ) -> Result<()> {
        let recipients = split_recipients(to);
        if recipients.is_empty() {
            return Err(SecReportError::Delivery("no recipients".into()));
        }

        let mut attachments = attachments;
        attachments.extend(self.template_images().await);

        let transport = self.transport_config().await;
        tracing::info!(to = %to, from = %transport.from, "Attempting to send email");
        let mail = OutgoingMail {
            from: transport.from.clone(),
            to: recipients,
            subject: subject.to_string(),
            html: html.to_string(),
            attachments,
        };
        self.mailer.send(&transport, &mail).await.map_err(|e| match e {
            SecReportError::Delivery(msg) => SecReportError::Delivery(msg),
            other => SecReportError::Delivery(other.to_string()),
        })
    }

    async fn template_images(&self) -> Vec<Attachment> {
        let dir = Path::new(&self.defaults.assets_dir);
        let mut images = Vec::new();
        for name in TEMPLATE_IMAGES {
            let path = dir.join(name);
            if !path.exists() {
                continue;
            }
            match Attachment::inline_from_path(&path).await {
                Ok(img) => images.push(img),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping template image"),
            }
        }
        images
    }
}

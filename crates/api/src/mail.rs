//! Background mail dispatch.
//!
//! Handlers never send mail inline. They push a [`MailJob`] onto a
//! bounded queue and move on; a dedicated drain task owns the
//! [`Mailer`] and works through the queue, logging per-job failures.
//! A full queue drops the job with an error log rather than making a
//! request wait.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use marquee_auth::Token;
use marquee_core::User;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Jobs waiting for the drain task before new deliveries are refused.
pub const MAIL_QUEUE_CAPACITY: usize = 256;

/// One outbound email, described by template rather than body.
#[derive(Clone)]
pub struct MailJob {
    pub recipient: String,
    pub template: &'static str,
    pub token_plaintext: Option<String>,
}

impl MailJob {
    /// The welcome mail for a freshly registered user, carrying their
    /// activation token.
    #[must_use]
    pub fn welcome(user: &User, token: &Token) -> Self {
        Self {
            recipient: user.email.clone(),
            template: "user_welcome",
            token_plaintext: Some(token.plaintext.clone()),
        }
    }

    /// A replacement activation token for an existing user.
    #[must_use]
    pub fn activation(user: &User, token: &Token) -> Self {
        Self {
            recipient: user.email.clone(),
            template: "token_activation",
            token_plaintext: Some(token.plaintext.clone()),
        }
    }
}

// The plaintext must never leak through debug formatting.
impl fmt::Debug for MailJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailJob")
            .field("recipient", &self.recipient)
            .field("template", &self.template)
            .field(
                "token_plaintext",
                &self.token_plaintext.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Delivery backend for queued mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, job: &MailJob) -> marquee_core::Result<()>;
}

/// Records deliveries in the log instead of speaking SMTP. The token
/// plaintext stays out of the log line.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, job: &MailJob) -> marquee_core::Result<()> {
        info!(recipient = %job.recipient, template = job.template, "mail delivered");
        Ok(())
    }
}

/// Handler-side handle onto the dispatch queue.
#[derive(Clone)]
pub struct MailSender {
    tx: mpsc::Sender<MailJob>,
}

impl MailSender {
    /// Queues a job without waiting for delivery. A full queue drops
    /// the job and logs it.
    pub fn deliver(&self, job: MailJob) {
        if let Err(err) = self.tx.try_send(job) {
            error!(error = %err, "mail queue refused job");
        }
    }
}

/// Starts the drain task that owns the mailer, returning the sender
/// handle and the task itself.
pub fn spawn_dispatcher(mailer: Arc<dyn Mailer>, capacity: usize) -> (MailSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(capacity);

    let handle = tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            if let Err(err) = mailer.send(&job).await {
                error!(error = %err, recipient = %job.recipient, "mail delivery failed");
            }
        }
        debug!("mail dispatcher stopped");
    });

    (MailSender { tx }, handle)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CapturingMailer {
        jobs: parking_lot::Mutex<Vec<MailJob>>,
    }

    #[async_trait]
    impl Mailer for CapturingMailer {
        async fn send(&self, job: &MailJob) -> marquee_core::Result<()> {
            self.jobs.lock().push(job.clone());
            Ok(())
        }
    }

    struct FailingMailer {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _: &MailJob) -> marquee_core::Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(marquee_core::Error::invariant("smtp unreachable"))
        }
    }

    fn job(recipient: &str) -> MailJob {
        MailJob {
            recipient: recipient.to_string(),
            template: "user_welcome",
            token_plaintext: Some("SENSITIVE".to_string()),
        }
    }

    #[tokio::test]
    async fn dispatcher_drains_queued_jobs() {
        let mailbox = Arc::new(CapturingMailer::default());
        let (sender, handle) = spawn_dispatcher(mailbox.clone(), 8);

        sender.deliver(job("alice@example.com"));
        sender.deliver(job("bob@example.com"));
        drop(sender);
        handle.await.unwrap();

        let jobs = mailbox.jobs.lock();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].recipient, "alice@example.com");
        assert_eq!(jobs[1].recipient, "bob@example.com");
    }

    #[tokio::test]
    async fn delivery_failures_do_not_stop_the_drain() {
        let mailbox = Arc::new(FailingMailer {
            attempts: AtomicUsize::new(0),
        });
        let (sender, handle) = spawn_dispatcher(mailbox.clone(), 8);

        sender.deliver(job("alice@example.com"));
        sender.deliver(job("bob@example.com"));
        drop(sender);
        handle.await.unwrap();

        assert_eq!(mailbox.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = MailSender { tx };

        sender.deliver(job("kept@example.com"));
        sender.deliver(job("dropped@example.com"));
        drop(sender);

        assert_eq!(rx.recv().await.unwrap().recipient, "kept@example.com");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn debug_output_redacts_the_plaintext() {
        let rendered = format!("{:?}", job("alice@example.com"));

        assert!(rendered.contains("alice@example.com"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("SENSITIVE"));
    }
}

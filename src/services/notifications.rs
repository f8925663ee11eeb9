//! Outbound email: attempt outcome messages and certificate delivery.
//!
//! All sends go through the [`NotificationSender`] trait so the workflow
//! can be exercised in tests without an SMTP server. Dispatch after a
//! submission is best effort; failures are logged and never bubble up to
//! the submitting request.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::core::config::SmtpSettings;

/// Learner results below this score alert the instructor even when the
/// attempt technically passed.
const INSTRUCTOR_ALERT_THRESHOLD: i32 = 70;

#[async_trait]
pub(crate) trait NotificationSender: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: String) -> anyhow::Result<()>;
}

pub(crate) struct SmtpNotificationSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotificationSender {
    pub(crate) fn from_settings(smtp: &SmtpSettings) -> anyhow::Result<Self> {
        let mut builder = if smtp.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
                .context("invalid SMTP relay host")?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
        };
        builder = builder.port(smtp.port);
        if !smtp.username.is_empty() {
            builder = builder
                .credentials(Credentials::new(smtp.username.clone(), smtp.password.clone()));
        }

        let from: Mailbox = format!("{} <{}>", smtp.from_name, smtp.from_email)
            .parse()
            .context("invalid SMTP from address")?;

        Ok(Self { transport: builder.build(), from })
    }
}

#[async_trait]
impl NotificationSender for SmtpNotificationSender {
    async fn send(&self, recipient: &str, subject: &str, body: String) -> anyhow::Result<()> {
        let to: Mailbox = recipient.parse().context("invalid recipient address")?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(body)
            .context("failed to build email message")?;
        self.transport.send(message).await.context("SMTP send failed")?;
        Ok(())
    }
}

/// Stand-in sender used when SMTP is disabled; accepts every message.
pub(crate) struct NoopSender;

#[async_trait]
impl NotificationSender for NoopSender {
    async fn send(&self, recipient: &str, subject: &str, _body: String) -> anyhow::Result<()> {
        tracing::debug!(%recipient, %subject, "Email delivery disabled, dropping message");
        Ok(())
    }
}

/// Everything the outcome emails need, resolved before dispatch so the
/// sender never touches the database.
#[derive(Debug, Clone)]
pub(crate) struct AttemptOutcome {
    pub(crate) learner_email: String,
    pub(crate) learner_name: String,
    pub(crate) instructor_email: Option<String>,
    pub(crate) test_title: String,
    pub(crate) course_title: String,
    pub(crate) score: i32,
    pub(crate) passing_score: i32,
    pub(crate) is_passed: bool,
    pub(crate) correct_answers: i32,
    pub(crate) total_questions: i32,
}

impl AttemptOutcome {
    fn needs_instructor_alert(&self) -> bool {
        !self.is_passed || self.score < INSTRUCTOR_ALERT_THRESHOLD
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CertificateDelivery {
    pub(crate) recipient_email: String,
    pub(crate) recipient_name: String,
    pub(crate) course_title: String,
    pub(crate) certificate_number: String,
    pub(crate) score: i32,
    pub(crate) download_url: String,
}

/// Sends the learner's result email, then an instructor alert when the
/// attempt failed or scored below the alert threshold. Each send is
/// independent: a failed learner email does not suppress the alert.
pub(crate) async fn dispatch_attempt_outcome(
    sender: &dyn NotificationSender,
    timeout: Duration,
    outcome: &AttemptOutcome,
) {
    let subject = format!("Test results: {}", outcome.test_title);
    let body = learner_body(outcome);
    if let Err(err) = send_with_timeout(sender, timeout, &outcome.learner_email, &subject, body).await
    {
        tracing::warn!(error = %err, recipient = %outcome.learner_email, "Failed to send result email");
    }

    if !outcome.needs_instructor_alert() {
        return;
    }
    let Some(instructor_email) = outcome.instructor_email.as_deref() else {
        return;
    };
    let subject = format!("Student result alert: {}", outcome.test_title);
    let body = instructor_body(outcome);
    if let Err(err) = send_with_timeout(sender, timeout, instructor_email, &subject, body).await {
        tracing::warn!(error = %err, recipient = %instructor_email, "Failed to send instructor alert");
    }
}

/// Sends the certificate email. Unlike outcome dispatch the error is
/// returned, so the resend endpoint can report delivery failures.
pub(crate) async fn send_certificate_email(
    sender: &dyn NotificationSender,
    timeout: Duration,
    delivery: &CertificateDelivery,
) -> anyhow::Result<()> {
    let subject = format!("Your certificate for {}", delivery.course_title);
    let body = format!(
        "Hi {},\n\n\
         Congratulations on completing {}! Your certificate is ready.\n\n\
         Certificate number: {}\n\
         Final score: {}%\n\
         Download: {}\n\n\
         Keep the certificate number handy; anyone can verify it online.\n",
        delivery.recipient_name,
        delivery.course_title,
        delivery.certificate_number,
        delivery.score,
        delivery.download_url,
    );
    send_with_timeout(sender, timeout, &delivery.recipient_email, &subject, body).await
}

async fn send_with_timeout(
    sender: &dyn NotificationSender,
    timeout: Duration,
    recipient: &str,
    subject: &str,
    body: String,
) -> anyhow::Result<()> {
    match tokio::time::timeout(timeout, sender.send(recipient, subject, body)).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("email send timed out after {:?}", timeout)),
    }
}

fn learner_body(outcome: &AttemptOutcome) -> String {
    let verdict = if outcome.is_passed {
        format!("Congratulations! You passed with a score of {}%.", outcome.score)
    } else {
        format!(
            "You scored {}%, below the passing score of {}%. You can try again.",
            outcome.score, outcome.passing_score
        )
    };
    format!(
        "Hi {},\n\n\
         Here are your results for \"{}\" in {}:\n\n\
         {}\n\
         Correct answers: {} of {}\n",
        outcome.learner_name,
        outcome.test_title,
        outcome.course_title,
        verdict,
        outcome.correct_answers,
        outcome.total_questions,
    )
}

fn instructor_body(outcome: &AttemptOutcome) -> String {
    let status = if outcome.is_passed { "passed" } else { "did not pass" };
    format!(
        "{} {} \"{}\" in {} with a score of {}% ({} of {} correct).\n\
         The passing score is {}%.\n",
        outcome.learner_name,
        status,
        outcome.test_title,
        outcome.course_title,
        outcome.score,
        outcome.correct_answers,
        outcome.total_questions,
        outcome.passing_score,
    )
}

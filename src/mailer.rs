use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound mail seam. Implementations must be cheap to call from a request
/// handler; callers never retry.
pub trait Mailer: Send + Sync {
    fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()>;
}

/// Writes each message to the log instead of delivering it.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl Mailer for LogMailer {
    fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
        info!(
            event = "mail.sent",
            from = %self.from,
            to = %email.to,
            subject = %email.subject,
            "email queued"
        );
        Ok(())
    }
}

/// Sends and swallows failures. Returns whether the send succeeded.
pub fn send_best_effort(mailer: &dyn Mailer, email: &OutgoingEmail) -> bool {
    match mailer.send(email) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                event = "mail.failed",
                to = %email.to,
                subject = %email.subject,
                error = %e,
                "email send failed"
            );
            false
        }
    }
}

pub fn welcome_email(to: &str, full_name: &str, username: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Welcome to the academic portal | مرحبًا بك في البوابة الأكاديمية".to_string(),
        body: format!(
            "Hello {full_name},\n\nYour account \"{username}\" is ready.\n\n\
             مرحبًا {full_name}،\n\nحسابك \"{username}\" جاهز الآن.\n"
        ),
    }
}

pub fn reset_code_email(to: &str, code: &str, ttl_minutes: u64) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Password reset code | رمز إعادة تعيين كلمة المرور".to_string(),
        body: format!(
            "Your verification code is {code}. It expires in {ttl_minutes} minutes.\n\n\
             رمز التحقق الخاص بك هو {code}. تنتهي صلاحيته خلال {ttl_minutes} دقيقة.\n"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Mailer for Broken {
        fn send(&self, _email: &OutgoingEmail) -> anyhow::Result<()> {
            anyhow::bail!("smtp unreachable")
        }
    }

    #[test]
    fn best_effort_reports_without_propagating() {
        let email = welcome_email("s@uni.edu", "Sara Ali", "sara_a");
        assert!(!send_best_effort(&Broken, &email));
        assert!(send_best_effort(&LogMailer::new("no-reply@portal.local"), &email));
    }

    #[test]
    fn reset_email_carries_code_in_both_languages() {
        let email = reset_code_email("s@uni.edu", "042917", 10);
        assert_eq!(email.body.matches("042917").count(), 2);
    }
}

/// Outbound mail collaborator. Rendering and delivery live outside this crate;
/// handlers only hand over the recipient and the signed link.
pub trait Mailer: Send + Sync {
    fn send_verification(&self, to: &str, link: &str);
    fn send_password_reset(&self, to: &str, link: &str);
}

/// Stand-in used when no delivery backend is wired. Links are never logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_verification(&self, to: &str, _link: &str) {
        tracing::info!(to, "verification email handed to mailer (delivery not configured)");
    }

    fn send_password_reset(&self, to: &str, _link: &str) {
        tracing::info!(to, "password reset email handed to mailer (delivery not configured)");
    }
}

/// Substitutes `{token}` in a configured frontend URL template.
pub fn render_link(template: &str, token: &str) -> String {
    template.replace("{token}", token)
}

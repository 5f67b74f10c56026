use crate::{api, cli::actions::Action, security::SecurityConfig};
use anyhow::Result;

/// Handle the server action
/// # Errors
/// Returns an error if the server fails to start.
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            token_secret,
            frontend_url,
            totp_issuer,
        } => {
            let config = SecurityConfig::new()
                .with_totp_issuer(&totp_issuer)
                .with_frontend_url(&frontend_url);

            api::new(port, &dsn, config, token_secret).await?;
        }
    }

    Ok(())
}

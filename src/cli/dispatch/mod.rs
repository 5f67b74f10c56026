use crate::cli::actions::Action;
use anyhow::{Context, Result};
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one::<String>("dsn")
            .map(String::to_string)
            .context("missing required argument: --dsn")?,
        token_secret: matches
            .get_one::<String>("token-secret")
            .map(|s| SecretString::from(s.clone()))
            .context("missing required argument: --token-secret")?,
        frontend_url: matches
            .get_one::<String>("frontend-url")
            .map(String::to_string)
            .unwrap_or_else(|| "http://localhost:3000".to_string()),
        totp_issuer: matches
            .get_one::<String>("totp-issuer")
            .map(String::to_string)
            .unwrap_or_else(|| "TaxFlow".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::handler;
    use crate::cli::{actions::Action, commands};

    #[test]
    fn handler_builds_server_action() {
        let matches = commands::new().get_matches_from(vec![
            "taxflow-account",
            "--dsn",
            "postgres://localhost/taxflow",
            "--token-secret",
            "secret",
            "--frontend-url",
            "https://app.taxflow.it",
        ]);
        let action = handler(&matches).unwrap();
        let Action::Server {
            port,
            dsn,
            frontend_url,
            totp_issuer,
            ..
        } = action;
        assert_eq!(port, 8080);
        assert_eq!(dsn, "postgres://localhost/taxflow");
        assert_eq!(frontend_url, "https://app.taxflow.it");
        assert_eq!(totp_issuer, "TaxFlow");
    }
}

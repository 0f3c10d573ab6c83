use anyhow::anyhow;
use chrono::Utc;
use tankobon_session::{KeyValueStore, TOKEN_KEY, TokenClaims};

use crate::cli::{LoginArgs, OutputFormat};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{IdentityView, render_identity};

pub(crate) fn handle_login(ctx: &AppContext, args: LoginArgs) -> CliResult<()> {
    let token = args.token.trim();
    if token.is_empty() {
        return Err(CliError::validation("token must not be empty"));
    }
    let claims = TokenClaims::decode(token)
        .ok_or_else(|| CliError::validation("token is not a readable JWT"))?;
    let Some(username) = claims.subject.clone() else {
        return Err(CliError::validation("token does not name a user"));
    };
    if claims.is_expired_at(Utc::now()) {
        let expired = claims
            .expires_at
            .map_or_else(String::new, |at| format!(" at {}", at.to_rfc3339()));
        return Err(CliError::validation(format!("token expired{expired}")));
    }

    ctx.session.set_token(token);
    ensure_persisted(ctx, Some(token))?;
    tracing::info!(user = %username, "signed in");
    println!("Signed in as {username}.");
    Ok(())
}

pub(crate) fn handle_logout(ctx: &AppContext) -> CliResult<()> {
    let was_signed_in = ctx.session.is_authenticated();
    ctx.session.clear();
    ensure_persisted(ctx, None)?;
    if was_signed_in {
        println!("Signed out.");
    } else {
        println!("Not signed in.");
    }
    Ok(())
}

pub(crate) fn handle_whoami(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    let identity = ctx.session.identity();
    let expires_at = ctx.session.claims().and_then(|claims| claims.expires_at);
    render_identity(&IdentityView::new(&identity, expires_at), format)
}

/// The session only logs storage failures; a CLI has to report them.
fn ensure_persisted(ctx: &AppContext, expected: Option<&str>) -> CliResult<()> {
    let stored = ctx
        .store
        .get(TOKEN_KEY)
        .map_err(|err| CliError::failure(anyhow!(err).context("failed to read stored session")))?;
    if stored.as_deref() == expected {
        Ok(())
    } else {
        Err(CliError::failure(anyhow!(
            "failed to update the stored session in {}",
            ctx.store.path().display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tankobon_config::ClientConfig;
    use tankobon_test_support::tokens::{admin_token_for, mint_token, token_for};
    use url::Url;

    use crate::client::StderrNotifier;

    fn context(dir: &tempfile::TempDir) -> AppContext {
        let mut config = ClientConfig::with_api_url(Url::parse("http://127.0.0.1:9").unwrap());
        config.data_dir = dir.path().to_path_buf();
        AppContext::build(&config, Arc::new(StderrNotifier)).unwrap()
    }

    fn login(ctx: &AppContext, token: &str) -> CliResult<()> {
        handle_login(
            ctx,
            LoginArgs {
                token: token.to_string(),
            },
        )
    }

    #[test]
    fn login_persists_token_across_contexts() {
        let dir = tempfile::tempdir().unwrap();
        let token = admin_token_for("root");
        login(&context(&dir), &format!("  {token}\n")).unwrap();

        let reopened = context(&dir);
        assert_eq!(reopened.session.token(), Some(token));
        let identity = reopened.session.identity();
        assert_eq!(identity.username.as_deref(), Some("root"));
        assert!(identity.is_admin);
        handle_whoami(&reopened, OutputFormat::Json).unwrap();
    }

    #[test]
    fn unreadable_or_expired_tokens_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let expired = mint_token(&serde_json::json!({"sub": "alice", "exp": 1}));
        let anonymous = mint_token(&serde_json::json!({"is_admin": true}));
        for token in ["", "garbage", expired.as_str(), anonymous.as_str()] {
            let err = login(&ctx, token).unwrap_err();
            assert_eq!(err.exit_code(), 2, "{token:?} should be a validation error");
        }
        assert!(!ctx.session.is_authenticated());
        assert_eq!(ctx.store.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn logout_removes_stored_token() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        login(&ctx, &token_for("alice")).unwrap();
        handle_logout(&ctx).unwrap();
        assert!(!context(&dir).session.is_authenticated());
        handle_logout(&ctx).unwrap();
    }
}

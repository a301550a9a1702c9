#![allow(clippy::print_stdout)]

use anyhow::Context;
use clap::Args;
use jobboard_client_core::LoginCredentials;
use serde_json::json;

use crate::App;

#[derive(Args)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    pub email: String,
    /// Account password
    #[arg(long)]
    pub password: String,
}

pub async fn login(app: &App, args: LoginArgs) -> anyhow::Result<()> {
    let credentials = LoginCredentials::new(&args.email, &args.password)?;
    let outcome = app.core.session.login(&credentials).await?;

    if app.json {
        let identity = outcome.identity.as_ref();
        let json = json!({
            "user_id": identity.map(|identity| identity.user_id.clone()),
            "email": identity.and_then(|identity| identity.email.clone()),
            "expires_at": identity
                .and_then(|identity| identity.expires_at)
                .map(|at| at.to_rfc3339()),
            "resume_to": outcome.resume_to,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    match &outcome.identity {
        Some(identity) => println!("Signed in as {}", identity.display_name()),
        None => println!("Signed in"),
    }
    if let Some(path) = &outcome.resume_to {
        println!("Continue at {path}");
    }
    Ok(())
}

pub async fn logout(app: &App) -> anyhow::Result<()> {
    app.core.session.logout().await?;
    if app.json {
        println!("{}", json!({ "signed_out": true }));
    } else {
        println!("Signed out");
    }
    Ok(())
}

pub async fn whoami(app: &App) -> anyhow::Result<()> {
    app.core.gateway.set_location("/profile");
    let profile = app
        .core
        .session
        .current_user()
        .await
        .context("fetch current user")?;
    let expires_at = app
        .core
        .session
        .current_identity()
        .and_then(|identity| identity.expires_at);

    if app.json {
        let json = json!({
            "profile": profile,
            "token_expires_at": expires_at.map(|at| at.to_rfc3339()),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    let name = format!("{} {}", profile.first_name, profile.last_name);
    let name = name.trim();
    if name.is_empty() {
        println!("{}", profile.email);
    } else {
        println!("{name} <{}>", profile.email);
    }
    println!("  User id: {}", profile.id);
    if profile.is_superuser {
        println!("  Role: superuser");
    } else if profile.is_staff {
        println!("  Role: staff");
    }
    if let Some(at) = expires_at {
        println!("  Access token expires: {}", at.to_rfc3339());
    }
    Ok(())
}

use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Input, Password};
use tracing::warn;

use crate::app::App;
use crate::output;

pub async fn login(app: &mut App, email: Option<String>) -> Result<()> {
    let theme = ColorfulTheme::default();
    let email = match email {
        Some(email) => email,
        None => {
            let mut prompt = Input::<String>::with_theme(&theme).with_prompt("Email");
            if let Some(ref last) = app.config.last_email {
                prompt = prompt.default(last.clone());
            }
            prompt.interact_text().context("Failed to read email")?
        }
    };
    let password = Password::with_theme(&theme)
        .with_prompt("Password")
        .interact()
        .context("Failed to read password")?;

    let tokens = app.client.login(&email, &password).await?;

    app.config.last_email = Some(email);
    if let Err(e) = app.config.save() {
        warn!(error = %e, "Failed to save config");
    }

    if app.json {
        output::print_json(&tokens.user)
    } else {
        println!("Logged in as {} <{}>", tokens.user.name, tokens.user.email);
        Ok(())
    }
}

pub async fn logout(app: &App) -> Result<()> {
    if !app.client.session().is_authenticated() {
        println!("Not logged in");
        return Ok(());
    }
    app.client.logout().await;
    println!("Logged out");
    Ok(())
}

pub fn whoami(app: &App) -> Result<()> {
    let user = app.require_user()?;
    if app.json {
        output::print_json(&user)
    } else {
        println!("{} <{}> (id {})", user.name, user.email, user.id);
        Ok(())
    }
}

pub async fn register(app: &App, email: &str, name: &str) -> Result<()> {
    let password = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()
        .context("Failed to read password")?;

    app.client.register(email, &password, name).await?;
    println!("Account created. Run `xquare login --email {}` to sign in.", email);
    Ok(())
}

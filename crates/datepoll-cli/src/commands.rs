use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use tracing::warn;

use datepoll_core::config::Config;
use datepoll_core::models::PollSummary;
use datepoll_core::{AppContext, GuardDecision};

use crate::{Command, OauthCommand, PollsCommand};

pub async fn run(ctx: &AppContext, config: &mut Config, command: Command) -> Result<()> {
    match command {
        Command::Login { email } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => bail!("No email given and none remembered"),
            };
            let password = rpassword::prompt_password(format!("Password for {}: ", email))?;
            let auth = ctx.auth.login(&email, &password).await?;
            remember_email(config, &email);
            println!("Signed in as {}", auth.user.display_name());
        }
        Command::Register { name, email } => {
            let password = rpassword::prompt_password("Choose a password: ")?;
            let confirm = rpassword::prompt_password("Repeat password: ")?;
            if password != confirm {
                bail!("Passwords do not match");
            }
            let auth = ctx.auth.register(&name, &email, &password).await?;
            remember_email(config, &email);
            println!("Account created, signed in as {}", auth.user.display_name());
        }
        Command::Logout => {
            ctx.auth.logout().await;
            println!("Signed out");
        }
        Command::Whoami => match ctx.session.user() {
            Some(user) if ctx.session.is_authenticated() => {
                println!("{} <{}> (id {})", user.display_name(), user.email, user.id);
            }
            _ => println!("Not signed in"),
        },
        Command::Refresh => {
            if ctx.auth.refresh_session().await {
                println!("Session renewed");
            } else {
                bail!("Could not renew the session");
            }
        }
        Command::Profile { name, email } => {
            let user = ctx.auth.update_profile(&name, &email).await?;
            println!("Profile saved for {}", user.display_name());
        }
        Command::Password => {
            let old_password = rpassword::prompt_password("Current password: ")?;
            let new_password = rpassword::prompt_password("New password: ")?;
            ctx.auth.change_password(&old_password, &new_password).await?;
            println!("Password changed");
        }
        Command::Oauth(OauthCommand::Url) => println!("{}", ctx.auth.oauth_login_url()),
        Command::Oauth(OauthCommand::Complete { token }) => {
            let user = ctx.auth.complete_oauth_login(&token).await?;
            println!("Signed in as {}", user.display_name());
        }
        Command::Polls(command) => run_polls(ctx, command).await?,
        Command::Visit { path } => {
            let decision = ctx.visit(&path);
            println!("{}", visit_message(&decision, &path));
        }
        Command::Config => println!("{}", serde_json::to_string_pretty(config)?),
    }
    Ok(())
}

async fn run_polls(ctx: &AppContext, command: PollsCommand) -> Result<()> {
    let polls = ctx.polls();
    match command {
        PollsCommand::List { search } => {
            let params: Vec<(&str, &str)> = search
                .as_deref()
                .map(|s| vec![("search", s)])
                .unwrap_or_default();
            print_polls(&polls.list(&params).await?);
        }
        PollsCommand::Show { id } => {
            let poll = polls.get_raw(&id).await?;
            println!("{}", serde_json::to_string_pretty(&poll)?);
        }
        PollsCommand::Mine => print_polls(&polls.mine().await?),
        PollsCommand::Create { json } => {
            let created = polls.create(&parse_json(&json)?).await?;
            println!("{}", serde_json::to_string_pretty(&created)?);
        }
        PollsCommand::Delete { id } => {
            polls.delete(&id).await?;
            println!("Deleted poll {}", id);
        }
        PollsCommand::Vote { id, json } => {
            let result = polls.vote(&id, &parse_json(&json)?).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}

fn visit_message(decision: &GuardDecision, path: &str) -> String {
    match decision {
        GuardDecision::Allow => format!("open {}", path),
        GuardDecision::Redirect(to) => format!("redirected to {}", to),
    }
}

fn print_polls(polls: &[PollSummary]) {
    if polls.is_empty() {
        println!("No polls");
        return;
    }
    for poll in polls {
        let marker = if poll.is_expired() { " (closed)" } else { "" };
        println!("{:<24} {}{}", poll.id, poll.title, marker);
    }
}

fn parse_json(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| anyhow!("Invalid JSON argument: {}", e))
}

fn remember_email(config: &mut Config, email: &str) {
    config.last_email = Some(email.to_string());
    if let Err(e) = config.save().context("Failed to save config") {
        warn!(error = %e, "Could not remember email");
    }
}

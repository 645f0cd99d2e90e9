//! Auth command - session management.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};

use larder_client::{LoginRequest, RegisterRequest, SessionStatus, UpdateProfileRequest, User};

use super::{Context, print_json, print_success};

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Log in with email and password
    Login {
        /// Account email
        email: String,

        /// Password (prompted for when omitted)
        #[arg(long, env = "LARDER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create a new account and log in
    Register {
        /// Account email
        email: String,

        /// First name
        #[arg(long)]
        first_name: String,

        /// Last name
        #[arg(long)]
        last_name: String,

        /// Optional public username
        #[arg(long)]
        username: Option<String>,

        /// Password (prompted for when omitted)
        #[arg(long, env = "LARDER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// End the current session
    Logout,

    /// Show whether you are logged in
    Status,

    /// Show or update your profile
    Profile {
        /// New first name
        #[arg(long)]
        first_name: Option<String>,

        /// New last name
        #[arg(long)]
        last_name: Option<String>,

        /// New username
        #[arg(long)]
        username: Option<String>,

        /// New email
        #[arg(long)]
        email: Option<String>,
    },
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login { email, password } => cmd_login(ctx, email, password).await,
        AuthCommand::Register {
            email,
            first_name,
            last_name,
            username,
            password,
        } => {
            let password = password_or_prompt(password, true)?;
            let request = RegisterRequest {
                first_name,
                last_name,
                email,
                username,
                password,
            };
            cmd_register(ctx, request).await
        }
        AuthCommand::Logout => cmd_logout(ctx).await,
        AuthCommand::Status => cmd_status(ctx).await,
        AuthCommand::Profile {
            first_name,
            last_name,
            username,
            email,
        } => {
            let update = UpdateProfileRequest {
                first_name,
                last_name,
                username,
                email,
            };
            cmd_profile(ctx, update).await
        }
    }
}

async fn cmd_login(ctx: &Context, email: String, password: Option<String>) -> Result<()> {
    let password = password_or_prompt(password, false)?;
    let user = ctx
        .client
        .auth()
        .login(LoginRequest::new(email, password))
        .await?;

    if ctx.json_output {
        print_json(&user)
    } else {
        print_success(format!("Logged in as {}", user.display_name()));
        Ok(())
    }
}

async fn cmd_register(ctx: &Context, request: RegisterRequest) -> Result<()> {
    let user = ctx.client.auth().register(request).await?;

    if ctx.json_output {
        print_json(&user)
    } else {
        print_success(format!("Welcome, {}! Your account is ready.", user.display_name()));
        Ok(())
    }
}

async fn cmd_logout(ctx: &Context) -> Result<()> {
    if ctx.client.status().await == SessionStatus::Anonymous {
        println!("Not logged in.");
        return Ok(());
    }

    ctx.client.auth().logout().await?;
    print_success("Logged out");
    Ok(())
}

async fn cmd_status(ctx: &Context) -> Result<()> {
    let dim = Style::new().dim();

    let user = match ctx.client.status().await {
        SessionStatus::Anonymous => None,
        SessionStatus::Authenticated => ctx.client.auth().check().await?,
    };

    if ctx.json_output {
        return print_json(&serde_json::json!({
            "authenticated": user.is_some(),
            "user": user,
            "server": ctx.settings.server_url,
        }));
    }

    println!("{}", style("Session").bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    match user {
        Some(user) => {
            println!("Logged in as {} <{}>", user.display_name(), user.email);
            println!("{}", dim.apply_to(format!("User ID: {}", user.id)));
        }
        None => {
            println!("Not logged in");
            println!(
                "{}",
                dim.apply_to("  Run 'larder auth login <email>' to sign in")
            );
        }
    }
    println!("{}", dim.apply_to(format!("Server: {}", ctx.settings.server_url)));
    if ctx.verbose {
        println!(
            "{}",
            dim.apply_to(format!("Session file: {}", ctx.settings.token_file.display()))
        );
    }

    Ok(())
}

async fn cmd_profile(ctx: &Context, update: UpdateProfileRequest) -> Result<()> {
    let is_update = update.first_name.is_some()
        || update.last_name.is_some()
        || update.username.is_some()
        || update.email.is_some();

    let user = if is_update {
        ctx.client.auth().update_profile(update).await?
    } else {
        ctx.client.auth().profile().await?
    };

    if ctx.json_output {
        return print_json(&user);
    }

    if is_update {
        print_success("Profile updated");
        println!();
    }
    print_profile(&user);
    Ok(())
}

fn print_profile(user: &User) {
    let dim = Style::new().dim();
    println!("{}", style(user.display_name()).bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!("Email:    {}", user.email);
    if let Some(username) = &user.username {
        println!("Username: {}", username);
    }
    if let Some(created) = user.created_at {
        println!("Joined:   {}", created.format("%Y-%m-%d"));
    }
}

/// Use the given password or ask for one without echoing it.
fn password_or_prompt(password: Option<String>, confirm: bool) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password cannot be empty");
    }
    if confirm && rpassword::prompt_password("Confirm password: ")? != password {
        bail!("Passwords do not match");
    }
    Ok(password)
}

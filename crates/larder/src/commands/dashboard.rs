//! Dashboard command.

use anyhow::Result;
use clap::Args;
use console::{Style, style};

use super::recipes::print_recipe_lines;
use super::{Context, print_json};

/// Arguments for the dashboard command.
#[derive(Args, Debug)]
pub struct DashboardArgs {
    /// Show only the recipes you created
    #[arg(long)]
    pub mine: bool,
}

/// Run the dashboard command.
pub async fn run(args: DashboardArgs, ctx: &Context) -> Result<()> {
    // The dashboard endpoints are keyed by user, so resolve who we are first.
    let user = ctx.client.auth().profile().await?;
    let dim = Style::new().dim();

    if args.mine {
        let mine = ctx.client.dashboard().my_recipes(&user.id).await?;
        if ctx.json_output {
            return print_json(&mine);
        }

        println!("{}", style("My Recipes").bold());
        println!("{}", dim.apply_to("─".repeat(60)));
        if mine.items.is_empty() {
            println!("{}", dim.apply_to("You haven't created any recipes yet"));
        } else {
            print_recipe_lines(&mine.items);
        }
        return Ok(());
    }

    let dashboard = ctx.client.dashboard().overview(&user.id).await?;
    if ctx.json_output {
        return print_json(&dashboard);
    }

    let stats = &dashboard.user_stats;
    println!("{}", style(format!("Hello, {}", user.display_name())).bold());
    println!("{}", dim.apply_to("─".repeat(60)));
    println!(
        "Created {}  ·  Saved {}  ·  Cooked {}",
        style(stats.recipes_created).cyan(),
        style(stats.recipes_saved).cyan(),
        style(stats.recipes_cooked).cyan()
    );
    println!();

    println!("{}", style("From the community").bold());
    if dashboard.items.is_empty() {
        println!("{}", dim.apply_to("Nothing new yet"));
    } else {
        print_recipe_lines(&dashboard.items);
    }

    Ok(())
}

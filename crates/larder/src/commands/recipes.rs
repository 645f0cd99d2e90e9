//! Recipes command - browse and manage recipes.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};

use larder_client::{
    CookRequest, Difficulty, NewRecipe, Page, Recipe, RecipeFilters, RecipeQuery, SortField,
    SortOrder, DEFAULT_PAGE_SIZE,
};

use super::{Context, print_json, print_success, truncate};

/// Arguments for the recipes command.
#[derive(Args, Debug)]
pub struct RecipesArgs {
    #[command(subcommand)]
    pub command: RecipesCommand,
}

#[derive(Subcommand, Debug)]
pub enum RecipesCommand {
    /// List public recipes
    List {
        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        paging: PageArgs,
    },

    /// Show a recipe in full
    Show {
        /// Recipe ID
        id: String,
    },

    /// Create a recipe
    Create(CreateArgs),

    /// Delete one of your recipes
    Delete {
        /// Recipe ID
        id: String,
    },

    /// Add a recipe to your saved list
    Save {
        /// Recipe ID
        id: String,
    },

    /// Remove a recipe from your saved list
    Unsave {
        /// Recipe ID
        id: String,
    },

    /// Record that you cooked a recipe
    Cook {
        /// Recipe ID
        id: String,

        /// Rating from 1 to 5
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,

        /// Notes about how it went
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// List recipes you saved
    Saved {
        #[command(flatten)]
        paging: PageArgs,
    },

    /// List recipes you cooked
    Cooked {
        #[command(flatten)]
        paging: PageArgs,
    },
}

/// Listing filters.
#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Search titles and descriptions
    #[arg(short, long)]
    pub search: Option<String>,

    /// Only recipes of this difficulty (easy, medium, hard)
    #[arg(short, long)]
    pub difficulty: Option<Difficulty>,

    /// Maximum prep time in minutes
    #[arg(long)]
    pub max_prep: Option<u32>,

    /// Sort by: createdAt, title, prepTime, cookTime, difficulty
    #[arg(long, default_value = "createdAt")]
    pub sort: SortField,

    /// Sort order: asc or desc
    #[arg(long, default_value = "desc")]
    pub order: SortOrder,
}

/// Paging options.
#[derive(Args, Debug)]
pub struct PageArgs {
    /// Page number (1-based)
    #[arg(short, long, default_value = "1")]
    pub page: u32,

    /// Recipes per page
    #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub limit: u32,
}

impl PageArgs {
    fn query(&self) -> RecipeQuery {
        RecipeQuery::default()
            .with_page(self.page)
            .with_limit(self.limit)
    }
}

/// Arguments for creating a recipe.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Recipe title
    pub title: String,

    /// Short description
    #[arg(long)]
    pub description: Option<String>,

    /// Ingredient line (repeat for each ingredient)
    #[arg(short, long = "ingredient", required = true)]
    pub ingredients: Vec<String>,

    /// Instruction step (repeat for each step, in order)
    #[arg(short = 's', long = "step", required = true)]
    pub instructions: Vec<String>,

    /// Prep time in minutes
    #[arg(long)]
    pub prep: Option<u32>,

    /// Cook time in minutes
    #[arg(long)]
    pub cook: Option<u32>,

    /// Number of servings
    #[arg(long)]
    pub servings: Option<u32>,

    /// Difficulty (easy, medium, hard)
    #[arg(short, long, default_value = "easy")]
    pub difficulty: Difficulty,

    /// Image URL
    #[arg(long)]
    pub image_url: Option<String>,

    /// Keep the recipe out of public listings
    #[arg(long)]
    pub private: bool,
}

impl From<CreateArgs> for NewRecipe {
    fn from(args: CreateArgs) -> Self {
        NewRecipe {
            description: args.description,
            image_url: args.image_url,
            prep_time: args.prep,
            cook_time: args.cook,
            servings: args.servings,
            difficulty: args.difficulty,
            is_public: !args.private,
            ingredients: args.ingredients,
            instructions: args.instructions,
            ..NewRecipe::new(args.title)
        }
    }
}

/// Run the recipes command.
pub async fn run(args: RecipesArgs, ctx: &Context) -> Result<()> {
    let recipes = ctx.client.recipes();

    match args.command {
        RecipesCommand::List { filters, paging } => {
            let query = RecipeQuery::default()
                .with_filters(RecipeFilters {
                    search: filters.search,
                    difficulty: filters.difficulty,
                    max_prep_time: filters.max_prep,
                    sort_by: filters.sort,
                    sort_order: filters.order,
                })
                .with_page(paging.page)
                .with_limit(paging.limit);
            let page = recipes.list(&query).await?;
            print_page(ctx, "Recipes", &page)
        }
        RecipesCommand::Show { id } => {
            let recipe = recipes.get(&id).await?;
            if ctx.json_output {
                print_json(&recipe)
            } else {
                print_recipe(&recipe);
                Ok(())
            }
        }
        RecipesCommand::Create(args) => {
            let recipe = recipes.create(args.into()).await?;
            if ctx.json_output {
                print_json(&recipe)
            } else {
                let dim = Style::new().dim();
                print_success(format!(
                    "Recipe created: {} {}",
                    recipe.title,
                    dim.apply_to(format!("[{}]", recipe.id))
                ));
                Ok(())
            }
        }
        RecipesCommand::Delete { id } => {
            recipes.delete(&id).await?;
            print_success(format!("Recipe {} deleted", id));
            Ok(())
        }
        RecipesCommand::Save { id } => {
            recipes.save(&id).await?;
            print_success("Saved");
            Ok(())
        }
        RecipesCommand::Unsave { id } => {
            recipes.unsave(&id).await?;
            print_success("Removed from saved recipes");
            Ok(())
        }
        RecipesCommand::Cook { id, rating, notes } => {
            let cook = CookRequest::new(rating, notes)?;
            recipes.cook(&id, &cook).await?;
            print_success(format!("Marked as cooked ({})", stars(rating)));
            Ok(())
        }
        RecipesCommand::Saved { paging } => {
            let page = recipes.saved(&paging.query()).await?;
            print_page(ctx, "Saved Recipes", &page)
        }
        RecipesCommand::Cooked { paging } => {
            let page = recipes.cooked(&paging.query()).await?;
            print_page(ctx, "Cooked Recipes", &page)
        }
    }
}

fn print_page(ctx: &Context, title: &str, page: &Page<Recipe>) -> Result<()> {
    if ctx.json_output {
        return print_json(page);
    }

    let dim = Style::new().dim();
    println!("{}", style(title).bold());
    println!("{}", dim.apply_to("─".repeat(60)));

    if page.items.is_empty() {
        println!("{}", dim.apply_to("No recipes found"));
        return Ok(());
    }

    print_recipe_lines(&page.items);

    let p = &page.pagination;
    println!();
    println!(
        "{}",
        dim.apply_to(format!(
            "Page {} of {} ({} recipes)",
            p.page,
            p.total_pages.max(1),
            p.total
        ))
    );
    if p.has_next() {
        println!(
            "{}",
            dim.apply_to(format!("Next page: --page {}", p.page + 1))
        );
    }
    Ok(())
}

/// One line per recipe: id, title, difficulty and total time.
pub fn print_recipe_lines(items: &[Recipe]) {
    let dim = Style::new().dim();
    for recipe in items {
        let total = recipe.prep_time.unwrap_or(0) + recipe.cook_time.unwrap_or(0);
        let saved = if recipe.is_saved_by_user { "♥" } else { " " };
        println!(
            "{} {} {:<40} {:>6} {}",
            dim.apply_to(format!("[{}]", recipe.id)),
            saved,
            truncate(&recipe.title, 40),
            recipe.difficulty.to_string().to_lowercase(),
            dim.apply_to(format!("{} min", total))
        );
    }
}

fn print_recipe(recipe: &Recipe) {
    let dim = Style::new().dim();
    let bold = Style::new().bold();

    println!("{}", bold.apply_to(&recipe.title));
    println!("{}", dim.apply_to("─".repeat(60)));

    if let Some(description) = &recipe.description {
        println!("{}", description);
        println!();
    }

    let mut facts = vec![format!("Difficulty: {}", recipe.difficulty)];
    if let Some(prep) = recipe.prep_time {
        facts.push(format!("Prep: {} min", prep));
    }
    if let Some(cook) = recipe.cook_time {
        facts.push(format!("Cook: {} min", cook));
    }
    if let Some(servings) = recipe.servings {
        facts.push(format!("Serves: {}", servings));
    }
    println!("{}", facts.join("  |  "));

    if let Some(author) = &recipe.user {
        println!(
            "{}",
            dim.apply_to(format!(
                "By {} {} on {}",
                author.first_name,
                author.last_name,
                recipe.created_at.format("%Y-%m-%d")
            ))
        );
    }
    println!();

    println!("{}", bold.apply_to("Ingredients"));
    for ingredient in &recipe.ingredients {
        println!("  • {}", ingredient);
    }
    println!();

    println!("{}", bold.apply_to("Instructions"));
    for (i, step) in recipe.instructions.iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }
    println!();

    let rating = recipe
        .average_rating
        .map(|r| format!("{:.1}", r))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}",
        dim.apply_to(format!(
            "Saved {} times · Cooked {} times · Rating {}",
            recipe.total_saves, recipe.total_cooked, rating
        ))
    );
    if recipe.is_cooked_by_user {
        let you = recipe.user_rating.map(stars).unwrap_or_default();
        println!("{}", dim.apply_to(format!("You cooked this {}", you)));
    }
}

fn stars(rating: u8) -> String {
    let rating = rating.min(5) as usize;
    format!("{}{}", "★".repeat(rating), "☆".repeat(5 - rating))
}

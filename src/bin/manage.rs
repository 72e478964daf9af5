//! Administration commands for Blogicum.
//!
//! Usage: `cargo run --bin manage -- <command> [args]`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use blogicum::{
    config::Config,
    db::{
        self,
        repositories::{
            SqlxCategoryRepository, SqlxLocationRepository, SqlxSessionRepository,
            SqlxUserRepository,
        },
        DynDatabasePool,
    },
    services::{CategoryService, CreateCategoryInput, LocationService, RegisterInput, UserService},
};

#[derive(Parser)]
#[command(name = "manage")]
#[command(about = "Blogicum administration commands")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a user account
    Createuser {
        username: String,
        password: String,
        /// Contact address (optional)
        email: Option<String>,
    },

    /// Create a category
    Createcategory {
        slug: String,
        title: String,
        description: Option<String>,
        /// Create it unpublished
        #[arg(long)]
        hidden: bool,
    },

    /// Create a location
    Createlocation {
        name: String,
        /// Create it unpublished
        #[arg(long)]
        hidden: bool,
    },

    /// Publish or hide a category
    PublishCategory {
        slug: String,
        #[arg(action = clap::ArgAction::Set)]
        published: bool,
    },

    /// Publish or hide a location
    PublishLocation {
        id: i64,
        #[arg(action = clap::ArgAction::Set)]
        published: bool,
    },

    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blogicum=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn connect(config: &Config) -> Result<DynDatabasePool> {
    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;
    Ok(pool)
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_with_env(&cli.config)?;

    match cli.command {
        Commands::Createuser {
            username,
            password,
            email,
        } => {
            let pool = connect(&config).await?;
            let service = UserService::new(
                SqlxUserRepository::boxed(pool.clone()),
                SqlxSessionRepository::boxed(pool),
            );
            let user = service
                .register(RegisterInput::new(username, email.unwrap_or_default(), password))
                .await
                .context("Failed to create user")?;
            println!("Created user '{}' (id {})", user.username, user.id);
        }
        Commands::Createcategory {
            slug,
            title,
            description,
            hidden,
        } => {
            let pool = connect(&config).await?;
            let service = CategoryService::new(SqlxCategoryRepository::boxed(pool));
            let category = service
                .create(CreateCategoryInput {
                    title,
                    slug,
                    description: description.unwrap_or_default(),
                    is_published: !hidden,
                })
                .await
                .context("Failed to create category")?;
            println!(
                "Created category '{}' (id {}, {})",
                category.slug,
                category.id,
                if category.is_published { "published" } else { "hidden" }
            );
        }
        Commands::Createlocation { name, hidden } => {
            let pool = connect(&config).await?;
            let service = LocationService::new(SqlxLocationRepository::boxed(pool));
            let location = service.create(&name, !hidden).await?;
            println!("Created location '{}' (id {})", location.name, location.id);
        }
        Commands::PublishCategory { slug, published } => {
            let pool = connect(&config).await?;
            let service = CategoryService::new(SqlxCategoryRepository::boxed(pool));
            service
                .set_published(&slug, published)
                .await
                .context("Failed to update category")?;
            println!("Category '{}' is_published = {}", slug, published);
        }
        Commands::PublishLocation { id, published } => {
            let pool = connect(&config).await?;
            let service = LocationService::new(SqlxLocationRepository::boxed(pool));
            service.set_published(id, published).await?;
            println!("Location {} is_published = {}", id, published);
        }
        Commands::Migrate => {
            let pool = db::create_pool(&config.database).await?;
            if db::migrations::is_up_to_date(&pool).await? {
                println!("No pending migrations");
                return Ok(());
            }
            let pending = db::migrations::pending_count(&pool).await?;
            db::migrations::run_migrations(&pool).await?;
            println!(
                "Applied {} of {} migration(s)",
                pending,
                db::migrations::total_migrations()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags_and_values() {
        let cli = Cli::try_parse_from(["manage", "createcategory", "travel", "Travel", "--hidden"]).unwrap();
        match cli.command {
            Commands::Createcategory { slug, hidden, description, .. } => {
                assert_eq!(slug, "travel");
                assert!(hidden);
                assert_eq!(description, None);
            }
            _ => panic!("wrong command"),
        }

        let cli = Cli::try_parse_from(["manage", "publish-category", "travel", "false"]).unwrap();
        assert!(matches!(cli.command, Commands::PublishCategory { published: false, .. }));

        let cli = Cli::try_parse_from(["manage", "publish-location", "3", "true"]).unwrap();
        assert!(matches!(cli.command, Commands::PublishLocation { id: 3, published: true }));
    }

    #[test]
    fn test_rejects_unknown_flags_and_bad_values() {
        assert!(Cli::try_parse_from(["manage", "createuser", "bob", "secret123", "--hidden"]).is_err());
        assert!(Cli::try_parse_from(["manage", "publish-category", "travel", "maybe"]).is_err());
        assert!(Cli::try_parse_from(["manage"]).is_err());
    }

    #[test]
    fn test_command_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

// Copyright 2023 Remi Bernotavicius

use clap::Parser;
use clap::Subcommand;
use database::models::RecipeId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod database;
mod error;
mod recipes;
mod users;

pub use error::{Error, Result};

#[derive(Parser, Debug)]
#[command(version, about = "Keeps recipes, their ingredients and users' favorites")]
struct Args {
    /// SQLite database to use, created if missing
    #[arg(long, env = "RECIPE_BOOK_DATABASE")]
    database: Option<PathBuf>,

    /// Log more, repeat for even more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    commands: Commands,
}

/// Subcommands taking a `PAYLOAD` read JSON from that file, or from stdin when it is `-`.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Add a recipe from `{"details": {..}, "ingredients": [..]}`
    AddRecipe { payload: PathBuf },
    /// Show a recipe with its ingredients summarized
    ShowRecipe { id: i32 },
    /// List a recipe's ingredients one per row
    RecipeIngredients { id: i32 },
    /// List recipes, optionally those whose tag contains the given text
    ListRecipes {
        #[arg(long)]
        tag: Option<String>,
    },
    /// List recipes with exactly this tag
    ListTag { tag: String },
    /// List every tag in use
    Tags,
    /// Update a recipe from `{"details": {..}, "ingredientList": [..], "recipeIngredientsToRemove": [..]}`
    UpdateRecipe { id: i32, payload: PathBuf },
    DeleteRecipe { id: i32 },
    /// Take one ingredient off a recipe, from `{"ingredients": [..], "index": N}`
    RemoveIngredient { id: i32, payload: PathBuf },
    /// List the ingredient dictionary
    Ingredients,
    /// Delete every ingredient no recipe uses
    CollectOrphans,
    /// Register a user from `{"username", "firstName", "lastName", "email", "isAdmin"}`
    AddUser { payload: PathBuf },
    ShowUser { username: String },
    /// Update a user from `{"firstName", "lastName", "email", "isAdmin"}`, any subset
    UpdateUser { username: String, payload: PathBuf },
    ListUsers,
    DeleteUser { username: String },
    AddFavorite { username: String, recipe_id: i32 },
    RemoveFavorite { username: String, recipe_id: i32 },
    /// List a user's favorite recipe ids
    Favorites { username: String },
    /// List a user's favorite recipes
    FavoriteDetails { username: String },
    /// List every user's favorite recipe ids
    AllFavorites,
}

/// This is where the database lives on-disk unless told otherwise. On Linux it should be like:
/// `~/.local/share/recipe_book/`
fn data_path() -> Result<PathBuf> {
    let dirs = directories::BaseDirs::new().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "failed to get user home directory")
    })?;
    let path = dirs.data_dir().join("recipe_book");
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .env()
        .init()?;
    Ok(())
}

fn read_payload<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if path == Path::new("-") {
        Ok(serde_json::from_reader(io::stdin().lock())?)
    } else {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(io::BufReader::new(file))?)
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_command(conn: &mut database::Connection, command: Commands) -> Result<()> {
    match command {
        Commands::AddRecipe { payload } => {
            let new_id = recipes::create(conn, &read_payload(&payload)?)?;
            println!("Recipe Added: {new_id}");
        }
        Commands::ShowRecipe { id } => print_json(&recipes::get_by_id(conn, id.into())?)?,
        Commands::RecipeIngredients { id } => {
            print_json(&recipes::ingredient_details(conn, id.into())?)?
        }
        Commands::ListRecipes { tag } => print_json(&recipes::list(conn, tag.as_deref())?)?,
        Commands::ListTag { tag } => print_json(&recipes::list_by_tag(conn, &tag)?)?,
        Commands::Tags => print_json(&recipes::tags(conn)?)?,
        Commands::UpdateRecipe { id, payload } => {
            recipes::update(conn, id.into(), &read_payload(&payload)?)?;
            println!("Recipe Updated");
        }
        Commands::DeleteRecipe { id } => {
            let deleted: RecipeId = recipes::delete(conn, id.into())?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }
        Commands::RemoveIngredient { id, payload } => {
            recipes::remove_ingredient(conn, id.into(), &read_payload(&payload)?)?;
            println!("Ingredient removed from recipe");
        }
        Commands::Ingredients => print_json(&recipes::dictionary::list(conn)?)?,
        Commands::CollectOrphans => {
            let collected = recipes::dictionary::collect_orphans(conn)?;
            println!("Removed {collected} unused ingredient(s)");
        }
        Commands::AddUser { payload } => {
            print_json(&users::register(conn, &read_payload(&payload)?)?)?
        }
        Commands::ShowUser { username } => print_json(&users::get(conn, &username)?)?,
        Commands::UpdateUser { username, payload } => {
            print_json(&users::update(conn, &username, &read_payload(&payload)?)?)?
        }
        Commands::ListUsers => print_json(&users::list(conn)?)?,
        Commands::DeleteUser { username } => {
            users::remove(conn, &username)?;
            print_json(&serde_json::json!({ "deleted": username }))?;
        }
        Commands::AddFavorite {
            username,
            recipe_id,
        } => {
            users::add_favorite(conn, &username, recipe_id.into())?;
            println!("Added recipe id: {recipe_id}");
        }
        Commands::RemoveFavorite {
            username,
            recipe_id,
        } => {
            users::remove_favorite(conn, &username, recipe_id.into())?;
            println!("Removed recipe id: {recipe_id}");
        }
        Commands::Favorites { username } => print_json(&users::favorite_ids(conn, &username)?)?,
        Commands::FavoriteDetails { username } => {
            print_json(&users::favorite_details(conn, &username)?)?
        }
        Commands::AllFavorites => print_json(&users::all_favorites(conn)?)?,
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    init_logging(args.verbose)?;

    let database_path = match args.database {
        Some(path) => path,
        None => data_path()?.join("data.sqlite"),
    };
    log::debug!("using database {}", database_path.display());

    let mut conn = database::establish_connection(database_path)?;
    run_command(&mut conn, args.commands)
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            if error.is_client_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

#[test]
fn parse_args() {
    let args = Args::try_parse_from([
        "recipe-book",
        "--database",
        "/tmp/recipes.sqlite",
        "-vv",
        "update-recipe",
        "3",
        "-",
    ])
    .unwrap();
    assert_eq!(args.database, Some(PathBuf::from("/tmp/recipes.sqlite")));
    assert_eq!(args.verbose, 2);
    assert!(matches!(
        args.commands,
        Commands::UpdateRecipe { id: 3, payload } if payload == Path::new("-")
    ));
}

#[test]
fn run_commands_against_database() {
    let mut conn = database::seeded();

    run_command(&mut conn, Commands::Tags).unwrap();
    run_command(&mut conn, Commands::DeleteRecipe { id: 2 }).unwrap();
    assert!(matches!(
        run_command(&mut conn, Commands::DeleteRecipe { id: 2 }),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        run_command(
            &mut conn,
            Commands::AddRecipe {
                payload: PathBuf::from("/nonexistent/recipe.json")
            }
        ),
        Err(Error::Io(_))
    ));
}

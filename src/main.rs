use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use moses::config::Config;
use moses::context::{self, ContextInputs};
use moses::display::{RecommendationView, SystemUrlOpener};
use moses::models::{
    DrinksConsumed, FeedbackType, MosesContext, PreviousFeedback, ProfileDraft, SelfieAnalysis,
};
use moses::profile::ProfileState;
use moses::service::MosesService;
use moses::session;

#[derive(Parser)]
#[command(name = "moses", version, about = "Drink recommendations for tonight's mood")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask for a new recommendation
    Recommend(RecommendArgs),
    /// Show the last recommendation
    Show {
        /// Also print the structured breakdown
        #[arg(long)]
        structured: bool,
    },
    /// Open the last recommendation's recipe link
    Open,
    /// Manage the user profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Print when the current session started
    Session,
}

#[derive(clap::Args)]
struct RecommendArgs {
    #[arg(long)]
    alcohol: String,
    /// A number or a description ("a few")
    #[arg(long)]
    drinks: String,
    #[arg(long)]
    feeling: String,
    #[arg(long)]
    flavor: String,
    #[arg(long)]
    mood: String,
    /// Dominant emotion from a selfie analysis
    #[arg(long)]
    emotion: Option<String>,
    #[arg(long)]
    similarity: Option<f64>,
    /// React to the last recommendation
    #[arg(long, value_enum)]
    feedback: Option<FeedbackArg>,
    /// What to change, with --feedback tweak
    #[arg(long)]
    tweak: Option<String>,
    /// Open the recipe link afterwards
    #[arg(long)]
    open: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FeedbackArg {
    Positive,
    Negative,
    Tweak,
}

impl From<FeedbackArg> for FeedbackType {
    fn from(arg: FeedbackArg) -> Self {
        match arg {
            FeedbackArg::Positive => FeedbackType::Positive,
            FeedbackArg::Negative => FeedbackType::Negative,
            FeedbackArg::Tweak => FeedbackType::Tweak,
        }
    }
}

#[derive(Subcommand)]
enum ProfileAction {
    Show,
    Create {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        favorite_alcohol: Option<String>,
        #[arg(long)]
        flavor: Option<String>,
    },
    /// Delete the stored profile so a new one can be issued
    Reset,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load();
    let service = MosesService::new(&config).await?;
    service.start_session().await;

    match cli.command {
        Command::Recommend(args) => {
            if !recommend(&service, args).await {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Show { structured } => match service.last_recommendation().await {
            Some(view) => print_view(&view, structured),
            None => println!("{}", "No recommendation yet. Try `moses recommend`.".yellow()),
        },
        Command::Open => {
            let opened = match service.last_recommendation().await {
                Some(view) => view.open_recipe(&SystemUrlOpener).await,
                None => false,
            };
            if !opened {
                println!("{}", "No recipe link to open.".yellow());
            }
        }
        Command::Profile { action } => profile(&service, action).await,
        Command::Session => match session::session_start(service.storage()).await {
            Some(start) => println!("Session started {}", start.to_rfc3339()),
            None => println!("{}", "No session recorded.".yellow()),
        },
    }
    Ok(ExitCode::SUCCESS)
}

/// Returns whether a recommendation was shown; failures are reported here.
async fn recommend(service: &MosesService, args: RecommendArgs) -> bool {
    let previous_feedback = match args.feedback {
        Some(kind) => service
            .last_recommendation()
            .await
            .map(|last| last.feedback(kind.into(), args.tweak.clone())),
        None => None,
    };
    let open = args.open;
    let ctx = build_context(args, previous_feedback);

    println!("{}", "Mixing something up...".dimmed());
    match service.recommend(&ctx).await {
        Ok(view) => {
            print_view(&view, false);
            if open && !view.open_recipe(&SystemUrlOpener).await {
                println!("{}", "Couldn't open the recipe link.".yellow());
            }
            true
        }
        Err(e) => {
            eprintln!("{} {}", "Couldn't get a recommendation:".red().bold(), e);
            eprintln!("Check your connection and try again.");
            false
        }
    }
}

/// A one-shot command has no form to time, so responseTime stays unset.
fn build_context(args: RecommendArgs, previous_feedback: Option<PreviousFeedback>) -> MosesContext {
    let drinks_consumed = match args.drinks.trim().parse::<u32>() {
        Ok(n) => DrinksConsumed::from(n),
        Err(_) => DrinksConsumed::from(args.drinks),
    };

    let selfie = (args.emotion.is_some() || args.similarity.is_some()).then(|| SelfieAnalysis {
        dominant_emotion: args.emotion,
        similarity_score: args.similarity,
    });

    context::build(
        ContextInputs {
            alcohol_type: args.alcohol,
            drinks_consumed,
            feeling: args.feeling,
            flavor_profile: args.flavor,
            current_mood: args.mood,
        },
        selfie,
        None,
        previous_feedback,
    )
}

async fn profile(service: &MosesService, action: ProfileAction) {
    let profiles = service.profiles();
    match action {
        ProfileAction::Show => match profiles.load().await {
            ProfileState::NoProfile => println!("{}", "No profile yet.".yellow()),
            ProfileState::Local(p) => {
                println!("{} {}", "Profile (local only):".bold(), p.id);
                println!("{}", "Reset your profile to enable syncing.".yellow());
            }
            ProfileState::Backend(p) => println!("{} {}", "Profile:".bold(), p.id.green()),
        },
        ProfileAction::Create {
            name,
            favorite_alcohol,
            flavor,
        } => {
            let state = profiles
                .create(ProfileDraft {
                    name,
                    favorite_alcohol,
                    flavor_profile: flavor,
                })
                .await;
            if let Some(p) = state.profile() {
                println!("{} {}", "Created profile".green(), p.id);
            }
        }
        ProfileAction::Reset => {
            let outcome = profiles.reset().await;
            println!("{}", outcome.message);
        }
    }
}

fn print_view(view: &RecommendationView, structured: bool) {
    println!();
    println!("{}", view.parsed.drink_name.bold().cyan());
    if view.parsed.has_recipe() {
        println!("{} {}", "Recipe:".bold(), view.parsed.recipe_url.underline());
    }
    println!();
    println!("{}", view.raw_text);

    if structured {
        let rec = view.structured();
        if !rec.alternatives.is_empty() {
            println!();
            println!("{}", "Alternatives:".bold());
            for alt in &rec.alternatives {
                match &alt.recipe_url {
                    Some(url) => println!("  - {} ({})", alt.name, url),
                    None => println!("  - {}", alt.name),
                }
            }
        }
        if let Some(tip) = &rec.safety_tip {
            println!("{} {}", "!".yellow().bold(), tip);
        }
        println!(
            "{} {}",
            rec.vibe_summary.emoji, rec.vibe_summary.description
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use moses::MosesError;
    use moses::profile::ProfileSync;
    use moses::requester::Recommender;
    use moses::storage::LocalStorage;
    use moses::store::{MemoryStore, StorageKey};

    use super::*;

    struct Unreachable;

    #[async_trait]
    impl Recommender for Unreachable {
        async fn request(&self, _context: &MosesContext) -> moses::Result<String> {
            Err(MosesError::Network("connection refused".to_string()))
        }
    }

    fn args() -> RecommendArgs {
        RecommendArgs {
            alcohol: "tequila".to_string(),
            drinks: "2".to_string(),
            feeling: "relaxed".to_string(),
            flavor: "citrus".to_string(),
            mood: "chill".to_string(),
            emotion: None,
            similarity: None,
            feedback: None,
            tweak: None,
            open: false,
        }
    }

    #[test]
    fn test_cli_context_has_no_response_time() {
        let ctx = build_context(args(), None);
        assert!(ctx.response_time.is_none());
        assert!(ctx.selfie_analysis.is_none());
        assert_eq!(ctx.alcohol_type, "tequila");
    }

    #[tokio::test]
    async fn test_failed_recommend_reports_failure_without_exiting() {
        let storage = LocalStorage::new(Arc::new(MemoryStore::new()));
        let service = MosesService::with_parts(
            storage.clone(),
            Arc::new(Unreachable),
            ProfileSync::new(storage.clone(), None),
        );

        assert!(!recommend(&service, args()).await);
        assert!(storage.get(StorageKey::LastRecommendation).await.is_none());
    }
}

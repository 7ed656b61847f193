use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand, ValueEnum};
use course_migrator::{
    Config, Course, PgConnector, PgCourseSource, Plan, RunOptions, Runner, Scope, Selection,
};

mod output;

#[derive(Parser)]
#[command(name = "course-migrator")]
#[command(about = "Apply schema migrations to the system database and every course database")]
struct Args {
    /// Database configuration file
    #[arg(
        short,
        long,
        env = "COURSE_MIGRATOR_CONFIG",
        default_value = "config/database.json"
    )]
    config: PathBuf,

    /// Environments to migrate, all of them when omitted
    #[arg(short, long = "environment", value_enum)]
    environment: Vec<Environment>,

    /// Only migrate this course
    #[arg(long, num_args = 2, value_names = ["TERM", "COURSE"])]
    course: Option<Vec<String>>,

    /// Course databases migrated at the same time
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Environment {
    System,
    Course,
}

impl From<Environment> for Scope {
    fn from(value: Environment) -> Self {
        match value {
            Environment::System => Scope::System,
            Environment::Course => Scope::Course,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations
    Up {
        /// Stop after this migration
        #[arg(long)]
        to: Option<String>,

        /// Mark as applied without running them
        #[arg(long)]
        fake: bool,
    },
    /// Roll back applied migrations, the most recent one by default
    Down {
        /// Roll back everything after this migration
        #[arg(long, conflicts_with = "all")]
        to: Option<String>,

        /// Roll back every applied migration
        #[arg(long)]
        all: bool,

        /// Remove the applied records without running them
        #[arg(long)]
        fake: bool,
    },
    /// Show applied and pending migrations of each database
    Status,
    /// List registered migrations
    List,
}

impl Args {
    fn selection(&self) -> Selection {
        let mut selection = Selection::default();

        if !self.environment.is_empty() {
            selection = selection.scopes(self.environment.iter().copied().map(Scope::from));
        }

        if let Some([semester, course]) = self.course.as_deref() {
            selection = selection.course(Course::new(semester, course));
        }

        selection
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("course_migrator=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let registry = course_migrator_units::new()?;

    if let Command::List = args.command {
        output::print_registry(&registry);

        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::from_file(&args.config)?;
    let runner = Runner::new(
        registry,
        PgConnector::new(&config),
        PgCourseSource::new(&config),
        config,
    );

    let cancel = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing the current migration");
            cancel.cancel();
        }
    });

    let plan = match &args.command {
        Command::Up { to, fake } => to
            .as_ref()
            .map_or_else(Plan::apply_all, Plan::apply_to)
            .fake(*fake),
        Command::Down { to, all, fake } => match (to, all) {
            (Some(to), _) => Plan::revert_to(to),
            (None, true) => Plan::revert_all(),
            (None, false) => Plan::revert_last(1),
        }
        .fake(*fake),
        Command::Status => {
            let statuses = runner.status(&args.selection()).await?;
            let healthy = output::print_status(&statuses);

            return Ok(if healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
        Command::List => unreachable!("handled before connecting"),
    };

    let options = RunOptions::new(plan)
        .selection(args.selection())
        .jobs(args.jobs);
    let report = runner.run_all(&options).await?;

    output::print_report(&report);

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

mod error;
mod args;
mod conn;
mod run;

fn commands() -> clap::Command {
    use clap::{Command, Arg, ArgAction};

    Command::new("mfgsite-db")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(args::with_connection(
            Command::new("setup")
                .about("creates the database tables from scratch")
                .arg(
                    Arg::new("rollback")
                        .long("rollback")
                        .action(ArgAction::SetTrue)
                        .help("rollback changes made to the database")
                )
                .arg(
                    Arg::new("dir")
                        .long("dir")
                        .action(ArgAction::Set)
                        .help("directory of sql files to apply. defaults to db/setup/postgres")
                )
        ))
        .subcommand(args::with_connection(
            Command::new("promote")
                .about("makes an existing account an approved admin")
                .arg(args::email())
        ))
}

fn main() {
    use tokio::runtime::Builder;
    use tracing_subscriber::{FmtSubscriber, EnvFilter};

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to initialize global tracing subscriber: {err}");
    }

    let matches = commands().get_matches();

    let rt = match Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .max_blocking_threads(1)
        .build() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to start tokio runtime, {err:#}");

            std::process::exit(1);
        }
    };

    if let Err(err) = rt.block_on(exec(&matches)) {
        eprintln!("{err}");

        std::process::exit(1);
    }
}

async fn exec(matches: &clap::ArgMatches) -> error::Result<()> {
    match matches.subcommand() {
        Some(("setup", setup_matches)) => run::setup(setup_matches).await,
        Some(("promote", promote_matches)) => run::promote(promote_matches).await,
        _ => Err(error::Error::new()
            .kind("UnknownCommand")
            .message("no known command was given"))
    }
}

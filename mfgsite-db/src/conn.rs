use std::str::FromStr;

use clap::ArgMatches;
use tokio_postgres::{Client, Config, NoTls};

use crate::error;

fn config_from_args(args: &ArgMatches) -> error::Result<Config> {
    if let Some(connect) = args.get_one::<String>("connect") {
        return Ok(Config::from_str(connect.as_str())?);
    }

    let user = args.get_one::<String>("user")
        .ok_or("missing postgres user")?;
    let host = args.get_one::<String>("host")
        .ok_or("missing postgres host")?;
    let port = args.get_one::<u16>("port")
        .ok_or("missing postgres port")?;
    let dbname = args.get_one::<String>("dbname")
        .ok_or("missing postgres dbname")?;

    let mut config = Config::new();
    config.user(user.as_str());
    config.host(host.as_str());
    config.port(*port);
    config.dbname(dbname.as_str());

    if args.get_flag("req_password") {
        let input = rpassword::prompt_password(format!("{user} password: "))?;

        config.password(input.trim_end_matches(['\r', '\n']));
    } else if let Some(pass) = args.get_one::<String>("password") {
        config.password(pass.as_str());
    }

    Ok(config)
}

pub async fn postgres(args: &ArgMatches) -> error::Result<Client> {
    let (client, conn) = config_from_args(args)?
        .connect(NoTls)
        .await?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::error!("postgres connection error: {e}");
        }
    });

    Ok(client)
}

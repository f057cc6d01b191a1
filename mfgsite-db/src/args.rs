use clap::{Arg, ArgAction, Command, value_parser};

/// adds the postgres connection arguments to a command. either a full
/// connection string or the individual parts may be given
pub fn with_connection(cmd: Command) -> Command {
    cmd.arg(
            Arg::new("connect")
                .short('c')
                .long("connect")
                .action(ArgAction::Set)
                .help("connection string for postgres")
                .conflicts_with_all(["user", "password", "req_password", "host", "port", "dbname"])
        )
        .arg(
            Arg::new("user")
                .short('u')
                .long("user")
                .action(ArgAction::Set)
                .default_value("postgres")
                .help("user for postgres connection")
        )
        .arg(
            Arg::new("password")
                .short('P')
                .long("password")
                .action(ArgAction::Set)
                .help("password for postgres connection")
                .conflicts_with("req_password")
        )
        .arg(
            Arg::new("req_password")
                .long("req-password")
                .action(ArgAction::SetTrue)
                .help("prompts for the password before connecting")
        )
        .arg(
            Arg::new("host")
                .long("host")
                .action(ArgAction::Set)
                .default_value("localhost")
                .help("host for postgres connection")
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .action(ArgAction::Set)
                .default_value("5432")
                .value_parser(value_parser!(u16))
                .help("port for postgres connection")
        )
        .arg(
            Arg::new("dbname")
                .long("dbname")
                .action(ArgAction::Set)
                .default_value("mfgsite")
                .help("dbname for postgres connection")
        )
}

pub fn email() -> Arg {
    Arg::new("email")
        .long("email")
        .action(ArgAction::Set)
        .required(true)
        .help("email of the account to modify")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn connect_conflicts_with_parts() {
        let cmd = with_connection(Command::new("test"));

        assert!(cmd.clone().try_get_matches_from(["test", "-c", "host=db", "--dbname", "other"]).is_err());

        let matches = cmd.try_get_matches_from(["test", "--port", "6543"]).unwrap();

        assert_eq!(matches.get_one::<u16>("port"), Some(&6543));
        assert_eq!(matches.get_one::<String>("dbname").map(String::as_str), Some("mfgsite"));
    }
}

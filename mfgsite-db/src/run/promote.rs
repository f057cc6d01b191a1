use clap::ArgMatches;

use crate::error;
use crate::conn;

/// turns an existing account into an approved admin. used to bootstrap the
/// first admin that can then approve everyone else
pub async fn run(args: &ArgMatches) -> error::Result<()> {
    let email = args.get_one::<String>("email")
        .ok_or("missing email")?;

    if !mfgsite_lib::validation::email_valid(email) {
        return Err(error::Error::new()
            .kind("InvalidEmail")
            .message(format!("\"{email}\" is not a valid email")));
    }

    let conn = conn::postgres(args).await?;

    let updated = conn.execute(
        "\
        update users \
        set role = 1, \
            is_approved = true, \
            approved_at = coalesce(approved_at, now()), \
            updated = now() \
        where email = $1",
        &[email]
    ).await?;

    if updated == 0 {
        return Err(error::Error::new()
            .kind("UserNotFound")
            .message(format!("no account found for \"{email}\"")));
    }

    println!("{email} is now an approved admin");

    Ok(())
}

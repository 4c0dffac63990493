pub mod firebase;
pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_DISPLAY_NAME: &str = "display-name";
pub const ARG_PROVIDER: &str = "provider";
pub const ARG_ID_TOKEN: &str = "id-token";
pub const ARG_POLL_SECONDS: &str = "poll-seconds";
pub const ARG_RESEND: &str = "resend";

fn email_arg() -> Arg {
    Arg::new(ARG_EMAIL)
        .long(ARG_EMAIL)
        .help("Account email address")
        .env("GATEHOUSE_EMAIL")
        .required(true)
}

fn password_arg() -> Arg {
    Arg::new(ARG_PASSWORD)
        .long(ARG_PASSWORD)
        .help("Account password")
        .env("GATEHOUSE_PASSWORD")
        .hide_env_values(true)
        .required(true)
}

fn signup() -> Command {
    Command::new("signup")
        .about("Create an account and its profile")
        .arg(email_arg())
        .arg(password_arg())
        .arg(
            Arg::new(ARG_DISPLAY_NAME)
                .long(ARG_DISPLAY_NAME)
                .help("Name shown on the profile")
                .required(true),
        )
}

fn signin() -> Command {
    Command::new("signin")
        .about("Sign in with email and password")
        .arg(email_arg())
        .arg(password_arg())
}

fn federated() -> Command {
    Command::new("federated")
        .about("Sign in with a token issued by Google or Facebook")
        .arg(
            Arg::new(ARG_PROVIDER)
                .long(ARG_PROVIDER)
                .help("Federated provider")
                .value_parser(["google", "facebook"])
                .required(true),
        )
        .arg(
            Arg::new(ARG_ID_TOKEN)
                .long(ARG_ID_TOKEN)
                .help("Token obtained from the provider's consent screen; without it the sign-in counts as cancelled")
                .env("GATEHOUSE_ID_TOKEN")
                .hide_env_values(true),
        )
}

fn verify() -> Command {
    Command::new("verify")
        .about("Sign in and wait until the account email is verified")
        .arg(email_arg())
        .arg(password_arg())
        .arg(
            Arg::new(ARG_POLL_SECONDS)
                .long(ARG_POLL_SECONDS)
                .help("Seconds between verification checks")
                .default_value("3")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_RESEND)
                .long(ARG_RESEND)
                .help("Send a new verification email before waiting")
                .action(ArgAction::SetTrue),
        )
}

fn demo() -> Command {
    Command::new("demo").about("Walk through the sign-up and sign-in flows against in-memory backends")
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("gatehouse")
        .about("Session and profile coordination")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(signup())
        .subcommand(signin())
        .subcommand(federated())
        .subcommand(verify())
        .subcommand(demo());

    let command = firebase::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "gatehouse");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Session and profile coordination".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_signup_args() {
        let matches = new().get_matches_from(vec![
            "gatehouse",
            "--api-key",
            "key",
            "signup",
            "--email",
            "alice@example.com",
            "--password",
            "secret1",
            "--display-name",
            "Alice",
        ]);

        assert_eq!(matches.subcommand_name(), Some("signup"));
        let sub = matches.subcommand_matches("signup");
        assert_eq!(
            sub.and_then(|m| m.get_one::<String>(ARG_DISPLAY_NAME)).cloned(),
            Some("Alice".to_string())
        );
        assert_eq!(
            matches.get_one::<String>(firebase::ARG_API_KEY).cloned(),
            Some("key".to_string())
        );
    }

    #[test]
    fn test_verify_defaults() {
        temp_env::with_vars(
            [
                ("GATEHOUSE_EMAIL", Some("bob@example.com")),
                ("GATEHOUSE_PASSWORD", Some("secret1")),
            ],
            || {
                let matches = new().get_matches_from(vec!["gatehouse", "verify"]);
                let sub = matches.subcommand_matches("verify");
                assert_eq!(
                    sub.and_then(|m| m.get_one::<u64>(ARG_POLL_SECONDS)).copied(),
                    Some(3)
                );
                assert_eq!(sub.map(|m| m.get_flag(ARG_RESEND)), Some(false));
                assert_eq!(
                    sub.and_then(|m| m.get_one::<String>(ARG_EMAIL)).cloned(),
                    Some("bob@example.com".to_string())
                );
            },
        );
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let result = new().try_get_matches_from(vec![
            "gatehouse",
            "verify",
            "--email",
            "bob@example.com",
            "--password",
            "secret1",
            "--poll-seconds",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let result = new().try_get_matches_from(vec![
            "gatehouse",
            "federated",
            "--provider",
            "myspace",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_check_log_level_verbosity() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars([("GATEHOUSE_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["gatehouse".to_string(), "demo".to_string()];

                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches
                        .get_one::<u8>(logging::ARG_VERBOSITY)
                        .copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }
}

use crate::configuration::Configuration;
use chrono::Weekday;
use clap::Parser;

/// Availability and booking scheduling service
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct ConfigurationHandler {
    /// Password expected in the `x-admin-password` header of administrator requests
    #[arg(long, env = "ADMIN_PASSWORD")]
    password: String,

    /// Port the http server listens on
    #[arg(long, env = "PORT", default_value = "3000")]
    port: String,

    /// PostgreSQL connection url. Slots and bookings are kept in memory when omitted
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// First weekday of the "this week" booking view, e.g. "sunday" or "mon"
    #[arg(long, env = "WEEK_START", default_value = "sunday", value_parser = parse_weekday)]
    week_start: Weekday,
}

fn parse_weekday(value: &str) -> Result<Weekday, String> {
    value
        .parse::<Weekday>()
        .map_err(|_| format!("'{value}' is not a weekday"))
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        if let Err(err) = dotenvy::dotenv() {
            tracing::debug!(?err, "No .env file loaded");
        }
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn password(&self) -> String {
        self.password.clone()
    }

    fn port(&self) -> String {
        self.port.clone()
    }

    fn database_url(&self) -> Option<String> {
        self.database_url.clone()
    }

    fn week_start(&self) -> Weekday {
        self.week_start
    }
}

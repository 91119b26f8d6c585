// CLI argument definitions
use crate::model::Operator;
use crate::normalizer::DirectionMatch;
use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
pub struct SharedOptions {
    /// JSON file holding the API key and the configured routes
    #[arg(short = 's', long = "settings", default_value = "leave-settings.json")]
    pub settings: String,
    /// Retrieve the data from an alternate source. The source must deliver json-data that matches
    /// the 511.org transit API.
    #[arg(short = 'u', long = "api-url", default_value = crate::transit_api::API_URL)]
    pub api_url: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a long-lived http server that keeps the departure board fresh
    Serve {
        #[command(flatten)]
        shared_options: SharedOptions,
        /// Host the webapp on this particular port
        #[arg(short = 'p', long = "port", default_value = "4500")]
        port: u16,
        /// Refresh departures every fetch-interval seconds. 0 turns periodic refresh off.
        #[arg(short = 'i', long = "fetch-interval-seconds", default_value = "30")]
        fetch_interval_seconds: u16,
        /// How a departure's destination is compared with the arrival station
        #[arg(long = "direction-match", value_enum, default_value_t)]
        direction_match: DirectionMatch,
    },
    /// Resolve the active route for a position and print its next departures
    Departures {
        #[command(flatten)]
        shared_options: SharedOptions,
        #[arg(long = "lat", allow_hyphen_values = true)]
        lat: f64,
        #[arg(long = "lon", allow_hyphen_values = true)]
        lon: f64,
        #[arg(long = "direction-match", value_enum, default_value_t)]
        direction_match: DirectionMatch,
    },
    /// List the stops of an operator
    Stops {
        #[command(flatten)]
        shared_options: SharedOptions,
        #[arg(short = 'o', long = "operator", value_enum)]
        operator: Operator,
    },
    /// List the lines of an operator
    Lines {
        #[command(flatten)]
        shared_options: SharedOptions,
        #[arg(short = 'o', long = "operator", value_enum)]
        operator: Operator,
    },
    /// Manage configured routes
    Routes {
        #[command(flatten)]
        shared_options: SharedOptions,
        #[command(subcommand)]
        command: RouteCommands,
    },
    /// Store the 511.org API key
    SetKey {
        #[command(flatten)]
        shared_options: SharedOptions,
        key: String,
    },
    /// Forget the API key and every configured route
    Clear {
        #[command(flatten)]
        shared_options: SharedOptions,
    },
}

#[derive(Subcommand)]
pub enum RouteCommands {
    List,
    Add {
        #[arg(long = "name")]
        name: String,
        #[arg(short = 'o', long = "operator", value_enum)]
        operator: Operator,
        /// Only show departures on this line. Empty shows every line.
        #[arg(long = "line", default_value = "")]
        line: String,
        /// Stop code of the origin station
        #[arg(long = "from")]
        from: String,
        #[arg(long = "from-name")]
        from_name: Option<String>,
        #[arg(long = "from-lat", allow_hyphen_values = true, requires = "from_lon")]
        from_lat: Option<f64>,
        #[arg(long = "from-lon", allow_hyphen_values = true, requires = "from_lat")]
        from_lon: Option<f64>,
        /// Stop code of the destination station
        #[arg(long = "to")]
        to: Option<String>,
        #[arg(long = "to-name", requires = "to")]
        to_name: Option<String>,
        #[arg(long = "to-lat", allow_hyphen_values = true, requires_all = ["to", "to_lon"])]
        to_lat: Option<f64>,
        #[arg(long = "to-lon", allow_hyphen_values = true, requires_all = ["to", "to_lat"])]
        to_lon: Option<f64>,
    },
    Remove {
        id: Uuid,
    },
}

#[derive(Parser)]
#[command(name = "leave")]
#[command(about = "Show when to leave for the next departure from the closest configured station")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Leave {
    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_consistent() {
        Leave::command().debug_assert();
    }

    #[test]
    fn negative_longitudes_parse() {
        let args = Leave::try_parse_from([
            "leave", "departures", "--lat", "37.8", "--lon", "-122.27",
        ])
        .unwrap();
        let Commands::Departures { lon, shared_options, .. } = args.command else {
            panic!("expected departures");
        };
        assert_eq!(lon, -122.27);
        assert_eq!(shared_options.settings, "leave-settings.json");
    }

    #[test]
    fn operators_parse_by_code() {
        let args = Leave::try_parse_from(["leave", "stops", "--operator", "BA"]).unwrap();
        assert!(matches!(
            args.command,
            Commands::Stops {
                operator: Operator::Bart,
                ..
            }
        ));
    }
}

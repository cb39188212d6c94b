use clap::{Parser, Subcommand};

/// navgate, the navigation API gateway
#[derive(Parser)]
#[command(name = "navgate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to bind; falls back to NAVGATE_PORT, then 8080
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage client companies
    Company {
        #[command(subcommand)]
        command: CompanyCommands,
    },

    /// Manage subscription plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },

    /// Manage company subscriptions
    Subscription {
        #[command(subcommand)]
        command: SubscriptionCommands,
    },
}

#[derive(Subcommand)]
pub enum CompanyCommands {
    /// Register a new company
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        contact_email: String,
        #[arg(long)]
        country: Option<String>,
    },
    /// List companies
    List,
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Create a new plan
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Monthly price, e.g. 4999.00
        #[arg(long)]
        price_monthly: String,
        /// Monthly API hit quota; omit for unlimited
        #[arg(long)]
        api_hit_limit: Option<i32>,
        /// Concurrent connection cap; omit for unlimited
        #[arg(long)]
        concurrent_connections: Option<i32>,
    },
    /// List active plans
    List,
}

#[derive(Subcommand)]
pub enum SubscriptionCommands {
    /// Create a subscription and mint its API key
    Create {
        #[arg(long)]
        company_id: i64,
        #[arg(long)]
        plan_id: i64,
        /// Subscription length in days
        #[arg(long, default_value = "365")]
        days: i64,
    },
    /// List subscriptions, optionally for one company
    List {
        #[arg(long)]
        company_id: Option<i64>,
    },
    /// Cancel an active subscription
    Cancel {
        #[arg(long)]
        id: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_port_is_optional_so_config_decides() {
        let cli = Cli::try_parse_from(["navgate", "serve"]).unwrap();
        match cli.command {
            Some(Commands::Serve { port }) => assert_eq!(port, None),
            _ => panic!("expected serve"),
        }

        let cli = Cli::try_parse_from(["navgate", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Some(Commands::Serve { port }) => assert_eq!(port, Some(9000)),
            _ => panic!("expected serve"),
        }
    }
}

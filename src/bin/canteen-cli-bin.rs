use anyhow::{Context, Result};
use canteen_portal_rs::data_backend::{is_ordering_cutoff, site_now};
use canteen_portal_rs::data_types::gourmet_data_types::CartItem;
use canteen_portal_rs::shared_main::logger_init;
use canteen_portal_rs::{GourmetApi, SiteConfig, VentopayApi};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;

/// Command line access to the Gourmet cafeteria and Ventopay POS portals.
/// {n}Results are printed as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, env = "GOURMET_USER")]
    gourmet_user: Option<String>,
    #[arg(long, env = "GOURMET_PASSWORD", hide_env_values = true)]
    gourmet_password: Option<String>,
    #[arg(long, env = "VENTOPAY_USER")]
    ventopay_user: Option<String>,
    #[arg(long, env = "VENTOPAY_PASSWORD", hide_env_values = true)]
    ventopay_password: Option<String>,
    /// Override the Gourmet site, e.g. for a local mirror
    #[arg(long, env = "GOURMET_BASE_URL")]
    gourmet_base_url: Option<String>,
    #[arg(long, env = "VENTOPAY_BASE_URL")]
    ventopay_base_url: Option<String>,
    /// Enable verbose logging (request timings){n}[SETS env: RUST_LOG=debug]
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    #[command(flatten)]
    Gourmet(GourmetCommand),
    /// Ventopay transactions between two days (YYYY-MM-DD, inclusive)
    Transactions {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        until: NaiveDate,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
enum GourmetCommand {
    /// List all menus currently offered
    Menus,
    /// List ordered menus
    Orders,
    /// Put menus of one day into the cart (YYYY-MM-DD), confirm afterwards
    Order {
        date: NaiveDate,
        #[arg(required = true)]
        menu_ids: Vec<String>,
    },
    /// Confirm pending orders
    Confirm,
    /// Cancel ordered positions
    Cancel {
        #[arg(required = true)]
        position_ids: Vec<String>,
    },
    /// Gourmet bills and totals of one month
    Billing {
        /// 0 is the current month
        #[arg(long, default_value_t = 0)]
        months_back: u32,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn credentials(user: Option<String>, password: Option<String>, site: &str) -> Result<(String, String)> {
    let user = user.with_context(|| format!("no {} user given", site))?;
    let password = password.with_context(|| format!("no {} password given", site))?;
    Ok((user, password))
}

async fn run_gourmet(api: &mut GourmetApi, command: GourmetCommand) -> Result<()> {
    match command {
        GourmetCommand::Menus => print_json(&api.get_menus().await?),
        GourmetCommand::Orders => print_json(&api.get_orders().await?),
        GourmetCommand::Order { date, menu_ids } => {
            if is_ordering_cutoff(date, site_now()) {
                log::warn!("Ordering for today closed at 12:30, the site will likely refuse");
            }
            let items: Vec<CartItem> = menu_ids
                .into_iter()
                .map(|menu_id| CartItem { date, menu_id })
                .collect();
            api.add_to_cart(&items).await?;
            log::info!("Added {} menus for {}, run `confirm` to place the order", items.len(), date);
            Ok(())
        }
        GourmetCommand::Confirm => Ok(api.confirm_orders().await?),
        GourmetCommand::Cancel { position_ids } => Ok(api.cancel_orders(&position_ids).await?),
        GourmetCommand::Billing { months_back } => {
            let today = site_now().date();
            print_json(&api.get_billing_month(months_back, today).await?)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }

    logger_init(module_path!());

    match args.command {
        Command::Transactions { from, until } => {
            let mut config = SiteConfig::ventopay();
            if let Some(url) = args.ventopay_base_url {
                config = config.with_base_url(url);
            }
            let (user, password) =
                credentials(args.ventopay_user, args.ventopay_password, "Ventopay")?;

            let mut api = VentopayApi::new(config)?;
            api.login(&user, &password).await?;
            let result = api.get_transactions(from, until).await;
            api.logout().await?;

            print_json(&result?)
        }
        Command::Gourmet(command) => {
            let mut config = SiteConfig::gourmet();
            if let Some(url) = args.gourmet_base_url {
                config = config.with_base_url(url);
            }
            let (user, password) = credentials(args.gourmet_user, args.gourmet_password, "Gourmet")?;

            let mut api = GourmetApi::new(config)?;
            api.login(&user, &password).await?;
            let result = run_gourmet(&mut api, command).await;
            api.logout().await?;

            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Command {
        Args::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn transactions_are_a_top_level_command() {
        let day = |d| NaiveDate::from_ymd_opt(2026, 2, d).unwrap();
        assert_eq!(
            parse(&["canteen-cli", "transactions", "--from", "2026-02-01", "--until", "2026-02-28"]),
            Command::Transactions { from: day(1), until: day(28) }
        );
    }

    #[test]
    fn gourmet_commands_are_flattened() {
        assert_eq!(parse(&["canteen-cli", "menus"]), Command::Gourmet(GourmetCommand::Menus));
        assert_eq!(
            parse(&["canteen-cli", "cancel", "POS-001", "POS-002"]),
            Command::Gourmet(GourmetCommand::Cancel {
                position_ids: vec!["POS-001".into(), "POS-002".into()]
            })
        );
        assert_eq!(
            parse(&["canteen-cli", "billing", "--months-back", "2"]),
            Command::Gourmet(GourmetCommand::Billing { months_back: 2 })
        );
        assert!(Args::try_parse_from(["canteen-cli", "cancel"]).is_err());
    }
}

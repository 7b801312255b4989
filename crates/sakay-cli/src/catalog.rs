//! # Catalog Subcommand
//!
//! Validates a pricing catalog the way the API loads it at startup and
//! prints the effective tariff and promo list.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use sakay_pricing::{DiscountKind, PricingCatalog};

/// Arguments for the `sakay catalog` subcommand.
#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Catalog YAML file.
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

/// Execute the catalog subcommand.
///
/// Returns exit code: 0 when valid, 1 when the catalog is rejected.
pub fn run_catalog(args: &CatalogArgs) -> Result<u8> {
    match PricingCatalog::from_path(&args.path) {
        Ok(catalog) => {
            print!("{}", summarize(&catalog)?);
            Ok(0)
        }
        Err(err) => {
            println!("FAIL: {err}");
            Ok(1)
        }
    }
}

/// Effective rates per class, then one line per promo.
pub fn summarize(catalog: &PricingCatalog) -> Result<String> {
    let tariff = catalog.tariff()?;
    let mut out = String::from("Tariff:\n");
    for (class, rate) in tariff.iter() {
        writeln!(
            out,
            "  {:<10} base {} + {}/km + {}/min",
            class.as_str(),
            rate.base,
            rate.per_km,
            rate.per_minute
        )?;
    }
    writeln!(out, "Promos: {}", catalog.promos.len())?;
    for promo in &catalog.promos {
        let discount = match promo.discount {
            DiscountKind::Percentage { bps } => format!("{}% off", f64::from(bps) / 100.0),
            DiscountKind::Fixed { amount } => format!("{amount} off"),
            DiscountKind::FreeDelivery => "free delivery".to_string(),
        };
        writeln!(
            out,
            "  {:<12} {discount}, {} until {}",
            promo.key(),
            promo.scope,
            promo.valid_until
        )?;
    }
    Ok(out)
}

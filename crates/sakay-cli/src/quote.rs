//! # Quote Subcommand
//!
//! Prices a trip offline. With `--promo` the code is looked up in the
//! catalog and validated as of now; nothing is consumed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use sakay_core::{RequestType, RequesterId, Timestamp, VehicleClass};
use sakay_pricing::{FareQuote, PromoBook, QuoteInput, SurgeMultiplier};

/// Arguments for the `sakay quote` subcommand.
#[derive(Args, Debug)]
pub struct QuoteArgs {
    /// Routed distance in meters.
    #[arg(long = "distance-m")]
    pub distance_m: i64,

    /// Routed duration in seconds.
    #[arg(long = "duration-s")]
    pub duration_s: i64,

    /// Vehicle class: motorcycle, car or suv.
    #[arg(long, default_value = "car")]
    pub class: VehicleClass,

    /// Surge multiplier, e.g. 1.5.
    #[arg(long, default_value_t = 1.0)]
    pub surge: f64,

    /// Request type, used for promo scope.
    #[arg(long = "type", default_value = "ride")]
    pub request_type: RequestType,

    /// Promo code from the catalog.
    #[arg(long)]
    pub promo: Option<String>,

    /// Requester whose per-user cap is checked.
    #[arg(long, default_value = "cli")]
    pub requester: String,

    /// Pricing catalog YAML.
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Print the quote as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the quote subcommand. Returns the process exit code.
pub fn run_quote(args: &QuoteArgs) -> Result<u8> {
    let catalog = crate::load_catalog(args.catalog.as_deref())?;
    let tariff = catalog.tariff().context("catalog tariff")?;
    let input = QuoteInput {
        distance_meters: args.distance_m,
        duration_seconds: args.duration_s,
        vehicle_class: args.class,
        surge: SurgeMultiplier::from_f64(args.surge)?,
    };

    let undiscounted = tariff.quote(&input, None)?;
    let fare = match &args.promo {
        Some(code) => {
            let book = PromoBook::with_promos(catalog.promos)?;
            let requester = RequesterId::new(args.requester.as_str())?;
            match book.validate(
                code,
                undiscounted.subtotal(),
                args.request_type,
                &requester,
                Timestamp::now(),
            ) {
                Ok(descriptor) => tariff.quote(&input, Some(&descriptor))?,
                Err(err) => {
                    println!("Promo refused: {err}");
                    return Ok(1);
                }
            }
        }
        None => undiscounted,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&fare)?);
    } else {
        print!("{}", render(&fare, input.surge));
    }
    Ok(0)
}

/// Human-readable fare breakdown.
pub fn render(fare: &FareQuote, surge: SurgeMultiplier) -> String {
    let mut out = String::new();
    let mut line = |label: &str, value: String| {
        out.push_str(&format!("{label:<10} {value:>12}\n"));
    };
    line("Base", fare.base.to_string());
    line("Distance", fare.distance_portion.to_string());
    line("Time", fare.time_portion.to_string());
    if surge.is_surging() {
        line(&format!("Surge {}x", surge.as_f64()), fare.surge_amount.to_string());
    }
    if !fare.discount_amount.is_zero() {
        line("Discount", format!("-{}", fare.discount_amount));
    }
    line("Total", fare.total.to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sakay_pricing::Tariff;

    fn input(surge: f64) -> QuoteInput {
        QuoteInput {
            distance_meters: 3200,
            duration_seconds: 720,
            vehicle_class: VehicleClass::Motorcycle,
            surge: SurgeMultiplier::from_f64(surge).unwrap(),
        }
    }

    #[test]
    fn render_lists_components_and_total() {
        let input = input(1.0);
        let fare = Tariff::standard().quote(&input, None).unwrap();
        let text = render(&fare, input.surge);
        assert!(text.contains("Base"));
        assert!(text.lines().last().unwrap().ends_with("₱77.60"));
        assert!(!text.contains("Surge"));
        assert!(!text.contains("Discount"));
    }

    #[test]
    fn render_shows_surge_when_surging() {
        let input = input(1.5);
        let fare = Tariff::standard().quote(&input, None).unwrap();
        assert!(render(&fare, input.surge).contains("Surge 1.5x"));
    }

    #[test]
    fn quote_without_catalog_succeeds() {
        let args = QuoteArgs {
            distance_m: 3200,
            duration_s: 720,
            class: VehicleClass::Motorcycle,
            surge: 1.0,
            request_type: RequestType::Ride,
            promo: None,
            requester: "cli".into(),
            catalog: None,
            json: true,
        };
        assert_eq!(run_quote(&args).unwrap(), 0);
    }

    #[test]
    fn unknown_promo_exits_with_one() {
        let args = QuoteArgs {
            distance_m: 3200,
            duration_s: 720,
            class: VehicleClass::Car,
            surge: 1.0,
            request_type: RequestType::Ride,
            promo: Some("NOPE".into()),
            requester: "cli".into(),
            catalog: None,
            json: false,
        };
        assert_eq!(run_quote(&args).unwrap(), 1);
    }
}

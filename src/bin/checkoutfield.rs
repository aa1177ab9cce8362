//! CLI tool for exercising the checkout field core.
//!
//! # Usage
//!
//! ```bash
//! # Format a card number by its network's gaps
//! checkoutfield format 378282246310005
//!
//! # Format expiry text
//! checkoutfield expiry 1225
//!
//! # Apply an edit to a field and print the result
//! checkoutfield edit card-number 42424 --start 4 --end 5
//! checkoutfield edit expiry-date 4225 --start 2 --end 3
//!
//! # Extract per-network surcharges from a configuration file
//! checkoutfield surcharges config.json
//!
//! # Run the default rule for a field
//! checkoutfield validate cvv 1234 --network AMEX
//! ```

use checkout_fields::config::parse_configuration;
use checkout_fields::edit::TextEdit;
use checkout_fields::expiry::format_expiry;
use checkout_fields::field::RecordingHost;
use checkout_fields::format::format_for_brand;
use checkout_fields::input::TextInput;
use checkout_fields::rules::{DefaultValidator, FieldValidator, RuleContext};
use checkout_fields::settings::DebounceSettings;
use checkout_fields::surcharge::extract_network_surcharges;
use checkout_fields::{detect, CardBrand, FieldKind};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "checkoutfield")]
#[command(author, version, about = "Card input formatting, validation, and surcharge tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format a card number using its detected network's gaps
    Format {
        /// Card number (separators are ignored)
        card_number: String,
    },

    /// Format expiry text as MM/YY
    Expiry {
        /// Expiry text, with or without a slash
        text: String,
    },

    /// Apply one edit to a field and print raw, formatted, and caret
    Edit {
        /// Field to edit
        field: FieldArg,

        /// Current raw value
        raw: String,

        /// Start of the edited range in the formatted value
        #[arg(short, long)]
        start: usize,

        /// End of the edited range; defaults to start
        #[arg(short, long)]
        end: Option<usize>,

        /// Inserted text; omit to delete the range
        #[arg(short, long, default_value = "")]
        text: String,
    },

    /// Extract per-network surcharges from a configuration JSON file
    Surcharges {
        /// Path to the configuration payload
        path: PathBuf,
    },

    /// Validate a value with the default rules
    Validate {
        /// Field to validate
        field: FieldArg,

        /// Raw value
        value: String,

        /// Card network, for network-dependent rules (e.g. AMEX)
        #[arg(short, long)]
        network: Option<String>,

        /// Billing country, for postal codes
        #[arg(short, long)]
        country: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FieldArg {
    CardNumber,
    Cvv,
    ExpiryDate,
    CardholderName,
    FirstName,
    LastName,
    AddressLine1,
    AddressLine2,
    City,
    State,
    PostalCode,
    CountryCode,
    Email,
    PhoneNumber,
    Otp,
}

impl From<FieldArg> for FieldKind {
    fn from(arg: FieldArg) -> Self {
        match arg {
            FieldArg::CardNumber => FieldKind::CardNumber,
            FieldArg::Cvv => FieldKind::Cvv,
            FieldArg::ExpiryDate => FieldKind::ExpiryDate,
            FieldArg::CardholderName => FieldKind::CardholderName,
            FieldArg::FirstName => FieldKind::FirstName,
            FieldArg::LastName => FieldKind::LastName,
            FieldArg::AddressLine1 => FieldKind::AddressLine1,
            FieldArg::AddressLine2 => FieldKind::AddressLine2,
            FieldArg::City => FieldKind::City,
            FieldArg::State => FieldKind::State,
            FieldArg::PostalCode => FieldKind::PostalCode,
            FieldArg::CountryCode => FieldKind::CountryCode,
            FieldArg::Email => FieldKind::Email,
            FieldArg::PhoneNumber => FieldKind::PhoneNumber,
            FieldArg::Otp => FieldKind::Otp,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Format { card_number } => cmd_format(&card_number),
        Commands::Expiry { text } => {
            println!("{}", format_expiry(&text));
            ExitCode::SUCCESS
        }
        Commands::Edit {
            field,
            raw,
            start,
            end,
            text,
        } => cmd_edit(field.into(), &raw, start, end.unwrap_or(start), text),
        Commands::Surcharges { path } => cmd_surcharges(&path),
        Commands::Validate {
            field,
            value,
            network,
            country,
        } => cmd_validate(field.into(), &value, network.as_deref(), country),
    }
}

fn cmd_format(card_number: &str) -> ExitCode {
    let digits: String = card_number.chars().filter(char::is_ascii_digit).collect();
    let brand = detect::detect_brand(&digits);
    println!("{}", format_for_brand(&digits, brand));
    if let Some(brand) = brand {
        println!("Network: {}", brand.name());
    }
    ExitCode::SUCCESS
}

fn cmd_edit(kind: FieldKind, raw: &str, start: usize, end: usize, text: String) -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "cannot start runtime");
            return ExitCode::FAILURE;
        }
    };

    let host = Arc::new(RecordingHost::default());
    let mut input = TextInput::new(
        RuleContext::new(kind),
        host.clone(),
        Arc::new(DefaultValidator),
        DebounceSettings::default(),
        runtime.handle().clone(),
    );
    let before = input.set_text(raw);
    debug!(field = %kind, start, end, "applying edit");
    let outcome = input.handle_edit(&TextEdit::replace(start..end, text));

    println!("Before: {}", before.formatted);
    println!("Raw: {}", outcome.raw);
    println!("Formatted: {}", outcome.formatted);
    println!("Cursor: {}", outcome.cursor);
    if let Some(network) = input.network() {
        println!("Network: {}", network.name());
    }
    if let Some(message) = input.on_blur().message() {
        println!("Error: {}", message);
    }
    ExitCode::SUCCESS
}

fn cmd_surcharges(path: &Path) -> ExitCode {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(path = %path.display(), error = %e, "cannot read configuration");
            return ExitCode::FAILURE;
        }
    };
    let configuration = match parse_configuration(&bytes) {
        Ok(configuration) => configuration,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let table = configuration.network_surcharges().or_else(|| {
        // Also accept a bare networks payload under "networks"
        serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .and_then(|value| extract_network_surcharges(value.get("networks")?))
    });
    match table {
        Some(table) => {
            for (network, amount) in table {
                println!("{}: {}", network, amount);
            }
        }
        None => println!("No surcharges"),
    }
    ExitCode::SUCCESS
}

fn cmd_validate(kind: FieldKind, value: &str, network: Option<&str>, country: Option<String>) -> ExitCode {
    let network = match network.map(str::parse::<CardBrand>).transpose() {
        Ok(network) => network,
        Err(e) => {
            error!(error = %e, "unknown network");
            return ExitCode::FAILURE;
        }
    };
    let mut context = RuleContext::new(kind).with_network(network);
    if let Some(country) = country {
        context = context.with_country_code(country);
    }

    let outcome = DefaultValidator.validate(value, &context);
    if outcome.is_valid {
        println!("Valid: yes");
        ExitCode::SUCCESS
    } else {
        println!("Valid: no");
        if let Some(message) = outcome.message {
            println!("Error: {}", message);
        }
        if let Some(code) = outcome.code {
            println!("Code: {}", code);
        }
        ExitCode::FAILURE
    }
}

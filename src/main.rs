//! Calt CLI - Command-line tool for ALT templates and ALU personalization.
//!
//! This is the main entry point for the calt command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use serde::Serialize;

use calt::common::hex::to_hex;
use calt::format::{IssueDate, IssueTime, SectionLengths};
use calt::prelude::*;

/// Calt - ALT template inspection and ALU builder
#[derive(Parser)]
#[command(name = "calt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the headers, sections and field descriptors of an ALT file
    Info {
        /// Path to the ALT file
        #[arg(short, long, env = "CALT_INPUT")]
        alt: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the personalization fields of an ALT file
    Fields {
        /// Path to the ALT file
        #[arg(short, long, env = "CALT_INPUT")]
        alt: PathBuf,

        /// Cardholder data file
        #[arg(short, long, env = "CALT_CDF")]
        cdf: Option<PathBuf>,

        /// Key material file
        #[arg(short, long, env = "CALT_KEYS")]
        keys: Option<PathBuf>,

        /// EMV tag list replacing the built-in one
        #[arg(short, long, env = "CALT_TAGS")]
        tags: Option<PathBuf>,
    },

    /// Build a personalized ALU file
    Build {
        /// Path to the ALT file
        #[arg(short, long, env = "CALT_INPUT")]
        alt: PathBuf,

        /// Output ALU file
        #[arg(short, long, env = "CALT_OUTPUT")]
        output: PathBuf,

        /// Cardholder data file
        #[arg(short, long, env = "CALT_CDF")]
        cdf: Option<PathBuf>,

        /// Key material file
        #[arg(short, long, env = "CALT_KEYS")]
        keys: Option<PathBuf>,

        /// Overwrite the output file if it exists
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { alt, json } => {
            cmd_info(&alt, json)?;
        }
        Commands::Fields {
            alt,
            cdf,
            keys,
            tags,
        } => {
            cmd_fields(&alt, cdf.as_deref(), keys.as_deref(), tags.as_deref())?;
        }
        Commands::Build {
            alt,
            output,
            cdf,
            keys,
            force,
        } => {
            cmd_build(&alt, &output, cdf.as_deref(), keys.as_deref(), force)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn open_alt(path: &Path) -> Result<AltFile> {
    let start = Instant::now();
    let alt = AltFile::open(path)
        .with_context(|| format!("Failed to read ALT file {}", path.display()))?;
    debug!("Parsed {} in {:?}", path.display(), start.elapsed());
    Ok(alt)
}

/// Classify fields and fill them from whichever providers were given.
fn prepare(alt: &AltFile, cdf: Option<&Path>, keys: Option<&Path>) -> Result<Personalization> {
    let mut session = Personalization::from_container(alt);

    if let Some(path) = cdf {
        let data = CardholderData::from_path(path)
            .with_context(|| format!("Failed to load cardholder data {}", path.display()))?;
        let ready = session.resolve(FieldOrigin::Cardholder, &data);
        info!("{} fields filled from {}", ready, path.display());
    }

    if let Some(path) = keys {
        let material = KeyMaterial::from_path(path)
            .with_context(|| format!("Failed to load key material {}", path.display()))?;
        let ready = session.resolve(FieldOrigin::KeyMaterial, &material);
        info!("{} fields filled from {}", ready, path.display());
    }

    Ok(session)
}

#[derive(Serialize)]
struct InfoReport<'a> {
    type_code: String,
    protection_method_id: u8,
    structure_method_id: u8,
    consignment_id: String,
    consignment_file_id: String,
    issue_date: IssueDate,
    issue_time: IssueTime,
    issuer_id: String,
    issuer_numeric_id: u32,
    integrity_hash: String,
    template_count: u16,
    template: TemplateReport,
    mcd: String,
    sections: SectionLengths,
    descriptors: &'a [FieldDescriptor],
}

#[derive(Serialize)]
struct TemplateReport {
    issuer_template_id: String,
    software_product_id: String,
    hash_modulus_id: u16,
    certificate_serial: String,
    provider_key_set_id: u8,
    master_key_index: u8,
    data_record_length: u32,
    field_count: usize,
    session_data_length: u16,
}

impl<'a> InfoReport<'a> {
    fn new(alt: &'a AltFile) -> Self {
        let header = alt.file_header();
        let template = alt.template_header();

        Self {
            type_code: header.type_code(),
            protection_method_id: header.protection_method_id,
            structure_method_id: header.structure_method_id,
            consignment_id: header.consignment_id(),
            consignment_file_id: header.consignment_file_id(),
            issue_date: header.issue_date(),
            issue_time: header.issue_time(),
            issuer_id: header.issuer_id(),
            issuer_numeric_id: header.issuer_numeric_id.get(),
            integrity_hash: header.integrity_hash_hex(),
            template_count: header.template_count.get(),
            template: TemplateReport {
                issuer_template_id: template.issuer_template_id_hex(),
                software_product_id: template.software_product_id_hex(),
                hash_modulus_id: template.hash_modulus_id.get(),
                certificate_serial: template.certificate_serial_hex(),
                provider_key_set_id: template.provider_key_set_id,
                master_key_index: template.master_key_index,
                data_record_length: template.data_record_length.get(),
                field_count: template.field_count(),
                session_data_length: template.session_data_length.get(),
            },
            mcd: to_hex(alt.mcd()),
            sections: alt.sections().lengths(),
            descriptors: alt.descriptors(),
        }
    }
}

fn cmd_info(path: &Path, json: bool) -> Result<()> {
    let alt = open_alt(path)?;
    let report = InfoReport::new(&alt);

    if json {
        let text = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", text);
        return Ok(());
    }

    println!("File: {}", path.display());
    println!("Type code:           {}", report.type_code);
    println!("Consignment:         {}", report.consignment_id);
    println!("Consignment file:    {}", report.consignment_file_id);
    println!("Issued:              {} {}", report.issue_date, report.issue_time);
    println!("Issuer:              {} ({})", report.issuer_id, report.issuer_numeric_id);
    println!("Integrity hash:      {}", report.integrity_hash);
    println!("Templates:           {}", report.template_count);
    println!();
    println!("Template:            {}", report.template.issuer_template_id);
    println!("Software product:    {}", report.template.software_product_id);
    println!("Certificate serial:  {}", report.template.certificate_serial);
    println!("Data record length:  {}", report.template.data_record_length);
    println!("MCD number:          {}", report.mcd);
    println!();
    for (region, section) in alt.sections().iter() {
        println!("{:<20} {:>6} bytes", region.name(), section.len());
    }
    println!();

    println!(
        "{:>3} {:<6} {:<4} {:<4} {:<4} {:<3} {:<16} {:<15} {:<11} Profile",
        "#", "Tag", "Len", "Addr", "Fmt", "Cat", "Source", "Usage", "Interface"
    );
    for descriptor in alt.descriptors() {
        println!(
            "{:>3} {:<6} {:<4} {:<4} {:<4} {:<3} {:<16} {:<15} {:<11} {}",
            descriptor.index + 1,
            descriptor.tag_hex(),
            descriptor.length_hex(),
            descriptor.address_hex(),
            descriptor.format.label(),
            match descriptor.category {
                DataCategory::Application => "APP",
                DataCategory::Fci => "FCI",
            },
            descriptor.source.label(),
            descriptor.usage.label(),
            descriptor.interface.label(),
            descriptor.profile
        );
    }
    println!("\nTotal: {} descriptors", alt.descriptors().len());

    Ok(())
}

fn cmd_fields(
    path: &Path,
    cdf: Option<&Path>,
    keys: Option<&Path>,
    tags: Option<&Path>,
) -> Result<()> {
    let alt = open_alt(path)?;
    let dictionary = match tags {
        Some(tags) => TagDictionary::from_path(tags)
            .with_context(|| format!("Failed to load tag list {}", tags.display()))?,
        None => TagDictionary::builtin().context("Failed to load built-in tag list")?,
    };
    let session = prepare(&alt, cdf, keys)?;

    for field in session.fields() {
        let descriptor = &field.descriptor;
        println!(
            "{:>3} {:<6} {} [{} {}, {}]",
            descriptor.index + 1,
            descriptor.short_tag(),
            dictionary.describe(&descriptor.tag_hex()),
            descriptor.format,
            descriptor.category,
            field.origin
        );
        println!("      status:  {}", field.status);
        println!("      current: {}", field.current_hex());
        if let Some(replacement) = field.replacement_hex() {
            if replacement != field.current_hex() {
                println!("      new:     {}", replacement);
            }
        }
    }

    let pending = session.pending();
    println!(
        "\nTotal: {} fields, {} ready, {} not ready",
        session.fields().len(),
        session.fields().len() - pending.len(),
        pending.len()
    );

    Ok(())
}

fn cmd_build(
    path: &Path,
    output: &Path,
    cdf: Option<&Path>,
    keys: Option<&Path>,
    force: bool,
) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let alt = open_alt(path)?;
    let mut session = prepare(&alt, cdf, keys)?;

    for pending in session.pending() {
        warn!("Field not ready: {}", pending);
    }

    let image = session
        .build(&alt)
        .with_context(|| format!("Failed to build ALU from {}", path.display()))?;
    fs::write(output, &image)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Wrote {} ({} bytes, {} fields)",
        output.display(),
        image.len(),
        session.fields().len()
    );

    Ok(())
}

use anyhow::{Context, Result, bail, format_err};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{LevelFilter, info};
use serde_json::{Map, Value as JsonValue, json};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use asm_templates::utils::{format_hexdump, parse_hex, to_hex_string};
use asm_templates::{
    Arch, Catalog, CatalogBuilder, CatalogEntry, FieldValues, Segment, Template, TemplateDefinition,
};

use std::path::PathBuf;
use std::process::exit;

#[derive(Copy, Clone, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn from_matches(matches: &ArgMatches) -> Self {
        match matches.get_one::<String>("format").map(String::as_str) {
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

struct AsmDump {
    catalog_paths: Vec<PathBuf>,
    verbosity_level: Option<LevelFilter>,
}

impl AsmDump {
    pub fn from_cli_matches(matches: &ArgMatches) -> Self {
        let catalog_paths = matches
            .get_many::<String>("catalog")
            .map(|paths| paths.map(PathBuf::from).collect())
            .unwrap_or_default();

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(LevelFilter::Info),
            2 => Some(LevelFilter::Debug),
            3 => Some(LevelFilter::Trace),
            _ => {
                eprintln!("using more than  -vvv does not affect verbosity level");
                Some(LevelFilter::Trace)
            }
        };

        AsmDump {
            catalog_paths,
            verbosity_level,
        }
    }

    /// Main entry point for `AsmDump`
    pub fn run(&self, matches: &ArgMatches) -> Result<()> {
        self.try_to_initialize_logging();
        let catalog = self.load_catalog()?;

        match matches.subcommand() {
            Some(("list", sub)) => self.list(&catalog, sub),
            Some(("show", sub)) => self.show(&catalog, sub),
            Some(("match", sub)) => self.match_bytes(&catalog, sub),
            Some(("substitute", sub)) => self.substitute(&catalog, sub),
            Some((other, _)) => bail!("unknown subcommand `{}`", other),
            None => bail!("a subcommand is required, see --help"),
        }
    }

    fn load_catalog(&self) -> Result<Catalog> {
        let mut builder = CatalogBuilder::new().with_builtins()?;
        for path in &self.catalog_paths {
            builder = builder.with_json_file(path).with_context(|| {
                format!("failed to load catalog definition `{}`", path.display())
            })?;
            info!("loaded catalog definition `{}`", path.display());
        }
        Ok(builder.build())
    }

    fn list(&self, catalog: &Catalog, matches: &ArgMatches) -> Result<()> {
        let entries = match matches.get_one::<String>("arch") {
            Some(arch) => {
                let arch: Arch = arch.parse().map_err(|e: String| format_err!(e))?;
                catalog.entries_for(arch)
            }
            None => catalog.entries(),
        };

        match OutputFormat::from_matches(matches) {
            OutputFormat::Text => {
                for entry in entries {
                    let template = entry.template();
                    let fields = template
                        .fields()
                        .map(|f| format!("{}:{}", f.name(), f.width()))
                        .collect::<Vec<_>>()
                        .join(", ");
                    println!(
                        "{:<36} {:<4} {:>3} bytes  {}",
                        entry.name(),
                        entry.arch().map(Arch::as_str).unwrap_or("-"),
                        template.byte_len(),
                        fields
                    );
                }
            }
            OutputFormat::Json => {
                let summaries: Vec<JsonValue> = entries.into_iter().map(summarize).collect();
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            }
        }
        Ok(())
    }

    fn show(&self, catalog: &Catalog, matches: &ArgMatches) -> Result<()> {
        let entry = catalog.entry(required(matches, "NAME"))?;
        let template = entry.template();

        if OutputFormat::from_matches(matches) == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&summarize(entry))?);
            return Ok(());
        }

        println!(
            "{} ({}, {} bytes)",
            entry.name(),
            entry.arch().map(Arch::as_str).unwrap_or("-"),
            template.byte_len()
        );
        for (offset, segment) in template.layout() {
            match segment {
                Segment::Literal(bytes) => {
                    println!("  {:#06x}  literal  {}", offset, to_hex_string(bytes))
                }
                Segment::Field(field) => println!(
                    "  {:#06x}  field    {} ({}, ends at {:#x})",
                    offset,
                    field.name(),
                    field.width(),
                    offset + field.byte_len()
                ),
            }
        }
        println!("{}", format_hexdump(&template.image(), 0, None));
        Ok(())
    }

    fn match_bytes(&self, catalog: &Catalog, matches: &ArgMatches) -> Result<()> {
        let name = required(matches, "NAME");
        let template = catalog.get(name)?;
        let buffer = parse_hex(required(matches, "HEX"))
            .map_err(|e| format_err!("invalid hex input: {}", e))?;

        let values = template
            .match_bytes(&buffer)
            .with_context(|| format!("buffer does not match `{}`", name))?;

        let values = values_in_layout_order(template, &values);
        println!("{}", serde_json::to_string_pretty(&values)?);
        Ok(())
    }

    fn substitute(&self, catalog: &Catalog, matches: &ArgMatches) -> Result<()> {
        let name = required(matches, "NAME");
        let template = catalog.get(name)?;

        let mut values = FieldValues::new();
        for assignment in matches.get_many::<String>("values").into_iter().flatten() {
            let (field, value) = parse_assignment(assignment)?;
            values.insert(field, value);
        }

        let bytes = template
            .instantiate(&values)
            .with_context(|| format!("failed to instantiate `{}`", name))?;
        println!("{}", to_hex_string(&bytes));
        Ok(())
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = TermLogger::init(
                level,
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {}", e);
            }
        }
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .expect("clap enforces required arguments")
}

fn summarize(entry: &CatalogEntry) -> JsonValue {
    let template = entry.template();
    let fields: Vec<JsonValue> = template
        .fields()
        .map(|field| {
            json!({
                "name": field.name(),
                "width": field.byte_len(),
                "offset": template.field_offset(field.name()),
                "end_offset": template.field_end_offset(field.name()),
            })
        })
        .collect();

    json!({
        "name": entry.name(),
        "arch": entry.arch(),
        "byte_len": template.byte_len(),
        "fields": fields,
        "definition": TemplateDefinition::from_template(entry.name(), entry.arch(), template),
    })
}

/// Field values in layout order.
fn values_in_layout_order(template: &Template, values: &FieldValues) -> Map<String, JsonValue> {
    template
        .fields()
        .filter_map(|field| {
            values
                .get(field.name())
                .map(|value| (field.name().to_owned(), JsonValue::from(value)))
        })
        .collect()
}

/// Parses `name=value`, where value is decimal or `0x`-prefixed hex.
fn parse_assignment(assignment: &str) -> Result<(&str, u64)> {
    let (name, value) = assignment
        .split_once('=')
        .ok_or_else(|| format_err!("expected FIELD=VALUE, got `{}`", assignment))?;

    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => value.replace('_', "").parse::<u64>(),
    }
    .with_context(|| format!("invalid value for field `{}`: `{}`", name, value))?;

    Ok((name.trim(), parsed))
}

fn cli() -> Command {
    let format = Arg::new("format")
        .short('o')
        .long("format")
        .value_parser(["text", "json"])
        .default_value("text")
        .help("Sets the output format");

    Command::new("asm_dump")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect, match and instantiate machine code templates")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("catalog")
                .long("catalog")
                .short('c')
                .value_name("FILE")
                .action(ArgAction::Append)
                .global(true)
                .help(
                    "Loads additional templates from a JSON catalog definition. \
                     May be passed multiple times; names must not clash with built-in templates.",
                ),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .global(true)
                .help("-v - info, -vv - debug, -vvv - trace."),
        )
        .subcommand(
            Command::new("list")
                .about("Lists the templates in the catalog")
                .arg(
                    Arg::new("arch")
                        .long("arch")
                        .value_parser(["x86", "x64"])
                        .help("Only lists templates for this architecture"),
                )
                .arg(format.clone()),
        )
        .subcommand(
            Command::new("show")
                .about("Shows the layout of a template")
                .arg(Arg::new("NAME").required(true))
                .arg(format),
        )
        .subcommand(
            Command::new("match")
                .about("Matches hex encoded bytes against a template and prints the field values")
                .arg(Arg::new("NAME").required(true))
                .arg(
                    Arg::new("HEX")
                        .required(true)
                        .help("Bytes to match, e.g. \"e9 00 01 00 00\""),
                ),
        )
        .subcommand(
            Command::new("substitute")
                .about("Instantiates a template with the given field values and prints its bytes")
                .arg(Arg::new("NAME").required(true))
                .arg(
                    Arg::new("values")
                        .value_name("FIELD=VALUE")
                        .num_args(0..)
                        .help("Field values, decimal or 0x-prefixed hex"),
                ),
        )
}

fn main() {
    let matches = cli().get_matches();

    let app = AsmDump::from_cli_matches(&matches);
    if let Err(e) = app.run(&matches) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

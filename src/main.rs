//! # Quire CLI
//!
//! Usage:
//!   quire report.json -o report.pdf
//!   echo '{ ... }' | quire -o report.pdf
//!   quire report.json --layout-json
//!   quire report.json --font Inter=fonts/Inter.ttf --font Inter-Bold=fonts/Inter-Bold.ttf
//!   quire --example > report.json

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::Parser;

use quire::{FontEntry, FontKey, Source};

#[derive(Parser)]
#[command(name = "quire")]
#[command(version)]
#[command(about = "Flow a JSON document onto pages and write a PDF", long_about = None)]
struct Cli {
    /// Input JSON document (stdin if not specified)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output PDF file
    #[arg(short, long, value_name = "FILE", default_value = "output.pdf")]
    output: PathBuf,

    /// Print placements and diagnostics as JSON instead of writing a PDF
    #[arg(long)]
    layout_json: bool,

    /// Register a TrueType font, e.g. `Inter=Inter.ttf` or `Inter-Bold=Inter-Bold.ttf`
    #[arg(long = "font", value_name = "NAME=PATH", value_parser = parse_font_arg)]
    fonts: Vec<FontEntry>,

    /// Print an example report document and exit
    #[arg(long)]
    example: bool,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> quire::Result<()> {
    if cli.example {
        print!("{}", example_report_json());
        return Ok(());
    }

    let input = match &cli.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let mut source: Source = serde_json::from_str(&input)?;
    source.fonts.extend(cli.fonts);

    if cli.layout_json {
        let layout = quire::layout_source(&source)?;
        println!("{}", serde_json::to_string_pretty(&layout)?);
        return Ok(());
    }

    let rendered = quire::render_source(&source)?;
    for diagnostic in &rendered.layout.diagnostics {
        eprintln!(
            "! page {}: {}",
            diagnostic.page_index + 1,
            diagnostic.message
        );
    }

    fs::write(&cli.output, &rendered.pdf)?;
    eprintln!(
        "✓ Written {} bytes ({} pages) to {}",
        rendered.pdf.len(),
        rendered.layout.page_count,
        cli.output.display()
    );
    Ok(())
}

/// Parse `NAME=PATH`. The name's suffix (`-Bold`, `-Italic`, `-BoldItalic`)
/// picks the variant the file provides.
fn parse_font_arg(arg: &str) -> Result<FontEntry, String> {
    let (name, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got '{}'", arg))?;
    if name.is_empty() || path.is_empty() {
        return Err(format!("expected NAME=PATH, got '{}'", arg));
    }
    let key = FontKey::from_name(name);
    Ok(FontEntry {
        bold: key.is_bold(),
        italic: key.italic,
        family: key.family,
        path: path.to_string(),
    })
}

fn example_report_json() -> &'static str {
    r##"{
  "metadata": {
    "title": "Field Operations Report",
    "author": "Quire"
  },
  "page": {
    "size": "Letter",
    "margins": { "top": 57.6, "right": 64.8, "bottom": 57.6, "left": 64.8 }
  },
  "blocks": [
    { "type": "Paragraph", "text": "Field Operations Report", "style": "Title" },
    { "type": "Paragraph", "text": "Quarterly summary of site layout and logistics", "style": "Normal" },
    { "type": "Spacer", "height": 18 },
    { "type": "Paragraph", "text": "1. Overview", "style": "Heading1" },
    {
      "type": "Paragraph",
      "text": "The site is divided into distinct zones, each with a different purpose. <b>Supplies</b> arrive during the day shift and are distributed before the night shift begins. This report describes how each zone is organised and where the bottlenecks are.",
      "style": "Body"
    },
    { "type": "Paragraph", "text": "1.1 Zones", "style": "Heading2" },
    {
      "type": "List",
      "items": [
        { "text": "<b>Central yard:</b> intake, sorting and the main office.", "style": "Bullet" },
        { "text": "<b>North depot:</b> bulk storage with two loading bays.", "style": "Bullet" },
        { "text": "<b>South workshop:</b> repairs and maintenance.", "style": "Bullet" }
      ],
      "bullet": "-"
    },
    {
      "type": "Table",
      "rows": [
        ["Zone", "Purpose", "Staff"],
        ["Central yard", "Intake and sorting", "12"],
        ["North depot", "Bulk storage", "5"],
        ["South workshop", "Repairs", "7"]
      ],
      "columnWidths": [{ "Fixed": 120 }, "Auto", { "Fixed": 60 }],
      "style": "TableCell",
      "headerRows": 1,
      "headerStyle": "TableHeader",
      "cellPadding": { "top": 4, "right": 6, "bottom": 4, "left": 6 },
      "grid": { "width": 0.5, "color": "#cccccc" }
    },
    { "type": "PageBreak" },
    { "type": "Paragraph", "text": "2. Next Steps", "style": "Heading1" },
    {
      "type": "Paragraph",
      "text": "Move sorting closer to the loading bays and add a second intake lane before the peak season.",
      "style": "Body"
    }
  ]
}
"##
}

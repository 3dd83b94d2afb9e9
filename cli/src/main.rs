//! onemd CLI - OneNote page XML to Markdown

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use onemd::{
    parse_file_with_options, to_manifest_json, BinaryContentProvider, DirectoryProvider,
    ExportOptions, Exporter, FsSink, JsonFormat, NullProvider, Onemd, PageArtifact,
    ParseOptions, RenderOptions, RenderStats, XmlHierarchy,
};

#[derive(Parser)]
#[command(name = "onemd")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Convert OneNote pages and notebooks to Markdown", long_about = None)]
struct Cli {
    /// Input page XML file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output directory
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a single page XML file
    Page {
        /// Input page XML file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print Markdown to stdout instead of writing files
        #[arg(long)]
        stdout: bool,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Export every section group and section of a notebook
    Notebook {
        /// Hierarchy XML file
        #[arg(value_name = "HIERARCHY")]
        hierarchy: PathBuf,

        /// Notebook name
        #[arg(value_name = "NAME")]
        name: String,

        #[command(flatten)]
        export: ExportArgs,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Export a single section
    Section {
        /// Hierarchy XML file
        #[arg(value_name = "HIERARCHY")]
        hierarchy: PathBuf,

        /// Section name
        #[arg(value_name = "NAME")]
        name: String,

        #[command(flatten)]
        export: ExportArgs,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Print the element outline of a page
    Tree {
        /// Input page XML file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(Args)]
struct RenderArgs {
    /// Output directory
    #[arg(short, long, value_name = "DIR", env = "ONEMD_OUTPUT")]
    output: Option<PathBuf>,

    /// Directory holding exported image payloads
    #[arg(long, value_name = "DIR")]
    binary_dir: Option<PathBuf>,

    /// Include YAML frontmatter
    #[arg(short, long)]
    frontmatter: bool,

    /// Image format used when a page does not declare one
    #[arg(long, default_value = "png")]
    image_format: String,

    /// Seconds to wait for each image fetch or attachment copy
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Print render statistics as JSON
    #[arg(long)]
    stats: bool,
}

impl RenderArgs {
    fn render_options(&self) -> RenderOptions {
        RenderOptions::new()
            .with_frontmatter(self.frontmatter)
            .with_image_format(&self.image_format)
            .with_io_timeout(Duration::from_secs(self.timeout))
            .with_stats(self.stats)
    }

    fn provider(&self) -> Arc<dyn BinaryContentProvider> {
        match &self.binary_dir {
            Some(dir) => Arc::new(DirectoryProvider::new(dir)),
            None => Arc::new(NullProvider),
        }
    }

    fn output_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

#[derive(Args)]
struct ExportArgs {
    /// Directory of page XML files named `<page id>.xml`
    #[arg(long, value_name = "DIR")]
    pages: PathBuf,

    /// Render the pages of each section in parallel
    #[arg(long)]
    parallel: bool,

    /// Write a JSON manifest of exported pages
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Page {
            input,
            stdout,
            render,
        }) => cmd_page(&input, stdout, &render),
        Some(Commands::Notebook {
            hierarchy,
            name,
            export,
            render,
        }) => cmd_export(&hierarchy, Target::Notebook(&name), &export, &render),
        Some(Commands::Section {
            hierarchy,
            name,
            export,
            render,
        }) => cmd_export(&hierarchy, Target::Section(&name), &export, &render),
        Some(Commands::Tree { input }) => cmd_tree(&input),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: convert if input is provided
            if let Some(input) = cli.input {
                cmd_convert(&input, cli.output.as_deref())
            } else {
                println!("{}", "Usage: onemd <FILE> [OUTPUT]".yellow());
                println!("       onemd --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn cmd_convert(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let artifact = Onemd::new().lenient().parse(input)?.write_to(&output_dir)?;
    print_written(&artifact);
    Ok(())
}

fn cmd_page(
    input: &Path,
    stdout: bool,
    render: &RenderArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = Onemd::new()
        .lenient()
        .with_provider(render.provider())
        .with_image_format(&render.image_format)
        .with_io_timeout(Duration::from_secs(render.timeout));
    if render.frontmatter {
        builder = builder.with_frontmatter();
    }
    let page = builder.parse(input)?;

    if stdout {
        let (markdown, stats) = page.to_markdown_with_stats()?;
        println!("{}", markdown);
        if render.stats {
            print_stats(&stats)?;
        }
        return Ok(());
    }

    let artifact = page.write_to(render.output_dir())?;
    print_written(&artifact);
    if render.stats {
        let (_, stats) = page.to_markdown_with_stats()?;
        print_stats(&stats)?;
    }
    Ok(())
}

enum Target<'a> {
    Notebook(&'a str),
    Section(&'a str),
}

fn cmd_export(
    hierarchy: &Path,
    target: Target<'_>,
    export: &ExportArgs,
    render: &RenderArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let navigator = XmlHierarchy::open(hierarchy, &export.pages)?;
    log::debug!(
        "Loaded hierarchy {} (pages from {})",
        hierarchy.display(),
        export.pages.display()
    );
    let output_dir = render.output_dir();
    fs::create_dir_all(&output_dir)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {pos} pages {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));

    let progress = pb.clone();
    let exporter = Exporter::new(Arc::new(navigator), Arc::new(FsSink::new(&output_dir)))
        .with_provider(render.provider())
        .with_options(
            ExportOptions::new()
                .with_render_options(render.render_options())
                .with_parallel(export.parallel),
        )
        .with_progress(move |artifact: &PageArtifact| {
            progress.set_message(artifact.title.clone());
            progress.inc(1);
        });

    let written = match target {
        Target::Notebook(name) => exporter.export_notebook(name)?,
        Target::Section(name) => exporter.export_section_by_name(name)?,
    };

    pb.finish_with_message("Done!");

    println!(
        "\n{} {} pages written to {}",
        "Exported".green().bold(),
        written.len(),
        output_dir.display()
    );

    if let Some(path) = &export.manifest {
        let json = to_manifest_json(&written, JsonFormat::Pretty)?;
        fs::write(path, json)?;
        println!("{} {}", "Manifest saved to".green(), path.display());
    }

    if render.stats {
        print_stats(&exporter.stats())?;
    }

    Ok(())
}

fn cmd_tree(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let tree = parse_file_with_options(input, ParseOptions::new().lenient())?;
    for line in tree.outline_lines() {
        println!("{}", line);
    }
    Ok(())
}

fn print_written(artifact: &PageArtifact) {
    println!(
        "{} {} ({} bytes)",
        "Saved to".green(),
        artifact.output_path.display(),
        artifact.content_len()
    );
}

fn print_stats(stats: &RenderStats) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("{}", serde_json::to_string_pretty(stats)?);
    if stats.has_warnings() {
        eprintln!(
            "{} {} media failed, {} missing definitions, {} malformed attributes",
            "Warning:".yellow().bold(),
            stats.failed_media,
            stats.missing_definitions,
            stats.malformed_attributes
        );
    }
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "onemd".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("OneNote to Markdown converter");
    println!();
    println!("Repository: {}", "https://github.com/iyulab/onemd".dimmed());
    println!("License: MIT");
}

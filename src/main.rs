use clap::{Args, Parser, Subcommand};
use sitepress::config::{self, BuildConfig, Layout};
use sitepress::content::{self, ContentKind, Status};
use sitepress::pipeline::{self, BuildOptions};
use sitepress::store::{ContentQuery, ContentStore};
use sitepress::{assets, copy, hash, html, optimize, output, sitemap};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sitepress")]
#[command(about = "Content compiler and production build for a static marketing site")]
#[command(long_about = "\
Content compiler and production build for a static marketing site

Markdown records with YAML front-matter become JSON data files, and the
static sources are assembled into an optimized, deployable dist/.

Project structure:

  project/
  ├── sitepress.toml               # Build config (optional)
  ├── index.html                   # Landing page
  ├── pages/                       # Other HTML pages
  ├── assets/
  │   ├── css/main.css             # Stylesheet (critical CSS between markers)
  │   ├── js/                      # Scripts
  │   ├── images/                  # Raster sources → AVIF/WebP variants
  │   └── data/                    # Compiled JSON (development only)
  ├── admin/                       # Admin UI (copied, never transformed)
  ├── content/
  │   ├── websites/*.md
  │   ├── news/*.md
  │   ├── projects/*.md
  │   ├── offers/*.md
  │   ├── services/*.md
  │   └── settings/{hero,contact,offers-page}.yml
  └── CNAME                        # Optional: origin for the sitemap

Build stages:
  clean → content → copy → images → html → minify → hash → sitemap

Run 'sitepress gen-config' to generate a documented sitepress.toml.")]
#[command(version)]
struct Cli {
    /// Project root directory
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (defaults to <root>/sitepress.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Filters for the `list` command.
#[derive(Args, Clone)]
struct ListArgs {
    /// Content kind to list
    #[arg(value_parser = parse_kind)]
    kind: ContentKind,

    /// Only records belonging to this website slug
    #[arg(long)]
    website: Option<String>,

    /// Only records with this status
    #[arg(long, value_parser = parse_status)]
    status: Option<Status>,

    /// Only records in this category
    #[arg(long)]
    category: Option<String>,

    /// Return at most this many records
    #[arg(long)]
    limit: Option<usize>,

    /// Keep file order instead of newest first
    #[arg(long)]
    unsorted: bool,

    /// Print the records as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Compile content/ into assets/data/ for local development
    Content,
    /// Clean the output directory and copy the static sources into it
    Copy,
    /// Generate AVIF/WebP width variants for images in the output
    Images,
    /// Inline critical CSS and minify the output HTML pages
    Html,
    /// Minify the output CSS and JS assets
    Minify,
    /// Content-hash the output assets and rewrite page references
    Hash,
    /// Write sitemap.xml and robots.txt into the output
    Sitemap,
    /// Run the full pipeline: clean → content → copy → images → html → minify → hash → sitemap
    Build,
    /// Query compiled content records
    List(ListArgs),
    /// Print a stock sitepress.toml with all options documented
    GenConfig,
}

fn parse_kind(value: &str) -> Result<ContentKind, String> {
    ContentKind::ALL
        .into_iter()
        .find(|k| k.dir_name() == value)
        .ok_or_else(|| {
            let names: Vec<&str> = ContentKind::ALL.iter().map(|k| k.dir_name()).collect();
            format!("expected one of: {}", names.join(", "))
        })
}

fn parse_status(value: &str) -> Result<Status, String> {
    Status::parse(value).ok_or_else(|| {
        "expected one of: draft, published, active, inactive, archived".to_string()
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Content => {
            let (_, layout) = load_project(&cli)?;
            let report = content::compile(&layout.content, &layout.dev_data())?;
            output::print_content_report(&report);
        }
        Command::Copy => {
            let (_, layout) = load_project(&cli)?;
            copy::clean_output(&layout.dist)?;
            let report = copy::copy_static(&layout)?;
            output::print_copy_report(&report);
        }
        Command::Images => {
            let (build_config, layout) = load_project(&cli)?;
            let roots = pipeline::image_roots(&layout, &build_config);
            let report = optimize::optimize_images(
                &roots,
                &optimize::VariantConfig::from_build_config(&build_config),
            )?;
            output::print_image_report(&report);
        }
        Command::Html => {
            let (build_config, layout) = load_project(&cli)?;
            let report = html::transform_site(&layout, &build_config.html)?;
            output::print_html_report(&report);
        }
        Command::Minify => {
            let (build_config, layout) = load_project(&cli)?;
            let report = assets::minify_assets(&layout.dist_assets(), &build_config.minify)?;
            output::print_minify_report(&report);
        }
        Command::Hash => {
            let (_, layout) = load_project(&cli)?;
            let report = hash::hash_site(
                &layout.dist,
                &layout.dist_assets(),
                &layout.dist.join(&layout.admin_name),
            )?;
            output::print_hash_report(&report);
        }
        Command::Sitemap => {
            let (build_config, layout) = load_project(&cli)?;
            let options = BuildOptions::resolve(&layout, &build_config);
            let report = sitemap::generate_sitemap(&layout, &options.base_url, options.lastmod)?;
            output::print_sitemap_report(&report);
        }
        Command::Build => {
            let (build_config, layout) = load_project(&cli)?;
            println!("==> Building {} → {}", layout.root.display(), layout.dist.display());
            let report = pipeline::build(&layout, &build_config)?;
            output::print_build_report(&report);
            println!("==> Build complete: {}", layout.dist.display());
        }
        Command::List(args) => {
            let (_, layout) = load_project(&cli)?;
            let data_dir = if layout.dist_data().is_dir() {
                layout.dist_data()
            } else {
                layout.dev_data()
            };
            let mut store = ContentStore::new(data_dir);
            let records = store.list(args.kind, &list_query(args))?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                output::print_list(args.kind, &records);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the config for `--root` and resolve the project layout from it.
fn load_project(cli: &Cli) -> Result<(BuildConfig, Layout), config::ConfigError> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.root.join("sitepress.toml"));
    let build_config = config::load_config(&config_path)?;
    let layout = Layout::new(&cli.root, &build_config);
    Ok((build_config, layout))
}

fn list_query(args: &ListArgs) -> ContentQuery {
    let mut query = ContentQuery::new();
    if let Some(website) = &args.website {
        query = query.website(website.clone());
    }
    if let Some(status) = args.status {
        query = query.status(status);
    }
    if let Some(category) = &args.category {
        query = query.category(category.clone());
    }
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }
    if args.unsorted {
        query = query.unsorted();
    }
    query
}

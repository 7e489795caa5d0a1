use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use docxide_epub::model::Image;
use docxide_epub::{BookMetadata, ConvertOptions, Error};

#[derive(Parser)]
#[command(name = "docxide-epub")]
#[command(version, about = "Convert DOCX files to EPUB", long_about = None)]
#[command(after_help = "EXAMPLES:
    docxide-epub novel.docx                      Writes novel.epub
    docxide-epub novel.docx out.epub --author \"Ana Ruiz\" --cover front.jpg")]
struct Cli {
    /// Input DOCX file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output EPUB file (defaults to INPUT with an .epub extension)
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Book title (defaults to the input file name)
    #[arg(long)]
    title: Option<String>,

    /// Author; repeat for several authors
    #[arg(long = "author", value_name = "NAME")]
    authors: Vec<String>,

    #[arg(long, default_value = "en")]
    language: String,

    /// Unique book identifier (defaults to urn:docxide:<file name>)
    #[arg(long)]
    identifier: Option<String>,

    #[arg(long)]
    publisher: Option<String>,

    #[arg(long)]
    description: Option<String>,

    /// Publication date, e.g. 2024-05-01
    #[arg(long)]
    date: Option<String>,

    /// Cover image (PNG, JPEG, GIF or SVG)
    #[arg(long, value_name = "IMAGE")]
    cover: Option<PathBuf>,

    /// Text for an "About the author" page
    #[arg(long, value_name = "TEXT")]
    author_bio: Option<String>,

    /// Drop empty paragraphs instead of turning them into extra spacing
    #[arg(long)]
    ignore_empty_paragraphs: bool,

    /// Log progress and timing
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("epub"));

    let result = metadata(&cli).and_then(|metadata| {
        let options = ConvertOptions {
            ignore_empty_paragraphs: cli.ignore_empty_paragraphs,
        };
        docxide_epub::convert_docx_to_epub(&cli.input, &output, &metadata, &options)
    });

    match result {
        Ok(()) => {
            log::info!("Wrote {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}: {e}", cli.input.display());
            ExitCode::FAILURE
        }
    }
}

fn metadata(cli: &Cli) -> Result<BookMetadata, Error> {
    let stem = file_stem(&cli.input);
    let cover_image = match &cli.cover {
        Some(path) => Some(Image {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "cover.jpg".to_string()),
            data: std::fs::read(path)?,
        }),
        None => None,
    };
    Ok(BookMetadata {
        title: cli.title.clone().unwrap_or_else(|| stem.clone()),
        authors: cli.authors.clone(),
        language: cli.language.clone(),
        identifier: cli
            .identifier
            .clone()
            .unwrap_or_else(|| format!("urn:docxide:{}", stem)),
        publisher: cli.publisher.clone(),
        description: cli.description.clone(),
        date: cli.date.clone(),
        cover_image,
        author_bio: cli.author_bio.clone(),
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book".to_string())
}

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use xdjango::{Input, PageRenderer, Settings, TemplateContext, XdjangoError};

/// Renders XSLT stylesheets against a JSON template context.
#[derive(Parser, Debug)]
#[command(name = "xdjango", version)]
struct Cli {
    /// Settings file (JSON). XDJANGO_DEBUG and XDJANGO_TRANSFORMS override it.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Template context (a JSON object)
    #[arg(long, global = true)]
    context: Option<PathBuf>,

    /// Render failures as an HTML error page
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a stylesheet, relative to the transforms directory
    Render {
        stylesheet: String,

        /// Input document; defaults to <empty/>
        #[arg(long)]
        input: Option<PathBuf>,

        /// Stylesheet parameter as name=value
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Render a page through the configured page pattern
    Page {
        name: String,

        #[arg(long)]
        namespace: Option<String>,
    },
}

fn parse_param(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected name=value, got '{}'", arg))
}

fn load_context(path: Option<&Path>) -> Result<TemplateContext, XdjangoError> {
    let Some(path) = path else {
        return Ok(TemplateContext::new());
    };
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    Ok(TemplateContext::from_json(value)?)
}

fn main() -> Result<(), XdjangoError> {
    env_logger::init();
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    }
    .with_env_overrides();
    settings.debug |= cli.debug;

    let context = load_context(cli.context.as_deref())?;
    let renderer = PageRenderer::new(settings);

    let output = match cli.command {
        Command::Render {
            stylesheet,
            input,
            params,
        } => {
            let params: HashMap<String, String> = params.into_iter().collect();
            match input {
                Some(path) => {
                    let text = fs::read_to_string(&path)?;
                    renderer.render(&stylesheet, Input::Text(&text), context, &params)?
                }
                None => renderer.render(&stylesheet, Input::Empty, context, &params)?,
            }
        }
        Command::Page { name, namespace } => renderer.page(
            &name,
            namespace.as_deref(),
            context,
            std::iter::empty::<(String, String)>(),
        )?,
    };
    print!("{}", output);
    Ok(())
}

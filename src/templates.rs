use std::path::Path;

use gitdigest_ingest_types::IngestDigest;
use serde::Serialize;
use tera::{Context, Tera};

use crate::utils::size::{DEFAULT_SLIDER_POSITION, MAX_SLIDER_POSITION, log_slider_to_size};

const BUILTIN_TEMPLATES: [(&str, &str); 3] = [
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("git.html", include_str!("../templates/git.html")),
];

/// Loads the built-in templates, letting `*.html` files under `template_dir` replace them.
pub fn load(template_dir: Option<&Path>) -> Result<Tera, tera::Error> {
    let mut tera = match template_dir {
        Some(dir) => Tera::new(&format!("{}/**/*.html", dir.display()))?,
        None => Tera::default(),
    };

    let mut builtin = Tera::default();
    builtin.add_raw_templates(BUILTIN_TEMPLATES)?;
    tera.extend(&builtin)?;

    Ok(tera)
}

#[derive(Debug, Serialize)]
struct IndexPage<'a> {
    repo_url: &'a str,
    max_slider_position: u32,
    default_slider_position: u32,
    default_size_label: String,
}

pub fn render_index(tera: &Tera, repo_url: &str) -> Result<String, tera::Error> {
    let page = IndexPage {
        repo_url,
        max_slider_position: MAX_SLIDER_POSITION,
        default_slider_position: DEFAULT_SLIDER_POSITION,
        default_size_label: format_size(log_slider_to_size(DEFAULT_SLIDER_POSITION)),
    };
    tera.render("index.html", &Context::from_serialize(&page)?)
}

#[derive(Debug, Default, Serialize)]
pub struct GitPage {
    pub repo_url: String,
    pub summary: String,
    pub tree: String,
    pub content: String,
    pub ingest_id: String,
    pub error_message: Option<String>,
}

impl GitPage {
    pub fn from_digest(repo_url: &str, digest: IngestDigest) -> Self {
        Self {
            repo_url: repo_url.to_string(),
            summary: digest.summary,
            tree: digest.tree,
            content: digest.content,
            ingest_id: digest.ingest_id,
            error_message: None,
        }
    }

    pub fn error(repo_url: &str, message: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.to_string(),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}

pub fn render_git(tera: &Tera, page: &GitPage) -> Result<String, tera::Error> {
    tera.render("git.html", &Context::from_serialize(page)?)
}

/// Human-readable size for the slider label, e.g. `50kb` or `2mb`.
pub fn format_size(bytes: u64) -> String {
    let kilobytes = bytes / 1024;
    if kilobytes >= 1024 {
        format!("{}mb", kilobytes / 1024)
    } else {
        format!("{kilobytes}kb")
    }
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::StitchError;
use crate::front_matter::split_front_matter;

pub const PANDOC_GUIDANCE: &str = "install Pandoc from https://pandoc.org/installing.html and ensure it is on PATH";
pub const ENGINE_GUIDANCE: &str =
    "install MiKTeX or TeX Live (xelatex) or wkhtmltopdf and ensure it is on PATH";

/// Which renderer produces the final file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EnginePreference {
    /// xelatex first, wkhtmltopdf as fallback.
    #[default]
    Auto,
    Xelatex,
    Wkhtmltopdf,
    /// In-process HTML rendering; needs no external tools.
    Html,
}

impl EnginePreference {
    pub fn as_str(self) -> &'static str {
        match self {
            EnginePreference::Auto => "auto",
            EnginePreference::Xelatex => "xelatex",
            EnginePreference::Wkhtmltopdf => "wkhtmltopdf",
            EnginePreference::Html => "html",
        }
    }

    /// PDF engines in the order they are attempted.
    pub fn pdf_engines(self) -> &'static [PdfEngine] {
        match self {
            EnginePreference::Auto | EnginePreference::Xelatex => {
                &[PdfEngine::Xelatex, PdfEngine::Wkhtmltopdf]
            }
            EnginePreference::Wkhtmltopdf => &[PdfEngine::Wkhtmltopdf, PdfEngine::Xelatex],
            EnginePreference::Html => &[],
        }
    }

    pub fn output_extension(self) -> &'static str {
        match self {
            EnginePreference::Html => "html",
            _ => "pdf",
        }
    }
}

impl std::str::FromStr for EnginePreference {
    type Err = StitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(EnginePreference::Auto),
            "xelatex" => Ok(EnginePreference::Xelatex),
            "wkhtmltopdf" => Ok(EnginePreference::Wkhtmltopdf),
            "html" => Ok(EnginePreference::Html),
            other => Err(StitchError::Settings(format!(
                "unknown engine preference '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PdfEngine {
    Xelatex,
    Wkhtmltopdf,
}

impl PdfEngine {
    pub fn executable(self) -> &'static str {
        match self {
            PdfEngine::Xelatex => "xelatex",
            PdfEngine::Wkhtmltopdf => "wkhtmltopdf",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionRequest {
    /// The compiled Markdown document.
    pub input: PathBuf,
    pub output: PathBuf,
    /// Directory images and other relative resources resolve against.
    pub resource_dir: PathBuf,
    pub engine: EnginePreference,
    pub toc_depth: u8,
}

/// Heading depth of the renderer's own table of contents when the metadata
/// does not set `toc-depth`.
pub const DEFAULT_TOC_DEPTH: u8 = 3;

impl ConversionRequest {
    /// Output lands beside the input with the engine's extension.
    pub fn for_document(input: &Path, engine: EnginePreference) -> Self {
        let resource_dir = input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            input: input.to_path_buf(),
            output: input.with_extension(engine.output_extension()),
            resource_dir,
            engine,
            toc_depth: DEFAULT_TOC_DEPTH,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversionOutcome {
    pub output: PathBuf,
    pub engine: String,
}

/// Renders the compiled Markdown into a distributable format.
pub trait Converter {
    fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutcome, StitchError>;
}

/// Picks the converter that serves `engine`.
pub fn converter_for(engine: EnginePreference) -> Box<dyn Converter> {
    match engine {
        EnginePreference::Html => Box::new(HtmlConverter),
        _ => Box::new(PandocConverter::from_env()),
    }
}

/// Shells out to `pandoc`, trying PDF engines in preference order.
#[derive(Clone, Debug, Default)]
pub struct PandocConverter {
    search_path: Vec<PathBuf>,
    fallback_locations: bool,
}

impl PandocConverter {
    /// Searches `PATH` plus the usual Windows install folders.
    pub fn from_env() -> Self {
        let search_path = env::var_os("PATH")
            .map(|paths| env::split_paths(&paths).collect())
            .unwrap_or_default();
        Self {
            search_path,
            fallback_locations: true,
        }
    }

    /// Searches only `dirs`.
    pub fn with_search_path(dirs: Vec<PathBuf>) -> Self {
        Self {
            search_path: dirs,
            fallback_locations: false,
        }
    }

    pub fn locate(&self, tool: &str) -> Option<PathBuf> {
        let names = executable_names(tool);
        let on_path = self.search_path.iter().find_map(|dir| {
            names
                .iter()
                .map(|name| dir.join(name))
                .find(|candidate| candidate.is_file())
        });
        on_path.or_else(|| {
            if !self.fallback_locations {
                return None;
            }
            windows_install_locations(tool)
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.is_file())
        })
    }

    fn pandoc_args(&self, request: &ConversionRequest) -> Vec<String> {
        vec![
            request.input.display().to_string(),
            "--toc".into(),
            format!("--toc-depth={}", request.toc_depth),
            "--metadata".into(),
            "link-citations=true".into(),
            "--resource-path".into(),
            request.resource_dir.display().to_string(),
            "-V".into(),
            "colorlinks=true".into(),
            "-V".into(),
            "linkcolor=blue".into(),
            "-V".into(),
            "urlcolor=blue".into(),
        ]
    }
}

impl Converter for PandocConverter {
    fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutcome, StitchError> {
        if request.engine == EnginePreference::Html {
            return HtmlConverter.convert(request);
        }

        let pandoc = self
            .locate("pandoc")
            .ok_or_else(|| StitchError::ConversionUnavailable {
                tool: "pandoc".into(),
                guidance: PANDOC_GUIDANCE.into(),
            })?;

        let mut last_failure: Option<StitchError> = None;
        for engine in request.engine.pdf_engines() {
            let name = engine.executable();
            let Some(engine_path) = self.locate(name) else {
                tracing::debug!(engine = name, "pdf engine not found");
                continue;
            };

            tracing::info!(engine = name, output = %request.output.display(), "exporting via pandoc");
            let mut command = Command::new(&pandoc);
            command
                .args(self.pandoc_args(request))
                .arg(format!("--pdf-engine={}", engine_path.display()))
                .arg("-o")
                .arg(&request.output);

            let output = command.output()?;
            if output.status.success() {
                return Ok(ConversionOutcome {
                    output: request.output.clone(),
                    engine: name.to_string(),
                });
            }

            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(engine = name, stderr = %stderr.trim(), "pdf engine failed");
            last_failure = Some(StitchError::ConversionFailed {
                engine: name.to_string(),
                message: stderr.trim().to_string(),
            });
        }

        Err(last_failure.unwrap_or_else(|| StitchError::ConversionUnavailable {
            tool: "pdf engine".into(),
            guidance: ENGINE_GUIDANCE.into(),
        }))
    }
}

/// Renders HTML in-process with the `markdown` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlConverter;

impl Converter for HtmlConverter {
    fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutcome, StitchError> {
        let source = fs::read_to_string(&request.input)?;
        let (title, body) = match split_front_matter(&source) {
            Ok(split) => (front_matter_title(split.yaml), split.body),
            Err(_) => (None, source.as_str()),
        };

        let options = markdown::Options {
            compile: markdown::CompileOptions {
                allow_dangerous_html: true,
                ..markdown::CompileOptions::gfm()
            },
            ..markdown::Options::gfm()
        };
        let html = markdown::to_html_with_options(body, &options).map_err(|err| {
            StitchError::ConversionFailed {
                engine: "html".into(),
                message: err.to_string(),
            }
        })?;

        let title = title.unwrap_or_else(|| "Compiled Document".to_string());
        let page = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{html}</body>\n</html>\n",
            escape_html(&title)
        );
        if let Some(dir) = request.output.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&request.output, page)?;
        tracing::info!(output = %request.output.display(), "rendered html");

        Ok(ConversionOutcome {
            output: request.output.clone(),
            engine: "html".into(),
        })
    }
}

fn front_matter_title(yaml: &str) -> Option<String> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml).ok()?;
    value
        .get("title")
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn executable_names(tool: &str) -> Vec<String> {
    if cfg!(windows) {
        vec![format!("{tool}.exe"), tool.to_string()]
    } else {
        vec![tool.to_string()]
    }
}

fn windows_install_locations(tool: &str) -> &'static [&'static str] {
    if !cfg!(windows) {
        return &[];
    }
    match tool {
        "pandoc" => &[
            r"C:\Program Files\Pandoc\pandoc.exe",
            r"C:\Program Files (x86)\Pandoc\pandoc.exe",
        ],
        "xelatex" => &[
            r"C:\Program Files\MiKTeX\miktex\bin\x64\xelatex.exe",
            r"C:\Program Files\MiKTeX 2.9\miktex\bin\x64\xelatex.exe",
        ],
        "wkhtmltopdf" => &[
            r"C:\Program Files\wkhtmltopdf\bin\wkhtmltopdf.exe",
            r"C:\Program Files (x86)\wkhtmltopdf\bin\wkhtmltopdf.exe",
        ],
        _ => &[],
    }
}

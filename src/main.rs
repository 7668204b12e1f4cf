// SPDX-License-Identifier: MIT
//
// quill — headless driver for the quill mobile editor engine.
//
// Wires the crates together the way a platform binding would, with a
// terminal-cell text measurer standing in for the platform's font engine:
//
//   quill-text  → Document (piece table, line index)
//   quill-input → GestureRecognizer
//   quill-view  → EditorCore, LayoutEngine, render model
//
// Subcommands:
//
//   render   file + viewport/scroll/scale → render model JSON
//   locate   char index ⇄ (line, column) conversions
//   gesture  replay a JSON-lines gesture script, print each classification

use std::cell::RefCell;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use quill_input::GestureEvent;
use quill_text::{Document, TextPosition};
use quill_view::{
    EditorConfig, EditorCore, FontMetrics, SharedDocument, TextMeasurer, ViewState, Viewport, WrapMode,
};
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use unicode_width::UnicodeWidthStr;

// ─── Cell measurer ──────────────────────────────────────────────────────────

/// Measures text in terminal cells: each cell is `cell_width` pixels and
/// wide (CJK, emoji) characters take two cells.
#[derive(Debug, Clone, Copy)]
struct CellMeasurer {
    cell_width: f32,
    line_height: f32,
}

impl TextMeasurer for CellMeasurer {
    fn measure_width(&mut self, text: &[u16], _style_id: u32) -> f32 {
        let cells = String::from_utf16_lossy(text).width();
        #[allow(clippy::cast_precision_loss)]
        let cells = cells as f32;
        cells * self.cell_width
    }

    fn font_metrics(&mut self) -> FontMetrics {
        let descent = self.line_height / 4.0;
        FontMetrics::new(descent - self.line_height, descent)
    }
}

// ─── Command line ───────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "quill", about = "Headless driver for the quill editor engine", version)]
struct Cli {
    /// Editor configuration (JSON); missing fields use defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Width of one terminal cell in pixels
    #[arg(long, global = true, default_value = "8")]
    cell_width: f32,

    /// Height of one text row in pixels
    #[arg(long, global = true, default_value = "16")]
    line_height: f32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum WrapArg {
    None,
    Char,
    Word,
}

impl From<WrapArg> for WrapMode {
    fn from(arg: WrapArg) -> Self {
        match arg {
            WrapArg::None => Self::None,
            WrapArg::Char => Self::CharBreak,
            WrapArg::Word => Self::WordBreak,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Lay out a file and print the render model as JSON
    Render {
        file: PathBuf,
        #[arg(long, default_value = "1080")]
        width: f32,
        #[arg(long, default_value = "1920")]
        height: f32,
        #[arg(long, default_value = "0")]
        scroll_x: f32,
        #[arg(long, default_value = "0")]
        scroll_y: f32,
        #[arg(long, default_value = "1")]
        scale: f32,
        /// Override the configured wrap mode
        #[arg(long, value_enum)]
        wrap: Option<WrapArg>,
        /// Cursor position as LINE:COLUMN
        #[arg(long, value_parser = parse_position)]
        cursor: Option<TextPosition>,
        /// Include the text behind every run id
        #[arg(long)]
        texts: bool,
        #[arg(long)]
        pretty: bool,
    },
    /// Convert char indices to positions and positions to char indices
    Locate {
        file: PathBuf,
        /// UTF-16 char index to convert
        #[arg(short, long)]
        index: Vec<usize>,
        /// LINE:COLUMN to convert
        #[arg(short, long, value_parser = parse_position)]
        position: Vec<TextPosition>,
    },
    /// Replay gesture events (one JSON object per line) through an editor
    Gesture {
        script: PathBuf,
        /// Document to tap into
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, default_value = "1080")]
        width: f32,
        #[arg(long, default_value = "1920")]
        height: f32,
        /// Also print events that produced no gesture
        #[arg(long)]
        all: bool,
    },
}

fn parse_position(s: &str) -> Result<TextPosition, String> {
    let (line, column) = s
        .split_once(':')
        .ok_or_else(|| format!("expected LINE:COLUMN, got {s:?}"))?;
    let line = line.trim().parse().map_err(|e| format!("bad line {line:?}: {e}"))?;
    let column = column
        .trim()
        .parse()
        .map_err(|e| format!("bad column {column:?}: {e}"))?;
    Ok(TextPosition::new(line, column))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EditorConfig> {
    let Some(path) = path else {
        return Ok(EditorConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn open(path: &Path) -> anyhow::Result<Document> {
    let document = Document::try_open(path).with_context(|| format!("opening {}", path.display()))?;
    info!(path = %path.display(), bytes = document.len_bytes(), "document opened");
    Ok(document)
}

fn open_document(path: &Path) -> anyhow::Result<SharedDocument> {
    Ok(Rc::new(RefCell::new(open(path)?)))
}

// ─── Subcommands ────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn render(
    editor: &mut EditorCore,
    file: &Path,
    viewport: Viewport,
    view_state: ViewState,
    wrap: Option<WrapArg>,
    cursor: Option<TextPosition>,
    texts: bool,
    out: &mut impl Write,
    pretty: bool,
) -> anyhow::Result<()> {
    editor.set_viewport(viewport);
    editor.set_view_state(view_state);
    if let Some(wrap) = wrap {
        editor.set_wrap_mode(wrap.into());
    }
    editor.load_document(open_document(file)?);
    if let Some(cursor) = cursor {
        editor.set_cursor(cursor);
    }

    let model = editor.build_render_model();
    let mut value = serde_json::to_value(&model)?;
    if texts {
        let table: serde_json::Map<String, Value> = model
            .lines
            .iter()
            .flat_map(|line| &line.runs)
            .filter_map(|run| {
                let text = editor.text_of(run.text_id)?;
                Some((run.text_id.to_u64().to_string(), Value::from(String::from_utf16_lossy(text))))
            })
            .collect();
        value["texts"] = Value::Object(table);
    }
    let rendered = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    writeln!(out, "{rendered}")?;
    Ok(())
}

fn locate(file: &Path, indices: &[usize], positions: &[TextPosition], out: &mut impl Write) -> anyhow::Result<()> {
    let mut doc = open(file)?;
    for &index in indices {
        let position = doc.position_of(index)?;
        writeln!(out, "{index} -> {}:{}", position.line, position.column)?;
    }
    for &position in positions {
        let index = doc.char_index_of(position)?;
        writeln!(out, "{}:{} -> {index}", position.line, position.column)?;
    }
    Ok(())
}

fn replay(editor: &mut EditorCore, script: impl BufRead, all: bool, out: &mut impl Write) -> anyhow::Result<()> {
    for (n, line) in script.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: GestureEvent =
            serde_json::from_str(&line).with_context(|| format!("script line {}", n + 1))?;
        // Hosts draw a frame between events; taps hit-test against it.
        editor.build_render_model();
        let result = editor.handle_gesture_event(&event);
        if result.is_none() && !all {
            continue;
        }
        let record = json!({
            "line": n + 1,
            "result": result,
            "view": editor.view_state(),
            "cursor": editor.cursor(),
        });
        writeln!(out, "{record}")?;
    }
    Ok(())
}

// ─── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "quill=info,warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    if cli.cell_width <= 0.0 || cli.line_height <= 0.0 {
        bail!("--cell-width and --line-height must be positive");
    }
    let config = load_config(cli.config.as_deref())?;
    let measurer = CellMeasurer {
        cell_width: cli.cell_width,
        line_height: cli.line_height,
    };
    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Render {
            file,
            width,
            height,
            scroll_x,
            scroll_y,
            scale,
            wrap,
            cursor,
            texts,
            pretty,
        } => {
            let mut editor = EditorCore::new(config, Box::new(measurer));
            render(
                &mut editor,
                &file,
                Viewport::new(width, height),
                ViewState {
                    scale,
                    scroll_x,
                    scroll_y,
                },
                wrap,
                cursor,
                texts,
                &mut out,
                pretty,
            )
        }
        Commands::Locate { file, index, position } => locate(&file, &index, &position, &mut out),
        Commands::Gesture {
            script,
            file,
            width,
            height,
            all,
        } => {
            let mut editor = EditorCore::new(config, Box::new(measurer));
            editor.set_viewport(Viewport::new(width, height));
            if let Some(file) = file {
                editor.load_document(open_document(&file)?);
                editor.build_render_model();
            }
            let script = fs::File::open(&script).with_context(|| format!("opening script {}", script.display()))?;
            replay(&mut editor, BufReader::new(script), all, &mut out)
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

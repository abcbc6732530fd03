//! Command-line interface for the `jd` structural diff tool.
//!
//! Supports diff mode with native, JSON Patch, and JSON Merge Patch
//! outputs, patch mode applying a diff to a document, and translate
//! mode converting between diff and document formats.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use jd_core::{ArrayMode, Diff, DiffOptions, Node, RenderConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");
const VERSION_BANNER: &str = concat!("jd version ", env!("CARGO_PKG_VERSION"));

const HELP_TEMPLATE: &str = r#"Usage: jd [OPTION]... FILE1 [FILE2]
Diff and patch JSON files.

Prints the diff of FILE1 and FILE2 to STDOUT.
When FILE2 is omitted the second input is read from STDIN.
When patching (-p) FILE1 is a diff.

Options:
  -color       Print color diff.
  -p           Apply patch FILE1 to FILE2 or STDIN.
  -o=FILE3     Write to FILE3 instead of STDOUT.
  -opts='[]'   JSON array of options ("SET", "MULTISET", {"precision":N}, {"setkeys":[...]}).
  -set         Treat arrays as sets.
  -mset        Treat arrays as multisets (bags).
  -setkeys     Keys to identify set objects
  -yaml        Read and write YAML instead of JSON.
  -precision=N Maximum absolute difference for numbers to be equal.
               Example: -precision=0.00001
  -f=FORMAT    Read and write diff in FORMAT "jd" (default), "patch" (RFC 6902) or
               "merge" (RFC 7386)
  -t=FORMATS   Translate FILE1 between FORMATS. Supported formats are "jd",
               "patch" (RFC 6902), "merge" (RFC 7386), "json" and "yaml".
               FORMATS are provided as a pair separated by "2". E.g.
               "yaml2json" or "jd2patch".

Examples:
  jd a.json b.json
  cat b.json | jd a.json
  jd -o patch a.json b.json; jd patch a.json
  jd -set a.json b.json
  jd -f patch a.json b.json
  jd -f merge a.json b.json

Version: {version}
"#;

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum DiffFormat {
    #[value(alias = "jd")]
    Native,
    #[value(alias = "patch")]
    Patch,
    #[value(alias = "merge")]
    Merge,
}

impl Default for DiffFormat {
    fn default() -> Self {
        Self::Native
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "jd",
    disable_help_flag = true,
    disable_help_subcommand = true,
    disable_version_flag = true,
    override_usage = "jd [OPTION]... FILE1 [FILE2]"
)]
struct Cli {
    #[arg(long = "help", short = 'h', action = ArgAction::SetTrue, hide = true)]
    help: bool,

    #[arg(long = "version", action = ArgAction::SetTrue, hide = true)]
    version: bool,

    /// Render diff output using ANSI colors.
    #[arg(long = "color", action = ArgAction::SetTrue)]
    color: bool,

    /// Select diff format (`jd`, `patch`, or `merge`).
    #[arg(short = 'f', long = "format", value_enum, default_value = "jd")]
    format: DiffFormat,

    /// Write output to FILE instead of STDOUT.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// JSON-encoded diff options.
    #[arg(long = "opts", default_value = "[]")]
    opts: String,

    /// Enable patch mode (apply FILE1 patch to FILE2/STDIN).
    #[arg(short = 'p', action = ArgAction::SetTrue)]
    patch: bool,

    /// Translate mode (e.g. `jd2patch`).
    #[arg(short = 't', long = "translate")]
    translate: Option<String>,

    /// Read and write YAML instead of JSON.
    #[arg(long = "yaml", action = ArgAction::SetTrue)]
    yaml: bool,

    /// Numeric precision tolerance.
    #[arg(long = "precision")]
    precision: Option<f64>,

    /// Treat arrays as sets.
    #[arg(long = "set", action = ArgAction::SetTrue)]
    set: bool,

    /// Treat arrays as multisets (bags).
    #[arg(long = "mset", action = ArgAction::SetTrue)]
    multiset: bool,

    /// Keys to identify objects within sets and multisets.
    #[arg(long = "setkeys")]
    setkeys: Option<String>,

    /// Serve the web UI (unsupported in this build).
    #[arg(long = "port", hide = true)]
    port: Option<u16>,

    /// Act as a git diff driver (unsupported in this build).
    #[arg(long = "git-diff-driver", action = ArgAction::SetTrue, hide = true)]
    git_diff_driver: bool,

    /// Positional inputs (FILE1 \[FILE2]).
    #[arg()]
    inputs: Vec<OsString>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match try_main() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let _ = writeln!(io::stderr(), "{err}");
            std::process::exit(2);
        }
    }
}

fn try_main() -> Result<i32> {
    let args = canonicalize_args(std::env::args_os());
    let cli = Cli::parse_from(args);

    if cli.help {
        print!("{}", help_text());
        return Ok(0);
    }

    if cli.version {
        println!("{VERSION_BANNER}");
        return Ok(0);
    }

    if cli.patch && cli.translate.is_some() {
        bail!("Patch and translate modes cannot be used together.");
    }

    if cli.port.is_some() {
        bail!("the web UI is not supported by this build");
    }

    if cli.git_diff_driver {
        bail!("the git diff driver is not supported by this build");
    }

    if cli.patch {
        run_patch(&cli)
    } else if let Some(formats) = cli.translate.as_deref() {
        run_translate(&cli, formats)
    } else {
        run_diff(&cli)
    }
}

fn run_diff(cli: &Cli) -> Result<i32> {
    let (first, second) = match cli.inputs.len() {
        1 => (InputSource::File(path_from(&cli.inputs[0])?), InputSource::Stdin),
        2 => (
            InputSource::File(path_from(&cli.inputs[0])?),
            InputSource::File(path_from(&cli.inputs[1])?),
        ),
        _ => {
            return Err(anyhow!("{}", help_text()));
        }
    };

    let lhs_text = read_input(&first)?;
    let rhs_text = read_input(&second)?;
    let lhs = parse_node(&lhs_text, cli.yaml).context("failed to parse first input")?;
    let rhs = parse_node(&rhs_text, cli.yaml).context("failed to parse second input")?;

    let mut options = build_options(cli)?;
    if cli.format == DiffFormat::Merge {
        options = options.with_merge().map_err(|err| anyhow!(err))?;
    }
    debug!(format = ?cli.format, "computing diff");
    let diff = lhs.diff(&rhs, &options);

    let mut render_config = RenderConfig::default();
    if cli.color || options.color() {
        render_config = render_config.with_color(true);
    }
    if let Some(file) = options.file() {
        render_config = render_config.with_file(file);
    }

    let (rendered, have_diff) = match cli.format {
        DiffFormat::Native => {
            let rendered = diff.render(&render_config);
            let have_diff = !rendered.is_empty();
            (rendered, have_diff)
        }
        DiffFormat::Patch => {
            let rendered = diff.render_patch().context("failed to render JSON Patch")?;
            let have_diff = rendered != "[]";
            (rendered, have_diff)
        }
        DiffFormat::Merge => {
            let rendered =
                diff.render_merge().context("failed to render JSON Merge Patch")?;
            let have_diff = rendered != "{}";
            (rendered, have_diff)
        }
    };

    write_output(cli, &rendered)?;
    Ok(if have_diff { 1 } else { 0 })
}

fn run_patch(cli: &Cli) -> Result<i32> {
    let (diff_source, doc_source) = match cli.inputs.len() {
        1 => (InputSource::File(path_from(&cli.inputs[0])?), InputSource::Stdin),
        2 => (
            InputSource::File(path_from(&cli.inputs[0])?),
            InputSource::File(path_from(&cli.inputs[1])?),
        ),
        _ => {
            return Err(anyhow!("{}", help_text()));
        }
    };

    let diff_text = read_input(&diff_source)?;
    let diff = parse_diff(&diff_text, cli.format).context("failed to parse patch")?;
    let doc_text = read_input(&doc_source)?;
    let doc = parse_node(&doc_text, cli.yaml).context("failed to parse document")?;

    debug!(elements = diff.len(), "applying patch");
    let patched = doc.apply_patch(&diff).map_err(|err| anyhow!(err))?;

    let rendered = serialize_node(&patched, cli.yaml)?;
    write_output(cli, &rendered)?;
    Ok(0)
}

fn run_translate(cli: &Cli, formats: &str) -> Result<i32> {
    let source = match cli.inputs.len() {
        0 => InputSource::Stdin,
        1 => InputSource::File(path_from(&cli.inputs[0])?),
        _ => {
            return Err(anyhow!("{}", help_text()));
        }
    };
    let input = read_input(&source)?;

    debug!(formats, "translating");
    let rendered = match formats {
        "json2yaml" => {
            let node = Node::from_json_str(&input).map_err(|err| anyhow!(err))?;
            serialize_node(&node, true)?
        }
        "yaml2json" => {
            let node = Node::from_yaml_str(&input).map_err(|err| anyhow!(err))?;
            serialize_node(&node, false)?
        }
        "jd2patch" => {
            let diff = Diff::from_native_str(&input).map_err(|err| anyhow!(err))?;
            let mut out = diff.render_patch().context("failed to render JSON Patch")?;
            out.push('\n');
            out
        }
        "patch2jd" => {
            let diff = Diff::from_patch_str(&input).map_err(|err| anyhow!(err))?;
            diff.render(&RenderConfig::default())
        }
        "jd2merge" => {
            let diff = Diff::from_native_str(&input).map_err(|err| anyhow!(err))?;
            let mut out =
                diff.render_merge().context("failed to render JSON Merge Patch")?;
            out.push('\n');
            out
        }
        "merge2jd" => {
            let diff = Diff::from_merge_str(&input).map_err(|err| anyhow!(err))?;
            diff.render(&RenderConfig::default())
        }
        other => {
            bail!("unsupported translation: {other}");
        }
    };

    write_output(cli, &rendered)?;
    Ok(0)
}

#[derive(Debug)]
enum InputSource {
    File(PathBuf),
    Stdin,
}

fn path_from(input: &OsString) -> Result<PathBuf> {
    let path = PathBuf::from(input);
    if path.as_os_str().is_empty() {
        bail!("expected file path; got empty string");
    }
    Ok(path)
}

fn read_input(source: &InputSource) -> Result<String> {
    match source {
        InputSource::File(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        }
        InputSource::Stdin => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn write_output(cli: &Cli, rendered: &str) -> Result<()> {
    if let Some(path) = &cli.output {
        fs::write(path, rendered.as_bytes())
            .with_context(|| format!("failed to write output to {}", path.display()))?;
    } else {
        print!("{rendered}");
        io::stdout().flush().ok();
    }
    Ok(())
}

fn parse_node(input: &str, yaml: bool) -> Result<Node> {
    if yaml {
        Node::from_yaml_str(input).map_err(|err| anyhow!(err))
    } else {
        Node::from_json_str(input).map_err(|err| anyhow!(err))
    }
}

fn serialize_node(node: &Node, yaml: bool) -> Result<String> {
    let Some(value) = node.to_json_value() else {
        return Ok(String::new());
    };
    if yaml {
        serde_yaml::to_string(&value).context("failed to serialize YAML")
    } else {
        let mut out = serde_json::to_string(&value).context("failed to serialize JSON")?;
        out.push('\n');
        Ok(out)
    }
}

fn parse_diff(input: &str, format: DiffFormat) -> Result<Diff> {
    let diff = match format {
        DiffFormat::Native => Diff::from_native_str(input).map_err(|err| anyhow!(err))?,
        DiffFormat::Patch => Diff::from_patch_str(input).map_err(|err| anyhow!(err))?,
        DiffFormat::Merge => Diff::from_merge_str(input).map_err(|err| anyhow!(err))?,
    };
    Ok(diff)
}

fn build_options(cli: &Cli) -> Result<DiffOptions> {
    let mut options = DiffOptions::from_json_str(&cli.opts).map_err(|err| anyhow!(err))?;

    if cli.set && cli.multiset {
        bail!("-set and -mset cannot be combined");
    }

    if cli.set {
        options = options.with_array_mode(ArrayMode::Set).map_err(|err| anyhow!(err))?;
    }

    if cli.multiset {
        options = options.with_array_mode(ArrayMode::MultiSet).map_err(|err| anyhow!(err))?;
    }

    if let Some(setkeys) = &cli.setkeys {
        let keys = parse_flag_set_keys(setkeys)?;
        options = options.with_set_keys(keys).map_err(|err| anyhow!(err))?;
    }

    if let Some(precision) = cli.precision {
        options = options.with_precision(precision).map_err(|err| anyhow!(err))?;
    }

    Ok(options)
}

fn parse_flag_set_keys(raw: &str) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    for segment in raw.split(',') {
        let trimmed = segment.trim();
        if trimmed.is_empty() {
            bail!("invalid set key: {segment}");
        }
        keys.push(trimmed.to_string());
    }
    if keys.is_empty() {
        bail!("-setkeys requires at least one key");
    }
    Ok(keys)
}

fn canonicalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut canonicalized = Vec::new();
    for (idx, arg) in args.into_iter().enumerate() {
        if idx == 0 {
            canonicalized.push(arg);
            continue;
        }
        match arg.to_str() {
            Some("-help") => canonicalized.push(OsString::from("--help")),
            Some("-h") => canonicalized.push(OsString::from("--help")),
            Some("-version") => canonicalized.push(OsString::from("--version")),
            Some("-color") => canonicalized.push(OsString::from("--color")),
            Some("-yaml") => canonicalized.push(OsString::from("--yaml")),
            Some("-set") => canonicalized.push(OsString::from("--set")),
            Some("-mset") => canonicalized.push(OsString::from("--mset")),
            Some("-precision") => canonicalized.push(OsString::from("--precision")),
            Some("-setkeys") => canonicalized.push(OsString::from("--setkeys")),
            Some("-opts") => canonicalized.push(OsString::from("--opts")),
            Some(other) if other.starts_with("-f=") => {
                canonicalized.push(OsString::from("-f"));
                canonicalized.push(OsString::from(other.trim_start_matches("-f=")));
            }
            Some(other) if other.starts_with("-t=") => {
                canonicalized.push(OsString::from("-t"));
                canonicalized.push(OsString::from(other.trim_start_matches("-t=")));
            }
            Some(other) if other.starts_with("-o=") => {
                canonicalized.push(OsString::from("-o"));
                canonicalized.push(OsString::from(other.trim_start_matches("-o=")));
            }
            Some(other) if other.starts_with("-precision=") => {
                canonicalized.push(OsString::from("--precision"));
                canonicalized.push(OsString::from(other.trim_start_matches("-precision=")));
            }
            Some(other) if other.starts_with("-setkeys=") => {
                canonicalized.push(OsString::from("--setkeys"));
                canonicalized.push(OsString::from(other.trim_start_matches("-setkeys=")));
            }
            Some(other) if other.starts_with("-opts=") => {
                canonicalized.push(OsString::from("--opts"));
                canonicalized.push(OsString::from(other.trim_start_matches("-opts=")));
            }
            Some(other) if other.starts_with("-port=") => {
                canonicalized.push(OsString::from("--port"));
                canonicalized.push(OsString::from(other.trim_start_matches("-port=")));
            }
            Some("-port") => canonicalized.push(OsString::from("--port")),
            Some("-git-diff-driver") => canonicalized.push(OsString::from("--git-diff-driver")),
            _ => canonicalized.push(arg),
        }
    }
    canonicalized
}

fn help_text() -> String {
    HELP_TEMPLATE.replace("{version}", VERSION_NUMBER)
}

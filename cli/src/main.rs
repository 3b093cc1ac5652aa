//! coursegen CLI binary: run a course-content pipeline from the command line.
//!
//! Subcommands: `lesson` (partitioned plan-execute), `experiment` (sequential
//! plan-execute), `outline` (chapter list), `syllabus` (per-chapter lesson plan),
//! `quiz` (questions from requirements), `grade` (batch grading of a JSON request).

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use cli::{read_input, run_pipeline, Clients, Pipeline, RunOptions};
use config::Settings;

#[derive(Parser, Debug)]
#[command(name = "coursegen")]
#[command(about = "coursegen: generate lesson plans, lab plans and course outlines with LLMs")]
struct Args {
    #[command(subcommand)]
    cmd: Command,

    /// Read the goal or syllabus from this file instead of positional text
    #[arg(short, long, value_name = "PATH", global = true)]
    file: Option<PathBuf>,

    /// Verbose: log node enter/exit and phase transitions
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the full outcome as JSON instead of the markdown document
    #[arg(long, global = true)]
    json: bool,

    /// When using --json, pretty-print (multi-line)
    #[arg(long, global = true)]
    pretty: bool,

    /// Write output to this file instead of stdout
    #[arg(short, long, value_name = "PATH", global = true)]
    output: Option<PathBuf>,

    /// Directory with prompt YAML overrides (default: PROMPTS_DIR or ./prompts)
    #[arg(long, value_name = "DIR", global = true)]
    prompts: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Lesson plan: plan → classify → pre / parallel / post → replan → aggregate
    Lesson(PlanArgs),
    /// Lab plan: plan → one step at a time → replan → aggregate
    Experiment(PlanArgs),
    /// Chapter outline from a syllabus
    Outline(OutlineArgs),
    /// Lesson plan per syllabus chapter: parse → generate chapters → finalize
    Syllabus(TextArgs),
    /// Quiz from requirements: plan → group by type → write questions
    Quiz(TextArgs),
    /// Grade a JSON request {question, student_answers}: review twice → arbitrate → report
    Grade(TextArgs),
}

#[derive(clap::Args, Debug, Clone)]
struct TextArgs {
    /// Input text (joined with spaces) when --file is not used
    #[arg(trailing_var_arg = true)]
    text: Vec<String>,
}

#[derive(clap::Args, Debug, Clone)]
struct PlanArgs {
    /// Polish the concatenated plan with the writer model
    #[arg(long)]
    polish: bool,
    #[command(flatten)]
    input: TextArgs,
}

#[derive(clap::Args, Debug, Clone)]
struct OutlineArgs {
    /// Length of one class in hours
    #[arg(long, value_name = "HOURS", default_value_t = coursegen::agent::outline::DEFAULT_HOURS_PER_CLASS)]
    hours_per_class: u32,
    /// The course includes lab sessions
    #[arg(long)]
    has_experiment: bool,
    #[command(flatten)]
    input: TextArgs,
}

impl Command {
    fn pipeline(&self) -> (Pipeline, &[String], bool) {
        match self {
            Command::Lesson(a) => (Pipeline::Lesson, &a.input.text, a.polish),
            Command::Experiment(a) => (Pipeline::Experiment, &a.input.text, a.polish),
            Command::Outline(a) => (
                Pipeline::Outline {
                    hours_per_class: a.hours_per_class,
                    has_experiment: a.has_experiment,
                },
                &a.input.text,
                false,
            ),
            Command::Syllabus(a) => (Pipeline::Syllabus, &a.text, false),
            Command::Quiz(a) => (Pipeline::Quiz, &a.text, false),
            Command::Grade(a) => (Pipeline::Grade, &a.text, false),
        }
    }
}

fn write_output(text: &str, file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match file {
        Some(path) => std::fs::write(path, format!("{}\n", text))?,
        None => {
            println!("{}", text);
            std::io::Write::flush(&mut std::io::stdout())?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    config::load_and_apply("coursegen", None::<&Path>).ok();
    let args = Args::parse();
    let _log_guard = config::tracing_init::init("coursegen", args.verbose)?;

    let (pipeline, words, polish) = args.cmd.pipeline();
    let input = match read_input(args.file.as_deref(), words) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("coursegen: {}", e);
            std::process::exit(2);
        }
    };

    let settings = Settings::from_env()?;
    let clients = Clients::from_settings(&settings)?;
    let prompts = coursegen::prompts::load_or_default(args.prompts.as_deref());
    let opts = RunOptions {
        verbose: args.verbose,
        polish,
    };

    let output = match run_pipeline(pipeline, &input, &clients, &settings, &prompts, &opts).await {
        Ok(out) => out,
        Err(e) => {
            tracing::error!(error = %e, "pipeline failed");
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    let rendered = if args.json {
        if args.pretty {
            serde_json::to_string_pretty(&output.json)?
        } else {
            serde_json::to_string(&output.json)?
        }
    } else {
        output.text
    };
    write_output(&rendered, args.output.as_deref())
}
